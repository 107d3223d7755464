//! Picks the billboard to render in a placement for one viewer.

use billboard_core::selection::should_deliver;
use billboard_core::{
    choose_billboard, eligible, Billboard, ContextType, PlacementArea, Sampler, SelectionWeights,
    Viewer,
};
use billboard_db::PlacementAreaConfigRow;
use rand::Rng;
use sqlx::PgPool;

use crate::{EngineError, EngineSettings};

/// Pin a specific billboard into a placement for previewing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TestOverride {
    pub placement_area: PlacementArea,
    pub billboard_id: i64,
}

#[derive(Debug, Clone)]
pub struct SelectionRequest {
    pub placement_area: PlacementArea,
    pub context_type: ContextType,
    pub viewer: Viewer,
    pub test_override: Option<TestOverride>,
    /// Caller presented an admin credential. Only then is `test_override` honored.
    pub elevated: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
    pub billboard: Option<Billboard>,
    /// The billboard came from a test override and must not be edge-cached.
    pub pinned: bool,
}

impl Selection {
    fn none() -> Self {
        Self {
            billboard: None,
            pinned: false,
        }
    }
}

/// Select at most one billboard for `request`.
///
/// `sampler` drives the placement's delivery-rate gate; `rng` drives the
/// choice among eligible candidates. Read-only.
///
/// # Errors
///
/// Returns [`EngineError::Db`] on query failures or undecodable rows.
#[tracing::instrument(
    skip_all,
    fields(
        placement_area = %request.placement_area,
        context_type = %request.context_type,
        signed_in = request.viewer.signed_in(),
    )
)]
pub async fn select<R>(
    pool: &PgPool,
    settings: &EngineSettings,
    request: &SelectionRequest,
    sampler: &dyn Sampler,
    rng: &mut R,
) -> Result<Selection, EngineError>
where
    R: Rng + Send + ?Sized,
{
    if let Some(pinned) = pinned_billboard(pool, request).await? {
        return Ok(pinned);
    }

    let config = billboard_db::get_placement_area_config(pool, request.placement_area).await?;
    let weights = config
        .as_ref()
        .map_or_else(SelectionWeights::default, PlacementAreaConfigRow::selection_weights);
    if let Some(config) = &config {
        let rate = config.delivery_rate(request.viewer.signed_in());
        if !should_deliver(rate, sampler.draw()) {
            tracing::debug!(rate, "delivery rate gate skipped this request");
            return Ok(Selection::none());
        }
    }

    let candidates = billboard_db::list_serving_billboards(pool, request.placement_area)
        .await?
        .into_iter()
        .map(Billboard::try_from)
        .collect::<Result<Vec<_>, _>>()?;
    let audience: Vec<Billboard> = candidates
        .into_iter()
        .filter(|b| eligible(b, &request.viewer))
        .collect();

    let chosen = choose_billboard(
        &audience,
        &weights,
        settings.low_impression_count_for(request.placement_area),
        rng,
    )
    .cloned();

    tracing::debug!(
        eligible = audience.len(),
        billboard_id = chosen.as_ref().map(|b| b.id),
        "billboard selection complete"
    );

    Ok(Selection {
        billboard: chosen,
        pinned: false,
    })
}

/// Honor a test override only for elevated callers asking for the same
/// placement the override names. The pinned unit skips approval, publish,
/// and targeting checks.
async fn pinned_billboard(
    pool: &PgPool,
    request: &SelectionRequest,
) -> Result<Option<Selection>, EngineError> {
    let Some(test) = request.test_override else {
        return Ok(None);
    };
    if !request.elevated || test.placement_area != request.placement_area {
        return Ok(None);
    }

    let billboard = billboard_db::get_billboard(pool, test.billboard_id)
        .await?
        .map(Billboard::try_from)
        .transpose()?;
    tracing::info!(
        billboard_id = test.billboard_id,
        found = billboard.is_some(),
        "serving pinned test billboard"
    );

    Ok(Some(Selection {
        billboard,
        pinned: true,
    }))
}
