use axum::{
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use billboard_core::{cache_directives, Billboard, CacheDirectives, ContextType, PlacementArea};
use billboard_engine::{SelectionRequest, TestOverride};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::viewer::viewer_from_headers;
use super::{map_engine_error, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::{Elevated, RequestId};

#[derive(Debug, Deserialize)]
pub(super) struct SelectionQuery {
    pub context_type: Option<String>,
    pub bb_test_placement_area: Option<String>,
    pub bb_test_id: Option<String>,
}

impl SelectionQuery {
    /// Malformed override parameters are ignored rather than rejected; they
    /// only ever matter to admin callers.
    fn test_override(&self) -> Option<TestOverride> {
        let placement_area = self.bb_test_placement_area.as_deref()?.parse().ok()?;
        let billboard_id = self.bb_test_id.as_deref()?.trim().parse().ok()?;
        Some(TestOverride {
            placement_area,
            billboard_id,
        })
    }
}

#[derive(Debug, Serialize)]
pub(super) struct BillboardItem {
    pub id: i64,
    pub name: Option<String>,
    pub placement_area: PlacementArea,
    pub placement_area_label: &'static str,
    pub processed_html: Option<String>,
}

impl From<Billboard> for BillboardItem {
    fn from(billboard: Billboard) -> Self {
        Self {
            id: billboard.id,
            name: billboard.name,
            placement_area: billboard.placement_area,
            placement_area_label: billboard.placement_area.human_readable(),
            processed_html: billboard.processed_html,
        }
    }
}

pub(super) async fn select_billboard(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    Extension(Elevated(elevated)): Extension<Elevated>,
    Path(placement_area): Path<String>,
    Query(query): Query<SelectionQuery>,
    headers: HeaderMap,
) -> Result<Response, ApiError> {
    let request_id = req_id.0;
    let validation = |e: billboard_core::CoreError| {
        ApiError::new(request_id.clone(), "validation_error", e.to_string())
    };

    let placement_area: PlacementArea = placement_area.parse().map_err(validation)?;
    let context_type: ContextType = query
        .context_type
        .as_deref()
        .map_or(Ok(ContextType::Home), str::parse)
        .map_err(validation)?;

    let viewer = viewer_from_headers(&headers);
    let signed_in = viewer.signed_in();
    let request = SelectionRequest {
        placement_area,
        context_type,
        viewer,
        test_override: query.test_override(),
        elevated,
    };

    let mut rng = request_rng();
    let selection = billboard_engine::select(
        &state.pool,
        &state.settings,
        &request,
        state.sampler.as_ref(),
        &mut rng,
    )
    .await
    .map_err(|e| map_engine_error(request_id.clone(), &e))?;

    let directives = if selection.pinned {
        CacheDirectives::default()
    } else {
        let surrogate_key = selection.billboard.as_ref().map(Billboard::surrogate_key);
        cache_directives(
            signed_in,
            surrogate_key.as_deref(),
            state.cache_max_age_secs,
        )
    };

    let body = ApiResponse {
        data: selection.billboard.map(BillboardItem::from),
        meta: ResponseMeta::new(request_id),
    };
    let mut response = (StatusCode::OK, Json(body)).into_response();
    apply_directives(response.headers_mut(), &directives);
    Ok(response)
}

/// Seeded from the thread-local generator. `ThreadRng` itself is not `Send`
/// and cannot be held across the selection's awaits.
fn request_rng() -> StdRng {
    StdRng::from_rng(&mut rand::rng())
}

fn apply_directives(headers: &mut HeaderMap, directives: &CacheDirectives) {
    for (name, value) in directives.iter() {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => tracing::warn!(header = name, "skipping unrepresentable cache header"),
        }
    }
}
