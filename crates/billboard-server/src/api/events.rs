use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderMap, StatusCode},
    response::IntoResponse,
    Extension, Json,
};
use billboard_core::Geolocation;
use billboard_engine::EventInput;
use serde::{Deserialize, Serialize};

use super::viewer::{precise_geolocation, viewer_id};
use super::{map_engine_error, ApiError, ApiResponse, AppState, ResponseMeta};
use crate::middleware::RequestId;

#[derive(Debug, Deserialize)]
pub(super) struct EventFields {
    pub billboard_id: Option<i64>,
    /// Older clients still send the billboard id under its legacy name.
    pub display_ad_id: Option<i64>,
    pub category: String,
    pub context_type: Option<String>,
    pub article_id: Option<i64>,
    pub geolocation: Option<String>,
}

/// Accepted request shapes, tried in order.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(super) enum EventPayload {
    Current { billboard_event: EventFields },
    Legacy { display_ad_event: EventFields },
    Flat(EventFields),
}

impl EventPayload {
    fn into_fields(self) -> EventFields {
        match self {
            Self::Current { billboard_event } => billboard_event,
            Self::Legacy { display_ad_event } => display_ad_event,
            Self::Flat(fields) => fields,
        }
    }
}

#[derive(Debug, Serialize)]
pub(super) struct CreatedEvent {
    pub id: i64,
}

pub(super) async fn create_event(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
    headers: HeaderMap,
    payload: Result<Json<EventPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let request_id = req_id.0;
    let Json(payload) = payload.map_err(|e| {
        ApiError::new(request_id.clone(), "validation_error", e.body_text())
    })?;
    let fields = payload.into_fields();

    let billboard_id = fields
        .billboard_id
        .or(fields.display_ad_id)
        .ok_or_else(|| {
            ApiError::new(
                request_id.clone(),
                "validation_error",
                "billboard_id is required",
            )
        })?;

    let mut input = EventInput::parse(
        billboard_id,
        &fields.category,
        fields.context_type.as_deref().unwrap_or("home"),
    )
    .map_err(|e| map_engine_error(request_id.clone(), &e))?;
    input.user_id = viewer_id(&headers);
    input.article_id = fields.article_id;
    input.geolocation = match fields.geolocation.as_deref() {
        Some(raw) => Some(Geolocation::parse(raw).map_err(|e| {
            ApiError::new(request_id.clone(), "validation_error", e.to_string())
        })?),
        None => precise_geolocation(&headers),
    };

    let weights = state.settings.conversion_weights;
    let id = billboard_engine::record(&state.pool, &weights, &input)
        .await
        .map_err(|e| map_engine_error(request_id.clone(), &e))?;

    let pool = state.pool.clone();
    let sampler = Arc::clone(&state.sampler);
    tokio::spawn(async move {
        billboard_engine::tabulate_logged(&pool, billboard_id, &weights, sampler.as_ref()).await;
    });

    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            data: CreatedEvent { id },
            meta: ResponseMeta::new(request_id),
        }),
    ))
}
