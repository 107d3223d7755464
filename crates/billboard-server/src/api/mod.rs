mod billboards;
mod events;
mod viewer;

use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post},
    Extension, Json, Router,
};
use billboard_core::{AppConfig, Sampler, ThreadRngSampler};
use billboard_engine::{EngineError, EngineSettings};
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::middleware::{identify_admin, request_id, AuthState, RequestId};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub settings: Arc<EngineSettings>,
    pub cache_max_age_secs: u64,
    /// Drives delivery-rate and tabulation sampling draws.
    pub sampler: Arc<dyn Sampler>,
}

impl AppState {
    #[must_use]
    pub fn new(pool: PgPool, config: &AppConfig) -> Self {
        Self {
            pool,
            settings: Arc::new(EngineSettings::from_app_config(config)),
            cache_max_age_secs: config.cache_max_age_secs,
            sampler: Arc::new(ThreadRngSampler),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    pub data: T,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ResponseMeta {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: ErrorBody,
    pub meta: ResponseMeta,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

impl ResponseMeta {
    pub(super) fn new(request_id: String) -> Self {
        Self {
            request_id,
            timestamp: Utc::now(),
        }
    }
}

impl ApiError {
    pub fn new(
        request_id: impl Into<String>,
        code: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            error: ErrorBody {
                code: code.into(),
                message: message.into(),
            },
            meta: ResponseMeta::new(request_id.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.error.code.as_str() {
            "not_found" => StatusCode::NOT_FOUND,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "bad_request" | "validation_error" => StatusCode::BAD_REQUEST,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(self)).into_response()
    }
}

pub(super) fn map_engine_error(request_id: String, error: &EngineError) -> ApiError {
    match error {
        EngineError::Validation { .. } => {
            ApiError::new(request_id, "validation_error", error.to_string())
        }
        EngineError::NotFound(_) => ApiError::new(request_id, "not_found", error.to_string()),
        EngineError::ConcurrencyConflict(_) => {
            tracing::warn!(error = %error, "request lost a lock race");
            ApiError::new(request_id, "conflict", "billboard is busy; retry")
        }
        EngineError::TabulationFailure { .. } | EngineError::Db(_) => {
            tracing::error!(error = %error, "database query failed");
            ApiError::new(request_id, "internal_error", "database query failed")
        }
    }
}

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static("x-request-id"),
        ])
}

pub fn build_app(state: AppState, auth: AuthState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route(
            "/api/v1/billboards/{placement_area}",
            get(billboards::select_billboard),
        )
        .route("/api/v1/billboard_events", post(events::create_event))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id))
                .layer(axum::middleware::from_fn_with_state(auth, identify_admin)),
        )
        .with_state(state)
}

async fn health(
    State(state): State<AppState>,
    Extension(req_id): Extension<RequestId>,
) -> impl IntoResponse {
    let meta = ResponseMeta::new(req_id.0);

    match billboard_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiResponse {
                data: HealthData {
                    status: "ok",
                    database: "ok",
                },
                meta,
            }),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse {
                    data: HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                    meta,
                }),
            )
        }
    }
}
