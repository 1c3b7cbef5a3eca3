use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::CONTENT_TYPE;
use axum::http::{HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use spanview_core::error::SpanviewError;
use spanview_core::ids::TraceId;
use spanview_core::model::waterfall::Waterfall;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::Level;

use crate::otlp::decode::{PayloadFormat, decode_document};
use crate::pipeline::build_waterfall;
use crate::tempo::TempoClient;

#[derive(Clone)]
pub struct HttpState {
    pub tempo: TempoClient,
}

pub fn router(state: HttpState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any);
    Router::new()
        .route("/healthz", get(healthz))
        .route("/api/traces/{trace_id}/waterfall", get(trace_waterfall))
        .route("/v1/waterfall", post(render_waterfall))
        .layer(cors)
        .layer(
            TraceLayer::new_for_http()
                .on_request(tower_http::trace::DefaultOnRequest::new().level(Level::INFO))
                .on_response(tower_http::trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}

async fn trace_waterfall(
    State(state): State<HttpState>,
    Path(trace_id): Path<String>,
) -> Result<Json<Waterfall>, ApiError> {
    let trace_id = TraceId::parse(&trace_id)?;
    let doc = state.tempo.fetch_trace(&trace_id).await?;
    Ok(Json(build_waterfall(&doc)))
}

async fn render_waterfall(headers: HeaderMap, body: Bytes) -> Result<Json<Waterfall>, ApiError> {
    let content_type = headers.get(CONTENT_TYPE).and_then(|v| v.to_str().ok());
    let doc = decode_document(&body, PayloadFormat::from_content_type(content_type))?;
    Ok(Json(build_waterfall(&doc)))
}

pub struct ApiError(SpanviewError);

impl From<SpanviewError> for ApiError {
    fn from(err: SpanviewError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            SpanviewError::InvalidArgument(_) | SpanviewError::Parse(_) => StatusCode::BAD_REQUEST,
            SpanviewError::NotFound(_) => StatusCode::NOT_FOUND,
            SpanviewError::Fetch(_) => StatusCode::BAD_GATEWAY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::warn!(error = %self.0, "waterfall request failed");
        }
        (
            status,
            Json(serde_json::json!({ "error": self.0.to_string() })),
        )
            .into_response()
    }
}
