use axum::{
	Json, Router,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use crate::state::AppState;
use stow_domain::scope::SearchScope;
use stow_service::{RebuildReport, SearchRequest, SearchResponse, ServiceError};

pub fn router(state: AppState) -> Router {
	Router::new().route("/health", get(health)).route("/v1/search", post(search)).with_state(state)
}

/// Mutating maintenance surface, served on the loopback-only admin bind.
pub fn admin_router(state: AppState) -> Router {
	Router::new()
		.route("/v1/admin/invalidate_scope", post(invalidate_scope))
		.route("/v1/admin/rebuild_index", post(rebuild_index))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search(
	State(state): State<AppState>,
	Json(payload): Json<SearchRequest>,
) -> Result<Json<SearchResponse>, ApiError> {
	let response = state.service.search(payload).await?;

	Ok(Json(response))
}

#[derive(Debug, Deserialize)]
struct ScopeRequest {
	scope: String,
}

#[derive(Debug, Serialize)]
struct InvalidateScopeResponse {
	removed: u64,
}

async fn invalidate_scope(
	State(state): State<AppState>,
	Json(payload): Json<ScopeRequest>,
) -> Result<Json<InvalidateScopeResponse>, ApiError> {
	let scope = parse_scope(&payload.scope)?;
	let removed = state.service.invalidate_scope(scope).await?;

	Ok(Json(InvalidateScopeResponse { removed }))
}

async fn rebuild_index(
	State(state): State<AppState>,
	Json(payload): Json<ScopeRequest>,
) -> Result<Json<RebuildReport>, ApiError> {
	let scope = parse_scope(&payload.scope)?;
	let report = state.service.rebuild_index(scope).await?;

	Ok(Json(report))
}

fn parse_scope(value: &str) -> Result<SearchScope, ApiError> {
	value
		.parse::<SearchScope>()
		.map_err(|err| ApiError::new(StatusCode::BAD_REQUEST, "invalid_request", err.to_string()))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		let message = err.to_string();

		match err {
			ServiceError::InvalidRequest { .. } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", message),
			ServiceError::Provider { .. } =>
				Self::new(StatusCode::BAD_GATEWAY, "provider_error", message),
			ServiceError::Index { .. } => Self::new(StatusCode::BAD_GATEWAY, "index_error", message),
			ServiceError::Storage { .. } =>
				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "storage_error", message),
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
