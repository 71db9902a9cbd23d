//! Standalone image upload.

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::post,
    Extension, Json, Router,
};
use serde::Serialize;
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::CurrentSession;
use crate::state::AppState;

/// Create image router
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/images", post(upload_image))
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// Upload the raw request body as an image owned by the current session
pub async fn upload_image(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
    body: Bytes,
) -> Result<(StatusCode, Json<UploadResponse>), ApiError> {
    let url = state.posts.upload_image(session.id, body.to_vec()).await?;
    Ok((StatusCode::CREATED, Json(UploadResponse { url })))
}
