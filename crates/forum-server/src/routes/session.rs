//! Current session routes.

use axum::{
    extract::{FromRequest, Request, State},
    http::{header, StatusCode},
    routing::{get, post},
    Extension, Form, Json, Router,
};
use chrono::{DateTime, Utc};
use forum_core::SessionToken;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::ApiError;
use crate::middleware::CurrentSession;
use crate::state::AppState;

/// Create session router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/session", get(get_session))
        .route("/session/name", post(update_name))
}

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub name: String,
    pub avatar_url: String,
    pub expires_at: DateTime<Utc>,
}

/// Get the current visitor's identity
pub async fn get_session(
    Extension(CurrentSession(session)): Extension<CurrentSession>,
) -> Json<SessionResponse> {
    Json(SessionResponse {
        name: session.identity.name,
        avatar_url: session.identity.avatar_url,
        expires_at: session.expires_at,
    })
}

#[derive(Debug, Deserialize)]
pub struct NicknameRequest {
    pub nickname: String,
}

/// `NicknameRequest` from either a JSON or an urlencoded body
pub struct NicknameInput(pub NicknameRequest);

impl<S> FromRequest<S> for NicknameInput
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let is_json = req
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .is_some_and(|v| v.starts_with("application/json"));

        if is_json {
            let Json(body) = Json::<NicknameRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            Ok(Self(body))
        } else {
            let Form(body) = Form::<NicknameRequest>::from_request(req, state)
                .await
                .map_err(|e| ApiError::bad_request(e.body_text()))?;
            Ok(Self(body))
        }
    }
}

/// Change the current visitor's display name
pub async fn update_name(
    State(state): State<Arc<AppState>>,
    Extension(token): Extension<SessionToken>,
    NicknameInput(req): NicknameInput,
) -> Result<StatusCode, ApiError> {
    state.sessions.update_identity(&token, &req.nickname).await?;
    Ok(StatusCode::NO_CONTENT)
}
