//! Comment routes.

use axum::{
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::post,
    Extension, Json, Router,
};
use forum_core::service::CommentDraft;
use std::sync::Arc;

use super::form::SubmittedForm;
use super::CreatedResponse;
use crate::error::ApiError;
use crate::middleware::CurrentSession;
use crate::state::AppState;

/// Create comment router
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/posts/{id}/comments", post(create_comment))
}

/// Comment on a post from a multipart form
/// (`comment`, optional `parent_comment_id`, optional `image`)
pub async fn create_comment(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
    Path(post_id): Path<i64>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let form = SubmittedForm::read(multipart).await?;
    let draft = CommentDraft {
        post_id,
        parent_comment_id: form.optional_id("parent_comment_id")?,
        author: session.author(),
        content: form.text("comment"),
    };

    let id = state.comments.save_comment(draft, form.image).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}
