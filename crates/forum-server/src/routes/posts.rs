//! Post routes.

use axum::{
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use forum_core::service::PostDraft;
use forum_core::types::{CommentNode, Page, Post};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use super::form::SubmittedForm;
use super::CreatedResponse;
use crate::error::ApiError;
use crate::middleware::CurrentSession;
use crate::state::AppState;

/// Create post router
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/posts", get(list_active).post(create_post))
        .route("/posts/{id}", get(get_post))
        .route("/archive", get(list_archived))
}

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

impl PageQuery {
    fn page(&self) -> Page {
        Page::new(self.page.unwrap_or(1))
    }
}

#[derive(Debug, Serialize)]
pub struct PostListResponse {
    pub page: u32,
    pub posts: Vec<Post>,
}

#[derive(Debug, Serialize)]
pub struct PostDetailResponse {
    pub post: Post,
    pub comments: Vec<CommentNode>,
}

/// List active posts, newest first
pub async fn list_active(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PostListResponse>, ApiError> {
    let page = query.page();
    let posts = state.posts.list_active(page).await?;
    Ok(Json(PostListResponse {
        page: page.number,
        posts,
    }))
}

/// List archived posts, newest first
pub async fn list_archived(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Json<PostListResponse>, ApiError> {
    let page = query.page();
    let posts = state.posts.list_archived(page).await?;
    Ok(Json(PostListResponse {
        page: page.number,
        posts,
    }))
}

/// Create a post from a multipart form (`title`, `content`, optional `image`)
pub async fn create_post(
    State(state): State<Arc<AppState>>,
    Extension(CurrentSession(session)): Extension<CurrentSession>,
    multipart: Multipart,
) -> Result<(StatusCode, Json<CreatedResponse>), ApiError> {
    let form = SubmittedForm::read(multipart).await?;
    let draft = PostDraft {
        author: session.author(),
        title: form.text("title"),
        content: form.text("content"),
    };

    let id = state.posts.create_post(draft, form.image).await?;
    Ok((StatusCode::CREATED, Json(CreatedResponse { id })))
}

/// Get a post with its threaded comments
pub async fn get_post(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<PostDetailResponse>, ApiError> {
    let post = state.posts.get_post(id).await?;
    let comments = state.comments.thread_for_post(id).await?;
    Ok(Json(PostDetailResponse { post, comments }))
}
