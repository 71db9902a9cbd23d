//! Comment submission.
//!
//! A new comment and the extension of its post's lifetime are written in one
//! transaction: a thread that just got a reply is not archived by a sweep
//! that lands mid-submission.

use chrono::Duration;
use std::sync::Arc;
use tracing::{debug, info};

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::ports::{within_transaction, CommentStore, ImageStore, PostStore, Transactor};
use crate::types::{build_thread, Author, Comment, CommentNode, NewComment};

/// Comment service configuration
#[derive(Debug, Clone)]
pub struct CommentConfig {
    /// How far into the future a new comment pushes its post's expiry
    pub grace: Duration,
}

impl Default for CommentConfig {
    fn default() -> Self {
        Self {
            grace: Duration::minutes(15),
        }
    }
}

/// A comment as submitted by a visitor
#[derive(Debug, Clone)]
pub struct CommentDraft {
    pub post_id: i64,
    pub parent_comment_id: Option<i64>,
    pub author: Author,
    pub content: String,
}

pub struct CommentService {
    posts: Arc<dyn PostStore>,
    comments: Arc<dyn CommentStore>,
    transactor: Arc<dyn Transactor>,
    images: Arc<dyn ImageStore>,
    clock: Arc<dyn Clock>,
    config: CommentConfig,
}

impl CommentService {
    pub fn new(
        posts: Arc<dyn PostStore>,
        comments: Arc<dyn CommentStore>,
        transactor: Arc<dyn Transactor>,
        images: Arc<dyn ImageStore>,
        clock: Arc<dyn Clock>,
        config: CommentConfig,
    ) -> Self {
        Self {
            posts,
            comments,
            transactor,
            images,
            clock,
            config,
        }
    }

    /// Save a comment and push its post's expiry to `now + grace`.
    ///
    /// Archived posts are refused with `Conflict` before anything is written.
    /// A non-empty `image` is uploaded outside the transaction; if the
    /// transaction then fails, the uploaded object is left behind.
    pub async fn save_comment(&self, draft: CommentDraft, image: Vec<u8>) -> Result<i64> {
        let post = self
            .posts
            .get_post(draft.post_id)
            .await
            .map_err(|e| e.during("load post"))?
            .ok_or_else(|| Error::not_found("post"))?;

        if post.is_archived {
            return Err(Error::conflict(
                "post is archived, new comments are prohibited",
            ));
        }

        let content = draft.content.trim();
        if content.is_empty() && image.is_empty() {
            return Err(Error::invalid_input("comment is empty"));
        }

        let image_path = if image.is_empty() {
            None
        } else {
            Some(
                self.images
                    .upload(draft.author.session_id, image)
                    .await
                    .map_err(|e| e.during("upload comment image"))?,
            )
        };

        let now = self.clock.now();
        let post_id = post.id;
        let expires_at = now + self.config.grace;
        let comment = NewComment {
            post_id,
            parent_comment_id: draft.parent_comment_id,
            author: draft.author,
            content: content.to_string(),
            image_path,
            created_at: now,
        };

        let id = within_transaction(self.transactor.as_ref(), move |tx| {
            let id = tx.insert_comment(&comment)?;
            tx.set_post_expiry(post_id, expires_at)?;
            Ok(id)
        })
        .await
        .map_err(|e| e.during("save comment"))?;

        info!(comment_id = id, post_id, %expires_at, "Comment saved, post extended");
        Ok(id)
    }

    /// Comments of a post, oldest first.
    pub async fn list_for_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        self.comments
            .list_by_post(post_id)
            .await
            .map_err(|e| e.during("list comments"))
    }

    /// Comments of a post nested under their parents.
    pub async fn thread_for_post(&self, post_id: i64) -> Result<Vec<CommentNode>> {
        let comments = self.list_for_post(post_id).await?;
        debug!(post_id, count = comments.len(), "Building comment thread");
        Ok(build_thread(comments))
    }
}
