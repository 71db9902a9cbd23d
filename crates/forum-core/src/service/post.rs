//! Post creation, listing and archival.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::info;

use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::ports::{ImageStore, PostStore};
use crate::types::{Author, NewPost, Page, Post};

/// Post service configuration
#[derive(Debug, Clone)]
pub struct PostConfig {
    /// Lifetime of a fresh post before its first comment
    pub creation_grace: Duration,
}

impl Default for PostConfig {
    fn default() -> Self {
        Self {
            creation_grace: Duration::minutes(10),
        }
    }
}

/// A post as submitted by a visitor
#[derive(Debug, Clone)]
pub struct PostDraft {
    pub author: Author,
    pub title: String,
    pub content: String,
}

pub struct PostService {
    posts: Arc<dyn PostStore>,
    images: Arc<dyn ImageStore>,
    clock: Arc<dyn Clock>,
    config: PostConfig,
}

impl PostService {
    pub fn new(
        posts: Arc<dyn PostStore>,
        images: Arc<dyn ImageStore>,
        clock: Arc<dyn Clock>,
        config: PostConfig,
    ) -> Self {
        Self {
            posts,
            images,
            clock,
            config,
        }
    }

    /// Create a post, uploading `image` first when it is non-empty.
    pub async fn create_post(&self, draft: PostDraft, image: Vec<u8>) -> Result<i64> {
        let title = draft.title.trim();
        let content = draft.content.trim();
        if title.is_empty() || content.is_empty() {
            return Err(Error::invalid_input("title and content are required"));
        }

        let image_path = if image.is_empty() {
            None
        } else {
            Some(
                self.images
                    .upload(draft.author.session_id, image)
                    .await
                    .map_err(|e| e.during("upload post image"))?,
            )
        };

        let now = self.clock.now();
        let post = NewPost {
            author: draft.author,
            title: title.to_string(),
            content: content.to_string(),
            image_path,
            created_at: now,
            expires_at: now + self.config.creation_grace,
        };

        let id = self
            .posts
            .save_post(&post)
            .await
            .map_err(|e| e.during("save post"))?;
        info!(post_id = id, author = %post.author.name, "Post created");
        Ok(id)
    }

    pub async fn get_post(&self, post_id: i64) -> Result<Post> {
        self.posts
            .get_post(post_id)
            .await
            .map_err(|e| e.during("load post"))?
            .ok_or_else(|| Error::not_found("post"))
    }

    pub async fn list_active(&self, page: Page) -> Result<Vec<Post>> {
        self.posts
            .list_active(page)
            .await
            .map_err(|e| e.during("list active posts"))
    }

    pub async fn list_archived(&self, page: Page) -> Result<Vec<Post>> {
        self.posts
            .list_archived(page)
            .await
            .map_err(|e| e.during("list archived posts"))
    }

    /// Standalone image upload; returns the public URL.
    pub async fn upload_image(&self, owner_id: i64, data: Vec<u8>) -> Result<String> {
        if data.is_empty() {
            return Err(Error::invalid_input("image is empty"));
        }
        self.images
            .upload(owner_id, data)
            .await
            .map_err(|e| e.during("upload image"))
    }

    /// Archive every post that expired at or before `now`.
    pub async fn archive_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        self.posts
            .archive_expired(now)
            .await
            .map_err(|e| e.during("archive expired posts"))
    }
}
