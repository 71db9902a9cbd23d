//! Application state.

use forum_core::ports::{IdentityProvider, ImageStore};
use forum_core::service::{
    CommentConfig, CommentService, PostConfig, PostService, SessionConfig, SessionService,
};
use forum_core::{Clock, Database};
use std::sync::Arc;
use std::time::Instant;

use crate::config::Config;

/// Shared application state
pub struct AppState {
    /// Server configuration
    pub config: Arc<Config>,
    /// Database connection
    pub db: Database,
    pub sessions: Arc<SessionService>,
    pub posts: Arc<PostService>,
    pub comments: Arc<CommentService>,
    /// Server start time
    pub start_time: Instant,
}

impl AppState {
    /// Wire the services onto one database and the given collaborators
    pub fn new(
        config: Config,
        db: Database,
        clock: Arc<dyn Clock>,
        identity: Arc<dyn IdentityProvider>,
        images: Arc<dyn ImageStore>,
    ) -> Arc<Self> {
        let store = Arc::new(db.clone());

        let sessions = SessionService::new(
            store.clone(),
            identity,
            Arc::clone(&clock),
            SessionConfig {
                ttl: config.session_ttl(),
                ..SessionConfig::default()
            },
        );
        let posts = PostService::new(
            store.clone(),
            Arc::clone(&images),
            Arc::clone(&clock),
            PostConfig {
                creation_grace: config.post_grace(),
            },
        );
        let comments = CommentService::new(
            store.clone(),
            store.clone(),
            store,
            images,
            clock,
            CommentConfig {
                grace: config.comment_grace(),
            },
        );

        Arc::new(Self {
            config: Arc::new(config),
            db,
            sessions: Arc::new(sessions),
            posts: Arc::new(posts),
            comments: Arc::new(comments),
            start_time: Instant::now(),
        })
    }
}
