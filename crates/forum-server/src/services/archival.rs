//! ArchivalSweeper - periodic archiving of expired posts
//!
//! Each tick archives every post whose `expires_at` is at or before the
//! current instant. Ticks never overlap and a failed tick is only logged;
//! the next attempt happens on the following interval.

use forum_core::service::PostService;
use forum_core::Clock;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

pub struct ArchivalSweeper {
    posts: Arc<PostService>,
    clock: Arc<dyn Clock>,
    interval: Duration,
}

impl ArchivalSweeper {
    pub fn new(posts: Arc<PostService>, clock: Arc<dyn Clock>, interval: Duration) -> Self {
        Self {
            posts,
            clock,
            interval,
        }
    }

    /// Run one archival pass. Errors are logged and swallowed.
    pub async fn tick(&self) {
        let now = self.clock.now();
        match self.posts.archive_expired(now).await {
            Ok(0) => debug!("No expired posts to archive"),
            Ok(n) => info!(archived = n, "Archived expired posts"),
            Err(e) => error!(error = %e, "Archival sweep failed"),
        }
    }

    /// Start ticking every `interval` until `cancel` fires.
    ///
    /// A tick already in progress runs to completion before the loop
    /// observes cancellation.
    pub fn start(self, cancel: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                interval_secs = self.interval.as_secs(),
                "Starting archival sweeper"
            );

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => {
                        info!("Archival sweeper stopped");
                        break;
                    }
                    _ = ticker.tick() => self.tick().await,
                }
            }
        })
    }
}
