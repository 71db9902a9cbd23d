//! Shared fixtures for server tests.

use async_trait::async_trait;
use forum_core::ports::{IdentityProvider, ImageStore};
use forum_core::types::Identity;
use forum_core::{Database, Error, ManualClock, Result};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::state::AppState;

/// Hands out "Character N" with increasing N
#[derive(Default)]
pub struct CountingIdentity {
    issued: AtomicUsize,
}

#[async_trait]
impl IdentityProvider for CountingIdentity {
    async fn get_identity(&self, _ttl: Duration) -> Result<Identity> {
        let n = self.issued.fetch_add(1, Ordering::SeqCst) as i64 + 1;
        Ok(Identity {
            id: n,
            name: format!("Character {}", n),
            avatar_url: format!("https://avatars.test/{}.jpeg", n),
        })
    }
}

#[derive(Default)]
pub struct MemoryImages {
    pub failing: AtomicBool,
    uploads: AtomicUsize,
}

impl MemoryImages {
    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageStore for MemoryImages {
    async fn upload(&self, owner_id: i64, _data: Vec<u8>) -> Result<String> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::ImageStorage("storage offline".into()));
        }
        Ok(self.public_url(owner_id, &format!("obj{}", n)))
    }

    fn public_url(&self, owner_id: i64, code: &str) -> String {
        format!("https://images.test/user-{}/{}", owner_id, code)
    }
}

pub struct TestApp {
    pub state: Arc<AppState>,
    pub clock: Arc<ManualClock>,
    pub images: Arc<MemoryImages>,
}

/// App state over an in-memory database and a clock stopped at a fixed instant
pub fn test_app(config: Config) -> TestApp {
    let db = Database::open_in_memory().unwrap();
    let clock = Arc::new(ManualClock::at_epoch_millis(1_700_000_000_000));
    let images = Arc::new(MemoryImages::default());
    let state = AppState::new(
        config,
        db,
        clock.clone(),
        Arc::new(CountingIdentity::default()),
        images.clone(),
    );
    TestApp {
        state,
        clock,
        images,
    }
}
