//! Test doubles for service tests.
//!
//! Storage is a real in-memory [`Database`]; these wrap or replace the
//! remaining collaborators and count how often they are reached.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::db::Database;
use crate::error::{Error, Result};
use crate::ports::{IdentityProvider, ImageStore, PostStore, Transaction, Transactor};
use crate::types::{Identity, NewComment};

pub struct StubIdentity {
    name: String,
    failing: AtomicBool,
    last_ttl: Mutex<Option<Duration>>,
}

impl StubIdentity {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            failing: AtomicBool::new(false),
            last_ttl: Mutex::new(None),
        }
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn last_ttl(&self) -> Option<Duration> {
        *self.last_ttl.lock().unwrap()
    }
}

#[async_trait]
impl IdentityProvider for StubIdentity {
    async fn get_identity(&self, ttl: Duration) -> Result<Identity> {
        *self.last_ttl.lock().unwrap() = Some(ttl);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::IdentityUnavailable("stub is down".into()));
        }
        Ok(Identity {
            id: 1,
            name: self.name.clone(),
            avatar_url: "https://example.test/avatar/1.jpeg".into(),
        })
    }
}

pub struct StubImages {
    failing: AtomicBool,
    uploads: AtomicUsize,
}

impl StubImages {
    pub fn new() -> Self {
        Self {
            failing: AtomicBool::new(false),
            uploads: AtomicUsize::new(0),
        }
    }

    pub fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ImageStore for StubImages {
    async fn upload(&self, owner_id: i64, _data: Vec<u8>) -> Result<String> {
        let n = self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::ImageStorage("bucket unavailable".into()));
        }
        Ok(self.public_url(owner_id, &format!("img{}", n)))
    }

    fn public_url(&self, owner_id: i64, code: &str) -> String {
        format!("https://images.test/user-{}/{}", owner_id, code)
    }
}

/// How [`TestTransactor`] interferes with the transactions it opens.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interference {
    None,
    /// `set_post_expiry` fails after the comment insert went through
    FailExpiryUpdate,
    /// A sweep runs at the given instant just before the transaction opens
    SweepFirst(DateTime<Utc>),
}

pub struct TestTransactor {
    db: Database,
    interference: Interference,
    begins: AtomicUsize,
}

impl TestTransactor {
    pub fn new(db: Database, interference: Interference) -> Self {
        Self {
            db,
            interference,
            begins: AtomicUsize::new(0),
        }
    }

    pub fn begins(&self) -> usize {
        self.begins.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transactor for TestTransactor {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        self.begins.fetch_add(1, Ordering::SeqCst);
        if let Interference::SweepFirst(at) = self.interference {
            self.db.archive_expired(at).await?;
        }
        let inner = self.db.begin().await?;
        let tx: Box<dyn Transaction> = match self.interference {
            Interference::FailExpiryUpdate => Box::new(FailingExpiry { inner }),
            _ => inner,
        };
        Ok(tx)
    }
}

struct FailingExpiry {
    inner: Box<dyn Transaction>,
}

impl Transaction for FailingExpiry {
    fn insert_comment(&mut self, comment: &NewComment) -> Result<i64> {
        self.inner.insert_comment(comment)
    }

    fn set_post_expiry(&mut self, _post_id: i64, _expires_at: DateTime<Utc>) -> Result<()> {
        Err(Error::Database(rusqlite::Error::QueryReturnedNoRows))
    }

    fn commit(self: Box<Self>) -> Result<()> {
        self.inner.commit()
    }
}
