//! Capability traits the services depend on.
//!
//! Implementations handle the actual backends (SQLite, HTTP, in-memory fakes).
//! Services hold them as `Arc<dyn Trait>` and never name a concrete type.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::time::Duration;

use crate::auth::TokenHash;
use crate::error::{Error, Result};
use crate::types::{Comment, Identity, NewComment, NewPost, NewSession, Page, Post, Session};

/// Read-modify-write callback for [`SessionStore::update_by_token`].
///
/// Returns `Ok(true)` when the session was changed and must be written back.
/// An `Err` aborts the update and is handed back to the caller unchanged.
pub type SessionUpdate = Box<dyn FnOnce(&mut Session) -> Result<bool> + Send>;

/// Session persistence.
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Persist a new session and return its id.
    async fn store(&self, session: &NewSession) -> Result<i64>;

    /// Look a session up by token hash. No lock is taken.
    async fn get_by_token(&self, hash: &TokenHash) -> Result<Option<Session>>;

    /// Exclusive read-modify-write of one session.
    ///
    /// The row stays locked for the duration of `update`, so concurrent
    /// updates for the same token are serialized. Fails with `NotFound` if no
    /// session has this hash.
    async fn update_by_token(&self, hash: &TokenHash, update: SessionUpdate) -> Result<()>;
}

/// Post persistence outside of transactions.
#[async_trait]
pub trait PostStore: Send + Sync {
    /// Insert a post and return its id.
    async fn save_post(&self, post: &NewPost) -> Result<i64>;

    async fn get_post(&self, post_id: i64) -> Result<Option<Post>>;

    /// Non-archived posts, newest first.
    async fn list_active(&self, page: Page) -> Result<Vec<Post>>;

    /// Archived posts, newest first.
    async fn list_archived(&self, page: Page) -> Result<Vec<Post>>;

    /// Archive every post with `expires_at <= now` that is not archived yet,
    /// as one conditional bulk update. Returns the number of posts archived.
    async fn archive_expired(&self, now: DateTime<Utc>) -> Result<usize>;
}

/// Comment reads. Comment inserts only happen inside a [`Transaction`].
#[async_trait]
pub trait CommentStore: Send + Sync {
    /// Comments of a post, oldest first.
    async fn list_by_post(&self, post_id: i64) -> Result<Vec<Comment>>;
}

/// Explicit transaction handle.
///
/// Writes made through the handle become visible only after [`commit`].
/// Dropping the handle without committing rolls everything back.
///
/// [`commit`]: Transaction::commit
pub trait Transaction: Send {
    /// Insert a comment and return its id.
    fn insert_comment(&mut self, comment: &NewComment) -> Result<i64>;

    /// Set a post's `expires_at`. Fails with `NotFound` if the post is gone.
    fn set_post_expiry(&mut self, post_id: i64, expires_at: DateTime<Utc>) -> Result<()>;

    fn commit(self: Box<Self>) -> Result<()>;
}

/// Opens transactions.
#[async_trait]
pub trait Transactor: Send + Sync {
    async fn begin(&self) -> Result<Box<dyn Transaction>>;
}

/// Run `work` inside one transaction.
///
/// Commits when `work` returns `Ok`, rolls back on `Err`. A panic inside
/// `work` also rolls back and comes back as an error instead of unwinding
/// through the caller.
pub async fn within_transaction<T, F>(transactor: &dyn Transactor, work: F) -> Result<T>
where
    F: FnOnce(&mut dyn Transaction) -> Result<T> + Send,
{
    let mut tx = transactor.begin().await?;

    let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| work(tx.as_mut())));
    let value = match outcome {
        Ok(Ok(value)) => value,
        // tx dropped here -> rollback
        Ok(Err(e)) => return Err(e),
        Err(panic) => {
            let message = panic
                .downcast_ref::<&str>()
                .map(|s| s.to_string())
                .or_else(|| panic.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic".to_string());
            return Err(Error::TransactionPanicked(message));
        }
    };

    tx.commit()?;
    Ok(value)
}

/// Source of display identities for new sessions.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Hand out an identity, trying to keep it away from other sessions for `ttl`.
    async fn get_identity(&self, ttl: Duration) -> Result<Identity>;
}

/// Object storage for attached images.
#[async_trait]
pub trait ImageStore: Send + Sync {
    /// Upload `data` under `owner_id` and return its public URL.
    async fn upload(&self, owner_id: i64, data: Vec<u8>) -> Result<String>;

    /// Public URL of an object previously uploaded under `owner_id`.
    fn public_url(&self, owner_id: i64, code: &str) -> String;
}
