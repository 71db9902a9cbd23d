//! SQLite-backed stores for the forum.
//!
//! One [`Database`] implements every storage port: sessions, posts, comments
//! and the transactor. The connection sits behind an async mutex, so every
//! operation (and every open transaction) has exclusive use of it.
//!
//! Timestamps are stored as UTC milliseconds.

pub mod migrations;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use crate::auth::TokenHash;
use crate::error::{Error, Result};
use crate::ports::{
    CommentStore, PostStore, SessionStore, SessionUpdate, Transaction, Transactor,
};
use crate::types::{
    Author, Comment, Identity, NewComment, NewPost, NewSession, Page, Post, Session,
};

const SESSION_COLUMNS: &str =
    "id, token_hash, identity_id, name, avatar_url, created_at, expires_at";

const POST_COLUMNS: &str = "id, author_session_id, author_name, author_avatar_url, title, content,
     image_path, created_at, expires_at, is_archived";

const COMMENT_COLUMNS: &str = "id, post_id, parent_comment_id, author_session_id, author_name,
     author_avatar_url, content, image_path, created_at";

/// Database connection wrapper.
///
/// Cheap to clone; clones share the same connection.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open database at specific path, creating and migrating it if needed
    pub fn open_path(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init(conn)
    }

    /// Open a private in-memory database (tests, ephemeral runs)
    pub fn open_in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Check database connectivity
    pub async fn ping(&self) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch("SELECT 1")?;
        Ok(())
    }

    fn map_session(row: &rusqlite::Row) -> rusqlite::Result<Session> {
        Ok(Session {
            id: row.get(0)?,
            token_hash: TokenHash::from_stored(row.get::<_, String>(1)?),
            identity: Identity {
                id: row.get(2)?,
                name: row.get(3)?,
                avatar_url: row.get(4)?,
            },
            created_at: from_millis(row, 5)?,
            expires_at: from_millis(row, 6)?,
        })
    }

    fn map_post(row: &rusqlite::Row) -> rusqlite::Result<Post> {
        Ok(Post {
            id: row.get(0)?,
            author: Author {
                session_id: row.get(1)?,
                name: row.get(2)?,
                avatar_url: row.get(3)?,
            },
            title: row.get(4)?,
            content: row.get(5)?,
            image_path: row.get(6)?,
            created_at: from_millis(row, 7)?,
            expires_at: from_millis(row, 8)?,
            is_archived: row.get(9)?,
        })
    }

    fn map_comment(row: &rusqlite::Row) -> rusqlite::Result<Comment> {
        Ok(Comment {
            id: row.get(0)?,
            post_id: row.get(1)?,
            parent_comment_id: row.get(2)?,
            author: Author {
                session_id: row.get(3)?,
                name: row.get(4)?,
                avatar_url: row.get(5)?,
            },
            content: row.get(6)?,
            image_path: row.get(7)?,
            created_at: from_millis(row, 8)?,
        })
    }

    fn list_posts(conn: &Connection, archived: bool, page: Page) -> Result<Vec<Post>> {
        let mut stmt = conn.prepare(&format!(
            "SELECT {POST_COLUMNS}
             FROM forum_post
             WHERE is_archived = ?1
             ORDER BY created_at DESC, id DESC
             LIMIT ?2 OFFSET ?3"
        ))?;
        let posts = stmt
            .query_map(params![archived, page.size, page.offset()], Self::map_post)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(posts)
    }
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(idx)?;
    DateTime::from_timestamp_millis(millis)
        .ok_or(rusqlite::Error::IntegralValueOutOfRange(idx, millis))
}

// ─────────────────────────────────────────────────────────────────────────────
// Session Operations
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl SessionStore for Database {
    async fn store(&self, session: &NewSession) -> Result<i64> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO forum_session
             (token_hash, identity_id, name, avatar_url, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                session.token_hash.as_str(),
                session.identity.id,
                session.identity.name,
                session.identity.avatar_url,
                to_millis(session.created_at),
                to_millis(session.expires_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn get_by_token(&self, hash: &TokenHash) -> Result<Option<Session>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {SESSION_COLUMNS} FROM forum_session WHERE token_hash = ?1"
        ))?;
        Ok(stmt
            .query_row(params![hash.as_str()], Self::map_session)
            .optional()?)
    }

    async fn update_by_token(&self, hash: &TokenHash, update: SessionUpdate) -> Result<()> {
        let mut conn = self.conn.lock().await;
        // IMMEDIATE takes the write lock up front: SQLite's "select for update"
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let mut session = tx
            .query_row(
                &format!("SELECT {SESSION_COLUMNS} FROM forum_session WHERE token_hash = ?1"),
                params![hash.as_str()],
                Self::map_session,
            )
            .optional()?
            .ok_or_else(|| Error::not_found("session"))?;

        if !update(&mut session)? {
            return Ok(());
        }

        // Identity fields only; expiry is fixed at creation.
        tx.execute(
            "UPDATE forum_session SET identity_id = ?1, name = ?2, avatar_url = ?3 WHERE id = ?4",
            params![
                session.identity.id,
                session.identity.name,
                session.identity.avatar_url,
                session.id,
            ],
        )?;
        tx.commit()?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Post Operations
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl PostStore for Database {
    async fn save_post(&self, post: &NewPost) -> Result<i64> {
        let conn = self.conn.lock().await;
        conn.execute(
            "INSERT INTO forum_post
             (author_session_id, author_name, author_avatar_url, title, content,
              image_path, created_at, expires_at, is_archived)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 0)",
            params![
                post.author.session_id,
                post.author.name,
                post.author.avatar_url,
                post.title,
                post.content,
                post.image_path,
                to_millis(post.created_at),
                to_millis(post.expires_at),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    async fn get_post(&self, post_id: i64) -> Result<Option<Post>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {POST_COLUMNS} FROM forum_post WHERE id = ?1"
        ))?;
        Ok(stmt.query_row(params![post_id], Self::map_post).optional()?)
    }

    async fn list_active(&self, page: Page) -> Result<Vec<Post>> {
        let conn = self.conn.lock().await;
        Self::list_posts(&conn, false, page)
    }

    async fn list_archived(&self, page: Page) -> Result<Vec<Post>> {
        let conn = self.conn.lock().await;
        Self::list_posts(&conn, true, page)
    }

    async fn archive_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        let conn = self.conn.lock().await;
        let archived = conn.execute(
            "UPDATE forum_post SET is_archived = 1 WHERE is_archived = 0 AND expires_at <= ?1",
            params![to_millis(now)],
        )?;
        Ok(archived)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Comment Operations
// ─────────────────────────────────────────────────────────────────────────────

#[async_trait]
impl CommentStore for Database {
    async fn list_by_post(&self, post_id: i64) -> Result<Vec<Comment>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!(
            "SELECT {COMMENT_COLUMNS}
             FROM forum_comment
             WHERE post_id = ?1
             ORDER BY created_at ASC, id ASC"
        ))?;
        let comments = stmt
            .query_map(params![post_id], Self::map_comment)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(comments)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Transactions
// ─────────────────────────────────────────────────────────────────────────────

/// Open SQLite transaction holding the connection until commit or drop.
struct SqliteTransaction {
    conn: OwnedMutexGuard<Connection>,
    finished: bool,
}

impl Transaction for SqliteTransaction {
    fn insert_comment(&mut self, comment: &NewComment) -> Result<i64> {
        self.conn.execute(
            "INSERT INTO forum_comment
             (post_id, parent_comment_id, author_session_id, author_name,
              author_avatar_url, content, image_path, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                comment.post_id,
                comment.parent_comment_id,
                comment.author.session_id,
                comment.author.name,
                comment.author.avatar_url,
                comment.content,
                comment.image_path,
                to_millis(comment.created_at),
            ],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn set_post_expiry(&mut self, post_id: i64, expires_at: DateTime<Utc>) -> Result<()> {
        let updated = self.conn.execute(
            "UPDATE forum_post SET expires_at = ?1 WHERE id = ?2",
            params![to_millis(expires_at), post_id],
        )?;
        if updated == 0 {
            return Err(Error::not_found("post"));
        }
        Ok(())
    }

    fn commit(mut self: Box<Self>) -> Result<()> {
        self.conn.execute_batch("COMMIT")?;
        self.finished = true;
        Ok(())
    }
}

impl Drop for SqliteTransaction {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        match self.conn.execute_batch("ROLLBACK") {
            Ok(()) => debug!("Transaction rolled back"),
            Err(e) => warn!(error = %e, "Rollback failed"),
        }
    }
}

#[async_trait]
impl Transactor for Database {
    async fn begin(&self) -> Result<Box<dyn Transaction>> {
        let conn = Arc::clone(&self.conn).lock_owned().await;
        conn.execute_batch("BEGIN IMMEDIATE")?;
        Ok(Box::new(SqliteTransaction {
            conn,
            finished: false,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ports::within_transaction;
    use chrono::Duration;

    fn at(minutes: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap() + Duration::minutes(minutes)
    }

    fn author() -> Author {
        Author {
            session_id: 7,
            name: "Birdperson".into(),
            avatar_url: "https://example.test/47.jpeg".into(),
        }
    }

    fn new_session(hash: &str) -> NewSession {
        NewSession {
            token_hash: TokenHash::from_stored(hash),
            identity: Identity {
                id: 47,
                name: "Birdperson".into(),
                avatar_url: "https://example.test/47.jpeg".into(),
            },
            created_at: at(0),
            expires_at: at(60),
        }
    }

    fn new_post(title: &str, created: i64, expires: i64) -> NewPost {
        NewPost {
            author: author(),
            title: title.into(),
            content: "content".into(),
            image_path: None,
            created_at: at(created),
            expires_at: at(expires),
        }
    }

    fn new_comment(post_id: i64, content: &str, minute: i64) -> NewComment {
        NewComment {
            post_id,
            parent_comment_id: None,
            author: author(),
            content: content.into(),
            image_path: None,
            created_at: at(minute),
        }
    }

    #[tokio::test]
    async fn test_store_and_get_session() {
        let db = Database::open_in_memory().unwrap();
        let id = db.store(&new_session("hash-1")).await.unwrap();

        let session = db
            .get_by_token(&TokenHash::from_stored("hash-1"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(session.id, id);
        assert_eq!(session.identity.name, "Birdperson");
        assert_eq!(session.created_at, at(0));
        assert_eq!(session.expires_at, at(60));

        let missing = db
            .get_by_token(&TokenHash::from_stored("other"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_token_hash_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.store(&new_session("hash-1")).await.unwrap();
        assert!(db.store(&new_session("hash-1")).await.is_err());
    }

    #[tokio::test]
    async fn test_update_by_token_writes_identity_only() {
        let db = Database::open_in_memory().unwrap();
        db.store(&new_session("hash-1")).await.unwrap();
        let hash = TokenHash::from_stored("hash-1");

        db.update_by_token(
            &hash,
            Box::new(|session| {
                session.identity.name = "Squanchy".into();
                session.expires_at = session.expires_at + Duration::days(1);
                Ok(true)
            }),
        )
        .await
        .unwrap();

        let session = db.get_by_token(&hash).await.unwrap().unwrap();
        assert_eq!(session.identity.name, "Squanchy");
        assert_eq!(session.expires_at, at(60));
    }

    #[tokio::test]
    async fn test_update_by_token_skips_write_when_unchanged() {
        let db = Database::open_in_memory().unwrap();
        db.store(&new_session("hash-1")).await.unwrap();
        let hash = TokenHash::from_stored("hash-1");

        db.update_by_token(
            &hash,
            Box::new(|session| {
                session.identity.name = "not persisted".into();
                Ok(false)
            }),
        )
        .await
        .unwrap();

        let session = db.get_by_token(&hash).await.unwrap().unwrap();
        assert_eq!(session.identity.name, "Birdperson");
    }

    #[tokio::test]
    async fn test_update_by_token_missing_session() {
        let db = Database::open_in_memory().unwrap();
        let err = db
            .update_by_token(&TokenHash::from_stored("nope"), Box::new(|_| Ok(true)))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_update_by_token_propagates_callback_error() {
        let db = Database::open_in_memory().unwrap();
        db.store(&new_session("hash-1")).await.unwrap();
        let err = db
            .update_by_token(
                &TokenHash::from_stored("hash-1"),
                Box::new(|_| Err(Error::invalid_input("no fields changed"))),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_list_active_and_archived() {
        let db = Database::open_in_memory().unwrap();
        let first = db.save_post(&new_post("first", 0, 10)).await.unwrap();
        let second = db.save_post(&new_post("second", 1, 100)).await.unwrap();

        let active = db.list_active(Page::default()).await.unwrap();
        assert_eq!(
            active.iter().map(|p| p.id).collect::<Vec<_>>(),
            vec![second, first]
        );

        assert_eq!(db.archive_expired(at(10)).await.unwrap(), 1);

        let active = db.list_active(Page::default()).await.unwrap();
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, second);

        let archived = db.list_archived(Page::default()).await.unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].id, first);
        assert!(archived[0].is_archived);
    }

    #[tokio::test]
    async fn test_list_active_pagination() {
        let db = Database::open_in_memory().unwrap();
        for i in 0..12 {
            db.save_post(&new_post(&format!("post {}", i), i, 100))
                .await
                .unwrap();
        }
        assert_eq!(db.list_active(Page::new(1)).await.unwrap().len(), 10);
        let second = db.list_active(Page::new(2)).await.unwrap();
        assert_eq!(second.len(), 2);
        assert_eq!(second[1].title, "post 0");
    }

    #[tokio::test]
    async fn test_archive_expired_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        db.save_post(&new_post("old", 0, 10)).await.unwrap();

        assert_eq!(db.archive_expired(at(20)).await.unwrap(), 1);
        assert_eq!(db.archive_expired(at(20)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_archive_expired_boundary_is_inclusive() {
        let db = Database::open_in_memory().unwrap();
        let id = db.save_post(&new_post("edge", 0, 10)).await.unwrap();

        assert_eq!(
            db.archive_expired(at(10) - Duration::milliseconds(1))
                .await
                .unwrap(),
            0
        );
        assert_eq!(db.archive_expired(at(10)).await.unwrap(), 1);
        assert!(db.get_post(id).await.unwrap().unwrap().is_archived);
    }

    #[tokio::test]
    async fn test_transaction_commits_both_writes() {
        let db = Database::open_in_memory().unwrap();
        let post_id = db.save_post(&new_post("thread", 0, 10)).await.unwrap();

        let comment_id = within_transaction(&db, |tx| {
            let id = tx.insert_comment(&new_comment(post_id, "hello", 1))?;
            tx.set_post_expiry(post_id, at(16))?;
            Ok(id)
        })
        .await
        .unwrap();

        let comments = db.list_by_post(post_id).await.unwrap();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].id, comment_id);
        assert_eq!(db.get_post(post_id).await.unwrap().unwrap().expires_at, at(16));
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_error() {
        let db = Database::open_in_memory().unwrap();
        let post_id = db.save_post(&new_post("thread", 0, 10)).await.unwrap();

        let result: Result<i64> = within_transaction(&db, |tx| {
            tx.insert_comment(&new_comment(post_id, "hello", 1))?;
            tx.set_post_expiry(post_id + 100, at(16))?;
            Ok(0)
        })
        .await;

        assert!(result.unwrap_err().is_not_found());
        assert!(db.list_by_post(post_id).await.unwrap().is_empty());
        // The connection is usable again after rollback
        db.ping().await.unwrap();
    }

    #[tokio::test]
    async fn test_transaction_rolls_back_on_panic() {
        let db = Database::open_in_memory().unwrap();
        let post_id = db.save_post(&new_post("thread", 0, 10)).await.unwrap();

        let result: Result<i64> = within_transaction(&db, |tx| {
            tx.insert_comment(&new_comment(post_id, "hello", 1))?;
            panic!("boom");
        })
        .await;

        assert!(matches!(result, Err(Error::TransactionPanicked(msg)) if msg == "boom"));
        assert!(db.list_by_post(post_id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_comments_listed_oldest_first() {
        let db = Database::open_in_memory().unwrap();
        let post_id = db.save_post(&new_post("thread", 0, 10)).await.unwrap();
        let other = db.save_post(&new_post("other", 0, 10)).await.unwrap();

        within_transaction(&db, |tx| {
            tx.insert_comment(&new_comment(post_id, "second", 2))?;
            tx.insert_comment(&new_comment(post_id, "first", 1))?;
            tx.insert_comment(&new_comment(other, "elsewhere", 1))?;
            Ok(())
        })
        .await
        .unwrap();

        let contents: Vec<String> = db
            .list_by_post(post_id)
            .await
            .unwrap()
            .into_iter()
            .map(|c| c.content)
            .collect();
        assert_eq!(contents, vec!["first", "second"]);
    }
}
