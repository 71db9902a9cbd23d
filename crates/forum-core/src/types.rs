//! Domain types shared between the store, the services and the server.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::auth::TokenHash;

// ─────────────────────────────────────────────────────────────────────────────
// Identity
// ─────────────────────────────────────────────────────────────────────────────

/// Display identity handed out by the identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    /// Provider-side id (used for reservation bookkeeping only)
    pub id: i64,
    pub name: String,
    pub avatar_url: String,
}

/// Identity snapshot copied onto posts and comments at creation time.
///
/// Not a live reference: later name changes do not show up on older content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    pub session_id: i64,
    pub name: String,
    pub avatar_url: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Session
// ─────────────────────────────────────────────────────────────────────────────

/// Server-side record for an anonymous visitor, keyed by token hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub id: i64,
    pub token_hash: TokenHash,
    pub identity: Identity,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    /// Live iff `now < expires_at`. Always evaluated, never cached.
    pub fn is_live_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }

    /// Snapshot the current identity for authored content.
    pub fn author(&self) -> Author {
        Author {
            session_id: self.id,
            name: self.identity.name.clone(),
            avatar_url: self.identity.avatar_url.clone(),
        }
    }
}

/// Input for persisting a new session
#[derive(Debug, Clone)]
pub struct NewSession {
    pub token_hash: TokenHash,
    pub identity: Identity,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

// ─────────────────────────────────────────────────────────────────────────────
// Posts
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: i64,
    pub author: Author,
    pub title: String,
    pub content: String,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub is_archived: bool,
}

/// Input for creating a post
#[derive(Debug, Clone)]
pub struct NewPost {
    pub author: Author,
    pub title: String,
    pub content: String,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// 1-based page request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: u32,
    pub size: u32,
}

impl Page {
    pub const DEFAULT_SIZE: u32 = 10;

    pub fn new(number: u32) -> Self {
        Self {
            number: number.max(1),
            size: Self::DEFAULT_SIZE,
        }
    }

    /// Rows to skip. Saturates instead of overflowing for huge page numbers.
    pub fn offset(&self) -> i64 {
        i64::from(self.number.saturating_sub(1)).saturating_mul(i64::from(self.size))
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(1)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Comments
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    pub id: i64,
    pub post_id: i64,
    pub parent_comment_id: Option<i64>,
    pub author: Author,
    pub content: String,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for creating a comment
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i64,
    pub parent_comment_id: Option<i64>,
    pub author: Author,
    pub content: String,
    pub image_path: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A comment with its replies.
#[derive(Debug, Clone, Serialize)]
pub struct CommentNode {
    #[serde(flatten)]
    pub comment: Comment,
    pub replies: Vec<CommentNode>,
}

/// Nest comments under their parents.
///
/// A reply is attached only to a parent that precedes it in creation order;
/// any other parent reference (missing, later, or from another post) puts the
/// comment at the top level. Sibling order follows creation time, then id.
pub fn build_thread(mut comments: Vec<Comment>) -> Vec<CommentNode> {
    comments.sort_by_key(|c| (c.created_at, c.id));

    let mut seen = HashSet::new();
    let mut children: HashMap<Option<i64>, Vec<Comment>> = HashMap::new();
    for comment in comments {
        let parent = comment.parent_comment_id.filter(|p| seen.contains(p));
        seen.insert(comment.id);
        children.entry(parent).or_default().push(comment);
    }

    fn attach(
        parent: Option<i64>,
        children: &mut HashMap<Option<i64>, Vec<Comment>>,
    ) -> Vec<CommentNode> {
        let level = children.remove(&parent).unwrap_or_default();
        level
            .into_iter()
            .map(|comment| {
                let replies = attach(Some(comment.id), children);
                CommentNode { comment, replies }
            })
            .collect()
    }

    attach(None, &mut children)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(0, 0).unwrap()
    }

    fn author() -> Author {
        Author {
            session_id: 1,
            name: "Rick Sanchez".into(),
            avatar_url: "https://example.test/1.jpeg".into(),
        }
    }

    fn comment(id: i64, parent: Option<i64>, minute: i64) -> Comment {
        Comment {
            id,
            post_id: 1,
            parent_comment_id: parent,
            author: author(),
            content: format!("comment {}", id),
            image_path: None,
            created_at: epoch() + Duration::minutes(minute),
        }
    }

    #[test]
    fn test_session_liveness_boundary() {
        let created = epoch();
        let session = Session {
            id: 1,
            token_hash: TokenHash::from_stored("ab"),
            identity: Identity {
                id: 1,
                name: "Morty".into(),
                avatar_url: String::new(),
            },
            created_at: created,
            expires_at: created + Duration::seconds(60),
        };
        assert!(session.is_live_at(created + Duration::milliseconds(59_999)));
        assert!(!session.is_live_at(created + Duration::seconds(60)));
        assert!(!session.is_live_at(created + Duration::milliseconds(60_001)));
    }

    #[test]
    fn test_page_offset() {
        assert_eq!(Page::new(1).offset(), 0);
        assert_eq!(Page::new(3).offset(), 20);
        assert_eq!(Page::new(0), Page::new(1));
        assert_eq!(Page::new(u32::MAX).offset(), 42_949_672_940);
        let wide = Page {
            number: u32::MAX,
            size: u32::MAX,
        };
        assert_eq!(wide.offset(), i64::MAX);
    }

    #[test]
    fn test_build_thread_nests_replies() {
        let comments = vec![
            comment(3, Some(1), 3),
            comment(1, None, 1),
            comment(2, None, 2),
            comment(4, Some(3), 4),
        ];

        let thread = build_thread(comments);
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[0].comment.id, 1);
        assert_eq!(thread[0].replies[0].comment.id, 3);
        assert_eq!(thread[0].replies[0].replies[0].comment.id, 4);
        assert_eq!(thread[1].comment.id, 2);
        assert!(thread[1].replies.is_empty());
    }

    #[test]
    fn test_build_thread_orphans_go_to_top_level() {
        let comments = vec![comment(1, None, 1), comment(2, Some(99), 2)];
        let thread = build_thread(comments);
        assert_eq!(thread.len(), 2);
        assert_eq!(thread[1].comment.id, 2);
    }

    #[test]
    fn test_build_thread_forward_reference_does_not_drop_comments() {
        // 5 points at 6 before 6 existed, 6 points back at 5
        let comments = vec![comment(5, Some(6), 1), comment(6, Some(5), 2)];
        let thread = build_thread(comments);
        assert_eq!(thread.len(), 1);
        assert_eq!(thread[0].comment.id, 5);
        assert_eq!(thread[0].replies[0].comment.id, 6);
    }
}
