//! Forum services.
//!
//! Each service owns its collaborators as `Arc<dyn Port>` and classifies
//! every failure into the [`ErrorKind`](crate::error::ErrorKind) taxonomy
//! before returning it.

pub mod comment;
pub mod post;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use comment::{CommentConfig, CommentDraft, CommentService};
pub use post::{PostConfig, PostDraft, PostService};
pub use session::{IssuedSession, SessionConfig, SessionService};
