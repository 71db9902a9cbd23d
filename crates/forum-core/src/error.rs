//! Error types for forum-core.

use thiserror::Error;

/// Result type alias using forum-core Error
pub type Result<T> = std::result::Result<T, Error>;

/// Classification every error collapses into at the service boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Client-correctable input problem
    InvalidInput,
    /// Session or post absent
    NotFound,
    /// Session past its TTL
    Expired,
    /// No usable session on a protected route
    NotAuthorized,
    /// Action against an archived post
    Conflict,
    /// Storage or transport failure
    Internal,
}

/// Core error types for forum operations
#[derive(Error, Debug)]
pub enum Error {
    // Taxonomy errors
    #[error("{0}")]
    InvalidInput(String),

    #[error("{0} not found")]
    NotFound(String),

    #[error("session expired")]
    Expired,

    #[error("not authorized")]
    NotAuthorized,

    #[error("{0}")]
    Conflict(String),

    #[error("{op}: {source}")]
    Internal {
        op: String,
        #[source]
        source: Box<Error>,
    },

    // Collaborator errors
    #[error("identity provider unavailable: {0}")]
    IdentityUnavailable(String),

    #[error("image storage error: {0}")]
    ImageStorage(String),

    #[error("entropy source failure: {0}")]
    Entropy(String),

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[cfg(feature = "client")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("transaction aborted: {0}")]
    TransactionPanicked(String),
}

impl Error {
    /// Create an invalid input error
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::InvalidInput(message.into())
    }

    /// Create a not found error for the named entity
    pub fn not_found(entity: impl Into<String>) -> Self {
        Self::NotFound(entity.into())
    }

    /// Create a conflict error
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    /// Classify into the service-level taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput(_) => ErrorKind::InvalidInput,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::Expired => ErrorKind::Expired,
            Error::NotAuthorized => ErrorKind::NotAuthorized,
            Error::Conflict(_) => ErrorKind::Conflict,
            Error::Internal { .. } => ErrorKind::Internal,
            Error::IdentityUnavailable(_)
            | Error::ImageStorage(_)
            | Error::Entropy(_)
            | Error::Database(_)
            | Error::LockPoisoned
            | Error::Serialization(_)
            | Error::TransactionPanicked(_) => ErrorKind::Internal,
            #[cfg(feature = "client")]
            Error::Http(_) => ErrorKind::Internal,
        }
    }

    /// Wrap collaborator failures with the operation that hit them.
    ///
    /// Taxonomy errors pass through untouched so callers can still branch on
    /// them; everything else becomes `Internal` carrying `op` as context.
    pub fn during(self, op: impl Into<String>) -> Self {
        match self {
            Error::InvalidInput(_)
            | Error::NotFound(_)
            | Error::Expired
            | Error::NotAuthorized
            | Error::Conflict(_)
            | Error::Internal { .. } => self,
            other => Error::Internal {
                op: op.into(),
                source: Box::new(other),
            },
        }
    }

    /// Check if this error is a not found error
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if this error is a session expiry
    pub fn is_expired(&self) -> bool {
        matches!(self, Error::Expired)
    }
}
