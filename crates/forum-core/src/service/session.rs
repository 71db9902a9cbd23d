//! Session lifecycle: issue, resolve and rename anonymous sessions.

use chrono::{DateTime, Duration, Utc};
use std::sync::Arc;
use tracing::{debug, info};

use crate::auth::SessionToken;
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::ports::{IdentityProvider, SessionStore};
use crate::types::{NewSession, Session};

/// Session service configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Lifetime of a session, fixed at creation
    pub ttl: Duration,
    /// Display name bounds, in characters (inclusive)
    pub min_name_len: usize,
    pub max_name_len: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::days(7),
            min_name_len: 3,
            max_name_len: 16,
        }
    }
}

/// A freshly created session as handed to the client
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// Plaintext bearer token, never stored
    pub token: SessionToken,
    /// Same instant as the stored `expires_at`
    pub expires_at: DateTime<Utc>,
}

pub struct SessionService {
    store: Arc<dyn SessionStore>,
    identity: Arc<dyn IdentityProvider>,
    clock: Arc<dyn Clock>,
    config: SessionConfig,
}

impl SessionService {
    pub fn new(
        store: Arc<dyn SessionStore>,
        identity: Arc<dyn IdentityProvider>,
        clock: Arc<dyn Clock>,
        config: SessionConfig,
    ) -> Self {
        Self {
            store,
            identity,
            clock,
            config,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Create a session with a fresh identity and return its plaintext token
    /// together with its expiry.
    ///
    /// The token is never stored; only its hash is.
    pub async fn store_new_session(&self) -> Result<IssuedSession> {
        let reservation = self
            .config
            .ttl
            .to_std()
            .map_err(|_| Error::invalid_input("session ttl must be positive"))?;

        let identity = self
            .identity
            .get_identity(reservation)
            .await
            .map_err(|e| match e {
                Error::IdentityUnavailable(_) => e,
                other => Error::IdentityUnavailable(other.to_string()),
            })?;

        let token = SessionToken::generate()?;
        let now = self.clock.now();
        let session = NewSession {
            token_hash: token.hash(),
            identity,
            created_at: now,
            expires_at: now + self.config.ttl,
        };

        let id = self
            .store
            .store(&session)
            .await
            .map_err(|e| e.during("store session"))?;

        info!(
            session_id = id,
            token = %session.token_hash,
            name = %session.identity.name,
            "Session created"
        );
        Ok(IssuedSession {
            token,
            expires_at: session.expires_at,
        })
    }

    /// Resolve a plaintext token to its live session.
    ///
    /// `NotFound` if no session matches, `Expired` once `now >= expires_at`.
    /// Expired rows are left in place.
    pub async fn get_session_by_token(&self, token: &SessionToken) -> Result<Session> {
        if token.is_empty() {
            return Err(Error::not_found("session"));
        }

        let hash = token.hash();
        let session = self
            .store
            .get_by_token(&hash)
            .await
            .map_err(|e| e.during("get session"))?
            .ok_or_else(|| Error::not_found("session"))?;

        if !session.is_live_at(self.clock.now()) {
            debug!(token = %hash, "Session expired");
            return Err(Error::Expired);
        }
        Ok(session)
    }

    /// Change the display name of the session behind `token`.
    ///
    /// The row is held exclusively for the read-modify-write. Setting the
    /// name it already has is rejected with `InvalidInput`.
    pub async fn update_identity(&self, token: &SessionToken, new_name: &str) -> Result<()> {
        let len = new_name.chars().count();
        if len < self.config.min_name_len || len > self.config.max_name_len {
            return Err(Error::invalid_input(format!(
                "name must be between {} and {} characters",
                self.config.min_name_len, self.config.max_name_len
            )));
        }

        let now = self.clock.now();
        let name = new_name.to_string();
        let hash = token.hash();

        self.store
            .update_by_token(
                &hash,
                Box::new(move |session| {
                    if !session.is_live_at(now) {
                        return Err(Error::Expired);
                    }
                    if session.identity.name == name {
                        return Err(Error::invalid_input("no fields changed"));
                    }
                    session.identity.name = name;
                    Ok(true)
                }),
            )
            .await
            .map_err(|e| e.during("update identity"))?;

        info!(token = %hash, name = new_name, "Identity updated");
        Ok(())
    }
}
