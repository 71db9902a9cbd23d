//! Session gate for the forum API.
//!
//! Two middlewares, applied in this order (outermost first):
//!
//! 1. [`ensure_token`]: issues a session and cookie to visitors without one,
//!    and puts the token into the request extensions.
//! 2. [`require_valid_session`]: resolves the token to a live session and
//!    puts it into the request extensions as [`CurrentSession`].
//!
//! Handlers read both through `Extension<SessionToken>` and
//! `Extension<CurrentSession>`.

use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use forum_core::types::Session;
use forum_core::{Error, SessionToken};
use std::sync::Arc;
use tracing::{debug, warn};

use crate::error::ApiError;
use crate::state::AppState;

/// Name of the cookie carrying the plaintext session token
pub const SESSION_COOKIE: &str = "session_token";

/// The live session behind the current request
#[derive(Debug, Clone)]
pub struct CurrentSession(pub Session);

/// Issue a session to visitors arriving without a token.
pub async fn ensure_token(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = cookie_token(request.headers()) {
        request.extensions_mut().insert(token);
        return Ok(next.run(request).await);
    }

    let issued = state.sessions.store_new_session().await?;
    let cookie = session_cookie(&issued.token, issued.expires_at, state.config.secure_cookies)?;
    debug!("Issued session cookie");

    // Visible to require_valid_session on this same request
    request.extensions_mut().insert(issued.token);

    let mut response = next.run(request).await;
    response.headers_mut().append(header::SET_COOKIE, cookie);
    Ok(response)
}

/// Reject requests without a live session.
///
/// An expired session also clears the cookie, so the next request gets a
/// fresh one from [`ensure_token`]. Other failures leave the cookie alone.
pub async fn require_valid_session(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Response {
    let token = cookie_token(request.headers())
        .or_else(|| request.extensions().get::<SessionToken>().cloned());
    let Some(token) = token else {
        return ApiError::unauthorized().into_response();
    };

    match state.sessions.get_session_by_token(&token).await {
        Ok(session) => {
            request.extensions_mut().insert(CurrentSession(session));
            next.run(request).await
        }
        Err(Error::Expired) => {
            debug!("Session expired, clearing cookie");
            let mut response = ApiError::unauthorized().into_response();
            response
                .headers_mut()
                .append(header::SET_COOKIE, clear_cookie(state.config.secure_cookies));
            response
        }
        Err(e) => {
            warn!(error = %e, "Session lookup failed");
            ApiError::unauthorized().into_response()
        }
    }
}

/// Non-empty session token from the `Cookie` header(s)
pub fn cookie_token(headers: &HeaderMap) -> Option<SessionToken> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .map(|(_, value)| value.trim())
        .filter(|value| !value.is_empty())
        .map(SessionToken::from_plain)
}

fn session_cookie(
    token: &SessionToken,
    expires: DateTime<Utc>,
    secure: bool,
) -> Result<HeaderValue, ApiError> {
    let cookie = format!(
        "{}={}; Path=/; Expires={}; HttpOnly;{} SameSite=Lax",
        SESSION_COOKIE,
        token.as_str(),
        expires.format("%a, %d %b %Y %H:%M:%S GMT"),
        if secure { " Secure;" } else { "" },
    );
    HeaderValue::from_str(&cookie).map_err(|e| {
        warn!(error = %e, "Session token is not a valid header value");
        ApiError::internal()
    })
}

fn clear_cookie(secure: bool) -> HeaderValue {
    if secure {
        HeaderValue::from_static("session_token=; Path=/; Max-Age=-1; HttpOnly; Secure; SameSite=Lax")
    } else {
        HeaderValue::from_static("session_token=; Path=/; Max-Age=-1; HttpOnly; SameSite=Lax")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(cookies: &[&str]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for cookie in cookies {
            map.append(header::COOKIE, HeaderValue::from_str(cookie).unwrap());
        }
        map
    }

    #[test]
    fn test_cookie_token_found_among_others() {
        let token = cookie_token(&headers(&["theme=dark; session_token=abc123; lang=en"]));
        assert_eq!(token.unwrap().as_str(), "abc123");

        let token = cookie_token(&headers(&["theme=dark", "session_token=xyz"]));
        assert_eq!(token.unwrap().as_str(), "xyz");
    }

    #[test]
    fn test_missing_or_empty_cookie_token() {
        assert!(cookie_token(&headers(&[])).is_none());
        assert!(cookie_token(&headers(&["session_token="])).is_none());
        assert!(cookie_token(&headers(&["other_session_token=abc"])).is_none());
    }

    #[test]
    fn test_session_cookie_attributes() {
        let expires = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let cookie = session_cookie(&SessionToken::from_plain("tok"), expires, true).unwrap();
        let cookie = cookie.to_str().unwrap();

        assert!(cookie.starts_with("session_token=tok;"));
        assert!(cookie.contains("Path=/"));
        assert!(cookie.contains("Expires=Tue, 14 Nov 2023 22:13:20 GMT"));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("Secure"));
        assert!(cookie.contains("SameSite=Lax"));
    }

    #[test]
    fn test_clear_cookie_expires_immediately() {
        let cookie = clear_cookie(true);
        let cookie = cookie.to_str().unwrap();
        assert!(cookie.starts_with("session_token=;"));
        assert!(cookie.contains("Max-Age=-1"));
        assert!(!clear_cookie(false).to_str().unwrap().contains("Secure"));
    }
}
