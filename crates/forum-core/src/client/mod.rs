//! HTTP clients for the forum's external collaborators.
//!
//! - [`CharacterIdentityProvider`]: display identities from a character API
//! - [`HttpImageStore`]: bucketed object storage for attached images

mod identity;
mod image;

pub use identity::{CharacterIdentityProvider, IdentityPoolConfig};
pub use image::HttpImageStore;

use std::time::Duration;

use crate::error::Result;

/// Default timeout for collaborator calls
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

fn http_client() -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(DEFAULT_TIMEOUT).build()?)
}

fn trim_base(url: &str) -> String {
    url.trim_end_matches('/').to_string()
}
