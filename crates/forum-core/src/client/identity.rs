//! Identity provider backed by a public character API.
//!
//! Character ids are handed out from a shuffled pool. Each handed-out id is
//! reserved until the session that got it expires, so two live sessions
//! rarely share a character. Once the pool runs dry, ids are picked at
//! random, preferring lapsed reservations.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::{http_client, trim_base};
use crate::clock::Clock;
use crate::error::{Error, Result};
use crate::ports::IdentityProvider;
use crate::types::Identity;

/// Random picks tried once the free list is empty
const RANDOM_ATTEMPTS: usize = 5;

#[derive(Debug, Clone)]
pub struct IdentityPoolConfig {
    /// API root, e.g. `https://rickandmortyapi.com/api`
    pub base_url: String,
    /// Ids `1..=pool_size` are valid characters
    pub pool_size: i64,
}

impl Default for IdentityPoolConfig {
    fn default() -> Self {
        Self {
            base_url: "https://rickandmortyapi.com/api".to_string(),
            pool_size: 826,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Character {
    id: i64,
    name: String,
    image: String,
}

/// An id handed out by the pool, with the reservation it replaced
#[derive(Debug)]
struct Reservation {
    id: i64,
    previous: Option<DateTime<Utc>>,
}

#[derive(Debug)]
struct Pool {
    free: Vec<i64>,
    reserved: HashMap<i64, DateTime<Utc>>,
}

pub struct CharacterIdentityProvider {
    http: reqwest::Client,
    base_url: String,
    pool_size: i64,
    pool: Mutex<Pool>,
    clock: Arc<dyn Clock>,
}

impl CharacterIdentityProvider {
    pub fn new(config: IdentityPoolConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        if config.pool_size < 1 {
            return Err(Error::invalid_input("identity pool must not be empty"));
        }

        let mut free: Vec<i64> = (1..=config.pool_size).collect();
        free.shuffle(&mut rand::thread_rng());

        Ok(Self {
            http: http_client()?,
            base_url: trim_base(&config.base_url),
            pool_size: config.pool_size,
            pool: Mutex::new(Pool {
                free,
                reserved: HashMap::new(),
            }),
            clock,
        })
    }

    /// Pick a character id and reserve it until `now + ttl`.
    fn allocate(&self, ttl: Duration) -> Result<Reservation> {
        let now = self.clock.now();
        let until = now
            + chrono::Duration::from_std(ttl)
                .map_err(|_| Error::invalid_input("reservation ttl out of range"))?;

        let mut pool = self.pool.lock().map_err(|_| Error::LockPoisoned)?;

        if let Some(id) = pool.free.pop() {
            let previous = pool.reserved.insert(id, until);
            return Ok(Reservation { id, previous });
        }

        let mut rng = rand::thread_rng();
        for _ in 0..RANDOM_ATTEMPTS {
            let id = rng.gen_range(1..=self.pool_size);
            let lapsed = pool.reserved.get(&id).is_none_or(|held| *held <= now);
            if lapsed {
                let previous = pool.reserved.insert(id, until);
                return Ok(Reservation { id, previous });
            }
        }

        let id = rng.gen_range(1..=self.pool_size);
        warn!(character_id = id, "Identity pool exhausted, reusing a reserved character");
        let previous = pool.reserved.insert(id, until);
        Ok(Reservation { id, previous })
    }

    /// Undo [`allocate`](Self::allocate) after a failed fetch.
    ///
    /// An id taken over from another holder gets that holder's reservation
    /// back; a free id goes back to the free list.
    fn release(&self, reservation: Reservation) {
        let Ok(mut pool) = self.pool.lock() else {
            return;
        };
        match reservation.previous {
            Some(until) => {
                pool.reserved.insert(reservation.id, until);
            }
            None => {
                if pool.reserved.remove(&reservation.id).is_some() {
                    pool.free.push(reservation.id);
                }
            }
        }
    }

    /// Move every lapsed reservation back to the free list.
    pub fn reclaim_expired(&self) -> Result<usize> {
        let now = self.clock.now();
        let mut pool = self.pool.lock().map_err(|_| Error::LockPoisoned)?;

        let lapsed: Vec<i64> = pool
            .reserved
            .iter()
            .filter(|(_, until)| **until <= now)
            .map(|(id, _)| *id)
            .collect();
        for id in &lapsed {
            pool.reserved.remove(id);
            pool.free.push(*id);
        }
        Ok(lapsed.len())
    }

    /// Run [`reclaim_expired`](Self::reclaim_expired) every `interval` until
    /// `cancel` fires.
    pub fn spawn_reclaimer(
        self: Arc<Self>,
        interval: Duration,
        cancel: CancellationToken,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            // The first tick completes immediately
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = cancel.cancelled() => {
                        debug!("Identity reclaimer stopping");
                        break;
                    }
                    _ = ticker.tick() => {
                        match self.reclaim_expired() {
                            Ok(0) => {}
                            Ok(n) => info!(reclaimed = n, "Reclaimed lapsed identities"),
                            Err(e) => warn!(error = %e, "Identity reclaim failed"),
                        }
                    }
                }
            }
        })
    }

    async fn fetch(&self, id: i64) -> Result<Identity> {
        let url = format!("{}/character/{}", self.base_url, id);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::IdentityUnavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::IdentityUnavailable(format!(
                "character {} returned {}",
                id, status
            )));
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::IdentityUnavailable(e.to_string()))?;
        let character: Character = serde_json::from_slice(&body)?;

        Ok(Identity {
            id: character.id,
            name: character.name,
            avatar_url: character.image,
        })
    }
}

#[async_trait]
impl IdentityProvider for CharacterIdentityProvider {
    async fn get_identity(&self, ttl: Duration) -> Result<Identity> {
        let reservation = self.allocate(ttl)?;
        let id = reservation.id;
        match self.fetch(id).await {
            Ok(identity) => {
                debug!(character_id = id, name = %identity.name, "Identity allocated");
                Ok(identity)
            }
            Err(e) => {
                self.release(reservation);
                Err(e)
            }
        }
    }
}
