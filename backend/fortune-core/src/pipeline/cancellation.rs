//! At most one live in-flight entry per [`RequestKey`].
//!
//! Registering a key that is already in flight cancels the older entry. Each
//! entry carries a generation number so that a superseded request finishing
//! late cannot remove its replacement.

use crate::request::RequestKey;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError};

use log::trace;
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Entry {
    generation: u64,
    token: CancellationToken,
}

#[derive(Debug, Default)]
pub struct CancellationRegistry {
    entries: Mutex<HashMap<RequestKey, Entry>>,
    next_generation: AtomicU64,
}

impl CancellationRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Cancel any in-flight request for `key` and register a new one.
    ///
    /// The returned guard releases the entry when dropped.
    pub fn register_and_supersede(&self, key: RequestKey) -> InFlightGuard<'_> {
        let generation = self.next_generation.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        let previous = {
            let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
            entries.insert(
                key.clone(),
                Entry {
                    generation,
                    token: token.clone(),
                },
            )
        };

        let superseded = match previous {
            Some(entry) => {
                trace!("Superseding in-flight request {key}");
                entry.token.cancel();
                true
            }
            None => false,
        };

        InFlightGuard {
            registry: self,
            key,
            generation,
            token,
            superseded,
        }
    }

    /// Remove the entry for `key` if it still belongs to `generation`.
    pub fn release(&self, key: &RequestKey, generation: u64) -> bool {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        match entries.get(key) {
            Some(entry) if entry.generation == generation => {
                entries.remove(key);
                true
            }
            _ => false,
        }
    }

    /// Cancel and remove the in-flight request for `key`, if any.
    pub fn cancel(&self, key: &RequestKey) -> bool {
        let removed = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        match removed {
            Some(entry) => {
                entry.token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn cancel_all(&self) {
        let drained: Vec<Entry> = self
            .entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .drain()
            .map(|(_, entry)| entry)
            .collect();
        for entry in drained {
            entry.token.cancel();
        }
    }

    pub fn contains(&self, key: &RequestKey) -> bool {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(key)
    }

    pub fn in_flight(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

/// Live registration of one request. Dropping it releases the entry.
#[derive(Debug)]
pub struct InFlightGuard<'a> {
    registry: &'a CancellationRegistry,
    key: RequestKey,
    generation: u64,
    token: CancellationToken,
    superseded: bool,
}

impl InFlightGuard<'_> {
    pub fn key(&self) -> &RequestKey {
        &self.key
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }

    pub fn is_cancelled(&self) -> bool {
        self.token.is_cancelled()
    }

    /// Registering this guard cancelled an older request.
    pub fn superseded_previous(&self) -> bool {
        self.superseded
    }
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.registry.release(&self.key, self.generation);
    }
}
