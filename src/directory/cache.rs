//-
// Copyright (c) 2026, Jason Lingle
//
// This file is part of Nested Mailmap.
//
// Nested Mailmap is free software: you can redistribute it and/or modify it
// under the terms of the GNU General Public License as published by the Free
// Software Foundation, either version 3 of the License, or (at your option)
// any later version.
//
// Nested Mailmap is distributed in the hope that it will be useful, but
// WITHOUT ANY WARRANTY; without even the implied warranty of MERCHANTABILITY
// or FITNESS FOR A PARTICULAR PURPOSE. See the GNU General Public License for
// more details.
//
// You should have received a copy of the GNU General Public License along with
// Nested Mailmap. If not, see <http://www.gnu.org/licenses/>.

//! Cache-aside wrapper for place directories.
//!
//! Lookup results are stored in a `Cache` as CBOR. Negative results are
//! cached too, since most lookups postfix makes during a spam run are for
//! places that do not exist.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use log::{debug, warn};

use super::{PlaceDirectory, PlaceRecord};
use crate::support::error::Error;

/// A byte-oriented key-value cache with per-entry expiry.
pub trait Cache: Send + Sync {
    fn get(&self, key: &str) -> Option<Vec<u8>>;
    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration);
    fn del(&self, key: &str);
}

const MAX_MEMORY_CACHE_ENTRIES: usize = 65536;

/// An in-process `Cache`.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, (Instant, Vec<u8>)>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Cache for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let mut entries = self.entries.lock().unwrap();
        match entries.get(key) {
            Some(&(expiry, ref value)) if expiry > Instant::now() => {
                Some(value.clone())
            }
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) {
        let now = Instant::now();
        let mut entries = self.entries.lock().unwrap();
        if entries.len() >= MAX_MEMORY_CACHE_ENTRIES {
            entries.retain(|_, &mut (expiry, _)| expiry > now);
        }

        if entries.len() >= MAX_MEMORY_CACHE_ENTRIES {
            debug!("Place cache full, not caching '{}'", key);
            return;
        }

        entries.insert(key.to_owned(), (now + ttl, value));
    }

    fn del(&self, key: &str) {
        self.entries.lock().unwrap().remove(key);
    }
}

pub struct CachedDirectory<D> {
    inner: D,
    cache: Arc<dyn Cache>,
    ttl: Duration,
}

impl<D: PlaceDirectory> CachedDirectory<D> {
    pub fn new(inner: D, cache: Arc<dyn Cache>, ttl: Duration) -> Self {
        CachedDirectory { inner, cache, ttl }
    }
}

impl<D: PlaceDirectory> PlaceDirectory for CachedDirectory<D> {
    fn lookup(&self, place_id: &str) -> Result<Option<PlaceRecord>, Error> {
        // The inner directory must see the same identifier the entry is
        // stored under
        let place_id = place_id.to_lowercase();
        let key = format!("place:{}", place_id);

        if let Some(data) = self.cache.get(&key) {
            match serde_cbor::from_slice::<Option<PlaceRecord>>(&data) {
                Ok(place) => return Ok(place),
                Err(e) => {
                    warn!("Discarding corrupt cache entry '{}': {}", key, e);
                    self.cache.del(&key);
                }
            }
        }

        let place = self.inner.lookup(&place_id)?;
        match serde_cbor::to_vec(&place) {
            Ok(data) => self.cache.set(&key, data, self.ttl),
            Err(e) => warn!("Failed to encode cache entry '{}': {}", key, e),
        }

        Ok(place)
    }
}
