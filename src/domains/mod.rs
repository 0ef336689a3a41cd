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

//! The set of domains a multi-tenant instance is authoritative for.
//!
//! Connection workers only ever read the set. A background thread refreshes
//! it from a `DomainSource` on a fixed interval and swaps the whole set in
//! under the write lock.

use std::collections::HashSet;
use std::io;
use std::sync::{Arc, RwLock};
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError};
use log::{info, warn};

use crate::support::error::Error;

mod source;

pub use self::source::{DomainFile, DomainSource, StaticDomains, UnionSource};

#[derive(Debug, Default)]
pub struct DomainRegistry {
    domains: RwLock<HashSet<String>>,
}

impl DomainRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn contains(&self, domain: &str) -> bool {
        self.domains
            .read()
            .unwrap()
            .contains(&domain.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.domains.read().unwrap().len()
    }

    /// Replace the whole set, returning how many domains were added and
    /// removed.
    pub fn replace(&self, domains: HashSet<String>) -> (usize, usize) {
        let mut current = self.domains.write().unwrap();
        let added = domains.difference(&current).count();
        let removed = current.difference(&domains).count();
        *current = domains;
        (added, removed)
    }

    /// Load the current domain set from `source`.
    ///
    /// On failure, the existing set is left untouched.
    pub fn refresh_from(&self, source: &dyn DomainSource) -> Result<(), Error> {
        let domains = source
            .domains()?
            .into_iter()
            .map(|d| d.to_lowercase())
            .collect::<HashSet<_>>();
        let total = domains.len();
        let (added, removed) = self.replace(domains);
        if added > 0 || removed > 0 {
            info!(
                "Domain set refreshed: {} added, {} removed, {} total",
                added, removed, total
            );
        }
        Ok(())
    }
}

/// Keeps the refresh thread alive.
///
/// Dropping the handle stops the thread and waits for it to exit.
pub struct RefreshHandle {
    stop: Option<channel::Sender<()>>,
    thread: Option<thread::JoinHandle<()>>,
}

impl RefreshHandle {
    pub fn stop(self) {}
}

impl Drop for RefreshHandle {
    fn drop(&mut self) {
        // Disconnecting the channel wakes the thread up immediately
        self.stop.take();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Start a thread which refreshes `registry` from `source` every `interval`.
///
/// The registry should already have been populated; the first refresh
/// happens one interval from now.
pub fn spawn_refresh(
    registry: Arc<DomainRegistry>,
    source: Box<dyn DomainSource>,
    interval: Duration,
) -> io::Result<RefreshHandle> {
    let (stop_send, stop_recv) = channel::bounded::<()>(0);

    let thread = thread::Builder::new()
        .name("domain-refresh".to_owned())
        .spawn(move || loop {
            match stop_recv.recv_timeout(interval) {
                Err(RecvTimeoutError::Timeout) => {
                    if let Err(e) = registry.refresh_from(&*source) {
                        warn!(
                            "Failed to refresh domains, keeping {} known \
                             domains: {}",
                            registry.len(),
                            e
                        );
                    }
                }
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }
        })?;

    Ok(RefreshHandle {
        stop: Some(stop_send),
        thread: Some(thread),
    })
}
