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

//! Bounds the time a directory lookup may take.
//!
//! The lookup runs on its own thread; if it does not finish in time the
//! caller gets `Error::DirectoryTimeout` and the thread is left to finish on
//! its own, its result discarded. A hung backend therefore pins one thread
//! per abandoned lookup, so the number of helper threads alive at once is
//! capped. Past the cap, lookups fail immediately with
//! `Error::DirectoryUnavailable` until some of the stuck ones return.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError};
use log::warn;

use super::{PlaceDirectory, PlaceRecord};
use crate::support::error::Error;

const DEFAULT_MAX_IN_FLIGHT: usize = 64;

pub struct TimeLimitedDirectory {
    inner: Arc<dyn PlaceDirectory>,
    limit: Duration,
    max_in_flight: usize,
    in_flight: Arc<AtomicUsize>,
}

impl TimeLimitedDirectory {
    pub fn new(inner: Arc<dyn PlaceDirectory>, limit: Duration) -> Self {
        TimeLimitedDirectory {
            inner,
            limit,
            max_in_flight: DEFAULT_MAX_IN_FLIGHT,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }
}

// Releases a helper thread's slot however the thread ends.
struct InFlight(Arc<AtomicUsize>);

impl Drop for InFlight {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl PlaceDirectory for TimeLimitedDirectory {
    fn lookup(&self, place_id: &str) -> Result<Option<PlaceRecord>, Error> {
        let previous = self.in_flight.fetch_add(1, Ordering::SeqCst);
        let slot = InFlight(Arc::clone(&self.in_flight));
        if previous >= self.max_in_flight {
            warn!(
                "{} place lookups still running, not starting another",
                previous
            );
            return Err(Error::DirectoryUnavailable);
        }

        let (send, recv) = channel::bounded(1);
        let inner = Arc::clone(&self.inner);
        let place_id = place_id.to_owned();

        thread::Builder::new()
            .name("place-lookup".to_owned())
            .spawn(move || {
                let _slot = slot;
                // The receiver is gone if we already timed out
                let _ = send.send(inner.lookup(&place_id));
            })?;

        match recv.recv_timeout(self.limit) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => Err(Error::DirectoryTimeout),
            Err(RecvTimeoutError::Disconnected) => {
                Err(Error::DirectoryUnavailable)
            }
        }
    }
}
