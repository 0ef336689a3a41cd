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

//! Fakes shared by the unit and integration tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use crate::directory::{PlaceDirectory, PlaceRecord, ReceptiveMode};
use crate::support::error::Error;

/// An in-memory `PlaceDirectory`.
///
/// Identifiers are matched exactly, so tests can tell whether the caller
/// normalised the key.
#[derive(Debug, Default)]
pub struct MemoryDirectory {
    places: Mutex<HashMap<String, PlaceRecord>>,
    lookups: AtomicUsize,
    failing: AtomicBool,
    delay: Option<Duration>,
}

impl MemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// A directory with one place in each receptive mode.
    ///
    /// - `nested`: external
    /// - `nested.dev`: external
    /// - `team`: internal
    /// - `closed`: off
    pub fn standard() -> Self {
        Self::new()
            .with_place("nested", ReceptiveMode::External)
            .with_place("nested.dev", ReceptiveMode::External)
            .with_place("team", ReceptiveMode::Internal)
            .with_place("closed", ReceptiveMode::Off)
    }

    pub fn with_place(self, id: &str, receptive_mode: ReceptiveMode) -> Self {
        self.insert(id, receptive_mode);
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn insert(&self, id: &str, receptive_mode: ReceptiveMode) {
        self.places.lock().unwrap().insert(
            id.to_owned(),
            PlaceRecord {
                id: id.to_owned(),
                receptive_mode,
            },
        );
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// The number of lookups made so far.
    pub fn lookups(&self) -> usize {
        self.lookups.load(Ordering::SeqCst)
    }
}

impl PlaceDirectory for MemoryDirectory {
    fn lookup(&self, place_id: &str) -> Result<Option<PlaceRecord>, Error> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }

        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::DirectoryUnavailable);
        }

        Ok(self.places.lock().unwrap().get(place_id).cloned())
    }
}
