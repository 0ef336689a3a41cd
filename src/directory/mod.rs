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

//! Read-only access to place records.
//!
//! The mail map never creates or changes places; it only asks whether one
//! exists and how it treats mail from outside the platform.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::support::error::Error;

pub mod cache;
pub mod file;
pub mod timeout;

/// A place's policy for mail arriving from outside the platform.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReceptiveMode {
    Off,
    Internal,
    External,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaceRecord {
    pub id: String,
    #[serde(rename = "receptive")]
    pub receptive_mode: ReceptiveMode,
}

impl PlaceRecord {
    pub fn accepts_external_mail(&self) -> bool {
        ReceptiveMode::External == self.receptive_mode
    }
}

pub trait PlaceDirectory: Send + Sync {
    /// Look the place with the given identifier up.
    ///
    /// `Ok(None)` means the place definitely does not exist. `Err` means the
    /// directory could not answer.
    fn lookup(&self, place_id: &str) -> Result<Option<PlaceRecord>, Error>;
}

impl<T: PlaceDirectory + ?Sized> PlaceDirectory for Arc<T> {
    fn lookup(&self, place_id: &str) -> Result<Option<PlaceRecord>, Error> {
        (**self).lookup(place_id)
    }
}
