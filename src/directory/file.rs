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

//! Places stored in a TOML file.
//!
//! The file holds a list of `[[place]]` tables:
//!
//! ```toml
//! [[place]]
//! id = "nested"
//! receptive = "external"
//! ```
//!
//! Identifiers are matched case-insensitively. The file is re-read whenever
//! its modification time changes.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::SystemTime;

use log::{info, warn};
use serde::Deserialize;

use super::{PlaceDirectory, PlaceRecord};
use crate::support::error::Error;

#[derive(Deserialize)]
struct PlacesFile {
    #[serde(default)]
    place: Vec<PlaceRecord>,
}

#[derive(Debug)]
struct Loaded {
    modified: Option<SystemTime>,
    places: HashMap<String, PlaceRecord>,
}

#[derive(Debug)]
pub struct FileDirectory {
    path: PathBuf,
    loaded: RwLock<Loaded>,
}

impl FileDirectory {
    /// Load the places file at `path`.
    ///
    /// Unlike later reloads, failure here is reported to the caller.
    pub fn open(path: PathBuf) -> Result<Self, Error> {
        let loaded = load(&path)?;
        Ok(FileDirectory {
            path,
            loaded: RwLock::new(loaded),
        })
    }

    pub fn len(&self) -> usize {
        self.loaded.read().unwrap().places.len()
    }

    fn reload_if_changed(&self) {
        let modified = modified_time(&self.path);
        if modified == self.loaded.read().unwrap().modified {
            return;
        }

        let mut loaded = self.loaded.write().unwrap();
        // Another thread may have reloaded while we waited for the lock
        if modified == loaded.modified {
            return;
        }

        match load(&self.path) {
            Ok(new) => {
                info!(
                    "Reloaded {} places from '{}'",
                    new.places.len(),
                    self.path.display()
                );
                *loaded = new;
            }
            Err(e) => {
                warn!(
                    "Failed to reload '{}', keeping {} previously loaded \
                     places: {}",
                    self.path.display(),
                    loaded.places.len(),
                    e
                );
                // Don't retry until the file changes again
                loaded.modified = modified;
            }
        }
    }
}

impl PlaceDirectory for FileDirectory {
    fn lookup(&self, place_id: &str) -> Result<Option<PlaceRecord>, Error> {
        self.reload_if_changed();
        Ok(self
            .loaded
            .read()
            .unwrap()
            .places
            .get(&place_id.to_lowercase())
            .cloned())
    }
}

fn modified_time(path: &Path) -> Option<SystemTime> {
    fs::metadata(path).and_then(|md| md.modified()).ok()
}

fn load(path: &Path) -> Result<Loaded, Error> {
    let modified = modified_time(path);
    let data = fs::read(path)?;
    let file: PlacesFile = toml::from_slice(&data)?;

    let mut places = HashMap::with_capacity(file.place.len());
    for place in file.place {
        let key = place.id.to_lowercase();
        if places.contains_key(&key) {
            return Err(Error::DuplicatePlace(place.id));
        }
        places.insert(key, place);
    }

    Ok(Loaded { modified, places })
}
