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

use std::fs;
use std::path::PathBuf;

use crate::support::error::Error;

/// Somewhere the authoritative domain set can be read from.
pub trait DomainSource: Send + Sync {
    fn domains(&self) -> Result<Vec<String>, Error>;
}

/// A fixed list, usually from the configuration file.
#[derive(Clone, Debug)]
pub struct StaticDomains(Vec<String>);

impl StaticDomains {
    pub fn new(domains: Vec<String>) -> Self {
        StaticDomains(domains)
    }
}

impl DomainSource for StaticDomains {
    fn domains(&self) -> Result<Vec<String>, Error> {
        Ok(self.0.clone())
    }
}

/// A text file with one domain per line, re-read on every call.
///
/// Blank lines and everything after a `#` are ignored.
#[derive(Clone, Debug)]
pub struct DomainFile(PathBuf);

impl DomainFile {
    pub fn new(path: PathBuf) -> Self {
        DomainFile(path)
    }
}

impl DomainSource for DomainFile {
    fn domains(&self) -> Result<Vec<String>, Error> {
        let content = fs::read_to_string(&self.0)?;
        Ok(content
            .lines()
            .map(|line| line.split('#').next().unwrap_or("").trim())
            .filter(|line| !line.is_empty())
            .map(str::to_owned)
            .collect())
    }
}

/// The union of several sources. Any one failing fails the whole lookup, so
/// that a transient error cannot drop a subset of the domains.
#[derive(Default)]
pub struct UnionSource(Vec<Box<dyn DomainSource>>);

impl UnionSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, source: Box<dyn DomainSource>) {
        self.0.push(source);
    }
}

impl DomainSource for UnionSource {
    fn domains(&self) -> Result<Vec<String>, Error> {
        let mut all = Vec::new();
        for source in &self.0 {
            all.extend(source.domains()?);
        }
        Ok(all)
    }
}
