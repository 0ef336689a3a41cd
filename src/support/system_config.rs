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

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::Error;

/// The system-wide configuration for the mail-map service.
///
/// This is stored in a file named `mailmap.toml` under the system root, which
/// is typically `/etc/nested-mailmap` or `/usr/local/etc/nested-mailmap`.
#[derive(Clone, Debug, Deserialize, Serialize, Default)]
pub struct SystemConfig {
    /// Configuration for the TCP listener and the wire protocol.
    #[serde(default)]
    pub server: ServerConfig,

    /// Where place records come from and how lookups are bounded.
    #[serde(default)]
    pub directory: DirectoryConfig,

    /// The domains this instance is authoritative for.
    ///
    /// If this section is absent, the service runs in single-tenant mode and
    /// accepts lookups for any domain. If it is present, lookups for any other
    /// domain are refused.
    #[serde(default)]
    pub domains: Option<DomainsConfig>,
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// The address to listen on.
    pub listen: SocketAddr,

    /// The character separating the command from the address on a request
    /// line. It must be ASCII.
    pub delimiter: char,

    /// How long to wait for the request line before giving up on the client.
    ///
    /// 0 disables the deadline, which lets a silent client hold a worker
    /// forever.
    pub read_timeout_secs: u64,

    /// How long to wait for the client to accept the response line.
    pub write_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            listen: SocketAddr::from(([0, 0, 0, 0], 2374)),
            delimiter: ' ',
            read_timeout_secs: 10,
            write_timeout_secs: 10,
        }
    }
}

impl ServerConfig {
    pub fn delimiter_byte(&self) -> Result<u8, Error> {
        delimiter_byte(self.delimiter)
    }

    pub fn read_timeout(&self) -> Option<Duration> {
        seconds(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Option<Duration> {
        seconds(self.write_timeout_secs)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DirectoryConfig {
    /// The file holding place records, relative to the system root.
    pub places: PathBuf,

    /// Upper bound on a single directory lookup. 0 disables the bound.
    pub lookup_timeout_secs: u64,

    /// Lookups past their timeout that may still be running at once.
    pub max_pending_lookups: usize,

    /// How long lookup results (including "no such place") are cached.
    /// 0 disables the cache.
    pub cache_ttl_secs: u64,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        DirectoryConfig {
            places: "places.toml".into(),
            lookup_timeout_secs: 5,
            max_pending_lookups: 64,
            cache_ttl_secs: 60,
        }
    }
}

impl DirectoryConfig {
    pub fn lookup_timeout(&self) -> Option<Duration> {
        seconds(self.lookup_timeout_secs)
    }

    pub fn cache_ttl(&self) -> Option<Duration> {
        seconds(self.cache_ttl_secs)
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
#[serde(default)]
pub struct DomainsConfig {
    /// Domains that are always served.
    #[serde(rename = "static")]
    pub static_domains: Vec<String>,

    /// A file listing further domains, one per line, relative to the system
    /// root. `#` starts a comment. The file is re-read on every refresh, so
    /// whatever provisions tenants only needs to rewrite it.
    pub file: Option<PathBuf>,

    /// Seconds between refreshes of the domain set.
    pub refresh_interval_secs: u64,

    /// If true, a recipient in a domain this instance does not serve gets
    /// `500 Unavailable` instead of `400 COMMAND READ ERROR`.
    ///
    /// The default keeps the 400 response existing postfix configurations
    /// expect.
    pub unserved_domain_unavailable: bool,
}

impl Default for DomainsConfig {
    fn default() -> Self {
        DomainsConfig {
            static_domains: vec![],
            file: None,
            refresh_interval_secs: 300,
            unserved_domain_unavailable: false,
        }
    }
}

impl DomainsConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs.max(1))
    }
}

/// Check that `delimiter` can separate request tokens.
///
/// Line endings would split the record and `"` is the quote character, so
/// none of them can be used.
pub fn delimiter_byte(delimiter: char) -> Result<u8, Error> {
    match delimiter {
        '\n' | '\r' | '"' => Err(Error::BadDelimiter(delimiter)),
        ch if ch.is_ascii() => Ok(ch as u8),
        _ => Err(Error::BadDelimiter(delimiter)),
    }
}

fn seconds(secs: u64) -> Option<Duration> {
    if 0 == secs {
        None
    } else {
        Some(Duration::from_secs(secs))
    }
}
