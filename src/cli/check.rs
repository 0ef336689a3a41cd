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

use std::path::Path;

use crate::directory::file::FileDirectory;
use crate::domains::DomainSource;
use crate::support::sysexits::*;
use crate::support::system_config::SystemConfig;

/// Validate everything `serve` would load and print what it found.
pub fn check_config(system_config: &SystemConfig, root: &Path) {
    let mut ok = true;
    let server = &system_config.server;

    match server.delimiter_byte() {
        Ok(_) => println!(
            "Listening on {}, delimiter {:?}",
            server.listen, server.delimiter
        ),
        Err(e) => {
            eprintln!("[server]: {}", e);
            ok = false;
        }
    }

    let places = root.join(&system_config.directory.places);
    match FileDirectory::open(places.clone()) {
        Ok(directory) => println!(
            "{} places in '{}'",
            directory.len(),
            places.display()
        ),
        Err(e) => {
            eprintln!("Error in places file '{}': {}", places.display(), e);
            ok = false;
        }
    }

    match system_config.domains {
        None => println!("Single-tenant: every domain is accepted"),
        Some(ref domains_config) => {
            match super::serve::domain_source(domains_config, root).domains() {
                Ok(domains) => println!(
                    "Multi-tenant: {} served domains, refreshed every {}s",
                    domains.len(),
                    domains_config.refresh_interval().as_secs()
                ),
                Err(e) => {
                    eprintln!("Error reading served domains: {}", e);
                    ok = false;
                }
            }
        }
    }

    if !ok {
        EX_CONFIG.exit();
    }
}
