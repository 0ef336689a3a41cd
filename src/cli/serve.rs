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

use std::path::{Path, PathBuf};
use std::sync::Arc;

use log::{error, info, warn};

use crate::directory::cache::{CachedDirectory, MemoryCache};
use crate::directory::file::FileDirectory;
use crate::directory::timeout::TimeLimitedDirectory;
use crate::directory::PlaceDirectory;
use crate::domains::{
    spawn_refresh, DomainFile, DomainRegistry, StaticDomains, UnionSource,
};
use crate::mailmap::lookup::HandlerContext;
use crate::mailmap::server::{Server, ServerOptions};
use crate::support::error::Error;
use crate::support::sysexits::Sysexit;
use crate::support::system_config::{
    DirectoryConfig, DomainsConfig, SystemConfig,
};

// Need to use a this and not die! so that errors go to syslog/etc
macro_rules! fatal {
    ($ex:ident, $($stuff:tt)*) => {{
        error!($($stuff)*);
        crate::support::sysexits::$ex.exit()
    }}
}

pub fn serve(system_config: SystemConfig, root: PathBuf) {
    let delimiter = system_config
        .server
        .delimiter_byte()
        .unwrap_or_else(|e| fatal!(EX_CONFIG, "Bad [server] config: {}", e));

    let directory = open_directory(&system_config.directory, &root)
        .unwrap_or_else(|e| {
            error!("Failed to load places: {}", e);
            Sysexit::from(&e).exit()
        });

    let (context, refresh) = match system_config.domains {
        None => {
            info!("No [domains] configured; accepting every domain");
            (HandlerContext::single_tenant(directory), None)
        }

        Some(ref domains_config) => {
            let source = domain_source(domains_config, &root);
            let registry = Arc::new(DomainRegistry::new());
            if let Err(e) = registry.refresh_from(&source) {
                fatal!(EX_CONFIG, "Failed to load served domains: {}", e);
            }

            if 0 == registry.len() {
                warn!("No served domains configured; every lookup will fail");
            }

            let refresh = spawn_refresh(
                Arc::clone(&registry),
                Box::new(source),
                domains_config.refresh_interval(),
            )
            .unwrap_or_else(|e| {
                fatal!(EX_OSERR, "Failed to start domain refresh: {}", e)
            });

            (
                HandlerContext::multi_tenant(
                    directory,
                    registry,
                    domains_config.unserved_domain_unavailable,
                ),
                Some(refresh),
            )
        }
    };

    let options = ServerOptions {
        delimiter,
        read_timeout: system_config.server.read_timeout(),
        write_timeout: system_config.server.write_timeout(),
    };

    let listen = system_config.server.listen;
    let server = Server::bind(listen, Arc::new(context), options)
        .unwrap_or_else(|e| {
            fatal!(EX_OSERR, "Failed to listen on {}: {}", listen, e)
        });

    if let Err(e) = server.run() {
        fatal!(EX_IOERR, "Server failed: {}", e);
    }

    if let Some(refresh) = refresh {
        refresh.stop();
    }
}

/// Open the configured places file and wrap it in the timeout and cache
/// layers the configuration asks for.
pub(super) fn open_directory(
    config: &DirectoryConfig,
    root: &Path,
) -> Result<Arc<dyn PlaceDirectory>, Error> {
    let path = root.join(&config.places);
    let file = FileDirectory::open(path.clone())?;
    info!("Loaded {} places from '{}'", file.len(), path.display());

    let mut directory: Arc<dyn PlaceDirectory> = Arc::new(file);
    if let Some(limit) = config.lookup_timeout() {
        directory = Arc::new(
            TimeLimitedDirectory::new(directory, limit)
                .with_max_in_flight(config.max_pending_lookups),
        );
    }
    if let Some(ttl) = config.cache_ttl() {
        directory = Arc::new(CachedDirectory::new(
            directory,
            Arc::new(MemoryCache::new()),
            ttl,
        ));
    }

    Ok(directory)
}

pub(super) fn domain_source(
    config: &DomainsConfig,
    root: &Path,
) -> UnionSource {
    let mut source = UnionSource::new();
    if !config.static_domains.is_empty() {
        source.push(Box::new(StaticDomains::new(
            config.static_domains.clone(),
        )));
    }
    if let Some(ref file) = config.file {
        source.push(Box::new(DomainFile::new(root.join(file))));
    }

    source
}

#[cfg(test)]
mod test {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::domains::DomainSource;

    #[test]
    fn directory_layers_follow_config() {
        let root = TempDir::new().unwrap();
        fs::write(
            root.path().join("places.toml"),
            "[[place]]\nid = \"Nested\"\nreceptive = \"external\"\n",
        )
        .unwrap();

        for &(timeout, ttl) in &[(0, 0), (5, 0), (0, 60), (5, 60)] {
            let config = DirectoryConfig {
                lookup_timeout_secs: timeout,
                cache_ttl_secs: ttl,
                ..DirectoryConfig::default()
            };
            let directory = open_directory(&config, root.path()).unwrap();
            assert!(directory
                .lookup("nested")
                .unwrap()
                .unwrap()
                .accepts_external_mail());
            assert!(directory.lookup("nobody").unwrap().is_none());
        }

        let config = DirectoryConfig {
            places: "missing.toml".into(),
            ..DirectoryConfig::default()
        };
        assert_matches!(
            Err(Error::Io(..)),
            open_directory(&config, root.path()).map(|_| ())
        );
    }

    #[test]
    fn domain_sources_are_combined() {
        let root = TempDir::new().unwrap();
        fs::write(root.path().join("domains"), "# served\nnested.dev\n")
            .unwrap();

        let config = DomainsConfig {
            static_domains: vec!["nested.me".to_owned()],
            file: Some("domains".into()),
            ..DomainsConfig::default()
        };
        let mut domains = domain_source(&config, root.path())
            .domains()
            .unwrap();
        domains.sort();
        assert_eq!(vec!["nested.dev", "nested.me"], domains);
    }
}
