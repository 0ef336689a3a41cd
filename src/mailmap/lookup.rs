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

use std::sync::Arc;

use log::{info, warn};

use super::address::MailAddress;
use super::response::Response;
use crate::directory::PlaceDirectory;
use crate::domains::DomainRegistry;
use crate::support::log_prefix::LogPrefix;

/// Everything a connection worker needs to answer a request.
///
/// Built once at startup and shared read-only between all workers.
pub struct HandlerContext {
    pub directory: Arc<dyn PlaceDirectory>,
    /// `None` in single-tenant mode, where every domain is accepted.
    pub domains: Option<Arc<DomainRegistry>>,
    /// Answer `Unavailable` rather than `ProtocolError` for domains this
    /// instance does not serve.
    pub unserved_domain_unavailable: bool,
}

impl HandlerContext {
    pub fn single_tenant(directory: Arc<dyn PlaceDirectory>) -> Self {
        HandlerContext {
            directory,
            domains: None,
            unserved_domain_unavailable: false,
        }
    }

    pub fn multi_tenant(
        directory: Arc<dyn PlaceDirectory>,
        domains: Arc<DomainRegistry>,
        unserved_domain_unavailable: bool,
    ) -> Self {
        HandlerContext {
            directory,
            domains: Some(domains),
            unserved_domain_unavailable,
        }
    }
}

/// Decide whether `address` accepts mail from outside the platform.
pub fn lookup(
    ctx: &HandlerContext,
    log_prefix: &LogPrefix,
    address: &MailAddress,
) -> Response {
    if let Some(ref domains) = ctx.domains {
        if !domains.contains(address.domain()) {
            info!("{} Domain not served here", log_prefix);
            return if ctx.unserved_domain_unavailable {
                Response::Unavailable
            } else {
                Response::ProtocolError
            };
        }
    }

    match ctx.directory.lookup(address.local_part()) {
        Ok(Some(ref place)) if place.accepts_external_mail() => {
            info!("{} Accepted", log_prefix);
            Response::Success(address.to_string())
        }
        Ok(Some(place)) => {
            info!(
                "{} Place is {:?}, refusing external mail",
                log_prefix, place.receptive_mode
            );
            Response::Unavailable
        }
        Ok(None) => {
            info!("{} No such place", log_prefix);
            Response::Unavailable
        }
        // Answering 400 makes postfix defer the message rather than bounce it
        Err(e) => {
            warn!("{} Place directory failed: {}", log_prefix, e);
            Response::ProtocolError
        }
    }
}
