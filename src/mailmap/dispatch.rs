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

use log::warn;

use super::address::MailAddress;
use super::lookup::{lookup, HandlerContext};
use super::response::Response;
use super::syntax::Command;
use crate::support::log_prefix::LogPrefix;

/// Route a request to its handler.
///
/// `put` is refused outright: the map is read-only, and answering keeps the
/// client from waiting on a response that would never come.
pub fn dispatch(
    command: &str,
    address: &MailAddress,
    ctx: &HandlerContext,
    log_prefix: &LogPrefix,
) -> Response {
    match command.parse::<Command>() {
        Ok(Command::Get) => lookup(ctx, log_prefix, address),
        Ok(Command::Put) => {
            warn!("{} Refusing put on a read-only map", log_prefix);
            Response::ProtocolError
        }
        Err(()) => {
            warn!("{} Unknown command {:?}", log_prefix, command);
            Response::ProtocolError
        }
    }
}
