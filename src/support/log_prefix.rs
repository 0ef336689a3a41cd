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

use std::fmt;

/// Text included at the start of every log statement about one connection.
///
/// It starts out naming the protocol and peer, and gains the recipient once
/// the request line has been parsed.
#[derive(Clone, Debug)]
pub struct LogPrefix {
    protocol: String,
    recipient: Option<String>,
}

impl LogPrefix {
    pub fn new(protocol: String) -> Self {
        Self {
            protocol: sanitise(protocol),
            recipient: None,
        }
    }

    pub fn set_recipient(&mut self, recipient: String) {
        self.recipient = Some(sanitise(recipient));
    }
}

impl fmt::Display for LogPrefix {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.protocol)?;
        if let Some(ref recipient) = self.recipient {
            write!(f, "[{}]", recipient)?;
        }

        Ok(())
    }
}

// Everything here comes off the wire, so keep control characters out of the
// log and cap the length.
fn sanitise(mut s: String) -> String {
    s.retain(|c| !c.is_control());
    if let Some((truncate_len, _)) = s.char_indices().nth(128) {
        s.truncate(truncate_len);
    }

    s
}
