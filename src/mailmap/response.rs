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

//! The three responses the mail map can give.
//!
//! postfix's `tcp_table` reads the first three characters as a status: `200`
//! is a hit, `500` a definite miss, and `400` a transient failure after which
//! the lookup is retried later.

use std::fmt;
use std::io::{self, Write};
use std::str::FromStr;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Response {
    /// The mailbox exists and accepts mail from outside the platform. Carries
    /// the normalised address.
    Success(String),
    /// The mailbox does not exist or does not take external mail.
    Unavailable,
    /// The request could not be understood or answered.
    ProtocolError,
}

impl Response {
    pub fn code(&self) -> u16 {
        match *self {
            Response::Success(_) => 200,
            Response::ProtocolError => 400,
            Response::Unavailable => 500,
        }
    }

    /// Write the response line, including the line ending.
    pub fn write_to(&self, mut w: impl Write) -> io::Result<()> {
        writeln!(w, "{}", self)
    }
}

impl fmt::Display for Response {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match *self {
            Response::Success(ref address) => write!(f, "200 {}", address),
            Response::Unavailable => write!(f, "500 Unavailable"),
            Response::ProtocolError => write!(f, "400 COMMAND READ ERROR"),
        }
    }
}

impl FromStr for Response {
    type Err = ();

    /// Parse a response line, without its line ending.
    fn from_str(s: &str) -> Result<Self, ()> {
        if let Some(address) = s.strip_prefix("200 ") {
            Ok(Response::Success(address.to_owned()))
        } else if s.starts_with("500") {
            Ok(Response::Unavailable)
        } else if s.starts_with("400") {
            Ok(Response::ProtocolError)
        } else {
            Err(())
        }
    }
}
