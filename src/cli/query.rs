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

use std::io::{self, BufRead, Write};
use std::net::{Shutdown, TcpStream};
use std::time::Duration;

use super::main::QuerySubcommand;
use crate::mailmap::response::Response;
use crate::mailmap::syntax::encode_request;
use crate::support::sysexits::*;
use crate::support::system_config::delimiter_byte;

const TIMEOUT: Duration = Duration::from_secs(30);

macro_rules! die {
    ($ex:ident, $($stuff:tt)*) => {{
        eprintln!($($stuff)*);
        $ex.exit()
    }}
}

pub fn query(cmd: QuerySubcommand) {
    let delimiter = delimiter_byte(cmd.delimiter)
        .unwrap_or_else(|e| die!(EX_USAGE, "{}", e));

    let request = encode_request(&cmd.command, &cmd.address, delimiter)
        .unwrap_or_else(|e| die!(EX_SOFTWARE, "Bad request: {}", e));

    let response = exchange(&cmd.host, cmd.port, &request).unwrap_or_else(
        |e| die!(EX_IOERR, "Error talking to {}:{}: {}", cmd.host, cmd.port, e),
    );

    let response = response.trim_end_matches(&['\r', '\n'][..]);
    println!("{}", response);

    match response.parse::<Response>() {
        Ok(Response::Success(..)) => (),
        Ok(_) => EX_UNAVAILABLE.exit(),
        Err(()) => die!(EX_PROTOCOL, "Unexpected response from server"),
    }
}

fn exchange(host: &str, port: u16, request: &[u8]) -> io::Result<String> {
    let mut stream = TcpStream::connect((host, port))?;
    stream.set_read_timeout(Some(TIMEOUT))?;
    stream.set_write_timeout(Some(TIMEOUT))?;

    stream.write_all(request)?;
    stream.flush()?;
    let _ = stream.shutdown(Shutdown::Write);

    let mut response = String::new();
    io::BufReader::new(&stream).read_line(&mut response)?;
    if response.is_empty() {
        return Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "connection closed without a response",
        ));
    }

    Ok(response)
}
