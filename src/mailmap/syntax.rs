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

//! Framing of mail-map request lines.
//!
//! A request is a single line holding two CSV-style tokens separated by a
//! configurable delimiter: the command and the address. A token may be
//! quoted to embed the delimiter, which is how a display-name form of the
//! address gets through.

use std::io::{self, BufRead, Read};
use std::str::FromStr;

use thiserror::Error;

/// The longest request line accepted, excluding the line ending.
pub const MAX_LINE: usize = 4096;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command {
    /// get <address>
    Get,
    /// put <address>
    Put,
}

impl FromStr for Command {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, ()> {
        if "get".eq_ignore_ascii_case(s) {
            Ok(Command::Get)
        } else if "put".eq_ignore_ascii_case(s) {
            Ok(Command::Put)
        } else {
            Err(())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Request {
    pub command: String,
    pub raw_address: String,
}

#[derive(Error, Debug)]
pub enum FrameError {
    #[error("Failed to read request line: {0}")]
    ReadFailed(#[source] io::Error),
    #[error("Request line longer than {} bytes", MAX_LINE)]
    LineTooLong,
    #[error("Request line contains a bare carriage return")]
    BareCarriageReturn,
    #[error("Request line has {0} tokens instead of 2")]
    WrongArity(usize),
    #[error("Request line is not valid: {0}")]
    Malformed(#[source] csv::Error),
}

/// Read exactly one request line from `reader`.
///
/// Nothing past the first line ending is interpreted.
pub fn read_request(
    reader: &mut impl BufRead,
    delimiter: u8,
) -> Result<Request, FrameError> {
    let mut line = Vec::new();
    reader
        .by_ref()
        .take(MAX_LINE as u64 + 2)
        .read_until(b'\n', &mut line)
        .map_err(FrameError::ReadFailed)?;

    if Some(&b'\n') != line.last() {
        return Err(if line.len() > MAX_LINE {
            FrameError::LineTooLong
        } else {
            FrameError::ReadFailed(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "connection closed before end of request line",
            ))
        });
    }

    line.pop();
    if Some(&b'\r') == line.last() {
        line.pop();
    }

    if line.len() > MAX_LINE {
        return Err(FrameError::LineTooLong);
    }

    // The tokeniser would end the record at a CR and silently drop the rest
    // of the line
    if line.contains(&b'\r') {
        return Err(FrameError::BareCarriageReturn);
    }

    let mut tokens = tokenise(&line, delimiter)?;
    if 2 != tokens.len() {
        return Err(FrameError::WrongArity(tokens.len()));
    }

    let raw_address = tokens.pop().unwrap_or_default();
    let command = tokens.pop().unwrap_or_default();
    Ok(Request {
        command,
        raw_address,
    })
}

fn tokenise(line: &[u8], delimiter: u8) -> Result<Vec<String>, FrameError> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(line);

    let mut record = csv::StringRecord::new();
    if !reader
        .read_record(&mut record)
        .map_err(FrameError::Malformed)?
    {
        return Ok(vec![]);
    }

    Ok(record.iter().map(str::to_owned).collect())
}

/// Encode a request line, quoting tokens as needed. Used by the query client.
pub fn encode_request(
    command: &str,
    address: &str,
    delimiter: u8,
) -> Result<Vec<u8>, csv::Error> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .quote_style(csv::QuoteStyle::Necessary)
        .terminator(csv::Terminator::Any(b'\n'))
        .from_writer(Vec::new());
    writer.write_record(&[command, address])?;
    writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))
}

#[cfg(test)]
mod test {
    use proptest::prelude::*;

    use super::*;

    fn read(input: &[u8]) -> Result<Request, FrameError> {
        read_request(&mut io::Cursor::new(input), b' ')
    }

    fn request(command: &str, raw_address: &str) -> Request {
        Request {
            command: command.to_owned(),
            raw_address: raw_address.to_owned(),
        }
    }

    #[test]
    fn command_parsing() {
        assert_eq!(Ok(Command::Get), "get".parse());
        assert_eq!(Ok(Command::Get), "GET".parse());
        assert_eq!(Ok(Command::Get), "Get".parse());
        assert_eq!(Ok(Command::Put), "pUt".parse());
        assert_eq!(Err(()), "got".parse::<Command>());
        assert_eq!(Err(()), "get ".parse::<Command>());
        assert_eq!(Err(()), "".parse::<Command>());
    }

    #[test]
    fn request_framing() {
        assert_eq!(
            request("get", "nested@nested.me"),
            read(b"get nested@nested.me\n").unwrap()
        );
        assert_eq!(
            request("GET", "nested@nested.me"),
            read(b"GET nested@nested.me\r\n").unwrap()
        );
        assert_eq!(
            request("get", "\"Nested Team\" <nested@nested.me>"),
            read(b"get \"\"\"Nested Team\"\" <nested@nested.me>\"\n").unwrap()
        );
        assert_eq!(
            request("get", "Nested Team <nested@nested.me>"),
            read(b"get \"Nested Team <nested@nested.me>\"\n").unwrap()
        );
    }

    #[test]
    fn only_first_line_is_read() {
        let mut cursor = io::Cursor::new(&b"get a@b.com\nget c@d.com\n"[..]);
        assert_eq!(
            request("get", "a@b.com"),
            read_request(&mut cursor, b' ').unwrap()
        );
        assert_eq!(12, cursor.position());
    }

    #[test]
    fn custom_delimiter() {
        assert_eq!(
            request("get", "nested@nested.me"),
            read_request(
                &mut io::Cursor::new(&b"get;nested@nested.me\n"[..]),
                b';'
            )
            .unwrap()
        );
        assert_matches!(
            Err(FrameError::WrongArity(1)),
            read_request(
                &mut io::Cursor::new(&b"get nested@nested.me\n"[..]),
                b';'
            )
        );
    }

    #[test]
    fn framing_errors() {
        assert_matches!(Err(FrameError::WrongArity(0)), read(b"\n"));
        assert_matches!(Err(FrameError::WrongArity(1)), read(b"get\n"));
        assert_matches!(
            Err(FrameError::WrongArity(3)),
            read(b"get  nested@nested.me\n")
        );
        assert_matches!(
            Err(FrameError::WrongArity(3)),
            read(b"put nested@nested.me value\n")
        );
        assert_matches!(
            Err(FrameError::ReadFailed(_)),
            read(b"get nested@nested.me")
        );
        assert_matches!(Err(FrameError::ReadFailed(_)), read(b""));
        assert_matches!(
            Err(FrameError::BareCarriageReturn),
            read(b"get nested@nested.me\rfoo bar\n")
        );
        assert_matches!(
            Err(FrameError::BareCarriageReturn),
            read(b"\rget nested@nested.me\n")
        );
        assert_matches!(
            Err(FrameError::BareCarriageReturn),
            read(b"get nested@nested.me\r\r\n")
        );
        assert_matches!(
            Err(FrameError::BareCarriageReturn),
            read(b"get \"Nested\rTeam <nested@nested.me>\"\n")
        );
        assert_matches!(
            Err(FrameError::Malformed(_)),
            read(b"get nested@\xffnested.me\n")
        );

        let mut long = b"get ".to_vec();
        long.extend(std::iter::repeat(b'x').take(MAX_LINE));
        long.push(b'\n');
        assert_matches!(Err(FrameError::LineTooLong), read(&long));

        long.truncate(MAX_LINE - 1);
        long.push(b'\n');
        assert!(read(&long).is_ok());
    }

    #[test]
    fn request_encoding() {
        assert_eq!(
            b"get nested@nested.me\n".to_vec(),
            encode_request("get", "nested@nested.me", b' ').unwrap()
        );

        let encoded =
            encode_request("get", "Nested Team <nested@nested.me>", b' ')
                .unwrap();
        assert_eq!(
            request("get", "Nested Team <nested@nested.me>"),
            read(&encoded).unwrap()
        );
    }

    proptest! {
        #[test]
        fn wrong_arity_is_always_rejected(
            tokens in prop::collection::vec("[a-z@.<>]{1,10}", 0..6)
        ) {
            prop_assume!(2 != tokens.len());
            let line = format!("{}\n", tokens.join(" "));
            match read(line.as_bytes()) {
                Err(FrameError::WrongArity(n)) => {
                    prop_assert_eq!(tokens.len(), n)
                }
                other => prop_assert!(false, "Unexpected result {:?}", other),
            }
        }
    }
}
