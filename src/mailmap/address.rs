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

//! Parsing and normalisation of the address in a request line.
//!
//! The grammar is the RFC 5322 `mailbox` production with the obsolete forms
//! real MTAs still produce, amended by RFC 6532 to allow UTF-8.

use std::fmt;

use thiserror::Error;

use self::grammar::mailbox;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MailAddress {
    local: String,
    domain: String,
}

impl MailAddress {
    /// The mailbox name, which is also the place identifier.
    pub fn local_part(&self) -> &str {
        &self.local
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }
}

impl fmt::Display for MailAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}@{}", self.local, self.domain)
    }
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddressError {
    #[error("Malformed mailbox address")]
    Malformed,
}

/// Parse `raw` as a single mailbox and normalise it.
///
/// Display names, comments and source routes are discarded. The result is
/// lower-cased in its entirety, local part included, since place
/// identifiers are case-insensitive.
pub fn parse_address(raw: &str) -> Result<MailAddress, AddressError> {
    // The grammar is streaming, so terminate the input with a byte no
    // production accepts outside of quotes. Without it, every parse that
    // reaches the end of the input would be Incomplete.
    if raw.as_bytes().contains(&SENTINEL) {
        return Err(AddressError::Malformed);
    }

    let mut input = Vec::with_capacity(raw.len() + 1);
    input.extend_from_slice(raw.as_bytes());
    input.push(SENTINEL);

    let spec = match mailbox(&input) {
        Ok((rest, spec)) if rest == &[SENTINEL][..] => spec,
        _ => return Err(AddressError::Malformed),
    };

    let normalised = String::from_utf8(spec.render())
        .map_err(|_| AddressError::Malformed)?
        .to_lowercase();

    let mut split = normalised.split('@');
    match (split.next(), split.next(), split.next()) {
        (Some(local), Some(domain), None)
            if !local.is_empty() && !domain.is_empty() =>
        {
            Ok(MailAddress {
                local: local.to_owned(),
                domain: domain.to_owned(),
            })
        }
        _ => Err(AddressError::Malformed),
    }
}

const SENTINEL: u8 = 0;

mod grammar {
    use nom::*;

    #[derive(Debug)]
    pub struct AddrSpec {
        pub local: Vec<Vec<u8>>,
        pub domain: Vec<Vec<u8>>,
    }

    impl AddrSpec {
        pub fn render(&self) -> Vec<u8> {
            let mut out = self.local.join(&b'.');
            out.push(b'@');
            out.extend(self.domain.join(&b'.'));
            out
        }
    }

    fn is_atext(ch: u8) -> bool {
        ch.is_ascii_alphanumeric()
            || b"!#$%&'*+-/=?^_`{|}~".contains(&ch)
            // RFC 6532 Unicode
            || ch >= 0x80
    }

    // RFC 5322 3.2.1 "quoted-pair", including the 8-bit clean obsolete form
    named!(quoted_pair, preceded!(char!('\\'), take!(1)));

    // RFC 5322 3.2.2 "folding white space". The request line has already been
    // unfolded, so this is just horizontal white space.
    named!(fws, is_a!(" \t"));
    // RFC 5322 3.2.2 "comment text"
    named!(ctext, is_not!("()\\ \t"));
    // RFC 5322 3.2.2 "comment content"
    named!(
        ccontent<()>,
        alt!(
            map!(ctext, |_| ())
                | map!(quoted_pair, |_| ())
                | map!(fws, |_| ())
                | comment
        )
    );
    // RFC 5322 3.2.2 "comment". Comments nest.
    named!(
        comment<()>,
        delimited!(char!('('), map!(many0_count!(ccontent), |_| ()), char!(')'))
    );
    // RFC 5322 3.2.2 "comment or folding white space". May match nothing.
    named!(
        cfws<()>,
        map!(many0_count!(alt!(map!(fws, |_| ()) | comment)), |_| ())
    );

    // RFC 5322 3.2.3 "atom text"
    named!(atext, take_while1!(is_atext));
    // RFC 5322 3.2.3 "atom"
    named!(atom, delimited!(opt!(cfws), atext, opt!(cfws)));

    // RFC 5322 3.2.4 "quoted [string] text"
    named!(qtext, is_not!(" \t\\\""));
    named!(qcontent, alt!(qtext | quoted_pair | fws));
    // RFC 5322 3.2.4 "quoted string", content without the quotes
    named!(
        quoted_string<Vec<u8>>,
        delimited!(
            pair!(opt!(cfws), char!('"')),
            fold_many0!(qcontent, Vec::new(), |mut acc: Vec<u8>, item: &[u8]| {
                acc.extend_from_slice(item);
                acc
            }),
            pair!(char!('"'), opt!(cfws))
        )
    );

    // RFC 5322 3.2.5 "word"
    named!(
        word<Vec<u8>>,
        alt!(map!(atom, |a: &[u8]| a.to_vec()) | quoted_string)
    );

    // The '.' many agents put unquoted into display names (RFC 5322 4.1
    // "obs-phrase").
    named!(obs_dot<()>, map!(terminated!(char!('.'), opt!(cfws)), |_| ()));

    // RFC 5322 3.2.5 "phrase" plus the obsolete form. Only used for display
    // names, which are discarded.
    named!(
        phrase<()>,
        map!(
            pair!(word, many0_count!(alt!(map!(word, |_| ()) | obs_dot))),
            |_| ()
        )
    );

    // RFC 5322 3.4.1 local part. `word *("." word)` (obs-local-part) covers
    // both dot-atom and quoted-string.
    named!(
        local_part<Vec<Vec<u8>>>,
        separated_nonempty_list!(char!('.'), word)
    );

    // RFC 5322 4.4 obsolete domain, which covers dot-atom
    named!(
        obs_domain<Vec<Vec<u8>>>,
        separated_nonempty_list!(char!('.'), map!(atom, |a: &[u8]| a.to_vec()))
    );

    // RFC 5322 3.4.1 domain literal text
    named!(dtext, is_not!("[]\\ \t"));
    named!(dcontent, alt!(dtext | quoted_pair | fws));
    // RFC 5322 3.4.1 domain literal, brackets included
    named!(
        domain_literal<Vec<u8>>,
        delimited!(
            pair!(opt!(cfws), char!('[')),
            fold_many0!(
                dcontent,
                b"[".to_vec(),
                |mut acc: Vec<u8>, item: &[u8]| {
                    acc.extend_from_slice(item);
                    acc
                }
            ),
            pair!(char!(']'), opt!(cfws))
        )
    );

    named!(
        domain<Vec<Vec<u8>>>,
        alt!(
            obs_domain
                | map!(domain_literal, |mut literal: Vec<u8>| {
                    literal.push(b']');
                    vec![literal]
                })
        )
    );

    // RFC 5322 3.4.1 address specification
    named!(
        addr_spec<AddrSpec>,
        map!(pair!(local_part, preceded!(char!('@'), domain)), |(
            local,
            domain,
        )| AddrSpec {
            local,
            domain
        })
    );

    // RFC 5322 4.4 obsolete route, `@a.example,@b.example:`, which is discarded
    named!(
        obs_route<()>,
        map!(
            tuple!(
                char!('@'),
                domain,
                many0_count!(tuple!(
                    char!(','),
                    opt!(cfws),
                    char!('@'),
                    domain
                )),
                char!(':')
            ),
            |_| ()
        )
    );

    // RFC 5322 3.4 angle-delimited address
    named!(
        angle_addr<AddrSpec>,
        delimited!(
            tuple!(opt!(cfws), char!('<'), opt!(obs_route)),
            addr_spec,
            pair!(char!('>'), opt!(cfws))
        )
    );

    // RFC 5322 3.4 mailbox
    named!(
        pub mailbox<AddrSpec>,
        alt!(
            map!(pair!(opt!(phrase), angle_addr), |(_, addr)| addr)
                | addr_spec
        )
    );
}
