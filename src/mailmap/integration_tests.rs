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

use std::io::{self, BufRead, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use rayon::prelude::*;

use super::lookup::HandlerContext;
use super::response::Response;
use super::server::*;
use crate::directory::ReceptiveMode;
use crate::domains::{DomainRegistry, StaticDomains};
use crate::test_data::MemoryDirectory;

struct Setup {
    addr: SocketAddr,
    directory: Arc<MemoryDirectory>,
    shutdown: ShutdownHandle,
    server: Option<thread::JoinHandle<()>>,
}

impl Drop for Setup {
    fn drop(&mut self) {
        self.shutdown.shutdown();
        if let Some(server) = self.server.take() {
            let _ = server.join();
        }
    }
}

fn set_up() -> Setup {
    set_up_with(|directory| HandlerContext::single_tenant(directory))
}

fn set_up_with(
    make_context: impl FnOnce(Arc<MemoryDirectory>) -> HandlerContext,
) -> Setup {
    set_up_full(
        Arc::new(MemoryDirectory::standard()),
        make_context,
        ServerOptions::default(),
    )
}

fn set_up_full(
    directory: Arc<MemoryDirectory>,
    make_context: impl FnOnce(Arc<MemoryDirectory>) -> HandlerContext,
    options: ServerOptions,
) -> Setup {
    crate::init_test_log();

    let context = Arc::new(make_context(Arc::clone(&directory)));
    let server = Server::bind("127.0.0.1:0", context, options).unwrap();
    let addr = server.local_addr().unwrap();
    let shutdown = server.shutdown_handle().unwrap();
    let server = thread::spawn(move || server.run().unwrap());

    Setup {
        addr,
        directory,
        shutdown,
        server: Some(server),
    }
}

impl Setup {
    fn connect(&self) -> TcpStream {
        let stream = TcpStream::connect(self.addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(30)))
            .unwrap();
        stream
    }

    /// Send `request` verbatim and return everything the server sends back.
    fn exchange(&self, request: &str) -> String {
        let mut stream = self.connect();
        stream.write_all(request.as_bytes()).unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        response
    }

    fn query(&self, command: &str, address: &str) -> String {
        self.exchange(&format!("{} {}\n", command, address))
    }
}

#[test]
fn external_place_is_accepted() {
    let setup = set_up();
    assert_eq!(
        "200 nested@nested.me\n",
        setup.query("get", "nested@nested.me")
    );
    assert_eq!(
        "200 nested.dev@example.com\n",
        setup.query("get", "nested.dev@example.com")
    );
}

#[test]
fn missing_place_is_unavailable() {
    let setup = set_up();
    assert_eq!(
        "500 Unavailable\n",
        setup.query("get", "nobody@nested.me")
    );
}

#[test]
fn non_external_places_are_unavailable() {
    let setup = set_up();
    assert_eq!("500 Unavailable\n", setup.query("get", "team@nested.me"));
    assert_eq!("500 Unavailable\n", setup.query("get", "closed@nested.me"));
}

#[test]
fn wrong_arity_is_rejected() {
    let setup = set_up();
    assert_eq!("400 COMMAND READ ERROR\n", setup.exchange("get\n"));
    assert_eq!(
        "400 COMMAND READ ERROR\n",
        setup.exchange("get nested@nested.me extra\n")
    );
    assert_eq!("400 COMMAND READ ERROR\n", setup.exchange("\n"));
    assert_eq!(
        "400 COMMAND READ ERROR\n",
        setup.exchange("get nested@nested.me\rfoo bar\n")
    );
    assert_eq!(
        "400 COMMAND READ ERROR\n",
        setup.exchange("\rget nested@nested.me\n")
    );
    assert_eq!(0, setup.directory.lookups());
}

#[test]
fn unknown_and_write_commands_are_rejected() {
    let setup = set_up();
    assert_eq!(
        "400 COMMAND READ ERROR\n",
        setup.query("foo", "nested@nested.me")
    );
    assert_eq!(
        "400 COMMAND READ ERROR\n",
        setup.query("put", "nested@nested.me")
    );
    assert_eq!(0, setup.directory.lookups());
}

#[test]
fn malformed_address_is_rejected() {
    let setup = set_up();
    assert_eq!(
        "400 COMMAND READ ERROR\n",
        setup.query("get", "not-an-email")
    );
    assert_eq!(
        "400 COMMAND READ ERROR\n",
        setup.query("get", "nested@@nested.me")
    );
}

#[test]
fn lookups_are_case_insensitive() {
    let setup = set_up();
    assert_eq!(
        "200 nested@nested.me\n",
        setup.query("GET", "NESTED@Nested.ME")
    );
    assert_eq!(
        "200 nested@nested.me\n",
        setup.query("Get", "Nested@nested.me")
    );
}

#[test]
fn display_names_are_stripped() {
    let setup = set_up();
    assert_eq!(
        "200 nested@nested.me\n",
        setup.query("get", "\"Nested Team <nested@nested.me>\"")
    );
}

#[test]
fn crlf_line_ending_is_accepted() {
    let setup = set_up();
    assert_eq!(
        "200 nested@nested.me\n",
        setup.exchange("get nested@nested.me\r\n")
    );
}

#[test]
fn only_first_line_is_read() {
    let setup = set_up();

    // Both requests go out in one write so the server cannot have closed the
    // connection before the second one is sent.
    let response =
        setup.exchange("get nested@nested.me\nget nested.dev@nested.me\n");
    assert_eq!("200 nested@nested.me\n", response);
    assert_eq!(1, setup.directory.lookups());
}

#[test]
fn truncated_request_is_rejected() {
    let setup = set_up();
    let mut stream = setup.connect();
    stream.write_all(b"get nested@nested.me").unwrap();
    stream.shutdown(Shutdown::Write).unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).unwrap();
    assert_eq!("400 COMMAND READ ERROR\n", response);
}

#[test]
fn silent_client_times_out() {
    let setup = set_up_full(
        Arc::new(MemoryDirectory::standard()),
        |directory| HandlerContext::single_tenant(directory),
        ServerOptions {
            read_timeout: Some(Duration::from_millis(200)),
            ..ServerOptions::default()
        },
    );

    let mut stream = setup.connect();
    stream.write_all(b"get nested").unwrap();

    let mut response = String::new();
    io::BufReader::new(&stream)
        .read_line(&mut response)
        .unwrap();
    assert_eq!("400 COMMAND READ ERROR\n", response);
}

#[test]
fn trickling_client_times_out() {
    let setup = set_up_full(
        Arc::new(MemoryDirectory::standard()),
        |directory| HandlerContext::single_tenant(directory),
        ServerOptions {
            read_timeout: Some(Duration::from_millis(300)),
            ..ServerOptions::default()
        },
    );

    let stream = setup.connect();
    let mut trickle = stream.try_clone().unwrap();
    let start = Instant::now();
    // Every byte arrives well within the read timeout, but the whole line
    // would take two seconds.
    let writer = thread::spawn(move || {
        for &byte in b"get nested@nested.me\n" {
            if trickle.write_all(&[byte]).is_err() {
                break;
            }
            thread::sleep(Duration::from_millis(100));
        }
    });

    let mut response = String::new();
    let _ = io::BufReader::new(&stream).read_line(&mut response);
    let elapsed = start.elapsed();
    assert_eq!("400 COMMAND READ ERROR\n", response);
    assert!(
        elapsed < Duration::from_millis(1500),
        "Response took {:?}",
        elapsed
    );
    assert_eq!(0, setup.directory.lookups());

    let _ = stream.shutdown(Shutdown::Both);
    writer.join().unwrap();
}

#[test]
fn directory_failure_is_temporary() {
    let setup = set_up();
    setup.directory.set_failing(true);
    assert_eq!(
        "400 COMMAND READ ERROR\n",
        setup.query("get", "nested@nested.me")
    );
    setup.directory.set_failing(false);
    assert_eq!(
        "200 nested@nested.me\n",
        setup.query("get", "nested@nested.me")
    );
}

#[test]
fn multi_tenant_domains() {
    let registry = Arc::new(DomainRegistry::new());
    registry
        .refresh_from(&StaticDomains::new(vec!["Nested.me".to_owned()]))
        .unwrap();

    let setup = set_up_with(|directory| {
        HandlerContext::multi_tenant(directory, Arc::clone(&registry), false)
    });
    assert_eq!(
        "200 nested@nested.me\n",
        setup.query("get", "nested@NESTED.ME")
    );
    assert_eq!(
        "400 COMMAND READ ERROR\n",
        setup.query("get", "nested@elsewhere.com")
    );
    assert_eq!(1, setup.directory.lookups());

    let setup = set_up_with(|directory| {
        HandlerContext::multi_tenant(directory, Arc::clone(&registry), true)
    });
    assert_eq!(
        "500 Unavailable\n",
        setup.query("get", "nested@elsewhere.com")
    );
}

#[test]
fn repeated_requests_agree() {
    let setup = set_up();
    for &address in &["nested@nested.me", "team@nested.me", "x@nested.me"] {
        let first = setup.query("get", address);
        for _ in 0..5 {
            assert_eq!(first, setup.query("get", address));
        }
    }
}

#[test]
fn concurrent_connections_are_independent() {
    let directory = Arc::new(MemoryDirectory::new());
    for i in 0..32 {
        directory.insert(
            &format!("place{}", i),
            if 0 == i % 2 {
                ReceptiveMode::External
            } else {
                ReceptiveMode::Internal
            },
        );
    }

    let setup = set_up_full(
        directory,
        |directory| HandlerContext::single_tenant(directory),
        ServerOptions::default(),
    );

    (0..256).into_par_iter().for_each(|n| {
        let i = n % 40;
        let address = format!("place{}@nested.me", i);
        let response = setup.query("get", &address);

        let expected = if i < 32 && 0 == i % 2 {
            Response::Success(address)
        } else {
            Response::Unavailable
        };
        assert_eq!(format!("{}\n", expected), response);
    });

    assert_eq!(256, setup.directory.lookups());
}
