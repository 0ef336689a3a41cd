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
use std::net::{
    Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream,
    ToSocketAddrs,
};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use log::{debug, info, warn};

use super::address::parse_address;
use super::dispatch::dispatch;
use super::lookup::HandlerContext;
use super::response::Response;
use super::syntax::read_request;
use crate::support::log_prefix::LogPrefix;

// Pause after a failed accept so that running out of file descriptors does
// not turn into a busy loop.
const ACCEPT_BACKOFF: Duration = Duration::from_millis(50);

// Sockets refuse a zero read timeout
const MIN_READ_TIMEOUT: Duration = Duration::from_millis(1);

#[derive(Clone, Debug)]
pub struct ServerOptions {
    pub delimiter: u8,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        ServerOptions {
            delimiter: b' ',
            read_timeout: Some(Duration::from_secs(10)),
            write_timeout: Some(Duration::from_secs(10)),
        }
    }
}

/// The mail-map TCP server.
///
/// Each accepted connection gets its own thread, which reads one request,
/// writes one response, and closes the connection.
pub struct Server {
    listener: TcpListener,
    context: Arc<HandlerContext>,
    options: ServerOptions,
    stop: Arc<AtomicBool>,
}

/// Stops a running `Server` from accepting further connections.
#[derive(Clone, Debug)]
pub struct ShutdownHandle {
    stop: Arc<AtomicBool>,
    wake_addr: SocketAddr,
}

impl ShutdownHandle {
    /// Stop the accept loop. Connections already accepted are still served.
    pub fn shutdown(&self) {
        self.stop.store(true, Ordering::SeqCst);
        // The accept loop only checks the flag when a connection arrives
        if let Err(e) = TcpStream::connect(self.wake_addr) {
            warn!("Failed to wake accept loop for shutdown: {}", e);
        }
    }
}

impl Server {
    pub fn bind(
        addr: impl ToSocketAddrs,
        context: Arc<HandlerContext>,
        options: ServerOptions,
    ) -> io::Result<Self> {
        Ok(Server {
            listener: TcpListener::bind(addr)?,
            context,
            options,
            stop: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn shutdown_handle(&self) -> io::Result<ShutdownHandle> {
        let mut wake_addr = self.local_addr()?;
        if wake_addr.ip().is_unspecified() {
            wake_addr.set_ip(if wake_addr.is_ipv4() {
                Ipv4Addr::LOCALHOST.into()
            } else {
                Ipv6Addr::LOCALHOST.into()
            });
        }

        Ok(ShutdownHandle {
            stop: Arc::clone(&self.stop),
            wake_addr,
        })
    }

    /// Accept connections until shut down.
    ///
    /// Accept errors are logged and otherwise ignored.
    pub fn run(self) -> io::Result<()> {
        info!("Listening on {}", self.local_addr()?);

        for stream in self.listener.incoming() {
            if self.stop.load(Ordering::SeqCst) {
                break;
            }

            match stream {
                Ok(stream) => self.spawn_worker(stream),
                Err(e) => {
                    warn!("Failed to accept connection: {}", e);
                    thread::sleep(ACCEPT_BACKOFF);
                }
            }
        }

        info!("No longer accepting connections");
        Ok(())
    }

    fn spawn_worker(&self, stream: TcpStream) {
        let peer_name = stream
            .peer_addr()
            .map(|addr| addr.to_string())
            .unwrap_or_else(|_| "unknown-peer".to_owned());
        let context = Arc::clone(&self.context);
        let options = self.options.clone();

        let spawned = thread::Builder::new()
            .name("mailmap-connection".to_owned())
            .spawn(move || {
                let log_prefix =
                    LogPrefix::new(format!("mailmap:{}", peer_name));
                if let Err(e) = serve_connection(
                    stream,
                    &context,
                    &options,
                    log_prefix.clone(),
                ) {
                    warn!("{} Failed to send response: {}", log_prefix, e);
                }
            });

        // If the thread could not be started, the stream was dropped with the
        // closure, which closes the connection.
        if let Err(e) = spawned {
            warn!("Failed to start connection worker: {}", e);
        }
    }
}

/// Serve the single request on `stream` and close it.
pub fn serve_connection(
    stream: TcpStream,
    context: &HandlerContext,
    options: &ServerOptions,
    mut log_prefix: LogPrefix,
) -> io::Result<Response> {
    stream.set_read_timeout(options.read_timeout)?;
    stream.set_write_timeout(options.write_timeout)?;
    let _ = stream.set_nodelay(true);

    let mut reader = io::BufReader::new(DeadlineReader {
        stream: stream.try_clone()?,
        deadline: options.read_timeout.map(|timeout| Instant::now() + timeout),
    });
    let response = handle_request(
        &mut reader,
        context,
        options.delimiter,
        &mut log_prefix,
    );

    let mut writer = io::BufWriter::new(&stream);
    response.write_to(&mut writer)?;
    writer.flush()?;
    drop(writer);
    debug!("{} Sent {}", log_prefix, response.code());

    // Anything after the first line is never looked at
    let _ = stream.shutdown(Shutdown::Both);
    Ok(response)
}

/// Reads from a socket until a fixed instant.
///
/// The socket timeout alone only bounds each `read` call, so a client
/// trickling one byte at a time could hold the worker indefinitely. Before
/// every read the timeout is shortened to whatever remains.
struct DeadlineReader {
    stream: TcpStream,
    deadline: Option<Instant>,
}

impl Read for DeadlineReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if let Some(deadline) = self.deadline {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining < MIN_READ_TIMEOUT {
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "request not received in time",
                ));
            }

            self.stream.set_read_timeout(Some(remaining))?;
        }

        self.stream.read(buf)
    }
}

/// Read one request from `reader` and decide the response.
///
/// Every failure is turned into a response; the caller always has exactly
/// one line to send back.
pub fn handle_request(
    reader: &mut impl BufRead,
    context: &HandlerContext,
    delimiter: u8,
    log_prefix: &mut LogPrefix,
) -> Response {
    let request = match read_request(reader, delimiter) {
        Ok(request) => request,
        Err(e) => {
            warn!("{} {}", log_prefix, e);
            return Response::ProtocolError;
        }
    };

    let address = match parse_address(&request.raw_address) {
        Ok(address) => address,
        Err(e) => {
            warn!("{} {}: {:?}", log_prefix, e, request.raw_address);
            return Response::ProtocolError;
        }
    };

    log_prefix.set_recipient(address.to_string());
    dispatch(&request.command, &address, context, log_prefix)
}
