//! Single-threaded mio reactor.
//!
//! One poll loop drives the listening socket and every connection.
//! Connections live in a slab keyed by their poll token; the reactor is
//! the only owner, so a handler destroyed mid-batch is simply absent from
//! the slab when a stale event for it arrives. `ReactorHandle::stop()`
//! flips an atomic flag and wakes the poll; the loop exits after the
//! in-flight dispatch batch completes.

use crate::config::Config;
use crate::runtime::connection::{Connection, Disposition};
use mio::event::Event;
use mio::net::TcpListener;
use mio::{Events, Interest, Poll, Token, Waker};
use slab::Slab;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

const LISTENER: Token = Token(usize::MAX);
const WAKER: Token = Token(usize::MAX - 1);
const EVENTS_CAPACITY: usize = 1024;

pub struct Reactor {
    poll: Poll,
    listener: TcpListener,
    connections: Slab<Connection>,
    stop: Arc<AtomicBool>,
    max_connections: usize,
    buffer_size: usize,
}

/// Cross-thread control for a running reactor. The only state shared
/// with the loop is the stop flag and the waker.
pub struct ReactorHandle {
    waker: Arc<Waker>,
    stop: Arc<AtomicBool>,
}

impl ReactorHandle {
    /// Ask the reactor loop to exit once the current dispatch batch
    /// finishes. Safe to call from any thread, any number of times.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
        if let Err(e) = self.waker.wake() {
            warn!(error = %e, "Failed to wake reactor");
        }
    }
}

impl Reactor {
    pub fn new(config: &Config) -> io::Result<(Reactor, ReactorHandle)> {
        let addr: SocketAddr = format!("{}:{}", config.host, config.port)
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let poll = Poll::new()?;
        let waker = Arc::new(Waker::new(poll.registry(), WAKER)?);

        let mut listener = TcpListener::from_std(create_listener(addr)?);
        poll.registry()
            .register(&mut listener, LISTENER, Interest::READABLE)?;

        let stop = Arc::new(AtomicBool::new(false));
        let handle = ReactorHandle {
            waker,
            stop: Arc::clone(&stop),
        };

        Ok((
            Reactor {
                poll,
                listener,
                connections: Slab::with_capacity(config.max_connections),
                stop,
                max_connections: config.max_connections,
                buffer_size: config.buffer_size,
            },
            handle,
        ))
    }

    /// Address the listener is actually bound to (useful with port 0).
    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the poll loop on the current thread until `stop()` is observed.
    pub fn run(&mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(EVENTS_CAPACITY);
        let addr = self.local_addr()?;
        info!(%addr, "Reactor started");

        loop {
            if let Err(e) = self.poll.poll(&mut events, None) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(e);
            }

            for event in events.iter() {
                match event.token() {
                    LISTENER => self.accept(),
                    WAKER => {} // stop flag checked after the batch
                    token => self.dispatch(token, event),
                }
            }

            if self.stop.load(Ordering::Relaxed) {
                break;
            }
        }

        info!(connections = self.connections.len(), "Reactor stopped");
        Ok(())
    }

    fn accept(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => {
                    if self.connections.len() >= self.max_connections {
                        warn!(%peer, "Connection limit reached, dropping");
                        continue;
                    }

                    let entry = self.connections.vacant_entry();
                    let id = entry.key();
                    let mut conn = Connection::new(stream, peer, self.buffer_size);
                    if let Err(e) = conn.register(self.poll.registry(), Token(id)) {
                        error!(%peer, error = %e, "Failed to register connection");
                        continue;
                    }
                    entry.insert(conn);
                    info!(conn_id = id, %peer, "Connection accepted");
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    error!(error = %e, "Accept error");
                    break;
                }
            }
        }
    }

    fn dispatch(&mut self, token: Token, event: &Event) {
        let id = token.0;
        if !self.connections.contains(id) {
            // Closed earlier in this batch; stale event.
            return;
        }
        match self.handle_event(id, event) {
            Ok(Disposition::Keep) => {}
            Ok(Disposition::Close) => self.close(id, None),
            Err(e) => self.close(id, Some(e)),
        }
    }

    fn handle_event(&mut self, id: usize, event: &Event) -> io::Result<Disposition> {
        let registry = self.poll.registry();
        let conn = self
            .connections
            .get_mut(id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "connection not found"))?;

        if event.is_readable() && conn.on_readable(registry, Token(id))? == Disposition::Close {
            return Ok(Disposition::Close);
        }
        if event.is_writable() && conn.on_writable(registry, Token(id))? == Disposition::Close {
            return Ok(Disposition::Close);
        }
        if event.is_read_closed() {
            // Peer half-close or transport shutdown.
            return Ok(Disposition::Close);
        }
        Ok(Disposition::Keep)
    }

    /// Terminate one connection: remove from the slab, deregister, log.
    /// A fault is reported; an orderly close is routine.
    fn close(&mut self, id: usize, fault: Option<io::Error>) {
        if let Some(mut conn) = self.connections.try_remove(id) {
            match fault {
                Some(e) => warn!(conn_id = id, peer = %conn.peer(), error = %e, "Connection fault"),
                None => info!(conn_id = id, peer = %conn.peer(), "Connection closed"),
            }
            if let Err(e) = conn.deregister(self.poll.registry()) {
                debug!(conn_id = id, error = %e, "Deregister failed");
            }
        }
    }
}

/// Listener setup via socket2: SO_REUSEADDR and nonblocking mode before
/// handing the fd to mio.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(1024)?;

    Ok(socket.into())
}
