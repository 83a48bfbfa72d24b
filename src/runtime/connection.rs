//! Per-connection handler: two bounded buffers, the reverse transform,
//! and interest bookkeeping against the poll registry.
//!
//! A handler never removes itself; it reports a [`Disposition`] and the
//! reactor owns slab removal, so no callback can touch a freed handler.

use crate::runtime::fifo::{FifoBuffer, Transitions};
use crate::runtime::flow::FlowControl;
use mio::net::TcpStream;
use mio::{Interest, Registry, Token};
use std::io::{self, ErrorKind};
use std::net::SocketAddr;

/// Sent to every client before any of its data is processed.
pub const GREETING: &[u8] = b"Welcome to the reversed echo server. Enter your string:\n";

/// Reverses `chunk` in place, leaving the final byte where it is.
///
/// Keeping the last byte preserves a trailing delimiter such as a line
/// terminator. The transform applies to each physical chunk as read off
/// the socket, not to logical lines; a line split across reads is
/// reversed piecewise.
pub fn reverse_keep_last(chunk: &mut [u8]) {
    if chunk.len() > 1 {
        let last = chunk.len() - 1;
        chunk[..last].reverse();
    }
}

/// What the reactor should do with the connection after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Keep,
    Close,
}

pub struct Connection {
    stream: TcpStream,
    peer: SocketAddr,
    inbound: FifoBuffer,
    outbound: FifoBuffer,
    flow: FlowControl,
    /// Interest currently registered with the poll, if any.
    registered: Option<Interest>,
}

impl Connection {
    /// Builds the handler and enqueues the greeting, which flips the
    /// outbound buffer readable and arms write interest.
    pub fn new(stream: TcpStream, peer: SocketAddr, buffer_size: usize) -> Self {
        let mut conn = Self {
            stream,
            peer,
            inbound: FifoBuffer::new(buffer_size),
            outbound: FifoBuffer::new(buffer_size),
            flow: FlowControl::new(),
            registered: None,
        };
        let (_, flips) = conn.outbound.write(GREETING);
        conn.flow.apply(Transitions::default(), flips);
        conn
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }

    /// Initial registration with the poll; interest comes from flow
    /// control (READABLE plus WRITABLE for the pending greeting).
    pub fn register(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        if let Some(interest) = self.flow.interest() {
            registry.register(&mut self.stream, token, interest)?;
            self.registered = Some(interest);
        }
        Ok(())
    }

    pub fn deregister(&mut self, registry: &Registry) -> io::Result<()> {
        if self.registered.take().is_some() {
            registry.deregister(&mut self.stream)?;
        }
        Ok(())
    }

    /// Socket readable: drain the socket until it would block, the
    /// inbound buffer runs out of room, or the peer closes.
    ///
    /// mio readiness is edge-triggered: stopping short of `WouldBlock`
    /// while the buffer still has room would leave bytes queued in the
    /// kernel with no further event to deliver them. A zero-length read
    /// is an orderly peer close; any other error is a fault for the
    /// reactor to log.
    pub fn on_readable(&mut self, registry: &Registry, token: Token) -> io::Result<Disposition> {
        while self.inbound.is_writable() {
            match self.inbound.fill_from(&mut self.stream) {
                Ok((0, _)) => return Ok(Disposition::Close),
                Ok((_, flips)) => {
                    self.flow.apply(flips, Transitions::default());
                    self.pump();
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        self.sync_interest(registry, token)?;
        Ok(Disposition::Keep)
    }

    /// Socket writable: flush and pump until the outbound buffer is
    /// empty or the socket would block. Partial sends are normal; the
    /// buffer retains the remainder.
    ///
    /// The loop matters: when a flush empties the buffer and `pump`
    /// immediately refills it from a parked inbound chunk, the socket
    /// was writable the whole time, so no new WRITABLE event is coming.
    /// Stopping after one flush would strand the refilled bytes.
    pub fn on_writable(&mut self, registry: &Registry, token: Token) -> io::Result<Disposition> {
        while self.outbound.is_readable() {
            match self.outbound.flush_to(&mut self.stream) {
                Ok((0, _)) => {
                    return Err(io::Error::new(ErrorKind::WriteZero, "send returned 0"));
                }
                Ok((_, flips)) => {
                    self.flow.apply(Transitions::default(), flips);
                    self.pump();
                }
                Err(ref e) if e.kind() == ErrorKind::WouldBlock => break,
                Err(e) => return Err(e),
            }
        }
        self.sync_interest(registry, token)?;
        Ok(Disposition::Keep)
    }

    /// Moves the transformed inbound chunk into the outbound buffer.
    ///
    /// All-or-nothing: the chunk is enqueued only when the outbound
    /// buffer has room for the whole of it, and the inbound buffer is
    /// drained by exactly that count. A partial write of a reversed chunk
    /// would garble the byte order, so short outbound room parks the
    /// chunk until a flush frees space.
    fn pump(&mut self) {
        if !self.inbound.is_readable() || self.outbound.available() < self.inbound.used() {
            return;
        }
        let mut chunk = self.inbound.peek().to_vec();
        reverse_keep_last(&mut chunk);
        let (n, out_flips) = self.outbound.write(&chunk);
        let in_flips = self.inbound.drain(n);
        self.flow.apply(in_flips, out_flips);
    }

    /// Reconciles the registered poll interest with flow-control state.
    /// When both directions are suspended the stream is deregistered
    /// outright (mio has no empty interest set).
    fn sync_interest(&mut self, registry: &Registry, token: Token) -> io::Result<()> {
        let desired = self.flow.interest();
        if desired == self.registered {
            return Ok(());
        }
        match desired {
            Some(interest) if self.registered.is_some() => {
                registry.reregister(&mut self.stream, token, interest)?;
            }
            Some(interest) => {
                registry.register(&mut self.stream, token, interest)?;
            }
            None => {
                registry.deregister(&mut self.stream)?;
            }
        }
        self.registered = desired;
        Ok(())
    }
}
