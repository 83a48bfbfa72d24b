//! Event-driven runtime: bounded buffers, flow control, connection
//! handlers, and the mio reactor that drives them.
//!
//! Everything here runs on the single reactor thread; the only
//! cross-thread surface is [`ReactorHandle`].

mod connection;
mod event_loop;
mod fifo;
mod flow;

pub use event_loop::{Reactor, ReactorHandle};
