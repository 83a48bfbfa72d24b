//! Flow control: buffer readiness flips drive socket interest.
//!
//! The reaction table is fixed:
//!
//! | buffer flip                    | socket interest  |
//! |--------------------------------|------------------|
//! | outbound readable (has data)   | +WRITABLE        |
//! | outbound drained empty         | -WRITABLE        |
//! | inbound writable (has room)    | +READABLE        |
//! | inbound full                   | -READABLE        |
//!
//! This is the backpressure chain: a peer that stops reading leaves the
//! outbound buffer full, which parks transformed data, which fills the
//! inbound buffer, which disables socket reads.

use crate::runtime::fifo::Transitions;
use mio::Interest;

pub struct FlowControl {
    read: bool,
    write: bool,
}

impl FlowControl {
    /// Both buffers start empty: inbound has room, outbound has nothing
    /// to send.
    pub fn new() -> Self {
        Self {
            read: true,
            write: false,
        }
    }

    /// Fold one mutation's flips from each buffer into the interest state.
    ///
    /// Only the inbound `writable` and outbound `readable` flips matter;
    /// the other two axes have no interest consequence.
    pub fn apply(&mut self, inbound: Transitions, outbound: Transitions) {
        if let Some(writable) = inbound.writable {
            self.read = writable;
        }
        if let Some(readable) = outbound.readable {
            self.write = readable;
        }
    }

    /// The interest set the connection should currently be registered
    /// with, or `None` when both directions are suspended.
    pub fn interest(&self) -> Option<Interest> {
        match (self.read, self.write) {
            (true, true) => Some(Interest::READABLE | Interest::WRITABLE),
            (true, false) => Some(Interest::READABLE),
            (false, true) => Some(Interest::WRITABLE),
            (false, false) => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flips(readable: Option<bool>, writable: Option<bool>) -> Transitions {
        Transitions { readable, writable }
    }

    #[test]
    fn test_initial_interest_is_readable() {
        let flow = FlowControl::new();
        assert_eq!(flow.interest(), Some(Interest::READABLE));
    }

    #[test]
    fn test_outbound_readable_toggles_write_interest() {
        let mut flow = FlowControl::new();

        flow.apply(Transitions::default(), flips(Some(true), None));
        assert_eq!(
            flow.interest(),
            Some(Interest::READABLE | Interest::WRITABLE)
        );

        flow.apply(Transitions::default(), flips(Some(false), None));
        assert_eq!(flow.interest(), Some(Interest::READABLE));
    }

    #[test]
    fn test_inbound_full_suspends_read_interest() {
        let mut flow = FlowControl::new();

        flow.apply(flips(None, Some(false)), Transitions::default());
        assert_eq!(flow.interest(), None);

        flow.apply(flips(None, Some(true)), Transitions::default());
        assert_eq!(flow.interest(), Some(Interest::READABLE));
    }

    #[test]
    fn test_irrelevant_flips_are_ignored() {
        let mut flow = FlowControl::new();

        // Inbound readable and outbound writable flips carry no interest
        // consequence.
        flow.apply(flips(Some(true), None), flips(None, Some(false)));
        assert_eq!(flow.interest(), Some(Interest::READABLE));
    }

    #[test]
    fn test_backpressure_chain() {
        let mut flow = FlowControl::new();

        // Greeting enqueued: outbound non-empty.
        flow.apply(Transitions::default(), flips(Some(true), None));
        // Inbound fills while the peer refuses to read.
        flow.apply(flips(None, Some(false)), Transitions::default());
        assert_eq!(flow.interest(), Some(Interest::WRITABLE));
    }
}
