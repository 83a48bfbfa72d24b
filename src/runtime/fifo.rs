//! Fixed-capacity FIFO byte buffer with readiness tracking.
//!
//! Each connection owns two of these (inbound and outbound). The buffer
//! never allocates after construction and never grows past its capacity.
//!
//! Readiness is a pair of derived booleans: `readable` (holds data) and
//! `writable` (has room). Every mutating operation reports the boundary
//! crossings it caused as a [`Transitions`] value, so the caller sees each
//! empty<->non-empty and full<->non-full flip exactly once. Mutations that
//! stay on the same side of a boundary report nothing for that flag.

#![allow(dead_code)] // the buffer API is wider than what the handler touches

use std::io::{self, Read, Write};

/// Readiness flips produced by a single buffer mutation.
///
/// `Some(v)` means the corresponding readiness flag just changed to `v`;
/// `None` means it did not cross its boundary.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Transitions {
    pub readable: Option<bool>,
    pub writable: Option<bool>,
}

impl Transitions {
    pub fn is_empty(&self) -> bool {
        self.readable.is_none() && self.writable.is_none()
    }
}

/// Bounded byte queue backed by a contiguous slab with front compaction.
pub struct FifoBuffer {
    storage: Box<[u8]>,
    used: usize,
}

impl FifoBuffer {
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "buffer capacity must be non-zero");
        Self {
            storage: vec![0u8; capacity].into_boxed_slice(),
            used: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.storage.len()
    }

    pub fn used(&self) -> usize {
        self.used
    }

    /// Free space remaining.
    pub fn available(&self) -> usize {
        self.storage.len() - self.used
    }

    pub fn is_readable(&self) -> bool {
        self.used > 0
    }

    pub fn is_writable(&self) -> bool {
        self.used < self.storage.len()
    }

    /// Copies as many bytes as fit into the remaining capacity.
    ///
    /// Returns the count actually written (0 if full) and any readiness
    /// flips. Never blocks, never overflows the storage.
    pub fn write(&mut self, bytes: &[u8]) -> (usize, Transitions) {
        let before = self.flags();
        let n = self.available().min(bytes.len());
        self.storage[self.used..self.used + n].copy_from_slice(&bytes[..n]);
        self.used += n;
        (n, self.diff(before))
    }

    /// The bytes currently held, without removing them.
    pub fn peek(&self) -> &[u8] {
        &self.storage[..self.used]
    }

    /// Copies up to `out.len()` held bytes into `out` and drains them.
    pub fn read(&mut self, out: &mut [u8]) -> (usize, Transitions) {
        let n = self.used.min(out.len());
        out[..n].copy_from_slice(&self.storage[..n]);
        (n, self.drain(n))
    }

    /// Removes the first `n` held bytes.
    ///
    /// # Panics
    /// Draining more than `used()` is a contract violation, not a runtime
    /// condition, and panics.
    pub fn drain(&mut self, n: usize) -> Transitions {
        assert!(
            n <= self.used,
            "drain past fill level: {} > {}",
            n,
            self.used
        );
        let before = self.flags();
        self.storage.copy_within(n..self.used, 0);
        self.used -= n;
        self.diff(before)
    }

    /// Reads from `r` directly into the free region.
    ///
    /// The caller must check `is_writable()` first; with no free space a
    /// zero-length read would be indistinguishable from EOF.
    pub fn fill_from<R: Read>(&mut self, r: &mut R) -> io::Result<(usize, Transitions)> {
        let before = self.flags();
        let n = r.read(&mut self.storage[self.used..])?;
        self.used += n;
        Ok((n, self.diff(before)))
    }

    /// Writes the held bytes to `w` and drains however many it accepted.
    pub fn flush_to<W: Write>(&mut self, w: &mut W) -> io::Result<(usize, Transitions)> {
        let n = w.write(&self.storage[..self.used])?;
        Ok((n, self.drain(n)))
    }

    fn flags(&self) -> (bool, bool) {
        (self.is_readable(), self.is_writable())
    }

    fn diff(&self, before: (bool, bool)) -> Transitions {
        let after = self.flags();
        Transitions {
            readable: (before.0 != after.0).then_some(after.0),
            writable: (before.1 != after.1).then_some(after.1),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_truncates_at_capacity() {
        let mut buf = FifoBuffer::new(4);

        let (n, _) = buf.write(b"abcdef");
        assert_eq!(n, 4);
        assert_eq!(buf.used(), 4);
        assert_eq!(buf.peek(), b"abcd");

        // Full buffer accepts nothing
        let (n, flips) = buf.write(b"xy");
        assert_eq!(n, 0);
        assert!(flips.is_empty());
        assert_eq!(buf.used(), 4);
    }

    #[test]
    fn test_readable_flips_only_on_boundary() {
        let mut buf = FifoBuffer::new(8);

        let (_, flips) = buf.write(b"ab");
        assert_eq!(flips.readable, Some(true)); // empty -> non-empty
        assert_eq!(flips.writable, None);

        let (_, flips) = buf.write(b"cd");
        assert!(flips.is_empty()); // no crossing

        let flips = buf.drain(3);
        assert!(flips.is_empty());

        let flips = buf.drain(1);
        assert_eq!(flips.readable, Some(false)); // non-empty -> empty
        assert_eq!(flips.writable, None);
    }

    #[test]
    fn test_writable_flips_only_on_boundary() {
        let mut buf = FifoBuffer::new(4);

        let (_, flips) = buf.write(b"abcd");
        assert_eq!(flips.writable, Some(false)); // non-full -> full
        assert_eq!(flips.readable, Some(true));

        let flips = buf.drain(1);
        assert_eq!(flips.writable, Some(true)); // full -> non-full
        assert_eq!(flips.readable, None);

        let flips = buf.drain(1);
        assert!(flips.is_empty());
    }

    #[test]
    fn test_read_copies_and_drains() {
        let mut buf = FifoBuffer::new(8);
        buf.write(b"hello");

        let mut out = [0u8; 3];
        let (n, flips) = buf.read(&mut out);
        assert_eq!(n, 3);
        assert_eq!(&out, b"hel");
        assert!(flips.is_empty());
        assert_eq!(buf.peek(), b"lo");
    }

    #[test]
    fn test_used_never_exceeds_capacity() {
        let mut buf = FifoBuffer::new(8);
        for _ in 0..100 {
            buf.write(b"abc");
            assert!(buf.used() <= buf.capacity());
            let n = buf.used().min(2);
            buf.drain(n);
        }
    }

    #[test]
    #[should_panic(expected = "drain past fill level")]
    fn test_drain_past_fill_panics() {
        let mut buf = FifoBuffer::new(8);
        buf.write(b"ab");
        buf.drain(3);
    }

    #[test]
    fn test_fill_and_flush_through_io() {
        let mut buf = FifoBuffer::new(4);

        let mut src: &[u8] = b"abcdef";
        let (n, flips) = buf.fill_from(&mut src).unwrap();
        assert_eq!(n, 4); // capped at free space
        assert_eq!(flips.readable, Some(true));
        assert_eq!(flips.writable, Some(false));

        let mut sink = Vec::new();
        let (n, flips) = buf.flush_to(&mut sink).unwrap();
        assert_eq!(n, 4);
        assert_eq!(sink, b"abcd");
        assert_eq!(flips.readable, Some(false));
        assert_eq!(flips.writable, Some(true));
    }
}
