//! Fixed-capacity Sample Queue
//!
//! `RingBuffer` decouples the cadence of a producer (render ticks of a fixed
//! size) from the cadence of a consumer (device callbacks that may ask for
//! any block size). Storage is allocated once at construction.
//!
//! The cursors `first` and `last` only ever grow, so the occupancy is simply
//! `last - first` and never goes negative after a wrap.
//!
//! The queue reports its state and leaves policy to the caller: a full queue
//! rejects `enqueue` (or overwrites via the explicit `enqueue_overwrite`), an
//! empty queue returns `None` from `dequeue`. It never blocks.

use crate::error::DspError;

/// Single-owner circular queue of samples
#[derive(Debug, Clone)]
pub struct RingBuffer {
    buffer: Box<[f32]>,
    first: u64,
    last: u64,
}

impl RingBuffer {
    pub fn new(capacity: usize) -> Result<Self, DspError> {
        if capacity == 0 {
            return Err(DspError::InvalidCapacity(capacity));
        }
        Ok(Self {
            buffer: vec![0.0; capacity].into_boxed_slice(),
            first: 0,
            last: 0,
        })
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Amount of queued samples
    #[inline]
    pub fn size(&self) -> usize {
        (self.last - self.first) as usize
    }

    /// Free slots left before the queue is full
    #[inline]
    pub fn available(&self) -> usize {
        self.capacity() - self.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.first == self.last
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.size() == self.capacity()
    }

    #[inline]
    fn slot(&self, cursor: u64) -> usize {
        (cursor % self.buffer.len() as u64) as usize
    }

    /// Append a sample. Returns false, leaving the queue untouched, when full.
    #[inline]
    pub fn enqueue(&mut self, sample: f32) -> bool {
        if self.is_full() {
            return false;
        }
        let slot = self.slot(self.last);
        self.buffer[slot] = sample;
        self.last += 1;
        true
    }

    /// Append a sample, discarding the oldest one when full
    #[inline]
    pub fn enqueue_overwrite(&mut self, sample: f32) {
        if self.is_full() {
            self.first += 1;
        }
        let slot = self.slot(self.last);
        self.buffer[slot] = sample;
        self.last += 1;
    }

    /// Remove the oldest sample, `None` on underrun
    #[inline]
    pub fn dequeue(&mut self) -> Option<f32> {
        if self.is_empty() {
            return None;
        }
        let sample = self.buffer[self.slot(self.first)];
        self.first += 1;
        Some(sample)
    }

    /// Oldest sample without removing it
    #[inline]
    pub fn peek(&self) -> Option<f32> {
        if self.is_empty() {
            None
        } else {
            Some(self.buffer[self.slot(self.first)])
        }
    }

    /// Append as many samples from `samples` as fit, returning the count
    pub fn enqueue_slice(&mut self, samples: &[f32]) -> usize {
        let count = samples.len().min(self.available());
        for &sample in &samples[..count] {
            let slot = self.slot(self.last);
            self.buffer[slot] = sample;
            self.last += 1;
        }
        count
    }

    /// Fill `out` from the queue, returning the count actually dequeued
    pub fn dequeue_into(&mut self, out: &mut [f32]) -> usize {
        let count = out.len().min(self.size());
        for sample in &mut out[..count] {
            *sample = self.buffer[self.slot(self.first)];
            self.first += 1;
        }
        count
    }

    /// Zero the storage and reset both cursors
    pub fn flush(&mut self) {
        self.buffer.fill(0.0);
        self.first = 0;
        self.last = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_capacity_rejected() {
        assert!(RingBuffer::new(0).is_err());
    }

    #[test]
    fn test_fresh_buffer_is_empty() {
        let ring = RingBuffer::new(8).unwrap();
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert_eq!(ring.size(), 0);
        assert_eq!(ring.capacity(), 8);
        assert_eq!(ring.peek(), None);
    }

    #[test]
    fn test_full_after_capacity_writes() {
        let mut ring = RingBuffer::new(4).unwrap();
        for i in 0..4 {
            assert!(ring.enqueue(i as f32));
        }
        assert!(ring.is_full());
        assert_eq!(ring.available(), 0);

        // Full queue reports instead of dropping
        assert!(!ring.enqueue(9.0));
        assert_eq!(ring.peek(), Some(0.0));
    }

    #[test]
    fn test_fifo_order_across_wrap() {
        let mut ring = RingBuffer::new(3).unwrap();
        for round in 0..5 {
            let base = round as f32 * 10.0;
            ring.enqueue(base);
            ring.enqueue(base + 1.0);
            assert_eq!(ring.dequeue(), Some(base));
            assert_eq!(ring.dequeue(), Some(base + 1.0));
            assert!(ring.size() <= ring.capacity());
        }
        assert_eq!(ring.dequeue(), None);
    }

    #[test]
    fn test_overwrite_drops_oldest() {
        let mut ring = RingBuffer::new(2).unwrap();
        ring.enqueue_overwrite(1.0);
        ring.enqueue_overwrite(2.0);
        ring.enqueue_overwrite(3.0);

        assert_eq!(ring.size(), 2);
        assert_eq!(ring.dequeue(), Some(2.0));
        assert_eq!(ring.dequeue(), Some(3.0));
    }

    #[test]
    fn test_bulk_operations() {
        let mut ring = RingBuffer::new(5).unwrap();
        assert_eq!(ring.enqueue_slice(&[1.0, 2.0, 3.0, 4.0, 5.0, 6.0]), 5);

        let mut out = [0.0; 3];
        assert_eq!(ring.dequeue_into(&mut out), 3);
        assert_eq!(out, [1.0, 2.0, 3.0]);

        let mut rest = [0.0; 4];
        assert_eq!(ring.dequeue_into(&mut rest), 2);
        assert_eq!(&rest[..2], &[4.0, 5.0]);
        assert!(ring.is_empty());
    }

    #[test]
    fn test_flush() {
        let mut ring = RingBuffer::new(4).unwrap();
        ring.enqueue_slice(&[0.5, 0.5]);
        ring.flush();
        assert!(ring.is_empty());
        assert_eq!(ring.dequeue(), None);
    }
}
