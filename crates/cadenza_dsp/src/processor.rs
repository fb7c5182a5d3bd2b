//! Audio Processor Trait
//!
//! Defines the interface for chainable audio processors and the
//! `ProcessingChain` that owns them. Chains are built per bus
//! (channel, group, master) and applied once per render tick.

use std::any::Any;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::buffer::AudioBuffer;

/// Context describing the stream a pipeline renders for
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessContext {
    pub sample_rate: f32,
    pub channels: usize,
    pub buffer_size: usize,
}

impl ProcessContext {
    pub fn new(sample_rate: f32, channels: usize, buffer_size: usize) -> Self {
        Self {
            sample_rate,
            channels,
            buffer_size,
        }
    }
}

/// Trait for audio processors in a `ProcessingChain`
///
/// # Real-time Safety Contract
///
/// Implementors MUST follow these rules in `process()`:
/// - NO heap allocations (no Vec::push, no Box::new, no String)
/// - NO syscalls (no file I/O, no network, no mutex locks)
/// - NO unbounded loops
/// - Constant or O(n) time complexity where n = buffer size
///
/// Every buffer, table and delay line a processor needs is allocated in
/// its constructor.
pub trait AudioProcessor: Send {
    /// Process a buffer in-place
    ///
    /// `is_mono_source` is true when the content of channel 0 is duplicated
    /// across the buffer, in which case processors only need to compute
    /// channel 0 and may copy the result to the other channels.
    fn process(&mut self, buffer: &mut AudioBuffer, is_mono_source: bool);

    /// Reset internal state (delay lines, envelopes, etc.)
    fn reset(&mut self);

    /// Human-readable name for debugging/UI
    fn name(&self) -> &'static str;

    /// Whether output for an unchanged input may be reused across ticks
    ///
    /// Processors carrying state over time (smoothers, delay lines,
    /// modulators) must return false.
    fn is_cacheable(&self) -> bool {
        false
    }

    /// Samples of tail the processor appends after its input ends
    fn added_duration_in_samples(&self) -> usize {
        0
    }

    /// Whether this processor is currently enabled
    fn is_enabled(&self) -> bool {
        true
    }

    /// Downcasting hook used to edit a boxed processor's parameters
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Stable handle of a processor inside a chain
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ProcessorId(u64);

impl ProcessorId {
    /// Allocate a process-wide unique id
    pub fn next() -> Self {
        static NEXT_ID: AtomicU64 = AtomicU64::new(1);
        Self(NEXT_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

/// Processor slots reserved by every chain
pub const MAX_PROCESSORS: usize = 32;

/// An ordered chain of processors applied sequentially
///
/// The chain owns its processors outright. Removing one hands ownership
/// back to the caller, so a processor can never be visited after it has
/// left the chain.
pub struct ProcessingChain {
    processors: Vec<(ProcessorId, Box<dyn AudioProcessor>)>,
}

impl Default for ProcessingChain {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingChain {
    pub fn new() -> Self {
        Self {
            processors: Vec::with_capacity(MAX_PROCESSORS),
        }
    }

    /// Add a processor to the end of the chain
    ///
    /// Note: This allocates. Only call during setup, not in audio callback.
    pub fn add<P: AudioProcessor + 'static>(&mut self, processor: P) -> ProcessorId {
        let id = ProcessorId::next();
        self.processors.push((id, Box::new(processor)));
        id
    }

    /// Append an already boxed processor under a caller-chosen id
    ///
    /// Never grows the chain's storage, so it is safe on the render thread.
    /// When `id` is already in the chain or every reserved slot is taken,
    /// the processor is handed back in `Err`.
    pub fn add_with_id(
        &mut self,
        id: ProcessorId,
        processor: Box<dyn AudioProcessor>,
    ) -> Result<(), Box<dyn AudioProcessor>> {
        if self.is_full() || self.contains(id) {
            return Err(processor);
        }
        self.processors.push((id, processor));
        Ok(())
    }

    /// Remove a processor, keeping the order of the remaining ones
    pub fn remove(&mut self, id: ProcessorId) -> Option<Box<dyn AudioProcessor>> {
        let index = self.processors.iter().position(|(pid, _)| *pid == id)?;
        Some(self.processors.remove(index).1)
    }

    pub fn contains(&self, id: ProcessorId) -> bool {
        self.processors.iter().any(|(pid, _)| *pid == id)
    }

    pub fn processor_at(&self, index: usize) -> Option<&dyn AudioProcessor> {
        self.processors.get(index).map(|(_, p)| p.as_ref())
    }

    pub fn get_mut(&mut self, id: ProcessorId) -> Option<&mut (dyn AudioProcessor + 'static)> {
        self.processors
            .iter_mut()
            .find(|(pid, _)| *pid == id)
            .map(|(_, p)| p.as_mut())
    }

    /// Typed access to a processor, `None` when the id is unknown or the
    /// processor is of another type
    pub fn get_mut_as<T: AudioProcessor + 'static>(&mut self, id: ProcessorId) -> Option<&mut T> {
        self.get_mut(id)?.as_any_mut().downcast_mut::<T>()
    }

    /// Processor ids in application order
    pub fn ids(&self) -> impl Iterator<Item = ProcessorId> + '_ {
        self.processors.iter().map(|(id, _)| *id)
    }

    /// Process buffer through all enabled processors
    #[inline]
    pub fn process(&mut self, buffer: &mut AudioBuffer, is_mono_source: bool) {
        for (_, processor) in &mut self.processors {
            if processor.is_enabled() {
                processor.process(buffer, is_mono_source);
            }
        }
    }

    /// Whether the chain's output may be cached for unchanged input
    pub fn is_cacheable(&self) -> bool {
        self.processors.iter().all(|(_, p)| p.is_cacheable())
    }

    /// Longest tail appended by any processor in the chain
    pub fn added_duration_in_samples(&self) -> usize {
        self.processors
            .iter()
            .map(|(_, p)| p.added_duration_in_samples())
            .max()
            .unwrap_or(0)
    }

    /// Reset the state of all processors
    pub fn reset(&mut self) {
        for (_, processor) in &mut self.processors {
            processor.reset();
        }
    }

    /// Remove every processor
    pub fn clear(&mut self) {
        self.processors.clear();
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// Whether another processor would need a reallocation
    pub fn is_full(&self) -> bool {
        self.processors.len() >= self.processors.capacity()
    }
}

impl std::fmt::Debug for ProcessingChain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.processors.iter().map(|(id, p)| (id.0, p.name())))
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Test processor that multiplies every sample by a constant
    struct Multiply(f32);

    impl AudioProcessor for Multiply {
        fn process(&mut self, buffer: &mut AudioBuffer, _is_mono_source: bool) {
            buffer.adjust_buffer_volumes(self.0);
        }

        fn reset(&mut self) {}

        fn name(&self) -> &'static str {
            "Multiply"
        }

        fn is_cacheable(&self) -> bool {
            true
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    /// Test processor that adds a constant
    struct Offset(f32);

    impl AudioProcessor for Offset {
        fn process(&mut self, buffer: &mut AudioBuffer, _is_mono_source: bool) {
            for c in 0..buffer.amount_of_channels() {
                for s in buffer.channel_mut(c) {
                    *s += self.0;
                }
            }
        }

        fn reset(&mut self) {}

        fn name(&self) -> &'static str {
            "Offset"
        }

        fn as_any_mut(&mut self) -> &mut dyn Any {
            self
        }
    }

    fn buffer_of(value: f32) -> AudioBuffer {
        let mut buffer = AudioBuffer::new(2, 4).unwrap();
        buffer.channel_mut(0).fill(value);
        buffer.channel_mut(1).fill(value);
        buffer
    }

    #[test]
    fn test_empty_chain() {
        let mut chain = ProcessingChain::new();
        assert!(chain.is_empty());

        let mut buffer = buffer_of(0.5);
        chain.process(&mut buffer, false);
        assert_eq!(buffer.channel(0)[0], 0.5);
    }

    #[test]
    fn test_processor_chain_order() {
        let mut chain = ProcessingChain::new();
        chain.add(Multiply(2.0));
        chain.add(Offset(1.0));

        let mut buffer = buffer_of(0.5);
        chain.process(&mut buffer, false);

        // (0.5 * 2) + 1, not (0.5 + 1) * 2
        assert_eq!(buffer.channel(0)[0], 2.0);
    }

    #[test]
    fn test_remove_mid_chain_preserves_order() {
        let mut chain = ProcessingChain::new();
        let a = chain.add(Multiply(2.0));
        let b = chain.add(Offset(1.0));
        let c = chain.add(Multiply(3.0));

        let removed = chain.remove(b);
        assert!(removed.is_some());
        assert_eq!(removed.unwrap().name(), "Offset");

        assert_eq!(chain.len(), 2);
        assert_eq!(chain.ids().collect::<Vec<_>>(), vec![a, c]);
        assert!(!chain.contains(b));
        assert!(chain.remove(b).is_none());

        let mut buffer = buffer_of(1.0);
        chain.process(&mut buffer, false);
        assert_eq!(buffer.channel(1)[0], 6.0);
    }

    #[test]
    fn test_add_with_duplicate_id_rejected() {
        let mut chain = ProcessingChain::new();
        let id = ProcessorId::next();
        assert!(chain.add_with_id(id, Box::new(Offset(1.0))).is_ok());
        assert!(chain.add_with_id(id, Box::new(Offset(2.0))).is_err());
        assert_eq!(chain.len(), 1);
    }

    #[test]
    fn test_full_chain_hands_processor_back() {
        let mut chain = ProcessingChain::new();
        for _ in 0..MAX_PROCESSORS {
            assert!(chain.add_with_id(ProcessorId::next(), Box::new(Offset(0.0))).is_ok());
        }
        assert!(chain.is_full());

        let rejected = chain.add_with_id(ProcessorId::next(), Box::new(Multiply(2.0)));
        assert_eq!(rejected.err().map(|p| p.name()), Some("Multiply"));
        assert_eq!(chain.len(), MAX_PROCESSORS);

        let first = chain.ids().next().unwrap();
        chain.remove(first);
        assert!(!chain.is_full());
        assert!(chain.add_with_id(ProcessorId::next(), Box::new(Multiply(2.0))).is_ok());
    }

    #[test]
    fn test_typed_access() {
        let mut chain = ProcessingChain::new();
        let id = chain.add(Multiply(2.0));

        chain.get_mut_as::<Multiply>(id).unwrap().0 = 4.0;
        assert!(chain.get_mut_as::<Offset>(id).is_none());

        let mut buffer = buffer_of(0.25);
        chain.process(&mut buffer, false);
        assert_eq!(buffer.channel(0)[0], 1.0);
        assert_eq!(chain.processor_at(0).unwrap().name(), "Multiply");
        assert!(chain.processor_at(1).is_none());
    }

    #[test]
    fn test_cacheable_only_when_all_are() {
        let mut chain = ProcessingChain::new();
        chain.add(Multiply(1.0));
        assert!(chain.is_cacheable());

        chain.add(Offset(0.0));
        assert!(!chain.is_cacheable());

        chain.clear();
        assert!(chain.is_empty());
    }

    #[test]
    fn test_ids_are_unique() {
        let a = ProcessorId::next();
        let b = ProcessorId::next();
        assert_ne!(a, b);
        assert!(b.get() > a.get());
    }

    #[test]
    fn test_process_context() {
        let ctx = ProcessContext::new(48000.0, 2, 512);
        assert_eq!(ctx.sample_rate, 48000.0);
        assert_eq!(ctx.channels, 2);
        assert_eq!(ctx.buffer_size, 512);
    }
}
