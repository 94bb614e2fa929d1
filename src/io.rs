//! Traits for the peripherals driven by the engine, and the types passed
//! across them.
//!
//! # Possible implementations
//!
//! - [`ProbePort`]: a volatile read of a GPIO port's input data register
//! - [`SampleClock`]: a periodic timer, such as a PIT channel, which paces
//!   the transfer engine
//! - [`Transfer`]: a DMA channel, triggered by the sample clock, copying the
//!   port's input data register into the sample buffer
//!
//! Byte transports are defined alongside the dispatchers, see
//! [`crate::dispatcher::Transport`].
//!
//! # Buffer ownership
//!
//! The [`SampleBuffer`] is passed by value.  [`Transfer::prepare()`] takes
//! ownership for the duration of the capture, and the buffer is returned
//! either inside the [`TransferEvent`] posted on completion, or by
//! [`Transfer::abort()`].  Whoever holds the buffer has exclusive access to
//! it, so there is no window where the transfer engine and the sample
//! stream encoder can both see it.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use crate::config::BUFFER_CAPACITY;

/// Depth of the completion event queue.  `heapless` queues hold one fewer
/// item than their length.
pub const EVENT_QUEUE_LEN: usize = 4;

/// Completion event queue, from the transfer engine's interrupt handler to
/// the dispatcher
pub type EventQueue = heapless::spsc::Queue<TransferEvent, EVENT_QUEUE_LEN>;

/// Interrupt side of the [`EventQueue`]
pub type EventProducer<'q> = heapless::spsc::Producer<'q, TransferEvent, EVENT_QUEUE_LEN>;

/// Dispatcher side of the [`EventQueue`]
pub type EventConsumer<'q> = heapless::spsc::Consumer<'q, TransferEvent, EVENT_QUEUE_LEN>;

/// Sample storage, one byte per sample.
pub struct SampleBuffer(&'static mut [u8; BUFFER_CAPACITY]);

impl SampleBuffer {
    /// Wrap the sample storage.
    ///
    /// ```rust,ignore
    /// let storage = cortex_m::singleton!(: [u8; BUFFER_CAPACITY] = [0; BUFFER_CAPACITY]).unwrap();
    /// let buffer = SampleBuffer::new(storage);
    /// ```
    pub fn new(storage: &'static mut [u8; BUFFER_CAPACITY]) -> Self {
        Self(storage)
    }

    pub fn as_slice(&self) -> &[u8] {
        self.0.as_slice()
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        self.0.as_mut_slice()
    }

    /// Destination address for the transfer engine
    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.0.as_mut_ptr()
    }
}

impl core::fmt::Debug for SampleBuffer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "SampleBuffer({:p})", self.0.as_ptr())
    }
}

/// Block transfer programming, from the probe port to the sample buffer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferSetup {
    /// Address of the probe port input register
    pub source_addr: u32,
    /// Bytes read from the source per element
    pub source_width: u8,
    /// Bytes written to the buffer per element
    pub dest_width: u8,
    /// Number of elements (samples) to transfer
    pub element_count: usize,
}

impl TransferSetup {
    /// One byte per sample, from `source_addr`
    pub fn byte_samples(source_addr: u32, element_count: usize) -> Self {
        Self {
            source_addr,
            source_width: 1,
            dest_width: 1,
            element_count,
        }
    }
}

/// Posted by the transfer engine, once per started transfer
#[derive(Debug)]
pub enum TransferEvent {
    /// All elements transferred, buffer fully populated
    Complete(SampleBuffer),
    /// Transfer failed, buffer contents are undefined
    Fault(SampleBuffer),
}

impl TransferEvent {
    pub fn into_buffer(self) -> SampleBuffer {
        match self {
            TransferEvent::Complete(buffer) | TransferEvent::Fault(buffer) => buffer,
        }
    }
}

/// The probe port
pub trait ProbePort {
    /// Snapshot of the probe inputs.
    fn read_port_bits(&mut self) -> u8;
}

/// The timer which paces sampling
pub trait SampleClock {
    /// Start the timer running.  Called once, before the first command is
    /// processed.
    fn start(&mut self);

    /// Set the sample period to `divider` times the fastest period the
    /// device supports.  `divider` is never 0.
    fn set_divider(&mut self, divider: u32);
}

/// The block transfer engine which moves samples from the probe port into
/// the sample buffer.
pub trait Transfer {
    /// Program the transfer, without starting it.  The engine owns `buffer`
    /// until it is returned in a [`TransferEvent`] or by [`Self::abort()`].
    fn prepare(&mut self, setup: &TransferSetup, buffer: SampleBuffer);

    /// Start moving samples.  Once complete the engine must post exactly
    /// one [`TransferEvent`].
    fn start(&mut self);

    /// Abort any prepared or running transfer, best effort.  Returns the
    /// buffer if the engine still holds it, in which case no event will be
    /// posted.  If `None` is returned while a transfer was running, the
    /// buffer will come back in a later event.
    fn abort(&mut self) -> Option<SampleBuffer>;
}
