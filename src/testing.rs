//! Fake peripherals for unit tests.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use std::boxed::Box;
use std::collections::VecDeque;
use std::vec::Vec;

use crate::config::BUFFER_CAPACITY;
use crate::dispatcher::Transport;
use crate::io::{
    EventProducer, ProbePort, SampleBuffer, SampleClock, Transfer, TransferEvent, TransferSetup,
};

pub fn sample_buffer() -> SampleBuffer {
    SampleBuffer::new(Box::leak(Box::new([0u8; BUFFER_CAPACITY])))
}

/// Returns each scripted value once, then repeats the last one forever.
pub struct FakePort {
    bits: Vec<u8>,
    pub reads: usize,
}

impl FakePort {
    pub fn new(bits: &[u8]) -> Self {
        Self {
            bits: bits.to_vec(),
            reads: 0,
        }
    }
}

impl ProbePort for FakePort {
    fn read_port_bits(&mut self) -> u8 {
        let index = self.reads.min(self.bits.len() - 1);
        self.reads += 1;
        self.bits[index]
    }
}

#[derive(Default)]
pub struct FakeClock {
    pub started: bool,
    pub dividers: Vec<u32>,
}

impl SampleClock for FakeClock {
    fn start(&mut self) {
        self.started = true;
    }

    fn set_divider(&mut self, divider: u32) {
        self.dividers.push(divider);
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TransferMode {
    /// Fill the buffer and post Complete as soon as started
    Complete,
    /// Post Fault as soon as started
    Fault,
    /// Never complete, hand the buffer back on abort
    Hold,
    /// Keep the buffer once started, until `finish()` is called
    InFlight,
}

pub struct FakeTransfer<'q> {
    producer: EventProducer<'q>,
    mode: TransferMode,
    held: Option<SampleBuffer>,
    in_flight: Option<SampleBuffer>,
    pub setup: Option<TransferSetup>,
    pub prepares: usize,
    pub starts: usize,
    pub aborts: usize,
}

impl<'q> FakeTransfer<'q> {
    pub fn new(producer: EventProducer<'q>, mode: TransferMode) -> Self {
        Self {
            producer,
            mode,
            held: None,
            in_flight: None,
            setup: None,
            prepares: 0,
            starts: 0,
            aborts: 0,
        }
    }

    /// Complete an `InFlight` transfer
    pub fn finish(&mut self) {
        if let Some(buffer) = self.in_flight.take() {
            self.post(TransferEvent::Complete(buffer));
        }
    }

    fn post(&mut self, event: TransferEvent) {
        if self.producer.enqueue(event).is_err() {
            panic!("event queue full");
        }
    }
}

impl Transfer for FakeTransfer<'_> {
    fn prepare(&mut self, setup: &TransferSetup, buffer: SampleBuffer) {
        self.setup = Some(*setup);
        self.held = Some(buffer);
        self.prepares += 1;
    }

    fn start(&mut self) {
        self.starts += 1;
        let Some(mut buffer) = self.held.take() else {
            return;
        };
        match self.mode {
            TransferMode::Complete => {
                let count = self.setup.map_or(0, |setup| setup.element_count);
                for (i, sample) in buffer.as_mut_slice()[..count].iter_mut().enumerate() {
                    *sample = i as u8;
                }
                self.post(TransferEvent::Complete(buffer));
            }
            TransferMode::Fault => self.post(TransferEvent::Fault(buffer)),
            TransferMode::Hold => self.held = Some(buffer),
            TransferMode::InFlight => self.in_flight = Some(buffer),
        }
    }

    fn abort(&mut self) -> Option<SampleBuffer> {
        self.aborts += 1;
        self.held.take()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Disconnected;

/// Byte transport fed from a script.  Reads fail once the script runs out,
/// which ends the dispatcher's run loop.
pub struct FakeTransport {
    pub input: VecDeque<u8>,
    pub output: Vec<u8>,
}

impl FakeTransport {
    pub fn new(input: &[u8]) -> Self {
        Self {
            input: input.iter().copied().collect(),
            output: Vec::new(),
        }
    }

    fn read_script(&mut self, buf: &mut [u8]) -> Result<(), Disconnected> {
        if self.input.len() < buf.len() {
            return Err(Disconnected);
        }
        for byte in buf.iter_mut() {
            *byte = self.input.pop_front().ok_or(Disconnected)?;
        }
        Ok(())
    }
}

impl Transport for FakeTransport {
    type Error = Disconnected;

    fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.read_script(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.output.extend_from_slice(data);
        Ok(())
    }

    fn readable(&mut self) -> bool {
        !self.input.is_empty()
    }
}

#[cfg(feature = "async")]
#[async_trait::async_trait(?Send)]
impl crate::dispatcher::AsyncTransport for FakeTransport {
    type Error = Disconnected;

    async fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.read_script(buf)
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.output.extend_from_slice(data);
        Ok(())
    }

    fn readable(&mut self) -> bool {
        !self.input.is_empty()
    }
}

/// As [`FakeTransport`], but can't tell whether input is waiting, so keeps
/// the default `readable()`.
pub struct PlainUart {
    pub inner: FakeTransport,
    pub reads: usize,
}

impl PlainUart {
    pub fn new(input: &[u8]) -> Self {
        Self {
            inner: FakeTransport::new(input),
            reads: 0,
        }
    }
}

impl Transport for PlainUart {
    type Error = Disconnected;

    fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.reads += 1;
        self.inner.read_script(buf)
    }

    fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.inner.output.extend_from_slice(data);
        Ok(())
    }
}

#[cfg(feature = "async")]
#[async_trait::async_trait(?Send)]
impl crate::dispatcher::AsyncTransport for PlainUart {
    type Error = Disconnected;

    async fn read(&mut self, buf: &mut [u8]) -> Result<(), Self::Error> {
        self.reads += 1;
        self.inner.read_script(buf)
    }

    async fn write(&mut self, data: &[u8]) -> Result<(), Self::Error> {
        self.inner.output.extend_from_slice(data);
        Ok(())
    }
}

/// Returns straight away
#[cfg(feature = "async")]
pub struct NoDelay;

#[cfg(feature = "async")]
impl crate::dispatcher::AsyncDelay for NoDelay {
    async fn delay() {}
}

#[cfg(feature = "async")]
std::thread_local! {
    static DELAYS: core::cell::Cell<usize> = const { core::cell::Cell::new(0) };
}

/// Returns straight away, counting the delays taken on this thread
#[cfg(feature = "async")]
pub struct CountingDelay;

#[cfg(feature = "async")]
impl CountingDelay {
    pub fn count() -> usize {
        DELAYS.with(|delays| delays.get())
    }
}

#[cfg(feature = "async")]
impl crate::dispatcher::AsyncDelay for CountingDelay {
    async fn delay() {
        DELAYS.with(|delays| delays.set(delays.get() + 1));
    }
}
