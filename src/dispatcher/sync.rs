//! Blocking Dispatcher - typically run from a target's main function.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::acquisition::TriggerPoll;
use crate::dispatcher::{Reply, Session, Step, parse_command};
use crate::io::{ProbePort, SampleClock, Transfer};
use crate::response::{identification, metadata_block};
use crate::wire::{PARAM_LEN, is_long_command};
use crate::{Error, Result};

/// Trait for the byte transport to the host, usually a UART or USB CDC
/// serial port.
///
/// Blocking version.
pub trait Transport {
    /// The error type returned by read and write operations.
    type Error: core::fmt::Debug;

    /// Read exactly `buf.len()` bytes, blocking until they have arrived.
    fn read(&mut self, buf: &mut [u8]) -> core::result::Result<(), Self::Error>;

    /// Write all of `data`, blocking until it has been sent.
    fn write(&mut self, data: &[u8]) -> core::result::Result<(), Self::Error>;

    /// Whether at least one byte can be read without blocking.
    ///
    /// Only consulted while a capture is running, so the dispatcher can
    /// keep servicing the transfer engine.  The default reports nothing
    /// readable, so a completed capture is always sent, but commands
    /// (including Reset) are not read until it has been.
    fn readable(&mut self) -> bool {
        false
    }
}

/// Blocking command dispatcher.
///
/// Waiting for the trigger is a tight loop on the probe port.  No commands,
/// including Reset, are read until the trigger fires.
///
/// Example usage:
///
/// ```rust,ignore
/// use heapless::spsc::Queue;
/// use sump_engine::config::DeviceInfo;
/// use sump_engine::dispatcher::{Dispatcher, Session};
/// use sump_engine::io::{EventQueue, SampleBuffer};
///
/// static mut EVENTS: EventQueue = Queue::new();
/// let (producer, consumer) = unsafe { EVENTS.split() };
/// // producer is moved into the DMA completion interrupt handler
/// let session = Session::new(DeviceInfo::default(), port, pit, dma, buffer, consumer);
/// let mut dispatcher = Dispatcher::new(uart, session);
/// let err = dispatcher.run();
/// ```
pub struct Dispatcher<'q, T: Transport, P: ProbePort, C: SampleClock, X: Transfer> {
    transport: T,
    session: Session<'q, P, C, X>,
}

impl<'q, T: Transport, P: ProbePort, C: SampleClock, X: Transfer> Dispatcher<'q, T, P, C, X> {
    pub fn new(transport: T, session: Session<'q, P, C, X>) -> Self {
        Self { transport, session }
    }

    pub fn session(&self) -> &Session<'q, P, C, X> {
        &self.session
    }

    pub fn session_mut(&mut self) -> &mut Session<'q, P, C, X> {
        &mut self.session
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    pub fn into_parts(self) -> (T, Session<'q, P, C, X>) {
        (self.transport, self.session)
    }

    /// Run the dispatcher.  Only returns if the transport fails.
    pub fn run(&mut self) -> Result<()> {
        self.session.start();
        loop {
            self.poll()?;
        }
    }

    /// Perform one step of the dispatcher loop - send a completed capture,
    /// wait for a trigger, or read and execute one command.
    ///
    /// May block in the transport, or waiting for a trigger.
    pub fn poll(&mut self) -> Result<()> {
        let readable = self.transport.readable();
        match self.session.next_step(readable)? {
            Step::Drain => self.drain(),
            Step::Trigger => {
                while self.session.poll_trigger()? == TriggerPoll::Waiting {}
                Ok(())
            }
            Step::Wait => Ok(()),
            Step::Command => self.command(),
        }
    }

    fn command(&mut self) -> Result<()> {
        let mut opcode = [0u8; 1];
        self.read(&mut opcode)?;

        // Parameters of unknown long commands are consumed too, to keep in
        // step with the host.
        let mut param = [0u8; PARAM_LEN];
        if is_long_command(opcode[0]) {
            self.read(&mut param)?;
        }

        let Some(command) = parse_command(opcode[0], param) else {
            return Ok(());
        };
        let reply = self.session.execute(command);
        self.reply(reply)
    }

    fn reply(&mut self, reply: Reply) -> Result<()> {
        match reply {
            Reply::None => Ok(()),
            Reply::Identification => {
                write_all(&mut self.transport, identification(self.session.device()))
            }
            Reply::Metadata => match metadata_block(self.session.device()) {
                Ok(block) => write_all(&mut self.transport, &block),
                Err(e) => {
                    error!("Metadata not sent: {e:?}");
                    Ok(())
                }
            },
        }
    }

    fn drain(&mut self) -> Result<()> {
        let mut result = Ok(());
        if let Some(chunks) = self.session.samples() {
            trace!("Sending {} bytes of samples", chunks.stream_len());
            for chunk in chunks {
                result = write_all(&mut self.transport, &chunk);
                if result.is_err() {
                    break;
                }
            }
        }
        self.session.finish_drain();
        result
    }

    fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.transport.read(buf).map_err(|e| {
            warn!("Transport read failed: {e:?}");
            Error::Transport
        })
    }
}

fn write_all<T: Transport>(transport: &mut T, data: &[u8]) -> Result<()> {
    transport.write(data).map_err(|e| {
        warn!("Transport write failed: {e:?}");
        Error::Transport
    })
}
