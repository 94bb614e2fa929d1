//! Command dispatcher - reads commands from the host and routes them to the
//! capture configuration, the acquisition controller, or a response.
//!
//! The protocol handling itself lives in [`Session`], which never touches
//! the transport.  [`Dispatcher`] drives a session over a blocking
//! [`Transport`], and is typically run directly from a target's main
//! function.  [`AsyncDispatcher`] drives it over an [`AsyncTransport`], and
//! yields to the executor whenever it would otherwise spin.
//!
//! See [`crate`] for how to wire a dispatcher up to the hardware.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[cfg(feature = "async")]
pub mod futures;
pub mod sync;

#[cfg(feature = "async")]
pub use futures::{AsyncDelay, AsyncDispatcher, AsyncTransport};
pub use sync::{Dispatcher, Transport};

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::acquisition::{Acquisition, AcquisitionState, TriggerPoll};
use crate::config::{Applied, CaptureConfig, DeviceInfo};
use crate::io::{EventConsumer, ProbePort, SampleBuffer, SampleClock, Transfer, TransferEvent};
use crate::response::SampleChunks;
use crate::wire::{Command, PARAM_LEN, decode_command, decode_param_word};
use crate::{Error, Result};

/// What, if anything, to send back after executing a command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reply {
    None,
    Identification,
    Metadata,
}

/// Protocol state for one device - the capture configuration, and the
/// peripherals it drives.
pub struct Session<'q, P: ProbePort, C: SampleClock, X: Transfer> {
    config: CaptureConfig,
    device: DeviceInfo,
    clock: C,
    acquisition: Acquisition<P, X>,
    events: EventConsumer<'q>,
    clock_started: bool,
}

impl<'q, P: ProbePort, C: SampleClock, X: Transfer> Session<'q, P, C, X> {
    /// Create a new Session
    ///
    /// Arguments:
    /// - `device`: Description reported to the host
    /// - `port`: Probe port, polled while waiting for the trigger
    /// - `clock`: Sample clock, reprogrammed on SetDivider
    /// - `transfer`: Transfer engine, moving samples from `port` to the
    ///   sample buffer
    /// - `buffer`: Sample buffer
    /// - `events`: Consumer of the transfer engine's completion events
    pub fn new(
        device: DeviceInfo,
        port: P,
        clock: C,
        transfer: X,
        buffer: SampleBuffer,
        events: EventConsumer<'q>,
    ) -> Self {
        Self {
            config: CaptureConfig::new(),
            device,
            clock,
            acquisition: Acquisition::new(port, transfer, buffer),
            events,
            clock_started: false,
        }
    }

    pub fn config(&self) -> &CaptureConfig {
        &self.config
    }

    pub fn device(&self) -> &DeviceInfo {
        &self.device
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn acquisition(&self) -> &Acquisition<P, X> {
        &self.acquisition
    }

    pub fn acquisition_mut(&mut self) -> &mut Acquisition<P, X> {
        &mut self.acquisition
    }

    pub fn state(&self) -> AcquisitionState {
        self.acquisition.state()
    }

    /// Program the default divider and start the sample clock, if not
    /// already running.
    pub fn start(&mut self) {
        if !self.clock_started {
            self.clock.set_divider(self.config.clock_divider);
            self.clock.start();
            self.clock_started = true;
            info!("SUMP engine started, {}", self.device.name);
        }
    }

    /// Execute a command.
    ///
    /// While a capture is in flight only Reset has any effect.  Other
    /// commands are dropped, as the configuration must not change under a
    /// running capture.
    pub fn execute(&mut self, command: Command) -> Reply {
        trace!("Execute {command:?}");

        if self.acquisition.in_flight() && command != Command::Reset {
            debug!("Dropped {command:?} during capture");
            return Reply::None;
        }

        match command {
            Command::Reset => {
                self.reset();
                Reply::None
            }
            Command::Run => {
                if let Err(e) = self.acquisition.arm(&self.config, self.device.port_addr) {
                    warn!("Run failed: {e:?}");
                }
                Reply::None
            }
            Command::Id => Reply::Identification,
            Command::GetMetadata => Reply::Metadata,
            Command::SelfTest
            | Command::Rle
            | Command::RunAdvancedTrigger
            | Command::WriteTriggerSelect(_)
            | Command::WriteTriggerData(_) => {
                debug!("Unsupported command {command:?}");
                Reply::None
            }
            _ => {
                if let Applied::Divider(divider) = self.config.apply(&command) {
                    self.clock.set_divider(divider);
                }
                Reply::None
            }
        }
    }

    /// Abort any capture and restore the default configuration.
    pub fn reset(&mut self) {
        self.acquisition.reset();
        self.config.reset();
        self.clock.set_divider(self.config.clock_divider);
        debug!("Reset");
    }

    /// Next event posted by the transfer engine, if any
    pub fn next_event(&mut self) -> Option<TransferEvent> {
        self.events.dequeue()
    }

    /// Hand an event from the transfer engine to the acquisition
    /// controller.  Returns whether there are samples to send.
    ///
    /// A transfer fault is logged and swallowed - the capture is discarded
    /// and the host simply gets no samples.
    pub fn complete(&mut self, event: TransferEvent) -> Result<bool> {
        match self.acquisition.complete(event) {
            Ok(Some(count)) => {
                debug!("Captured {count} samples");
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(Error::TransferFault) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Single trigger poll, see [`Acquisition::poll_trigger()`]
    pub fn poll_trigger(&mut self) -> Result<TriggerPoll> {
        self.acquisition.poll_trigger()
    }

    /// Sample stream for the completed capture, while Draining
    pub fn samples(&self) -> Option<SampleChunks<'_>> {
        self.acquisition
            .samples()
            .map(|samples| SampleChunks::new(samples, self.config.demux()))
    }

    /// Sample stream fully sent
    pub fn finish_drain(&mut self) {
        self.acquisition.finish_drain();
    }

    /// Whether the dispatcher should skip reading a command this time
    /// round.  A capture is running, and reading would block, so completion
    /// events would not be serviced.
    fn defer_read(&self, readable: bool) -> bool {
        self.state() == AcquisitionState::Capturing && !readable
    }
}

/// What the dispatcher loop should do next
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Step {
    /// Send the completed capture
    Drain,
    /// Poll the trigger
    Trigger,
    /// Nothing to do until the transfer engine completes
    Wait,
    /// Read and execute a command
    Command,
}

impl<P: ProbePort, C: SampleClock, X: Transfer> Session<'_, P, C, X> {
    fn next_step(&mut self, readable: bool) -> Result<Step> {
        if let Some(event) = self.next_event() {
            if self.complete(event)? {
                return Ok(Step::Drain);
            }
            return Ok(Step::Wait);
        }
        if self.state() == AcquisitionState::WaitingForTrigger {
            return Ok(Step::Trigger);
        }
        if self.defer_read(readable) {
            return Ok(Step::Wait);
        }
        Ok(Step::Command)
    }
}

/// Parses a command from its opcode byte and parameter word.  Unknown
/// opcodes are logged and return `None`.
fn parse_command(opcode: u8, param: [u8; PARAM_LEN]) -> Option<Command> {
    match decode_command(opcode) {
        Ok(opcode) => Some(Command::new(opcode, decode_param_word(param))),
        Err(e) => {
            debug!("Ignoring {e:?}");
            None
        }
    }
}
