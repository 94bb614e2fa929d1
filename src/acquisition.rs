//! Acquisition controller - arms the transfer engine, waits for the trigger
//! condition, starts the capture, and takes the sample buffer back when the
//! capture completes.
//!
//! ```text
//! Idle -> Arming -> WaitingForTrigger -> Capturing -> Draining -> Idle
//! ```
//!
//! The trigger wait is exposed as a step function, [`Acquisition::poll_trigger()`],
//! which reads the probe port once.  The blocking dispatcher calls it in a
//! tight loop, the async dispatcher yields between calls.  There is no
//! timeout - a trigger which never fires waits forever.
//!
//! Leaving Capturing is driven by the transfer engine, via a
//! [`TransferEvent`] passed to [`Acquisition::complete()`].

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::config::{CaptureConfig, Trigger};
use crate::io::{ProbePort, SampleBuffer, Transfer, TransferEvent, TransferSetup};
use crate::{Error, Result};

/// Acquisition state
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum AcquisitionState {
    #[default]
    Idle,
    Arming,
    WaitingForTrigger,
    Capturing,
    Draining,
}

/// Result of a single trigger poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerPoll {
    Waiting,
    Triggered,
}

/// Acquisition controller.  Owns the probe port, the transfer engine, and
/// (when not lent to the transfer engine) the sample buffer.
pub struct Acquisition<P: ProbePort, X: Transfer> {
    port: P,
    transfer: X,
    state: AcquisitionState,
    buffer: Option<SampleBuffer>,
    trigger: Trigger,
    sample_count: usize,
}

impl<P: ProbePort, X: Transfer> Acquisition<P, X> {
    pub fn new(port: P, transfer: X, buffer: SampleBuffer) -> Self {
        Self {
            port,
            transfer,
            state: AcquisitionState::Idle,
            buffer: Some(buffer),
            trigger: Trigger::default(),
            sample_count: 0,
        }
    }

    pub fn state(&self) -> AcquisitionState {
        self.state
    }

    /// Whether a capture is armed, waiting for its trigger, or running
    pub fn in_flight(&self) -> bool {
        matches!(
            self.state,
            AcquisitionState::Arming
                | AcquisitionState::WaitingForTrigger
                | AcquisitionState::Capturing
        )
    }

    pub fn transfer(&self) -> &X {
        &self.transfer
    }

    pub fn transfer_mut(&mut self) -> &mut X {
        &mut self.transfer
    }

    /// Arm a capture using the current configuration.  `source_addr` is the
    /// probe port's input register.
    ///
    /// The trigger and sample count are latched here, so later configuration
    /// changes don't affect this capture.
    pub fn arm(&mut self, config: &CaptureConfig, source_addr: u32) -> Result<()> {
        if self.state != AcquisitionState::Idle {
            warn!("Run received in state {:?}", self.state);
            return Err(Error::Busy);
        }
        let buffer = self.buffer.take().ok_or_else(|| {
            warn!("Run received before sample buffer returned");
            Error::Busy
        })?;

        self.set_state(AcquisitionState::Arming);
        self.trigger = config.trigger();
        self.sample_count = config.sample_count as usize;

        let setup = TransferSetup::byte_samples(source_addr, self.sample_count);
        self.transfer.prepare(&setup, buffer);

        self.set_state(AcquisitionState::WaitingForTrigger);
        debug!(
            "Armed for {} samples, trigger mask {:#03X} value {:#03X}",
            self.sample_count, self.trigger.mask, self.trigger.value
        );
        Ok(())
    }

    /// Read the probe port once, and start the capture if the trigger
    /// condition is met.
    pub fn poll_trigger(&mut self) -> Result<TriggerPoll> {
        if self.state != AcquisitionState::WaitingForTrigger {
            return Err(Error::InvalidOperation);
        }

        let bits = self.port.read_port_bits();
        if !self.trigger.matches(bits) {
            return Ok(TriggerPoll::Waiting);
        }

        self.transfer.start();
        self.set_state(AcquisitionState::Capturing);
        debug!("Triggered on {bits:#04X}");
        Ok(TriggerPoll::Triggered)
    }

    /// Handle an event from the transfer engine.
    ///
    /// Returns the number of captured samples, now available from
    /// [`Self::samples()`], or `None` if the event was stale (for example
    /// one which raced with a Reset).  A fault discards the capture and
    /// returns [`Error::TransferFault`].
    pub fn complete(&mut self, event: TransferEvent) -> Result<Option<usize>> {
        if self.state != AcquisitionState::Capturing {
            debug!("Reclaimed buffer from stale transfer event in state {:?}", self.state);
            self.reclaim(event.into_buffer());
            return Ok(None);
        }

        match event {
            TransferEvent::Complete(buffer) => {
                self.reclaim(buffer);
                self.set_state(AcquisitionState::Draining);
                Ok(Some(self.sample_count))
            }
            TransferEvent::Fault(buffer) => {
                error!("Transfer fault, discarding capture");
                self.reclaim(buffer);
                self.set_state(AcquisitionState::Idle);
                Err(Error::TransferFault)
            }
        }
    }

    /// The captured samples, while Draining
    pub fn samples(&self) -> Option<&[u8]> {
        if self.state != AcquisitionState::Draining {
            return None;
        }
        self.buffer
            .as_ref()
            .map(|buffer| &buffer.as_slice()[..self.sample_count])
    }

    /// All samples have been sent
    pub fn finish_drain(&mut self) {
        if self.state == AcquisitionState::Draining {
            self.set_state(AcquisitionState::Idle);
        }
    }

    /// Abandon any capture, from any state.
    pub fn reset(&mut self) {
        if self.in_flight() {
            match self.transfer.abort() {
                Some(buffer) => self.reclaim(buffer),
                None if self.buffer.is_none() => {
                    warn!("Transfer aborted, buffer not yet returned");
                }
                None => (),
            }
        }
        self.set_state(AcquisitionState::Idle);
    }

    fn reclaim(&mut self, buffer: SampleBuffer) {
        if self.buffer.replace(buffer).is_some() {
            // Only one buffer exists, so the transfer engine returned a
            // buffer it was never given.
            error!("Transfer engine returned unexpected buffer");
        }
    }

    fn set_state(&mut self, state: AcquisitionState) {
        if self.state != state {
            trace!("Acquisition {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }
}
