//! Capture configuration, as built up by the host's configuration commands,
//! and the static description of this device.
//!
//! The SUMP parameter word does not lay its fields out as simple big-endian
//! integers.  The original SUMP client sends multi-byte fields least
//! significant byte first, so each field's bytes appear in reverse within
//! the (MSB-first) parameter word.  The `decode_*` functions here undo that,
//! bit for bit, including the scaling the protocol applies to each field.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use bitflags::bitflags;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::wire::Command;

/// Size of the sample buffer, in samples (one byte per sample)
pub const BUFFER_CAPACITY: usize = 32000;

bitflags! {
    /// Capture flags, as sent in the top byte of a SetFlags parameter word.
    ///
    /// Only `DEMUX` changes the engine's behaviour.  The others are stored
    /// so the configuration reflects what the host asked for.
    #[repr(transparent)]
    #[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
    pub struct CaptureFlags: u8 {
        const DEMUX = 1 << 0;
        const FILTER = 1 << 1;
        const CHANNEL_GROUP0 = 1 << 2;
        const CHANNEL_GROUP1 = 1 << 3;
        const CHANNEL_GROUP2 = 1 << 4;
        const CHANNEL_GROUP3 = 1 << 5;
        const EXTERNAL = 1 << 6;
        const INVERTED = 1 << 7;
    }
}

/// Decode the read count half of a SetReadDelayCount parameter word into a
/// sample count, clamped to [`BUFFER_CAPACITY`].
///
/// Returns the sample count, and whether it was clamped.
pub fn decode_sample_count(param: u32) -> (u16, bool) {
    let raw = ((param >> 24) & 0xFF) | ((param >> 8) & 0xFF00);
    let count = (raw + 1) * 4;
    if count > BUFFER_CAPACITY as u32 {
        (BUFFER_CAPACITY as u16, true)
    } else {
        (count as u16, false)
    }
}

/// Decode the delay count half of a SetReadDelayCount parameter word.
///
/// The scaled count is truncated to 16 bits.
pub fn decode_delay_count(param: u32) -> u16 {
    let raw = ((param >> 8) & 0xFF) | ((param << 8) & 0xFF00);
    ((raw + 1) * 4) as u16
}

/// Decode a SetDivider parameter word into a sample clock divider.  Never
/// returns 0.
pub fn decode_clock_divider(param: u32) -> u32 {
    let raw = ((param >> 24) & 0xFF) | ((param >> 8) & 0xFF00) | ((param << 16) & 0xFF_0000);
    ((raw + 1) / 10).max(1)
}

/// Decode a SetFlags parameter word.  Flags occupy bits 24-31.
pub fn decode_flags(param: u32) -> CaptureFlags {
    CaptureFlags::from_bits_retain((param >> 24) as u8)
}

/// Decode a trigger mask or value parameter word.  The device has 4 probes,
/// so only the low nibble of the first byte is kept.
pub fn decode_trigger_nibble(param: u32) -> u8 {
    ((param >> 24) & 0x0F) as u8
}

/// A single stage mask/value trigger
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Trigger {
    pub mask: u8,
    pub value: u8,
}

impl Trigger {
    /// Whether a snapshot of the probe port satisfies this trigger.  An
    /// empty mask matches anything.
    pub fn matches(&self, port_bits: u8) -> bool {
        (port_bits & self.mask) == (self.value & self.mask)
    }
}

/// Result of applying a command to the [`CaptureConfig`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    /// Configuration updated
    Updated,
    /// Clock divider updated - forward it to the sample clock
    Divider(u32),
    /// Command accepted, but has no effect on this device
    Ignored,
}

/// Capture configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Number of samples to capture, never more than [`BUFFER_CAPACITY`]
    pub sample_count: u16,

    /// Post-trigger delay count.  Kept as protocol state only
    pub delay_count: u16,

    /// Sample clock divider, never 0
    pub clock_divider: u32,

    pub flags: CaptureFlags,

    /// Trigger mask, low nibble only
    pub trigger_mask: u8,

    /// Trigger value, low nibble only
    pub trigger_value: u8,

    /// Whether the last read count received was clamped to the buffer
    /// capacity
    pub clamped: bool,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl CaptureConfig {
    pub const fn new() -> Self {
        Self {
            sample_count: BUFFER_CAPACITY as u16,
            delay_count: 0,
            clock_divider: 1,
            flags: CaptureFlags::empty(),
            trigger_mask: 0,
            trigger_value: 0,
            clamped: false,
        }
    }

    /// Restore the power-on defaults
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn trigger(&self) -> Trigger {
        Trigger {
            mask: self.trigger_mask,
            value: self.trigger_value,
        }
    }

    pub fn demux(&self) -> bool {
        self.flags.contains(CaptureFlags::DEMUX)
    }

    /// Apply a configuration command.  Commands which are not configuration
    /// commands are [`Applied::Ignored`].
    pub fn apply(&mut self, command: &Command) -> Applied {
        match *command {
            Command::SetReadDelayCount(param) => {
                let (sample_count, clamped) = decode_sample_count(param);
                self.sample_count = sample_count;
                self.delay_count = decode_delay_count(param);
                self.clamped = clamped;
                if clamped {
                    warn!("Read count in {param:#010X} exceeds buffer, clamped to {sample_count}");
                }
                debug!(
                    "Sample count {} delay count {}",
                    self.sample_count, self.delay_count
                );
                Applied::Updated
            }
            Command::SetDivider(param) => {
                self.clock_divider = decode_clock_divider(param);
                debug!("Clock divider {}", self.clock_divider);
                Applied::Divider(self.clock_divider)
            }
            Command::SetFlags(param) => {
                self.flags = decode_flags(param);
                debug!("Flags {:?}", self.flags);
                Applied::Updated
            }
            Command::SetTriggerMask { stage: 0, param } => {
                self.trigger_mask = decode_trigger_nibble(param);
                debug!("Trigger mask {:#03X}", self.trigger_mask);
                Applied::Updated
            }
            Command::SetTriggerValue { stage: 0, param } => {
                self.trigger_value = decode_trigger_nibble(param);
                debug!("Trigger value {:#03X}", self.trigger_value);
                Applied::Updated
            }
            _ => Applied::Ignored,
        }
    }
}

/// Static description of the device, reported to the host in response to
/// Id and GetMetadata.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeviceInfo {
    /// Identification string, sent without a terminator
    pub id: [u8; 4],
    pub name: &'static str,
    pub firmware_version: &'static str,
    pub ancillary_version: &'static str,
    pub probes: u32,
    pub max_sample_rate_hz: u32,
    /// SUMP metadata protocol version, always 2
    pub protocol_version: u32,
    /// Address of the probe port input register, used as the transfer
    /// source
    pub port_addr: u32,
}

impl DeviceInfo {
    /// FRDM-K64F, sampling PTD0-PTD3 through GPIOD's PDIR register
    pub const FRDM_K64F: Self = Self {
        id: *b"1ALS",
        name: "FRDM-K64F LogicAnalyzer",
        firmware_version: "V3.8",
        ancillary_version: "V2.0",
        probes: 4,
        max_sample_rate_hz: 10_000_000,
        protocol_version: 2,
        port_addr: 0x400F_F0D0,
    };
}

impl Default for DeviceInfo {
    fn default() -> Self {
        Self::FRDM_K64F
    }
}
