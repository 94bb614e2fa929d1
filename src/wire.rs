//! SUMP wire primitives - opcodes, parameter words and metadata records.
//!
//! Commands are a single opcode byte.  Opcodes with bit 7 set are "long"
//! commands and are always followed by a 4-byte parameter word, which this
//! module assembles MSB first.  Field-specific unpacking of the parameter
//! word lives in [`crate::config`].

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use crate::{Error, Result};

/// Number of bytes in a parameter word
pub const PARAM_LEN: usize = 4;

/// Number of trigger stages addressable by the protocol
pub const TRIGGER_STAGES: u8 = 4;

/// SUMP opcodes
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opcode {
    Reset = 0x00,
    Run = 0x01,
    Id = 0x02,
    SelfTest = 0x03,
    GetMetadata = 0x04,
    Rle = 0x05,
    RunAdvancedTrigger = 0x0F,
    SetDivider = 0x80,
    SetReadDelayCount = 0x81,
    SetFlags = 0x82,
    WriteTriggerSelect = 0x9E,
    WriteTriggerData = 0x9F,
    SetTriggerMask0 = 0xC0,
    SetTriggerValue0 = 0xC1,
    SetTriggerConfig0 = 0xC2,
    SetTriggerMask1 = 0xC4,
    SetTriggerValue1 = 0xC5,
    SetTriggerConfig1 = 0xC6,
    SetTriggerMask2 = 0xC8,
    SetTriggerValue2 = 0xC9,
    SetTriggerConfig2 = 0xCA,
    SetTriggerMask3 = 0xCC,
    SetTriggerValue3 = 0xCD,
    SetTriggerConfig3 = 0xCE,
}

impl TryFrom<u8> for Opcode {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self> {
        let opcode = match value {
            0x00 => Opcode::Reset,
            0x01 => Opcode::Run,
            0x02 => Opcode::Id,
            0x03 => Opcode::SelfTest,
            0x04 => Opcode::GetMetadata,
            0x05 => Opcode::Rle,
            0x0F => Opcode::RunAdvancedTrigger,
            0x80 => Opcode::SetDivider,
            0x81 => Opcode::SetReadDelayCount,
            0x82 => Opcode::SetFlags,
            0x9E => Opcode::WriteTriggerSelect,
            0x9F => Opcode::WriteTriggerData,
            0xC0 => Opcode::SetTriggerMask0,
            0xC1 => Opcode::SetTriggerValue0,
            0xC2 => Opcode::SetTriggerConfig0,
            0xC4 => Opcode::SetTriggerMask1,
            0xC5 => Opcode::SetTriggerValue1,
            0xC6 => Opcode::SetTriggerConfig1,
            0xC8 => Opcode::SetTriggerMask2,
            0xC9 => Opcode::SetTriggerValue2,
            0xCA => Opcode::SetTriggerConfig2,
            0xCC => Opcode::SetTriggerMask3,
            0xCD => Opcode::SetTriggerValue3,
            0xCE => Opcode::SetTriggerConfig3,
            other => return Err(Error::UnknownCommand(other)),
        };
        Ok(opcode)
    }
}

impl Opcode {
    /// Whether this opcode is followed by a parameter word
    pub fn has_param(self) -> bool {
        is_long_command(self as u8)
    }
}

/// Whether an opcode byte, known or not, is followed by a parameter word.
pub fn is_long_command(byte: u8) -> bool {
    byte & 0x80 != 0
}

/// Decode an opcode byte.
///
/// Returns [`Error::UnknownCommand`] for bytes outside the documented set.
/// Callers must still consume a parameter word for unknown long commands,
/// see [`is_long_command()`].
pub fn decode_command(byte: u8) -> Result<Opcode> {
    Opcode::try_from(byte)
}

/// Assemble a parameter word from its 4 wire bytes, first byte most
/// significant.
pub fn decode_param_word(bytes: [u8; PARAM_LEN]) -> u32 {
    u32::from_be_bytes(bytes)
}

/// Big-endian encoding, used for integer metadata values.
pub fn encode_uint32_be(value: u32) -> [u8; PARAM_LEN] {
    value.to_be_bytes()
}

/// A decoded command, ready for the dispatcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    Reset,
    Run,
    Id,
    SelfTest,
    GetMetadata,
    Rle,
    RunAdvancedTrigger,
    SetDivider(u32),
    SetReadDelayCount(u32),
    SetFlags(u32),
    WriteTriggerSelect(u32),
    WriteTriggerData(u32),
    SetTriggerMask { stage: u8, param: u32 },
    SetTriggerValue { stage: u8, param: u32 },
    SetTriggerConfig { stage: u8, param: u32 },
}

impl Command {
    /// Build a command from its opcode and, for long commands, the
    /// parameter word that followed it.  `param` is ignored for short
    /// commands.
    pub fn new(opcode: Opcode, param: u32) -> Self {
        match opcode {
            Opcode::Reset => Command::Reset,
            Opcode::Run => Command::Run,
            Opcode::Id => Command::Id,
            Opcode::SelfTest => Command::SelfTest,
            Opcode::GetMetadata => Command::GetMetadata,
            Opcode::Rle => Command::Rle,
            Opcode::RunAdvancedTrigger => Command::RunAdvancedTrigger,
            Opcode::SetDivider => Command::SetDivider(param),
            Opcode::SetReadDelayCount => Command::SetReadDelayCount(param),
            Opcode::SetFlags => Command::SetFlags(param),
            Opcode::WriteTriggerSelect => Command::WriteTriggerSelect(param),
            Opcode::WriteTriggerData => Command::WriteTriggerData(param),
            Opcode::SetTriggerMask0
            | Opcode::SetTriggerMask1
            | Opcode::SetTriggerMask2
            | Opcode::SetTriggerMask3 => Command::SetTriggerMask {
                stage: trigger_stage(opcode),
                param,
            },
            Opcode::SetTriggerValue0
            | Opcode::SetTriggerValue1
            | Opcode::SetTriggerValue2
            | Opcode::SetTriggerValue3 => Command::SetTriggerValue {
                stage: trigger_stage(opcode),
                param,
            },
            Opcode::SetTriggerConfig0
            | Opcode::SetTriggerConfig1
            | Opcode::SetTriggerConfig2
            | Opcode::SetTriggerConfig3 => Command::SetTriggerConfig {
                stage: trigger_stage(opcode),
                param,
            },
        }
    }
}

// Trigger opcodes are 0b110s_s0xx, with the stage in bits 2-3.
fn trigger_stage(opcode: Opcode) -> u8 {
    ((opcode as u8) >> 2) & (TRIGGER_STAGES - 1)
}

/// Metadata keys
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKey {
    EndOfMetadata = 0x00,
    DeviceName = 0x01,
    FirmwareVersion = 0x02,
    AncillaryVersion = 0x03,
    NumUsableProbes = 0x20,
    SampleMemoryBytes = 0x21,
    SampleDynamicMemoryBytes = 0x22,
    MaxSampleRateHz = 0x23,
    ProtocolVersion = 0x24,
    NumUsableProbesShort = 0x40,
    ProtocolVersionShort = 0x41,
}

/// Metadata value.  Text values are NUL terminated on the wire, integers
/// are 4 bytes big-endian.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataValue {
    Text(&'static str),
    Uint32(u32),
}

/// A single key/value metadata record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetadataRecord {
    pub key: MetadataKey,
    pub value: MetadataValue,
}

impl MetadataRecord {
    pub const fn text(key: MetadataKey, value: &'static str) -> Self {
        Self {
            key,
            value: MetadataValue::Text(value),
        }
    }

    pub const fn uint32(key: MetadataKey, value: u32) -> Self {
        Self {
            key,
            value: MetadataValue::Uint32(value),
        }
    }

    /// Append the wire encoding of this record to `out`.
    ///
    /// Fails with [`Error::InvalidMetadata`] if a text value contains a NUL,
    /// which would terminate the field early, and with
    /// [`Error::PayloadTooLarge`] if `out` fills up.
    pub fn encode_into<const N: usize>(&self, out: &mut heapless::Vec<u8, N>) -> Result<()> {
        if self.key == MetadataKey::EndOfMetadata {
            return Err(Error::InvalidMetadata);
        }
        push(out, &[self.key as u8])?;
        match self.value {
            MetadataValue::Text(text) => {
                if text.as_bytes().contains(&0) {
                    return Err(Error::InvalidMetadata);
                }
                push(out, text.as_bytes())?;
                push(out, &[MetadataKey::EndOfMetadata as u8])
            }
            MetadataValue::Uint32(value) => push(out, &encode_uint32_be(value)),
        }
    }
}

fn push<const N: usize>(out: &mut heapless::Vec<u8, N>, bytes: &[u8]) -> Result<()> {
    out.extend_from_slice(bytes)
        .map_err(|_| Error::PayloadTooLarge)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn param_word_is_msb_first() {
        assert_eq!(decode_param_word([0x12, 0x34, 0x56, 0x78]), 0x1234_5678);
        assert_eq!(decode_param_word([0, 0, 0, 0]), 0);
        assert_eq!(decode_param_word([0xFF; 4]), 0xFFFF_FFFF);
        assert_eq!(encode_uint32_be(32000), [0x00, 0x00, 0x7D, 0x00]);
    }

    #[test]
    fn unknown_opcodes_are_rejected() {
        assert_eq!(decode_command(0x06), Err(Error::UnknownCommand(0x06)));
        assert_eq!(decode_command(0xC3), Err(Error::UnknownCommand(0xC3)));
        assert_eq!(decode_command(0xFF), Err(Error::UnknownCommand(0xFF)));
        assert!(is_long_command(0xC3));
        assert!(!is_long_command(0x06));
    }

    #[test]
    fn every_documented_opcode_round_trips() {
        for byte in 0..=u8::MAX {
            if let Ok(opcode) = decode_command(byte) {
                assert_eq!(opcode as u8, byte);
                assert_eq!(opcode.has_param(), byte >= 0x80);
            }
        }
    }

    #[test]
    fn trigger_commands_carry_their_stage() {
        let cmd = Command::new(Opcode::SetTriggerMask0, 0x0F00_0000);
        assert_eq!(
            cmd,
            Command::SetTriggerMask {
                stage: 0,
                param: 0x0F00_0000
            }
        );
        let cmd = Command::new(Opcode::SetTriggerValue2, 1);
        assert_eq!(cmd, Command::SetTriggerValue { stage: 2, param: 1 });
        let cmd = Command::new(Opcode::SetTriggerConfig3, 7);
        assert_eq!(cmd, Command::SetTriggerConfig { stage: 3, param: 7 });
    }

    #[test]
    fn param_only_kept_for_long_commands() {
        assert_eq!(Command::new(Opcode::Id, 0xDEAD_BEEF), Command::Id);
        assert_eq!(
            Command::new(Opcode::SetDivider, 0xDEAD_BEEF),
            Command::SetDivider(0xDEAD_BEEF)
        );
    }

    #[test]
    fn text_record_is_nul_terminated() {
        let mut out: heapless::Vec<u8, 16> = heapless::Vec::new();
        MetadataRecord::text(MetadataKey::FirmwareVersion, "V3.8")
            .encode_into(&mut out)
            .unwrap();
        assert_eq!(out.as_slice(), &[0x02, b'V', b'3', b'.', b'8', 0x00]);
    }

    #[test]
    fn integer_record_has_no_terminator() {
        let mut out: heapless::Vec<u8, 16> = heapless::Vec::new();
        MetadataRecord::uint32(MetadataKey::MaxSampleRateHz, 10_000_000)
            .encode_into(&mut out)
            .unwrap();
        assert_eq!(out.as_slice(), &[0x23, 0x00, 0x98, 0x96, 0x80]);
    }

    #[test]
    fn bad_records_are_rejected() {
        let mut out: heapless::Vec<u8, 16> = heapless::Vec::new();
        let embedded_nul = MetadataRecord::text(MetadataKey::DeviceName, "a\0b");
        assert_eq!(
            embedded_nul.encode_into(&mut out),
            Err(Error::InvalidMetadata)
        );
        let end = MetadataRecord::uint32(MetadataKey::EndOfMetadata, 0);
        assert_eq!(end.encode_into(&mut out), Err(Error::InvalidMetadata));

        let mut tiny: heapless::Vec<u8, 3> = heapless::Vec::new();
        let long = MetadataRecord::text(MetadataKey::DeviceName, "too long");
        assert_eq!(long.encode_into(&mut tiny), Err(Error::PayloadTooLarge));
    }
}
