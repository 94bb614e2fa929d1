//! Response encoding - identification, metadata and the sample stream.
//!
//! Nothing here touches the transport.  Each response is produced as bytes
//! (or, for samples, chunks of bytes) which the dispatcher writes out.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use crate::config::{BUFFER_CAPACITY, DeviceInfo};
use crate::wire::{MetadataKey, MetadataRecord};
use crate::{Error, Result};

/// Largest metadata block [`metadata_block()`] can produce
pub const METADATA_MAX: usize = 128;

/// Largest chunk yielded by [`SampleChunks`]
pub const CHUNK_SIZE: usize = 64;

/// A metadata block, ready to send
pub type MetadataBlock = heapless::Vec<u8, METADATA_MAX>;

/// A chunk of the sample stream
pub type SampleChunk = heapless::Vec<u8, CHUNK_SIZE>;

/// Response to Id.  Sent as is, with no terminator.
pub fn identification(device: &DeviceInfo) -> &[u8; 4] {
    &device.id
}

/// The metadata records describing `device`, in the order they are sent.
pub fn metadata_records(device: &DeviceInfo) -> [MetadataRecord; 7] {
    [
        MetadataRecord::text(MetadataKey::DeviceName, device.name),
        MetadataRecord::text(MetadataKey::FirmwareVersion, device.firmware_version),
        MetadataRecord::text(MetadataKey::AncillaryVersion, device.ancillary_version),
        MetadataRecord::uint32(MetadataKey::NumUsableProbes, device.probes),
        MetadataRecord::uint32(MetadataKey::SampleMemoryBytes, BUFFER_CAPACITY as u32),
        MetadataRecord::uint32(MetadataKey::MaxSampleRateHz, device.max_sample_rate_hz),
        MetadataRecord::uint32(MetadataKey::ProtocolVersion, device.protocol_version),
    ]
}

/// Response to GetMetadata - every record, followed by a single
/// end-of-metadata byte.
pub fn metadata_block(device: &DeviceInfo) -> Result<MetadataBlock> {
    let mut block = MetadataBlock::new();
    for record in metadata_records(device) {
        record.encode_into(&mut block)?;
    }
    block
        .push(MetadataKey::EndOfMetadata as u8)
        .map_err(|_| Error::PayloadTooLarge)?;
    Ok(block)
}

/// Iterator over the sample stream, in chunks of at most [`CHUNK_SIZE`]
/// bytes.
///
/// In demux mode each sample is sent twice in a row, presenting the
/// device's single byte of probes as the two byte wide sample the host
/// expects.
pub struct SampleChunks<'a> {
    samples: &'a [u8],
    demux: bool,
}

impl<'a> SampleChunks<'a> {
    pub fn new(samples: &'a [u8], demux: bool) -> Self {
        Self { samples, demux }
    }

    /// Total number of bytes this stream will produce
    pub fn stream_len(&self) -> usize {
        if self.demux {
            self.samples.len() * 2
        } else {
            self.samples.len()
        }
    }
}

impl Iterator for SampleChunks<'_> {
    type Item = SampleChunk;

    fn next(&mut self) -> Option<Self::Item> {
        if self.samples.is_empty() {
            return None;
        }

        let per_chunk = if self.demux {
            CHUNK_SIZE / 2
        } else {
            CHUNK_SIZE
        };
        let (head, tail) = self.samples.split_at(per_chunk.min(self.samples.len()));
        self.samples = tail;

        let mut chunk = SampleChunk::new();
        for &sample in head {
            // Capacity is guaranteed by per_chunk
            let _ = chunk.push(sample);
            if self.demux {
                let _ = chunk.push(sample);
            }
        }
        Some(chunk)
    }
}
