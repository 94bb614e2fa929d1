//! SUMP logic analyzer protocol engine for microcontroller targets.
//!
//! This crate implements the device side of the SUMP ("Standard Universal
//! Monitor/Probe") serial capture protocol, as spoken by host tools such as
//! PulseView/sigrok and the original SUMP client.  The host sends single-byte
//! commands, optionally followed by a 4-byte parameter word, and the device
//! configures the capture, waits for a trigger condition on its probe port,
//! captures a fixed number of samples using a hardware block-transfer engine
//! (typically DMA) and streams the samples back.
//!
//! `no_std`.  Requires `alloc` for the async dispatcher only.
//!
//! ## Architecture
//!
//! The engine is split into small components, leaf first:
//!
//! - [`wire`] - Opcodes, parameter words and metadata records, as they
//!   appear on the wire
//! - [`config`] - The capture configuration built up by the host's
//!   configuration commands, and the description of this device
//! - [`io`] - Traits for the peripherals the engine drives: the probe port,
//!   the sample clock and the transfer engine
//! - [`acquisition`] - The trigger-wait-then-capture state machine, which
//!   owns the sample buffer
//! - [`response`] - Identification, metadata and sample stream encoding
//! - [`dispatcher`] - The command loop, in blocking ([`dispatcher::Dispatcher`])
//!   and cooperative ([`dispatcher::AsyncDispatcher`]) flavours
//!
//! The sample buffer is never shared.  It is moved into the transfer engine
//! when a capture is armed, and comes back inside a [`io::TransferEvent`],
//! delivered from the transfer engine's completion interrupt over a
//! `heapless` single-producer single-consumer queue.  The dispatcher drains
//! that queue from its main loop, so the interrupt handler itself never
//! touches the transport.
//!
//! ## Getting Started
//!
//! **Target setup**:
//! 1. Reserve a static `[u8; BUFFER_CAPACITY]` for the samples and wrap it in
//!    a [`io::SampleBuffer`]
//! 2. Create a static `heapless::spsc::Queue<TransferEvent, EVENT_QUEUE_LEN>`
//!    and split it.  Hand the producer to your DMA completion interrupt and
//!    the consumer to the dispatcher
//! 3. Implement [`dispatcher::Transport`] for your UART or USB CDC port, and
//!    [`io::ProbePort`], [`io::SampleClock`] and [`io::Transfer`] for your
//!    GPIO, timer and DMA channel
//! 4. Create a [`dispatcher::Dispatcher`] and call
//!    [`dispatcher::Dispatcher::run()`] from your main function
//!
//! ## Features
//!
//! Default features:
//! - `async` - Enable the async dispatcher (requires `alloc`), which yields
//!   to the executor while waiting for a trigger.
//!
//! Compile with `--no-default-features` for a purely blocking target.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

#![no_std]

#[cfg(feature = "async")]
extern crate alloc;

#[cfg(test)]
extern crate std;

pub mod acquisition;
pub mod config;
pub mod dispatcher;
pub mod io;
pub mod response;
pub mod wire;

#[cfg(test)]
mod testing;

/// Engine errors
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Error {
    /// Opcode byte is not part of the SUMP protocol
    UnknownCommand(u8),
    /// A capture is already in progress, or the sample buffer has not been
    /// returned by the transfer engine
    Busy,
    /// Invalid operation for the current acquisition state
    InvalidOperation,
    /// Transfer engine reported a fault, and the capture was discarded
    TransferFault,
    /// Metadata value cannot be represented on the wire
    InvalidMetadata,
    /// Payload too large for buffer
    PayloadTooLarge,
    /// Transport read or write failed
    Transport,
}

/// Type to represent the result of an engine operation
pub type Result<T> = core::result::Result<T, Error>;
