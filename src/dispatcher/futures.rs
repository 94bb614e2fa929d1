//! Asynchronous Dispatcher - for targets running an async executor.

// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

use alloc::boxed::Box;
use async_trait::async_trait;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};

use crate::acquisition::TriggerPoll;
use crate::dispatcher::{Reply, Session, Step, parse_command};
use crate::io::{ProbePort, SampleClock, Transfer};
use crate::response::{identification, metadata_block};
use crate::wire::{PARAM_LEN, is_long_command};
use crate::{Error, Result};

/// Trait for the byte transport to the host.
///
/// Async version, for example an embassy USB CDC class or buffered UART.
#[async_trait(?Send)]
pub trait AsyncTransport {
    /// The error type returned by read and write operations.
    type Error: core::fmt::Debug;

    /// Read exactly `buf.len()` bytes.
    async fn read(&mut self, buf: &mut [u8]) -> core::result::Result<(), Self::Error>;

    /// Write all of `data`.
    async fn write(&mut self, data: &[u8]) -> core::result::Result<(), Self::Error>;

    /// Whether at least one byte can be read without waiting.  See
    /// [`crate::dispatcher::Transport::readable()`].
    fn readable(&mut self) -> bool {
        false
    }
}

/// Yield delay for the dispatcher's polling loops.
///
/// Application must provide an implementation of this trait in order for the
/// async dispatcher to be able to yield while waiting for a trigger or for
/// the transfer engine to complete.
///
/// This trait keeps `sump-engine` free of any specific async runtime.
///
/// Example:
///
/// ```rust,ignore
/// use embassy_time::{Duration, Timer};
/// struct Delay;
/// impl AsyncDelay for Delay {
///     async fn delay() {
///         Timer::after(Duration::from_micros(10)).await;
///     }
/// }
/// ```
pub trait AsyncDelay {
    fn delay() -> impl Future<Output = ()>;
}

/// Async command dispatcher.
///
/// Behaves as [`crate::dispatcher::Dispatcher`], except the trigger is
/// polled once per [`Self::poll()`], yielding in between, so other tasks
/// keep running while the device waits for its trigger.  Commands are still
/// not read until the trigger fires.
///
/// See [`AsyncDelay`] for required delay trait.
pub struct AsyncDispatcher<'q, T, P, C, X, D>
where
    T: AsyncTransport,
    P: ProbePort,
    C: SampleClock,
    X: Transfer,
    D: AsyncDelay,
{
    transport: T,
    session: Session<'q, P, C, X>,
    _delay: core::marker::PhantomData<D>,
}

impl<'q, T, P, C, X, D> AsyncDispatcher<'q, T, P, C, X, D>
where
    T: AsyncTransport,
    P: ProbePort,
    C: SampleClock,
    X: Transfer,
    D: AsyncDelay,
{
    pub fn new(transport: T, session: Session<'q, P, C, X>) -> Self {
        Self {
            transport,
            session,
            _delay: core::marker::PhantomData,
        }
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
    pub async fn run(&mut self) -> Result<()> {
        self.session.start();
        loop {
            self.poll().await?;
        }
    }

    /// Perform one step of the dispatcher loop - send a completed capture,
    /// poll the trigger once, or read and execute one command.
    pub async fn poll(&mut self) -> Result<()> {
        let readable = self.transport.readable();
        match self.session.next_step(readable)? {
            Step::Drain => self.drain().await,
            Step::Trigger => {
                if self.session.poll_trigger()? == TriggerPoll::Waiting {
                    D::delay().await;
                }
                Ok(())
            }
            Step::Wait => {
                D::delay().await;
                Ok(())
            }
            Step::Command => self.command().await,
        }
    }

    async fn command(&mut self) -> Result<()> {
        let mut opcode = [0u8; 1];
        self.read(&mut opcode).await?;

        let mut param = [0u8; PARAM_LEN];
        if is_long_command(opcode[0]) {
            self.read(&mut param).await?;
        }

        let Some(command) = parse_command(opcode[0], param) else {
            return Ok(());
        };
        let reply = self.session.execute(command);
        self.reply(reply).await
    }

    async fn reply(&mut self, reply: Reply) -> Result<()> {
        match reply {
            Reply::None => Ok(()),
            Reply::Identification => {
                let id = *identification(self.session.device());
                self.write(&id).await
            }
            Reply::Metadata => match metadata_block(self.session.device()) {
                Ok(block) => self.write(&block).await,
                Err(e) => {
                    error!("Metadata not sent: {e:?}");
                    Ok(())
                }
            },
        }
    }

    async fn drain(&mut self) -> Result<()> {
        let mut result = Ok(());
        if let Some(chunks) = self.session.samples() {
            trace!("Sending {} bytes of samples", chunks.stream_len());
            for chunk in chunks {
                result = self.transport.write(&chunk).await.map_err(|e| {
                    warn!("Transport write failed: {e:?}");
                    Error::Transport
                });
                if result.is_err() {
                    break;
                }
            }
        }
        self.session.finish_drain();
        result
    }

    async fn read(&mut self, buf: &mut [u8]) -> Result<()> {
        self.transport.read(buf).await.map_err(|e| {
            warn!("Transport read failed: {e:?}");
            Error::Transport
        })
    }

    async fn write(&mut self, data: &[u8]) -> Result<()> {
        self.transport.write(data).await.map_err(|e| {
            warn!("Transport write failed: {e:?}");
            Error::Transport
        })
    }
}
