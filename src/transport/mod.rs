//! Transport layer for communicating with the Claude Code CLI
//!
//! This module provides the transport abstraction, the newline-delimited JSON
//! codec and the subprocess implementation.

pub mod codec;
pub mod subprocess;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

/// Transport trait for communicating with Claude Code
///
/// A transport carries whole JSON frames in both directions. Reading is
/// single-pass: [`Transport::read_messages`] hands out the only receiver.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Connect to the transport
    ///
    /// # Errors
    /// `CliNotFound` if the executable cannot be resolved, `Connection` for other
    /// spawn failures
    async fn connect(&mut self) -> Result<()>;

    /// Write data to the transport
    ///
    /// # Arguments
    /// * `data` - One serialized frame, including its trailing newline
    ///
    /// # Errors
    /// Returns `Connection` if the transport is not ready, the process has
    /// exited, or the write fails
    async fn write(&mut self, data: &str) -> Result<()>;

    /// End the input stream (close stdin). Calling it twice is a no-op.
    ///
    /// # Errors
    /// Returns error if closing fails
    async fn end_input(&mut self) -> Result<()>;

    /// Read messages from the transport
    ///
    /// Returns a receiver yielding decoded JSON values. A background task does the
    /// reading so writes can proceed concurrently. The receiver closes when the
    /// stream ends; a non-zero exit of the underlying process is delivered as a
    /// final `Err` item. Calling this a second time yields a receiver carrying a
    /// single `Connection` error.
    fn read_messages(&mut self) -> mpsc::UnboundedReceiver<Result<serde_json::Value>>;

    /// Check if transport is ready for communication
    fn is_ready(&self) -> bool;

    /// Close the transport and release its resources. Never fails.
    async fn close(&mut self);
}

pub use codec::{JsonLineCodec, DEFAULT_MAX_BUFFER_SIZE};
pub use subprocess::{PromptInput, SubprocessTransport, TransportState};
