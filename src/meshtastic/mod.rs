//! # Meshtastic Transport Module
//!
//! This module is the boundary between the bot and the radio. It exposes a small
//! [`MeshTransport`] trait for outbound text frames and a [`RadioEvent`] stream for
//! inbound traffic, so the bot core never touches serial ports or protobufs directly.
//!
//! ## Implementations
//!
//! - [`serial::SerialRadio`] (feature `serial`) - USB/UART link speaking the Meshtastic
//!   stream API (`0x94 0xC3` framed protobufs)
//! - [`DisabledTransport`] - used when no device could be opened; every send is dropped
//! - [`RecordingTransport`] - in-memory capture of every frame, for tests and dry runs
//!
//! ## Configuration
//!
//! ```toml
//! [meshtastic]
//! port = "/dev/ttyUSB0"
//! baud_rate = 115200
//! channel = 0
//! max_text_bytes = 220
//! ```

pub mod framer;
pub mod proto;
#[cfg(feature = "serial")]
pub mod serial;

use std::sync::Mutex;

use log::debug;

use crate::errors::TransportError;
use crate::logutil::escape_log;

/// Largest text payload a single Meshtastic data packet can carry.
pub const MAX_TEXT_PAYLOAD: usize = 233;

/// Conservative default that leaves room for firmware-side overhead.
pub const DEFAULT_TEXT_BYTES: usize = 220;

/// Outbound side of a mesh radio link.
///
/// `send_text` writes exactly one frame; callers are responsible for keeping `text`
/// within [`MeshTransport::max_payload_bytes`].
pub trait MeshTransport: Send + Sync {
    fn send_text(&self, text: &str, channel: u32) -> Result<(), TransportError>;

    fn max_payload_bytes(&self) -> usize;
}

/// Structured text event extracted from a received packet.
///
/// Fields the radio did not populate stay `None`; the event bridge normalizes them.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TextEvent {
    pub source: u32,
    pub dest: Option<u32>,
    pub channel: Option<u32>,
    pub text: Option<String>,
}

/// Notifications emitted by a radio reader.
#[derive(Debug, Clone, PartialEq)]
pub enum RadioEvent {
    /// A text message arrived on some channel.
    Text(TextEvent),
    /// The radio finished its configuration handshake (initial connect or reconnect).
    ConnectionEstablished,
    /// The link dropped; the reader stops after sending this.
    Disconnected,
}

/// Transport used when the radio could not be opened. Sends succeed without
/// transmitting anything.
#[derive(Debug, Default)]
pub struct DisabledTransport {
    max_bytes: usize,
}

impl DisabledTransport {
    pub fn new(max_bytes: usize) -> Self {
        Self { max_bytes }
    }
}

impl MeshTransport for DisabledTransport {
    fn send_text(&self, text: &str, channel: u32) -> Result<(), TransportError> {
        debug!(
            "(disabled) dropping text for channel {}: '{}'",
            channel,
            escape_log(text)
        );
        Ok(())
    }

    fn max_payload_bytes(&self) -> usize {
        self.max_bytes
    }
}

/// Captures every frame in memory instead of transmitting it.
///
/// `fail_at` makes the n-th frame (0-based, counted across the transport's lifetime)
/// fail with an IO error, which lets callers exercise abort paths.
#[derive(Debug)]
pub struct RecordingTransport {
    max_bytes: usize,
    frames: Mutex<Vec<(u32, String)>>,
    attempts: Mutex<usize>,
    fail_at: Option<usize>,
}

impl RecordingTransport {
    pub fn new(max_bytes: usize) -> Self {
        Self {
            max_bytes,
            frames: Mutex::new(Vec::new()),
            attempts: Mutex::new(0),
            fail_at: None,
        }
    }

    pub fn failing_at(max_bytes: usize, frame_index: usize) -> Self {
        Self {
            fail_at: Some(frame_index),
            ..Self::new(max_bytes)
        }
    }

    /// All frames sent so far as `(channel, text)`.
    pub fn frames(&self) -> Vec<(u32, String)> {
        self.frames.lock().map(|f| f.clone()).unwrap_or_default()
    }

    /// Frame texts only, in send order.
    pub fn texts(&self) -> Vec<String> {
        self.frames().into_iter().map(|(_, t)| t).collect()
    }

    pub fn clear(&self) {
        if let Ok(mut f) = self.frames.lock() {
            f.clear();
        }
    }
}

impl MeshTransport for RecordingTransport {
    fn send_text(&self, text: &str, channel: u32) -> Result<(), TransportError> {
        let attempt = {
            let mut guard = self
                .attempts
                .lock()
                .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "poisoned"))?;
            let n = *guard;
            *guard += 1;
            n
        };
        if self.fail_at == Some(attempt) {
            return Err(TransportError::Io(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "simulated radio write failure",
            )));
        }
        let mut frames = self
            .frames
            .lock()
            .map_err(|_| std::io::Error::new(std::io::ErrorKind::Other, "poisoned"))?;
        frames.push((channel, text.to_string()));
        Ok(())
    }

    fn max_payload_bytes(&self) -> usize {
        self.max_bytes
    }
}
