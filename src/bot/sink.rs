//! Outbound text path: UTF-8 safe chunking and ordered, serialized frame writes.
//!
//! Every outbound message, whether it is a command reply from the dispatch thread or a
//! relayed Mastodon notification, goes through one [`ChunkedMessageSink`]. The sink holds
//! a send lock for the duration of a whole message so the chunks of two messages can
//! never interleave on air.
use std::sync::{Arc, Mutex};

use log::{debug, warn};

use crate::errors::TransportError;
use crate::logutil::truncate_for_log;
use crate::meshtastic::MeshTransport;
use crate::metrics;

/// Split `text` into slices of at most `max_bytes` bytes without splitting a codepoint.
///
/// The slices are contiguous, so joining them reproduces `text` exactly. Text that
/// already fits (including the empty string) comes back as a single slice. A character
/// wider than `max_bytes` is emitted on its own so that chunking always progresses.
pub fn chunk_utf8(text: &str, max_bytes: usize) -> Vec<&str> {
    let max_bytes = max_bytes.max(1);
    if text.len() <= max_bytes {
        return vec![text];
    }
    let mut chunks = Vec::with_capacity(text.len() / max_bytes + 1);
    let mut remaining = text;
    while !remaining.is_empty() {
        if remaining.len() <= max_bytes {
            chunks.push(remaining);
            break;
        }
        let mut end = max_bytes;
        while end > 0 && !remaining.is_char_boundary(end) {
            end -= 1;
        }
        if end == 0 {
            end = remaining
                .chars()
                .next()
                .map(char::len_utf8)
                .unwrap_or(remaining.len());
        }
        let (head, tail) = remaining.split_at(end);
        chunks.push(head);
        remaining = tail;
    }
    chunks
}

struct SinkInner {
    transport: Arc<dyn MeshTransport>,
    max_bytes: usize,
    send_lock: Mutex<()>,
}

/// Splits outbound text into transport-sized frames and writes them in order.
///
/// Cloning is cheap; all clones share the transport and the send lock.
#[derive(Clone)]
pub struct ChunkedMessageSink {
    inner: Arc<SinkInner>,
}

impl ChunkedMessageSink {
    /// Sink whose chunk size is the transport's declared payload limit.
    pub fn new(transport: Arc<dyn MeshTransport>) -> Self {
        let max_bytes = transport.max_payload_bytes();
        Self::with_max_bytes(transport, max_bytes)
    }

    pub fn with_max_bytes(transport: Arc<dyn MeshTransport>, max_bytes: usize) -> Self {
        Self {
            inner: Arc::new(SinkInner {
                transport,
                max_bytes: max_bytes.max(1),
                send_lock: Mutex::new(()),
            }),
        }
    }

    pub fn max_bytes(&self) -> usize {
        self.inner.max_bytes
    }

    /// Send `text` on `channel`, returning the number of frames written.
    ///
    /// Stops at the first failed frame; nothing after it is attempted and the error
    /// reports which chunk failed.
    pub fn send(&self, text: &str, channel: u32) -> Result<usize, TransportError> {
        if text.is_empty() {
            debug!("Skipping empty send on channel {}", channel);
            return Ok(0);
        }
        let chunks = chunk_utf8(text, self.inner.max_bytes);
        let total = chunks.len();
        // a poisoned lock only means another sender panicked mid-message
        let _guard = self
            .inner
            .send_lock
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        for (i, chunk) in chunks.into_iter().enumerate() {
            if let Err(e) = self.inner.transport.send_text(chunk, channel) {
                metrics::inc_send_failures();
                warn!(
                    "Send aborted at chunk {}/{} on channel {}: {}",
                    i + 1,
                    total,
                    channel,
                    e
                );
                return Err(TransportError::Chunk {
                    index: i + 1,
                    total,
                    source: Box::new(e),
                });
            }
            metrics::inc_chunks_sent();
        }
        if total > 1 {
            debug!(
                "Sent {} chunks on channel {}: '{}'",
                total,
                channel,
                truncate_for_log(text, 80)
            );
        }
        Ok(total)
    }
}

/// Cloneable handle for sending through a shared sink with a default channel.
///
/// Background contexts (the notification relay) hold one of these instead of the bot.
#[derive(Clone)]
pub struct MessageSender {
    sink: ChunkedMessageSink,
    default_channel: u32,
}

impl MessageSender {
    pub fn new(sink: ChunkedMessageSink, default_channel: u32) -> Self {
        Self {
            sink,
            default_channel,
        }
    }

    pub fn default_channel(&self) -> u32 {
        self.default_channel
    }

    pub fn sink(&self) -> &ChunkedMessageSink {
        &self.sink
    }

    /// `None` resolves to the default channel.
    pub fn send_text(&self, text: &str, channel: Option<u32>) -> Result<(), TransportError> {
        let channel = channel.unwrap_or(self.default_channel);
        self.sink.send(text, channel).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::meshtastic::RecordingTransport;

    #[test]
    fn single_chunk_when_text_fits() {
        assert_eq!(chunk_utf8("hello", 5), vec!["hello"]);
        assert_eq!(chunk_utf8("", 5), vec![""]);
    }

    #[test]
    fn three_full_chunks_and_a_tail() {
        let b = 10;
        let text = "x".repeat(3 * b + 5);
        let sizes: Vec<usize> = chunk_utf8(&text, b).iter().map(|c| c.len()).collect();
        assert_eq!(sizes, vec![10, 10, 10, 5]);
    }

    #[test]
    fn never_splits_multibyte_characters() {
        // "é" is 2 bytes; with max 3 every chunk must hold exactly one "aé"-aligned boundary
        let text = "aéaéaéaé";
        let chunks = chunk_utf8(text, 3);
        assert_eq!(chunks.concat(), text);
        assert!(chunks.iter().all(|c| c.len() <= 3));
        assert_eq!(chunks, vec!["aé", "aé", "aé", "aé"]);
    }

    #[test]
    fn oversized_character_is_emitted_alone() {
        let chunks = chunk_utf8("🙂🙂", 2);
        assert_eq!(chunks, vec!["🙂", "🙂"]);
    }

    #[test]
    fn round_trip_for_mixed_scripts() {
        let text = "Mixed: 🎮中文—test… ".repeat(15);
        for b in [1, 2, 3, 4, 7, 50, 220] {
            let chunks = chunk_utf8(&text, b);
            assert_eq!(chunks.concat(), text, "max_bytes={}", b);
            if b >= 4 {
                assert!(chunks.iter().all(|c| c.len() <= b));
            }
        }
    }

    #[test]
    fn send_writes_chunks_in_order() {
        let transport = Arc::new(RecordingTransport::new(4));
        let sink = ChunkedMessageSink::new(transport.clone());
        assert_eq!(sink.send("abcdefghij", 2).unwrap(), 3);
        assert_eq!(
            transport.frames(),
            vec![
                (2, "abcd".to_string()),
                (2, "efgh".to_string()),
                (2, "ij".to_string())
            ]
        );
    }

    #[test]
    fn send_aborts_after_failed_chunk() {
        let transport = Arc::new(RecordingTransport::failing_at(4, 1));
        let sink = ChunkedMessageSink::new(transport.clone());
        let err = sink.send("abcdefghijkl", 0).unwrap_err();
        match err {
            TransportError::Chunk { index, total, .. } => {
                assert_eq!(index, 2);
                assert_eq!(total, 3);
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(transport.texts(), vec!["abcd".to_string()]);
    }

    #[test]
    fn sender_resolves_default_channel() {
        let transport = Arc::new(RecordingTransport::new(50));
        let sender = MessageSender::new(ChunkedMessageSink::new(transport.clone()), 2);
        sender.send_text("one", None).unwrap();
        sender.send_text("two", Some(0)).unwrap();
        assert_eq!(
            transport.frames(),
            vec![(2, "one".to_string()), (0, "two".to_string())]
        );
    }
}
