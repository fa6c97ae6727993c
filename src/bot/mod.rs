//! # Bot Framework
//!
//! Everything between the radio and the command handlers:
//!
//! - [`registry`] - name to handler table with help metadata
//! - [`sink`] - UTF-8 safe chunking and the serialized outbound path
//! - [`core`] - the [`Bot`] state machine and the [`BotAdapter`] hooks
//! - [`events`] - radio event translation ([`EventBridge`])
//! - [`social`] - the Mastodon-facing adapter ([`SocialBot`])
//!
//! ## Wiring
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use meshbot::bot::{Bot, ChunkedMessageSink, MessageSender};
//! use meshbot::meshtastic::RecordingTransport;
//!
//! let transport = Arc::new(RecordingTransport::new(220));
//! let sender = MessageSender::new(ChunkedMessageSink::new(transport), 0);
//! let mut bot = Bot::new(sender, '!', ());
//! bot.on_receive(meshbot::bot::InboundMessage { text: "!help".into(), channel_index: 0 });
//! ```

pub mod core;
pub mod events;
pub mod registry;
pub mod sink;
pub mod social;

pub use self::core::{Bot, BotAdapter, BotState, PendingResponse};
pub use events::{EventBridge, InboundMessage};
pub use registry::{CommandHandler, CommandRegistry, CommandSpec};
pub use sink::{chunk_utf8, ChunkedMessageSink, MessageSender};
pub use social::SocialBot;
