//! Adapts radio events into bot calls.
use log::{debug, info, warn};
use tokio::sync::mpsc;

use super::core::{Bot, BotAdapter};
use crate::meshtastic::{RadioEvent, TextEvent};

/// A received text message as the bot sees it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub text: String,
    pub channel_index: u32,
}

impl From<TextEvent> for InboundMessage {
    fn from(event: TextEvent) -> Self {
        Self {
            text: event.text.unwrap_or_default(),
            channel_index: event.channel.unwrap_or(0),
        }
    }
}

/// Feeds [`RadioEvent`]s into a [`Bot`] on the calling thread.
pub struct EventBridge;

impl EventBridge {
    /// Translate one event. A disconnect is only logged; the bot keeps its state.
    pub fn handle<A: BotAdapter>(bot: &mut Bot<A>, event: RadioEvent) {
        match event {
            RadioEvent::Text(text_event) => {
                if text_event.text.is_none() {
                    debug!(
                        "Text event from 0x{:08x} without text; treating as empty",
                        text_event.source
                    );
                }
                bot.on_receive(InboundMessage::from(text_event));
            }
            RadioEvent::ConnectionEstablished => bot.on_connection(),
            RadioEvent::Disconnected => warn!("Radio disconnected"),
        }
    }

    /// Blocking loop; must run outside the async runtime. Returns when every event
    /// sender is gone. A disconnect is logged and the loop keeps draining in case the
    /// reader is replaced.
    pub fn run<A: BotAdapter>(mut events: mpsc::UnboundedReceiver<RadioEvent>, bot: &mut Bot<A>) {
        info!("Event bridge started");
        while let Some(event) = events.blocking_recv() {
            Self::handle(bot, event);
        }
        info!("Event bridge stopped: event channel closed");
    }
}
