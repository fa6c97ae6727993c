//! # Bridge Server - Application Wiring
//!
//! [`BridgeServer`] turns a [`Config`] into a running bridge:
//!
//! 1. open the Meshtastic radio (or fall back to a [`DisabledTransport`])
//! 2. build the outbound [`ChunkedMessageSink`] around it
//! 3. build the [`Bot`], with the Mastodon adapter when enabled
//! 4. start the notification relay if the account is already logged in
//! 5. run the [`EventBridge`] on a dedicated dispatch thread until Ctrl-C
//!
//! The radio reader and the bot each get their own OS thread; only the heartbeat and
//! the Mastodon HTTP work run on the async runtime.
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use log::{debug, error, info, warn};
use tokio::sync::mpsc;

use crate::bot::social::SocialBotOptions;
use crate::bot::{Bot, BotAdapter, ChunkedMessageSink, EventBridge, MessageSender, SocialBot};
use crate::config::Config;
use crate::errors::StartupError;
use crate::meshtastic::{DisabledTransport, MeshTransport, RadioEvent};
use crate::metrics;
use crate::social::mastodon::{MastodonClient, MastodonSettings};

pub struct BridgeServer {
    config: Config,
}

impl BridgeServer {
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open the radio on `port`. On failure either return [`StartupError`] (when the
    /// device is required) or fall back to a transport that drops every send.
    pub async fn open_transport(
        &self,
        port: Option<&str>,
        events: mpsc::UnboundedSender<RadioEvent>,
    ) -> Result<Arc<dyn MeshTransport>, StartupError> {
        let max_bytes = self.config.meshtastic.effective_max_text_bytes();
        let port = match port.filter(|p| !p.trim().is_empty()) {
            Some(p) => p.to_string(),
            None => {
                return self.degrade("<none>", "no device port configured".to_string());
            }
        };
        debug!("Outbound frames limited to {} bytes", max_bytes);
        match self.open_serial(&port, events).await {
            Ok(transport) => Ok(transport),
            Err(reason) => self.degrade(&port, reason),
        }
    }

    fn degrade(&self, port: &str, reason: String) -> Result<Arc<dyn MeshTransport>, StartupError> {
        if self.config.meshtastic.require_device_at_startup {
            return Err(StartupError {
                port: port.to_string(),
                reason,
            });
        }
        warn!(
            "Meshtastic device unavailable on {}: {} (continuing without radio)",
            port, reason
        );
        Ok(Arc::new(DisabledTransport::new(
            self.config.meshtastic.effective_max_text_bytes(),
        )))
    }

    #[cfg(feature = "serial")]
    async fn open_serial(
        &self,
        port: &str,
        events: mpsc::UnboundedSender<RadioEvent>,
    ) -> Result<Arc<dyn MeshTransport>, String> {
        use crate::meshtastic::serial::{RadioSettings, SerialRadio};

        let m = &self.config.meshtastic;
        let settings = RadioSettings {
            baud_rate: m.baud_rate,
            max_text_bytes: m.effective_max_text_bytes(),
            min_send_gap_ms: m.min_send_gap_ms,
            ..RadioSettings::default()
        };
        let (radio, reader) = SerialRadio::open(port, settings, events)
            .await
            .map_err(|e| e.to_string())?;
        std::thread::Builder::new()
            .name("serial-reader".to_string())
            .spawn(move || reader.run())
            .map_err(|e| e.to_string())?;

        if m.heartbeat_interval_secs > 0 {
            let hb_radio = Arc::clone(&radio);
            let period = Duration::from_secs(m.heartbeat_interval_secs);
            tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if let Err(e) = hb_radio.send_heartbeat() {
                        warn!("Heartbeat failed: {}", e);
                    }
                }
            });
        }
        info!("Connected to Meshtastic device on {}", port);
        Ok(radio)
    }

    #[cfg(not(feature = "serial"))]
    async fn open_serial(
        &self,
        _port: &str,
        _events: mpsc::UnboundedSender<RadioEvent>,
    ) -> Result<Arc<dyn MeshTransport>, String> {
        Err("serial support not compiled in (enable feature 'serial')".to_string())
    }

    /// Run until Ctrl-C. `port` overrides `meshtastic.port`.
    pub async fn run(self, port: Option<String>) -> Result<()> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let port = port.or_else(|| Some(self.config.meshtastic.port.clone()));
        let transport = self.open_transport(port.as_deref(), events_tx.clone()).await?;

        let sink = ChunkedMessageSink::with_max_bytes(
            transport,
            self.config.meshtastic.effective_max_text_bytes(),
        );
        let sender = MessageSender::new(sink, self.config.meshtastic.channel);
        let prefix = self.config.bot.prefix_char();

        if self.config.mastodon.enabled {
            let client =
                MastodonClient::open(MastodonSettings::from(&self.config.mastodon)).await?;
            let options = SocialBotOptions {
                greeting: self.config.bot.greeting.clone(),
                notify_channel: self.config.notify_channel(),
                relay_unhandled: self.config.mastodon.relay_unhandled,
                stream_notifications: self.config.mastodon.stream_notifications,
            };
            let mut bot = Bot::new(sender, prefix, SocialBot::new(client, options));
            let relay_sender = bot.sender().clone();
            if let Err(e) = bot.adapter_mut().restart_relay(relay_sender) {
                warn!("Failed to start notification relay: {}", e);
            }
            spawn_dispatch(bot, events_rx)?;
        } else {
            info!("Mastodon disabled; running mesh-only bot");
            let greeting = GreetingOnly(self.config.bot.greeting.clone());
            spawn_dispatch(Bot::new(sender, prefix, greeting), events_rx)?;
        }

        info!("{} running; press Ctrl-C to stop", self.config.bot.name);
        tokio::signal::ctrl_c().await?;
        info!("Received shutdown signal");
        info!("Final counters: {}", metrics::snapshot());
        Ok(())
    }

    pub async fn show_status(&self) -> Result<()> {
        println!("=== {} Status ===", self.config.bot.name);
        println!("Command prefix: {}", self.config.bot.prefix_char());
        println!(
            "Meshtastic: {} @ {} baud, channel {}, {} bytes/frame",
            self.config.meshtastic.port,
            self.config.meshtastic.baud_rate,
            self.config.meshtastic.channel,
            self.config.meshtastic.effective_max_text_bytes()
        );
        if !self.config.mastodon.enabled {
            println!("Mastodon: disabled");
            return Ok(());
        }
        let client = MastodonClient::open(MastodonSettings::from(&self.config.mastodon)).await?;
        match client.instance() {
            Some(instance) => println!("Mastodon: logged in on {}", instance),
            None => println!("Mastodon: not logged in"),
        }
        println!("Notification channel: {}", self.config.notify_channel());
        Ok(())
    }
}

/// Mesh-only adapter: greets on connection and nothing else.
struct GreetingOnly(Option<String>);

impl BotAdapter for GreetingOnly {
    fn on_connection(bot: &mut Bot<Self>) {
        if let Some(greeting) = bot.adapter().0.clone() {
            let _ = bot.send_text(&greeting, None);
        }
    }
}

fn spawn_dispatch<A: BotAdapter>(
    mut bot: Bot<A>,
    events: mpsc::UnboundedReceiver<RadioEvent>,
) -> Result<()> {
    std::thread::Builder::new()
        .name("bot-dispatch".to_string())
        .spawn(move || {
            EventBridge::run(events, &mut bot);
            error!("Bot dispatch loop exited");
        })?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn missing_device_degrades_when_not_required() {
        let mut config = Config::default();
        config.meshtastic.require_device_at_startup = false;
        let server = BridgeServer::new(config);
        let (tx, _rx) = mpsc::unbounded_channel();
        let transport = server
            .open_transport(Some("/dev/does-not-exist-meshbot"), tx)
            .await
            .unwrap();
        assert_eq!(transport.max_payload_bytes(), 220);
        assert!(transport.send_text("dropped", 0).is_ok());
    }

    #[tokio::test]
    async fn missing_device_is_fatal_when_required() {
        let mut config = Config::default();
        config.meshtastic.require_device_at_startup = true;
        let server = BridgeServer::new(config);
        let (tx, _rx) = mpsc::unbounded_channel();
        let err = server
            .open_transport(Some("/dev/does-not-exist-meshbot"), tx)
            .await
            .err()
            .unwrap();
        assert_eq!(err.port, "/dev/does-not-exist-meshbot");
    }
}
