//! Bot adapter that bridges the mesh to a social account.
//!
//! Adds `post`, `login` and `ping`, greets the mesh on connection, optionally posts
//! plain radio chatter, and owns the [`NotificationRelay`] that pushes notifications
//! back to the mesh.
use log::{info, warn};

use super::core::{Bot, BotAdapter};
use super::registry::CommandRegistry;
use super::sink::MessageSender;
use crate::errors::SocialError;
use crate::logutil::truncate_for_log;
use crate::social::{NotificationRelay, SocialAdapter};

#[derive(Debug, Clone)]
pub struct SocialBotOptions {
    /// Sent on the default channel whenever the radio (re)connects.
    pub greeting: Option<String>,
    /// Channel notifications are relayed to.
    pub notify_channel: u32,
    /// Post every non-command message to the social account.
    pub relay_unhandled: bool,
    /// Relay streaming notifications.
    pub stream_notifications: bool,
}

impl Default for SocialBotOptions {
    fn default() -> Self {
        Self {
            greeting: Some("Connected to Mesh!".to_string()),
            notify_channel: 0,
            relay_unhandled: false,
            stream_notifications: true,
        }
    }
}

pub struct SocialBot<S: SocialAdapter> {
    social: S,
    options: SocialBotOptions,
    relay: Option<NotificationRelay>,
}

impl<S: SocialAdapter> SocialBot<S> {
    pub fn new(social: S, options: SocialBotOptions) -> Self {
        Self {
            social,
            options,
            relay: None,
        }
    }

    pub fn social(&self) -> &S {
        &self.social
    }

    pub fn social_mut(&mut self) -> &mut S {
        &mut self.social
    }

    pub fn options(&self) -> &SocialBotOptions {
        &self.options
    }

    pub fn relay_running(&self) -> bool {
        self.relay.as_ref().map(NotificationRelay::is_running).unwrap_or(false)
    }

    /// Replace any running relay with one on a fresh subscription.
    /// A no-op when streaming is disabled or the account is not logged in.
    pub fn restart_relay(&mut self, sender: MessageSender) -> Result<(), SocialError> {
        if !self.options.stream_notifications {
            return Ok(());
        }
        if let Some(mut old) = self.relay.take() {
            old.stop();
        }
        if !self.social.is_authenticated() {
            info!("Not logged in; notification relay not started");
            return Ok(());
        }
        let stream = self.social.subscribe()?;
        self.relay = Some(NotificationRelay::start(
            stream,
            sender,
            self.options.notify_channel,
        )?);
        Ok(())
    }

    /// Stop the relay and wait for its thread.
    pub fn shutdown(&mut self) {
        if let Some(mut relay) = self.relay.take() {
            relay.stop();
            relay.join();
        }
    }
}

/// Restart the relay from inside a handler, reporting failures to the log only.
fn restart_relay_for<S: SocialAdapter>(bot: &mut Bot<SocialBot<S>>) {
    let sender = bot.sender().clone();
    if let Err(e) = bot.adapter_mut().restart_relay(sender) {
        warn!("Failed to start notification relay: {}", e);
    }
}

fn post_command<S: SocialAdapter>(bot: &mut Bot<SocialBot<S>>, args: &[String]) -> anyhow::Result<()> {
    if args.is_empty() {
        bot.reply(&format!("Usage: {}post <message>", bot.prefix()))?;
        return Ok(());
    }
    let message = args.join(" ");
    match bot.adapter_mut().social.post(&message) {
        Ok(()) => bot.reply("Posted to Mastodon.")?,
        Err(SocialError::NotAuthenticated) => {
            bot.reply(&format!("Not logged in. Use {}login <instance>", bot.prefix()))?
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

fn login_command<S: SocialAdapter>(bot: &mut Bot<SocialBot<S>>, args: &[String]) -> anyhow::Result<()> {
    if args.len() != 1 {
        bot.reply(&format!("Usage: {}login <instance>", bot.prefix()))?;
        return Ok(());
    }
    let url = match bot.adapter_mut().social.login(&args[0]) {
        Ok(url) => url,
        Err(SocialError::InvalidInstance(reason)) => {
            bot.reply(&format!("Invalid instance: {}", reason))?;
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };
    info!("Auth URL: {}", truncate_for_log(&url, 200));
    bot.reply(&url)?;
    bot.reply("Enter your OAuth code:")?;
    bot.wait_for_next_message(|bot: &mut Bot<SocialBot<S>>, code: &str| {
        bot.adapter_mut().social.complete_login(code)?;
        bot.reply("Login successful!")?;
        restart_relay_for(bot);
        Ok(())
    });
    Ok(())
}

fn ping_command<S: SocialAdapter>(bot: &mut Bot<SocialBot<S>>, _args: &[String]) -> anyhow::Result<()> {
    bot.reply("pong")?;
    Ok(())
}

impl<S: SocialAdapter> BotAdapter for SocialBot<S> {
    fn register_custom_commands(&self, registry: &mut CommandRegistry<Bot<Self>>) {
        let commands: [(&str, super::registry::CommandHandler<Bot<Self>>, &str, &str); 3] = [
            ("post", post_command::<S>, "Post to Mastodon", "!post Hello World"),
            (
                "login",
                login_command::<S>,
                "Authenticate with a Mastodon server. Required argument: mastodon instance",
                "!login tomkahe.com",
            ),
            ("ping", ping_command::<S>, "Check that the bot is alive", "!ping"),
        ];
        for (name, handler, help, example) in commands {
            if let Err(e) = registry.register(name, handler, help, example) {
                warn!("Failed to register '{}': {}", name, e);
            }
        }
    }

    fn on_connection(bot: &mut Bot<Self>) {
        if let Some(greeting) = bot.adapter().options.greeting.clone() {
            let _ = bot.send_text(&greeting, None);
        }
    }

    fn on_unhandled_message(bot: &mut Bot<Self>, text: &str) {
        if !bot.adapter().options.relay_unhandled || text.trim().is_empty() {
            return;
        }
        if !bot.adapter().social.is_authenticated() {
            return;
        }
        if let Err(e) = bot.adapter_mut().social.post(text) {
            warn!("Failed to relay message to Mastodon: {}", e);
        }
    }
}

impl<S: SocialAdapter> Drop for SocialBot<S> {
    fn drop(&mut self) {
        if let Some(mut relay) = self.relay.take() {
            relay.stop();
        }
    }
}
