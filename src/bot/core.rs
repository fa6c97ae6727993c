//! The bot state machine.
//!
//! A [`Bot`] is either idle, parsing prefixed messages as commands, or awaiting a
//! response, in which case the next message of any content is handed to a one-shot
//! continuation. Behavior beyond the built-in `help` command comes from a
//! [`BotAdapter`] composed into the bot.
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use log::{debug, error, info, trace, warn};

use super::events::InboundMessage;
use super::registry::{panic_message, CommandHandler, CommandRegistry};
use super::sink::MessageSender;
use crate::errors::{CommandError, TransportError};
use crate::logutil::{escape_log, truncate_for_log};
use crate::metrics;

/// Continuation run with the raw text of the next inbound message.
pub type PendingResponse<A> = Box<dyn FnOnce(&mut Bot<A>, &str) -> anyhow::Result<()> + Send>;

pub enum BotState<A: BotAdapter> {
    Idle,
    AwaitingResponse(PendingResponse<A>),
}

impl<A: BotAdapter> std::fmt::Debug for BotState<A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BotState::Idle => f.write_str("Idle"),
            BotState::AwaitingResponse(_) => f.write_str("AwaitingResponse"),
        }
    }
}

/// Extension points for a concrete bot.
///
/// Hooks receive the whole bot so they can reply, register follow-ups or reach the
/// adapter's own state through [`Bot::adapter_mut`]. Every hook defaults to a no-op.
pub trait BotAdapter: Send + Sized + 'static {
    /// Called once while the bot is built, right after `help` is registered.
    fn register_custom_commands(&self, _registry: &mut CommandRegistry<Bot<Self>>) {}

    /// The radio finished (re)connecting.
    fn on_connection(_bot: &mut Bot<Self>) {}

    /// A prefixed message was dispatched, whatever the outcome.
    fn on_command_executed(_bot: &mut Bot<Self>, _text: &str) {}

    /// A message without the command prefix arrived while idle.
    fn on_unhandled_message(_bot: &mut Bot<Self>, _text: &str) {}

    /// Runs after every inbound message.
    fn on_processed_message(_bot: &mut Bot<Self>, _text: &str) {}
}

/// A bot with no extra commands or hooks.
impl BotAdapter for () {}

pub struct Bot<A: BotAdapter> {
    registry: Arc<CommandRegistry<Bot<A>>>,
    state: BotState<A>,
    sender: MessageSender,
    prefix: char,
    reply_channel: Option<u32>,
    adapter: A,
}

impl<A: BotAdapter> Bot<A> {
    pub fn new(sender: MessageSender, prefix: char, adapter: A) -> Self {
        let mut registry = CommandRegistry::new();
        let help_example = format!("{}help", prefix);
        if let Err(e) = registry.register(
            "help",
            help_command::<A> as CommandHandler<Bot<A>>,
            "List available commands",
            &help_example,
        ) {
            warn!("Failed to register help: {}", e);
        }
        adapter.register_custom_commands(&mut registry);
        debug!("Bot ready with commands: {}", registry.list().join(", "));
        Self {
            registry: Arc::new(registry),
            state: BotState::Idle,
            sender,
            prefix,
            reply_channel: None,
            adapter,
        }
    }

    /// Add or replace a command after construction.
    pub fn register_command(
        &mut self,
        name: &str,
        handler: CommandHandler<Bot<A>>,
        help: &str,
        example: &str,
    ) -> Result<(), CommandError> {
        Arc::make_mut(&mut self.registry).register(name, handler, help, example)
    }

    pub fn registry(&self) -> &CommandRegistry<Bot<A>> {
        &self.registry
    }

    pub fn prefix(&self) -> char {
        self.prefix
    }

    pub fn default_channel(&self) -> u32 {
        self.sender.default_channel()
    }

    /// Cloneable handle sharing this bot's sink, for background senders.
    pub fn sender(&self) -> &MessageSender {
        &self.sender
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    pub fn adapter_mut(&mut self) -> &mut A {
        &mut self.adapter
    }

    pub fn state(&self) -> &BotState<A> {
        &self.state
    }

    pub fn is_awaiting_response(&self) -> bool {
        matches!(self.state, BotState::AwaitingResponse(_))
    }

    /// Channel of the message currently being handled, if any.
    pub fn reply_channel(&self) -> Option<u32> {
        self.reply_channel
    }

    /// Route the next inbound message, whatever it says, to `callback`.
    /// A previously pending callback is dropped without running.
    pub fn wait_for_next_message<F>(&mut self, callback: F)
    where
        F: FnOnce(&mut Bot<A>, &str) -> anyhow::Result<()> + Send + 'static,
    {
        if self.is_awaiting_response() {
            debug!("Replacing pending response handler");
        }
        self.state = BotState::AwaitingResponse(Box::new(callback));
    }

    /// Send `text` through the sink; `None` means the default channel.
    pub fn send_text(&self, text: &str, channel: Option<u32>) -> Result<(), TransportError> {
        self.sender.send_text(text, channel).map_err(|e| {
            error!(
                "Failed to send '{}': {}",
                truncate_for_log(text, 60),
                e
            );
            e
        })
    }

    /// Answer on the channel the current message came in on.
    pub fn reply(&self, text: &str) -> Result<(), TransportError> {
        self.send_text(text, self.reply_channel)
    }

    pub fn on_connection(&mut self) {
        info!("Mesh connection established");
        A::on_connection(self);
    }

    pub fn on_receive(&mut self, message: InboundMessage) {
        metrics::inc_messages_received();
        trace!(
            "on_receive ch={} state={:?} text='{}'",
            message.channel_index,
            self.state,
            escape_log(&message.text)
        );
        let text = message.text;
        self.reply_channel = Some(message.channel_index);

        match std::mem::replace(&mut self.state, BotState::Idle) {
            BotState::AwaitingResponse(callback) => self.run_pending(callback, &text),
            BotState::Idle => match self.parse_command(&text) {
                Some((name, args)) => {
                    self.dispatch(&name, &args);
                    A::on_command_executed(self, &text);
                }
                None => A::on_unhandled_message(self, &text),
            },
        }

        A::on_processed_message(self, &text);
        self.reply_channel = None;
    }

    fn parse_command(&self, text: &str) -> Option<(String, Vec<String>)> {
        let body = text.strip_prefix(self.prefix)?;
        let (name, rest) = match body.find(char::is_whitespace) {
            Some(pos) => body.split_at(pos),
            None => (body, ""),
        };
        let args = rest.split_whitespace().map(str::to_string).collect();
        Some((name.to_string(), args))
    }

    fn dispatch(&mut self, name: &str, args: &[String]) {
        let registry = Arc::clone(&self.registry);
        let outcome = registry.execute(self, name, args);
        let reply = match outcome {
            Ok(()) => {
                metrics::inc_commands_executed();
                return;
            }
            Err(CommandError::NotFound(name)) => {
                metrics::inc_unknown_commands();
                format!("Command '{}' not found.", name)
            }
            Err(CommandError::Execution { name, .. }) => {
                metrics::inc_command_failures();
                format!("Error executing '{}'.", name)
            }
            Err(e) => {
                warn!("Dispatch failed: {}", e);
                return;
            }
        };
        let _ = self.reply(&reply);
    }

    fn run_pending(&mut self, callback: PendingResponse<A>, text: &str) {
        let reason = match catch_unwind(AssertUnwindSafe(|| callback(self, text))) {
            Ok(Ok(())) => return,
            Ok(Err(e)) => format!("{:#}", e),
            Err(payload) => panic_message(payload.as_ref()),
        };
        error!("Pending response handler failed: {}", escape_log(&reason));
        let _ = self.reply(&format!("Error: {}", reason));
    }
}

/// Built-in `help [command]`.
fn help_command<A: BotAdapter>(bot: &mut Bot<A>, args: &[String]) -> anyhow::Result<()> {
    let text = match args.first() {
        Some(requested) => {
            let name = requested.strip_prefix(bot.prefix()).unwrap_or(requested);
            match bot.registry().get(name) {
                Some(spec) => format!(
                    "Command: {}\nHelp: {}\nExample: {}",
                    spec.name, spec.help, spec.example
                ),
                None => format!("Command '{}' not found.", name),
            }
        }
        None => format!("Available commands: {}", bot.registry().list().join(", ")),
    };
    bot.reply(&text)?;
    Ok(())
}
