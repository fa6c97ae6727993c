//! Command dispatch, pending responses and hook ordering on the bot core.
mod common;

use common::{msg, recording_sender};
use meshbot::bot::{Bot, BotAdapter, CommandRegistry};

#[derive(Default)]
struct Recorder {
    hooks: Vec<String>,
}

fn ping(bot: &mut Bot<Recorder>, args: &[String]) -> anyhow::Result<()> {
    bot.adapter_mut().hooks.push(format!("ping{:?}", args));
    bot.reply("pong")?;
    Ok(())
}

fn fail(_: &mut Bot<Recorder>, _: &[String]) -> anyhow::Result<()> {
    anyhow::bail!("database unavailable")
}

fn boom(_: &mut Bot<Recorder>, _: &[String]) -> anyhow::Result<()> {
    panic!("index out of range")
}

impl BotAdapter for Recorder {
    fn register_custom_commands(&self, registry: &mut CommandRegistry<Bot<Self>>) {
        registry.register("ping", ping, "Reply with pong", "!ping").unwrap();
        registry.register("fail", fail, "Always fails", "!fail").unwrap();
        registry.register("boom", boom, "Always panics", "!boom").unwrap();
    }

    fn on_connection(bot: &mut Bot<Self>) {
        bot.adapter_mut().hooks.push("connection".into());
    }

    fn on_command_executed(bot: &mut Bot<Self>, text: &str) {
        bot.adapter_mut().hooks.push(format!("command:{}", text));
    }

    fn on_unhandled_message(bot: &mut Bot<Self>, text: &str) {
        bot.adapter_mut().hooks.push(format!("unhandled:{}", text));
    }

    fn on_processed_message(bot: &mut Bot<Self>, text: &str) {
        bot.adapter_mut().hooks.push(format!("processed:{}", text));
    }
}

#[test]
fn help_on_fresh_bot_lists_only_help() {
    let (transport, sender) = recording_sender(220, 0);
    let mut bot = Bot::new(sender, '!', ());
    bot.on_receive(msg("!help", 0));
    assert_eq!(transport.texts(), vec!["Available commands: help"]);
}

#[test]
fn help_lists_custom_commands_in_registration_order() {
    let (transport, sender) = recording_sender(220, 0);
    let mut bot = Bot::new(sender, '!', Recorder::default());
    bot.on_receive(msg("!help", 0));
    bot.on_receive(msg("!help ping", 0));
    assert_eq!(
        transport.texts(),
        vec![
            "Available commands: help, ping, fail, boom".to_string(),
            "Command: ping\nHelp: Reply with pong\nExample: !ping".to_string(),
        ]
    );
}

#[test]
fn unknown_command_replies_not_found() {
    let (transport, sender) = recording_sender(220, 0);
    let mut bot = Bot::new(sender, '!', Recorder::default());
    bot.on_receive(msg("!xyz", 0));
    assert_eq!(transport.texts(), vec!["Command 'xyz' not found."]);
    assert_eq!(
        bot.adapter().hooks,
        vec!["command:!xyz".to_string(), "processed:!xyz".to_string()]
    );
}

#[test]
fn hooks_fire_in_order() {
    let (_transport, sender) = recording_sender(220, 0);
    let mut bot = Bot::new(sender, '!', Recorder::default());
    bot.on_connection();
    bot.on_receive(msg("!ping a b", 0));
    bot.on_receive(msg("hello mesh", 0));
    assert_eq!(
        bot.adapter().hooks,
        vec![
            "connection",
            "ping[\"a\", \"b\"]",
            "command:!ping a b",
            "processed:!ping a b",
            "unhandled:hello mesh",
            "processed:hello mesh",
        ]
    );
}

#[test]
fn failing_commands_are_isolated() {
    let (transport, sender) = recording_sender(220, 4);
    let mut bot = Bot::new(sender, '!', Recorder::default());
    bot.on_receive(msg("!fail", 1));
    bot.on_receive(msg("!boom", 2));
    bot.on_receive(msg("!ping", 3));
    assert_eq!(
        transport.frames(),
        vec![
            (1, "Error executing 'fail'.".to_string()),
            (2, "Error executing 'boom'.".to_string()),
            (3, "pong".to_string()),
        ]
    );
    assert!(!bot.is_awaiting_response());
}

#[test]
fn only_latest_pending_callback_runs() {
    let (_transport, sender) = recording_sender(220, 0);
    let mut bot = Bot::new(sender, '!', Recorder::default());
    bot.wait_for_next_message(|bot: &mut Bot<Recorder>, text: &str| {
        bot.adapter_mut().hooks.push(format!("cb1:{}", text));
        Ok(())
    });
    bot.wait_for_next_message(|bot: &mut Bot<Recorder>, text: &str| {
        bot.adapter_mut().hooks.push(format!("cb2:{}", text));
        Ok(())
    });
    bot.on_receive(msg("answer", 0));
    assert_eq!(
        bot.adapter().hooks,
        vec!["cb2:answer".to_string(), "processed:answer".to_string()]
    );
    assert!(!bot.is_awaiting_response());
}

#[test]
fn pending_callback_takes_priority_over_commands() {
    let (transport, sender) = recording_sender(220, 0);
    let mut bot = Bot::new(sender, '!', Recorder::default());
    bot.wait_for_next_message(|bot: &mut Bot<Recorder>, text: &str| {
        bot.adapter_mut().hooks.push(format!("cb:{}", text));
        Ok(())
    });
    bot.on_receive(msg("!ping", 0));
    assert!(transport.texts().is_empty());
    assert_eq!(
        bot.adapter().hooks,
        vec!["cb:!ping".to_string(), "processed:!ping".to_string()]
    );

    // back to idle: the same text is now a command
    bot.on_receive(msg("!ping", 0));
    assert_eq!(transport.texts(), vec!["pong"]);
}

#[test]
fn panicking_callback_returns_bot_to_idle() {
    let (transport, sender) = recording_sender(220, 0);
    let mut bot = Bot::new(sender, '!', Recorder::default());
    bot.wait_for_next_message(|_: &mut Bot<Recorder>, _: &str| panic!("callback exploded"));
    bot.on_receive(msg("anything", 6));
    assert_eq!(transport.frames(), vec![(6, "Error: callback exploded".to_string())]);
    bot.on_receive(msg("!ping", 6));
    assert_eq!(transport.texts().last().map(String::as_str), Some("pong"));
}

#[test]
fn custom_prefix_is_respected() {
    let (transport, sender) = recording_sender(220, 0);
    let mut bot = Bot::new(sender, '/', Recorder::default());
    bot.on_receive(msg("!ping", 0));
    bot.on_receive(msg("/ping", 0));
    assert_eq!(transport.texts(), vec!["pong"]);
}

#[test]
fn long_reply_is_chunked_on_origin_channel() {
    let (transport, sender) = recording_sender(10, 0);
    let mut bot = Bot::new(sender, '!', Recorder::default());
    bot.on_receive(msg("!help", 5));
    let frames = transport.frames();
    assert!(frames.len() > 1);
    assert!(frames.iter().all(|(ch, t)| *ch == 5 && t.len() <= 10));
    let joined: String = frames.into_iter().map(|(_, t)| t).collect();
    assert_eq!(joined, "Available commands: help, ping, fail, boom");
}
