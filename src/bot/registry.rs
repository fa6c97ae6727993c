//! Command table: name -> handler plus the help metadata shown by `help`.
//!
//! The registry is generic over the context type handed to handlers so it stays a
//! plain data structure; [`crate::bot::Bot`] instantiates it with itself.
use std::any::Any;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};

use log::{debug, error, warn};

use crate::errors::CommandError;
use crate::logutil::escape_log;

/// Command handler. Receives the dispatch context and the whitespace-split arguments.
pub type CommandHandler<C> = fn(&mut C, &[String]) -> anyhow::Result<()>;

/// One registered command.
pub struct CommandSpec<C> {
    pub name: String,
    pub handler: CommandHandler<C>,
    pub help: String,
    pub example: String,
}

impl<C> Clone for CommandSpec<C> {
    fn clone(&self) -> Self {
        Self {
            name: self.name.clone(),
            handler: self.handler,
            help: self.help.clone(),
            example: self.example.clone(),
        }
    }
}

impl<C> std::fmt::Debug for CommandSpec<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandSpec")
            .field("name", &self.name)
            .field("help", &self.help)
            .field("example", &self.example)
            .finish()
    }
}

/// Commands in registration order, indexed by name.
pub struct CommandRegistry<C> {
    entries: Vec<CommandSpec<C>>,
    index: HashMap<String, usize>,
}

impl<C> Default for CommandRegistry<C> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            index: HashMap::new(),
        }
    }
}

impl<C> Clone for CommandRegistry<C> {
    fn clone(&self) -> Self {
        Self {
            entries: self.entries.clone(),
            index: self.index.clone(),
        }
    }
}

impl<C> std::fmt::Debug for CommandRegistry<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.entries.iter()).finish()
    }
}

impl<C> CommandRegistry<C> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a command. Re-registering a name keeps its original position.
    pub fn register(
        &mut self,
        name: &str,
        handler: CommandHandler<C>,
        help: &str,
        example: &str,
    ) -> Result<(), CommandError> {
        if crate::validation::validate_command_name(name).is_err() {
            return Err(CommandError::InvalidName(name.to_string()));
        }
        let spec = CommandSpec {
            name: name.to_string(),
            handler,
            help: help.to_string(),
            example: example.to_string(),
        };
        match self.index.get(name) {
            Some(&pos) => {
                warn!("Command '{}' re-registered; replacing previous handler", name);
                self.entries[pos] = spec;
            }
            None => {
                self.index.insert(name.to_string(), self.entries.len());
                self.entries.push(spec);
            }
        }
        Ok(())
    }

    /// Run the handler for `name`. Errors and panics raised by the handler are caught
    /// here and come back as [`CommandError::Execution`].
    pub fn execute(&self, ctx: &mut C, name: &str, args: &[String]) -> Result<(), CommandError> {
        let spec = match self.get(name) {
            Some(spec) => spec,
            None => {
                debug!("Unknown command '{}'", escape_log(name));
                return Err(CommandError::NotFound(name.to_string()));
            }
        };
        let handler = spec.handler;
        let reason = match catch_unwind(AssertUnwindSafe(|| handler(ctx, args))) {
            Ok(Ok(())) => return Ok(()),
            Ok(Err(e)) => format!("{:#}", e),
            Err(payload) => format!("panicked: {}", panic_message(payload.as_ref())),
        };
        error!(
            "Command '{}' failed (args={:?}): {}",
            name,
            args,
            escape_log(&reason)
        );
        Err(CommandError::Execution {
            name: name.to_string(),
            reason,
        })
    }

    pub fn get(&self, name: &str) -> Option<&CommandSpec<C>> {
        self.index.get(name).map(|&pos| &self.entries[pos])
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Registered names in insertion order.
    pub fn list(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Best-effort text from a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Calls {
        seen: Vec<Vec<String>>,
    }

    fn record(ctx: &mut Calls, args: &[String]) -> anyhow::Result<()> {
        ctx.seen.push(args.to_vec());
        Ok(())
    }

    fn record_twice(ctx: &mut Calls, args: &[String]) -> anyhow::Result<()> {
        ctx.seen.push(args.to_vec());
        ctx.seen.push(args.to_vec());
        Ok(())
    }

    fn fails(_: &mut Calls, _: &[String]) -> anyhow::Result<()> {
        anyhow::bail!("disk on fire")
    }

    fn panics(_: &mut Calls, _: &[String]) -> anyhow::Result<()> {
        panic!("handler exploded")
    }

    #[test]
    fn execute_invokes_handler_once_with_args() {
        let mut reg = CommandRegistry::new();
        reg.register("ping", record, "Ping", "!ping").unwrap();
        let mut calls = Calls::default();
        reg.execute(&mut calls, "ping", &[]).unwrap();
        assert_eq!(calls.seen, vec![Vec::<String>::new()]);
    }

    #[test]
    fn unknown_command_is_not_found() {
        let reg: CommandRegistry<Calls> = CommandRegistry::new();
        let mut calls = Calls::default();
        match reg.execute(&mut calls, "xyz", &[]) {
            Err(CommandError::NotFound(name)) => assert_eq!(name, "xyz"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn failures_and_panics_are_contained() {
        let mut reg = CommandRegistry::new();
        reg.register("bad", fails, "", "").unwrap();
        reg.register("boom", panics, "", "").unwrap();
        reg.register("ok", record, "", "").unwrap();
        let mut calls = Calls::default();

        match reg.execute(&mut calls, "bad", &[]) {
            Err(CommandError::Execution { name, reason }) => {
                assert_eq!(name, "bad");
                assert!(reason.contains("disk on fire"));
            }
            other => panic!("unexpected {:?}", other),
        }
        match reg.execute(&mut calls, "boom", &[]) {
            Err(CommandError::Execution { reason, .. }) => {
                assert!(reason.contains("handler exploded"))
            }
            other => panic!("unexpected {:?}", other),
        }
        reg.execute(&mut calls, "ok", &["a".to_string()]).unwrap();
        assert_eq!(calls.seen, vec![vec!["a".to_string()]]);
    }

    #[test]
    fn re_registration_replaces_in_place() {
        let mut reg = CommandRegistry::new();
        reg.register("a", record, "first", "").unwrap();
        reg.register("b", record, "", "").unwrap();
        reg.register("a", record_twice, "second", "").unwrap();
        assert_eq!(reg.list(), vec!["a", "b"]);
        assert_eq!(reg.get("a").unwrap().help, "second");

        let mut calls = Calls::default();
        reg.execute(&mut calls, "a", &[]).unwrap();
        assert_eq!(calls.seen.len(), 2);
    }

    #[test]
    fn empty_name_rejected() {
        let mut reg = CommandRegistry::<Calls>::new();
        assert!(matches!(
            reg.register("", record, "", ""),
            Err(CommandError::InvalidName(_))
        ));
        assert!(reg.is_empty());
    }
}
