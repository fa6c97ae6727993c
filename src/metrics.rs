//! Process-wide counters for bot and bridge activity.
//! Logged as a single line at shutdown; cheap enough to bump from any thread.
use std::sync::atomic::{AtomicU64, Ordering};

static MESSAGES_RECEIVED: AtomicU64 = AtomicU64::new(0);
static COMMANDS_EXECUTED: AtomicU64 = AtomicU64::new(0);
static COMMAND_FAILURES: AtomicU64 = AtomicU64::new(0);
static UNKNOWN_COMMANDS: AtomicU64 = AtomicU64::new(0);
static CHUNKS_SENT: AtomicU64 = AtomicU64::new(0);
static SEND_FAILURES: AtomicU64 = AtomicU64::new(0);
static NOTIFICATIONS_RELAYED: AtomicU64 = AtomicU64::new(0);

pub fn inc_messages_received() {
    MESSAGES_RECEIVED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_commands_executed() {
    COMMANDS_EXECUTED.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_command_failures() {
    COMMAND_FAILURES.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_unknown_commands() {
    UNKNOWN_COMMANDS.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_chunks_sent() {
    CHUNKS_SENT.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_send_failures() {
    SEND_FAILURES.fetch_add(1, Ordering::Relaxed);
}
pub fn inc_notifications_relayed() {
    NOTIFICATIONS_RELAYED.fetch_add(1, Ordering::Relaxed);
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Snapshot {
    pub messages_received: u64,
    pub commands_executed: u64,
    pub command_failures: u64,
    pub unknown_commands: u64,
    pub chunks_sent: u64,
    pub send_failures: u64,
    pub notifications_relayed: u64,
}

impl std::fmt::Display for Snapshot {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "rx={} cmds={} cmd_fail={} unknown={} chunks={} send_fail={} notif={}",
            self.messages_received,
            self.commands_executed,
            self.command_failures,
            self.unknown_commands,
            self.chunks_sent,
            self.send_failures,
            self.notifications_relayed
        )
    }
}

pub fn snapshot() -> Snapshot {
    Snapshot {
        messages_received: MESSAGES_RECEIVED.load(Ordering::Relaxed),
        commands_executed: COMMANDS_EXECUTED.load(Ordering::Relaxed),
        command_failures: COMMAND_FAILURES.load(Ordering::Relaxed),
        unknown_commands: UNKNOWN_COMMANDS.load(Ordering::Relaxed),
        chunks_sent: CHUNKS_SENT.load(Ordering::Relaxed),
        send_failures: SEND_FAILURES.load(Ordering::Relaxed),
        notifications_relayed: NOTIFICATIONS_RELAYED.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_are_monotonic() {
        let before = snapshot();
        inc_chunks_sent();
        inc_unknown_commands();
        let after = snapshot();
        assert!(after.chunks_sent > before.chunks_sent);
        assert!(after.unknown_commands > before.unknown_commands);
    }
}
