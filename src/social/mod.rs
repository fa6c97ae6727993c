//! # Social Network Adapters
//!
//! The bot talks to a social network only through [`SocialAdapter`]. The shipped
//! implementation is [`mastodon::MastodonClient`]; tests use in-memory fakes.
//!
//! Notifications arrive on a [`NotificationStream`] and are pushed to the mesh by a
//! [`NotificationRelay`] running on its own thread. The relay only ever holds a
//! [`MessageSender`], never the bot, so it cannot touch command state.

pub mod html;
pub mod mastodon;

use std::thread::JoinHandle;

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::task::AbortHandle;

use crate::bot::MessageSender;
use crate::errors::SocialError;
use crate::logutil::truncate_for_log;
use crate::metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Mention,
    Favourite,
    Reblog,
    Follow,
    Status,
}

impl NotificationKind {
    /// Map the wire name used by the streaming API. Unknown kinds yield `None`.
    pub fn from_api(kind: &str) -> Option<Self> {
        match kind {
            "mention" => Some(Self::Mention),
            "favourite" => Some(Self::Favourite),
            "reblog" => Some(Self::Reblog),
            "follow" => Some(Self::Follow),
            "status" => Some(Self::Status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub account_handle: String,
    /// Status text with markup removed; empty for kinds without a status body.
    pub plain_text_body: String,
}

impl Notification {
    /// One-line mesh rendering.
    pub fn render(&self) -> String {
        let acct = &self.account_handle;
        match self.kind {
            NotificationKind::Mention => format!("{} mentioned you: {}", acct, self.plain_text_body),
            NotificationKind::Favourite => format!("{} liked your status", acct),
            NotificationKind::Reblog => format!("{} boosted your status", acct),
            NotificationKind::Follow => format!("{} followed you", acct),
            NotificationKind::Status => format!("{} posted: {}", acct, self.plain_text_body),
        }
    }
}

/// Live notification feed returned by [`SocialAdapter::subscribe`].
///
/// Dropping the stream stops its producer task, if it has one.
pub struct NotificationStream {
    receiver: mpsc::UnboundedReceiver<Notification>,
    producer: Option<AbortHandle>,
}

impl NotificationStream {
    pub fn new(receiver: mpsc::UnboundedReceiver<Notification>) -> Self {
        Self {
            receiver,
            producer: None,
        }
    }

    pub fn with_producer(receiver: mpsc::UnboundedReceiver<Notification>, producer: AbortHandle) -> Self {
        Self {
            receiver,
            producer: Some(producer),
        }
    }

    /// Handle that stops the producer from another thread.
    pub fn producer(&self) -> Option<AbortHandle> {
        self.producer.clone()
    }

    /// Blocks until the next notification; `None` once the producer is gone.
    /// Must not be called from inside the async runtime.
    pub fn blocking_next(&mut self) -> Option<Notification> {
        self.receiver.blocking_recv()
    }

    pub async fn next(&mut self) -> Option<Notification> {
        self.receiver.recv().await
    }
}

impl Drop for NotificationStream {
    fn drop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }
}

/// Authentication, posting and notifications for one social account.
///
/// Methods block; the bot calls them from its dispatch thread.
pub trait SocialAdapter: Send + 'static {
    /// Publish a status. [`SocialError::NotAuthenticated`] when no account is set up.
    fn post(&mut self, text: &str) -> Result<(), SocialError>;

    /// Start authorization against `instance`, returning the URL the user must open.
    fn login(&mut self, instance: &str) -> Result<String, SocialError>;

    /// Finish authorization with the code the user obtained from the login URL.
    fn complete_login(&mut self, code: &str) -> Result<(), SocialError>;

    /// Open the notification stream for the authenticated account.
    fn subscribe(&mut self) -> Result<NotificationStream, SocialError>;

    fn is_authenticated(&self) -> bool;
}

/// Background thread pushing rendered notifications to the mesh.
pub struct NotificationRelay {
    producer: Option<AbortHandle>,
    thread: Option<JoinHandle<()>>,
}

impl NotificationRelay {
    pub fn start(mut stream: NotificationStream, sender: MessageSender, channel: u32) -> Result<Self, SocialError> {
        let producer = stream.producer();
        let thread = std::thread::Builder::new()
            .name("notification-relay".to_string())
            .spawn(move || {
                info!("Notification relay started (channel {})", channel);
                while let Some(notification) = stream.blocking_next() {
                    let text = notification.render();
                    debug!("Relaying notification: '{}'", truncate_for_log(&text, 80));
                    match sender.send_text(&text, Some(channel)) {
                        Ok(()) => metrics::inc_notifications_relayed(),
                        Err(e) => warn!("Failed to relay notification to mesh: {}", e),
                    }
                }
                info!("Notification relay stopped");
            })?;
        Ok(Self {
            producer,
            thread: Some(thread),
        })
    }

    pub fn is_running(&self) -> bool {
        self.thread.as_ref().map(|t| !t.is_finished()).unwrap_or(false)
    }

    /// Stop the producer; the relay thread exits once the stream drains.
    pub fn stop(&mut self) {
        if let Some(producer) = self.producer.take() {
            producer.abort();
        }
    }

    /// Wait for the relay thread to exit.
    pub fn join(mut self) {
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                warn!("Notification relay thread panicked");
            }
        }
    }
}

impl Drop for NotificationRelay {
    fn drop(&mut self) {
        self.stop();
    }
}
