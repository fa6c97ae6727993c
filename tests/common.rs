//! Shared fixtures: an in-memory radio and a scripted social adapter.
#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use meshbot::bot::{ChunkedMessageSink, InboundMessage, MessageSender};
use meshbot::errors::SocialError;
use meshbot::meshtastic::RecordingTransport;
use meshbot::social::{Notification, NotificationStream, SocialAdapter};
use tokio::sync::mpsc;

pub fn recording_sender(max_bytes: usize, default_channel: u32) -> (Arc<RecordingTransport>, MessageSender) {
    let transport = Arc::new(RecordingTransport::new(max_bytes));
    let sink = ChunkedMessageSink::new(transport.clone());
    (transport, MessageSender::new(sink, default_channel))
}

pub fn msg(text: &str, channel_index: u32) -> InboundMessage {
    InboundMessage {
        text: text.to_string(),
        channel_index,
    }
}

/// Poll `check` until it holds or `timeout` elapses.
pub fn wait_until(timeout: Duration, mut check: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if check() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    check()
}

/// Test-side view of a [`MockSocial`] after it has been moved into a bot.
#[derive(Clone, Default)]
pub struct MockHandle {
    calls: Arc<Mutex<Vec<String>>>,
    notifications: Arc<Mutex<Option<mpsc::UnboundedSender<Notification>>>>,
}

impl MockHandle {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Push a notification into the most recent subscription.
    pub fn notify(&self, notification: Notification) -> bool {
        match self.notifications.lock().unwrap().as_ref() {
            Some(tx) => tx.send(notification).is_ok(),
            None => false,
        }
    }

    /// End the current subscription.
    pub fn close_stream(&self) {
        self.notifications.lock().unwrap().take();
    }

    pub fn subscribed(&self) -> bool {
        self.notifications.lock().unwrap().is_some()
    }
}

/// Records every call; `complete_login("BAD")` fails with an API error.
pub struct MockSocial {
    handle: MockHandle,
    authenticated: bool,
}

impl MockSocial {
    pub fn new(authenticated: bool) -> (Self, MockHandle) {
        let handle = MockHandle::default();
        (
            Self {
                handle: handle.clone(),
                authenticated,
            },
            handle,
        )
    }

    fn record(&self, call: String) {
        self.handle.calls.lock().unwrap().push(call);
    }
}

impl SocialAdapter for MockSocial {
    fn post(&mut self, text: &str) -> Result<(), SocialError> {
        if !self.authenticated {
            return Err(SocialError::NotAuthenticated);
        }
        self.record(format!("post:{}", text));
        Ok(())
    }

    fn login(&mut self, instance: &str) -> Result<String, SocialError> {
        self.record(format!("login:{}", instance));
        if !instance.contains('.') {
            return Err(SocialError::InvalidInstance("not a host name".to_string()));
        }
        Ok(format!(
            "https://{}/oauth/authorize?client_id=test&response_type=code",
            instance
        ))
    }

    fn complete_login(&mut self, code: &str) -> Result<(), SocialError> {
        self.record(format!("complete_login:{}", code));
        if code == "BAD" {
            return Err(SocialError::Api("invalid_grant".to_string()));
        }
        self.authenticated = true;
        Ok(())
    }

    fn subscribe(&mut self) -> Result<NotificationStream, SocialError> {
        if !self.authenticated {
            return Err(SocialError::NotAuthenticated);
        }
        self.record("subscribe".to_string());
        let (tx, rx) = mpsc::unbounded_channel();
        *self.handle.notifications.lock().unwrap() = Some(tx);
        Ok(NotificationStream::new(rx))
    }

    fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}
