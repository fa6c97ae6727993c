//! Mastodon implementation of [`SocialAdapter`].
//!
//! Uses the instance's REST API directly over `reqwest`:
//!
//! - `POST /api/v1/apps` registers the client (once per instance)
//! - `GET /oauth/authorize` is the URL handed to the user (out-of-band redirect)
//! - `POST /oauth/token` exchanges the pasted code for an access token
//! - `POST /api/v1/statuses` publishes a post
//! - `GET /api/v1/instance` resolves the streaming host (`urls.streaming_api`)
//! - `GET /api/v1/streaming/user` on that host is read as server-sent events
//!
//! Client and user credentials are persisted as JSON under the configured
//! credentials directory so a restart does not require a new login.
//!
//! The async client is driven from the bot's dispatch thread through a runtime
//! [`Handle`]; the blocking [`SocialAdapter`] methods must not be called from inside
//! the runtime itself.
use std::path::{Path, PathBuf};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::time::timeout;

use super::html::strip_html;
use super::{Notification, NotificationKind, NotificationStream, SocialAdapter};
use crate::config::MastodonConfig;
use crate::errors::SocialError;
use crate::logutil::truncate_for_log;
use crate::validation::{sanitize_post_text, validate_auth_code, validate_instance};

macro_rules! sec_log {
    ($($arg:tt)*) => { log::warn!(target: "security", $($arg)*); };
}

/// Out-of-band redirect: the instance shows the code instead of redirecting.
pub const OOB_REDIRECT: &str = "urn:ietf:wg:oauth:2.0:oob";
pub const SCOPES: &str = "read write";

const CLIENT_CRED_FILE: &str = "clientcred.json";
const USER_CRED_FILE: &str = "usercred.json";

const STREAM_RETRY_MIN: Duration = Duration::from_secs(5);
const STREAM_RETRY_MAX: Duration = Duration::from_secs(300);
/// The server sends a heartbeat comment every ~15s; silence past this means a dead link.
const STREAM_IDLE_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
    pub instance: String,
    pub client_id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserCredentials {
    pub instance: String,
    pub access_token: String,
}

#[derive(Debug, Clone)]
pub struct MastodonSettings {
    pub app_name: String,
    pub credentials_dir: PathBuf,
    pub timeout: Duration,
}

impl From<&MastodonConfig> for MastodonSettings {
    fn from(cfg: &MastodonConfig) -> Self {
        Self {
            app_name: cfg.app_name.clone(),
            credentials_dir: PathBuf::from(&cfg.credentials_dir),
            timeout: Duration::from_secs(cfg.timeout_seconds.max(1)),
        }
    }
}

#[derive(Deserialize)]
struct AppResponse {
    client_id: String,
    client_secret: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize)]
struct ApiAccount {
    acct: String,
}

#[derive(Deserialize)]
struct ApiStatus {
    #[serde(default)]
    content: String,
}

#[derive(Deserialize)]
struct ApiNotification {
    #[serde(rename = "type")]
    kind: String,
    account: ApiAccount,
    #[serde(default)]
    status: Option<ApiStatus>,
}

#[derive(Deserialize)]
struct ApiInstanceUrls {
    #[serde(default)]
    streaming_api: Option<String>,
}

#[derive(Deserialize)]
struct ApiInstance {
    #[serde(default)]
    urls: Option<ApiInstanceUrls>,
}

pub struct MastodonClient {
    http: reqwest::Client,
    runtime: Handle,
    settings: MastodonSettings,
    client_creds: Option<ClientCredentials>,
    user_creds: Option<UserCredentials>,
}

fn base_url(instance: &str) -> String {
    format!("https://{}", instance)
}

/// User stream endpoint. `streaming_api` is the instance's advertised streaming
/// base (usually `wss://`); without one the instance host serves the stream.
fn stream_url(instance: &str, streaming_api: Option<&str>) -> String {
    let base = match streaming_api.map(str::trim).filter(|s| !s.is_empty()) {
        Some(api) => {
            let api = api.trim_end_matches('/');
            if let Some(host) = api.strip_prefix("wss://") {
                format!("https://{}", host)
            } else if let Some(host) = api.strip_prefix("ws://") {
                format!("http://{}", host)
            } else {
                api.to_string()
            }
        }
        None => base_url(instance),
    };
    format!("{}/api/v1/streaming/user", base)
}

/// Authorization URL for an already registered client.
pub fn authorize_url(creds: &ClientCredentials) -> String {
    format!(
        "{}/oauth/authorize?client_id={}&response_type=code&redirect_uri={}&scope={}",
        base_url(&creds.instance),
        urlencoding::encode(&creds.client_id),
        urlencoding::encode(OOB_REDIRECT),
        urlencoding::encode(SCOPES)
    )
}

/// Turn one streaming `notification` payload into a [`Notification`].
/// Kinds the mesh has no rendering for (polls, edits, ...) yield `Ok(None)`.
pub fn parse_notification(data: &str) -> Result<Option<Notification>, SocialError> {
    let raw: ApiNotification = serde_json::from_str(data)?;
    let kind = match NotificationKind::from_api(&raw.kind) {
        Some(kind) => kind,
        None => {
            debug!("Ignoring notification type '{}'", raw.kind);
            return Ok(None);
        }
    };
    let plain_text_body = match kind {
        NotificationKind::Mention | NotificationKind::Status => raw
            .status
            .map(|s| strip_html(&s.content))
            .unwrap_or_default(),
        _ => String::new(),
    };
    Ok(Some(Notification {
        kind,
        account_handle: raw.account.acct,
        plain_text_body,
    }))
}

/// One server-sent event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SseEvent {
    pub event: Option<String>,
    pub data: String,
}

/// Incremental server-sent events parser. Bytes are buffered until a blank line so
/// multi-byte characters split across network reads decode correctly.
#[derive(Debug, Default)]
pub struct SseParser {
    buf: Vec<u8>,
}

impl SseParser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, bytes: &[u8]) -> Vec<SseEvent> {
        self.buf.extend_from_slice(bytes);
        let mut events = Vec::new();
        while let Some((end, sep_len)) = find_block_end(&self.buf) {
            let block: Vec<u8> = self.buf.drain(..end + sep_len).take(end).collect();
            if let Some(event) = parse_block(&String::from_utf8_lossy(&block)) {
                events.push(event);
            }
        }
        events
    }
}

fn find_block_end(buf: &[u8]) -> Option<(usize, usize)> {
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|p| (p, 2));
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| (p, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn parse_block(block: &str) -> Option<SseEvent> {
    let mut event = SseEvent::default();
    let mut has_data = false;
    for line in block.lines() {
        let line = line.trim_end_matches('\r');
        if line.is_empty() || line.starts_with(':') {
            // comment / keepalive
            continue;
        }
        let (field, value) = match line.split_once(':') {
            Some((f, v)) => (f, v.strip_prefix(' ').unwrap_or(v)),
            None => (line, ""),
        };
        match field {
            "event" => event.event = Some(value.to_string()),
            "data" => {
                if has_data {
                    event.data.push('\n');
                }
                event.data.push_str(value);
                has_data = true;
            }
            _ => {}
        }
    }
    (event.event.is_some() || has_data).then_some(event)
}

async fn read_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>, SocialError> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => Ok(Some(serde_json::from_str(&content)?)),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn write_json_file<T: Serialize>(path: &Path, value: &T) -> Result<(), SocialError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let content = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, content).await?;
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = tokio::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).await;
    }
    Ok(())
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response, SocialError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(SocialError::Api(format!(
        "{}: {}",
        status,
        truncate_for_log(&body, 120)
    )))
}

impl MastodonClient {
    /// Build a client and load any stored credentials. Must be called inside the
    /// runtime whose handle will drive the blocking adapter methods.
    pub async fn open(settings: MastodonSettings) -> Result<Self, SocialError> {
        let http = reqwest::Client::builder()
            .user_agent(format!("{}/{}", settings.app_name, env!("CARGO_PKG_VERSION")))
            .build()?;
        let client_creds: Option<ClientCredentials> =
            read_json_file(&settings.credentials_dir.join(CLIENT_CRED_FILE)).await?;
        let user_creds: Option<UserCredentials> =
            read_json_file(&settings.credentials_dir.join(USER_CRED_FILE)).await?;
        match (&client_creds, &user_creds) {
            (_, Some(user)) => info!("Mastodon credentials loaded for {}", user.instance),
            (Some(client), None) => info!(
                "Mastodon client registered on {} but not logged in",
                client.instance
            ),
            (None, None) => info!("No Mastodon credentials found"),
        }
        Ok(Self {
            http,
            runtime: Handle::current(),
            settings,
            client_creds,
            user_creds,
        })
    }

    pub fn instance(&self) -> Option<&str> {
        self.user_creds.as_ref().map(|u| u.instance.as_str())
    }

    fn client_cred_path(&self) -> PathBuf {
        self.settings.credentials_dir.join(CLIENT_CRED_FILE)
    }

    fn user_cred_path(&self) -> PathBuf {
        self.settings.credentials_dir.join(USER_CRED_FILE)
    }

    async fn send(&self, request: reqwest::RequestBuilder) -> Result<reqwest::Response, SocialError> {
        let secs = self.settings.timeout.as_secs();
        let response = timeout(self.settings.timeout, request.send())
            .await
            .map_err(|_| SocialError::Timeout(secs))??;
        check_status(response).await
    }

    async fn register_app(&self, instance: &str) -> Result<ClientCredentials, SocialError> {
        let url = format!("{}/api/v1/apps", base_url(instance));
        let request = self.http.post(&url).form(&[
            ("client_name", self.settings.app_name.as_str()),
            ("redirect_uris", OOB_REDIRECT),
            ("scopes", SCOPES),
        ]);
        let app: AppResponse = self.send(request).await?.json().await?;
        Ok(ClientCredentials {
            instance: instance.to_string(),
            client_id: app.client_id,
            client_secret: app.client_secret,
        })
    }

    async fn login_async(&mut self, instance: &str) -> Result<String, SocialError> {
        let instance = validate_instance(instance)
            .map_err(|e| SocialError::InvalidInstance(e.to_string()))?;
        let creds = match &self.client_creds {
            Some(existing) if existing.instance == instance => {
                debug!("Reusing client registration for {}", instance);
                existing.clone()
            }
            _ => {
                let creds = self.register_app(&instance).await?;
                write_json_file(&self.client_cred_path(), &creds).await?;
                sec_log!("Registered Mastodon client on {}", instance);
                creds
            }
        };
        let url = authorize_url(&creds);
        self.client_creds = Some(creds);
        Ok(url)
    }

    async fn complete_login_async(&mut self, code: &str) -> Result<(), SocialError> {
        let creds = self.client_creds.clone().ok_or(SocialError::NoPendingLogin)?;
        let code = validate_auth_code(code).map_err(|e| SocialError::Api(e.to_string()))?;
        let url = format!("{}/oauth/token", base_url(&creds.instance));
        let request = self.http.post(&url).form(&[
            ("grant_type", "authorization_code"),
            ("code", code.as_str()),
            ("client_id", creds.client_id.as_str()),
            ("client_secret", creds.client_secret.as_str()),
            ("redirect_uri", OOB_REDIRECT),
            ("scope", SCOPES),
        ]);
        let token: TokenResponse = match self.send(request).await {
            Ok(response) => response.json().await?,
            Err(e) => {
                sec_log!("Mastodon token exchange on {} failed: {}", creds.instance, e);
                return Err(e);
            }
        };
        let user = UserCredentials {
            instance: creds.instance.clone(),
            access_token: token.access_token,
        };
        write_json_file(&self.user_cred_path(), &user).await?;
        sec_log!("Mastodon login completed on {}", user.instance);
        self.user_creds = Some(user);
        Ok(())
    }

    async fn post_async(&self, text: &str) -> Result<(), SocialError> {
        let user = self.user_creds.as_ref().ok_or(SocialError::NotAuthenticated)?;
        let status = sanitize_post_text(text).map_err(|e| SocialError::Api(e.to_string()))?;
        let url = format!("{}/api/v1/statuses", base_url(&user.instance));
        let request = self
            .http
            .post(&url)
            .bearer_auth(&user.access_token)
            .form(&[("status", status.as_str())]);
        self.send(request).await?;
        info!("Posted to Mastodon: '{}'", truncate_for_log(&status, 80));
        Ok(())
    }
}

/// Ask the instance where its streaming API lives. Failures fall back to the
/// instance host.
async fn resolve_stream_url(http: &reqwest::Client, user: &UserCredentials, request_timeout: Duration) -> String {
    let url = format!("{}/api/v1/instance", base_url(&user.instance));
    let lookup = async {
        let response = check_status(http.get(&url).send().await?).await?;
        let instance: ApiInstance = response.json().await?;
        Ok::<_, SocialError>(instance.urls.and_then(|u| u.streaming_api))
    };
    let streaming_api = match timeout(request_timeout, lookup).await {
        Ok(Ok(api)) => api,
        Ok(Err(e)) => {
            warn!("Instance lookup on {} failed: {}; streaming from instance host", user.instance, e);
            None
        }
        Err(_) => {
            warn!("Instance lookup on {} timed out; streaming from instance host", user.instance);
            None
        }
    };
    stream_url(&user.instance, streaming_api.as_deref())
}

/// Read the user stream until it ends or fails; returns `false` once `tx` is closed.
async fn stream_once(
    http: &reqwest::Client,
    user: &UserCredentials,
    connect_timeout: Duration,
    tx: &mpsc::UnboundedSender<Notification>,
) -> Result<bool, SocialError> {
    let url = resolve_stream_url(http, user, connect_timeout).await;
    debug!("Connecting to Mastodon stream at {}", url);
    let request = http
        .get(&url)
        .bearer_auth(&user.access_token)
        .header(reqwest::header::ACCEPT, "text/event-stream");
    let response = timeout(connect_timeout, request.send())
        .await
        .map_err(|_| SocialError::Timeout(connect_timeout.as_secs()))??;
    let response = check_status(response).await?;
    info!("Mastodon notification stream connected ({})", user.instance);
    pump_notifications(response.bytes_stream(), STREAM_IDLE_TIMEOUT, tx).await
}

/// Forward `notification` events from an SSE byte stream. `Ok(true)` when the stream
/// ends or stays silent for `idle`, `Ok(false)` once `tx` is closed.
async fn pump_notifications<S, E>(
    bytes: S,
    idle: Duration,
    tx: &mpsc::UnboundedSender<Notification>,
) -> Result<bool, SocialError>
where
    S: Stream<Item = Result<Bytes, E>>,
    SocialError: From<E>,
{
    futures_util::pin_mut!(bytes);
    let mut parser = SseParser::new();
    loop {
        let chunk = match timeout(idle, bytes.next()).await {
            Ok(Some(chunk)) => chunk?,
            Ok(None) => return Ok(true),
            Err(_) => {
                warn!("Mastodon stream silent for {}s", idle.as_secs());
                return Ok(true);
            }
        };
        for event in parser.push(&chunk) {
            if event.event.as_deref() != Some("notification") {
                continue;
            }
            match parse_notification(&event.data) {
                Ok(Some(notification)) => {
                    debug!(
                        "[Mastodon] Notification: {:?} from {}",
                        notification.kind, notification.account_handle
                    );
                    if tx.send(notification).is_err() {
                        return Ok(false);
                    }
                }
                Ok(None) => {}
                Err(e) => warn!("Malformed notification payload: {}", e),
            }
        }
        if tx.is_closed() {
            return Ok(false);
        }
    }
}

impl SocialAdapter for MastodonClient {
    fn post(&mut self, text: &str) -> Result<(), SocialError> {
        let runtime = self.runtime.clone();
        runtime.block_on(self.post_async(text))
    }

    fn login(&mut self, instance: &str) -> Result<String, SocialError> {
        let runtime = self.runtime.clone();
        runtime.block_on(self.login_async(instance))
    }

    fn complete_login(&mut self, code: &str) -> Result<(), SocialError> {
        let runtime = self.runtime.clone();
        runtime.block_on(self.complete_login_async(code))
    }

    /// Spawns a task on the runtime that keeps the stream connected, reconnecting
    /// with exponential backoff, until the returned stream is dropped.
    fn subscribe(&mut self) -> Result<NotificationStream, SocialError> {
        let user = self.user_creds.clone().ok_or(SocialError::NotAuthenticated)?;
        let http = self.http.clone();
        let connect_timeout = self.settings.timeout;
        let (tx, rx) = mpsc::unbounded_channel();
        let task = self.runtime.spawn(async move {
            let mut backoff = STREAM_RETRY_MIN;
            loop {
                match stream_once(&http, &user, connect_timeout, &tx).await {
                    Ok(false) => break,
                    Ok(true) => {
                        warn!("Mastodon stream ended; reconnecting");
                        backoff = STREAM_RETRY_MIN;
                    }
                    Err(e) => warn!(
                        "Mastodon stream error: {}; retrying in {}s",
                        e,
                        backoff.as_secs()
                    ),
                }
                if tx.is_closed() {
                    break;
                }
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(STREAM_RETRY_MAX);
            }
            debug!("Mastodon stream task finished");
        });
        Ok(NotificationStream::with_producer(rx, task.abort_handle()))
    }

    fn is_authenticated(&self) -> bool {
        self.user_creds.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authorize_url_is_encoded() {
        let creds = ClientCredentials {
            instance: "tomkahe.com".into(),
            client_id: "abc+123".into(),
            client_secret: "s".into(),
        };
        assert_eq!(
            authorize_url(&creds),
            "https://tomkahe.com/oauth/authorize?client_id=abc%2B123&response_type=code\
             &redirect_uri=urn%3Aietf%3Awg%3Aoauth%3A2.0%3Aoob&scope=read%20write"
        );
    }

    #[test]
    fn parses_mention_notification() {
        let data = r#"{"id":"1","type":"mention","account":{"acct":"bob@x.social","id":"9"},
            "status":{"id":"2","content":"<p>hi &amp; bye</p>"}}"#;
        let n = parse_notification(data).unwrap().unwrap();
        assert_eq!(n.kind, NotificationKind::Mention);
        assert_eq!(n.render(), "bob@x.social mentioned you: hi & bye");
    }

    #[test]
    fn follow_has_no_body_and_unknown_is_skipped() {
        let follow = r#"{"type":"follow","account":{"acct":"carol"}}"#;
        assert_eq!(
            parse_notification(follow).unwrap().unwrap().render(),
            "carol followed you"
        );
        let poll = r#"{"type":"poll","account":{"acct":"carol"}}"#;
        assert!(parse_notification(poll).unwrap().is_none());
        assert!(parse_notification("not json").is_err());
    }

    #[test]
    fn sse_parser_handles_split_reads() {
        let mut parser = SseParser::new();
        assert!(parser.push(b":thump\n\nevent: notif").is_empty());
        let events = parser.push("ication\ndata: {\"a\":\"é\"}\n\nevent: update\r\ndata: x\r\n\r\n".as_bytes());
        assert_eq!(
            events,
            vec![
                SseEvent {
                    event: Some("notification".into()),
                    data: "{\"a\":\"é\"}".into()
                },
                SseEvent {
                    event: Some("update".into()),
                    data: "x".into()
                }
            ]
        );
    }

    #[test]
    fn sse_parser_keeps_multibyte_split_across_chunks() {
        let mut parser = SseParser::new();
        let payload = "event: notification\ndata: 🙂\n\n".as_bytes();
        let split = payload.len() - 4;
        assert!(parser.push(&payload[..split]).is_empty());
        let events = parser.push(&payload[split..]);
        assert_eq!(events[0].data, "🙂");
    }

    #[test]
    fn stream_url_follows_advertised_streaming_host() {
        assert_eq!(
            stream_url("mastodon.social", Some("wss://streaming.mastodon.social/")),
            "https://streaming.mastodon.social/api/v1/streaming/user"
        );
        assert_eq!(
            stream_url("local.test:8080", Some("ws://local.test:4000")),
            "http://local.test:4000/api/v1/streaming/user"
        );
        assert_eq!(
            stream_url("tomkahe.com", None),
            "https://tomkahe.com/api/v1/streaming/user"
        );
        assert_eq!(
            stream_url("tomkahe.com", Some("  ")),
            "https://tomkahe.com/api/v1/streaming/user"
        );
    }

    #[test]
    fn instance_payload_yields_streaming_api() {
        let body = r#"{"uri":"mastodon.social","urls":{"streaming_api":"wss://streaming.mastodon.social"}}"#;
        let instance: ApiInstance = serde_json::from_str(body).unwrap();
        assert_eq!(
            instance.urls.and_then(|u| u.streaming_api).as_deref(),
            Some("wss://streaming.mastodon.social")
        );
        let bare: ApiInstance = serde_json::from_str(r#"{"uri":"x.social"}"#).unwrap();
        assert!(bare.urls.is_none());
    }

    #[tokio::test]
    async fn silent_stream_gives_up_after_idle_timeout() {
        use futures_util::stream;

        let event = Bytes::from_static(
            b"event: notification\ndata: {\"type\":\"follow\",\"account\":{\"acct\":\"dave\"}}\n\n",
        );
        let bytes = stream::iter(vec![Ok::<_, SocialError>(event)]).chain(stream::pending());
        let (tx, mut rx) = mpsc::unbounded_channel();

        let reconnect = pump_notifications(bytes, Duration::from_millis(50), &tx)
            .await
            .unwrap();
        assert!(reconnect);
        assert_eq!(rx.recv().await.map(|n| n.render()), Some("dave followed you".to_string()));
    }

    #[tokio::test]
    async fn closed_receiver_stops_pump() {
        use futures_util::stream;

        let event = Bytes::from_static(b"event: notification\ndata: {\"type\":\"follow\",\"account\":{\"acct\":\"eve\"}}\n\n");
        let bytes = stream::iter(vec![Ok::<_, SocialError>(event)]).chain(stream::pending());
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        assert!(!pump_notifications(bytes, Duration::from_secs(5), &tx).await.unwrap());
    }

    #[tokio::test]
    async fn credentials_round_trip_through_files() {
        let dir = tempfile::tempdir().unwrap();
        let user = UserCredentials {
            instance: "tomkahe.com".into(),
            access_token: "tok".into(),
        };
        write_json_file(&dir.path().join(USER_CRED_FILE), &user).await.unwrap();

        let client = MastodonClient::open(MastodonSettings {
            app_name: "meshbot".into(),
            credentials_dir: dir.path().to_path_buf(),
            timeout: Duration::from_secs(5),
        })
        .await
        .unwrap();
        assert!(client.is_authenticated());
        assert_eq!(client.instance(), Some("tomkahe.com"));
    }

    #[tokio::test]
    async fn post_without_credentials_is_not_authenticated() {
        let dir = tempfile::tempdir().unwrap();
        let client = MastodonClient::open(MastodonSettings {
            app_name: "meshbot".into(),
            credentials_dir: dir.path().join("missing"),
            timeout: Duration::from_secs(5),
        })
        .await
        .unwrap();
        assert!(matches!(
            client.post_async("hello").await,
            Err(SocialError::NotAuthenticated)
        ));
    }
}
