//! HTTPS client transport
//!
//! One outbound call per operation, no retries, no connection reuse. Only
//! the configured trust roots are accepted.
//!
//! Each call moves through
//! `Connecting -> Handshaking -> RequestSent -> AwaitingResponse -> Completed | Failed`
//! and every transition is recorded as a trace event.

use std::time::Duration;
use thiserror::Error;
use tracing::{debug, trace};

use sealnet_core::RoutingKey;

use crate::fragment::{FragmentKey, DEFAULT_MAX_FRAGMENT_SIZE};
use crate::message::{Message, MessageError, DEFAULT_MAX_MESSAGE_SIZE};
use crate::router::Router;
use crate::server::MESSAGE_PATH;
use crate::tls::{TlsError, TrustStore};

/// Transport errors
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Connection failed: {0}")]
    ConnectFailed(String),
    #[error("Request timed out")]
    Timeout,
    #[error("Peer answered with status {0}")]
    NonSuccessStatus(u16),
    #[error("IO error: {0}")]
    Io(String),
    #[error("Response exceeds {limit} bytes")]
    TooLarge { limit: usize },
    #[error("Fragment content does not match key {0}")]
    ContentMismatch(FragmentKey),
    #[error("No route to {0}")]
    NoRoute(RoutingKey),
    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),
    #[error("Codec error: {0}")]
    Codec(#[from] MessageError),
    #[error("Invalid transport config: {0}")]
    InvalidConfig(String),
}

/// Client tuning
#[derive(Clone, Debug)]
pub struct TransportConfig {
    pub connect_timeout: Duration,
    /// Bound on the whole call, body included
    pub request_timeout: Duration,
    pub max_message_size: usize,
    pub max_fragment_size: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(5),
            request_timeout: Duration::from_secs(30),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_fragment_size: DEFAULT_MAX_FRAGMENT_SIZE,
        }
    }
}

impl TransportConfig {
    pub fn validate(&self) -> Result<(), TransportError> {
        if self.connect_timeout.is_zero() || self.request_timeout.is_zero() {
            return Err(TransportError::InvalidConfig("timeouts must be non-zero".into()));
        }
        if self.max_message_size == 0 || self.max_fragment_size == 0 {
            return Err(TransportError::InvalidConfig("size limits must be non-zero".into()));
        }
        Ok(())
    }
}

// =============================================================================
// CALL STATE
// =============================================================================

/// Progress of a single outbound call
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CallState {
    Connecting,
    Handshaking,
    RequestSent,
    AwaitingResponse,
    Completed,
    Failed,
}

impl CallState {
    /// Next state on the success path
    pub fn next(self) -> Option<CallState> {
        match self {
            CallState::Connecting => Some(CallState::Handshaking),
            CallState::Handshaking => Some(CallState::RequestSent),
            CallState::RequestSent => Some(CallState::AwaitingResponse),
            CallState::AwaitingResponse => Some(CallState::Completed),
            CallState::Completed | CallState::Failed => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, CallState::Completed | CallState::Failed)
    }
}

/// Tracks one call for tracing
struct Call {
    op: &'static str,
    url: String,
    state: CallState,
}

impl Call {
    fn start(op: &'static str, url: String) -> Self {
        trace!(op, url = %url, state = ?CallState::Connecting, "Call started");
        Self {
            op,
            url,
            state: CallState::Connecting,
        }
    }

    /// Step forward along the success path until `target`
    fn advance_to(&mut self, target: CallState) {
        while self.state != target {
            match self.state.next() {
                Some(next) => {
                    self.state = next;
                    trace!(op = self.op, url = %self.url, state = ?next, "Call progressed");
                }
                None => break,
            }
        }
    }

    fn complete(&mut self) {
        self.advance_to(CallState::Completed);
        debug!(op = self.op, url = %self.url, "Call completed");
    }

    fn fail(&mut self, err: TransportError) -> TransportError {
        let at = self.state;
        self.state = CallState::Failed;
        debug!(op = self.op, url = %self.url, at = ?at, error = %err, "Call failed");
        err
    }
}

// =============================================================================
// TRANSPORT
// =============================================================================

/// HTTPS client for messages and fragments
#[derive(Clone)]
pub struct Transport {
    client: reqwest::Client,
    config: TransportConfig,
}

impl Transport {
    pub fn new(config: TransportConfig, trust: &TrustStore) -> Result<Self, TransportError> {
        config.validate()?;
        if trust.is_empty() {
            return Err(TlsError::NoTrustRoots.into());
        }

        let mut builder = reqwest::Client::builder()
            .use_rustls_tls()
            .tls_built_in_root_certs(false)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .pool_max_idle_per_host(0);

        for root in trust.roots() {
            let cert = reqwest::Certificate::from_der(root.as_ref())
                .map_err(|e| TlsError::Client(e.to_string()))?;
            builder = builder.add_root_certificate(cert);
        }

        let client = builder
            .build()
            .map_err(|e| TlsError::Client(e.to_string()))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &TransportConfig {
        &self.config
    }

    /// `PUT https://host:port/message/`
    pub async fn send_message(
        &self,
        message: &Message,
        host: &str,
        port: u16,
    ) -> Result<(), TransportError> {
        let body = message.encode(self.config.max_message_size)?;
        let mut call = Call::start("send_message", url(host, port, MESSAGE_PATH));
        debug!(kind = message.name(), target = %message.target, "Sending message");

        let request = self.client.put(call.url.as_str()).body(body);
        self.dispatch(&mut call, request).await?;
        call.complete();
        Ok(())
    }

    /// `GET https://host:port/{key}`; the body is read chunk by chunk.
    pub async fn fetch_fragment(
        &self,
        host: &str,
        port: u16,
        key: &FragmentKey,
    ) -> Result<Vec<u8>, TransportError> {
        let limit = self.config.max_fragment_size;
        let mut call = Call::start("fetch_fragment", url(host, port, &format!("/{}", key.to_hex())));

        let request = self.client.get(call.url.as_str());
        let mut response = self.dispatch(&mut call, request).await?;

        if let Some(len) = response.content_length() {
            if len > limit as u64 {
                return Err(call.fail(TransportError::TooLarge { limit }));
            }
        }

        let mut body = Vec::new();
        loop {
            match response.chunk().await {
                Ok(Some(chunk)) => {
                    if body.len() + chunk.len() > limit {
                        return Err(call.fail(TransportError::TooLarge { limit }));
                    }
                    body.extend_from_slice(&chunk);
                }
                Ok(None) => break,
                Err(e) => return Err(call.fail(classify(e))),
            }
        }

        if !key.matches(&body) {
            return Err(call.fail(TransportError::ContentMismatch(*key)));
        }
        call.complete();
        Ok(body)
    }

    /// `PUT https://host:port/{key}/`
    pub async fn store_fragment(
        &self,
        host: &str,
        port: u16,
        key: &FragmentKey,
        bytes: Vec<u8>,
    ) -> Result<(), TransportError> {
        let limit = self.config.max_fragment_size;
        if bytes.len() > limit {
            return Err(TransportError::TooLarge { limit });
        }
        let mut call = Call::start("store_fragment", url(host, port, &format!("/{}/", key.to_hex())));

        let request = self.client.put(call.url.as_str()).body(bytes);
        self.dispatch(&mut call, request).await?;
        call.complete();
        Ok(())
    }

    /// Resolve `message.target` and send it there
    pub async fn deliver(&self, router: &dyn Router, message: &Message) -> Result<(), TransportError> {
        let addr = router
            .resolve(&message.target)
            .await
            .ok_or(TransportError::NoRoute(message.target))?;
        self.send_message(message, &addr.ip().to_string(), addr.port())
            .await
    }

    async fn dispatch(
        &self,
        call: &mut Call,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, TransportError> {
        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return Err(call.fail(classify(e))),
        };
        call.advance_to(CallState::AwaitingResponse);

        let status = response.status();
        if !status.is_success() {
            return Err(call.fail(TransportError::NonSuccessStatus(status.as_u16())));
        }
        Ok(response)
    }
}

fn url(host: &str, port: u16, path: &str) -> String {
    if host.contains(':') {
        format!("https://[{}]:{}{}", host, port, path)
    } else {
        format!("https://{}:{}{}", host, port, path)
    }
}

/// Connection failures win over timeouts: a connect timeout is a connect failure.
fn classify(e: reqwest::Error) -> TransportError {
    if e.is_connect() {
        TransportError::ConnectFailed(describe(&e))
    } else if e.is_timeout() {
        TransportError::Timeout
    } else {
        TransportError::Io(describe(&e))
    }
}

fn describe(e: &dyn std::error::Error) -> String {
    let mut out = e.to_string();
    let mut source = e.source();
    while let Some(inner) = source {
        out.push_str(": ");
        out.push_str(&inner.to_string());
        source = inner.source();
    }
    out
}
