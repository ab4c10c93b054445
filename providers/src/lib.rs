//! The oracle seam: a language-model service behind one object-safe trait.
//!
//! # Architecture
//!
//! - [`Oracle`] - the trait every analysis pipeline talks to
//! - [`OracleRequest`] / [`OracleResponse`] - provider-neutral request and reply
//! - [`OracleError`] - failure taxonomy, with quota exhaustion kept distinct
//! - [`gemini`] - Google Gemini implementation (`generateContent` and
//!   `streamGenerateContent?alt=sse`)
//!
//! # Streaming Events
//!
//! [`Oracle::stream`] pushes [`StreamEvent`]s through a
//! [`tokio::sync::mpsc::Sender`] as they arrive:
//!
//! | Event | Description |
//! |-------|-------------|
//! | `TextDelta` | Incremental text content from the model |
//! | `Grounding` | Web citations attached to the current chunk |
//! | `Usage` | Running token count for the call |
//! | `Done` | Stream completed successfully |
//! | `Error` | Stream terminated with an error |
//!
//! # Error Handling
//!
//! Failures that happen before any output (transport errors, non-2xx
//! statuses) are returned as `Err(OracleError)`. Failures after the stream has
//! started are delivered as `StreamEvent::Error` so partial text survives,
//! except quota exhaustion reported inside the stream, which is returned as
//! `Err(OracleError::RateLimited)` so callers can tell it apart.
//! Nothing in this crate retries.

pub mod sse_types;

pub use alon_types::{GroundingReference, OracleSettings, StreamEvent, UsageMetadata};
use std::future::Future;
use std::pin::Pin;
use std::sync::OnceLock;
use std::time::Duration;
use tokio::sync::mpsc;

pub use alon_types;

/// Canonical Gemini API base URL.
pub const GEMINI_API_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

const CONNECT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_STREAM_IDLE_TIMEOUT_SECS: u64 = 60;

const TCP_KEEPALIVE_SECS: u64 = 60;

const POOL_MAX_IDLE_PER_HOST: usize = 16;
const POOL_IDLE_TIMEOUT_SECS: u64 = 90;

const MAX_SSE_BUFFER_BYTES: usize = 4 * 1024 * 1024;

const MAX_SSE_PARSE_ERRORS: usize = 3;

const MAX_ERROR_BODY_BYTES: usize = 32 * 1024;

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum OracleError {
    /// Quota exhausted (HTTP 429 / `RESOURCE_EXHAUSTED`).
    #[error("rate limited: {detail}")]
    RateLimited { detail: String },
    #[error("oracle request failed: {detail}")]
    Communication { detail: String },
    /// The call succeeded but its payload could not be understood.
    #[error("malformed oracle response: {detail}")]
    MalformedResponse { detail: String },
}

impl OracleError {
    pub fn communication(detail: impl Into<String>) -> Self {
        Self::Communication {
            detail: detail.into(),
        }
    }

    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::MalformedResponse {
            detail: detail.into(),
        }
    }

    #[must_use]
    pub const fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Map a non-2xx HTTP reply to the error taxonomy.
#[must_use]
pub fn classify_http_error(status: reqwest::StatusCode, body: &str) -> OracleError {
    let detail = format!("API error {status}: {body}");
    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || body.contains("RESOURCE_EXHAUSTED") {
        OracleError::RateLimited { detail }
    } else {
        OracleError::Communication { detail }
    }
}

// ============================================================================
// Request / Response
// ============================================================================

/// One oracle call.
#[derive(Debug, Clone, PartialEq)]
pub struct OracleRequest {
    pub settings: OracleSettings,
    pub content: String,
    pub system_instruction: Option<String>,
    /// Output schema in the Gemini OpenAPI subset; implies a JSON reply.
    pub response_schema: Option<serde_json::Value>,
    pub web_search: bool,
}

impl OracleRequest {
    #[must_use]
    pub fn new(settings: OracleSettings, content: impl Into<String>) -> Self {
        Self {
            settings,
            content: content.into(),
            system_instruction: None,
            response_schema: None,
            web_search: false,
        }
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = Some(instruction.into());
        self
    }

    pub fn with_response_schema(mut self, schema: serde_json::Value) -> Self {
        self.response_schema = Some(schema);
        self
    }

    pub fn with_web_search(mut self) -> Self {
        self.web_search = true;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct OracleResponse {
    pub text: String,
    pub usage: Option<UsageMetadata>,
    pub grounding: Vec<GroundingReference>,
}

impl OracleResponse {
    #[must_use]
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_usage(mut self, total_token_count: u64) -> Self {
        self.usage = Some(UsageMetadata::new(total_token_count));
        self
    }
}

// ============================================================================
// Oracle trait
// ============================================================================

pub type OracleFut<'a, T> = Pin<Box<dyn Future<Output = Result<T, OracleError>> + Send + 'a>>;

/// A language-model service.
///
/// Futures are boxed so implementations can live behind `Arc<dyn Oracle>`.
pub trait Oracle: Send + Sync {
    /// Single-shot call; the whole reply arrives at once.
    fn generate<'a>(&'a self, request: &'a OracleRequest) -> OracleFut<'a, OracleResponse>;

    /// Streaming call. Events go to `tx`; the future resolves when the
    /// stream ends or the receiver is dropped.
    fn stream<'a>(
        &'a self,
        request: &'a OracleRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> OracleFut<'a, ()>;
}

// ============================================================================
// HTTP plumbing
// ============================================================================

/// Shared HTTPS-only client for production endpoints.
pub fn http_client() -> Result<&'static reqwest::Client, OracleError> {
    static CLIENT: OnceLock<Result<reqwest::Client, String>> = OnceLock::new();
    CLIENT
        .get_or_init(|| {
            base_client_builder()
                .https_only(true)
                .build()
                .map_err(|e| e.to_string())
        })
        .as_ref()
        .map_err(|e| OracleError::communication(format!("HTTP client: {e}")))
}

/// Client that also accepts plain `http://` endpoints (local proxies, mocks).
pub fn plain_http_client() -> Result<reqwest::Client, OracleError> {
    base_client_builder()
        .build()
        .map_err(|e| OracleError::communication(format!("HTTP client: {e}")))
}

fn base_client_builder() -> reqwest::ClientBuilder {
    reqwest::Client::builder()
        .user_agent(concat!("alon/", env!("CARGO_PKG_VERSION")))
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .redirect(reqwest::redirect::Policy::none())
        .tcp_keepalive(Some(Duration::from_secs(TCP_KEEPALIVE_SECS)))
        .pool_max_idle_per_host(POOL_MAX_IDLE_PER_HOST)
        .pool_idle_timeout(Some(Duration::from_secs(POOL_IDLE_TIMEOUT_SECS)))
}

pub async fn read_capped_error_body(response: reqwest::Response) -> String {
    use futures_util::StreamExt;
    let mut body = Vec::new();
    let mut stream = response.bytes_stream();
    while let Some(chunk) = stream.next().await {
        let Ok(chunk) = chunk else { break };
        body.extend_from_slice(&chunk);
        if body.len() > MAX_ERROR_BODY_BYTES {
            body.truncate(MAX_ERROR_BODY_BYTES);
            let text = String::from_utf8_lossy(&body);
            return format!("{text}...(truncated)");
        }
    }
    String::from_utf8_lossy(&body).into_owned()
}

/// Fail early on non-2xx replies, reading a capped error body.
pub(crate) async fn ensure_success(
    response: reqwest::Response,
) -> Result<reqwest::Response, OracleError> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let body = read_capped_error_body(response).await;
    let error = classify_http_error(status, &body);
    tracing::warn!(%status, rate_limited = error.is_rate_limit(), "Oracle call rejected");
    Err(error)
}

// ============================================================================
// SSE
// ============================================================================

fn find_sse_event_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = buffer.windows(2).position(|w| w == b"\n\n");
    let crlf = buffer.windows(4).position(|w| w == b"\r\n\r\n");
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a <= b { (a, 2) } else { (b, 4) }),
        (Some(a), None) => Some((a, 2)),
        (None, Some(b)) => Some((b, 4)),
        (None, None) => None,
    }
}

fn drain_next_sse_event(buffer: &mut Vec<u8>) -> Option<Vec<u8>> {
    let (pos, delim_len) = find_sse_event_boundary(buffer)?;
    let event = buffer[..pos].to_vec();
    buffer.drain(..pos + delim_len);
    Some(event)
}

fn extract_sse_data(event: &str) -> Option<String> {
    let mut data = String::new();
    let mut found = false;

    for line in event.lines() {
        let line = line.strip_suffix('\r').unwrap_or(line);

        if let Some(mut rest) = line.strip_prefix("data:") {
            if let Some(stripped) = rest.strip_prefix(' ') {
                rest = stripped;
            }

            if found {
                data.push('\n');
            }
            data.push_str(rest);
            found = true;
        }
    }

    if found { Some(data) } else { None }
}

#[derive(Debug)]
pub(crate) enum SseParseAction {
    /// Continue processing, no event to emit
    Continue,
    /// Emit these events and continue
    Emit(Vec<StreamEvent>),
    Done,
    Error(String),
    /// End the stream with a classified failure returned to the caller.
    Fail(OracleError),
}

pub(crate) trait SseParser {
    fn parse(&mut self, json: &serde_json::Value) -> SseParseAction;
    fn provider_name(&self) -> &'static str;
}

pub(crate) fn stream_idle_timeout() -> Duration {
    static TIMEOUT: OnceLock<Duration> = OnceLock::new();
    *TIMEOUT.get_or_init(|| {
        let timeout = std::env::var("ALON_STREAM_IDLE_TIMEOUT_SECS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_STREAM_IDLE_TIMEOUT_SECS);
        Duration::from_secs(timeout)
    })
}

pub(crate) async fn send_event(tx: &mpsc::Sender<StreamEvent>, event: StreamEvent) -> bool {
    tx.send(event).await.is_ok()
}

/// Drive an SSE body through `parser`, forwarding events to `tx`.
///
/// Handles idle timeouts, the buffer cap, UTF-8 validation, event
/// boundaries, the `[DONE]` marker and the parse-error threshold.
pub(crate) async fn process_sse_stream<P: SseParser>(
    response: reqwest::Response,
    parser: &mut P,
    tx: &mpsc::Sender<StreamEvent>,
    idle_timeout: Duration,
) -> Result<(), OracleError> {
    use futures_util::StreamExt;

    let mut stream = response.bytes_stream();
    let mut buffer: Vec<u8> = Vec::new();
    let mut parse_errors = 0usize;

    loop {
        let Ok(next) = tokio::time::timeout(idle_timeout, stream.next()).await else {
            let _ = send_event(tx, StreamEvent::Error("Stream idle timeout".to_string())).await;
            return Ok(());
        };

        let Some(chunk) = next else { break };
        let chunk = chunk.map_err(|e| OracleError::communication(e.to_string()))?;
        buffer.extend_from_slice(&chunk);

        if buffer.len() > MAX_SSE_BUFFER_BYTES {
            let _ = send_event(
                tx,
                StreamEvent::Error("SSE buffer exceeded maximum size (4 MiB)".to_string()),
            )
            .await;
            return Ok(());
        }

        while let Some(event) = drain_next_sse_event(&mut buffer) {
            if event.is_empty() {
                continue;
            }

            let Ok(event) = std::str::from_utf8(&event) else {
                let _ = send_event(
                    tx,
                    StreamEvent::Error("Received invalid UTF-8 from SSE stream".to_string()),
                )
                .await;
                return Ok(());
            };

            let Some(data) = extract_sse_data(event) else {
                continue;
            };

            if data == "[DONE]" {
                let _ = send_event(tx, StreamEvent::Done).await;
                return Ok(());
            }

            match serde_json::from_str::<serde_json::Value>(&data) {
                Ok(json) => {
                    parse_errors = 0;
                    match parser.parse(&json) {
                        SseParseAction::Continue => {}
                        SseParseAction::Emit(events) => {
                            for event in events {
                                let is_terminal = event.is_terminal();
                                if !send_event(tx, event).await || is_terminal {
                                    return Ok(());
                                }
                            }
                        }
                        SseParseAction::Done => {
                            let _ = send_event(tx, StreamEvent::Done).await;
                            return Ok(());
                        }
                        SseParseAction::Error(msg) => {
                            let _ = send_event(tx, StreamEvent::Error(msg)).await;
                            return Ok(());
                        }
                        SseParseAction::Fail(error) => return Err(error),
                    }
                }
                Err(e) => {
                    parse_errors = parse_errors.saturating_add(1);
                    tracing::warn!(
                        %e,
                        payload_bytes = data.len(),
                        provider = parser.provider_name(),
                        "Invalid SSE JSON payload"
                    );
                    if parse_errors >= MAX_SSE_PARSE_ERRORS {
                        let _ = send_event(
                            tx,
                            StreamEvent::Error(format!("Invalid stream payload: {e}")),
                        )
                        .await;
                        return Ok(());
                    }
                }
            }
        }
    }

    // Gemini ends the body after the last chunk; a finishReason already
    // produced Done above, so reaching here means nothing signalled completion.
    let _ = send_event(
        tx,
        StreamEvent::Error("Connection closed before stream completed".to_string()),
    )
    .await;
    Ok(())
}

/// Google Gemini implementation.
///
/// Calls `{base}/models/{model}:generateContent` for schema-constrained
/// single-shot requests and `:streamGenerateContent?alt=sse` for streaming.
///
/// # Request casing
///
/// The body mixes conventions: `system_instruction` is snake_case while
/// `generationConfig` and its fields are camelCase.
pub mod gemini;
