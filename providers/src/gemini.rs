use crate::sse_types::gemini as typed;
use crate::{
    GEMINI_API_BASE_URL, GroundingReference, Oracle, OracleError, OracleFut, OracleRequest,
    OracleResponse, SseParseAction, SseParser, StreamEvent, UsageMetadata, ensure_success,
    http_client, mpsc, plain_http_client, process_sse_stream, stream_idle_timeout,
};
use serde_json::{Value, json};

/// Gemini-backed [`Oracle`].
#[derive(Clone)]
pub struct GeminiOracle {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl std::fmt::Debug for GeminiOracle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiOracle")
            .field("base_url", &self.base_url)
            .field("api_key", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl GeminiOracle {
    pub fn new(api_key: impl Into<String>) -> Result<Self, OracleError> {
        Self::with_base_url(api_key, GEMINI_API_BASE_URL)
    }

    /// Point the client at another endpoint. Plain `http://` is accepted here
    /// so a local proxy or mock server can stand in for the real API.
    pub fn with_base_url(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
    ) -> Result<Self, OracleError> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        let client = if base_url.starts_with("https://") {
            http_client()?.clone()
        } else {
            plain_http_client()?
        };
        Ok(Self {
            client,
            base_url,
            api_key: api_key.into(),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn endpoint(&self, model: &str, method: &str) -> String {
        format!("{}/models/{model}:{method}", self.base_url)
    }

    async fn post(&self, url: &str, body: &Value) -> Result<reqwest::Response, OracleError> {
        let response = self
            .client
            .post(url)
            .header("x-goog-api-key", &self.api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| OracleError::communication(format!("Request failed: {e}")))?;
        ensure_success(response).await
    }

    async fn generate_content(&self, request: &OracleRequest) -> Result<OracleResponse, OracleError> {
        let url = self.endpoint(request.settings.model(), "generateContent");
        let body = build_request_body(request);
        tracing::debug!(model = request.settings.model(), "Gemini generateContent");

        let response = self.post(&url, &body).await?;
        let raw = response
            .text()
            .await
            .map_err(|e| OracleError::communication(format!("Failed to read response: {e}")))?;
        parse_generate_response(&raw)
    }

    async fn stream_content(
        &self,
        request: &OracleRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> Result<(), OracleError> {
        let url = format!(
            "{}?alt=sse",
            self.endpoint(request.settings.model(), "streamGenerateContent")
        );
        let body = build_request_body(request);
        tracing::debug!(model = request.settings.model(), "Gemini streamGenerateContent");

        let response = self.post(&url, &body).await?;
        let mut parser = GeminiParser;
        process_sse_stream(response, &mut parser, &tx, stream_idle_timeout()).await
    }
}

impl Oracle for GeminiOracle {
    fn generate<'a>(&'a self, request: &'a OracleRequest) -> OracleFut<'a, OracleResponse> {
        Box::pin(self.generate_content(request))
    }

    fn stream<'a>(
        &'a self,
        request: &'a OracleRequest,
        tx: mpsc::Sender<StreamEvent>,
    ) -> OracleFut<'a, ()> {
        Box::pin(self.stream_content(request, tx))
    }
}

fn text_part(text: &str) -> Value {
    json!({ "text": text })
}

/// Build the request body for the Gemini API.
fn build_request_body(request: &OracleRequest) -> Value {
    let mut body = serde_json::Map::new();
    body.insert(
        "contents".into(),
        json!([{
            "role": "user",
            "parts": [text_part(&request.content)]
        }]),
    );

    if let Some(instruction) = request.system_instruction.as_deref()
        && !instruction.trim().is_empty()
    {
        body.insert(
            "system_instruction".into(),
            json!({
                "parts": [text_part(instruction)]
            }),
        );
    }

    let settings = &request.settings;
    let mut gen_config = serde_json::Map::new();
    gen_config.insert("temperature".into(), json!(settings.temperature()));
    gen_config.insert("topP".into(), json!(settings.top_p()));
    if let Some(top_k) = settings.top_k() {
        gen_config.insert("topK".into(), json!(top_k));
    }
    if let Some(schema) = &request.response_schema {
        gen_config.insert("responseMimeType".into(), json!("application/json"));
        gen_config.insert("responseSchema".into(), schema.clone());
    }
    body.insert("generationConfig".into(), Value::Object(gen_config));

    if request.web_search {
        body.insert("tools".into(), json!([{ "googleSearch": {} }]));
    }

    Value::Object(body)
}

fn grounding_of(candidate: &typed::Candidate) -> Vec<GroundingReference> {
    candidate
        .web_sources()
        .map(|(uri, title)| GroundingReference {
            uri: uri.to_string(),
            title: title.to_string(),
        })
        .collect()
}

fn parse_generate_response(raw: &str) -> Result<OracleResponse, OracleError> {
    let response: typed::Response = serde_json::from_str(raw)
        .map_err(|e| OracleError::malformed(format!("Gemini response is not valid JSON: {e}")))?;

    if let Some(error) = response.error {
        let detail = error.message_or_default().to_string();
        return Err(if error.is_quota_exhausted() {
            OracleError::RateLimited { detail }
        } else {
            OracleError::Communication { detail }
        });
    }

    let usage = response
        .usage_metadata
        .map(|usage| UsageMetadata::new(usage.total_token_count));

    let Some(candidate) = response.candidates.and_then(|c| c.into_iter().next()) else {
        return Err(OracleError::malformed("Gemini response has no candidates"));
    };

    let text = candidate.answer_text();
    if text.is_empty()
        && let Some(msg) = candidate
            .finish_reason
            .as_deref()
            .and_then(|reason| typed::FinishReason::parse(reason).error_message())
    {
        return Err(OracleError::communication(msg));
    }

    Ok(OracleResponse {
        text,
        usage,
        grounding: grounding_of(&candidate),
    })
}

// ========================================================================
// Gemini SSE Parser
// ========================================================================

#[derive(Default)]
struct GeminiParser;

impl SseParser for GeminiParser {
    fn parse(&mut self, json: &Value) -> SseParseAction {
        let response: typed::Response = match serde_json::from_value(json.clone()) {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(%e, "Failed to parse Gemini SSE event");
                return SseParseAction::Continue;
            }
        };

        if let Some(error) = response.error {
            let detail = error.message_or_default().to_string();
            if error.is_quota_exhausted() {
                return SseParseAction::Fail(OracleError::RateLimited { detail });
            }
            return SseParseAction::Error(detail);
        }

        let mut events = Vec::new();
        let mut finish_action: Option<SseParseAction> = None;

        if let Some(candidates) = response.candidates {
            for candidate in candidates {
                // Content first: the final chunk carries both text and finishReason.
                let text = candidate.answer_text();
                if !text.is_empty() {
                    events.push(StreamEvent::TextDelta(text));
                }

                let sources = grounding_of(&candidate);
                if !sources.is_empty() {
                    events.push(StreamEvent::Grounding(sources));
                }

                if let Some(reason_str) = candidate.finish_reason {
                    let reason = typed::FinishReason::parse(&reason_str);
                    if reason.is_success() {
                        finish_action = Some(SseParseAction::Done);
                    } else if let Some(msg) = reason.error_message() {
                        finish_action = Some(SseParseAction::Error(msg.to_string()));
                    }
                }
            }
        }

        if let Some(usage) = response.usage_metadata {
            events.push(StreamEvent::Usage(UsageMetadata::new(usage.total_token_count)));
        }

        if let Some(action) = finish_action {
            if events.is_empty() {
                return action;
            }
            match action {
                SseParseAction::Done => events.push(StreamEvent::Done),
                SseParseAction::Error(msg) => events.push(StreamEvent::Error(msg)),
                _ => {}
            }
            return SseParseAction::Emit(events);
        }

        if events.is_empty() {
            SseParseAction::Continue
        } else {
            SseParseAction::Emit(events)
        }
    }

    fn provider_name(&self) -> &'static str {
        "Gemini"
    }
}
