//! Typed Gemini response payloads.
//!
//! The same shapes arrive from `generateContent` (one JSON document) and
//! `streamGenerateContent?alt=sse` (one document per SSE event).

pub mod gemini {
    use serde::Deserialize;

    /// Token usage data returned by Gemini API.
    #[derive(Debug, Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct UsageMetadata {
        #[serde(default)]
        pub prompt_token_count: u64,
        #[serde(default)]
        pub candidates_token_count: u64,
        #[serde(default)]
        pub total_token_count: u64,
    }

    /// Top-level Gemini response.
    ///
    /// Streaming chunks are complete response objects; there are no event types.
    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Response {
        pub candidates: Option<Vec<Candidate>>,
        pub error: Option<ErrorInfo>,
        pub usage_metadata: Option<UsageMetadata>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Candidate {
        pub content: Option<Content>,
        pub finish_reason: Option<String>,
        pub grounding_metadata: Option<GroundingMetadata>,
    }

    #[derive(Debug, Deserialize)]
    pub struct Content {
        pub parts: Option<Vec<Part>>,
    }

    #[derive(Debug, Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct Part {
        pub text: Option<String>,
        /// Thinking output; never part of the answer text.
        #[serde(default)]
        pub thought: bool,
    }

    /// Web search citations attached to a candidate.
    #[derive(Debug, Deserialize, Default)]
    #[serde(rename_all = "camelCase")]
    pub struct GroundingMetadata {
        #[serde(default)]
        pub grounding_chunks: Vec<GroundingChunk>,
    }

    #[derive(Debug, Deserialize)]
    pub struct GroundingChunk {
        pub web: Option<WebSource>,
    }

    #[derive(Debug, Deserialize)]
    pub struct WebSource {
        pub uri: Option<String>,
        pub title: Option<String>,
    }

    #[derive(Debug, Deserialize)]
    pub struct ErrorInfo {
        pub message: Option<String>,
        pub code: Option<i32>,
        /// Canonical status string, e.g. `RESOURCE_EXHAUSTED`.
        pub status: Option<String>,
    }

    impl ErrorInfo {
        #[must_use]
        pub fn message_or_default(&self) -> &str {
            self.message.as_deref().unwrap_or("Unknown error")
        }

        #[must_use]
        pub fn is_quota_exhausted(&self) -> bool {
            self.code == Some(429) || self.status.as_deref() == Some("RESOURCE_EXHAUSTED")
        }
    }

    /// Known Gemini finish reasons.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub enum FinishReason {
        Stop,
        MaxTokens,
        Safety,
        Recitation,
        Language,
        Blocklist,
        ProhibitedContent,
        Spii,
        Other,
        Unknown,
    }

    impl FinishReason {
        #[must_use]
        pub fn parse(s: &str) -> Self {
            match s {
                "STOP" => Self::Stop,
                "MAX_TOKENS" => Self::MaxTokens,
                "SAFETY" => Self::Safety,
                "RECITATION" => Self::Recitation,
                "LANGUAGE" => Self::Language,
                "BLOCKLIST" => Self::Blocklist,
                "PROHIBITED_CONTENT" => Self::ProhibitedContent,
                "SPII" => Self::Spii,
                "OTHER" => Self::Other,
                _ => Self::Unknown,
            }
        }

        /// Returns error message if this is an error reason, None if success.
        #[must_use]
        pub fn error_message(self) -> Option<&'static str> {
            match self {
                Self::Stop | Self::MaxTokens | Self::Unknown => None,
                Self::Safety => Some("Content filtered by safety settings"),
                Self::Recitation => Some("Response blocked: recitation"),
                Self::Language => Some("Unsupported language"),
                Self::Blocklist => Some("Content contains blocked terms"),
                Self::ProhibitedContent => Some("Prohibited content detected"),
                Self::Spii => Some("Sensitive PII detected"),
                Self::Other => Some("Generation stopped: unknown reason"),
            }
        }

        #[must_use]
        pub fn is_success(self) -> bool {
            matches!(self, Self::Stop | Self::MaxTokens)
        }
    }

    impl Candidate {
        /// Concatenated answer text of this candidate, skipping thought parts.
        #[must_use]
        pub fn answer_text(&self) -> String {
            self.content
                .as_ref()
                .and_then(|content| content.parts.as_ref())
                .map(|parts| {
                    parts
                        .iter()
                        .filter(|part| !part.thought)
                        .filter_map(|part| part.text.as_deref())
                        .collect()
                })
                .unwrap_or_default()
        }

        /// Web citations carrying both uri and title.
        pub fn web_sources(&self) -> impl Iterator<Item = (&str, &str)> {
            self.grounding_metadata
                .iter()
                .flat_map(|meta| meta.grounding_chunks.iter())
                .filter_map(|chunk| chunk.web.as_ref())
                .filter_map(|web| Some((web.uri.as_deref()?, web.title.as_deref()?)))
        }
    }

}
