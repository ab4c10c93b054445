use serde::{Deserialize, Serialize};

use crate::{RequestStatus, UsageMetadata};

/// A web source cited by a search-grounded oracle call.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroundingReference {
    pub uri: String,
    pub title: String,
}

/// Streaming fact-check record. Text and sources grow while `Pending`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactCheckMessage {
    pub input: String,
    pub status: RequestStatus,
    pub text: String,
    pub sources: Vec<GroundingReference>,
    pub usage: Option<UsageMetadata>,
    pub error: Option<String>,
}

impl FactCheckMessage {
    #[must_use]
    pub fn pending(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            status: RequestStatus::Pending,
            text: String::new(),
            sources: Vec::new(),
            usage: None,
            error: None,
        }
    }

    /// Add sources not yet present, keyed by `uri`. Entries missing a uri
    /// or title are skipped. Returns how many were added.
    pub fn merge_sources(&mut self, incoming: impl IntoIterator<Item = GroundingReference>) -> usize {
        let mut added = 0;
        for source in incoming {
            if source.uri.is_empty() || source.title.is_empty() {
                continue;
            }
            if self.sources.iter().any(|s| s.uri == source.uri) {
                continue;
            }
            self.sources.push(source);
            added += 1;
        }
        added
    }
}
