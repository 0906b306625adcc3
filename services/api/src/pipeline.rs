//! services/api/src/pipeline.rs
//!
//! The document processing pipeline: extract -> classify -> suggest -> persist.
//!
//! Each step depends on the output of the previous one, so the stages run
//! strictly in order within the request's task. Model failures never abort a
//! run (see `analysis`); storage failures always do.

use crate::analysis::Analyzer;
use crate::extract::{self, ExtractError};
use mail_triage_core::{
    DocumentInput, HistoryStore, Identity, NewHistoryEntry, PortError, ProcessOutcome,
};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The stages a single processing request moves through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Received,
    Extracted,
    Classified,
    Suggested,
    Persisted,
    Responded,
    Rejected,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Why a processing request was rejected or aborted.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("No email content was provided")]
    NoContent,
    #[error("Unsupported file format: {0}")]
    UnsupportedFormat(String),
    #[error("File is not valid UTF-8 text: {0}")]
    InvalidEncoding(String),
    #[error("Could not extract text from the document: {0}")]
    ExtractionFailed(String),
    #[error("The analysis capability is not configured")]
    CapabilityUnavailable,
    #[error("History storage failed: {0}")]
    Storage(#[from] PortError),
}

impl From<ExtractError> for ProcessingError {
    fn from(e: ExtractError) -> Self {
        match e {
            ExtractError::UnsupportedFormat(name) => ProcessingError::UnsupportedFormat(name),
            ExtractError::InvalidEncoding(msg) => ProcessingError::InvalidEncoding(msg),
            ExtractError::ExtractionFailed(msg) => ProcessingError::ExtractionFailed(msg),
        }
    }
}

/// Orchestrates one document from upload to stored history record.
#[derive(Clone)]
pub struct ProcessingPipeline {
    history: Arc<dyn HistoryStore>,
    analyzer: Analyzer,
    /// Characters of text kept in the history record; 0 keeps all of it.
    excerpt_chars: usize,
    /// Reject requests outright when no model is configured instead of degrading.
    require_capability: bool,
}

impl ProcessingPipeline {
    pub fn new(
        history: Arc<dyn HistoryStore>,
        analyzer: Analyzer,
        excerpt_chars: usize,
        require_capability: bool,
    ) -> Self {
        Self {
            history,
            analyzer,
            excerpt_chars,
            require_capability,
        }
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.analyzer
    }

    /// Processes one submission on behalf of `identity`.
    ///
    /// Exactly one history record is written when this returns `Ok`, and none
    /// when it returns `Err`.
    pub async fn process_document(
        &self,
        input: Option<DocumentInput>,
        identity: &Identity,
    ) -> Result<ProcessOutcome, ProcessingError> {
        let result = self.run(input, identity).await;
        match &result {
            Ok(outcome) => debug!(
                "[{}] {} -> {}",
                Stage::Responded,
                identity.email,
                outcome.category
            ),
            Err(ProcessingError::Storage(e)) => {
                error!("[{}] history write failed for {}: {}", Stage::Rejected, identity.email, e)
            }
            Err(e) => info!("[{}] request from {} rejected: {}", Stage::Rejected, identity.email, e),
        }
        result
    }

    async fn run(
        &self,
        input: Option<DocumentInput>,
        identity: &Identity,
    ) -> Result<ProcessOutcome, ProcessingError> {
        debug!("[{}] request from {}", Stage::Received, identity.email);

        if let Some(reason) = self.analyzer.unavailable_reason() {
            if self.require_capability {
                return Err(ProcessingError::CapabilityUnavailable);
            }
            warn!("Analysis capability unavailable ({}); results will use defaults", reason);
        }

        let text = match input {
            None => return Err(ProcessingError::NoContent),
            Some(DocumentInput::InlineText(text)) => text,
            Some(DocumentInput::File { file_name, data }) => {
                extract::extract_document(&file_name, data).await?
            }
        };
        if text.trim().is_empty() {
            return Err(ProcessingError::NoContent);
        }
        debug!("[{}] {} characters", Stage::Extracted, text.chars().count());

        let category = self.analyzer.classify(&text).await;
        debug!("[{}] {}", Stage::Classified, category);

        let suggestion = self.analyzer.suggest_reply(&text, category).await;
        debug!("[{}] {} characters", Stage::Suggested, suggestion.chars().count());

        let record = self
            .history
            .append(NewHistoryEntry {
                owner_email: identity.email.clone(),
                text_excerpt: excerpt(&text, self.excerpt_chars),
                category,
                suggestion: suggestion.clone(),
            })
            .await?;
        debug!("[{}] history record {}", Stage::Persisted, record.id);

        Ok(ProcessOutcome {
            category,
            suggestion,
        })
    }
}

/// The first `max_chars` characters of `text`; all of it when `max_chars` is 0.
///
/// NUL characters are dropped, since Postgres `TEXT` cannot store them.
pub fn excerpt(text: &str, max_chars: usize) -> String {
    let chars = text.chars().filter(|&c| c != '\0');
    if max_chars == 0 {
        chars.collect()
    } else {
        chars.take(max_chars).collect()
    }
}
