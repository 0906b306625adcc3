//! services/api/src/analysis.rs
//!
//! Wraps the `EmailAnalysisService` port with the availability policy of the
//! pipeline: every call is bounded by a timeout, retried a bounded number of
//! times, and any failure is absorbed into a fixed default. Callers never see
//! an error from here.

use mail_triage_core::{Category, EmailAnalysisService, PortError, PortResult};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Returned by `suggest_reply` whenever the model cannot produce a suggestion.
pub const FALLBACK_SUGGESTION: &str = "Unable to generate a reply suggestion.";

const RETRY_BACKOFF: Duration = Duration::from_millis(500);

/// Whether a model is wired in at all.
#[derive(Clone)]
pub enum AnalysisCapability {
    Available(Arc<dyn EmailAnalysisService>),
    Unavailable { reason: String },
}

/// The analysis capability together with its call policy.
#[derive(Clone)]
pub struct Analyzer {
    capability: AnalysisCapability,
    timeout: Duration,
    max_retries: u32,
}

impl Analyzer {
    pub fn new(capability: AnalysisCapability, timeout: Duration, max_retries: u32) -> Self {
        Self {
            capability,
            timeout,
            max_retries,
        }
    }

    /// An analyzer with no model behind it; every call degrades.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::new(
            AnalysisCapability::Unavailable {
                reason: reason.into(),
            },
            Duration::from_secs(1),
            0,
        )
    }

    pub fn is_available(&self) -> bool {
        matches!(self.capability, AnalysisCapability::Available(_))
    }

    /// Why the capability is unavailable, if it is.
    pub fn unavailable_reason(&self) -> Option<&str> {
        match &self.capability {
            AnalysisCapability::Available(_) => None,
            AnalysisCapability::Unavailable { reason } => Some(reason),
        }
    }

    /// Classifies the text. Falls back to `Category::DEFAULT` on any failure or
    /// on an answer that is not one of the two known labels.
    pub async fn classify(&self, text: &str) -> Category {
        let service = match &self.capability {
            AnalysisCapability::Available(service) => service,
            AnalysisCapability::Unavailable { .. } => return Category::DEFAULT,
        };

        match self.call("classify", || service.classify_email(text)).await {
            Ok(raw) => Category::from_model_label(&raw).unwrap_or_else(|| {
                warn!("Classifier answered with an unknown label {:?}; using {}", raw, Category::DEFAULT);
                Category::DEFAULT
            }),
            Err(e) => {
                warn!("Classification unavailable, using {}: {}", Category::DEFAULT, e);
                Category::DEFAULT
            }
        }
    }

    /// Drafts a reply for an already classified email. Falls back to
    /// `FALLBACK_SUGGESTION` on any failure or an empty answer.
    pub async fn suggest_reply(&self, text: &str, category: Category) -> String {
        let service = match &self.capability {
            AnalysisCapability::Available(service) => service,
            AnalysisCapability::Unavailable { .. } => return FALLBACK_SUGGESTION.to_string(),
        };

        match self.call("suggest_reply", || service.suggest_reply(text, category)).await {
            Ok(reply) if !reply.trim().is_empty() => reply.trim().to_string(),
            Ok(_) => {
                warn!("Reply suggestion came back empty; using the fallback");
                FALLBACK_SUGGESTION.to_string()
            }
            Err(e) => {
                warn!("Reply suggestion unavailable, using the fallback: {}", e);
                FALLBACK_SUGGESTION.to_string()
            }
        }
    }

    /// Runs one model call under the timeout, retrying with linear backoff.
    async fn call<F, Fut>(&self, operation: &str, mut attempt_fn: F) -> PortResult<String>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = PortResult<String>>,
    {
        let attempts = self.max_retries.saturating_add(1);
        let mut last_error = PortError::Unexpected("no attempt was made".to_string());

        for attempt in 1..=attempts {
            debug!("{} attempt {}/{}", operation, attempt, attempts);
            match tokio::time::timeout(self.timeout, attempt_fn()).await {
                Ok(Ok(answer)) => return Ok(answer),
                Ok(Err(e)) => {
                    warn!("{} attempt {} failed: {}", operation, attempt, e);
                    last_error = e;
                }
                Err(_) => {
                    warn!("{} attempt {} timed out after {:?}", operation, attempt, self.timeout);
                    last_error = PortError::Unexpected(format!("timed out after {:?}", self.timeout));
                }
            }
            if attempt < attempts {
                tokio::time::sleep(RETRY_BACKOFF.saturating_mul(attempt)).await;
            }
        }

        Err(last_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Answers with fixed strings, failing the first `failures` calls.
    struct Scripted {
        label: &'static str,
        reply: &'static str,
        failures: u32,
        calls: AtomicU32,
    }

    impl Scripted {
        fn new(label: &'static str, reply: &'static str, failures: u32) -> Arc<Self> {
            Arc::new(Self {
                label,
                reply,
                failures,
                calls: AtomicU32::new(0),
            })
        }

        fn fail_or<T>(&self, value: T) -> PortResult<T> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(PortError::Unexpected("model offline".into()))
            } else {
                Ok(value)
            }
        }
    }

    #[async_trait]
    impl EmailAnalysisService for Scripted {
        async fn classify_email(&self, _text: &str) -> PortResult<String> {
            self.fail_or(self.label.to_string())
        }

        async fn suggest_reply(&self, _text: &str, category: Category) -> PortResult<String> {
            self.fail_or(format!("{} ({})", self.reply, category))
        }
    }

    struct Sleepy;

    #[async_trait]
    impl EmailAnalysisService for Sleepy {
        async fn classify_email(&self, _text: &str) -> PortResult<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("Productive".into())
        }

        async fn suggest_reply(&self, _text: &str, _category: Category) -> PortResult<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("Sure".into())
        }
    }

    fn analyzer(service: Arc<dyn EmailAnalysisService>, retries: u32) -> Analyzer {
        Analyzer::new(AnalysisCapability::Available(service), Duration::from_secs(2), retries)
    }

    #[tokio::test]
    async fn unavailable_capability_degrades_to_defaults() {
        let analyzer = Analyzer::unavailable("no credentials");
        assert!(!analyzer.is_available());
        assert_eq!(analyzer.unavailable_reason(), Some("no credentials"));
        assert_eq!(analyzer.classify("hello").await, Category::Unproductive);
        assert_eq!(analyzer.suggest_reply("hello", Category::Productive).await, FALLBACK_SUGGESTION);
    }

    #[tokio::test]
    async fn recognised_labels_pass_through() {
        let analyzer = analyzer(Scripted::new(" Productive\n", "Thanks", 0), 0);
        assert_eq!(analyzer.classify("invoice").await, Category::Productive);
        assert_eq!(
            analyzer.suggest_reply("invoice", Category::Productive).await,
            "Thanks (Productive)"
        );
    }

    #[tokio::test]
    async fn unknown_labels_fall_back_to_the_default() {
        let analyzer = analyzer(Scripted::new("Spam", "Thanks", 0), 0);
        assert_eq!(analyzer.classify("win a prize").await, Category::Unproductive);
    }

    #[tokio::test]
    async fn failures_are_absorbed() {
        let analyzer = analyzer(Scripted::new("Productive", "Thanks", u32::MAX), 0);
        assert_eq!(analyzer.classify("x").await, Category::Unproductive);
        assert_eq!(analyzer.suggest_reply("x", Category::Unproductive).await, FALLBACK_SUGGESTION);
    }

    #[tokio::test]
    async fn retries_recover_from_a_transient_failure() {
        let service = Scripted::new("Productive", "Thanks", 1);
        let analyzer = analyzer(service.clone(), 1);
        assert_eq!(analyzer.classify("x").await, Category::Productive);
        assert_eq!(service.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn huge_retry_counts_do_not_overflow() {
        let service = Scripted::new("Productive", "Thanks", 0);
        let analyzer = analyzer(service.clone(), u32::MAX);
        assert_eq!(analyzer.classify("x").await, Category::Productive);
        assert_eq!(service.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn slow_calls_time_out_and_degrade() {
        let analyzer = Analyzer::new(
            AnalysisCapability::Available(Arc::new(Sleepy)),
            Duration::from_millis(50),
            0,
        );
        assert_eq!(analyzer.classify("x").await, Category::Unproductive);
        assert_eq!(analyzer.suggest_reply("x", Category::Productive).await, FALLBACK_SUGGESTION);
    }
}
