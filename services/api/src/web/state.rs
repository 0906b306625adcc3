//! services/api/src/web/state.rs
//!
//! Defines the application's shared state.

use crate::analysis::Analyzer;
use crate::config::Config;
use crate::credentials::CredentialService;
use crate::gate::SessionGate;
use crate::pipeline::ProcessingPipeline;
use mail_triage_core::ports::{CredentialStore, HistoryStore, SessionStore};
use std::sync::Arc;

//=========================================================================================
// AppState (Shared Across All Requests)
//=========================================================================================

/// The shared application state, created once at startup and passed to all handlers.
///
/// Nothing in here is tied to a particular request; the caller's identity
/// always comes from the request's own session token.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub gate: SessionGate,
    pub history: Arc<dyn HistoryStore>,
    pub pipeline: ProcessingPipeline,
}

impl AppState {
    /// Wires the services together over the given stores.
    pub fn new(
        config: Arc<Config>,
        credential_store: Arc<dyn CredentialStore>,
        session_store: Arc<dyn SessionStore>,
        history_store: Arc<dyn HistoryStore>,
        analyzer: Analyzer,
    ) -> Self {
        let credentials = CredentialService::new(credential_store);
        let gate = SessionGate::new(credentials, session_store, config.session_ttl);
        let pipeline = ProcessingPipeline::new(
            history_store.clone(),
            analyzer,
            config.history_excerpt_chars,
            config.require_ai_capability,
        );

        Self {
            config,
            gate,
            history: history_store,
            pipeline,
        }
    }
}
