pub mod domain;
pub mod ports;

pub use domain::{
    AuthSession, Category, DocumentInput, HistoryRecord, Identity, NewHistoryEntry,
    ProcessOutcome, User, UserCredentials,
};
pub use ports::{
    CredentialStore, EmailAnalysisService, HistoryStore, PortError, PortResult, SessionStore,
};
