use thiserror::Error;

use super::record::SessionId;

/// Everything the session core can report. None of these are fatal: each
/// operation that returns one has already left its state consistent.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SessionError {
    #[error("session {0} not found")]
    SessionNotFound(SessionId),

    #[error("session {session}: stored field `{field}` was malformed and has been reset")]
    MalformedRecord { session: SessionId, field: &'static str },

    #[error("session {session}: could not load schema from {database}: {reason}")]
    SchemaFetchFailed { session: SessionId, database: String, reason: String },

    #[error("session {session}: could not load entities for `{key}`: {reason}")]
    EntityFetchFailed { session: SessionId, key: String, reason: String },
}
