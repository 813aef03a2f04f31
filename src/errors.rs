//! Error types for the CYAN ledger and settlement engine.
//!
//! Every operation returns a typed failure instead of aborting; callers are
//! responsible for turning these into user-facing messages.

use crate::ledger::transactions::UserId;

/// Root error type for all ledger, game, and redemption operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    #[error("Insufficient funds: balance {balance}, required {required}")]
    InsufficientFunds { balance: u64, required: u64 },

    #[error("Invalid bet: {0}")]
    InvalidBetRange(String),

    #[error("Unknown reward: {0}")]
    InvalidRewardId(u64),

    #[error("Invalid difficulty: {0}")]
    InvalidDifficulty(String),

    #[error("Invalid selection: {0}")]
    InvalidSelection(String),

    #[error("Session not found: {0}")]
    SessionNotFound(uuid::Uuid),

    #[error("Session already settled: {0}")]
    SessionNotAlive(uuid::Uuid),

    #[error("Redeem request {0} already processed")]
    AlreadyProcessed(u64),

    #[error("Redeem request not found: {0}")]
    RequestNotFound(u64),

    #[error("Daily already claimed, retry in {0}s")]
    ClaimOnCooldown(i64),

    #[error("Permission denied for user {0}")]
    PermissionDenied(UserId),

    #[error("Invalid configuration value for {field}: {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Storage failure: {0}")]
    Storage(String),
}

impl From<rocksdb::Error> for LedgerError {
    fn from(e: rocksdb::Error) -> Self {
        LedgerError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for LedgerError {
    fn from(e: serde_json::Error) -> Self {
        LedgerError::Storage(format!("codec: {}", e))
    }
}

/// Convenience alias used throughout the crate.
pub type LedgerResult<T> = Result<T, LedgerError>;
