use std::time::Duration;

use hedera::Status;
use thiserror::Error;

/// Failures reported by a ledger client
#[derive(Debug, Error)]
pub enum LedgerError {
    // Receipt or precheck carried a non-success status
    #[error("{operation} failed with status {status:?}")]
    Status {
        operation: &'static str,
        status: Status,
    },

    #[error("{operation} receipt did not contain a {entity} id")]
    MissingEntity {
        operation: &'static str,
        entity: &'static str,
    },

    #[error("subscription to topic {topic} failed: {reason}")]
    Subscription { topic: String, reason: String },

    #[error("no message received from topic {topic} within {waited:?}")]
    SubscriptionTimeout { topic: String, waited: Duration },

    // Rejected before anything was sent
    #[error("invalid {operation}: {reason}")]
    InvalidRequest {
        operation: &'static str,
        reason: String,
    },

    #[error("{operation} failed: {message}")]
    Sdk {
        operation: &'static str,
        message: String,
    },
}

impl LedgerError {
    /// Network status attached to this failure, if the network answered at all
    pub fn status(&self) -> Option<Status> {
        match self {
            Self::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_status(&self, expected: Status) -> bool {
        self.status() == Some(expected)
    }

    /// An association request for a pair that is already associated.
    /// Setup steps treat this as a no-op, every other failure is genuine.
    pub fn is_already_associated(&self) -> bool {
        self.is_status(Status::TokenAlreadyAssociatedToAccount)
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Cannot read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Fixture slot {slot} requested but only {available} accounts are configured")]
    MissingFixture { slot: usize, available: usize },

    #[error("Fixture slot {slot} has an invalid account id '{value}': {reason}")]
    InvalidAccountId {
        slot: usize,
        value: String,
        reason: String,
    },

    // The key itself is never echoed back
    #[error("Fixture slot {slot} has an invalid private key")]
    InvalidPrivateKey { slot: usize },

    #[error("Unknown network '{0}'")]
    UnknownNetwork(String),
}
