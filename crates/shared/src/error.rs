use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandshakeStep {
    NativeConnect,
    RequestHostAccounts,
    RequestBridgeInstallation,
    InvokeBridgeConnect,
}

impl HandshakeStep {
    pub fn describe(self) -> &'static str {
        match self {
            HandshakeStep::NativeConnect => "wallet connection",
            HandshakeStep::RequestHostAccounts => "account access request",
            HandshakeStep::RequestBridgeInstallation => "Solana Snap installation",
            HandshakeStep::InvokeBridgeConnect => "Solana Snap connection",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FundsCheck {
    Preflight,
    Submission,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ErrorKind {
    ProviderNotFound,
    HandshakeStepFailed { step: HandshakeStep },
    SelectionCancelled,
    UserRejected,
    NotConnected,
    InvalidRecipient,
    InvalidAmount,
    InsufficientFunds { stage: FundsCheck },
    ConfirmationTimeout,
    InFlight,
    Unknown,
}

impl ErrorKind {
    /// Errors rendered inline next to the offending input instead of the status banner.
    pub fn is_field_validation(self) -> bool {
        matches!(self, ErrorKind::InvalidRecipient | ErrorKind::InvalidAmount)
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ErrorKind::ProviderNotFound => "provider_not_found",
            ErrorKind::HandshakeStepFailed { .. } => "handshake_step_failed",
            ErrorKind::SelectionCancelled => "selection_cancelled",
            ErrorKind::UserRejected => "user_rejected",
            ErrorKind::NotConnected => "not_connected",
            ErrorKind::InvalidRecipient => "invalid_recipient",
            ErrorKind::InvalidAmount => "invalid_amount",
            ErrorKind::InsufficientFunds { .. } => "insufficient_funds",
            ErrorKind::ConfirmationTimeout => "confirmation_timeout",
            ErrorKind::InFlight => "in_flight",
            ErrorKind::Unknown => "unknown",
        };
        f.write_str(label)
    }
}

/// Serializable error handed across the backend/UI boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[error("{kind}: {message}")]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
}

impl ErrorReport {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}
