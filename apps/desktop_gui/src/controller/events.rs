//! UI/backend events and error modeling for desktop GUI controller.

use client_core::{ConnectControls, PriceQuote, SessionSnapshot, TransactionSummary};
use shared::{
    domain::{Lamports, Network, Signature},
    error::{ErrorKind, ErrorReport},
};

pub enum UiEvent {
    Info(String),
    ProvidersDiscovered {
        names: Vec<String>,
        controls: ConnectControls,
    },
    /// Several wallets are available; answer with `BackendCommand::ChooseWallet`.
    ChooseWallet {
        names: Vec<String>,
    },
    ConnectFinished {
        connected: bool,
    },
    SessionChanged(SessionSnapshot),
    NetworkChanged(Network),
    BalanceUpdated(Lamports),
    PriceUpdated(PriceQuote),
    TransferConfirmed {
        signature: Signature,
        explorer_url: String,
    },
    TransferFailed(ErrorReport),
    HistoryLoaded(Vec<TransactionSummary>),
    Error(UiError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorCategory {
    Wallet,
    Funds,
    Transport,
    Validation,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UiErrorContext {
    BackendStartup,
    Connect,
    Transfer,
    Balance,
    Price,
    History,
    General,
}

#[derive(Debug, Clone)]
pub struct UiError {
    category: UiErrorCategory,
    context: UiErrorContext,
    message: String,
}

impl UiError {
    /// Free-form failure text, categorized by what it mentions.
    pub fn from_message(context: UiErrorContext, message: impl Into<String>) -> Self {
        let message = message.into();
        let message_lower = message.to_ascii_lowercase();
        let category = if message_lower.contains("rejected")
            || message_lower.contains("wallet")
            || message_lower.contains("snap")
        {
            UiErrorCategory::Wallet
        } else if message_lower.contains("insufficient") {
            UiErrorCategory::Funds
        } else if message_lower.contains("invalid")
            || message_lower.contains("missing")
            || message_lower.contains("malformed")
        {
            UiErrorCategory::Validation
        } else if message_lower.contains("timeout")
            || message_lower.contains("timed out")
            || message_lower.contains("connection")
            || message_lower.contains("network")
            || message_lower.contains("transport")
            || message_lower.contains("unavailable")
            || message_lower.contains("disconnect")
        {
            UiErrorCategory::Transport
        } else {
            UiErrorCategory::Unknown
        };

        Self {
            category,
            context,
            message,
        }
    }

    pub fn from_report(context: UiErrorContext, report: &ErrorReport) -> Self {
        let category = match report.kind {
            ErrorKind::ProviderNotFound
            | ErrorKind::HandshakeStepFailed { .. }
            | ErrorKind::SelectionCancelled
            | ErrorKind::UserRejected
            | ErrorKind::NotConnected => UiErrorCategory::Wallet,
            ErrorKind::InsufficientFunds { .. } => UiErrorCategory::Funds,
            ErrorKind::InvalidRecipient | ErrorKind::InvalidAmount => UiErrorCategory::Validation,
            ErrorKind::ConfirmationTimeout => UiErrorCategory::Transport,
            ErrorKind::InFlight | ErrorKind::Unknown => UiErrorCategory::Unknown,
        };
        Self {
            category,
            context,
            message: report.message.clone(),
        }
    }

    pub fn category(&self) -> UiErrorCategory {
        self.category
    }

    pub fn context(&self) -> UiErrorContext {
        self.context
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}
