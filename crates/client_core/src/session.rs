use serde::Serialize;
use shared::domain::{Address, ConnectionKind};

use crate::signer::SigningCapability;

#[derive(Clone)]
pub struct ActiveSession {
    pub wallet_name: String,
    pub capability: SigningCapability,
}

/// The single connected/disconnected record. Capability, account and connection kind are
/// all derived from one optional session so they are present or absent together.
#[derive(Default)]
pub struct SessionState {
    active: Option<ActiveSession>,
}

impl SessionState {
    pub fn set_connected(&mut self, wallet_name: impl Into<String>, capability: SigningCapability) {
        self.active = Some(ActiveSession {
            wallet_name: wallet_name.into(),
            capability,
        });
    }

    pub fn clear(&mut self) -> Option<ActiveSession> {
        self.active.take()
    }

    pub fn is_connected(&self) -> bool {
        self.active.is_some()
    }

    pub fn connection_kind(&self) -> ConnectionKind {
        self.active
            .as_ref()
            .map(|session| session.capability.connection_kind())
            .unwrap_or_default()
    }

    pub fn capability(&self) -> Option<&SigningCapability> {
        self.active.as_ref().map(|session| &session.capability)
    }

    pub fn account(&self) -> Option<Address> {
        self.capability().map(SigningCapability::account)
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            connection_kind: self.connection_kind(),
            account: self.account(),
            wallet_name: self.active.as_ref().map(|session| session.wallet_name.clone()),
        }
    }
}

/// Read-only view of the session handed to UIs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub connection_kind: ConnectionKind,
    pub account: Option<Address>,
    pub wallet_name: Option<String>,
}

impl SessionSnapshot {
    pub fn is_connected(&self) -> bool {
        self.connection_kind != ConnectionKind::None
    }
}
