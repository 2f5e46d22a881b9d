//! Backend commands queued from UI to backend worker.

use shared::domain::Network;

pub enum BackendCommand {
    Discover,
    Connect,
    /// Answer to `UiEvent::ChooseWallet`; `None` cancels.
    ChooseWallet(Option<usize>),
    Disconnect,
    SwitchNetwork(Network),
    RefreshBalance,
    RefreshPrice,
    SendTransfer {
        recipient: String,
        amount: String,
    },
    LoadHistory,
}

impl BackendCommand {
    pub fn name(&self) -> &'static str {
        match self {
            BackendCommand::Discover => "discover",
            BackendCommand::Connect => "connect",
            BackendCommand::ChooseWallet(_) => "choose_wallet",
            BackendCommand::Disconnect => "disconnect",
            BackendCommand::SwitchNetwork(_) => "switch_network",
            BackendCommand::RefreshBalance => "refresh_balance",
            BackendCommand::RefreshPrice => "refresh_price",
            BackendCommand::SendTransfer { .. } => "send_transfer",
            BackendCommand::LoadHistory => "load_history",
        }
    }
}
