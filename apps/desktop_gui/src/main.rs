mod backend_bridge;
mod controller;
mod ui;

use crossbeam_channel::bounded;
use eframe::egui;

use backend_bridge::{commands::BackendCommand, runtime::spawn_backend_thread};
use controller::events::UiEvent;
use ui::{PersistedWalletSettings, WalletGuiApp, SETTINGS_STORAGE_KEY};

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(64);
    let (ui_tx, ui_rx) = bounded::<UiEvent>(512);
    spawn_backend_thread(cmd_rx, ui_tx);

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("Solana Wallet")
            .with_inner_size([560.0, 760.0])
            .with_min_inner_size([420.0, 560.0]),
        ..Default::default()
    };
    eframe::run_native(
        "Solana Wallet",
        options,
        Box::new(|cc| {
            let persisted_settings = cc.storage.and_then(|storage| {
                storage
                    .get_string(SETTINGS_STORAGE_KEY)
                    .and_then(|text| serde_json::from_str::<PersistedWalletSettings>(&text).ok())
            });
            Ok(Box::new(WalletGuiApp::new(cmd_tx, ui_rx, persisted_settings)))
        }),
    )
}

#[cfg(test)]
mod tests {
    use client_core::{PriceQuote, SessionSnapshot};
    use crossbeam_channel::bounded;
    use shared::{
        domain::{Address, ConnectionKind},
        error::{ErrorKind, ErrorReport, FundsCheck},
    };

    use crate::backend_bridge::commands::BackendCommand;
    use crate::controller::events::{UiError, UiErrorCategory, UiErrorContext, UiEvent};
    use crate::controller::orchestration::{
        dispatch_backend_command, BACKEND_GONE_MESSAGE, QUEUE_FULL_MESSAGE,
    };
    use crate::ui::app::{
        Converter, PersistedWalletSettings, SendForm, ThemePreset, WalletGuiApp,
    };

    #[test]
    fn classifies_backend_command_processor_disconnect_as_transport_error() {
        let err = UiError::from_message(UiErrorContext::General, BACKEND_GONE_MESSAGE);
        assert_eq!(err.category(), UiErrorCategory::Transport);
    }

    #[test]
    fn error_reports_map_to_ui_categories() {
        let rejected = ErrorReport::new(ErrorKind::UserRejected, "You rejected the request.");
        let funds = ErrorReport::new(
            ErrorKind::InsufficientFunds {
                stage: FundsCheck::Preflight,
            },
            "Insufficient balance",
        );
        let timeout = ErrorReport::new(ErrorKind::ConfirmationTimeout, "not confirmed in time");

        assert_eq!(
            UiError::from_report(UiErrorContext::Transfer, &rejected).category(),
            UiErrorCategory::Wallet
        );
        assert_eq!(
            UiError::from_report(UiErrorContext::Transfer, &funds).category(),
            UiErrorCategory::Funds
        );
        let err = UiError::from_report(UiErrorContext::Transfer, &timeout);
        assert_eq!(err.category(), UiErrorCategory::Transport);
        assert_eq!(err.context(), UiErrorContext::Transfer);
        assert_eq!(err.message(), "not confirmed in time");
    }

    #[test]
    fn field_errors_stay_inline_and_others_go_to_the_banner() {
        let mut form = SendForm {
            recipient: "not-an-address".to_string(),
            amount: "1".to_string(),
            ..SendForm::default()
        };
        form.begin();
        assert!(form.sending);

        let inline = form.apply_failure(&ErrorReport::new(
            ErrorKind::InvalidRecipient,
            "Invalid recipient address",
        ));
        assert!(inline);
        assert!(!form.sending);
        assert_eq!(form.recipient_error.as_deref(), Some("Invalid recipient address"));
        assert_eq!(form.amount_error, None);

        form.begin();
        assert_eq!(form.recipient_error, None);
        assert!(!form.apply_failure(&ErrorReport::new(ErrorKind::UserRejected, "rejected")));
        assert!(!form.sending);
        assert_eq!(form.recipient, "not-an-address");

        form.apply_success();
        assert_eq!(form, SendForm::default());
    }

    #[test]
    fn converter_needs_a_price() {
        let mut converter = Converter {
            fiat_input: "50".to_string(),
            ..Converter::default()
        };
        converter.fiat_edited(None);
        assert_eq!(converter.sol_input, "");

        let quote = PriceQuote::new(100.0);
        converter.fiat_edited(Some(&quote));
        assert_eq!(converter.sol_input, "0.500000");

        converter.sol_input = "2".to_string();
        converter.sol_edited(Some(&quote));
        assert_eq!(converter.fiat_input, "200.00");

        converter.sol_input = "abc".to_string();
        converter.sol_edited(Some(&quote));
        assert_eq!(converter.fiat_input, "");
    }

    #[test]
    fn theme_preference_survives_serialization() {
        let stored = serde_json::to_string(&PersistedWalletSettings {
            theme: ThemePreset::Light,
        })
        .expect("serialize");
        assert_eq!(stored, r#"{"theme":"light"}"#);
        let restored: PersistedWalletSettings = serde_json::from_str(&stored).expect("restore");
        assert_eq!(restored.theme, ThemePreset::Light);

        let legacy: PersistedWalletSettings = serde_json::from_str("{}").expect("defaults");
        assert_eq!(legacy.theme, ThemePreset::Dark);
    }

    #[test]
    fn dispatch_reports_full_and_closed_queues() {
        let mut status = String::new();
        let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(1);
        assert!(dispatch_backend_command(&cmd_tx, BackendCommand::Discover, &mut status));
        assert!(!dispatch_backend_command(&cmd_tx, BackendCommand::Connect, &mut status));
        assert_eq!(status, QUEUE_FULL_MESSAGE);

        drop(cmd_rx);
        assert!(!dispatch_backend_command(&cmd_tx, BackendCommand::Disconnect, &mut status));
        assert_eq!(status, BACKEND_GONE_MESSAGE);
    }

    #[test]
    fn send_stays_locked_until_the_transfer_reports_back() {
        let (cmd_tx, cmd_rx) = bounded::<BackendCommand>(8);
        let (ui_tx, ui_rx) = bounded::<UiEvent>(8);
        let mut app = WalletGuiApp::new(cmd_tx, ui_rx, None);

        ui_tx
            .send(UiEvent::SessionChanged(SessionSnapshot {
                connection_kind: ConnectionKind::Native,
                account: Some(Address::new([1u8; 32])),
                wallet_name: Some("Phantom".to_string()),
            }))
            .expect("session event");
        app.process_ui_events();
        assert!(app.can_disconnect());

        app.send_transfer();
        assert!(app.is_sending());
        assert!(!app.can_disconnect());
        assert!(cmd_rx
            .try_iter()
            .any(|cmd| matches!(cmd, BackendCommand::SendTransfer { .. })));

        ui_tx
            .send(UiEvent::SessionChanged(SessionSnapshot::default()))
            .expect("disconnect event");
        app.process_ui_events();
        assert!(app.is_sending());

        ui_tx
            .send(UiEvent::TransferFailed(ErrorReport::new(
                ErrorKind::NotConnected,
                "Connect a wallet before sending.",
            )))
            .expect("failure event");
        app.process_ui_events();
        assert!(!app.is_sending());
        assert!(!app.can_disconnect());
    }
}
