use arboard::Clipboard;
use chrono::Local;
use client_core::{
    price::convert, ConnectControls, PriceQuote, SessionSnapshot, TransactionSummary,
};
use crossbeam_channel::{Receiver, Sender};
use eframe::egui;
use serde::{Deserialize, Serialize};
use shared::{
    domain::{format_address, Lamports, Network, Signature},
    error::{ErrorKind, ErrorReport},
};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorCategory, UiErrorContext, UiEvent};
use crate::controller::orchestration::dispatch_backend_command;

pub const SETTINGS_STORAGE_KEY: &str = "desktop_gui.settings";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum StatusBannerSeverity {
    Error,
    Success,
}

#[derive(Debug, Clone)]
pub(crate) struct StatusBanner {
    pub(crate) severity: StatusBannerSeverity,
    pub(crate) message: String,
}

impl StatusBanner {
    fn error(err: &UiError) -> Self {
        Self {
            severity: StatusBannerSeverity::Error,
            message: format!(
                "{} ({}): {}",
                err_label(err.category()),
                context_label(err.context()),
                err.message()
            ),
        }
    }
}

fn err_label(category: UiErrorCategory) -> &'static str {
    match category {
        UiErrorCategory::Wallet => "Wallet",
        UiErrorCategory::Funds => "Funds",
        UiErrorCategory::Transport => "Network",
        UiErrorCategory::Validation => "Validation",
        UiErrorCategory::Unknown => "Unexpected",
    }
}

fn context_label(context: UiErrorContext) -> &'static str {
    match context {
        UiErrorContext::BackendStartup => "startup",
        UiErrorContext::Connect => "connect",
        UiErrorContext::Transfer => "transfer",
        UiErrorContext::Balance => "balance",
        UiErrorContext::Price => "price",
        UiErrorContext::History => "history",
        UiErrorContext::General => "general",
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThemePreset {
    #[default]
    Dark,
    Light,
}

impl ThemePreset {
    fn toggled(self) -> Self {
        match self {
            ThemePreset::Dark => ThemePreset::Light,
            ThemePreset::Light => ThemePreset::Dark,
        }
    }

    fn toggle_label(self) -> &'static str {
        match self {
            ThemePreset::Dark => "Light mode",
            ThemePreset::Light => "Dark mode",
        }
    }

    fn visuals(self) -> egui::Visuals {
        match self {
            ThemePreset::Dark => {
                let mut v = egui::Visuals::dark();
                v.window_fill = egui::Color32::from_rgb(24, 24, 32);
                v.panel_fill = egui::Color32::from_rgb(18, 18, 24);
                v.hyperlink_color = egui::Color32::from_rgb(153, 69, 255);
                v.selection.bg_fill = egui::Color32::from_rgb(153, 69, 255);
                v
            }
            ThemePreset::Light => egui::Visuals::light(),
        }
    }
}

/// Preferences kept in eframe storage between runs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PersistedWalletSettings {
    pub theme: ThemePreset,
}

/// Transfer form input plus the errors shown inline next to each field.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct SendForm {
    pub(crate) recipient: String,
    pub(crate) amount: String,
    pub(crate) recipient_error: Option<String>,
    pub(crate) amount_error: Option<String>,
    pub(crate) sending: bool,
}

impl SendForm {
    pub(crate) fn begin(&mut self) {
        self.recipient_error = None;
        self.amount_error = None;
        self.sending = true;
    }

    /// Returns `false` when the failure belongs in the status banner instead.
    pub(crate) fn apply_failure(&mut self, report: &ErrorReport) -> bool {
        self.sending = false;
        match report.kind {
            ErrorKind::InvalidRecipient => {
                self.recipient_error = Some(report.message.clone());
                true
            }
            ErrorKind::InvalidAmount => {
                self.amount_error = Some(report.message.clone());
                true
            }
            _ => false,
        }
    }

    pub(crate) fn apply_success(&mut self) {
        *self = Self::default();
    }
}

/// USD/SOL converter; whichever side was edited last drives the other.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Converter {
    pub(crate) fiat_input: String,
    pub(crate) sol_input: String,
}

impl Converter {
    pub(crate) fn fiat_edited(&mut self, quote: Option<&PriceQuote>) {
        self.sol_input = self
            .fiat_input
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|fiat| convert::fiat_to_sol(fiat, quote))
            .map(|sol| format!("{sol:.6}"))
            .unwrap_or_default();
    }

    pub(crate) fn sol_edited(&mut self, quote: Option<&PriceQuote>) {
        self.fiat_input = self
            .sol_input
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(|sol| convert::sol_to_fiat(sol, quote))
            .map(|fiat| format!("{fiat:.2}"))
            .unwrap_or_default();
    }
}

pub struct WalletGuiApp {
    cmd_tx: Sender<BackendCommand>,
    ui_rx: Receiver<UiEvent>,
    status: String,
    status_banner: Option<StatusBanner>,
    network: Network,
    wallet_names: Vec<String>,
    connect_controls: Option<ConnectControls>,
    connecting: bool,
    wallet_choice: Option<Vec<String>>,
    session: SessionSnapshot,
    balance: Option<Lamports>,
    price: Option<PriceQuote>,
    converter: Converter,
    send_form: SendForm,
    last_transfer: Option<(Signature, String)>,
    history: Vec<TransactionSummary>,
    theme: ThemePreset,
    applied_theme: Option<ThemePreset>,
}

impl WalletGuiApp {
    pub fn new(
        cmd_tx: Sender<BackendCommand>,
        ui_rx: Receiver<UiEvent>,
        persisted_settings: Option<PersistedWalletSettings>,
    ) -> Self {
        let persisted = persisted_settings.unwrap_or_default();
        Self {
            cmd_tx,
            ui_rx,
            status: "Starting...".to_string(),
            status_banner: None,
            network: Network::default(),
            wallet_names: Vec::new(),
            connect_controls: None,
            connecting: false,
            wallet_choice: None,
            session: SessionSnapshot::default(),
            balance: None,
            price: None,
            converter: Converter::default(),
            send_form: SendForm::default(),
            last_transfer: None,
            history: Vec::new(),
            theme: persisted.theme,
            applied_theme: None,
        }
    }

    fn queue(&mut self, cmd: BackendCommand) -> bool {
        let queued = dispatch_backend_command(&self.cmd_tx, cmd, &mut self.status);
        if !queued {
            self.status_banner = Some(StatusBanner::error(&UiError::from_message(
                UiErrorContext::General,
                self.status.clone(),
            )));
        }
        queued
    }

    /// The running transfer keeps its session until it reports back.
    pub(crate) fn can_disconnect(&self) -> bool {
        self.session.is_connected() && !self.send_form.sending
    }

    pub(crate) fn is_sending(&self) -> bool {
        self.send_form.sending
    }

    pub(crate) fn send_transfer(&mut self) {
        let cmd = BackendCommand::SendTransfer {
            recipient: self.send_form.recipient.clone(),
            amount: self.send_form.amount.clone(),
        };
        if self.queue(cmd) {
            self.send_form.begin();
            self.status = "Waiting for signature and confirmation...".to_string();
        }
    }

    pub(crate) fn process_ui_events(&mut self) {
        while let Ok(event) = self.ui_rx.try_recv() {
            match event {
                UiEvent::Info(message) => {
                    self.status = message;
                }
                UiEvent::ProvidersDiscovered { names, controls } => {
                    self.wallet_names = names;
                    self.connect_controls = Some(controls);
                }
                UiEvent::ChooseWallet { names } => {
                    self.wallet_choice = Some(names);
                }
                UiEvent::ConnectFinished { connected } => {
                    self.connecting = false;
                    self.wallet_choice = None;
                    if !connected && !self.session.is_connected() {
                        self.status = "Not connected".to_string();
                    }
                }
                UiEvent::SessionChanged(snapshot) => {
                    let connected = snapshot.is_connected();
                    self.session = snapshot;
                    self.balance = None;
                    self.history.clear();
                    if connected {
                        self.status = format!(
                            "Connected to {}",
                            self.session.wallet_name.as_deref().unwrap_or("wallet")
                        );
                        self.status_banner = None;
                        self.queue(BackendCommand::LoadHistory);
                    } else {
                        self.status = "Disconnected".to_string();
                        self.last_transfer = None;
                    }
                }
                UiEvent::NetworkChanged(network) => {
                    self.network = network;
                    self.session = SessionSnapshot::default();
                    self.balance = None;
                    self.history.clear();
                    self.last_transfer = None;
                    self.status = format!("Using {}", network.label());
                }
                UiEvent::BalanceUpdated(balance) => {
                    self.balance = Some(balance);
                }
                UiEvent::PriceUpdated(quote) => {
                    self.price = Some(quote);
                }
                UiEvent::TransferConfirmed {
                    signature,
                    explorer_url,
                } => {
                    self.send_form.apply_success();
                    self.status = format!("Transfer confirmed: {signature}");
                    self.status_banner = Some(StatusBanner {
                        severity: StatusBannerSeverity::Success,
                        message: "Transfer confirmed.".to_string(),
                    });
                    self.last_transfer = Some((signature, explorer_url));
                }
                UiEvent::TransferFailed(report) => {
                    if !self.send_form.apply_failure(&report) {
                        let err = UiError::from_report(UiErrorContext::Transfer, &report);
                        self.status = format!("Transfer failed: {}", err.message());
                        self.status_banner = Some(StatusBanner::error(&err));
                    }
                }
                UiEvent::HistoryLoaded(history) => {
                    self.history = history;
                }
                UiEvent::Error(err) => {
                    tracing::warn!(context = ?err.context(), "{}", err.message());
                    self.status = format!("{} error: {}", err_label(err.category()), err.message());
                    self.status_banner = Some(StatusBanner::error(&err));
                }
            }
        }
    }

    fn apply_theme_if_needed(&mut self, ctx: &egui::Context) {
        if self.applied_theme == Some(self.theme) {
            return;
        }
        ctx.set_visuals(self.theme.visuals());
        self.applied_theme = Some(self.theme);
    }

    fn copy_address(&mut self) {
        let Some(account) = self.session.account else {
            return;
        };
        let copied =
            Clipboard::new().and_then(|mut clipboard| clipboard.set_text(account.to_string()));
        match copied {
            Ok(()) => self.status = "Address copied to clipboard".to_string(),
            Err(err) => {
                self.status_banner = Some(StatusBanner::error(&UiError::from_message(
                    UiErrorContext::General,
                    format!("clipboard unavailable: {err}"),
                )));
            }
        }
    }

    fn show_status_banner(&mut self, ui: &mut egui::Ui) {
        if let Some(banner) = self.status_banner.clone() {
            let (fill, stroke) = match banner.severity {
                StatusBannerSeverity::Error => (
                    egui::Color32::from_rgb(111, 53, 53),
                    egui::Stroke::new(1.0, egui::Color32::from_rgb(175, 96, 96)),
                ),
                StatusBannerSeverity::Success => (
                    egui::Color32::from_rgb(38, 92, 62),
                    egui::Stroke::new(1.0, egui::Color32::from_rgb(86, 160, 118)),
                ),
            };

            egui::Frame::NONE
                .fill(fill)
                .stroke(stroke)
                .corner_radius(8.0)
                .inner_margin(egui::Margin::symmetric(10, 8))
                .show(ui, |ui| {
                    ui.horizontal_wrapped(|ui| {
                        ui.label(egui::RichText::new(&banner.message).color(egui::Color32::WHITE));
                        ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                            if ui.button("Dismiss").clicked() {
                                self.status_banner = None;
                            }
                        });
                    });
                });
        }
    }

    fn show_top_bar(&mut self, ctx: &egui::Context) {
        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.heading("Solana Wallet");
                ui.separator();

                let mut selected = self.network;
                ui.add_enabled_ui(!self.send_form.sending && !self.connecting, |ui| {
                    egui::ComboBox::from_id_salt("network_selector")
                        .selected_text(selected.label())
                        .show_ui(ui, |ui| {
                            for network in Network::ALL {
                                ui.selectable_value(&mut selected, network, network.label());
                            }
                        });
                });
                if selected != self.network {
                    self.queue(BackendCommand::SwitchNetwork(selected));
                }

                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.button(self.theme.toggle_label()).clicked() {
                        self.theme = self.theme.toggled();
                    }
                    if self.session.is_connected() {
                        let disconnect = egui::Button::new("Disconnect");
                        if ui.add_enabled(self.can_disconnect(), disconnect).clicked() {
                            self.queue(BackendCommand::Disconnect);
                        }
                    } else {
                        let enabled = self
                            .connect_controls
                            .as_ref()
                            .is_some_and(|controls| controls.enabled)
                            && !self.connecting;
                        let label = if self.connecting {
                            "Connecting..."
                        } else {
                            "Connect wallet"
                        };
                        if ui.add_enabled(enabled, egui::Button::new(label)).clicked()
                            && self.queue(BackendCommand::Connect)
                        {
                            self.connecting = true;
                            self.status_banner = None;
                        }
                    }
                });
            });
        });
    }

    fn show_account(&mut self, ui: &mut egui::Ui) {
        ui.heading("Account");
        if !self.session.is_connected() {
            ui.label(format_address(None));
            let hint = self
                .connect_controls
                .as_ref()
                .and_then(|controls| controls.message);
            if let Some(message) = hint {
                ui.colored_label(egui::Color32::from_rgb(220, 160, 80), message);
                if ui.small_button("Scan again").clicked() {
                    self.queue(BackendCommand::Discover);
                }
            } else if !self.wallet_names.is_empty() {
                ui.small(format!("Available: {}", self.wallet_names.join(", ")));
            }
            return;
        }

        ui.horizontal(|ui| {
            ui.label(
                egui::RichText::new(format_address(self.session.account.as_ref())).monospace(),
            );
            if ui.small_button("Copy address").clicked() {
                self.copy_address();
            }
            if let Some(account) = &self.session.account {
                ui.hyperlink_to("Explorer", self.network.explorer_account_url(account));
            }
        });
        if let Some(name) = &self.session.wallet_name {
            ui.small(format!("via {name}"));
        }

        ui.add_space(6.0);
        ui.horizontal(|ui| match self.balance {
            Some(balance) => {
                ui.label(egui::RichText::new(convert::format_sol_balance(balance)).strong());
                ui.label(convert::format_fiat_balance(balance, self.price.as_ref()));
            }
            None => {
                ui.spinner();
                ui.label("Loading balance...");
            }
        });
        if ui.small_button("Refresh balance").clicked() {
            self.queue(BackendCommand::RefreshBalance);
        }
    }

    fn show_price(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            match &self.price {
                Some(quote) => {
                    ui.label(format!("1 SOL = ${:.2} USD", quote.usd_per_sol));
                    ui.small(format!(
                        "updated {}",
                        quote.fetched_at.with_timezone(&Local).format("%H:%M:%S")
                    ));
                }
                None => {
                    ui.label(convert::PRICE_LOADING_LABEL);
                }
            }
            if ui.small_button("Refresh").clicked() {
                self.queue(BackendCommand::RefreshPrice);
            }
        });

        egui::CollapsingHeader::new("Converter").show(ui, |ui| {
            egui::Grid::new("converter_grid").num_columns(2).show(ui, |ui| {
                ui.label("USD");
                if ui
                    .text_edit_singleline(&mut self.converter.fiat_input)
                    .changed()
                {
                    self.converter.fiat_edited(self.price.as_ref());
                }
                ui.end_row();
                ui.label("SOL");
                if ui
                    .text_edit_singleline(&mut self.converter.sol_input)
                    .changed()
                {
                    self.converter.sol_edited(self.price.as_ref());
                }
                ui.end_row();
            });
            if ui
                .add_enabled(
                    !self.converter.sol_input.is_empty(),
                    egui::Button::new("Use as amount"),
                )
                .clicked()
            {
                self.send_form.amount = self.converter.sol_input.clone();
            }
        });
    }

    fn show_send_form(&mut self, ui: &mut egui::Ui) {
        ui.heading("Send SOL");
        let enabled = self.session.is_connected() && !self.send_form.sending;
        ui.add_enabled_ui(enabled, |ui| {
            ui.label("Recipient");
            ui.add(
                egui::TextEdit::singleline(&mut self.send_form.recipient)
                    .hint_text("Recipient address")
                    .desired_width(f32::INFINITY),
            );
            if let Some(err) = &self.send_form.recipient_error {
                ui.colored_label(egui::Color32::from_rgb(230, 110, 110), err);
            }
            ui.label("Amount (SOL)");
            ui.add(egui::TextEdit::singleline(&mut self.send_form.amount).hint_text("0.1"));
            if let Some(err) = &self.send_form.amount_error {
                ui.colored_label(egui::Color32::from_rgb(230, 110, 110), err);
            }
        });

        ui.horizontal(|ui| {
            if ui.add_enabled(enabled, egui::Button::new("Send")).clicked() {
                self.send_transfer();
            }
            if self.send_form.sending {
                ui.spinner();
                ui.label("Sending...");
            }
        });

        if let Some((signature, explorer_url)) = &self.last_transfer {
            ui.horizontal(|ui| {
                ui.label("Last transfer:");
                ui.hyperlink_to(format_signature(signature), explorer_url);
            });
        }
    }

    fn show_history(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Recent activity");
            if ui
                .add_enabled(self.session.is_connected(), egui::Button::new("Reload"))
                .clicked()
            {
                self.queue(BackendCommand::LoadHistory);
            }
        });
        if self.history.is_empty() {
            ui.small("No transactions yet.");
            return;
        }
        egui::ScrollArea::vertical().max_height(220.0).show(ui, |ui| {
            for entry in &self.history {
                ui.horizontal(|ui| {
                    let (marker, color) = if entry.succeeded {
                        ("ok", egui::Color32::from_rgb(90, 190, 120))
                    } else {
                        ("failed", egui::Color32::from_rgb(230, 110, 110))
                    };
                    ui.colored_label(color, marker);
                    ui.hyperlink_to(
                        format_signature(&entry.signature),
                        self.network.explorer_tx_url(&entry.signature),
                    );
                    let when = entry
                        .block_time
                        .map(|time| time.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string())
                        .unwrap_or_else(|| format!("slot {}", entry.slot));
                    ui.small(when);
                    if let Some(memo) = &entry.memo {
                        ui.small(memo);
                    }
                });
            }
        });
    }

    fn show_wallet_choice(&mut self, ctx: &egui::Context) {
        let Some(names) = self.wallet_choice.clone() else {
            return;
        };
        let mut choice = None;
        let mut cancelled = false;
        egui::Window::new("Choose a wallet")
            .collapsible(false)
            .resizable(false)
            .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
            .show(ctx, |ui| {
                for (index, name) in names.iter().enumerate() {
                    if ui
                        .add_sized([220.0, 28.0], egui::Button::new(name.as_str()))
                        .clicked()
                    {
                        choice = Some(index);
                    }
                }
                ui.separator();
                if ui.button("Cancel").clicked() {
                    cancelled = true;
                }
            });
        if choice.is_some() || cancelled {
            self.wallet_choice = None;
            self.queue(BackendCommand::ChooseWallet(choice));
        }
    }
}

fn format_signature(signature: &Signature) -> String {
    let full = signature.to_string();
    match (full.get(..8), full.get(full.len().saturating_sub(8)..)) {
        (Some(head), Some(tail)) if full.len() > 16 => format!("{head}...{tail}"),
        _ => full,
    }
}

impl eframe::App for WalletGuiApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.process_ui_events();
        self.apply_theme_if_needed(ctx);

        self.show_top_bar(ctx);
        egui::TopBottomPanel::bottom("status_bar").show(ctx, |ui| {
            ui.small(&self.status);
        });
        egui::CentralPanel::default().show(ctx, |ui| {
            self.show_status_banner(ui);
            egui::ScrollArea::vertical().show(ui, |ui| {
                self.show_account(ui);
                ui.separator();
                self.show_price(ui);
                ui.separator();
                self.show_send_form(ui);
                ui.separator();
                self.show_history(ui);
            });
        });
        self.show_wallet_choice(ctx);

        let busy = self.connecting || self.is_sending();
        ctx.request_repaint_after(std::time::Duration::from_millis(if busy { 50 } else { 250 }));
    }

    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        let settings = PersistedWalletSettings { theme: self.theme };
        if let Ok(serialized) = serde_json::to_string(&settings) {
            storage.set_string(SETTINGS_STORAGE_KEY, serialized);
        }
    }
}
