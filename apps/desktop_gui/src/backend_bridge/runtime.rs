//! Backend worker: owns the tokio runtime and the wallet controller, executes queued
//! commands and forwards controller events to the UI.

use std::{sync::Arc, thread};

use async_trait::async_trait;
use client_core::{
    load_settings, price::PriceRefreshTask, spawn_price_refresh, ClientEvent, HostEnvironment,
    Settings, StaticHostEnvironment, WalletChooser, WalletController, WalletOption,
};
use crossbeam_channel::{Receiver, Sender};
use shared::domain::Network;
use tokio::{
    sync::{oneshot, Mutex},
    task::JoinHandle,
};

use crate::backend_bridge::commands::BackendCommand;
use crate::controller::events::{UiError, UiErrorContext, UiEvent};

/// Forwards the choice to the UI and waits for its `ChooseWallet` answer.
struct UiWalletChooser {
    ui_tx: Sender<UiEvent>,
    pending: Mutex<Option<oneshot::Sender<Option<usize>>>>,
}

impl UiWalletChooser {
    async fn answer(&self, choice: Option<usize>) {
        match self.pending.lock().await.take() {
            Some(reply) => {
                let _ = reply.send(choice);
            }
            None => tracing::debug!(?choice, "wallet choice arrived with no pending selection"),
        }
    }
}

#[async_trait]
impl WalletChooser for UiWalletChooser {
    async fn choose(&self, options: &[WalletOption]) -> Option<usize> {
        let (reply, answer) = oneshot::channel();
        *self.pending.lock().await = Some(reply);
        let names = options
            .iter()
            .map(|option| option.display_name.clone())
            .collect();
        if self.ui_tx.try_send(UiEvent::ChooseWallet { names }).is_err() {
            self.pending.lock().await.take();
            return None;
        }
        answer.await.ok().flatten()
    }
}

fn forward_event(event: ClientEvent) -> UiEvent {
    match event {
        ClientEvent::ProvidersDiscovered { names, controls } => {
            UiEvent::ProvidersDiscovered { names, controls }
        }
        ClientEvent::SessionChanged(snapshot) => UiEvent::SessionChanged(snapshot),
        ClientEvent::BalanceUpdated { balance, .. } => UiEvent::BalanceUpdated(balance),
        ClientEvent::PriceUpdated(quote) => UiEvent::PriceUpdated(quote),
        ClientEvent::TransferConfirmed {
            signature,
            explorer_url,
        } => UiEvent::TransferConfirmed {
            signature,
            explorer_url,
        },
        ClientEvent::TransferFailed(report) => UiEvent::TransferFailed(report),
        ClientEvent::Error(report) => {
            UiEvent::Error(UiError::from_report(UiErrorContext::Connect, &report))
        }
    }
}

/// One controller per network, with its event forwarder and price ticker.
struct NetworkSession {
    controller: Arc<WalletController>,
    event_task: JoinHandle<()>,
    _price_task: PriceRefreshTask,
}

impl NetworkSession {
    fn start(
        settings: &Settings,
        host: Arc<dyn HostEnvironment>,
        ui_tx: &Sender<UiEvent>,
    ) -> Self {
        let controller = WalletController::new(settings, host);
        let mut events = controller.subscribe_events();
        let ui_tx = ui_tx.clone();
        let event_task = tokio::spawn(async move {
            while let Ok(event) = events.recv().await {
                let _ = ui_tx.try_send(forward_event(event));
            }
        });
        let price_task = spawn_price_refresh(controller.clone(), settings.price_refresh_interval());
        Self {
            controller,
            event_task,
            _price_task: price_task,
        }
    }
}

impl Drop for NetworkSession {
    fn drop(&mut self) {
        self.event_task.abort();
    }
}

fn startup_settings(ui_tx: &Sender<UiEvent>) -> Settings {
    match load_settings() {
        Ok(settings) => settings,
        Err(err) => {
            tracing::error!("failed to load settings, using defaults: {err}");
            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                UiErrorContext::BackendStartup,
                format!("settings could not be loaded, defaults in use: {err}"),
            )));
            Settings::default()
        }
    }
}

fn startup_host(settings: &Settings, ui_tx: &Sender<UiEvent>) -> Arc<dyn HostEnvironment> {
    match StaticHostEnvironment::from_settings(settings) {
        Ok(host) => Arc::new(host),
        Err(err) => {
            tracing::error!("failed to assemble wallet host: {err:#}");
            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                UiErrorContext::BackendStartup,
                format!("{err:#}"),
            )));
            Arc::new(StaticHostEnvironment::new())
        }
    }
}

async fn load_history(controller: Arc<WalletController>, limit: usize, ui_tx: Sender<UiEvent>) {
    match controller.recent_transactions(limit).await {
        Ok(history) => {
            let _ = ui_tx.try_send(UiEvent::HistoryLoaded(history));
        }
        Err(err) => {
            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                UiErrorContext::History,
                err.to_string(),
            )));
        }
    }
}

async fn switch_network(
    current: NetworkSession,
    settings: &mut Settings,
    network: Network,
    host: Arc<dyn HostEnvironment>,
    ui_tx: &Sender<UiEvent>,
) -> NetworkSession {
    let was_connected = current.controller.session().await.is_connected();
    current.controller.disconnect().await;
    drop(current);

    settings.network = network;
    // a custom endpoint belongs to the network it was configured for
    settings.rpc_url = None;
    let next = NetworkSession::start(settings, host, ui_tx);
    tracing::info!(network = %network, "switched network");
    let _ = ui_tx.try_send(UiEvent::NetworkChanged(network));
    next.controller.discover();
    if was_connected {
        next.controller.auto_reconnect().await;
    }
    next
}

pub fn spawn_backend_thread(cmd_rx: Receiver<BackendCommand>, ui_tx: Sender<UiEvent>) {
    thread::spawn(move || {
        let _ = ui_tx.try_send(UiEvent::Info("Backend worker starting...".to_string()));
        let runtime = match tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
        {
            Ok(runtime) => runtime,
            Err(err) => {
                let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                    UiErrorContext::BackendStartup,
                    format!("backend worker startup failure: failed to build runtime: {err}"),
                )));
                tracing::error!("failed to build backend runtime: {err}");
                return;
            }
        };

        runtime.block_on(async move {
            let mut settings = startup_settings(&ui_tx);
            let host = startup_host(&settings, &ui_tx);
            let chooser = Arc::new(UiWalletChooser {
                ui_tx: ui_tx.clone(),
                pending: Mutex::new(None),
            });

            let mut session = NetworkSession::start(&settings, host.clone(), &ui_tx);
            let _ = ui_tx.try_send(UiEvent::NetworkChanged(settings.network));
            session.controller.discover();
            if let Some(snapshot) = session.controller.auto_reconnect().await {
                tracing::info!(wallet = ?snapshot.wallet_name, "restored trusted wallet session");
            }
            let _ = ui_tx.try_send(UiEvent::Info("Backend worker ready".to_string()));

            // blocking recv keeps the command order; long operations run as tasks so a
            // pending wallet choice can still be answered
            while let Ok(cmd) = cmd_rx.recv() {
                let controller = session.controller.clone();
                match cmd {
                    BackendCommand::Discover => {
                        controller.discover();
                    }
                    BackendCommand::Connect => {
                        let chooser = chooser.clone();
                        let ui_tx = ui_tx.clone();
                        tokio::spawn(async move {
                            let connected = controller.connect(chooser.as_ref()).await.is_ok();
                            let _ = ui_tx.try_send(UiEvent::ConnectFinished { connected });
                        });
                    }
                    BackendCommand::ChooseWallet(choice) => chooser.answer(choice).await,
                    BackendCommand::Disconnect => {
                        if !controller.disconnect().await {
                            tracing::debug!("disconnect requested with no active session");
                        }
                    }
                    BackendCommand::SwitchNetwork(network) => {
                        if network != settings.network {
                            let host = host.clone();
                            session =
                                switch_network(session, &mut settings, network, host, &ui_tx).await;
                        }
                    }
                    BackendCommand::RefreshBalance => {
                        if let Err(err) = controller.refresh_balance().await {
                            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                                UiErrorContext::Balance,
                                err.to_string(),
                            )));
                        }
                    }
                    BackendCommand::RefreshPrice => {
                        if let Err(err) = controller.refresh_price().await {
                            let _ = ui_tx.try_send(UiEvent::Error(UiError::from_message(
                                UiErrorContext::Price,
                                format!("{err:#}"),
                            )));
                        }
                    }
                    BackendCommand::SendTransfer { recipient, amount } => {
                        let history_limit = settings.history_limit;
                        let ui_tx = ui_tx.clone();
                        tokio::spawn(async move {
                            // outcome reaches the UI through the controller's events
                            if controller.submit_transfer(&recipient, &amount).await.is_success() {
                                load_history(controller, history_limit, ui_tx).await;
                            }
                        });
                    }
                    BackendCommand::LoadHistory => {
                        let ui_tx = ui_tx.clone();
                        tokio::spawn(load_history(controller, settings.history_limit, ui_tx));
                    }
                }
            }
            tracing::info!("ui command channel closed; backend worker exiting");
        });
    });
}
