use std::{env, fs, sync::Arc, time::{SystemTime, UNIX_EPOCH}};

use anyhow::Result;
use axum::{extract::State, routing::post, Json, Router};
use ed25519_dalek::{Signature as DalekSignature, SigningKey, Verifier};
use ledger_rpc::{system_transfer, Message, Transaction};
use serde_json::{json, Value};
use shared::domain::{Address, Blockhash, Lamports};
use tokio::{net::TcpListener, sync::Mutex};

use shared::domain::WalletKind;

use crate::{
    bridge_http::HttpBridgeHost,
    config::Settings,
    local_wallet::LocalKeypairWallet,
    provider::{discover_providers, StaticHostEnvironment, BRIDGED_OPTION_LABEL},
    signer::{BridgeHost, ConnectOptions, NativeWallet, WalletError},
};

const SECRET: [u8; 32] = [11u8; 32];

fn keypair_bytes() -> Vec<u8> {
    let signing_key = SigningKey::from_bytes(&SECRET);
    let mut bytes = SECRET.to_vec();
    bytes.extend_from_slice(&signing_key.verifying_key().to_bytes());
    bytes
}

#[tokio::test]
async fn local_wallet_signs_transfer_verifiably() {
    let wallet = LocalKeypairWallet::from_keypair_bytes(&keypair_bytes()).expect("keypair");
    let payer = wallet.address();
    assert_eq!(wallet.public_key(), None);

    let message = Message::new(
        &[system_transfer(&payer, &Address::new([2u8; 32]), Lamports(10))],
        &payer,
        Blockhash::new([3u8; 32]),
    )
    .expect("message");
    let unsigned = Transaction::new_unsigned(message);
    assert!(matches!(
        wallet.sign_transaction(unsigned.clone()).await,
        Err(WalletError::NotConnected)
    ));

    wallet.connect(ConnectOptions::default()).await.expect("connect");
    assert_eq!(wallet.public_key(), Some(payer));
    let signed = wallet.sign_transaction(unsigned).await.expect("signed");
    assert!(signed.is_fully_signed());

    let verifying_key = SigningKey::from_bytes(&SECRET).verifying_key();
    let signature = DalekSignature::from_bytes(signed.signatures[0].as_bytes());
    verifying_key
        .verify(&signed.message_data(), &signature)
        .expect("valid signature");

    wallet.disconnect().await.expect("disconnect");
    assert_eq!(wallet.public_key(), None);
}

#[tokio::test]
async fn local_wallet_silent_connect_needs_trust() {
    let untrusted = LocalKeypairWallet::from_secret_key(SECRET);
    let err = untrusted
        .connect(ConnectOptions {
            only_if_trusted: true,
        })
        .await
        .expect_err("untrusted");
    assert!(err.is_user_rejection());

    let trusted = LocalKeypairWallet::from_secret_key(SECRET).trusted(true);
    trusted
        .connect(ConnectOptions {
            only_if_trusted: true,
        })
        .await
        .expect("trusted");
}

#[test]
fn reads_solana_cli_keypair_file() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("wallet_keypair_test_{suffix}.json"));
    fs::write(&path, serde_json::to_string(&keypair_bytes()).expect("json")).expect("write");

    let wallet = LocalKeypairWallet::from_json_file(&path).expect("keypair file");
    assert_eq!(
        wallet.address(),
        Address::new(SigningKey::from_bytes(&SECRET).verifying_key().to_bytes())
    );
    fs::remove_file(&path).expect("cleanup");

    let mut mismatched = keypair_bytes();
    mismatched[40] ^= 0xff;
    assert!(LocalKeypairWallet::from_keypair_bytes(&mismatched).is_err());
    assert!(LocalKeypairWallet::from_keypair_bytes(&[0u8; 10]).is_err());
}

#[derive(Clone, Default)]
struct BridgeServer {
    requests: Arc<Mutex<Vec<Value>>>,
}

async fn handle_bridge(
    State(state): State<BridgeServer>,
    Json(request): Json<Value>,
) -> Json<Value> {
    state.requests.lock().await.push(request.clone());
    let result = match request["method"].as_str().unwrap_or_default() {
        "eth_requestAccounts" => json!({"result": ["0xabc"]}),
        "wallet_requestSnaps" => json!({"result": {"npm:test-snap": {"enabled": true}}}),
        "wallet_invokeSnap" => match request["params"]["request"]["method"].as_str() {
            Some("connect") => {
                json!({"result": {"publicKey": Address::new([5u8; 32]).to_string()}})
            }
            _ => json!({"error": {"code": 4001, "message": "User rejected the request."}}),
        },
        _ => json!({"error": {"code": -32601, "message": "method not found"}}),
    };
    let mut body = result;
    body["jsonrpc"] = json!("2.0");
    body["id"] = request["id"].clone();
    Json(body)
}

async fn spawn_bridge(state: BridgeServer) -> Result<String> {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let app = Router::new().route("/", post(handle_bridge)).with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    Ok(format!("http://{addr}/"))
}

#[tokio::test]
async fn http_bridge_speaks_snap_json_rpc() {
    let state = BridgeServer::default();
    let endpoint = spawn_bridge(state.clone()).await.expect("spawn bridge");
    let host = HttpBridgeHost::metamask(endpoint);
    assert!(host.is_recognized_bridge());

    assert_eq!(host.request_accounts().await.expect("accounts"), vec!["0xabc"]);
    let installed = host.request_snap("npm:test-snap").await.expect("snaps");
    assert!(installed.get("npm:test-snap").is_some());
    let connected = host
        .invoke_snap("npm:test-snap", "connect", json!({}))
        .await
        .expect("connect");
    assert_eq!(connected["publicKey"], Address::new([5u8; 32]).to_string());

    let err = host
        .invoke_snap("npm:test-snap", "signTransaction", json!({"message": ""}))
        .await
        .expect_err("rejected");
    assert!(err.is_user_rejection());

    let requests = state.requests.lock().await;
    assert_eq!(requests[1]["params"]["npm:test-snap"], json!({}));
    assert_eq!(requests[2]["params"]["snapId"], "npm:test-snap");
    assert!(requests[0]["id"].as_str().is_some_and(|id| !id.is_empty()));
}

#[test]
fn generic_bridge_is_not_recognized() {
    assert!(!HttpBridgeHost::generic("http://127.0.0.1:1/").is_recognized_bridge());
}

#[test]
fn desktop_host_offers_configured_keypair_and_bridge() {
    let suffix = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("clock")
        .as_nanos();
    let path = env::temp_dir().join(format!("wallet_host_test_{suffix}.json"));
    fs::write(&path, serde_json::to_string(&keypair_bytes()).expect("json")).expect("write");

    let settings = Settings {
        keypair_path: Some(path.clone()),
        keypair_trusted: true,
        bridge_url: Some("http://127.0.0.1:1/".into()),
        ..Settings::default()
    };
    let host = StaticHostEnvironment::from_settings(&settings).expect("host");
    fs::remove_file(&path).expect("cleanup");

    let options = discover_providers(&host);
    assert_eq!(options.len(), 2);
    assert_eq!(options[0].display_name, "Solana Wallet");
    assert_eq!(options[0].kind(), WalletKind::NativeSigner);
    assert_eq!(options[1].display_name, BRIDGED_OPTION_LABEL);

    let empty = StaticHostEnvironment::from_settings(&Settings::default()).expect("empty host");
    assert!(discover_providers(&empty).is_empty());

    let missing = Settings {
        keypair_path: Some(env::temp_dir().join("definitely-missing-keypair.json")),
        ..Settings::default()
    };
    assert!(StaticHostEnvironment::from_settings(&missing).is_err());
}
