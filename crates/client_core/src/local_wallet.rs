//! Native wallet backed by a Solana CLI keypair file on disk.

use std::{
    fs,
    path::Path,
    sync::atomic::{AtomicBool, Ordering},
};

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use ed25519_dalek::{Signer, SigningKey};
use ledger_rpc::Transaction;
use shared::domain::{Address, Signature};
use tracing::info;
use zeroize::Zeroize;

use crate::signer::{ConnectOptions, NativeBrand, NativeWallet, WalletError};

const KEYPAIR_LEN: usize = 64;

pub struct LocalKeypairWallet {
    signing_key: SigningKey,
    address: Address,
    trusted: bool,
    connected: AtomicBool,
}

impl LocalKeypairWallet {
    pub fn from_secret_key(secret: [u8; 32]) -> Self {
        let signing_key = SigningKey::from_bytes(&secret);
        let address = Address::new(signing_key.verifying_key().to_bytes());
        Self {
            signing_key,
            address,
            trusted: false,
            connected: AtomicBool::new(false),
        }
    }

    /// 64 bytes: secret key followed by the public key it derives.
    pub fn from_keypair_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != KEYPAIR_LEN {
            return Err(anyhow!(
                "keypair must be {KEYPAIR_LEN} bytes, got {}",
                bytes.len()
            ));
        }
        let mut secret = [0u8; 32];
        secret.copy_from_slice(&bytes[..32]);
        let wallet = Self::from_secret_key(secret);
        secret.zeroize();
        if wallet.address.as_bytes()[..] != bytes[32..] {
            return Err(anyhow!("keypair public key does not match its secret key"));
        }
        Ok(wallet)
    }

    /// Reads the JSON byte-array format written by `solana-keygen`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let mut raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read keypair file '{}'", path.display()))?;
        let parsed = serde_json::from_str::<Vec<u8>>(&raw);
        raw.zeroize();
        let mut bytes = parsed.with_context(|| {
            format!("keypair file '{}' is not a JSON byte array", path.display())
        })?;
        let wallet = Self::from_keypair_bytes(&bytes);
        bytes.zeroize();
        wallet
    }

    /// Trusted wallets accept silent (no prompt) connections.
    pub fn trusted(mut self, trusted: bool) -> Self {
        self.trusted = trusted;
        self
    }

    pub fn address(&self) -> Address {
        self.address
    }

    fn ensure_connected(&self) -> Result<(), WalletError> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(WalletError::NotConnected)
        }
    }
}

#[async_trait]
impl NativeWallet for LocalKeypairWallet {
    fn brand(&self) -> NativeBrand {
        NativeBrand::Unrecognized
    }

    async fn connect(&self, options: ConnectOptions) -> Result<(), WalletError> {
        if options.only_if_trusted && !self.trusted {
            return Err(WalletError::UserRejected);
        }
        self.connected.store(true, Ordering::Release);
        info!(address = %self.address, "local keypair unlocked");
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), WalletError> {
        self.connected.store(false, Ordering::Release);
        Ok(())
    }

    fn public_key(&self) -> Option<Address> {
        self.connected
            .load(Ordering::Acquire)
            .then_some(self.address)
    }

    async fn sign_transaction(
        &self,
        mut transaction: Transaction,
    ) -> Result<Transaction, WalletError> {
        self.ensure_connected()?;
        let signature = self.signing_key.sign(&transaction.message_data());
        transaction.add_signature(&self.address, Signature::new(signature.to_bytes()))?;
        Ok(transaction)
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, WalletError> {
        self.ensure_connected()?;
        Ok(Signature::new(self.signing_key.sign(message).to_bytes()))
    }
}
