//! Signing backends.
//!
//! A transfer is signed either by an external wallet over TON Connect or by
//! a key held in this process. Both sit behind [`SigningBackend`] and
//! serialize their own submissions, so two transfers from one backend never
//! race for the same seqno or open two wallet prompts at once.

use std::fmt;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use ton_cell::{Address, AddressFlags, BagOfCells};
use ton_crypto::Ed25519Keypair;
use ton_wallet::{Mnemonic, TON_DECIMALS, Transfer, Wallet, WalletV4R2, format_units};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::chain::ChainClient;
use crate::config::Network;
use crate::connector::{SendTransactionRequest, TransactionMessage, WalletConnector};
use crate::error::{BackendError, BackendResult};
use crate::payload::Payload;

/// One outgoing internal message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMessage {
    pub destination: Address,
    /// Nanotons.
    pub amount: u128,
    pub payload: Option<Payload>,
    pub bounce: bool,
}

/// Hex hash of the submitted external message cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TransactionHash(String);

impl TransactionHash {
    pub fn from_cell_hash(hash: [u8; 32]) -> Self {
        Self(hex::encode(hash))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for TransactionHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn valid_until(validity: Duration) -> u64 {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default();
    (now + validity).as_secs()
}

/// The two ways a transfer can be signed.
#[derive(Debug)]
pub enum SigningBackend {
    External(ExternalWalletBackend),
    Local(LocalKeyBackend),
}

impl SigningBackend {
    pub fn kind(&self) -> &'static str {
        match self {
            SigningBackend::External(_) => "external",
            SigningBackend::Local(_) => "local",
        }
    }

    /// Address transfers are sent from. `None` while an external wallet is
    /// not connected.
    pub fn address(&self) -> Option<Address> {
        match self {
            SigningBackend::External(backend) => backend.address(),
            SigningBackend::Local(backend) => Some(backend.address()),
        }
    }

    /// Native balance, or the jetton balance held in `token_contract` (the
    /// owner's jetton wallet).
    pub async fn balance(&self, token_contract: Option<&Address>) -> BackendResult<u128> {
        let owner = self.address().ok_or(BackendError::NotConnected)?;
        let chain = match self {
            SigningBackend::External(backend) => &backend.chain,
            SigningBackend::Local(backend) => &backend.chain,
        };

        match token_contract {
            None => {
                let balance = chain
                    .balance(&owner)
                    .await
                    .map_err(|e| BackendError::Balance(e.to_string()))?;
                debug!(owner = %owner, ton = %format_units(balance, TON_DECIMALS), "Fetched balance");
                Ok(balance)
            }
            Some(jetton_wallet) => {
                let data = chain
                    .jetton_wallet_data(jetton_wallet)
                    .await
                    .map_err(|e| BackendError::Balance(e.to_string()))?;
                if data.owner != owner {
                    return Err(BackendError::Balance(format!(
                        "jetton wallet {jetton_wallet} belongs to {}",
                        data.owner
                    )));
                }
                Ok(data.balance)
            }
        }
    }

    pub async fn sign_and_submit(&self, message: OutgoingMessage) -> BackendResult<TransactionHash> {
        match self {
            SigningBackend::External(backend) => backend.sign_and_submit(message).await,
            SigningBackend::Local(backend) => backend.sign_and_submit(message).await,
        }
    }

    pub fn is_available(&self) -> bool {
        match self {
            SigningBackend::External(backend) => backend.address().is_some(),
            SigningBackend::Local(_) => true,
        }
    }

    /// Drop any external wallet connection. Local keys have none.
    pub async fn release(&self) {
        if let SigningBackend::External(backend) = self {
            backend.release().await;
        }
    }
}

/// Signs through a wallet app connected over TON Connect.
pub struct ExternalWalletBackend {
    connector: Arc<dyn WalletConnector>,
    chain: Arc<dyn ChainClient>,
    network: Network,
    validity: Duration,
    submit_lock: Mutex<()>,
}

impl ExternalWalletBackend {
    pub fn new(
        connector: Arc<dyn WalletConnector>,
        chain: Arc<dyn ChainClient>,
        network: Network,
        validity: Duration,
    ) -> Self {
        Self {
            connector,
            chain,
            network,
            validity,
            submit_lock: Mutex::new(()),
        }
    }

    pub fn address(&self) -> Option<Address> {
        let account = self.connector.account()?;
        match account.parsed_address() {
            Ok(address) => Some(address),
            Err(e) => {
                warn!(error = %e, "Connected wallet reported an unusable address");
                None
            }
        }
    }

    fn build_request(&self, from: &Address, message: &OutgoingMessage) -> BackendResult<SendTransactionRequest> {
        let payload = match &message.payload {
            Some(payload) => Some(
                payload
                    .to_boc_base64()
                    .map_err(|e| BackendError::Transport(e.to_string()))?,
            ),
            None => None,
        };
        let flags = AddressFlags::new(message.bounce, self.network.is_testnet());
        Ok(SendTransactionRequest {
            valid_until: valid_until(self.validity),
            network: self.network.chain_id().to_string(),
            from: from.to_raw(),
            messages: vec![TransactionMessage {
                address: message.destination.to_friendly(flags),
                amount: message.amount.to_string(),
                payload,
            }],
        })
    }

    pub async fn sign_and_submit(&self, message: OutgoingMessage) -> BackendResult<TransactionHash> {
        let _guard = self.submit_lock.lock().await;
        let from = self.address().ok_or(BackendError::NotConnected)?;
        let request = self.build_request(&from, &message)?;

        debug!(
            from = %from,
            to = %message.destination,
            amount = %message.amount,
            "Requesting wallet signature"
        );
        let response = self.connector.send_transaction(request).await?;

        let boc = BagOfCells::deserialize_from_base64(&response.boc).map_err(|e| {
            BackendError::Transport(format!("wallet returned an unreadable BoC: {e}"))
        })?;
        let root = boc
            .single_root()
            .map_err(|e| BackendError::Transport(format!("wallet returned an unreadable BoC: {e}")))?;
        let hash = TransactionHash::from_cell_hash(root.hash());
        info!(hash = %hash, "Wallet submitted transaction");
        Ok(hash)
    }

    pub async fn release(&self) {
        if let Err(e) = self.connector.disconnect().await {
            warn!(error = %e, "Wallet disconnect failed");
        }
    }
}

impl fmt::Debug for ExternalWalletBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExternalWalletBackend")
            .field("network", &self.network)
            .field("address", &self.address().map(|a| a.to_raw()))
            .finish_non_exhaustive()
    }
}

/// Signs with a V4R2 wallet key held in memory.
pub struct LocalKeyBackend {
    wallet: WalletV4R2,
    chain: Arc<dyn ChainClient>,
    validity: Duration,
    submit_lock: Mutex<()>,
}

impl LocalKeyBackend {
    pub fn new(
        keypair: Ed25519Keypair,
        workchain: i8,
        chain: Arc<dyn ChainClient>,
        validity: Duration,
    ) -> BackendResult<Self> {
        let wallet = WalletV4R2::new(keypair, workchain)?;
        Ok(Self {
            wallet,
            chain,
            validity,
            submit_lock: Mutex::new(()),
        })
    }

    /// Derive the key from a 24-word phrase, for a basechain wallet.
    pub fn from_mnemonic(
        phrase: &str,
        chain: Arc<dyn ChainClient>,
        validity: Duration,
    ) -> BackendResult<Self> {
        let mnemonic = Mnemonic::from_phrase(phrase)?;
        Self::new(mnemonic.to_keypair(), 0, chain, validity)
    }

    pub fn address(&self) -> Address {
        *self.wallet.address()
    }

    pub fn public_key(&self) -> &[u8; 32] {
        self.wallet.public_key()
    }

    pub fn keypair(&self) -> &Ed25519Keypair {
        self.wallet.keypair()
    }

    pub async fn sign_and_submit(&self, message: OutgoingMessage) -> BackendResult<TransactionHash> {
        let _guard = self.submit_lock.lock().await;
        let address = self.address();

        let seqno = self
            .chain
            .seqno(&address)
            .await
            .map_err(|e| BackendError::SequenceFetch(e.to_string()))?;

        let mut transfer = Transfer::new(message.destination, message.amount)
            .with_bounce(message.bounce);
        if let Some(payload) = &message.payload {
            transfer = transfer.with_payload(payload.cell().clone());
        }

        let valid_until = u32::try_from(valid_until(self.validity)).unwrap_or(u32::MAX);
        let external = self
            .wallet
            .create_signed_transfer(seqno, &[transfer], valid_until)?;
        let boc = BagOfCells::from_root(external.clone()).serialize()?;

        debug!(from = %address, seqno, bytes = boc.len(), "Submitting signed transfer");
        self.chain
            .send_boc(&boc)
            .await
            .map_err(|e| BackendError::Submission(e.to_string()))?;

        let hash = TransactionHash::from_cell_hash(external.hash());
        info!(hash = %hash, seqno, "Transfer submitted");
        Ok(hash)
    }
}

impl fmt::Debug for LocalKeyBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocalKeyBackend")
            .field("address", &self.address().to_raw())
            .finish_non_exhaustive()
    }
}
