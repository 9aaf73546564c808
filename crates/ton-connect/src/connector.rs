//! External wallet connection.
//!
//! The TON Connect bridge itself lives outside this crate. [`WalletConnector`]
//! is the seam: connect-request parameters go in, connection events and
//! signed messages come out.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;
use ton_cell::Address;

use crate::error::{AuthError, AuthResult, ConnectorError};
use crate::proof::TonProof;

/// What the wallet will be asked to sign when it connects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum ConnectRequestParameters {
    /// A nonce is being fetched.
    Loading,
    Ready {
        #[serde(rename = "tonProof")]
        ton_proof: String,
    },
}

/// `account` of a wallet connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    /// Raw `wc:hex` address.
    pub address: String,
    /// Hex Ed25519 public key.
    #[serde(rename = "publicKey", default)]
    pub public_key: Option<String>,
    /// `-239` or `-3`.
    pub chain: String,
    #[serde(rename = "walletStateInit", default)]
    pub wallet_state_init: Option<String>,
}

impl Account {
    pub fn parsed_address(&self) -> AuthResult<Address> {
        Address::parse(&self.address)
            .map_err(|e| AuthError::StructuralProof(format!("account address: {e}")))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum WalletEvent {
    /// The wallet connection object as delivered by the bridge.
    Connected(Value),
    Disconnected,
}

/// A connection object whose account and proof have the expected shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectedWallet {
    pub account: Account,
    pub proof: TonProof,
}

/// Extract `account` and `connectItems.tonProof.proof` from a connection
/// object.
pub fn parse_connection(connection: &Value) -> AuthResult<ConnectedWallet> {
    let object = connection
        .as_object()
        .ok_or_else(|| AuthError::StructuralProof("connection is not an object".into()))?;

    let account = object
        .get("account")
        .ok_or_else(|| AuthError::StructuralProof("missing account".into()))?;
    let account: Account = serde_json::from_value(account.clone())
        .map_err(|e| AuthError::StructuralProof(format!("account: {e}")))?;

    let ton_proof = object
        .get("connectItems")
        .and_then(|items| items.get("tonProof"))
        .ok_or_else(|| AuthError::StructuralProof("missing connectItems.tonProof".into()))?;
    if let Some(error) = ton_proof.get("error") {
        return Err(AuthError::StructuralProof(format!(
            "wallet did not produce a proof: {error}"
        )));
    }
    let proof = ton_proof
        .get("proof")
        .filter(|proof| proof.is_object())
        .ok_or_else(|| AuthError::StructuralProof("missing tonProof.proof".into()))?;
    let proof: TonProof = serde_json::from_value(proof.clone())
        .map_err(|e| AuthError::StructuralProof(format!("proof: {e}")))?;

    Ok(ConnectedWallet { account, proof })
}

/// One message of a `sendTransaction` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionMessage {
    /// User-friendly destination.
    pub address: String,
    /// Nanotons as a decimal string.
    pub amount: String,
    /// Base64 BoC of the body.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendTransactionRequest {
    /// Unix seconds.
    #[serde(rename = "validUntil")]
    pub valid_until: u64,
    pub network: String,
    pub from: String,
    pub messages: Vec<TransactionMessage>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendTransactionResponse {
    /// Base64 BoC of the signed external message.
    pub boc: String,
}

/// An external wallet reachable over TON Connect.
#[async_trait]
pub trait WalletConnector: Send + Sync {
    /// Set or clear what the next connection is asked to prove.
    fn set_connect_request_parameters(&self, parameters: Option<ConnectRequestParameters>);

    /// The connected account, if any.
    fn account(&self) -> Option<Account>;

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent>;

    /// Ask the wallet to sign and broadcast. Suspends until the user answers.
    async fn send_transaction(
        &self,
        request: SendTransactionRequest,
    ) -> Result<SendTransactionResponse, ConnectorError>;

    async fn disconnect(&self) -> Result<(), ConnectorError>;
}
