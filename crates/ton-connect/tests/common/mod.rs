//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{Value, json};
use tokio::sync::{Barrier, broadcast, oneshot};
use ton_cell::Address;
use ton_connect::proof::sign_proof;
use ton_connect::{
    Account, ApiError, AuthApi, ChainClient, ChainError, ConnectRequestParameters,
    ConnectorError, MemoryStore, Nonce, SendTransactionRequest, SendTransactionResponse,
    SessionAuthenticator, TonProof, VerifyRequest, WalletConnector, WalletEvent,
};
use ton_crypto::Ed25519Keypair;
use ton_jetton::JettonWalletData;

pub const SEED_HEX: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
/// V4R2 basechain wallet of [`SEED_HEX`].
pub const WALLET_RAW: &str = "0:cdac97c9162b2e141ad4463828b2a70efdf8762b97e83563f352becf902e88a6";
pub const RECIPIENT_RAW: &str =
    "0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8";
pub const RECIPIENT_BOUNCEABLE: &str = "EQCD39VS5jcptHL8vMjEXrzGaRcCVYto7HUn4bpAOg8xqB2N";
pub const RECIPIENT_NON_BOUNCEABLE: &str = "UQCD39VS5jcptHL8vMjEXrzGaRcCVYto7HUn4bpAOg8xqEBI";
/// Single cell holding a 32-bit zero.
pub const HEADER_BOC: &str = "te6cckEBAQEABgAACAAAAADjAK8P";
pub const HEADER_HASH: &str = "3fe93897158698e4d473b74414d7493716b0fc3a70310934873f0019daaccab4";
pub const DOMAIN: &str = "dashboard.example";

pub fn test_keypair() -> Ed25519Keypair {
    Ed25519Keypair::from_bytes(&hex::decode(SEED_HEX).unwrap()).unwrap()
}

pub fn wallet_address() -> Address {
    WALLET_RAW.parse().unwrap()
}

pub fn recipient() -> Address {
    RECIPIENT_RAW.parse().unwrap()
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub enum Reply<T> {
    Ready(Result<T, ApiError>),
    Deferred(oneshot::Receiver<Result<T, ApiError>>),
}

impl<T> Reply<T> {
    async fn resolve(self) -> Result<T, ApiError> {
        match self {
            Reply::Ready(result) => result,
            Reply::Deferred(receiver) => receiver
                .await
                .unwrap_or_else(|_| Err(ApiError::Transport("reply dropped".into()))),
        }
    }
}

/// Scripted backend. Unscripted calls succeed with `nonce-N` / `token-N`.
#[derive(Default)]
pub struct MockAuthApi {
    nonces: Mutex<VecDeque<Reply<Nonce>>>,
    verifications: Mutex<VecDeque<Reply<String>>>,
    verify_calls: Mutex<Vec<(&'static str, VerifyRequest)>>,
    nonce_calls: AtomicUsize,
    issued: AtomicUsize,
    authorized_failure: Mutex<Option<(u16, Arc<Barrier>)>>,
    authorized_calls: AtomicUsize,
}

impl MockAuthApi {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_nonce(&self, reply: Result<&str, ApiError>) {
        let reply = reply.map(|nonce| Nonce::new(nonce).unwrap());
        self.nonces.lock().unwrap().push_back(Reply::Ready(reply));
    }

    /// The next nonce request waits until the returned sender fires.
    pub fn defer_nonce(&self) -> oneshot::Sender<Result<Nonce, ApiError>> {
        let (sender, receiver) = oneshot::channel();
        self.nonces.lock().unwrap().push_back(Reply::Deferred(receiver));
        sender
    }

    pub fn push_verification(&self, reply: Result<&str, ApiError>) {
        let reply = reply.map(str::to_string);
        self.verifications.lock().unwrap().push_back(Reply::Ready(reply));
    }

    pub fn defer_verification(&self) -> oneshot::Sender<Result<String, ApiError>> {
        let (sender, receiver) = oneshot::channel();
        self.verifications
            .lock()
            .unwrap()
            .push_back(Reply::Deferred(receiver));
        sender
    }

    /// Every authorized call fails with `status` once `concurrent` calls
    /// are waiting.
    pub fn fail_authorized(&self, status: u16, concurrent: usize) {
        *self.authorized_failure.lock().unwrap() = Some((status, Arc::new(Barrier::new(concurrent))));
    }

    pub fn verify_calls(&self) -> Vec<(&'static str, VerifyRequest)> {
        self.verify_calls.lock().unwrap().clone()
    }

    pub fn nonce_calls(&self) -> usize {
        self.nonce_calls.load(Ordering::SeqCst)
    }

    pub fn authorized_calls(&self) -> usize {
        self.authorized_calls.load(Ordering::SeqCst)
    }

    async fn authorized(&self, reply: Value) -> Result<Value, ApiError> {
        self.authorized_calls.fetch_add(1, Ordering::SeqCst);
        let failure = self.authorized_failure.lock().unwrap().clone();
        match failure {
            Some((status, barrier)) => {
                barrier.wait().await;
                Err(ApiError::Status {
                    status,
                    detail: Some("Invalid token".into()),
                })
            }
            None => Ok(reply),
        }
    }

    async fn verify(&self, path: &'static str, request: &VerifyRequest) -> Result<String, ApiError> {
        self.verify_calls
            .lock()
            .unwrap()
            .push((path, request.clone()));
        let reply = self.verifications.lock().unwrap().pop_front();
        match reply {
            Some(reply) => reply.resolve().await,
            None => Ok(format!(
                "token-{}",
                self.issued.fetch_add(1, Ordering::SeqCst) + 1
            )),
        }
    }
}

#[async_trait]
impl AuthApi for MockAuthApi {
    async fn request_nonce(&self) -> Result<Nonce, ApiError> {
        let n = self.nonce_calls.fetch_add(1, Ordering::SeqCst) + 1;
        let reply = self.nonces.lock().unwrap().pop_front();
        match reply {
            Some(reply) => reply.resolve().await,
            None => Ok(Nonce::new(format!("nonce-{n}")).unwrap()),
        }
    }

    async fn verify_signature(&self, request: &VerifyRequest) -> Result<String, ApiError> {
        self.verify("verify_signature", request).await
    }

    async fn verify_ton_connect(&self, request: &VerifyRequest) -> Result<String, ApiError> {
        self.verify("verify_ton_connect", request).await
    }

    async fn get(&self, path: &str, _token: &str) -> Result<Value, ApiError> {
        self.authorized(json!({ "path": path })).await
    }

    async fn post(&self, path: &str, _token: &str, body: &Value) -> Result<Value, ApiError> {
        self.authorized(json!({ "path": path, "body": body })).await
    }
}

/// Stand-in for a TON Connect bridge.
pub struct MockConnector {
    parameters: Mutex<Vec<Option<ConnectRequestParameters>>>,
    account: Mutex<Option<Account>>,
    events: broadcast::Sender<WalletEvent>,
    replies: Mutex<VecDeque<Result<SendTransactionResponse, ConnectorError>>>,
    requests: Mutex<Vec<SendTransactionRequest>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    disconnects: AtomicUsize,
}

impl MockConnector {
    pub fn new() -> Arc<Self> {
        let (events, _) = broadcast::channel(16);
        Arc::new(Self {
            parameters: Mutex::new(Vec::new()),
            account: Mutex::new(None),
            events,
            replies: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            disconnects: AtomicUsize::new(0),
        })
    }

    pub fn connected(account: Account) -> Arc<Self> {
        let connector = Self::new();
        connector.set_account(Some(account));
        connector
    }

    pub fn set_account(&self, account: Option<Account>) {
        *self.account.lock().unwrap() = account;
    }

    /// Current connect-request parameters.
    pub fn parameters(&self) -> Option<ConnectRequestParameters> {
        self.parameters.lock().unwrap().last().cloned().flatten()
    }

    pub fn parameter_history(&self) -> Vec<Option<ConnectRequestParameters>> {
        self.parameters.lock().unwrap().clone()
    }

    pub fn emit(&self, event: WalletEvent) {
        let _ = self.events.send(event);
    }

    pub fn push_reply(&self, reply: Result<SendTransactionResponse, ConnectorError>) {
        self.replies.lock().unwrap().push_back(reply);
    }

    pub fn requests(&self) -> Vec<SendTransactionRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn disconnects(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletConnector for MockConnector {
    fn set_connect_request_parameters(&self, parameters: Option<ConnectRequestParameters>) {
        self.parameters.lock().unwrap().push(parameters);
    }

    fn account(&self) -> Option<Account> {
        self.account.lock().unwrap().clone()
    }

    fn subscribe(&self) -> broadcast::Receiver<WalletEvent> {
        self.events.subscribe()
    }

    async fn send_transaction(
        &self,
        request: SendTransactionRequest,
    ) -> Result<SendTransactionResponse, ConnectorError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request);

        for _ in 0..3 {
            tokio::task::yield_now().await;
        }

        let reply = self.replies.lock().unwrap().pop_front();
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        reply.unwrap_or_else(|| {
            Ok(SendTransactionResponse {
                boc: HEADER_BOC.to_string(),
            })
        })
    }

    async fn disconnect(&self) -> Result<(), ConnectorError> {
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        self.set_account(None);
        Ok(())
    }
}

/// Chain with a scripted seqno and an accepting node.
pub struct MockChain {
    seqno: Mutex<Result<u32, ChainError>>,
    balance: Mutex<u128>,
    jetton: Mutex<Option<JettonWalletData>>,
    send_result: Mutex<Result<(), ChainError>>,
    sent: Mutex<Vec<Vec<u8>>>,
    log: Mutex<Vec<&'static str>>,
}

impl MockChain {
    pub fn new(seqno: u32) -> Arc<Self> {
        Arc::new(Self {
            seqno: Mutex::new(Ok(seqno)),
            balance: Mutex::new(0),
            jetton: Mutex::new(None),
            send_result: Mutex::new(Ok(())),
            sent: Mutex::new(Vec::new()),
            log: Mutex::new(Vec::new()),
        })
    }

    pub fn fail_seqno(&self, error: ChainError) {
        *self.seqno.lock().unwrap() = Err(error);
    }

    pub fn fail_send(&self, error: ChainError) {
        *self.send_result.lock().unwrap() = Err(error);
    }

    pub fn set_balance(&self, balance: u128) {
        *self.balance.lock().unwrap() = balance;
    }

    pub fn set_jetton_data(&self, data: JettonWalletData) {
        *self.jetton.lock().unwrap() = Some(data);
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.sent.lock().unwrap().clone()
    }

    /// Order of `seqno` and `send` calls.
    pub fn log(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().clone()
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn seqno(&self, _address: &Address) -> Result<u32, ChainError> {
        self.log.lock().unwrap().push("seqno");
        tokio::task::yield_now().await;
        self.seqno.lock().unwrap().clone()
    }

    async fn balance(&self, _address: &Address) -> Result<u128, ChainError> {
        Ok(*self.balance.lock().unwrap())
    }

    async fn jetton_wallet_data(&self, _jetton_wallet: &Address) -> Result<JettonWalletData, ChainError> {
        self.jetton
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| ChainError::Rejected {
                code: -13,
                message: "contract not initialized".into(),
            })
    }

    async fn send_boc(&self, boc: &[u8]) -> Result<(), ChainError> {
        self.log.lock().unwrap().push("send");
        tokio::task::yield_now().await;
        let result = self.send_result.lock().unwrap().clone();
        if result.is_ok() {
            self.sent.lock().unwrap().push(boc.to_vec());
            if let Ok(seqno) = self.seqno.lock().unwrap().as_mut() {
                *seqno += 1;
            }
        }
        result
    }
}

pub fn account(address: &Address, public_key: &[u8; 32], chain: &str) -> Account {
    Account {
        address: address.to_raw(),
        public_key: Some(hex::encode(public_key)),
        chain: chain.to_string(),
        wallet_state_init: None,
    }
}

/// Connection object as a TON Connect bridge delivers it.
pub fn connection(account: &Account, proof: &TonProof) -> Value {
    json!({
        "device": { "appName": "mock-wallet", "platform": "linux" },
        "provider": "http",
        "account": account,
        "connectItems": {
            "tonProof": { "name": "ton_proof", "proof": proof }
        }
    })
}

/// A wallet answering the challenge `nonce` with the test key.
pub fn proof_event(nonce: &str, chain: &str) -> WalletEvent {
    let keypair = test_keypair();
    let address = wallet_address();
    let proof = sign_proof(&keypair, &address, DOMAIN, 1_700_000_000, nonce);
    let account = account(&address, &keypair.public_key, chain);
    WalletEvent::Connected(connection(&account, &proof))
}

pub async fn session(api: Arc<MockAuthApi>, store: Arc<MemoryStore>) -> Arc<SessionAuthenticator> {
    Arc::new(
        SessionAuthenticator::restore(api, store, DOMAIN)
            .await
            .unwrap(),
    )
}
