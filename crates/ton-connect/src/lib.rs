//! Wallet authentication and transfer signing for a TON dashboard.
//!
//! - [`ProofNegotiator`]: TON Connect `ton_proof` challenge with an external
//!   wallet
//! - [`SessionAuthenticator`]: exchanges proofs for a bearer credential and
//!   owns its lifecycle
//! - [`TransferOrchestrator`]: validates and sends native and jetton
//!   transfers through a [`SigningBackend`]
//! - [`SessionContext`]: wires them together for one application
//!
//! # Example
//!
//! ```
//! use ton_connect::{build_native_transfer_body, TransferRequest, TokenKind};
//!
//! let body = build_native_transfer_body(Some("thanks")).unwrap();
//! assert!(body.to_boc_base64().unwrap().starts_with("te6cc"));
//!
//! let request = TransferRequest::native("EQCD39VS5jcptHL8vMjEXrzGaRcCVYto7HUn4bpAOg8xqB2N", "1.5");
//! assert_eq!(request.token, TokenKind::Native);
//! ```

pub mod api;
pub mod backend;
pub mod chain;
pub mod config;
pub mod connector;
pub mod context;
pub mod error;
pub mod negotiator;
pub mod payload;
pub mod proof;
pub mod session;
pub mod storage;
pub mod transfer;

pub use api::{AuthApi, HttpAuthApi, VerifyRequest};
pub use backend::{
    ExternalWalletBackend, LocalKeyBackend, OutgoingMessage, SigningBackend, TransactionHash,
};
pub use chain::{ChainClient, ToncenterClient};
pub use config::{ConnectConfig, Network};
pub use connector::{
    Account, ConnectRequestParameters, SendTransactionRequest, SendTransactionResponse,
    TransactionMessage, WalletConnector, WalletEvent,
};
pub use context::SessionContext;
pub use error::{
    ApiError, AuthError, AuthResult, BackendError, BackendResult, ChainError, ConnectError,
    ConnectResult, ConnectorError, StorageError,
};
pub use negotiator::{NegotiationState, ProofNegotiator, Subscription};
pub use payload::{MAX_COMMENT_BYTES, Payload, build_native_transfer_body, build_token_transfer_body};
pub use proof::{Nonce, ProofDomain, TonProof};
pub use session::{SessionAuthenticator, SessionCredential, SessionEvent};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use transfer::{TokenKind, TransferOrchestrator, TransferPolicy, TransferRequest, TransferResult};
