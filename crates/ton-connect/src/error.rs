//! Error types for ton-connect

use thiserror::Error;
use ton_cell::CellError;
use ton_jetton::JettonError;
use ton_wallet::WalletError;

/// Local validation and encoding failures. No network call has been made
/// when one of these is returned.
#[derive(Debug, Error)]
pub enum ConnectError {
    #[error("Invalid address {input:?}: {reason}")]
    InvalidAddress { input: String, reason: String },

    #[error("Encoding error: {0}")]
    Encoding(String),

    #[error("jettonAddress required for jetton transfer")]
    MissingJettonWallet,

    #[error("Invalid configuration {name}: {reason}")]
    Config { name: &'static str, reason: String },

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Session error: {0}")]
    Session(#[from] AuthError),
}

impl ConnectError {
    pub(crate) fn invalid_address(input: &str, err: CellError) -> Self {
        let reason = match err {
            CellError::InvalidAddress(reason) => reason,
            other => other.to_string(),
        };
        Self::InvalidAddress {
            input: input.to_string(),
            reason,
        }
    }
}

impl From<CellError> for ConnectError {
    fn from(err: CellError) -> Self {
        Self::Encoding(err.to_string())
    }
}

impl From<WalletError> for ConnectError {
    fn from(err: WalletError) -> Self {
        match err {
            WalletError::InvalidAmount { amount, reason } => {
                Self::Encoding(format!("amount {amount:?} is not representable: {reason}"))
            }
            other => Self::Encoding(other.to_string()),
        }
    }
}

impl From<JettonError> for ConnectError {
    fn from(err: JettonError) -> Self {
        Self::Encoding(err.to_string())
    }
}

pub type ConnectResult<T> = Result<T, ConnectError>;

/// Failures talking to the dashboard backend over HTTP.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("HTTP {status}: {}", detail.as_deref().unwrap_or("no detail"))]
    Status { status: u16, detail: Option<String> },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl ApiError {
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Status { status: 401, .. })
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::InvalidResponse(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

/// Authentication failures.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Nonce unavailable: {0}")]
    NonceUnavailable(String),

    #[error("Verification rejected (HTTP {status}): {detail}")]
    VerificationRejected { status: u16, detail: String },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Request failed (HTTP {status}): {detail}")]
    Http { status: u16, detail: String },

    #[error("Malformed wallet proof: {0}")]
    StructuralProof(String),

    #[error("Public key does not match the signing key")]
    KeyMismatch,

    #[error("No local signing key is active")]
    NoLocalKey,

    #[error("Login superseded by a later logout or cancellation")]
    Superseded,

    #[error("Negotiation cancelled")]
    Cancelled,

    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Session expired, please sign in again")]
    Unauthorized,

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

impl AuthError {
    /// Classify a failed verification call.
    pub(crate) fn from_verification(err: ApiError) -> Self {
        match err {
            ApiError::Status { status, detail } if (400..500).contains(&status) => {
                AuthError::VerificationRejected {
                    status,
                    detail: detail.unwrap_or_else(|| "verification failed".to_string()),
                }
            }
            other => AuthError::Network(other.to_string()),
        }
    }

    /// Classify a failed authenticated request other than 401.
    pub(crate) fn from_request(err: ApiError) -> Self {
        match err {
            ApiError::Status { status, detail } => AuthError::Http {
                status,
                detail: detail.unwrap_or_default(),
            },
            other => AuthError::Network(other.to_string()),
        }
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Failures of a signing backend.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("Wallet not connected")]
    NotConnected,

    #[error("Transaction rejected by user")]
    UserRejected,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Could not fetch sequence number: {0}")]
    SequenceFetch(String),

    #[error("Transaction rejected by node: {0}")]
    Submission(String),

    #[error("Balance unavailable: {0}")]
    Balance(String),

    #[error("Wallet error: {0}")]
    Wallet(#[from] WalletError),

    #[error("Cell error: {0}")]
    Cell(#[from] CellError),
}

pub type BackendResult<T> = Result<T, BackendError>;

/// Failures reported by an external wallet connection.
#[derive(Debug, Clone, Error)]
pub enum ConnectorError {
    #[error("Wallet not connected")]
    NotConnected,

    #[error("User declined the request")]
    UserRejected,

    #[error("Wallet bridge error: {0}")]
    Transport(String),
}

impl From<ConnectorError> for BackendError {
    fn from(err: ConnectorError) -> Self {
        match err {
            ConnectorError::NotConnected => BackendError::NotConnected,
            ConnectorError::UserRejected => BackendError::UserRejected,
            ConnectorError::Transport(reason) => BackendError::Transport(reason),
        }
    }
}

/// Failures reported by a chain access client.
#[derive(Debug, Clone, Error)]
pub enum ChainError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Node error {code}: {message}")]
    Rejected { code: i64, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

impl From<reqwest::Error> for ChainError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ChainError::InvalidResponse(err.to_string())
        } else {
            ChainError::Transport(err.to_string())
        }
    }
}

pub type ChainResult<T> = Result<T, ChainError>;

/// Persistent key-value store failures.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid key: {0:?}")]
    InvalidKey(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_verification_classification() {
        let rejected = AuthError::from_verification(ApiError::Status {
            status: 400,
            detail: Some("stale nonce".into()),
        });
        assert!(matches!(
            rejected,
            AuthError::VerificationRejected { status: 400, ref detail } if detail == "stale nonce"
        ));

        let server = AuthError::from_verification(ApiError::Status {
            status: 502,
            detail: None,
        });
        assert!(matches!(server, AuthError::Network(_)));

        let transport = AuthError::from_verification(ApiError::Transport("timed out".into()));
        assert!(matches!(transport, AuthError::Network(_)));
    }

    #[test]
    fn test_messages_are_distinct() {
        let messages = [
            AuthError::NonceUnavailable("x".into()).to_string(),
            AuthError::VerificationRejected {
                status: 400,
                detail: "x".into(),
            }
            .to_string(),
            AuthError::Network("x".into()).to_string(),
            AuthError::StructuralProof("x".into()).to_string(),
            BackendError::UserRejected.to_string(),
            BackendError::Transport("x".into()).to_string(),
            BackendError::SequenceFetch("x".into()).to_string(),
            BackendError::Submission("x".into()).to_string(),
            ConnectError::Encoding("x".into()).to_string(),
            ConnectError::InvalidAddress {
                input: "x".into(),
                reason: "x".into(),
            }
            .to_string(),
        ];
        for (i, a) in messages.iter().enumerate() {
            for b in &messages[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn test_missing_jetton_wallet_message() {
        assert_eq!(
            ConnectError::MissingJettonWallet.to_string(),
            "jettonAddress required for jetton transfer"
        );
    }
}
