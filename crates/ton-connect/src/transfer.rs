//! Transfer orchestration: validate, build the body, hand it to a backend.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use ton_cell::Address;
use ton_wallet::{TON_DECIMALS, amount::parse_positive_units};
use tracing::{debug, info, warn};

use crate::backend::{OutgoingMessage, SigningBackend};
use crate::error::{ConnectError, ConnectResult};
use crate::payload::{build_native_transfer_body, build_token_transfer_body};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    #[default]
    Native,
    Jetton,
}

/// A transfer as entered by the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    pub recipient: String,
    /// Decimal amount in whole coins or tokens.
    pub amount: String,
    #[serde(default)]
    pub comment: Option<String>,
    #[serde(default)]
    pub token: TokenKind,
    /// Sender's jetton wallet contract for `token`.
    #[serde(default)]
    pub jetton_wallet: Option<String>,
    #[serde(default = "default_jetton_decimals")]
    pub jetton_decimals: u8,
}

fn default_jetton_decimals() -> u8 {
    TON_DECIMALS as u8
}

impl TransferRequest {
    pub fn native(recipient: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            recipient: recipient.into(),
            amount: amount.into(),
            comment: None,
            token: TokenKind::Native,
            jetton_wallet: None,
            jetton_decimals: default_jetton_decimals(),
        }
    }

    pub fn jetton(recipient: impl Into<String>, amount: impl Into<String>) -> Self {
        Self {
            token: TokenKind::Jetton,
            ..Self::native(recipient, amount)
        }
    }

    pub fn with_comment(mut self, comment: impl Into<String>) -> Self {
        self.comment = Some(comment.into());
        self
    }

    pub fn with_jetton_wallet(mut self, jetton_wallet: impl Into<String>) -> Self {
        self.jetton_wallet = Some(jetton_wallet.into());
        self
    }

    pub fn with_jetton_decimals(mut self, decimals: u8) -> Self {
        self.jetton_decimals = decimals;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum TransferResult {
    Success { transaction_hash: String },
    Failure { error_message: String },
}

impl TransferResult {
    pub fn is_success(&self) -> bool {
        matches!(self, TransferResult::Success { .. })
    }

    fn failure(message: impl Into<String>) -> Self {
        TransferResult::Failure {
            error_message: message.into(),
        }
    }
}

/// Amounts and timing shared by every transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferPolicy {
    /// TON attached to a jetton transfer to pay for the contract calls.
    pub jetton_gas_reserve: u128,
    /// TON forwarded to the recipient's jetton wallet with the notification.
    pub forward_amount: u128,
    pub validity: Duration,
}

impl Default for TransferPolicy {
    fn default() -> Self {
        Self {
            jetton_gas_reserve: 50_000_000,
            forward_amount: 1,
            validity: Duration::from_secs(300),
        }
    }
}

/// A validated transfer, still without a body.
struct Validated {
    recipient: Address,
    bounceable: bool,
    jetton_wallet: Option<Address>,
}

#[derive(Debug, Clone, Default)]
pub struct TransferOrchestrator {
    policy: TransferPolicy,
}

impl TransferOrchestrator {
    pub fn new(policy: TransferPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &TransferPolicy {
        &self.policy
    }

    /// Run a transfer to completion. Every failure is reported in the result.
    ///
    /// Each call submits a new transaction; identical requests are not
    /// deduplicated.
    pub async fn execute(&self, request: &TransferRequest, backend: &SigningBackend) -> TransferResult {
        let message = match self.prepare(request, backend) {
            Ok(message) => message,
            Err(e) => {
                debug!(error = %e, "Transfer rejected before signing");
                return TransferResult::failure(e.to_string());
            }
        };

        match backend.sign_and_submit(message).await {
            Ok(hash) => {
                info!(hash = %hash, backend = backend.kind(), "Transfer sent");
                TransferResult::Success {
                    transaction_hash: hash.into_string(),
                }
            }
            Err(e) => {
                warn!(error = %e, backend = backend.kind(), "Transfer failed");
                TransferResult::failure(e.to_string())
            }
        }
    }

    fn validate(&self, request: &TransferRequest) -> ConnectResult<Validated> {
        let (recipient, flags) = Address::parse_with_flags(&request.recipient)
            .map_err(|e| ConnectError::invalid_address(&request.recipient, e))?;

        let decimals = match request.token {
            TokenKind::Native => TON_DECIMALS,
            TokenKind::Jetton => request.jetton_decimals as u32,
        };
        parse_positive_units(&request.amount, decimals)?;

        let jetton_wallet = match request.token {
            TokenKind::Native => None,
            TokenKind::Jetton => {
                let text = request
                    .jetton_wallet
                    .as_deref()
                    .filter(|text| !text.trim().is_empty())
                    .ok_or(ConnectError::MissingJettonWallet)?;
                Some(Address::parse(text).map_err(|e| ConnectError::invalid_address(text, e))?)
            }
        };

        Ok(Validated {
            recipient,
            bounceable: flags.bounceable,
            jetton_wallet,
        })
    }

    fn prepare(&self, request: &TransferRequest, backend: &SigningBackend) -> ConnectResult<OutgoingMessage> {
        let validated = self.validate(request)?;
        let comment = request.comment.as_deref();

        match validated.jetton_wallet {
            None => {
                let amount = parse_positive_units(&request.amount, TON_DECIMALS)?;
                Ok(OutgoingMessage {
                    destination: validated.recipient,
                    amount,
                    payload: Some(build_native_transfer_body(comment)?),
                    bounce: validated.bounceable,
                })
            }
            Some(jetton_wallet) => {
                let sender = backend.address().ok_or_else(|| {
                    ConnectError::Encoding("wallet not connected, no response address".into())
                })?;
                let payload = build_token_transfer_body(
                    &request.amount,
                    request.jetton_decimals as u32,
                    &validated.recipient,
                    &sender,
                    self.policy.forward_amount,
                    comment,
                    rand::random(),
                )?;
                Ok(OutgoingMessage {
                    destination: jetton_wallet,
                    amount: self.policy.jetton_gas_reserve,
                    payload: Some(payload),
                    bounce: true,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_result_wire_shape() {
        let success = serde_json::to_value(TransferResult::Success {
            transaction_hash: "ab".into(),
        })
        .unwrap();
        assert_eq!(success["status"], "success");
        assert_eq!(success["transaction_hash"], "ab");

        let failure = serde_json::to_value(TransferResult::failure("nope")).unwrap();
        assert_eq!(failure["status"], "failure");
        assert_eq!(failure["error_message"], "nope");
    }

    #[test]
    fn test_request_defaults() {
        let request: TransferRequest =
            serde_json::from_str(r#"{"recipient":"x","amount":"1"}"#).unwrap();
        assert_eq!(request.token, TokenKind::Native);
        assert_eq!(request.jetton_decimals, 9);
        assert_eq!(request, TransferRequest::native("x", "1"));
    }

    #[test]
    fn test_validation_order() {
        let orchestrator = TransferOrchestrator::default();

        // bad recipient wins over bad amount and missing jetton wallet
        let request = TransferRequest::jetton("", "-1");
        assert!(matches!(
            orchestrator.validate(&request),
            Err(ConnectError::InvalidAddress { .. })
        ));

        let recipient = "0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8";
        let request = TransferRequest::jetton(recipient, "1.0000000001");
        assert!(matches!(
            orchestrator.validate(&request),
            Err(ConnectError::Encoding(_))
        ));

        let request = TransferRequest::jetton(recipient, "1");
        assert!(matches!(
            orchestrator.validate(&request),
            Err(ConnectError::MissingJettonWallet)
        ));

        let request = TransferRequest::jetton(recipient, "1").with_jetton_wallet("EQbad");
        assert!(matches!(
            orchestrator.validate(&request),
            Err(ConnectError::InvalidAddress { .. })
        ));
    }

    #[test]
    fn test_jetton_decimals_used_for_amount() {
        let orchestrator = TransferOrchestrator::default();
        let recipient = "0:83dfd552e63729b472fcbcc8c45ebcc6691702558b68ec7527e1ba403a0f31a8";
        let request = TransferRequest::jetton(recipient, "1.0000001")
            .with_jetton_wallet(recipient)
            .with_jetton_decimals(6);
        assert!(orchestrator.validate(&request).is_err());

        let request = request.with_jetton_decimals(7);
        assert!(orchestrator.validate(&request).is_ok());
    }
}
