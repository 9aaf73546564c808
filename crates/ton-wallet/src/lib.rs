//! TON wallet contract support
//!
//! Local signing for the Wallet V4R2 contract:
//! - [`Mnemonic`]: TON phrase to Ed25519 keypair derivation
//! - [`WalletV4R2`]: address derivation, transfer bodies, signing and
//!   external message wrapping
//! - [`amount`]: exact decimal to base-unit conversion

pub mod amount;
pub mod codes;
pub mod error;
pub mod mnemonic;
pub mod transfer;
pub mod v4r2;
pub mod wallet;

pub use amount::{TON_DECIMALS, format_units, parse_positive_units, parse_units};
pub use error::{WalletError, WalletResult};
pub use mnemonic::Mnemonic;
pub use transfer::{Transfer, build_comment};
pub use v4r2::WalletV4R2;
pub use wallet::Wallet;
