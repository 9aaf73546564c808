//! # ton-jetton
//!
//! TEP-74 Jetton (fungible token) support: the `transfer` message body sent
//! to a holder's jetton wallet, and parsing of its `get_wallet_data` result.
//!
//! ## Example
//!
//! ```rust
//! use ton_cell::Address;
//! use ton_jetton::{JettonWallet, OP_TRANSFER};
//!
//! let destination = Address::new(0, [0x12; 32]);
//! let response = Address::new(0, [0x34; 32]);
//!
//! let body = JettonWallet::create_transfer_body(
//!     rand::random(),  // query_id
//!     1_000_000_000,   // 1 token with 9 decimals
//!     &destination,
//!     &response,       // excess TON goes back here
//!     None,
//!     1,               // forward TON amount
//!     None,
//! ).unwrap();
//! assert!(body.bit_len() > 32);
//! # let _ = OP_TRANSFER;
//! ```
//!
//! ## References
//!
//! - [TEP-74: Fungible tokens (Jettons) standard](https://github.com/ton-blockchain/TEPs/blob/master/text/0074-jettons-standard.md)

pub mod error;
pub mod types;
pub mod wallet;

pub use error::{JettonError, JettonResult};
pub use types::{JettonWalletData, StackValue};
pub use wallet::JettonWallet;
pub use wallet::opcodes::OP_TRANSFER;
