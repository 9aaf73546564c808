//! Jetton Wallet contract interface.
//!
//! Every holder has one Jetton Wallet contract per token. Transfers are
//! internal messages to the sender's own jetton wallet carrying a TEP-74
//! `transfer` body; that contract moves the balance to the recipient's
//! jetton wallet.

use std::sync::Arc;

use ton_cell::{Address, Cell, CellBuilder};

use crate::error::JettonResult;

/// TEP-74 Operation codes.
pub mod opcodes {
    /// Transfer tokens to another address.
    pub const OP_TRANSFER: u32 = 0x0f8a7ea5;
}

pub use opcodes::*;

/// Jetton Wallet contract interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JettonWallet {
    address: Address,
}

impl JettonWallet {
    pub fn new(address: Address) -> Self {
        Self { address }
    }

    /// Returns the address of the Jetton Wallet contract.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// Creates a transfer message body.
    ///
    /// # Message Format
    ///
    /// ```text
    /// transfer#0f8a7ea5
    ///   query_id:uint64
    ///   amount:(VarUInteger 16)
    ///   destination:MsgAddress
    ///   response_destination:MsgAddress
    ///   custom_payload:(Maybe ^Cell)
    ///   forward_ton_amount:(VarUInteger 16)
    ///   forward_payload:(Either Cell ^Cell)
    /// ```
    ///
    /// A forward payload is always stored by reference; without one the
    /// inline `Either` branch is left empty.
    pub fn create_transfer_body(
        query_id: u64,
        amount: u128,
        destination: &Address,
        response_destination: &Address,
        custom_payload: Option<Cell>,
        forward_ton_amount: u128,
        forward_payload: Option<Cell>,
    ) -> JettonResult<Cell> {
        let mut builder = CellBuilder::new();

        builder.store_u32(OP_TRANSFER)?;
        builder.store_u64(query_id)?;
        builder.store_coins(amount)?;
        builder.store_address(destination)?;
        builder.store_address(response_destination)?;
        builder.store_maybe_ref(custom_payload.map(Arc::new))?;
        builder.store_coins(forward_ton_amount)?;
        builder.store_maybe_ref(forward_payload.map(Arc::new))?;

        Ok(builder.build()?)
    }
}
