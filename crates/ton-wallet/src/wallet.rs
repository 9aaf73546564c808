//! Wallet trait definition

use std::sync::Arc;

use ton_cell::{Address, Cell, CellBuilder};

use crate::error::WalletResult;
use crate::transfer::Transfer;

/// Common wallet interface
pub trait Wallet: Send + Sync {
    /// Get wallet version name
    fn version(&self) -> &'static str;

    /// Get wallet address
    fn address(&self) -> &Address;

    /// Get public key
    fn public_key(&self) -> &[u8; 32];

    /// Get state init cell for deployment
    fn state_init(&self) -> WalletResult<Cell>;

    /// Create unsigned transfer message body
    fn create_transfer_body(
        &self,
        seqno: u32,
        transfers: &[Transfer],
        valid_until: u32,
    ) -> WalletResult<Cell>;

    /// Sign a message body
    fn sign(&self, body: &Cell) -> WalletResult<Cell>;

    /// Wrap a signed body into an inbound external message:
    /// `ext_in_msg_info$10 src:addr_none dest import_fee:0 init:(Maybe ^StateInit) body:^Cell`.
    fn create_external_message(
        &self,
        signed_body: &Cell,
        state_init: Option<Cell>,
    ) -> WalletResult<Cell> {
        let mut builder = CellBuilder::new();

        builder.store_uint(0b10, 2)?;
        builder.store_address_none()?;
        builder.store_address(self.address())?;
        builder.store_coins(0)?;

        match state_init {
            Some(si) => {
                builder.store_bit(true)?;
                builder.store_bit(true)?;
                builder.store_ref(Arc::new(si))?;
            }
            None => {
                builder.store_bit(false)?;
            }
        }

        builder.store_bit(true)?;
        builder.store_ref(Arc::new(signed_body.clone()))?;

        builder.build().map_err(Into::into)
    }

    /// Build, sign and wrap a transfer. A wallet at seqno 0 is not deployed
    /// yet, so its state init travels with the first message.
    fn create_signed_transfer(
        &self,
        seqno: u32,
        transfers: &[Transfer],
        valid_until: u32,
    ) -> WalletResult<Cell> {
        let body = self.create_transfer_body(seqno, transfers, valid_until)?;
        let signed = self.sign(&body)?;
        let state_init = if seqno == 0 {
            Some(self.state_init()?)
        } else {
            None
        };
        self.create_external_message(&signed, state_init)
    }
}
