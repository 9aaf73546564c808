//! Message bodies for native and jetton transfers.

use std::sync::Arc;

use ton_cell::{Address, BagOfCells, Cell};
use ton_jetton::JettonWallet;
use ton_wallet::{amount::parse_positive_units, build_comment};

use crate::error::{ConnectError, ConnectResult};

/// Longest comment accepted, in UTF-8 bytes.
pub const MAX_COMMENT_BYTES: usize = 512;

/// A message body cell, ready to attach to an outgoing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payload {
    cell: Arc<Cell>,
}

impl Payload {
    pub fn new(cell: Cell) -> Self {
        Self {
            cell: Arc::new(cell),
        }
    }

    pub fn cell(&self) -> &Arc<Cell> {
        &self.cell
    }

    pub fn hash(&self) -> [u8; 32] {
        self.cell.hash()
    }

    /// Serialize as a single-root bag of cells.
    pub fn to_boc(&self) -> ConnectResult<Vec<u8>> {
        Ok(BagOfCells::new(vec![self.cell.clone()]).serialize()?)
    }

    /// Standard base64 of [`Payload::to_boc`], the form TON Connect expects.
    pub fn to_boc_base64(&self) -> ConnectResult<String> {
        Ok(BagOfCells::new(vec![self.cell.clone()]).serialize_to_base64()?)
    }
}

fn comment_cell(text: &str) -> ConnectResult<Cell> {
    if text.len() > MAX_COMMENT_BYTES {
        return Err(ConnectError::Encoding(format!(
            "comment is {} bytes, limit is {MAX_COMMENT_BYTES}",
            text.len()
        )));
    }
    Ok(build_comment(text)?)
}

/// Body of a plain TON transfer: a zero op code, then the comment.
///
/// `None` and `Some("")` both give the 32-bit header alone.
pub fn build_native_transfer_body(comment: Option<&str>) -> ConnectResult<Payload> {
    let cell = comment_cell(comment.unwrap_or_default())?;
    Ok(Payload::new(cell))
}

/// TEP-74 `transfer` body for the sender's jetton wallet.
///
/// `amount` is a decimal string in token units with `decimals` fractional
/// digits. Excess TON is returned to `from`.
pub fn build_token_transfer_body(
    amount: &str,
    decimals: u32,
    to: &Address,
    from: &Address,
    forward_amount: u128,
    forward_comment: Option<&str>,
    query_id: u64,
) -> ConnectResult<Payload> {
    let units = parse_positive_units(amount, decimals)?;
    let forward_payload = forward_comment
        .filter(|text| !text.is_empty())
        .map(comment_cell)
        .transpose()?;

    let cell = JettonWallet::create_transfer_body(
        query_id,
        units,
        to,
        from,
        None,
        forward_amount,
        forward_payload,
    )?;
    Ok(Payload::new(cell))
}
