//! Transfer message structures

use std::sync::Arc;

use ton_cell::{Address, Cell, CellBuilder, CellResult};

/// Opcode of a plain text comment body.
pub const COMMENT_OP: u32 = 0;

/// Pay transfer fees separately from the message value.
pub const SEND_MODE_PAY_FEES_SEPARATELY: u8 = 1;

/// Ignore errors during the action phase.
pub const SEND_MODE_IGNORE_ERRORS: u8 = 2;

/// A transfer to be sent from a wallet
#[derive(Debug, Clone)]
pub struct Transfer {
    /// Destination address
    pub to: Address,
    /// Amount in nanotons
    pub amount: u128,
    /// Optional message body
    pub payload: Option<Arc<Cell>>,
    /// Bounce flag
    pub bounce: bool,
    /// Send mode (default: 3)
    pub mode: u8,
}

impl Transfer {
    /// Create a bounceable transfer with the default send mode.
    pub fn new(to: Address, amount: u128) -> Self {
        Self {
            to,
            amount,
            payload: None,
            bounce: true,
            mode: SEND_MODE_PAY_FEES_SEPARATELY | SEND_MODE_IGNORE_ERRORS,
        }
    }

    pub fn with_payload(mut self, payload: Arc<Cell>) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn with_bounce(mut self, bounce: bool) -> Self {
        self.bounce = bounce;
        self
    }

    pub fn with_mode(mut self, mode: u8) -> Self {
        self.mode = mode;
        self
    }
}

/// Build a text comment cell: op 0 followed by the UTF-8 text as a snake.
pub fn build_comment(text: &str) -> CellResult<Cell> {
    let mut builder = CellBuilder::new();
    builder.store_u32(COMMENT_OP)?;
    builder.store_string_tail(text)?;
    builder.build()
}
