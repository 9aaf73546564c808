//! Jetton wallet state as reported by `get_wallet_data`.

use std::sync::Arc;

use ton_cell::{Address, Cell, CellSlice};

use crate::error::{JettonError, JettonResult};

/// A value from a get method result stack.
#[derive(Debug, Clone)]
pub enum StackValue {
    Int(u128),
    Cell(Arc<Cell>),
}

impl StackValue {
    fn kind(&self) -> &'static str {
        match self {
            StackValue::Int(_) => "int",
            StackValue::Cell(_) => "cell",
        }
    }

    fn as_int(&self) -> JettonResult<u128> {
        match self {
            StackValue::Int(value) => Ok(*value),
            other => Err(JettonError::InvalidStackEntry {
                expected: "int",
                actual: other.kind(),
            }),
        }
    }

    fn as_address(&self) -> JettonResult<Address> {
        match self {
            StackValue::Cell(cell) => CellSlice::new(cell)
                .load_address()?
                .ok_or_else(|| JettonError::UnexpectedResult("addr_none in wallet data".into())),
            other => Err(JettonError::InvalidStackEntry {
                expected: "cell",
                actual: other.kind(),
            }),
        }
    }
}

/// Data returned by the `get_wallet_data` get method on a Jetton Wallet contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JettonWalletData {
    /// Balance in the token's smallest units.
    pub balance: u128,
    pub owner: Address,
    pub jetton_master: Address,
}

impl JettonWalletData {
    /// Parse the `[balance, owner, jetton_master, wallet_code]` stack.
    pub fn from_stack(stack: &[StackValue]) -> JettonResult<Self> {
        if stack.len() < 3 {
            return Err(JettonError::StackUnderflow {
                expected: 4,
                actual: stack.len(),
            });
        }

        Ok(Self {
            balance: stack[0].as_int()?,
            owner: stack[1].as_address()?,
            jetton_master: stack[2].as_address()?,
        })
    }
}
