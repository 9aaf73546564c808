//! TON cells, bags of cells and account addresses.
//!
//! This crate is the binary substrate used by the wallet and connect
//! crates:
//!
//! - **Cell**: an ordinary TON cell (up to 1023 bits, up to 4 refs)
//! - **CellBuilder**: builder for creating cells
//! - **CellSlice**: reader for extracting data from cells
//! - **BagOfCells**: the BoC wire format wallets and nodes exchange
//! - **Address**: std account address with raw and user-friendly encodings
//!
//! # Example
//!
//! ```
//! use ton_cell::{Address, AddressFlags, BagOfCells, CellBuilder};
//!
//! let address: Address = "EQCD39VS5jcptHL8vMjEXrzGaRcCVYto7HUn4bpAOg8xqB2N".parse().unwrap();
//! assert_eq!(
//!     address.to_friendly(AddressFlags::NON_BOUNCEABLE),
//!     "UQCD39VS5jcptHL8vMjEXrzGaRcCVYto7HUn4bpAOg8xqEBI"
//! );
//!
//! let mut builder = CellBuilder::new();
//! builder.store_u32(0).unwrap();
//! builder.store_address(&address).unwrap();
//! let cell = builder.build().unwrap();
//!
//! let bytes = BagOfCells::from_root(cell).serialize().unwrap();
//! let root = BagOfCells::deserialize(&bytes).unwrap();
//! assert_eq!(root.root_count(), 1);
//! ```

use sha2::{Digest, Sha256};
use thiserror::Error;

mod address;
mod boc;
mod builder;
mod cell;
mod slice;

pub use address::{Address, AddressFlags};
pub use boc::BagOfCells;
pub use builder::CellBuilder;
pub use cell::{Cell, DEPTH_BYTES, HASH_BYTES};
pub use slice::CellSlice;

/// Errors that can occur during Cell/BoC/address operations.
#[derive(Debug, Error)]
pub enum CellError {
    /// The cell data exceeds the maximum of 1023 bits.
    #[error("Cell data too long: {0} bits (max 1023)")]
    DataTooLong(usize),

    /// The cell has too many references (max 4).
    #[error("Too many cell references: {0} (max 4)")]
    TooManyRefs(usize),

    /// Invalid BoC format.
    #[error("Invalid BoC format: {0}")]
    InvalidBoc(String),

    /// Cell not found in BoC.
    #[error("Cell not found: index {0}")]
    CellNotFound(usize),

    /// CRC32 checksum mismatch.
    #[error("CRC32 mismatch: expected 0x{expected:08x}, got 0x{actual:08x}")]
    CrcMismatch { expected: u32, actual: u32 },

    /// Unexpected end of data.
    #[error("Unexpected end of data")]
    UnexpectedEof,

    /// Not enough bits available.
    #[error("Not enough bits: need {need}, have {have}")]
    NotEnoughBits { need: usize, have: usize },

    /// Not enough references available.
    #[error("Not enough refs: need {need}, have {have}")]
    NotEnoughRefs { need: usize, have: usize },

    /// Invalid address format.
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid base64 encoding.
    #[error("Invalid base64: {0}")]
    InvalidBase64(String),

    /// Expected single root but found multiple or none.
    #[error("Expected single root, found {0}")]
    NotSingleRoot(usize),

    /// Exotic cells (pruned branches, Merkle proofs, libraries) are not handled.
    #[error("Unsupported exotic cell")]
    ExoticCell,

    /// Invalid bit length.
    #[error("Invalid bit length: {0}")]
    InvalidBitLength(usize),

    /// Coins value wider than VarUInteger 16 allows.
    #[error("Coins value out of range: {0}")]
    CoinsOutOfRange(u128),

    /// String tail is not valid UTF-8.
    #[error("Invalid UTF-8 in string tail")]
    InvalidUtf8,
}

/// Result type for Cell/BoC operations.
pub type CellResult<T> = Result<T, CellError>;

/// Maximum number of bits in a cell's data.
pub const MAX_CELL_BITS: usize = 1023;

/// Maximum number of references a cell can have.
pub const MAX_CELL_REFS: usize = 4;

/// Maximum number of bytes in cell data.
pub const MAX_CELL_BYTES: usize = 128;

/// BoC magic number for generic BoC.
pub const BOC_GENERIC_MAGIC: u32 = 0xb5ee9c72;

/// Compute SHA256 hash of the input data.
fn sha256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Compute CRC32-C checksum (Castagnoli polynomial).
fn crc32c(data: &[u8]) -> u32 {
    const CRC32C: crc::Crc<u32> = crc::Crc::<u32>::new(&crc::CRC_32_ISCSI);
    CRC32C.checksum(data)
}
