//! CellBuilder for constructing TON cells.
//!
//! The builder allows storing bits, integers, bytes, addresses and
//! references to other cells, then building the final Cell.

use std::sync::Arc;

use crate::{Address, Cell, CellError, CellResult, MAX_CELL_BITS, MAX_CELL_REFS};

/// Largest value a VarUInteger 16 (`Coins`) can carry: 15 bytes.
const MAX_COINS: u128 = (1u128 << 120) - 1;

/// Builder for constructing TON cells.
///
/// # Example
///
/// ```
/// use ton_cell::CellBuilder;
///
/// let mut builder = CellBuilder::new();
/// builder.store_u32(0x12345678).unwrap();
/// builder.store_bytes(&[1, 2, 3, 4]).unwrap();
/// let cell = builder.build().unwrap();
/// assert_eq!(cell.bit_len(), 64);
/// ```
#[derive(Debug, Clone)]
pub struct CellBuilder {
    data: Vec<u8>,
    bit_len: usize,
    references: Vec<Arc<Cell>>,
}

impl CellBuilder {
    /// Create a new empty CellBuilder.
    pub fn new() -> Self {
        CellBuilder {
            data: Vec::with_capacity(128),
            bit_len: 0,
            references: Vec::new(),
        }
    }

    /// Store a single bit.
    pub fn store_bit(&mut self, bit: bool) -> CellResult<&mut Self> {
        if self.bit_len >= MAX_CELL_BITS {
            return Err(CellError::DataTooLong(self.bit_len + 1));
        }

        let byte_index = self.bit_len / 8;
        let bit_index = 7 - (self.bit_len % 8);

        if byte_index >= self.data.len() {
            self.data.push(0);
        }

        if bit {
            self.data[byte_index] |= 1 << bit_index;
        }

        self.bit_len += 1;
        Ok(self)
    }

    /// Store an unsigned 8-bit integer.
    pub fn store_u8(&mut self, value: u8) -> CellResult<&mut Self> {
        self.store_uint(value as u64, 8)
    }

    /// Store an unsigned 16-bit integer (big-endian).
    pub fn store_u16(&mut self, value: u16) -> CellResult<&mut Self> {
        self.store_uint(value as u64, 16)
    }

    /// Store an unsigned 32-bit integer (big-endian).
    pub fn store_u32(&mut self, value: u32) -> CellResult<&mut Self> {
        self.store_uint(value as u64, 32)
    }

    /// Store an unsigned 64-bit integer (big-endian).
    pub fn store_u64(&mut self, value: u64) -> CellResult<&mut Self> {
        self.store_uint(value, 64)
    }

    /// Store a signed 8-bit integer.
    pub fn store_i8(&mut self, value: i8) -> CellResult<&mut Self> {
        self.store_int(value as i64, 8)
    }

    /// Store a signed 32-bit integer (big-endian).
    pub fn store_i32(&mut self, value: i32) -> CellResult<&mut Self> {
        self.store_int(value as i64, 32)
    }

    /// Store an unsigned integer with a specific bit width (big-endian).
    pub fn store_uint(&mut self, value: u64, bits: usize) -> CellResult<&mut Self> {
        if bits == 0 {
            return Ok(self);
        }

        if bits > 64 {
            return Err(CellError::InvalidBitLength(bits));
        }

        if self.bit_len + bits > MAX_CELL_BITS {
            return Err(CellError::DataTooLong(self.bit_len + bits));
        }

        for i in (0..bits).rev() {
            self.store_bit((value >> i) & 1 == 1)?;
        }

        Ok(self)
    }

    /// Store a signed integer with a specific bit width (two's complement).
    pub fn store_int(&mut self, value: i64, bits: usize) -> CellResult<&mut Self> {
        if bits > 64 {
            return Err(CellError::InvalidBitLength(bits));
        }
        self.store_uint(value as u64, bits)
    }

    /// Store a byte array.
    pub fn store_bytes(&mut self, bytes: &[u8]) -> CellResult<&mut Self> {
        if self.bit_len + bytes.len() * 8 > MAX_CELL_BITS {
            return Err(CellError::DataTooLong(self.bit_len + bytes.len() * 8));
        }
        for &byte in bytes {
            self.store_u8(byte)?;
        }
        Ok(self)
    }

    /// Append another cell's bits and references.
    pub fn store_cell(&mut self, cell: &Cell) -> CellResult<&mut Self> {
        if self.bit_len + cell.bit_len() > MAX_CELL_BITS {
            return Err(CellError::DataTooLong(self.bit_len + cell.bit_len()));
        }
        for i in 0..cell.bit_len() {
            self.store_bit(cell.get_bit(i).unwrap_or_default())?;
        }
        for reference in cell.references() {
            self.store_ref(reference.clone())?;
        }
        Ok(self)
    }

    /// Store a reference to another cell.
    pub fn store_ref(&mut self, cell: Arc<Cell>) -> CellResult<&mut Self> {
        if self.references.len() >= MAX_CELL_REFS {
            return Err(CellError::TooManyRefs(self.references.len() + 1));
        }

        self.references.push(cell);
        Ok(self)
    }

    /// Store `Maybe ^Cell`: a presence bit, then the reference if present.
    pub fn store_maybe_ref(&mut self, cell: Option<Arc<Cell>>) -> CellResult<&mut Self> {
        match cell {
            Some(cell) => {
                self.store_bit(true)?;
                self.store_ref(cell)
            }
            None => self.store_bit(false),
        }
    }

    /// Store coins (VarUInteger 16).
    ///
    /// Format: 4 bits for byte length, then the value in that many bytes.
    pub fn store_coins(&mut self, nanotons: u128) -> CellResult<&mut Self> {
        if nanotons > MAX_COINS {
            return Err(CellError::CoinsOutOfRange(nanotons));
        }

        if nanotons == 0 {
            return self.store_uint(0, 4);
        }

        let bytes_needed = (128 - nanotons.leading_zeros()).div_ceil(8) as usize;
        self.store_uint(bytes_needed as u64, 4)?;

        for i in (0..bytes_needed).rev() {
            self.store_u8((nanotons >> (i * 8)) as u8)?;
        }

        Ok(self)
    }

    /// Store `addr_std$10 anycast:none workchain_id:int8 address:bits256`.
    pub fn store_address(&mut self, addr: &Address) -> CellResult<&mut Self> {
        self.store_uint(0b10, 2)?;
        self.store_bit(false)?;
        self.store_i8(addr.workchain)?;
        self.store_bytes(&addr.hash)
    }

    /// Store `addr_none$00`.
    pub fn store_address_none(&mut self) -> CellResult<&mut Self> {
        self.store_uint(0b00, 2)
    }

    /// Store an optional address, writing `addr_none` for `None`.
    pub fn store_maybe_address(&mut self, addr: Option<&Address>) -> CellResult<&mut Self> {
        match addr {
            Some(addr) => self.store_address(addr),
            None => self.store_address_none(),
        }
    }

    /// Store a UTF-8 string as a snake: fill this cell, then continue in a
    /// chain of single child references.
    pub fn store_string_tail(&mut self, text: &str) -> CellResult<&mut Self> {
        let bytes = text.as_bytes();
        let head_len = (self.bits_left() / 8).min(bytes.len());
        let (head, tail) = bytes.split_at(head_len);

        self.store_bytes(head)?;
        if !tail.is_empty() {
            let child = Self::snake_cell(tail)?;
            self.store_ref(Arc::new(child))?;
        }
        Ok(self)
    }

    fn snake_cell(bytes: &[u8]) -> CellResult<Cell> {
        let chunk = MAX_CELL_BITS / 8;
        let (head, tail) = bytes.split_at(chunk.min(bytes.len()));

        let mut builder = CellBuilder::new();
        builder.store_bytes(head)?;
        if !tail.is_empty() {
            builder.store_ref(Arc::new(Self::snake_cell(tail)?))?;
        }
        builder.build()
    }

    /// Get the number of bits that can still be stored.
    pub fn bits_left(&self) -> usize {
        MAX_CELL_BITS - self.bit_len
    }

    /// Get the number of references that can still be added.
    pub fn refs_left(&self) -> usize {
        MAX_CELL_REFS - self.references.len()
    }

    /// Get the current number of bits stored.
    pub fn bit_len(&self) -> usize {
        self.bit_len
    }

    /// Get the current number of references.
    pub fn ref_count(&self) -> usize {
        self.references.len()
    }

    /// Build the cell.
    pub fn build(self) -> CellResult<Cell> {
        Ok(Cell::new(self.data, self.bit_len, self.references))
    }
}

impl Default for CellBuilder {
    fn default() -> Self {
        Self::new()
    }
}
