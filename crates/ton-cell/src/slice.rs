//! CellSlice for reading data from TON cells.
//!
//! A CellSlice sequentially reads data from a cell, tracking the current
//! position within the cell's data and references.

use crate::{Address, Cell, CellError, CellResult};

/// A slice view into a Cell for reading data.
///
/// # Example
///
/// ```
/// use ton_cell::{CellBuilder, CellSlice};
///
/// let mut builder = CellBuilder::new();
/// builder.store_u32(0x12345678).unwrap();
/// let cell = builder.build().unwrap();
///
/// let mut slice = CellSlice::new(&cell);
/// assert_eq!(slice.load_u32().unwrap(), 0x12345678);
/// ```
#[derive(Debug, Clone)]
pub struct CellSlice<'a> {
    cell: &'a Cell,
    bit_offset: usize,
    bit_len: usize,
    ref_offset: usize,
}

impl<'a> CellSlice<'a> {
    /// Create a new slice from a cell.
    pub fn new(cell: &'a Cell) -> Self {
        CellSlice {
            cell,
            bit_offset: 0,
            bit_len: cell.bit_len(),
            ref_offset: 0,
        }
    }

    /// Load a single bit.
    pub fn load_bit(&mut self) -> CellResult<bool> {
        if self.bit_len == 0 {
            return Err(CellError::NotEnoughBits { need: 1, have: 0 });
        }

        let byte_index = self.bit_offset / 8;
        let bit_index = 7 - (self.bit_offset % 8);
        let bit = (self.cell.data()[byte_index] >> bit_index) & 1 == 1;

        self.bit_offset += 1;
        self.bit_len -= 1;
        Ok(bit)
    }

    /// Load an unsigned 8-bit integer.
    pub fn load_u8(&mut self) -> CellResult<u8> {
        self.load_uint(8).map(|v| v as u8)
    }

    /// Load an unsigned 16-bit integer (big-endian).
    pub fn load_u16(&mut self) -> CellResult<u16> {
        self.load_uint(16).map(|v| v as u16)
    }

    /// Load an unsigned 32-bit integer (big-endian).
    pub fn load_u32(&mut self) -> CellResult<u32> {
        self.load_uint(32).map(|v| v as u32)
    }

    /// Load an unsigned 64-bit integer (big-endian).
    pub fn load_u64(&mut self) -> CellResult<u64> {
        self.load_uint(64)
    }

    /// Load a signed 8-bit integer.
    pub fn load_i8(&mut self) -> CellResult<i8> {
        self.load_int(8).map(|v| v as i8)
    }

    /// Load a signed 32-bit integer (big-endian).
    pub fn load_i32(&mut self) -> CellResult<i32> {
        self.load_int(32).map(|v| v as i32)
    }

    /// Load an unsigned integer with a specific bit width.
    pub fn load_uint(&mut self, bits: usize) -> CellResult<u64> {
        if bits > 64 {
            return Err(CellError::InvalidBitLength(bits));
        }

        if bits > self.bit_len {
            return Err(CellError::NotEnoughBits {
                need: bits,
                have: self.bit_len,
            });
        }

        let mut result: u64 = 0;
        for _ in 0..bits {
            result = (result << 1) | (self.load_bit()? as u64);
        }

        Ok(result)
    }

    /// Load a signed integer with a specific bit width (two's complement).
    pub fn load_int(&mut self, bits: usize) -> CellResult<i64> {
        let unsigned = self.load_uint(bits)?;

        if bits == 0 || bits == 64 {
            return Ok(unsigned as i64);
        }

        let sign_bit = 1u64 << (bits - 1);
        if unsigned & sign_bit != 0 {
            Ok((unsigned | !((1u64 << bits) - 1)) as i64)
        } else {
            Ok(unsigned as i64)
        }
    }

    /// Load a byte array.
    pub fn load_bytes(&mut self, count: usize) -> CellResult<Vec<u8>> {
        if count * 8 > self.bit_len {
            return Err(CellError::NotEnoughBits {
                need: count * 8,
                have: self.bit_len,
            });
        }

        (0..count).map(|_| self.load_u8()).collect()
    }

    /// Load a reference to another cell.
    pub fn load_ref(&mut self) -> CellResult<&'a Cell> {
        let reference = self
            .cell
            .reference(self.ref_offset)
            .ok_or(CellError::NotEnoughRefs { need: 1, have: 0 })?;
        self.ref_offset += 1;
        Ok(reference.as_ref())
    }

    /// Load coins (VarUInteger 16).
    pub fn load_coins(&mut self) -> CellResult<u128> {
        let byte_len = self.load_uint(4)? as usize;

        let mut result: u128 = 0;
        for _ in 0..byte_len {
            result = (result << 8) | (self.load_u8()? as u128);
        }

        Ok(result)
    }

    /// Load a message address: `None` for `addr_none`, the account for
    /// `addr_std`. External and variable-length addresses are rejected.
    pub fn load_address(&mut self) -> CellResult<Option<Address>> {
        match self.load_uint(2)? {
            0b00 => Ok(None),
            0b10 => {
                if self.load_bit()? {
                    // anycast: depth:(#<= 30) rewrite_pfx:(bits depth)
                    let depth = self.load_uint(5)? as usize;
                    self.skip_bits(depth)?;
                }

                let workchain = self.load_i8()?;
                let mut hash = [0u8; 32];
                hash.copy_from_slice(&self.load_bytes(32)?);
                Ok(Some(Address::new(workchain, hash)))
            }
            other => Err(CellError::InvalidAddress(format!(
                "unsupported address kind: {other:02b}"
            ))),
        }
    }

    /// Load the rest of a snake string: remaining whole bytes of this cell
    /// followed by the first reference chain.
    pub fn load_string_tail(&mut self) -> CellResult<String> {
        let mut bytes = self.load_bytes(self.bit_len / 8)?;
        let mut next = self.cell.reference(self.ref_offset).map(|r| r.as_ref());

        while let Some(cell) = next {
            let mut slice = CellSlice::new(cell);
            bytes.extend(slice.load_bytes(cell.bit_len() / 8)?);
            next = cell.reference(0).map(|r| r.as_ref());
        }

        String::from_utf8(bytes).map_err(|_| CellError::InvalidUtf8)
    }

    /// Get the number of bits remaining.
    pub fn bits_left(&self) -> usize {
        self.bit_len
    }

    /// Get the number of references remaining.
    pub fn refs_left(&self) -> usize {
        self.cell.reference_count() - self.ref_offset
    }

    /// Skip a number of bits.
    pub fn skip_bits(&mut self, count: usize) -> CellResult<()> {
        if count > self.bit_len {
            return Err(CellError::NotEnoughBits {
                need: count,
                have: self.bit_len,
            });
        }

        self.bit_offset += count;
        self.bit_len -= count;
        Ok(())
    }

    /// Check if the slice is empty (no bits or refs left).
    pub fn is_empty(&self) -> bool {
        self.bit_len == 0 && self.refs_left() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CellBuilder;

    #[test]
    fn test_load_bit() {
        let mut builder = CellBuilder::new();
        builder.store_bit(true).unwrap();
        builder.store_bit(false).unwrap();
        let cell = builder.build().unwrap();

        let mut slice = CellSlice::new(&cell);
        assert!(slice.load_bit().unwrap());
        assert!(!slice.load_bit().unwrap());
        assert!(slice.load_bit().is_err());
    }

    #[test]
    fn test_load_int_negative() {
        let mut builder = CellBuilder::new();
        builder.store_int(-15, 8).unwrap();
        let cell = builder.build().unwrap();

        let mut slice = CellSlice::new(&cell);
        assert_eq!(slice.load_int(8).unwrap(), -15);
    }

    #[test]
    fn test_load_ref_exhausted() {
        let cell = CellBuilder::new().build().unwrap();
        let mut slice = CellSlice::new(&cell);
        assert!(matches!(slice.load_ref(), Err(CellError::NotEnoughRefs { .. })));
    }

    #[test]
    fn test_external_address_rejected() {
        let mut builder = CellBuilder::new();
        builder.store_uint(0b01, 2).unwrap();
        builder.store_uint(0, 9).unwrap();
        let cell = builder.build().unwrap();
        assert!(CellSlice::new(&cell).load_address().is_err());
    }

    #[test]
    fn test_string_tail_invalid_utf8() {
        let mut builder = CellBuilder::new();
        builder.store_bytes(&[0xff, 0xfe]).unwrap();
        let cell = builder.build().unwrap();
        assert!(matches!(
            CellSlice::new(&cell).load_string_tail(),
            Err(CellError::InvalidUtf8)
        ));
    }
}
