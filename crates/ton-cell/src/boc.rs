//! Bag of Cells (BoC) serialization format.
//!
//! BoC is the standard serialization format for TON cells. It encodes a DAG
//! of cells with deduplication and an optional CRC32C checksum. Cells are
//! written parents first with the root at index 0, the order nodes and
//! wallet apps expect for external messages.

use std::collections::HashMap;
use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::{BOC_GENERIC_MAGIC, Cell, CellError, CellResult, crc32c};

/// Bag of Cells - a serialized collection of cells.
#[derive(Debug, Clone)]
pub struct BagOfCells {
    roots: Vec<Arc<Cell>>,
}

impl BagOfCells {
    /// Create a new BoC with the given root cells.
    pub fn new(roots: Vec<Arc<Cell>>) -> Self {
        BagOfCells { roots }
    }

    /// Create a BoC with a single root cell.
    pub fn from_root(root: Cell) -> Self {
        BagOfCells {
            roots: vec![Arc::new(root)],
        }
    }

    /// Get all root cells.
    pub fn roots(&self) -> &[Arc<Cell>] {
        &self.roots
    }

    /// Get a single root cell (errors if not exactly one root).
    pub fn single_root(&self) -> CellResult<&Arc<Cell>> {
        match self.roots.as_slice() {
            [root] => Ok(root),
            roots => Err(CellError::NotSingleRoot(roots.len())),
        }
    }

    /// Get the number of root cells.
    pub fn root_count(&self) -> usize {
        self.roots.len()
    }

    /// Serialize with a CRC32C checksum and no index.
    pub fn serialize(&self) -> CellResult<Vec<u8>> {
        self.serialize_with_options(true, false)
    }

    /// Serialize with options.
    ///
    /// # Arguments
    /// * `with_crc` - Include CRC32 checksum
    /// * `with_index` - Include cell offset index
    pub fn serialize_with_options(&self, with_crc: bool, with_index: bool) -> CellResult<Vec<u8>> {
        if self.roots.is_empty() {
            return Err(CellError::InvalidBoc("No root cells".to_string()));
        }

        let cells = self.collect_cells_parent_first();
        let cell_count = cells.len();

        let hash_to_index: HashMap<[u8; 32], usize> = cells
            .iter()
            .enumerate()
            .map(|(i, c)| (c.hash(), i))
            .collect();

        let root_indices = self
            .roots
            .iter()
            .map(|r| {
                hash_to_index
                    .get(&r.hash())
                    .copied()
                    .ok_or_else(|| CellError::InvalidBoc("Root not collected".to_string()))
            })
            .collect::<CellResult<Vec<usize>>>()?;

        let size_bytes = Self::bytes_needed(cell_count);
        let mut cell_data: Vec<Vec<u8>> = Vec::with_capacity(cell_count);
        let mut total_cells_size = 0usize;

        for cell in &cells {
            let serialized = Self::serialize_cell(cell, &hash_to_index, size_bytes)?;
            total_cells_size += serialized.len();
            cell_data.push(serialized);
        }

        let off_bytes = Self::bytes_needed(total_cells_size);

        let mut result = Vec::with_capacity(total_cells_size + 32);
        result.extend_from_slice(&BOC_GENERIC_MAGIC.to_be_bytes());

        // has_idx (bit 7) | has_crc (bit 6) | has_cache_bits (bit 5) | flags (bits 4-3) | size_bytes (bits 2-0)
        let flags: u8 = (if with_index { 1 << 7 } else { 0 })
            | (if with_crc { 1 << 6 } else { 0 })
            | (size_bytes as u8);
        result.push(flags);
        result.push(off_bytes as u8);

        Self::write_uint(&mut result, cell_count as u64, size_bytes);
        Self::write_uint(&mut result, self.roots.len() as u64, size_bytes);
        Self::write_uint(&mut result, 0, size_bytes);
        Self::write_uint(&mut result, total_cells_size as u64, off_bytes);

        for idx in &root_indices {
            Self::write_uint(&mut result, *idx as u64, size_bytes);
        }

        if with_index {
            let mut offset = 0usize;
            for data in &cell_data {
                offset += data.len();
                Self::write_uint(&mut result, offset as u64, off_bytes);
            }
        }

        for data in cell_data {
            result.extend_from_slice(&data);
        }

        if with_crc {
            let crc = crc32c(&result);
            result.extend_from_slice(&crc.to_le_bytes());
        }

        Ok(result)
    }

    /// Serialize to a standard base64 string.
    pub fn serialize_to_base64(&self) -> CellResult<String> {
        Ok(STANDARD.encode(self.serialize()?))
    }

    /// Deserialize a generic (`b5ee9c72`) BoC.
    ///
    /// Cells may appear parents first or children first.
    pub fn deserialize(data: &[u8]) -> CellResult<Self> {
        let mut offset = 0;

        let magic = Self::read_uint(data, &mut offset, 4)? as u32;
        if magic != BOC_GENERIC_MAGIC {
            return Err(CellError::InvalidBoc(format!(
                "Invalid magic: {magic:08x}, expected {BOC_GENERIC_MAGIC:08x}"
            )));
        }

        let flags = Self::read_uint(data, &mut offset, 1)? as u8;
        let has_idx = flags & 0x80 != 0;
        let has_crc = flags & 0x40 != 0;
        let size_bytes = (flags & 0x07) as usize;
        if size_bytes == 0 || size_bytes > 4 {
            return Err(CellError::InvalidBoc(format!("Invalid size bytes: {size_bytes}")));
        }

        let off_bytes = Self::read_uint(data, &mut offset, 1)? as usize;
        if off_bytes == 0 || off_bytes > 8 {
            return Err(CellError::InvalidBoc(format!("Invalid offset bytes: {off_bytes}")));
        }

        let cells_count = Self::read_uint(data, &mut offset, size_bytes)? as usize;
        let roots_count = Self::read_uint(data, &mut offset, size_bytes)? as usize;
        let _absent_count = Self::read_uint(data, &mut offset, size_bytes)?;
        let total_cells_size = Self::read_uint(data, &mut offset, off_bytes)? as usize;

        let mut root_indices = Vec::with_capacity(roots_count.min(cells_count));
        for _ in 0..roots_count {
            root_indices.push(Self::read_uint(data, &mut offset, size_bytes)? as usize);
        }

        if has_idx {
            offset = offset
                .checked_add(cells_count.saturating_mul(off_bytes))
                .ok_or(CellError::UnexpectedEof)?;
        }

        let data_end = if has_crc {
            let end = data.len().checked_sub(4).ok_or(CellError::UnexpectedEof)?;
            let expected = u32::from_le_bytes([data[end], data[end + 1], data[end + 2], data[end + 3]]);
            let actual = crc32c(&data[..end]);
            if expected != actual {
                return Err(CellError::CrcMismatch { expected, actual });
            }
            end
        } else {
            data.len()
        };

        let cells_end = offset
            .checked_add(total_cells_size)
            .filter(|end| *end <= data_end)
            .ok_or(CellError::UnexpectedEof)?;
        let cells = Self::parse_cells(&data[offset..cells_end], cells_count, size_bytes)?;

        let roots = root_indices
            .iter()
            .map(|&idx| cells.get(idx).cloned().ok_or(CellError::CellNotFound(idx)))
            .collect::<CellResult<Vec<_>>>()?;

        Ok(BagOfCells { roots })
    }

    /// Deserialize from a base64 string (either alphabet).
    pub fn deserialize_from_base64(base64_str: &str) -> CellResult<Self> {
        let trimmed = base64_str.trim();
        let bytes = STANDARD
            .decode(trimmed)
            .or_else(|_| base64::engine::general_purpose::URL_SAFE.decode(trimmed))
            .map_err(|e| CellError::InvalidBase64(e.to_string()))?;

        Self::deserialize(&bytes)
    }

    /// Deserialize from a hex string.
    pub fn deserialize_from_hex(hex_str: &str) -> CellResult<Self> {
        let bytes = hex::decode(hex_str.trim())
            .map_err(|e| CellError::InvalidBoc(format!("invalid hex string: {e}")))?;
        Self::deserialize(&bytes)
    }

    /// Collect all distinct cells so that every parent precedes its children.
    fn collect_cells_parent_first(&self) -> Vec<Arc<Cell>> {
        let mut post_order: Vec<Arc<Cell>> = Vec::new();
        let mut visited: HashMap<[u8; 32], ()> = HashMap::new();

        for root in self.roots.iter().rev() {
            Self::collect_cell_recursive(root, &mut post_order, &mut visited);
        }

        post_order.reverse();
        post_order
    }

    /// Depth-first, post-order; children visited last-to-first so the
    /// reversed list keeps refs in declaration order.
    fn collect_cell_recursive(
        cell: &Arc<Cell>,
        cells: &mut Vec<Arc<Cell>>,
        visited: &mut HashMap<[u8; 32], ()>,
    ) {
        if visited.insert(cell.hash(), ()).is_some() {
            return;
        }

        for reference in cell.references().iter().rev() {
            Self::collect_cell_recursive(reference, cells, visited);
        }

        cells.push(cell.clone());
    }

    fn serialize_cell(
        cell: &Cell,
        hash_to_index: &HashMap<[u8; 32], usize>,
        ref_size: usize,
    ) -> CellResult<Vec<u8>> {
        let mut result = Vec::with_capacity(2 + cell.bit_len().div_ceil(8) + 4 * ref_size);

        let (d1, d2) = cell.descriptors();
        result.push(d1);
        result.push(d2);
        result.extend_from_slice(&cell.data_with_completion_tag());

        for reference in cell.references() {
            let idx = hash_to_index
                .get(&reference.hash())
                .ok_or_else(|| CellError::InvalidBoc("Reference not found".to_string()))?;
            Self::write_uint(&mut result, *idx as u64, ref_size);
        }

        Ok(result)
    }

    fn parse_cells(data: &[u8], cell_count: usize, size_bytes: usize) -> CellResult<Vec<Arc<Cell>>> {
        let mut offset = 0;
        let mut cell_infos: Vec<(Vec<u8>, usize, Vec<usize>)> = Vec::with_capacity(cell_count.min(data.len()));

        for _ in 0..cell_count {
            let d1 = Self::read_uint(data, &mut offset, 1)? as u8;
            let d2 = Self::read_uint(data, &mut offset, 1)? as u8;

            if d1 & 0x08 != 0 {
                return Err(CellError::ExoticCell);
            }
            let refs_count = (d1 & 0x07) as usize;
            if refs_count > crate::MAX_CELL_REFS {
                return Err(CellError::TooManyRefs(refs_count));
            }

            let data_len = (d2 as usize).div_ceil(2);
            let cell_data = data
                .get(offset..offset + data_len)
                .ok_or(CellError::UnexpectedEof)?
                .to_vec();
            offset += data_len;

            let mut ref_indices = Vec::with_capacity(refs_count);
            for _ in 0..refs_count {
                let ref_idx = Self::read_uint(data, &mut offset, size_bytes)? as usize;
                if ref_idx >= cell_count {
                    return Err(CellError::CellNotFound(ref_idx));
                }
                ref_indices.push(ref_idx);
            }

            let bit_len = if d2 % 2 == 1 {
                Self::find_bit_len(&cell_data)
            } else {
                data_len * 8
            };
            if bit_len > crate::MAX_CELL_BITS {
                return Err(CellError::DataTooLong(bit_len));
            }

            cell_infos.push((cell_data, bit_len, ref_indices));
        }

        // Parent-first bags are built from the end, child-first from the start.
        let refs_point_higher = cell_infos
            .iter()
            .enumerate()
            .find_map(|(i, (_, _, refs))| (!refs.is_empty()).then(|| refs.iter().all(|&r| r > i)))
            .unwrap_or(false);

        let iteration_order: Vec<usize> = if refs_point_higher {
            (0..cell_count).rev().collect()
        } else {
            (0..cell_count).collect()
        };

        let mut cells: Vec<Option<Arc<Cell>>> = vec![None; cell_count];
        for i in iteration_order {
            let (data, bit_len, ref_indices) = &cell_infos[i];

            let references = ref_indices
                .iter()
                .map(|&idx| cells[idx].clone().ok_or(CellError::CellNotFound(idx)))
                .collect::<CellResult<Vec<_>>>()?;

            cells[i] = Some(Arc::new(Cell::new(
                Self::remove_completion_tag(data, *bit_len),
                *bit_len,
                references,
            )));
        }

        cells
            .into_iter()
            .enumerate()
            .map(|(i, c)| c.ok_or(CellError::CellNotFound(i)))
            .collect()
    }

    /// Bit length of data ending in a completion tag (a 1 followed by zeros).
    fn find_bit_len(data: &[u8]) -> usize {
        for i in (0..data.len()).rev() {
            let byte = data[i];
            if byte != 0 {
                return (i + 1) * 8 - byte.trailing_zeros() as usize - 1;
            }
        }
        0
    }

    fn remove_completion_tag(data: &[u8], bit_len: usize) -> Vec<u8> {
        let mut result = data[..bit_len.div_ceil(8)].to_vec();

        let remainder = bit_len % 8;
        if remainder != 0
            && let Some(last) = result.last_mut()
        {
            *last &= !((1u8 << (8 - remainder)) - 1);
        }

        result
    }

    /// Calculate bytes needed to represent a number.
    fn bytes_needed(n: usize) -> usize {
        if n == 0 {
            1
        } else {
            ((64 - (n as u64).leading_zeros()) + 7) as usize / 8
        }
    }

    fn write_uint(buf: &mut Vec<u8>, value: u64, bytes: usize) {
        for i in (0..bytes).rev() {
            buf.push((value >> (i * 8)) as u8);
        }
    }

    fn read_uint(data: &[u8], offset: &mut usize, bytes: usize) -> CellResult<u64> {
        let chunk = data
            .get(*offset..*offset + bytes)
            .ok_or(CellError::UnexpectedEof)?;
        *offset += bytes;
        Ok(chunk.iter().fold(0u64, |acc, &b| (acc << 8) | b as u64))
    }
}
