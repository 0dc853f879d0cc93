//! HPACK header block decoding.

use super::huffman;
use super::table::{DynamicTable, HeaderField, StaticTable};

/// HPACK decoding error. Any of these leaves the compression state
/// desynchronized from the peer, so callers must treat them as fatal
/// to the connection.
#[derive(Debug)]
pub enum HpackError {
    /// Input ended mid-representation.
    Incomplete,
    /// Integer continuation ran past the supported range.
    InvalidInteger,
    /// Huffman-coded string failed to decode.
    InvalidHuffman(huffman::HuffmanError),
    /// Index outside the static and dynamic tables.
    InvalidIndex(usize),
    /// Size update above the negotiated bound.
    InvalidTableSize,
}

impl std::fmt::Display for HpackError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HpackError::Incomplete => f.write_str("incomplete header block"),
            HpackError::InvalidInteger => f.write_str("invalid integer encoding"),
            HpackError::InvalidHuffman(e) => write!(f, "invalid Huffman string: {e}"),
            HpackError::InvalidIndex(idx) => write!(f, "invalid table index {idx}"),
            HpackError::InvalidTableSize => f.write_str("table size update above limit"),
        }
    }
}

impl std::error::Error for HpackError {}

impl From<huffman::HuffmanError> for HpackError {
    fn from(e: huffman::HuffmanError) -> Self {
        HpackError::InvalidHuffman(e)
    }
}

/// Stateful header block decoder. One per connection, receive side.
pub struct HpackDecoder {
    dynamic_table: DynamicTable,
    /// Upper bound for size updates, set by local SETTINGS.
    max_table_size: usize,
}

impl Default for HpackDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HpackDecoder {
    pub fn new() -> Self {
        Self::with_table_size(super::DEFAULT_TABLE_SIZE)
    }

    pub fn with_table_size(size: usize) -> Self {
        Self {
            dynamic_table: DynamicTable::new(size),
            max_table_size: size,
        }
    }

    /// Set the bound that dynamic table size updates may not exceed.
    pub fn set_max_table_size(&mut self, size: usize) {
        self.max_table_size = size;
    }

    /// Decode a complete header block into its field list.
    pub fn decode(&mut self, data: &[u8]) -> Result<Vec<HeaderField>, HpackError> {
        let mut headers = Vec::new();
        let mut pos = 0;

        while pos < data.len() {
            let (header, consumed) = self.decode_representation(&data[pos..])?;
            if let Some(h) = header {
                headers.push(h);
            }
            pos += consumed;
        }

        Ok(headers)
    }

    /// Decode one representation, dispatching on the leading bits.
    fn decode_representation(
        &mut self,
        data: &[u8],
    ) -> Result<(Option<HeaderField>, usize), HpackError> {
        let first = *data.first().ok_or(HpackError::Incomplete)?;

        if first & 0x80 != 0 {
            // 1xxxxxxx: indexed field
            let (index, consumed) = decode_integer(data, 7)?;
            let header = self.lookup(index)?;
            Ok((Some(header), consumed))
        } else if first & 0x40 != 0 {
            // 01xxxxxx: literal with incremental indexing
            let (header, consumed) = self.decode_literal(data, 6)?;
            self.dynamic_table.insert(header.clone());
            Ok((Some(header), consumed))
        } else if first & 0x20 != 0 {
            // 001xxxxx: dynamic table size update
            let (new_size, consumed) = decode_integer(data, 5)?;
            if new_size > self.max_table_size {
                return Err(HpackError::InvalidTableSize);
            }
            self.dynamic_table.set_max_size(new_size);
            Ok((None, consumed))
        } else {
            // 0000xxxx: literal without indexing
            // 0001xxxx: literal never indexed
            // Neither touches the dynamic table on receive; the flag
            // only constrains re-encoding by intermediaries.
            let (header, consumed) = self.decode_literal(data, 4)?;
            Ok((Some(header), consumed))
        }
    }

    /// Decode a literal representation: indexed-or-literal name, then a
    /// literal value.
    fn decode_literal(
        &self,
        data: &[u8],
        prefix_bits: u8,
    ) -> Result<(HeaderField, usize), HpackError> {
        let (name_index, mut consumed) = decode_integer(data, prefix_bits)?;

        let name = if name_index > 0 {
            self.lookup(name_index)?.name
        } else {
            let (n, c) = decode_string(&data[consumed..])?;
            consumed += c;
            n
        };

        let (value, c) = decode_string(&data[consumed..])?;
        consumed += c;

        Ok((HeaderField::new(name, value), consumed))
    }

    /// Resolve a combined index: static table 1..=61, dynamic after.
    fn lookup(&self, index: usize) -> Result<HeaderField, HpackError> {
        if index == 0 {
            return Err(HpackError::InvalidIndex(0));
        }

        if index <= StaticTable::len() {
            let (name, value) = StaticTable::get(index).ok_or(HpackError::InvalidIndex(index))?;
            Ok(HeaderField::new(name.to_vec(), value.to_vec()))
        } else {
            self.dynamic_table
                .get(index - StaticTable::len() - 1)
                .cloned()
                .ok_or(HpackError::InvalidIndex(index))
        }
    }
}

/// Decode a prefix integer (RFC 7541 section 5.1).
fn decode_integer(data: &[u8], prefix_bits: u8) -> Result<(usize, usize), HpackError> {
    if data.is_empty() {
        return Err(HpackError::Incomplete);
    }

    let max_prefix = (1usize << prefix_bits) - 1;
    let mut value = (data[0] as usize) & max_prefix;
    let mut consumed = 1;

    if value < max_prefix {
        return Ok((value, consumed));
    }

    let mut shift = 0;
    loop {
        let byte = *data.get(consumed).ok_or(HpackError::Incomplete)? as usize;
        consumed += 1;

        value += (byte & 0x7f) << shift;
        shift += 7;

        if byte & 0x80 == 0 {
            break;
        }

        if shift > 28 {
            return Err(HpackError::InvalidInteger);
        }
    }

    Ok((value, consumed))
}

/// Decode a string literal (RFC 7541 section 5.2).
fn decode_string(data: &[u8]) -> Result<(Vec<u8>, usize), HpackError> {
    if data.is_empty() {
        return Err(HpackError::Incomplete);
    }

    let huffman = (data[0] & 0x80) != 0;
    let (length, mut consumed) = decode_integer(data, 7)?;

    if consumed + length > data.len() {
        return Err(HpackError::Incomplete);
    }

    let string_data = &data[consumed..consumed + length];
    consumed += length;

    let result = if huffman {
        let mut decoded = Vec::with_capacity(length * 2);
        huffman::decode(string_data, &mut decoded)?;
        decoded
    } else {
        string_data.to_vec()
    };

    Ok((result, consumed))
}
