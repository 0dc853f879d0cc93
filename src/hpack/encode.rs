//! HPACK header block encoding.

use super::huffman;
use super::table::{DynamicTable, HeaderField, StaticTable};

/// A header to encode, with its indexing policy.
///
/// `index` requests insertion into the dynamic table so later blocks
/// can refer back by index. `never_index` marks sensitive values
/// (credentials, cookies) that must never enter either endpoint's
/// table; it overrides `index`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderEntry {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
    pub index: bool,
    pub never_index: bool,
}

impl HeaderEntry {
    /// An ordinary header, eligible for dynamic table indexing.
    pub fn new(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            index: true,
            never_index: false,
        }
    }

    /// A sensitive header, emitted as never-indexed.
    pub fn sensitive(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            index: false,
            never_index: true,
        }
    }

    /// A header emitted without indexing, for one-off values not worth
    /// a table slot.
    pub fn without_indexing(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            index: false,
            never_index: false,
        }
    }
}

impl From<HeaderField> for HeaderEntry {
    fn from(field: HeaderField) -> Self {
        Self::new(field.name, field.value)
    }
}

/// Stateful header block encoder. One per connection, send side.
pub struct HpackEncoder {
    dynamic_table: DynamicTable,
    use_huffman: bool,
    /// Table size update to prepend to the next block, if any.
    pending_size_update: Option<usize>,
}

impl Default for HpackEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl HpackEncoder {
    pub fn new() -> Self {
        Self::with_table_size(super::DEFAULT_TABLE_SIZE)
    }

    pub fn with_table_size(size: usize) -> Self {
        Self {
            dynamic_table: DynamicTable::new(size),
            use_huffman: true,
            pending_size_update: None,
        }
    }

    /// Disable Huffman coding of string literals.
    pub fn set_use_huffman(&mut self, use_huffman: bool) {
        self.use_huffman = use_huffman;
    }

    /// Shrink or grow the dynamic table. The peer learns of the change
    /// through a size update at the start of the next header block.
    pub fn set_max_table_size(&mut self, size: usize) {
        self.dynamic_table.set_max_size(size);
        self.pending_size_update = Some(size);
    }

    /// Encode a header list into one header block.
    pub fn encode(&mut self, headers: &[HeaderEntry], buf: &mut Vec<u8>) {
        if let Some(size) = self.pending_size_update.take() {
            encode_integer(size, 5, 0x20, buf);
        }

        for header in headers {
            self.encode_header(header, buf);
        }
    }

    fn encode_header(&mut self, header: &HeaderEntry, buf: &mut Vec<u8>) {
        if header.never_index {
            let name_index = self.find_name(&header.name);
            self.encode_literal(name_index, header, 4, 0x10, buf);
            return;
        }

        match self.find(&header.name, &header.value) {
            Some((index, true)) => {
                // Exact name+value match, a single indexed byte pair.
                encode_integer(index, 7, 0x80, buf);
            }
            found => {
                let name_index = found.map(|(index, _)| index).unwrap_or(0);
                if header.index {
                    self.encode_literal(name_index, header, 6, 0x40, buf);
                    self.dynamic_table
                        .insert(HeaderField::new(header.name.clone(), header.value.clone()));
                } else {
                    self.encode_literal(name_index, header, 4, 0x00, buf);
                }
            }
        }
    }

    /// Emit a literal representation with an indexed or literal name.
    fn encode_literal(
        &self,
        name_index: usize,
        header: &HeaderEntry,
        prefix_bits: u8,
        prefix: u8,
        buf: &mut Vec<u8>,
    ) {
        encode_integer(name_index, prefix_bits, prefix, buf);
        if name_index == 0 {
            self.encode_string(&header.name, buf);
        }
        self.encode_string(&header.value, buf);
    }

    /// Find an entry by name and value across both tables, preferring
    /// an exact match. Returns the combined index and whether the
    /// value matched too.
    fn find(&self, name: &[u8], value: &[u8]) -> Option<(usize, bool)> {
        let static_match = StaticTable::find(name, value);
        if let Some((index, true)) = static_match {
            return Some((index, true));
        }

        if let Some((dyn_index, exact)) = self.dynamic_table.find(name, value) {
            let combined = StaticTable::len() + 1 + dyn_index;
            if exact {
                return Some((combined, true));
            }
            // Prefer the static name match: smaller index, stable.
            return Some(static_match.unwrap_or((combined, false)));
        }

        static_match
    }

    fn find_name(&self, name: &[u8]) -> usize {
        match self.find(name, &[]) {
            Some((index, _)) => index,
            None => 0,
        }
    }

    /// Emit a string literal, Huffman-coded when strictly shorter.
    fn encode_string(&self, data: &[u8], buf: &mut Vec<u8>) {
        if self.use_huffman {
            let encoded_len = huffman::encoded_len(data);
            if encoded_len < data.len() {
                encode_integer(encoded_len, 7, 0x80, buf);
                huffman::encode(data, buf);
                return;
            }
        }

        encode_integer(data.len(), 7, 0x00, buf);
        buf.extend_from_slice(data);
    }
}

/// Encode a prefix integer (RFC 7541 section 5.1).
fn encode_integer(value: usize, prefix_bits: u8, prefix: u8, buf: &mut Vec<u8>) {
    let max_prefix = (1usize << prefix_bits) - 1;

    if value < max_prefix {
        buf.push(prefix | value as u8);
        return;
    }

    buf.push(prefix | max_prefix as u8);
    let mut remainder = value - max_prefix;
    while remainder >= 128 {
        buf.push(0x80 | (remainder & 0x7f) as u8);
        remainder >>= 7;
    }
    buf.push(remainder as u8);
}
