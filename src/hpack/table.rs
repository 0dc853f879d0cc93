//! HPACK static and dynamic tables.

use std::collections::VecDeque;

/// A decoded header field (name-value pair).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: Vec<u8>,
    pub value: Vec<u8>,
}

impl HeaderField {
    pub fn new(name: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    /// Table-accounting size: name + value + 32 (RFC 7541 section 4.1).
    pub fn size(&self) -> usize {
        self.name.len() + self.value.len() + 32
    }
}

/// The static table of RFC 7541 Appendix A. Indices are 1-based;
/// dynamic-table entries follow at index 62 and up.
pub struct StaticTable;

impl StaticTable {
    const ENTRIES: [(&'static [u8], &'static [u8]); 61] = [
        (b":authority", b""),
        (b":method", b"GET"),
        (b":method", b"POST"),
        (b":path", b"/"),
        (b":path", b"/index.html"),
        (b":scheme", b"http"),
        (b":scheme", b"https"),
        (b":status", b"200"),
        (b":status", b"204"),
        (b":status", b"206"),
        (b":status", b"304"),
        (b":status", b"400"),
        (b":status", b"404"),
        (b":status", b"500"),
        (b"accept-charset", b""),
        (b"accept-encoding", b"gzip, deflate"),
        (b"accept-language", b""),
        (b"accept-ranges", b""),
        (b"accept", b""),
        (b"access-control-allow-origin", b""),
        (b"age", b""),
        (b"allow", b""),
        (b"authorization", b""),
        (b"cache-control", b""),
        (b"content-disposition", b""),
        (b"content-encoding", b""),
        (b"content-language", b""),
        (b"content-length", b""),
        (b"content-location", b""),
        (b"content-range", b""),
        (b"content-type", b""),
        (b"cookie", b""),
        (b"date", b""),
        (b"etag", b""),
        (b"expect", b""),
        (b"expires", b""),
        (b"from", b""),
        (b"host", b""),
        (b"if-match", b""),
        (b"if-modified-since", b""),
        (b"if-none-match", b""),
        (b"if-range", b""),
        (b"if-unmodified-since", b""),
        (b"last-modified", b""),
        (b"link", b""),
        (b"location", b""),
        (b"max-forwards", b""),
        (b"proxy-authenticate", b""),
        (b"proxy-authorization", b""),
        (b"range", b""),
        (b"referer", b""),
        (b"refresh", b""),
        (b"retry-after", b""),
        (b"server", b""),
        (b"set-cookie", b""),
        (b"strict-transport-security", b""),
        (b"transfer-encoding", b""),
        (b"user-agent", b""),
        (b"vary", b""),
        (b"via", b""),
        (b"www-authenticate", b""),
    ];

    /// Look up a static entry by its 1-based index.
    pub fn get(index: usize) -> Option<(&'static [u8], &'static [u8])> {
        if index == 0 || index > Self::len() {
            None
        } else {
            Some(Self::ENTRIES[index - 1])
        }
    }

    /// Search for `name`/`value`. Returns the 1-based index and whether
    /// the value matched too; name-only matches report the first entry
    /// with that name.
    pub fn find(name: &[u8], value: &[u8]) -> Option<(usize, bool)> {
        let mut name_match = None;

        for (i, (entry_name, entry_value)) in Self::ENTRIES.iter().enumerate() {
            if *entry_name == name {
                if *entry_value == value {
                    return Some((i + 1, true));
                }
                if name_match.is_none() {
                    name_match = Some(i + 1);
                }
            }
        }

        name_match.map(|i| (i, false))
    }

    pub const fn len() -> usize {
        Self::ENTRIES.len()
    }
}

/// The dynamic table: a FIFO of recently seen header fields, newest at
/// index 0. Both codec directions keep their own instance, and the two
/// stay in sync only through the instructions on the wire.
pub struct DynamicTable {
    entries: VecDeque<HeaderField>,
    size: usize,
    max_size: usize,
}

impl DynamicTable {
    pub(super) fn new(max_size: usize) -> Self {
        Self {
            entries: VecDeque::new(),
            size: 0,
            max_size,
        }
    }

    /// Change the size bound, evicting oldest entries to fit.
    pub(super) fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        while self.size > self.max_size {
            self.evict_oldest();
        }
    }

    /// Entry at `index` counting from the newest (0).
    pub(super) fn get(&self, index: usize) -> Option<&HeaderField> {
        self.entries.get(index)
    }

    /// Insert at the front, evicting from the back to stay within the
    /// size bound. An entry larger than the whole table empties it.
    pub(super) fn insert(&mut self, field: HeaderField) {
        let entry_size = field.size();

        if entry_size > self.max_size {
            self.entries.clear();
            self.size = 0;
            return;
        }

        while self.size + entry_size > self.max_size {
            self.evict_oldest();
        }

        self.entries.push_front(field);
        self.size += entry_size;
    }

    /// Search newest-first. Same contract as [`StaticTable::find`] but
    /// with a 0-based index.
    pub(super) fn find(&self, name: &[u8], value: &[u8]) -> Option<(usize, bool)> {
        let mut name_match = None;

        for (i, entry) in self.entries.iter().enumerate() {
            if entry.name == name {
                if entry.value == value {
                    return Some((i, true));
                }
                if name_match.is_none() {
                    name_match = Some(i);
                }
            }
        }

        name_match.map(|i| (i, false))
    }

    fn evict_oldest(&mut self) {
        if let Some(evicted) = self.entries.pop_back() {
            self.size -= evicted.size();
        }
    }

    #[cfg(test)]
    pub(super) fn len(&self) -> usize {
        self.entries.len()
    }

    #[cfg(test)]
    fn size(&self) -> usize {
        self.size
    }
}
