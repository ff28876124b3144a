//! A simplified HPACK (RFC 7541) codec: the 61-entry static table, a
//! size-bounded dynamic table with FIFO eviction, and literal header
//! field representations (with and without dynamic-table indexing).
//!
//! TODO: Huffman coding (RFC 7541 Appendix B) is not implemented — every
//! string is encoded/decoded as a literal octet sequence (the "H" bit is
//! always 0). A peer that only accepts Huffman-coded strings for some
//! fields isn't supported; this only interoperates with peers willing to
//! accept literal encodings, which every compliant HPACK implementation
//! must accept.
use common::errors::*;

const STATIC_TABLE: &[(&str, &str)] = &[
    (":authority", ""),
    (":method", "GET"),
    (":method", "POST"),
    (":path", "/"),
    (":path", "/index.html"),
    (":scheme", "http"),
    (":scheme", "https"),
    (":status", "200"),
    (":status", "204"),
    (":status", "206"),
    (":status", "304"),
    (":status", "400"),
    (":status", "404"),
    (":status", "500"),
    ("accept-charset", ""),
    ("accept-encoding", "gzip, deflate"),
    ("accept-language", ""),
    ("accept-ranges", ""),
    ("accept", ""),
    ("access-control-allow-origin", ""),
    ("age", ""),
    ("allow", ""),
    ("authorization", ""),
    ("cache-control", ""),
    ("content-disposition", ""),
    ("content-encoding", ""),
    ("content-language", ""),
    ("content-length", ""),
    ("content-location", ""),
    ("content-range", ""),
    ("content-type", ""),
    ("cookie", ""),
    ("date", ""),
    ("etag", ""),
    ("expect", ""),
    ("expires", ""),
    ("from", ""),
    ("host", ""),
    ("if-match", ""),
    ("if-modified-since", ""),
    ("if-none-match", ""),
    ("if-range", ""),
    ("if-unmodified-since", ""),
    ("last-modified", ""),
    ("link", ""),
    ("location", ""),
    ("max-forwards", ""),
    ("proxy-authenticate", ""),
    ("proxy-authorization", ""),
    ("range", ""),
    ("referer", ""),
    ("refresh", ""),
    ("retry-after", ""),
    ("server", ""),
    ("set-cookie", ""),
    ("strict-transport-security", ""),
    ("transfer-encoding", ""),
    ("user-agent", ""),
    ("vary", ""),
    ("via", ""),
    ("www-authenticate", ""),
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HeaderField {
    pub name: String,
    pub value: String,
}

/// Per RFC 7541 §4.1, an entry's accounted size is its octet lengths plus
/// 32 bytes of fixed overhead.
fn entry_size(field: &HeaderField) -> usize {
    field.name.len() + field.value.len() + 32
}

pub struct DynamicTable {
    entries: std::collections::VecDeque<HeaderField>,
    max_size: usize,
    current_size: usize,
}

impl DynamicTable {
    pub fn new(max_size: usize) -> Self {
        DynamicTable {
            entries: std::collections::VecDeque::new(),
            max_size,
            current_size: 0,
        }
    }

    pub fn set_max_size(&mut self, max_size: usize) {
        self.max_size = max_size;
        self.evict_to_fit();
    }

    fn evict_to_fit(&mut self) {
        while self.current_size > self.max_size {
            match self.entries.pop_back() {
                Some(evicted) => self.current_size -= entry_size(&evicted),
                None => break,
            }
        }
    }

    pub fn insert(&mut self, field: HeaderField) {
        self.current_size += entry_size(&field);
        self.entries.push_front(field);
        self.evict_to_fit();
    }

    pub fn get(&self, index: usize) -> Option<&HeaderField> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

pub struct Encoder {
    dynamic_table: DynamicTable,
}

impl Encoder {
    pub fn new(dynamic_table_size: usize) -> Self {
        Encoder {
            dynamic_table: DynamicTable::new(dynamic_table_size),
        }
    }

    /// Encodes one header field. Looks for an exact static-table match
    /// first (indexed representation), then falls back to a literal with
    /// incremental indexing (added to the dynamic table for future reuse).
    pub fn encode_field(&mut self, field: &HeaderField, out: &mut Vec<u8>) {
        if let Some(index) = STATIC_TABLE
            .iter()
            .position(|(n, v)| *n == field.name && *v == field.value)
        {
            encode_integer(out, (index + 1) as u64, 0x80, 7);
            return;
        }

        if let Some(pos) = self
            .dynamic_table
            .entries
            .iter()
            .position(|f| f.name == field.name && f.value == field.value)
        {
            encode_integer(out, (STATIC_TABLE.len() + pos + 1) as u64, 0x80, 7);
            return;
        }

        let name_index = STATIC_TABLE
            .iter()
            .position(|(n, _)| *n == field.name)
            .map(|i| i + 1)
            .or_else(|| {
                self.dynamic_table
                    .entries
                    .iter()
                    .position(|f| f.name == field.name)
                    .map(|pos| STATIC_TABLE.len() + pos + 1)
            });

        match name_index {
            Some(index) => encode_integer(out, index as u64, 0x40, 6),
            None => {
                out.push(0x40);
                encode_string(out, field.name.as_bytes());
            }
        }
        encode_string(out, field.value.as_bytes());

        self.dynamic_table.insert(field.clone());
    }

    pub fn encode_block(&mut self, fields: &[HeaderField]) -> Vec<u8> {
        let mut out = Vec::new();
        for field in fields {
            self.encode_field(field, &mut out);
        }
        out
    }
}

pub struct Decoder {
    dynamic_table: DynamicTable,
}

impl Decoder {
    pub fn new(dynamic_table_size: usize) -> Self {
        Decoder {
            dynamic_table: DynamicTable::new(dynamic_table_size),
        }
    }

    pub fn decode_block(&mut self, mut data: &[u8]) -> Result<Vec<HeaderField>> {
        let mut fields = Vec::new();
        while !data.is_empty() {
            let first = data[0];

            if first & 0x80 != 0 {
                let (index, rest) = decode_integer(data, 0x80, 7)?;
                data = rest;
                fields.push(self.lookup(index)?);
            } else if first & 0x40 != 0 {
                let (name_index, rest) = decode_integer(data, 0x40, 6)?;
                data = rest;
                let (name, rest) = if name_index == 0 {
                    decode_string(data)?
                } else {
                    (self.lookup_name(name_index)?, data)
                };
                let (value, rest) = decode_string(rest)?;
                data = rest;
                let field = HeaderField { name, value };
                self.dynamic_table.insert(field.clone());
                fields.push(field);
            } else if first & 0x20 != 0 {
                // Dynamic table size update.
                let (size, rest) = decode_integer(data, 0x20, 5)?;
                data = rest;
                self.dynamic_table.set_max_size(size as usize);
            } else {
                // Literal without indexing / never-indexed: prefix bits 4/5
                // (0000xxxx / 0001xxxx).
                let mask = if first & 0x10 != 0 { 0x10 } else { 0x00 };
                let (name_index, rest) = decode_integer(data, mask, 4)?;
                data = rest;
                let (name, rest) = if name_index == 0 {
                    decode_string(data)?
                } else {
                    (self.lookup_name(name_index)?, data)
                };
                let (value, rest) = decode_string(rest)?;
                data = rest;
                fields.push(HeaderField { name, value });
            }
        }
        Ok(fields)
    }

    fn lookup(&self, index: usize) -> Result<HeaderField> {
        if index == 0 {
            return Err(err_msg("HPACK index 0 is invalid"));
        }
        if index <= STATIC_TABLE.len() {
            let (name, value) = STATIC_TABLE[index - 1];
            return Ok(HeaderField {
                name: name.to_string(),
                value: value.to_string(),
            });
        }
        self.dynamic_table
            .get(index - STATIC_TABLE.len() - 1)
            .cloned()
            .ok_or_else(|| format_err!("HPACK index {} out of range", index))
    }

    fn lookup_name(&self, index: usize) -> Result<String> {
        self.lookup(index).map(|f| f.name)
    }
}

/// Encodes `value` using HPACK's prefix-integer representation (RFC 7541
/// §5.1), with `flags` already set on the first byte's high bits and
/// `prefix_bits` bits of the first byte available for the value itself.
fn encode_integer(out: &mut Vec<u8>, value: u64, flags: u8, prefix_bits: u32) {
    let max_prefix = (1u64 << prefix_bits) - 1;
    if value < max_prefix {
        out.push(flags | value as u8);
        return;
    }

    out.push(flags | max_prefix as u8);
    let mut remaining = value - max_prefix;
    while remaining >= 128 {
        out.push(((remaining % 128) + 128) as u8);
        remaining /= 128;
    }
    out.push(remaining as u8);
}

fn decode_integer(data: &[u8], mask: u8, prefix_bits: u32) -> Result<(usize, &[u8])> {
    let _ = mask;
    let max_prefix = (1u64 << prefix_bits) - 1;
    let first = *data.first().ok_or_else(|| err_msg("Truncated HPACK integer"))?;
    let prefix_value = (first as u64) & max_prefix;

    if prefix_value < max_prefix {
        return Ok((prefix_value as usize, &data[1..]));
    }

    let mut value = max_prefix;
    let mut m = 0u32;
    let mut i = 1;
    loop {
        let byte = *data.get(i).ok_or_else(|| err_msg("Truncated HPACK integer"))?;
        value += ((byte & 0x7f) as u64) << m;
        i += 1;
        if byte & 0x80 == 0 {
            break;
        }
        m += 7;
    }
    Ok((value as usize, &data[i..]))
}

/// Encodes a string literal with the Huffman bit always clear (see the
/// module TODO).
fn encode_string(out: &mut Vec<u8>, bytes: &[u8]) {
    encode_integer(out, bytes.len() as u64, 0x00, 7);
    out.extend_from_slice(bytes);
}

fn decode_string(data: &[u8]) -> Result<(String, &[u8])> {
    let first = *data.first().ok_or_else(|| err_msg("Truncated HPACK string"))?;
    if first & 0x80 != 0 {
        return Err(err_msg("Huffman-coded HPACK strings are not supported"));
    }
    let (len, rest) = decode_integer(data, 0x00, 7)?;
    if rest.len() < len {
        return Err(err_msg("Truncated HPACK string"));
    }
    let value = String::from_utf8(rest[..len].to_vec()).map_err(|e| format_err!("Invalid UTF-8 in HPACK string: {}", e))?;
    Ok((value, &rest[len..]))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_a_mix_of_static_and_new_fields() {
        let fields = vec![
            HeaderField { name: ":method".to_string(), value: "GET".to_string() },
            HeaderField { name: "x-custom".to_string(), value: "value".to_string() },
        ];

        let mut encoder = Encoder::new(4096);
        let encoded = encoder.encode_block(&fields);

        let mut decoder = Decoder::new(4096);
        let decoded = decoder.decode_block(&encoded).unwrap();

        assert_eq!(decoded, fields);
    }

    #[test]
    fn repeated_custom_field_is_indexed_on_second_use() {
        let field = HeaderField { name: "x-trace".to_string(), value: "abc".to_string() };

        let mut encoder = Encoder::new(4096);
        let first_encoded = encoder.encode_block(&[field.clone()]);
        let second_encoded = encoder.encode_block(&[field.clone()]);

        assert!(second_encoded.len() < first_encoded.len());

        let mut decoder = Decoder::new(4096);
        assert_eq!(decoder.decode_block(&first_encoded).unwrap(), vec![field.clone()]);
        assert_eq!(decoder.decode_block(&second_encoded).unwrap(), vec![field]);
    }

    #[test]
    fn dynamic_table_evicts_oldest_entries_past_capacity() {
        let mut table = DynamicTable::new(64);
        table.insert(HeaderField { name: "a".repeat(20), value: "1".to_string() });
        table.insert(HeaderField { name: "b".repeat(20), value: "2".to_string() });
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn huffman_coded_strings_are_rejected_explicitly() {
        let data = [0x00u8, 0x81, 0x00];
        let err = decode_string(&data).unwrap_err();
        assert!(err.to_string().contains("Huffman"));
    }
}
