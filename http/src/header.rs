use bytes::Bytes;
use common::ascii::AsciiString;
use common::errors::*;

pub const HOST: &str = "Host";
pub const CONNECTION: &str = "Connection";
pub const KEEP_ALIVE: &str = "Keep-Alive";
pub const TRANSFER_ENCODING: &str = "Transfer-Encoding";
pub const CONTENT_LENGTH: &str = "Content-Length";
pub const CONTENT_ENCODING: &str = "Content-Encoding";
pub const CONTENT_TYPE: &str = "Content-Type";
pub const COOKIE: &str = "Cookie";
pub const SET_COOKIE: &str = "Set-Cookie";
pub const TRAILER: &str = "Trailer";
pub const UPGRADE: &str = "Upgrade";

/// A header name. Comparisons and hashing are case-insensitive, per RFC
/// 7230 §3.2.
#[derive(Debug, Clone)]
pub struct HeaderName {
    data: AsciiString,
}

impl HeaderName {
    pub fn from_str(s: &str) -> Result<HeaderName> {
        Ok(HeaderName {
            data: AsciiString::from_str(s)?,
        })
    }

    pub fn as_str(&self) -> &str {
        self.data.as_str()
    }
}

impl PartialEq for HeaderName {
    fn eq(&self, other: &Self) -> bool {
        self.data.eq_ignore_case(other.data.as_ref() as &[u8])
    }
}
impl Eq for HeaderName {}

impl<T: AsRef<str>> PartialEq<T> for HeaderName {
    fn eq(&self, other: &T) -> bool {
        self.data.eq_ignore_case(other.as_ref().as_bytes())
    }
}

impl std::fmt::Display for HeaderName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.data.as_str())
    }
}

#[derive(Debug, Clone)]
pub struct Header {
    pub name: HeaderName,
    pub value: Bytes,
}

impl Header {
    pub fn new(name: &str, value: impl Into<Bytes>) -> Result<Header> {
        Ok(Header {
            name: HeaderName::from_str(name)?,
            value: value.into(),
        })
    }

    pub fn value_str(&self) -> std::borrow::Cow<str> {
        String::from_utf8_lossy(&self.value)
    }
}

/// An insertion-ordered multimap of headers, matching RFC 7230's "a
/// recipient MAY combine multiple header fields... without changing the
/// semantics" while still preserving original order for serialization.
#[derive(Debug, Clone, Default)]
pub struct Headers {
    raw: Vec<Header>,
}

impl Headers {
    pub fn new() -> Headers {
        Headers { raw: Vec::new() }
    }

    pub fn push(&mut self, name: &str, value: impl Into<Bytes>) -> Result<()> {
        self.raw.push(Header::new(name, value)?);
        Ok(())
    }

    /// Replaces every existing header with this name.
    pub fn set(&mut self, name: &str, value: impl Into<Bytes>) -> Result<()> {
        self.raw.retain(|h| h.name != name);
        self.push(name, value)
    }

    pub fn remove(&mut self, name: &str) {
        self.raw.retain(|h| h.name != name);
    }

    pub fn find<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Header> {
        self.raw.iter().filter(move |h| h.name == name)
    }

    pub fn get_one(&self, name: &str) -> Option<&Header> {
        self.find(name).next()
    }

    pub fn has(&self, name: &str) -> bool {
        self.find(name).next().is_some()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Header> {
        self.raw.iter()
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }

    pub fn is_empty(&self) -> bool {
        self.raw.is_empty()
    }

    pub fn extend(&mut self, other: Headers) {
        self.raw.extend(other.raw);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_compares_case_insensitively() {
        let a = HeaderName::from_str("Content-Type").unwrap();
        assert_eq!(a, "content-type");
        assert_eq!(a, "CONTENT-TYPE");
    }

    #[test]
    fn set_replaces_all_prior_values() {
        let mut h = Headers::new();
        h.push("X-Thing", "a").unwrap();
        h.push("X-Thing", "b").unwrap();
        h.set("X-Thing", "c").unwrap();
        let values: Vec<_> = h.find("x-thing").map(|v| v.value_str().to_string()).collect();
        assert_eq!(values, vec!["c".to_string()]);
    }

    #[test]
    fn find_is_case_insensitive() {
        let mut h = Headers::new();
        h.push("Content-Length", "5").unwrap();
        assert!(h.has("content-length"));
    }
}
