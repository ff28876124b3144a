use crate::errors::*;
use bytes::Bytes;

/// A string backed by bytes that are known to only contain 0-127.
#[derive(PartialEq, Eq, Clone, Hash)]
pub struct AsciiString {
    pub data: Bytes,
}

impl AsciiString {
    pub fn from<T: AsRef<[u8]>>(data: T) -> Result<AsciiString> {
        Self::from_bytes(Bytes::copy_from_slice(data.as_ref()))
    }

    pub fn from_str(s: &str) -> Result<AsciiString> {
        Self::from_bytes(Bytes::copy_from_slice(s.as_bytes()))
    }

    pub fn from_string(s: String) -> Result<AsciiString> {
        Self::from_bytes(s.into_bytes().into())
    }

    pub fn from_bytes(data: Bytes) -> Result<AsciiString> {
        for v in data.iter().cloned() {
            if v > 127 {
                return Err(err_msg("Byte outside of ASCII range"));
            }
        }

        Ok(AsciiString { data })
    }

    /// Caller must guarantee that `data` only contains bytes <= 127.
    pub unsafe fn from_ascii_unchecked(data: Bytes) -> AsciiString {
        AsciiString { data }
    }

    pub fn eq_ignore_case(&self, other: &[u8]) -> bool {
        self.data.eq_ignore_ascii_case(other)
    }

    pub fn to_string(&self) -> String {
        self.as_ref().to_owned()
    }

    pub fn as_str(&self) -> &str {
        self.as_ref()
    }

    pub fn to_bytes(&self) -> Bytes {
        self.data.clone()
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl AsRef<str> for AsciiString {
    fn as_ref(&self) -> &str {
        unsafe { std::str::from_utf8_unchecked(&self.data) }
    }
}

impl AsRef<[u8]> for AsciiString {
    fn as_ref(&self) -> &[u8] {
        &self.data
    }
}

impl std::fmt::Debug for AsciiString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "\"{}\"", AsRef::<str>::as_ref(self))
    }
}

impl std::fmt::Display for AsciiString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", AsRef::<str>::as_ref(self))
    }
}

impl std::str::FromStr for AsciiString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        AsciiString::from_str(s)
    }
}
