/// `HTTP-version = HTTP-name "/" DIGIT "." DIGIT` (RFC 7230 §2.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HttpVersion {
    pub major: u8,
    pub minor: u8,
}

pub const HTTP_V1_0: HttpVersion = HttpVersion { major: 1, minor: 0 };
pub const HTTP_V1_1: HttpVersion = HttpVersion { major: 1, minor: 1 };
pub const HTTP_V2_0: HttpVersion = HttpVersion { major: 2, minor: 0 };

impl std::fmt::Display for HttpVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HTTP/{}.{}", self.major, self.minor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_as_wire_token() {
        assert_eq!(HTTP_V1_1.to_string(), "HTTP/1.1");
        assert_eq!(HTTP_V2_0.to_string(), "HTTP/2.0");
    }
}
