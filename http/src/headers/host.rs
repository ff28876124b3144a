use common::errors::*;

use crate::header::{Headers, HOST};

/// A parsed `Host` header; never carries userinfo (that only ever appears
/// in a request-target's authority, not the header).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostHeader {
    pub host: String,
    pub port: Option<u16>,
}

pub fn parse_host_header(headers: &Headers) -> Result<Option<HostHeader>> {
    let mut iter = headers.find(HOST);
    let header = match iter.next() {
        Some(h) => h,
        None => return Ok(None),
    };
    if iter.next().is_some() {
        return Err(err_msg("More than one \"Host\" header"));
    }

    let raw = header.value_str();
    let (host, port) = match raw.rsplit_once(':') {
        Some((h, p)) if p.chars().all(|c| c.is_ascii_digit()) && !p.is_empty() => {
            (h.to_string(), Some(p.parse::<u16>()?))
        }
        _ => (raw.to_string(), None),
    };

    Ok(Some(HostHeader { host, port }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_host_and_port() {
        let mut h = Headers::new();
        h.push("Host", "example.com:8080").unwrap();
        let parsed = parse_host_header(&h).unwrap().unwrap();
        assert_eq!(parsed.host, "example.com");
        assert_eq!(parsed.port, Some(8080));
    }

    #[test]
    fn rejects_duplicate_host_headers() {
        let mut h = Headers::new();
        h.push("Host", "a.com").unwrap();
        h.push("Host", "b.com").unwrap();
        assert!(parse_host_header(&h).is_err());
    }
}
