use common::errors::*;

use crate::header::{Headers, CONNECTION};

/// `Connection = 1#connection-option` (RFC 7230 §6.1).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionOption {
    KeepAlive,
    Close,
    Unknown(String),
}

impl ConnectionOption {
    fn parse_one(token: &str) -> ConnectionOption {
        if token.eq_ignore_ascii_case("keep-alive") {
            ConnectionOption::KeepAlive
        } else if token.eq_ignore_ascii_case("close") {
            ConnectionOption::Close
        } else {
            ConnectionOption::Unknown(token.to_string())
        }
    }
}

pub fn parse_connection(headers: &Headers) -> Result<Vec<ConnectionOption>> {
    let mut options = Vec::new();
    for header in headers.find(CONNECTION) {
        for token in header.value_str().split(',') {
            let token = token.trim();
            if !token.is_empty() {
                options.push(ConnectionOption::parse_one(token));
            }
        }
    }
    Ok(options)
}

pub fn wants_close(headers: &Headers) -> Result<bool> {
    Ok(parse_connection(headers)?
        .iter()
        .any(|o| *o == ConnectionOption::Close))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_separated_options() {
        let mut h = Headers::new();
        h.push("Connection", "keep-alive, Upgrade").unwrap();
        let opts = parse_connection(&h).unwrap();
        assert_eq!(
            opts,
            vec![
                ConnectionOption::KeepAlive,
                ConnectionOption::Unknown("Upgrade".to_string())
            ]
        );
    }

    #[test]
    fn detects_close() {
        let mut h = Headers::new();
        h.push("Connection", "close").unwrap();
        assert!(wants_close(&h).unwrap());
    }
}
