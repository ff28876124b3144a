use std::collections::HashMap;

use common::errors::*;
use cookie::Cookie as ParsedCookie;

use crate::header::{Headers, COOKIE, SET_COOKIE};

/// Cookies parsed from request `Cookie` headers; a name may legally repeat,
/// so values are kept as an ordered list per name.
pub fn parse_cookies(headers: &Headers) -> Result<HashMap<String, Vec<String>>> {
    let mut out: HashMap<String, Vec<String>> = HashMap::new();
    for header in headers.find(COOKIE) {
        for part in header.value_str().split(';') {
            let part = part.trim();
            if part.is_empty() {
                continue;
            }
            let parsed = ParsedCookie::parse(part.to_string())
                .map_err(|e| format_err!("Malformed cookie: {}", e))?;
            out.entry(parsed.name().to_string())
                .or_default()
                .push(parsed.value().to_string());
        }
    }
    Ok(out)
}

/// Materializes response cookies into `Set-Cookie` headers, one per
/// cookie, on flush.
pub fn write_set_cookie(headers: &mut Headers, cookie: &ParsedCookie) -> Result<()> {
    headers.push(SET_COOKIE, cookie.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_multiple_cookies_from_one_header() {
        let mut h = Headers::new();
        h.push("Cookie", "a=1; b=2").unwrap();
        let cookies = parse_cookies(&h).unwrap();
        assert_eq!(cookies.get("a"), Some(&vec!["1".to_string()]));
        assert_eq!(cookies.get("b"), Some(&vec!["2".to_string()]));
    }

    #[test]
    fn repeated_cookie_name_accumulates() {
        let mut h = Headers::new();
        h.push("Cookie", "a=1").unwrap();
        h.push("Cookie", "a=2").unwrap();
        let cookies = parse_cookies(&h).unwrap();
        assert_eq!(cookies.get("a"), Some(&vec!["1".to_string(), "2".to_string()]));
    }
}
