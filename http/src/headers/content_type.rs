use common::errors::*;

use crate::header::{Headers, CONTENT_TYPE};

/// All matching is case-insensitive per RFC 7231 §3.1.1.1; the type,
/// subtype, and parameter names are stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaType {
    pub typ: String,
    pub subtype: String,
    pub params: Vec<(String, String)>,
}

impl MediaType {
    pub fn parse(s: &str) -> Result<MediaType> {
        let mut parts = s.split(';');
        let full_type = parts.next().ok_or_else(|| err_msg("Empty content-type"))?.trim();
        let (typ, subtype) = full_type
            .split_once('/')
            .ok_or_else(|| err_msg("Content-type missing '/'"))?;

        let mut params = Vec::new();
        for param in parts {
            let param = param.trim();
            if param.is_empty() {
                continue;
            }
            let (name, value) = param
                .split_once('=')
                .ok_or_else(|| format_err!("Malformed content-type parameter: {}", param))?;
            let value = value.trim().trim_matches('"');
            params.push((name.trim().to_ascii_lowercase(), value.to_string()));
        }

        Ok(MediaType {
            typ: typ.to_ascii_lowercase(),
            subtype: subtype.to_ascii_lowercase(),
            params,
        })
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn is(&self, typ: &str, subtype: &str) -> bool {
        self.typ == typ && self.subtype == subtype
    }

    pub fn to_string(&self) -> String {
        let mut out = format!("{}/{}", self.typ, self.subtype);
        for (name, value) in &self.params {
            out.push_str(&format!("; {}={}", name, value));
        }
        out
    }
}

pub fn parse_content_type(headers: &Headers) -> Result<Option<MediaType>> {
    let mut iter = headers.find(CONTENT_TYPE);
    let header = match iter.next() {
        Some(h) => h,
        None => return Ok(None),
    };
    if iter.next().is_some() {
        return Err(err_msg("More than one Content-Type header"));
    }
    Ok(Some(MediaType::parse(&header.value_str())?))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_charset_parameter() {
        let mt = MediaType::parse("text/html; charset=utf-8").unwrap();
        assert_eq!(mt.typ, "text");
        assert_eq!(mt.subtype, "html");
        assert_eq!(mt.param("charset"), Some("utf-8"));
    }

    #[test]
    fn parses_multipart_boundary() {
        let mt = MediaType::parse("multipart/form-data; boundary=\"--abc123\"").unwrap();
        assert!(mt.is("multipart", "form-data"));
        assert_eq!(mt.param("boundary"), Some("--abc123"));
    }
}
