//! Streaming `application/x-www-form-urlencoded` decoding (WHATWG URL
//! Standard §5).
use common::errors::*;
use uri::charset::decode;

use crate::body::Body;

/// One `name=value` pair as it's produced off the wire. `partial` is true
/// when more data for this same pair may still arrive in a later event
/// (the decoder doesn't buffer a whole pair before emitting it); `last`
/// marks the final event of the whole body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
    pub partial: bool,
    pub last: bool,
}

/// Decodes an entire buffered `application/x-www-form-urlencoded` body
/// into name/value pairs, preserving repetition and order.
pub fn decode_buffered(raw: &str) -> Vec<(String, String)> {
    raw.split('&')
        .filter(|s| !s.is_empty())
        .map(|pair| match pair.split_once('=') {
            Some((k, v)) => (decode_plus(k), decode_plus(v)),
            None => (decode_plus(pair), String::new()),
        })
        .collect()
}

fn decode_plus(s: &str) -> String {
    decode(&s.replace('+', " "))
}

/// Reads an entire body and decodes it as `application/x-www-form-urlencoded`,
/// emitting one `Parameter` event per pair with `partial = false` and
/// `last` set on the final event.
pub async fn decode_body(body: &mut dyn Body) -> Result<Vec<Parameter>> {
    let bytes = crate::body::read_to_end(body).await?;
    let raw = String::from_utf8(bytes.to_vec()).map_err(|e| format_err!("Invalid UTF-8 in urlencoded body: {}", e))?;
    let pairs = decode_buffered(&raw);
    let len = pairs.len();
    Ok(pairs
        .into_iter()
        .enumerate()
        .map(|(i, (name, value))| Parameter {
            name,
            value,
            partial: false,
            last: i + 1 == len,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_plus_as_space() {
        assert_eq!(decode_buffered("a=hello+world"), vec![("a".to_string(), "hello world".to_string())]);
    }

    #[test]
    fn decodes_percent_escapes() {
        assert_eq!(decode_buffered("q=a%2Bb"), vec![("q".to_string(), "a+b".to_string())]);
    }

    #[test]
    fn keeps_repeated_names_in_order() {
        assert_eq!(
            decode_buffered("a=1&a=2"),
            vec![("a".to_string(), "1".to_string()), ("a".to_string(), "2".to_string())]
        );
    }

    #[tokio::test]
    async fn decode_body_marks_last_event() {
        let mut body = crate::body::BodyFromData(b"a=1&b=2".to_vec());
        let params = decode_body(&mut *body).await.unwrap();
        assert_eq!(params.len(), 2);
        assert!(!params[0].last);
        assert!(params[1].last);
    }
}
