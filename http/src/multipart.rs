//! Streaming `multipart/form-data` decoding (RFC 7578), built on the
//! `multer` crate's incremental parser.
use bytes::Bytes;
use common::errors::*;
use futures::{Stream, StreamExt};

use crate::body::Body;
use crate::header::Headers;

/// One decoded part: metadata plus its fully-drained payload. `multer`
/// parses the boundary/header framing incrementally off the underlying
/// stream; this wrapper buffers each part's data since the spec's Part
/// model exposes parts lazily one at a time rather than all-at-once, which
/// is what `next_part` below preserves.
#[derive(Debug, Clone)]
pub struct Part {
    pub name: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

pub struct MultipartDecoder {
    inner: multer::Multipart<'static>,
}

impl MultipartDecoder {
    /// `boundary` is the value of the `Content-Type`'s `boundary` parameter
    /// (without the `--` prefix `multer` adds itself).
    pub fn new(body: Box<dyn Body>, boundary: impl Into<String>) -> MultipartDecoder {
        MultipartDecoder {
            inner: multer::Multipart::new(body_stream(body), boundary),
        }
    }

    /// Lazily produces the next part, or `None` once the terminating
    /// boundary has been consumed.
    pub async fn next_part(&mut self) -> Result<Option<Part>> {
        let field = match self
            .inner
            .next_field()
            .await
            .map_err(|e| format_err!("Malformed multipart body: {}", e))?
        {
            Some(f) => f,
            None => return Ok(None),
        };

        let name = field.name().map(|s| s.to_string());
        let file_name = field.file_name().map(|s| s.to_string());
        let content_type = field.content_type().map(|m| m.to_string());
        let data = field
            .bytes()
            .await
            .map_err(|e| format_err!("Failed reading multipart field body: {}", e))?;

        Ok(Some(Part {
            name,
            file_name,
            content_type,
            data,
        }))
    }

    /// Drains every remaining part.
    pub async fn collect(mut self) -> Result<Vec<Part>> {
        let mut parts = Vec::new();
        while let Some(part) = self.next_part().await? {
            parts.push(part);
        }
        Ok(parts)
    }
}

fn body_stream(body: Box<dyn Body>) -> impl Stream<Item = std::result::Result<Bytes, std::io::Error>> {
    futures::stream::unfold(Some(body), |state| async move {
        let mut body = state?;
        let mut buf = vec![0u8; 8192];
        match body.read(&mut buf).await {
            Ok(0) => None,
            Ok(n) => {
                buf.truncate(n);
                Some((Ok(Bytes::from(buf)), Some(body)))
            }
            Err(e) => Some((
                Err(std::io::Error::new(std::io::ErrorKind::Other, e.to_string())),
                None,
            )),
        }
    })
}

/// Derives the `Part`'s headers as the RFC 7578 `Content-Disposition` plus
/// `Content-Type`, for callers that want the raw header view rather than
/// the extracted fields on `Part`.
pub fn part_headers(part: &Part) -> Result<Headers> {
    let mut headers = Headers::new();
    let mut disposition = "form-data".to_string();
    if let Some(name) = &part.name {
        disposition.push_str(&format!("; name=\"{}\"", name));
    }
    if let Some(file_name) = &part.file_name {
        disposition.push_str(&format!("; filename=\"{}\"", file_name));
    }
    headers.push("Content-Disposition", disposition)?;
    if let Some(ct) = &part.content_type {
        headers.push("Content-Type", ct.clone())?;
    }
    Ok(headers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_body() -> Box<dyn Body> {
        let raw = concat!(
            "--boundary123\r\n",
            "Content-Disposition: form-data; name=\"field1\"\r\n\r\n",
            "value1\r\n",
            "--boundary123\r\n",
            "Content-Disposition: form-data; name=\"file1\"; filename=\"a.txt\"\r\n",
            "Content-Type: text/plain\r\n\r\n",
            "file contents\r\n",
            "--boundary123--\r\n",
        );
        crate::body::BodyFromData(raw.as_bytes().to_vec())
    }

    #[tokio::test]
    async fn decodes_text_field_and_file_field() {
        let mut decoder = MultipartDecoder::new(sample_body(), "boundary123");

        let first = decoder.next_part().await.unwrap().unwrap();
        assert_eq!(first.name.as_deref(), Some("field1"));
        assert_eq!(&first.data[..], b"value1");

        let second = decoder.next_part().await.unwrap().unwrap();
        assert_eq!(second.name.as_deref(), Some("file1"));
        assert_eq!(second.file_name.as_deref(), Some("a.txt"));
        assert_eq!(second.content_type.as_deref(), Some("text/plain"));
        assert_eq!(&second.data[..], b"file contents");

        assert!(decoder.next_part().await.unwrap().is_none());
    }
}
