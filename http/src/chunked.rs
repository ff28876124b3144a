//! `Transfer-Encoding: chunked` framing (RFC 7230 §4.1). Chunk extensions
//! are accepted but discarded, as most implementations do.
use async_trait::async_trait;
use common::errors::*;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt};

use crate::body::{Body, Readable};
use crate::header::Headers;

#[derive(Clone)]
enum ChunkState {
    Start,
    Data(usize),
    End,
    Trailer,
    Done,
}

/// A body decoded from a chunked-encoded stream. Trailers (if any) become
/// available only once the terminating `0\r\n` chunk and trailer section
/// have been fully read.
pub struct IncomingChunkedBody<R> {
    stream: R,
    state: ChunkState,
    trailers: Option<Headers>,
}

impl<R: AsyncBufRead + Unpin + Send> IncomingChunkedBody<R> {
    pub fn new(stream: R) -> Self {
        IncomingChunkedBody {
            stream,
            state: ChunkState::Start,
            trailers: None,
        }
    }

    async fn read_line(&mut self) -> Result<String> {
        let mut line = String::new();
        let n = self.stream.read_line(&mut line).await?;
        if n == 0 {
            return Err(err_msg("Unexpected end of stream while reading chunk framing"));
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        Ok(line)
    }

    fn parse_chunk_size(line: &str) -> Result<usize> {
        let size_str = line.split(';').next().unwrap_or("").trim();
        usize::from_str_radix(size_str, 16).map_err(|_| format_err!("Invalid chunk size: {}", line))
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Readable for IncomingChunkedBody<R> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        loop {
            match self.state.clone() {
                ChunkState::Start => {
                    let line = self.read_line().await?;
                    let size = Self::parse_chunk_size(&line)?;
                    self.state = if size == 0 {
                        ChunkState::Trailer
                    } else {
                        ChunkState::Data(size)
                    };
                }
                ChunkState::Data(remaining) => {
                    if buf.is_empty() {
                        return Ok(0);
                    }
                    let n = std::cmp::min(remaining, buf.len());
                    let nread = self.stream.read(&mut buf[0..n]).await?;
                    if nread == 0 {
                        return Err(err_msg("Connection closed mid-chunk"));
                    }
                    let left = remaining - nread;
                    self.state = if left == 0 { ChunkState::End } else { ChunkState::Data(left) };
                    return Ok(nread);
                }
                ChunkState::End => {
                    let line = self.read_line().await?;
                    if !line.is_empty() {
                        return Err(err_msg("Expected CRLF after chunk data"));
                    }
                    self.state = ChunkState::Start;
                }
                ChunkState::Trailer => {
                    let mut trailers = Headers::new();
                    loop {
                        let line = self.read_line().await?;
                        if line.is_empty() {
                            break;
                        }
                        let (name, value) = line
                            .split_once(':')
                            .ok_or_else(|| format_err!("Malformed trailer field: {}", line))?;
                        trailers.push(name.trim(), value.trim().to_string())?;
                    }
                    self.trailers = Some(trailers);
                    self.state = ChunkState::Done;
                    return Ok(0);
                }
                ChunkState::Done => return Ok(0),
            }
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> Body for IncomingChunkedBody<R> {
    fn len(&self) -> Option<usize> {
        None
    }

    fn has_trailers(&self) -> bool {
        true
    }

    async fn trailers(&mut self) -> Result<Option<Headers>> {
        Ok(self.trailers.take())
    }
}

/// Encodes one chunk (non-empty) as `<hex-size>\r\n<data>\r\n`.
pub fn encode_chunk(data: &[u8]) -> Vec<u8> {
    let mut out = format!("{:x}\r\n", data.len()).into_bytes();
    out.extend_from_slice(data);
    out.extend_from_slice(b"\r\n");
    out
}

/// Encodes the terminating `0\r\n` chunk, followed by any trailers and the
/// final CRLF.
pub fn encode_last_chunk(trailers: Option<&Headers>) -> Vec<u8> {
    let mut out = b"0\r\n".to_vec();
    if let Some(trailers) = trailers {
        for header in trailers.iter() {
            out.extend_from_slice(header.name.as_str().as_bytes());
            out.extend_from_slice(b": ");
            out.extend_from_slice(&header.value);
            out.extend_from_slice(b"\r\n");
        }
    }
    out.extend_from_slice(b"\r\n");
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::body::read_to_end;

    #[tokio::test]
    async fn decodes_two_chunks_and_terminator() {
        let raw = b"4\r\nWiki\r\n5\r\npedia\r\n0\r\n\r\n".to_vec();
        let mut body = IncomingChunkedBody::new(&raw[..]);
        let data = read_to_end(&mut body).await.unwrap();
        assert_eq!(&data[..], b"Wikipedia");
    }

    #[tokio::test]
    async fn decodes_trailers_after_terminator() {
        let raw = b"3\r\nabc\r\n0\r\nX-Trace: 1\r\n\r\n".to_vec();
        let mut body = IncomingChunkedBody::new(&raw[..]);
        let _ = read_to_end(&mut body).await.unwrap();
        let trailers = body.trailers().await.unwrap().unwrap();
        assert!(trailers.has("X-Trace"));
    }

    #[test]
    fn encodes_chunk_with_hex_size_prefix() {
        assert_eq!(encode_chunk(b"abc"), b"3\r\nabc\r\n".to_vec());
    }

    #[test]
    fn encodes_terminator_without_trailers() {
        assert_eq!(encode_last_chunk(None), b"0\r\n\r\n".to_vec());
    }
}
