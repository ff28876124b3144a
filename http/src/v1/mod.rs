//! HTTP/1.1 wire codec (RFC 7230): request-line/status-line, header block,
//! and body-framing selection (`Content-Length` / `Transfer-Encoding:
//! chunked` / EOF-terminated).
use std::convert::TryFrom;

use common::errors::*;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::body::{Body, IncomingSizedBody, IncomingUnboundedBody, Readable};
use crate::chunked::IncomingChunkedBody;
use crate::header::{Header, HeaderName, Headers, CONTENT_LENGTH, TRANSFER_ENCODING};
use crate::method::Method;
use crate::status_code::StatusCode;
use crate::version::HttpVersion;

pub struct RequestLine {
    pub method: Method,
    pub target: String,
    pub version: HttpVersion,
}

pub struct StatusLine {
    pub version: HttpVersion,
    pub status_code: StatusCode,
    pub reason: String,
}

fn parse_version(s: &str) -> Result<HttpVersion> {
    let digits = s.strip_prefix("HTTP/").ok_or_else(|| format_err!("Malformed HTTP version: {}", s))?;
    let (major, minor) = digits
        .split_once('.')
        .ok_or_else(|| format_err!("Malformed HTTP version: {}", s))?;
    Ok(HttpVersion {
        major: major.parse()?,
        minor: minor.parse()?,
    })
}

pub fn parse_request_line(line: &str) -> Result<RequestLine> {
    let mut parts = line.splitn(3, ' ');
    let method = parts.next().ok_or_else(|| err_msg("Missing method"))?;
    let target = parts.next().ok_or_else(|| err_msg("Missing request target"))?;
    let version = parts.next().ok_or_else(|| err_msg("Missing HTTP version"))?;

    Ok(RequestLine {
        method: Method::try_from(method.as_bytes()).map_err(err_msg)?,
        target: target.to_string(),
        version: parse_version(version)?,
    })
}

pub fn serialize_request_line(line: &RequestLine, out: &mut Vec<u8>) {
    out.extend_from_slice(line.method.as_str().as_bytes());
    out.push(b' ');
    out.extend_from_slice(line.target.as_bytes());
    out.extend_from_slice(format!(" HTTP/{}.{}\r\n", line.version.major, line.version.minor).as_bytes());
}

pub fn parse_status_line(line: &str) -> Result<StatusLine> {
    let mut parts = line.splitn(3, ' ');
    let version = parts.next().ok_or_else(|| err_msg("Missing HTTP version"))?;
    let status = parts.next().ok_or_else(|| err_msg("Missing status code"))?;
    let reason = parts.next().unwrap_or("").to_string();

    let code: u16 = status.parse()?;
    Ok(StatusLine {
        version: parse_version(version)?,
        status_code: StatusCode::from_u16(code).ok_or_else(|| format_err!("Invalid status code: {}", code))?,
        reason,
    })
}

pub fn serialize_status_line(line: &StatusLine, out: &mut Vec<u8>) {
    out.extend_from_slice(format!("HTTP/{}.{} {} ", line.version.major, line.version.minor, line.status_code.as_u16()).as_bytes());
    out.extend_from_slice(line.reason.as_bytes());
    out.extend_from_slice(b"\r\n");
}

pub fn serialize_headers(headers: &Headers, out: &mut Vec<u8>) {
    for header in headers.iter() {
        out.extend_from_slice(header.name.as_str().as_bytes());
        out.extend_from_slice(b": ");
        out.extend_from_slice(&header.value);
        out.extend_from_slice(b"\r\n");
    }
}

/// Reads lines up to and including the blank line that ends an HTTP/1.1
/// header block, returning the parsed headers.
pub async fn read_headers<R: AsyncBufRead + Unpin>(stream: &mut R) -> Result<Headers> {
    let mut headers = Headers::new();
    loop {
        let mut line = String::new();
        let n = stream.read_line(&mut line).await?;
        if n == 0 {
            return Err(err_msg("Connection closed while reading headers"));
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        if line.is_empty() {
            break;
        }
        let (name, value) = line.split_once(':').ok_or_else(|| format_err!("Malformed header line: {}", line))?;
        let name = HeaderName::from_str(name.trim())?;
        let header = Header {
            name,
            value: value.trim().to_string().into(),
        };
        headers.push(header.name.as_str(), header.value)?;
    }
    Ok(headers)
}

fn is_chunked(headers: &Headers) -> bool {
    headers
        .find(TRANSFER_ENCODING)
        .any(|h| h.value_str().to_ascii_lowercase().contains("chunked"))
}

fn content_length(headers: &Headers) -> Result<Option<usize>> {
    match headers.find(CONTENT_LENGTH).next() {
        Some(header) => Ok(Some(
            header
                .value_str()
                .trim()
                .parse()
                .map_err(|_| err_msg("Invalid Content-Length"))?,
        )),
        None => Ok(None),
    }
}

/// Selects which `Body` implementation frames the message payload that
/// follows this head, per RFC 7230 §3.3.3's precedence: chunked
/// transfer-coding wins over `Content-Length`, which wins over reading
/// until connection close.
pub fn framed_body<R>(headers: &Headers, reader: R) -> Result<Box<dyn Body>>
where
    R: AsyncBufRead + Unpin + Send + 'static,
{
    if is_chunked(headers) {
        return Ok(Box::new(IncomingChunkedBody::new(reader)));
    }

    if let Some(len) = content_length(headers)? {
        return Ok(Box::new(IncomingSizedBody::new(TokioReadAdapter(reader), len)));
    }

    Ok(Box::new(IncomingUnboundedBody::new(TokioReadAdapter(reader))))
}

/// Drains exactly one message's body into memory, borrowing `reader` rather
/// than consuming it, so the caller gets it back to keep reading further
/// messages off the same connection. Used by the client and the server's
/// connection loop, where a `Box<dyn Body>` (which `framed_body` returns
/// and which requires a `'static` reader) would strand the stream inside
/// the box for the rest of the exchange.
pub async fn read_framed_body<R>(headers: &Headers, reader: &mut R) -> Result<bytes::Bytes>
where
    R: AsyncBufRead + Unpin + Send,
{
    use crate::body::read_to_end;

    if is_chunked(headers) {
        let mut body = IncomingChunkedBody::new(reader);
        return read_to_end(&mut body).await;
    }

    if let Some(len) = content_length(headers)? {
        let mut body = IncomingSizedBody::new(TokioReadAdapter(reader), len);
        return read_to_end(&mut body).await;
    }

    let mut body = IncomingUnboundedBody::new(TokioReadAdapter(reader));
    read_to_end(&mut body).await
}

/// Bridges a `tokio::io::AsyncRead` into this crate's pull-based
/// `Readable` trait.
pub struct TokioReadAdapter<R>(pub R);

#[async_trait::async_trait]
impl<R: tokio::io::AsyncRead + Unpin + Send> Readable for TokioReadAdapter<R> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        use tokio::io::AsyncReadExt;
        Ok(self.0.read(buf).await?)
    }
}

pub async fn write_all<W: AsyncWrite + Unpin>(writer: &mut W, data: &[u8]) -> Result<()> {
    writer.write_all(data).await?;
    Ok(())
}
