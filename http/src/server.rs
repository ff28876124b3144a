//! The accept loop and per-connection driver, for both HTTP/1.1 and
//! HTTP/2 (prior-knowledge h2c only — no `Upgrade`-header negotiation
//! path). Every accepted connection is probed for the HTTP/2 connection
//! preface before any request parsing begins; a match hands it to the
//! stream multiplexer in `v2::connection`, a miss replays the probed
//! bytes back in front of the normal HTTP/1.1 request-line loop.
use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::errors::*;
use log::error;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};

use crate::body::BodyFromData;
use crate::error::WebError;
use crate::exchange::{keep_alive, Exchange};
use crate::header::Headers;
use crate::headers::connection::wants_close;
use crate::request::{Request, RequestHead};
use crate::response::{error_response, Response};
use crate::v1::{self, RequestLine};
use crate::v2::connection::{self as h2conn, IncomingStream};
use crate::v2::hpack::HeaderField;
use crate::v2::CONNECTION_PREFACE;
use crate::version::{HTTP_V1_1, HTTP_V2_0};

/// Application-level request handler. Implemented by the caller; the
/// server drives it once per exchange.
#[async_trait]
pub trait HttpRequestHandler: Send + Sync {
    async fn handle_request(&self, request: Request) -> Response;
}

/// Wraps a plain async function as a handler, for callers that don't need
/// a named type.
pub struct HandlerFn<F>(pub F);

#[async_trait]
impl<F, Fut> HttpRequestHandler for HandlerFn<F>
where
    F: Fn(Request) -> Fut + Send + Sync,
    Fut: std::future::Future<Output = Response> + Send,
{
    async fn handle_request(&self, request: Request) -> Response {
        (self.0)(request).await
    }
}

pub struct HttpServer {
    port: u16,
    handler: Arc<dyn HttpRequestHandler>,
    /// Caps how long a single HTTP/2 stream's handler may run; on expiry
    /// only that stream is reset, leaving every sibling stream on the
    /// same connection untouched. Not applied to HTTP/1.1, where
    /// cancelling mid-handler would desync request/response framing on a
    /// pipelined connection instead of cleanly dropping one exchange.
    h2_stream_timeout: Option<Duration>,
}

impl HttpServer {
    pub fn new<H: 'static + HttpRequestHandler>(port: u16, handler: H) -> Self {
        HttpServer {
            port,
            handler: Arc::new(handler),
            h2_stream_timeout: None,
        }
    }

    pub fn with_h2_stream_timeout(mut self, timeout: Duration) -> Self {
        self.h2_stream_timeout = Some(timeout);
        self
    }

    pub async fn run(&self) -> Result<()> {
        let listener = TcpListener::bind(("0.0.0.0", self.port)).await?;

        loop {
            let (stream, _) = listener.accept().await?;
            let handler = self.handler.clone();
            let h2_stream_timeout = self.h2_stream_timeout;
            tokio::spawn(async move {
                if let Err(e) = serve_connection(stream, handler, h2_stream_timeout).await {
                    error!("Connection handler failed: {}", e);
                }
            });
        }
    }
}

/// Probes the connection for the HTTP/2 preface and dispatches to either
/// the h2 stream multiplexer or the HTTP/1.1 request-line loop.
async fn serve_connection(
    stream: TcpStream,
    handler: Arc<dyn HttpRequestHandler>,
    h2_stream_timeout: Option<Duration>,
) -> Result<()> {
    let (mut read_half, write_half) = stream.into_split();

    let mut probe = vec![0u8; CONNECTION_PREFACE.len()];
    let mut filled = 0;
    while filled < probe.len() {
        let n = read_half.read(&mut probe[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }

    if filled == probe.len() && probe == CONNECTION_PREFACE {
        return serve_h2_connection(read_half, write_half, handler, h2_stream_timeout).await;
    }

    // Not an h2 preface (or the connection closed before sending one):
    // replay whatever was probed in front of the rest of the stream and
    // fall back to the HTTP/1.1 loop, which never saw it consumed.
    let reader = Cursor::new(probe[..filled].to_vec()).chain(read_half);
    serve_v1_connection(reader, write_half, handler).await
}

async fn serve_h2_connection(
    read_half: OwnedReadHalf,
    write_half: OwnedWriteHalf,
    handler: Arc<dyn HttpRequestHandler>,
    stream_timeout: Option<Duration>,
) -> Result<()> {
    let conn = h2conn::Connection::new(h2conn::Role::Server, read_half, write_half).await?;

    while let Some(incoming) = conn.accept_stream().await {
        let handler = handler.clone();
        tokio::spawn(async move {
            if let Err(e) = handle_h2_stream(incoming, handler, stream_timeout).await {
                error!("HTTP/2 stream handler failed: {}", e);
            }
        });
    }
    Ok(())
}

/// Handles one HTTP/2 stream end to end: reconstructs a `Request` from
/// the pseudo-headers and body the multiplexer already demultiplexed,
/// runs the handler (optionally under `stream_timeout`, resetting just
/// this stream on expiry), and writes the response back as HEADERS+DATA.
async fn handle_h2_stream(
    incoming: IncomingStream,
    handler: Arc<dyn HttpRequestHandler>,
    stream_timeout: Option<Duration>,
) -> Result<()> {
    let uri = uri::parse_uri(&incoming.path)?;
    let request = Request::from_wire(
        RequestHead {
            method: incoming.method,
            uri,
            version: HTTP_V2_0,
            headers: incoming.headers,
            remote_addr: None,
        },
        Box::new(incoming.body),
    );

    let handle_request = handler.handle_request(request);
    let mut response = match stream_timeout {
        Some(d) => match tokio::time::timeout(d, handle_request).await {
            Ok(response) => response,
            Err(_) => {
                return incoming.handle.reset(0x2).await; // INTERNAL_ERROR: handler deadline exceeded
            }
        },
        None => handle_request.await,
    };

    let headers = response.flush_headers()?.clone();
    let mut fields = vec![HeaderField {
        name: ":status".to_string(),
        value: response.head.status_code.as_u16().to_string(),
    }];
    for h in headers.iter() {
        fields.push(HeaderField {
            name: h.name.as_str().to_ascii_lowercase(),
            value: h.value_str().to_string(),
        });
    }

    let body_bytes = crate::body::read_to_end(response.body.as_mut()).await?;
    incoming.handle.send_headers(fields, body_bytes.is_empty()).await?;
    if !body_bytes.is_empty() {
        incoming.handle.send_data(body_bytes, true).await?;
    }
    Ok(())
}

/// Drives one HTTP/1.1 connection through however many exchanges it
/// carries, stopping once a parse failure, an I/O error, or a
/// `Connection: close` signal ends it.
async fn serve_v1_connection<R>(reader: R, mut write_half: OwnedWriteHalf, handler: Arc<dyn HttpRequestHandler>) -> Result<()>
where
    R: tokio::io::AsyncRead + Unpin + Send,
{
    let mut reader = BufReader::new(reader);

    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            return Ok(());
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        if line.is_empty() {
            // RFC 7230 §3.5 allows (and recommends tolerating) a single
            // leading blank line before a request-line.
            continue;
        }

        let mut exchange = Exchange::new(None);
        exchange.start_running()?;

        let (request, request_wants_close) = match read_request(&line, &mut reader).await {
            Ok(v) => v,
            Err(_) => {
                let err = WebError::BadRequest("Malformed request".into());
                // `fail()` says an error response is still safe to send
                // (headers haven't gone out), but a framing-level parse
                // failure leaves the stream unsynced for a further
                // request-line read, so the connection closes regardless
                // of the advisory `ErrorRecovery` it returns.
                let _ = exchange.fail(&err);
                let mut resp = error_response(&err)?;
                write_response(&mut write_half, &mut resp).await?;
                return Ok(());
            }
        };

        let mut response = handler.handle_request(request).await;
        let should_keep_alive = keep_alive(&response, request_wants_close);

        exchange.headers_flushed()?;
        write_response(&mut write_half, &mut response).await?;
        exchange.complete()?;

        if !should_keep_alive {
            return Ok(());
        }
    }
}

async fn read_request<R>(request_line: &str, reader: &mut R) -> Result<(Request, bool)>
where
    R: tokio::io::AsyncBufRead + Unpin + Send,
{
    let line: RequestLine = v1::parse_request_line(request_line)?;
    let method = line.method;
    let uri = uri::parse_uri(&line.target)?;
    let headers: Headers = v1::read_headers(reader).await?;

    let body_bytes = v1::read_framed_body(&headers, reader).await?;
    let request_wants_close = wants_close(&headers)?;

    let request = Request::from_wire(
        RequestHead {
            method,
            uri,
            version: HTTP_V1_1,
            headers,
            remote_addr: None,
        },
        BodyFromData(body_bytes.to_vec()),
    );

    Ok((request, request_wants_close))
}

async fn write_response<W: tokio::io::AsyncWrite + Unpin>(writer: &mut W, response: &mut Response) -> Result<()> {
    let headers = response.flush_headers()?.clone();

    let mut out = Vec::new();
    v1::serialize_status_line(
        &v1::StatusLine {
            version: response.head.version,
            status_code: response.head.status_code,
            reason: response.head.reason.clone(),
        },
        &mut out,
    );
    v1::serialize_headers(&headers, &mut out);
    out.extend_from_slice(b"\r\n");

    let body_bytes = crate::body::read_to_end(response.body.as_mut()).await?;
    out.extend_from_slice(&body_bytes);

    writer.write_all(&out).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::response::ResponseBuilder;
    use crate::status_code::StatusCode;

    struct EchoHandler;

    #[async_trait]
    impl HttpRequestHandler for EchoHandler {
        async fn handle_request(&self, _request: Request) -> Response {
            ResponseBuilder::new()
                .status(StatusCode::OK)
                .body_value("hello")
                .build()
                .unwrap()
        }
    }

    #[tokio::test]
    async fn responds_to_a_simple_request_over_the_wire() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            serve_connection(stream, Arc::new(EchoHandler), None).await.unwrap();
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client
            .write_all(b"GET / HTTP/1.1\r\nHost: x\r\nConnection: close\r\n\r\n")
            .await
            .unwrap();

        let mut reader = BufReader::new(&mut client);
        let mut status_line = String::new();
        reader.read_line(&mut status_line).await.unwrap();
        assert_eq!(status_line.trim_end(), "HTTP/1.1 200 OK");

        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn a_short_http_1_1_request_is_not_mistaken_for_an_h2_preface() {
        // Shorter than the 24-byte h2 preface: exercises the EOF-before-full
        // probe path in `serve_connection`.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            serve_connection(stream, Arc::new(EchoHandler), None).await.unwrap();
        });

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET / HTTP/1.0\r\n\r\n").await.unwrap();
        client.shutdown().await.unwrap();

        let mut reader = BufReader::new(&mut client);
        let mut status_line = String::new();
        reader.read_line(&mut status_line).await.unwrap();
        assert_eq!(status_line.trim_end(), "HTTP/1.1 200 OK");

        server_task.await.unwrap();
    }

    #[tokio::test]
    async fn h2_prior_knowledge_connection_is_detected_and_served() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server_task = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            serve_connection(stream, Arc::new(EchoHandler), None).await.unwrap();
        });

        let stream = TcpStream::connect(addr).await.unwrap();
        let (read_half, write_half) = stream.into_split();
        let client = h2conn::Connection::new(h2conn::Role::Client, read_half, write_half)
            .await
            .unwrap();

        let fields = vec![
            HeaderField { name: ":method".to_string(), value: "GET".to_string() },
            HeaderField { name: ":path".to_string(), value: "/".to_string() },
            HeaderField { name: ":scheme".to_string(), value: "http".to_string() },
            HeaderField { name: ":authority".to_string(), value: "x".to_string() },
        ];
        let (_stream, head_rx) = client.open_stream(fields, true).await.unwrap();
        let (status, _headers, mut body) = head_rx.await.unwrap();
        assert_eq!(status, StatusCode::OK);
        let data = crate::body::read_to_end(&mut body).await.unwrap();
        assert_eq!(&data[..], b"hello");

        drop(client);
        let _ = server_task.await;
    }
}
