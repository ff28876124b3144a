//! A client connected to a single authority (scheme + host + port). Request
//! URIs only need to carry a path and query; the authority and `Host`
//! header come from how the client itself was constructed.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use common::errors::*;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::Mutex as AsyncMutex;

use crate::backoff::{ExponentialBackoff, ExponentialBackoffOptions, ExponentialBackoffResult};
use crate::body::read_to_end;
use crate::connection::{Connection, ConnectionKey};
use crate::header::{CONTENT_LENGTH, HOST};
use crate::pool::{Connector, Pool};
use crate::request::Request;
use crate::response::{Response, ResponseHead};
use crate::v1::{self, RequestLine, StatusLine};
use crate::v2::connection as h2conn;
use crate::v2::hpack::HeaderField;
use crate::version::{HTTP_V1_1, HTTP_V2_0};

#[async_trait]
pub trait ClientInterface: Send + Sync {
    async fn request(&self, request: Request) -> Result<Response>;
}

/// Runs ahead of any connection attempt, in declaration order. An
/// interceptor may rewrite the request in place, or abort the request
/// entirely by returning a synthesized response — in which case no
/// connection is ever used.
#[async_trait]
pub trait ClientInterceptor: Send + Sync {
    async fn intercept(&self, request: &mut Request) -> Result<Option<Response>>;
}

pub struct ClientOptions {
    pub retry_backoff: ExponentialBackoffOptions,
    pub connect_timeout: Duration,
    pub max_connections: usize,
    pub interceptors: Vec<Arc<dyn ClientInterceptor>>,
    /// Speak HTTP/2 directly over cleartext TCP (RFC 7540 §3.4's
    /// "prior knowledge"), bypassing the HTTP/1.1 path entirely.
    pub http2_prior_knowledge: bool,
    /// Caps how long a single HTTP/2 stream may take end to end. Applying
    /// this to the HTTP/1.1 path would desync request/response framing on
    /// a pipelined connection mid-read, so it only guards `http2_prior_knowledge`
    /// requests, where timing a stream out just means resetting that one
    /// stream.
    pub request_timeout: Option<Duration>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        ClientOptions {
            retry_backoff: ExponentialBackoffOptions {
                base_duration: Duration::from_millis(10),
                jitter_duration: Duration::from_millis(200),
                max_duration: Duration::from_secs(30),
                cooldown_duration: Duration::from_secs(60),
                max_num_attempts: 10,
            },
            connect_timeout: Duration::from_millis(500),
            max_connections: 4,
            interceptors: Vec::new(),
            http2_prior_knowledge: false,
            request_timeout: None,
        }
    }
}

/// Opens a fresh TCP connection for every pool miss. TLS/H2c negotiation
/// isn't implemented here; this speaks plain HTTP/1.1.
struct TcpConnector {
    connect_timeout: Duration,
}

#[async_trait]
impl Connector for TcpConnector {
    async fn connect(&self, key: &ConnectionKey) -> Result<Connection> {
        let stream = tokio::time::timeout(self.connect_timeout, TcpStream::connect((key.host.as_str(), key.port)))
            .await
            .map_err(|_| err_msg("Timed out connecting"))??;
        Ok(Connection::new(key.clone(), HTTP_V1_1, stream, 1))
    }
}

/// An HTTP/1.1 client bound to one authority, with pooled connection reuse
/// and exponential-backoff retries on connection-level failures.
pub struct DirectClient {
    key: ConnectionKey,
    host_header: String,
    options: ClientOptions,
    pool: Pool<TcpConnector>,
    h2: AsyncMutex<Option<Arc<h2conn::Connection>>>,
}

impl DirectClient {
    pub fn new(scheme: &str, host: &str, port: u16, options: ClientOptions) -> Self {
        let max_connections = options.max_connections;
        let connect_timeout = options.connect_timeout;
        DirectClient {
            key: ConnectionKey::new(scheme, host, port),
            host_header: host.to_string(),
            options,
            pool: Pool::new(TcpConnector { connect_timeout }, max_connections),
            h2: AsyncMutex::new(None),
        }
    }

    /// Returns the lazily-established H2 connection, opening one on first
    /// use. A dead connection isn't currently detected and reconnected;
    /// see `DESIGN.md` for why this is an accepted gap rather than a
    /// silent one.
    async fn ensure_h2_connection(&self) -> Result<Arc<h2conn::Connection>> {
        let mut guard = self.h2.lock().await;
        if let Some(conn) = guard.as_ref() {
            return Ok(conn.clone());
        }

        let stream = tokio::time::timeout(
            self.options.connect_timeout,
            TcpStream::connect((self.key.host.as_str(), self.key.port)),
        )
        .await
        .map_err(|_| err_msg("Timed out connecting"))??;
        let (read_half, write_half) = stream.into_split();
        let conn = h2conn::Connection::new(h2conn::Role::Client, read_half, write_half).await?;
        *guard = Some(conn.clone());
        Ok(conn)
    }

    async fn send_h2(&self, request: &mut Request) -> Result<Response> {
        let conn = self.ensure_h2_connection().await?;

        let path = request.head.uri.build_path(&std::collections::HashMap::new(), true)?;
        let mut fields = vec![
            HeaderField {
                name: ":method".to_string(),
                value: request.head.method.as_str().to_string(),
            },
            HeaderField {
                name: ":path".to_string(),
                value: path,
            },
            HeaderField {
                name: ":scheme".to_string(),
                value: self.key.scheme.clone(),
            },
            HeaderField {
                name: ":authority".to_string(),
                value: self.host_header.clone(),
            },
        ];
        for h in request.head.headers.iter() {
            if h.name == HOST {
                continue;
            }
            fields.push(HeaderField {
                name: h.name.as_str().to_ascii_lowercase(),
                value: h.value_str().to_string(),
            });
        }

        let body_bytes = read_to_end(request.body.as_mut()).await?;
        let (stream, head_rx) = conn.open_stream(fields, body_bytes.is_empty()).await?;
        if !body_bytes.is_empty() {
            stream.send_data(body_bytes, true).await?;
        }

        let exchange = async {
            let (status, headers, mut body) = head_rx
                .await
                .map_err(|_| err_msg("HTTP/2 stream closed before response headers arrived"))?;
            let body_bytes = read_to_end(&mut body).await?;
            Ok(Response::from_wire(
                ResponseHead {
                    version: HTTP_V2_0,
                    reason: status.default_reason().unwrap_or("").to_string(),
                    status_code: status,
                    headers,
                },
                crate::body::BodyFromData(body_bytes.to_vec()),
            ))
        };

        match self.options.request_timeout {
            Some(d) => match tokio::time::timeout(d, exchange).await {
                Ok(result) => result,
                Err(_) => {
                    // Only this stream is reset (RFC 7540 §6.4's CANCEL);
                    // every sibling stream on the connection is untouched.
                    let _ = stream.reset(0x8).await;
                    Err(err_msg("Request timed out"))
                }
            },
            None => exchange.await,
        }
    }

    async fn send_once(&self, request: &mut Request) -> Result<Response> {
        let conn = self.pool.acquire(&self.key).await?;

        let result = self.send_on_connection(&conn, request).await;
        self.pool.release(&self.key, conn).await;
        result
    }

    async fn send_on_connection(&self, conn: &Connection, request: &mut Request) -> Result<Response> {
        let target = request
            .head
            .uri
            .build_path(&std::collections::HashMap::new(), true)?;

        let mut headers = request.head.headers.clone();
        if headers.find(HOST).next().is_none() {
            headers.push(HOST, self.host_header.clone())?;
        }

        let body_bytes = read_to_end(request.body.as_mut()).await?;
        if headers.find(CONTENT_LENGTH).next().is_none() && !body_bytes.is_empty() {
            headers.push(CONTENT_LENGTH, body_bytes.len().to_string())?;
        }

        let mut out = Vec::new();
        v1::serialize_request_line(
            &RequestLine {
                method: request.head.method,
                target,
                version: HTTP_V1_1,
            },
            &mut out,
        );
        v1::serialize_headers(&headers, &mut out);
        out.extend_from_slice(b"\r\n");
        out.extend_from_slice(&body_bytes);

        let mut stream = conn.stream.lock().await;
        stream.write_all(&out).await?;

        let mut reader = BufReader::new(&mut *stream);
        let mut line = String::new();
        {
            use tokio::io::AsyncBufReadExt;
            let n = reader.read_line(&mut line).await?;
            if n == 0 {
                return Err(err_msg("Connection closed before a status line was read"));
            }
        }
        while line.ends_with('\n') || line.ends_with('\r') {
            line.pop();
        }
        let status_line: StatusLine = v1::parse_status_line(&line)?;
        let headers = v1::read_headers(&mut reader).await?;

        let body_bytes = v1::read_framed_body(&headers, &mut reader).await?;

        Ok(Response::from_wire(
            ResponseHead {
                version: status_line.version,
                status_code: status_line.status_code,
                reason: status_line.reason,
                headers,
            },
            crate::body::BodyFromData(body_bytes.to_vec()),
        ))
    }
}

#[async_trait]
impl ClientInterface for DirectClient {
    async fn request(&self, mut request: Request) -> Result<Response> {
        for interceptor in &self.options.interceptors {
            if let Some(response) = interceptor.intercept(&mut request).await? {
                return Ok(response);
            }
        }

        if self.options.http2_prior_knowledge {
            return self.send_h2(&mut request).await;
        }

        let mut backoff = ExponentialBackoff::new(self.options.retry_backoff.clone());
        let mut last_err: Option<Error> = None;

        loop {
            match backoff.start_attempt() {
                ExponentialBackoffResult::Start => {}
                ExponentialBackoffResult::StartAfter(d) => tokio::time::sleep(d).await,
                ExponentialBackoffResult::Stop => {
                    return Err(last_err.unwrap_or_else(|| err_msg("Exceeded max num request retries")));
                }
            }

            match self.send_once(&mut request).await {
                Ok(resp) => {
                    backoff.end_attempt(true);
                    return Ok(resp);
                }
                Err(e) => {
                    backoff.end_attempt(false);
                    last_err = Some(e);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::method::Method;
    use crate::request::RequestBuilder;
    use tokio::net::TcpListener;

    #[tokio::test]
    async fn round_trips_a_get_request_against_an_echo_server() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut reader = BufReader::new(&mut stream);
            use tokio::io::AsyncBufReadExt;
            let mut line = String::new();
            reader.read_line(&mut line).await.unwrap();
            loop {
                let mut hdr_line = String::new();
                reader.read_line(&mut hdr_line).await.unwrap();
                if hdr_line == "\r\n" {
                    break;
                }
            }
            stream
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 2\r\n\r\nhi")
                .await
                .unwrap();
        });

        let client = DirectClient::new("http", &addr.ip().to_string(), addr.port(), ClientOptions::default());
        let uri = uri::UriBuilder::new(uri::UriFlags::NONE).path("/").unwrap();
        let request = RequestBuilder::new().method(Method::GET).uri(uri).build().unwrap();

        let resp = client.request(request).await.unwrap();
        assert!(resp.ok());

        server.await.unwrap();
    }

    struct AbortingInterceptor;

    #[async_trait]
    impl ClientInterceptor for AbortingInterceptor {
        async fn intercept(&self, _request: &mut Request) -> Result<Option<Response>> {
            Ok(Some(
                crate::response::ResponseBuilder::new()
                    .status(crate::status_code::StatusCode::FORBIDDEN)
                    .build()?,
            ))
        }
    }

    #[tokio::test]
    async fn interceptor_abort_never_touches_a_connection() {
        // Port 0 would fail to connect if `request` ever tried; binding no
        // listener at all proves the interceptor short-circuited before
        // any connection attempt.
        let client = DirectClient::new("http", "127.0.0.1", 1, ClientOptions {
            interceptors: vec![Arc::new(AbortingInterceptor)],
            ..ClientOptions::default()
        });
        let uri = uri::UriBuilder::new(uri::UriFlags::NONE).path("/").unwrap();
        let request = RequestBuilder::new().method(Method::GET).uri(uri).build().unwrap();

        let resp = client.request(request).await.unwrap();
        assert_eq!(resp.status(), crate::status_code::StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn h2_prior_knowledge_round_trips_a_request() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (stream, _) = listener.accept().await.unwrap();
            let (mut read_half, write_half) = stream.into_split();

            let mut preface = vec![0u8; crate::v2::CONNECTION_PREFACE.len()];
            tokio::io::AsyncReadExt::read_exact(&mut read_half, &mut preface)
                .await
                .unwrap();
            assert_eq!(&preface[..], crate::v2::CONNECTION_PREFACE);

            let conn = h2conn::Connection::new(h2conn::Role::Server, read_half, write_half)
                .await
                .unwrap();
            let incoming = conn.accept_stream().await.unwrap();
            assert_eq!(incoming.method, Method::GET);
            incoming
                .handle
                .send_headers(
                    vec![HeaderField {
                        name: ":status".to_string(),
                        value: "200".to_string(),
                    }],
                    false,
                )
                .await
                .unwrap();
            incoming
                .handle
                .send_data(bytes::Bytes::from_static(b"hi"), true)
                .await
                .unwrap();
        });

        let client = DirectClient::new(
            "http",
            &addr.ip().to_string(),
            addr.port(),
            ClientOptions {
                http2_prior_knowledge: true,
                ..ClientOptions::default()
            },
        );
        let uri = uri::UriBuilder::new(uri::UriFlags::NONE).path("/").unwrap();
        let request = RequestBuilder::new().method(Method::GET).uri(uri).build().unwrap();

        let resp = client.request(request).await.unwrap();
        assert!(resp.ok());

        server.await.unwrap();
    }
}
