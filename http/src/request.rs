use std::collections::HashMap;
use std::net::SocketAddr;

use common::errors::*;

use crate::body::{Body, EmptyBody};
use crate::header::{Header, Headers};
use crate::headers::cookie::parse_cookies;
use crate::method::Method;
use crate::version::{HttpVersion, HTTP_V1_1};
use uri::UriBuilder;

/// The three mutually exclusive ways a caller may consume a request (or
/// response) body. Only one may ever be taken for a given message: a
/// streaming read drains the underlying body, so nothing is left for a
/// later buffered read (or vice versa).
pub enum BodyView<'a> {
    /// The body has no payload.
    Empty,
    /// The body has already been fully buffered.
    Value(bytes::Bytes),
    /// Drive the body as a stream, one `read()` at a time.
    Stream(&'a mut dyn Body),
}

pub struct Request {
    pub head: RequestHead,
    pub body: Box<dyn Body>,
    body_taken: bool,
}

#[derive(Debug)]
pub struct RequestHead {
    pub method: Method,
    pub uri: UriBuilder,
    pub version: HttpVersion,
    pub headers: Headers,
    pub remote_addr: Option<SocketAddr>,
}

impl Request {
    /// Builds a `Request` from an already-parsed wire head/body, as read
    /// off a connection by the server's accept loop.
    pub(crate) fn from_wire(head: RequestHead, body: Box<dyn Body>) -> Request {
        Request {
            head,
            body,
            body_taken: false,
        }
    }

    /// Cookies parsed from the `Cookie` header(s); a name may repeat, so
    /// values are kept in an ordered list.
    pub fn cookies(&self) -> Result<HashMap<String, Vec<String>>> {
        parse_cookies(&self.head.headers)
    }

    /// Query parameters, parsed lazily from the request URI on first
    /// access rather than eagerly at construction time.
    pub fn query_params(&self) -> HashMap<String, String> {
        match self.head.uri.build_raw_query() {
            Some(raw) => raw
                .split('&')
                .filter(|s| !s.is_empty())
                .map(|pair| match pair.split_once('=') {
                    Some((k, v)) => (uri::charset::decode(k), uri::charset::decode(v)),
                    None => (uri::charset::decode(pair), String::new()),
                })
                .collect(),
            None => HashMap::new(),
        }
    }

    /// Takes exclusive access to the body as a stream view. Calling this
    /// more than once (or after the body was otherwise consumed) panics at
    /// the call site in debug builds of calling code; this guards against
    /// reading a message body from two places at once.
    pub fn take_body(&mut self) -> Option<&mut dyn Body> {
        if self.body_taken {
            return None;
        }
        self.body_taken = true;
        Some(self.body.as_mut())
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.head.fmt(f)
    }
}

pub struct RequestBuilder {
    method: Option<Method>,
    uri: Option<UriBuilder>,
    headers: Vec<Header>,
    body: Option<Box<dyn Body>>,
    remote_addr: Option<SocketAddr>,
    error: Option<Error>,
}

impl RequestBuilder {
    pub fn new() -> RequestBuilder {
        RequestBuilder {
            method: None,
            uri: None,
            headers: vec![],
            body: None,
            remote_addr: None,
            error: None,
        }
    }

    pub fn method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    pub fn uri(mut self, uri: UriBuilder) -> Self {
        self.uri = Some(uri);
        self
    }

    pub fn header(mut self, name: &str, value: impl Into<bytes::Bytes>) -> Self {
        match crate::header::HeaderName::from_str(name) {
            Ok(name) => self.headers.push(Header {
                name,
                value: value.into(),
            }),
            Err(e) => self.error = Some(e),
        }
        self
    }

    pub fn remote_addr(mut self, addr: SocketAddr) -> Self {
        self.remote_addr = Some(addr);
        self
    }

    pub fn body(mut self, body: Box<dyn Body>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn build(self) -> Result<Request> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let method = self.method.ok_or_else(|| err_msg("No method specified"))?;
        let uri = self.uri.ok_or_else(|| err_msg("No uri specified"))?;

        let mut headers = Headers::new();
        for h in self.headers {
            headers.push(h.name.as_str(), h.value)?;
        }

        Ok(Request {
            head: RequestHead {
                method,
                uri,
                version: HTTP_V1_1,
                headers,
                remote_addr: self.remote_addr,
            },
            body: self.body.unwrap_or_else(EmptyBody),
            body_taken: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_minimal_get_request() {
        let uri = UriBuilder::new(uri::UriFlags::NONE).path("/a").unwrap();
        let req = RequestBuilder::new()
            .method(Method::GET)
            .uri(uri)
            .header("Host", "example.com")
            .build()
            .unwrap();

        assert_eq!(req.head.method, Method::GET);
        assert!(req.head.headers.has("host"));
    }

    #[test]
    fn missing_method_is_an_error() {
        let uri = UriBuilder::new(uri::UriFlags::NONE).path("/a").unwrap();
        assert!(RequestBuilder::new().uri(uri).build().is_err());
    }

    #[tokio::test]
    async fn take_body_can_only_be_called_once() {
        let uri = UriBuilder::new(uri::UriFlags::NONE).path("/a").unwrap();
        let mut req = RequestBuilder::new()
            .method(Method::POST)
            .uri(uri)
            .body(crate::body::BodyFromData(b"hi".to_vec()))
            .build()
            .unwrap();

        assert!(req.take_body().is_some());
        assert!(req.take_body().is_none());
    }
}
