use cookie::Cookie;
use common::errors::*;

use crate::body::{Body, EmptyBody};
use crate::header::{Header, Headers};
use crate::status_code::StatusCode;
use crate::version::{HttpVersion, HTTP_V1_1};
use crate::error::WebError;

pub struct Response {
    pub head: ResponseHead,
    pub body: Box<dyn Body>,
    headers_written: bool,
    pending_cookies: Vec<Cookie<'static>>,
}

#[derive(Debug)]
pub struct ResponseHead {
    pub version: HttpVersion,
    pub status_code: StatusCode,
    pub reason: String,
    pub headers: Headers,
}

impl Response {
    /// Builds a `Response` from an already-parsed wire head/body, as read
    /// back by a client. Headers are considered already flushed since
    /// they arrived over the wire verbatim.
    pub(crate) fn from_wire(head: ResponseHead, body: Box<dyn Body>) -> Response {
        Response {
            head,
            body,
            headers_written: true,
            pending_cookies: Vec::new(),
        }
    }

    pub fn ok(&self) -> bool {
        self.head.status_code == StatusCode::OK
    }

    pub fn status(&self) -> StatusCode {
        self.head.status_code
    }

    /// Queues a cookie to be materialized as a `Set-Cookie` header the
    /// next time headers are flushed. Per the spec's `HeadersAlreadyWritten`
    /// invariant, once headers have been sent, neither this nor any other
    /// header mutation is allowed.
    pub fn add_cookie(&mut self, cookie: Cookie<'static>) -> Result<()> {
        if self.headers_written {
            return Err(WebError::HeadersAlreadyWritten.into());
        }
        self.pending_cookies.push(cookie);
        Ok(())
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<bytes::Bytes>) -> Result<()> {
        if self.headers_written {
            return Err(WebError::HeadersAlreadyWritten.into());
        }
        self.head.headers.set(name, value)
    }

    /// Flushes pending cookies into `Set-Cookie` headers and marks headers
    /// as written; no further header mutation is possible afterwards.
    pub fn flush_headers(&mut self) -> Result<&Headers> {
        if !self.headers_written {
            for cookie in self.pending_cookies.drain(..) {
                self.head.headers.push("Set-Cookie", cookie.to_string())?;
            }
            self.headers_written = true;
        }
        Ok(&self.head.headers)
    }

    pub fn headers_written(&self) -> bool {
        self.headers_written
    }
}

impl std::fmt::Debug for Response {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.head.fmt(f)
    }
}

/// Helper for building a Response object.
pub struct ResponseBuilder {
    status_code: Option<StatusCode>,
    reason: Option<String>,
    headers: Vec<Header>,
    cookies: Vec<Cookie<'static>>,
    body: Option<Box<dyn Body>>,
    error: Option<Error>,
}

impl ResponseBuilder {
    pub fn new() -> ResponseBuilder {
        ResponseBuilder {
            status_code: None,
            reason: None,
            headers: vec![],
            cookies: vec![],
            body: None,
            error: None,
        }
    }

    pub fn status(mut self, code: StatusCode) -> Self {
        self.status_code = Some(code);
        self
    }

    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = Some(reason.into());
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

    pub fn cookie(mut self, cookie: Cookie<'static>) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Sets a fully-buffered value body.
    pub fn body_value(self, data: impl Into<bytes::Bytes>) -> Self {
        self.body(crate::body::BodyFromData(data.into().to_vec()))
    }

    /// Sets a streaming body, as produced by a reactive publisher.
    pub fn body(mut self, body: Box<dyn Body>) -> Self {
        self.body = Some(body);
        self
    }

    pub fn build(self) -> Result<Response> {
        if let Some(e) = self.error {
            return Err(e);
        }

        let status_code = self.status_code.ok_or_else(|| err_msg("No status specified"))?;

        let reason = match self.reason {
            Some(r) => r,
            None => status_code
                .default_reason()
                .ok_or_else(|| format_err!("No default reason for status code: {}", status_code.as_u16()))?
                .to_string(),
        };

        let mut headers = Headers::new();
        for h in self.headers {
            headers.push(h.name.as_str(), h.value)?;
        }

        Ok(Response {
            head: ResponseHead {
                version: HTTP_V1_1,
                status_code,
                reason,
                headers,
            },
            body: self.body.unwrap_or_else(EmptyBody),
            headers_written: false,
            pending_cookies: self.cookies,
        })
    }
}

/// Builds a response from a `WebError`, per the §7 error-to-response
/// mapping: status code from `WebError::status_code()`, plus any
/// `Allow`/`Retry-After` headers it prescribes.
pub fn error_response(err: &WebError) -> Result<Response> {
    let mut builder = ResponseBuilder::new().status(err.status_code());
    for (name, value) in err.response_headers() {
        builder = builder.header(name, value);
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builds_minimal_ok_response() {
        let resp = ResponseBuilder::new().status(StatusCode::OK).build().unwrap();
        assert!(resp.ok());
    }

    #[test]
    fn header_mutation_rejected_after_flush() {
        let mut resp = ResponseBuilder::new().status(StatusCode::OK).build().unwrap();
        resp.flush_headers().unwrap();
        assert!(resp.set_header("X-Late", "nope").is_err());
    }

    #[test]
    fn pending_cookies_become_set_cookie_headers() {
        let mut resp = ResponseBuilder::new()
            .status(StatusCode::OK)
            .cookie(Cookie::new("session", "abc"))
            .build()
            .unwrap();

        let headers = resp.flush_headers().unwrap();
        assert!(headers.has("Set-Cookie"));
    }

    #[test]
    fn error_response_carries_allow_header() {
        let err = WebError::MethodNotAllowed {
            allow: vec![crate::method::Method::GET, crate::method::Method::POST],
        };
        let resp = error_response(&err).unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert!(resp.head.headers.has("Allow"));
    }
}
