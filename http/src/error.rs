//! The web-level fault taxonomy. Faults produced before a response's
//! headers are flushed are recoverable (see `crate::exchange`); faults
//! after flush just terminate the stream/connection.
use crate::status_code::StatusCode;

#[derive(Debug, Clone)]
pub enum WebError {
    /// Server decoded an invalid request (missing required parameter,
    /// malformed multipart, ...).
    BadRequest(String),
    /// Request body exceeded a configured limit.
    PayloadTooLarge,
    /// No encoder/decoder for the declared content type, or an
    /// unclassified handler error.
    InternalServerError(String),
    /// Per-request deadline exceeded.
    RequestTimeout(std::time::Duration),
    NotFound,
    MethodNotAllowed { allow: Vec<crate::method::Method> },
    ServiceUnavailable { retry_after: Option<std::time::Duration> },
    /// Transport-level termination mid-exchange.
    ConnectionClosed,
    /// Caller tried to mutate headers/cookies after flush.
    HeadersAlreadyWritten,
    /// Malformed URI template, invalid parameter name/value, `**` misuse.
    UriBuilder(uri::BuilderError),
}

impl WebError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebError::BadRequest(_) => StatusCode::BAD_REQUEST,
            WebError::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
            WebError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WebError::RequestTimeout(_) => StatusCode::REQUEST_TIMEOUT,
            WebError::NotFound => StatusCode::NOT_FOUND,
            WebError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            WebError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            WebError::ConnectionClosed => StatusCode::INTERNAL_SERVER_ERROR,
            WebError::HeadersAlreadyWritten => StatusCode::INTERNAL_SERVER_ERROR,
            WebError::UriBuilder(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Extra headers a recovery response for this error should carry
    /// (`Allow` for 405, `Retry-After` for 503).
    pub fn response_headers(&self) -> Vec<(&'static str, String)> {
        match self {
            WebError::MethodNotAllowed { allow } => vec![(
                "Allow",
                allow
                    .iter()
                    .map(|m| m.as_str().to_string())
                    .collect::<Vec<_>>()
                    .join(", "),
            )],
            WebError::ServiceUnavailable {
                retry_after: Some(d),
            } => vec![("Retry-After", d.as_secs().to_string())],
            _ => Vec::new(),
        }
    }
}

impl std::fmt::Display for WebError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WebError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            WebError::PayloadTooLarge => write!(f, "Payload too large"),
            WebError::InternalServerError(msg) => write!(f, "Internal server error: {}", msg),
            WebError::RequestTimeout(d) => write!(f, "Exceeded timeout {}ms", d.as_millis()),
            WebError::NotFound => write!(f, "Not found"),
            WebError::MethodNotAllowed { .. } => write!(f, "Method not allowed"),
            WebError::ServiceUnavailable { .. } => write!(f, "Service unavailable"),
            WebError::ConnectionClosed => write!(f, "Connection closed"),
            WebError::HeadersAlreadyWritten => write!(f, "Headers already written"),
            WebError::UriBuilder(e) => write!(f, "Uri builder error: {}", e),
        }
    }
}

impl std::error::Error for WebError {}

impl From<uri::BuilderError> for WebError {
    fn from(e: uri::BuilderError) -> Self {
        WebError::UriBuilder(e)
    }
}

impl From<WebError> for common::errors::Error {
    fn from(e: WebError) -> Self {
        common::errors::format_err!("{}", e)
    }
}
