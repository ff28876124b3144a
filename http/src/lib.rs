//! HTTP/1.1 and HTTP/2 message types, wire codecs, and a reactive body
//! abstraction, plus a minimal client and the building blocks a server
//! drives (`Exchange`, `Pool`).
pub mod backoff;
pub mod body;
pub mod chunked;
pub mod client;
pub mod connection;
pub mod error;
pub mod exchange;
pub mod header;
pub mod headers;
pub mod method;
pub mod multipart;
pub mod pool;
pub mod request;
pub mod response;
pub mod server;
pub mod sse;
pub mod status_code;
pub mod urlencoded;
pub mod v1;
pub mod v2;
pub mod version;

pub use body::{Body, Readable};
pub use error::WebError;
pub use header::{Header, HeaderName, Headers};
pub use method::Method;
pub use request::{Request, RequestBuilder};
pub use response::{Response, ResponseBuilder};
pub use status_code::StatusCode;
pub use version::HttpVersion;

pub type Result<T> = common::errors::Result<T>;
