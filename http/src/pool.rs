use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use common::errors::*;
use tokio::sync::{oneshot, Mutex};

use crate::connection::{Connection, ConnectionKey};

/// Establishes a brand-new connection for a pool key. Implemented by the
/// transport layer (TCP + ALPN/H2c negotiation); kept abstract here so the
/// pool itself stays transport-agnostic.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, key: &ConnectionKey) -> Result<Connection>;
}

struct PoolState {
    connections: HashMap<ConnectionKey, Vec<Arc<Connection>>>,
    waiters: HashMap<ConnectionKey, VecDeque<oneshot::Sender<Arc<Connection>>>>,
}

/// A connection pool keyed by `(scheme, host, port)`. Requests beyond a
/// connection's own concurrency cap (1 for unpipelined HTTP/1.1, the
/// negotiated `pipelining_depth`, or HTTP/2's `max_concurrent_streams`)
/// queue as FIFO waiters rather than spawning unbounded new connections.
pub struct Pool<C> {
    connector: C,
    max_connections_per_key: usize,
    state: Mutex<PoolState>,
}

impl<C: Connector> Pool<C> {
    pub fn new(connector: C, max_connections_per_key: usize) -> Self {
        Pool {
            connector,
            max_connections_per_key,
            state: Mutex::new(PoolState {
                connections: HashMap::new(),
                waiters: HashMap::new(),
            }),
        }
    }

    /// Acquires a connection with spare capacity for `key`, reusing an
    /// idle one, opening a new one if under the per-key cap, or else
    /// joining the FIFO queue for the next one released.
    pub async fn acquire(&self, key: &ConnectionKey) -> Result<Arc<Connection>> {
        loop {
            let mut state = self.state.lock().await;

            if let Some(conns) = state.connections.get(key) {
                if let Some(conn) = conns.iter().find(|c| c.has_capacity()) {
                    conn.begin_request();
                    return Ok(conn.clone());
                }
            }

            let count = state.connections.get(key).map(|v| v.len()).unwrap_or(0);
            if count < self.max_connections_per_key {
                drop(state);

                let conn = Arc::new(self.connector.connect(key).await?);
                conn.begin_request();

                let mut state = self.state.lock().await;
                state.connections.entry(key.clone()).or_default().push(conn.clone());
                return Ok(conn);
            }

            let (tx, rx) = oneshot::channel();
            state.waiters.entry(key.clone()).or_default().push_back(tx);
            drop(state);

            return rx.await.map_err(|_| err_msg("Pool closed while waiting for a connection"));
        }
    }

    /// Releases a request's claim on `conn`. If a FIFO waiter for `key` is
    /// queued, its claim transfers directly to that waiter rather than
    /// being returned to general availability first.
    pub async fn release(&self, key: &ConnectionKey, conn: Arc<Connection>) {
        let mut state = self.state.lock().await;

        if let Some(waiters) = state.waiters.get_mut(key) {
            while let Some(tx) = waiters.pop_front() {
                match tx.send(conn.clone()) {
                    Ok(()) => return,
                    Err(_) => continue,
                }
            }
        }

        conn.end_request();
    }

    pub async fn idle_connection_count(&self, key: &ConnectionKey) -> usize {
        self.state
            .lock()
            .await
            .connections
            .get(key)
            .map(|v| v.len())
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::HTTP_V1_1;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingConnector {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Connector for CountingConnector {
        async fn connect(&self, _key: &ConnectionKey) -> Result<Connection> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            let connect = tokio::net::TcpStream::connect(addr);
            let accept = listener.accept();
            let (stream, _) = tokio::join!(connect, accept).0.map(|s| (s, ())).unwrap();
            Ok(Connection::new(
                ConnectionKey::new("http", "x", 1),
                HTTP_V1_1,
                stream,
                1,
            ))
        }
    }

    #[tokio::test]
    async fn reuses_idle_connection_with_capacity() {
        let pool = Pool::new(CountingConnector { calls: AtomicUsize::new(0) }, 4);
        let key = ConnectionKey::new("http", "example.com", 80);

        let conn = pool.acquire(&key).await.unwrap();
        pool.release(&key, conn).await;
        let conn2 = pool.acquire(&key).await.unwrap();

        assert_eq!(pool.connector.calls.load(Ordering::SeqCst), 1);
        drop(conn2);
    }

    #[tokio::test]
    async fn waiter_receives_connection_released_by_holder() {
        let pool = Arc::new(Pool::new(CountingConnector { calls: AtomicUsize::new(0) }, 1));
        let key = ConnectionKey::new("http", "example.com", 80);

        let held = pool.acquire(&key).await.unwrap();

        let pool2 = pool.clone();
        let key2 = key.clone();
        let waiter = tokio::spawn(async move { pool2.acquire(&key2).await });

        tokio::task::yield_now().await;
        pool.release(&key, held).await;

        let got = waiter.await.unwrap().unwrap();
        assert!(Arc::strong_count(&got) >= 1);
    }
}
