use std::collections::VecDeque;
use std::io::Cursor;

use async_trait::async_trait;
use bytes::{Buf, Bytes};
use common::errors::*;
use tokio::sync::{mpsc, oneshot};

use crate::header::Headers;

/// Pull-based byte source. Mirrors `tokio::io::AsyncRead` but over an
/// `async fn` rather than `poll_read`, since every implementation here is
/// naturally expressed as a sequence of awaits.
#[async_trait]
pub trait Readable: Send {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize>;
}

/// A streamed HTTP message payload.
///
/// `len()` is only meaningful before the first `read()` call; after that,
/// some implementations report the remaining length instead.
#[async_trait]
pub trait Body: Readable {
    /// Total transferred length, if known without consuming the body.
    fn len(&self) -> Option<usize>;

    /// Whether trailers may follow this body. If false, `trailers()` must
    /// never be called.
    fn has_trailers(&self) -> bool {
        false
    }

    /// Retrieves trailers. Only valid after the body has been fully read,
    /// and only callable once.
    async fn trailers(&mut self) -> Result<Option<Headers>>;
}

#[async_trait]
impl<T: 'static + AsRef<[u8]> + Send + Unpin> Readable for Cursor<T> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        use std::io::Read;
        Ok(Read::read(self, buf)?)
    }
}

#[async_trait]
impl<T: 'static + AsRef<[u8]> + Send + Unpin> Body for Cursor<T> {
    fn len(&self) -> Option<usize> {
        Some(self.get_ref().as_ref().len())
    }

    async fn trailers(&mut self) -> Result<Option<Headers>> {
        Ok(None)
    }
}

/// Creates a body containing no data.
#[allow(non_snake_case)]
pub fn EmptyBody() -> Box<dyn Body> {
    Box::new(Cursor::new(Vec::new()))
}

/// Creates a body from a precomputed blob of data.
#[allow(non_snake_case)]
pub fn BodyFromData<T: 'static + AsRef<[u8]> + Send + Unpin>(data: T) -> Box<dyn Body> {
    Box::new(Cursor::new(data))
}

struct WithTrailersBody {
    body: Box<dyn Body>,
    trailers: Option<Headers>,
}

/// Wraps a body to attach trailers that are already known up front.
#[allow(non_snake_case)]
pub fn WithTrailers(body: Box<dyn Body>, trailers: Headers) -> Box<dyn Body> {
    Box::new(WithTrailersBody {
        body,
        trailers: Some(trailers),
    })
}

#[async_trait]
impl Readable for WithTrailersBody {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.body.read(buf).await
    }
}

#[async_trait]
impl Body for WithTrailersBody {
    fn len(&self) -> Option<usize> {
        self.body.len()
    }

    fn has_trailers(&self) -> bool {
        true
    }

    async fn trailers(&mut self) -> Result<Option<Headers>> {
        Ok(self.trailers.take())
    }
}

struct PartsBody {
    parts: VecDeque<Bytes>,
}

/// Creates a body from a fixed sequence of chunks, as produced by a
/// multipart part or an already-buffered set of writes.
#[allow(non_snake_case)]
pub fn BodyFromParts<I: Iterator<Item = Bytes>>(parts: I) -> Box<dyn Body> {
    Box::new(PartsBody {
        parts: parts.collect(),
    })
}

#[async_trait]
impl Readable for PartsBody {
    async fn read(&mut self, mut buf: &mut [u8]) -> Result<usize> {
        let mut nread = 0;
        while !buf.is_empty() {
            let part = match self.parts.get_mut(0) {
                Some(v) => v,
                None => break,
            };

            if part.is_empty() {
                self.parts.pop_front();
                continue;
            }

            let n = std::cmp::min(buf.len(), part.len());
            buf[0..n].copy_from_slice(&part[0..n]);
            nread += n;

            buf = &mut buf[n..];
            part.advance(n);
        }

        Ok(nread)
    }
}

#[async_trait]
impl Body for PartsBody {
    fn len(&self) -> Option<usize> {
        Some(self.parts.iter().map(|p| p.len()).sum())
    }

    async fn trailers(&mut self) -> Result<Option<Headers>> {
        Ok(None)
    }
}

/// A body terminated by EOF on the underlying connection, with no known
/// length (HTTP/1.1 connection-close bodies, or HTTP/2 DATA frames until
/// END_STREAM).
pub struct IncomingUnboundedBody<R> {
    reader: R,
}

impl<R: Readable> IncomingUnboundedBody<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }
}

#[async_trait]
impl<R: Readable> Readable for IncomingUnboundedBody<R> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        self.reader.read(buf).await
    }
}

#[async_trait]
impl<R: Readable> Body for IncomingUnboundedBody<R> {
    fn len(&self) -> Option<usize> {
        None
    }

    async fn trailers(&mut self) -> Result<Option<Headers>> {
        Ok(None)
    }
}

/// A body with a declared `Content-Length`. Errors out if the underlying
/// stream ends before that many bytes have been read.
pub struct IncomingSizedBody<R> {
    reader: R,
    remaining: usize,
    failed: bool,
}

impl<R: Readable> IncomingSizedBody<R> {
    pub fn new(reader: R, length: usize) -> Self {
        Self {
            reader,
            remaining: length,
            failed: false,
        }
    }
}

#[async_trait]
impl<R: Readable> Readable for IncomingSizedBody<R> {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.failed {
            return Err(err_msg("Body has previously failed while being read"));
        }
        if self.remaining == 0 || buf.is_empty() {
            return Ok(0);
        }

        let n = std::cmp::min(self.remaining, buf.len());
        let nread = match self.reader.read(&mut buf[0..n]).await {
            Ok(n) => n,
            Err(e) => {
                self.failed = true;
                return Err(e);
            }
        };

        self.remaining -= nread;
        if nread == 0 && self.remaining != 0 {
            self.failed = true;
            return Err(err_msg("Connection closed before Content-Length bytes were read"));
        }

        Ok(nread)
    }
}

#[async_trait]
impl<R: Readable> Body for IncomingSizedBody<R> {
    fn len(&self) -> Option<usize> {
        Some(self.remaining)
    }

    async fn trailers(&mut self) -> Result<Option<Headers>> {
        Ok(None)
    }
}

/// Producer-facing half of a reactive body channel.
///
/// Backed by a bounded `tokio::sync::mpsc` channel: its capacity is the
/// high watermark, since `send` awaits (applying backpressure to the
/// producer) once that many chunks are buffered and unread. There's no
/// separate low watermark; the consumer resumes production as soon as it
/// frees a single slot rather than waiting to drain to some lower level.
pub struct ChannelBodySender {
    sender: mpsc::Sender<Result<Bytes>>,
    trailers: Option<oneshot::Sender<Option<Headers>>>,
}

impl ChannelBodySender {
    /// Sends a chunk, waiting for buffer space if the high watermark has
    /// been reached. Returns an error if the consumer has gone away
    /// (cancellation propagates this way, without the producer needing to
    /// poll for it separately).
    pub async fn send(&self, chunk: Bytes) -> Result<()> {
        self.sender
            .send(Ok(chunk))
            .await
            .map_err(|_| err_msg("Body consumer dropped"))
    }

    /// Fails the body: the next `read()` on the consumer side returns
    /// this error instead of EOF.
    pub async fn fail(self, err: Error) {
        let _ = self.sender.send(Err(err)).await;
    }

    /// Ends the stream, optionally attaching trailers.
    pub fn finish(self, trailers: Option<Headers>) {
        if let Some(tx) = self.trailers {
            let _ = tx.send(trailers);
        }
    }

    /// Clones the underlying raw chunk sender, bypassing `send`/`fail`'s
    /// single-owner API. Used by the HTTP/2 multiplexer, which looks up a
    /// stream's sender under a shared lock but must not hold that lock
    /// across the (possibly backpressured) send itself.
    pub(crate) fn raw_sender(&self) -> mpsc::Sender<Result<Bytes>> {
        self.sender.clone()
    }
}

pub struct ChannelBody {
    receiver: mpsc::Receiver<Result<Bytes>>,
    trailers: Option<oneshot::Receiver<Option<Headers>>>,
    current: Bytes,
    done: bool,
}

/// Creates a unicast producer/consumer body pair with bounded buffering.
///
/// `capacity` is the number of not-yet-read chunks the producer may get
/// ahead by before `ChannelBodySender::send` starts awaiting; this is the
/// channel's high watermark.
pub fn channel_body(capacity: usize) -> (ChannelBodySender, ChannelBody) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let (trailers_tx, trailers_rx) = oneshot::channel();
    (
        ChannelBodySender {
            sender,
            trailers: Some(trailers_tx),
        },
        ChannelBody {
            receiver,
            trailers: Some(trailers_rx),
            current: Bytes::new(),
            done: false,
        },
    )
}

#[async_trait]
impl Readable for ChannelBody {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.done || buf.is_empty() {
            return Ok(0);
        }

        if self.current.is_empty() {
            match self.receiver.recv().await {
                Some(Ok(chunk)) => self.current = chunk,
                Some(Err(e)) => {
                    self.done = true;
                    return Err(e);
                }
                None => {
                    self.done = true;
                    return Ok(0);
                }
            }
        }

        let n = std::cmp::min(buf.len(), self.current.len());
        buf[0..n].copy_from_slice(&self.current[0..n]);
        self.current.advance(n);
        Ok(n)
    }
}

#[async_trait]
impl Body for ChannelBody {
    fn len(&self) -> Option<usize> {
        None
    }

    fn has_trailers(&self) -> bool {
        true
    }

    async fn trailers(&mut self) -> Result<Option<Headers>> {
        match self.trailers.take() {
            Some(rx) => Ok(rx.await.unwrap_or(None)),
            None => Ok(None),
        }
    }
}

/// Reads a body to completion, returning all bytes. Intended for small,
/// fully-buffered bodies (the "value" body view); callers needing
/// streaming semantics should drive `Body::read` directly instead.
pub async fn read_to_end(body: &mut dyn Body) -> Result<Bytes> {
    let mut out = Vec::with_capacity(body.len().unwrap_or(0));
    let mut buf = [0u8; 8192];
    loop {
        let n = body.read(&mut buf).await?;
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[0..n]);
    }
    Ok(Bytes::from(out))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_body_reads_zero() {
        let mut body = EmptyBody();
        let mut buf = [0u8; 16];
        assert_eq!(body.read(&mut buf).await.unwrap(), 0);
        assert_eq!(body.len(), Some(0));
    }

    #[tokio::test]
    async fn body_from_data_round_trips() {
        let mut body = BodyFromData(b"hello".to_vec());
        assert_eq!(body.len(), Some(5));
        let data = read_to_end(&mut *body).await.unwrap();
        assert_eq!(&data[..], b"hello");
    }

    #[tokio::test]
    async fn sized_body_errors_on_early_eof() {
        let mut body = IncomingSizedBody::new(Cursor::new(b"ab".to_vec()), 5);
        let mut buf = [0u8; 5];
        assert!(body.read(&mut buf).await.is_err());
    }

    #[tokio::test]
    async fn channel_body_streams_chunks_in_order() {
        let (sender, mut body) = channel_body(4);
        let handle = tokio::spawn(async move {
            sender.send(Bytes::from_static(b"ab")).await.unwrap();
            sender.send(Bytes::from_static(b"cd")).await.unwrap();
            sender.finish(None);
        });

        let data = read_to_end(&mut body).await.unwrap();
        handle.await.unwrap();
        assert_eq!(&data[..], b"abcd");
    }

    #[tokio::test]
    async fn channel_body_propagates_producer_failure() {
        let (sender, mut body) = channel_body(1);
        tokio::spawn(async move {
            sender.fail(err_msg("upstream broke")).await;
        });

        let mut buf = [0u8; 8];
        assert!(body.read(&mut buf).await.is_err());
    }

    #[tokio::test]
    async fn channel_body_send_applies_backpressure() {
        let (sender, mut body) = channel_body(1);
        sender.send(Bytes::from_static(b"a")).await.unwrap();

        let sender2 = sender;
        let blocked = tokio::spawn(async move {
            sender2.send(Bytes::from_static(b"b")).await.unwrap();
            sender2.finish(None);
        });

        // Draining the first chunk frees the one slot of buffer space,
        // letting the blocked send complete.
        let mut buf = [0u8; 1];
        assert_eq!(body.read(&mut buf).await.unwrap(), 1);
        let data = read_to_end(&mut body).await.unwrap();
        blocked.await.unwrap();
        assert_eq!(&data[..], b"b");
    }
}
