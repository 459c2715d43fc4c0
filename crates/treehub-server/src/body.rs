//! Bridges between async HTTP bodies and the blocking `Read`/`Write` the
//! services consume.

use std::io::{self, Read, Write};

use axum::body::{Body, Bytes};
use futures::StreamExt;
use tokio::sync::mpsc;

/// Chunks buffered between the async side and the blocking side.
const CHANNEL_DEPTH: usize = 8;

/// Bytes a [`ChannelWriter`] collects before handing a chunk to the body.
pub const CHUNK_SIZE: usize = 64 * 1024;

/// Blocking reader fed by [`pump`]. Reads block the calling thread, so it
/// must only be used off the async runtime (e.g. in `spawn_blocking`).
///
/// An empty chunk marks the end of the body. A channel that closes without
/// it means the pump was cancelled, and the reader fails instead of
/// reporting a truncated body as complete.
pub struct ChannelReader {
    rx: mpsc::Receiver<io::Result<Bytes>>,
    current: Bytes,
    finished: bool,
}

impl ChannelReader {
    /// Create a reader and the sender the pump writes into.
    pub fn channel() -> (mpsc::Sender<io::Result<Bytes>>, Self) {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        (
            tx,
            Self {
                rx,
                current: Bytes::new(),
                finished: false,
            },
        )
    }
}

impl Read for ChannelReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() || self.finished {
            return Ok(0);
        }
        while self.current.is_empty() {
            match self.rx.blocking_recv() {
                Some(Ok(chunk)) if chunk.is_empty() => {
                    self.finished = true;
                    return Ok(0);
                }
                Some(Ok(chunk)) => self.current = chunk,
                Some(Err(e)) => return Err(e),
                None => {
                    return Err(io::Error::new(
                        io::ErrorKind::UnexpectedEof,
                        "request body aborted",
                    ))
                }
            }
        }
        let n = buf.len().min(self.current.len());
        buf[..n].copy_from_slice(&self.current.split_to(n));
        Ok(n)
    }
}

/// Forward `body` into `tx` until the body ends, fails, or the reader goes
/// away. A fully read body is followed by the empty end marker.
pub async fn pump(body: Body, tx: mpsc::Sender<io::Result<Bytes>>) {
    let mut stream = body.into_data_stream();
    while let Some(chunk) = stream.next().await {
        let item = match chunk {
            Ok(bytes) if bytes.is_empty() => continue,
            Ok(bytes) => Ok(bytes),
            Err(e) => Err(io::Error::other(e)),
        };
        let failed = item.is_err();
        if tx.send(item).await.is_err() || failed {
            return;
        }
    }
    let _ = tx.send(Ok(Bytes::new())).await;
}

/// Blocking writer whose output becomes a streamed response body.
///
/// Only use it off the async runtime. Call [`finish`](Self::finish) once all
/// bytes are written; a writer dropped without it ends the body with an
/// error so the client never mistakes a truncated object for a whole one.
pub struct ChannelWriter {
    tx: mpsc::Sender<io::Result<Bytes>>,
    buf: Vec<u8>,
    done: bool,
}

impl ChannelWriter {
    /// Create a writer and the response body it feeds.
    pub fn channel() -> (Self, Body) {
        let (tx, rx) = mpsc::channel(CHANNEL_DEPTH);
        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });
        let writer = Self {
            tx,
            buf: Vec::with_capacity(CHUNK_SIZE),
            done: false,
        };
        (writer, Body::from_stream(stream))
    }

    /// Flush what is left and end the body cleanly.
    pub fn finish(mut self) -> io::Result<()> {
        self.flush()?;
        self.done = true;
        Ok(())
    }

    /// End the body with `err`. Buffered bytes are discarded.
    pub fn abort(mut self, err: io::Error) {
        self.done = true;
        let _ = self.tx.blocking_send(Err(err));
    }

    fn send(&self, item: io::Result<Bytes>) -> io::Result<()> {
        self.tx
            .blocking_send(item)
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "response body dropped"))
    }
}

impl Write for ChannelWriter {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(data);
        if self.buf.len() >= CHUNK_SIZE {
            self.flush()?;
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let chunk = std::mem::replace(&mut self.buf, Vec::with_capacity(CHUNK_SIZE));
        self.send(Ok(Bytes::from(chunk)))
    }
}

impl Drop for ChannelWriter {
    fn drop(&mut self) {
        if !self.done {
            // try_send: drop may run on the runtime, where blocking_send panics.
            let _ = self.tx.try_send(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                "response body truncated",
            )));
        }
    }
}
