//! Scripted in-memory transport for session tests

use crate::transport::traits::{TransportConnector, TransportStream};
use async_trait::async_trait;
use bytes::Bytes;
use carlink_shared::TransportError;
use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::sync::{mpsc, Notify};

/// Stream half handed to the session
pub struct MockStream {
    reads: mpsc::UnboundedReceiver<io::Result<Bytes>>,
    writes: Arc<Mutex<Vec<Bytes>>>,
    fail_writes: Arc<AtomicBool>,
    stall_writes: Arc<AtomicBool>,
}

/// Test-side end of a [`MockStream`]
pub struct MockPeer {
    reads: Option<mpsc::UnboundedSender<io::Result<Bytes>>>,
    writes: Arc<Mutex<Vec<Bytes>>>,
    fail_writes: Arc<AtomicBool>,
    stall_writes: Arc<AtomicBool>,
}

/// Create a connected stream/peer pair
pub fn pair() -> (MockStream, MockPeer) {
    let (tx, rx) = mpsc::unbounded_channel();
    let writes = Arc::new(Mutex::new(Vec::new()));
    let fail_writes = Arc::new(AtomicBool::new(false));
    let stall_writes = Arc::new(AtomicBool::new(false));
    (
        MockStream {
            reads: rx,
            writes: writes.clone(),
            fail_writes: fail_writes.clone(),
            stall_writes: stall_writes.clone(),
        },
        MockPeer {
            reads: Some(tx),
            writes,
            fail_writes,
            stall_writes,
        },
    )
}

impl MockPeer {
    /// Make the next read on the stream yield `data` as one chunk
    pub fn push(&self, data: &'static [u8]) {
        if let Some(tx) = &self.reads {
            let _ = tx.send(Ok(Bytes::from_static(data)));
        }
    }

    /// Make the next read fail
    pub fn fail_read(&self) {
        if let Some(tx) = &self.reads {
            let _ = tx.send(Err(io::Error::from(io::ErrorKind::ConnectionReset)));
        }
    }

    /// End of stream after pending chunks
    pub fn close(&mut self) {
        self.reads = None;
    }

    pub fn fail_writes(&self) {
        self.fail_writes.store(true, Ordering::SeqCst);
    }

    /// Writes never complete, like a transport with a full send buffer
    pub fn stall_writes(&self) {
        self.stall_writes.store(true, Ordering::SeqCst);
    }

    /// Every successful write call, in order
    pub fn writes(&self) -> Vec<Bytes> {
        self.writes.lock().unwrap().clone()
    }
}

impl AsyncRead for MockStream {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.reads.poll_recv(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                let n = chunk.len().min(buf.remaining());
                buf.put_slice(&chunk[..n]);
                Poll::Ready(Ok(()))
            }
            Poll::Ready(Some(Err(e))) => Poll::Ready(Err(e)),
            Poll::Ready(None) => Poll::Ready(Ok(())),
            Poll::Pending => Poll::Pending,
        }
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if self.stall_writes.load(Ordering::SeqCst) {
            return Poll::Pending;
        }
        if self.fail_writes.load(Ordering::SeqCst) {
            return Poll::Ready(Err(io::Error::from(io::ErrorKind::BrokenPipe)));
        }
        self.writes.lock().unwrap().push(Bytes::copy_from_slice(buf));
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Connector that replays a script of outcomes
///
/// Once the script is exhausted every attempt fails. Any stream type can be
/// scripted; [`MockStream`] is the default.
pub struct MockConnector<S = MockStream> {
    script: Mutex<VecDeque<S>>,
    failures_first: AtomicUsize,
    attempts: AtomicUsize,
    gate: Option<Arc<Notify>>,
}

impl<S> Default for MockConnector<S> {
    fn default() -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            failures_first: AtomicUsize::new(0),
            attempts: AtomicUsize::new(0),
            gate: None,
        }
    }
}

impl MockConnector {
    /// Every attempt fails
    pub fn failing() -> Self {
        Self::default()
    }
}

impl<S> MockConnector<S> {
    /// Attempts succeed with the given streams, in order
    pub fn with_streams(streams: Vec<S>) -> Self {
        Self {
            script: Mutex::new(streams.into()),
            ..Default::default()
        }
    }

    /// Fail `n` attempts before consuming the script
    pub fn fail_first(self, n: usize) -> Self {
        self.failures_first.store(n, Ordering::SeqCst);
        self
    }

    /// Hold every attempt until the returned notifier is signalled
    pub fn gated(mut self) -> (Self, Arc<Notify>) {
        let gate = Arc::new(Notify::new());
        self.gate = Some(gate.clone());
        (self, gate)
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<S: TransportStream> TransportConnector for MockConnector<S> {
    type Stream = S;

    async fn connect(&self, address: &str) -> Result<Self::Stream, TransportError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }

        let refused = || {
            TransportError::connect(address, io::Error::from(io::ErrorKind::ConnectionRefused))
        };

        if self
            .failures_first
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(refused());
        }

        self.script.lock().unwrap().pop_front().ok_or_else(refused)
    }

    fn name(&self) -> &'static str {
        "Mock"
    }
}
