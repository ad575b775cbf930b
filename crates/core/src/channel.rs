// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Abstract bidirectional, in-order, opaque byte transport.

use std::fmt;
use std::sync::Arc;

use bytes::{Bytes, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::Mutex;

/// A transport-level failure reported by a [`Channel`] implementation.
#[derive(Debug, Clone)]
pub struct ChannelError(pub String);

impl fmt::Display for ChannelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for ChannelError {}

impl From<std::io::Error> for ChannelError {
    fn from(e: std::io::Error) -> Self {
        Self(e.to_string())
    }
}

/// Ordered, duplicate-free, opaque byte transport (§4.4).
///
/// Ordering is FIFO; reordering and duplication are forbidden. Partial
/// reads and writes are the driver's responsibility to reassemble via the
/// codec's incremental decoder, not the channel's.
pub trait Channel: Send + Sync {
    /// Append `bytes` to the outbound stream. May block on backpressure.
    fn send(&self, bytes: Bytes) -> impl std::future::Future<Output = Result<(), ChannelError>> + Send;

    /// Return the next chunk (size unspecified, at least one byte unless the
    /// stream closed), or `None` on orderly close.
    fn recv(&self) -> impl std::future::Future<Output = Result<Option<Bytes>, ChannelError>> + Send;

    /// Return the next chunk only if one is immediately available, without
    /// blocking. Used by non-blocking `Collect` (§4.5); the default
    /// implementation reports nothing available, which is always a legal
    /// (if conservative) answer.
    fn try_recv(&self) -> Option<Bytes> {
        None
    }

    /// Close the channel. After this, `send` fails and `recv` returns
    /// `None`.
    fn close(&self) -> impl std::future::Future<Output = ()> + Send;
}

/// An in-memory channel built from a [`tokio::io::duplex`] pair.
///
/// Used by the kernel's own driver tests and by protocol instances (e.g.
/// the handshake) for end-to-end duality tests (§8, property 7) — there is
/// deliberately no TCP/Unix-socket/named-pipe implementation here; concrete
/// bearers are a host concern (§1).
pub struct DuplexChannel {
    read_half: Mutex<tokio::io::ReadHalf<DuplexStream>>,
    write_half: Mutex<tokio::io::WriteHalf<DuplexStream>>,
    closed: Arc<std::sync::atomic::AtomicBool>,
}

impl DuplexChannel {
    /// Build a connected pair of in-memory channels, `max_buf_size` bytes
    /// each way before a writer blocks.
    pub fn pair(max_buf_size: usize) -> (Self, Self) {
        let (a, b) = tokio::io::duplex(max_buf_size);
        let (a_read, a_write) = tokio::io::split(a);
        let (b_read, b_write) = tokio::io::split(b);
        (
            Self {
                read_half: Mutex::new(a_read),
                write_half: Mutex::new(a_write),
                closed: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            },
            Self {
                read_half: Mutex::new(b_read),
                write_half: Mutex::new(b_write),
                closed: Arc::new(std::sync::atomic::AtomicBool::new(false)),
            },
        )
    }
}

impl Channel for DuplexChannel {
    async fn send(&self, bytes: Bytes) -> Result<(), ChannelError> {
        if self.closed.load(std::sync::atomic::Ordering::Acquire) {
            return Err(ChannelError("send on closed channel".to_owned()));
        }
        let mut write_half = self.write_half.lock().await;
        write_half.write_all(&bytes).await?;
        Ok(())
    }

    async fn recv(&self) -> Result<Option<Bytes>, ChannelError> {
        let mut read_half = self.read_half.lock().await;
        let mut buf = BytesMut::zeroed(4096);
        let n = read_half.read(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        buf.truncate(n);
        Ok(Some(buf.freeze()))
    }

    async fn close(&self) {
        self.closed.store(true, std::sync::atomic::Ordering::Release);
        let mut write_half = self.write_half.lock().await;
        let _ = write_half.shutdown().await;
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod channel_tests;
