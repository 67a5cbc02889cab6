//! Transfer metering
//!
//! [`TransferMeter`] wraps a byte sink or source and counts every byte that
//! passes through it into a shared [`TransferStats`]. The copy loop is the
//! only writer of the counters; samplers only read them.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::time::Instant;

use crate::transfer::results::SpeedInfo;
use crate::utils::format_speed;

/// Readings over windows shorter than this are reported as zero.
pub const MIN_SAMPLE_WINDOW: Duration = Duration::from_millis(100);

/// Byte and timing counters for a single transfer.
#[derive(Debug)]
pub struct TransferStats {
    started: Instant,
    total_bytes: AtomicU64,
    last_bytes: AtomicU64,
    /// Offset of the last speed sample from `started`, in nanoseconds
    last_sample_nanos: AtomicU64,
}

impl Default for TransferStats {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferStats {
    pub fn new() -> Self {
        Self {
            started: Instant::now(),
            total_bytes: AtomicU64::new(0),
            last_bytes: AtomicU64::new(0),
            last_sample_nanos: AtomicU64::new(0),
        }
    }

    /// Adds `n` successfully moved bytes to the running total
    pub fn record(&self, n: usize) {
        if n > 0 {
            self.total_bytes.fetch_add(n as u64, Ordering::Relaxed);
        }
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Speed since the previous call, in bytes per second.
    ///
    /// Every call moves the sample baseline to now, including calls that
    /// return zero because the window was shorter than [`MIN_SAMPLE_WINDOW`].
    pub fn current_speed(&self) -> f64 {
        let now = self.started.elapsed();
        let now_nanos = u64::try_from(now.as_nanos()).unwrap_or(u64::MAX);
        let last_nanos = self.last_sample_nanos.swap(now_nanos, Ordering::Relaxed);
        let total = self.total_bytes();
        let last_total = self.last_bytes.swap(total, Ordering::Relaxed);

        let window = now.saturating_sub(Duration::from_nanos(last_nanos));
        if window < MIN_SAMPLE_WINDOW {
            return 0.0;
        }
        total.saturating_sub(last_total) as f64 / window.as_secs_f64()
    }

    /// Total bytes over total elapsed time, in bytes per second
    pub fn average_speed(&self) -> f64 {
        let elapsed = self.started.elapsed();
        if elapsed < MIN_SAMPLE_WINDOW {
            return 0.0;
        }
        self.total_bytes() as f64 / elapsed.as_secs_f64()
    }

    /// Final statistics for a transfer that took `duration` end to end.
    ///
    /// Takes one more current-speed sample.
    pub fn summary(&self, duration: Duration) -> SpeedInfo {
        let average_speed = self.average_speed();
        SpeedInfo {
            average_speed,
            current_speed: self.current_speed(),
            total_bytes: self.total_bytes(),
            duration: format!("{:?}", duration),
            speed_text: format_speed(average_speed),
        }
    }
}

/// Pass-through wrapper that counts bytes moved through `inner`.
#[derive(Debug)]
pub struct TransferMeter<S> {
    inner: S,
    stats: Arc<TransferStats>,
}

impl<S> TransferMeter<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            stats: Arc::new(TransferStats::new()),
        }
    }

    /// Shared handle to the counters, for samplers and final reporting
    pub fn stats(&self) -> Arc<TransferStats> {
        Arc::clone(&self.stats)
    }

    pub fn into_inner(self) -> S {
        self.inner
    }
}

impl<W: AsyncWrite + Unpin> AsyncWrite for TransferMeter<W> {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        let this = self.get_mut();
        let poll = Pin::new(&mut this.inner).poll_write(cx, buf);
        if let Poll::Ready(Ok(n)) = &poll {
            this.stats.record(*n);
        }
        poll
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_flush(cx)
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Pin::new(&mut self.get_mut().inner).poll_shutdown(cx)
    }
}

impl<R: AsyncRead + Unpin> AsyncRead for TransferMeter<R> {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        let before = buf.filled().len();
        let poll = Pin::new(&mut this.inner).poll_read(cx, buf);
        // Count whatever landed in the buffer, even if the read then failed.
        this.stats.record(buf.filled().len() - before);
        poll
    }
}
