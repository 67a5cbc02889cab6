//! Background speed sampling
//!
//! While a transfer runs, a [`SpeedSampler`] task wakes on a fixed cadence,
//! reads the shared counters and logs progress. It never touches the
//! transfer's source or sink.
//!
//! The task ends when [`SpeedSampler::stop`] is awaited, or when the sampler
//! is dropped: dropping the handle drops the stop sender, which resolves the
//! task's receiver just like an explicit stop.

use log::{info, warn};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::transfer::meter::TransferStats;
use crate::utils::{format_size, format_speed};

/// Handle to a running sampler task.
pub struct SpeedSampler {
    stop: Option<oneshot::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl SpeedSampler {
    /// Starts sampling `stats` every `interval`, logging under `tag`.
    ///
    /// `expected_total` is included in progress lines when the final size is
    /// known up front, as it is for downloads.
    pub fn spawn(
        tag: &'static str,
        stats: Arc<TransferStats>,
        interval: Duration,
        expected_total: Option<u64>,
    ) -> Self {
        let (stop_tx, mut stop_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval_at(Instant::now() + interval, interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => log_progress(tag, &stats, expected_total),
                    _ = &mut stop_rx => break,
                }
            }
        });

        Self {
            stop: Some(stop_tx),
            handle: Some(handle),
        }
    }

    /// Signals the task to stop and waits for it to finish.
    pub async fn stop(mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.await {
                warn!("Speed sampler task ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for SpeedSampler {
    fn drop(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
    }
}

fn log_progress(tag: &str, stats: &TransferStats, expected_total: Option<u64>) {
    let current = stats.current_speed();
    if current <= 0.0 {
        return;
    }

    let transferred = match expected_total {
        Some(total) => format!(
            "{}/{}",
            format_size(stats.total_bytes()),
            format_size(total)
        ),
        None => format_size(stats.total_bytes()),
    };
    info!(
        "[{}] In progress - transferred: {}, current speed: {}, average speed: {}",
        tag,
        transferred,
        format_speed(current),
        format_speed(stats.average_speed())
    );
}
