use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Counters shared between the consumer, the refill loop and whoever reports progress.
///
/// Every field is a relaxed atomic so the real-time side can update it without locking.
#[derive(Debug, Default)]
pub struct PlaybackCounters {
    /// Samples handed to the output by the consumer.
    pub played_samples: AtomicU64,
    /// Completed refills (including the initial preload).
    pub pages_filled: AtomicU64,
    /// Bytes pulled from storage into pages, header excluded.
    pub bytes_read: AtomicU64,
    /// Hand-offs that found the next page still being refilled.
    pub underrun_events: AtomicU64,
    /// Consumer ticks spent waiting on a late refill.
    pub underrun_ticks: AtomicU64,
}

/// Plain-value copy of [`PlaybackCounters`] for logs and CLI output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PlaybackStatus {
    pub played_samples: u64,
    pub pages_filled: u64,
    pub bytes_read: u64,
    pub underrun_events: u64,
    pub underrun_ticks: u64,
    /// Elapsed playback time, when the sample rate is known.
    pub elapsed_ms: Option<u64>,
}

impl PlaybackCounters {
    /// Create a shared counter set.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn add(counter: &AtomicU64, n: u64) {
        counter.fetch_add(n, Ordering::Relaxed);
    }

    /// Snapshot the counters; `sample_rate` converts played samples into elapsed time.
    pub fn snapshot(&self, sample_rate: u32) -> PlaybackStatus {
        let played_samples = self.played_samples.load(Ordering::Relaxed);
        let elapsed_ms = if sample_rate > 0 {
            Some(played_samples.saturating_mul(1000) / u64::from(sample_rate))
        } else {
            None
        };
        PlaybackStatus {
            played_samples,
            pages_filled: self.pages_filled.load(Ordering::Relaxed),
            bytes_read: self.bytes_read.load(Ordering::Relaxed),
            underrun_events: self.underrun_events.load(Ordering::Relaxed),
            underrun_ticks: self.underrun_ticks.load(Ordering::Relaxed),
            elapsed_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_reports_elapsed() {
        let counters = PlaybackCounters::default();
        PlaybackCounters::add(&counters.played_samples, 16_000);
        let snap = counters.snapshot(32_000);
        assert_eq!(snap.played_samples, 16_000);
        assert_eq!(snap.elapsed_ms, Some(500));
    }

    #[test]
    fn snapshot_without_rate_has_no_elapsed() {
        let counters = PlaybackCounters::default();
        PlaybackCounters::add(&counters.underrun_events, 2);
        PlaybackCounters::add(&counters.underrun_ticks, 40);
        let snap = counters.snapshot(0);
        assert!(snap.elapsed_ms.is_none());
        assert_eq!(snap.underrun_events, 2);
        assert_eq!(snap.underrun_ticks, 40);
    }
}
