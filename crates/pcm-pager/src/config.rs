use std::time::Duration;

use crate::header::TrackParams;

/// Default page size in bytes.
///
/// One page must take longer to play than the slowest expected storage read of one page.
pub const BUFFER_CAPACITY: usize = 320;

/// Paging and timing parameters shared by the refill loop and the consumer.
#[derive(Clone, Debug)]
pub struct PagerConfig {
    /// Size of each of the two pages in bytes. Fixed for the lifetime of a track.
    pub page_capacity: usize,
    /// Assumed worst-case latency of one page-sized storage read.
    ///
    /// Playback is glitch-free only while one page of audio outlasts this value.
    pub max_refill_latency: Duration,
    /// How long the foreground loop sleeps between refill polls when no wake hint arrives.
    pub poll_interval: Duration,
}

impl Default for PagerConfig {
    /// Defaults match an 8-bit 32 kHz track (10 ms per page) read from slow removable storage.
    fn default() -> Self {
        Self {
            page_capacity: BUFFER_CAPACITY,
            max_refill_latency: Duration::from_millis(5),
            poll_interval: Duration::from_millis(1),
        }
    }
}

/// Playback time of one page compared to the assumed refill latency.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TimingBudget {
    /// Time the consumer needs to drain one full page.
    pub page_duration: Duration,
    /// Assumed worst-case time to refill one page.
    pub refill_latency: Duration,
}

impl TimingBudget {
    /// `true` when a full page outlasts the refill latency, i.e. refills can win the race.
    pub fn is_met(&self) -> bool {
        self.page_duration > self.refill_latency
    }

    /// Remaining slack per page (zero when the budget is not met).
    pub fn headroom(&self) -> Duration {
        self.page_duration.saturating_sub(self.refill_latency)
    }
}

impl PagerConfig {
    /// Page capacity clamped to at least one byte.
    pub fn capacity(&self) -> usize {
        self.page_capacity.max(1)
    }

    /// Compute how long one page lasts at the track's byte rate.
    ///
    /// The byte rate is derived from `sample_rate * bytes_per_sample` rather than the raw
    /// header field, which is not trusted. Returns a zero duration for a zero rate.
    pub fn timing_budget(&self, params: &TrackParams) -> TimingBudget {
        let bytes_per_sec =
            u64::from(params.sample_rate).saturating_mul(params.bytes_per_sample().max(1) as u64);
        let page_duration = if bytes_per_sec == 0 {
            Duration::ZERO
        } else {
            let micros = (self.capacity() as u64).saturating_mul(1_000_000) / bytes_per_sec;
            Duration::from_micros(micros)
        };
        TimingBudget {
            page_duration,
            refill_latency: self.max_refill_latency,
        }
    }
}
