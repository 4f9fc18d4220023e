//! Fixed-rate drain loop standing in for a hardware timer interrupt.
//!
//! Each tick takes one sample from the consumer and hands it to a sink. The loop touches
//! memory only; all storage I/O stays with the refill loop.

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::consumer::{Drain, PageConsumer};
use crate::pump::PlaybackControl;

/// Sleep only when at least this far ahead of schedule; shorter waits are batched.
const MIN_SLEEP: Duration = Duration::from_millis(1);

/// Paces sample consumption at a fixed rate.
#[derive(Clone, Copy, Debug)]
pub struct SampleClock {
    rate_hz: u32,
}

impl SampleClock {
    /// Tick `rate_hz` times per second. A rate of zero runs unpaced.
    pub fn new(rate_hz: u32) -> Self {
        Self { rate_hz }
    }

    /// Drain `consumer` until the stream ends or `control` is stopped.
    ///
    /// `sink` gets `Some(sample_bytes)` per sample and `None` for each tick lost to an
    /// underrun. Reaching the end of the stream stops `control`. Returns the tick count.
    pub fn run<F>(
        &self,
        consumer: &mut PageConsumer,
        control: &PlaybackControl,
        sink: &mut F,
    ) -> u64
    where
        F: FnMut(Option<&[u8]>),
    {
        let start = Instant::now();
        let mut ticks = 0u64;
        let mut buf = [0u8; 4];
        while control.is_running() {
            match consumer.next_sample_bytes(&mut buf) {
                Drain::Ready(width) => sink(Some(&buf[..width])),
                Drain::Underrun => sink(None),
                Drain::EndOfStream => {
                    control.stop();
                    break;
                }
            }
            ticks += 1;
            if self.rate_hz > 0 {
                let elapsed_ns = ticks.saturating_mul(1_000_000_000) / u64::from(self.rate_hz);
                let due = start + Duration::from_nanos(elapsed_ns);
                let now = Instant::now();
                if due > now + MIN_SLEEP {
                    thread::sleep(due - now);
                }
            }
        }
        ticks
    }

    /// Run on a dedicated thread, returning the consumer when done.
    pub fn spawn<F>(
        self,
        mut consumer: PageConsumer,
        control: PlaybackControl,
        mut sink: F,
    ) -> JoinHandle<PageConsumer>
    where
        F: FnMut(Option<&[u8]>) + Send + 'static,
    {
        thread::spawn(move || {
            let ticks = self.run(&mut consumer, &control, &mut sink);
            tracing::debug!(ticks = ticks, "sample clock stopped");
            consumer
        })
    }
}
