//! Foreground refill loop.
//!
//! Polls the refiller until playback stops. Between polls it waits on the consumer's wake
//! hint, falling back to a fixed poll interval so a missed hint only costs latency.

use std::io::Read;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossbeam_channel::{Receiver, RecvTimeoutError};

use crate::refill::{RefillOutcome, Refiller};

/// Run/stop switch shared by the playback clock, the refill loop, and signal handlers.
///
/// Stopping is the only cancellation: the clock stops draining and the loop stops polling.
/// A refill in progress is a single bounded read and simply completes.
#[derive(Clone, Debug)]
pub struct PlaybackControl {
    running: Arc<AtomicBool>,
}

impl Default for PlaybackControl {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackControl {
    /// New control in the running state.
    pub fn new() -> Self {
        Self {
            running: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// Stop playback. Idempotent.
    pub fn stop(&self) {
        self.running.store(false, Ordering::Release);
    }
}

/// Keep the inactive page filled until `control` is stopped or the consumer goes away.
///
/// Returns the number of pages refilled.
pub fn run_refill_loop<R: Read>(
    refiller: &mut Refiller<R>,
    control: &PlaybackControl,
    wake: &Receiver<()>,
    poll_interval: Duration,
) -> u64 {
    let capacity = refiller.pages().capacity();
    let mut filled = 0u64;
    while control.is_running() {
        if let RefillOutcome::Filled { page, len } = refiller.poll() {
            filled += 1;
            if len < capacity {
                tracing::debug!(page = page, len = len, "short page loaded; end of data");
            }
            continue;
        }
        match wake.recv_timeout(poll_interval) {
            Ok(()) | Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => {
                tracing::debug!("consumer gone; refill loop exiting");
                break;
            }
        }
    }
    filled
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SampleClock;
    use crate::config::PagerConfig;
    use crate::header::WaveHeader;
    use crate::track::Track;
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::thread;

    fn wave(data: &[u8]) -> Cursor<Vec<u8>> {
        let mut bytes = WaveHeader::mono_pcm(32_000, 8, data.len() as u32)
            .to_bytes()
            .to_vec();
        bytes.extend_from_slice(data);
        Cursor::new(bytes)
    }

    #[test]
    fn stopped_control_returns_immediately() {
        let track = Track::from_reader(wave(&[0; 1000]), &PagerConfig::default());
        let (_, mut refiller, _consumer) = track.split();
        let control = PlaybackControl::new();
        control.stop();
        let (_tx, rx) = crossbeam_channel::bounded(1);
        assert_eq!(
            run_refill_loop(&mut refiller, &control, &rx, Duration::from_millis(1)),
            0
        );
    }

    #[test]
    fn exits_when_consumer_is_dropped() {
        let track = Track::from_reader(wave(&[0; 1000]), &PagerConfig::default());
        let (_, mut refiller, consumer) = track.split();
        let (tx, rx) = crossbeam_channel::bounded(1);
        drop(consumer.with_wake(tx));
        let control = PlaybackControl::new();
        assert_eq!(
            run_refill_loop(&mut refiller, &control, &rx, Duration::from_millis(1)),
            0
        );
        assert!(control.is_running());
    }

    #[test]
    fn clock_and_refill_threads_deliver_every_byte_in_order() {
        let data: Vec<u8> = (0..16_000).map(|i| (i * 7 % 256) as u8).collect();
        let config = PagerConfig {
            page_capacity: 320,
            ..PagerConfig::default()
        };
        let track = Track::from_reader(wave(&data), &config);
        let (_, mut refiller, consumer) = track.split();

        let (tx, rx) = crossbeam_channel::bounded(1);
        let mut consumer = consumer.with_wake(tx);
        let control = PlaybackControl::new();

        let out = Arc::new(Mutex::new(Vec::new()));
        let out_clock = out.clone();
        let control_clock = control.clone();
        let clock = thread::spawn(move || {
            let mut sink = |tick: Option<&[u8]>| {
                if let Some(bytes) = tick {
                    out_clock.lock().unwrap().extend_from_slice(bytes);
                }
            };
            SampleClock::new(400_000).run(&mut consumer, &control_clock, &mut sink);
        });

        let filled = run_refill_loop(&mut refiller, &control, &rx, Duration::from_millis(1));
        clock.join().unwrap();

        assert!(!control.is_running());
        assert!(filled >= 48, "filled={filled}");
        assert_eq!(refiller.bytes_read(), 16_000);
        assert_eq!(*out.lock().unwrap(), data);
    }
}
