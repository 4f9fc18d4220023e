//! Real-time side of the page protocol.
//!
//! The consumer drains the active page from memory only. When it reaches the end of a full
//! page it flips to the other page and asks for the drained one to be refilled; a page
//! shorter than the capacity marks the end of the stream.
//!
//! Nothing here blocks, allocates, or logs, so it is safe to call from an audio callback or a
//! fixed-rate timer thread.

use std::sync::Arc;

use crossbeam_channel::Sender;

use crate::pages::PageBuffer;
use crate::pcm::SampleFormat;
use crate::status::PlaybackCounters;

/// One step of draining.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Drain<T> {
    /// Next value from the stream.
    Ready(T),
    /// The next page is still being refilled; output silence and try again next tick.
    Underrun,
    /// The last (short) page has been drained; stop the clock.
    EndOfStream,
}

/// Sole reader of the active page.
pub struct PageConsumer {
    pages: Arc<PageBuffer>,
    counters: Arc<PlaybackCounters>,
    format: SampleFormat,
    read_index: usize,
    finished: bool,
    stalled: bool,
    partial: [u8; 4],
    partial_len: usize,
    wake: Option<Sender<()>>,
}

impl PageConsumer {
    pub(crate) fn new(
        pages: Arc<PageBuffer>,
        counters: Arc<PlaybackCounters>,
        format: SampleFormat,
    ) -> Self {
        Self {
            pages,
            counters,
            format,
            read_index: 0,
            finished: false,
            stalled: false,
            partial: [0; 4],
            partial_len: 0,
            wake: None,
        }
    }

    /// Nudge the refill loop through `wake` every time a page is handed over.
    ///
    /// Sends are non-blocking; a full channel just means a wake-up is already queued.
    pub fn with_wake(mut self, wake: Sender<()>) -> Self {
        self.wake = Some(wake);
        self
    }

    pub fn format(&self) -> SampleFormat {
        self.format
    }

    /// Offset of the next byte within the active page.
    pub fn read_index(&self) -> usize {
        self.read_index
    }

    /// Whether the end of the stream has been reached.
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// Take the next byte from the active page.
    pub fn next_byte(&mut self) -> Drain<u8> {
        loop {
            if self.finished {
                return Drain::EndOfStream;
            }
            let page = self.pages.active_page();
            let valid = self.pages.valid_len(page);
            if self.read_index < valid {
                // Safety: the refiller never writes the active page, and the active page
                // cannot change underneath us since only this consumer flips.
                let bytes = unsafe { self.pages.page_ref(page) };
                let byte = bytes[self.read_index];
                self.read_index += 1;
                if self.read_index == valid {
                    self.hand_off(valid);
                }
                return Drain::Ready(byte);
            }
            if !self.hand_off(valid) {
                if self.finished {
                    continue;
                }
                PlaybackCounters::add(&self.counters.underrun_ticks, 1);
                return Drain::Underrun;
            }
        }
    }

    /// Assemble the next whole sample into `out`, returning its width in bytes.
    ///
    /// A sample split across an underrun is kept and completed on a later call. A trailing
    /// partial sample at the end of the stream is dropped.
    pub fn next_sample_bytes(&mut self, out: &mut [u8; 4]) -> Drain<usize> {
        let width = self.format.width();
        while self.partial_len < width {
            match self.next_byte() {
                Drain::Ready(b) => {
                    self.partial[self.partial_len] = b;
                    self.partial_len += 1;
                }
                Drain::Underrun => return Drain::Underrun,
                Drain::EndOfStream => {
                    self.partial_len = 0;
                    return Drain::EndOfStream;
                }
            }
        }
        out[..width].copy_from_slice(&self.partial[..width]);
        self.partial_len = 0;
        PlaybackCounters::add(&self.counters.played_samples, 1);
        Drain::Ready(width)
    }

    /// Next sample converted to `f32`.
    pub fn next_sample(&mut self) -> Drain<f32> {
        let mut buf = [0u8; 4];
        match self.next_sample_bytes(&mut buf) {
            Drain::Ready(_) => Drain::Ready(self.format.to_f32(&buf)),
            Drain::Underrun => Drain::Underrun,
            Drain::EndOfStream => Drain::EndOfStream,
        }
    }

    /// Called once the active page holding `valid` bytes is fully drained.
    ///
    /// Returns `true` when a new page is now active.
    fn hand_off(&mut self, valid: usize) -> bool {
        if valid < self.pages.capacity() {
            self.finished = true;
            return false;
        }
        if !self.pages.try_flip() {
            if !self.stalled {
                self.stalled = true;
                PlaybackCounters::add(&self.counters.underrun_events, 1);
            }
            return false;
        }
        self.read_index = 0;
        self.stalled = false;
        if let Some(wake) = &self.wake {
            let _ = wake.try_send(());
        }
        true
    }
}
