//! Foreground refill engine.
//!
//! [`Refiller::poll`] is cheap when nothing is pending, so the foreground loop can call it as
//! often as it likes. When the consumer has flipped pages, one poll loads the next chunk of
//! the data stream into the page just drained.

use std::io::Read;
use std::sync::Arc;

use crate::header::read_up_to;
use crate::pages::PageBuffer;
use crate::status::PlaybackCounters;

/// Result of one refill poll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefillOutcome {
    /// No refill was requested; nothing changed.
    Idle,
    /// `page` now holds `len` fresh bytes (`len < capacity` near end of data).
    Filled { page: usize, len: usize },
}

/// Single writer of page memory. Owns the track's reader.
pub struct Refiller<R> {
    reader: R,
    pages: Arc<PageBuffer>,
    counters: Arc<PlaybackCounters>,
    bytes_read: u64,
}

impl<R: Read> Refiller<R> {
    pub(crate) fn new(reader: R, pages: Arc<PageBuffer>, counters: Arc<PlaybackCounters>) -> Self {
        Self {
            reader,
            pages,
            counters,
            bytes_read: 0,
        }
    }

    /// Refill the inactive page if the consumer asked for it.
    ///
    /// Reads continue from the reader's current position. A short, empty, or failed read is
    /// recorded as a short page; deciding that the stream has ended is the consumer's job.
    pub fn poll(&mut self) -> RefillOutcome {
        if !self.pages.is_refill_pending() {
            return RefillOutcome::Idle;
        }
        let page = self.pages.inactive_page();
        // Safety: we are the only writer, `page` is inactive, and the consumer cannot flip
        // onto it until `publish_fill` clears the pending flag.
        let dst = unsafe { self.pages.page_mut(page) };
        let len = read_up_to(&mut self.reader, dst);
        self.record_read(len);
        self.pages.publish_fill(page, len);
        tracing::trace!(page = page, len = len, "page refilled");
        RefillOutcome::Filled { page, len }
    }

    /// Load the active page before playback starts. Returns the bytes loaded.
    ///
    /// Only valid while no consumer is draining, i.e. during track setup.
    pub(crate) fn load_active(&mut self) -> usize {
        let page = self.pages.active_page();
        // Safety: called from `Track` construction before the consumer is handed out, so
        // nothing reads the active page yet.
        let dst = unsafe { self.pages.page_mut(page) };
        let len = read_up_to(&mut self.reader, dst);
        self.record_read(len);
        self.pages.publish_active_len(len);
        len
    }

    fn record_read(&mut self, len: usize) {
        self.bytes_read += len as u64;
        PlaybackCounters::add(&self.counters.bytes_read, len as u64);
        PlaybackCounters::add(&self.counters.pages_filled, 1);
    }

    /// Total data bytes read so far, i.e. how far the read cursor has moved past the header.
    pub fn bytes_read(&self) -> u64 {
        self.bytes_read
    }

    /// Valid bytes currently held in `page`.
    pub fn page(&self, page: usize) -> &[u8] {
        let len = self.pages.valid_len(page);
        // Safety: writes need `&mut self`, so none can happen while this borrow lives.
        let all = unsafe { self.pages.page_ref(page) };
        &all[..len]
    }

    /// Shared page state, for inspection.
    pub fn pages(&self) -> &Arc<PageBuffer> {
        &self.pages
    }

    pub fn get_ref(&self) -> &R {
        &self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn refiller(data: Vec<u8>, capacity: usize) -> Refiller<Cursor<Vec<u8>>> {
        Refiller::new(
            Cursor::new(data),
            Arc::new(PageBuffer::new(capacity)),
            PlaybackCounters::shared(),
        )
    }

    #[test]
    fn poll_without_request_changes_nothing() {
        let mut r = refiller((0..32u8).collect(), 8);
        r.load_active();
        assert!(matches!(r.poll(), RefillOutcome::Filled { page: 1, len: 8 }));

        let page0 = r.page(0).to_vec();
        let page1 = r.page(1).to_vec();
        let cursor = r.get_ref().position();

        assert_eq!(r.poll(), RefillOutcome::Idle);
        assert_eq!(r.poll(), RefillOutcome::Idle);
        assert_eq!(r.page(0), page0.as_slice());
        assert_eq!(r.page(1), page1.as_slice());
        assert_eq!(r.pages().valid_len(0), 8);
        assert_eq!(r.pages().valid_len(1), 8);
        assert_eq!(r.get_ref().position(), cursor);
    }

    #[test]
    fn pending_poll_clears_flag_and_advances_cursor_by_bytes_read() {
        let mut r = refiller((0..12u8).collect(), 8);
        assert_eq!(r.load_active(), 8);
        assert_eq!(r.get_ref().position(), 8);

        assert!(r.pages().is_refill_pending());
        assert_eq!(r.poll(), RefillOutcome::Filled { page: 1, len: 4 });
        assert!(!r.pages().is_refill_pending());
        assert_eq!(r.get_ref().position(), 12);
        assert_eq!(r.bytes_read(), 12);
        assert_eq!(r.page(1), &[8, 9, 10, 11]);
    }

    #[test]
    fn refill_targets_page_opposite_active() {
        let mut r = refiller((0..40u8).collect(), 8);
        r.load_active();
        r.poll();
        assert!(r.pages().try_flip());
        assert_eq!(r.pages().active_page(), 1);

        assert_eq!(r.poll(), RefillOutcome::Filled { page: 0, len: 8 });
        assert_eq!(r.page(0), &[16, 17, 18, 19, 20, 21, 22, 23]);
        assert_eq!(r.page(1), &[8, 9, 10, 11, 12, 13, 14, 15]);
    }

    #[test]
    fn exhausted_reader_records_empty_page() {
        let mut r = refiller(vec![1, 2, 3], 8);
        assert_eq!(r.load_active(), 3);
        assert_eq!(r.poll(), RefillOutcome::Filled { page: 1, len: 0 });
        assert!(!r.pages().is_refill_pending());
        assert!(r.page(1).is_empty());
    }

    #[test]
    fn read_error_is_treated_as_short_read() {
        struct Failing {
            left: usize,
        }
        impl Read for Failing {
            fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
                if self.left == 0 {
                    return Err(std::io::Error::other("card removed"));
                }
                let n = buf.len().min(self.left).min(3);
                buf[..n].fill(0xAB);
                self.left -= n;
                Ok(n)
            }
        }
        let mut r = Refiller::new(
            Failing { left: 5 },
            Arc::new(PageBuffer::new(8)),
            PlaybackCounters::shared(),
        );
        assert_eq!(r.load_active(), 5);
        assert_eq!(r.poll(), RefillOutcome::Filled { page: 1, len: 0 });
        assert!(!r.pages().is_refill_pending());
    }
}
