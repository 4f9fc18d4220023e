//! Two-page sample cache shared by the refill loop and the real-time consumer.
//!
//! No mutex guards the page memory. Access is split by role instead:
//! - the [`Refiller`](crate::refill::Refiller) is the only writer and only touches the
//!   inactive page, and only while `refill_pending` is set
//! - the [`PageConsumer`](crate::consumer::PageConsumer) is the only reader of the active
//!   page and only flips pages while `refill_pending` is clear
//!
//! `active` and `refill_pending` are the whole coordination protocol. Release stores publish
//! page contents and lengths; the other side observes them with acquire loads.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

pub struct PageBuffer {
    pages: [UnsafeCell<Box<[u8]>>; 2],
    capacity: usize,
    active: AtomicU8,
    refill_pending: AtomicBool,
    valid_len: [AtomicUsize; 2],
}

// Safety: page memory is only reached through `page_mut`/`page_ref`, whose callers uphold the
// single-writer (inactive page) / single-reader (active page) split described above.
unsafe impl Sync for PageBuffer {}

impl PageBuffer {
    /// Allocate both pages for a fresh track.
    ///
    /// Page 0 starts active, both pages empty, and a refill of page 1 already requested so
    /// the first refill poll preloads it.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            pages: [
                UnsafeCell::new(vec![0u8; capacity].into_boxed_slice()),
                UnsafeCell::new(vec![0u8; capacity].into_boxed_slice()),
            ],
            capacity,
            active: AtomicU8::new(0),
            refill_pending: AtomicBool::new(true),
            valid_len: [AtomicUsize::new(0), AtomicUsize::new(0)],
        }
    }

    /// Page size in bytes.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Index (0 or 1) of the page the consumer is draining.
    pub fn active_page(&self) -> usize {
        usize::from(self.active.load(Ordering::Acquire))
    }

    /// Index of the page the refill loop may write.
    pub fn inactive_page(&self) -> usize {
        self.active_page() ^ 1
    }

    /// Whether the inactive page is waiting for fresh data.
    pub fn is_refill_pending(&self) -> bool {
        self.refill_pending.load(Ordering::Acquire)
    }

    /// Number of valid bytes loaded into `page`.
    pub fn valid_len(&self, page: usize) -> usize {
        self.valid_len[page & 1].load(Ordering::Acquire)
    }

    /// Mutable view of a whole page.
    ///
    /// # Safety
    /// The caller must be the single writer, `page` must not be the active page, and no
    /// other reference to `page` may be alive. Writing while `refill_pending` is set keeps
    /// the consumer from flipping onto `page`.
    #[allow(clippy::mut_from_ref)]
    pub(crate) unsafe fn page_mut(&self, page: usize) -> &mut [u8] {
        unsafe { &mut **self.pages[page & 1].get() }
    }

    /// Shared view of a whole page.
    ///
    /// # Safety
    /// No writer may be mutating `page` for the lifetime of the returned slice.
    pub(crate) unsafe fn page_ref(&self, page: usize) -> &[u8] {
        unsafe { &**self.pages[page & 1].get() }
    }

    /// Record the length of a finished fill and clear the pending flag.
    pub(crate) fn publish_fill(&self, page: usize, len: usize) {
        self.valid_len[page & 1].store(len.min(self.capacity), Ordering::Release);
        self.refill_pending.store(false, Ordering::Release);
    }

    /// Record the length of the initial active-page load without touching the flag.
    pub(crate) fn publish_active_len(&self, len: usize) {
        let page = self.active_page();
        self.valid_len[page].store(len.min(self.capacity), Ordering::Release);
    }

    /// Swap pages and request a refill of the page just drained.
    ///
    /// Refuses (returns `false`) while the previous refill is still pending, since the
    /// inactive page may be mid-write.
    pub(crate) fn try_flip(&self) -> bool {
        if self.refill_pending.load(Ordering::Acquire) {
            return false;
        }
        let next = self.active.load(Ordering::Relaxed) ^ 1;
        self.active.store(next, Ordering::Release);
        self.refill_pending.store(true, Ordering::Release);
        true
    }
}
