//! Double-buffered streaming of mono PCM WAVE data to a fixed-rate consumer.
//!
//! A track is opened with [`track::open_track`], which reads the header and preloads both
//! pages. The [`consumer::PageConsumer`] then drains pages from a real-time context while the
//! [`refill::Refiller`] loads the page just drained from a foreground loop
//! ([`pump::run_refill_loop`]).

pub mod clock;
pub mod config;
pub mod consumer;
pub mod header;
pub mod pages;
pub mod pcm;
pub mod pump;
pub mod refill;
pub mod status;
pub mod track;
