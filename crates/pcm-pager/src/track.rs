//! Per-track setup: open, parse the header, preload both pages.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::config::PagerConfig;
use crate::consumer::PageConsumer;
use crate::header::{TrackParams, WaveHeader, read_header};
use crate::pages::PageBuffer;
use crate::pcm::SampleFormat;
use crate::refill::Refiller;
use crate::status::PlaybackCounters;

/// A track ready to play: parameters known, page 0 loaded, page 1 preloaded.
///
/// Use [`Track::split`] to hand the consumer to the real-time context and keep the refiller
/// on the foreground loop. Dropping the refiller closes the file.
pub struct Track<R> {
    header: WaveHeader,
    params: TrackParams,
    refiller: Refiller<R>,
    consumer: PageConsumer,
    counters: Arc<PlaybackCounters>,
}

/// Open `path` and prepare it for playback.
///
/// Fails only when the file cannot be opened; header content is never validated.
pub fn open_track(path: &Path, config: &PagerConfig) -> Result<Track<File>> {
    let file = File::open(path).with_context(|| format!("open {:?}", path))?;
    let track = Track::from_reader(file, config);
    tracing::info!(
        path = ?path,
        sample_rate = track.params.sample_rate,
        bit_depth = track.params.bit_depth,
        total_samples = track.params.total_samples,
        "track opened"
    );
    Ok(track)
}

impl<R: Read> Track<R> {
    /// Parse the header from `reader` and preload both pages from the data that follows.
    ///
    /// Page 0 is loaded directly; a fresh page buffer starts with a refill of page 1 already
    /// requested, so the single refill poll that follows fills page 1 as well.
    pub fn from_reader(mut reader: R, config: &PagerConfig) -> Self {
        let header = read_header(&mut reader);
        let params = header.params();
        if !header.ids_look_valid() {
            tracing::debug!("unexpected chunk ids in header, reading it anyway");
        }

        let format = SampleFormat::from_bit_depth(params.bit_depth).unwrap_or_else(|| {
            tracing::warn!(
                bit_depth = params.bit_depth,
                "unsupported bit depth, treating samples as 8-bit"
            );
            SampleFormat::U8
        });

        let pages = Arc::new(PageBuffer::new(config.capacity()));
        let counters = PlaybackCounters::shared();
        let mut refiller = Refiller::new(reader, pages.clone(), counters.clone());

        let first = refiller.load_active();
        let second = refiller.poll();
        tracing::debug!(
            page0 = first,
            page1 = ?second,
            capacity = pages.capacity(),
            "pages preloaded"
        );

        let consumer = PageConsumer::new(pages, counters.clone(), format);
        Self {
            header,
            params,
            refiller,
            consumer,
            counters,
        }
    }

    pub fn header(&self) -> &WaveHeader {
        &self.header
    }

    pub fn params(&self) -> &TrackParams {
        &self.params
    }

    pub fn counters(&self) -> &Arc<PlaybackCounters> {
        &self.counters
    }

    /// Separate the track into its parameters, foreground refiller, and real-time consumer.
    pub fn split(self) -> (TrackParams, Refiller<R>, PageConsumer) {
        (self.params, self.refiller, self.consumer)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consumer::Drain;
    use crate::refill::RefillOutcome;
    use std::io::Cursor;

    fn wave_bytes(bits: u16, data: &[u8]) -> Vec<u8> {
        let header = WaveHeader::mono_pcm(32_000, bits, data.len() as u32);
        let mut out = header.to_bytes().to_vec();
        out.extend_from_slice(data);
        out
    }

    fn config(capacity: usize) -> PagerConfig {
        PagerConfig {
            page_capacity: capacity,
            ..PagerConfig::default()
        }
    }

    fn pattern(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i % 251) as u8).collect()
    }

    /// Drain up to one page's worth through the consumer, stopping early on a stall or end.
    fn drain_page(
        refiller: &mut Refiller<Cursor<Vec<u8>>>,
        consumer: &mut PageConsumer,
        out: &mut Vec<u8>,
    ) {
        let capacity = refiller.pages().capacity();
        for _ in 0..capacity {
            match consumer.next_byte() {
                Drain::Ready(b) => out.push(b),
                _ => return,
            }
        }
    }

    #[test]
    fn exact_one_page_preloads_page0_and_leaves_page1_empty() {
        let data = pattern(320);
        let track = Track::from_reader(Cursor::new(wave_bytes(8, &data)), &config(320));
        let (_, refiller, _) = track.split();
        assert_eq!(refiller.pages().valid_len(0), 320);
        assert_eq!(refiller.pages().valid_len(1), 0);
        assert!(!refiller.pages().is_refill_pending());
        assert_eq!(refiller.page(0), data.as_slice());
    }

    #[test]
    fn two_pages_worth_preloads_both() {
        let data = pattern(700);
        let track = Track::from_reader(Cursor::new(wave_bytes(8, &data)), &config(320));
        let (_, refiller, _) = track.split();
        assert_eq!(refiller.pages().valid_len(0), 320);
        assert_eq!(refiller.pages().valid_len(1), 320);
        assert_eq!(refiller.page(1), &data[320..640]);
        assert_eq!(refiller.get_ref().position(), 44 + 640);
    }

    #[test]
    fn five_hundred_bytes_end_after_short_second_page() {
        let data = pattern(500);
        let track = Track::from_reader(Cursor::new(wave_bytes(8, &data)), &config(320));
        assert_eq!(track.params().total_samples, 500);
        let (_, refiller, mut consumer) = track.split();
        assert_eq!(refiller.pages().valid_len(0), 320);
        assert_eq!(refiller.pages().valid_len(1), 180);

        let mut out = Vec::new();
        loop {
            match consumer.next_byte() {
                Drain::Ready(b) => out.push(b),
                Drain::Underrun => panic!("both pages were preloaded"),
                Drain::EndOfStream => break,
            }
        }
        assert_eq!(out, data);
    }

    #[test]
    fn sixteen_thousand_bytes_take_fifty_pages_then_an_empty_refill() {
        let data = pattern(16_000);
        let track = Track::from_reader(Cursor::new(wave_bytes(8, &data)), &config(320));
        let (params, mut refiller, mut consumer) = track.split();
        assert_eq!(params.total_samples, 16_000);
        assert_eq!(refiller.pages().valid_len(0), 320);
        assert_eq!(refiller.pages().valid_len(1), 320);

        let mut out = Vec::new();
        let mut last = RefillOutcome::Idle;
        for _ in 0..50 {
            drain_page(&mut refiller, &mut consumer, &mut out);
            last = refiller.poll();
        }
        assert_eq!(out.len(), 16_000);
        assert_eq!(out, data);
        // Every refill past the 50th page comes up empty.
        assert!(matches!(last, RefillOutcome::Filled { len: 0, .. }));
        assert_eq!(consumer.next_byte(), Drain::EndOfStream);
        assert_eq!(refiller.bytes_read(), 16_000);
    }

    #[test]
    fn consecutive_cycles_deliver_data_in_order() {
        let data = pattern(2_000);
        for cycles in [1usize, 3, 6, 7, 20] {
            let track = Track::from_reader(Cursor::new(wave_bytes(8, &data)), &config(320));
            let (_, mut refiller, mut consumer) = track.split();
            let mut out = Vec::new();
            for _ in 0..cycles {
                drain_page(&mut refiller, &mut consumer, &mut out);
                refiller.poll();
            }
            let expected = data.len().min(cycles * 320);
            assert_eq!(out, &data[..expected], "cycles={cycles}");
        }
    }

    #[test]
    fn header_params_pass_through() {
        let data = pattern(1_000);
        let track = Track::from_reader(Cursor::new(wave_bytes(16, &data)), &config(320));
        assert_eq!(track.params().sample_rate, 32_000);
        assert_eq!(track.params().bit_depth, 16);
        assert_eq!(track.params().total_samples, 500);
        assert!(track.header().ids_look_valid());
        let (_, _, consumer) = track.split();
        assert_eq!(consumer.format(), SampleFormat::S16);
    }

    #[test]
    fn header_only_file_plays_nothing() {
        let track = Track::from_reader(Cursor::new(wave_bytes(8, &[])), &config(320));
        let (_, refiller, mut consumer) = track.split();
        assert_eq!(refiller.pages().valid_len(0), 0);
        assert_eq!(consumer.next_byte(), Drain::EndOfStream);
    }

    #[test]
    fn missing_file_is_an_error() {
        let path = std::env::temp_dir().join("pcm-pager-does-not-exist.wav");
        let err = open_track(&path, &PagerConfig::default()).err().unwrap();
        assert!(format!("{err:#}").contains("pcm-pager-does-not-exist.wav"));
    }

    #[test]
    fn open_track_reads_from_disk() {
        let data = pattern(400);
        let path = std::env::temp_dir().join(format!("pcm-pager-open-{}.wav", std::process::id()));
        std::fs::write(&path, wave_bytes(8, &data)).unwrap();
        let track = open_track(&path, &config(320)).unwrap();
        let (_, refiller, _) = track.split();
        assert_eq!(refiller.pages().valid_len(0), 320);
        assert_eq!(refiller.pages().valid_len(1), 80);
        drop(refiller);
        let _ = std::fs::remove_file(&path);
    }
}
