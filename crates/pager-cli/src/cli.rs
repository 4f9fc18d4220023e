//! Command-line interface definitions.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Parser, Subcommand};
use pcm_pager::config::{BUFFER_CAPACITY, PagerConfig};

#[derive(Parser, Debug)]
#[command(name = "pager", version)]
pub struct Args {
    #[command(subcommand)]
    pub cmd: Command,

    /// Use a specific output device by substring match
    #[arg(long)]
    pub device: Option<String>,

    /// Page size in bytes (two pages are allocated per track)
    #[arg(long, default_value_t = BUFFER_CAPACITY)]
    pub page_bytes: usize,

    /// Assumed worst-case storage latency for one page read, in milliseconds
    #[arg(long, default_value_t = 5)]
    pub max_refill_latency_ms: u64,

    /// Refill loop poll interval when no wake-up arrives, in microseconds
    #[arg(long, default_value_t = 1000)]
    pub poll_interval_us: u64,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print header fields, derived parameters, and the page timing budget
    Info {
        /// Path to a mono PCM WAVE file
        path: PathBuf,
    },

    /// Play a file on an output device
    Play {
        /// Path to a mono PCM WAVE file
        path: PathBuf,
    },

    /// Drain a file through the simulated sample clock into a raw PCM file
    Render {
        /// Path to a mono PCM WAVE file
        path: PathBuf,
        /// Where to write the drained sample bytes
        out: PathBuf,
        /// Clock speed relative to the track's sample rate
        #[arg(long, default_value_t = 1.0)]
        speed: f32,
    },

    /// List output devices and exit
    Devices,
}

impl Args {
    /// Paging configuration from the command-line knobs.
    pub fn pager_config(&self) -> PagerConfig {
        PagerConfig {
            page_capacity: self.page_bytes,
            max_refill_latency: Duration::from_millis(self.max_refill_latency_ms),
            poll_interval: Duration::from_micros(self.poll_interval_us.max(1)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_library_config() {
        let args = Args::try_parse_from(["pager", "info", "a.wav"]).unwrap();
        let cfg = args.pager_config();
        let lib = PagerConfig::default();
        assert_eq!(cfg.page_capacity, lib.page_capacity);
        assert_eq!(cfg.max_refill_latency, lib.max_refill_latency);
        assert_eq!(cfg.poll_interval, lib.poll_interval);
    }

    #[test]
    fn render_takes_speed() {
        let args = Args::try_parse_from([
            "pager",
            "--page-bytes",
            "512",
            "render",
            "in.wav",
            "out.raw",
            "--speed",
            "4",
        ])
        .unwrap();
        assert_eq!(args.pager_config().page_capacity, 512);
        match args.cmd {
            Command::Render { speed, out, .. } => {
                assert_eq!(speed, 4.0);
                assert_eq!(out, PathBuf::from("out.raw"));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }
}
