//! pager: plays mono PCM WAVE files through a two-page streaming buffer.
//!
//! ## Contexts
//! 1. **Real-time**: the CPAL callback (or the simulated sample clock for `render`) drains
//!    the active page from memory and flips pages when one runs out.
//! 2. **Foreground**: the main thread polls the refiller, loading the drained page from disk
//!    before the consumer needs it again.
//!
//! Playback is glitch-free while one page lasts longer than a page read; `info` shows the
//! budget for a file and the page size can be tuned with `--page-bytes`.

mod cli;
mod device;
mod output;

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use cpal::traits::{DeviceTrait, StreamTrait};
use pcm_pager::clock::SampleClock;
use pcm_pager::config::PagerConfig;
use pcm_pager::header::TrackParams;
use pcm_pager::pump::{PlaybackControl, run_refill_loop};
use pcm_pager::status::PlaybackCounters;
use pcm_pager::track::open_track;
use tracing_subscriber::EnvFilter;

fn main() -> Result<()> {
    let args = cli::Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,pager=info,pcm_pager=info")),
        )
        .init();
    let config = args.pager_config();

    match &args.cmd {
        cli::Command::Info { path } => print_info(path, &config),
        cli::Command::Play { path } => {
            let host = cpal::default_host();
            play_file(&host, args.device.as_deref(), path, &config)
        }
        cli::Command::Render { path, out, speed } => render_file(path, out, *speed, &config),
        cli::Command::Devices => device::list_devices(&cpal::default_host()),
    }
}

fn print_info(path: &Path, config: &PagerConfig) -> Result<()> {
    let track = open_track(path, config)?;
    let header = track.header();
    let params = track.params();
    let budget = config.timing_budget(params);

    println!("file:            {}", path.display());
    println!(
        "chunk ids:       {:?} {:?} {:?} {:?}{}",
        String::from_utf8_lossy(&header.riff_id),
        String::from_utf8_lossy(&header.form_type),
        String::from_utf8_lossy(&header.fmt_id),
        String::from_utf8_lossy(&header.data_id),
        if header.ids_look_valid() { "" } else { " (unexpected)" }
    );
    println!("format tag:      {}", params.format_tag);
    println!("channels:        {}", params.channels);
    println!("sample rate:     {} Hz", params.sample_rate);
    println!("bit depth:       {}", params.bit_depth);
    println!("block align:     {}", params.block_align);
    println!("byte rate:       {}", params.byte_rate);
    println!("data size:       {} bytes", params.data_size);
    println!("total samples:   {}", params.total_samples);
    if let Some(ms) = params.duration_ms() {
        println!("duration:        {ms} ms");
    }
    println!("page size:       {} bytes", config.capacity());
    println!("page duration:   {:?}", budget.page_duration);
    println!(
        "refill budget:   {:?} assumed, {}",
        budget.refill_latency,
        if budget.is_met() { "ok" } else { "underruns likely" }
    );
    Ok(())
}

fn play_file(
    host: &cpal::Host,
    device_needle: Option<&str>,
    path: &Path,
    config: &PagerConfig,
) -> Result<()> {
    let track = open_track(path, config)?;
    report_timing(track.params(), config);
    let counters = track.counters().clone();
    let (params, mut refiller, consumer) = track.split();

    let device = device::pick_device(host, device_needle)?;
    let supported = device::pick_output_config(&device, params.sample_rate)?;
    let stream_config: cpal::StreamConfig = supported.clone().into();
    tracing::info!(
        device = %device.description()?,
        source_rate_hz = params.sample_rate,
        output_rate_hz = stream_config.sample_rate,
        channels = stream_config.channels,
        "output device"
    );

    let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
    let control = PlaybackControl::new();
    install_stop_handler(&control);

    let stream = output::build_output_stream(
        &device,
        &stream_config,
        supported.sample_format(),
        consumer.with_wake(wake_tx),
        params.sample_rate,
        control.clone(),
    )?;
    stream.play()?;

    let filled = run_refill_loop(&mut refiller, &control, &wake_rx, config.poll_interval);

    // Give the device a moment to flush the last callback(s).
    thread::sleep(Duration::from_millis(100));
    drop(stream);

    report_summary(&counters, &params, filled);
    Ok(())
}

fn render_file(path: &Path, out: &Path, speed: f32, config: &PagerConfig) -> Result<()> {
    let track = open_track(path, config)?;
    report_timing(track.params(), config);
    let counters = track.counters().clone();
    let (params, mut refiller, consumer) = track.split();

    let rate = clock_rate(params.sample_rate, speed);
    let silence = consumer.format().silence();
    let width = consumer.format().width();

    let (wake_tx, wake_rx) = crossbeam_channel::bounded(1);
    let control = PlaybackControl::new();
    install_stop_handler(&control);

    // Header sizes are untrusted; grow from what is actually drained.
    let drained = Arc::new(Mutex::new(Vec::<u8>::new()));
    let drained_clock = drained.clone();
    let clock = SampleClock::new(rate).spawn(
        consumer.with_wake(wake_tx),
        control.clone(),
        move |tick: Option<&[u8]>| {
            if let Ok(mut buf) = drained_clock.lock() {
                buf.extend_from_slice(tick.unwrap_or(&silence[..width]));
            }
        },
    );

    let filled = run_refill_loop(&mut refiller, &control, &wake_rx, config.poll_interval);
    control.stop();
    if clock.join().is_err() {
        tracing::warn!("sample clock thread panicked");
    }

    let bytes = drained.lock().map(|mut b| std::mem::take(&mut *b)).unwrap_or_default();
    let mut writer =
        BufWriter::new(File::create(out).with_context(|| format!("create {:?}", out))?);
    writer
        .write_all(&bytes)
        .and_then(|_| writer.flush())
        .with_context(|| format!("write {:?}", out))?;
    tracing::info!(path = ?out, bytes = bytes.len(), clock_hz = rate, "render written");

    report_summary(&counters, &params, filled);
    Ok(())
}

/// Tick rate for `render`: the track rate scaled by `speed`, never below 1 Hz.
///
/// A rate of 0 would leave the clock unpaced, so it is only used when the track itself says 0.
fn clock_rate(sample_rate: u32, speed: f32) -> u32 {
    if sample_rate == 0 || !speed.is_finite() || speed <= 0.0 {
        return sample_rate;
    }
    (f64::from(sample_rate) * f64::from(speed)).clamp(1.0, f64::from(u32::MAX)) as u32
}

fn install_stop_handler(control: &PlaybackControl) {
    let control = control.clone();
    if let Err(e) = ctrlc::set_handler(move || control.stop()) {
        tracing::warn!("ctrl-c handler not installed: {e}");
    }
}

fn report_timing(params: &TrackParams, config: &PagerConfig) {
    let budget = config.timing_budget(params);
    if budget.is_met() {
        tracing::info!(
            page_bytes = config.capacity(),
            page_us = budget.page_duration.as_micros() as u64,
            headroom_us = budget.headroom().as_micros() as u64,
            "page timing budget"
        );
    } else {
        tracing::warn!(
            page_bytes = config.capacity(),
            page_us = budget.page_duration.as_micros() as u64,
            refill_latency_us = budget.refill_latency.as_micros() as u64,
            "one page plays faster than the assumed refill latency; raise --page-bytes"
        );
    }
}

fn report_summary(counters: &PlaybackCounters, params: &TrackParams, filled: u64) {
    let status = counters.snapshot(params.sample_rate);
    tracing::info!(
        played_samples = status.played_samples,
        total_samples = params.total_samples,
        elapsed_ms = ?status.elapsed_ms,
        pages_filled = status.pages_filled,
        loop_refills = filled,
        bytes_read = status.bytes_read,
        "playback finished"
    );
    if status.underrun_events > 0 {
        tracing::warn!(
            underrun_events = status.underrun_events,
            underrun_ticks = status.underrun_ticks,
            "refills missed their deadline"
        );
    }
}
