//! Output device discovery and selection.

use anyhow::{Context, Result, anyhow};
use cpal::traits::{DeviceTrait, HostTrait};

/// Pick the first output device whose name contains `needle` (case-insensitive), or the
/// host default when `needle` is `None`.
pub fn pick_device(host: &cpal::Host, needle: Option<&str>) -> Result<cpal::Device> {
    if let Some(needle) = needle {
        let mut devices = host.output_devices().context("No output devices")?;
        return devices
            .find(|d| {
                d.description()
                    .ok()
                    .map(|n| matches_device_name(&n.name(), needle))
                    .unwrap_or(false)
            })
            .ok_or_else(|| anyhow!("No output device matched: {needle}"));
    }

    host.default_output_device()
        .ok_or_else(|| anyhow!("No default output device"))
}

/// Choose an output config as close as possible to the track's sample rate.
///
/// An exact rate match wins; otherwise the highest rate not above `target_rate`, then the
/// lowest rate above it. Ties go to the sample format the output stage handles best.
pub fn pick_output_config(
    device: &cpal::Device,
    target_rate: u32,
) -> Result<cpal::SupportedStreamConfig> {
    let mut best: Option<(bool, u32, u8, cpal::SupportedStreamConfig)> = None;

    for range in device.supported_output_configs()? {
        let rank = sample_format_rank(range.sample_format());
        if rank == UNSUPPORTED_RANK {
            continue;
        }
        let rate = clamp_rate(range.min_sample_rate(), range.max_sample_rate(), target_rate);
        let below = rate <= target_rate;
        let replace = match &best {
            None => true,
            Some((b_below, b_rate, b_rank, _)) => {
                is_better_candidate(below, rate, rank, *b_below, *b_rate, *b_rank)
            }
        };
        if replace {
            best = Some((below, rate, rank, range.with_sample_rate(rate)));
        }
    }

    best.map(|b| b.3)
        .ok_or_else(|| anyhow!("No supported output configs"))
}

/// Print available output devices to stdout.
pub fn list_devices(host: &cpal::Host) -> Result<()> {
    let devices = host.output_devices().context("No output devices")?;
    for (i, d) in devices.enumerate() {
        println!("#{i}: {}", d.description()?);
    }
    Ok(())
}

const UNSUPPORTED_RANK: u8 = u8::MAX;

fn sample_format_rank(format: cpal::SampleFormat) -> u8 {
    match format {
        cpal::SampleFormat::F32 => 0,
        cpal::SampleFormat::I16 => 1,
        cpal::SampleFormat::I32 => 2,
        cpal::SampleFormat::U16 => 3,
        cpal::SampleFormat::U8 => 4,
        _ => UNSUPPORTED_RANK,
    }
}

fn clamp_rate(min: u32, max: u32, target: u32) -> u32 {
    target.clamp(min, max.max(min))
}

fn is_better_candidate(
    below: bool,
    rate: u32,
    rank: u8,
    best_below: bool,
    best_rate: u32,
    best_rank: u8,
) -> bool {
    if below != best_below {
        below
    } else if rate != best_rate {
        // Below target: closer means higher. Above target: closer means lower.
        if below { rate > best_rate } else { rate < best_rate }
    } else {
        rank < best_rank
    }
}

fn matches_device_name(name: &str, needle: &str) -> bool {
    let needle = needle.trim();
    if needle.is_empty() {
        return false;
    }
    name.to_lowercase().contains(&needle.to_lowercase())
}
