//! Output stage: the CPAL callback is the real-time consumer.
//!
//! The callback owns the [`PageConsumer`] outright, so draining needs no lock. Each output
//! frame takes the current source sample (held across output frames when the device runs
//! faster than the track) and copies it to every output channel. Underruns play silence; the
//! end of the stream stops the shared [`PlaybackControl`].

use anyhow::{Result, anyhow};
use cpal::SampleFormat;
use cpal::traits::DeviceTrait;
use pcm_pager::consumer::{Drain, PageConsumer};
use pcm_pager::pump::PlaybackControl;

/// Build a CPAL output stream that drains `consumer` at `source_rate`.
pub fn build_output_stream(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    sample_format: SampleFormat,
    consumer: PageConsumer,
    source_rate: u32,
    control: PlaybackControl,
) -> Result<cpal::Stream> {
    match sample_format {
        SampleFormat::F32 => build_stream::<f32>(device, config, consumer, source_rate, control),
        SampleFormat::I16 => build_stream::<i16>(device, config, consumer, source_rate, control),
        SampleFormat::I32 => build_stream::<i32>(device, config, consumer, source_rate, control),
        SampleFormat::U16 => build_stream::<u16>(device, config, consumer, source_rate, control),
        SampleFormat::U8 => build_stream::<u8>(device, config, consumer, source_rate, control),
        other => Err(anyhow!("Unsupported sample format: {other:?}")),
    }
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut consumer: PageConsumer,
    source_rate: u32,
    control: PlaybackControl,
) -> Result<cpal::Stream>
where
    T: cpal::Sample + cpal::SizedSample + cpal::FromSample<f32>,
{
    let channels_out = usize::from(config.channels).max(1);
    let mut hold = SampleHold::new(source_rate, config.sample_rate);

    let err_fn = |err| tracing::warn!("stream error: {err}");

    let stream = device.build_output_stream(
        config,
        move |data: &mut [T], _| {
            for frame in data.chunks_mut(channels_out) {
                let value = hold.next(&mut consumer, &control);
                frame.fill(<T as cpal::Sample>::from_sample::<f32>(value));
            }
        },
        err_fn,
        None,
    )?;

    Ok(stream)
}

/// Zero-order hold from the track's sample rate to the device's frame rate.
struct SampleHold {
    step: f64,
    phase: f64,
    current: f32,
    ended: bool,
}

impl SampleHold {
    fn new(source_rate: u32, output_rate: u32) -> Self {
        let step = if source_rate == 0 || output_rate == 0 {
            1.0
        } else {
            f64::from(source_rate) / f64::from(output_rate)
        };
        Self {
            step,
            // First output frame pulls exactly one source sample.
            phase: 1.0 - step,
            current: 0.0,
            ended: false,
        }
    }

    /// Value for the next output frame.
    fn next(&mut self, consumer: &mut PageConsumer, control: &PlaybackControl) -> f32 {
        if self.ended {
            return 0.0;
        }
        self.phase += self.step;
        while self.phase >= 1.0 {
            self.phase -= 1.0;
            self.current = match consumer.next_sample() {
                Drain::Ready(v) => v,
                Drain::Underrun => 0.0,
                Drain::EndOfStream => {
                    self.ended = true;
                    control.stop();
                    return 0.0;
                }
            };
        }
        self.current
    }
}
