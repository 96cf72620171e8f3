use super::format::AudioFormat;
use anyhow::{Context, Result};
use cpal::{FromSample, SampleFormat, SampleRate, StreamConfig, SupportedStreamConfigRange};
use rubato::{FftFixedIn, Resampler};

// Input frames per resampler pass; matches what the FFT resampler handles well
const RESAMPLE_CHUNK: usize = 1024;

/// Pick the device configuration closest to `format`
///
/// Only f32 and i16 streams are considered. A range that contains the target
/// rate wins, then one with the target channel count, then f32 over i16.
pub fn choose_input_config(
    ranges: impl IntoIterator<Item = SupportedStreamConfigRange>,
    format: &AudioFormat,
) -> Option<(StreamConfig, SampleFormat)> {
    let rank = |range: &SupportedStreamConfigRange| {
        (
            range.min_sample_rate().0 <= format.sample_rate
                && range.max_sample_rate().0 >= format.sample_rate,
            range.channels() == format.channels,
            range.sample_format() == SampleFormat::F32,
        )
    };

    let best = ranges
        .into_iter()
        .filter(|range| matches!(range.sample_format(), SampleFormat::F32 | SampleFormat::I16))
        .fold(None::<SupportedStreamConfigRange>, |best, range| match best {
            Some(current) if rank(&current) >= rank(&range) => Some(current),
            _ => Some(range),
        })?;

    let rate = format
        .sample_rate
        .clamp(best.min_sample_rate().0, best.max_sample_rate().0);
    let sample_format = best.sample_format();
    let config = best.with_sample_rate(SampleRate(rate)).config();

    Some((config, sample_format))
}

/// Turns device frames into interleaved f32 frames of the recording format
///
/// Samples are converted to f32, channels are mapped (mono is duplicated,
/// extra channels are dropped, a mono target averages), then the rate is
/// converted with an FFT resampler when the device runs at a different rate.
pub struct InputConverter {
    in_channels: usize,
    out_channels: usize,
    resampler: Option<FftFixedIn<f32>>,
    // Per-channel frames waiting for the next resampler pass
    pending: Vec<Vec<f32>>,
    resampled: Vec<Vec<f32>>,
    out: Vec<f32>,
}

impl InputConverter {
    pub fn new(device: &StreamConfig, format: &AudioFormat) -> Result<Self> {
        let out_channels = format.channels.max(1) as usize;

        let resampler = if device.sample_rate.0 == format.sample_rate {
            None
        } else {
            tracing::info!(
                "Resampling input from {} Hz to {} Hz",
                device.sample_rate.0,
                format.sample_rate
            );
            Some(
                FftFixedIn::<f32>::new(
                    device.sample_rate.0 as usize,
                    format.sample_rate as usize,
                    RESAMPLE_CHUNK,
                    2,
                    out_channels,
                )
                .context("Failed to create resampler")?,
            )
        };

        let resampled = match &resampler {
            Some(resampler) => resampler.output_buffer_allocate(true),
            None => Vec::new(),
        };

        Ok(Self {
            in_channels: device.channels.max(1) as usize,
            out_channels,
            resampler,
            pending: vec![Vec::new(); out_channels],
            resampled,
            out: Vec::new(),
        })
    }

    /// Convert one callback's worth of device samples
    ///
    /// The returned slice may be empty while the resampler collects input.
    pub fn process<T>(&mut self, data: &[T]) -> &[f32]
    where
        T: Copy,
        f32: FromSample<T>,
    {
        self.out.clear();

        for frame in data.chunks_exact(self.in_channels) {
            for channel in 0..self.out_channels {
                let sample = self.map_channel(frame, channel);
                match self.resampler {
                    Some(_) => self.pending[channel].push(sample),
                    None => self.out.push(sample),
                }
            }
        }

        if self.resampler.is_some() {
            self.resample_pending();
        }

        &self.out
    }

    fn map_channel<T>(&self, frame: &[T], channel: usize) -> f32
    where
        T: Copy,
        f32: FromSample<T>,
    {
        if self.out_channels == 1 && frame.len() > 1 {
            let sum: f32 = frame.iter().map(|&s| f32::from_sample_(s)).sum();
            return sum / frame.len() as f32;
        }
        f32::from_sample_(frame[channel % frame.len()])
    }

    fn resample_pending(&mut self) {
        let Some(resampler) = self.resampler.as_mut() else {
            return;
        };

        loop {
            let needed = resampler.input_frames_next();
            if self.pending[0].len() < needed {
                return;
            }

            let input: Vec<&[f32]> = self.pending.iter().map(|ch| &ch[..needed]).collect();
            let written = match resampler.process_into_buffer(&input, &mut self.resampled, None) {
                Ok((_, written)) => written,
                Err(e) => {
                    tracing::error!("Resampling failed, dropping input: {}", e);
                    0
                }
            };

            for channel in self.pending.iter_mut() {
                channel.drain(..needed);
            }
            for i in 0..written {
                for channel in &self.resampled {
                    self.out.push(channel[i]);
                }
            }
        }
    }
}
