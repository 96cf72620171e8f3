use super::convert::{InputConverter, choose_input_config};
use super::format::AudioFormat;
use crate::messages::SessionEvents;
use anyhow::{Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, SampleFormat, SizedSample, StreamConfig};
use ringbuf::{HeapRb, traits::*};
use std::sync::Arc;
use tokio::sync::{Notify, mpsc, oneshot};
use tokio::task::JoinHandle;

/// A running microphone stream plus the task bridging it into async land
pub struct LiveCapture {
    /// Dropping the stream stops the hardware callback
    pub stream: cpal::Stream,
    /// Signals the bridge to flush what is left in the ring buffer and exit
    pub flush: oneshot::Sender<()>,
    pub bridge: JoinHandle<()>,
}

pub struct AudioCapture;

impl AudioCapture {
    /// Start audio capture
    ///
    /// The device runs at whatever supported configuration is closest to
    /// `format`; its samples are converted so that chunks of roughly 100ms in
    /// exactly `format` are sent via chunk_tx. A stream error is reported once
    /// as an unsuccessful `CaptureFinished` on `events`.
    pub fn start(
        format: AudioFormat,
        device_name: Option<&str>,
        chunk_tx: mpsc::Sender<Vec<f32>>,
        events: SessionEvents,
    ) -> Result<LiveCapture> {
        let ring = HeapRb::<f32>::new(format.samples_for_duration(60.0));
        let (producer, consumer) = ring.split();

        let device = Self::input_device(device_name)?;
        let (config, sample_format) = Self::input_config(&device, &format)?;
        let converter = InputConverter::new(&config, &format)?;

        let notify = Arc::new(Notify::new());

        let stream = match sample_format {
            SampleFormat::F32 => Self::build_stream::<f32>(
                &device,
                &config,
                converter,
                producer,
                notify.clone(),
                events,
            ),
            SampleFormat::I16 => Self::build_stream::<i16>(
                &device,
                &config,
                converter,
                producer,
                notify.clone(),
                events,
            ),
            other => anyhow::bail!("Unsupported input sample format: {:?}", other),
        }?;

        stream.play().context("Failed to start audio stream")?;

        let (flush, flush_rx) = oneshot::channel();
        let chunk_size = format.samples_for_duration(0.1);
        let bridge = tokio::task::spawn_local(Self::bridge_task(
            consumer, chunk_tx, chunk_size, notify, flush_rx,
        ));

        tracing::info!(
            "Audio capture started (device {} Hz, {} channels, {:?})",
            config.sample_rate.0,
            config.channels,
            sample_format
        );
        Ok(LiveCapture {
            stream,
            flush,
            bridge,
        })
    }

    fn input_config(
        device: &cpal::Device,
        format: &AudioFormat,
    ) -> Result<(StreamConfig, SampleFormat)> {
        let ranges = device
            .supported_input_configs()
            .context("Failed to query input configurations")?;

        if let Some(chosen) = choose_input_config(ranges, format) {
            return Ok(chosen);
        }

        tracing::debug!("No preferred input configuration, using the device default");
        let default = device
            .default_input_config()
            .context("Failed to get default input config")?;
        Ok((default.config(), default.sample_format()))
    }

    fn build_stream<T>(
        device: &cpal::Device,
        config: &StreamConfig,
        mut converter: InputConverter,
        mut producer: impl Producer<Item = f32> + Send + 'static,
        notify: Arc<Notify>,
        events: SessionEvents,
    ) -> Result<cpal::Stream>
    where
        T: SizedSample,
        f32: FromSample<T>,
    {
        let mut overflowing = false;

        device
            .build_input_stream(
                config,
                move |data: &[T], _info: &cpal::InputCallbackInfo| {
                    let samples = converter.process(data);
                    if samples.is_empty() {
                        return;
                    }
                    push_samples(&mut producer, samples, &mut overflowing);
                    notify.notify_one();
                },
                move |err| {
                    tracing::error!("Audio stream error: {}", err);
                    events.capture_finished(false);
                },
                None,
            )
            .context("Failed to build input stream")
    }

    fn input_device(name: Option<&str>) -> Result<cpal::Device> {
        let host = cpal::default_host();

        let Some(name) = name else {
            return host
                .default_input_device()
                .context("No input audio device available");
        };

        host.input_devices()
            .context("Failed to enumerate input devices")?
            .find(|device| device.name().map(|n| n == name).unwrap_or(false))
            .with_context(|| format!("Input device not found: {}", name))
    }

    async fn bridge_task(
        mut consumer: impl Consumer<Item = f32>,
        tx: mpsc::Sender<Vec<f32>>,
        chunk_size: usize,
        notify: Arc<Notify>,
        mut flush: oneshot::Receiver<()>,
    ) {
        loop {
            tokio::select! {
                _ = notify.notified() => {
                    while consumer.occupied_len() >= chunk_size {
                        let mut chunk = vec![0.0f32; chunk_size];
                        let n = consumer.pop_slice(&mut chunk);
                        chunk.truncate(n);

                        if tx.send(chunk).await.is_err() {
                            return;
                        }
                    }
                }
                _ = &mut flush => {
                    let remaining = consumer.occupied_len();
                    if remaining > 0 {
                        let mut chunk = vec![0.0f32; remaining];
                        let n = consumer.pop_slice(&mut chunk);
                        chunk.truncate(n);
                        let _ = tx.send(chunk).await;
                    }
                    return;
                }
            }
        }
    }
}

/// Push converted samples into the ring, returning how many were dropped
///
/// A full ring means the bridge task fell behind. Each overflow episode is
/// logged once; `overflowing` carries that state between callbacks.
fn push_samples(
    producer: &mut impl Producer<Item = f32>,
    samples: &[f32],
    overflowing: &mut bool,
) -> usize {
    let pushed = producer.push_slice(samples);
    let dropped = samples.len() - pushed;

    if dropped > 0 && !*overflowing {
        tracing::warn!(
            "Capture buffer full, dropping {} of {} samples",
            dropped,
            samples.len()
        );
    }
    *overflowing = dropped > 0;

    dropped
}
