use crate::audio::{AudioCapture, AudioFormat, AudioSink, Container, LiveCapture, WavSink};
use crate::messages::SessionEvents;
use crate::services::CaptureSession;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// One microphone recording into one WAV file
///
/// This session:
/// - Owns the AudioCapture stream for as long as it is recording
/// - Streams chunks into a WavSink from a local pump task
/// - Counts written samples to report the elapsed position
/// - Finalizes the file and reports `CaptureFinished` on stop
///
/// Note: cpal::Stream is !Send, so this must live on a LocalSet.
pub struct Recorder {
    format: AudioFormat,
    live: Option<LiveCapture>,
    pump: Option<JoinHandle<Box<dyn AudioSink>>>,
    written: Arc<AtomicU64>,
    events: SessionEvents,
}

impl Recorder {
    pub fn start(
        path: &Path,
        format: AudioFormat,
        input_device: Option<&str>,
        events: SessionEvents,
    ) -> Result<Self> {
        let (chunk_tx, chunk_rx) = mpsc::channel(100);

        // Open the device before touching the file so a failed start keeps
        // the previous recording intact.
        let live = AudioCapture::start(format, input_device, chunk_tx, events.clone())?;

        let sink: Box<dyn AudioSink> = match format.container {
            Container::Wav => Box::new(
                WavSink::create(path, format)
                    .with_context(|| format!("Failed to create {}", path.display()))?,
            ),
        };

        let written = Arc::new(AtomicU64::new(0));
        let pump = tokio::task::spawn_local(Self::pump_task(
            chunk_rx,
            sink,
            written.clone(),
            events.clone(),
        ));

        tracing::info!("Recording session {} to {}", events.session(), path.display());

        Ok(Self {
            format,
            live: Some(live),
            pump: Some(pump),
            written,
            events,
        })
    }

    async fn pump_task(
        mut chunk_rx: mpsc::Receiver<Vec<f32>>,
        mut sink: Box<dyn AudioSink>,
        written: Arc<AtomicU64>,
        events: SessionEvents,
    ) -> Box<dyn AudioSink> {
        let mut failed = false;

        while let Some(chunk) = chunk_rx.recv().await {
            if failed {
                continue;
            }

            let len = chunk.len() as u64;
            if let Err(e) = sink.write_chunk(chunk) {
                tracing::error!("Failed to write audio chunk: {}", e);
                failed = true;
                events.capture_finished(false);
                continue;
            }
            written.fetch_add(len, Ordering::Relaxed);
        }

        sink
    }
}

#[async_trait(?Send)]
impl CaptureSession for Recorder {
    fn is_active(&self) -> bool {
        self.live.is_some()
    }

    fn current_time(&self) -> Duration {
        let samples = self.written.load(Ordering::Relaxed);
        Duration::from_secs_f64(self.format.seconds_for_samples(samples))
    }

    async fn stop(&mut self) -> Result<()> {
        let Some(live) = self.live.take() else {
            return Ok(());
        };

        // Stop the hardware first, then flush whatever is still buffered
        drop(live.stream);
        let _ = live.flush.send(());
        if let Err(e) = live.bridge.await {
            tracing::warn!("Capture bridge task ended abnormally: {}", e);
        }

        // The bridge owned the chunk sender, so the pump now drains and exits
        let result = match self.pump.take() {
            Some(pump) => match pump.await {
                Ok(mut sink) => sink.finalize().await,
                Err(e) => Err(anyhow::anyhow!("Recording pump task failed: {}", e)),
            },
            None => Err(anyhow::anyhow!("Recording pump was not running")),
        };

        match &result {
            Ok(()) => tracing::info!(
                "Recorded successfully ({:.1}s)",
                self.current_time().as_secs_f64()
            ),
            Err(e) => tracing::error!("Failed to finalize recording: {}", e),
        }

        self.events.capture_finished(result.is_ok());

        result
    }
}

impl Drop for Recorder {
    fn drop(&mut self) {
        // Abandoned without stop(): let the bridge and pump wind down. The WAV
        // writer thread closes the file when its channel drops.
        if let Some(live) = self.live.take() {
            drop(live.stream);
            let _ = live.flush.send(());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messages::SessionEvent;
    use std::sync::Mutex;

    /// Accepts `accept` chunks, then fails every write
    struct FlakySink {
        accept: usize,
        chunks: Arc<Mutex<Vec<usize>>>,
    }

    #[async_trait]
    impl AudioSink for FlakySink {
        fn write_chunk(&mut self, samples: Vec<f32>) -> Result<()> {
            let mut chunks = self.chunks.lock().unwrap();
            if chunks.len() >= self.accept {
                anyhow::bail!("disk full");
            }
            chunks.push(samples.len());
            Ok(())
        }

        async fn finalize(&mut self) -> Result<()> {
            Ok(())
        }
    }

    fn idle_recorder(written: Arc<AtomicU64>, events: SessionEvents) -> Recorder {
        Recorder {
            format: AudioFormat::default(),
            live: None,
            pump: None,
            written,
            events,
        }
    }

    #[tokio::test]
    async fn failing_sink_reports_one_failure_and_keeps_draining() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let (chunk_tx, chunk_rx) = mpsc::channel(8);
        let chunks = Arc::new(Mutex::new(Vec::new()));
        let sink = FlakySink {
            accept: 1,
            chunks: chunks.clone(),
        };
        let written = Arc::new(AtomicU64::new(0));

        for _ in 0..4 {
            chunk_tx.send(vec![0.0; 10]).await.unwrap();
        }
        drop(chunk_tx);

        let events = SessionEvents::new(5, events_tx);
        Recorder::pump_task(chunk_rx, Box::new(sink), written.clone(), events).await;

        assert_eq!(*chunks.lock().unwrap(), [10]);
        assert_eq!(written.load(Ordering::Relaxed), 10);
        assert_eq!(
            events_rx.try_recv().unwrap(),
            SessionEvent::CaptureFinished {
                session: 5,
                success: false
            }
        );
        assert!(events_rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn written_samples_drive_the_position() {
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();
        let events = SessionEvents::new(1, events_tx);
        let format = AudioFormat::default();
        let (chunk_tx, chunk_rx) = mpsc::channel(16);
        let sink = FlakySink {
            accept: usize::MAX,
            chunks: Arc::new(Mutex::new(Vec::new())),
        };
        let written = Arc::new(AtomicU64::new(0));

        // 2.5 seconds of 100ms chunks
        for _ in 0..25 {
            let chunk = vec![0.0; format.samples_for_duration(0.1)];
            chunk_tx.send(chunk).await.unwrap();
        }
        drop(chunk_tx);

        Recorder::pump_task(chunk_rx, Box::new(sink), written.clone(), events.clone()).await;

        let recorder = idle_recorder(written, events);
        assert_eq!(recorder.current_time(), Duration::from_millis(2500));
        assert!(!recorder.is_active());
        assert!(events_rx.try_recv().is_err());
    }
}
