use super::format::AudioFormat;
use super::sink::AudioSink;
use anyhow::Result;
use async_trait::async_trait;
use hound::{SampleFormat, WavSpec, WavWriter};
use std::io::{Seek, Write};
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, oneshot};

enum WavCommand {
    WriteChunk(Vec<f32>),
    Finalize { reply: oneshot::Sender<Result<()>> },
}

/// WAV encoder using a dedicated blocking thread for I/O
///
/// Audio chunks are sent to the thread via a channel and written sequentially.
/// Creating the sink truncates whatever was previously stored at `path`.
/// Once the thread fails to write, later `write_chunk` calls fail too.
pub struct WavSink {
    tx: mpsc::UnboundedSender<WavCommand>,
    write_failed: Arc<AtomicBool>,
}

impl WavSink {
    pub fn create(path: &Path, format: AudioFormat) -> Result<Self> {
        let spec = WavSpec {
            channels: format.channels,
            sample_rate: format.sample_rate,
            bits_per_sample: format.quality.bits_per_sample(),
            sample_format: SampleFormat::Int,
        };

        let writer = WavWriter::create(path, spec)
            .map_err(|e| anyhow::anyhow!("Failed to create WAV writer: {}", e))?;

        Ok(Self::spawn(writer))
    }

    fn spawn<W>(mut writer: WavWriter<W>) -> Self
    where
        W: Write + Seek + Send + 'static,
    {
        let bits = writer.spec().bits_per_sample;
        let write_failed = Arc::new(AtomicBool::new(false));
        let failed = write_failed.clone();
        let (tx, mut rx) = mpsc::unbounded_channel();

        std::thread::spawn(move || {
            let mut write_error = None;

            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    WavCommand::WriteChunk(samples) => {
                        if write_error.is_some() {
                            continue;
                        }
                        for sample in samples {
                            if let Err(e) = writer.write_sample(quantize(sample, bits)) {
                                tracing::error!("Failed to write sample: {}", e);
                                write_error = Some(e.to_string());
                                failed.store(true, Ordering::SeqCst);
                                break;
                            }
                        }
                    }
                    WavCommand::Finalize { reply } => {
                        let result = match write_error.take() {
                            Some(e) => Err(anyhow::anyhow!("WAV write failed: {}", e)),
                            None => writer
                                .finalize()
                                .map_err(|e| anyhow::anyhow!("Failed to finalize WAV: {}", e)),
                        };
                        let _ = reply.send(result);
                        break;
                    }
                }
            }
        });

        Self { tx, write_failed }
    }
}

/// Convert an f32 sample (-1.0 to 1.0) to a signed integer of `bits` width
fn quantize(sample: f32, bits: u16) -> i32 {
    let max = ((1i64 << (bits - 1)) - 1) as f64;
    (sample.clamp(-1.0, 1.0) as f64 * max) as i32
}

#[async_trait]
impl AudioSink for WavSink {
    fn write_chunk(&mut self, samples: Vec<f32>) -> Result<()> {
        if self.write_failed.load(Ordering::SeqCst) {
            anyhow::bail!("WAV writer failed, see earlier errors");
        }
        self.tx
            .send(WavCommand::WriteChunk(samples))
            .map_err(|e| anyhow::anyhow!("Failed to send write command: {}", e))
    }

    async fn finalize(&mut self) -> Result<()> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(WavCommand::Finalize { reply })
            .map_err(|e| anyhow::anyhow!("Failed to send finalize command: {}", e))?;

        rx.await
            .map_err(|e| anyhow::anyhow!("Failed to receive finalize response: {}", e))?
    }
}
