use crate::messages::SessionEvents;
use anyhow::{Context, Result};
use rodio::{OutputStream, OutputStreamBuilder, Sink};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::oneshot;

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Plays one file through the default output device on a dedicated thread
///
/// The output stream and decoder live on that thread for their whole life.
/// Natural end of the file is reported as `PlaybackFinished`; an explicit
/// `stop()` is not.
pub struct Playback {
    stop: Arc<AtomicBool>,
}

impl Playback {
    pub async fn start(path: &Path, events: SessionEvents) -> Result<Self> {
        let path = path.to_path_buf();
        let stop = Arc::new(AtomicBool::new(false));
        let stop_thread = stop.clone();
        let (ready_tx, ready_rx) = oneshot::channel();

        std::thread::spawn(move || {
            let (stream, sink) = match open(&path) {
                Ok(opened) => {
                    let _ = ready_tx.send(Ok(()));
                    opened
                }
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            while !sink.empty() && !stop_thread.load(Ordering::SeqCst) {
                std::thread::sleep(POLL_INTERVAL);
            }

            let stopped = stop_thread.load(Ordering::SeqCst);
            sink.stop();
            drop(stream);

            if !stopped {
                tracing::info!("Playback of {} finished", path.display());
                events.playback_finished(true);
            }
        });

        ready_rx
            .await
            .context("Playback thread exited before opening the output")??;

        Ok(Self { stop })
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::SeqCst);
    }
}

impl Drop for Playback {
    fn drop(&mut self) {
        self.stop();
    }
}

fn open(path: &Path) -> Result<(OutputStream, Sink)> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;

    let mut stream =
        OutputStreamBuilder::open_default_stream().context("Failed to open audio output")?;
    stream.log_on_drop(false);

    let sink = rodio::play(stream.mixer(), BufReader::new(file))
        .with_context(|| format!("Failed to decode {}", path.display()))?;

    Ok((stream, sink))
}
