use crate::audio::{AudioFormat, Playback};
use crate::messages::SessionEvents;
use crate::services::Recorder;
use anyhow::Result;
use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;

/// An active recording
#[async_trait(?Send)]
pub trait CaptureSession {
    /// Whether the session is still capturing
    fn is_active(&self) -> bool;

    /// Amount of audio captured so far
    fn current_time(&self) -> Duration;

    /// Stop capturing and finalize the file. Reports `CaptureFinished`.
    async fn stop(&mut self) -> Result<()>;
}

/// An active playback. Natural completion is reported as `PlaybackFinished`.
pub trait PlaybackSession {
    fn stop(&mut self);
}

/// Creates capture and playback sessions.
///
/// Sessions report completion through the `events` handed to them, which
/// tag every completion with the id the controller chose for that session.
#[async_trait(?Send)]
pub trait AudioBackend {
    fn start_capture(
        &self,
        path: &Path,
        format: AudioFormat,
        events: SessionEvents,
    ) -> Result<Box<dyn CaptureSession>>;

    async fn start_playback(
        &self,
        path: &Path,
        events: SessionEvents,
    ) -> Result<Box<dyn PlaybackSession>>;
}

/// Backend talking to the real audio devices (cpal in, rodio out)
pub struct DeviceBackend {
    input_device: Option<String>,
}

impl DeviceBackend {
    pub fn new(input_device: Option<String>) -> Self {
        Self { input_device }
    }
}

impl PlaybackSession for Playback {
    fn stop(&mut self) {
        Playback::stop(self);
    }
}

#[async_trait(?Send)]
impl AudioBackend for DeviceBackend {
    fn start_capture(
        &self,
        path: &Path,
        format: AudioFormat,
        events: SessionEvents,
    ) -> Result<Box<dyn CaptureSession>> {
        let recorder = Recorder::start(path, format, self.input_device.as_deref(), events)?;
        Ok(Box::new(recorder))
    }

    async fn start_playback(
        &self,
        path: &Path,
        events: SessionEvents,
    ) -> Result<Box<dyn PlaybackSession>> {
        let playback = Playback::start(path, events).await?;
        tracing::info!("Playing {}", path.display());
        Ok(Box::new(playback))
    }
}
