use crate::audio::AudioFormat;
use crate::elapsed::format_elapsed;
use crate::error::RecorderError;
use crate::messages::{AppState, SessionEvent, SessionEvents, UiEvent};
use crate::permission::{MicrophonePermission, PermissionStatus};
use crate::services::{AudioBackend, CaptureSession, PlaybackSession};
use crate::ui::{Alert, PLAY, RECORD, STOP, Surface};

use anyhow::Result;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};

const TICK: Duration = Duration::from_millis(100);

enum Mode {
    Idle,
    Recording {
        id: u64,
        session: Box<dyn CaptureSession>,
        timer: Interval,
    },
    Playing {
        id: u64,
        session: Box<dyn PlaybackSession>,
    },
}

/// Record/playback controller
///
/// Runs on a LocalSet: sessions may hold !Send audio streams. Every input
/// (key presses, session completions, timer ticks) is handled on this one task.
pub struct App {
    mode: Mode,
    permission: PermissionStatus,
    alert: Option<Alert>,
    recording_path: PathBuf,
    format: AudioFormat,
    backend: Box<dyn AudioBackend>,
    consent: Rc<dyn MicrophonePermission>,
    surface: Box<dyn Surface>,
    ui_rx: mpsc::Receiver<UiEvent>,
    // Id of the most recently started session
    last_session: u64,
    events_tx: mpsc::UnboundedSender<SessionEvent>,
    events_rx: mpsc::UnboundedReceiver<SessionEvent>,
}

impl App {
    pub fn new(
        recording_path: PathBuf,
        backend: Box<dyn AudioBackend>,
        consent: Rc<dyn MicrophonePermission>,
        surface: Box<dyn Surface>,
        ui_rx: mpsc::Receiver<UiEvent>,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        Self {
            mode: Mode::Idle,
            permission: PermissionStatus::Undetermined,
            alert: None,
            recording_path,
            format: AudioFormat::default(),
            backend,
            consent,
            surface,
            ui_rx,
            last_session: 0,
            events_tx,
            events_rx,
        }
    }

    pub fn state(&self) -> AppState {
        match self.mode {
            Mode::Idle => AppState::Idle,
            Mode::Recording { .. } => AppState::Recording,
            Mode::Playing { .. } => AppState::Playing,
        }
    }

    pub async fn run(mut self) -> Result<()> {
        self.request_permission();
        self.reset_surface();

        tracing::info!(
            "Ready! Recording to {}. Type r (record), p (play) or q (quit) and press Enter",
            self.recording_path.display()
        );

        loop {
            tracing::trace!("Main loop: waiting for event (state = {:?})", self.state());
            tokio::select! {
                // Completions first: a queued finish must land before the next key press
                biased;

                Some(event) = self.events_rx.recv() => {
                    self.handle_session(event);
                }

                _ = Self::next_tick(&mut self.mode) => {
                    self.on_timer_tick();
                }

                event = self.ui_rx.recv() => match event {
                    Some(UiEvent::Quit) | None => {
                        tracing::info!("Quit requested, shutting down");
                        break;
                    }
                    Some(event) => self.handle_ui(event).await,
                },
            }
        }

        self.shutdown().await;
        Ok(())
    }

    async fn next_tick(mode: &mut Mode) {
        match mode {
            Mode::Recording { timer, .. } => {
                timer.tick().await;
            }
            _ => std::future::pending().await,
        }
    }

    /// Event sender for a new session, tagged with a fresh id
    fn session_events(&mut self) -> SessionEvents {
        self.last_session += 1;
        SessionEvents::new(self.last_session, self.events_tx.clone())
    }

    fn reset_surface(&mut self) {
        self.surface.set_record_title(RECORD);
        self.surface.set_record_enabled(true);
        self.surface.set_play_title(PLAY);
        self.surface.set_play_enabled(true);
        self.surface.set_elapsed(&format_elapsed(Duration::ZERO));
    }

    /// Look up the stored consent, asking in the background if there is none yet
    pub fn request_permission(&mut self) {
        self.permission = self.consent.status();
        tracing::info!("Microphone permission: {:?}", self.permission);

        if self.permission != PermissionStatus::Undetermined {
            return;
        }

        let consent = self.consent.clone();
        let events = self.events_tx.clone();
        tokio::task::spawn_local(async move {
            let granted = match consent.request().await {
                Ok(granted) => granted,
                Err(e) => {
                    tracing::warn!("Microphone permission request failed: {:#}", e);
                    false
                }
            };
            let _ = events.send(SessionEvent::PermissionResolved(granted));
        });
    }

    async fn handle_ui(&mut self, event: UiEvent) {
        tracing::debug!("handle_ui: {:?} (state = {:?})", event, self.state());

        // An open alert swallows input until acknowledged
        if self.alert.take().is_some() {
            self.surface.dismiss_alert();
            return;
        }

        match event {
            UiEvent::RecordPressed => self.on_record_toggle().await,
            UiEvent::PlayPressed => self.on_play_toggle().await,
            UiEvent::Acknowledge | UiEvent::Quit => {}
        }
    }

    fn handle_session(&mut self, event: SessionEvent) {
        tracing::debug!("handle_session: {:?} (state = {:?})", event, self.state());

        match event {
            SessionEvent::CaptureFinished { session, success } => {
                self.on_capture_finished(session, success)
            }
            SessionEvent::PlaybackFinished { session, success } => {
                self.on_playback_finished(session, success)
            }
            SessionEvent::PermissionResolved(granted) => {
                self.permission = if granted {
                    PermissionStatus::Granted
                } else {
                    PermissionStatus::Denied
                };
                tracing::info!("Microphone permission resolved: {:?}", self.permission);
            }
        }
    }

    pub async fn on_record_toggle(&mut self) {
        match std::mem::replace(&mut self.mode, Mode::Idle) {
            Mode::Idle => self.start_recording(),
            Mode::Recording { session, .. } => self.stop_recording(session).await,
            playing @ Mode::Playing { .. } => {
                tracing::debug!("Record is disabled while playing");
                self.mode = playing;
            }
        }
    }

    fn start_recording(&mut self) {
        if self.permission != PermissionStatus::Granted {
            self.report(RecorderError::PermissionDenied);
            return;
        }

        let events = self.session_events();
        let id = events.session();
        tracing::info!("Starting recording (session {})", id);
        let session = match self
            .backend
            .start_capture(&self.recording_path, self.format, events)
        {
            Ok(session) => session,
            Err(e) => {
                tracing::error!("Failed to start recording: {:#}", e);
                self.report(RecorderError::session(&e));
                return;
            }
        };

        let mut timer = tokio::time::interval(TICK);
        timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
        self.mode = Mode::Recording { id, session, timer };

        self.surface.set_elapsed(&format_elapsed(Duration::ZERO));
        self.surface.set_play_enabled(false);
        self.surface.set_record_title(STOP);
    }

    async fn stop_recording(&mut self, mut session: Box<dyn CaptureSession>) {
        tracing::info!("Stopping recording");

        // A failed finalize comes back as an unsuccessful CaptureFinished
        if let Err(e) = session.stop().await {
            tracing::warn!("Recording did not stop cleanly: {:#}", e);
        }

        self.surface.set_record_title(RECORD);
        self.surface.set_play_enabled(true);
    }

    pub async fn on_play_toggle(&mut self) {
        match std::mem::replace(&mut self.mode, Mode::Idle) {
            Mode::Idle => self.start_playback().await,
            Mode::Playing { id, mut session } => {
                tracing::info!("Stopping playback (session {})", id);
                session.stop();
                self.surface.set_play_title(PLAY);
                self.surface.set_record_enabled(true);
            }
            recording @ Mode::Recording { .. } => {
                tracing::debug!("Play is disabled while recording");
                self.mode = recording;
            }
        }
    }

    async fn start_playback(&mut self) {
        if !self.recording_path.exists() {
            self.report(RecorderError::FileMissing(self.recording_path.clone()));
            return;
        }

        let events = self.session_events();
        let id = events.session();
        tracing::info!("Starting playback (session {})", id);
        self.surface.set_record_enabled(false);
        self.surface.set_play_title(STOP);

        let started = self
            .backend
            .start_playback(&self.recording_path, events)
            .await;

        match started {
            Ok(session) => self.mode = Mode::Playing { id, session },
            Err(e) => {
                tracing::error!("Failed to start playback: {:#}", e);
                self.surface.set_play_title(PLAY);
                self.surface.set_record_enabled(true);
                self.report(RecorderError::session(&e));
            }
        }
    }

    pub fn on_timer_tick(&mut self) {
        if let Mode::Recording { session, .. } = &self.mode {
            if session.is_active() {
                let label = format_elapsed(session.current_time());
                self.surface.set_elapsed(&label);
            }
        }
    }

    pub fn on_capture_finished(&mut self, session: u64, success: bool) {
        let current = matches!(self.mode, Mode::Recording { id, .. } if id == session);

        if !success {
            if current {
                // Dropping the session releases the device and closes the file
                self.mode = Mode::Idle;
                self.surface.set_record_title(RECORD);
            }
            self.report(RecorderError::RecordingFailed);
        }

        if let Mode::Recording { .. } = self.mode {
            tracing::debug!("Ignoring finish of earlier recording {}", session);
            return;
        }
        self.surface.set_play_enabled(true);
    }

    pub fn on_playback_finished(&mut self, session: u64, success: bool) {
        tracing::info!("Playback {} finished (success = {})", session, success);

        let current = matches!(self.mode, Mode::Playing { id, .. } if id == session);
        if current {
            self.mode = Mode::Idle;
            self.surface.set_play_title(PLAY);
        } else if !matches!(self.mode, Mode::Idle) {
            tracing::debug!("Ignoring finish of earlier playback {}", session);
            return;
        }

        self.surface.set_record_enabled(true);
    }

    fn report(&mut self, err: RecorderError) {
        match &err {
            RecorderError::FileMissing(path) => {
                tracing::warn!("No recording at {}", path.display())
            }
            _ => tracing::warn!("{}", err),
        }

        let alert = Alert::error(&err);
        self.surface.show_alert(&alert);
        self.alert = Some(alert);
    }

    async fn shutdown(&mut self) {
        match std::mem::replace(&mut self.mode, Mode::Idle) {
            Mode::Recording { mut session, .. } => {
                if let Err(e) = session.stop().await {
                    tracing::warn!("Recording did not stop cleanly: {:#}", e);
                }
            }
            Mode::Playing { mut session, .. } => session.stop(),
            Mode::Idle => {}
        }
        tracing::info!("Dictaphone shutdown complete");
    }
}
