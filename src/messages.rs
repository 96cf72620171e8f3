use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::mpsc;

/// Input from the user surface
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UiEvent {
    RecordPressed,
    PlayPressed,
    /// Acknowledges (dismisses) an open alert
    Acknowledge,
    Quit,
}

/// Completion notifications from sessions and background requests.
///
/// These always arrive through the controller's event channel, so a
/// notification is handled after the UI turn that caused it. Completions carry
/// the id of the session that produced them, so a late one can be told apart
/// from the session currently running.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionEvent {
    CaptureFinished { session: u64, success: bool },
    PlaybackFinished { session: u64, success: bool },
    PermissionResolved(bool),
}

/// The event sender handed to one session
///
/// Stamps every completion with the session id. A capture reports at most one
/// failure, and nothing after it.
#[derive(Clone, Debug)]
pub struct SessionEvents {
    session: u64,
    tx: mpsc::UnboundedSender<SessionEvent>,
    failed: Arc<AtomicBool>,
}

impl SessionEvents {
    pub fn new(session: u64, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self {
            session,
            tx,
            failed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn session(&self) -> u64 {
        self.session
    }

    pub fn capture_finished(&self, success: bool) {
        let already_failed = if success {
            self.failed.load(Ordering::SeqCst)
        } else {
            self.failed.swap(true, Ordering::SeqCst)
        };
        if already_failed {
            return;
        }

        let _ = self.tx.send(SessionEvent::CaptureFinished {
            session: self.session,
            success,
        });
    }

    pub fn playback_finished(&self, success: bool) {
        let _ = self.tx.send(SessionEvent::PlaybackFinished {
            session: self.session,
            success,
        });
    }
}

/// Coarse application state, derived from the controller mode
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AppState {
    Idle,
    Recording,
    Playing,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut mpsc::UnboundedReceiver<SessionEvent>) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn completions_carry_the_session_id() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let events = SessionEvents::new(7, tx);

        events.playback_finished(true);
        events.capture_finished(true);

        assert_eq!(
            drain(&mut rx),
            [
                SessionEvent::PlaybackFinished { session: 7, success: true },
                SessionEvent::CaptureFinished { session: 7, success: true },
            ]
        );
    }

    #[test]
    fn capture_failure_is_reported_once_and_ends_the_session() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let events = SessionEvents::new(3, tx);
        let from_stream = events.clone();

        from_stream.capture_finished(false);
        events.capture_finished(false);
        events.capture_finished(true);

        assert_eq!(
            drain(&mut rx),
            [SessionEvent::CaptureFinished { session: 3, success: false }]
        );
    }
}
