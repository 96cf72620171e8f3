pub mod input;
pub mod terminal;

pub use input::{PromptBroker, read_input, spawn_stdin_reader};
pub use terminal::TerminalSurface;

use crate::error::RecorderError;

pub const RECORD: &str = "Record";
pub const PLAY: &str = "Play";
pub const STOP: &str = "Stop";

/// A modal notification with a single acknowledgement action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub title: String,
    pub message: String,
    pub action: String,
}

impl Alert {
    pub fn error(err: &RecorderError) -> Self {
        Self {
            title: "Error".to_string(),
            message: err.to_string(),
            action: "OK".to_string(),
        }
    }
}

/// The widgets the controller drives
pub trait Surface {
    fn set_record_title(&mut self, title: &str);
    fn set_record_enabled(&mut self, enabled: bool);
    fn set_play_title(&mut self, title: &str);
    fn set_play_enabled(&mut self, enabled: bool);
    fn set_elapsed(&mut self, text: &str);
    fn show_alert(&mut self, alert: &Alert);
    fn dismiss_alert(&mut self);
}
