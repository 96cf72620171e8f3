use super::{Alert, PLAY, RECORD, Surface};
use colored::Colorize;
use std::io::Write;

/// Single status line on stdout, redrawn in place
pub struct TerminalSurface {
    record_title: String,
    record_enabled: bool,
    play_title: String,
    play_enabled: bool,
    elapsed: String,
    alert_open: bool,
}

impl TerminalSurface {
    pub fn new() -> Self {
        Self {
            record_title: RECORD.to_string(),
            record_enabled: true,
            play_title: PLAY.to_string(),
            play_enabled: true,
            elapsed: "00:00:00".to_string(),
            alert_open: false,
        }
    }

    fn button(key: char, title: &str, enabled: bool) -> String {
        let label = format!("[{}] {}", key, title);
        if enabled {
            label.bold().to_string()
        } else {
            label.dimmed().to_string()
        }
    }

    pub fn status_line(&self) -> String {
        format!(
            "{}  {}   {}   [q] Quit",
            Self::button('r', &self.record_title, self.record_enabled),
            Self::button('p', &self.play_title, self.play_enabled),
            self.elapsed.cyan()
        )
    }

    fn render(&self) {
        if self.alert_open {
            return;
        }
        let mut stdout = std::io::stdout().lock();
        let _ = write!(stdout, "\r\x1b[2K{}", self.status_line());
        let _ = stdout.flush();
    }
}

impl Default for TerminalSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl Surface for TerminalSurface {
    fn set_record_title(&mut self, title: &str) {
        self.record_title = title.to_string();
        self.render();
    }

    fn set_record_enabled(&mut self, enabled: bool) {
        self.record_enabled = enabled;
        self.render();
    }

    fn set_play_title(&mut self, title: &str) {
        self.play_title = title.to_string();
        self.render();
    }

    fn set_play_enabled(&mut self, enabled: bool) {
        self.play_enabled = enabled;
        self.render();
    }

    fn set_elapsed(&mut self, text: &str) {
        self.elapsed = text.to_string();
        self.render();
    }

    fn show_alert(&mut self, alert: &Alert) {
        self.alert_open = true;
        println!();
        println!("{}", format!(" {} ", alert.title).white().on_red().bold());
        println!("{}", alert.message.red());
        println!("Press Enter for {}", alert.action.bold());
    }

    fn dismiss_alert(&mut self) {
        self.alert_open = false;
        self.render();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_line_shows_titles_and_elapsed() {
        colored::control::set_override(false);
        let mut surface = TerminalSurface::new();
        surface.record_title = "Stop".to_string();
        surface.play_enabled = false;
        surface.elapsed = "00:00:07".to_string();

        assert_eq!(
            surface.status_line(),
            "[r] Stop  [p] Play   00:00:07   [q] Quit"
        );
    }
}
