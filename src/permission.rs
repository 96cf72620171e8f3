//! Microphone consent.
//!
//! Desktop systems rarely gate microphone access, so dictaphone keeps its own
//! consent record and asks once. A denial sticks until the record is reset.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

#[async_trait(?Send)]
pub trait MicrophonePermission {
    /// Current consent, answered without asking anyone
    fn status(&self) -> PermissionStatus;

    /// Ask the user and remember the answer
    async fn request(&self) -> Result<bool>;
}

/// Asks the user a free-form question and returns the typed answer
#[async_trait(?Send)]
pub trait Prompt {
    async fn ask(&self, question: &str) -> Result<String>;
}

#[derive(Debug, Serialize, Deserialize)]
struct ConsentRecord {
    microphone: PermissionStatus,
}

/// Consent persisted as a small JSON file
pub struct ConsentFile<P> {
    path: PathBuf,
    prompt: P,
}

impl<P: Prompt> ConsentFile<P> {
    pub const QUESTION: &'static str = "Allow dictaphone to use your microphone? [y/N]";

    pub fn new(path: PathBuf, prompt: P) -> Self {
        Self { path, prompt }
    }

    fn store(&self, status: PermissionStatus) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let contents = serde_json::to_string_pretty(&ConsentRecord { microphone: status })
            .context("Failed to serialize consent")?;

        std::fs::write(&self.path, contents)
            .with_context(|| format!("Failed to write consent file: {:?}", self.path))?;

        tracing::info!("Microphone permission stored as {:?}", status);
        Ok(())
    }
}

/// Forget any stored answer so the next start asks again
pub fn reset(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            tracing::info!("Cleared microphone permission at {:?}", path);
            Ok(())
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Failed to remove consent file: {:?}", path)),
    }
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

#[async_trait(?Send)]
impl<P: Prompt> MicrophonePermission for ConsentFile<P> {
    fn status(&self) -> PermissionStatus {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(_) => return PermissionStatus::Undetermined,
        };

        match serde_json::from_str::<ConsentRecord>(&contents) {
            Ok(record) => record.microphone,
            Err(e) => {
                tracing::warn!("Ignoring unreadable consent file {:?}: {}", self.path, e);
                PermissionStatus::Undetermined
            }
        }
    }

    async fn request(&self) -> Result<bool> {
        let answer = self.prompt.ask(Self::QUESTION).await?;
        let granted = is_yes(&answer);

        let status = if granted {
            PermissionStatus::Granted
        } else {
            PermissionStatus::Denied
        };
        self.store(status)?;

        Ok(granted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    struct Scripted {
        answer: String,
        asked: RefCell<Vec<String>>,
    }

    impl Scripted {
        fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                asked: RefCell::new(Vec::new()),
            }
        }
    }

    #[async_trait(?Send)]
    impl<'a> Prompt for &'a Scripted {
        async fn ask(&self, question: &str) -> Result<String> {
            self.asked.borrow_mut().push(question.to_string());
            Ok(self.answer.clone())
        }
    }

    #[test]
    fn missing_file_is_undetermined() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = Scripted::new("y");
        let consent = ConsentFile::new(dir.path().join("consent.json"), &prompt);

        assert_eq!(consent.status(), PermissionStatus::Undetermined);
    }

    #[test]
    fn garbage_file_is_undetermined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consent.json");
        std::fs::write(&path, "not json").unwrap();
        let prompt = Scripted::new("y");

        assert_eq!(
            ConsentFile::new(path, &prompt).status(),
            PermissionStatus::Undetermined
        );
    }

    #[tokio::test]
    async fn request_asks_once_and_persists_grant() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("consent.json");
        let prompt = Scripted::new(" Yes\n");
        let consent = ConsentFile::new(path.clone(), &prompt);

        assert!(consent.request().await.unwrap());
        assert_eq!(consent.status(), PermissionStatus::Granted);
        assert_eq!(prompt.asked.borrow().as_slice(), [ConsentFile::<&Scripted>::QUESTION]);

        let stored = std::fs::read_to_string(&path).unwrap();
        assert!(stored.contains("\"granted\""));
    }

    #[tokio::test]
    async fn anything_but_yes_is_a_denial() {
        let dir = tempfile::tempdir().unwrap();
        let prompt = Scripted::new("");
        let consent = ConsentFile::new(dir.path().join("consent.json"), &prompt);

        assert!(!consent.request().await.unwrap());
        assert_eq!(consent.status(), PermissionStatus::Denied);
    }

    #[tokio::test]
    async fn reset_returns_to_undetermined() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("consent.json");
        let prompt = Scripted::new("n");
        let consent = ConsentFile::new(path.clone(), &prompt);
        consent.request().await.unwrap();

        reset(&path).unwrap();
        assert_eq!(consent.status(), PermissionStatus::Undetermined);

        // Resetting twice is fine
        reset(&path).unwrap();
    }
}
