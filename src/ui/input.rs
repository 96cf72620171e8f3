use crate::messages::UiEvent;
use crate::permission::Prompt;
use anyhow::{Context, Result};
use async_trait::async_trait;
use colored::Colorize;
use std::cell::RefCell;
use std::rc::Rc;
use tokio::sync::{mpsc, oneshot};

/// Hands the next input line to a waiting question instead of the command parser
#[derive(Clone, Default)]
pub struct PromptBroker {
    pending: Rc<RefCell<Option<oneshot::Sender<String>>>>,
}

impl PromptBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Deliver `line` to the pending question, or give it back if nobody asked
    pub fn answer(&self, line: String) -> Option<String> {
        match self.pending.borrow_mut().take() {
            Some(reply) => {
                let _ = reply.send(line);
                None
            }
            None => Some(line),
        }
    }

    /// Fail the pending question (input is gone)
    pub fn close(&self) {
        self.pending.borrow_mut().take();
    }
}

#[async_trait(?Send)]
impl Prompt for PromptBroker {
    async fn ask(&self, question: &str) -> Result<String> {
        let (reply, rx) = oneshot::channel();
        *self.pending.borrow_mut() = Some(reply);

        println!();
        println!("{}", question.yellow());

        rx.await
            .context("Input closed before the question was answered")
    }
}

/// Map one input line to a UI event
pub fn parse_command(line: &str) -> Option<UiEvent> {
    match line.trim().to_lowercase().as_str() {
        "r" | "record" => Some(UiEvent::RecordPressed),
        "p" | "play" => Some(UiEvent::PlayPressed),
        "q" | "quit" => Some(UiEvent::Quit),
        "" => Some(UiEvent::Acknowledge),
        _ => None,
    }
}

/// Read stdin on a plain thread so a pending read never holds up runtime shutdown
pub fn spawn_stdin_reader() -> mpsc::Receiver<String> {
    let (tx, rx) = mpsc::channel(16);

    std::thread::spawn(move || {
        for line in std::io::stdin().lines() {
            match line {
                Ok(line) => {
                    if tx.blocking_send(line).is_err() {
                        break;
                    }
                }
                Err(e) => {
                    tracing::error!("Failed to read stdin: {}", e);
                    break;
                }
            }
        }
    });

    rx
}

/// Route input lines to pending questions or the controller
///
/// Quit wins over a pending question; closed input counts as Quit too.
pub async fn read_input(
    mut lines: mpsc::Receiver<String>,
    tx: mpsc::Sender<UiEvent>,
    prompts: PromptBroker,
) {
    while let Some(line) = lines.recv().await {
        let command = parse_command(&line);
        if command == Some(UiEvent::Quit) {
            break;
        }

        let Some(line) = prompts.answer(line) else {
            continue;
        };

        match command {
            Some(event) => {
                if tx.send(event).await.is_err() {
                    return;
                }
            }
            None => tracing::debug!("Ignoring unknown command: {:?}", line),
        }
    }

    prompts.close();
    let _ = tx.send(UiEvent::Quit).await;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_commands() {
        assert_eq!(parse_command("r"), Some(UiEvent::RecordPressed));
        assert_eq!(parse_command(" Record "), Some(UiEvent::RecordPressed));
        assert_eq!(parse_command("p"), Some(UiEvent::PlayPressed));
        assert_eq!(parse_command("q"), Some(UiEvent::Quit));
        assert_eq!(parse_command(""), Some(UiEvent::Acknowledge));
        assert_eq!(parse_command("x"), None);
    }

    #[tokio::test]
    async fn pending_question_takes_the_next_line() {
        let broker = PromptBroker::new();
        assert_eq!(broker.answer("r".to_string()), Some("r".to_string()));

        let asking = broker.clone();
        let local = tokio::task::LocalSet::new();
        let answer = local
            .run_until(async move {
                let question = tokio::task::spawn_local(async move { asking.ask("ok?").await });
                while broker.pending.borrow().is_none() {
                    tokio::task::yield_now().await;
                }

                assert_eq!(broker.answer("y".to_string()), None);
                question.await.unwrap().unwrap()
            })
            .await;

        assert_eq!(answer, "y");
    }

    #[tokio::test]
    async fn closing_fails_the_question() {
        let broker = PromptBroker::new();
        let asking = broker.clone();
        let local = tokio::task::LocalSet::new();

        let result = local
            .run_until(async move {
                let question = tokio::task::spawn_local(async move { asking.ask("ok?").await });
                while broker.pending.borrow().is_none() {
                    tokio::task::yield_now().await;
                }
                broker.close();
                question.await.unwrap()
            })
            .await;

        assert!(result.is_err());
    }

    #[tokio::test]
    async fn routes_lines_and_quits_on_close() {
        let (lines_tx, lines_rx) = mpsc::channel(8);
        let (tx, mut rx) = mpsc::channel(8);

        for line in ["r", "nonsense", "", "p"] {
            lines_tx.send(line.to_string()).await.unwrap();
        }
        drop(lines_tx);

        read_input(lines_rx, tx, PromptBroker::new()).await;

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        assert_eq!(
            events,
            [
                UiEvent::RecordPressed,
                UiEvent::Acknowledge,
                UiEvent::PlayPressed,
                UiEvent::Quit
            ]
        );
    }

    #[tokio::test]
    async fn quit_is_not_taken_as_an_answer() {
        let broker = PromptBroker::new();
        let asking = broker.clone();
        let (lines_tx, lines_rx) = mpsc::channel(8);
        let (tx, mut rx) = mpsc::channel(8);
        let local = tokio::task::LocalSet::new();

        let answer = local
            .run_until(async move {
                let question = tokio::task::spawn_local(async move { asking.ask("ok?").await });
                while broker.pending.borrow().is_none() {
                    tokio::task::yield_now().await;
                }

                lines_tx.send("q".to_string()).await.unwrap();
                lines_tx.send("y".to_string()).await.unwrap();
                read_input(lines_rx, tx, broker).await;
                question.await.unwrap()
            })
            .await;

        // The question is abandoned rather than answered with "q"
        assert!(answer.is_err());
        assert_eq!(rx.recv().await, Some(UiEvent::Quit));
        assert_eq!(rx.recv().await, None);
    }
}
