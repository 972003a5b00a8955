//! Terminal input for the client.
//!
//! The line editor runs on its own blocking thread. Besides submitted lines it
//! reports every change of the edit buffer, which stands in for keystroke
//! events, and a blur when the buffer is emptied or the editor is left.

use std::{
    cell::RefCell,
    io::Write,
    sync::{Arc, Mutex},
};

use rustyline::{
    Context, Editor, Helper, completion::Completer, error::ReadlineError, highlight::Highlighter,
    hint::Hinter, history::DefaultHistory, validate::Validator,
};
use tokio::sync::mpsc;

/// Events produced by the line editor thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputEvent {
    /// A submitted line
    Line(String),
    /// The edit buffer changed
    Keystroke(String),
    /// Focus left the compose buffer
    Blur,
}

/// Prompt shared between the event loop and the editor thread
pub type SharedPrompt = Arc<Mutex<String>>;

/// Redisplay the prompt after printing output
pub fn redisplay_prompt(prompt: &SharedPrompt) {
    if let Ok(prompt) = prompt.lock() {
        print!("{}", prompt);
    }
    std::io::stdout().flush().ok();
}

/// Replace the prompt used for the next line
pub fn set_prompt(prompt: &SharedPrompt, text: String) {
    if let Ok(mut prompt) = prompt.lock() {
        *prompt = text;
    }
}

/// Editor helper that turns buffer refreshes into keystroke events
struct KeystrokeHelper {
    input_tx: mpsc::UnboundedSender<InputEvent>,
    last_buffer: RefCell<String>,
}

impl KeystrokeHelper {
    fn new(input_tx: mpsc::UnboundedSender<InputEvent>) -> Self {
        Self {
            input_tx,
            last_buffer: RefCell::new(String::new()),
        }
    }

    fn observe(&self, line: &str) {
        let mut last = self.last_buffer.borrow_mut();
        if *last == line {
            return;
        }
        let event = if line.is_empty() {
            InputEvent::Blur
        } else {
            InputEvent::Keystroke(line.to_string())
        };
        *last = line.to_string();
        self.input_tx.send(event).ok();
    }

    fn reset(&self) {
        self.last_buffer.borrow_mut().clear();
    }
}

impl Completer for KeystrokeHelper {
    type Candidate = String;
}

impl Hinter for KeystrokeHelper {
    type Hint = String;

    fn hint(&self, line: &str, _pos: usize, _ctx: &Context<'_>) -> Option<String> {
        self.observe(line);
        None
    }
}

impl Highlighter for KeystrokeHelper {}

impl Validator for KeystrokeHelper {}

impl Helper for KeystrokeHelper {}

/// Spawn the blocking line editor thread.
///
/// The thread ends, dropping `input_tx`, on Ctrl+C, Ctrl+D, or when the
/// receiving side is gone.
pub fn spawn_line_editor(
    prompt: SharedPrompt,
    input_tx: mpsc::UnboundedSender<InputEvent>,
) -> std::thread::JoinHandle<()> {
    std::thread::spawn(move || {
        let mut rl = match Editor::<KeystrokeHelper, DefaultHistory>::new() {
            Ok(rl) => rl,
            Err(e) => {
                eprintln!("Failed to initialize readline: {}", e);
                return;
            }
        };
        rl.set_helper(Some(KeystrokeHelper::new(input_tx.clone())));

        loop {
            let current_prompt = prompt.lock().map(|p| p.clone()).unwrap_or_default();
            let result = rl.readline(&current_prompt);
            if let Some(helper) = rl.helper() {
                helper.reset();
            }

            match result {
                Ok(line) => {
                    let line = line.trim().to_string();
                    if !line.is_empty() {
                        rl.add_history_entry(line.as_str()).ok();
                    }
                    if input_tx.send(InputEvent::Line(line)).is_err() {
                        break;
                    }
                }
                Err(ReadlineError::Interrupted) => {
                    tracing::info!("Interrupted");
                    input_tx.send(InputEvent::Blur).ok();
                    break;
                }
                Err(ReadlineError::Eof) => {
                    tracing::info!("EOF");
                    input_tx.send(InputEvent::Blur).ok();
                    break;
                }
                Err(err) => {
                    tracing::error!("Readline error: {}", err);
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buffer_changes_become_keystrokes() {
        // テスト項目: 入力バッファの変化がキーストロークとして通知される
        // given (前提条件):
        let (tx, mut rx) = mpsc::unbounded_channel();
        let helper = KeystrokeHelper::new(tx);

        // when (操作):
        helper.observe("h");
        helper.observe("h");
        helper.observe("hi");

        // then (期待する結果):
        assert_eq!(rx.try_recv().unwrap(), InputEvent::Keystroke("h".to_string()));
        assert_eq!(rx.try_recv().unwrap(), InputEvent::Keystroke("hi".to_string()));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_emptied_buffer_becomes_blur() {
        // テスト項目: 入力バッファが空になるとブラーとして通知される
        // given (前提条件):
        let (tx, mut rx) = mpsc::unbounded_channel();
        let helper = KeystrokeHelper::new(tx);
        helper.observe("x");

        // when (操作):
        helper.observe("");

        // then (期待する結果):
        assert_eq!(rx.try_recv().unwrap(), InputEvent::Keystroke("x".to_string()));
        assert_eq!(rx.try_recv().unwrap(), InputEvent::Blur);
    }

    #[test]
    fn test_set_prompt_replaces_text() {
        // テスト項目: プロンプトが差し替えられる
        // given (前提条件):
        let prompt: SharedPrompt = Arc::new(Mutex::new("Username: ".to_string()));

        // when (操作):
        set_prompt(&prompt, "alice> ".to_string());

        // then (期待する結果):
        assert_eq!(*prompt.lock().unwrap(), "alice> ");
    }
}
