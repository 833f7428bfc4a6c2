//! Secret capture from the terminal.
//!
//! `SecretCapture` is the state machine (`Idle → Reading → Submitted |
//! Cancelled`). `capture_secret` drives it from a [`Terminal`], holding raw
//! mode through a [`RawModeGuard`] for exactly as long as the machine is
//! `Reading`. The guard restores the previous mode on drop, so every exit
//! path (submit, cancel, read error, panic) leaves the terminal usable.
//! Typed characters are never echoed.

use std::io::Write;

use async_trait::async_trait;
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// A captured secret. `Debug` never shows the value.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(String);

impl SecretValue {
    pub fn new(value: impl Into<String>) -> Self {
        SecretValue(value.into())
    }

    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Empty or whitespace-only values are never submitted.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretValue(***)")
    }
}

/// Why no value was captured.
#[derive(Debug, thiserror::Error)]
pub enum PromptError {
    #[error("input cancelled by user")]
    Cancelled,

    #[error("terminal error: {0}")]
    Io(#[from] std::io::Error),

    #[error("secret input unavailable: {0}")]
    Unavailable(String),
}

/// A single keystroke as the state machine sees it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyInput {
    Char(char),
    Backspace,
    Enter,
    /// End of input (Ctrl-D); submits like Enter.
    Eof,
    /// Ctrl-C.
    Interrupt,
    Ignored,
}

impl KeyInput {
    /// Classify a raw character as delivered by an unbuffered terminal.
    pub fn from_char(c: char) -> Self {
        match c {
            '\r' | '\n' => KeyInput::Enter,
            '\u{3}' => KeyInput::Interrupt,
            '\u{4}' => KeyInput::Eof,
            '\u{7f}' | '\u{8}' => KeyInput::Backspace,
            c if c.is_control() => KeyInput::Ignored,
            c => KeyInput::Char(c),
        }
    }
}

/// States of the capture machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptState {
    Idle,
    Reading,
    Submitted,
    Cancelled,
}

/// Accumulates keystrokes into a secret value.
#[derive(Debug)]
pub struct SecretCapture {
    state: PromptState,
    buffer: String,
}

impl Default for SecretCapture {
    fn default() -> Self {
        Self::new()
    }
}

impl SecretCapture {
    pub fn new() -> Self {
        SecretCapture {
            state: PromptState::Idle,
            buffer: String::new(),
        }
    }

    pub fn state(&self) -> PromptState {
        self.state
    }

    /// `Idle → Reading`.
    pub fn begin(&mut self) {
        if self.state == PromptState::Idle {
            self.state = PromptState::Reading;
        }
    }

    /// Apply one keystroke; keystrokes outside `Reading` are dropped.
    pub fn feed(&mut self, key: KeyInput) -> PromptState {
        if self.state != PromptState::Reading {
            return self.state;
        }
        match key {
            KeyInput::Char(c) => self.buffer.push(c),
            KeyInput::Backspace => {
                self.buffer.pop();
            }
            KeyInput::Enter | KeyInput::Eof => self.state = PromptState::Submitted,
            KeyInput::Interrupt => {
                self.buffer.clear();
                self.state = PromptState::Cancelled;
            }
            KeyInput::Ignored => {}
        }
        self.state
    }

    /// Resolve a finished capture.
    pub fn finish(self) -> Result<SecretValue, PromptError> {
        match self.state {
            PromptState::Submitted => Ok(SecretValue(self.buffer)),
            PromptState::Cancelled => Err(PromptError::Cancelled),
            PromptState::Idle | PromptState::Reading => Err(PromptError::Unavailable(
                "capture ended before a value was submitted".to_string(),
            )),
        }
    }
}

/// A terminal that can switch into unbuffered, no-echo mode.
pub trait Terminal {
    fn is_raw_mode_enabled(&self) -> std::io::Result<bool>;
    fn enable_raw_mode(&mut self) -> std::io::Result<()>;
    fn disable_raw_mode(&mut self) -> std::io::Result<()>;
    /// Block until the next keystroke.
    fn read_key(&mut self) -> std::io::Result<KeyInput>;
}

/// Holds raw mode for its lifetime, then puts back the mode it found.
pub struct RawModeGuard<'t, T: Terminal + ?Sized> {
    terminal: &'t mut T,
    was_raw: bool,
}

impl<'t, T: Terminal + ?Sized> RawModeGuard<'t, T> {
    pub fn acquire(terminal: &'t mut T) -> std::io::Result<Self> {
        let was_raw = terminal.is_raw_mode_enabled()?;
        if !was_raw {
            terminal.enable_raw_mode()?;
        }
        Ok(RawModeGuard { terminal, was_raw })
    }

    pub fn read_key(&mut self) -> std::io::Result<KeyInput> {
        self.terminal.read_key()
    }
}

impl<T: Terminal + ?Sized> Drop for RawModeGuard<'_, T> {
    fn drop(&mut self) {
        if self.was_raw {
            return;
        }
        if let Err(e) = self.terminal.disable_raw_mode() {
            tracing::warn!(event = "prompt.restore_failed", error = %e);
        }
    }
}

/// Run one capture on `terminal`.
pub fn capture_secret<T: Terminal + ?Sized>(terminal: &mut T) -> Result<SecretValue, PromptError> {
    let mut capture = SecretCapture::new();
    {
        let mut guard = RawModeGuard::acquire(terminal)?;
        capture.begin();
        while capture.state() == PromptState::Reading {
            let key = guard.read_key()?;
            capture.feed(key);
        }
    }
    capture.finish()
}

/// The process's controlling terminal, via crossterm.
#[derive(Debug, Default)]
pub struct CrosstermTerminal;

/// Map a crossterm key event onto the capture alphabet.
///
/// In raw mode crossterm reports LF and CR as Ctrl+J and Ctrl+M. Other
/// control chords never become secret characters.
pub fn key_input_from_event(key: KeyEvent) -> KeyInput {
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        if let KeyCode::Char(c) = key.code {
            return match c.to_ascii_lowercase() {
                'c' => KeyInput::Interrupt,
                'd' => KeyInput::Eof,
                'h' => KeyInput::Backspace,
                'j' | 'm' => KeyInput::Enter,
                _ => KeyInput::Ignored,
            };
        }
    }
    match key.code {
        KeyCode::Enter => KeyInput::Enter,
        KeyCode::Backspace => KeyInput::Backspace,
        KeyCode::Char(c) => KeyInput::from_char(c),
        _ => KeyInput::Ignored,
    }
}

impl Terminal for CrosstermTerminal {
    fn is_raw_mode_enabled(&self) -> std::io::Result<bool> {
        crossterm::terminal::is_raw_mode_enabled()
    }

    fn enable_raw_mode(&mut self) -> std::io::Result<()> {
        crossterm::terminal::enable_raw_mode()
    }

    fn disable_raw_mode(&mut self) -> std::io::Result<()> {
        crossterm::terminal::disable_raw_mode()
    }

    fn read_key(&mut self) -> std::io::Result<KeyInput> {
        loop {
            if let Event::Key(key) = event::read()? {
                if key.kind != KeyEventKind::Release {
                    return Ok(key_input_from_event(key));
                }
            }
        }
    }
}

/// Source of secret values for the secrets step.
#[async_trait]
pub trait SecretReader: Send + Sync {
    async fn read_secret(&self, name: &str) -> Result<SecretValue, PromptError>;
}

/// Interactive prompt on the controlling terminal.
#[derive(Debug, Default)]
pub struct TerminalSecretPrompt;

#[async_trait]
impl SecretReader for TerminalSecretPrompt {
    async fn read_secret(&self, name: &str) -> Result<SecretValue, PromptError> {
        let mut stderr = std::io::stderr();
        write!(stderr, "Enter value for {name}: ")?;
        stderr.flush()?;

        let result = tokio::task::spawn_blocking(|| capture_secret(&mut CrosstermTerminal))
            .await
            .map_err(|e| PromptError::Unavailable(e.to_string()))?;

        // raw mode swallowed the newline
        writeln!(std::io::stderr())?;
        result
    }
}

/// Reads each secret from the environment variable of the same name.
#[derive(Debug, Default)]
pub struct EnvSecretReader;

#[async_trait]
impl SecretReader for EnvSecretReader {
    async fn read_secret(&self, name: &str) -> Result<SecretValue, PromptError> {
        std::env::var(name)
            .map(SecretValue)
            .map_err(|_| PromptError::Unavailable(format!("environment variable {name} is not set")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    /// Replays keystrokes and tracks the raw-mode flag.
    #[derive(Default)]
    struct ScriptedTerminal {
        keys: VecDeque<std::io::Result<KeyInput>>,
        raw: bool,
        transitions: Vec<bool>,
    }

    impl ScriptedTerminal {
        fn with_keys(keys: Vec<KeyInput>) -> Self {
            ScriptedTerminal {
                keys: keys.into_iter().map(Ok).collect(),
                ..Default::default()
            }
        }
    }

    impl Terminal for ScriptedTerminal {
        fn is_raw_mode_enabled(&self) -> std::io::Result<bool> {
            Ok(self.raw)
        }

        fn enable_raw_mode(&mut self) -> std::io::Result<()> {
            self.raw = true;
            self.transitions.push(true);
            Ok(())
        }

        fn disable_raw_mode(&mut self) -> std::io::Result<()> {
            self.raw = false;
            self.transitions.push(false);
            Ok(())
        }

        fn read_key(&mut self) -> std::io::Result<KeyInput> {
            assert!(self.raw, "keys must only be read in raw mode");
            self.keys.pop_front().unwrap_or_else(|| {
                Err(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "script exhausted",
                ))
            })
        }
    }

    #[test]
    fn backspace_edits_buffer() {
        let mut term = ScriptedTerminal::with_keys(vec![
            KeyInput::Char('a'),
            KeyInput::Char('b'),
            KeyInput::Backspace,
            KeyInput::Char('c'),
            KeyInput::Enter,
        ]);
        let value = capture_secret(&mut term).unwrap();
        assert_eq!(value.expose(), "ac");
        assert!(!term.raw);
        assert_eq!(term.transitions, vec![true, false]);
    }

    #[test]
    fn interrupt_cancels_and_restores_mode() {
        let mut term = ScriptedTerminal::with_keys(vec![
            KeyInput::Char('x'),
            KeyInput::Interrupt,
            KeyInput::Enter,
        ]);
        let err = capture_secret(&mut term).unwrap_err();
        assert!(matches!(err, PromptError::Cancelled));
        assert!(!term.raw);
        // the Enter after the interrupt was never consumed
        assert_eq!(term.keys.len(), 1);
    }

    #[test]
    fn read_error_restores_mode() {
        let mut term = ScriptedTerminal::with_keys(vec![KeyInput::Char('x')]);
        let err = capture_secret(&mut term).unwrap_err();
        assert!(matches!(err, PromptError::Io(_)));
        assert!(!term.raw);
    }

    #[test]
    fn terminal_already_raw_is_left_raw() {
        let mut term = ScriptedTerminal::with_keys(vec![KeyInput::Char('k'), KeyInput::Enter]);
        term.raw = true;
        assert_eq!(capture_secret(&mut term).unwrap().expose(), "k");
        assert!(term.raw);
        assert!(term.transitions.is_empty());
    }

    #[test]
    fn eof_submits_buffer() {
        let mut term = ScriptedTerminal::with_keys(vec![KeyInput::Char('z'), KeyInput::Eof]);
        assert_eq!(capture_secret(&mut term).unwrap().expose(), "z");
    }

    #[test]
    fn backspace_on_empty_buffer_is_noop() {
        let mut capture = SecretCapture::new();
        capture.begin();
        capture.feed(KeyInput::Backspace);
        capture.feed(KeyInput::Char('q'));
        assert_eq!(capture.feed(KeyInput::Enter), PromptState::Submitted);
        assert_eq!(capture.finish().unwrap().expose(), "q");
    }

    #[test]
    fn keys_before_begin_are_dropped() {
        let mut capture = SecretCapture::new();
        assert_eq!(capture.feed(KeyInput::Char('a')), PromptState::Idle);
        capture.begin();
        capture.feed(KeyInput::Enter);
        assert_eq!(capture.finish().unwrap().expose(), "");
    }

    #[test]
    fn unfinished_capture_is_unavailable() {
        let mut capture = SecretCapture::new();
        capture.begin();
        assert!(matches!(capture.finish(), Err(PromptError::Unavailable(_))));
    }

    #[test]
    fn raw_characters_are_classified() {
        assert_eq!(KeyInput::from_char('\r'), KeyInput::Enter);
        assert_eq!(KeyInput::from_char('\n'), KeyInput::Enter);
        assert_eq!(KeyInput::from_char('\u{3}'), KeyInput::Interrupt);
        assert_eq!(KeyInput::from_char('\u{4}'), KeyInput::Eof);
        assert_eq!(KeyInput::from_char('\u{7f}'), KeyInput::Backspace);
        assert_eq!(KeyInput::from_char('\u{1b}'), KeyInput::Ignored);
        assert_eq!(KeyInput::from_char('é'), KeyInput::Char('é'));
    }

    #[test]
    fn crossterm_events_are_mapped() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        let ctrl_d = KeyEvent::new(KeyCode::Char('d'), KeyModifiers::CONTROL);
        let enter = KeyEvent::new(KeyCode::Enter, KeyModifiers::NONE);
        let upper = KeyEvent::new(KeyCode::Char('K'), KeyModifiers::SHIFT);
        let arrow = KeyEvent::new(KeyCode::Left, KeyModifiers::NONE);
        assert_eq!(key_input_from_event(ctrl_c), KeyInput::Interrupt);
        assert_eq!(key_input_from_event(ctrl_d), KeyInput::Eof);
        assert_eq!(key_input_from_event(enter), KeyInput::Enter);
        assert_eq!(key_input_from_event(upper), KeyInput::Char('K'));
        assert_eq!(key_input_from_event(arrow), KeyInput::Ignored);
    }

    #[test]
    fn control_chords_never_reach_the_buffer() {
        let ctrl = |c| key_input_from_event(KeyEvent::new(KeyCode::Char(c), KeyModifiers::CONTROL));
        assert_eq!(ctrl('j'), KeyInput::Enter);
        assert_eq!(ctrl('m'), KeyInput::Enter);
        assert_eq!(ctrl('h'), KeyInput::Backspace);
        assert_eq!(ctrl('u'), KeyInput::Ignored);
        assert_eq!(ctrl('w'), KeyInput::Ignored);

        let mut capture = SecretCapture::new();
        capture.begin();
        let keys = [
            KeyEvent::new(KeyCode::Char('a'), KeyModifiers::NONE),
            KeyEvent::new(KeyCode::Char('u'), KeyModifiers::CONTROL),
            KeyEvent::new(KeyCode::Char('b'), KeyModifiers::NONE),
            KeyEvent::new(KeyCode::Char('j'), KeyModifiers::CONTROL),
        ];
        for key in keys {
            capture.feed(key_input_from_event(key));
        }
        assert_eq!(capture.state(), PromptState::Submitted);
        assert_eq!(capture.finish().unwrap().expose(), "ab");
    }

    #[test]
    fn secret_value_debug_is_redacted() {
        let value = SecretValue::new("hunter2");
        assert!(!format!("{value:?}").contains("hunter2"));
        assert!(SecretValue::new("  \t").is_blank());
    }

    #[tokio::test]
    async fn env_reader_reports_missing_variable() {
        let err = EnvSecretReader
            .read_secret("GOVSYNC_TEST_SURELY_UNSET_VARIABLE")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("GOVSYNC_TEST_SURELY_UNSET_VARIABLE"));
    }
}
