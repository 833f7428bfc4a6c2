//! Scripted secret source (testing only)

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::prompt::{PromptError, SecretReader, SecretValue};

#[derive(Debug, Clone)]
enum Scripted {
    Value(String),
    Cancel,
    Unavailable(String),
}

/// Answers secret prompts from a fixed script and records what was asked.
///
/// Names with no scripted answer behave like a closed terminal.
#[derive(Debug, Default)]
pub struct ScriptedSecretReader {
    answers: HashMap<String, Scripted>,
    prompted: Mutex<Vec<String>>,
}

impl ScriptedSecretReader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, name: &str, value: &str) -> Self {
        self.answers
            .insert(name.to_string(), Scripted::Value(value.to_string()));
        self
    }

    /// Operator presses Ctrl+C at this prompt.
    pub fn with_cancel(mut self, name: &str) -> Self {
        self.answers.insert(name.to_string(), Scripted::Cancel);
        self
    }

    pub fn with_unavailable(mut self, name: &str, detail: &str) -> Self {
        self.answers
            .insert(name.to_string(), Scripted::Unavailable(detail.to_string()));
        self
    }

    /// Names prompted for, in order.
    pub fn prompted(&self) -> Vec<String> {
        self.prompted.lock().unwrap().clone()
    }
}

#[async_trait]
impl SecretReader for ScriptedSecretReader {
    async fn read_secret(&self, name: &str) -> Result<SecretValue, PromptError> {
        self.prompted.lock().unwrap().push(name.to_string());
        match self.answers.get(name) {
            Some(Scripted::Value(v)) => Ok(SecretValue::new(v.clone())),
            Some(Scripted::Cancel) => Err(PromptError::Cancelled),
            Some(Scripted::Unavailable(detail)) => Err(PromptError::Unavailable(detail.clone())),
            None => Err(PromptError::Unavailable(format!("no scripted value for {name}"))),
        }
    }
}
