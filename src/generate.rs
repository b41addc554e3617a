//! Text-generation boundary: prompt in, structured JSON out, or failure.
//!
//! Two implementations:
//! - `SubprocessGenerator`: pipes the prompt to a configured external
//!   command and reads stdout (production)
//! - `MockGenerator`: returns preconfigured responses (testing)
//!
//! The engine is responsible for validating whatever comes back:
//! `extract_json` strips code fences and surrounding prose before parsing.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::process::Stdio;
use std::sync::Mutex;
use thiserror::Error;
use tokio::io::AsyncWriteExt;

/// Errors from text-generation calls.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("generator not available: {0}")]
    Unavailable(String),

    #[error("generation failed: {0}")]
    Failed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Black-box generation function: text in, text (expected JSON) out.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError>;
}

/// Production generator: spawns a configured command, writes the prompt to
/// its stdin, returns its stdout.
pub struct SubprocessGenerator {
    command: String,
    args: Vec<String>,
}

impl SubprocessGenerator {
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
        }
    }

    /// Parse a full command line ("llm -m sonnet") into command + args.
    pub fn from_command_line(line: &str) -> Result<Self, GenerateError> {
        let mut parts = line.split_whitespace();
        let command = parts
            .next()
            .ok_or_else(|| GenerateError::Unavailable("empty generator command".to_string()))?;
        Ok(Self::new(command, parts.map(|s| s.to_string()).collect()))
    }
}

#[async_trait]
impl TextGenerator for SubprocessGenerator {
    async fn generate(&self, prompt: &str) -> Result<String, GenerateError> {
        let mut child = tokio::process::Command::new(&self.command)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GenerateError::Unavailable(format!("{}: {}", self.command, e)))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin.write_all(prompt.as_bytes()).await?;
            // Close stdin so the child sees EOF.
        }

        let output = child.wait_with_output().await?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GenerateError::Failed(format!(
                "{} exited with {}: {}",
                self.command,
                output.status,
                stderr.trim()
            )));
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Mock generator for tests: returns queued responses in order.
pub struct MockGenerator {
    responses: Mutex<VecDeque<Result<String, String>>>,
}

impl MockGenerator {
    pub fn new() -> Self {
        Self {
            responses: Mutex::new(VecDeque::new()),
        }
    }

    /// Queue a successful response.
    pub fn with_response(self, response: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(response.into()));
        self
    }

    /// Queue a failure.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.responses
            .lock()
            .unwrap()
            .push_back(Err(message.into()));
        self
    }
}

impl Default for MockGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TextGenerator for MockGenerator {
    async fn generate(&self, _prompt: &str) -> Result<String, GenerateError> {
        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(response)) => Ok(response),
            Some(Err(message)) => Err(GenerateError::Failed(message)),
            None => Err(GenerateError::Unavailable(
                "mock generator has no queued responses".to_string(),
            )),
        }
    }
}

/// Extract a JSON object from model output.
///
/// Models sometimes wrap JSON in markdown code fences or add explanation
/// text. Tries, in order:
/// 1. direct parse (output is pure JSON)
/// 2. extract from a ```json ... ``` or ``` ... ``` fenced block
/// 3. the first `{` to last `}` span
pub fn extract_json(text: &str) -> Option<serde_json::Value> {
    let trimmed = text.trim();

    if let Ok(v) = serde_json::from_str::<serde_json::Value>(trimmed) {
        if v.is_object() {
            return Some(v);
        }
    }

    let fenced = if let Some(start) = trimmed.find("```json") {
        let after = &trimmed[start + 7..];
        after.find("```").map(|end| &after[..end])
    } else if let Some(start) = trimmed.find("```") {
        let after = &trimmed[start + 3..];
        after.find("```").map(|end| &after[..end])
    } else {
        None
    };

    if let Some(block) = fenced {
        if let Ok(v) = serde_json::from_str::<serde_json::Value>(block.trim()) {
            if v.is_object() {
                return Some(v);
            }
        }
    }

    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(v) = serde_json::from_str::<serde_json::Value>(&trimmed[start..=end]) {
                if v.is_object() {
                    return Some(v);
                }
            }
        }
    }

    None
}
