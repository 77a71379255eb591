use crate::llm::Provider;
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Http,
    Stream,
    Decode,
    Empty,
}

impl Stage {
    pub fn as_str(self) -> &'static str {
        match self {
            Stage::Http => "http",
            Stage::Stream => "stream",
            Stage::Decode => "decode",
            Stage::Empty => "empty",
        }
    }
}

/// Transport failure with enough context to diagnose it after the fact.
/// Callers recover it with `anyhow::Error::downcast_ref`.
#[derive(Debug, Clone)]
pub struct LlmDiagnosticsError {
    pub provider: Provider,
    pub stage: Stage,
    pub detail: String,
    pub raw_output: Option<String>,
    pub raw_response_json: Option<Value>,
}

impl LlmDiagnosticsError {
    pub fn new(provider: Provider, stage: Stage, detail: impl Into<String>) -> Self {
        Self {
            provider,
            stage,
            detail: detail.into(),
            raw_output: None,
            raw_response_json: None,
        }
    }

    /// Attaches the raw body; when it is JSON it is also kept in parsed form.
    pub fn with_raw_output(mut self, raw: impl Into<String>) -> Self {
        let raw = raw.into();
        self.raw_response_json = serde_json::from_str::<Value>(&raw).ok();
        self.raw_output = Some(raw);
        self
    }
}

impl fmt::Display for LlmDiagnosticsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "generation failed (provider={:?}, stage={}): {}",
            self.provider,
            self.stage.as_str(),
            self.detail
        )
    }
}

impl std::error::Error for LlmDiagnosticsError {}
