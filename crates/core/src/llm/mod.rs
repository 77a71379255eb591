pub mod error;
pub mod gemini;
pub mod json;
pub mod prompt;

use crate::domain::record::Source;
use futures::stream::BoxStream;

#[derive(Debug, Clone)]
pub enum Provider {
    Gemini,
}

/// One generation call: instructions, prompt, and sampling knobs.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerateRequest {
    pub system: String,
    pub prompt: String,
    /// Let the model ground its answer with web search.
    pub grounded: bool,
    pub temperature: f32,
    /// `Some(0)` disables thinking for faster first tokens.
    pub thinking_budget: Option<u32>,
}

/// One chunk of a streaming call: its text fragment and its grounding batch.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StreamChunk {
    pub text: Option<String>,
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerateOutput {
    pub text: String,
    pub sources: Vec<Source>,
}

pub type ChunkStream = BoxStream<'static, anyhow::Result<StreamChunk>>;

#[async_trait::async_trait]
pub trait GenerationClient: Send + Sync {
    fn provider(&self) -> Provider;

    async fn stream_generate(&self, request: GenerateRequest) -> anyhow::Result<ChunkStream>;

    async fn generate(&self, request: GenerateRequest) -> anyhow::Result<GenerateOutput>;
}
