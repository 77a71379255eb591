use crate::config::Settings;
use crate::domain::record::Source;
use crate::llm::error::{LlmDiagnosticsError, Stage};
use crate::llm::{ChunkStream, GenerateOutput, GenerateRequest, GenerationClient, Provider, StreamChunk};
use anyhow::Context;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const DEFAULT_MODEL: &str = "gemini-2.5-flash";
const DEFAULT_TIMEOUT_SECS: u64 = 180;

#[derive(Debug, Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl GeminiClient {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_gemini_api_key()?.to_string();
        let base_url = settings
            .gemini_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());
        let model = settings
            .gemini_model
            .clone()
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
        let timeout_secs = settings.gemini_timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
            model,
        })
    }

    fn url(&self, method: &str) -> String {
        format!(
            "{}/v1beta/models/{}:{}",
            self.base_url.trim_end_matches('/'),
            self.model,
            method
        )
    }

    async fn send(
        &self,
        method: &str,
        query: &[(&str, &str)],
        request: &GenerateRequest,
    ) -> anyhow::Result<reqwest::Response> {
        let res = self
            .http
            .post(self.url(method))
            .header("x-goog-api-key", &self.api_key)
            .query(query)
            .json(&GenerateContentRequest::from(request))
            .send()
            .await
            .context("Gemini request failed")?;

        let status = res.status();
        if status.is_success() {
            return Ok(res);
        }

        let text = res.text().await.unwrap_or_default();
        Err(
            LlmDiagnosticsError::new(Provider::Gemini, Stage::Http, format!("status={status}"))
                .with_raw_output(text)
                .into(),
        )
    }
}

#[async_trait::async_trait]
impl GenerationClient for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn stream_generate(&self, request: GenerateRequest) -> anyhow::Result<ChunkStream> {
        let res = self
            .send("streamGenerateContent", &[("alt", "sse")], &request)
            .await?;
        let mut body = Box::pin(res.bytes_stream());

        let chunks = async_stream::stream! {
            let mut decoder = SseDecoder::default();
            while let Some(bytes) = body.next().await {
                let bytes = match bytes {
                    Ok(b) => b,
                    Err(err) => {
                        let diag = LlmDiagnosticsError::new(
                            Provider::Gemini,
                            Stage::Stream,
                            format!("stream interrupted: {err}"),
                        );
                        yield Err(anyhow::Error::new(diag));
                        return;
                    }
                };
                for payload in decoder.push(&bytes) {
                    let chunk = decode_chunk(&payload);
                    let failed = chunk.is_err();
                    yield chunk;
                    if failed {
                        return;
                    }
                }
            }
            if let Some(payload) = decoder.finish() {
                yield decode_chunk(&payload);
            }
        };

        Ok(chunks.boxed())
    }

    async fn generate(&self, request: GenerateRequest) -> anyhow::Result<GenerateOutput> {
        let res = self.send("generateContent", &[], &request).await?;
        let text = res
            .text()
            .await
            .context("failed to read Gemini response body")?;
        let chunk = decode_chunk(&text)?;

        let output = GenerateOutput {
            text: chunk.text.unwrap_or_default(),
            sources: chunk.sources,
        };
        if output.text.trim().is_empty() {
            return Err(LlmDiagnosticsError::new(
                Provider::Gemini,
                Stage::Empty,
                "model returned no text",
            )
            .with_raw_output(text)
            .into());
        }
        Ok(output)
    }
}

/// Decodes one `GenerateContentResponse` payload into its text and grounding batch.
fn decode_chunk(payload: &str) -> anyhow::Result<StreamChunk> {
    let parsed = serde_json::from_str::<GenerateContentResponse>(payload).map_err(|err| {
        LlmDiagnosticsError::new(Provider::Gemini, Stage::Decode, err.to_string())
            .with_raw_output(payload)
    })?;

    if let Some(error) = parsed.error {
        return Err(LlmDiagnosticsError::new(
            Provider::Gemini,
            Stage::Stream,
            format!("upstream error: {error}"),
        )
        .with_raw_output(payload)
        .into());
    }

    let Some(candidate) = parsed.candidates.into_iter().next() else {
        return Ok(StreamChunk::default());
    };

    let text: String = candidate
        .content
        .map(|c| c.parts)
        .unwrap_or_default()
        .into_iter()
        .filter(|p| !p.thought)
        .filter_map(|p| p.text)
        .collect();

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if reason != "STOP" {
            tracing::warn!(finish_reason = reason, "Gemini finished early");
        }
    }

    Ok(StreamChunk {
        text: (!text.is_empty()).then_some(text),
        sources: candidate
            .grounding_metadata
            .map(|g| g.grounding_chunks)
            .unwrap_or_default(),
    })
}

/// Server-sent event framing over a byte stream. Bytes are buffered until an event is
/// complete so multi-byte characters split across network reads decode intact.
#[derive(Debug, Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer
            .extend(bytes.iter().copied().filter(|b| *b != b'\r'));

        let mut payloads = Vec::new();
        while let Some(end) = self.buffer.windows(2).position(|w| w == b"\n\n") {
            let event: Vec<u8> = self.buffer.drain(..end + 2).collect();
            if let Some(data) = event_data(&event[..end]) {
                payloads.push(data);
            }
        }
        payloads
    }

    fn finish(self) -> Option<String> {
        event_data(&self.buffer)
    }
}

fn event_data(event: &[u8]) -> Option<String> {
    let text = String::from_utf8_lossy(event);
    let lines: Vec<&str> = text
        .lines()
        .filter_map(|l| l.strip_prefix("data:"))
        .map(|d| d.strip_prefix(' ').unwrap_or(d))
        .collect();
    if lines.is_empty() {
        return None;
    }
    Some(lines.join("\n"))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<RequestContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<RequestContent>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    tools: Vec<Tool>,
    generation_config: GenerationConfig,
}

impl From<&GenerateRequest> for GenerateContentRequest {
    fn from(req: &GenerateRequest) -> Self {
        let system_instruction = (!req.system.is_empty()).then(|| RequestContent {
            role: None,
            parts: vec![RequestPart {
                text: req.system.clone(),
            }],
        });
        let tools = if req.grounded {
            vec![Tool {
                google_search: GoogleSearch {},
            }]
        } else {
            Vec::new()
        };

        Self {
            contents: vec![RequestContent {
                role: Some("user"),
                parts: vec![RequestPart {
                    text: req.prompt.clone(),
                }],
            }],
            system_instruction,
            tools,
            generation_config: GenerationConfig {
                temperature: req.temperature,
                thinking_config: req
                    .thinking_budget
                    .map(|thinking_budget| ThinkingConfig { thinking_budget }),
            },
        }
    }
}

#[derive(Debug, Clone, Serialize)]
struct RequestContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<RequestPart>,
}

#[derive(Debug, Clone, Serialize)]
struct RequestPart {
    text: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct Tool {
    google_search: GoogleSearch,
}

#[derive(Debug, Clone, Serialize)]
struct GoogleSearch {}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    thinking_config: Option<ThinkingConfig>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
    #[serde(default)]
    error: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponseCandidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(default)]
    grounding_metadata: Option<GroundingMetadata>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GroundingMetadata {
    #[serde(default)]
    grounding_chunks: Vec<Source>,
}
