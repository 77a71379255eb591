use crate::domain::record::Category;
use crate::llm::StreamChunk;
use crate::screening::ScreeningEvent;
use crate::stream::{classify, Reassembler, ScanMode};
use futures::{Stream, StreamExt};

/// Runs one category's transport stream through the reassembler and classifier.
///
/// Yields records in the order their closing braces arrive, grounding batches as the
/// transport reports them, and ends with exactly one `Completed` or `Failed`. Records
/// already yielded stay valid when the transport later fails.
pub fn pipeline_events<S>(
    category: Category,
    chunks: S,
    mode: ScanMode,
) -> impl Stream<Item = ScreeningEvent> + Send
where
    S: Stream<Item = anyhow::Result<StreamChunk>> + Send + 'static,
{
    async_stream::stream! {
        let mut chunks = Box::pin(chunks);
        let mut reassembler = Reassembler::new(mode);
        let mut records = 0usize;

        while let Some(chunk) = chunks.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(error) => {
                    tracing::warn!(%category, records, error = %error, "screening stream failed");
                    yield ScreeningEvent::Failed { category, error };
                    return;
                }
            };

            if !chunk.sources.is_empty() {
                yield ScreeningEvent::Citations { category, batch: chunk.sources };
            }

            let Some(text) = chunk.text else {
                continue;
            };
            tracing::debug!(%category, len = text.len(), "fragment");
            for span in reassembler.push(&text) {
                if let Some(record) = classify(&span) {
                    records += 1;
                    yield ScreeningEvent::Record { category, record };
                }
            }
        }

        if let Some(tail) = reassembler.finish() {
            tracing::warn!(%category, len = tail.len(), tail = %tail, "stream ended inside an unterminated object");
        }
        tracing::info!(%category, records, "screening stream completed");
        yield ScreeningEvent::Completed { category };
    }
}
