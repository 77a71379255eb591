use crate::domain::record::Category;
use crate::llm::prompt::{screening_request, ScreenParams, ScreeningCriteria};
use crate::llm::{GenerateRequest, GenerationClient};
use crate::screening::pipeline::pipeline_events;
use crate::screening::{ScreeningEvent, ScreeningSink};
use crate::stream::ScanMode;
use anyhow::Context;
use futures::stream::{self, BoxStream};
use futures::StreamExt;
use std::collections::BTreeMap;
use std::sync::Arc;

/// The two category requests of one screening run.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreeningPlan {
    pub long_term: GenerateRequest,
    pub swing_trade: GenerateRequest,
    pub scan_mode: ScanMode,
}

impl ScreeningPlan {
    pub fn new(criteria: &ScreeningCriteria, count: usize, scan_mode: ScanMode) -> Self {
        let request = |category| {
            screening_request(&ScreenParams {
                category,
                criteria,
                exclude_tickers: &[],
                count,
                loosen: false,
            })
        };
        Self {
            long_term: request(Category::LongTerm),
            swing_trade: request(Category::SwingTrade),
            scan_mode,
        }
    }
}

/// Per-category result of a run. A failed category never hides the other's success.
#[derive(Debug, Default)]
pub struct ScreeningOutcome {
    outcomes: BTreeMap<Category, anyhow::Result<()>>,
}

impl ScreeningOutcome {
    pub fn get(&self, category: Category) -> Option<&anyhow::Result<()>> {
        self.outcomes.get(&category)
    }

    pub fn succeeded(&self, category: Category) -> bool {
        matches!(self.outcomes.get(&category), Some(Ok(())))
    }

    pub fn failures(&self) -> impl Iterator<Item = (Category, &anyhow::Error)> {
        self.outcomes
            .iter()
            .filter_map(|(c, r)| r.as_ref().err().map(|e| (*c, e)))
    }

    /// Joins the categories: the first failure (long-term first) becomes the error.
    pub fn into_result(self) -> anyhow::Result<()> {
        for (category, outcome) in self.outcomes {
            outcome.with_context(|| format!("{category} screening failed"))?;
        }
        Ok(())
    }
}

/// One category's pipeline, starting with the transport call.
pub fn category_events(
    client: Arc<dyn GenerationClient>,
    category: Category,
    request: GenerateRequest,
    mode: ScanMode,
) -> BoxStream<'static, ScreeningEvent> {
    async_stream::stream! {
        tracing::info!(%category, provider = ?client.provider(), "screening stream starting");
        match client.stream_generate(request).await {
            Ok(chunks) => {
                for await event in pipeline_events(category, chunks, mode) {
                    yield event;
                }
            }
            Err(error) => {
                tracing::warn!(%category, error = %error, "screening stream could not start");
                yield ScreeningEvent::Failed { category, error };
            }
        }
    }
    .boxed()
}

/// Both category pipelines merged on the current task. Events from one category keep their
/// order; the interleaving between categories is whatever the transports produce.
pub fn screening_events(
    client: Arc<dyn GenerationClient>,
    plan: ScreeningPlan,
) -> BoxStream<'static, ScreeningEvent> {
    let long_term = category_events(
        client.clone(),
        Category::LongTerm,
        plan.long_term,
        plan.scan_mode,
    );
    let swing_trade = category_events(client, Category::SwingTrade, plan.swing_trade, plan.scan_mode);
    stream::select(long_term, swing_trade).boxed()
}

/// Runs both categories to completion, feeding `sink` as records and grounding batches
/// arrive. Waits for both pipelines even when one fails.
pub async fn run_screening<S>(
    client: Arc<dyn GenerationClient>,
    plan: ScreeningPlan,
    sink: &mut S,
) -> ScreeningOutcome
where
    S: ScreeningSink + ?Sized,
{
    drive(screening_events(client, plan), sink, &Category::ALL).await
}

/// Runs a single category, e.g. a "load more" or "loosen criteria" follow-up.
pub async fn run_category<S>(
    client: Arc<dyn GenerationClient>,
    category: Category,
    request: GenerateRequest,
    mode: ScanMode,
    sink: &mut S,
) -> anyhow::Result<()>
where
    S: ScreeningSink + ?Sized,
{
    drive(category_events(client, category, request, mode), sink, &[category])
        .await
        .into_result()
}

async fn drive<S>(
    mut events: BoxStream<'static, ScreeningEvent>,
    sink: &mut S,
    expected: &[Category],
) -> ScreeningOutcome
where
    S: ScreeningSink + ?Sized,
{
    let mut outcome = ScreeningOutcome::default();
    while let Some(event) = events.next().await {
        match event {
            ScreeningEvent::Record { category, record } => sink.on_record(category, record),
            ScreeningEvent::Citations { category, batch } => sink.on_citations(category, batch),
            ScreeningEvent::Completed { category } => {
                outcome.outcomes.insert(category, Ok(()));
            }
            ScreeningEvent::Failed { category, error } => {
                outcome.outcomes.insert(category, Err(error));
            }
        }
    }

    for category in expected {
        outcome
            .outcomes
            .entry(*category)
            .or_insert_with(|| Err(anyhow::anyhow!("pipeline ended without reporting an outcome")));
    }
    outcome
}
