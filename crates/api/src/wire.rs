use axum::http::StatusCode;
use futures::{Stream, StreamExt};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use twscreen_core::domain::record::{Category, Source, StockRecord, StreamedRecord};
use twscreen_core::llm::prompt::ScreeningCriteria;
use twscreen_core::screening::ScreeningEvent;
use twscreen_core::sources::merge_and_rank;

const DEFAULT_COUNT: usize = 5;
const LOOSEN_COUNT: usize = 3;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenBody {
    #[serde(default = "default_count")]
    pub count: usize,
    #[serde(default)]
    pub criteria: ScreeningCriteria,
}

impl Default for ScreenBody {
    fn default() -> Self {
        Self {
            count: DEFAULT_COUNT,
            criteria: ScreeningCriteria::default(),
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpBody {
    #[serde(default)]
    pub criteria: ScreeningCriteria,
    /// Tickers the caller already shows for this category.
    #[serde(default)]
    pub exclude: Vec<String>,
    pub count: Option<usize>,
    #[serde(default)]
    pub loosen: bool,
}

impl FollowUpBody {
    pub fn count(&self) -> usize {
        self.count
            .unwrap_or(if self.loosen { LOOSEN_COUNT } else { DEFAULT_COUNT })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocateBody {
    pub total_amount: f64,
    #[serde(default = "default_ratio")]
    pub ratio: u8,
    #[serde(default)]
    pub long_term: Vec<StockRecord>,
    #[serde(default)]
    pub swing_trade: Vec<StockRecord>,
}

/// An empty body means "all defaults"; anything else must be valid JSON.
pub fn optional_body<T: DeserializeOwned + Default>(body: &[u8]) -> Result<T, StatusCode> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|err| {
        tracing::warn!(error = %err, "rejecting malformed request body");
        StatusCode::BAD_REQUEST
    })
}

fn default_count() -> usize {
    DEFAULT_COUNT
}

fn default_ratio() -> u8 {
    50
}

/// One NDJSON line of a screening response.
#[derive(Debug, Serialize)]
#[serde(tag = "event", rename_all = "camelCase")]
pub enum WireEvent {
    Stock {
        category: Category,
        stock: StockRecord,
    },
    Summary {
        category: Category,
        message: String,
    },
    /// The full ranked citation list after merging the latest batch.
    Sources {
        sources: Vec<Source>,
    },
    Completed {
        category: Category,
    },
    Failed {
        category: Category,
        error: String,
    },
}

/// Turns screening events into wire lines, keeping the running citation list of the response.
#[derive(Debug, Default)]
pub struct WireEvents {
    sources: Vec<Source>,
}

impl WireEvents {
    pub fn translate(&mut self, event: ScreeningEvent) -> WireEvent {
        match event {
            ScreeningEvent::Record {
                category,
                record: StreamedRecord::Stock(stock),
            } => WireEvent::Stock { category, stock },
            ScreeningEvent::Record {
                category,
                record: StreamedRecord::Summary(summary),
            } => WireEvent::Summary {
                category,
                message: summary.message,
            },
            ScreeningEvent::Citations { batch, .. } => {
                self.sources = merge_and_rank(&self.sources, &batch);
                WireEvent::Sources {
                    sources: self.sources.clone(),
                }
            }
            ScreeningEvent::Completed { category } => {
                tracing::info!(%category, "screening response category completed");
                WireEvent::Completed { category }
            }
            ScreeningEvent::Failed { category, error } => {
                sentry_anyhow::capture_anyhow(&error);
                tracing::error!(%category, error = %format!("{error:#}"), "screening response category failed");
                WireEvent::Failed {
                    category,
                    error: format!("{error:#}"),
                }
            }
        }
    }

    pub fn lines<S>(
        mut self,
        events: S,
    ) -> impl Stream<Item = Result<String, serde_json::Error>> + Send + 'static
    where
        S: Stream<Item = ScreeningEvent> + Send + 'static,
    {
        events.map(move |event| -> Result<String, serde_json::Error> {
            let mut line = serde_json::to_string(&self.translate(event))?;
            line.push('\n');
            Ok(line)
        })
    }
}
