//! Dual-category screening: drives one extraction pipeline per category and reports what
//! each produces.

pub mod orchestrator;
pub mod pipeline;
pub mod results;

use crate::domain::record::{Category, Source, StreamedRecord};

pub use orchestrator::{run_category, run_screening, screening_events, ScreeningOutcome, ScreeningPlan};
pub use results::ScreeningResults;

/// Everything a screening pipeline reports, tagged with the category that produced it.
#[derive(Debug)]
pub enum ScreeningEvent {
    Record {
        category: Category,
        record: StreamedRecord,
    },
    /// A grounding batch reported by the transport, unranked.
    Citations {
        category: Category,
        batch: Vec<Source>,
    },
    Completed {
        category: Category,
    },
    Failed {
        category: Category,
        error: anyhow::Error,
    },
}

impl ScreeningEvent {
    pub fn category(&self) -> Category {
        match self {
            ScreeningEvent::Record { category, .. }
            | ScreeningEvent::Citations { category, .. }
            | ScreeningEvent::Completed { category }
            | ScreeningEvent::Failed { category, .. } => *category,
        }
    }
}

/// Receives decoded records and raw grounding batches as they arrive.
pub trait ScreeningSink {
    fn on_record(&mut self, category: Category, record: StreamedRecord);

    fn on_citations(&mut self, category: Category, batch: Vec<Source>);
}
