use crate::domain::analysis::AllocationCandidates;
use crate::domain::record::{Category, Source, StockRecord, StreamedRecord};
use crate::screening::ScreeningSink;
use crate::sources::merge_and_rank;
use serde::{Deserialize, Serialize};

/// Caller-side view of a screening session, accumulated across runs and follow-ups.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningResults {
    #[serde(default)]
    pub long_term: Vec<StockRecord>,
    #[serde(default)]
    pub swing_trade: Vec<StockRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_term_message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub swing_trade_message: Option<String>,
    /// Ranked grounding citations across every batch seen so far.
    #[serde(default)]
    pub sources: Vec<Source>,
}

impl ScreeningResults {
    pub fn stocks(&self, category: Category) -> &[StockRecord] {
        match category {
            Category::LongTerm => &self.long_term,
            Category::SwingTrade => &self.swing_trade,
        }
    }

    fn stocks_mut(&mut self, category: Category) -> &mut Vec<StockRecord> {
        match category {
            Category::LongTerm => &mut self.long_term,
            Category::SwingTrade => &mut self.swing_trade,
        }
    }

    pub fn message(&self, category: Category) -> Option<&str> {
        match category {
            Category::LongTerm => self.long_term_message.as_deref(),
            Category::SwingTrade => self.swing_trade_message.as_deref(),
        }
    }

    pub fn set_message(&mut self, category: Category, message: Option<String>) {
        match category {
            Category::LongTerm => self.long_term_message = message,
            Category::SwingTrade => self.swing_trade_message = message,
        }
    }

    /// Adds a stock under its own category unless that ticker is already listed there.
    pub fn insert_stock(&mut self, record: StockRecord) -> bool {
        let list = self.stocks_mut(record.category);
        if list.iter().any(|s| s.ticker == record.ticker) {
            return false;
        }
        list.push(record);
        true
    }

    pub fn excluded_tickers(&self, category: Category) -> Vec<String> {
        self.stocks(category).iter().map(|s| s.ticker.clone()).collect()
    }

    /// Merges a grounding batch into the running list and re-ranks it in one step.
    pub fn merge_sources(&mut self, batch: &[Source]) {
        self.sources = merge_and_rank(&self.sources, batch);
    }

    pub fn allocation_candidates(&self) -> AllocationCandidates {
        AllocationCandidates {
            long_term: self.long_term.clone(),
            swing_trade: self.swing_trade.clone(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.long_term.is_empty() && self.swing_trade.is_empty()
    }
}

impl ScreeningSink for ScreeningResults {
    fn on_record(&mut self, category: Category, record: StreamedRecord) {
        match record {
            StreamedRecord::Stock(stock) => {
                let ticker = stock.ticker.clone();
                if !self.insert_stock(stock) {
                    tracing::debug!(%category, %ticker, "duplicate ticker ignored");
                }
            }
            StreamedRecord::Summary(summary) => self.set_message(category, Some(summary.message)),
        }
    }

    fn on_citations(&mut self, _category: Category, batch: Vec<Source>) {
        self.merge_sources(&batch);
    }
}
