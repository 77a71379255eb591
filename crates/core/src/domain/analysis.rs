use crate::domain::record::{Category, Source, StockRecord};
use anyhow::ensure;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricAnalysis {
    pub metric: String,
    pub status: String,
    pub evaluation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleStockAnalysis {
    pub name: String,
    pub ticker: String,
    #[serde(default)]
    pub analysis: Vec<MetricAnalysis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy_suggestion: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub long_term_suitability: Option<String>,
    #[serde(default)]
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AllocatedStock {
    pub name: String,
    pub ticker: String,
    pub amount: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationCategoryPlan {
    pub total_amount: f64,
    #[serde(default)]
    pub stocks: Vec<AllocatedStock>,
}

impl AllocationCategoryPlan {
    pub fn allocated(&self) -> f64 {
        self.stocks.iter().map(|s| s.amount).sum()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationPlan {
    pub summary: String,
    pub long_term_allocation: AllocationCategoryPlan,
    pub swing_trade_allocation: AllocationCategoryPlan,
}

/// Budget split for an allocation plan request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AllocationRequest {
    pub total_amount: f64,
    /// Percentage of the budget reserved for long-term holdings.
    pub ratio: u8,
}

impl AllocationRequest {
    pub fn new(total_amount: f64, ratio: u8) -> anyhow::Result<Self> {
        ensure!(
            total_amount.is_finite() && total_amount > 0.0,
            "total amount must be positive (got {total_amount})"
        );
        ensure!(ratio <= 100, "ratio must be 0..=100 (got {ratio})");
        Ok(Self {
            total_amount,
            ratio,
        })
    }

    pub fn budget_for(&self, category: Category) -> f64 {
        let long_term = self.total_amount * f64::from(self.ratio) / 100.0;
        match category {
            Category::LongTerm => long_term,
            Category::SwingTrade => self.total_amount - long_term,
        }
    }
}

impl AllocationPlan {
    pub fn category(&self, category: Category) -> &AllocationCategoryPlan {
        match category {
            Category::LongTerm => &self.long_term_allocation,
            Category::SwingTrade => &self.swing_trade_allocation,
        }
    }

    /// Rejects structurally broken plans. Overspending is only logged: the model's arithmetic
    /// is advisory and the caller decides what to do with it.
    pub fn validate(&self, request: &AllocationRequest) -> anyhow::Result<()> {
        for category in Category::ALL {
            let plan = self.category(category);
            for stock in &plan.stocks {
                ensure!(!stock.ticker.trim().is_empty(), "allocated ticker must be non-empty");
                ensure!(
                    stock.amount.is_finite() && stock.amount >= 0.0,
                    "allocation for {} must be a non-negative number (got {})",
                    stock.ticker,
                    stock.amount
                );
            }

            let budget = request.budget_for(category);
            let allocated = plan.allocated();
            if allocated > budget + 0.5 {
                tracing::warn!(
                    %category,
                    budget,
                    allocated,
                    "allocation plan exceeds category budget"
                );
            }
        }
        Ok(())
    }
}

/// Candidates handed to the allocation prompt, per category.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllocationCandidates {
    pub long_term: Vec<StockRecord>,
    pub swing_trade: Vec<StockRecord>,
}

impl AllocationCandidates {
    pub fn list(&self, category: Category) -> &[StockRecord] {
        match category {
            Category::LongTerm => &self.long_term,
            Category::SwingTrade => &self.swing_trade,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn request_splits_budget_by_ratio() {
        let req = AllocationRequest::new(1_000_000.0, 70).unwrap();
        assert_eq!(req.budget_for(Category::LongTerm), 700_000.0);
        assert_eq!(req.budget_for(Category::SwingTrade), 300_000.0);
    }

    #[test]
    fn request_rejects_bad_inputs() {
        assert!(AllocationRequest::new(0.0, 50).is_err());
        assert!(AllocationRequest::new(-5.0, 50).is_err());
        assert!(AllocationRequest::new(100.0, 101).is_err());
    }

    #[test]
    fn validate_accepts_overspend_but_rejects_negative_amount() {
        let req = AllocationRequest::new(100.0, 50).unwrap();
        let mut plan: AllocationPlan = serde_json::from_value(json!({
            "summary": "s",
            "longTermAllocation": {
                "totalAmount": 50.0,
                "stocks": [{"name": "TSMC", "ticker": "2330.TW", "amount": 80.0, "reason": "r"}]
            },
            "swingTradeAllocation": {"totalAmount": 50.0, "stocks": []}
        }))
        .unwrap();
        assert!(plan.validate(&req).is_ok());

        plan.long_term_allocation.stocks[0].amount = -1.0;
        assert!(plan.validate(&req).is_err());
    }
}
