//! Single-shot advisory calls: a deep-dive on one ticker and a budget allocation plan.

use crate::domain::analysis::{AllocationCandidates, AllocationPlan, AllocationRequest, SingleStockAnalysis};
use crate::llm::json::{parse_allocation_plan, parse_single_stock_analysis};
use crate::llm::prompt::{allocation_request, single_stock_request};
use crate::llm::GenerationClient;
use crate::sources::merge_and_rank;
use anyhow::{ensure, Context};

/// Analyzes one ticker. Citations the model wrote into its JSON are merged with the
/// transport's grounding batch and ranked together.
pub async fn analyze_stock(
    client: &dyn GenerationClient,
    ticker: &str,
) -> anyhow::Result<SingleStockAnalysis> {
    let ticker = ticker.trim();
    ensure!(!ticker.is_empty(), "ticker must be non-empty");

    let output = client
        .generate(single_stock_request(ticker))
        .await
        .with_context(|| format!("single stock analysis failed for {ticker}"))?;

    let mut analysis = parse_single_stock_analysis(&output.text)?;
    analysis.sources = merge_and_rank(&analysis.sources, &output.sources);

    tracing::info!(%ticker, metrics = analysis.analysis.len(), sources = analysis.sources.len(), "stock analyzed");
    Ok(analysis)
}

pub async fn plan_allocation(
    client: &dyn GenerationClient,
    request: &AllocationRequest,
    candidates: &AllocationCandidates,
) -> anyhow::Result<AllocationPlan> {
    ensure!(
        !candidates.long_term.is_empty() || !candidates.swing_trade.is_empty(),
        "no candidate stocks to allocate"
    );

    let output = client
        .generate(allocation_request(request, candidates))
        .await
        .context("allocation plan request failed")?;

    let plan = parse_allocation_plan(&output.text)?;
    plan.validate(request)?;
    Ok(plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::{Category, Source, StockRecord};
    use crate::llm::{ChunkStream, GenerateOutput, GenerateRequest, Provider};
    use serde_json::json;
    use std::sync::Mutex;

    struct CannedClient {
        output: GenerateOutput,
        seen: Mutex<Vec<GenerateRequest>>,
    }

    impl CannedClient {
        fn new(text: String, sources: Vec<Source>) -> Self {
            Self {
                output: GenerateOutput { text, sources },
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl GenerationClient for CannedClient {
        fn provider(&self) -> Provider {
            Provider::Gemini
        }

        async fn stream_generate(&self, _request: GenerateRequest) -> anyhow::Result<ChunkStream> {
            anyhow::bail!("not scripted")
        }

        async fn generate(&self, request: GenerateRequest) -> anyhow::Result<GenerateOutput> {
            self.seen.lock().unwrap().push(request);
            Ok(self.output.clone())
        }
    }

    fn candidate(category: Category, ticker: &str) -> StockRecord {
        StockRecord {
            category,
            ticker: ticker.to_string(),
            name: ticker.to_string(),
            buy_zone: String::new(),
            stop_loss: None,
            take_profit: None,
            reasoning: String::new(),
            citations: Vec::new(),
        }
    }

    #[tokio::test]
    async fn analysis_merges_written_and_grounded_sources() {
        let text = json!({
            "name": "台積電",
            "ticker": "2330.TW",
            "analysis": [{"metric": "🧾 EPS", "status": "39.2", "evaluation": "強"}],
            "sources": [
                {"web": {"uri": "https://blog.example.com/tsmc", "title": "blog"}},
                {"web": {"uri": "https://news.sina.com/tsmc", "title": "sina"}}
            ]
        })
        .to_string();
        let client = CannedClient::new(
            format!("```json\n{text}\n```"),
            vec![Source::web("https://www.cnyes.com/news/1", "cnyes")],
        );

        let analysis = analyze_stock(&client, " 2330.TW ").await.unwrap();

        let titles: Vec<_> = analysis
            .sources
            .iter()
            .map(|s| s.web.as_ref().unwrap().title.as_str())
            .collect();
        assert_eq!(titles, vec!["cnyes", "blog"]);
        assert!(client.seen.lock().unwrap()[0].prompt.contains("Stock to analyze: 2330.TW"));
    }

    #[tokio::test]
    async fn blank_ticker_is_rejected_before_any_call() {
        let client = CannedClient::new(String::new(), Vec::new());
        assert!(analyze_stock(&client, "  ").await.is_err());
        assert!(client.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn allocation_is_parsed_and_validated() {
        let text = json!({
            "summary": "集中配置",
            "longTermAllocation": {"totalAmount": 600, "stocks": [
                {"name": "TSMC", "ticker": "2330.TW", "amount": 600, "reason": "龍頭"}
            ]},
            "swingTradeAllocation": {"totalAmount": 400, "stocks": []}
        })
        .to_string();
        let client = CannedClient::new(text, Vec::new());
        let request = AllocationRequest::new(1000.0, 60).unwrap();
        let candidates = AllocationCandidates {
            long_term: vec![candidate(Category::LongTerm, "2330.TW")],
            swing_trade: Vec::new(),
        };

        let plan = plan_allocation(&client, &request, &candidates).await.unwrap();
        assert_eq!(plan.category(Category::LongTerm).allocated(), 600.0);
        assert!(plan.category(Category::SwingTrade).stocks.is_empty());
    }

    #[tokio::test]
    async fn allocation_rejects_negative_amounts() {
        let text = json!({
            "summary": "",
            "longTermAllocation": {"totalAmount": 600, "stocks": [
                {"name": "TSMC", "ticker": "2330.TW", "amount": -1, "reason": ""}
            ]},
            "swingTradeAllocation": {"totalAmount": 400, "stocks": []}
        })
        .to_string();
        let client = CannedClient::new(text, Vec::new());
        let request = AllocationRequest::new(1000.0, 60).unwrap();
        let candidates = AllocationCandidates {
            long_term: vec![candidate(Category::LongTerm, "2330.TW")],
            swing_trade: Vec::new(),
        };

        assert!(plan_allocation(&client, &request, &candidates).await.is_err());
    }

    #[tokio::test]
    async fn allocation_needs_candidates() {
        let client = CannedClient::new(String::new(), Vec::new());
        let request = AllocationRequest::new(1000.0, 50).unwrap();
        let err = plan_allocation(&client, &request, &AllocationCandidates::default())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no candidate"));
    }
}
