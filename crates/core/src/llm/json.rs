use crate::domain::analysis::{AllocationPlan, SingleStockAnalysis};
use crate::sources::rank_sources;
use anyhow::Context;
use serde::de::DeserializeOwned;

/// Pulls the JSON payload out of a single-shot model answer.
pub fn extract_json(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.starts_with("```") {
        // ```json ... ``` or ``` ... ```
        let mut inner = trimmed.trim_start_matches('`');
        inner = inner.strip_prefix("json").unwrap_or(inner);
        if let Some(end) = inner.rfind("```") {
            inner = &inner[..end];
        }
        return Some(inner.trim().to_string());
    }

    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    Some(trimmed[start..=end].to_string())
}

/// Decodes a single JSON object from model output. Tries the fence-stripped text first, then
/// everything from the first `{`.
pub fn parse_json_output<T: DeserializeOwned>(text: &str) -> anyhow::Result<T> {
    let trimmed = text.trim();
    anyhow::ensure!(!trimmed.is_empty(), "model returned an empty response");

    let candidate = extract_json(trimmed).unwrap_or_else(|| trimmed.to_string());
    match serde_json::from_str::<T>(&candidate) {
        Ok(v) => Ok(v),
        Err(first_err) => {
            let start = trimmed.find('{').with_context(|| {
                format!("model output has no JSON object ({first_err}): {trimmed}")
            })?;
            serde_json::from_str::<T>(&trimmed[start..])
                .with_context(|| format!("model output is not valid JSON: {trimmed}"))
        }
    }
}

pub fn parse_single_stock_analysis(text: &str) -> anyhow::Result<SingleStockAnalysis> {
    let mut analysis = parse_json_output::<SingleStockAnalysis>(text)
        .context("failed to decode single stock analysis")?;
    analysis.sources = rank_sources(std::mem::take(&mut analysis.sources));
    Ok(analysis)
}

pub fn parse_allocation_plan(text: &str) -> anyhow::Result<AllocationPlan> {
    parse_json_output::<AllocationPlan>(text).context("failed to decode allocation plan")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn analysis_json() -> String {
        json!({
            "name": "台積電",
            "ticker": "2330.TW",
            "analysis": [
                {"metric": "📈 今日股價", "status": "約 NT$950", "evaluation": "高檔整理"}
            ],
            "strategySuggestion": "分批布局",
            "longTermSuitability": "適合",
            "sources": [
                {"web": {"uri": "https://www.sina.com.cn/x", "title": "blocked"}},
                {"web": {"uri": "https://goodinfo.tw/a", "title": "goodinfo"}}
            ]
        })
        .to_string()
    }

    #[test]
    fn extract_json_handles_fenced_blocks() {
        let body = "{\"a\":1}";
        assert_eq!(extract_json(&format!("```json\n{body}\n```\n")), Some(body.to_string()));
        assert_eq!(extract_json(&format!("```\n{body}\n```")), Some(body.to_string()));
    }

    #[test]
    fn extract_json_falls_back_to_braces() {
        let s = "prefix {\"a\":1} suffix";
        assert_eq!(extract_json(s), Some("{\"a\":1}".to_string()));
        assert_eq!(extract_json("no json here"), None);
    }

    #[test]
    fn parse_falls_back_to_first_brace() {
        // Unclosed fence with prose before the object.
        let v: serde_json::Value = parse_json_output("```\nnote: {\"a\": {\"b\": 1}}").unwrap();
        assert_eq!(v["a"]["b"], 1);
    }

    #[test]
    fn parse_rejects_empty_output() {
        assert!(parse_json_output::<serde_json::Value>("   ").is_err());
        assert!(parse_json_output::<serde_json::Value>("sorry, no data").is_err());
    }

    #[test]
    fn single_stock_sources_are_ranked() {
        let fenced = format!("```json\n{}\n```", analysis_json());
        let analysis = parse_single_stock_analysis(&fenced).unwrap();
        assert_eq!(analysis.ticker, "2330.TW");
        assert_eq!(analysis.analysis.len(), 1);
        assert_eq!(analysis.sources.len(), 1);
        assert_eq!(analysis.sources[0].uri(), Some("https://goodinfo.tw/a"));
    }

    #[test]
    fn parses_allocation_plan() {
        let text = json!({
            "summary": "集中火力",
            "longTermAllocation": {
                "totalAmount": 700000.0,
                "stocks": [{"name": "台積電", "ticker": "2330.TW", "amount": 400000, "reason": "r"}]
            },
            "swingTradeAllocation": {"totalAmount": 300000.0, "stocks": []}
        })
        .to_string();

        let plan = parse_allocation_plan(&text).unwrap();
        assert_eq!(plan.long_term_allocation.stocks[0].amount, 400000.0);
        assert!(plan.swing_trade_allocation.stocks.is_empty());
    }
}
