use crate::domain::record::{StockRecord, StreamedRecord, SummaryRecord};
use crate::sources::rank_sources;
use serde_json::{Map, Value};

const SUMMARY_KIND: &str = "analysis_summary";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Shape {
    Stock,
    Summary,
    Unknown,
}

fn shape(obj: &Map<String, Value>) -> Shape {
    if obj.contains_key("ticker") && obj.contains_key("category") {
        return Shape::Stock;
    }
    let is_summary = ["type", "kind"]
        .iter()
        .any(|k| obj.get(*k).and_then(Value::as_str) == Some(SUMMARY_KIND));
    if is_summary && obj.contains_key("message") {
        return Shape::Summary;
    }
    Shape::Unknown
}

/// Decodes one candidate span. Returns `None` for spans that are not JSON or match neither
/// record shape; neither case is an error for the stream.
///
/// Stock records come back with their own citations already ranked.
pub fn classify(span: &str) -> Option<StreamedRecord> {
    let value = match serde_json::from_str::<Value>(span) {
        Ok(v) => v,
        Err(err) => {
            tracing::warn!(error = %err, len = span.len(), span, "skipping unparseable streamed object");
            return None;
        }
    };

    let Value::Object(obj) = value else {
        tracing::debug!(span, "streamed value is not an object");
        return None;
    };

    match shape(&obj) {
        Shape::Stock => match serde_json::from_value::<StockRecord>(Value::Object(obj)) {
            Ok(mut record) => {
                record.ticker = record.ticker.trim().to_string();
                if record.ticker.is_empty() {
                    tracing::debug!(span, "stock record with blank ticker");
                    return None;
                }
                record.citations = rank_sources(std::mem::take(&mut record.citations));
                Some(StreamedRecord::Stock(record))
            }
            Err(err) => {
                tracing::debug!(error = %err, span, "stock-shaped object did not decode");
                None
            }
        },
        Shape::Summary => match obj.get("message").and_then(Value::as_str) {
            Some(message) => Some(StreamedRecord::Summary(SummaryRecord {
                message: message.to_string(),
            })),
            None => {
                tracing::debug!(span, "summary message is not a string");
                None
            }
        },
        Shape::Unknown => {
            tracing::debug!(span, "streamed object matches no record shape");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Category;
    use serde_json::json;

    #[test]
    fn classifies_stock_record() {
        let span = r#"{"ticker":"2330.TW","category":"longTerm","name":"TSMC","buyZone":"900-950","reasoning":"r"}"#;
        let Some(StreamedRecord::Stock(rec)) = classify(span) else {
            panic!("expected stock record");
        };
        assert_eq!(rec.ticker, "2330.TW");
        assert_eq!(rec.category, Category::LongTerm);
        assert_eq!(rec.name, "TSMC");
        assert!(rec.citations.is_empty());
    }

    #[test]
    fn classifies_summary_by_type_or_kind() {
        for key in ["type", "kind"] {
            let span = json!({ key: "analysis_summary", "message": "done" }).to_string();
            assert_eq!(
                classify(&span),
                Some(StreamedRecord::Summary(SummaryRecord {
                    message: "done".to_string()
                }))
            );
        }
    }

    #[test]
    fn unknown_shape_is_dropped() {
        assert_eq!(classify(r#"{"foo": "bar"}"#), None);
        assert_eq!(classify(r#"{"type":"analysis_summary"}"#), None);
        assert_eq!(classify(r#"{"ticker":"2330.TW"}"#), None);
    }

    #[test]
    fn malformed_span_is_dropped() {
        assert_eq!(classify(r#"{"ticker": "2330.TW", }"#), None);
        assert_eq!(classify("{not json}"), None);
    }

    #[test]
    fn unknown_category_is_dropped() {
        let span = r#"{"ticker":"2330.TW","category":"dayTrade","name":"TSMC"}"#;
        assert_eq!(classify(span), None);
    }

    #[test]
    fn stock_citations_are_ranked() {
        let span = json!({
            "ticker": "2454.TW",
            "category": "swingTrade",
            "name": "MediaTek",
            "buyZone": "1200",
            "reasoning": "r",
            "sources": [
                {"web": {"uri": "https://blog.example.com/a", "title": "blog"}},
                {"web": {"uri": "https://www.eastmoney.com/b", "title": "blocked"}},
                {"web": {"uri": "https://www.moneydj.com/c", "title": "mdj"}},
                {"web": {"uri": "https://moneydj.com/c/", "title": "dup"}},
                {"web": {"uri": "https://udn.com/d", "title": "udn"}},
                {"web": {"uri": "https://tw.finance.yahoo.com/e", "title": "yahoo"}}
            ]
        })
        .to_string();

        let Some(StreamedRecord::Stock(rec)) = classify(&span) else {
            panic!("expected stock record");
        };
        let titles: Vec<_> = rec
            .citations
            .iter()
            .map(|s| s.web.as_ref().unwrap().title.as_str())
            .collect();
        assert_eq!(titles, vec!["yahoo", "mdj", "udn"]);
    }
}
