use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "longTerm")]
    LongTerm,
    #[serde(rename = "swingTrade")]
    SwingTrade,
}

impl Category {
    pub const ALL: [Category; 2] = [Category::LongTerm, Category::SwingTrade];

    pub fn as_str(self) -> &'static str {
        match self {
            Category::LongTerm => "longTerm",
            Category::SwingTrade => "swingTrade",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "longTerm" => Some(Category::LongTerm),
            "swingTrade" => Some(Category::SwingTrade),
            _ => None,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A web page cited by the generation service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Citation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uri: Option<String>,
    #[serde(default)]
    pub title: String,
}

/// Wire wrapper around a citation: `{"web": {"uri": "...", "title": "..."}}`.
///
/// Both the per-record `sources` arrays and the grounding chunks reported by the
/// transport use this shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Source {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub web: Option<Citation>,
}

impl Source {
    pub fn web(uri: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            web: Some(Citation {
                uri: Some(uri.into()),
                title: title.into(),
            }),
        }
    }

    /// The cited URL, if present and non-blank.
    pub fn uri(&self) -> Option<&str> {
        self.web
            .as_ref()
            .and_then(|w| w.uri.as_deref())
            .filter(|u| !u.trim().is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockRecord {
    pub category: Category,
    pub ticker: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub buy_zone: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<String>,
    #[serde(default)]
    pub reasoning: String,
    #[serde(default, rename = "sources", skip_serializing_if = "Vec::is_empty")]
    pub citations: Vec<Source>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub message: String,
}

/// A record decoded from one candidate span of the screening stream.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamedRecord {
    Stock(StockRecord),
    Summary(SummaryRecord),
}
