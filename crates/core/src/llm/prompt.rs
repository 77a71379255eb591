use crate::domain::analysis::{AllocationCandidates, AllocationRequest};
use crate::domain::record::Category;
use crate::llm::GenerateRequest;
use serde::{Deserialize, Serialize};

const SCREEN_TEMPERATURE: f32 = 0.5;
const ANALYSIS_TEMPERATURE: f32 = 0.3;

const DEFAULT_LONG_TERM_CRITERIA: &str = "\
核心篩選模組 (必須符合的條件):
  財務穩定性: EPS（近四季）> 5 元; ROE（近一年）> 15%; 自由現金流為正; 毛利率 > 20%; 負債比 < 50%
  估值合理性: 本益比 < 20; PEG < 1.5; 股價位於近一年低點 ±10%
  產業與競爭力: 技術獨特性、客戶黏著度、供應鏈關鍵度、替代性、競爭環境; 產業不限
  年化報酬潛力: 年化報酬率（含股利）> 10%; 股利政策不強制但加分
加分模組: 殖利率 > 3%; 配息率 > 50%; 連續配息 5 年以上; 法人持股穩定
AI動態模組: 題材辨識、法人題材關聯、輪動強度分析";

const DEFAULT_SWING_TRADE_CRITERIA: &str = "尋找在「最近 3 個交易日」內，價格於 60 日均線（季線）附近出現「看漲吞沒」K 線型態的個股。此策略旨在捕捉剛發動的起漲點，確保進場時機的即時性。";

const SOURCE_RULES: &str = "\
SOURCES: copy every URI exactly as returned by your search tool; never construct or guess a URL. \
If no reliable recent source exists, output an empty sources array. \
Never cite Simplified Chinese or mainland China sites (.cn, Sina, Sohu, Tencent, ...), forums, social media, personal blogs, or ifa.ai. \
Prefer Anue, MoneyDJ, Cnyes, Goodinfo, MOPS.";

/// Free-text screening criteria per category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreeningCriteria {
    pub long_term: String,
    pub swing_trade: String,
}

impl Default for ScreeningCriteria {
    fn default() -> Self {
        Self {
            long_term: DEFAULT_LONG_TERM_CRITERIA.to_string(),
            swing_trade: DEFAULT_SWING_TRADE_CRITERIA.to_string(),
        }
    }
}

impl ScreeningCriteria {
    pub fn for_category(&self, category: Category) -> &str {
        match category {
            Category::LongTerm => &self.long_term,
            Category::SwingTrade => &self.swing_trade,
        }
    }
}

/// Parameters of one category's screening call.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenParams<'a> {
    pub category: Category,
    pub criteria: &'a ScreeningCriteria,
    pub exclude_tickers: &'a [String],
    pub count: usize,
    /// Ask the model to relax the most restrictive criteria.
    pub loosen: bool,
}

pub fn screening_request(params: &ScreenParams<'_>) -> GenerateRequest {
    let category = params.category;
    let count = params.count;

    let goal = match category {
        Category::LongTerm => format!(
            "Find up to {count} Taiwanese stocks (台股) or ETFs suitable for long-term value investing: strong fundamentals, stable growth, solid market position. Do not pick stocks defined by short-term technical signals or news hype."
        ),
        Category::SwingTrade => format!(
            "Find up to {count} Taiwanese stocks (台股) that fit the technical pattern below for swing trading. The signal must have occurred within the last 3 trading days and the price must be no more than 5% above the signal candle's high. Reason from technicals and chip analysis (籌碼) only."
        ),
    };

    let mut prompt = format!(
        "Strategy: {category}\n{goal}\n\nUser criteria:\n{}\n",
        params.criteria.for_category(category)
    );

    if !params.exclude_tickers.is_empty() {
        prompt.push_str(&format!(
            "\nDo NOT include these already shown stocks: [{}]\n",
            params.exclude_tickers.join(", ")
        ));
    }
    if params.loosen {
        prompt.push_str(&format!(
            "\nA previous search with these exact criteria found very few results. Relax one or two of the most restrictive criteria to find up to {count} more stocks, and say which ones in 'reasoning'.\n"
        ));
    }

    let exits = match category {
        Category::SwingTrade => "\"stopLoss\": \"string\", \"takeProfit\": \"string\", ",
        Category::LongTerm => "",
    };
    prompt.push_str(&format!(
        "\nOUTPUT: JSON Lines, one object per line, written in Traditional Chinese (繁體中文). \
Never use double quotes inside string values; use single quotes instead.\n\
Each stock: {{\"category\": \"{category}\", \"name\": \"string\", \"ticker\": \"string (e.g. 2330.TW)\", \
\"buyZone\": \"string (about ±5% around the latest close)\", {exits}\"reasoning\": \"string\", \
\"sources\": [{{\"web\": {{\"uri\": \"string\", \"title\": \"string\"}}}}]}}\n\
If you find fewer than {count} stocks, end with {{\"type\": \"analysis_summary\", \"message\": \"string\"}} \
explaining which criteria were most restrictive.\n{SOURCE_RULES}\n\
Start streaming immediately."
    ));

    GenerateRequest {
        system: "You are an expert financial analyst for the Taiwanese stock market (台股). Respond by streaming JSON Line objects, one per stock you find.".to_string(),
        prompt,
        grounded: true,
        temperature: SCREEN_TEMPERATURE,
        thinking_budget: Some(0),
    }
}

pub fn single_stock_request(ticker: &str) -> GenerateRequest {
    let prompt = format!(
        "Stock to analyze: {ticker}\n\
Analyze these five metrics with a status and an evaluation each: 📈 今日股價 (latest close), 🧾 EPS（近四季）, 📦 籌碼面, 🔍 題材面, 🧠 技術面. \
Then give an operational strategy suggestion and a judgment on long-term suitability.\n\
OUTPUT: a single JSON object, no markdown, written in Traditional Chinese (繁體中文), single quotes inside strings:\n\
{{\"name\": \"string\", \"ticker\": \"{ticker}\", \"analysis\": [{{\"metric\": \"string\", \"status\": \"string\", \"evaluation\": \"string\"}}], \
\"strategySuggestion\": \"string\", \"longTermSuitability\": \"string\", \
\"sources\": [{{\"web\": {{\"uri\": \"string\", \"title\": \"string\"}}}}]}}\n{SOURCE_RULES}"
    );

    GenerateRequest {
        system: "You are an expert financial analyst for the Taiwanese stock market (台股). Respond with only a valid JSON object containing your structured analysis.".to_string(),
        prompt,
        grounded: true,
        temperature: ANALYSIS_TEMPERATURE,
        thinking_budget: None,
    }
}

pub fn allocation_request(
    request: &AllocationRequest,
    candidates: &AllocationCandidates,
) -> GenerateRequest {
    let list = |category: Category| {
        candidates
            .list(category)
            .iter()
            .map(|s| format!("{} {}", s.ticker, s.name))
            .collect::<Vec<_>>()
            .join(", ")
    };
    let long_term_amount = request.budget_for(Category::LongTerm);
    let swing_trade_amount = request.budget_for(Category::SwingTrade);

    let prompt = format!(
        "Total capital: {} TWD. Allocation: {}% long-term hold, {}% swing trading.\n\
Long-term candidates: [{}]\nSwing trading candidates: [{}]\n\
From each list select only the 1 to 3 most promising stocks, give each a TWD amount (a number) and a reason. \
A category's allocations must not exceed its budget.\n\
OUTPUT: a single JSON object, no markdown, written in Traditional Chinese (繁體中文):\n\
{{\"summary\": \"string\", \
\"longTermAllocation\": {{\"totalAmount\": {long_term_amount}, \"stocks\": [{{\"name\": \"string\", \"ticker\": \"string\", \"amount\": 0, \"reason\": \"string\"}}]}}, \
\"swingTradeAllocation\": {{\"totalAmount\": {swing_trade_amount}, \"stocks\": [...]}}}}",
        request.total_amount,
        request.ratio,
        100 - request.ratio,
        list(Category::LongTerm),
        list(Category::SwingTrade),
    );

    GenerateRequest {
        system: "You are a portfolio manager for the Taiwanese stock market (台股). Respond with only a valid JSON object containing your allocation plan.".to_string(),
        prompt,
        grounded: false,
        temperature: SCREEN_TEMPERATURE,
        thinking_budget: None,
    }
}
