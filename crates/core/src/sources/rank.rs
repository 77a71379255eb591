use crate::domain::record::Source;
use crate::sources::normalize::normalize_url;
use std::collections::HashSet;

/// Upper bound on the number of citations kept for a record or a screening run.
pub const MAX_SOURCES: usize = 3;

// Mainland-China portals and aggregators that must never be cited.
const BLOCKED_DOMAINS: &[&str] = &[
    ".cn",
    "sina.com",
    "sohu.com",
    "163.com",
    "tencent.com",
    "xueqiu.com",
    "eastmoney.com",
    "weibo.com",
    "zhihu.com",
    "baidu.com",
    "toutiao.com",
    "hexun.com",
    "jrj.com.cn",
    "stockstar.com",
    "ifeng.com",
    "ifa.ai",
];

// Highest priority first; the first tier with a matching substring decides the score.
const PRIORITY_TIERS: &[(u32, &[&str])] = &[
    (100, &["finance.yahoo.com", "google.com/finance"]),
    (90, &["goodinfo.tw", "cnyes.com", "moneydj.com", "anue.com"]),
    (85, &["mops.twse.com.tw", ".gov.tw"]),
    (
        80,
        &[
            "udn.com",
            "chinatimes.com",
            "ltn.com.tw",
            "wealth.com.tw",
            "businesstoday.com.tw",
            "ctee.com.tw",
        ],
    ),
];

const DEFAULT_SCORE: u32 = 50;

struct ScoredSource {
    source: Source,
    score: u32,
}

fn is_label_char(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-'
}

// TLD entries like `.cn` must end on a label boundary, so `example.cn/x` is blocked but
// `www.cnyes.com` is not. Every other entry blocks on a plain substring match.
fn matches_blocked(uri: &str, entry: &str) -> bool {
    if !entry.starts_with('.') {
        return uri.contains(entry);
    }
    let bytes = uri.as_bytes();
    uri.match_indices(entry).any(|(start, m)| {
        let end = start + m.len();
        end == bytes.len() || !is_label_char(bytes[end])
    })
}

fn is_blocked(uri: &str) -> bool {
    let uri = uri.to_lowercase();
    BLOCKED_DOMAINS.iter().any(|d| matches_blocked(&uri, d))
}

fn score_uri(uri: &str) -> u32 {
    let uri = uri.to_lowercase();
    PRIORITY_TIERS
        .iter()
        .find(|(_, needles)| needles.iter().any(|n| uri.contains(n)))
        .map(|(score, _)| *score)
        .unwrap_or(DEFAULT_SCORE)
}

/// Dedups by normalized URL (first occurrence wins), drops blocked or URL-less citations,
/// then returns the best [`MAX_SOURCES`] by domain priority. Ties keep arrival order.
pub fn rank_sources<I>(sources: I) -> Vec<Source>
where
    I: IntoIterator<Item = Source>,
{
    let mut seen = HashSet::new();
    let mut scored: Vec<ScoredSource> = sources
        .into_iter()
        .filter_map(|source| {
            let uri = source.uri()?;
            if !seen.insert(normalize_url(uri)) || is_blocked(uri) {
                return None;
            }
            let score = score_uri(uri);
            Some(ScoredSource { source, score })
        })
        .collect();

    scored.sort_by(|a, b| b.score.cmp(&a.score));
    scored.truncate(MAX_SOURCES);
    scored.into_iter().map(|s| s.source).collect()
}

/// Appends `batch` to the running list and re-ranks the result in one step.
pub fn merge_and_rank(current: &[Source], batch: &[Source]) -> Vec<Source> {
    rank_sources(current.iter().chain(batch).cloned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Citation;

    fn src(uri: &str) -> Source {
        Source::web(uri, uri)
    }

    fn uris(sources: &[Source]) -> Vec<&str> {
        sources.iter().filter_map(Source::uri).collect()
    }

    #[test]
    fn dedups_and_drops_blocked_domains() {
        let ranked = rank_sources(vec![
            src("https://www.cnyes.com/x"),
            src("https://cnyes.com/x?ref=1"),
            src("https://sina.com/y"),
        ]);
        assert_eq!(uris(&ranked), vec!["https://www.cnyes.com/x"]);
    }

    #[test]
    fn duplicate_keeps_first_seen_object() {
        let ranked = rank_sources(vec![
            Source::web("http://udn.com/a/", "first"),
            Source::web("https://www.udn.com/a", "second"),
        ]);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].web.as_ref().unwrap().title, "first");
    }

    #[test]
    fn orders_by_priority_and_truncates() {
        let ranked = rank_sources(vec![
            src("https://blog.example.com/post"),
            src("https://news.ltn.com.tw/a"),
            src("https://mops.twse.com.tw/b"),
            src("https://goodinfo.tw/c"),
            src("https://tw.finance.yahoo.com/quote/2330.TW"),
        ]);
        assert_eq!(
            uris(&ranked),
            vec![
                "https://tw.finance.yahoo.com/quote/2330.TW",
                "https://goodinfo.tw/c",
                "https://mops.twse.com.tw/b",
            ]
        );
    }

    #[test]
    fn ties_keep_arrival_order() {
        let ranked = rank_sources(vec![
            src("https://a.example.com"),
            src("https://moneydj.com/1"),
            src("https://b.example.com"),
            src("https://anue.com/2"),
        ]);
        assert_eq!(
            uris(&ranked),
            vec![
                "https://moneydj.com/1",
                "https://anue.com/2",
                "https://a.example.com",
            ]
        );
    }

    #[test]
    fn drops_citations_without_uri() {
        let ranked = rank_sources(vec![
            Source { web: None },
            Source {
                web: Some(Citation {
                    uri: None,
                    title: "no link".to_string(),
                }),
            },
            src("https://udn.com/z"),
        ]);
        assert_eq!(uris(&ranked), vec!["https://udn.com/z"]);
    }

    #[test]
    fn blocklist_is_case_insensitive_and_order_independent() {
        let inputs = vec![
            src("https://NEWS.SINA.COM.TW/a"),
            src("https://finance.163.com/b"),
            src("https://example.cn/c"),
            src("https://ctee.com.tw/d"),
        ];
        let mut reversed = inputs.clone();
        reversed.reverse();

        for input in [inputs, reversed] {
            let ranked = rank_sources(input);
            assert_eq!(uris(&ranked), vec!["https://ctee.com.tw/d"]);
        }
    }

    #[test]
    fn tld_entry_does_not_match_inside_a_label() {
        let ranked = rank_sources(vec![
            src("https://www.cnyes.com/news"),
            src("https://quote.jrj.com.cn/x"),
        ]);
        assert_eq!(uris(&ranked), vec!["https://www.cnyes.com/news"]);
        assert!(is_blocked("https://example.cn"));
        assert!(!is_blocked("https://cnyes.com/cn-news"));
    }

    #[test]
    fn domain_entries_block_on_any_substring() {
        let ranked = rank_sources(vec![
            src("https://mysina.com/x"),
            src("https://news.abc163.com/y"),
            src("https://shifa.ai/z"),
        ]);
        assert!(ranked.is_empty(), "{:?}", uris(&ranked));
    }

    #[test]
    fn ranking_is_idempotent_and_bounded() {
        let input: Vec<Source> = (0..10)
            .map(|i| src(&format!("https://site{i}.example.com/p")))
            .chain([src("https://cnyes.com/q"), src("https://www.cnyes.com/q/")])
            .collect();

        let once = rank_sources(input);
        assert!(once.len() <= MAX_SOURCES);
        let twice = rank_sources(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn merge_reads_latest_list() {
        let running = rank_sources(vec![src("https://udn.com/1")]);
        let merged = merge_and_rank(&running, &[src("https://goodinfo.tw/2")]);
        assert_eq!(uris(&merged), vec!["https://goodinfo.tw/2", "https://udn.com/1"]);
    }
}
