use url::Url;

/// Canonical dedup key for a citation URL: lower-cased host without `www.`, plus the path
/// without a trailing slash. Scheme, query string and fragment are ignored.
pub fn normalize_url(uri: &str) -> String {
    match Url::parse(uri) {
        Ok(url) => {
            let host = url.host_str().unwrap_or("").to_lowercase();
            let host = host.strip_prefix("www.").unwrap_or(&host);
            let path = url.path();
            let path = path.strip_suffix('/').unwrap_or(path);
            format!("{host}{path}")
        }
        Err(_) => normalize_text(uri),
    }
}

fn normalize_text(uri: &str) -> String {
    let lower = uri.to_lowercase();
    let s = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    let s = s.strip_prefix("www.").unwrap_or(s);
    let s = s.split(['?', '#']).next().unwrap_or(s);
    s.strip_suffix('/').unwrap_or(s).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_www_query_fragment_and_trailing_slash() {
        assert_eq!(normalize_url("https://www.cnyes.com/x"), "cnyes.com/x");
        assert_eq!(normalize_url("https://cnyes.com/x?ref=1"), "cnyes.com/x");
        assert_eq!(normalize_url("http://cnyes.com/x/#top"), "cnyes.com/x");
        assert_eq!(normalize_url("https://WWW.MoneyDJ.com/News/"), "moneydj.com/News");
    }

    #[test]
    fn root_path_collapses_to_host() {
        assert_eq!(normalize_url("https://goodinfo.tw/"), "goodinfo.tw");
        assert_eq!(normalize_url("https://goodinfo.tw"), "goodinfo.tw");
    }

    #[test]
    fn unparseable_input_uses_textual_fallback() {
        assert_eq!(normalize_url("WWW.Cnyes.com/x/?a=b"), "cnyes.com/x");
        assert_eq!(normalize_url("udn.com/news#frag"), "udn.com/news");
        assert_eq!(normalize_url(""), "");
    }
}
