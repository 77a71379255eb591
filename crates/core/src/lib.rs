pub mod advice;
pub mod domain;
pub mod llm;
pub mod screening;
pub mod sources;
pub mod stream;

pub mod config {
    use crate::stream::ScanMode;
    use anyhow::Context;

    #[derive(Debug, Clone, Default)]
    pub struct Settings {
        pub gemini_api_key: Option<String>,
        pub gemini_base_url: Option<String>,
        pub gemini_model: Option<String>,
        pub gemini_timeout_secs: Option<u64>,
        pub sentry_dsn: Option<String>,
        pub string_aware_scan: bool,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let gemini_timeout_secs = match non_empty_var("GEMINI_TIMEOUT_SECS") {
                Some(s) => Some(
                    s.parse::<u64>()
                        .with_context(|| format!("GEMINI_TIMEOUT_SECS must be an integer (got {s})"))?,
                ),
                None => None,
            };

            Ok(Self {
                gemini_api_key: non_empty_var("GEMINI_API_KEY"),
                gemini_base_url: non_empty_var("GEMINI_BASE_URL"),
                gemini_model: non_empty_var("GEMINI_MODEL"),
                gemini_timeout_secs,
                sentry_dsn: non_empty_var("SENTRY_DSN"),
                string_aware_scan: non_empty_var("SCREEN_STRING_AWARE_SCAN")
                    .is_some_and(|v| parse_flag(&v)),
            })
        }

        pub fn require_gemini_api_key(&self) -> anyhow::Result<&str> {
            self.gemini_api_key
                .as_deref()
                .context("GEMINI_API_KEY is required")
        }

        pub fn scan_mode(&self) -> ScanMode {
            if self.string_aware_scan {
                ScanMode::StringAware
            } else {
                ScanMode::Structural
            }
        }
    }

    fn non_empty_var(key: &str) -> Option<String> {
        std::env::var(key).ok().filter(|s| !s.trim().is_empty())
    }

    fn parse_flag(v: &str) -> bool {
        matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn flag_parsing_accepts_common_truthy_values() {
            for v in ["1", "true", "TRUE", " yes ", "on"] {
                assert!(parse_flag(v), "{v}");
            }
            for v in ["0", "false", "off", ""] {
                assert!(!parse_flag(v), "{v}");
            }
        }

        #[test]
        fn scan_mode_follows_flag() {
            let mut settings = Settings::default();
            assert_eq!(settings.scan_mode(), ScanMode::Structural);
            settings.string_aware_scan = true;
            assert_eq!(settings.scan_mode(), ScanMode::StringAware);
            assert!(settings.require_gemini_api_key().is_err());
        }
    }
}
