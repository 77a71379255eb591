/// How braces inside the buffer are counted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ScanMode {
    /// Every `{` and `}` counts, including ones inside string literals. The producer is
    /// instructed never to put structural characters in string values.
    #[default]
    Structural,
    /// Braces inside `"..."` literals (with backslash escapes) are ignored.
    StringAware,
}

/// Incremental splitter that turns arbitrarily chunked text into complete top-level
/// `{...}` spans.
///
/// Scan state (depth, string/escape flags, the open brace position) survives across
/// [`Reassembler::push`] calls, so each byte is examined once no matter how the input is
/// fragmented. Text before the first `{` and between objects is never emitted.
#[derive(Debug, Default)]
pub struct Reassembler {
    mode: ScanMode,
    buffer: String,
    // Next byte to examine.
    cursor: usize,
    // Start of the object currently being scanned.
    open: Option<usize>,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Reassembler {
    pub fn new(mode: ScanMode) -> Self {
        Self {
            mode,
            ..Self::default()
        }
    }

    /// Appends a fragment and returns every span it completed, in closing order.
    pub fn push(&mut self, fragment: &str) -> Vec<String> {
        self.buffer.push_str(fragment);

        let mut spans = Vec::new();
        loop {
            let start = match self.open {
                Some(start) => start,
                None => match self.buffer[self.cursor..].find('{') {
                    Some(offset) => {
                        let start = self.cursor + offset;
                        self.open = Some(start);
                        self.depth = 0;
                        self.in_string = false;
                        self.escaped = false;
                        self.cursor = start;
                        start
                    }
                    None => {
                        self.cursor = self.buffer.len();
                        break;
                    }
                },
            };

            match self.scan() {
                Some(end) => {
                    spans.push(self.buffer[start..=end].to_string());
                    self.open = None;
                    self.cursor = end + 1;
                }
                None => break,
            }
        }

        // Everything before the open object (or the cursor, between objects) is done.
        self.compact(self.open.unwrap_or(self.cursor));
        spans
    }

    /// Bytes held back waiting for more input.
    pub fn pending(&self) -> &str {
        &self.buffer
    }

    /// The unterminated object left when the stream ends, if any.
    pub fn finish(self) -> Option<String> {
        let start = self.open?;
        Some(self.buffer[start..].to_string())
    }

    // Advances the cursor through the open object. Returns the index of its closing brace.
    fn scan(&mut self) -> Option<usize> {
        let bytes = self.buffer.as_bytes();
        while self.cursor < bytes.len() {
            let i = self.cursor;
            self.cursor += 1;
            let b = bytes[i];

            if self.mode == ScanMode::StringAware {
                if self.in_string {
                    if self.escaped {
                        self.escaped = false;
                    } else if b == b'\\' {
                        self.escaped = true;
                    } else if b == b'"' {
                        self.in_string = false;
                    }
                    continue;
                }
                if b == b'"' {
                    self.in_string = true;
                    continue;
                }
            }

            match b {
                b'{' => self.depth += 1,
                b'}' if self.depth > 0 => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        return Some(i);
                    }
                }
                _ => {}
            }
        }
        None
    }

    // Drops `upto` leading bytes and rebases the scan positions.
    fn compact(&mut self, upto: usize) {
        if upto == 0 {
            return;
        }
        self.buffer.drain(..upto);
        self.cursor -= upto;
        if let Some(start) = self.open.as_mut() {
            *start -= upto;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TWO_RECORDS: &str = r#"{"ticker":"2330.TW","category":"longTerm","name":"TSMC","buyZone":"900-950","reasoning":"r"}{"type":"analysis_summary","message":"done"}"#;

    fn feed(mode: ScanMode, fragments: &[&str]) -> Vec<String> {
        let mut r = Reassembler::new(mode);
        fragments.iter().flat_map(|f| r.push(f)).collect()
    }

    #[test]
    fn emits_objects_split_mid_object() {
        let (a, b) = TWO_RECORDS.split_at(40);
        let spans = feed(ScanMode::Structural, &[a, b]);
        assert_eq!(spans.len(), 2);
        assert!(spans[0].starts_with(r#"{"ticker":"2330.TW""#));
        assert_eq!(spans[1], r#"{"type":"analysis_summary","message":"done"}"#);
    }

    #[test]
    fn every_split_point_yields_the_same_spans() {
        let input = format!("noise\n{TWO_RECORDS}\n{{\"a\":{{\"b\":{{}}}}}}\n");
        let whole = feed(ScanMode::Structural, &[input.as_str()]);
        assert_eq!(whole.len(), 3);

        for i in 0..=input.len() {
            let (a, b) = input.split_at(i);
            assert_eq!(feed(ScanMode::Structural, &[a, b]), whole, "split at {i}");
        }

        let bytes: Vec<String> = input.chars().map(String::from).collect();
        let refs: Vec<&str> = bytes.iter().map(String::as_str).collect();
        assert_eq!(feed(ScanMode::Structural, &refs), whole);
    }

    #[test]
    fn keeps_nested_objects_whole() {
        let spans = feed(ScanMode::Structural, &[r#"{"a":{"b":1},"c":[{"d":2}]}"#]);
        assert_eq!(spans, vec![r#"{"a":{"b":1},"c":[{"d":2}]}"#.to_string()]);
    }

    #[test]
    fn retains_unterminated_suffix() {
        let mut r = Reassembler::new(ScanMode::Structural);
        assert_eq!(r.push(r#"{"a":1}{"b":"#), vec![r#"{"a":1}"#.to_string()]);
        assert_eq!(r.pending(), r#"{"b":"#);
        assert!(r.push("2").is_empty());
        assert_eq!(r.push("}"), vec![r#"{"b":2}"#.to_string()]);
        assert_eq!(r.pending(), "");
        assert_eq!(r.finish(), None);
    }

    #[test]
    fn finish_reports_dangling_object() {
        let mut r = Reassembler::new(ScanMode::Structural);
        assert!(r.push("prefix {\"a\": {").is_empty());
        assert_eq!(r.finish().as_deref(), Some("{\"a\": {"));
    }

    #[test]
    fn ignores_stray_closing_braces_outside_objects() {
        let spans = feed(ScanMode::Structural, &["} ] {\"a\":1} }"]);
        assert_eq!(spans, vec![r#"{"a":1}"#.to_string()]);
    }

    #[test]
    fn handles_multibyte_text() {
        let input = r#"{"name":"台積電","reasoning":"長期持有"}"#;
        let (a, b) = input.split_at(12);
        assert_eq!(feed(ScanMode::Structural, &[a, b]), vec![input.to_string()]);
    }

    #[test]
    fn structural_mode_desyncs_on_brace_in_string() {
        let input = r#"{"message":"a } b"}"#;
        let spans = feed(ScanMode::Structural, &[input]);
        assert_eq!(spans, vec![r#"{"message":"a }"#.to_string()]);
    }

    #[test]
    fn string_aware_mode_skips_braces_in_strings() {
        let input = r#"{"message":"a } \"{ b"}{"x":1}"#;
        let (a, b) = input.split_at(16);
        let spans = feed(ScanMode::StringAware, &[a, b]);
        assert_eq!(
            spans,
            vec![r#"{"message":"a } \"{ b"}"#.to_string(), r#"{"x":1}"#.to_string()]
        );
    }
}
