// file: src/corpus/normalizer.rs
// description: whitespace normalization applied before fingerprinting and chunking
// reference: internal text processing

/// Normalizes unit text so that whitespace-insignificant re-reads of the same
/// content produce byte-identical output. Fingerprints and chunk plans are
/// computed over the normalized form only.
pub struct TextNormalizer;

impl TextNormalizer {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, content: &str) -> String {
        let mut normalized = self.normalize_line_endings(content);
        normalized = self.trim_trailing_space(&normalized);
        normalized = self.collapse_blank_lines(&normalized);
        normalized.trim_end_matches('\n').to_string()
    }

    fn normalize_line_endings(&self, content: &str) -> String {
        content.replace("\r\n", "\n").replace('\r', "\n")
    }

    fn trim_trailing_space(&self, content: &str) -> String {
        content
            .lines()
            .map(|line| line.trim_end())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn collapse_blank_lines(&self, content: &str) -> String {
        let mut result = String::with_capacity(content.len());
        let mut blank_run = 0usize;

        for line in content.lines() {
            if line.is_empty() {
                blank_run += 1;
                if blank_run > 1 {
                    continue;
                }
            } else {
                blank_run = 0;
            }
            result.push_str(line);
            result.push('\n');
        }

        result
    }
}

impl Default for TextNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crlf_normalized() {
        let normalizer = TextNormalizer::new();
        assert_eq!(
            normalizer.normalize("line one\r\nline two\r"),
            "line one\nline two"
        );
    }

    #[test]
    fn test_trailing_space_stripped() {
        let normalizer = TextNormalizer::new();
        assert_eq!(normalizer.normalize("text   \nmore\t"), "text\nmore");
    }

    #[test]
    fn test_blank_lines_collapsed() {
        let normalizer = TextNormalizer::new();
        assert_eq!(
            normalizer.normalize("one\n\n\n\ntwo"),
            "one\n\ntwo"
        );
    }

    #[test]
    fn test_idempotent() {
        let normalizer = TextNormalizer::new();
        let once = normalizer.normalize("a \r\n\r\n\r\n b \n");
        let twice = normalizer.normalize(&once);
        assert_eq!(once, twice);
    }
}
