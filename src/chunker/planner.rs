// file: src/chunker/planner.rs
// description: deterministic overlapping-window chunk planner
// reference: internal chunking policy

use crate::config::ChunkingConfig;
use crate::corpus::{SourceType, Unit};
use std::collections::BTreeMap;

/// A contiguous slice of a unit's text, the atomic item embedded and stored.
/// The id is reproducible from `(doc_id, index)` alone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub doc_id: String,
    pub index: u64,
    pub text: String,
    pub metadata: BTreeMap<String, String>,
}

impl Chunk {
    pub fn id(&self) -> String {
        chunk_id(&self.doc_id, self.index)
    }
}

/// Globally unique, reproducible chunk identifier.
pub fn chunk_id(doc_id: &str, index: u64) -> String {
    format!("{}:{}", doc_id, index)
}

/// Pure predicate: media placeholder units are excluded unless explicitly
/// requested.
pub fn should_index_unit(unit: &Unit, include_media_stubs: bool) -> bool {
    unit.source_type != SourceType::MediaStub || include_media_stubs
}

pub struct ChunkPlanner {
    config: ChunkingConfig,
}

impl ChunkPlanner {
    pub fn new(config: ChunkingConfig) -> Self {
        Self { config }
    }

    /// Splits a unit's text into overlapping windows of `max_chars`
    /// characters, advancing `max_chars - overlap_chars` per step. A final
    /// remainder shorter than `min_chars` is merged into the previous chunk.
    /// Window positions are measured in Unicode scalar values, so multi-byte
    /// text never splits inside a code point. Same `(text, config)` in, same
    /// chunks out.
    pub fn plan(&self, unit: &Unit) -> Vec<Chunk> {
        let windows = plan_windows(&unit.text, &self.config);
        let base_metadata = self.base_metadata(unit);

        windows
            .into_iter()
            .enumerate()
            .map(|(index, text)| Chunk {
                doc_id: unit.doc_id.clone(),
                index: index as u64,
                text,
                metadata: base_metadata.clone(),
            })
            .collect()
    }

    /// Chunk count without materializing chunk structs; used during planning
    /// to compare against resume state.
    pub fn plan_count(&self, unit: &Unit) -> u64 {
        plan_windows(&unit.text, &self.config).len() as u64
    }

    fn base_metadata(&self, unit: &Unit) -> BTreeMap<String, String> {
        let mut metadata = BTreeMap::new();
        metadata.insert("source_uri".to_string(), unit.source_uri.clone());
        metadata.insert(
            "source_type".to_string(),
            unit.source_type.as_str().to_string(),
        );
        for (key, value) in &unit.attrs {
            metadata.insert(key.clone(), value.clone());
        }
        metadata
    }
}

fn plan_windows(text: &str, config: &ChunkingConfig) -> Vec<String> {
    if text.is_empty() {
        return Vec::new();
    }

    // Byte offset of every char boundary, plus the end of the string, so
    // char-measured windows map onto valid UTF-8 slices.
    let bounds: Vec<usize> = text
        .char_indices()
        .map(|(offset, _)| offset)
        .chain(std::iter::once(text.len()))
        .collect();
    let n_chars = bounds.len() - 1;

    let stride = config.max_chars - config.overlap_chars;
    let mut windows: Vec<String> = Vec::new();
    let mut start = 0usize;

    while start < n_chars {
        let end = (start + config.max_chars).min(n_chars);
        let window = &text[bounds[start]..bounds[end]];

        let is_final = end == n_chars;
        if is_final && end - start < config.min_chars && !windows.is_empty() {
            // Short tail: extend the previous chunk instead of emitting a
            // near-empty fragment.
            let prev_start = start - stride;
            let merged = &text[bounds[prev_start]..bounds[end]];
            let last = windows.last_mut().expect("previous window exists");
            *last = merged.to_string();
            break;
        }

        windows.push(window.to_string());
        if is_final {
            break;
        }
        start += stride;
    }

    windows
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn conf(max_chars: usize, overlap_chars: usize, min_chars: usize) -> ChunkingConfig {
        ChunkingConfig {
            max_chars,
            overlap_chars,
            min_chars,
        }
    }

    fn unit(text: &str) -> Unit {
        Unit::new(
            "docs/sample.md".to_string(),
            SourceType::Markdown,
            text.to_string(),
            BTreeMap::new(),
        )
    }

    #[test]
    fn test_single_window() {
        let planner = ChunkPlanner::new(conf(100, 20, 10));
        let chunks = planner.plan(&unit("short text"));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "short text");
        assert_eq!(chunks[0].index, 0);
    }

    #[test]
    fn test_empty_text_yields_no_chunks() {
        let planner = ChunkPlanner::new(conf(100, 20, 10));
        assert!(planner.plan(&unit("")).is_empty());
    }

    #[test]
    fn test_overlapping_windows() {
        // 10-char window, 4-char overlap: stride 6.
        let planner = ChunkPlanner::new(conf(10, 4, 1));
        let chunks = planner.plan(&unit("abcdefghijklmnopqrstuv"));

        assert_eq!(chunks[0].text, "abcdefghij");
        assert_eq!(chunks[1].text, "ghijklmnop");
        assert_eq!(chunks[2].text, "mnopqrstuv");
        assert_eq!(chunks.len(), 3);
    }

    #[test]
    fn test_short_tail_merges_into_previous() {
        // 22 chars, stride 8: windows at 0, 8, 16. The window at 16 has 6
        // chars, below min_chars 8, so it merges into the previous chunk.
        let planner = ChunkPlanner::new(conf(10, 2, 8));
        let chunks = planner.plan(&unit("abcdefghijklmnopqrstuv"));

        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].text, "abcdefghij");
        assert_eq!(chunks[1].text, "ijklmnopqrstuv");
    }

    #[test]
    fn test_indices_contiguous() {
        let planner = ChunkPlanner::new(conf(8, 2, 1));
        let text = "word ".repeat(40);
        let chunks = planner.plan(&unit(&text));
        for (i, chunk) in chunks.iter().enumerate() {
            assert_eq!(chunk.index, i as u64);
        }
    }

    #[test]
    fn test_deterministic() {
        let planner = ChunkPlanner::new(conf(12, 3, 4));
        let text = "The quick brown fox jumps over the lazy dog.";
        let first = planner.plan(&unit(text));
        let second = planner.plan(&unit(text));
        assert_eq!(first, second);
    }

    #[test]
    fn test_multibyte_never_splits_code_points() {
        let planner = ChunkPlanner::new(conf(4, 1, 1));
        let chunks = planner.plan(&unit("héllo wörld ünïcode"));
        let rebuilt: String = chunks.iter().map(|c| c.text.as_str()).collect();
        // Every slice is valid UTF-8 by construction; spot-check content.
        assert!(rebuilt.contains('é'));
        assert!(rebuilt.contains('ö'));
    }

    #[test]
    fn test_plan_count_matches_plan() {
        let planner = ChunkPlanner::new(conf(10, 4, 3));
        let u = unit("abcdefghijklmnopqrstuvwxyz");
        assert_eq!(planner.plan_count(&u), planner.plan(&u).len() as u64);
    }

    #[test]
    fn test_chunk_id_format() {
        assert_eq!(chunk_id("deadbeef01234567", 3), "deadbeef01234567:3");
    }

    #[test]
    fn test_should_index_unit_filters_media_stubs() {
        let stub = Unit::new(
            "img/logo.png".to_string(),
            SourceType::MediaStub,
            "[media: img/logo.png]".to_string(),
            BTreeMap::new(),
        );
        assert!(!should_index_unit(&stub, false));
        assert!(should_index_unit(&stub, true));
        assert!(should_index_unit(&unit("text"), false));
    }

    #[test]
    fn test_metadata_carries_source_fields() {
        let planner = ChunkPlanner::new(conf(100, 10, 5));
        let mut u = unit("some text");
        u.attrs
            .insert("relative_path".to_string(), "docs/sample.md".to_string());
        let chunks = planner.plan(&u);
        assert_eq!(chunks[0].metadata.get("source_uri").unwrap(), "docs/sample.md");
        assert_eq!(chunks[0].metadata.get("source_type").unwrap(), "markdown");
    }
}
