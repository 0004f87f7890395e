// file: src/corpus/source.rs
// description: filesystem unit source with filtering and stable ordering
// reference: https://docs.rs/walkdir

use crate::config::CorpusConfig;
use crate::corpus::normalizer::TextNormalizer;
use crate::error::{IndexError, Result};
use crate::utils::Validator;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    Markdown,
    PlainText,
    Code,
    MediaStub,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Markdown => "markdown",
            SourceType::PlainText => "plain_text",
            SourceType::Code => "code",
            SourceType::MediaStub => "media_stub",
        }
    }

    fn from_extension(ext: Option<&str>) -> Self {
        match ext {
            Some("md") | Some("markdown") => SourceType::Markdown,
            Some("rs") | Some("py") | Some("js") | Some("ts") | Some("go") | Some("java")
            | Some("c") | Some("h") | Some("cpp") | Some("sh") | Some("toml") | Some("json")
            | Some("yaml") | Some("yml") => SourceType::Code,
            Some("png") | Some("jpg") | Some("jpeg") | Some("gif") | Some("svg")
            | Some("webp") | Some("mp3") | Some("mp4") | Some("wav") | Some("pdf") => {
                SourceType::MediaStub
            }
            _ => SourceType::PlainText,
        }
    }
}

/// One source document before chunking. `text` is already normalized; the
/// `doc_id` is derived from `source_uri` alone and is stable across runs.
#[derive(Debug, Clone)]
pub struct Unit {
    pub source_uri: String,
    pub source_type: SourceType,
    pub doc_id: String,
    pub text: String,
    pub attrs: BTreeMap<String, String>,
}

impl Unit {
    pub fn new(
        source_uri: String,
        source_type: SourceType,
        text: String,
        attrs: BTreeMap<String, String>,
    ) -> Self {
        let doc_id = derive_doc_id(&source_uri);
        Self {
            source_uri,
            source_type,
            doc_id,
            text,
            attrs,
        }
    }
}

/// Deterministic document identifier: leading 16 hex chars of the SHA-256 of
/// the source URI.
pub fn derive_doc_id(source_uri: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(source_uri.as_bytes());
    let digest = format!("{:x}", hasher.finalize());
    digest[..16].to_string()
}

pub struct FsUnitSource {
    config: CorpusConfig,
    normalizer: TextNormalizer,
}

impl FsUnitSource {
    pub fn new(config: CorpusConfig) -> Self {
        Self {
            config,
            normalizer: TextNormalizer::new(),
        }
    }

    /// Walks the corpus root and yields units in sorted relative-path order,
    /// so a corpus snapshot is consumed in the same order on every run.
    pub fn scan(&self) -> Result<Vec<Unit>> {
        let root = &self.config.root_dir;
        info!("Scanning corpus directory: {}", root.display());

        if !root.is_dir() {
            return Err(IndexError::Validation(format!(
                "Corpus root is not a directory: {}",
                root.display()
            )));
        }

        let max_size = (self.config.max_file_size_mb * 1024 * 1024) as u64;
        let mut units = Vec::new();

        for entry in WalkDir::new(root)
            .follow_links(false)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();

            if self.should_skip(path) {
                debug!("Skipping file: {}", path.display());
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(metadata) => metadata,
                Err(err) => {
                    warn!("Cannot stat {}; skipping: {}", path.display(), err);
                    continue;
                }
            };

            if metadata.len() > max_size {
                debug!(
                    "Skipping large file ({} MB): {}",
                    metadata.len() / 1024 / 1024,
                    path.display()
                );
                continue;
            }

            let relative_path = path
                .strip_prefix(root)
                .unwrap_or(path)
                .to_string_lossy()
                .replace('\\', "/");

            match self.read_unit(path, &relative_path, &metadata) {
                Ok(unit) => units.push(unit),
                Err(err) => {
                    warn!("Cannot read {}; skipping: {}", path.display(), err);
                }
            }
        }

        units.sort_by(|a, b| a.source_uri.cmp(&b.source_uri));
        info!("Found {} corpus units", units.len());
        Ok(units)
    }

    fn read_unit(
        &self,
        path: &Path,
        relative_path: &str,
        metadata: &fs::Metadata,
    ) -> Result<Unit> {
        let source_type =
            SourceType::from_extension(path.extension().and_then(|e| e.to_str()));

        let text = if source_type == SourceType::MediaStub {
            // Placeholder text keeps media units addressable without
            // pretending to have extractable content.
            format!("[media: {}]", relative_path)
        } else {
            let raw = fs::read_to_string(path).map_err(|source| IndexError::Corpus {
                path: path.to_path_buf(),
                source,
            })?;
            Validator::validate_content_not_empty(&raw)?;
            self.normalizer.normalize(&raw)
        };

        let modified = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(std::time::UNIX_EPOCH).ok())
            .map(|d| d.as_secs())
            .unwrap_or(0);

        let mut attrs = BTreeMap::new();
        attrs.insert("relative_path".to_string(), relative_path.to_string());
        attrs.insert("file_size".to_string(), metadata.len().to_string());
        attrs.insert("modified".to_string(), modified.to_string());

        Ok(Unit::new(
            relative_path.to_string(),
            source_type,
            text,
            attrs,
        ))
    }

    fn should_skip(&self, path: &Path) -> bool {
        let path_str = path.to_string_lossy();

        for pattern in &self.config.skip_patterns {
            if let Some(suffix) = pattern.strip_prefix("*.") {
                if path_str.ends_with(&format!(".{}", suffix)) {
                    return true;
                }
            } else if let Some(prefix) = pattern.strip_suffix("/*") {
                if path_str.contains(&format!("{}/", prefix)) {
                    return true;
                }
            } else if path_str.contains(pattern.as_str()) {
                return true;
            }
        }

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn test_config(root: &Path) -> CorpusConfig {
        CorpusConfig {
            root_dir: root.to_path_buf(),
            skip_patterns: vec!["*.zip".to_string(), ".git/*".to_string()],
            max_file_size_mb: 10,
            include_media_stubs: false,
        }
    }

    #[test]
    fn test_doc_id_stable_and_short() {
        let a = derive_doc_id("docs/guide.md");
        let b = derive_doc_id("docs/guide.md");
        assert_eq!(a, b);
        assert_eq!(a.len(), 16);
        assert_ne!(a, derive_doc_id("docs/other.md"));
    }

    #[test]
    fn test_scan_stable_order() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("b.md"), "# B").unwrap();
        fs::write(temp.path().join("a.md"), "# A").unwrap();
        fs::write(temp.path().join("c.txt"), "C").unwrap();

        let source = FsUnitSource::new(test_config(temp.path()));
        let units = source.scan().unwrap();

        let uris: Vec<&str> = units.iter().map(|u| u.source_uri.as_str()).collect();
        assert_eq!(uris, vec!["a.md", "b.md", "c.txt"]);
        assert_eq!(units[0].source_type, SourceType::Markdown);
        assert_eq!(units[2].source_type, SourceType::PlainText);
    }

    #[test]
    fn test_scan_normalizes_text() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("doc.md"), "line one   \r\nline two\r\n").unwrap();

        let source = FsUnitSource::new(test_config(temp.path()));
        let units = source.scan().unwrap();

        assert_eq!(units[0].text, "line one\nline two");
    }

    #[test]
    fn test_empty_files_are_skipped() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("empty.md"), "").unwrap();
        fs::write(temp.path().join("blank.md"), "   \n\t\n").unwrap();
        fs::write(temp.path().join("real.md"), "content").unwrap();

        let source = FsUnitSource::new(test_config(temp.path()));
        let units = source.scan().unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].source_uri, "real.md");
    }

    #[test]
    fn test_media_files_become_stubs() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("logo.png"), [0xFFu8, 0xD8, 0x00]).unwrap();

        let source = FsUnitSource::new(test_config(temp.path()));
        let units = source.scan().unwrap();

        assert_eq!(units.len(), 1);
        assert_eq!(units[0].source_type, SourceType::MediaStub);
        assert_eq!(units[0].text, "[media: logo.png]");
    }

    #[test]
    fn test_skip_patterns() {
        let temp = TempDir::new().unwrap();
        let source = FsUnitSource::new(test_config(temp.path()));

        assert!(source.should_skip(Path::new("archive.zip")));
        assert!(source.should_skip(Path::new(".git/config")));
        assert!(!source.should_skip(Path::new("readme.md")));
    }

    #[test]
    fn test_attrs_carry_relative_path() {
        let temp = TempDir::new().unwrap();
        fs::create_dir_all(temp.path().join("nested")).unwrap();
        fs::write(temp.path().join("nested/doc.md"), "content").unwrap();

        let source = FsUnitSource::new(test_config(temp.path()));
        let units = source.scan().unwrap();

        assert_eq!(units[0].attrs.get("relative_path").unwrap(), "nested/doc.md");
    }
}
