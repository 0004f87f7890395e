// file: src/corpus/mod.rs
// description: corpus unit source module exports
// reference: internal module structure

pub mod normalizer;
pub mod source;

pub use normalizer::TextNormalizer;
pub use source::{FsUnitSource, SourceType, Unit, derive_doc_id};
