// file: src/wal/mod.rs
// description: write-ahead log module exports
// reference: internal module structure

pub mod event;
pub mod reader;
pub mod writer;

pub use event::{EventKind, SyncMode, WAL_VERSION, WalEvent, WalScope};
pub use reader::{DoneDoc, ResumeState, read_wal};
pub use writer::WalWriter;
