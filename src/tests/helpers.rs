//! Shared test utilities

use crate::{
    codec::SourcePosition,
    event::{GraphEvent, ScanGeneration},
    properties::{NoteId, NoteRecord, OutgoingLink, Tag},
};

/// Initialize logging for tests
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init()
        .ok();
}

pub fn note_id(path: &str) -> NoteId {
    NoteId::parse(path).expect("valid test note id")
}

/// A record for `path` linking to `targets` (project-relative) and carrying `tags`.
pub fn note_record(path: &str, targets: &[&str], tags: &[&str]) -> NoteRecord {
    let mut record = NoteRecord::empty(note_id(path));
    record.links = targets
        .iter()
        .enumerate()
        .map(|(idx, target)| OutgoingLink {
            target_raw: format!("/{target}"),
            target_path: note_id(target),
            target_id: None,
            position: SourcePosition::new(idx * 20, idx + 1, 1),
        })
        .collect();
    record.tags = tags
        .iter()
        .filter_map(|tag| Tag::canonicalize(tag, '#'))
        .collect();
    record
}

pub fn upsert(record: NoteRecord, generation: u64) -> GraphEvent {
    GraphEvent::Upsert {
        record,
        generation: ScanGeneration(generation),
    }
}

pub fn removed(path: &str, generation: u64) -> GraphEvent {
    GraphEvent::Removed {
        id: note_id(path),
        generation: ScanGeneration(generation),
    }
}
