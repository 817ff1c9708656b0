use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use tokio::sync::oneshot;

use crate::{
    codec::NoteDiagnostic,
    properties::{NoteId, NoteRecord},
};

/// Per-path scan counter. Callers hand out increasing generations as they (re)scan files; the
/// graph never applies a result older than one it has already applied for the same path.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ScanGeneration(pub u64);

impl ScanGeneration {
    pub fn next(self) -> ScanGeneration {
        ScanGeneration(self.0 + 1)
    }
}

impl Display for ScanGeneration {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        write!(f, "gen {}", self.0)
    }
}

/// Updates flowing into the single graph writer.
#[derive(Debug)]
pub enum GraphEvent {
    /// Replace (or create) the record for `record.id`
    Upsert {
        record: NoteRecord,
        generation: ScanGeneration,
    },
    /// The loader reported the file as deleted
    Removed {
        id: NoteId,
        generation: ScanGeneration,
    },
    /// Barrier: answered with the graph version once every earlier event is applied
    Flush(oneshot::Sender<u64>),
    /// Recompute the backlink index from scratch and log any mismatch
    BuiltInTest,
}

impl Display for GraphEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            GraphEvent::Upsert { record, generation } => {
                write!(f, "Upsert({}, {generation})", record.id)
            }
            GraphEvent::Removed { id, generation } => write!(f, "Removed({id}, {generation})"),
            GraphEvent::Flush(_) => write!(f, "Flush"),
            GraphEvent::BuiltInTest => write!(f, "BuiltInTest"),
        }
    }
}

/// Changes the graph reports back to observers after applying a [GraphEvent].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteEvent {
    RecordUpdated(NoteId),
    RecordRemoved(NoteId),
    /// The backlink set of this note gained or lost members
    BacklinksChanged(NoteId),
    /// A result older than the applied generation was dropped
    StaleDiscarded {
        id: NoteId,
        generation: ScanGeneration,
        current: ScanGeneration,
    },
    /// A graph-level finding, such as a dangling link, for the given note
    Diagnostic(NoteId, NoteDiagnostic),
}

impl Display for NoteEvent {
    fn fmt(&self, f: &mut Formatter) -> std::fmt::Result {
        match self {
            NoteEvent::RecordUpdated(id) => write!(f, "RecordUpdated({id})"),
            NoteEvent::RecordRemoved(id) => write!(f, "RecordRemoved({id})"),
            NoteEvent::BacklinksChanged(id) => write!(f, "BacklinksChanged({id})"),
            NoteEvent::StaleDiscarded {
                id,
                generation,
                current,
            } => write!(f, "StaleDiscarded({id}, {generation} < {current})"),
            NoteEvent::Diagnostic(id, diagnostic) => write!(f, "Diagnostic({id}: {diagnostic})"),
        }
    }
}
