use parking_lot::{RwLock, RwLockReadGuard};
use std::sync::Arc;
use tokio::{
    sync::{
        mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender},
        oneshot,
    },
    task::JoinHandle,
};

use crate::{
    codec::ParseResult,
    error::ZettelError,
    event::{GraphEvent, NoteEvent, ScanGeneration},
    graph::NoteGraph,
    properties::NoteId,
};

/// The single writer of a shared [NoteGraph].
///
/// Workers never lock the graph for writing themselves; they send [GraphEvent]s, and the
/// aggregator applies them one at a time in arrival order. Each write lock is held for exactly
/// one [NoteGraph::apply] call.
pub struct GraphAggregator {
    graph: Arc<RwLock<NoteGraph>>,
    rx: UnboundedReceiver<GraphEvent>,
    event_tx: Option<UnboundedSender<NoteEvent>>,
}

impl GraphAggregator {
    pub fn new(
        graph: Arc<RwLock<NoteGraph>>,
        rx: UnboundedReceiver<GraphEvent>,
        event_tx: Option<UnboundedSender<NoteEvent>>,
    ) -> Self {
        GraphAggregator {
            graph,
            rx,
            event_tx,
        }
    }

    /// Apply events until every sender is dropped.
    pub async fn run(mut self) {
        tracing::debug!("[GraphAggregator] started");
        while let Some(event) = self.rx.recv().await {
            tracing::trace!("[GraphAggregator] applying {event}");
            let note_events = {
                let mut graph = self.graph.write();
                graph.apply(event)
            };
            let Some(tx) = self.event_tx.as_ref() else {
                continue;
            };
            let forwarded: Result<(), ZettelError> = note_events
                .into_iter()
                .try_for_each(|note_event| Ok(tx.send(note_event)?));
            if let Err(e) = forwarded {
                tracing::warn!("[GraphAggregator] {e}; no longer forwarding events");
                self.event_tx = None;
            }
        }
        tracing::debug!("[GraphAggregator] all senders dropped, stopping");
    }
}

/// Cheap, clonable access to a graph maintained by a [GraphAggregator] task.
#[derive(Clone)]
pub struct NoteGraphHandle {
    graph: Arc<RwLock<NoteGraph>>,
    tx: UnboundedSender<GraphEvent>,
}

impl NoteGraphHandle {
    /// Start the aggregator for `graph` on the current tokio runtime.
    ///
    /// The task ends once every handle is dropped. Graph changes are reported on `event_tx`
    /// when given.
    pub fn spawn(
        graph: NoteGraph,
        event_tx: Option<UnboundedSender<NoteEvent>>,
    ) -> (NoteGraphHandle, JoinHandle<()>) {
        let graph = Arc::new(RwLock::new(graph));
        let (tx, rx) = unbounded_channel();
        let aggregator = GraphAggregator::new(graph.clone(), rx, event_tx);
        let join = tokio::spawn(aggregator.run());
        (NoteGraphHandle { graph, tx }, join)
    }

    pub fn send(&self, event: GraphEvent) -> Result<(), ZettelError> {
        self.tx.send(event)?;
        Ok(())
    }

    /// Queue a parse result. Results without a record leave the graph untouched and are not
    /// sent.
    pub fn submit(&self, result: ParseResult) -> Result<bool, ZettelError> {
        match result.into_event() {
            Some(event) => {
                self.send(event)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn remove(&self, id: NoteId, generation: ScanGeneration) -> Result<(), ZettelError> {
        self.send(GraphEvent::Removed { id, generation })
    }

    /// Wait until everything sent before this call has been applied; returns the graph version.
    pub async fn flush(&self) -> Result<u64, ZettelError> {
        let (tx, rx) = oneshot::channel();
        self.send(GraphEvent::Flush(tx))?;
        Ok(rx.await?)
    }

    /// Short-lived read access. Do not hold the guard across an await point.
    pub fn read(&self) -> RwLockReadGuard<'_, NoteGraph> {
        self.graph.read()
    }

    /// An owned copy of the current graph.
    pub fn snapshot(&self) -> NoteGraph {
        self.graph.read().clone()
    }
}
