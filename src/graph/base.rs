use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::{
    codec::NoteDiagnostic,
    event::{GraphEvent, NoteEvent, ScanGeneration},
    properties::{NoteId, NoteRecord, OutgoingLink, Tag},
};

type IdIndex = BTreeMap<NoteId, BTreeSet<NoteId>>;

/// The link graph over every known note.
///
/// `records` is the source of truth. `backlinks` inverts every resolved outgoing link and
/// `dangling` inverts every unresolved one, so a note appearing later can pick up the links
/// that were already waiting for it. Neither index keeps empty sets.
///
/// All mutation goes through [NoteGraph::apply] (one event at a time) or [NoteGraph::build]
/// (from scratch). Sharing the graph between threads is the job of
/// [NoteGraphHandle](crate::graph::NoteGraphHandle).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteGraph {
    records: BTreeMap<NoteId, NoteRecord>,
    backlinks: IdIndex,
    dangling: IdIndex,
    /// Last applied generation per path. Entries outlive removed records.
    generations: BTreeMap<NoteId, ScanGeneration>,
    version: u64,
}

fn index_insert(index: &mut IdIndex, key: &NoteId, member: &NoteId) -> bool {
    index.entry(key.clone()).or_default().insert(member.clone())
}

fn index_remove(index: &mut IdIndex, key: &NoteId, member: &NoteId) -> bool {
    let Some(members) = index.get_mut(key) else {
        return false;
    };
    let removed = members.remove(member);
    if members.is_empty() {
        index.remove(key);
    }
    removed
}

fn dangling_diagnostic(source: &NoteId, link: &OutgoingLink) -> NoteDiagnostic {
    NoteDiagnostic::DanglingLink {
        source: source.clone(),
        target: link.target_raw.clone(),
        target_path: link.target_path.clone(),
        position: link.position,
    }
}

/// Resolved and unresolved target sets of one record.
fn link_targets(record: &NoteRecord) -> (BTreeSet<NoteId>, BTreeSet<NoteId>) {
    let mut resolved = BTreeSet::new();
    let mut dangling = BTreeSet::new();
    for link in record.links.iter() {
        match &link.target_id {
            Some(target) => resolved.insert(target.clone()),
            None => dangling.insert(link.target_path.clone()),
        };
    }
    (resolved, dangling)
}

impl NoteGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Full rebuild from a record collection. A later record for the same id wins.
    #[tracing::instrument(skip_all)]
    pub fn build<I: IntoIterator<Item = NoteRecord>>(records: I) -> NoteGraph {
        let mut graph = NoteGraph::default();
        for record in records {
            graph
                .generations
                .insert(record.id.clone(), ScanGeneration::default());
            graph.records.insert(record.id.clone(), record);
        }

        let known: BTreeSet<NoteId> = graph.records.keys().cloned().collect();
        for record in graph.records.values_mut() {
            for link in record.links.iter_mut() {
                link.target_id = known
                    .contains(&link.target_path)
                    .then(|| link.target_path.clone());
            }
        }
        let (backlinks, dangling) = graph.derive_indices();
        graph.backlinks = backlinks;
        graph.dangling = dangling;
        graph.version = 1;
        tracing::debug!(
            "[NoteGraph] built {} note(s), {} with backlinks, {} dangling target(s)",
            graph.records.len(),
            graph.backlinks.len(),
            graph.dangling.len()
        );
        graph
    }

    /// Apply one update and report what changed.
    #[tracing::instrument(skip_all, fields(event = %event))]
    pub fn apply(&mut self, event: GraphEvent) -> Vec<NoteEvent> {
        match event {
            GraphEvent::Upsert { record, generation } => self.upsert(record, generation),
            GraphEvent::Removed { id, generation } => self.remove(id, generation),
            GraphEvent::Flush(tx) => {
                if tx.send(self.version).is_err() {
                    tracing::debug!("[NoteGraph] flush requester went away");
                }
                Vec::new()
            }
            GraphEvent::BuiltInTest => {
                let errors = self.built_in_test();
                if errors.is_empty() {
                    tracing::debug!("[NoteGraph] built in test passed");
                } else {
                    tracing::warn!("[NoteGraph] built in test failed:\n{}", errors.join("\n"));
                }
                Vec::new()
            }
        }
    }

    fn is_stale(&self, id: &NoteId, generation: ScanGeneration) -> Option<NoteEvent> {
        let current = *self.generations.get(id)?;
        (generation < current).then(|| NoteEvent::StaleDiscarded {
            id: id.clone(),
            generation,
            current,
        })
    }

    /// Withdraw a record's links from both indices.
    fn withdraw(&mut self, record: &NoteRecord) {
        let (resolved, dangling) = link_targets(record);
        for target in resolved.iter() {
            index_remove(&mut self.backlinks, target, &record.id);
        }
        for target in dangling.iter() {
            index_remove(&mut self.dangling, target, &record.id);
        }
    }

    fn upsert(&mut self, mut record: NoteRecord, generation: ScanGeneration) -> Vec<NoteEvent> {
        let id = record.id.clone();
        if let Some(stale) = self.is_stale(&id, generation) {
            tracing::debug!("[NoteGraph] {stale}");
            return vec![stale];
        }

        let previous = self.records.remove(&id);
        let old_targets = match previous.as_ref() {
            Some(old) => {
                self.withdraw(old);
                link_targets(old).0
            }
            None => BTreeSet::new(),
        };

        let mut events = vec![NoteEvent::RecordUpdated(id.clone())];
        for link in record.links.iter_mut() {
            let exists = link.target_path == id || self.records.contains_key(&link.target_path);
            link.target_id = exists.then(|| link.target_path.clone());
        }
        let (new_targets, dangling_targets) = link_targets(&record);
        for target in new_targets.iter() {
            index_insert(&mut self.backlinks, target, &id);
        }
        for target in dangling_targets.iter() {
            index_insert(&mut self.dangling, target, &id);
        }
        for link in record.links.iter().filter(|link| link.is_dangling()) {
            events.push(NoteEvent::Diagnostic(
                id.clone(),
                dangling_diagnostic(&id, link),
            ));
        }

        // Only the symmetric difference of old and new targets saw their backlinks change.
        let mut changed: BTreeSet<NoteId> = old_targets
            .symmetric_difference(&new_targets)
            .cloned()
            .collect();

        if previous.is_none() && self.resolve_waiting_on(&id) {
            changed.insert(id.clone());
        }
        events.extend(changed.into_iter().map(NoteEvent::BacklinksChanged));

        self.records.insert(id.clone(), record);
        self.generations.insert(id, generation);
        self.version += 1;
        events
    }

    /// A note with this id just appeared: resolve every link that was dangling towards it.
    fn resolve_waiting_on(&mut self, id: &NoteId) -> bool {
        let Some(sources) = self.dangling.remove(id) else {
            return false;
        };
        for source in sources.iter() {
            if let Some(record) = self.records.get_mut(source) {
                for link in record.links.iter_mut() {
                    if &link.target_path == id {
                        link.target_id = Some(id.clone());
                    }
                }
            }
            index_insert(&mut self.backlinks, id, source);
        }
        tracing::debug!(
            "[NoteGraph] {id} resolved dangling links from {} note(s)",
            sources.len()
        );
        true
    }

    fn remove(&mut self, id: NoteId, generation: ScanGeneration) -> Vec<NoteEvent> {
        if let Some(stale) = self.is_stale(&id, generation) {
            tracing::debug!("[NoteGraph] {stale}");
            return vec![stale];
        }
        self.generations.insert(id.clone(), generation);
        let Some(previous) = self.records.remove(&id) else {
            return Vec::new();
        };
        self.withdraw(&previous);

        let mut events = vec![NoteEvent::RecordRemoved(id.clone())];
        events.extend(
            link_targets(&previous)
                .0
                .into_iter()
                .filter(|target| target != &id)
                .map(NoteEvent::BacklinksChanged),
        );

        // Links from other notes now point nowhere.
        if let Some(sources) = self.backlinks.remove(&id) {
            for source in sources.iter() {
                let Some(record) = self.records.get_mut(source) else {
                    continue;
                };
                for link in record.links.iter_mut() {
                    if link.target_id.as_ref() == Some(&id) {
                        link.target_id = None;
                        events.push(NoteEvent::Diagnostic(
                            source.clone(),
                            dangling_diagnostic(source, link),
                        ));
                    }
                }
                index_insert(&mut self.dangling, &id, source);
            }
        }
        self.version += 1;
        events
    }

    pub fn get(&self, id: &NoteId) -> Option<&NoteRecord> {
        self.records.get(id)
    }

    pub fn contains(&self, id: &NoteId) -> bool {
        self.records.contains_key(id)
    }

    pub fn records(&self) -> impl Iterator<Item = &NoteRecord> {
        self.records.values()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Notes with at least one resolved link to `id`.
    pub fn backlinks(&self, id: &NoteId) -> impl Iterator<Item = &NoteId> {
        self.backlinks.get(id).into_iter().flatten()
    }

    pub fn outgoing(&self, id: &NoteId) -> &[OutgoingLink] {
        self.records
            .get(id)
            .map(|record| record.links.as_slice())
            .unwrap_or_default()
    }

    pub fn notes_with_tag<'a>(&'a self, tag: &'a Tag) -> impl Iterator<Item = &'a NoteRecord> {
        self.records.values().filter(move |record| record.has_tag(tag))
    }

    /// Every tag in use with the number of notes carrying it.
    pub fn tags(&self) -> BTreeMap<&Tag, usize> {
        let mut counts = BTreeMap::new();
        for tag in self.records.values().flat_map(|record| record.tags.iter()) {
            *counts.entry(tag).or_insert(0) += 1;
        }
        counts
    }

    /// One diagnostic per outgoing link without a target note.
    pub fn dangling_links(&self) -> Vec<NoteDiagnostic> {
        self.records
            .values()
            .flat_map(|record| {
                record
                    .links
                    .iter()
                    .filter(|link| link.is_dangling())
                    .map(|link| dangling_diagnostic(&record.id, link))
            })
            .collect()
    }

    /// The note's own diagnostics followed by its dangling links.
    pub fn diagnostics_for(&self, id: &NoteId) -> Vec<NoteDiagnostic> {
        let Some(record) = self.records.get(id) else {
            return Vec::new();
        };
        record
            .diagnostics
            .iter()
            .cloned()
            .chain(
                record
                    .links
                    .iter()
                    .filter(|link| link.is_dangling())
                    .map(|link| dangling_diagnostic(id, link)),
            )
            .collect()
    }

    /// Incremented by every applied change.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn generation(&self, id: &NoteId) -> Option<ScanGeneration> {
        self.generations.get(id).copied()
    }

    fn derive_indices(&self) -> (IdIndex, IdIndex) {
        let mut backlinks = IdIndex::new();
        let mut dangling = IdIndex::new();
        for record in self.records.values() {
            let (resolved, unresolved) = link_targets(record);
            for target in resolved.iter() {
                index_insert(&mut backlinks, target, &record.id);
            }
            for target in unresolved.iter() {
                index_insert(&mut dangling, target, &record.id);
            }
        }
        (backlinks, dangling)
    }

    /// Check the graph against a from-scratch derivation. Returns one message per mismatch; an
    /// empty result means every index agrees with the records.
    pub fn built_in_test(&self) -> Vec<String> {
        let mut errors = Vec::new();
        for (key, record) in self.records.iter() {
            if key != &record.id {
                errors.push(format!("record {} is stored under {key}", record.id));
            }
            for link in record.links.iter() {
                let exists = self.records.contains_key(&link.target_path);
                match &link.target_id {
                    Some(target) if target != &link.target_path => errors.push(format!(
                        "{key}: link {:?} resolved to {target} instead of {}",
                        link.target_raw, link.target_path
                    )),
                    Some(target) if !exists => errors.push(format!(
                        "{key}: link {:?} resolved to missing note {target}",
                        link.target_raw
                    )),
                    None if exists => errors.push(format!(
                        "{key}: link {:?} is dangling but {} exists",
                        link.target_raw, link.target_path
                    )),
                    _ => {}
                }
            }
        }

        let (backlinks, dangling) = self.derive_indices();
        for (name, expected, actual) in [
            ("backlinks", &backlinks, &self.backlinks),
            ("dangling", &dangling, &self.dangling),
        ] {
            for key in expected.keys().chain(actual.keys()).collect::<BTreeSet<_>>() {
                let want = expected.get(key);
                let have = actual.get(key);
                if want != have {
                    errors.push(format!(
                        "{name}[{key}]: expected {:?}, found {:?}",
                        want.map(|set| set.iter().map(NoteId::as_str).collect::<Vec<_>>()),
                        have.map(|set| set.iter().map(NoteId::as_str).collect::<Vec<_>>()),
                    ));
                }
            }
        }
        errors
    }
}
