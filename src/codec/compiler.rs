use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::{
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};
use typst_syntax::SyntaxNode;

use crate::{
    codec::{
        assembler::NoteAssembler,
        diagnostic::NoteDiagnostic,
        frontmatter::{note_body, parse_front_matter},
        walker::CallPatternMatcher,
    },
    config::Config,
    error::ZettelError,
    event::{GraphEvent, ScanGeneration},
    properties::{NoteId, NoteRecord, SourceFile},
};

/// Runs the per-file pipeline (front matter, tree walk, assembly) under one validated
/// configuration.
///
/// The compiler holds no mutable state besides its generation counter, so it can be shared
/// across worker threads. Results are handed to the graph writer as [GraphEvent]s; the compiler
/// never touches the graph itself.
#[derive(Debug)]
pub struct NoteCompiler {
    root: PathBuf,
    config: Arc<Config>,
    generation: AtomicU64,
}

/// Result of processing a single file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseResult {
    pub id: NoteId,
    pub generation: ScanGeneration,
    /// Absent when the file could not be parsed; the graph keeps whatever it had before
    pub record: Option<NoteRecord>,
    /// Everything reported for this file during this scan
    pub diagnostics: Vec<NoteDiagnostic>,
}

impl ParseResult {
    pub fn is_ok(&self) -> bool {
        self.record.is_some()
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics.iter().any(NoteDiagnostic::is_error)
    }

    /// The update to send to the graph, if the scan produced a record.
    pub fn into_event(self) -> Option<GraphEvent> {
        let generation = self.generation;
        self.record
            .map(|record| GraphEvent::Upsert { record, generation })
    }
}

impl NoteCompiler {
    /// Validates `config` once; nothing is processed under an invalid configuration.
    pub fn new(root: impl AsRef<Path>, config: Config) -> Result<Self, ZettelError> {
        let config = config.validated()?;
        Ok(NoteCompiler {
            root: root.as_ref().to_path_buf(),
            config: Arc::new(config),
            generation: AtomicU64::new(0),
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> Arc<Config> {
        self.config.clone()
    }

    /// Hand out the next scan generation. Strictly increasing across all paths.
    pub fn next_generation(&self) -> ScanGeneration {
        ScanGeneration(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    /// Whether `path` carries one of the configured source note extensions.
    pub fn accepts(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| self.config.is_source_extension(ext))
    }

    pub fn note_id(&self, path: &Path) -> Result<NoteId, ZettelError> {
        NoteId::from_path(&self.root, path)
    }

    /// Process one file against an externally supplied syntax tree for its full text.
    #[tracing::instrument(skip_all, fields(path = %file.path.display()))]
    pub fn compile(
        &self,
        file: &SourceFile,
        tree: &SyntaxNode,
        generation: ScanGeneration,
    ) -> Result<ParseResult, ZettelError> {
        if !self.accepts(&file.path) {
            return Err(ZettelError::UnhandledFiletype(file.path.display().to_string()));
        }
        let id = self.note_id(&file.path)?;

        let matcher = CallPatternMatcher::new(&self.config);
        let ((front_matter, front_matter_diagnostics), walked) = rayon::join(
            || parse_front_matter(&file.raw_text),
            || matcher.walk(tree),
        );

        let extraction = match walked {
            Ok(extraction) => extraction,
            Err(issues) => {
                tracing::warn!("[Compiler] {id}: syntax errors, keeping the previous record");
                return Ok(ParseResult {
                    id,
                    generation,
                    record: None,
                    diagnostics: vec![NoteDiagnostic::Syntax(issues)],
                });
            }
        };

        let mut record = NoteAssembler::new(&self.config).assemble(
            id.clone(),
            front_matter,
            front_matter_diagnostics,
            extraction,
        );
        record.count_text(note_body(&file.raw_text));
        tracing::debug!(
            "[Compiler] {id} ({generation}): {} tag(s), {} link(s), {} diagnostic(s)",
            record.tags.len(),
            record.links.len(),
            record.diagnostics.len()
        );
        Ok(ParseResult {
            id,
            generation,
            diagnostics: record.diagnostics.clone(),
            record: Some(record),
        })
    }

    /// Parse `file` with the host grammar, then [NoteCompiler::compile] it.
    pub fn compile_source(
        &self,
        file: &SourceFile,
        generation: ScanGeneration,
    ) -> Result<ParseResult, ZettelError> {
        let tree = typst_syntax::parse(&file.raw_text);
        self.compile(file, &tree, generation)
    }

    /// Process many files in parallel, each under a fresh generation.
    ///
    /// Per-file failures stay per file; the order of results matches the order of `files`.
    #[tracing::instrument(skip_all, fields(files = files.len()))]
    pub fn compile_batch(&self, files: &[SourceFile]) -> Vec<Result<ParseResult, ZettelError>> {
        let generations: Vec<ScanGeneration> =
            files.iter().map(|_| self.next_generation()).collect();
        files
            .par_iter()
            .zip(generations.par_iter())
            .map(|(file, generation)| self.compile_source(file, *generation))
            .collect()
    }
}
