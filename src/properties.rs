//! [crate::properties] contains the data model shared by the codec and the graph: note
//! identifiers, canonical tags, and the per-file [NoteRecord].
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fmt::{Display, Formatter},
    path::{Path, PathBuf},
};
use unicode_normalization::UnicodeNormalization;

use crate::{
    codec::{NoteDiagnostic, SourcePosition},
    error::ZettelError,
    paths::{os_path_to_string, NotePath},
};

/// Canonical, project-relative identifier of a note.
///
/// A `NoteId` is the note's path relative to the project root, `/`-separated, with `.` and `..`
/// resolved and the text NFC-normalized, so that composed and decomposed spellings of the same
/// file name collapse onto one note:
///
/// ```
/// # use zettel_core::properties::NoteId;
/// let composed = NoteId::parse("K\u{00F6}rper.typ").unwrap();
/// let decomposed = NoteId::parse("./Ko\u{0308}rper.typ").unwrap();
/// assert_eq!(composed, decomposed);
/// assert_eq!(composed.as_str(), "Körper.typ");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Parse a `/`-separated, project-relative path into a `NoteId`.
    pub fn parse(path: &str) -> Result<NoteId, ZettelError> {
        let normalized = NotePath::new(path).normalize().ok_or_else(|| {
            ZettelError::InvalidPath(format!("'{path}' climbs above the project root"))
        })?;
        if normalized.is_empty() {
            return Err(ZettelError::InvalidPath(format!(
                "'{path}' does not name a file"
            )));
        }
        Ok(NoteId(normalized.nfc().collect()))
    }

    /// Derive the id of a file from its OS path.
    ///
    /// Absolute paths must live below `root`; relative paths are taken as already relative to
    /// the project root.
    pub fn from_path<R: AsRef<Path>, P: AsRef<Path>>(
        root: R,
        path: P,
    ) -> Result<NoteId, ZettelError> {
        let path = path.as_ref();
        let relative = if path.is_absolute() {
            path.strip_prefix(root.as_ref())?
        } else {
            path
        };
        NoteId::parse(&os_path_to_string(relative))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn as_path(&self) -> NotePath<'_> {
        NotePath::new(&self.0)
    }

    /// The note's file stem, which doubles as its fallback title.
    pub fn file_stem(&self) -> &str {
        self.as_path().filestem()
    }

    pub fn extension(&self) -> &str {
        self.as_path().ext()
    }

    /// Join onto the OS path of the project root.
    pub fn to_os_path<R: AsRef<Path>>(&self, root: R) -> PathBuf {
        self.0
            .split('/')
            .fold(root.as_ref().to_path_buf(), |acc, part| acc.join(part))
    }
}

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for NoteId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// A tag in canonical form: exactly one leading marker character followed by a non-empty body.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Tag(String);

impl Tag {
    /// Canonicalize a raw tag under `marker`.
    ///
    /// Leading markers and surrounding whitespace are stripped before exactly one marker is
    /// prepended, so the operation is idempotent. Returns `None` when nothing but markers and
    /// whitespace remain.
    ///
    /// ```
    /// # use zettel_core::properties::Tag;
    /// assert_eq!(Tag::canonicalize("writing", '#'), Tag::canonicalize("#writing", '#'));
    /// assert_eq!(Tag::canonicalize("##writing", '#').unwrap().as_str(), "#writing");
    /// assert!(Tag::canonicalize(" # ", '#').is_none());
    /// ```
    pub fn canonicalize(raw: &str, marker: char) -> Option<Tag> {
        let body = raw.trim().trim_start_matches(marker).trim();
        if body.is_empty() {
            None
        } else {
            Some(Tag(format!("{marker}{body}")))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One file as handed over by the loading collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFile {
    /// Either absolute below the project root or relative to it.
    pub path: PathBuf,
    pub raw_text: String,
}

impl SourceFile {
    pub fn new<P: Into<PathBuf>, S: Into<String>>(path: P, raw_text: S) -> SourceFile {
        SourceFile {
            path: path.into(),
            raw_text: raw_text.into(),
        }
    }
}

/// An outgoing link that passed extension validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutgoingLink {
    /// The literal argument text as written at the call site
    pub target_raw: String,
    /// The project-relative note the link points at, whether or not that note exists
    pub target_path: NoteId,
    /// Set by the graph when a record exists for `target_path`; absent for dangling links
    pub target_id: Option<NoteId>,
    pub position: SourcePosition,
}

impl OutgoingLink {
    pub fn is_resolved(&self) -> bool {
        self.target_id.is_some()
    }

    pub fn is_dangling(&self) -> bool {
        self.target_id.is_none()
    }
}

/// The normalized metadata of one note, replaced wholesale on every successful scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRecord {
    pub id: NoteId,
    pub title: String,
    pub tags: BTreeSet<Tag>,
    /// In source order, duplicates preserved
    pub links: Vec<OutgoingLink>,
    /// Findings from this file's own processing. Graph-level findings (dangling links) are
    /// computed by the graph on demand.
    pub diagnostics: Vec<NoteDiagnostic>,
    /// Whitespace-separated words in the text after the front matter
    pub words: usize,
    /// Unicode scalar values in the text after the front matter
    pub characters: usize,
}

impl NoteRecord {
    /// A record with no metadata beyond its id-derived title.
    pub fn empty(id: NoteId) -> NoteRecord {
        NoteRecord {
            title: id.file_stem().to_string(),
            id,
            tags: BTreeSet::new(),
            links: Vec::new(),
            diagnostics: Vec::new(),
            words: 0,
            characters: 0,
        }
    }

    /// Count words and characters of `body`, the note text without its front matter.
    pub fn count_text(&mut self, body: &str) {
        self.words = body.split_whitespace().count();
        self.characters = body.chars().count();
    }

    pub fn has_tag(&self, tag: &Tag) -> bool {
        self.tags.contains(tag)
    }
}
