//! Turning one source file into a [`NoteRecord`](crate::properties::NoteRecord).
//!
//! ## Key Components
//!
//! - [`frontmatter`] - detects and parses the metadata block that may open a note
//! - [`CallPatternMatcher`] - walks a parsed syntax tree and extracts configured link and tag
//!   call sites without evaluating anything
//! - [`NoteAssembler`] - canonicalizes tags, validates link targets and picks the title
//! - [`NoteCompiler`] - runs the three above for one file or a parallel batch
//! - [`NoteDiagnostic`] - the non-fatal findings that accompany every record
//!
//! ## Pipeline
//!
//! ```text
//! (path, raw text) ──► frontmatter ─┐
//!                                   ├─► assembler ──► ParseResult ──► GraphEvent::Upsert
//! (path, syntax tree) ──► walker ───┘
//! ```
//!
//! The front-matter parser and the walker are independent and run in parallel for each file.
//! Files are independent of each other as well; the only shared state is the read-only
//! [`Config`](crate::config::Config).
//!
//! ```rust
//! use zettel_core::{codec::NoteCompiler, config::Config, event::ScanGeneration, properties::SourceFile};
//!
//! let compiler = NoteCompiler::new("/notes", Config::default()).unwrap();
//! let file = SourceFile::new(
//!     "/notes/warbler.typ",
//!     "/*\n---\ntitle: Warbler\n---\n*/\nSee #link_note(\"./birds.typ\") #tag(\"animals\")",
//! );
//! let result = compiler.compile_source(&file, ScanGeneration(1)).unwrap();
//! let record = result.record.unwrap();
//! assert_eq!(record.title, "Warbler");
//! assert_eq!(record.links[0].target_path.as_str(), "birds.typ");
//! assert!(record.tags.iter().any(|tag| tag.as_str() == "#animals"));
//! ```

pub mod assembler;
pub mod compiler;
pub mod diagnostic;
pub mod frontmatter;
pub mod walker;

pub use assembler::NoteAssembler;
pub use compiler::{NoteCompiler, ParseResult};
pub use diagnostic::{
    IndirectionReason, IndirectionWarning, InvalidTargetReason, NoteDiagnostic, Severity,
    SourcePosition, SyntaxIssue,
};
pub use frontmatter::{note_body, parse_front_matter, FrontMatter};
pub use walker::{CallPatternMatcher, ExtractedLink, ExtractedTag, Extraction};
