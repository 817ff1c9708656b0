//! # zettel-core
//!
//! A Rust library for extracting note metadata from Typst sources and folding it into a
//! queryable link/backlink graph.
//!
//! ## Overview
//!
//! zettel-core reads each note's title, tags and outgoing links by *inspecting* its parsed syntax
//! tree, never by evaluating it. Links and tags are expressed by the author as ordinary function
//! calls (`#link_note("./other.typ")`, `#tag("writing")`) whose identifiers are configured; the
//! title and extra tags may come from a metadata block that opens the file inside a comment.
//!
//! ### Key Features
//!
//! - **Observe, never evaluate**: only calls whose callee is the bare configured identifier and
//!   whose target argument is a string literal count; anything indirect is reported instead
//! - **Front matter in a comment**: `/*` `---` ... `---` `*/` with title and (nested) tags
//! - **Literal target validation**: links must name a configured source extension
//! - **Incremental graph**: per-note replacement touches only that note's old and new targets
//! - **Scan generations**: stale results never overwrite newer ones
//! - **Fan-out / fan-in**: files compile in parallel (`rayon`), one task writes the graph
//!
//! ## Architecture
//!
//! - **[`codec`]**: per-file pipeline (`frontmatter`, `walker`, `assembler`, `NoteCompiler`)
//! - **[`graph`]**: `NoteGraph` and its single writer (`GraphAggregator`, `NoteGraphHandle`)
//! - **[`properties`]**: `NoteId`, `Tag`, `NoteRecord`, `OutgoingLink`, `SourceFile`
//! - **[`event`]**: `ScanGeneration`, inbound `GraphEvent`, outbound `NoteEvent`
//! - **[`config`]**: call patterns, extensions, tag marker, link resolution mode
//! - **[`paths`]**: project-relative path handling
//!
//! ## Quick Start
//!
//! ```rust
//! use zettel_core::{
//!     codec::NoteCompiler, config::Config, graph::NoteGraph, properties::{NoteId, SourceFile},
//! };
//!
//! let compiler = NoteCompiler::new("/notes", Config::default())?;
//! let files = vec![
//!     SourceFile::new("/notes/a.typ", "#link_note(\"./b.typ\") #tag(\"draft\")"),
//!     SourceFile::new("/notes/b.typ", "/*\n---\ntitle: Bee\n---\n*/\nNo links here."),
//! ];
//! let records = compiler
//!     .compile_batch(&files)
//!     .into_iter()
//!     .filter_map(|result| result.ok()?.record);
//! let graph = NoteGraph::build(records);
//!
//! let b = NoteId::parse("b.typ")?;
//! assert_eq!(graph.get(&b).map(|r| r.title.as_str()), Some("Bee"));
//! assert_eq!(graph.backlinks(&b).map(|id| id.as_str()).collect::<Vec<_>>(), vec!["a.typ"]);
//! # Ok::<(), zettel_core::ZettelError>(())
//! ```
//!
//! For a live graph fed from many workers, spawn a [`graph::NoteGraphHandle`] on a tokio runtime
//! and `submit` each [`codec::ParseResult`] to it.
//!
//! ## Features
//!
//! - **default**: the library
//! - **bin**: the `zettel` command line tool (`clap`, `walkdir`, `tracing-subscriber`)

pub mod codec;
pub mod config;
pub mod error;
pub mod event;
pub mod graph;
pub mod paths;
pub mod properties;
#[cfg(test)]
mod tests;

pub use error::*;
