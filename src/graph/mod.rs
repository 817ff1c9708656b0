//! Graph module: the cross-reference graph over all notes.
//!
//! # Module Organization
//!
//! - [`base`]: [`NoteGraph`], the records plus the derived backlink and dangling-link indices,
//!   with full rebuilds and incremental per-note updates
//! - [`aggregator`]: [`GraphAggregator`], the single task allowed to write a shared graph, and
//!   [`NoteGraphHandle`] for submitting updates and reading from any thread
//!
//! ```rust
//! use zettel_core::{graph::NoteGraph, properties::{NoteId, NoteRecord, OutgoingLink}};
//! use zettel_core::codec::SourcePosition;
//!
//! let a = NoteId::parse("a.typ").unwrap();
//! let b = NoteId::parse("b.typ").unwrap();
//! let mut record_a = NoteRecord::empty(a.clone());
//! record_a.links.push(OutgoingLink {
//!     target_raw: "./b.typ".to_string(),
//!     target_path: b.clone(),
//!     target_id: None,
//!     position: SourcePosition::default(),
//! });
//!
//! let graph = NoteGraph::build([record_a, NoteRecord::empty(b.clone())]);
//! assert_eq!(graph.backlinks(&b).collect::<Vec<_>>(), vec![&a]);
//! assert!(graph.built_in_test().is_empty());
//! ```

pub mod aggregator;
pub mod base;


pub use aggregator::{GraphAggregator, NoteGraphHandle};
pub use base::NoteGraph;
