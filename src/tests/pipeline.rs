//! End-to-end scenarios: source text through the compiler into the graph

use super::helpers::*;
use crate::{
    codec::{IndirectionReason, InvalidTargetReason, NoteCompiler, NoteDiagnostic, ParseResult},
    config::{CallPattern, Config, LinkResolution},
    event::{GraphEvent, NoteEvent, ScanGeneration},
    graph::NoteGraph,
    properties::{SourceFile, Tag},
};
use test_log::test;

fn compile(compiler: &NoteCompiler, path: &str, text: &str) -> ParseResult {
    let file = SourceFile::new(format!("/vault/{path}"), text);
    compiler
        .compile_source(&file, compiler.next_generation())
        .expect("file to be handled")
}

fn vault_compiler() -> NoteCompiler {
    NoteCompiler::new("/vault", Config::default()).unwrap()
}

#[test]
fn test_plain_file_yields_stem_titled_record() {
    let compiler = vault_compiler();
    let result = compile(&compiler, "Plain note.typ", "= Heading\nJust prose, #emph[nothing] else.\n");
    let record = result.record.unwrap();
    assert_eq!(record.title, "Plain note");
    assert!(record.tags.is_empty());
    assert!(record.links.is_empty());
    assert!(record.diagnostics.is_empty());
}

#[test]
fn test_link_resolves_relative_to_referencing_file() {
    let compiler = vault_compiler();
    let result = compile(&compiler, "math/groups.typ", "#link_note(\"./a.typ\")");
    let record = result.record.unwrap();
    assert_eq!(record.links.len(), 1);
    assert_eq!(record.links[0].target_raw, "./a.typ");
    assert_eq!(record.links[0].target_path, note_id("math/a.typ"));
}

#[test]
fn test_output_extension_is_rejected_by_literal_text() {
    let compiler = vault_compiler();
    let result = compile(&compiler, "b.typ", "#link_note(\"./a.pdf\")");
    assert!(result.has_errors());
    let record = result.record.unwrap();
    assert!(record.links.is_empty());
    assert!(matches!(
        &record.diagnostics[..],
        [NoteDiagnostic::InvalidLinkTarget {
            reason: InvalidTargetReason::DisallowedExtension(ext),
            ..
        }] if ext == "pdf"
    ));
}

#[test]
fn test_tag_marker_is_idempotent_across_sources() {
    let compiler = vault_compiler();
    let record = compile(
        &compiler,
        "t.typ",
        "/*\n---\ntags: [writing]\n---\n*/\n#tag(\"writing\") #tag(\"#writing\")",
    )
    .record
    .unwrap();
    let tags: Vec<&Tag> = record.tags.iter().collect();
    assert_eq!(tags.len(), 1);
    assert_eq!(tags[0].as_str(), "#writing");
}

#[test]
fn test_alias_and_nested_calls_are_skipped_but_direct_calls_kept() {
    let compiler = vault_compiler();
    let text = "#let ln = link_note\n\
                #ln(\"./aliased.typ\")\n\
                #box(link_note(\"./nested.typ\"))\n\
                #link_note(\"./direct.typ\")\n";
    let record = compile(&compiler, "x.typ", text).record.unwrap();
    let targets: Vec<&str> = record.links.iter().map(|l| l.target_path.as_str()).collect();
    assert_eq!(targets, vec!["direct.typ"]);
    let reasons: Vec<&IndirectionReason> = record
        .diagnostics
        .iter()
        .filter_map(|d| d.as_indirection().map(|w| &w.reason))
        .collect();
    assert_eq!(
        reasons,
        vec![&IndirectionReason::AliasedReference, &IndirectionReason::NestedCall]
    );
}

#[test]
fn test_interleaved_calls_keep_counts_and_order() {
    let compiler = vault_compiler();
    let mut text = String::new();
    let mut expected_links = Vec::new();
    let mut expected_tags = Vec::new();
    for idx in 0..7 {
        if idx % 3 == 0 {
            text.push_str(&format!("#tag(\"t{idx}\")\n"));
            expected_tags.push(format!("t{idx}"));
        } else {
            text.push_str(&format!("Para {idx} #link_note(\"n{idx}.typ\")\n"));
            expected_links.push(format!("n{idx}.typ"));
        }
    }
    let record = compile(&compiler, "order.typ", &text).record.unwrap();
    let links: Vec<&str> = record.links.iter().map(|l| l.target_raw.as_str()).collect();
    assert_eq!(links, expected_links);
    assert_eq!(record.tags.len(), expected_tags.len());
    assert!(record.links.windows(2).all(|w| w[0].position < w[1].position));
}

#[test]
fn test_rescan_removes_backlink_without_touching_others() {
    init_logging();
    let compiler = vault_compiler();
    let mut graph = NoteGraph::new();
    for (path, text) in [
        ("a.typ", "#link_note(\"b.typ\")"),
        ("b.typ", "= B"),
        ("c.typ", "#link_note(\"/b.typ\") #tag(\"keep\")"),
    ] {
        let event = compile(&compiler, path, text).into_event().unwrap();
        graph.apply(event);
    }
    let b = note_id("b.typ");
    assert_eq!(graph.backlinks(&b).count(), 2);
    let c_before = graph.get(&note_id("c.typ")).cloned();

    let rescan = compile(&compiler, "a.typ", "No more links.");
    let events = graph.apply(rescan.into_event().unwrap());
    assert_eq!(
        graph.backlinks(&b).map(|id| id.as_str()).collect::<Vec<_>>(),
        vec!["c.typ"]
    );
    assert_eq!(graph.get(&note_id("c.typ")).cloned(), c_before);
    assert!(events.contains(&NoteEvent::BacklinksChanged(b)));
    assert!(graph.built_in_test().is_empty());
}

#[test]
fn test_syntax_error_keeps_previous_record() {
    let compiler = vault_compiler();
    let mut graph = NoteGraph::new();
    graph.apply(
        compile(&compiler, "a.typ", "#tag(\"stable\")")
            .into_event()
            .unwrap(),
    );
    let broken = compile(&compiler, "a.typ", "#tag(\"stable\") #{ unclosed");
    assert!(broken.record.is_none());
    assert!(broken.diagnostics[0].is_syntax_error());
    assert!(broken.into_event().is_none());
    assert!(graph
        .get(&note_id("a.typ"))
        .unwrap()
        .has_tag(&Tag::canonicalize("stable", '#').unwrap()));
}

#[test]
fn test_custom_patterns_and_root_relative_links() {
    let config = Config {
        tag_marker: '@',
        link_resolution: LinkResolution::RelativeToRoot,
        source_extensions: vec!["typ".to_string(), "md".to_string()],
        call_patterns: vec![
            CallPattern::link("zref", 1),
            CallPattern::tag("topic", 0),
        ],
    };
    let compiler = NoteCompiler::new("/vault", config).unwrap();
    let record = compile(
        &compiler,
        "deep/dir/note.typ",
        "#zref(\"label\", \"other/target.md\") #topic(\"@people\") #link_note(\"ignored.typ\")",
    )
    .record
    .unwrap();
    assert_eq!(record.links.len(), 1);
    assert_eq!(record.links[0].target_path, note_id("other/target.md"));
    assert_eq!(
        record.tags.iter().map(|t| t.as_str()).collect::<Vec<_>>(),
        vec!["@people"]
    );
}

#[test]
fn test_stale_batch_result_does_not_regress_graph() {
    let compiler = vault_compiler();
    let older = compile(&compiler, "a.typ", "#tag(\"old\")");
    let newer = compile(&compiler, "a.typ", "#tag(\"new\")");
    assert!(older.generation < newer.generation);

    let mut graph = NoteGraph::new();
    graph.apply(newer.into_event().unwrap());
    let events = graph.apply(older.into_event().unwrap());
    assert!(matches!(events[0], NoteEvent::StaleDiscarded { .. }));
    let record = graph.get(&note_id("a.typ")).unwrap();
    assert!(record.has_tag(&Tag::canonicalize("new", '#').unwrap()));

    // An explicit removal with a newer generation wins over both.
    graph.apply(GraphEvent::Removed {
        id: note_id("a.typ"),
        generation: ScanGeneration(u64::MAX),
    });
    assert!(graph.is_empty());
}
