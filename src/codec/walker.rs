//! The call-pattern matcher.
//!
//! [CallPatternMatcher] walks an already parsed syntax tree and recognizes configured function
//! calls purely by shape. Nothing is evaluated: a call counts only when its callee is the bare
//! configured identifier and its target argument is a string literal. Every other appearance of
//! a configured identifier is reported as an [IndirectionWarning] so authors can see which call
//! sites the graph cannot observe.
use serde::{Deserialize, Serialize};
use typst_syntax::{
    ast::{self, Arg, AstNode, Expr},
    LinkedNode, SyntaxKind, SyntaxNode,
};

use crate::{
    codec::diagnostic::{IndirectionReason, IndirectionWarning, SourcePosition, SyntaxIssue},
    config::{Config, PatternRole},
};

/// A literal link target found at a matched call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedLink {
    /// Unescaped literal text of the target argument
    pub raw_target: String,
    pub position: SourcePosition,
    pub function: String,
}

/// A literal tag found at a matched call site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedTag {
    pub raw_tag: String,
    pub position: SourcePosition,
    pub function: String,
}

/// Everything the walker found in one tree, in source order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extraction {
    pub links: Vec<ExtractedLink>,
    pub tags: Vec<ExtractedTag>,
    pub warnings: Vec<IndirectionWarning>,
}

/// Maps byte offsets of one text to 1-based line/column positions.
#[derive(Debug, Clone)]
pub struct LineIndex<'t> {
    text: &'t str,
    line_starts: Vec<usize>,
}

impl<'t> LineIndex<'t> {
    pub fn new(text: &'t str) -> LineIndex<'t> {
        let line_starts = std::iter::once(0)
            .chain(text.match_indices('\n').map(|(idx, _)| idx + 1))
            .collect();
        LineIndex { text, line_starts }
    }

    pub fn position(&self, offset: usize) -> SourcePosition {
        let offset = offset.min(self.text.len());
        let line = self.line_starts.partition_point(|start| *start <= offset);
        let line_start = self.line_starts[line.saturating_sub(1)];
        let column = self
            .text
            .get(line_start..offset)
            .map(|prefix| prefix.chars().count())
            .unwrap_or(offset - line_start);
        SourcePosition::new(offset, line.max(1), column + 1)
    }
}

/// Kinds that may sit between a call and the argument list that contains it without changing
/// the fact that the call is an argument expression. A code block or closure body evaluates to
/// its calls, so those pass the value through as well; content blocks and equations do not.
const ARGUMENT_WRAPPERS: &[SyntaxKind] = &[
    SyntaxKind::Parenthesized,
    SyntaxKind::Code,
    SyntaxKind::CodeBlock,
    SyntaxKind::Closure,
    SyntaxKind::Named,
    SyntaxKind::Keyed,
    SyntaxKind::Array,
    SyntaxKind::Dict,
    SyntaxKind::Spread,
    SyntaxKind::Unary,
    SyntaxKind::Binary,
    SyntaxKind::FieldAccess,
    SyntaxKind::FuncCall,
];

/// Matches configured call patterns in a syntax tree.
#[derive(Debug, Clone)]
pub struct CallPatternMatcher<'c> {
    config: &'c Config,
}

impl<'c> CallPatternMatcher<'c> {
    pub fn new(config: &'c Config) -> Self {
        CallPatternMatcher { config }
    }

    fn is_configured(&self, function: &str) -> bool {
        self.config.patterns_for(function).next().is_some()
    }

    /// Walk `root` depth-first and collect every matched call site.
    ///
    /// A tree containing error nodes is rejected as a whole: the issues are returned and nothing
    /// is extracted.
    #[tracing::instrument(skip_all)]
    pub fn walk(&self, root: &SyntaxNode) -> Result<Extraction, Vec<SyntaxIssue>> {
        let text = root.clone().into_text();
        let lines = LineIndex::new(&text);

        if root.erroneous() {
            let issues = collect_syntax_issues(root, &lines);
            tracing::debug!("[walker] tree has {} syntax error(s)", issues.len());
            return Err(issues);
        }

        let mut extraction = Extraction::default();
        let mut stack = vec![LinkedNode::new(root)];
        while let Some(node) = stack.pop() {
            match node.kind() {
                SyntaxKind::FuncCall => self.visit_call(&node, &lines, &mut extraction),
                SyntaxKind::Ident => self.visit_ident(&node, &lines, &mut extraction),
                _ => {}
            }
            let children: Vec<LinkedNode> = node.children().collect();
            stack.extend(children.into_iter().rev());
        }

        tracing::debug!(
            "[walker] {} link(s), {} tag(s), {} indirection warning(s)",
            extraction.links.len(),
            extraction.tags.len(),
            extraction.warnings.len()
        );
        Ok(extraction)
    }

    fn visit_call(&self, node: &LinkedNode, lines: &LineIndex, extraction: &mut Extraction) {
        let Some(call) = node.get().cast::<ast::FuncCall>() else {
            return;
        };
        // Inside equations the callee is a math identifier; the call is the same shape.
        let function = match call.callee() {
            Expr::Ident(callee) => callee.as_str(),
            Expr::MathIdent(callee) => callee.as_str(),
            _ => return,
        };
        if !self.is_configured(function) {
            return;
        }
        let position = lines.position(node.offset());
        let nested = is_argument_expression(node);

        for pattern in self.config.patterns_for(function) {
            let outcome = if nested {
                Err(IndirectionReason::NestedCall)
            } else {
                target_argument(call.args(), pattern.target_argument_index)
            };
            match outcome {
                Ok(literal) => match pattern.role {
                    PatternRole::Link => extraction.links.push(ExtractedLink {
                        raw_target: literal,
                        position,
                        function: function.to_string(),
                    }),
                    PatternRole::Tag => extraction.tags.push(ExtractedTag {
                        raw_tag: literal,
                        position,
                        function: function.to_string(),
                    }),
                },
                Err(reason) => extraction.warnings.push(IndirectionWarning {
                    function: function.to_string(),
                    role: pattern.role,
                    reason,
                    position,
                }),
            }
        }
    }

    fn visit_ident(&self, node: &LinkedNode, lines: &LineIndex, extraction: &mut Extraction) {
        let Some(ident) = node.get().cast::<ast::Ident>() else {
            return;
        };
        let function = ident.as_str();
        if !self.is_configured(function) || !is_value_reference(node) {
            return;
        }
        let position = lines.position(node.offset());
        for pattern in self.config.patterns_for(function) {
            extraction.warnings.push(IndirectionWarning {
                function: function.to_string(),
                role: pattern.role,
                reason: IndirectionReason::AliasedReference,
                position,
            });
        }
    }
}

/// The unescaped literal at positional `index`, or why there is none.
fn target_argument(args: ast::Args, index: usize) -> Result<String, IndirectionReason> {
    let mut positional = 0;
    for item in args.items() {
        match item {
            Arg::Spread(_) => return Err(IndirectionReason::SpreadArgument),
            Arg::Named(_) => {}
            Arg::Pos(expr) => {
                if positional == index {
                    return match string_literal(expr) {
                        Some(literal) => Ok(literal),
                        None => Err(IndirectionReason::NonLiteralArgument {
                            found: expr.to_untyped().kind().name().to_string(),
                        }),
                    };
                }
                positional += 1;
            }
        }
    }
    Err(IndirectionReason::MissingArgument { index })
}

/// A string literal argument. Math-mode arguments may wrap the literal in a one-element
/// equation body.
fn string_literal(expr: Expr) -> Option<String> {
    match expr {
        Expr::Str(literal) => Some(literal.get().to_string()),
        Expr::Math(math) => {
            let mut exprs = math.exprs();
            match (exprs.next(), exprs.next()) {
                (Some(Expr::Str(literal)), None) => Some(literal.get().to_string()),
                _ => None,
            }
        }
        _ => None,
    }
}

/// Whether the call at `node` is (part of) an argument of another call.
fn is_argument_expression(node: &LinkedNode) -> bool {
    let mut current = node.parent();
    while let Some(parent) = current {
        match parent.kind() {
            SyntaxKind::Args => return true,
            kind if ARGUMENT_WRAPPERS.contains(&kind) => current = parent.parent(),
            _ => return false,
        }
    }
    false
}

/// Whether an identifier node refers to a value, as opposed to being called directly or
/// introducing a name.
fn is_value_reference(node: &LinkedNode) -> bool {
    let Some(parent) = node.parent() else {
        return true;
    };
    match parent.kind() {
        // Callee of a call. The call itself is handled by `visit_call`.
        SyntaxKind::FuncCall => node.index() != 0,
        // `link_note: value` names an argument or a dictionary key.
        SyntaxKind::Named => node.index() != 0,
        // `let link_note(target) = ..` defines the function.
        SyntaxKind::Closure => node.index() != 0,
        SyntaxKind::Params | SyntaxKind::Destructuring => false,
        // `let link_note = ..` shadows; the value on the right is a reference.
        SyntaxKind::LetBinding => parent
            .children()
            .find(|child| child.kind() == SyntaxKind::Eq)
            .is_some_and(|eq| node.offset() > eq.offset()),
        SyntaxKind::SetRule => false,
        // Only the accessed value; `dict.tag` names a field, not the function.
        SyntaxKind::FieldAccess => node.index() == 0,
        _ => import_reference(node).unwrap_or(true),
    }
}

/// `Some(flag)` when `node` sits inside an import list. Plain imports are not references; the
/// source name of a renamed import is.
fn import_reference(node: &LinkedNode) -> Option<bool> {
    let mut current = node.parent();
    while let Some(ancestor) = current {
        match ancestor.kind() {
            SyntaxKind::RenamedImportItem => {
                let renamed_before_as = ancestor
                    .children()
                    .find(|child| child.kind() == SyntaxKind::As)
                    .is_some_and(|as_kw| node.offset() < as_kw.offset());
                return Some(renamed_before_as);
            }
            SyntaxKind::ModuleImport => return Some(false),
            SyntaxKind::Markup | SyntaxKind::Code | SyntaxKind::Args => return None,
            _ => current = ancestor.parent(),
        }
    }
    None
}

fn collect_syntax_issues(root: &SyntaxNode, lines: &LineIndex) -> Vec<SyntaxIssue> {
    let mut issues = Vec::new();
    let mut stack = vec![LinkedNode::new(root)];
    while let Some(node) = stack.pop() {
        if !node.erroneous() {
            continue;
        }
        if node.kind() == SyntaxKind::Error {
            let position = Some(lines.position(node.offset()));
            for error in node.errors() {
                issues.push(SyntaxIssue {
                    message: error.message.to_string(),
                    position,
                });
            }
            continue;
        }
        let children: Vec<LinkedNode> = node.children().collect();
        stack.extend(children.into_iter().rev());
    }
    if issues.is_empty() {
        issues.push(SyntaxIssue {
            message: "syntax tree is malformed".to_string(),
            position: None,
        });
    }
    issues
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CallPattern;

    fn walk(source: &str) -> Extraction {
        let config = Config::default();
        let root = typst_syntax::parse(source);
        CallPatternMatcher::new(&config)
            .walk(&root)
            .expect("source to parse")
    }

    fn reasons(extraction: &Extraction) -> Vec<IndirectionReason> {
        extraction
            .warnings
            .iter()
            .map(|warning| warning.reason.clone())
            .collect()
    }

    #[test]
    fn test_direct_calls_in_source_order() {
        let source = "= Title\n#tag(\"first\") some text #link_note(\"./a.typ\")\n\
                      - item #link_note(\"b.typ\")[with body]\n#tag(\"second\")\n";
        let extraction = walk(source);
        let links: Vec<&str> = extraction
            .links
            .iter()
            .map(|link| link.raw_target.as_str())
            .collect();
        let tags: Vec<&str> = extraction.tags.iter().map(|tag| tag.raw_tag.as_str()).collect();
        assert_eq!(links, vec!["./a.typ", "b.typ"]);
        assert_eq!(tags, vec!["first", "second"]);
        assert!(extraction.warnings.is_empty(), "{:?}", extraction.warnings);
        assert!(extraction.links[0].position < extraction.links[1].position);
        assert_eq!(extraction.tags[0].position.line, 2);
        assert_eq!(extraction.links[1].position.line, 3);
    }

    #[test]
    fn test_calls_inside_content_and_code_blocks() {
        let source = "#strong[see #link_note(\"deep.typ\")]\n#{\n  link_note(\"code.typ\")\n}\n";
        let extraction = walk(source);
        assert_eq!(extraction.links.len(), 2);
        assert!(extraction.warnings.is_empty(), "{:?}", extraction.warnings);
    }

    #[test]
    fn test_string_escapes_are_resolved() {
        let extraction = walk("#link_note(\"dir/\\u{e4}.typ\")");
        assert_eq!(extraction.links[0].raw_target, "dir/\u{e4}.typ");
    }

    #[test]
    fn test_alias_is_reported_and_direct_calls_still_extracted() {
        let source = "#let alias = link_note\n#alias(\"./hidden.typ\")\n#link_note(\"./seen.typ\")\n";
        let extraction = walk(source);
        assert_eq!(extraction.links.len(), 1);
        assert_eq!(extraction.links[0].raw_target, "./seen.typ");
        assert_eq!(reasons(&extraction), vec![IndirectionReason::AliasedReference]);
        assert_eq!(extraction.warnings[0].position.line, 1);
    }

    #[test]
    fn test_nested_call_is_not_extracted() {
        let extraction = walk("#box(link_note(\"./nested.typ\"))\n#text(size: 2em, (link_note(\"x.typ\"),))");
        assert!(extraction.links.is_empty());
        assert_eq!(
            reasons(&extraction),
            vec![IndirectionReason::NestedCall, IndirectionReason::NestedCall]
        );
    }

    #[test]
    fn test_calls_returned_from_closures_and_code_blocks_are_nested() {
        let extraction = walk("#foo(x => link_note(\"a.typ\"))\n#foo({ tag(\"t\") })\n#foo(body: x => { link_note(\"b.typ\") })");
        assert!(extraction.links.is_empty(), "{:?}", extraction.links);
        assert!(extraction.tags.is_empty(), "{:?}", extraction.tags);
        assert_eq!(
            reasons(&extraction),
            vec![
                IndirectionReason::NestedCall,
                IndirectionReason::NestedCall,
                IndirectionReason::NestedCall
            ]
        );
    }

    #[test]
    fn test_closure_bodies_outside_arguments_still_match() {
        let extraction = walk("#show heading: it => link_note(\"a.typ\")\n#let x = { tag(\"t\") }");
        assert_eq!(extraction.links[0].raw_target, "a.typ");
        assert_eq!(extraction.tags[0].raw_tag, "t");
        assert!(extraction.warnings.is_empty(), "{:?}", extraction.warnings);
    }

    #[test]
    fn test_calls_inside_equations() {
        // `_` starts a subscript in math, so use identifiers without one.
        let config = Config {
            call_patterns: vec![CallPattern::link("cite", 0), CallPattern::tag("tag", 0)],
            ..Config::default()
        };
        let root = typst_syntax::parse("$cite(\"a.typ\") + tag(\"math\")$\n$tag(x)$");
        let extraction = CallPatternMatcher::new(&config).walk(&root).unwrap();
        assert_eq!(extraction.links.len(), 1);
        assert_eq!(extraction.links[0].raw_target, "a.typ");
        assert_eq!(extraction.tags.len(), 1);
        assert_eq!(extraction.tags[0].raw_tag, "math");
        assert!(matches!(
            reasons(&extraction)[..],
            [IndirectionReason::NonLiteralArgument { .. }]
        ));
    }

    #[test]
    fn test_content_block_argument_is_not_a_literal() {
        let extraction = walk("#tag[writing]");
        assert!(extraction.tags.is_empty());
        assert!(matches!(
            reasons(&extraction)[..],
            [IndirectionReason::NonLiteralArgument { .. }]
        ));
    }

    #[test]
    fn test_field_named_like_a_function_is_not_a_reference() {
        let extraction = walk("#let d = (tag: \"x\")\n#d.tag");
        assert!(extraction.warnings.is_empty(), "{:?}", extraction.warnings);
    }

    #[test]
    fn test_non_literal_missing_and_spread_arguments() {
        let source = "#let target = \"a.typ\"\n#link_note(target)\n#link_note()\n#link_note(..args)\n#link_note(\"a\" + \".typ\")";
        let extraction = walk(source);
        assert!(extraction.links.is_empty());
        let reasons = reasons(&extraction);
        assert_eq!(reasons.len(), 4, "{reasons:?}");
        assert!(matches!(reasons[0], IndirectionReason::NonLiteralArgument { .. }));
        assert_eq!(reasons[1], IndirectionReason::MissingArgument { index: 0 });
        assert_eq!(reasons[2], IndirectionReason::SpreadArgument);
        assert!(matches!(reasons[3], IndirectionReason::NonLiteralArgument { .. }));
    }

    #[test]
    fn test_named_arguments_do_not_count_as_positional() {
        let config = Config {
            call_patterns: vec![CallPattern::link("cite_note", 1)],
            ..Config::default()
        };
        let root = typst_syntax::parse("#cite_note(\"label\", style: \"x\", \"target.typ\")");
        let extraction = CallPatternMatcher::new(&config).walk(&root).unwrap();
        assert_eq!(extraction.links[0].raw_target, "target.typ");
    }

    #[test]
    fn test_definitions_and_imports_are_not_references() {
        let source = "#import \"lib.typ\": link_note\n\
                      #let link_note(path) = link(path)\n\
                      #let wrap(tag) = tag\n\
                      #link_note(\"ok.typ\")\n";
        let extraction = walk(source);
        assert_eq!(extraction.links.len(), 1);
        // `tag` is a parameter and the closure body refers to the parameter by name.
        assert_eq!(reasons(&extraction), vec![IndirectionReason::AliasedReference]);
    }

    #[test]
    fn test_field_access_and_renamed_import_are_references() {
        let source = "#import \"lib.typ\": link_note as ln\n#show: link_note.with(\"x.typ\")\n";
        let extraction = walk(source);
        assert!(extraction.links.is_empty());
        assert_eq!(
            reasons(&extraction),
            vec![
                IndirectionReason::AliasedReference,
                IndirectionReason::AliasedReference
            ]
        );
    }

    #[test]
    fn test_matching_is_case_sensitive_and_ignores_comments() {
        let source = "/* #link_note(\"in-comment.typ\") */\n#Link_note(\"x.typ\")\n// #tag(\"c\")\n";
        let extraction = walk(source);
        assert!(extraction.links.is_empty());
        assert!(extraction.tags.is_empty());
        assert!(extraction.warnings.is_empty());
    }

    #[test]
    fn test_syntax_error_yields_no_partial_output() {
        let config = Config::default();
        let root = typst_syntax::parse("#link_note(\"a.typ\")\n#link_note(\"unclosed");
        let issues = CallPatternMatcher::new(&config)
            .walk(&root)
            .unwrap_err();
        assert!(!issues.is_empty());
        assert!(issues.iter().all(|issue| !issue.message.is_empty()));
    }

    #[test]
    fn test_line_index_counts_characters() {
        let text = "ab\näöü#x";
        let lines = LineIndex::new(text);
        let offset = text.find('#').unwrap();
        assert_eq!(lines.position(offset), SourcePosition::new(offset, 2, 4));
        assert_eq!(lines.position(0), SourcePosition::new(0, 1, 1));
    }
}
