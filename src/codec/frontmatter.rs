//! Front-matter detection and parsing.
//!
//! A note may open with a metadata block wrapped in the host language's block comment, so the
//! metadata never renders:
//!
//! ```text
//! /*
//! ---
//! title: Warbler
//! tags:
//!   - animals:
//!     - birds
//!     - america
//!   - biology
//! ---
//! */
//! ```
//!
//! The block must be the first construct of the file (only blank lines and a byte order mark
//! may precede it). Anything that does not match this shape at the boundary means "no front
//! matter" rather than an error. Inside the block a restricted `key: value` and list syntax is
//! understood; lines that cannot be read are skipped with a
//! [`NoteDiagnostic::MalformedFrontMatter`] and the rest of the block still counts.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::codec::NoteDiagnostic;

const COMMENT_OPEN: &str = "/*";
const COMMENT_CLOSE: &str = "*/";
const DELIMITER: &str = "---";
const BOM: char = '\u{feff}';

static FIELD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([A-Za-z_][A-Za-z0-9_-]*)[ \t]*:(?:[ \t]+(.*)|[ \t]*)$")
        .expect("front matter field regex to compile")
});

/// Metadata read from a note's leading comment block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrontMatter {
    pub title: Option<String>,
    /// Raw tags in declaration order, not yet canonicalized
    pub tags: Vec<String>,
}

impl FrontMatter {
    pub fn is_empty(&self) -> bool {
        self.title.is_none() && self.tags.is_empty()
    }
}

/// The located metadata block: its content lines with their 1-based line numbers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FrontMatterBlock<'a> {
    pub lines: Vec<(usize, &'a str)>,
    /// Byte offset just past the closing comment delimiter line
    pub end_offset: usize,
}

/// Locate the leading front-matter block, if the file opens with one.
pub fn find_front_matter(raw: &str) -> Option<FrontMatterBlock<'_>> {
    let text = raw.strip_prefix(BOM).unwrap_or(raw);
    let bom_len = raw.len() - text.len();

    let mut offset = bom_len;
    let mut lines = text.split_inclusive('\n').enumerate().map(|(idx, line)| {
        let start = offset;
        offset += line.len();
        (idx + 1, line.trim_end_matches(['\n', '\r']), start + line.len())
    });

    // Skip leading blank lines, then require the comment opener and the delimiter.
    let (_, opener, _) = lines.by_ref().find(|(_, line, _)| !line.trim().is_empty())?;
    if opener.trim() != COMMENT_OPEN {
        return None;
    }
    let (_, delimiter, _) = lines.next()?;
    if delimiter.trim() != DELIMITER {
        return None;
    }

    let mut content = Vec::new();
    let mut pending_delimiter: Option<(usize, &str)> = None;
    for (line_no, line, end) in lines {
        let trimmed = line.trim();
        if let Some(delimiter_line) = pending_delimiter.take() {
            if trimmed == COMMENT_CLOSE {
                return Some(FrontMatterBlock {
                    lines: content,
                    end_offset: end,
                });
            }
            // A delimiter that does not close the block is ordinary (malformed) content.
            content.push(delimiter_line);
        }
        if trimmed == DELIMITER {
            pending_delimiter = Some((line_no, line));
        } else if trimmed.contains(COMMENT_CLOSE) {
            // The comment ended without a closing delimiter.
            return None;
        } else {
            content.push((line_no, line));
        }
    }
    None
}

/// The text following the front-matter block, or all of `raw` when there is none.
pub fn note_body(raw: &str) -> &str {
    match find_front_matter(raw) {
        Some(block) => &raw[block.end_offset..],
        None => raw,
    }
}

/// Parse the front matter of `raw`, if any.
///
/// Pure: returns an empty [FrontMatter] and no diagnostics when the file has no block.
pub fn parse_front_matter(raw: &str) -> (FrontMatter, Vec<NoteDiagnostic>) {
    match find_front_matter(raw) {
        Some(block) => parse_block(&block),
        None => (FrontMatter::default(), Vec::new()),
    }
}

/// Which field subsequent indented lines belong to.
enum Section {
    None,
    /// Inside a `tags:` block list. Open groups as (indent, name).
    Tags(Vec<(usize, String)>),
    /// Continuation lines of a field that was already reported
    Skipping,
}

fn parse_block(block: &FrontMatterBlock<'_>) -> (FrontMatter, Vec<NoteDiagnostic>) {
    let mut front_matter = FrontMatter::default();
    let mut diagnostics = Vec::new();
    let mut section = Section::None;

    for &(line_no, line) in block.lines.iter() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let indent = line.len() - line.trim_start().len();

        if let Some(item) = list_item(trimmed) {
            match &mut section {
                Section::Tags(groups) => {
                    push_tag_item(indent, item, groups, &mut front_matter.tags)
                        .unwrap_or_else(|reason| {
                            diagnostics.push(NoteDiagnostic::malformed_front_matter(
                                line_no, line, reason,
                            ))
                        });
                }
                Section::Skipping => {}
                Section::None => diagnostics.push(NoteDiagnostic::malformed_front_matter(
                    line_no,
                    line,
                    "list item outside of a list field",
                )),
            }
            continue;
        }

        if indent > 0 {
            if !matches!(section, Section::Skipping) {
                diagnostics.push(NoteDiagnostic::malformed_front_matter(
                    line_no,
                    line,
                    "unexpected indentation",
                ));
            }
            continue;
        }

        let Some(captures) = FIELD.captures(trimmed) else {
            section = Section::None;
            diagnostics.push(NoteDiagnostic::malformed_front_matter(
                line_no,
                line,
                "expected 'key: value'",
            ));
            continue;
        };
        let key = &captures[1];
        let value = captures.get(2).map(|m| m.as_str().trim()).unwrap_or("");

        section = Section::None;
        match key {
            "title" => {
                if front_matter.title.is_some() {
                    diagnostics.push(NoteDiagnostic::malformed_front_matter(
                        line_no,
                        line,
                        "duplicate title, keeping the first",
                    ));
                    continue;
                }
                match parse_scalar(value) {
                    Ok(title) if !title.trim().is_empty() => {
                        front_matter.title = Some(title.trim().to_string())
                    }
                    Ok(_) => diagnostics.push(NoteDiagnostic::malformed_front_matter(
                        line_no,
                        line,
                        "title is empty",
                    )),
                    Err(reason) => diagnostics.push(NoteDiagnostic::malformed_front_matter(
                        line_no, line, reason,
                    )),
                }
            }
            "tags" => {
                if value.is_empty() {
                    section = Section::Tags(Vec::new());
                } else {
                    match parse_flow_or_scalar(value) {
                        Ok(tags) => front_matter.tags.extend(tags),
                        Err(reason) => diagnostics.push(NoteDiagnostic::malformed_front_matter(
                            line_no, line, reason,
                        )),
                    }
                }
            }
            other => {
                section = Section::Skipping;
                diagnostics.push(NoteDiagnostic::malformed_front_matter(
                    line_no,
                    line,
                    format!("unrecognized field '{other}'"),
                ));
            }
        }
    }

    tracing::debug!(
        "[frontmatter] title: {:?}, {} tag(s), {} diagnostic(s)",
        front_matter.title,
        front_matter.tags.len(),
        diagnostics.len()
    );
    (front_matter, diagnostics)
}

fn list_item(trimmed: &str) -> Option<&str> {
    if trimmed == "-" {
        Some("")
    } else {
        trimmed.strip_prefix("- ").map(str::trim)
    }
}

/// Handle one `- item` line of a `tags:` block list.
///
/// `- name:` opens a group whose more-indented items become `name/item`; `- name: x` and
/// `- name: [x, y]` expand inline.
fn push_tag_item(
    indent: usize,
    item: &str,
    groups: &mut Vec<(usize, String)>,
    tags: &mut Vec<String>,
) -> Result<(), String> {
    while groups.last().is_some_and(|(group_indent, _)| *group_indent >= indent) {
        groups.pop();
    }
    let prefix = groups
        .iter()
        .map(|(_, name)| name.as_str())
        .collect::<Vec<&str>>()
        .join("/");
    let qualify = |tag: String| {
        if prefix.is_empty() {
            tag
        } else {
            format!("{prefix}/{tag}")
        }
    };

    if item.is_empty() {
        return Err("empty list item".to_string());
    }
    if let Some(captures) = FIELD.captures(item) {
        let group = captures[1].to_string();
        match captures.get(2).map(|m| m.as_str().trim()) {
            None | Some("") => groups.push((indent, group)),
            Some(rest) => {
                let group = qualify(group);
                for tag in parse_flow_or_scalar(rest)? {
                    tags.push(format!("{group}/{tag}"));
                }
            }
        }
        return Ok(());
    }
    for tag in parse_flow_or_scalar(item)? {
        tags.push(qualify(tag));
    }
    Ok(())
}

/// Either `[a, "b", 'c']` or a single scalar.
fn parse_flow_or_scalar(value: &str) -> Result<Vec<String>, String> {
    let Some(inner) = value.strip_prefix('[') else {
        return parse_scalar(value).map(|scalar| vec![scalar]);
    };
    let inner = inner
        .trim_end()
        .strip_suffix(']')
        .ok_or_else(|| "unterminated flow list".to_string())?;

    let mut items = Vec::new();
    let mut current = String::new();
    let mut quote: Option<char> = None;
    let mut chars = inner.chars().peekable();
    while let Some(c) = chars.next() {
        match (quote, c) {
            (Some('"'), '\\') => {
                current.push(c);
                if let Some(escaped) = chars.next() {
                    current.push(escaped);
                }
            }
            (Some(q), _) if c == q => {
                current.push(c);
                // '' inside a single-quoted scalar is an escaped quote
                if q == '\'' && chars.peek() == Some(&'\'') {
                    current.push('\'');
                    chars.next();
                } else {
                    quote = None;
                }
            }
            (None, '"') | (None, '\'') => {
                quote = Some(c);
                current.push(c);
            }
            (None, ',') => {
                items.push(std::mem::take(&mut current));
            }
            _ => current.push(c),
        }
    }
    if quote.is_some() {
        return Err("unterminated quoted string in flow list".to_string());
    }
    items.push(current);

    let mut scalars = Vec::new();
    for (idx, item) in items.iter().enumerate() {
        let item = item.trim();
        if item.is_empty() {
            // Allow a trailing comma and the empty list.
            if idx + 1 == items.len() {
                continue;
            }
            return Err("empty entry in flow list".to_string());
        }
        scalars.push(parse_scalar(item)?);
    }
    Ok(scalars)
}

/// A plain, single-quoted or double-quoted scalar.
fn parse_scalar(value: &str) -> Result<String, String> {
    let value = value.trim();
    if value.starts_with('"') {
        // Double-quoted scalars share JSON's escape rules for everything we accept.
        return serde_json::from_str::<String>(value)
            .map_err(|e| format!("invalid double-quoted string: {e}"));
    }
    if let Some(inner) = value.strip_prefix('\'') {
        let inner = inner
            .strip_suffix('\'')
            .ok_or_else(|| "unterminated single-quoted string".to_string())?;
        if inner.replace("''", "").contains('\'') {
            return Err("stray quote in single-quoted string".to_string());
        }
        return Ok(inner.replace("''", "'"));
    }
    if value.starts_with('[') || value.starts_with('{') {
        return Err("expected a scalar".to_string());
    }
    // Plain scalars end at a whitespace-preceded comment.
    let plain = match value.find(" #") {
        Some(idx) => &value[..idx],
        None => value,
    };
    Ok(plain.trim_end().to_string())
}
