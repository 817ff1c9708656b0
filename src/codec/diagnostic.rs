//! Diagnostic types for note processing and link resolution.
//!
//! Diagnostics are non-fatal: they accumulate next to a best-effort [`NoteRecord`] instead of
//! aborting the file or the graph rebuild. Only configuration problems are fatal, and those are
//! reported as [`ZettelError`](crate::ZettelError) before any file is touched.
//!
//! [`NoteRecord`]: crate::properties::NoteRecord

use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::{config::PatternRole, properties::NoteId};

/// A location in a source file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourcePosition {
    /// Byte offset from the start of the file
    pub offset: usize,
    /// 1-based line number
    pub line: usize,
    /// 1-based column, counted in characters
    pub column: usize,
}

impl SourcePosition {
    pub fn new(offset: usize, line: usize, column: usize) -> SourcePosition {
        SourcePosition {
            offset,
            line,
            column,
        }
    }
}

impl Display for SourcePosition {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.line, self.column)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Warning,
    Error,
}

/// One problem reported by the host grammar's parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntaxIssue {
    pub message: String,
    pub position: Option<SourcePosition>,
}

/// Why a matched call site produced no extraction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IndirectionReason {
    /// The target argument exists but is not a string literal
    NonLiteralArgument { found: String },
    /// The call has fewer positional arguments than the pattern's target index
    MissingArgument { index: usize },
    /// A spread argument makes positional indices unknowable
    SpreadArgument,
    /// The call is itself an argument expression of another call
    NestedCall,
    /// The configured identifier is used as a value instead of being called directly
    AliasedReference,
}

impl Display for IndirectionReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NonLiteralArgument { found } => {
                write!(f, "target argument is {found}, not a string literal")
            }
            Self::MissingArgument { index } => {
                write!(f, "no positional argument at index {index}")
            }
            Self::SpreadArgument => write!(f, "arguments are spread, positions are unknown"),
            Self::NestedCall => write!(f, "call is nested as an argument of another call"),
            Self::AliasedReference => {
                write!(f, "function is referenced indirectly; calls through it are invisible")
            }
        }
    }
}

/// A call site (or reference) the walker recognized but deliberately did not extract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndirectionWarning {
    pub function: String,
    pub role: PatternRole,
    pub reason: IndirectionReason,
    pub position: SourcePosition,
}

/// Why a literal link target was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvalidTargetReason {
    Empty,
    /// Looks like a URL, not a note path
    ExternalUrl,
    /// Resolves above the project root
    EscapesProject,
    MissingExtension,
    DisallowedExtension(String),
}

impl Display for InvalidTargetReason {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Empty => write!(f, "target is empty"),
            Self::ExternalUrl => write!(f, "target is an external URL"),
            Self::EscapesProject => write!(f, "target resolves outside the project root"),
            Self::MissingExtension => write!(f, "target has no file extension"),
            Self::DisallowedExtension(ext) => {
                write!(f, "extension '.{ext}' is not a source note extension")
            }
        }
    }
}

/// Diagnostic information produced while turning one file into a [`NoteRecord`], or while
/// resolving its links against the graph.
///
/// [`NoteRecord`]: crate::properties::NoteRecord
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoteDiagnostic {
    /// The grammar parser failed for the file. The file's record is not updated.
    Syntax(Vec<SyntaxIssue>),

    /// A matched call site was skipped
    Indirection(IndirectionWarning),

    /// A front-matter line could not be parsed and was skipped
    MalformedFrontMatter {
        /// 1-based line number in the file
        line: usize,
        content: String,
        reason: String,
    },

    /// A literal link target was rejected and the link discarded
    InvalidLinkTarget {
        target: String,
        reason: InvalidTargetReason,
        position: SourcePosition,
    },

    /// A link whose target has no record. The link is kept and contributes no backlink.
    DanglingLink {
        source: NoteId,
        target: String,
        target_path: NoteId,
        position: SourcePosition,
    },

    /// Anything else worth surfacing (e.g. a tag that canonicalizes to nothing)
    Warning(String),
}

impl NoteDiagnostic {
    pub fn warning(message: impl Into<String>) -> Self {
        Self::Warning(message.into())
    }

    pub fn malformed_front_matter(
        line: usize,
        content: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::MalformedFrontMatter {
            line,
            content: content.into(),
            reason: reason.into(),
        }
    }

    pub fn severity(&self) -> Severity {
        match self {
            Self::Syntax(_) | Self::InvalidLinkTarget { .. } => Severity::Error,
            Self::Indirection(_)
            | Self::MalformedFrontMatter { .. }
            | Self::DanglingLink { .. }
            | Self::Warning(_) => Severity::Warning,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity() == Severity::Error
    }

    pub fn position(&self) -> Option<SourcePosition> {
        match self {
            Self::Syntax(issues) => issues.iter().find_map(|issue| issue.position),
            Self::Indirection(warning) => Some(warning.position),
            Self::InvalidLinkTarget { position, .. } | Self::DanglingLink { position, .. } => {
                Some(*position)
            }
            Self::MalformedFrontMatter { .. } | Self::Warning(_) => None,
        }
    }

    pub fn is_syntax_error(&self) -> bool {
        matches!(self, Self::Syntax(_))
    }

    pub fn as_indirection(&self) -> Option<&IndirectionWarning> {
        match self {
            Self::Indirection(warning) => Some(warning),
            _ => None,
        }
    }

    pub fn is_dangling_link(&self) -> bool {
        matches!(self, Self::DanglingLink { .. })
    }

    pub fn is_malformed_front_matter(&self) -> bool {
        matches!(self, Self::MalformedFrontMatter { .. })
    }
}

impl From<IndirectionWarning> for NoteDiagnostic {
    fn from(warning: IndirectionWarning) -> Self {
        NoteDiagnostic::Indirection(warning)
    }
}

impl Display for NoteDiagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Syntax(issues) => {
                write!(f, "Syntax error: ")?;
                let rendered = issues
                    .iter()
                    .map(|issue| match issue.position {
                        Some(position) => format!("{} at {position}", issue.message),
                        None => issue.message.clone(),
                    })
                    .collect::<Vec<String>>();
                write!(f, "{}", rendered.join("; "))
            }
            Self::Indirection(warning) => write!(
                f,
                "Indirect {:?} call '{}' at {}: {}",
                warning.role, warning.function, warning.position, warning.reason
            ),
            Self::MalformedFrontMatter {
                line,
                content,
                reason,
            } => write!(f, "Malformed front matter on line {line} ({reason}): {content:?}"),
            Self::InvalidLinkTarget {
                target,
                reason,
                position,
            } => write!(f, "Invalid link target {target:?} at {position}: {reason}"),
            Self::DanglingLink {
                source,
                target,
                target_path,
                position,
            } => write!(
                f,
                "Dangling link in {source} at {position}: {target:?} -> {target_path} has no note"
            ),
            Self::Warning(msg) => write!(f, "Warning: {msg}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_classification() {
        let syntax = NoteDiagnostic::Syntax(vec![SyntaxIssue {
            message: "unclosed delimiter".to_string(),
            position: Some(SourcePosition::new(4, 1, 5)),
        }]);
        let invalid = NoteDiagnostic::InvalidLinkTarget {
            target: "./a.pdf".to_string(),
            reason: InvalidTargetReason::DisallowedExtension("pdf".to_string()),
            position: SourcePosition::default(),
        };
        let malformed = NoteDiagnostic::malformed_front_matter(3, "title", "expected 'key: value'");

        assert!(syntax.is_error());
        assert!(syntax.is_syntax_error());
        assert!(invalid.is_error());
        assert!(!malformed.is_error());
        assert_eq!(syntax.position(), Some(SourcePosition::new(4, 1, 5)));
        assert_eq!(malformed.position(), None);
    }

    #[test]
    fn test_display_mentions_target_and_reason() {
        let invalid = NoteDiagnostic::InvalidLinkTarget {
            target: "./a.pdf".to_string(),
            reason: InvalidTargetReason::DisallowedExtension("pdf".to_string()),
            position: SourcePosition::new(10, 2, 3),
        };
        let rendered = invalid.to_string();
        assert!(rendered.contains("./a.pdf"));
        assert!(rendered.contains(".pdf"));
        assert!(rendered.contains("2:3"));

        let indirect = NoteDiagnostic::from(IndirectionWarning {
            function: "link_note".to_string(),
            role: PatternRole::Link,
            reason: IndirectionReason::NestedCall,
            position: SourcePosition::new(0, 1, 1),
        });
        assert!(indirect.as_indirection().is_some());
        assert!(indirect.to_string().contains("link_note"));
    }
}
