use crate::error::ZettelError;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeSet,
    fs::{read_to_string, write},
    path::PathBuf,
};

/// Largest positional argument index a [CallPattern] may target.
pub const MAX_TARGET_ARGUMENT_INDEX: usize = 32;

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{XID_Start}_][\p{XID_Continue}_-]*$").expect("identifier regex to compile")
});

/// What a matched call site contributes to its note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternRole {
    Link,
    Tag,
}

/// A configured function-call shape that expresses a link or a tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CallPattern {
    pub role: PatternRole,
    /// Compared verbatim and case-sensitively against the callee identifier
    pub function_identifier: String,
    /// Index into the call's positional arguments
    #[serde(default)]
    pub target_argument_index: usize,
}

impl CallPattern {
    pub fn link(function_identifier: impl Into<String>, target_argument_index: usize) -> Self {
        CallPattern {
            role: PatternRole::Link,
            function_identifier: function_identifier.into(),
            target_argument_index,
        }
    }

    pub fn tag(function_identifier: impl Into<String>, target_argument_index: usize) -> Self {
        CallPattern {
            role: PatternRole::Tag,
            function_identifier: function_identifier.into(),
            target_argument_index,
        }
    }
}

/// How a relative link target is anchored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LinkResolution {
    /// Relative to the directory of the file containing the link
    #[default]
    RelativeToFile,
    /// Relative to the project root
    RelativeToRoot,
}

/// Process-wide, read-only configuration for a scan.
///
/// Every field has a default, so an empty TOML document is a valid configuration:
///
/// ```
/// # use zettel_core::config::{Config, LinkResolution};
/// let config = Config::from_toml_str(r#"
/// tag_marker = "@"
/// link_resolution = "relative-to-root"
///
/// [[call_patterns]]
/// role = "link"
/// function_identifier = "ref"
/// target_argument_index = 1
/// "#).unwrap();
/// assert_eq!(config.tag_marker, '@');
/// assert_eq!(config.link_resolution, LinkResolution::RelativeToRoot);
/// assert_eq!(config.call_patterns.len(), 1);
/// assert_eq!(config.source_extensions, vec!["typ".to_string()]);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub source_extensions: Vec<String>,
    pub tag_marker: char,
    pub link_resolution: LinkResolution,
    /// Kept last so TOML output places the array of tables after the plain keys
    pub call_patterns: Vec<CallPattern>,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            source_extensions: vec!["typ".to_string()],
            tag_marker: '#',
            link_resolution: LinkResolution::RelativeToFile,
            call_patterns: vec![CallPattern::link("link_note", 0), CallPattern::tag("tag", 0)],
        }
    }
}

impl Config {
    /// Parse and validate a TOML configuration.
    pub fn from_toml_str(content: &str) -> Result<Config, ZettelError> {
        let config: Config = toml::from_str(content)?;
        config.validated()
    }

    pub fn to_toml_string(&self) -> Result<String, ZettelError> {
        Ok(toml::to_string(self)?)
    }

    /// Check everything that would make a whole rebuild meaningless.
    ///
    /// Runs once, before any file is processed. Reports every problem found rather than only
    /// the first one.
    pub fn validate(&self) -> Result<(), ZettelError> {
        let mut problems = Vec::<String>::new();
        for (idx, pattern) in self.call_patterns.iter().enumerate() {
            if pattern.function_identifier.is_empty() {
                problems.push(format!("call pattern {idx} has an empty function identifier"));
            } else if !IDENTIFIER.is_match(&pattern.function_identifier) {
                problems.push(format!(
                    "call pattern {idx}: '{}' is not a bare identifier",
                    pattern.function_identifier
                ));
            }
            if pattern.target_argument_index > MAX_TARGET_ARGUMENT_INDEX {
                problems.push(format!(
                    "call pattern {idx}: target argument index {} exceeds {MAX_TARGET_ARGUMENT_INDEX}",
                    pattern.target_argument_index
                ));
            }
        }
        if self.source_extensions.is_empty() {
            problems.push("no source note extensions configured".to_string());
        }
        if self
            .source_extensions
            .iter()
            .any(|ext| ext.trim_start_matches('.').trim().is_empty())
        {
            problems.push("source note extensions may not be empty".to_string());
        }
        if self.tag_marker.is_whitespace() || self.tag_marker == '/' {
            problems.push(format!(
                "tag marker {:?} may not be whitespace or a path separator",
                self.tag_marker
            ));
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ZettelError::Config(problems.join("; ")))
        }
    }

    /// Validate, then normalize the extension list (no leading dot, lower case, deduplicated,
    /// original order kept).
    pub fn validated(mut self) -> Result<Config, ZettelError> {
        self.validate()?;
        let mut seen = BTreeSet::new();
        self.source_extensions = self
            .source_extensions
            .iter()
            .map(|ext| ext.trim().trim_start_matches('.').to_lowercase())
            .filter(|ext| seen.insert(ext.clone()))
            .collect();
        Ok(self)
    }

    /// Whether `ext` (without leading dot) names a source note. Case-insensitive.
    pub fn is_source_extension(&self, ext: &str) -> bool {
        !ext.is_empty()
            && self
                .source_extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext))
    }

    pub fn patterns_for<'a>(&'a self, function: &'a str) -> impl Iterator<Item = &'a CallPattern> {
        self.call_patterns
            .iter()
            .filter(move |pattern| pattern.function_identifier == function)
    }
}

/// Storage seam for [Config]. Callers own where configuration lives.
pub trait ConfigProvider: Send + Sync {
    fn get_config(&self) -> Result<Config, ZettelError>;
    fn set_config(&self, config: &Config) -> Result<(), ZettelError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TomlConfigProvider {
    path: PathBuf,
}

impl TomlConfigProvider {
    pub fn new(path: PathBuf) -> Self {
        TomlConfigProvider { path }
    }
}

impl ConfigProvider for TomlConfigProvider {
    fn get_config(&self) -> Result<Config, ZettelError> {
        tracing::debug!("Attempting to read configuration from: {:?}", &self.path);
        if !self.path.exists() {
            tracing::debug!("Config file not found, using the default configuration.");
            return Config::default().validated();
        }
        let content = read_to_string(&self.path)?;
        Config::from_toml_str(&content)
    }

    fn set_config(&self, config: &Config) -> Result<(), ZettelError> {
        tracing::debug!("Attempting to write configuration to: {:?}", &self.path);
        config.validate()?;
        write(&self.path, config.to_toml_string()?)?;
        Ok(())
    }
}
