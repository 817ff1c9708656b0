//! Merges front matter and walker output for one file into a [NoteRecord].
use std::collections::BTreeSet;

use crate::{
    codec::{
        diagnostic::{InvalidTargetReason, NoteDiagnostic},
        frontmatter::FrontMatter,
        walker::{ExtractedLink, Extraction},
    },
    config::{Config, LinkResolution},
    paths::NotePath,
    properties::{NoteId, NoteRecord, OutgoingLink, Tag},
};

/// Normalizes per-file metadata under one configuration.
#[derive(Debug, Clone, Copy)]
pub struct NoteAssembler<'c> {
    config: &'c Config,
}

impl<'c> NoteAssembler<'c> {
    pub fn new(config: &'c Config) -> Self {
        NoteAssembler { config }
    }

    /// Build the record for `id`.
    ///
    /// `front_matter_diagnostics` are carried into the record ahead of the walker's warnings and
    /// the findings made here. Links keep `target_id` unset; resolution against other notes is
    /// the graph's job.
    pub fn assemble(
        &self,
        id: NoteId,
        front_matter: FrontMatter,
        front_matter_diagnostics: Vec<NoteDiagnostic>,
        extraction: Extraction,
    ) -> NoteRecord {
        let mut diagnostics = front_matter_diagnostics;
        diagnostics.extend(extraction.warnings.into_iter().map(NoteDiagnostic::from));

        let raw_tags = front_matter
            .tags
            .iter()
            .map(String::as_str)
            .chain(extraction.tags.iter().map(|tag| tag.raw_tag.as_str()));
        let tags = self.canonical_tags(raw_tags, &mut diagnostics);

        let mut links = Vec::with_capacity(extraction.links.len());
        for link in extraction.links {
            match self.resolve_link(&id, &link) {
                Ok(outgoing) => links.push(outgoing),
                Err(reason) => {
                    tracing::debug!(
                        "[assembler] {id}: discarding link {:?}: {reason}",
                        link.raw_target
                    );
                    diagnostics.push(NoteDiagnostic::InvalidLinkTarget {
                        target: link.raw_target,
                        reason,
                        position: link.position,
                    });
                }
            }
        }

        let title = front_matter
            .title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| id.file_stem().to_string());

        NoteRecord {
            id,
            title,
            tags,
            links,
            diagnostics,
            words: 0,
            characters: 0,
        }
    }

    fn canonical_tags<'r>(
        &self,
        raw_tags: impl Iterator<Item = &'r str>,
        diagnostics: &mut Vec<NoteDiagnostic>,
    ) -> BTreeSet<Tag> {
        let mut tags = BTreeSet::new();
        for raw in raw_tags {
            match Tag::canonicalize(raw, self.config.tag_marker) {
                Some(tag) => {
                    tags.insert(tag);
                }
                None => diagnostics.push(NoteDiagnostic::warning(format!(
                    "tag {raw:?} is empty once the marker is removed"
                ))),
            }
        }
        tags
    }

    fn resolve_link(
        &self,
        from: &NoteId,
        link: &ExtractedLink,
    ) -> Result<OutgoingLink, InvalidTargetReason> {
        let target_path = self.resolve_target(from, &link.raw_target)?;
        Ok(OutgoingLink {
            target_raw: link.raw_target.clone(),
            target_path,
            target_id: None,
            position: link.position,
        })
    }

    /// Resolve a literal link target to the project-relative note it names.
    ///
    /// The literal text alone decides: whatever the called function would do with the argument
    /// is never considered.
    ///
    /// ```
    /// # use zettel_core::{config::Config, codec::NoteAssembler, properties::NoteId};
    /// # use zettel_core::codec::InvalidTargetReason;
    /// let config = Config::default();
    /// let assembler = NoteAssembler::new(&config);
    /// let from = NoteId::parse("math/groups.typ").unwrap();
    /// assert_eq!(
    ///     assembler.resolve_target(&from, "../lie.typ").unwrap().as_str(),
    ///     "lie.typ"
    /// );
    /// assert_eq!(
    ///     assembler.resolve_target(&from, "./lie.pdf"),
    ///     Err(InvalidTargetReason::DisallowedExtension("pdf".to_string()))
    /// );
    /// ```
    pub fn resolve_target(&self, from: &NoteId, raw: &str) -> Result<NoteId, InvalidTargetReason> {
        if raw.trim().is_empty() {
            return Err(InvalidTargetReason::Empty);
        }
        if raw.contains("://") || raw.starts_with("mailto:") {
            return Err(InvalidTargetReason::ExternalUrl);
        }

        let target = NotePath::new(raw);
        let resolved = match self.config.link_resolution {
            _ if target.is_rooted() => target.normalize(),
            LinkResolution::RelativeToFile => from.as_path().join(raw),
            LinkResolution::RelativeToRoot => target.normalize(),
        };
        let resolved = resolved.ok_or(InvalidTargetReason::EscapesProject)?;

        if resolved.is_empty() {
            return Err(InvalidTargetReason::Empty);
        }
        let ext = NotePath::new(&resolved).ext();
        if ext.is_empty() {
            return Err(InvalidTargetReason::MissingExtension);
        }
        if !self.config.is_source_extension(ext) {
            return Err(InvalidTargetReason::DisallowedExtension(ext.to_string()));
        }
        NoteId::parse(&resolved).map_err(|_| InvalidTargetReason::EscapesProject)
    }
}
