/*
SPDX-License-Identifier: MPL-2.0
*/

//! The production aggregate: sections, notes and the resource graph.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::content::RawContent;
use crate::contextualization::{Contextualization, Contextualizer};
use crate::resource::Resource;

/// A footnote attached to a section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Note {
    pub id: String,
    #[serde(default)]
    pub contents: RawContent,
}

/// Descriptive metadata of a section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Heading depth in the table of contents.
    #[serde(default)]
    pub level: u8,
}

/// A document subdivision with its own contents and footnotes.
///
/// `notes_order` is authoritative: a note whose id is missing from it is
/// considered deleted even if its content object is still around, which
/// is what makes orphan reclamation possible.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub id: String,
    #[serde(default)]
    pub metadata: SectionMetadata,
    #[serde(default)]
    pub contents: RawContent,
    #[serde(default)]
    pub notes: IndexMap<String, Note>,
    #[serde(default)]
    pub notes_order: Vec<String>,
}

impl Section {
    pub fn new(id: impl Into<String>) -> Self {
        Section {
            id: id.into(),
            metadata: SectionMetadata::default(),
            contents: RawContent::empty(),
            notes: IndexMap::new(),
            notes_order: Vec::new(),
        }
    }

    /// Notes in citation order. Notes absent from `notes_order` are not
    /// yielded.
    pub fn ordered_notes(&self) -> impl Iterator<Item = &Note> {
        self.notes_order.iter().filter_map(|id| self.notes.get(id))
    }
}

/// Citation style/locale payloads selected for a production.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_style: Option<StylePayload>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub citation_locale: Option<StylePayload>,
}

/// An opaque style or locale definition, carried by value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StylePayload {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub data: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
}

/// Root aggregate owning the resource graph and the sections.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Production {
    pub id: String,
    #[serde(default)]
    pub metadata: ProductionMetadata,
    #[serde(default)]
    pub settings: ProductionSettings,
    #[serde(default)]
    pub resources: IndexMap<String, Resource>,
    #[serde(default)]
    pub contextualizers: IndexMap<String, Contextualizer>,
    #[serde(default)]
    pub contextualizations: IndexMap<String, Contextualization>,
    #[serde(default)]
    pub sections: IndexMap<String, Section>,
    #[serde(default)]
    pub sections_order: Vec<String>,
}

impl Production {
    pub fn new(id: impl Into<String>) -> Self {
        Production {
            id: id.into(),
            ..Production::default()
        }
    }

    /// Sections in document order.
    pub fn ordered_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections_order
            .iter()
            .filter_map(|id| self.sections.get(id))
    }

    /// Contextualizations bound to a section.
    pub fn section_contextualizations<'a>(
        &'a self,
        section_id: &'a str,
    ) -> impl Iterator<Item = &'a Contextualization> + 'a {
        self.contextualizations
            .values()
            .filter(move |c| c.section_id == section_id)
    }
}

/// One line of a table of contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryBlock {
    pub id: String,
    pub level: u8,
}

/// A user-defined override of the default section ordering/nesting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomSummary {
    #[serde(default)]
    pub active: bool,
    #[serde(default)]
    pub summary: Vec<SummaryBlock>,
}

/// Summary derived from `sections_order` and section levels, used when
/// no custom summary is active.
pub fn default_summary(production: &Production) -> Vec<SummaryBlock> {
    production
        .ordered_sections()
        .map(|section| SummaryBlock {
            id: section.id.clone(),
            level: section.metadata.level,
        })
        .collect()
}

/// Reconcile a custom summary with the current sections: blocks naming
/// deleted sections are dropped, sections it does not mention are
/// appended at their default level.
pub fn resolve_custom_summary(
    production: &Production,
    custom: &CustomSummary,
) -> Vec<SummaryBlock> {
    if !custom.active {
        return default_summary(production);
    }
    let mut summary: Vec<SummaryBlock> = custom
        .summary
        .iter()
        .filter(|block| production.sections.contains_key(&block.id))
        .cloned()
        .collect();
    for section in production.ordered_sections() {
        if !summary.iter().any(|block| block.id == section.id) {
            summary.push(SummaryBlock {
                id: section.id.clone(),
                level: section.metadata.level,
            });
        }
    }
    summary
}
