/*
SPDX-License-Identifier: MPL-2.0
*/

//! The entity-reference index.
//!
//! Derives, from the serialized contents of a section (main content plus
//! every note listed in `notes_order`), which contextualization ids are
//! currently referenced and where. The index is recomputed from scratch
//! after each content mutation; discovery order is meaningful, it is the
//! citation order used by the resolution engine.

use indexmap::IndexSet;
use ovide_core::content::{EntityType, RawContent};
use ovide_core::production::Section;
use serde::{Deserialize, Serialize};

/// Which content of a section hosts a reference.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostId {
    Main,
    Note(String),
}

impl HostId {
    /// Wire name of the host, `"main"` or the note id.
    pub fn as_str(&self) -> &str {
        match self {
            HostId::Main => "main",
            HostId::Note(id) => id.as_str(),
        }
    }

    pub fn from_content_id(content_id: &str) -> Self {
        if content_id == "main" {
            HostId::Main
        } else {
            HostId::Note(content_id.to_string())
        }
    }
}

/// Reference kind, mirroring the entity type that carries it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RefType {
    Inline,
    Block,
}

impl RefType {
    pub fn from_entity(entity_type: EntityType) -> Option<Self> {
        match entity_type {
            EntityType::InlineAsset => Some(RefType::Inline),
            EntityType::BlockAsset => Some(RefType::Block),
            EntityType::NotePointer => None,
        }
    }
}

/// One discovered reference site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetReference {
    pub contextualization_id: String,
    pub host: HostId,
    pub ref_type: RefType,
}

/// Scan one content: asset ids in block/range order, de-duplicated.
pub fn content_references(contents: &RawContent, host: HostId) -> Vec<AssetReference> {
    let mut seen: IndexSet<String> = IndexSet::new();
    let mut references = Vec::new();
    for block in &contents.blocks {
        for range in &block.entity_ranges {
            let Some(entity) = contents.entity(&range.key) else {
                continue;
            };
            let Some(ref_type) = RefType::from_entity(entity.entity_type) else {
                continue;
            };
            let Some(asset_id) = entity.data.asset_id() else {
                continue;
            };
            if seen.insert(asset_id.to_string()) {
                references.push(AssetReference {
                    contextualization_id: asset_id.to_string(),
                    host: host.clone(),
                    ref_type,
                });
            }
        }
    }
    references
}

/// Scan a whole section: main content first, then every note listed in
/// `notes_order`. Notes absent from `notes_order` are excluded; they
/// count as deleted, which is what lets orphan reclamation find their
/// contextualizations.
pub fn section_references(section: &Section) -> Vec<AssetReference> {
    let mut references = content_references(&section.contents, HostId::Main);
    for note in section.ordered_notes() {
        references.extend(content_references(
            &note.contents,
            HostId::Note(note.id.clone()),
        ));
    }
    references
}

/// De-duplicated union of every contextualization id referenced across
/// a section, in discovery order.
pub fn section_asset_ids(section: &Section) -> IndexSet<String> {
    section_references(section)
        .into_iter()
        .map(|reference| reference.contextualization_id)
        .collect()
}
