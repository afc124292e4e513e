/*
SPDX-License-Identifier: MPL-2.0
*/

//! Asset lifecycle management.
//!
//! Inserting a citation or an embed creates three things at once: a
//! contextualizer, a contextualization and an entity in the target
//! content. The three persistence steps form a deliberate saga: each
//! step is awaited before the next, a failure aborts the remainder and
//! is surfaced to the caller, and already-committed steps are left in
//! place (no compensation). Removal goes the other way: entities are
//! cleared from contents first, then orphaned graph records are
//! reclaimed by [`delete_uncited_context`].

use ovide_core::content::{
    EntityData, EntityType, Mutability, RawContent, RawEntity, Selection,
};
use ovide_core::contextualization::{Contextualization, Contextualizer, ContextualizerModel};
use ovide_core::production::{Production, Section};
use ovide_core::resource::{Resource, ResourceType};
use uuid::Uuid;

use crate::error::{EngineError, PersistenceError, Result};
use crate::index::{section_asset_ids, HostId, RefType};

/// The persistence capability the lifecycle manager depends on.
///
/// Injected explicitly rather than reached through ambient context; the
/// in-memory [`crate::store::ProductionStore`] implements it, a real
/// deployment points it at its sync layer.
pub trait PersistenceBackend {
    fn create_contextualizer(
        &mut self,
        production_id: &str,
        contextualizer: &Contextualizer,
    ) -> std::result::Result<(), PersistenceError>;

    fn create_contextualization(
        &mut self,
        production_id: &str,
        contextualization: &Contextualization,
    ) -> std::result::Result<(), PersistenceError>;

    fn update_section(
        &mut self,
        production_id: &str,
        section: &Section,
    ) -> std::result::Result<(), PersistenceError>;

    fn delete_contextualizer(
        &mut self,
        production_id: &str,
        contextualizer_id: &str,
    ) -> std::result::Result<(), PersistenceError>;

    fn delete_contextualization(
        &mut self,
        production_id: &str,
        contextualization_id: &str,
    ) -> std::result::Result<(), PersistenceError>;
}

/// What a successful [`summon_asset`] produced. The caller uses the
/// host to run its focus-reset cycle and the section to reattach the
/// live editor to the persisted contents.
#[derive(Debug, Clone)]
pub struct SummonOutcome {
    pub contextualization_id: String,
    pub contextualizer_id: String,
    pub ref_type: RefType,
    pub host: HostId,
    pub section: Section,
}

fn fresh_id() -> String {
    Uuid::new_v4().to_string()
}

fn host_contents<'a>(section: &'a Section, host: &HostId) -> Result<&'a RawContent> {
    match host {
        HostId::Main => Ok(&section.contents),
        HostId::Note(note_id) => section
            .notes
            .get(note_id)
            .map(|note| &note.contents)
            .ok_or_else(|| EngineError::NoteNotFound(note_id.clone(), section.id.clone())),
    }
}

fn with_host_contents(section: &Section, host: &HostId, contents: RawContent) -> Section {
    let mut section = section.clone();
    match host {
        HostId::Main => section.contents = contents,
        HostId::Note(note_id) => {
            if let Some(note) = section.notes.get_mut(note_id) {
                note.contents = contents;
            }
        }
    }
    section
}

/// Decide between inline and block insertion: a collapsed caret in an
/// empty block means block mode, anything else means inline. Glossary
/// resources are always inline, whatever the selection looks like.
fn insertion_ref_type(
    contents: &RawContent,
    selection: &Selection,
    resource: &Resource,
) -> Result<RefType> {
    if resource.metadata.resource_type == ResourceType::Glossary {
        return Ok(RefType::Inline);
    }
    if selection.is_collapsed {
        let anchor = contents
            .block(&selection.anchor_key)
            .ok_or(EngineError::InvalidSelection)?;
        if anchor.text.trim().is_empty() {
            return Ok(RefType::Block);
        }
    }
    Ok(RefType::Inline)
}

/// Pick the contextualizer type for a resource and insertion mode: the
/// model whose id equals the resource type wins when it supports the
/// mode, otherwise the catalogue is scanned in declaration order for
/// the first model accepting the resource in that mode.
fn select_contextualizer_type(
    models: &[ContextualizerModel],
    resource: &Resource,
    ref_type: RefType,
) -> Result<&'static str> {
    let inline = ref_type == RefType::Inline;
    let natural = models
        .iter()
        .find(|model| model.id == resource.metadata.resource_type.as_str());
    if let Some(model) = natural {
        if model.profile.supports(inline) {
            return Ok(model.id);
        }
    }
    models
        .iter()
        .find(|model| model.accepts(resource) && model.profile.supports(inline))
        .map(|model| model.id)
        .ok_or_else(|| EngineError::NoMatchingContextualizer {
            resource_id: resource.id.clone(),
            mode: if inline { "inline" } else { "block" },
        })
}

/// Placeholder text inserted when an inline asset is summoned over an
/// empty selection, and whether the resulting entity stays editable.
fn inline_placeholder(resource: &Resource) -> (String, Mutability) {
    match resource.metadata.resource_type {
        ResourceType::Glossary => (
            resource.glossary_name().unwrap_or(" ").to_string(),
            Mutability::Mutable,
        ),
        ResourceType::Webpage => (
            resource
                .metadata
                .title
                .clone()
                .unwrap_or_else(|| " ".to_string()),
            Mutability::Mutable,
        ),
        _ => (" ".to_string(), Mutability::Immutable),
    }
}

/// Apply an entity to every character of a (possibly multi-block)
/// forward range.
fn apply_entity_over_selection(
    contents: RawContent,
    selection: &Selection,
    entity_key: &str,
) -> RawContent {
    let (start_key, start, end_key, end) = selection.normalized();
    let (Some(start_idx), Some(end_idx)) = (
        contents.block_index(&start_key),
        contents.block_index(&end_key),
    ) else {
        return contents;
    };
    let mut contents = contents;
    for idx in start_idx..=end_idx {
        let block = &contents.blocks[idx];
        let key = block.key.clone();
        let s = if idx == start_idx { start } else { 0 };
        let e = if idx == end_idx { end } else { block.text_len() };
        if s < e {
            contents = contents.with_entity_applied(&key, s, e, entity_key);
        }
    }
    contents
}

/// Summon a resource into a content host: create the contextualizer and
/// contextualization, insert the entity, persist.
///
/// Persistence runs as a three-step saga in a fixed order (create
/// contextualizer, create contextualization, update section); a failing
/// step aborts the remaining ones and surfaces the error, committed
/// steps are not rolled back.
#[allow(clippy::too_many_arguments)]
pub fn summon_asset<B: PersistenceBackend>(
    production: &Production,
    section_id: &str,
    host: &HostId,
    resource_id: &str,
    selection: &Selection,
    models: &[ContextualizerModel],
    backend: &mut B,
) -> Result<SummonOutcome> {
    let section = production
        .sections
        .get(section_id)
        .ok_or_else(|| EngineError::SectionNotFound(section_id.to_string()))?;
    let resource = production
        .resources
        .get(resource_id)
        .ok_or_else(|| EngineError::ResourceNotFound(resource_id.to_string()))?;
    let contents = host_contents(section, host)?;

    let ref_type = insertion_ref_type(contents, selection, resource)?;
    let contextualizer_type = select_contextualizer_type(models, resource, ref_type)?;

    let contextualizer = Contextualizer::new(fresh_id(), contextualizer_type);
    let contextualization = Contextualization {
        id: fresh_id(),
        resource_id: resource.id.clone(),
        contextualizer_id: contextualizer.id.clone(),
        section_id: section.id.clone(),
        additional_resources: Vec::new(),
    };

    let new_contents = match ref_type {
        RefType::Block => contents.with_atomic_entity(
            &selection.anchor_key,
            RawEntity {
                entity_type: EntityType::BlockAsset,
                mutability: Mutability::Immutable,
                data: EntityData::asset(contextualization.id.clone()),
            },
        ),
        RefType::Inline => {
            let selected = contents.slice(selection).plain_text();
            let (target_selection, contents, mutability) = if selected.is_empty() {
                let (placeholder, mutability) = inline_placeholder(resource);
                let replaced = contents.with_text_replaced(selection, &placeholder);
                let (start_key, start, _, _) = selection.normalized();
                let length = placeholder.chars().count();
                (
                    Selection::range(start_key, start, start + length),
                    replaced,
                    mutability,
                )
            } else {
                (selection.clone(), contents.clone(), Mutability::Immutable)
            };
            let (entity_key, contents) = contents.with_entity(RawEntity {
                entity_type: EntityType::InlineAsset,
                mutability,
                data: EntityData::asset(contextualization.id.clone()),
            });
            apply_entity_over_selection(contents, &target_selection, &entity_key)
        }
    };

    let new_section = with_host_contents(section, host, new_contents);

    // the saga: sequential, dependent, no rollback
    backend
        .create_contextualizer(&production.id, &contextualizer)
        .map_err(|e| abort_saga("create_contextualizer", e))?;
    backend
        .create_contextualization(&production.id, &contextualization)
        .map_err(|e| abort_saga("create_contextualization", e))?;
    backend
        .update_section(&production.id, &new_section)
        .map_err(|e| abort_saga("update_section", e))?;

    Ok(SummonOutcome {
        contextualization_id: contextualization.id,
        contextualizer_id: contextualizer.id,
        ref_type,
        host: host.clone(),
        section: new_section,
    })
}

fn abort_saga(step: &'static str, error: PersistenceError) -> EngineError {
    log::error!("asset summon aborted at {step}: {error}");
    EngineError::Persistence(error)
}

/// Clear the first live entity referencing a contextualization.
///
/// Every host of the section is searched (main first, then notes); on
/// the first matching entity its full character range is un-applied and
/// the section is persisted. At most one live reference site per
/// contextualization is assumed: if more exist, only the first one in
/// host/block/range order is cleared by a given call.
pub fn delete_contextualization_from_id<B: PersistenceBackend>(
    production_id: &str,
    section: &Section,
    contextualization_id: &str,
    backend: &mut B,
) -> Result<Option<SectionUpdate>> {
    let mut hosts: Vec<(HostId, &RawContent)> = vec![(HostId::Main, &section.contents)];
    hosts.extend(
        section
            .notes
            .values()
            .map(|note| (HostId::Note(note.id.clone()), &note.contents)),
    );

    for (host, contents) in hosts {
        for block in &contents.blocks {
            for range in &block.entity_ranges {
                let Some(entity) = contents.entity(&range.key) else {
                    continue;
                };
                if !entity.entity_type.is_asset()
                    || entity.data.asset_id() != Some(contextualization_id)
                {
                    continue;
                }
                // full range of the entity within this block
                let (start, end) = block
                    .entity_range(&range.key)
                    .unwrap_or((range.offset, range.offset + range.length));
                let cleared = contents.with_entity_cleared(&block.key, start, end);
                let new_section = with_host_contents(section, &host, cleared);
                backend.update_section(production_id, &new_section)?;
                return Ok(Some(SectionUpdate {
                    host,
                    section: new_section,
                }));
            }
        }
    }
    Ok(None)
}

/// A persisted section change, tagged with the host that changed.
#[derive(Debug, Clone)]
pub struct SectionUpdate {
    pub host: HostId,
    pub section: Section,
}

/// Remove every reference to a contextualization from a serialized
/// content: matching entity records are dropped from the entity map,
/// their ranges are stripped from every block, and an atomic block whose
/// sole purpose was hosting the removed entity is dropped entirely.
/// The boolean reports whether anything changed, so callers can skip
/// redundant persistence.
pub fn remove_contextualization_reference_from_raw_contents(
    contents: &RawContent,
    contextualization_id: &str,
) -> (RawContent, bool) {
    let doomed_keys: Vec<String> = contents
        .entity_map
        .iter()
        .filter(|(_, entity)| {
            entity.entity_type.is_asset()
                && entity.data.asset_id() == Some(contextualization_id)
        })
        .map(|(key, _)| key.clone())
        .collect();
    if doomed_keys.is_empty() {
        return (contents.clone(), false);
    }

    let mut result = contents.clone();
    result.blocks = result
        .blocks
        .into_iter()
        .filter_map(|mut block| {
            if doomed_keys.iter().any(|key| block.is_atomic_host_of(key)) {
                return None;
            }
            block.entity_ranges.retain(|range| {
                contents.entity_map.contains_key(&range.key) && !doomed_keys.contains(&range.key)
            });
            Some(block)
        })
        .collect();
    for key in &doomed_keys {
        result.entity_map.shift_remove(key);
    }
    (result, true)
}

/// Drop the notes a section no longer lists in `notes_order`. Uncited
/// notes are pruned, not just unindexed.
pub fn clean_uncited_notes(section: &Section) -> Section {
    let mut section = section.clone();
    let order = section.notes_order.clone();
    section.notes.retain(|note_id, _| order.contains(note_id));
    section
}

/// Ids reclaimed by one [`delete_uncited_context`] run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReclaimedContexts {
    pub contextualization_ids: Vec<String>,
    pub contextualizer_ids: Vec<String>,
    pub section: Option<Section>,
}

/// The garbage collector of the contextualization graph.
///
/// Prunes notes missing from `notes_order`, persists the cleaned
/// section, recomputes the entity-reference index over it, and deletes
/// every contextualization of the section absent from that index along
/// with its contextualizer. Running it twice in a row deletes nothing
/// the second time.
pub fn delete_uncited_context<B: PersistenceBackend>(
    production: &Production,
    section_id: &str,
    backend: &mut B,
) -> Result<ReclaimedContexts> {
    let section = production
        .sections
        .get(section_id)
        .ok_or_else(|| EngineError::SectionNotFound(section_id.to_string()))?;
    let cleaned = clean_uncited_notes(section);
    backend.update_section(&production.id, &cleaned)?;

    let cited = section_asset_ids(&cleaned);
    let mut reclaimed = ReclaimedContexts {
        section: Some(cleaned),
        ..ReclaimedContexts::default()
    };
    for contextualization in production.section_contextualizations(section_id) {
        if cited.contains(&contextualization.id) {
            continue;
        }
        backend.delete_contextualization(&production.id, &contextualization.id)?;
        backend.delete_contextualizer(&production.id, &contextualization.contextualizer_id)?;
        reclaimed
            .contextualization_ids
            .push(contextualization.id.clone());
        reclaimed
            .contextualizer_ids
            .push(contextualization.contextualizer_id.clone());
    }
    if !reclaimed.contextualization_ids.is_empty() {
        log::debug!(
            "reclaimed {} uncited contextualization(s) in section {section_id}",
            reclaimed.contextualization_ids.len()
        );
    }
    Ok(reclaimed)
}
