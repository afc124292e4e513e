/*
SPDX-License-Identifier: MPL-2.0
*/

mod common;
use common::*;

use ovide_core::content::{EntityType, Mutability, RawContent, Selection};
use ovide_core::contextualization::default_models;
use ovide_engine::error::{EngineError, PersistenceError};
use ovide_engine::index::{section_asset_ids, HostId, RefType};
use ovide_engine::lifecycle::{
    delete_contextualization_from_id, delete_uncited_context,
    remove_contextualization_reference_from_raw_contents, summon_asset, PersistenceBackend,
};

#[test]
fn bib_in_empty_block_becomes_a_block_asset() {
    let production = production_with_resources(vec![bib_resource("r1", "Kuhn", 1962, "Structure")]);
    let mut store = store_with(production.clone());
    let anchor = production.sections["s1"].contents.blocks[0].key.clone();
    let selection = Selection::collapsed(anchor, 0);

    let outcome = summon_asset(
        &production,
        "s1",
        &HostId::Main,
        "r1",
        &selection,
        &default_models(),
        &mut store,
    )
    .unwrap();

    assert_eq!(outcome.ref_type, RefType::Block);
    let persisted = store.production("p1").unwrap();
    assert_eq!(persisted.contextualizers.len(), 1);
    let contextualizer = persisted.contextualizers.values().next().unwrap();
    assert_eq!(contextualizer.contextualizer_type, "bib");
    assert_eq!(persisted.contextualizations.len(), 1);
    let contextualization = persisted.contextualizations.values().next().unwrap();
    assert_eq!(contextualization.resource_id, "r1");
    assert_eq!(contextualization.contextualizer_id, contextualizer.id);

    let section = &persisted.sections["s1"];
    let entity = section.contents.entity_map.values().next().unwrap();
    assert_eq!(entity.entity_type, EntityType::BlockAsset);
    assert_eq!(
        entity.data.asset_id(),
        Some(outcome.contextualization_id.as_str())
    );
}

#[test]
fn bib_in_non_empty_block_becomes_inline_with_space_placeholder() {
    let mut production =
        production_with_resources(vec![bib_resource("r1", "Kuhn", 1962, "Structure")]);
    let section = production.sections.get_mut("s1").unwrap();
    section.contents = RawContent::from_text("some prose");
    let mut store = store_with(production.clone());
    let anchor = production.sections["s1"].contents.blocks[0].key.clone();
    let selection = Selection::collapsed(anchor, 4);

    let outcome = summon_asset(
        &production,
        "s1",
        &HostId::Main,
        "r1",
        &selection,
        &default_models(),
        &mut store,
    )
    .unwrap();

    assert_eq!(outcome.ref_type, RefType::Inline);
    let section = &store.production("p1").unwrap().sections["s1"];
    // one-space placeholder spliced into the prose
    assert_eq!(section.contents.plain_text(), "some  prose");
    let entity = section.contents.entity_map.values().next().unwrap();
    assert_eq!(entity.entity_type, EntityType::InlineAsset);
    assert_eq!(entity.mutability, Mutability::Immutable);
}

#[test]
fn glossary_forces_inline_with_mutable_name_placeholder() {
    let mut production = production_with_resources(vec![glossary_resource("r2", "Foo")]);
    let section = production.sections.get_mut("s1").unwrap();
    section.contents = RawContent::from_text("term goes here");
    let mut store = store_with(production.clone());
    let anchor = production.sections["s1"].contents.blocks[0].key.clone();
    let selection = Selection::collapsed(anchor, 5);

    let outcome = summon_asset(
        &production,
        "s1",
        &HostId::Main,
        "r2",
        &selection,
        &default_models(),
        &mut store,
    )
    .unwrap();

    assert_eq!(outcome.ref_type, RefType::Inline);
    let section = &store.production("p1").unwrap().sections["s1"];
    assert_eq!(section.contents.plain_text(), "term Foogoes here");
    let entity = section.contents.entity_map.values().next().unwrap();
    assert_eq!(entity.entity_type, EntityType::InlineAsset);
    assert_eq!(entity.mutability, Mutability::Mutable);
    let block = &section.contents.blocks[0];
    let key = block.entity_key_at(5).unwrap().to_string();
    assert_eq!(block.entity_range(&key), Some((5, 8)));
}

#[test]
fn glossary_stays_inline_even_in_an_empty_block() {
    let production = production_with_resources(vec![glossary_resource("r2", "Foo")]);
    let mut store = store_with(production.clone());
    let anchor = production.sections["s1"].contents.blocks[0].key.clone();
    let selection = Selection::collapsed(anchor, 0);

    let outcome = summon_asset(
        &production,
        "s1",
        &HostId::Main,
        "r2",
        &selection,
        &default_models(),
        &mut store,
    )
    .unwrap();

    assert_eq!(outcome.ref_type, RefType::Inline);
}

#[test]
fn summon_then_delete_restores_the_index() {
    let mut production =
        production_with_resources(vec![bib_resource("r1", "Kuhn", 1962, "Structure")]);
    let section = production.sections.get_mut("s1").unwrap();
    section.contents = RawContent::from_text("before after");
    let before_ids = section_asset_ids(&production.sections["s1"]);

    let mut store = store_with(production.clone());
    let anchor = production.sections["s1"].contents.blocks[0].key.clone();
    let outcome = summon_asset(
        &production,
        "s1",
        &HostId::Main,
        "r1",
        &Selection::collapsed(anchor, 6),
        &default_models(),
        &mut store,
    )
    .unwrap();

    let inserted = store.production("p1").unwrap().sections["s1"].clone();
    assert!(section_asset_ids(&inserted).contains(&outcome.contextualization_id));

    let update = delete_contextualization_from_id(
        "p1",
        &inserted,
        &outcome.contextualization_id,
        &mut store,
    )
    .unwrap()
    .expect("a live entity should have been found");
    assert_eq!(update.host, HostId::Main);

    let restored = &store.production("p1").unwrap().sections["s1"];
    assert_eq!(section_asset_ids(restored), before_ids);
}

#[test]
fn delete_from_id_searches_notes_too() {
    let mut production =
        production_with_resources(vec![bib_resource("r1", "Kuhn", 1962, "Structure")]);
    let note_contents = wire_reference(
        &mut production,
        "ctx-note",
        "r1",
        "bib",
        RawContent::from_text("noted"),
        EntityType::InlineAsset,
        2,
    );
    let section = production.sections.get_mut("s1").unwrap();
    section.notes.insert("n1".to_string(), note_with("n1", note_contents));
    section.notes_order.push("n1".to_string());
    let mut store = store_with(production.clone());

    let update = delete_contextualization_from_id(
        "p1",
        &production.sections["s1"],
        "ctx-note",
        &mut store,
    )
    .unwrap()
    .expect("entity should be found in the note");
    assert_eq!(update.host, HostId::Note("n1".to_string()));
    let note = &store.production("p1").unwrap().sections["s1"].notes["n1"];
    assert!(note.contents.entity_map.is_empty());
}

#[test]
fn remove_reference_without_match_reports_unchanged() {
    let mut production =
        production_with_resources(vec![bib_resource("r1", "Kuhn", 1962, "Structure")]);
    let contents = wire_reference(
        &mut production,
        "ctx-1",
        "r1",
        "bib",
        RawContent::from_text("cited text"),
        EntityType::InlineAsset,
        0,
    );
    let (result, changed) =
        remove_contextualization_reference_from_raw_contents(&contents, "no-such-id");
    assert!(!changed);
    assert_eq!(result, contents);
}

#[test]
fn remove_reference_drops_sole_purpose_atomic_blocks() {
    let mut production =
        production_with_resources(vec![bib_resource("r1", "Kuhn", 1962, "Structure")]);
    let contents = RawContent::from_text("intro");
    let anchor = contents.blocks[0].key.clone();
    let mut contents = wire_reference(
        &mut production,
        "ctx-1",
        "r1",
        "bib",
        contents,
        EntityType::InlineAsset,
        0,
    );
    // an atomic block hosting a second reference to the same id
    contents = contents.with_atomic_entity(
        &anchor,
        ovide_core::content::RawEntity {
            entity_type: EntityType::BlockAsset,
            mutability: Mutability::Immutable,
            data: ovide_core::content::EntityData::asset("ctx-1"),
        },
    );
    assert_eq!(contents.blocks.len(), 2);

    let (result, changed) = remove_contextualization_reference_from_raw_contents(&contents, "ctx-1");
    assert!(changed);
    assert_eq!(result.blocks.len(), 1);
    assert!(result.entity_map.is_empty());
    assert!(result.blocks[0].entity_ranges.is_empty());
}

#[test]
fn uncited_notes_and_their_contexts_are_reclaimed() {
    let mut production =
        production_with_resources(vec![bib_resource("r1", "Kuhn", 1962, "Structure")]);
    let cited = wire_reference(
        &mut production,
        "ctx-cited",
        "r1",
        "bib",
        RawContent::from_text("kept note"),
        EntityType::InlineAsset,
        0,
    );
    let orphaned = wire_reference(
        &mut production,
        "ctx-orphan",
        "r1",
        "bib",
        RawContent::from_text("dropped note"),
        EntityType::InlineAsset,
        0,
    );
    let section = production.sections.get_mut("s1").unwrap();
    section.notes.insert("n1".to_string(), note_with("n1", cited));
    section.notes.insert("n2".to_string(), note_with("n2", orphaned));
    section.notes_order = vec!["n1".to_string()];
    let mut store = store_with(production.clone());

    let reclaimed = delete_uncited_context(&production, "s1", &mut store).unwrap();
    assert_eq!(reclaimed.contextualization_ids, vec!["ctx-orphan".to_string()]);
    assert_eq!(reclaimed.contextualizer_ids, vec!["ctx-orphan-ctxr".to_string()]);

    let persisted = store.production("p1").unwrap();
    assert!(!persisted.sections["s1"].notes.contains_key("n2"));
    assert!(persisted.sections["s1"].notes.contains_key("n1"));
    assert!(persisted.contextualizations.contains_key("ctx-cited"));
    assert!(!persisted.contextualizations.contains_key("ctx-orphan"));
    assert!(!persisted.contextualizers.contains_key("ctx-orphan-ctxr"));
}

#[test]
fn orphan_reclamation_is_idempotent() {
    let mut production =
        production_with_resources(vec![bib_resource("r1", "Kuhn", 1962, "Structure")]);
    let orphaned = wire_reference(
        &mut production,
        "ctx-orphan",
        "r1",
        "bib",
        RawContent::from_text("dropped note"),
        EntityType::InlineAsset,
        0,
    );
    let section = production.sections.get_mut("s1").unwrap();
    section.notes.insert("n2".to_string(), note_with("n2", orphaned));
    let mut store = store_with(production.clone());

    let first = delete_uncited_context(&production, "s1", &mut store).unwrap();
    assert_eq!(first.contextualization_ids.len(), 1);

    let after_first = store.production("p1").unwrap().clone();
    let second = delete_uncited_context(&after_first, "s1", &mut store).unwrap();
    assert!(second.contextualization_ids.is_empty());
    assert!(second.contextualizer_ids.is_empty());
    assert_eq!(store.production("p1").unwrap(), &after_first);
}

/// Backend that fails on the contextualization step, to observe the
/// saga's abort-without-rollback contract.
struct FailingBackend {
    inner: ovide_engine::store::ProductionStore,
}

impl PersistenceBackend for FailingBackend {
    fn create_contextualizer(
        &mut self,
        production_id: &str,
        contextualizer: &ovide_core::contextualization::Contextualizer,
    ) -> Result<(), PersistenceError> {
        self.inner.create_contextualizer(production_id, contextualizer)
    }

    fn create_contextualization(
        &mut self,
        _production_id: &str,
        _contextualization: &ovide_core::contextualization::Contextualization,
    ) -> Result<(), PersistenceError> {
        Err(PersistenceError::new("create_contextualization", "backend down"))
    }

    fn update_section(
        &mut self,
        production_id: &str,
        section: &ovide_core::production::Section,
    ) -> Result<(), PersistenceError> {
        PersistenceBackend::update_section(&mut self.inner, production_id, section)
    }

    fn delete_contextualizer(
        &mut self,
        production_id: &str,
        contextualizer_id: &str,
    ) -> Result<(), PersistenceError> {
        PersistenceBackend::delete_contextualizer(&mut self.inner, production_id, contextualizer_id)
    }

    fn delete_contextualization(
        &mut self,
        production_id: &str,
        contextualization_id: &str,
    ) -> Result<(), PersistenceError> {
        PersistenceBackend::delete_contextualization(
            &mut self.inner,
            production_id,
            contextualization_id,
        )
    }
}

#[test]
fn saga_aborts_on_failure_and_keeps_committed_steps() {
    let production = production_with_resources(vec![bib_resource("r1", "Kuhn", 1962, "Structure")]);
    let mut backend = FailingBackend {
        inner: store_with(production.clone()),
    };
    let anchor = production.sections["s1"].contents.blocks[0].key.clone();

    let error = summon_asset(
        &production,
        "s1",
        &HostId::Main,
        "r1",
        &Selection::collapsed(anchor, 0),
        &default_models(),
        &mut backend,
    )
    .unwrap_err();
    assert!(matches!(error, EngineError::Persistence(_)));

    let persisted = backend.inner.production("p1").unwrap();
    // step 1 committed, steps 2 and 3 never ran
    assert_eq!(persisted.contextualizers.len(), 1);
    assert!(persisted.contextualizations.is_empty());
    assert_eq!(persisted.sections["s1"], production.sections["s1"]);
}
