/*
SPDX-License-Identifier: MPL-2.0
*/

#![allow(dead_code)]

use indexmap::IndexMap;
use ovide_core::content::{EntityData, EntityType, Mutability, RawContent, RawEntity};
use ovide_core::contextualization::{Contextualization, Contextualizer};
use ovide_core::csl::{CslDate, CslItem, CslName};
use ovide_core::production::{Note, Production, Section};
use ovide_core::resource::{
    GlossaryData, Resource, ResourceData, ResourceMetadata, ResourceType,
};
use ovide_engine::citations::{CitationModels, CitationRenderer, Citations, RenderedCitations};
use ovide_engine::store::ProductionStore;

// --- Resource builders ---

pub fn bib_resource(id: &str, family: &str, year: i32, title: &str) -> Resource {
    Resource {
        id: id.to_string(),
        metadata: ResourceMetadata {
            title: Some(title.to_string()),
            ..ResourceMetadata::new(ResourceType::Bib)
        },
        data: ResourceData::Bib(vec![CslItem {
            id: format!("{id}-ref"),
            item_type: Some("book".to_string()),
            title: Some(title.to_string()),
            author: vec![CslName::structured(family, "A.")],
            issued: Some(CslDate::year(year)),
            ..CslItem::default()
        }]),
    }
}

pub fn glossary_resource(id: &str, name: &str) -> Resource {
    Resource {
        id: id.to_string(),
        metadata: ResourceMetadata::new(ResourceType::Glossary),
        data: ResourceData::Glossary(GlossaryData {
            name: name.to_string(),
            description: None,
            glossary_type: None,
        }),
    }
}

// --- Production scaffolding ---

/// A production with one section `s1` and the given resources.
pub fn production_with_resources(resources: Vec<Resource>) -> Production {
    let mut production = Production::new("p1");
    let mut section = Section::new("s1");
    section.contents = RawContent::empty();
    production.sections.insert("s1".to_string(), section);
    production.sections_order.push("s1".to_string());
    for resource in resources {
        production.resources.insert(resource.id.clone(), resource);
    }
    production
}

pub fn store_with(production: Production) -> ProductionStore {
    let mut store = ProductionStore::new();
    store.insert_production(production);
    store
}

/// Manually wire a contextualization + contextualizer pair into a
/// production, plus an entity referencing it inside a content.
pub fn wire_reference(
    production: &mut Production,
    contextualization_id: &str,
    resource_id: &str,
    contextualizer_type: &str,
    contents: RawContent,
    entity_type: EntityType,
    offset: usize,
) -> RawContent {
    let contextualizer_id = format!("{contextualization_id}-ctxr");
    production.contextualizers.insert(
        contextualizer_id.clone(),
        Contextualizer::new(contextualizer_id.clone(), contextualizer_type),
    );
    production.contextualizations.insert(
        contextualization_id.to_string(),
        Contextualization {
            id: contextualization_id.to_string(),
            resource_id: resource_id.to_string(),
            contextualizer_id,
            section_id: "s1".to_string(),
            additional_resources: Vec::new(),
        },
    );
    let block_key = contents.blocks[0].key.clone();
    let (key, contents) = contents.with_entity(RawEntity {
        entity_type,
        mutability: Mutability::Immutable,
        data: EntityData::asset(contextualization_id),
    });
    contents.with_entity_applied(&block_key, offset, offset + 1, &key)
}

pub fn note_with(id: &str, contents: RawContent) -> Note {
    Note {
        id: id.to_string(),
        contents,
    }
}

// --- Citation renderer stub ---

/// Renders every citation as `[id]`, wrapped in a span so markup
/// stripping is observable.
pub struct StubRenderer;

impl CitationRenderer for StubRenderer {
    fn render(&self, _models: &CitationModels, citations: &Citations) -> RenderedCitations {
        let mut rendered: IndexMap<String, String> = IndexMap::new();
        for cluster in &citations.clusters {
            rendered.insert(
                cluster.instance.citation_id.clone(),
                format!("<span>[{}]</span>", cluster.instance.citation_id),
            );
        }
        RenderedCitations {
            citations: rendered,
            bibliography: citations.items.keys().cloned().collect(),
        }
    }
}
