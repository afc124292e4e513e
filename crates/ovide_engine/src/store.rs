/*
SPDX-License-Identifier: MPL-2.0
*/

//! In-memory production store.
//!
//! Keyed-map CRUD over the graph collections (resources,
//! contextualizers, contextualizations) and the sections of each
//! production. Every operation is a total function over the maps:
//! creates and updates are upserts, deleting an unknown id is a no-op.
//! Referential integrity between collections is the business of the
//! lifecycle manager, not of the store.

use indexmap::IndexMap;
use ovide_core::contextualization::{Contextualization, Contextualizer};
use ovide_core::production::{Production, Section};
use ovide_core::resource::Resource;

use crate::lifecycle::PersistenceBackend;
use crate::error::PersistenceError;

/// Productions keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ProductionStore {
    productions: IndexMap<String, Production>,
}

impl ProductionStore {
    pub fn new() -> Self {
        ProductionStore::default()
    }

    pub fn insert_production(&mut self, production: Production) {
        self.productions.insert(production.id.clone(), production);
    }

    pub fn production(&self, production_id: &str) -> Option<&Production> {
        self.productions.get(production_id)
    }

    pub fn production_mut(&mut self, production_id: &str) -> Option<&mut Production> {
        self.productions.get_mut(production_id)
    }

    // --- resources ---

    pub fn upsert_resource(&mut self, production_id: &str, resource: Resource) {
        if let Some(production) = self.productions.get_mut(production_id) {
            production.resources.insert(resource.id.clone(), resource);
        }
    }

    pub fn delete_resource(&mut self, production_id: &str, resource_id: &str) {
        if let Some(production) = self.productions.get_mut(production_id) {
            production.resources.shift_remove(resource_id);
        }
    }

    // --- contextualizers ---

    pub fn upsert_contextualizer(&mut self, production_id: &str, contextualizer: Contextualizer) {
        if let Some(production) = self.productions.get_mut(production_id) {
            production
                .contextualizers
                .insert(contextualizer.id.clone(), contextualizer);
        }
    }

    pub fn delete_contextualizer(&mut self, production_id: &str, contextualizer_id: &str) {
        if let Some(production) = self.productions.get_mut(production_id) {
            production.contextualizers.shift_remove(contextualizer_id);
        }
    }

    // --- contextualizations ---

    pub fn upsert_contextualization(
        &mut self,
        production_id: &str,
        contextualization: Contextualization,
    ) {
        if let Some(production) = self.productions.get_mut(production_id) {
            production
                .contextualizations
                .insert(contextualization.id.clone(), contextualization);
        }
    }

    pub fn delete_contextualization(&mut self, production_id: &str, contextualization_id: &str) {
        if let Some(production) = self.productions.get_mut(production_id) {
            production
                .contextualizations
                .shift_remove(contextualization_id);
        }
    }

    // --- sections ---

    /// Insert a section, optionally at a position in the document order.
    pub fn create_section(&mut self, production_id: &str, section: Section, order: Option<usize>) {
        if let Some(production) = self.productions.get_mut(production_id) {
            let section_id = section.id.clone();
            production.sections.insert(section_id.clone(), section);
            match order {
                Some(index) if index < production.sections_order.len() => {
                    production.sections_order.insert(index, section_id);
                }
                _ => production.sections_order.push(section_id),
            }
        }
    }

    pub fn update_section(&mut self, production_id: &str, section: Section) {
        if let Some(production) = self.productions.get_mut(production_id) {
            production.sections.insert(section.id.clone(), section);
        }
    }

    /// Delete a section together with its contextualizations and their
    /// contextualizers.
    pub fn delete_section(&mut self, production_id: &str, section_id: &str) {
        if let Some(production) = self.productions.get_mut(production_id) {
            production.sections.shift_remove(section_id);
            production.sections_order.retain(|id| id != section_id);

            let doomed: Vec<(String, String)> = production
                .contextualizations
                .values()
                .filter(|c| c.section_id == section_id)
                .map(|c| (c.id.clone(), c.contextualizer_id.clone()))
                .collect();
            for (contextualization_id, contextualizer_id) in doomed {
                production
                    .contextualizations
                    .shift_remove(&contextualization_id);
                production.contextualizers.shift_remove(&contextualizer_id);
            }
        }
    }

    pub fn set_section_level(&mut self, production_id: &str, section_id: &str, level: u8) {
        if let Some(section) = self
            .productions
            .get_mut(production_id)
            .and_then(|p| p.sections.get_mut(section_id))
        {
            section.metadata.level = level;
        }
    }

    /// Replace the document order with a received one, repairing the
    /// races a reorder can lose against: orders naming sections that no
    /// longer exist are filtered, orders missing freshly created
    /// sections get them appended.
    pub fn update_sections_order(&mut self, production_id: &str, new_order: Vec<String>) {
        if let Some(production) = self.productions.get_mut(production_id) {
            let current = &production.sections_order;
            let resolved: Vec<String> = if new_order.len() > current.len() {
                new_order
                    .into_iter()
                    .filter(|id| current.contains(id))
                    .collect()
            } else if new_order.len() < current.len() {
                let mut resolved = new_order.clone();
                resolved.extend(
                    current
                        .iter()
                        .filter(|id| !new_order.contains(id))
                        .cloned(),
                );
                resolved
            } else {
                new_order
            };
            production.sections_order = resolved;
        }
    }
}

/// The store doubles as the in-memory persistence backend used by tests
/// and the CLI; its operations are total, so they never fail.
impl PersistenceBackend for ProductionStore {
    fn create_contextualizer(
        &mut self,
        production_id: &str,
        contextualizer: &Contextualizer,
    ) -> Result<(), PersistenceError> {
        self.upsert_contextualizer(production_id, contextualizer.clone());
        Ok(())
    }

    fn create_contextualization(
        &mut self,
        production_id: &str,
        contextualization: &Contextualization,
    ) -> Result<(), PersistenceError> {
        self.upsert_contextualization(production_id, contextualization.clone());
        Ok(())
    }

    fn update_section(
        &mut self,
        production_id: &str,
        section: &Section,
    ) -> Result<(), PersistenceError> {
        self.update_section(production_id, section.clone());
        Ok(())
    }

    fn delete_contextualizer(
        &mut self,
        production_id: &str,
        contextualizer_id: &str,
    ) -> Result<(), PersistenceError> {
        ProductionStore::delete_contextualizer(self, production_id, contextualizer_id);
        Ok(())
    }

    fn delete_contextualization(
        &mut self,
        production_id: &str,
        contextualization_id: &str,
    ) -> Result<(), PersistenceError> {
        ProductionStore::delete_contextualization(self, production_id, contextualization_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store_with_sections(ids: &[&str]) -> ProductionStore {
        let mut store = ProductionStore::new();
        store.insert_production(Production::new("p1"));
        for id in ids {
            store.create_section("p1", Section::new(*id), None);
        }
        store
    }

    #[test]
    fn deleting_a_missing_id_is_a_no_op() {
        let mut store = store_with_sections(&["s1"]);
        let before = store.production("p1").unwrap().clone();
        store.delete_resource("p1", "nope");
        store.delete_contextualization("p1", "nope");
        store.delete_contextualizer("p1", "nope");
        assert_eq!(store.production("p1").unwrap(), &before);
    }

    #[test]
    fn deleting_a_section_cascades_to_its_graph_records() {
        let mut store = store_with_sections(&["s1", "s2"]);
        store.upsert_contextualizer("p1", Contextualizer::new("ctxr1", "bib"));
        store.upsert_contextualization(
            "p1",
            Contextualization {
                id: "ctx1".to_string(),
                resource_id: "r1".to_string(),
                contextualizer_id: "ctxr1".to_string(),
                section_id: "s1".to_string(),
                additional_resources: Vec::new(),
            },
        );
        store.delete_section("p1", "s1");
        let production = store.production("p1").unwrap();
        assert!(production.contextualizations.is_empty());
        assert!(production.contextualizers.is_empty());
        assert_eq!(production.sections_order, vec!["s2".to_string()]);
    }

    #[test]
    fn section_creation_honors_the_order_index() {
        let mut store = store_with_sections(&["s1", "s2"]);
        store.create_section("p1", Section::new("s3"), Some(1));
        assert_eq!(
            store.production("p1").unwrap().sections_order,
            vec!["s1".to_string(), "s3".to_string(), "s2".to_string()]
        );
    }

    #[test]
    fn longer_incoming_order_is_filtered_to_existing_sections() {
        let mut store = store_with_sections(&["s1", "s2"]);
        store.update_sections_order(
            "p1",
            vec!["s2".to_string(), "deleted".to_string(), "s1".to_string()],
        );
        assert_eq!(
            store.production("p1").unwrap().sections_order,
            vec!["s2".to_string(), "s1".to_string()]
        );
    }

    #[test]
    fn shorter_incoming_order_keeps_unknown_tail() {
        let mut store = store_with_sections(&["s1", "s2", "s3"]);
        store.update_sections_order("p1", vec!["s3".to_string(), "s1".to_string()]);
        assert_eq!(
            store.production("p1").unwrap().sections_order,
            vec!["s3".to_string(), "s1".to_string(), "s2".to_string()]
        );
    }
}
