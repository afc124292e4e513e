/*
SPDX-License-Identifier: MPL-2.0
*/

//! Data model for the Ovide contextualization and citation subsystem.
//!
//! A production owns a library of resources (bibliographic references,
//! images, webpages, glossary entries, …) and a set of sections whose
//! rich-text contents reference those resources through entities. Each
//! reference site is backed by a pair of graph records: a
//! contextualization (resource × contextualizer × section) and its
//! contextualizer (how the resource is materialized there).
//!
//! This crate holds the value types only; the consistency logic between
//! contents and the graph lives in `ovide_engine`.

pub mod content;
pub mod contextualization;
pub mod csl;
pub mod production;
pub mod resource;

pub use content::{
    AssetPointer, EntityData, EntityRange, EntityType, Mutability, RawBlock, RawContent,
    RawEntity, Selection,
};
pub use contextualization::{
    default_models, Contextualization, Contextualizer, ContextualizerModel, InsertionProfile,
    ResourceMatcher,
};
pub use csl::{parse_bibtex, resource_to_csl, BibParseOutcome, CslDate, CslItem, CslName};
pub use production::{
    default_summary, resolve_custom_summary, CustomSummary, Note, Production,
    ProductionMetadata, ProductionSettings, Section, SectionMetadata, StylePayload,
    SummaryBlock,
};
pub use resource::{
    infer_metadata, GlossaryData, Resource, ResourceData, ResourceMetadata, ResourceType,
    WebpageData,
};
