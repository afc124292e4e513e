/*
SPDX-License-Identifier: MPL-2.0
*/

//! Consistency engine for the Ovide contextualization graph.
//!
//! Rich-text contents reference resources through entities; each
//! reference site is backed by a contextualization and its
//! contextualizer in the production graph. This crate keeps the two
//! sides consistent:
//!
//! - [`store`]: keyed-map CRUD over the graph collections, doubling as
//!   the in-memory persistence backend;
//! - [`index`]: recompute, from contents, which contextualizations are
//!   referenced and in what order;
//! - [`lifecycle`]: atomic creation of the contextualizer /
//!   contextualization / entity triple, entity clearing, and orphan
//!   reclamation;
//! - [`citations`]: ordered, scoped input data for the citation
//!   processor;
//! - [`clipboard`]: self-contained copy snapshots and collision-free
//!   paste reconstruction.
//!
//! Everything is single-threaded and event-driven: one mutation runs to
//! completion, then the index is recomputed; there is no locking and no
//! incremental index maintenance.

pub mod citations;
pub mod clipboard;
pub mod error;
pub mod index;
pub mod lifecycle;
pub mod store;

pub use citations::{
    build_citations, citation_models, CitationCluster, CitationInstance, CitationItemRef,
    CitationModels, CitationPosition, CitationRenderer, Citations, RenderedCitations,
};
pub use clipboard::{
    copy_selection, extract_copied_data, paste_copied_data, CopiedData, CopiedEntity,
    CopyPayload, PasteOutcome, COPIED_DATA_SCRIPT_ID,
};
pub use error::{EngineError, PersistenceError, Result};
pub use index::{
    content_references, section_asset_ids, section_references, AssetReference, HostId, RefType,
};
pub use lifecycle::{
    clean_uncited_notes, delete_contextualization_from_id, delete_uncited_context,
    remove_contextualization_reference_from_raw_contents, summon_asset, PersistenceBackend,
    ReclaimedContexts, SectionUpdate, SummonOutcome,
};
pub use store::ProductionStore;
