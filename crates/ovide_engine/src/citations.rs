/*
SPDX-License-Identifier: MPL-2.0
*/

//! Citation resolution.
//!
//! Builds, for one section of a production, the ordered citation data a
//! citation processor needs: the CSL-JSON items keyed by reference id
//! and one cluster per bibliographic reference site, in the order the
//! entity-reference index discovered them. Formatting itself is the
//! processor's job, reached through [`CitationRenderer`].

use indexmap::IndexMap;
use ovide_core::csl::{resource_to_csl, CslItem};
use ovide_core::production::{Production, Section};
use serde::{Deserialize, Serialize};

use crate::index::section_references;

/// Contextualizer type that marks a bibliographic reference site.
pub const BIB_CONTEXTUALIZER: &str = "bib";

/// Default citation style (CSL, APA-flavoured) used when a production
/// selects none.
pub const DEFAULT_CITATION_STYLE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<style xmlns="http://purl.org/net/xbiblio/csl" class="in-text" version="1.0" default-locale="en-US">
  <info>
    <title>American Psychological Association (abridged)</title>
    <id>http://www.zotero.org/styles/apa</id>
  </info>
  <citation et-al-min="3" et-al-use-first="1" disambiguate-add-year-suffix="true">
    <sort><key macro="author"/></sort>
    <layout prefix="(" suffix=")" delimiter="; ">
      <group delimiter=", ">
        <names variable="author"><name form="short" and="symbol"/></names>
        <date variable="issued"><date-part name="year"/></date>
        <text variable="locator"/>
      </group>
    </layout>
  </citation>
  <bibliography hanging-indent="true">
    <sort><key macro="author"/></sort>
    <layout>
      <group delimiter=". ">
        <names variable="author"><name name-as-sort-order="all"/></names>
        <date variable="issued"><date-part name="year" prefix="(" suffix=")"/></date>
        <text variable="title"/>
      </group>
    </layout>
  </bibliography>
</style>"#;

/// Default locale (en-US) used when a production selects none.
pub const DEFAULT_CITATION_LOCALE: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<locale xmlns="http://purl.org/net/xbiblio/csl" version="1.0" xml:lang="en-US">
  <terms>
    <term name="and">and</term>
    <term name="et-al">et al.</term>
    <term name="page" form="short"><single>p.</single><multiple>pp.</multiple></term>
  </terms>
</locale>"#;

/// Citation style and locale payloads resolved for a production.
#[derive(Debug, Clone, PartialEq)]
pub struct CitationModels {
    pub style: String,
    pub locale: String,
}

/// Style and locale of a production, falling back to the embedded
/// defaults when the settings carry none.
pub fn citation_models(production: &Production) -> CitationModels {
    CitationModels {
        style: production
            .settings
            .citation_style
            .as_ref()
            .map(|payload| payload.data.clone())
            .unwrap_or_else(|| DEFAULT_CITATION_STYLE.to_string()),
        locale: production
            .settings
            .citation_locale
            .as_ref()
            .map(|payload| payload.data.clone())
            .unwrap_or_else(|| DEFAULT_CITATION_LOCALE.to_string()),
    }
}

/// One cited reference inside a citation instance, carrying the
/// contextualizer's pinpoint fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationItemRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

/// One citation instance, keyed by its contextualization id.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationInstance {
    pub citation_id: String,
    pub items: Vec<CitationItemRef>,
    /// 1-based position of the instance in document order.
    pub note_index: usize,
}

/// `(reference id, note index)` pair, in the processor's wire shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CitationPosition(pub String, pub usize);

/// A citation instance plus its positional context, matching the
/// incremental API of the citation processor: every earlier instance as
/// "citations before", nothing as "citations after".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CitationCluster {
    pub instance: CitationInstance,
    pub citations_before: Vec<CitationPosition>,
    pub citations_after: Vec<CitationPosition>,
}

/// The citation data of one section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Citations {
    pub items: IndexMap<String, CslItem>,
    pub clusters: Vec<CitationCluster>,
}

/// Build the citation data for one section: the bib-contextualizer
/// reference sites scoped to the section, in index discovery order.
///
/// Missing graph nodes degrade instead of failing: a dangling
/// contextualization is skipped, a missing resource yields an empty
/// placeholder item, both with a warning.
pub fn build_citations(production: &Production, section: &Section) -> Citations {
    let mut items: IndexMap<String, CslItem> = IndexMap::new();
    let mut instances: Vec<CitationInstance> = Vec::new();

    for reference in section_references(section) {
        let id = &reference.contextualization_id;
        let Some(contextualization) = production.contextualizations.get(id) else {
            log::warn!("entity references missing contextualization {id}");
            continue;
        };
        if contextualization.section_id != section.id {
            continue;
        }
        let Some(contextualizer) = production
            .contextualizers
            .get(&contextualization.contextualizer_id)
        else {
            log::warn!(
                "contextualization {id} references missing contextualizer {}",
                contextualization.contextualizer_id
            );
            continue;
        };
        if contextualizer.contextualizer_type != BIB_CONTEXTUALIZER {
            continue;
        }

        let mut targets: Vec<CslItem> = Vec::new();
        for resource_id in std::iter::once(&contextualization.resource_id)
            .chain(contextualization.additional_resources.iter())
        {
            match production.resources.get(resource_id) {
                Some(resource) => targets.extend(resource_to_csl(resource)),
                None => {
                    log::warn!("contextualization {id} references missing resource {resource_id}");
                    targets.push(CslItem {
                        id: resource_id.clone(),
                        ..CslItem::default()
                    });
                }
            }
        }

        let note_index = instances.len() + 1;
        let instance = CitationInstance {
            citation_id: contextualization.id.clone(),
            items: targets
                .iter()
                .map(|target| CitationItemRef {
                    id: target.id.clone(),
                    locator: contextualizer.locator.clone(),
                    prefix: contextualizer.prefix.clone(),
                    suffix: contextualizer.suffix.clone(),
                })
                .collect(),
            note_index,
        };
        for target in targets {
            items.insert(target.id.clone(), target);
        }
        instances.push(instance);
    }

    let clusters = instances
        .iter()
        .enumerate()
        .map(|(index, instance)| CitationCluster {
            instance: instance.clone(),
            citations_before: instances[..index]
                .iter()
                .map(|earlier| {
                    CitationPosition(earlier.citation_id.clone(), earlier.note_index)
                })
                .collect(),
            // the processor is never fed forward context
            citations_after: Vec::new(),
        })
        .collect();

    Citations { items, clusters }
}

/// Rendered output of the external citation processor.
#[derive(Debug, Clone, Default)]
pub struct RenderedCitations {
    /// Rendered text per citation id (contextualization id).
    pub citations: IndexMap<String, String>,
    /// Rendered bibliography entries, in final order.
    pub bibliography: Vec<String>,
}

/// The citation-processing capability: locale- and style-aware
/// formatting of the resolved citation data. Consumed as a pure
/// function; the engine only prepares its input.
pub trait CitationRenderer {
    fn render(&self, models: &CitationModels, citations: &Citations) -> RenderedCitations;
}
