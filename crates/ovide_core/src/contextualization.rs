/*
SPDX-License-Identifier: MPL-2.0
*/

//! Contextualizers and contextualizations.
//!
//! A contextualization binds one resource and one contextualizer to one
//! section; it is the unit referenced by inline and block entities. The
//! contextualizer describes how the resource is materialized at that
//! site. Contextualizers live in their own collection so they could be
//! shared between contextualizations later, but today the relation is
//! 1:1: deleting a contextualization must delete its contextualizer.

use serde::{Deserialize, Serialize};

use crate::resource::{Resource, ResourceType};

/// How a resource is materialized at one reference site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contextualizer {
    pub id: String,
    #[serde(rename = "type")]
    pub contextualizer_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

impl Contextualizer {
    pub fn new(id: impl Into<String>, contextualizer_type: impl Into<String>) -> Self {
        Contextualizer {
            id: id.into(),
            contextualizer_type: contextualizer_type.into(),
            locator: None,
            prefix: None,
            suffix: None,
        }
    }
}

/// The binding of one resource + one contextualizer to one section.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contextualization {
    pub id: String,
    pub resource_id: String,
    pub contextualizer_id: String,
    pub section_id: String,
    /// Further resources cited at the same site (grouped citations).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_resources: Vec<String>,
}

/// Insertion modes a contextualizer model supports.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InsertionProfile {
    pub inline: bool,
    pub block: bool,
}

impl InsertionProfile {
    pub fn supports(self, inline: bool) -> bool {
        if inline {
            self.inline
        } else {
            self.block
        }
    }
}

/// Predicate deciding whether a model accepts a resource.
#[derive(Clone, Copy)]
pub enum ResourceMatcher {
    /// Accept resources of a given type.
    Type(ResourceType),
    /// Arbitrary predicate over the resource.
    Test(fn(&Resource) -> bool),
}

impl ResourceMatcher {
    pub fn matches(&self, resource: &Resource) -> bool {
        match self {
            ResourceMatcher::Type(resource_type) => {
                resource.metadata.resource_type == *resource_type
            }
            ResourceMatcher::Test(test) => test(resource),
        }
    }
}

impl std::fmt::Debug for ResourceMatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ResourceMatcher::Type(t) => write!(f, "Type({})", t.as_str()),
            ResourceMatcher::Test(_) => write!(f, "Test(..)"),
        }
    }
}

/// Runtime description of an available contextualizer kind.
///
/// Declaration order in a catalogue matters: when no model's id matches
/// the resource type, the first model accepting the resource in the
/// required mode wins.
#[derive(Debug, Clone)]
pub struct ContextualizerModel {
    pub id: &'static str,
    pub profile: InsertionProfile,
    pub accepted_resource_types: Vec<ResourceMatcher>,
}

impl ContextualizerModel {
    pub fn accepts(&self, resource: &Resource) -> bool {
        self.accepted_resource_types
            .iter()
            .any(|matcher| matcher.matches(resource))
    }
}

/// The default contextualizer catalogue.
pub fn default_models() -> Vec<ContextualizerModel> {
    vec![
        ContextualizerModel {
            id: "bib",
            profile: InsertionProfile {
                inline: true,
                block: true,
            },
            accepted_resource_types: vec![ResourceMatcher::Type(ResourceType::Bib)],
        },
        ContextualizerModel {
            id: "glossary",
            profile: InsertionProfile {
                inline: true,
                block: false,
            },
            accepted_resource_types: vec![ResourceMatcher::Type(ResourceType::Glossary)],
        },
        ContextualizerModel {
            id: "webpage",
            profile: InsertionProfile {
                inline: true,
                block: true,
            },
            accepted_resource_types: vec![ResourceMatcher::Type(ResourceType::Webpage)],
        },
        ContextualizerModel {
            id: "image",
            profile: InsertionProfile {
                inline: false,
                block: true,
            },
            accepted_resource_types: vec![ResourceMatcher::Type(ResourceType::Image)],
        },
        ContextualizerModel {
            id: "video",
            profile: InsertionProfile {
                inline: false,
                block: true,
            },
            accepted_resource_types: vec![ResourceMatcher::Type(ResourceType::Video)],
        },
        ContextualizerModel {
            id: "table",
            profile: InsertionProfile {
                inline: false,
                block: true,
            },
            accepted_resource_types: vec![
                ResourceMatcher::Type(ResourceType::Table),
                ResourceMatcher::Type(ResourceType::DataPresentation),
            ],
        },
        ContextualizerModel {
            id: "embed",
            profile: InsertionProfile {
                inline: false,
                block: true,
            },
            accepted_resource_types: vec![ResourceMatcher::Type(ResourceType::Embed)],
        },
    ]
}
