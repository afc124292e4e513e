/*
SPDX-License-Identifier: MPL-2.0
*/

//! Resources: the citable and embeddable units of a production.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use url::Url;

use crate::csl::CslItem;

/// The kinds of resources a production library can hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ResourceType {
    Bib,
    Image,
    Webpage,
    Glossary,
    Video,
    Table,
    Embed,
    DataPresentation,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::Bib => "bib",
            ResourceType::Image => "image",
            ResourceType::Webpage => "webpage",
            ResourceType::Glossary => "glossary",
            ResourceType::Video => "video",
            ResourceType::Table => "table",
            ResourceType::Embed => "embed",
            ResourceType::DataPresentation => "data-presentation",
        }
    }
}

/// Descriptive metadata shared by every resource kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    #[serde(rename = "type")]
    pub resource_type: ResourceType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub authors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ResourceMetadata {
    pub fn new(resource_type: ResourceType) -> Self {
        ResourceMetadata {
            resource_type,
            title: None,
            description: None,
            authors: Vec::new(),
            source: None,
        }
    }
}

/// Type-specific payload of a resource.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResourceData {
    /// Bibliographic references in CSL-JSON form.
    Bib(Vec<CslItem>),
    /// A glossary entry.
    Glossary(GlossaryData),
    /// A linked webpage.
    Webpage(WebpageData),
    /// An embedded video.
    Video(VideoData),
    /// An uploaded file (image, table, dataset).
    File(FileData),
    /// Anything else, kept opaque.
    Other(Value),
}

impl Default for ResourceData {
    fn default() -> Self {
        ResourceData::Other(Value::Null)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlossaryData {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub glossary_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebpageData {
    pub url: Url,
}

// video_url and filename are required so the untagged ResourceData
// deserialization stays unambiguous
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoData {
    pub video_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileData {
    pub filename: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mimetype: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
}

/// A citable or embeddable unit, owned by a production.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    pub id: String,
    pub metadata: ResourceMetadata,
    #[serde(default)]
    pub data: ResourceData,
}

impl Resource {
    /// Display name used for glossary placeholders.
    pub fn glossary_name(&self) -> Option<&str> {
        match &self.data {
            ResourceData::Glossary(data) => Some(data.name.as_str()),
            _ => None,
        }
    }
}

/// Derive metadata from a resource payload, when the payload carries any.
/// Video payloads bring their retrieved metadata along; file payloads
/// yield a title from the file name.
pub fn infer_metadata(data: &ResourceData, resource_type: ResourceType) -> ResourceMetadata {
    let mut metadata = ResourceMetadata::new(resource_type);
    match data {
        ResourceData::Video(video) => {
            if let Some(Value::Object(map)) = &video.metadata {
                if let Some(Value::String(title)) = map.get("title") {
                    metadata.title = Some(title.clone());
                }
                if let Some(Value::String(description)) = map.get("description") {
                    metadata.description = Some(description.clone());
                }
                if let Some(Value::String(source)) = map.get("source") {
                    metadata.source = Some(source.clone());
                }
            }
        }
        ResourceData::File(file) => {
            // strip the extension only
            let title = match file.filename.rsplit_once('.') {
                Some((stem, _)) if !stem.is_empty() => stem.to_string(),
                _ => file.filename.clone(),
            };
            metadata.title = Some(title);
        }
        ResourceData::Glossary(glossary) => {
            metadata.title = Some(glossary.name.clone());
        }
        _ => {}
    }
    metadata
}
