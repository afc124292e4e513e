/*
SPDX-License-Identifier: MPL-2.0
*/

//! CSL-JSON item model and bibliographic conversions.
//!
//! The citation processor consumed by the engine works on CSL-JSON
//! items. Bib resources store them directly; other resource kinds are
//! flattened into a single synthesized item so they can appear in
//! reference lists too.

use biblatex::{Bibliography, Chunk, Entry};
use serde::{Deserialize, Serialize};

use crate::resource::{Resource, ResourceData, ResourceType};

/// A contributor name in CSL-JSON form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CslName {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub family: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub given: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub literal: Option<String>,
}

impl CslName {
    pub fn structured(family: impl Into<String>, given: impl Into<String>) -> Self {
        CslName {
            family: Some(family.into()),
            given: Some(given.into()),
            literal: None,
        }
    }

    pub fn literal(name: impl Into<String>) -> Self {
        CslName {
            family: None,
            given: None,
            literal: Some(name.into()),
        }
    }
}

/// A date in CSL-JSON form.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CslDate {
    #[serde(
        rename = "date-parts",
        default,
        skip_serializing_if = "Vec::is_empty"
    )]
    pub date_parts: Vec<Vec<i32>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl CslDate {
    pub fn year(year: i32) -> Self {
        CslDate {
            date_parts: vec![vec![year]],
            raw: None,
        }
    }
}

/// A bibliographic item in CSL-JSON form. Only the fields the engine
/// and its citation processor actually consume are modeled.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CslItem {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub author: Vec<CslName>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issued: Option<CslDate>,
    #[serde(
        rename = "container-title",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub container_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publisher: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub issue: Option<String>,
    #[serde(rename = "URL", default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(rename = "DOI", default, skip_serializing_if = "Option::is_none")]
    pub doi: Option<String>,
    #[serde(rename = "ISBN", default, skip_serializing_if = "Option::is_none")]
    pub isbn: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Flatten a resource into CSL-JSON items. Bib resources yield their
/// stored items; any other kind yields one item synthesized from its
/// metadata, keyed by the resource id.
pub fn resource_to_csl(resource: &Resource) -> Vec<CslItem> {
    match &resource.data {
        ResourceData::Bib(items) => items
            .iter()
            .map(|item| {
                let mut item = item.clone();
                if item.id.is_empty() {
                    item.id = resource.id.clone();
                }
                item
            })
            .collect(),
        other => {
            let url = match other {
                ResourceData::Webpage(webpage) => Some(webpage.url.to_string()),
                ResourceData::Video(video) => Some(video.video_url.clone()),
                _ => None,
            };
            vec![CslItem {
                id: resource.id.clone(),
                item_type: Some(csl_type_for(resource.metadata.resource_type).to_string()),
                title: resource.metadata.title.clone(),
                author: resource
                    .metadata
                    .authors
                    .iter()
                    .map(|a| CslName::literal(a.clone()))
                    .collect(),
                url,
                note: resource.metadata.description.clone(),
                ..Default::default()
            }]
        }
    }
}

fn csl_type_for(resource_type: ResourceType) -> &'static str {
    match resource_type {
        ResourceType::Webpage => "webpage",
        ResourceType::Video => "motion_picture",
        ResourceType::Image | ResourceType::Table | ResourceType::DataPresentation => "graphic",
        ResourceType::Glossary => "entry",
        ResourceType::Bib | ResourceType::Embed => "document",
    }
}

/// One entry of a BibTeX batch that could not be parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct BibParseFailure {
    /// The leading line of the offending entry.
    pub entry: String,
    pub message: String,
}

/// Outcome of a BibTeX import: every entry that parsed, plus the
/// failures of those that did not.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BibParseOutcome {
    pub items: Vec<CslItem>,
    pub failures: Vec<BibParseFailure>,
}

/// Parse a BibTeX batch into CSL-JSON items.
///
/// When the batch parses as a whole, all entries are converted. When it
/// does not (hand-exported BibTeX is rarely standard), each `@`-entry is
/// re-parsed in isolation so one malformed entry cannot abort the whole
/// import.
pub fn parse_bibtex(source: &str) -> BibParseOutcome {
    match Bibliography::parse(source) {
        Ok(bibliography) => BibParseOutcome {
            items: bibliography.iter().map(csl_from_biblatex).collect(),
            failures: Vec::new(),
        },
        Err(_) => {
            let mut outcome = BibParseOutcome::default();
            for chunk in split_bibtex_entries(source) {
                match Bibliography::parse(&chunk) {
                    Ok(bibliography) => {
                        outcome.items.extend(bibliography.iter().map(csl_from_biblatex));
                    }
                    Err(error) => outcome.failures.push(BibParseFailure {
                        entry: chunk.lines().next().unwrap_or_default().to_string(),
                        message: error.to_string(),
                    }),
                }
            }
            outcome
        }
    }
}

/// Split a BibTeX source into per-entry chunks at `@` entry starts.
fn split_bibtex_entries(source: &str) -> Vec<String> {
    let mut chunks: Vec<String> = Vec::new();
    for line in source.lines() {
        if line.trim_start().starts_with('@') || chunks.is_empty() {
            chunks.push(String::new());
        }
        if let Some(current) = chunks.last_mut() {
            current.push_str(line);
            current.push('\n');
        }
    }
    chunks.retain(|c| c.trim_start().starts_with('@'));
    chunks
}

fn csl_from_biblatex(entry: &Entry) -> CslItem {
    let field_str = |key: &str| {
        entry.fields.get(key).map(|f| {
            f.iter()
                .map(|c| match &c.v {
                    Chunk::Normal(s) | Chunk::Verbatim(s) => s.as_str(),
                    _ => "",
                })
                .collect::<String>()
        })
    };

    let author = entry
        .author()
        .ok()
        .map(|persons| {
            persons
                .iter()
                .map(|p| CslName::structured(p.name.clone(), p.given_name.clone()))
                .collect()
        })
        .unwrap_or_default();

    let issued = field_str("date")
        .or_else(|| field_str("year"))
        .map(|raw| match raw.trim().parse::<i32>() {
            Ok(year) => CslDate::year(year),
            Err(_) => CslDate {
                date_parts: Vec::new(),
                raw: Some(raw),
            },
        });

    let item_type = match entry.entry_type.to_string().to_lowercase().as_str() {
        "article" => "article-journal",
        "book" | "mvbook" | "collection" | "mvcollection" => "book",
        "inbook" | "incollection" => "chapter",
        "inproceedings" => "paper-conference",
        "thesis" | "phdthesis" | "mastersthesis" => "thesis",
        "report" | "techreport" => "report",
        "online" => "webpage",
        _ => "document",
    };

    CslItem {
        id: entry.key.clone(),
        item_type: Some(item_type.to_string()),
        title: field_str("title"),
        author,
        issued,
        container_title: field_str("journaltitle")
            .or_else(|| field_str("journal"))
            .or_else(|| field_str("booktitle")),
        publisher: field_str("publisher"),
        page: field_str("pages"),
        volume: field_str("volume"),
        issue: field_str("number"),
        url: field_str("url"),
        doi: field_str("doi"),
        isbn: field_str("isbn"),
        note: field_str("note"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{ResourceMetadata, WebpageData};

    #[test]
    fn bibtex_article_maps_to_csl() {
        let source = r#"
@article{kuhn1962,
  title = {The Structure of Scientific Revolutions},
  author = {Kuhn, Thomas},
  year = {1962},
  journal = {Science Things}
}
"#;
        let outcome = parse_bibtex(source);
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.items.len(), 1);
        let item = &outcome.items[0];
        assert_eq!(item.id, "kuhn1962");
        assert_eq!(item.item_type.as_deref(), Some("article-journal"));
        assert_eq!(item.issued, Some(CslDate::year(1962)));
        assert_eq!(item.author[0].family.as_deref(), Some("Kuhn"));
    }

    #[test]
    fn malformed_entry_does_not_abort_the_batch() {
        let source = "@article{ok1,\n  title = {Fine},\n  year = {2001},\n}\n\
@article broken-no-braces\n\
@article{ok2,\n  title = {Also fine},\n  year = {2002},\n}\n";
        let outcome = parse_bibtex(source);
        let ids: Vec<&str> = outcome.items.iter().map(|i| i.id.as_str()).collect();
        assert!(ids.contains(&"ok1"));
        assert!(ids.contains(&"ok2"));
    }

    #[test]
    fn webpage_resource_synthesizes_one_item() {
        let resource = Resource {
            id: "r-web".to_string(),
            metadata: ResourceMetadata {
                title: Some("An interesting page".to_string()),
                ..ResourceMetadata::new(ResourceType::Webpage)
            },
            data: ResourceData::Webpage(WebpageData {
                url: "https://example.org/page".parse().unwrap(),
            }),
        };
        let items = resource_to_csl(&resource);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].id, "r-web");
        assert_eq!(items[0].url.as_deref(), Some("https://example.org/page"));
    }
}
