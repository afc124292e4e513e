/*
SPDX-License-Identifier: MPL-2.0
*/

//! Cross-boundary serialization of rich-text selections.
//!
//! Copy produces three coordinated payloads from one selection: plain
//! text for foreign targets, readable HTML (with bibliographic entities
//! replaced by their rendered citation text) for rich foreign targets,
//! and a JSON snapshot embedded in the HTML as an inert script tag so a
//! paste inside the app can rebuild the contextualization graph
//! losslessly. The snapshot carries contextualizations and
//! contextualizers by value: it stays usable even if the source
//! resource is deleted in the meantime.
//!
//! Paste regenerates every copied id before merging, so pasting into the
//! source production can never collide with the original records.

use indexmap::IndexMap;
use ovide_core::content::{
    fresh_block_key, EntityRange, EntityType, RawBlock, RawContent, RawEntity, Selection,
};
use ovide_core::contextualization::{Contextualization, Contextualizer};
use ovide_core::production::{Note, Production, Section};
use ovide_core::resource::ResourceData;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

use crate::citations::{build_citations, citation_models, CitationRenderer};
use crate::error::{EngineError, Result};
use crate::index::HostId;

/// Id of the script tag carrying the embedded snapshot.
pub const COPIED_DATA_SCRIPT_ID: &str = "ovide-copied-data";

/// One copied entity, remembered with its key so paste can rewrite it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopiedEntity {
    pub key: String,
    pub entity: RawEntity,
}

/// Self-sufficient snapshot of a copied selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CopiedData {
    /// Copied entities per content host (the source host plus one entry
    /// per copied note).
    pub copied_entities: IndexMap<String, Vec<CopiedEntity>>,
    pub copied_contextualizations: Vec<Contextualization>,
    pub copied_contextualizers: Vec<Contextualizer>,
    pub copied_notes: Vec<Note>,
    /// Host the copy originated from.
    pub content_id: String,
    /// The sliced fragment itself.
    pub clipboard_content_state: RawContent,
}

/// The three clipboard payloads of one copy. Callers must set the plain
/// and HTML flavors atomically and prevent the default clipboard event,
/// otherwise the browser's native copy (without the snapshot) wins.
#[derive(Debug, Clone, PartialEq)]
pub struct CopyPayload {
    pub plain_text: String,
    pub html: String,
    pub data: CopiedData,
}

/// Copy a selection out of a content host of a section.
pub fn copy_selection<R: CitationRenderer>(
    production: &Production,
    section: &Section,
    host: &HostId,
    selection: &Selection,
    renderer: &R,
) -> Result<CopyPayload> {
    let contents = match host {
        HostId::Main => &section.contents,
        HostId::Note(note_id) => {
            &section
                .notes
                .get(note_id)
                .ok_or_else(|| EngineError::NoteNotFound(note_id.clone(), section.id.clone()))?
                .contents
        }
    };
    let fragment = contents.slice(selection);

    let mut data = CopiedData {
        content_id: host.as_str().to_string(),
        clipboard_content_state: fragment.clone(),
        ..CopiedData::default()
    };
    data.copied_entities.insert(host.as_str().to_string(), Vec::new());

    for (key, entity) in &fragment.entity_map {
        push_unique_entity(&mut data.copied_entities, host.as_str(), key, entity);
        match entity.entity_type {
            EntityType::NotePointer => {
                let Some(note_id) = entity.data.note_id.as_deref() else {
                    continue;
                };
                let Some(note) = section.notes.get(note_id) else {
                    log::warn!("copied note pointer references missing note {note_id}");
                    continue;
                };
                // notes are copied whole, with every entity they
                // reference, not just the selected part
                data.copied_notes.push(note.clone());
                for (note_key, note_entity) in &note.contents.entity_map {
                    push_unique_entity(
                        &mut data.copied_entities,
                        note_id,
                        note_key,
                        note_entity,
                    );
                    collect_graph_records(production, note_entity, &mut data);
                }
            }
            EntityType::InlineAsset | EntityType::BlockAsset => {
                collect_graph_records(production, entity, &mut data);
            }
        }
    }

    let plain_text = fragment.plain_text();
    let html = render_clipboard_html(production, section, &fragment, renderer, &data)?;

    Ok(CopyPayload {
        plain_text,
        html,
        data,
    })
}

fn push_unique_entity(
    copied_entities: &mut IndexMap<String, Vec<CopiedEntity>>,
    host: &str,
    key: &str,
    entity: &RawEntity,
) {
    let entities = copied_entities.entry(host.to_string()).or_default();
    if !entities.iter().any(|copied| copied.key == key) {
        entities.push(CopiedEntity {
            key: key.to_string(),
            entity: entity.clone(),
        });
    }
}

/// Record the contextualization and contextualizer behind an asset
/// entity, by value.
fn collect_graph_records(production: &Production, entity: &RawEntity, data: &mut CopiedData) {
    let Some(asset_id) = entity.data.asset_id() else {
        return;
    };
    let Some(contextualization) = production.contextualizations.get(asset_id) else {
        log::warn!("copied entity references missing contextualization {asset_id}");
        return;
    };
    if data
        .copied_contextualizations
        .iter()
        .any(|c| c.id == contextualization.id)
    {
        return;
    }
    data.copied_contextualizations.push(contextualization.clone());
    match production
        .contextualizers
        .get(&contextualization.contextualizer_id)
    {
        Some(contextualizer) => data.copied_contextualizers.push(contextualizer.clone()),
        None => log::warn!(
            "contextualization {asset_id} references missing contextualizer {}",
            contextualization.contextualizer_id
        ),
    }
}

fn html_escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render the fragment as readable HTML and append the inert snapshot
/// script tag.
fn render_clipboard_html<R: CitationRenderer>(
    production: &Production,
    section: &Section,
    fragment: &RawContent,
    renderer: &R,
    data: &CopiedData,
) -> Result<String> {
    let models = citation_models(production);
    let citations = build_citations(production, section);
    let rendered = renderer.render(&models, &citations);
    let markup = Regex::new(r"<[^>]*>").expect("static pattern");

    let mut html = String::new();
    for block in &fragment.blocks {
        html.push_str("<p>");
        let mut cursor = 0;
        let chars: Vec<char> = block.text.chars().collect();
        let mut ranges = block.entity_ranges.clone();
        ranges.sort_by_key(|r| r.offset);
        for range in &ranges {
            if range.offset > cursor {
                let run: String = chars[cursor..range.offset.min(chars.len())].iter().collect();
                html.push_str(&html_escape(&run));
            }
            let end = (range.offset + range.length).min(chars.len());
            let run: String = chars[range.offset.min(chars.len())..end].iter().collect();
            html.push_str(&render_entity_html(
                production,
                fragment,
                &range.key,
                &run,
                &rendered.citations,
                &markup,
            ));
            cursor = end;
        }
        if cursor < chars.len() {
            let run: String = chars[cursor..].iter().collect();
            html.push_str(&html_escape(&run));
        }
        html.push_str("</p>");
    }

    let snapshot = serde_json::to_string(data)
        .map_err(|e| EngineError::Persistence(crate::error::PersistenceError::new(
            "serialize_clipboard",
            e.to_string(),
        )))?;
    html.push_str(&format!(
        "<script id=\"{COPIED_DATA_SCRIPT_ID}\" type=\"application/json\">{snapshot}</script>"
    ));
    Ok(html)
}

fn render_entity_html(
    production: &Production,
    fragment: &RawContent,
    entity_key: &str,
    text: &str,
    rendered_citations: &IndexMap<String, String>,
    markup: &Regex,
) -> String {
    let escaped = html_escape(text);
    let Some(entity) = fragment.entity(entity_key) else {
        return escaped;
    };
    let Some(asset_id) = entity.data.asset_id() else {
        return escaped;
    };
    let Some(contextualization) = production.contextualizations.get(asset_id) else {
        return escaped;
    };
    let contextualizer_type = production
        .contextualizers
        .get(&contextualization.contextualizer_id)
        .map(|c| c.contextualizer_type.as_str())
        .unwrap_or("bib");

    match contextualizer_type {
        "webpage" => {
            let href = production
                .resources
                .get(&contextualization.resource_id)
                .and_then(|resource| match &resource.data {
                    ResourceData::Webpage(webpage) => Some(webpage.url.to_string()),
                    _ => None,
                })
                .unwrap_or_default();
            format!("<a href=\"{}\">{escaped}</a>", html_escape(&href))
        }
        "bib" => {
            // foreign paste targets get the rendered citation text,
            // stripped of the processor's markup
            match rendered_citations.get(asset_id) {
                Some(citation) => {
                    let plain = markup.replace_all(citation, "");
                    format!("<cite>{}</cite>", html_escape(&plain))
                }
                None => format!("<cite>{escaped}</cite>"),
            }
        }
        _ => format!("<cite>{escaped}</cite>"),
    }
}

/// Pull the embedded snapshot back out of a pasted HTML flavor. A
/// missing or malformed snapshot yields `None`: the paste degrades to a
/// plain external paste, it never fails.
pub fn extract_copied_data(html: &str) -> Option<CopiedData> {
    let pattern = format!(
        r#"(?s)<script[^>]*id="{COPIED_DATA_SCRIPT_ID}"[^>]*>(.*?)</script>"#
    );
    let regex = Regex::new(&pattern).ok()?;
    let body = regex.captures(html)?.get(1)?.as_str().trim();
    serde_json::from_str(body).ok()
}

/// What a paste produced: the updated section plus the fresh graph
/// records to persist.
#[derive(Debug, Clone, PartialEq)]
pub struct PasteOutcome {
    pub section: Section,
    pub contextualizations: Vec<Contextualization>,
    pub contextualizers: Vec<Contextualizer>,
    pub notes: Vec<Note>,
}

/// Rebuild a copied snapshot inside a destination host.
///
/// Every copied contextualizer, contextualization and note receives a
/// fresh id; entity payloads are rewritten to the new ids before the
/// fragment is inserted at the destination selection and the notes are
/// merged into the destination section.
pub fn paste_copied_data(
    data: &CopiedData,
    target_section: &Section,
    target_host: &HostId,
    selection: &Selection,
) -> Result<PasteOutcome> {
    let mut contextualizer_ids: HashMap<String, String> = HashMap::new();
    let mut contextualization_ids: HashMap<String, String> = HashMap::new();
    let mut note_ids: HashMap<String, String> = HashMap::new();

    let contextualizers: Vec<Contextualizer> = data
        .copied_contextualizers
        .iter()
        .map(|contextualizer| {
            let mut fresh = contextualizer.clone();
            fresh.id = Uuid::new_v4().to_string();
            contextualizer_ids.insert(contextualizer.id.clone(), fresh.id.clone());
            fresh
        })
        .collect();

    let contextualizations: Vec<Contextualization> = data
        .copied_contextualizations
        .iter()
        .map(|contextualization| {
            let mut fresh = contextualization.clone();
            fresh.id = Uuid::new_v4().to_string();
            contextualization_ids.insert(contextualization.id.clone(), fresh.id.clone());
            fresh.section_id = target_section.id.clone();
            if let Some(new_contextualizer) =
                contextualizer_ids.get(&contextualization.contextualizer_id)
            {
                fresh.contextualizer_id = new_contextualizer.clone();
            }
            fresh
        })
        .collect();

    let notes: Vec<Note> = data
        .copied_notes
        .iter()
        .map(|note| {
            let mut fresh = note.clone();
            fresh.id = Uuid::new_v4().to_string();
            note_ids.insert(note.id.clone(), fresh.id.clone());
            fresh
        })
        .collect();

    let rewrite = |contents: &RawContent| -> RawContent {
        let mut contents = contents.clone();
        for entity in contents.entity_map.values_mut() {
            if let Some(asset) = entity.data.asset.as_mut() {
                if let Some(new_id) = contextualization_ids.get(&asset.id) {
                    asset.id = new_id.clone();
                }
            }
            if let Some(note_id) = entity.data.note_id.as_mut() {
                if let Some(new_id) = note_ids.get(note_id) {
                    *note_id = new_id.clone();
                }
            }
        }
        contents
    };

    let notes: Vec<Note> = notes
        .into_iter()
        .map(|mut note| {
            note.contents = rewrite(&note.contents);
            note
        })
        .collect();
    let fragment = rewrite(&data.clipboard_content_state);

    let mut section = target_section.clone();
    for note in &notes {
        section.notes.insert(note.id.clone(), note.clone());
        section.notes_order.push(note.id.clone());
    }

    let target_contents = match target_host {
        HostId::Main => &section.contents,
        HostId::Note(note_id) => {
            &section
                .notes
                .get(note_id)
                .ok_or_else(|| {
                    EngineError::NoteNotFound(note_id.clone(), target_section.id.clone())
                })?
                .contents
        }
    };
    let merged = insert_fragment(target_contents, selection, &fragment);
    match target_host {
        HostId::Main => section.contents = merged,
        HostId::Note(note_id) => {
            if let Some(note) = section.notes.get_mut(note_id) {
                note.contents = merged;
            }
        }
    }

    Ok(PasteOutcome {
        section,
        contextualizations,
        contextualizers,
        notes,
    })
}

/// Insert a fragment at a selection: the selected range is deleted,
/// the caret block is split, fragment entity keys are renumbered to
/// avoid clashing with the destination map, and partial first/last
/// fragment blocks are merged with the split halves.
fn insert_fragment(
    contents: &RawContent,
    selection: &Selection,
    fragment: &RawContent,
) -> RawContent {
    let mut contents = contents.with_text_replaced(selection, "");
    let (start_key, offset, _, _) = selection.normalized();
    let Some(target_idx) = contents.block_index(&start_key) else {
        return contents;
    };

    // renumber fragment entities into the destination map
    let mut next_key = contents
        .entity_map
        .keys()
        .filter_map(|k| k.parse::<u64>().ok())
        .max()
        .map(|n| n + 1)
        .unwrap_or(1);
    let mut key_map: HashMap<String, String> = HashMap::new();
    for (old_key, entity) in &fragment.entity_map {
        let new_key = next_key.to_string();
        next_key += 1;
        key_map.insert(old_key.clone(), new_key.clone());
        contents.entity_map.insert(new_key, entity.clone());
    }
    let remap_ranges = |ranges: &[EntityRange], shift: usize| -> Vec<EntityRange> {
        ranges
            .iter()
            .filter_map(|range| {
                key_map.get(&range.key).map(|new_key| EntityRange {
                    offset: range.offset + shift,
                    length: range.length,
                    key: new_key.clone(),
                })
            })
            .collect()
    };

    let target = contents.blocks[target_idx].clone();
    let head: String = target.text.chars().take(offset).collect();
    let tail: String = target.text.chars().skip(offset).collect();
    let head_ranges: Vec<EntityRange> = target
        .entity_ranges
        .iter()
        .filter(|r| r.offset + r.length <= offset)
        .cloned()
        .collect();
    let tail_ranges: Vec<EntityRange> = target
        .entity_ranges
        .iter()
        .filter(|r| r.offset >= offset)
        .cloned()
        .collect();

    let mut new_blocks: Vec<RawBlock> = Vec::new();
    match fragment.blocks.len() {
        0 => new_blocks.push(target),
        1 => {
            let piece = &fragment.blocks[0];
            let inserted = piece.text_len();
            let mut ranges = head_ranges;
            ranges.extend(remap_ranges(&piece.entity_ranges, offset));
            ranges.extend(tail_ranges.into_iter().map(|r| EntityRange {
                offset: r.offset + inserted,
                length: r.length,
                key: r.key,
            }));
            new_blocks.push(RawBlock {
                key: target.key.clone(),
                text: format!("{head}{}{tail}", piece.text),
                block_type: target.block_type.clone(),
                depth: target.depth,
                entity_ranges: ranges,
            });
        }
        _ => {
            let first = &fragment.blocks[0];
            let mut first_ranges = head_ranges;
            first_ranges.extend(remap_ranges(&first.entity_ranges, offset));
            new_blocks.push(RawBlock {
                key: target.key.clone(),
                text: format!("{head}{}", first.text),
                block_type: target.block_type.clone(),
                depth: target.depth,
                entity_ranges: first_ranges,
            });
            for piece in &fragment.blocks[1..fragment.blocks.len() - 1] {
                new_blocks.push(RawBlock {
                    key: fresh_block_key(),
                    text: piece.text.clone(),
                    block_type: piece.block_type.clone(),
                    depth: piece.depth,
                    entity_ranges: remap_ranges(&piece.entity_ranges, 0),
                });
            }
            let last = &fragment.blocks[fragment.blocks.len() - 1];
            let last_len = last.text_len();
            let mut last_ranges = remap_ranges(&last.entity_ranges, 0);
            last_ranges.extend(tail_ranges.into_iter().map(|r| EntityRange {
                // the tail lands after the last fragment piece
                offset: r.offset - offset + last_len,
                length: r.length,
                key: r.key,
            }));
            new_blocks.push(RawBlock {
                key: fresh_block_key(),
                text: format!("{}{tail}", last.text),
                block_type: last.block_type.clone(),
                depth: last.depth,
                entity_ranges: last_ranges,
            });
        }
    }

    contents.blocks.splice(target_idx..=target_idx, new_blocks);
    contents
}
