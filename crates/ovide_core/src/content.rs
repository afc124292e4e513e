/*
SPDX-License-Identifier: MPL-2.0
*/

//! Portable rich-text content model.
//!
//! Contents are stored in the raw serialized form of the editing surface:
//! a list of blocks plus an entity map. Every operation here is pure and
//! returns a new value, so change detection is a structural equality
//! comparison rather than an identity check.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Block type used for blocks whose only purpose is hosting a block entity.
pub const ATOMIC_BLOCK: &str = "atomic";

/// Default block type for plain paragraphs.
pub const UNSTYLED_BLOCK: &str = "unstyled";

/// Kinds of entities the contextualization subsystem cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    InlineAsset,
    BlockAsset,
    NotePointer,
}

impl EntityType {
    /// Whether this entity points at a contextualization.
    pub fn is_asset(self) -> bool {
        matches!(self, EntityType::InlineAsset | EntityType::BlockAsset)
    }
}

/// Whether the text range hosting an entity may be edited by the user.
///
/// Citation markers are immutable so a stray keystroke cannot corrupt
/// them; glossary and webpage mentions stay editable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Mutability {
    Mutable,
    #[default]
    Immutable,
}

/// Pointer from an entity to a contextualization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetPointer {
    pub id: String,
}

/// Payload attached to an entity record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub asset: Option<AssetPointer>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note_id: Option<String>,
}

impl EntityData {
    pub fn asset(id: impl Into<String>) -> Self {
        EntityData {
            asset: Some(AssetPointer { id: id.into() }),
            note_id: None,
        }
    }

    pub fn note(id: impl Into<String>) -> Self {
        EntityData {
            asset: None,
            note_id: Some(id.into()),
        }
    }

    /// Contextualization id carried by this entity, if any.
    pub fn asset_id(&self) -> Option<&str> {
        self.asset.as_ref().map(|a| a.id.as_str())
    }
}

/// A typed entity record stored in a content's entity map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawEntity {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    #[serde(default)]
    pub mutability: Mutability,
    #[serde(default)]
    pub data: EntityData,
}

/// Attachment of an entity to a character range of a block.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRange {
    pub offset: usize,
    pub length: usize,
    pub key: String,
}

impl EntityRange {
    fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// One block of rich text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawBlock {
    pub key: String,
    pub text: String,
    #[serde(rename = "type")]
    pub block_type: String,
    #[serde(default)]
    pub depth: u8,
    #[serde(default)]
    pub entity_ranges: Vec<EntityRange>,
}

impl RawBlock {
    /// A fresh empty paragraph.
    pub fn empty() -> Self {
        RawBlock {
            key: fresh_block_key(),
            text: String::new(),
            block_type: UNSTYLED_BLOCK.to_string(),
            depth: 0,
            entity_ranges: Vec::new(),
        }
    }

    pub fn text_len(&self) -> usize {
        self.text.chars().count()
    }

    /// Entity key attached at a character offset, if any.
    pub fn entity_key_at(&self, offset: usize) -> Option<&str> {
        self.entity_ranges
            .iter()
            .find(|r| offset >= r.offset && offset < r.end())
            .map(|r| r.key.as_str())
    }

    /// First contiguous range carrying the given entity key.
    pub fn entity_range(&self, entity_key: &str) -> Option<(usize, usize)> {
        self.entity_ranges
            .iter()
            .find(|r| r.key == entity_key)
            .map(|r| (r.offset, r.end()))
    }

    /// Whether this block is an atomic block whose only content is the
    /// given entity.
    pub fn is_atomic_host_of(&self, entity_key: &str) -> bool {
        self.block_type == ATOMIC_BLOCK
            && self.entity_ranges.iter().any(|r| r.key == entity_key)
    }

    fn slice_chars(&self, start: usize, end: usize) -> RawBlock {
        let text: String = self
            .text
            .chars()
            .skip(start)
            .take(end.saturating_sub(start))
            .collect();
        let entity_ranges = self
            .entity_ranges
            .iter()
            .filter_map(|r| clip_range(r, start, end))
            .collect();
        RawBlock {
            key: self.key.clone(),
            text,
            block_type: self.block_type.clone(),
            depth: self.depth,
            entity_ranges,
        }
    }
}

/// Clip an entity range to the character window `[start, end)`,
/// rebasing offsets to the window origin.
fn clip_range(range: &EntityRange, start: usize, end: usize) -> Option<EntityRange> {
    let s = range.offset.max(start);
    let e = range.end().min(end);
    if s >= e {
        return None;
    }
    Some(EntityRange {
        offset: s - start,
        length: e - s,
        key: range.key.clone(),
    })
}

/// A selection inside a content, as reported by the editing surface.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub anchor_key: String,
    pub anchor_offset: usize,
    pub focus_key: String,
    pub focus_offset: usize,
    #[serde(default)]
    pub is_backward: bool,
    #[serde(default)]
    pub is_collapsed: bool,
}

impl Selection {
    /// Collapsed caret at a given position.
    pub fn collapsed(key: impl Into<String>, offset: usize) -> Self {
        let key = key.into();
        Selection {
            anchor_key: key.clone(),
            anchor_offset: offset,
            focus_key: key,
            focus_offset: offset,
            is_backward: false,
            is_collapsed: true,
        }
    }

    /// Forward range inside a single block.
    pub fn range(key: impl Into<String>, start: usize, end: usize) -> Self {
        let key = key.into();
        Selection {
            anchor_key: key.clone(),
            anchor_offset: start,
            focus_key: key,
            focus_offset: end,
            is_backward: false,
            is_collapsed: start == end,
        }
    }

    /// Start/end keys and offsets regardless of drag direction.
    pub fn normalized(&self) -> (String, usize, String, usize) {
        if self.is_backward {
            (
                self.focus_key.clone(),
                self.focus_offset,
                self.anchor_key.clone(),
                self.anchor_offset,
            )
        } else {
            (
                self.anchor_key.clone(),
                self.anchor_offset,
                self.focus_key.clone(),
                self.focus_offset,
            )
        }
    }
}

/// Serialized rich-text content: blocks plus entity map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawContent {
    pub blocks: Vec<RawBlock>,
    #[serde(default)]
    pub entity_map: IndexMap<String, RawEntity>,
}

impl RawContent {
    /// Content holding a single empty paragraph.
    pub fn empty() -> Self {
        RawContent {
            blocks: vec![RawBlock::empty()],
            entity_map: IndexMap::new(),
        }
    }

    /// Content holding a single paragraph of plain text.
    pub fn from_text(text: impl Into<String>) -> Self {
        let mut block = RawBlock::empty();
        block.text = text.into();
        RawContent {
            blocks: vec![block],
            entity_map: IndexMap::new(),
        }
    }

    pub fn block(&self, key: &str) -> Option<&RawBlock> {
        self.blocks.iter().find(|b| b.key == key)
    }

    pub fn block_index(&self, key: &str) -> Option<usize> {
        self.blocks.iter().position(|b| b.key == key)
    }

    pub fn entity(&self, key: &str) -> Option<&RawEntity> {
        self.entity_map.get(key)
    }

    /// Plain-text rendering, blocks separated by newlines.
    pub fn plain_text(&self) -> String {
        self.blocks
            .iter()
            .map(|b| b.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Register an entity record, returning its key and the new content.
    pub fn with_entity(&self, entity: RawEntity) -> (String, RawContent) {
        let next = self
            .entity_map
            .keys()
            .filter_map(|k| k.parse::<u64>().ok())
            .max()
            .map(|n| n + 1)
            .unwrap_or(1);
        let key = next.to_string();
        let mut content = self.clone();
        content.entity_map.insert(key.clone(), entity);
        (key, content)
    }

    /// Apply an entity over a character range of a block, overriding any
    /// previous attachment on those characters.
    pub fn with_entity_applied(
        &self,
        block_key: &str,
        start: usize,
        end: usize,
        entity_key: &str,
    ) -> RawContent {
        let mut content = self.clone();
        if let Some(block) = content.blocks.iter_mut().find(|b| b.key == block_key) {
            let mut ranges: Vec<EntityRange> = block
                .entity_ranges
                .iter()
                .flat_map(|r| subtract_range(r, start, end))
                .collect();
            ranges.push(EntityRange {
                offset: start,
                length: end - start,
                key: entity_key.to_string(),
            });
            ranges.sort_by_key(|r| r.offset);
            block.entity_ranges = ranges;
        }
        content
    }

    /// Un-apply any entity from a character range of a block. Entity
    /// records left unreferenced are pruned from the entity map.
    pub fn with_entity_cleared(&self, block_key: &str, start: usize, end: usize) -> RawContent {
        let mut content = self.clone();
        if let Some(block) = content.blocks.iter_mut().find(|b| b.key == block_key) {
            block.entity_ranges = block
                .entity_ranges
                .iter()
                .flat_map(|r| subtract_range(r, start, end))
                .collect();
        }
        content.prune_unreferenced_entities();
        content
    }

    /// Replace the selected text, returning the new content. Entity
    /// attachments overlapping the replaced range are dropped; later
    /// attachments are shifted.
    pub fn with_text_replaced(&self, selection: &Selection, text: &str) -> RawContent {
        let (start_key, start, end_key, end) = selection.normalized();
        let (Some(start_idx), Some(end_idx)) =
            (self.block_index(&start_key), self.block_index(&end_key))
        else {
            return self.clone();
        };
        let inserted = text.chars().count();
        let mut content = self.clone();

        if start_idx == end_idx {
            let block = &mut content.blocks[start_idx];
            let head: String = block.text.chars().take(start).collect();
            let tail: String = block.text.chars().skip(end).collect();
            block.text = format!("{head}{text}{tail}");
            block.entity_ranges = block
                .entity_ranges
                .iter()
                .filter_map(|r| shift_around_replacement(r, start, end, inserted))
                .collect();
        } else {
            let first = &content.blocks[start_idx];
            let last = &content.blocks[end_idx];
            let head: String = first.text.chars().take(start).collect();
            let tail: String = last.text.chars().skip(end).collect();
            let mut ranges: Vec<EntityRange> = first
                .entity_ranges
                .iter()
                .filter(|r| r.end() <= start)
                .cloned()
                .collect();
            ranges.extend(last.entity_ranges.iter().filter(|r| r.offset >= end).map(
                |r| EntityRange {
                    offset: r.offset - end + start + inserted,
                    length: r.length,
                    key: r.key.clone(),
                },
            ));
            let merged = RawBlock {
                key: first.key.clone(),
                text: format!("{head}{text}{tail}"),
                block_type: first.block_type.clone(),
                depth: first.depth,
                entity_ranges: ranges,
            };
            content.blocks.splice(start_idx..=end_idx, [merged]);
        }
        content.prune_unreferenced_entities();
        content
    }

    /// Insert an atomic block hosting a block entity. An empty anchor
    /// block is replaced; otherwise the atomic block goes right after it.
    pub fn with_atomic_entity(&self, anchor_key: &str, entity: RawEntity) -> RawContent {
        let (entity_key, mut content) = self.with_entity(entity);
        let atomic = RawBlock {
            key: fresh_block_key(),
            text: " ".to_string(),
            block_type: ATOMIC_BLOCK.to_string(),
            depth: 0,
            entity_ranges: vec![EntityRange {
                offset: 0,
                length: 1,
                key: entity_key,
            }],
        };
        match content.block_index(anchor_key) {
            Some(idx) if content.blocks[idx].text.trim().is_empty() => {
                content.blocks[idx] = atomic;
            }
            Some(idx) => content.blocks.insert(idx + 1, atomic),
            None => content.blocks.push(atomic),
        }
        content
    }

    /// Extract the selected fragment as a self-contained content: partial
    /// first/last blocks are sliced, interior blocks are taken whole, and
    /// the entity map is restricted to referenced records.
    pub fn slice(&self, selection: &Selection) -> RawContent {
        let (start_key, start, end_key, end) = selection.normalized();
        let (Some(start_idx), Some(end_idx)) =
            (self.block_index(&start_key), self.block_index(&end_key))
        else {
            return RawContent::empty();
        };
        let blocks: Vec<RawBlock> = (start_idx..=end_idx)
            .map(|idx| {
                let block = &self.blocks[idx];
                let s = if idx == start_idx { start } else { 0 };
                let e = if idx == end_idx { end } else { block.text_len() };
                block.slice_chars(s, e)
            })
            .collect();
        let mut entity_map = IndexMap::new();
        for block in &blocks {
            for range in &block.entity_ranges {
                if let Some(entity) = self.entity_map.get(&range.key) {
                    entity_map
                        .entry(range.key.clone())
                        .or_insert_with(|| entity.clone());
                }
            }
        }
        RawContent { blocks, entity_map }
    }

    fn prune_unreferenced_entities(&mut self) {
        let referenced: Vec<String> = self
            .blocks
            .iter()
            .flat_map(|b| b.entity_ranges.iter().map(|r| r.key.clone()))
            .collect();
        self.entity_map.retain(|key, _| referenced.contains(key));
    }
}

/// Remove the window `[start, end)` from a range, keeping what lies
/// outside it. May yield zero, one or two ranges.
fn subtract_range(range: &EntityRange, start: usize, end: usize) -> Vec<EntityRange> {
    let mut out = Vec::new();
    if range.offset < start {
        let e = range.end().min(start);
        out.push(EntityRange {
            offset: range.offset,
            length: e - range.offset,
            key: range.key.clone(),
        });
    }
    if range.end() > end {
        let s = range.offset.max(end);
        out.push(EntityRange {
            offset: s,
            length: range.end() - s,
            key: range.key.clone(),
        });
    }
    out
}

/// Rebase a range around a text replacement of `[start, end)` by a run of
/// `inserted` characters. Overlapping ranges are dropped.
fn shift_around_replacement(
    range: &EntityRange,
    start: usize,
    end: usize,
    inserted: usize,
) -> Option<EntityRange> {
    if range.end() <= start {
        return Some(range.clone());
    }
    if range.offset >= end {
        return Some(EntityRange {
            offset: range.offset - end + start + inserted,
            length: range.length,
            key: range.key.clone(),
        });
    }
    None
}

/// Fresh block key. The editing surface only needs uniqueness within a
/// content object.
pub fn fresh_block_key() -> String {
    Uuid::new_v4().simple().to_string()[..8].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn content_with_entity() -> (RawContent, String) {
        let content = RawContent::from_text("hello world");
        let (key, content) = content.with_entity(RawEntity {
            entity_type: EntityType::InlineAsset,
            mutability: Mutability::Immutable,
            data: EntityData::asset("ctx-1"),
        });
        let block_key = content.blocks[0].key.clone();
        (content.with_entity_applied(&block_key, 6, 11, &key), key)
    }

    #[test]
    fn applied_entity_is_found_at_offsets() {
        let (content, key) = content_with_entity();
        let block = &content.blocks[0];
        assert_eq!(block.entity_key_at(6), Some(key.as_str()));
        assert_eq!(block.entity_key_at(10), Some(key.as_str()));
        assert_eq!(block.entity_key_at(5), None);
        assert_eq!(block.entity_range(&key), Some((6, 11)));
    }

    #[test]
    fn clearing_an_entity_prunes_the_record() {
        let (content, key) = content_with_entity();
        let block_key = content.blocks[0].key.clone();
        let cleared = content.with_entity_cleared(&block_key, 6, 11);
        assert!(cleared.blocks[0].entity_ranges.is_empty());
        assert!(cleared.entity(&key).is_none());
        assert_eq!(cleared.plain_text(), "hello world");
    }

    #[test]
    fn replace_text_shifts_later_ranges() {
        let (content, key) = content_with_entity();
        let block_key = content.blocks[0].key.clone();
        let selection = Selection::range(block_key, 0, 5);
        let replaced = content.with_text_replaced(&selection, "hi");
        assert_eq!(replaced.plain_text(), "hi world");
        assert_eq!(replaced.blocks[0].entity_range(&key), Some((3, 8)));
    }

    #[test]
    fn replace_text_across_blocks_merges_them() {
        let mut content = RawContent::from_text("first block");
        let mut second = RawBlock::empty();
        second.text = "second block".to_string();
        let second_key = second.key.clone();
        content.blocks.push(second);
        let selection = Selection {
            anchor_key: content.blocks[0].key.clone(),
            anchor_offset: 5,
            focus_key: second_key,
            focus_offset: 6,
            is_backward: false,
            is_collapsed: false,
        };
        let replaced = content.with_text_replaced(&selection, "-");
        assert_eq!(replaced.blocks.len(), 1);
        assert_eq!(replaced.plain_text(), "first- block");
    }

    #[test]
    fn backward_selection_slices_like_forward() {
        let (content, _) = content_with_entity();
        let block_key = content.blocks[0].key.clone();
        let forward = Selection::range(block_key.clone(), 2, 9);
        let backward = Selection {
            anchor_key: block_key.clone(),
            anchor_offset: 9,
            focus_key: block_key,
            focus_offset: 2,
            is_backward: true,
            is_collapsed: false,
        };
        assert_eq!(content.slice(&forward), content.slice(&backward));
    }

    #[test]
    fn slice_restricts_entity_map() {
        let (content, key) = content_with_entity();
        let block_key = content.blocks[0].key.clone();
        let outside = content.slice(&Selection::range(block_key.clone(), 0, 4));
        assert!(outside.entity_map.is_empty());
        let inside = content.slice(&Selection::range(block_key, 4, 11));
        assert_eq!(inside.entity_map.len(), 1);
        assert_eq!(inside.blocks[0].entity_range(&key), Some((2, 7)));
    }

    #[test]
    fn atomic_insertion_replaces_empty_anchor() {
        let content = RawContent::empty();
        let anchor = content.blocks[0].key.clone();
        let inserted = content.with_atomic_entity(
            &anchor,
            RawEntity {
                entity_type: EntityType::BlockAsset,
                mutability: Mutability::Immutable,
                data: EntityData::asset("ctx-9"),
            },
        );
        assert_eq!(inserted.blocks.len(), 1);
        assert_eq!(inserted.blocks[0].block_type, ATOMIC_BLOCK);
        assert_eq!(inserted.entity_map.len(), 1);
    }

    #[test]
    fn serde_round_trip_preserves_structure() {
        let (content, _) = content_with_entity();
        let json = serde_json::to_string(&content).unwrap();
        let back: RawContent = serde_json::from_str(&json).unwrap();
        assert_eq!(content, back);
    }
}
