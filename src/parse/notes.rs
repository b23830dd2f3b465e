//! Notes, footnotes, and note-reference linking.
//!
//! Notes are numbered items under a `Notes` heading, referenced in the body
//! by inline `${ }^{n}$` markers. Footnotes are the independent Markdown
//! `[^id]` / `[^id]: text` pairs.

use crate::document::{Chapter, FootnoteDef, FootnoteRef, Footnotes, LinkedNote, NoteReference};
use crate::patterns;
use itertools::Itertools;
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::debug;

/// Notes found under `Notes` headings, plus the byte ranges of the note
/// blocks themselves (references inside them are not body references).
#[derive(Clone, Debug, Default)]
pub struct NotesScan {
    pub notes: BTreeMap<String, String>,
    pub blocks: Vec<Range<usize>>,
}

/// One marker occurrence located in both coordinate systems. Linking
/// compares against chapter ranges in normalized coordinates while the
/// reported offset stays in original coordinates.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReferencePair {
    pub identifier: String,
    pub original_offset: usize,
    pub normalized_offset: usize,
}

/// Walk every `Notes` heading and collect its numbered items.
///
/// A block ends at the first paragraph break that is not immediately
/// followed by another numbered item. Item text is flattened to one line.
/// Duplicate identifiers across blocks keep their first text.
pub fn find_notes(text: &str) -> NotesScan {
    let mut scan = NotesScan::default();

    for header in patterns::NOTES_HEADER.find_iter(text) {
        let mut block_start = header.end();
        if text[block_start..].starts_with('\n') {
            block_start += 1;
        }

        let mut block_end = text.len();
        for sep in patterns::PARAGRAPH_BREAK.find_iter(&text[block_start..]) {
            if !patterns::LIST_ITEM_AT.is_match(&text[block_start + sep.end()..]) {
                block_end = block_start + sep.start();
                break;
            }
        }

        let block = &text[block_start..block_end];
        let items: Vec<_> = patterns::LIST_ITEM.captures_iter(block).collect();
        if items.is_empty() {
            continue;
        }

        for (i, caps) in items.iter().enumerate() {
            let identifier = caps[1].to_string();
            let text_start = caps.get(2).expect("list item body group").start();
            let text_end = items
                .get(i + 1)
                .map(|next| next.get(0).expect("matched").start())
                .unwrap_or(block.len());
            let note_text = block[text_start..text_end].trim().replace('\n', " ");
            scan.notes.entry(identifier).or_insert(note_text);
        }
        scan.blocks.push(block_start..block_end);
    }

    scan
}

/// Independent scan for Markdown footnote references and definitions.
pub fn find_footnotes(text: &str) -> Footnotes {
    let mut footnotes = Footnotes::default();

    for caps in patterns::FOOTNOTE_MARKER.captures_iter(text) {
        let marker = caps.get(0).expect("group 0 always present");
        let identifier = caps[1].to_string();
        let after = &text[marker.end()..];

        if let Some(rest) = after.strip_prefix(':') {
            let content_start = marker.end() + 1;
            let end_rel = [rest.find("\n\n"), rest.find("[^")]
                .into_iter()
                .flatten()
                .min()
                .unwrap_or(rest.len());
            let raw = &rest[..end_rel];
            let body = raw.trim();
            let lead = raw.len() - raw.trim_start().len();
            let end_offset = if body.is_empty() {
                content_start
            } else {
                content_start + lead + body.len()
            };
            footnotes.definitions.push(FootnoteDef {
                identifier,
                text: body.to_string(),
                start_offset: marker.start(),
                end_offset,
            });
        } else {
            footnotes.references.push(FootnoteRef {
                identifier,
                start_offset: marker.start(),
                end_offset: marker.end(),
            });
        }
    }

    footnotes
}

/// Every inline marker occurrence in the original (pre-normalization) text,
/// with comma-separated identifier groups expanded.
pub fn find_note_references(original: &str) -> Vec<NoteReference> {
    let mut references = Vec::new();
    for caps in patterns::NOTE_MARKER.captures_iter(original) {
        let offset = caps.get(0).expect("group 0 always present").start();
        for id in caps[1].split(',') {
            references.push(NoteReference {
                identifier: id.trim().to_string(),
                offset,
            });
        }
    }
    references
}

/// Locate each marker in both the original and the normalized text.
///
/// Normalization moves markers but never creates or destroys them, so the
/// two scans pair up one to one.
pub fn reference_pairs(original: &str, normalized: &str) -> Vec<ReferencePair> {
    let original_markers: Vec<_> = patterns::NOTE_MARKER.captures_iter(original).collect();
    let normalized_markers: Vec<_> = patterns::NOTE_MARKER.find_iter(normalized).collect();
    debug_assert_eq!(original_markers.len(), normalized_markers.len());

    let mut pairs = Vec::new();
    for (caps, normalized_match) in original_markers.iter().zip(&normalized_markers) {
        let original_offset = caps.get(0).expect("group 0 always present").start();
        for id in caps[1].split(',') {
            pairs.push(ReferencePair {
                identifier: id.trim().to_string(),
                original_offset,
                normalized_offset: normalized_match.start(),
            });
        }
    }
    pairs
}

/// Attach each note to every chapter that references it. Notes referenced
/// only outside chapter ranges land under `"Unlinked Notes"`.
pub fn link_notes_to_text(
    chapters: &[Chapter],
    scan: &NotesScan,
    pairs: &[ReferencePair],
) -> BTreeMap<String, Vec<LinkedNote>> {
    let mut linked: BTreeMap<String, Vec<LinkedNote>> = BTreeMap::new();
    for chapter in chapters {
        linked.entry(chapter.title.clone()).or_default();
    }
    linked.entry("Unlinked Notes".to_string()).or_default();

    // References inside the note blocks themselves are not body references.
    let body_refs: Vec<&ReferencePair> = pairs
        .iter()
        .filter(|p| !scan.blocks.iter().any(|b| b.contains(&p.normalized_offset)))
        .collect();

    for id in body_refs.iter().map(|p| p.identifier.as_str()).unique() {
        let Some(note_text) = scan.notes.get(id) else {
            debug!(identifier = id, "reference to a note that was never defined");
            continue;
        };
        let refs: Vec<&&ReferencePair> =
            body_refs.iter().filter(|p| p.identifier == id).collect();

        let mut found = false;
        for chapter in chapters {
            let in_chapter: Vec<usize> = refs
                .iter()
                .filter(|p| {
                    (chapter.start_offset..chapter.end_offset).contains(&p.normalized_offset)
                })
                .map(|p| p.original_offset)
                .collect();
            if !in_chapter.is_empty() {
                linked
                    .get_mut(&chapter.title)
                    .expect("seeded above")
                    .push(LinkedNote {
                        identifier: id.to_string(),
                        text: note_text.clone(),
                        reference_offsets: in_chapter,
                    });
                found = true;
            }
        }

        if !found {
            linked
                .get_mut("Unlinked Notes")
                .expect("seeded above")
                .push(LinkedNote {
                    identifier: id.to_string(),
                    text: note_text.clone(),
                    reference_offsets: refs.iter().map(|p| p.original_offset).collect(),
                });
        }
    }

    linked
}

#[cfg(test)]
mod tests {
    use super::*;

    const NOTES_TEXT: &str = "\
# Notes

1. First note text.
2. Second note
wraps across lines.
3. Third note.

Regular prose resumes here.
";

    #[test]
    fn numbered_notes_are_collected() {
        let scan = find_notes(NOTES_TEXT);
        assert_eq!(scan.notes.len(), 3);
        assert_eq!(scan.notes["1"], "First note text.");
        assert_eq!(scan.notes["2"], "Second note wraps across lines.");
        assert_eq!(scan.notes["3"], "Third note.");
        assert_eq!(scan.blocks.len(), 1);
    }

    #[test]
    fn block_ends_at_break_without_following_item() {
        let scan = find_notes(NOTES_TEXT);
        let block = scan.blocks[0].clone();
        assert!(!NOTES_TEXT[block].contains("Regular prose"));
    }

    #[test]
    fn heading_without_items_is_skipped() {
        let scan = find_notes("## Notes\n\nJust prose, no list.\n");
        assert!(scan.notes.is_empty());
        assert!(scan.blocks.is_empty());
    }

    #[test]
    fn roman_identifiers_are_accepted() {
        let scan = find_notes("Notes\n\ni. Roman one.\nii. Roman two.\n");
        assert_eq!(scan.notes["i"], "Roman one.");
        assert_eq!(scan.notes["ii"], "Roman two.");
    }

    #[test]
    fn footnote_references_and_definitions() {
        let text = "A claim.[^0] More text.\n\n[^0]: This paper was published elsewhere.\n\nAfter.";
        let footnotes = find_footnotes(text);
        assert_eq!(footnotes.references.len(), 1);
        assert_eq!(footnotes.references[0].identifier, "0");
        assert_eq!(footnotes.definitions.len(), 1);
        let def = &footnotes.definitions[0];
        assert_eq!(def.identifier, "0");
        assert_eq!(def.text, "This paper was published elsewhere.");
        assert_eq!(&text[def.start_offset..def.start_offset + 5], "[^0]:");
    }

    #[test]
    fn definition_stops_at_next_marker() {
        let text = "[^1]: First definition.\n[^2]: Second definition.";
        let footnotes = find_footnotes(text);
        assert_eq!(footnotes.definitions.len(), 2);
        assert_eq!(footnotes.definitions[0].text, "First definition.");
    }

    #[test]
    fn comma_groups_expand_to_multiple_references() {
        let refs = find_note_references("Text ${ }^{2,13}$ more.");
        assert_eq!(refs.len(), 2);
        assert_eq!(refs[0].identifier, "2");
        assert_eq!(refs[1].identifier, "13");
        assert_eq!(refs[0].offset, refs[1].offset);
    }
}
