//! Text normalization ahead of structural parsing.
//!
//! Two transforms, applied at different stages:
//!
//! 1. [`isolate_note_markers`] runs once over the whole OCR text before any
//!    discovery. It may grow the text, so every downstream offset refers to
//!    its output, not the raw OCR bytes.
//! 2. [`dewrap`] removes mid-sentence line wraps inside a paragraph block.
//!    It is length-preserving (a qualifying newline byte is overwritten with
//!    a space), so offsets computed before and after it agree and the final
//!    normalized text can be assembled by splicing de-wrapped blocks in
//!    place.
//!
//! [`dehyphenate`] and [`strip_image_markers`] are whole-document cleanup
//! helpers for OCR artefacts. They are opt-in and run before `Parser::new`,
//! never inside it.

use crate::patterns;

/// Put every inline note marker on a line of its own.
///
/// A marker sharing a line with other text is re-emitted surrounded by
/// paragraph breaks. A marker already alone on its line only gets missing
/// single newlines added. Matches are processed in reverse so earlier
/// offsets stay valid while the text grows.
pub fn isolate_note_markers(text: &str) -> String {
    let matches: Vec<_> = patterns::NOTE_MARKER
        .find_iter(text)
        .map(|m| (m.start(), m.end()))
        .collect();
    if matches.is_empty() {
        return text.to_string();
    }

    let mut out = text.to_string();
    for &(start, end) in matches.iter().rev() {
        let marker = &text[start..end];

        let line_start = text[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
        let line_end = text[end..].find('\n').map(|i| end + i).unwrap_or(text.len());
        let before = text[line_start..start].trim();
        let after = text[end..line_end].trim();

        let replacement = if !before.is_empty() || !after.is_empty() {
            format!("\n\n{marker}\n\n")
        } else {
            let needs_before = start > 0 && !text[..start].ends_with('\n');
            let needs_after = end < text.len() && !text[end..].starts_with('\n');
            if !needs_before && !needs_after {
                continue;
            }
            format!(
                "{}{marker}{}",
                if needs_before { "\n" } else { "" },
                if needs_after { "\n" } else { "" }
            )
        };
        out.replace_range(start..end, &replacement);
    }
    out
}

/// Join mid-sentence line wraps inside one paragraph-content block.
///
/// Double newlines separate paragraphs and are never touched. A single
/// newline between two non-blank lines is overwritten with a space iff the
/// first line does not already end a sentence and neither line is a
/// structural line (heading, numbered chapter marker, list item, footnote,
/// note marker, or a front-/back-matter header). Each line boundary is
/// decided from the two original lines around it, which makes the
/// transform idempotent: a fully wrapped paragraph collapses to one line
/// and stays there.
///
/// The output always has the same length as the input.
pub fn dewrap(block: &str) -> String {
    let mut out = block.as_bytes().to_vec();

    // Line spans, newline bytes excluded.
    let mut lines: Vec<(usize, usize)> = Vec::new();
    let mut start = 0;
    for (i, b) in block.bytes().enumerate() {
        if b == b'\n' {
            lines.push((start, i));
            start = i + 1;
        }
    }
    lines.push((start, block.len()));

    for pair in lines.windows(2) {
        let cur = &block[pair[0].0..pair[0].1];
        let next = &block[pair[1].0..pair[1].1];
        if should_join(cur, next) {
            out[pair[0].1] = b' ';
        }
    }

    debug_assert_eq!(out.len(), block.len());
    String::from_utf8(out).expect("newline-for-space swap keeps the text valid UTF-8")
}

fn should_join(cur: &str, next: &str) -> bool {
    let cur_trim = cur.trim();
    let next_trim = next.trim();
    // Blank lines delimit paragraphs.
    if cur_trim.is_empty() || next_trim.is_empty() {
        return false;
    }
    !patterns::SENTENCE_END.is_match(cur_trim)
        && !is_structural(cur_trim)
        && !is_structural(next_trim)
        && !patterns::LIST_ITEM_AT.is_match(next_trim)
        && !patterns::FOOTNOTE_MARKER_AT.is_match(next_trim)
}

fn is_structural(line: &str) -> bool {
    patterns::HEADING_LINE.is_match(line)
        || patterns::NUMBERED_HEADER.is_match(line)
        || patterns::NOTE_MARKER.is_match(line)
        || patterns::NOTES_HEADER.is_match(line)
        || patterns::END_HEADER.is_match(line)
        || patterns::INTRO_HEADER.is_match(line)
}

/// Rejoin words hyphenated across a line wrap, e.g. `exam-\nple`.
pub fn dehyphenate(text: &str) -> String {
    patterns::HYPHEN_WRAP.replace_all(text, "$1$2").into_owned()
}

/// Drop OCR image artefacts like `![img-0.jpeg](img-0.jpeg)`.
pub fn strip_image_markers(text: &str) -> String {
    patterns::IMAGE_MARKER.replace_all(text, "").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn marker_sharing_a_line_is_isolated() {
        let text = "## Some Title ${ }^{1}$ More Text\n";
        let out = isolate_note_markers(text);
        let lines: Vec<&str> = out.lines().map(str::trim).collect();
        assert!(lines.contains(&"${ }^{1}$"));
        // Heading text survives on its own line.
        assert!(lines.iter().any(|l| l.starts_with("## Some Title")));
        assert!(lines.contains(&"More Text"));
    }

    #[test]
    fn marker_alone_gains_missing_newlines() {
        // Alone on its line but indented, so the preceding byte is a space.
        let out = isolate_note_markers("text\n  ${ }^{2}$\nmore");
        assert!(out.contains("\n${ }^{2}$\n"));
    }

    #[test]
    fn isolation_is_idempotent() {
        let text = "A paragraph with a marker ${ }^{3,4}$ inline.\n\nNext paragraph.";
        let once = isolate_note_markers(text);
        assert_eq!(isolate_note_markers(&once), once);
    }

    #[test]
    fn dewrap_joins_mid_sentence_breaks() {
        let block = "A sentence that wraps\nonto the next line.\n\nSecond paragraph.";
        let out = dewrap(block);
        assert_eq!(out, "A sentence that wraps onto the next line.\n\nSecond paragraph.");
        assert_eq!(out.len(), block.len());
    }

    #[test]
    fn dewrap_preserves_sentence_final_breaks() {
        let block = "A complete sentence.\nAnother one starts here.";
        assert_eq!(dewrap(block), block);
    }

    #[test]
    fn dewrap_leaves_structural_lines_alone() {
        let block = "## A heading\nBody text continues\nhere.";
        let out = dewrap(block);
        assert_eq!(out, "## A heading\nBody text continues here.");
    }

    #[test]
    fn dewrap_collapses_a_fully_wrapped_paragraph() {
        let block = "first part\nsecond part\nthird part";
        assert_eq!(dewrap(block), "first part second part third part");
    }

    #[test]
    fn dewrap_skips_list_items_and_footnotes() {
        let block = "Intro line\n1. a numbered item\n[^2]: a footnote";
        assert_eq!(dewrap(block), block);
    }

    #[test]
    fn dewrap_is_idempotent() {
        let block = "wrapped line\ncontinues here.\n\n# 2\n\nNext chapter text.";
        let once = dewrap(block);
        assert_eq!(dewrap(&once), once);
    }

    #[test]
    fn dehyphenate_joins_wrapped_words() {
        assert_eq!(dehyphenate("exam-\nple text"), "example text");
    }

    #[test]
    fn strip_image_markers_removes_artefacts() {
        assert_eq!(strip_image_markers("before ![img-3.jpeg](img-3.jpeg) after"), "before  after");
    }
}
