//! Paragraph segmentation inside one content block.

use super::atom;
use crate::document::Paragraph;
use crate::patterns;

/// Split a de-wrapped content block into paragraphs.
///
/// `block` must be a slice of the normalized text and `base` its absolute
/// start offset. Paragraphs are the non-blank stretches between `\n\n+`
/// separators; offsets are tightened to the stripped text so every
/// paragraph slices back exactly. Atoms are produced only when `decompose`
/// is set (chapter and subsection prose).
pub fn find_paragraphs_in_block(block: &str, base: usize, decompose: bool) -> Vec<Paragraph> {
    let mut paragraphs = Vec::new();
    if block.is_empty() {
        return paragraphs;
    }

    let mut bounds: Vec<(usize, usize)> = Vec::new();
    let mut cursor = 0;
    for m in patterns::PARAGRAPH_BREAK.find_iter(block) {
        bounds.push((cursor, m.start()));
        cursor = m.end();
    }
    bounds.push((cursor, block.len()));

    for (piece_start, piece_end) in bounds {
        let piece = &block[piece_start..piece_end];
        let trimmed = piece.trim_start();
        let lead = piece.len() - trimmed.len();
        let trimmed = trimmed.trim_end();
        if trimmed.is_empty() {
            continue;
        }
        let start = base + piece_start + lead;
        let end = start + trimmed.len();
        let atoms = if decompose {
            atom::decompose(trimmed, start)
        } else {
            Vec::new()
        };
        paragraphs.push(Paragraph {
            id: paragraphs.len() + 1,
            text: trimmed.to_string(),
            start_offset: start,
            end_offset: end,
            atoms,
        });
    }

    paragraphs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_blank_lines() {
        let block = "First paragraph here.\n\nSecond paragraph.\n\n\nThird.";
        let paras = find_paragraphs_in_block(block, 0, false);
        assert_eq!(paras.len(), 3);
        assert_eq!(paras[0].text, "First paragraph here.");
        assert_eq!(paras[2].text, "Third.");
        assert_eq!(paras[1].id, 2);
    }

    #[test]
    fn offsets_are_tight_and_absolute() {
        let block = "\n  Leading space.\n\nTail.  ";
        let base = 40;
        let paras = find_paragraphs_in_block(block, base, false);
        for p in &paras {
            assert_eq!(&block[p.start_offset - base..p.end_offset - base], p.text);
        }
        assert_eq!(paras[0].text, "Leading space.");
    }

    #[test]
    fn atoms_only_when_requested() {
        let block = "A sentence. Another.";
        assert!(find_paragraphs_in_block(block, 0, false)[0].atoms.is_empty());
        assert_eq!(find_paragraphs_in_block(block, 0, true)[0].atoms.len(), 2);
    }

    #[test]
    fn blank_block_yields_nothing() {
        assert!(find_paragraphs_in_block("\n\n  \n", 0, true).is_empty());
    }
}
