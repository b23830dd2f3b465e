//! Paragraph decomposition into sentence and citation atoms.

use crate::document::{Atom, AtomKind};
use crate::patterns;
use crate::sentence;

/// Split one paragraph into ordered atoms with absolute byte offsets.
///
/// The paragraph is first cut at citation markers (parentheticals with a
/// year, footnote markers, inline note markers); the prose between them is
/// sentence-tokenized, and a sentence is further split at its first colon
/// outside parentheses. Punctuation-only fragments are dropped.
pub fn decompose(paragraph: &str, base: usize) -> Vec<Atom> {
    let mut atoms: Vec<Atom> = Vec::new();

    for (start, end, is_citation) in split_at_citations(paragraph) {
        let part = &paragraph[start..end];
        if is_citation {
            push_atom(&mut atoms, paragraph, base, start, end, AtomKind::Citation);
            continue;
        }
        for span in sentence::split_sentences(part) {
            let sent = &part[span.clone()];
            let sent_start = start + span.start;
            match top_level_colon(sent) {
                Some(idx) => {
                    push_atom(&mut atoms, paragraph, base, sent_start, sent_start + idx, AtomKind::Sentence);
                    push_atom(
                        &mut atoms,
                        paragraph,
                        base,
                        sent_start + idx + 1,
                        sent_start + sent.len(),
                        AtomKind::Sentence,
                    );
                }
                None => {
                    push_atom(&mut atoms, paragraph, base, sent_start, sent_start + sent.len(), AtomKind::Sentence);
                }
            }
        }
    }

    atoms
}

/// Cut the paragraph into citation matches and the prose between them.
/// Returned ranges are relative to the paragraph and cover it completely.
fn split_at_citations(paragraph: &str) -> Vec<(usize, usize, bool)> {
    let mut parts = Vec::new();
    let mut cursor = 0;
    for m in patterns::CITATION_ATOM.find_iter(paragraph) {
        if m.start() > cursor {
            parts.push((cursor, m.start(), false));
        }
        parts.push((m.start(), m.end(), true));
        cursor = m.end();
    }
    if cursor < paragraph.len() {
        parts.push((cursor, paragraph.len(), false));
    }
    parts
}

fn push_atom(
    atoms: &mut Vec<Atom>,
    paragraph: &str,
    base: usize,
    start: usize,
    end: usize,
    kind: AtomKind,
) {
    let slice = &paragraph[start..end];
    let trimmed = slice.trim_start();
    let lead = slice.len() - trimmed.len();
    let trimmed = trimmed.trim_end();
    if trimmed.is_empty() {
        return;
    }
    // A bare punctuation fragment (a stranded period after a citation cut)
    // is not an atom.
    if kind == AtomKind::Sentence && !trimmed.chars().any(char::is_alphanumeric) {
        return;
    }
    atoms.push(Atom {
        id: atoms.len() + 1,
        text: trimmed.to_string(),
        start_offset: base + start + lead,
        end_offset: base + start + lead + trimmed.len(),
        kind,
    });
}

/// Byte index of the first colon at parenthesis depth zero, if any.
/// Depth is clamped at zero so malformed closers cannot hide later colons.
fn top_level_colon(sentence: &str) -> Option<usize> {
    let mut depth = 0u32;
    for (i, b) in sentence.bytes().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b':' if depth == 0 => return Some(i),
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(atoms: &[Atom]) -> Vec<&str> {
        atoms.iter().map(|a| a.text.as_str()).collect()
    }

    #[test]
    fn sentence_citation_sentence() {
        let p = "A sentence. (Smith 2020) Another one.";
        let atoms = decompose(p, 0);
        assert_eq!(texts(&atoms), vec!["A sentence.", "(Smith 2020)", "Another one."]);
        assert_eq!(atoms[0].kind, AtomKind::Sentence);
        assert_eq!(atoms[1].kind, AtomKind::Citation);
        assert_eq!(atoms[2].kind, AtomKind::Sentence);
        for atom in &atoms {
            assert_eq!(&p[atom.start_offset..atom.end_offset], atom.text);
        }
    }

    #[test]
    fn colon_splits_at_top_level_only_once() {
        let p = "It follows: namely, that P. Hence Q (Jones 2001).";
        let atoms = decompose(p, 0);
        assert_eq!(
            texts(&atoms),
            vec!["It follows", "namely, that P.", "Hence Q", "(Jones 2001)"]
        );
    }

    #[test]
    fn colon_inside_parentheses_does_not_split() {
        let p = "He said (see: above) nothing else.";
        let atoms = decompose(p, 0);
        assert_eq!(texts(&atoms), vec!["He said (see: above) nothing else."]);
    }

    #[test]
    fn citation_only_paragraph_is_one_citation_atom() {
        let atoms = decompose("(Smith 2020)", 0);
        assert_eq!(atoms.len(), 1);
        assert_eq!(atoms[0].kind, AtomKind::Citation);
        assert_eq!(atoms[0].text, "(Smith 2020)");
    }

    #[test]
    fn footnote_and_note_markers_become_citation_atoms() {
        let p = "A claim.[^3] Another claim. ${ }^{4,5}$ A third.";
        let atoms = decompose(p, 0);
        assert_eq!(
            texts(&atoms),
            vec!["A claim.", "[^3]", "Another claim.", "${ }^{4,5}$", "A third."]
        );
        assert_eq!(atoms[1].kind, AtomKind::Citation);
        assert_eq!(atoms[3].kind, AtomKind::Citation);
    }

    #[test]
    fn ids_are_one_based_and_sequential() {
        let atoms = decompose("One. Two. Three.", 10);
        let ids: Vec<usize> = atoms.iter().map(|a| a.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(atoms[0].start_offset, 10);
    }

    #[test]
    fn page_ranged_citation_is_detected() {
        let p = "The argument appears early (Author 2023: 45-67). It continues.";
        let atoms = decompose(p, 0);
        assert_eq!(
            texts(&atoms),
            vec!["The argument appears early", "(Author 2023: 45-67)", "It continues."]
        );
    }

    #[test]
    fn offsets_survive_a_nonzero_base() {
        let p = "First claim: with a rider.";
        let atoms = decompose(p, 200);
        assert_eq!(atoms[0].start_offset, 200);
        assert_eq!(atoms[1].text, "with a rider.");
        assert_eq!(atoms[1].start_offset, 200 + p.find("with").unwrap());
    }
}
