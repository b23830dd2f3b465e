//! Every discovery pattern in one place.
//!
//! The OCR output follows an informal grammar of Markdown-ish headings,
//! numbered chapter markers, note markers and footnote markers. Discovery is
//! deliberately regex-based; the functions in `parse` are pure over `&str`
//! and these statics are the whole grammar.

use regex::Regex;
use std::sync::LazyLock;

fn re(pattern: &str) -> Regex {
    Regex::new(pattern).expect("pattern is written in-source and must compile")
}

/// Inline note marker as produced by OCR, e.g. `${ }^{12}$` or `${ }^{3,4}$`.
/// Group 1 holds the comma-separated identifier list.
pub static NOTE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| re(r"\$\{\s*\}\^\{(\d+(?:,\d+)*)\}\$"));

/// First heading line of the document (anchored at the start of the text).
pub static TITLE: LazyLock<Regex> = LazyLock::new(|| re(r"^\s*#+\s*([^\n]+)"));

/// Any Markdown heading line prefix.
pub static HEADING_LINE: LazyLock<Regex> = LazyLock::new(|| re(r"^\s*#+\s"));

/// A heading that is nothing but a chapter number, e.g. `# 7` or `## IV`.
pub static NUMBERED_HEADER: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?mi)^\s*#+\s*(?:\d+|[IVXLC]+)\s*$"));

/// Primary chapter shape: a `#`-numbered line followed by its title heading.
pub static CHAPTER: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?mi)^\s*#\s*(?:\d+|[IVXLC]+)\s*\n+\s*#{1,2}\s*([^#\n]+)"));

/// First arabic or roman numeral in a chapter header. Deliberately
/// case-sensitive: lowercase roman headers keep their bare title.
pub static CHAPTER_NUMBER: LazyLock<Regex> = LazyLock::new(|| re(r"(\d+|[IVXLC]+)"));

/// Arabic chapter number as rendered into a chapter title.
pub static CHAPTER_TITLE_NUMBER: LazyLock<Regex> = LazyLock::new(|| re(r"Chapter (\d+)"));

/// Front-matter section headings.
pub static INTRO_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?mi)^#+\s*(?:Contents|Introduction|Preface|Prologue|(?:Publisher'?s?\s*)?Acknowledgements?)\s*$")
});

/// Back-matter section headings. The hashes are optional because OCR often
/// drops them on bare `Bibliography` / `Index` lines.
pub static END_HEADER: LazyLock<Regex> = LazyLock::new(|| {
    re(r"(?mi)^\s*#*\s*(?:Bibliography|Index|References|Appendix|Appendices|Glossary|(?:Publisher'?s?\s*)?Acknowledgements?|Endnotes|Afterword|Notes)\s*$")
});

/// A `Notes` heading, hashed or bare.
pub static NOTES_HEADER: LazyLock<Regex> = LazyLock::new(|| re(r"(?mi)^#{0,4}\s*Notes\s*$"));

/// Numbered list item opening a note, e.g. `1. `, `[12] `, `iv. `.
pub static LIST_ITEM: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?m)^(?:\[?(\d+|[ivxlc]+)\]?\.?\s+)(.*)"));

/// Same shape anchored at the start of a slice (no multiline), used to peek
/// directly after a paragraph break.
pub static LIST_ITEM_AT: LazyLock<Regex> =
    LazyLock::new(|| re(r"^\[?(?:\d+|[ivxlc]+)\]?\.?\s+"));

/// Paragraph separator.
pub static PARAGRAPH_BREAK: LazyLock<Regex> = LazyLock::new(|| re(r"\n\n+"));

/// Any heading line inside a chapter body.
pub static SUBSECTION_HEADER: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?m)^\s*#+\s*(.+?)\s*$"));

/// Footnote marker `[^id]`. Whether it is a reference or a definition is
/// decided by peeking at the character after the match (regex look-around is
/// unavailable here).
pub static FOOTNOTE_MARKER: LazyLock<Regex> = LazyLock::new(|| re(r"\[\^([^\]]+)\]"));

/// Footnote marker anchored at the start of a line slice.
pub static FOOTNOTE_MARKER_AT: LazyLock<Regex> = LazyLock::new(|| re(r"^\[\^[^\]]+\]"));

/// The three citation shapes an atom can be: a parenthetical with a year, a
/// footnote marker, or an inline note marker.
pub static CITATION_ATOM: LazyLock<Regex> = LazyLock::new(|| {
    re(r"\s*\([^)]+\d{4}[^)]*\)|\s*\[\^?\d+\]|\s*\$\{\s*\}\^\{\d+(?:,\d+)*\}\$")
});

/// Bibliography entry opener: `Author, A. (1999a). Rest of entry`.
pub static BIB_ENTRY: LazyLock<Regex> =
    LazyLock::new(|| re(r"(?m)^([A-Z][\w\s,.&-]+?)\.\s*\((\d{4}[a-z]?|forthcoming)\)\.\s*(.*)"));

/// Parenthetical group scanned for in-text citations.
pub static PAREN_GROUP: LazyLock<Regex> = LazyLock::new(|| re(r"\(([^)]+?)\)"));

/// Trailing page info inside a citation, e.g. `: 99-105`.
pub static PAGE_SUFFIX: LazyLock<Regex> = LazyLock::new(|| re(r":\s*([0-9-]+)$"));

/// An author named in running text directly before a year, used to resolve
/// bare-year citations like `(2004: 407)`.
pub static EXPLICIT_AUTHOR: LazyLock<Regex> =
    LazyLock::new(|| re(r"\b([A-Z][a-z]+)\s+\(?(?:\d{4}|forthcoming)"));

/// `Author 1999`-shaped citation content.
pub static AUTHOR_YEAR: LazyLock<Regex> =
    LazyLock::new(|| re(r"^([A-Za-z\s,]+?)\s+(\d{4}[a-z]?|forthcoming)"));

/// Bare-year citation content.
pub static YEAR_ONLY: LazyLock<Regex> = LazyLock::new(|| re(r"^(\d{4}[a-z]?|forthcoming)"));

/// Separator between stacked citations, e.g. `(Boghossian 1996, 2003b)`.
pub static CITATION_SPLIT: LazyLock<Regex> = LazyLock::new(|| re(r"\s*[,;]\s*"));

/// Sentence-final punctuation at the end of a line.
pub static SENTENCE_END: LazyLock<Regex> = LazyLock::new(|| re(r"[.!?]\s*$"));

/// A numbered list opener at the start of a block, the telltale of a Notes
/// body masquerading as chapter content.
pub static NUMBERED_LIST_START: LazyLock<Regex> = LazyLock::new(|| re(r"^\s*\d+\.\s"));

/// Hyphenated line wrap: `exam-\nple`.
pub static HYPHEN_WRAP: LazyLock<Regex> = LazyLock::new(|| re(r"(\w+)-\n(\w+)"));

/// OCR image artefact, e.g. `![img-3.jpeg](img-3.jpeg)`.
pub static IMAGE_MARKER: LazyLock<Regex> =
    LazyLock::new(|| re(r"!\[img-\d+\.[A-Za-z0-9]+\]\(img-\d+\.[A-Za-z0-9]+\)"));

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn note_marker_shapes() {
        assert!(NOTE_MARKER.is_match("${ }^{1}$"));
        assert!(NOTE_MARKER.is_match("${ }^{2,13}$"));
        assert!(!NOTE_MARKER.is_match("${ }^{a}$"));
    }

    #[test]
    fn chapter_primary_shape() {
        let text = "# 1\n\n## The Problem\n\nBody.";
        let m = CHAPTER.captures(text).unwrap();
        assert_eq!(m.get(1).unwrap().as_str().trim(), "The Problem");
    }

    #[test]
    fn numbered_header_matches_roman() {
        assert!(NUMBERED_HEADER.is_match("# IV"));
        assert!(NUMBERED_HEADER.is_match("## 12"));
        assert!(!NUMBERED_HEADER.is_match("# Epilogue"));
    }

    #[test]
    fn citation_atom_shapes() {
        for s in ["(Smith 2020)", " (Quine 1960: 22-24)", "[^3]", "[4]", "${ }^{5}$"] {
            assert!(CITATION_ATOM.is_match(s), "should match {s:?}");
        }
        assert!(!CITATION_ATOM.is_match("(see below)"));
    }

    #[test]
    fn bib_entry_captures_author_and_year() {
        let line = "Williamson, T. (2007). The Philosophy of Philosophy. Oxford: Blackwell.";
        let caps = BIB_ENTRY.captures(line).unwrap();
        assert_eq!(&caps[1], "Williamson, T");
        assert_eq!(&caps[2], "2007");
    }
}
