//! Citation and bibliography-entry extraction.

use super::types::{BibliographyEntry, InTextCitation};
use crate::patterns;
use std::collections::BTreeMap;

/// Find every in-text citation in one paragraph.
///
/// `base` is the paragraph's absolute start offset; emitted offsets are
/// absolute. Bare-year citations like `(2004: 407)` bind to the most recent
/// author named explicitly in the paragraph's prose, so the paragraph is
/// pre-scanned for `Name (1999`-shaped mentions.
pub fn citations_in_paragraph(text: &str, base: usize) -> Vec<InTextCitation> {
    let mut citations = Vec::new();

    let mut last_author: Option<String> = patterns::EXPLICIT_AUTHOR
        .captures_iter(text)
        .last()
        .map(|caps| caps[1].to_lowercase());

    for group in patterns::PAREN_GROUP.captures_iter(text) {
        let whole = group.get(0).expect("group 0 always present");
        let mut content = group.get(1).map(|m| m.as_str()).unwrap_or_default();

        let page_info = patterns::PAGE_SUFFIX.captures(content).map(|caps| {
            let pages = caps[1].to_string();
            content = content[..caps.get(0).expect("matched").start()].trim();
            pages
        });

        for part in patterns::CITATION_SPLIT.split(content) {
            let mut author = None;
            let mut year = None;

            if let Some(caps) = patterns::AUTHOR_YEAR.captures(part) {
                // `Smith, J. 1999` keeps only the token after the last comma.
                let name = caps[1]
                    .trim()
                    .rsplit(',')
                    .next()
                    .unwrap_or_default()
                    .trim()
                    .to_lowercase();
                author = Some(name.clone());
                year = Some(caps[2].to_string());
                last_author = Some(name);
            } else if let Some(caps) = patterns::YEAR_ONLY.captures(part) {
                if let Some(prev) = &last_author {
                    author = Some(prev.clone());
                    year = Some(caps[1].to_string());
                }
            }

            if let (Some(author), Some(year)) = (author, year) {
                citations.push(InTextCitation {
                    author,
                    year,
                    page_info: page_info.clone(),
                    full_text: whole.as_str().to_string(),
                    start_offset: base + whole.start(),
                    end_offset: base + whole.end(),
                });
            }
        }
    }

    citations
}

/// Parse the bibliography section into keyed entries.
///
/// Each entry opens with `Author. (Year). ...` at a line start and runs to
/// just before the next opener. `base` is the absolute offset of `content`.
pub fn parse_bibliography_entries(
    content: &str,
    base: usize,
) -> BTreeMap<String, BibliographyEntry> {
    let mut entries = BTreeMap::new();

    let matches: Vec<_> = patterns::BIB_ENTRY.captures_iter(content).collect();
    for (i, caps) in matches.iter().enumerate() {
        let whole = caps.get(0).expect("group 0 always present");
        let author = caps[1].trim().to_string();
        let year = caps[2].trim().to_string();

        let last_name = author
            .split(',')
            .next()
            .unwrap_or_default()
            .split_whitespace()
            .last()
            .unwrap_or_default()
            .to_lowercase();
        let key = format!("{last_name}_{year}");

        let entry_start = whole.start();
        let entry_end = matches
            .get(i + 1)
            .map(|next| next.get(0).expect("matched").start())
            .unwrap_or(content.len());
        let raw = &content[entry_start..entry_end];
        let full_text = raw.trim();
        let lead = raw.len() - raw.trim_start().len();

        entries.insert(
            key.clone(),
            BibliographyEntry {
                key,
                author,
                year,
                full_text: full_text.to_string(),
                start_offset: base + entry_start + lead,
                end_offset: base + entry_start + lead + full_text.len(),
                citations: Vec::new(),
            },
        );
    }

    entries
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn author_year_citation() {
        let text = "A claim is made here (Williamson 2007a: 99-105).";
        let found = citations_in_paragraph(text, 0);
        assert_eq!(found.len(), 1);
        let c = &found[0];
        assert_eq!(c.author, "williamson");
        assert_eq!(c.year, "2007a");
        assert_eq!(c.page_info.as_deref(), Some("99-105"));
        assert_eq!(c.full_text, "(Williamson 2007a: 99-105)");
        assert_eq!(&text[c.start_offset..c.end_offset], c.full_text);
    }

    #[test]
    fn bare_year_binds_to_explicit_author() {
        let text = "Boghossian (1996) argues for this, and later repeats it (2003: 15).";
        let found = citations_in_paragraph(text, 0);
        // `(1996)` itself is also a bare-year group; both resolve to the
        // explicit author mentioned in the prose.
        assert!(found.iter().all(|c| c.author == "boghossian"));
        assert!(found.iter().any(|c| c.year == "2003"));
    }

    #[test]
    fn multi_citation_group_splits() {
        let text = "As widely held (Boghossian 1996, 2003b; Peacocke 1992).";
        let found = citations_in_paragraph(text, 0);
        let keys: Vec<String> = found.iter().map(|c| c.key()).collect();
        assert_eq!(
            keys,
            vec!["boghossian_1996", "boghossian_2003b", "peacocke_1992"]
        );
    }

    #[test]
    fn non_citation_parenthetical_is_ignored() {
        let found = citations_in_paragraph("An aside (of no import) here.", 0);
        assert!(found.is_empty());
    }

    #[test]
    fn bibliography_entry_key_and_span() {
        let content = "Williamson, T. (2007). The Philosophy of Philosophy. Oxford: Blackwell.\nQuine, W. V. (1960). Word and Object. Cambridge, MA: MIT Press.\n";
        let entries = parse_bibliography_entries(content, 100);
        assert_eq!(entries.len(), 2);
        let w = &entries["williamson_2007"];
        assert_eq!(w.author, "Williamson, T");
        assert_eq!(w.year, "2007");
        assert!(w.full_text.starts_with("Williamson, T. (2007)."));
        assert_eq!(w.start_offset, 100);
        let q = &entries["quine_1960"];
        assert!(q.full_text.contains("Word and Object"));
    }

    #[test]
    fn forthcoming_year_is_accepted() {
        let text = "It is defended in (Smith forthcoming).";
        let found = citations_in_paragraph(text, 0);
        assert_eq!(found[0].key(), "smith_forthcoming");
    }
}
