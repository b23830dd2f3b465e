//! Join in-text citations to bibliography entries.

use super::extract::{citations_in_paragraph, parse_bibliography_entries};
use super::types::Bibliography;
use crate::document::Paragraph;
use tracing::debug;

/// Parse the bibliography block (if any) and attach every citation found in
/// `paragraphs` to its entry. Citations with no matching entry are kept in
/// `unlinked_citations`; without a bibliography, everything is unlinked.
pub fn link_citations_to_bibliography<'a>(
    bibliography_block: Option<(&str, usize)>,
    paragraphs: impl Iterator<Item = &'a Paragraph>,
) -> Bibliography {
    let mut entries = match bibliography_block {
        Some((content, base)) => parse_bibliography_entries(content, base),
        None => Default::default(),
    };

    let mut unlinked = Vec::new();
    for paragraph in paragraphs {
        for citation in citations_in_paragraph(&paragraph.text, paragraph.start_offset) {
            match entries.get_mut(&citation.key()) {
                Some(entry) => entry.citations.push(citation),
                None => unlinked.push(citation),
            }
        }
    }

    if !unlinked.is_empty() {
        debug!(count = unlinked.len(), "citations with no bibliography entry");
    }

    Bibliography {
        entries,
        unlinked_citations: unlinked,
    }
}
