//! The structural parser.
//!
//! [`Parser`] lifts a flat OCR string into a [`Document`]: title, front
//! matter, chapters, subsections, paragraphs and atoms, plus the
//! cross-cutting artefacts (notes, footnotes, bibliography, citations) and
//! their links. Parsing is a pure function of the input text and the
//! options; every discovery step is total and a missing section is just an
//! empty collection.

pub mod atom;
pub mod notes;
pub mod paragraph;
pub mod structure;

use crate::cite;
use crate::document::{Chapter, Document, EndSection, FrontSection};
use crate::error::Result;
use crate::normalize;
use std::ops::Range;
use tracing::debug;

/// Tunables for the heuristics that varied across revisions of the source
/// material.
#[derive(Clone, Copy, Debug)]
pub struct ParserOptions {
    /// Minimum body length for the lone-numbered-header chapter fallback.
    pub fallback_min_body_len: usize,
    /// Decompose front- and back-matter paragraphs into atoms too.
    pub decompose_front_matter: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            fallback_min_body_len: 1000,
            decompose_front_matter: false,
        }
    }
}

/// A pre-delimited chapter, for documents whose chapter boundaries arrive
/// from an external source (a PDF table of contents) instead of the regex
/// discovery.
#[derive(Clone, Debug)]
pub struct ChapterChunk {
    pub title: String,
    pub text: String,
}

pub struct Parser {
    original: String,
    /// Marker-isolated text; discovery offsets index this.
    text: String,
    opts: ParserOptions,
}

impl Parser {
    pub fn new(text: &str) -> Self {
        Self::with_options(text, ParserOptions::default())
    }

    pub fn with_options(text: &str, opts: ParserOptions) -> Self {
        Self {
            original: text.to_string(),
            text: normalize::isolate_note_markers(text),
            opts,
        }
    }

    /// Parse with regex-based structure discovery.
    pub fn parse(&self) -> Result<Document> {
        let title = structure::find_title(&self.text);
        let mut intros = structure::find_intro_sections(&self.text);
        let ends = structure::find_end_sections(&self.text);

        // Without numbered chapters the front matter runs to end of text
        // and may spill into the back matter; the back matter wins.
        if let Some(back_matter_start) = ends.iter().map(|s| s.start_offset).min() {
            intros.retain(|s| s.start_offset < back_matter_start);
            for intro in &mut intros {
                intro.end_offset = intro.end_offset.min(back_matter_start).max(intro.content_start);
            }
        }

        let mut chapters =
            structure::find_chapters(&self.text, &intros, &ends, self.opts.fallback_min_body_len);
        for chapter in &mut chapters {
            chapter.subsections = structure::find_subsections(&self.text, chapter);
        }
        self.assemble(title, intros, chapters, ends)
    }

    /// Parse a document whose chapter boundaries are already known.
    ///
    /// The chunks are joined with paragraph separators and run through the
    /// same downstream pipeline; front matter is empty and the document
    /// title is not recoverable at this level.
    pub fn parse_pre_chunked(chunks: &[ChapterChunk], opts: ParserOptions) -> Result<Document> {
        let mut full = String::new();
        let mut bounds: Vec<(String, usize)> = Vec::new();
        for chunk in chunks {
            bounds.push((chunk.title.clone(), full.len()));
            // Isolation is local to each marker, so per-chunk isolation
            // equals whole-text isolation and the boundaries stay exact.
            full.push_str(&normalize::isolate_note_markers(&chunk.text));
            full.push_str("\n\n");
        }

        let parser = Self::with_options(&full, opts);
        let ends = structure::find_end_sections(&parser.text);

        let mut chapters = Vec::new();
        for (i, (title, start)) in bounds.iter().enumerate() {
            let end = bounds
                .get(i + 1)
                .map(|(_, next)| *next)
                .unwrap_or(parser.text.len());
            chapters.push(Chapter {
                title: title.clone(),
                start_offset: *start,
                end_offset: end,
                header_end_offset: *start,
                paragraphs: Vec::new(),
                subsections: Vec::new(),
            });
        }
        // Back matter found inside the final chunk belongs to the end
        // sections, not the chapter that carried it.
        if let Some(back_matter_start) = ends.iter().map(|s| s.start_offset).min() {
            for chapter in &mut chapters {
                chapter.end_offset = chapter.end_offset.min(back_matter_start);
            }
            chapters.retain(|c| c.start_offset < c.end_offset);
        }
        for chapter in &mut chapters {
            chapter.subsections = structure::find_subsections(&parser.text, chapter);
        }

        parser.assemble(None, Vec::new(), chapters, ends)
    }

    fn assemble(
        &self,
        title: Option<String>,
        mut intros: Vec<FrontSection>,
        mut chapters: Vec<Chapter>,
        all_ends: Vec<EndSection>,
    ) -> Result<Document> {
        let (bibliography_section, mut end_sections): (Vec<EndSection>, Vec<EndSection>) = all_ends
            .into_iter()
            .partition(|s| s.title.eq_ignore_ascii_case("bibliography"));

        // Second normalization pass: de-wrap every prose block in place.
        // De-wrapping preserves length, so offsets discovered above stay
        // valid in the spliced result.
        let mut normalized = self.text.clone();
        for range in prose_blocks(&intros, &chapters, &end_sections) {
            let dewrapped = normalize::dewrap(&self.text[range.clone()]);
            normalized.replace_range(range.clone(), &dewrapped);
        }

        // Paragraph segmentation. Only chapter and subsection prose gets
        // atoms unless the caller opted the front and back matter in.
        let front_atoms = self.opts.decompose_front_matter;
        for intro in &mut intros {
            let range = intro.content_start..intro.end_offset;
            intro.paragraphs =
                paragraph::find_paragraphs_in_block(&normalized[range], intro.content_start, front_atoms);
            intro.text = normalized[intro.content_start..intro.end_offset].trim().to_string();
        }
        for chapter in &mut chapters {
            if chapter.subsections.is_empty() {
                let start = content_start(&normalized, chapter.header_end_offset);
                chapter.paragraphs = paragraph::find_paragraphs_in_block(
                    &normalized[start..chapter.end_offset],
                    start,
                    true,
                );
            } else {
                for sub in &mut chapter.subsections {
                    let range = sub.content_start..sub.end_offset;
                    sub.paragraphs =
                        paragraph::find_paragraphs_in_block(&normalized[range], sub.content_start, true);
                    sub.text = normalized[sub.content_start..sub.end_offset].trim().to_string();
                }
            }
        }
        for section in &mut end_sections {
            let range = section.content_start..section.end_offset;
            section.paragraphs =
                paragraph::find_paragraphs_in_block(&normalized[range], section.content_start, front_atoms);
            section.text = normalized[section.content_start..section.end_offset].trim().to_string();
        }

        // Cross-cutting artefacts. Notes and footnotes live outside the
        // de-wrapped prose blocks or carry no offsets, so the pre-de-wrap
        // text is fine for them.
        let notes_scan = notes::find_notes(&self.text);
        let footnotes = notes::find_footnotes(&self.text);
        let pairs = notes::reference_pairs(&self.original, &normalized);
        let linked_notes = notes::link_notes_to_text(&chapters, &notes_scan, &pairs);

        let bibliography_block = bibliography_section
            .first()
            .map(|s| (&normalized[s.content_start..s.end_offset], s.content_start));
        let citation_paragraphs = intros
            .iter()
            .flat_map(|s| s.paragraphs.iter())
            .chain(chapters.iter().flat_map(|c| {
                c.paragraphs
                    .iter()
                    .chain(c.subsections.iter().flat_map(|s| s.paragraphs.iter()))
            }));
        let bibliography =
            cite::link_citations_to_bibliography(bibliography_block, citation_paragraphs);

        debug!(
            chapters = chapters.len(),
            notes = notes_scan.notes.len(),
            bibliography_entries = bibliography.entries.len(),
            "document assembled"
        );

        let document = Document {
            title,
            raw_text: self.original.clone(),
            normalized_text: normalized,
            introductions: intros,
            chapters,
            end_sections,
            notes: notes_scan.notes,
            linked_notes,
            footnotes,
            bibliography,
        };
        document.validate()?;
        Ok(document)
    }
}

/// Byte ranges of every block that holds prose paragraphs: front matter,
/// chapters without subsections, subsections, and non-bibliography back
/// matter. The blocks are disjoint.
fn prose_blocks(
    intros: &[FrontSection],
    chapters: &[Chapter],
    end_sections: &[EndSection],
) -> Vec<Range<usize>> {
    let mut blocks = Vec::new();
    for intro in intros {
        blocks.push(intro.content_start..intro.end_offset);
    }
    for chapter in chapters {
        if chapter.subsections.is_empty() {
            blocks.push(chapter.header_end_offset..chapter.end_offset);
        } else {
            for sub in &chapter.subsections {
                blocks.push(sub.content_start..sub.end_offset);
            }
        }
    }
    for section in end_sections {
        blocks.push(section.content_start..section.end_offset);
    }
    blocks
}

fn content_start(text: &str, header_end: usize) -> usize {
    if text[header_end..].starts_with('\n') {
        header_end + 1
    } else {
        header_end
    }
}
