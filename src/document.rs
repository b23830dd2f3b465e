//! The parsed document model.
//!
//! Everything here is produced in a single pass over one text and is
//! immutable afterwards. All offsets are byte offsets into
//! [`Document::normalized_text`], except [`NoteReference::offset`] which
//! indexes the pre-normalization text.

use crate::cite::Bibliography;
use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Document {
    pub title: Option<String>,
    /// The text as handed to the parser, before any normalization.
    pub raw_text: String,
    /// Marker-isolated, block-de-wrapped text that every offset indexes.
    pub normalized_text: String,
    pub introductions: Vec<FrontSection>,
    pub chapters: Vec<Chapter>,
    /// Back-matter sections, bibliography excluded (it lives in
    /// `bibliography` instead).
    pub end_sections: Vec<EndSection>,
    /// Note identifier to note text.
    pub notes: BTreeMap<String, String>,
    /// Chapter title to the notes referenced from that chapter. Notes whose
    /// references fall in no chapter land under the `"Unlinked Notes"` key.
    pub linked_notes: BTreeMap<String, Vec<LinkedNote>>,
    pub footnotes: Footnotes,
    pub bibliography: Bibliography,
}

/// Front-matter section (Contents, Preface, Introduction, ...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FrontSection {
    pub title: String,
    pub start_offset: usize,
    /// First byte after the heading line.
    pub content_start: usize,
    pub end_offset: usize,
    pub text: String,
    pub paragraphs: Vec<Paragraph>,
}

/// Back-matter section (Index, Appendix, document-level Notes, ...).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct EndSection {
    pub title: String,
    pub start_offset: usize,
    pub content_start: usize,
    pub end_offset: usize,
    pub text: String,
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub title: String,
    pub start_offset: usize,
    pub end_offset: usize,
    /// End of the chapter header lines; content starts here.
    pub header_end_offset: usize,
    /// Paragraphs directly under the chapter. Populated only when the
    /// chapter has no subsections.
    pub paragraphs: Vec<Paragraph>,
    pub subsections: Vec<Subsection>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Subsection {
    /// 1-based position within the chapter.
    pub id: usize,
    pub title: String,
    pub start_offset: usize,
    pub content_start: usize,
    pub end_offset: usize,
    pub text: String,
    pub paragraphs: Vec<Paragraph>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Paragraph {
    /// 1-based position within its containing block.
    pub id: usize,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    /// Empty for front- and back-matter paragraphs.
    pub atoms: Vec<Atom>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Atom {
    /// 1-based position within the paragraph.
    pub id: usize,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub kind: AtomKind,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AtomKind {
    Sentence,
    Citation,
}

/// One inline note marker occurrence. `offset` indexes the original text,
/// not the normalized one, because marker isolation moves markers around.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteReference {
    pub identifier: String,
    pub offset: usize,
}

/// A note attached to a chapter through its in-text references.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkedNote {
    pub identifier: String,
    pub text: String,
    /// Original-text offsets of the references inside the chapter.
    pub reference_offsets: Vec<usize>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Footnotes {
    pub references: Vec<FootnoteRef>,
    pub definitions: Vec<FootnoteDef>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootnoteRef {
    pub identifier: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootnoteDef {
    pub identifier: String,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

// Uniform structure tree
// ====================

/// Node kind in the uniform outline handed to the persistence collaborator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    Introduction,
    Chapter,
    Subsection,
    EndSection,
    Paragraph,
}

/// One node of the document outline. Children are ordered by offset;
/// only chapters carry subsections, and only leaf-level blocks carry
/// paragraphs.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StructureNode {
    pub kind: StructureKind,
    pub title: Option<String>,
    pub text: Option<String>,
    pub start_offset: usize,
    pub end_offset: usize,
    pub children: Vec<StructureNode>,
}

impl Document {
    /// The document outline as a uniform tree, in reading order.
    pub fn structure_tree(&self) -> Vec<StructureNode> {
        let mut roots = Vec::new();

        for intro in &self.introductions {
            roots.push(StructureNode {
                kind: StructureKind::Introduction,
                title: Some(intro.title.clone()),
                text: Some(intro.text.clone()),
                start_offset: intro.start_offset,
                end_offset: intro.end_offset,
                children: paragraph_nodes(&intro.paragraphs),
            });
        }

        for chapter in &self.chapters {
            let mut children = paragraph_nodes(&chapter.paragraphs);
            for sub in &chapter.subsections {
                children.push(StructureNode {
                    kind: StructureKind::Subsection,
                    title: Some(sub.title.clone()),
                    text: Some(sub.text.clone()),
                    start_offset: sub.start_offset,
                    end_offset: sub.end_offset,
                    children: paragraph_nodes(&sub.paragraphs),
                });
            }
            roots.push(StructureNode {
                kind: StructureKind::Chapter,
                title: Some(chapter.title.clone()),
                text: None,
                start_offset: chapter.start_offset,
                end_offset: chapter.end_offset,
                children,
            });
        }

        for section in &self.end_sections {
            roots.push(StructureNode {
                kind: StructureKind::EndSection,
                title: Some(section.title.clone()),
                text: Some(section.text.clone()),
                start_offset: section.start_offset,
                end_offset: section.end_offset,
                children: paragraph_nodes(&section.paragraphs),
            });
        }

        roots
    }

    /// Check the structural invariants: no inverted ranges, children inside
    /// their parent, siblings disjoint and in reading order, atoms slicing
    /// back to the normalized text. Violations are fatal for the document.
    pub fn validate(&self) -> Result<()> {
        let roots = self.structure_tree();
        validate_siblings(&roots, None)?;
        for root in &roots {
            validate_node(root)?;
        }
        for (paragraph, atom) in self.all_atoms() {
            if atom.start_offset >= atom.end_offset {
                return Err(Error::InvalidStructure(format!(
                    "atom {} of paragraph {} has inverted range {}..{}",
                    atom.id, paragraph.id, atom.start_offset, atom.end_offset
                )));
            }
            let slice = self
                .normalized_text
                .get(atom.start_offset..atom.end_offset)
                .unwrap_or_default();
            if slice != atom.text {
                return Err(Error::InvalidStructure(format!(
                    "atom {} of paragraph {} does not slice back to the text",
                    atom.id, paragraph.id
                )));
            }
        }
        Ok(())
    }

    /// All paragraphs that carry prose, in reading order.
    pub fn all_paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        let intro = self.introductions.iter().flat_map(|s| s.paragraphs.iter());
        let chapters = self.chapters.iter().flat_map(|c| {
            c.paragraphs
                .iter()
                .chain(c.subsections.iter().flat_map(|s| s.paragraphs.iter()))
        });
        let ends = self.end_sections.iter().flat_map(|s| s.paragraphs.iter());
        intro.chain(chapters).chain(ends)
    }

    fn all_atoms(&self) -> impl Iterator<Item = (&Paragraph, &Atom)> {
        self.all_paragraphs()
            .flat_map(|p| p.atoms.iter().map(move |a| (p, a)))
    }
}

fn paragraph_nodes(paragraphs: &[Paragraph]) -> Vec<StructureNode> {
    paragraphs
        .iter()
        .map(|p| StructureNode {
            kind: StructureKind::Paragraph,
            title: None,
            text: Some(p.text.clone()),
            start_offset: p.start_offset,
            end_offset: p.end_offset,
            children: Vec::new(),
        })
        .collect()
}

fn validate_node(node: &StructureNode) -> Result<()> {
    if node.start_offset > node.end_offset {
        return Err(Error::InvalidStructure(format!(
            "{:?} node {:?} has inverted range {}..{}",
            node.kind, node.title, node.start_offset, node.end_offset
        )));
    }
    for child in &node.children {
        if child.start_offset < node.start_offset || child.end_offset > node.end_offset {
            return Err(Error::InvalidStructure(format!(
                "{:?} node {:?} escapes its parent range",
                child.kind, child.title
            )));
        }
    }
    validate_siblings(&node.children, node.title.as_deref())?;
    for child in &node.children {
        validate_node(child)?;
    }
    Ok(())
}

fn validate_siblings(nodes: &[StructureNode], parent: Option<&str>) -> Result<()> {
    for pair in nodes.windows(2) {
        if pair[0].end_offset > pair[1].start_offset {
            return Err(Error::InvalidStructure(format!(
                "siblings under {:?} overlap: {:?} and {:?}",
                parent, pair[0].title, pair[1].title
            )));
        }
    }
    Ok(())
}
