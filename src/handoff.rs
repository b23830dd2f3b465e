//! Record shapes for the persistence collaborator.
//!
//! The core never talks to a database. It hands over four batches: one
//! document record, the structure tree, atom records (with their local
//! paragraph ids translated through the map the collaborator produced when
//! it inserted the tree), and relationship records translated through the
//! returned atom id map. Only the shapes are specified here; inserting is
//! the collaborator's business.

use crate::document::Document;
use crate::graph::Graph;
use serde::Serialize;
use serde_json::json;
use std::collections::HashMap;
use tracing::warn;

#[derive(Clone, Debug, Serialize)]
pub struct DocumentRecord {
    pub title: Option<String>,
    pub raw_content: String,
    /// The parse output as an opaque tree.
    pub parsed_content: serde_json::Value,
}

/// `parser paragraph id -> persistence paragraph id`, produced by the
/// collaborator after inserting the structure tree. The parser paragraph id
/// is an atom id minus its `_atom{N}` suffix, e.g. `chap0_sec2_par3`.
pub type ParagraphIdMap = HashMap<String, i64>;

/// `graph_id -> persistence atom id`, returned by the collaborator after
/// inserting the atom batch.
pub type AtomIdMap = HashMap<String, i64>;

#[derive(Clone, Debug, Serialize)]
pub struct AtomRecord {
    pub document_id: i64,
    pub paragraph_id: i64,
    pub text: String,
    pub classification: String,
    pub start_offset: usize,
    pub end_offset: usize,
    /// Temporary key for edge resolution before database ids exist.
    pub graph_id: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct RelationshipRecord {
    pub document_id: i64,
    pub source_atom_id: i64,
    pub target_atom_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub justification: String,
}

pub fn document_record(document: &Document) -> DocumentRecord {
    DocumentRecord {
        title: document.title.clone(),
        raw_content: document.raw_text.clone(),
        parsed_content: json!({
            "introductions": document.introductions,
            "chapters": document.chapters,
            "end_sections": document.end_sections,
            "notes": document.notes,
            "linked_notes": document.linked_notes,
            "footnotes": document.footnotes,
            "bibliography": document.bibliography,
        }),
    }
}

/// Materialize the atom batch. Atoms whose paragraph is missing from the
/// map cannot be attached to the stored tree; they are dropped with a
/// warning and counted in the second return value.
pub fn atom_records(
    graph: &Graph,
    document_id: i64,
    paragraph_ids: &ParagraphIdMap,
) -> (Vec<AtomRecord>, usize) {
    let mut records = Vec::with_capacity(graph.atoms.len());
    let mut dropped = 0;
    for atom in &graph.atoms {
        let Some(&paragraph_id) = paragraph_ids.get(&atom.paragraph_id) else {
            warn!(atom = %atom.id, paragraph = %atom.paragraph_id, "no persisted paragraph for atom, dropping");
            dropped += 1;
            continue;
        };
        records.push(AtomRecord {
            document_id,
            paragraph_id,
            text: atom.text.clone(),
            classification: atom.classification.clone(),
            start_offset: atom.start_offset,
            end_offset: atom.end_offset,
            graph_id: atom.id.clone(),
        });
    }
    (records, dropped)
}

/// Materialize the edge batch against the collaborator's atom ids. Edges
/// with an unpersisted endpoint are dropped with a warning.
pub fn relationship_records(
    graph: &Graph,
    document_id: i64,
    atom_ids: &AtomIdMap,
) -> Vec<RelationshipRecord> {
    let mut records = Vec::with_capacity(graph.relationships.len());
    for edge in &graph.relationships {
        let (Some(&source), Some(&target)) = (
            atom_ids.get(&edge.source_atom_id),
            atom_ids.get(&edge.target_atom_id),
        ) else {
            warn!(
                source = %edge.source_atom_id,
                target = %edge.target_atom_id,
                "edge endpoint was not persisted, dropping"
            );
            continue;
        };
        records.push(RelationshipRecord {
            document_id,
            source_atom_id: source,
            target_atom_id: target,
            kind: edge.kind.clone(),
            justification: edge.justification.clone(),
        });
    }
    records
}
