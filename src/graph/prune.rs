//! Ontology pruning and edge materialization.

use super::{Graph, ValidatedRelationship};
use crate::classifier::Direction;
use crate::ontology::Ontology;
use std::collections::{HashMap, HashSet};
use tracing::warn;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PruneStats {
    pub dropped_atoms: usize,
    pub dropped_relationships: usize,
    pub deduplicated_relationships: usize,
}

/// Validate a raw graph against the ontology.
///
/// Pass 1 drops atoms with an invalid classification, then relationships
/// pointing at a dropped or unknown atom or using an unknown type. Pass 2
/// enforces the source/target class rules per direction. Surviving
/// proposals are materialized as canonical outgoing edges, deduplicated by
/// `(source, target, type)`. Atoms with no surviving edges remain as nodes.
/// The function is idempotent.
pub fn prune_by_ontology(graph: Graph, ontology: &Ontology) -> (Graph, PruneStats) {
    let mut stats = PruneStats::default();

    // Pass 1: classification filter.
    let mut atoms = Vec::with_capacity(graph.atoms.len());
    for atom in graph.atoms {
        if ontology.is_valid_class(&atom.classification) {
            atoms.push(atom);
        } else {
            warn!(atom = %atom.id, class = %atom.classification, "dropping atom with invalid classification");
            stats.dropped_atoms += 1;
        }
    }

    let class_by_id: HashMap<String, String> = atoms
        .iter()
        .map(|atom| (atom.id.clone(), atom.classification.clone()))
        .collect();

    // Pass 1 continued, then pass 2: relationship filters.
    for atom in &mut atoms {
        let atom_id = atom.id.clone();
        let source_class = atom.classification.clone();
        let before = atom.relationships.len();
        atom.relationships.retain(|rel| {
            let Some(target_class) = class_by_id.get(&rel.target_id) else {
                warn!(atom = %atom_id, target = %rel.target_id, "dropping relationship to missing atom");
                return false;
            };
            let Some(rule) = ontology.rule(&rel.kind) else {
                warn!(atom = %atom_id, kind = %rel.kind, "dropping relationship of unknown type");
                return false;
            };
            let valid = match rel.direction {
                Direction::Outgoing => {
                    rule.valid_sources.contains(&source_class)
                        && rule.valid_targets.contains(target_class)
                }
                Direction::Incoming => {
                    rule.valid_sources.contains(target_class)
                        && rule.valid_targets.contains(&source_class)
                }
            };
            if !valid {
                warn!(
                    atom = %atom_id,
                    kind = %rel.kind,
                    source = %source_class,
                    target = %target_class,
                    "dropping relationship violating ontology rule"
                );
            }
            valid
        });
        stats.dropped_relationships += before - atom.relationships.len();
    }

    // Materialize edges in canonical outgoing form.
    let mut seen: HashSet<(String, String, String)> = HashSet::new();
    let mut relationships = Vec::new();
    for atom in &atoms {
        for rel in &atom.relationships {
            let (source, target) = match rel.direction {
                Direction::Outgoing => (atom.id.clone(), rel.target_id.clone()),
                Direction::Incoming => (rel.target_id.clone(), atom.id.clone()),
            };
            if seen.insert((source.clone(), target.clone(), rel.kind.clone())) {
                relationships.push(ValidatedRelationship {
                    source_atom_id: source,
                    target_atom_id: target,
                    kind: rel.kind.clone(),
                    justification: rel.justification.clone(),
                });
            } else {
                stats.deduplicated_relationships += 1;
            }
        }
    }

    (
        Graph {
            document_title: graph.document_title,
            atoms,
            relationships,
        },
        stats,
    )
}
