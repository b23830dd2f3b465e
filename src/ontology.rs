//! The classification taxonomy and relationship ontology.
//!
//! Two immutable resources loaded once at startup: the taxonomy lists the
//! valid atom classes, the ontology restricts which classes may stand at
//! either end of each relationship type. Lookups are set-based; nothing is
//! mutated after load, so the store is shared freely across worker threads.

use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::path::Path;

#[derive(Debug, Deserialize)]
struct TaxonomyFile {
    valid_classes: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct OntologyFile {
    relationships: HashMap<String, RuleFile>,
}

#[derive(Debug, Deserialize)]
struct RuleFile {
    valid_sources: Vec<String>,
    valid_targets: Vec<String>,
}

/// Which classes may be the source and target of one relationship type.
#[derive(Clone, Debug)]
pub struct RelationshipRule {
    pub valid_sources: HashSet<String>,
    pub valid_targets: HashSet<String>,
}

#[derive(Clone, Debug, Default)]
pub struct Ontology {
    valid_classes: HashSet<String>,
    relationships: HashMap<String, RelationshipRule>,
}

impl Ontology {
    /// Build directly from class and rule listings.
    pub fn new<C, R>(classes: C, rules: R) -> Self
    where
        C: IntoIterator<Item = String>,
        R: IntoIterator<Item = (String, Vec<String>, Vec<String>)>,
    {
        Self {
            valid_classes: classes.into_iter().collect(),
            relationships: rules
                .into_iter()
                .map(|(name, sources, targets)| {
                    (
                        name,
                        RelationshipRule {
                            valid_sources: sources.into_iter().collect(),
                            valid_targets: targets.into_iter().collect(),
                        },
                    )
                })
                .collect(),
        }
    }

    /// Load from the two JSON resource files.
    pub fn from_files(taxonomy_path: &Path, ontology_path: &Path) -> Result<Self> {
        let taxonomy = std::fs::read_to_string(taxonomy_path).map_err(|source| Error::OntologyIo {
            path: taxonomy_path.display().to_string(),
            source,
        })?;
        let ontology = std::fs::read_to_string(ontology_path).map_err(|source| Error::OntologyIo {
            path: ontology_path.display().to_string(),
            source,
        })?;
        Self::from_json(&taxonomy, &ontology).map_err(|err| match err {
            Error::OntologyFormat { source, path } => Error::OntologyFormat {
                path: if path == "taxonomy" {
                    taxonomy_path.display().to_string()
                } else {
                    ontology_path.display().to_string()
                },
                source,
            },
            other => other,
        })
    }

    /// Parse from in-memory JSON documents.
    pub fn from_json(taxonomy: &str, ontology: &str) -> Result<Self> {
        let taxonomy: TaxonomyFile =
            serde_json::from_str(taxonomy).map_err(|source| Error::OntologyFormat {
                path: "taxonomy".to_string(),
                source,
            })?;
        let ontology: OntologyFile =
            serde_json::from_str(ontology).map_err(|source| Error::OntologyFormat {
                path: "ontology".to_string(),
                source,
            })?;

        Ok(Self {
            valid_classes: taxonomy.valid_classes.into_iter().collect(),
            relationships: ontology
                .relationships
                .into_iter()
                .map(|(name, rule)| {
                    (
                        name,
                        RelationshipRule {
                            valid_sources: rule.valid_sources.into_iter().collect(),
                            valid_targets: rule.valid_targets.into_iter().collect(),
                        },
                    )
                })
                .collect(),
        })
    }

    pub fn is_valid_class(&self, class: &str) -> bool {
        self.valid_classes.contains(class)
    }

    pub fn has_relationship(&self, name: &str) -> bool {
        self.relationships.contains_key(name)
    }

    pub fn rule(&self, name: &str) -> Option<&RelationshipRule> {
        self.relationships.get(name)
    }
}
