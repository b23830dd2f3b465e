//! The graph constructor.
//!
//! Turns a parsed [`Document`] into a typed, ontology-validated graph. Work
//! unit is one atom: each is sent to the classifier with a local context
//! window (the previous paragraph's atoms plus the earlier atoms of the
//! current paragraph). Chapters fan out over a bounded pool; within a
//! chapter, chapter-level paragraphs run sequentially to keep their context
//! chain while subsections fan out over their own bounded pool.

pub mod progress;
pub mod prune;

use crate::classifier::{AtomClassifier, AtomRef, ProposedRelationship};
use crate::config::ConcurrencyConfig;
use crate::document::{Chapter, Document, Paragraph, Subsection};
use crate::error::{Error, Result};
use crate::ontology::Ontology;
use progress::{Progress, ProgressTracker, Status};
use rayon::prelude::*;
use serde::Serialize;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

/// Cooperative cancellation flag, observed at chapter boundaries. In-flight
/// classifier calls run to completion or their retry cap.
#[derive(Clone, Debug, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// A classified atom, carrying its proposed relationships.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AnnotatedAtom {
    /// `chap{C}_par{P}_atom{N}` or `chap{C}_sec{S}_par{P}_atom{N}`.
    pub id: String,
    /// The atom id minus its `_atom{N}` suffix; the key the persistence
    /// collaborator's paragraph map uses.
    pub paragraph_id: String,
    pub chapter_title: String,
    pub section_id: Option<usize>,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    pub classification: String,
    pub relationships: Vec<ProposedRelationship>,
}

/// A directed, validated edge in canonical outgoing form.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidatedRelationship {
    pub source_atom_id: String,
    pub target_atom_id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub justification: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Graph {
    pub document_title: String,
    pub atoms: Vec<AnnotatedAtom>,
    pub relationships: Vec<ValidatedRelationship>,
}

/// Structured run report per the error-handling contract.
#[derive(Clone, Copy, Debug, Default, Serialize)]
pub struct GraphReport {
    pub total_atoms: usize,
    pub processed_atoms: usize,
    pub dropped_atoms: usize,
    pub dropped_relationships: usize,
    pub deduplicated_relationships: usize,
    pub unlinked_notes: usize,
    pub unlinked_citations: usize,
}

pub struct GraphConstructor<'a> {
    document: &'a Document,
    classifier: &'a dyn AtomClassifier,
    ontology: &'a Ontology,
    concurrency: ConcurrencyConfig,
    progress: Arc<ProgressTracker>,
    cancel: CancelToken,
}

impl<'a> GraphConstructor<'a> {
    pub fn new(
        document: &'a Document,
        classifier: &'a dyn AtomClassifier,
        ontology: &'a Ontology,
        concurrency: ConcurrencyConfig,
    ) -> Self {
        Self {
            document,
            classifier,
            ontology,
            concurrency,
            progress: Arc::new(ProgressTracker::default()),
            cancel: CancelToken::new(),
        }
    }

    /// Shared handle for progress queries from other threads.
    pub fn progress_tracker(&self) -> Arc<ProgressTracker> {
        self.progress.clone()
    }

    pub fn progress(&self) -> Progress {
        self.progress.snapshot()
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Classify every atom, then prune against the ontology.
    ///
    /// On any fatal error (cancellation, classifier auth rejection) the
    /// status becomes `Error` and no partial graph is returned.
    pub fn build(&self) -> Result<(Graph, GraphReport)> {
        let title = self
            .document
            .title
            .clone()
            .unwrap_or_else(|| "Untitled Document".to_string());
        let total_atoms = count_atoms(self.document);
        self.progress.begin(total_atoms);
        info!(title = %title, total_atoms, chapters = self.document.chapters.len(), "building graph");

        let chapter_count = self.document.chapters.len();
        let atoms = match self.classify_chapters(chapter_count) {
            Ok(atoms) => atoms,
            Err(err) => {
                self.progress.set_status(Status::Error);
                return Err(err);
            }
        };

        self.progress.set_status(Status::Filtering);
        let raw = Graph {
            document_title: title,
            atoms,
            relationships: Vec::new(),
        };
        let (graph, stats) = prune::prune_by_ontology(raw, self.ontology);

        let report = GraphReport {
            total_atoms,
            processed_atoms: self.progress.snapshot().processed_atoms,
            dropped_atoms: stats.dropped_atoms,
            dropped_relationships: stats.dropped_relationships,
            deduplicated_relationships: stats.deduplicated_relationships,
            unlinked_notes: self
                .document
                .linked_notes
                .get("Unlinked Notes")
                .map(Vec::len)
                .unwrap_or(0),
            unlinked_citations: self.document.bibliography.unlinked_citations.len(),
        };

        let status = if report.dropped_atoms > 0 || report.dropped_relationships > 0 {
            Status::CompleteWithWarnings
        } else {
            Status::Complete
        };
        self.progress.set_status(status);
        info!(
            atoms = graph.atoms.len(),
            relationships = graph.relationships.len(),
            "graph construction complete"
        );
        Ok((graph, report))
    }

    fn classify_chapters(&self, chapter_count: usize) -> Result<Vec<AnnotatedAtom>> {
        if chapter_count == 0 {
            return Ok(Vec::new());
        }
        let workers = chapter_count.min(self.concurrency.chapter_workers).max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(workers)
            .build()
            .map_err(|err| Error::ThreadPool(err.to_string()))?;

        let per_chapter: Result<Vec<Vec<AnnotatedAtom>>> = pool.install(|| {
            self.document
                .chapters
                .par_iter()
                .enumerate()
                .map(|(index, chapter)| self.process_chapter(index, chapter))
                .collect()
        });
        Ok(per_chapter?.into_iter().flatten().collect())
    }

    fn process_chapter(&self, index: usize, chapter: &Chapter) -> Result<Vec<AnnotatedAtom>> {
        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        debug!(chapter = %chapter.title, "processing chapter");

        let mut annotated = Vec::new();

        // Chapter-level paragraphs are sequential so each sees the previous
        // paragraph's atoms as context.
        let mut prior_paragraph: Vec<AtomRef> = Vec::new();
        for paragraph in &chapter.paragraphs {
            prior_paragraph = self.process_paragraph(
                index,
                chapter,
                None,
                paragraph,
                &prior_paragraph,
                &mut annotated,
            )?;
        }

        // Subsections are independent sequences and fan out.
        let subsections: Vec<&Subsection> = chapter
            .subsections
            .iter()
            .filter(|s| s.title != "Notes")
            .collect();
        if !subsections.is_empty() {
            let workers = subsections.len().min(self.concurrency.subsection_workers).max(1);
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(workers)
                .build()
                .map_err(|err| Error::ThreadPool(err.to_string()))?;
            let per_subsection: Result<Vec<Vec<AnnotatedAtom>>> = pool.install(|| {
                subsections
                    .par_iter()
                    .map(|subsection| self.process_subsection(index, chapter, subsection))
                    .collect()
            });
            for batch in per_subsection? {
                annotated.extend(batch);
            }
        }

        Ok(annotated)
    }

    fn process_subsection(
        &self,
        chapter_index: usize,
        chapter: &Chapter,
        subsection: &Subsection,
    ) -> Result<Vec<AnnotatedAtom>> {
        let mut annotated = Vec::new();
        let mut prior_paragraph: Vec<AtomRef> = Vec::new();
        for paragraph in &subsection.paragraphs {
            prior_paragraph = self.process_paragraph(
                chapter_index,
                chapter,
                Some(subsection.id),
                paragraph,
                &prior_paragraph,
                &mut annotated,
            )?;
        }
        Ok(annotated)
    }

    /// Classify one paragraph's atoms in reading order. Returns the atom
    /// refs of this paragraph, which become the next paragraph's context.
    fn process_paragraph(
        &self,
        chapter_index: usize,
        chapter: &Chapter,
        section_id: Option<usize>,
        paragraph: &Paragraph,
        prior_paragraph: &[AtomRef],
        annotated: &mut Vec<AnnotatedAtom>,
    ) -> Result<Vec<AtomRef>> {
        let paragraph_key = match section_id {
            Some(section) => format!("chap{chapter_index}_sec{section}_par{}", paragraph.id),
            None => format!("chap{chapter_index}_par{}", paragraph.id),
        };

        let mut current: Vec<AtomRef> = Vec::new();
        for atom in &paragraph.atoms {
            let target = AtomRef {
                id: format!("{paragraph_key}_atom{}", atom.id),
                text: atom.text.clone(),
            };
            let context: Vec<AtomRef> = prior_paragraph
                .iter()
                .chain(current.iter())
                .cloned()
                .collect();

            let analysis = self.classifier.process_atom(&target, &context)?;
            annotated.push(AnnotatedAtom {
                id: target.id.clone(),
                paragraph_id: paragraph_key.clone(),
                chapter_title: chapter.title.clone(),
                section_id,
                text: atom.text.clone(),
                start_offset: atom.start_offset,
                end_offset: atom.end_offset,
                classification: analysis.classification,
                relationships: analysis.relationships,
            });
            current.push(target);
            self.progress.record_atom();
        }
        Ok(current)
    }
}

/// Atoms the constructor will classify: chapter-level paragraphs plus every
/// subsection not titled `Notes`.
fn count_atoms(document: &Document) -> usize {
    document
        .chapters
        .iter()
        .map(|chapter| {
            let direct: usize = chapter.paragraphs.iter().map(|p| p.atoms.len()).sum();
            let subs: usize = chapter
                .subsections
                .iter()
                .filter(|s| s.title != "Notes")
                .flat_map(|s| s.paragraphs.iter())
                .map(|p| p.atoms.len())
                .sum();
            direct + subs
        })
        .sum()
}
