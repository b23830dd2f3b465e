//! Turn an OCR'd scholarly monograph into a typed knowledge graph.
//!
//! The pipeline: raw text is normalized, the structural parser lifts it
//! into a document tree with sentence/citation atoms and cross-cutting
//! artefacts (notes, footnotes, bibliography, citations), and the graph
//! constructor classifies every atom through an external classifier, then
//! prunes the result against a declarative ontology.

pub mod cite;
pub mod classifier;
pub mod config;
pub mod document;
pub mod error;
pub mod graph;
pub mod handoff;
pub mod normalize;
pub mod ontology;
pub mod parse;
pub mod patterns;
pub mod sentence;

pub use config::Config;
pub use document::Document;
pub use error::{Error, Result};
pub use ontology::Ontology;
pub use parse::{Parser, ParserOptions};
