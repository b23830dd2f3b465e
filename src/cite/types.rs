use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A parenthetical citation found in running text, e.g.
/// `(Williamson 2007a: 99-105)`. Offsets cover the whole parenthetical.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InTextCitation {
    /// Lower-cased last name.
    pub author: String,
    /// Year with optional disambiguator, or `forthcoming`.
    pub year: String,
    pub page_info: Option<String>,
    pub full_text: String,
    pub start_offset: usize,
    pub end_offset: usize,
}

impl InTextCitation {
    /// Join key against the bibliography.
    pub fn key(&self) -> String {
        format!("{}_{}", self.author, self.year)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BibliographyEntry {
    /// `lowercase_last_name_year`.
    pub key: String,
    pub author: String,
    pub year: String,
    pub full_text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    /// Citations resolved to this entry.
    pub citations: Vec<InTextCitation>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bibliography {
    pub entries: BTreeMap<String, BibliographyEntry>,
    /// Citations whose key matched no entry.
    pub unlinked_citations: Vec<InTextCitation>,
}
