use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

/// How risky an ingredient is considered to be
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Caution,
    Harmful,
}

impl RiskLevel {
    pub fn label(self) -> &'static str {
        match self {
            Self::Safe => "Safe",
            Self::Caution => "Caution",
            Self::Harmful => "Harmful",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Dietary permissibility of an ingredient
#[derive(Clone, Copy, Debug, Serialize, Deserialize, Eq, PartialEq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum EthicalStatus {
    Permitted,
    Questionable,
    Forbidden,
}

impl EthicalStatus {
    pub fn label(self) -> &'static str {
        match self {
            Self::Permitted => "Permitted",
            Self::Questionable => "Questionable",
            Self::Forbidden => "Forbidden",
        }
    }
}

impl fmt::Display for EthicalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// A single knowledge base entry
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct IngredientRecord {
    /// Additive code (e.g., "E621") or ingredient name (e.g., "Sugar")
    pub identifier: String,
    pub risk: RiskLevel,
    /// Permissibility, when the source data states one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<EthicalStatus>,
    /// Human-readable explanation shown to the user
    pub description: String,
}

/// An ingredient found in scanned text
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct MatchResult {
    pub identifier: String,
    pub risk: RiskLevel,
    pub status: Option<EthicalStatus>,
    pub description: String,
}

impl From<&IngredientRecord> for MatchResult {
    fn from(record: &IngredientRecord) -> Self {
        Self {
            identifier: record.identifier.clone(),
            risk: record.risk,
            status: record.status,
            description: record.description.clone(),
        }
    }
}

/// The immutable ingredient knowledge base.
///
/// Entries keep the order they were defined in. That order is the order
/// classification results are reported in, so it is part of the contract
/// rather than an accident of the container.
#[derive(Clone, Debug, Default)]
pub struct KnowledgeBase {
    entries: Vec<IngredientRecord>,
    /// Case-folded identifiers, parallel to `entries`
    folded: Vec<String>,
    /// Case-folded identifier -> position in `entries`
    index: HashMap<String, usize>,
}

impl KnowledgeBase {
    /// Build from entries already validated by the loader
    pub(crate) fn from_validated(entries: Vec<IngredientRecord>) -> Self {
        let folded: Vec<String> = entries.iter().map(|e| fold_key(&e.identifier)).collect();
        let index = folded
            .iter()
            .enumerate()
            .map(|(i, key)| (key.clone(), i))
            .collect();
        Self {
            entries,
            folded,
            index,
        }
    }

    /// Entries in definition order
    pub fn entries(&self) -> &[IngredientRecord] {
        &self.entries
    }

    /// Entries in definition order, each paired with its case-folded identifier
    pub fn iter_folded(&self) -> impl Iterator<Item = (&IngredientRecord, &str)> {
        self.entries
            .iter()
            .zip(self.folded.iter().map(String::as_str))
    }

    /// Case-insensitive lookup by identifier
    pub fn lookup(&self, identifier: &str) -> Option<&IngredientRecord> {
        self.index
            .get(&fold_key(identifier))
            .map(|&i| &self.entries[i])
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Simple case folding used for both keys and scanned text.
///
/// No diacritic or locale-specific normalization is applied, so e.g. a
/// Turkish dotted capital I folds the Unicode way, not the Turkish way.
pub fn fold_key(s: &str) -> String {
    s.to_lowercase()
}
