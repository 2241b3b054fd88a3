use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;

use super::builtin::builtin_entries;
use super::types::{fold_key, EthicalStatus, IngredientRecord, KnowledgeBase, RiskLevel};
use crate::error::KnowledgeError;

/// An unvalidated knowledge base entry as it appears in source data.
///
/// Every field is optional here so that a missing field is reported as a
/// malformed entry with its position instead of a bare parse failure.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RawIngredient {
    #[serde(default)]
    pub identifier: Option<String>,
    #[serde(default)]
    pub risk: Option<RiskLevel>,
    #[serde(default)]
    pub status: Option<EthicalStatus>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Load the knowledge base: from `path` when given, otherwise the builtin table
pub fn load_knowledge_base(path: Option<&Path>) -> Result<KnowledgeBase, KnowledgeError> {
    let kb = match path {
        Some(path) => load_from_file(path)?,
        None => load_entries(builtin_entries())?,
    };

    log::info!(
        "Loaded knowledge base with {} entries ({})",
        kb.len(),
        path.map(|p| p.display().to_string())
            .unwrap_or_else(|| "builtin".to_string())
    );

    Ok(kb)
}

/// Load a knowledge base from a JSON array of entries.
///
/// Array order becomes the knowledge base order.
pub fn load_from_file(path: &Path) -> Result<KnowledgeBase, KnowledgeError> {
    let content = fs::read_to_string(path).map_err(|source| KnowledgeError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let raw: Vec<RawIngredient> =
        serde_json::from_str(&content).map_err(|source| KnowledgeError::Parse {
            path: path.display().to_string(),
            source,
        })?;
    load_entries(raw)
}

/// Validate raw entries and build the knowledge base.
///
/// Rejects entries with a missing or blank identifier, a missing risk level,
/// a missing or blank description, or an identifier that equals an earlier one after
/// case folding.
pub fn load_entries(raw: Vec<RawIngredient>) -> Result<KnowledgeBase, KnowledgeError> {
    let mut seen: HashMap<String, usize> = HashMap::with_capacity(raw.len());
    let mut entries = Vec::with_capacity(raw.len());

    for (index, entry) in raw.into_iter().enumerate() {
        let identifier = entry
            .identifier
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| KnowledgeError::malformed(index, "missing identifier"))?;

        let risk = entry.risk.ok_or_else(|| {
            KnowledgeError::malformed(index, format!("'{}' has no risk level", identifier))
        })?;

        let description = entry
            .description
            .filter(|d| !d.trim().is_empty())
            .ok_or_else(|| {
                KnowledgeError::malformed(index, format!("'{}' has no description", identifier))
            })?;

        let key = fold_key(&identifier);
        if let Some(&first) = seen.get(&key) {
            return Err(KnowledgeError::malformed(
                index,
                format!(
                    "'{}' collides with entry #{} (identifiers are case-insensitive)",
                    identifier, first
                ),
            ));
        }
        seen.insert(key, index);

        entries.push(IngredientRecord {
            identifier,
            risk,
            status: entry.status,
            description,
        });
    }

    Ok(KnowledgeBase::from_validated(entries))
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;

    fn raw(identifier: &str, risk: RiskLevel, description: &str) -> RawIngredient {
        RawIngredient {
            identifier: Some(identifier.to_string()),
            risk: Some(risk),
            status: None,
            description: Some(description.to_string()),
        }
    }

    #[test]
    fn test_load_preserves_order() {
        let kb = load_entries(vec![
            raw("Sugar", RiskLevel::Caution, "sweet"),
            raw("E621", RiskLevel::Harmful, "MSG"),
        ])
        .unwrap();
        assert_eq!(kb.entries()[0].identifier, "Sugar");
        assert_eq!(kb.entries()[1].identifier, "E621");
    }

    #[test]
    fn test_case_insensitive_collision_is_rejected() {
        let err = load_entries(vec![
            raw("E621", RiskLevel::Harmful, "MSG"),
            raw("e621", RiskLevel::Safe, "duplicate"),
        ])
        .unwrap_err();
        match err {
            KnowledgeError::MalformedEntry { index, reason } => {
                assert_eq!(index, 1);
                assert!(reason.contains("#0"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_missing_fields_are_rejected() {
        let mut no_risk = raw("E330", RiskLevel::Safe, "citric acid");
        no_risk.risk = None;
        assert!(matches!(
            load_entries(vec![no_risk]),
            Err(KnowledgeError::MalformedEntry { index: 0, .. })
        ));

        let mut no_description = raw("E330", RiskLevel::Safe, "citric acid");
        no_description.description = None;
        assert!(matches!(
            load_entries(vec![raw("Sugar", RiskLevel::Caution, "sweet"), no_description]),
            Err(KnowledgeError::MalformedEntry { index: 1, .. })
        ));

        let blank = raw("   ", RiskLevel::Safe, "nothing");
        assert!(matches!(
            load_entries(vec![blank]),
            Err(KnowledgeError::MalformedEntry { index: 0, .. })
        ));
    }

    #[test]
    fn test_blank_description_is_rejected() {
        for description in ["", "  \n\t"] {
            let err = load_entries(vec![
                raw("E330", RiskLevel::Safe, "citric acid"),
                raw("E621", RiskLevel::Harmful, description),
            ])
            .unwrap_err();
            match err {
                KnowledgeError::MalformedEntry { index, reason } => {
                    assert_eq!(index, 1);
                    assert!(reason.contains("E621"));
                }
                other => panic!("unexpected error: {other}"),
            }
        }
    }

    #[test]
    fn test_diacritics_are_not_normalized() {
        // "Şeker" and "Seker" are distinct keys
        let kb = load_entries(vec![
            raw("Şeker", RiskLevel::Caution, "sugar"),
            raw("Seker", RiskLevel::Caution, "not sugar"),
        ])
        .unwrap();
        assert_eq!(kb.len(), 2);
        assert!(kb.lookup("şEKER").is_some());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"[
                {{"identifier": "E951", "risk": "harmful", "description": "Aspartame"}},
                {{"identifier": "E441", "risk": "safe", "status": "forbidden", "description": "Gelatine"}}
            ]"#
        )
        .unwrap();

        let kb = load_knowledge_base(Some(file.path())).unwrap();
        assert_eq!(kb.len(), 2);
        assert_eq!(
            kb.lookup("e441").and_then(|r| r.status),
            Some(EthicalStatus::Forbidden)
        );
    }

    #[test]
    fn test_load_from_file_missing_description() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"[{{"identifier": "E951", "risk": "harmful"}}]"#).unwrap();
        assert!(matches!(
            load_from_file(file.path()),
            Err(KnowledgeError::MalformedEntry { index: 0, .. })
        ));
    }

    #[test]
    fn test_load_from_file_not_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "E621,harmful,MSG").unwrap();
        assert!(matches!(
            load_from_file(file.path()),
            Err(KnowledgeError::Parse { .. })
        ));
    }
}
