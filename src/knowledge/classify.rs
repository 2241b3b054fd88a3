//! Ingredient classification against the knowledge base.
//!
//! Matching is plain case-insensitive substring containment: an identifier
//! found anywhere in the text counts, even inside a longer unrelated word.

use super::types::{fold_key, KnowledgeBase, MatchResult};

/// Find every knowledge base entry whose identifier occurs in `text`.
///
/// Results come back in knowledge base order, independent of where in the
/// text each identifier appears. Empty text and text without any known
/// ingredient both yield an empty vector.
pub fn classify(text: &str, kb: &KnowledgeBase) -> Vec<MatchResult> {
    if text.is_empty() {
        return Vec::new();
    }

    let folded_text = fold_key(text);

    kb.iter_folded()
        .filter(|(_, key)| folded_text.contains(*key))
        .map(|(record, _)| MatchResult::from(record))
        .collect()
}

impl MatchResult {
    /// Render as a display block: identifier, risk, status (if any) and
    /// description, one per line.
    pub fn render(&self) -> String {
        let mut lines = vec![display_identifier(&self.identifier)];
        lines.push(format!("Risk: {}", self.risk));
        if let Some(status) = self.status {
            lines.push(format!("Status: {}", status));
        }
        lines.push(format!("Description: {}", self.description));
        lines.join("\n")
    }
}

/// Render all matches as blocks separated by a blank line
pub fn render_matches(matches: &[MatchResult]) -> String {
    matches
        .iter()
        .map(MatchResult::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Additive codes are shown uppercased; ingredient names keep their casing
pub fn display_identifier(identifier: &str) -> String {
    if is_additive_code(identifier) {
        identifier.to_uppercase()
    } else {
        identifier.to_string()
    }
}

/// "E" followed by three or four digits and an optional letter suffix
/// (E621, E150d, E1422)
fn is_additive_code(identifier: &str) -> bool {
    let Some(rest) = identifier
        .strip_prefix('E')
        .or_else(|| identifier.strip_prefix('e'))
    else {
        return false;
    };

    let digits = rest.chars().take_while(|c| c.is_ascii_digit()).count();
    let suffix = &rest[digits..];

    (3..=4).contains(&digits)
        && (suffix.is_empty()
            || (suffix.len() == 1 && suffix.chars().all(|c| c.is_ascii_alphabetic())))
}
