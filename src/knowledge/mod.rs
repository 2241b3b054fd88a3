pub mod types;
pub mod loader;
pub mod builtin;
pub mod classify;

// Re-export commonly used items
pub use types::{EthicalStatus, IngredientRecord, KnowledgeBase, MatchResult, RiskLevel};
pub use loader::{load_entries, load_from_file, load_knowledge_base, RawIngredient};
pub use classify::{classify, display_identifier, render_matches};
