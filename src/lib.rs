//! Ingredient label scanning.
//!
//! Recognized label text is matched against an additive knowledge base and
//! every scan is kept in a local, newest-first history.

pub mod config;
pub mod error;
pub mod history;
pub mod knowledge;
pub mod recognition;
pub mod scan;

pub use error::{KnowledgeError, PersistenceError};
pub use scan::{ScanOutcome, ScanPipeline, ScanReport};
