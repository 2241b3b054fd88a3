//! The scan flow: recognize text on an image, classify it against the
//! knowledge base, and record the result in history.

use std::fmt::Write;
use std::sync::Arc;

use crate::config::{ScanPolicy, DEFAULT_TIMESTAMP_FORMAT};
use crate::error::PersistenceError;
use crate::history::{HistoryStore, KeyValueStore, ScanRecord};
use crate::knowledge::{classify, render_matches, KnowledgeBase, MatchResult};
use crate::recognition::TextRecognizer;

/// What a single scan produced
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ScanOutcome {
    /// Known ingredients were found, in knowledge base order
    Findings(Vec<MatchResult>),
    /// Text was recognized but contains no known ingredient
    NoFindings,
    /// The recognizer ran but returned no text
    NoTextDetected,
    /// The recognizer failed
    RecognitionFailed { reason: String },
}

impl ScanOutcome {
    /// Message shown to the user for this outcome
    pub fn message(&self) -> String {
        match self {
            Self::Findings(matches) => render_matches(matches),
            Self::NoFindings => "No known additives or ingredients of concern found.".to_string(),
            Self::NoTextDetected => "No text was found in the image.".to_string(),
            Self::RecognitionFailed { .. } => {
                "Text recognition failed. Please try again.".to_string()
            }
        }
    }

    /// Analysis text stored in history for this outcome.
    ///
    /// Only a scan that recognized no text stores an empty string, so every
    /// other outcome stays distinguishable in the log.
    pub fn history_text(&self) -> String {
        match self {
            Self::Findings(matches) => render_matches(matches),
            Self::NoFindings => self.message(),
            Self::NoTextDetected => String::new(),
            Self::RecognitionFailed { reason } => format!("Text recognition failed: {}", reason),
        }
    }
}

/// Result of [`ScanPipeline::scan`]
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScanReport {
    pub outcome: ScanOutcome,
    /// The history record written for this scan, if policy allowed one
    pub record: Option<ScanRecord>,
}

/// Runs scans end to end
pub struct ScanPipeline<R, S>
where
    R: TextRecognizer,
    S: KeyValueStore,
{
    kb: Arc<KnowledgeBase>,
    history: Arc<HistoryStore<S>>,
    recognizer: R,
    policy: ScanPolicy,
    timestamp_format: String,
}

impl<R, S> ScanPipeline<R, S>
where
    R: TextRecognizer,
    S: KeyValueStore,
{
    pub fn new(kb: Arc<KnowledgeBase>, history: Arc<HistoryStore<S>>, recognizer: R) -> Self {
        Self {
            kb,
            history,
            recognizer,
            policy: ScanPolicy::default(),
            timestamp_format: DEFAULT_TIMESTAMP_FORMAT.to_string(),
        }
    }

    pub fn with_policy(mut self, policy: ScanPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_timestamp_format(mut self, format: &str) -> Self {
        self.timestamp_format = format.to_string();
        self
    }

    pub fn history(&self) -> &HistoryStore<S> {
        &self.history
    }

    /// Scan the image behind `image_ref`.
    ///
    /// The recognizer is called exactly once. Recognition problems are part
    /// of the outcome; only a failed history write is an error.
    pub fn scan(&self, image_ref: &str) -> Result<ScanReport, PersistenceError> {
        let outcome = match self.recognizer.recognize(image_ref) {
            Ok(text) if text.trim().is_empty() => {
                log::info!("No text detected in {}", image_ref);
                ScanOutcome::NoTextDetected
            }
            Ok(text) => {
                let matches = classify(&text, &self.kb);
                log::info!("Scan of {} matched {} ingredients", image_ref, matches.len());
                if matches.is_empty() {
                    ScanOutcome::NoFindings
                } else {
                    ScanOutcome::Findings(matches)
                }
            }
            Err(e) => {
                log::warn!("Text recognition failed for {}: {:#}", image_ref, e);
                ScanOutcome::RecognitionFailed {
                    reason: format!("{:#}", e),
                }
            }
        };

        let record = if self.should_persist(&outcome) {
            let record = ScanRecord::new(image_ref, &outcome.history_text(), &self.now());
            self.history.append(record.clone())?;
            Some(record)
        } else {
            log::debug!("Not recording scan of {} in history", image_ref);
            None
        };

        Ok(ScanReport { outcome, record })
    }

    fn should_persist(&self, outcome: &ScanOutcome) -> bool {
        match outcome {
            ScanOutcome::Findings(_) => true,
            ScanOutcome::NoFindings => self.policy.persist_no_findings,
            ScanOutcome::NoTextDetected => self.policy.persist_empty_text,
            ScanOutcome::RecognitionFailed { .. } => self.policy.record_recognition_failures,
        }
    }

    fn now(&self) -> String {
        let now = chrono::Local::now();
        let mut formatted = String::new();
        if write!(formatted, "{}", now.format(&self.timestamp_format)).is_err() {
            log::warn!(
                "Invalid timestamp format '{}', using {}",
                self.timestamp_format,
                DEFAULT_TIMESTAMP_FORMAT
            );
            formatted = now.format(DEFAULT_TIMESTAMP_FORMAT).to_string();
        }
        formatted
    }
}
