use serde::{Deserialize, Serialize};

/// One persisted scan.
///
/// Serialized field names (`uri`, `text`, `date`) match the layout already
/// stored on devices. Records written before timestamps existed have no
/// `date` and load with an empty one.
#[derive(Clone, Debug, Serialize, Deserialize, Eq, PartialEq)]
pub struct ScanRecord {
    /// Opaque handle to the stored or cached image
    #[serde(rename = "uri")]
    pub image_reference: String,
    /// Rendered findings for this scan
    #[serde(rename = "text")]
    pub analysis_text: String,
    /// Capture time formatted for display; never parsed back
    #[serde(rename = "date", default)]
    pub timestamp: String,
}

impl ScanRecord {
    pub fn new(image_reference: &str, analysis_text: &str, timestamp: &str) -> Self {
        Self {
            image_reference: image_reference.to_string(),
            analysis_text: analysis_text.to_string(),
            timestamp: timestamp.to_string(),
        }
    }
}

/// Scan history, newest first
pub type HistoryLog = Vec<ScanRecord>;
