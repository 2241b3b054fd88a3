pub mod vision;

pub use vision::VisionClient;

/// Turns an image reference into the text printed on it.
///
/// An `Err` means recognition failed outright. An empty `Ok` means the
/// service ran but found no text.
pub trait TextRecognizer {
    fn recognize(&self, image_ref: &str) -> anyhow::Result<String>;
}

impl<F> TextRecognizer for F
where
    F: Fn(&str) -> anyhow::Result<String>,
{
    fn recognize(&self, image_ref: &str) -> anyhow::Result<String> {
        self(image_ref)
    }
}

/// Join per-line recognizer output into one text, as on-device OCR returns lines
pub fn join_recognized_lines<S: AsRef<str>>(lines: &[S]) -> String {
    lines
        .iter()
        .map(AsRef::as_ref)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Adapts a recognizer that reports one string per detected line, the way
/// on-device OCR does, into a [`TextRecognizer`]
pub struct LineRecognizer<F> {
    recognize_lines: F,
}

impl<F> LineRecognizer<F>
where
    F: Fn(&str) -> anyhow::Result<Vec<String>>,
{
    pub fn new(recognize_lines: F) -> Self {
        Self { recognize_lines }
    }
}

impl<F> TextRecognizer for LineRecognizer<F>
where
    F: Fn(&str) -> anyhow::Result<Vec<String>>,
{
    fn recognize(&self, image_ref: &str) -> anyhow::Result<String> {
        let lines = (self.recognize_lines)(image_ref)?;
        log::debug!("Recognizer returned {} lines for {}", lines.len(), image_ref);
        Ok(join_recognized_lines(&lines))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closure_recognizer() {
        let recognizer = |uri: &str| -> anyhow::Result<String> { Ok(format!("text of {}", uri)) };
        assert_eq!(recognizer.recognize("a.jpg").unwrap(), "text of a.jpg");
    }

    #[test]
    fn test_join_recognized_lines() {
        assert_eq!(
            join_recognized_lines(&["Ingredients: sugar,", "E621"]),
            "Ingredients: sugar, E621"
        );
        assert_eq!(join_recognized_lines::<&str>(&[]), "");
    }

    #[test]
    fn test_line_recognizer_joins_lines() {
        let recognizer = LineRecognizer::new(|_: &str| {
            Ok(vec!["Ingredients: sugar,".to_string(), "E621".to_string()])
        });
        assert_eq!(
            recognizer.recognize("a.jpg").unwrap(),
            "Ingredients: sugar, E621"
        );
    }

    #[test]
    fn test_line_recognizer_no_lines_is_empty_text() {
        let recognizer = LineRecognizer::new(|_: &str| Ok(Vec::new()));
        assert_eq!(recognizer.recognize("a.jpg").unwrap(), "");
    }

    #[test]
    fn test_line_recognizer_propagates_failure() {
        let recognizer = LineRecognizer::new(|_: &str| -> anyhow::Result<Vec<String>> {
            anyhow::bail!("camera busy")
        });
        let err = recognizer.recognize("a.jpg").unwrap_err();
        assert_eq!(err.to_string(), "camera busy");
    }
}
