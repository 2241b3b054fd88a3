use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use super::TextRecognizer;
use crate::config::VisionConfig;

/// Client for an `images:annotate` text detection endpoint
pub struct VisionClient {
    endpoint: String,
    api_key: Option<String>,
    timeout: Duration,
}

#[derive(Serialize)]
struct AnnotateRequest<'a> {
    requests: Vec<ImageRequest<'a>>,
}

#[derive(Serialize)]
struct ImageRequest<'a> {
    image: ImageContent,
    features: Vec<Feature<'a>>,
}

#[derive(Serialize)]
struct ImageContent {
    content: String,
}

#[derive(Serialize)]
struct Feature<'a> {
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Deserialize)]
struct AnnotateResponse {
    #[serde(default)]
    responses: Vec<ImageResponse>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ImageResponse {
    full_text_annotation: Option<TextAnnotation>,
    error: Option<ApiError>,
}

#[derive(Deserialize)]
struct TextAnnotation {
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
}

impl VisionClient {
    /// Build a client; the API key is read from the environment variable
    /// named in the config
    pub fn new(config: &VisionConfig) -> Self {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .map(|key| key.trim().to_string())
            .filter(|key| !key.is_empty());

        if api_key.is_none() {
            log::warn!(
                "No vision API key in ${}; text recognition is unavailable",
                config.api_key_env
            );
        }

        Self {
            endpoint: config.endpoint.clone(),
            api_key,
            timeout: Duration::from_secs(config.timeout_secs),
        }
    }

    /// Check if the client has an API key
    pub fn is_available(&self) -> bool {
        self.api_key.is_some()
    }

    /// Run text detection on the image at `image_ref` (a path or `file://` URI)
    pub fn detect_text(&self, image_ref: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .context("vision API key not configured")?;

        let path = Path::new(image_ref.strip_prefix("file://").unwrap_or(image_ref));
        let image = fs::read(path)
            .with_context(|| format!("failed to read image {}", path.display()))?;

        let body = build_request_body(&image)?;

        log::debug!(
            "Calling vision API at {} for {} ({} bytes)",
            self.endpoint,
            image_ref,
            image.len()
        );

        let response = ureq::post(&self.endpoint)
            .query("key", api_key)
            .set("Content-Type", "application/json")
            .timeout(self.timeout)
            .send_string(&body)
            .context("failed to call vision API")?;

        let response_text = response
            .into_string()
            .context("failed to read vision API response")?;

        parse_response(&response_text)
    }
}

impl TextRecognizer for VisionClient {
    fn recognize(&self, image_ref: &str) -> Result<String> {
        self.detect_text(image_ref)
    }
}

fn build_request_body(image: &[u8]) -> Result<String> {
    let request = AnnotateRequest {
        requests: vec![ImageRequest {
            image: ImageContent {
                content: STANDARD.encode(image),
            },
            features: vec![Feature {
                kind: "TEXT_DETECTION",
            }],
        }],
    };
    serde_json::to_string(&request).context("failed to serialize vision request")
}

/// Extract the detected text. A response without any annotation means the
/// image had no text and yields an empty string.
fn parse_response(body: &str) -> Result<String> {
    let parsed: AnnotateResponse =
        serde_json::from_str(body).context("failed to parse vision API response")?;

    let Some(first) = parsed.responses.into_iter().next() else {
        return Ok(String::new());
    };

    if let Some(error) = first.error {
        anyhow::bail!("vision API error: {}", error.message);
    }

    Ok(first
        .full_text_annotation
        .map(|annotation| annotation.text)
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_request_body() {
        let body = build_request_body(b"abc").unwrap();
        let value: serde_json::Value = serde_json::from_str(&body).unwrap();
        assert_eq!(value["requests"][0]["image"]["content"], "YWJj");
        assert_eq!(value["requests"][0]["features"][0]["type"], "TEXT_DETECTION");
    }

    #[test]
    fn test_parse_response_with_text() {
        let body = r#"{"responses": [{"fullTextAnnotation": {"text": "Sugar, E621\n"}}]}"#;
        assert_eq!(parse_response(body).unwrap(), "Sugar, E621\n");
    }

    #[test]
    fn test_parse_response_without_annotation() {
        assert_eq!(parse_response(r#"{"responses": [{}]}"#).unwrap(), "");
        assert_eq!(parse_response(r#"{"responses": []}"#).unwrap(), "");
        assert_eq!(parse_response("{}").unwrap(), "");
    }

    #[test]
    fn test_parse_response_error() {
        let body = r#"{"responses": [{"error": {"code": 3, "message": "Bad image data."}}]}"#;
        let err = parse_response(body).unwrap_err();
        assert!(err.to_string().contains("Bad image data."));
    }

    #[test]
    fn test_parse_response_garbage() {
        assert!(parse_response("<html>").is_err());
    }

    #[test]
    fn test_missing_key_is_a_failure() {
        let config = VisionConfig {
            api_key_env: "LABELSCAN_TEST_UNSET_VISION_KEY".to_string(),
            ..VisionConfig::default()
        };
        let client = VisionClient::new(&config);
        assert!(!client.is_available());
        assert!(client.recognize("missing.jpg").is_err());
    }

    #[test]
    fn test_missing_image_is_a_failure() {
        let client = VisionClient {
            endpoint: "http://127.0.0.1:9/v1/images:annotate".to_string(),
            api_key: Some("key".to_string()),
            timeout: Duration::from_secs(1),
        };
        let err = client.detect_text("file:///nonexistent/label.jpg").unwrap_err();
        assert!(err.to_string().contains("failed to read image"));
    }
}
