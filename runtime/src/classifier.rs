//! Snapshot classification: turn a post image into a description and an
//! optional category.
//!
//! `OllamaClassifier` sends the PNG to a local vision model through the
//! Ollama `/api/generate` endpoint. `PassthroughClassifier` does no I/O and
//! is used with `--no-classify` and as the fallback description source.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use base64::Engine as _;
use serde::{Deserialize, Serialize};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
pub const DEFAULT_OLLAMA_MODEL: &str = "llava";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// What a classifier says about one snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Review {
    pub description: String,
    pub category: Option<String>,
}

#[async_trait]
pub trait Classifier: Send + Sync {
    fn name(&self) -> &str;

    /// Describe the image and pick one of `categories` (or none).
    async fn review(&self, image_path: &Path, categories: &[String]) -> Result<Review>;
}

/// Description used when no classifier result is available.
pub fn fallback_description(platform: &str, unique_id: &str) -> String {
    format!("{platform} post {unique_id}")
}

/// Describes a snapshot by its file name. No network.
#[derive(Debug, Clone, Copy, Default)]
pub struct PassthroughClassifier;

#[async_trait]
impl Classifier for PassthroughClassifier {
    fn name(&self) -> &str {
        "passthrough"
    }

    async fn review(&self, image_path: &Path, _categories: &[String]) -> Result<Review> {
        let stem = image_path
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .context("snapshot path has no file name")?;
        Ok(Review {
            description: format!("Snapshot {stem}"),
            category: None,
        })
    }
}

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: String,
    images: Vec<String>,
    stream: bool,
    format: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Debug, Deserialize)]
struct ModelVerdict {
    #[serde(default)]
    description: String,
    #[serde(default)]
    category: Option<String>,
}

/// Vision model served by Ollama.
pub struct OllamaClassifier {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClassifier {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            model: model.into(),
        })
    }

    fn prompt(categories: &[String]) -> String {
        let mut prompt = String::from(
            "This image is a screenshot of a single social media post. \
             Describe what the post says or shows in one or two sentences. \
             Reply with JSON: {\"description\": string, \"category\": string or null}.",
        );
        if categories.is_empty() {
            prompt.push_str(" Set category to null.");
        } else {
            prompt.push_str(&format!(
                " Choose category from exactly one of: {}. Use null if none fits.",
                categories.join(", ")
            ));
        }
        prompt
    }
}

/// Match the model's category against the allowed list, ignoring case.
/// With no list, any non-empty answer is kept.
fn normalize_category(raw: Option<String>, categories: &[String]) -> Option<String> {
    let raw = raw?;
    let raw = raw.trim();
    if raw.is_empty() || raw.eq_ignore_ascii_case("null") || raw.eq_ignore_ascii_case("none") {
        return None;
    }
    if categories.is_empty() {
        return Some(raw.to_string());
    }
    categories
        .iter()
        .find(|c| c.eq_ignore_ascii_case(raw))
        .cloned()
}

#[async_trait]
impl Classifier for OllamaClassifier {
    fn name(&self) -> &str {
        &self.model
    }

    async fn review(&self, image_path: &Path, categories: &[String]) -> Result<Review> {
        let bytes = tokio::fs::read(image_path)
            .await
            .with_context(|| format!("failed to read {}", image_path.display()))?;

        let request = GenerateRequest {
            model: &self.model,
            prompt: Self::prompt(categories),
            images: vec![base64::engine::general_purpose::STANDARD.encode(&bytes)],
            stream: false,
            format: "json",
        };

        let resp = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request)
            .send()
            .await
            .context("classifier request failed")?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            bail!("classifier returned {status}: {}", body.trim());
        }

        let generated: GenerateResponse = resp
            .json()
            .await
            .context("classifier returned an unexpected body")?;
        let verdict: ModelVerdict = serde_json::from_str(generated.response.trim())
            .with_context(|| format!("model reply is not JSON: {}", generated.response))?;

        let description = verdict.description.trim().to_string();
        if description.is_empty() {
            bail!("model returned an empty description");
        }
        Ok(Review {
            description,
            category: normalize_category(verdict.category, categories),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn write_png(dir: &Path) -> std::path::PathBuf {
        let img = image::RgbImage::from_pixel(2, 2, image::Rgb([10, 20, 30]));
        let file = dir.join("x_1_42.png");
        img.save(&file).unwrap();
        file
    }

    fn categories() -> Vec<String> {
        vec!["Tech".to_string(), "Sports".to_string()]
    }

    #[test]
    fn test_normalize_category() {
        let cats = categories();
        assert_eq!(normalize_category(Some("tech".into()), &cats).as_deref(), Some("Tech"));
        assert_eq!(normalize_category(Some("Cooking".into()), &cats), None);
        assert_eq!(normalize_category(Some("null".into()), &cats), None);
        assert_eq!(normalize_category(None, &cats), None);
        assert_eq!(normalize_category(Some(" Art ".into()), &[]).as_deref(), Some("Art"));
    }

    #[tokio::test]
    async fn test_passthrough_uses_file_stem() {
        let review = PassthroughClassifier
            .review(Path::new("shots/x/x_3_12345.png"), &categories())
            .await
            .unwrap();
        assert_eq!(review.description, "Snapshot x_3_12345");
        assert_eq!(review.category, None);
    }

    #[tokio::test]
    async fn test_ollama_review() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .and(body_partial_json(serde_json::json!({
                "model": "llava",
                "stream": false,
                "format": "json"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "model": "llava",
                "response": "{\"description\": \"A chart of GPU prices\", \"category\": \"tech\"}",
                "done": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path());
        let classifier = OllamaClassifier::new(server.uri(), "llava").unwrap();
        let review = classifier.review(&image, &categories()).await.unwrap();
        assert_eq!(review.description, "A chart of GPU prices");
        assert_eq!(review.category.as_deref(), Some("Tech"));
    }

    #[tokio::test]
    async fn test_ollama_http_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path());
        let classifier = OllamaClassifier::new(server.uri(), "llava").unwrap();
        let err = classifier.review(&image, &[]).await.unwrap_err();
        assert!(err.to_string().contains("500"));
        assert!(err.to_string().contains("model not loaded"));
    }

    #[tokio::test]
    async fn test_ollama_non_json_reply() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/generate"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "response": "I think this is about sports."
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let image = write_png(dir.path());
        let classifier = OllamaClassifier::new(server.uri(), "llava").unwrap();
        assert!(classifier.review(&image, &categories()).await.is_err());
    }
}
