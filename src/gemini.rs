use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use base64::Engine as _;
use serde_json::Value;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_TEXT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_IMAGE_MODEL: &str = "imagen-4.0-generate-001";

#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub prompt: String,
    /// When present the service must answer with JSON matching this schema.
    pub response_schema: Option<Value>,
    pub temperature: Option<f32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImageRequest {
    pub model: String,
    pub prompt: String,
    pub number_of_images: u32,
    pub aspect_ratio: String,
    pub output_mime_type: String,
}

#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String>;
}

#[async_trait]
pub trait ImageService: Send + Sync {
    /// Raw image payloads; an empty list is a valid answer.
    async fn generate_images(&self, request: &ImageRequest) -> anyhow::Result<Vec<Vec<u8>>>;
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(base_url: &str, api_key: String, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("build http client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_key,
        })
    }

    async fn post_json(&self, endpoint: &str, body: &Value) -> anyhow::Result<Value> {
        let response = self
            .client
            .post(endpoint)
            .header("x-goog-api-key", &self.api_key)
            .json(body)
            .send()
            .await
            .with_context(|| format!("POST {endpoint}"))?;

        let status = response.status();
        let raw = response.text().await.context("read Gemini response body")?;
        if !status.is_success() {
            let message = parse_error_message(&raw).unwrap_or_else(|| raw.clone());
            anyhow::bail!("Gemini API error ({status}): {message}");
        }

        serde_json::from_str(&raw).context("parse Gemini response")
    }
}

pub fn generate_content_endpoint(base_url: &str, model: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/models/{model}:generateContent")
}

pub fn predict_endpoint(base_url: &str, model: &str) -> String {
    let base_url = base_url.trim_end_matches('/');
    format!("{base_url}/models/{model}:predict")
}

#[async_trait]
impl GenerationService for GeminiClient {
    async fn generate(&self, request: &GenerationRequest) -> anyhow::Result<String> {
        let endpoint = generate_content_endpoint(&self.base_url, &request.model);
        let body = generate_content_body(request);
        tracing::debug!(model = %request.model, schema = request.response_schema.is_some(), "generate content");

        let value = self.post_json(&endpoint, &body).await?;
        extract_candidate_text(&value).context("extract candidate text")
    }
}

#[async_trait]
impl ImageService for GeminiClient {
    async fn generate_images(&self, request: &ImageRequest) -> anyhow::Result<Vec<Vec<u8>>> {
        let endpoint = predict_endpoint(&self.base_url, &request.model);
        let body = serde_json::json!({
            "instances": [{ "prompt": request.prompt }],
            "parameters": {
                "sampleCount": request.number_of_images,
                "aspectRatio": request.aspect_ratio,
                "outputMimeType": request.output_mime_type,
            },
        });
        tracing::debug!(model = %request.model, "generate images");

        let value = self.post_json(&endpoint, &body).await?;
        extract_images(&value)
    }
}

fn generate_content_body(request: &GenerationRequest) -> Value {
    let mut generation_config = serde_json::Map::new();
    if let Some(schema) = &request.response_schema {
        generation_config.insert(
            "responseMimeType".to_owned(),
            Value::String("application/json".to_owned()),
        );
        generation_config.insert("responseSchema".to_owned(), schema.clone());
    }
    if let Some(temperature) = request.temperature {
        generation_config.insert("temperature".to_owned(), serde_json::json!(temperature));
    }

    let mut body = serde_json::json!({
        "contents": [
            { "role": "user", "parts": [{ "text": request.prompt }] }
        ],
    });
    if !generation_config.is_empty()
        && let Some(obj) = body.as_object_mut()
    {
        obj.insert(
            "generationConfig".to_owned(),
            Value::Object(generation_config),
        );
    }
    body
}

fn parse_error_message(raw_json: &str) -> Option<String> {
    let value: Value = serde_json::from_str(raw_json).ok()?;
    let message = value.get("error")?.get("message")?.as_str()?.to_owned();
    Some(message)
}

fn extract_candidate_text(value: &Value) -> anyhow::Result<String> {
    let candidate = value
        .get("candidates")
        .and_then(|v| v.as_array())
        .and_then(|candidates| candidates.first())
        .ok_or_else(|| match blocked_reason(value) {
            Some(reason) => anyhow::anyhow!("prompt was blocked: {reason}"),
            None => anyhow::anyhow!("missing `candidates` in response"),
        })?;

    let mut text = String::new();
    if let Some(parts) = candidate.pointer("/content/parts").and_then(|v| v.as_array()) {
        for part in parts {
            if let Some(part_text) = part.get("text").and_then(|v| v.as_str()) {
                text.push_str(part_text);
            }
        }
    }

    if text.trim().is_empty() {
        let reason = candidate
            .get("finishReason")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        anyhow::bail!("Gemini output text is empty (finishReason={reason})");
    }
    Ok(text)
}

fn blocked_reason(value: &Value) -> Option<&str> {
    value.pointer("/promptFeedback/blockReason")?.as_str()
}

fn extract_images(value: &Value) -> anyhow::Result<Vec<Vec<u8>>> {
    let Some(predictions) = value.get("predictions").and_then(|v| v.as_array()) else {
        return Ok(Vec::new());
    };

    let mut images = Vec::new();
    for (idx, prediction) in predictions.iter().enumerate() {
        let Some(encoded) = prediction.get("bytesBase64Encoded").and_then(|v| v.as_str()) else {
            continue;
        };
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .with_context(|| format!("decode image {idx} base64"))?;
        if !bytes.is_empty() {
            images.push(bytes);
        }
    }
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn endpoints_trim_trailing_slash() {
        assert_eq!(
            generate_content_endpoint("http://localhost:1/v1beta/", "gemini-2.5-flash"),
            "http://localhost:1/v1beta/models/gemini-2.5-flash:generateContent"
        );
        assert_eq!(
            predict_endpoint("http://localhost:1/v1beta", "imagen-4.0-generate-001"),
            "http://localhost:1/v1beta/models/imagen-4.0-generate-001:predict"
        );
    }

    #[test]
    fn schema_requests_ask_for_json() {
        let request = GenerationRequest {
            model: "m".to_owned(),
            prompt: "p".to_owned(),
            response_schema: Some(json!({"type": "ARRAY"})),
            temperature: Some(0.5),
        };
        let body = generate_content_body(&request);
        assert_eq!(
            body.pointer("/generationConfig/responseMimeType"),
            Some(&json!("application/json"))
        );
        assert_eq!(body.pointer("/generationConfig/temperature"), Some(&json!(0.5)));
        assert_eq!(body.pointer("/contents/0/parts/0/text"), Some(&json!("p")));
    }

    #[test]
    fn plain_requests_have_no_generation_config() {
        let request = GenerationRequest {
            model: "m".to_owned(),
            prompt: "p".to_owned(),
            response_schema: None,
            temperature: None,
        };
        assert!(generate_content_body(&request).get("generationConfig").is_none());
    }

    #[test]
    fn candidate_text_concatenates_parts() {
        let value = json!({
            "candidates": [{ "content": { "parts": [{ "text": "Hello, " }, { "text": "world" }] } }]
        });
        assert_eq!(extract_candidate_text(&value).unwrap(), "Hello, world");
    }

    #[test]
    fn empty_candidate_text_is_an_error() {
        let value = json!({ "candidates": [{ "finishReason": "SAFETY" }] });
        let err = extract_candidate_text(&value).unwrap_err().to_string();
        assert!(err.contains("finishReason=SAFETY"));

        let blocked = json!({ "promptFeedback": { "blockReason": "OTHER" } });
        let err = extract_candidate_text(&blocked).unwrap_err().to_string();
        assert!(err.contains("blocked: OTHER"));
    }

    #[test]
    fn images_decode_and_missing_predictions_are_empty() {
        let value = json!({ "predictions": [{ "bytesBase64Encoded": "aGVsbG8=" }, {}] });
        assert_eq!(extract_images(&value).unwrap(), vec![b"hello".to_vec()]);
        assert!(extract_images(&json!({})).unwrap().is_empty());
    }

    #[test]
    fn error_message_is_taken_from_error_object() {
        let raw = r#"{"error":{"code":400,"message":"API key not valid"}}"#;
        assert_eq!(parse_error_message(raw).as_deref(), Some("API key not valid"));
        assert_eq!(parse_error_message("nope"), None);
    }
}
