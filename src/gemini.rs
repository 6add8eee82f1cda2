use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use reqwest::Client;
use tracing::{info, warn, error};

use crate::config::Config;
use crate::models::ImageData;

#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("{0}")] Api(String),
    #[error("HTTP error: {0}")] Http(String),
    #[error("Other: {0}")] Other(String),
}

impl GeminiError {
    /// Message shown to the user: the API's own wording when it gave one.
    pub fn user_message(&self) -> String {
        match self {
            GeminiError::Api(message) => message.clone(),
            other => other.to_string(),
        }
    }
}

/// One element of a `generateContent` request, in the order the model should read it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum RequestPart {
    Image {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text { text: String },
}

impl RequestPart {
    pub fn image(image: &ImageData) -> Self {
        RequestPart::Image {
            inline_data: InlineData { data: image.data.clone(), mime_type: image.mime_type.clone() },
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        RequestPart::Text { text: text.into() }
    }
}

/// The generative backend as seen by the studio.
#[async_trait]
pub trait ImageModel: Send + Sync {
    /// Runs an image edit and returns the first image part of the answer, if any.
    async fn edit_image(&self, parts: Vec<RequestPart>) -> Result<Option<ImageData>, GeminiError>;

    /// Asks a question about `image` and returns the trimmed text answer.
    async fn describe(&self, image: &ImageData, prompt: &str) -> Result<String, GeminiError>;
}

// Helper function to truncate base64 data in JSON for cleaner logging
fn truncate_base64_in_json(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, val) in map.iter_mut() {
                if key == "data" {
                    if let serde_json::Value::String(s) = val {
                        if s.len() > 100 {
                            if let Some(head) = s.get(..50) {
                                *val = serde_json::Value::String(format!("{}...[truncated {} chars]", head, s.len() - 50));
                            }
                        }
                    }
                } else {
                    truncate_base64_in_json(val);
                }
            }
        }
        serde_json::Value::Array(arr) => {
            for val in arr.iter_mut() {
                truncate_base64_in_json(val);
            }
        }
        _ => {}
    }
}

fn preview(data: &str) -> String {
    match data.get(..50) {
        Some(head) if data.len() > 50 => format!("{}...[{} chars total]", head, data.len()),
        _ => data.to_string(),
    }
}

const DEMO_QUERY: &str = "mid-century modern accent chair";

pub struct GeminiClient {
    client: Client,
    api_key: String,
    base_url: String,
    image_model: String,
    text_model: String,
}

impl GeminiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            base_url: config.api_base.clone(),
            image_model: config.image_model.clone(),
            text_model: config.text_model.clone(),
        }
    }

    fn is_demo(&self) -> bool {
        self.api_key == crate::config::DEMO_KEY
    }

    async fn generate_content(&self, model: &str, request_body: serde_json::Value) -> Result<GeminiResponse, GeminiError> {
        let url = format!("{}/models/{}:generateContent?key={}", self.base_url, model, self.api_key);
        info!("🔗 Making request to: {}", url.replace(&self.api_key, "***"));

        let mut logged = request_body.clone();
        truncate_base64_in_json(&mut logged);
        info!("📤 Request body: {}", serde_json::to_string_pretty(&logged).unwrap_or_default());

        let response = self.client
            .post(&url)
            .json(&request_body)
            .send()
            .await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        let status = response.status();
        info!("📥 Response status: {}", status);

        let response_text = response.text().await
            .map_err(|e| GeminiError::Http(e.to_string()))?;

        if !status.is_success() {
            error!("❌ API Error response: {}", response_text);
            return Err(api_error(status, &response_text));
        }

        let truncated_response = match serde_json::from_str::<serde_json::Value>(&response_text) {
            Ok(mut json_value) => {
                truncate_base64_in_json(&mut json_value);
                serde_json::to_string(&json_value).unwrap_or_default()
            }
            Err(_) => preview(&response_text),
        };
        info!("📥 Raw Gemini API response: {}", truncated_response);

        serde_json::from_str(&response_text)
            .map_err(|e| GeminiError::Other(format!("parse error: {}", e)))
    }
}

#[async_trait]
impl ImageModel for GeminiClient {
    async fn edit_image(&self, parts: Vec<RequestPart>) -> Result<Option<ImageData>, GeminiError> {
        if self.is_demo() {
            info!("Using demo mode - echoing the source image back");
            return Ok(parts.into_iter().find_map(|part| match part {
                RequestPart::Image { inline_data } => Some(ImageData::new(inline_data.data, inline_data.mime_type)),
                RequestPart::Text { .. } => None,
            }));
        }

        info!("Editing image with Gemini API ({} parts)...", parts.len());
        let request_body = edit_request(&parts);
        let parsed = self.generate_content(&self.image_model, request_body).await?;
        let image = extract_first_image(&parsed);
        match &image {
            Some(image) => info!("✅ Received {} image: {}", image.mime_type, preview(&image.data)),
            None => warn!("⚠️ No image data found in API response"),
        }
        Ok(image)
    }

    async fn describe(&self, image: &ImageData, prompt: &str) -> Result<String, GeminiError> {
        if self.is_demo() {
            info!("Using demo mode - returning a canned search query");
            return Ok(DEMO_QUERY.to_string());
        }

        info!("Identifying item with Gemini API...");
        let request_body = describe_request(image, prompt);
        let parsed = self.generate_content(&self.text_model, request_body).await?;
        let text = extract_text(&parsed);
        info!("✅ Identification answer: {:?}", text);
        Ok(text)
    }
}

fn edit_request(parts: &[RequestPart]) -> serde_json::Value {
    json!({
        "contents": [{ "parts": parts }],
        "generationConfig": {
            "responseModalities": ["TEXT", "IMAGE"],
            "candidateCount": 1
        }
    })
}

// No output cap: thinking models spend it before writing any text.
fn describe_request(image: &ImageData, prompt: &str) -> serde_json::Value {
    json!({
        "contents": [{ "parts": [RequestPart::image(image), RequestPart::text(prompt)] }],
        "generationConfig": { "temperature": 0.4 }
    })
}

fn api_error(status: reqwest::StatusCode, body: &str) -> GeminiError {
    #[derive(Deserialize)]
    struct ErrorEnvelope { error: ErrorBody }
    #[derive(Deserialize)]
    struct ErrorBody { #[serde(default)] message: String }

    match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) if !envelope.error.message.is_empty() => GeminiError::Api(envelope.error.message),
        _ => GeminiError::Http(format!("status={} body={}", status, body)),
    }
}

// --- Request/Response Types ---

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineData {
    pub data: String,
    #[serde(rename = "mimeType")]
    pub mime_type: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate { #[serde(default)] content: Content }

#[derive(Debug, Deserialize, Default)]
struct Content { #[serde(default)] parts: Vec<Part> }

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData
    },
    Text { text: String },
    Other(serde_json::Value)
}

fn extract_first_image(resp: &GeminiResponse) -> Option<ImageData> {
    resp.candidates
        .iter()
        .flat_map(|c| c.content.parts.iter())
        .find_map(|p| match p {
            Part::Inline { inline_data } => Some(ImageData::new(inline_data.data.clone(), inline_data.mime_type.clone())),
            _ => None,
        })
}

fn extract_text(resp: &GeminiResponse) -> String {
    resp.candidates
        .first()
        .map(|c| {
            c.content.parts
                .iter()
                .filter_map(|p| match p {
                    Part::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<String>()
        })
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[cfg(test)]
pub(crate) mod fake {
    use super::*;
    use parking_lot::Mutex;
    use std::collections::VecDeque;

    /// Scripted stand-in for the API. Replies are consumed in order; every
    /// request is recorded for inspection.
    #[derive(Default)]
    pub struct FakeModel {
        edits: Mutex<VecDeque<Result<Option<ImageData>, GeminiError>>>,
        answers: Mutex<VecDeque<Result<String, GeminiError>>>,
        pub edit_requests: Mutex<Vec<Vec<RequestPart>>>,
        pub describe_requests: Mutex<Vec<(ImageData, String)>>,
    }

    impl FakeModel {
        pub fn reply_image(self, image: ImageData) -> Self {
            self.edits.lock().push_back(Ok(Some(image)));
            self
        }

        pub fn reply_no_image(self) -> Self {
            self.edits.lock().push_back(Ok(None));
            self
        }

        pub fn reply_edit_error(self, message: &str) -> Self {
            self.edits.lock().push_back(Err(GeminiError::Api(message.to_string())));
            self
        }

        pub fn reply_text(self, text: &str) -> Self {
            self.answers.lock().push_back(Ok(text.to_string()));
            self
        }

        pub fn edit_count(&self) -> usize {
            self.edit_requests.lock().len()
        }
    }

    #[async_trait]
    impl ImageModel for FakeModel {
        async fn edit_image(&self, parts: Vec<RequestPart>) -> Result<Option<ImageData>, GeminiError> {
            self.edit_requests.lock().push(parts);
            self.edits.lock().pop_front().unwrap_or(Ok(None))
        }

        async fn describe(&self, image: &ImageData, prompt: &str) -> Result<String, GeminiError> {
            self.describe_requests.lock().push((image.clone(), prompt.to_string()));
            self.answers.lock().pop_front().unwrap_or_else(|| Ok(String::new()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn request_parts_use_the_wire_field_names() {
        let parts = vec![RequestPart::image(&ImageData::new("AAAA", "image/png")), RequestPart::text("stage it")];
        assert_eq!(
            serde_json::to_value(&parts).unwrap(),
            json!([
                { "inlineData": { "data": "AAAA", "mimeType": "image/png" } },
                { "text": "stage it" }
            ])
        );
    }

    #[test]
    fn first_image_part_wins() {
        let resp: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [
                { "text": "Here is your room" },
                { "inlineData": { "data": "FIRST", "mimeType": "image/png" } },
                { "inlineData": { "data": "SECOND", "mimeType": "image/jpeg" } }
            ]}}]
        }))
        .unwrap();
        assert_eq!(extract_first_image(&resp), Some(ImageData::new("FIRST", "image/png")));
    }

    #[test]
    fn text_only_response_has_no_image() {
        let resp: GeminiResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{ "text": "I can't do that" }] }, "finishReason": "STOP" }]
        }))
        .unwrap();
        assert_eq!(extract_first_image(&resp), None);
        assert_eq!(extract_text(&resp), "I can't do that");

        let empty: GeminiResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(extract_text(&empty), "");
    }

    #[test]
    fn api_error_message_is_kept_verbatim() {
        let err = api_error(reqwest::StatusCode::TOO_MANY_REQUESTS, r#"{"error":{"code":429,"message":"Resource has been exhausted"}}"#);
        assert_eq!(err.user_message(), "Resource has been exhausted");

        let err = api_error(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(err.user_message(), "HTTP error: status=502 Bad Gateway body=upstream down");
    }

    #[test]
    fn base64_is_truncated_in_logs() {
        let mut value = json!({ "inlineData": { "data": "A".repeat(500), "mimeType": "image/png" } });
        truncate_base64_in_json(&mut value);
        let data = value["inlineData"]["data"].as_str().unwrap();
        assert!(data.ends_with("...[truncated 450 chars]"));
        assert_eq!(value["inlineData"]["mimeType"], "image/png");
    }

    #[test]
    fn non_ascii_data_is_left_whole_in_logs() {
        let data = format!("{}{}", "A".repeat(49), "é".repeat(40));
        let mut value = json!({ "data": data.clone() });
        truncate_base64_in_json(&mut value);
        assert_eq!(value["data"], data);
    }

    #[test]
    fn describe_request_leaves_output_length_uncapped() {
        let body = describe_request(&ImageData::new("ROOM", "image/jpeg"), "what is this?");
        assert_eq!(
            body,
            json!({
                "contents": [{ "parts": [
                    { "inlineData": { "data": "ROOM", "mimeType": "image/jpeg" } },
                    { "text": "what is this?" }
                ] }],
                "generationConfig": { "temperature": 0.4 }
            })
        );
        assert!(body["generationConfig"].get("maxOutputTokens").is_none());
    }

    #[test]
    fn edit_request_asks_for_an_image_modality() {
        let body = edit_request(&[RequestPart::text("stage")]);
        assert_eq!(body["generationConfig"]["responseModalities"], json!(["TEXT", "IMAGE"]));
        assert_eq!(body["contents"][0]["parts"], json!([{ "text": "stage" }]));
    }

    #[tokio::test]
    async fn demo_mode_echoes_the_source_image() {
        let client = GeminiClient::new(&Config::default());
        let parts = vec![RequestPart::image(&ImageData::new("ROOM", "image/jpeg")), RequestPart::text("stage")];
        assert_eq!(client.edit_image(parts).await.unwrap(), Some(ImageData::new("ROOM", "image/jpeg")));
        assert_eq!(client.describe(&ImageData::new("ROOM", "image/jpeg"), "what").await.unwrap(), DEMO_QUERY);
    }
}
