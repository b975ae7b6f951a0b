//! Wire types of the OpenAI-compatible endpoints.

use serde::{Deserialize, Serialize};
use wastewise_core::ItemAnalysis;

#[derive(Serialize)]
pub(crate) struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<ResponseFormat>,
    pub temperature: f32,
}

#[derive(Serialize)]
pub(crate) struct ResponseFormat {
    #[serde(rename = "type")]
    pub format_type: String,
}

impl ResponseFormat {
    pub fn json() -> Self {
        Self { format_type: "json_object".to_owned() }
    }
}

#[derive(Serialize)]
pub(crate) struct Message {
    pub role: String,
    pub content: MessageContent,
}

impl Message {
    pub fn user(content: MessageContent) -> Self {
        Self { role: "user".to_owned(), content }
    }
}

#[derive(Serialize)]
#[serde(untagged)]
pub(crate) enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub(crate) enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
pub(crate) struct ImageUrl {
    pub url: String,
}

#[derive(Deserialize)]
pub(crate) struct ChatResponse {
    pub choices: Vec<Choice>,
}

#[derive(Deserialize)]
pub(crate) struct Choice {
    pub message: ResponseMessage,
}

#[derive(Deserialize)]
pub(crate) struct ResponseMessage {
    #[serde(default)]
    pub content: Option<String>,
}

#[derive(Serialize)]
pub(crate) struct SpeechRequest {
    pub model: String,
    pub input: String,
    pub voice: String,
    pub response_format: String,
}

/// Shapes an image reply is accepted in: the requested `{items: [...]}`
/// object, a bare single item, or anything else (treated as no items).
#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum ImageReplyJson {
    Items { items: Vec<ItemAnalysis> },
    Single(ItemAnalysis),
    Other(serde_json::Value),
}
