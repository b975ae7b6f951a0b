use async_trait::async_trait;
use wastewise_core::{DataUrl, ImageAnalysis, Location, TextAnalysis, strip_markdown_json};

use crate::ai_types::{
    ChatRequest, ContentPart, ImageReplyJson, ImageUrl, Message, MessageContent, ResponseFormat,
    SpeechRequest,
};
use crate::client::{AnalysisClient, truncate};
use crate::error::LlmError;
use crate::prompts::PromptConfig;
use crate::service::AnalysisService;

const IMAGE_TEMPERATURE: f32 = 0.2;
const TEXT_TEMPERATURE: f32 = 0.3;
const EDUCATIONAL_TEMPERATURE: f32 = 0.5;

/// Parses an image reply, accepting a bare item in place of `{items: [...]}`.
pub(crate) fn parse_image_reply(content: &str) -> Result<ImageAnalysis, LlmError> {
    let content = strip_markdown_json(content);
    let reply: ImageReplyJson = serde_json::from_str(content).map_err(|e| LlmError::JsonParse {
        context: format!("image analysis (content: {})", truncate(content, 300)),
        source: e,
    })?;
    let items = match reply {
        ImageReplyJson::Items { items } => items,
        ImageReplyJson::Single(item) => vec![item],
        ImageReplyJson::Other(other) => {
            tracing::warn!(reply = %truncate(&other.to_string(), 200), "Image reply had no recognizable items");
            Vec::new()
        },
    };
    Ok(ImageAnalysis { items, location: None })
}

pub(crate) fn parse_text_reply(content: &str) -> Result<TextAnalysis, LlmError> {
    let content = strip_markdown_json(content);
    serde_json::from_str(content).map_err(|e| LlmError::JsonParse {
        context: format!("text query (content: {})", truncate(content, 300)),
        source: e,
    })
}

#[async_trait]
impl AnalysisService for AnalysisClient {
    async fn analyze_image(
        &self,
        image: &[u8],
        media_type: &str,
        prompt: &PromptConfig,
        location: Option<Location>,
    ) -> Result<ImageAnalysis, LlmError> {
        if image.is_empty() {
            return Err(LlmError::InvalidPayload("image is empty".to_owned()));
        }
        let mut text = prompt.prompt.clone();
        if let Some(extra) = location.and_then(|loc| prompt.render_location(loc)) {
            text.push_str("\n\n");
            text.push_str(&extra);
        }

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message::user(MessageContent::Parts(vec![
                ContentPart::ImageUrl { image_url: ImageUrl { url: DataUrl::encode(media_type, image) } },
                ContentPart::Text { text },
            ]))],
            response_format: Some(ResponseFormat::json()),
            temperature: IMAGE_TEMPERATURE,
        };

        let content = self.chat_completion(&request).await?;
        let analysis = parse_image_reply(&content)?;
        tracing::debug!(items = analysis.items.len(), "Image analyzed");
        Ok(analysis)
    }

    async fn analyze_text_query(
        &self,
        query: &str,
        prompt: &PromptConfig,
    ) -> Result<TextAnalysis, LlmError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message::user(MessageContent::Text(prompt.render("query", query)))],
            response_format: Some(ResponseFormat::json()),
            temperature: TEXT_TEMPERATURE,
        };
        let content = self.chat_completion(&request).await?;
        parse_text_reply(&content)
    }

    async fn get_expanded_content(&self, fact: &str, prompt: &PromptConfig) -> Result<String, LlmError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![Message::user(MessageContent::Text(prompt.render("fact", fact)))],
            response_format: None,
            temperature: EDUCATIONAL_TEMPERATURE,
        };
        let content = self.chat_completion(&request).await?;
        Ok(content.trim().to_owned())
    }

    async fn generate_speech(&self, text: &str, prompt: &PromptConfig) -> Result<Vec<u8>, LlmError> {
        let request = SpeechRequest {
            model: self.tts_model.clone(),
            input: prompt.render("text", text),
            voice: self.tts_voice.clone(),
            response_format: "pcm".to_owned(),
        };
        let audio = self.post_with_retry("audio/speech", &request).await?;
        if audio.is_empty() {
            return Err(LlmError::InvalidPayload("no audio data in response".to_owned()));
        }
        Ok(audio)
    }
}
