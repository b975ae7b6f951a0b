use async_trait::async_trait;
use wastewise_core::{ImageAnalysis, Location, TextAnalysis};

use crate::error::LlmError;
use crate::prompts::PromptConfig;

/// Contract of the remote analysis service.
///
/// All calls are fallible and independent; no ordering holds between them.
#[async_trait]
pub trait AnalysisService: Send + Sync {
    /// Classifies every disposable item in an image.
    async fn analyze_image(
        &self,
        image: &[u8],
        media_type: &str,
        prompt: &PromptConfig,
        location: Option<Location>,
    ) -> Result<ImageAnalysis, LlmError>;

    /// Answers a free-text disposal question.
    async fn analyze_text_query(
        &self,
        query: &str,
        prompt: &PromptConfig,
    ) -> Result<TextAnalysis, LlmError>;

    /// Expands an environmental-impact fact into prose.
    async fn get_expanded_content(&self, fact: &str, prompt: &PromptConfig) -> Result<String, LlmError>;

    /// Synthesizes speech; returns 16-bit little-endian mono PCM at 24 kHz.
    async fn generate_speech(&self, text: &str, prompt: &PromptConfig) -> Result<Vec<u8>, LlmError>;
}
