//! Prompt templates and user-facing failure messages per call kind.

use wastewise_core::Location;

/// Prompt template plus the message shown when the call fails.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptConfig {
    /// Template; `{query}`, `{fact}` or `{text}` is substituted depending on the call.
    pub prompt: String,
    /// Extra instruction appended when a location is known (`{lat}`, `{lon}`).
    pub location_prompt: Option<String>,
    /// Notice text used when the call fails.
    pub error: String,
}

impl PromptConfig {
    #[must_use]
    pub fn new(prompt: impl Into<String>, error: impl Into<String>) -> Self {
        Self { prompt: prompt.into(), location_prompt: None, error: error.into() }
    }

    #[must_use]
    pub fn with_location_prompt(mut self, location_prompt: impl Into<String>) -> Self {
        self.location_prompt = Some(location_prompt.into());
        self
    }

    /// Fills `{placeholder}` in the prompt with `value`.
    #[must_use]
    pub fn render(&self, placeholder: &str, value: &str) -> String {
        self.prompt.replace(&format!("{{{placeholder}}}"), value)
    }

    /// Location instruction for `location`, if a template is configured.
    #[must_use]
    pub fn render_location(&self, location: Location) -> Option<String> {
        self.location_prompt.as_ref().map(|template| {
            template
                .replace("{lat}", &format!("{:.5}", location.lat))
                .replace("{lon}", &format!("{:.5}", location.lon))
        })
    }
}

/// The four prompt sets used by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompts {
    pub image: PromptConfig,
    pub text: PromptConfig,
    pub educational: PromptConfig,
    pub speech: PromptConfig,
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            image: PromptConfig::new(
                r#"Identify every disposable item in this image. For each item return:
- itemName: the item's name, e.g. "Plastic bottle"
- wasteType: one of "Recyclable", "Organic", "Electronic", "Hazardous", "Non-recyclable"
- recyclable: boolean
- disposalSuggestion: a clear, actionable disposal instruction
- reasoning: a brief explanation of the classification
- environmentalImpact: one concise, impactful fact about the item's environmental impact

Return JSON: {"items": [...]}"#,
                "Could not analyze the image",
            )
            .with_location_prompt(
                "The photo was taken near latitude {lat}, longitude {lon}. \
                 Tailor disposal suggestions to local recycling rules where possible.",
            ),
            text: PromptConfig::new(
                r#"Answer this question about waste disposal or recycling: "{query}"

Return JSON with these fields:
- question: the user's question, rephrased for clarity if needed
- answer: a direct, informative answer
- disposalSuggestion: a practical disposal suggestion, or a general sustainability tip
- environmentalImpact: one concise fact about the related environmental impact"#,
                "Could not answer the question",
            ),
            educational: PromptConfig::new(
                "Expand on this environmental fact in three short, engaging paragraphs \
                 for a general audience: {fact}",
                "Could not load more information",
            ),
            speech: PromptConfig::new("{text}", "Could not generate audio"),
        }
    }
}
