//! Analysis results returned by the remote classification service.

use serde::{Deserialize, Serialize};

use crate::location::Location;

/// Input mode of a request.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum AnalysisMode {
    #[default]
    Image,
    Text,
}

impl AnalysisMode {
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match *self {
            Self::Image => "image",
            Self::Text => "text",
        }
    }
}

/// Classification of one disposable item found in a photo.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ItemAnalysis {
    pub item_name: String,
    /// Waste category, e.g. "Recyclable", "Organic", "Hazardous".
    pub waste_type: String,
    pub recyclable: bool,
    pub disposal_suggestion: String,
    pub reasoning: String,
    /// Short environmental-impact fact about the item.
    pub environmental_impact: String,
}

/// Result of an image analysis: every item identified, in reply order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct ImageAnalysis {
    pub items: Vec<ItemAnalysis>,
    /// Location the analysis was run with, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl ImageAnalysis {
    #[must_use]
    pub fn with_location(mut self, location: Option<Location>) -> Self {
        self.location = location;
        self
    }
}

/// Result of a free-text question.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TextAnalysis {
    pub question: String,
    pub answer: String,
    pub disposal_suggestion: String,
    pub environmental_impact: String,
}

/// Immutable outcome of a successful analysis.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "queryType", rename_all = "lowercase")]
pub enum AnalysisResult {
    Image(ImageAnalysis),
    Text(TextAnalysis),
}

impl AnalysisResult {
    #[must_use]
    pub const fn mode(&self) -> AnalysisMode {
        match *self {
            Self::Image(_) => AnalysisMode::Image,
            Self::Text(_) => AnalysisMode::Text,
        }
    }

    /// Environmental-impact facts carried by the result, one per item.
    #[must_use]
    pub fn impact_facts(&self) -> Vec<&str> {
        match self {
            Self::Image(image) => {
                image.items.iter().map(|item| item.environmental_impact.as_str()).collect()
            },
            Self::Text(text) => vec![text.environmental_impact.as_str()],
        }
    }
}

/// Expanded article behind an environmental-impact fact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EducationalContent {
    pub title: String,
    pub content: String,
}
