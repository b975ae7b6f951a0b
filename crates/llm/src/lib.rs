//! Client for the remote analysis service
//!
//! Image and text classification, educational content and speech synthesis
//! over an OpenAI-compatible HTTP API.

mod ai_types;
mod analysis;
mod client;
mod error;
mod prompts;
mod service;


pub use client::{AnalysisClient, RetryPolicy, truncate};
pub use error::LlmError;
pub use prompts::{PromptConfig, Prompts};
pub use service::AnalysisService;
