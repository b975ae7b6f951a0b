//! Core types and helpers for wastewise
//!
//! Domain types shared by the storage, llm and service crates.

mod analysis;
mod config;
mod constants;
mod env_config;
mod error;
mod history;
mod id;
mod json_utils;
mod location;
mod media;

pub use analysis::*;
pub use config::Settings;
pub use constants::*;
pub use env_config::env_parse_with_default;
pub use error::*;
pub use history::*;
pub use id::IdGenerator;
pub use json_utils::strip_markdown_json;
pub use location::*;
pub use media::*;
