//! quizforge-providers: generation provider integrations.
//!
//! Implements the `LlmProvider` trait for the Gemini `generateContent` API
//! (one instance per API version endpoint), plus a scripted mock and the
//! configuration layer that turns a config file into a question pipeline.

pub mod config;
pub mod gemini;
pub mod mock;

pub use config::{
    create_pipeline, create_provider_chain, load_config, load_config_from, ProviderConfig,
    QuizforgeConfig,
};
pub use quizforge_core::error::ProviderError;
