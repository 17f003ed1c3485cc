//! quizforge-core: question generation, grading and the attempt lifecycle.
//!
//! This crate defines the data model, the storage and provider seams, the
//! question pipeline with its deterministic fallback, the grading engine and
//! the weak-topic/progress analytics that the rest of quizforge builds on.

pub mod analytics;
pub mod error;
pub mod fallback;
pub mod grading;
pub mod lifecycle;
pub mod locale;
pub mod materials;
pub mod model;
pub mod normalize;
pub mod parser;
pub mod pipeline;
pub mod prompt;
pub mod remote;
pub mod request;
pub mod review;
pub mod topics;
pub mod traits;
pub mod views;
