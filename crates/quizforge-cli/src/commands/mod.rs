//! Subcommand implementations.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;

use quizforge_core::lifecycle::AssessmentEngine;
use quizforge_core::traits::Repository;
use quizforge_providers::config::{create_pipeline, load_config_from, QuizforgeConfig};
use quizforge_store::MemoryStore;

pub mod generate;
pub mod history;
pub mod init;
pub mod progress;
pub mod review;
pub mod show;
pub mod submit;

/// Global options shared by every subcommand.
pub struct Context {
    pub store_path: PathBuf,
    pub config_path: Option<PathBuf>,
}

/// A loaded store with an engine over it.
pub struct Session {
    pub config: QuizforgeConfig,
    pub engine: AssessmentEngine,
    store: Arc<MemoryStore>,
    store_path: PathBuf,
}

impl Session {
    pub fn open(ctx: &Context) -> Result<Self> {
        let config = load_config_from(ctx.config_path.as_deref())?;
        let store = Arc::new(MemoryStore::open(&ctx.store_path)?);
        let repo: Arc<dyn Repository> = store.clone();
        let engine = AssessmentEngine::new(repo, create_pipeline(&config));
        Ok(Self {
            config,
            engine,
            store,
            store_path: ctx.store_path.clone(),
        })
    }

    /// Write the store back to its file.
    pub async fn save(&self) -> Result<()> {
        self.store.save_json(&self.store_path).await
    }
}

pub(crate) fn split_list(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}
