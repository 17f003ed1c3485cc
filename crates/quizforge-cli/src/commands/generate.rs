//! The `quizforge generate` command.

use anyhow::Result;
use uuid::Uuid;

use quizforge_core::model::{Difficulty, QuestionType};
use quizforge_core::request::GenerateSpec;

use super::{split_list, Context, Session};

#[allow(clippy::too_many_arguments)]
pub async fn execute(
    ctx: &Context,
    student: Uuid,
    subject: String,
    difficulty: String,
    types: String,
    count: u32,
    topics: Option<String>,
    language: Option<String>,
    format: String,
) -> Result<()> {
    let difficulty: Difficulty = difficulty.parse().map_err(anyhow::Error::msg)?;
    let question_types = split_list(&types)
        .iter()
        .map(|t| t.parse::<QuestionType>().map_err(anyhow::Error::msg))
        .collect::<Result<Vec<_>>>()?;

    let session = Session::open(ctx)?;
    let language = language.unwrap_or_else(|| session.config.default_language.clone());
    let spec = GenerateSpec::new(subject, difficulty, question_types)
        .with_count(count)
        .with_topics(topics.as_deref().map(split_list).unwrap_or_default())
        .with_language(language);

    let generated = session.engine.generate(student, &spec).await;
    // A failed test is still recorded, so save either way.
    session.save().await?;
    let outcome = generated?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&outcome)?),
        _ => {
            println!(
                "Generated test {} ({} questions, {})",
                outcome.test_id, spec.question_count, outcome.status
            );
        }
    }

    Ok(())
}
