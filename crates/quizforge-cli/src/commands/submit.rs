//! The `quizforge submit` command.

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use uuid::Uuid;

use quizforge_core::request::{SubmitRequest, SubmittedAnswer};

use super::{Context, Session};

/// Accept either a full request object or a bare answers array.
fn parse_answers(content: &str) -> Result<SubmitRequest> {
    if let Ok(request) = serde_json::from_str::<SubmitRequest>(content) {
        return Ok(request);
    }
    let answers: Vec<SubmittedAnswer> =
        serde_json::from_str(content).context("failed to parse answers JSON")?;
    Ok(SubmitRequest {
        answers,
        client_duration_sec: None,
    })
}

pub async fn execute(
    ctx: &Context,
    student: Uuid,
    test: Uuid,
    answers_path: PathBuf,
    format: String,
) -> Result<()> {
    let content = std::fs::read_to_string(&answers_path)
        .with_context(|| format!("failed to read answers from {}", answers_path.display()))?;
    let request = parse_answers(&content)?;

    let session = Session::open(ctx)?;
    let submitted = session.engine.submit(test, student, &request).await;
    session.save().await?;
    let outcome = submitted?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&outcome)?),
        _ => {
            println!(
                "Attempt {}: {} {:.2}% ({})",
                outcome.attempt_id,
                outcome.status,
                outcome.score_percent,
                if outcome.passed { "passed" } else { "failed" }
            );
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_object_or_array() {
        let id = Uuid::new_v4();
        let object = format!(
            r#"{{"answers":[{{"questionId":"{id}","selectedOptionIds":["A"]}}],"clientDurationSec":90}}"#
        );
        let request = parse_answers(&object).unwrap();
        assert_eq!(request.client_duration_sec, Some(90));

        let array = format!(r#"[{{"questionId":"{id}","answerText":"x"}}]"#);
        let request = parse_answers(&array).unwrap();
        assert_eq!(request.answers[0].question_id, id);
        assert!(request.client_duration_sec.is_none());

        assert!(parse_answers("not json").is_err());
    }
}
