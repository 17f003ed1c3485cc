//! The `quizforge review` command.

use anyhow::Result;
use uuid::Uuid;

use super::{Context, Session};

pub async fn execute(ctx: &Context, student: Uuid, attempt: Uuid, format: String) -> Result<()> {
    let session = Session::open(ctx)?;
    let review = session.engine.review(attempt, student).await?;

    match format.as_str() {
        "markdown" | "md" => println!("{}", review.to_markdown()),
        "json" => println!("{}", serde_json::to_string_pretty(&review)?),
        _ => {
            println!(
                "{}: {:.2}% ({})",
                review.subject_name,
                review.score_percent,
                if review.passed { "passed" } else { "failed" }
            );
            println!("{}", review.summary);

            if !review.mistakes.is_empty() {
                println!("\nMistakes:");
                for m in &review.mistakes {
                    println!("  {}\n    {}", m.why, m.fix);
                }
            }

            if !review.recommendations.is_empty() {
                println!("\nRecommendations:");
                for r in &review.recommendations {
                    println!("  {}. {}", r.priority, r.text);
                    if let Some(link) = r.materials.first() {
                        println!("     {}", link.url);
                    }
                }
            }
        }
    }

    Ok(())
}
