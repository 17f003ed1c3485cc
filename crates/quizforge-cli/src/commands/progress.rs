//! The `quizforge progress` command.

use anyhow::Result;
use comfy_table::{Cell, Table};
use serde_json::json;
use uuid::Uuid;

use super::{Context, Session};

pub async fn execute(
    ctx: &Context,
    student: Uuid,
    subject: Option<String>,
    format: String,
) -> Result<()> {
    let session = Session::open(ctx)?;
    let weak = session.engine.weak_topics(student, subject.as_deref()).await?;
    let snapshots = session.engine.progress(student, subject.as_deref()).await?;

    if format == "json" {
        let body = json!({ "weakTopics": weak, "progress": snapshots });
        println!("{}", serde_json::to_string_pretty(&body)?);
        return Ok(());
    }

    if weak.is_empty() {
        println!("No weak topics.");
    } else {
        let mut table = Table::new();
        table.set_header(vec!["Topic", "Weakness", "Last seen"]);
        for topic in &weak {
            table.add_row(vec![
                Cell::new(&topic.topic_code),
                Cell::new(format!("{:.2}", topic.weakness_score)),
                Cell::new(topic.last_seen_at.format("%Y-%m-%d").to_string()),
            ]);
        }
        println!("Weak topics:\n{table}");
    }

    if snapshots.is_empty() {
        println!("No progress yet.");
    } else {
        let mut table = Table::new();
        table.set_header(vec!["Week", "Average", "Trend"]);
        for snapshot in &snapshots {
            table.add_row(vec![
                Cell::new(snapshot.week_start),
                Cell::new(format!("{:.2}%", snapshot.avg_score)),
                Cell::new(snapshot.trend),
            ]);
        }
        println!("Progress:\n{table}");
    }

    Ok(())
}
