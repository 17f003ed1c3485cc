//! The `quizforge history` command.

use anyhow::Result;
use comfy_table::{Cell, Table};
use uuid::Uuid;

use quizforge_core::request::HistoryQuery;
use quizforge_core::views::HistoryPage;

use super::{Context, Session};

pub async fn execute(
    ctx: &Context,
    student: Uuid,
    subject: Option<String>,
    page: usize,
    page_size: usize,
    format: String,
) -> Result<()> {
    let session = Session::open(ctx)?;
    let query = HistoryQuery {
        subject,
        page,
        page_size,
    };
    let history = session.engine.history(student, &query).await?;

    match format.as_str() {
        "json" => println!("{}", serde_json::to_string_pretty(&history)?),
        _ => print_table(&history),
    }

    Ok(())
}

fn print_table(history: &HistoryPage) {
    if history.items.is_empty() {
        println!("No attempts found.");
        return;
    }

    let mut table = Table::new();
    table.set_header(vec![
        "Attempt",
        "Subject",
        "Difficulty",
        "Status",
        "Submitted",
        "Score",
    ]);

    for item in &history.items {
        table.add_row(vec![
            Cell::new(item.attempt_id),
            Cell::new(&item.subject_name),
            Cell::new(item.difficulty),
            Cell::new(item.status),
            Cell::new(
                item.submitted_at
                    .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
                    .unwrap_or_else(|| "-".to_string()),
            ),
            Cell::new(
                item.score_percent
                    .map(|p| format!("{p:.2}%"))
                    .unwrap_or_else(|| "-".to_string()),
            ),
        ]);
    }

    println!("{table}");
    println!(
        "Page {} ({} per page), {} attempt(s) in total",
        history.page, history.page_size, history.total
    );
}
