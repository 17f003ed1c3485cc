//! The `quizforge show` command.

use anyhow::Result;
use uuid::Uuid;

use super::{Context, Session};

pub async fn execute(ctx: &Context, student: Uuid, test: Uuid) -> Result<()> {
    let session = Session::open(ctx)?;
    let view = session.engine.test_details(test, student).await?;
    println!("{}", serde_json::to_string_pretty(&view)?);
    Ok(())
}
