//! Attempt review: feedback plus recommendations, with markdown rendering.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::model::{MistakeExplanation, Recommendation};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttemptReview {
    pub attempt_id: Uuid,
    pub subject_name: String,
    pub score_percent: f64,
    pub passed: bool,
    pub summary: String,
    /// Ordered by descending mistake count.
    pub mistakes: Vec<MistakeExplanation>,
    /// Ordered by priority.
    pub recommendations: Vec<Recommendation>,
}

impl AttemptReview {
    /// Format the review as markdown.
    pub fn to_markdown(&self) -> String {
        let mut md = String::new();

        md.push_str(&format!("## Review: {}\n\n", self.subject_name));
        md.push_str(&format!(
            "**Score:** {:.2}% ({})\n\n",
            self.score_percent,
            if self.passed { "passed" } else { "failed" }
        ));
        md.push_str(&self.summary);
        md.push_str("\n\n");

        if !self.mistakes.is_empty() {
            md.push_str("### Mistakes\n\n");
            md.push_str("| Topic | Count | Why | Fix |\n");
            md.push_str("|-------|-------|-----|-----|\n");
            for m in &self.mistakes {
                md.push_str(&format!(
                    "| {} | {} | {} | {} |\n",
                    escape_cell(&m.topic_code),
                    m.count,
                    escape_cell(&m.why),
                    escape_cell(&m.fix)
                ));
            }
            md.push('\n');
        }

        if !self.recommendations.is_empty() {
            md.push_str("### Recommendations\n\n");
            for r in &self.recommendations {
                md.push_str(&format!("{}. {}\n", r.priority, r.text));
                for link in &r.materials {
                    md.push_str(&format!("   - [{}]({})\n", link.title, link.url));
                }
            }
        }

        md
    }
}

fn escape_cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
