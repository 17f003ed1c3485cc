//! Weak-topic and progress aggregation.
//!
//! Pure functions: repository implementations call them inside their atomic
//! grading step so the derived records are written together with the grades.

use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use uuid::Uuid;

use crate::grading::{round2, PASS_THRESHOLD};
use crate::locale::Locale;
use crate::materials::build_material_links;
use crate::model::{
    MistakeExplanation, PracticeTask, ProgressSnapshot, Recommendation, RecommendationType,
    TopicMistakes, Trend, WeakTopic,
};

/// Score of a weak topic the first time it is touched.
pub const WEAKNESS_SEED: f64 = 0.6;

/// Added to an existing weak topic on every later touch. No cap.
pub const WEAKNESS_INCREMENT: f64 = 0.1;

/// Completed attempts averaged into a progress snapshot.
pub const SNAPSHOT_WINDOW: usize = 10;

/// Recommendations produced per attempt.
pub const MAX_RECOMMENDATIONS: usize = 5;

/// Expected format of generated practice tasks.
pub const PRACTICE_FORMAT: &str = "SHORT_TEXT";

/// Create or bump a weakness record.
pub fn touch_weak_topic(
    existing: Option<WeakTopic>,
    student_id: Uuid,
    subject_id: Uuid,
    topic_code: &str,
    now: DateTime<Utc>,
) -> WeakTopic {
    match existing {
        Some(mut record) => {
            record.weakness_score = round2(record.weakness_score + WEAKNESS_INCREMENT);
            record.last_seen_at = now;
            record
        }
        None => WeakTopic {
            student_id,
            subject_id,
            topic_code: topic_code.to_string(),
            weakness_score: WEAKNESS_SEED,
            last_seen_at: now,
        },
    }
}

/// Monday of the ISO week containing `at`, in UTC.
pub fn week_start(at: DateTime<Utc>) -> NaiveDate {
    let date = at.date_naive();
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}

/// Rolling snapshot over the given score percents (most recent window).
///
/// An empty window averages to 0 and trends down.
pub fn progress_snapshot(
    student_id: Uuid,
    subject_id: Uuid,
    week_start: NaiveDate,
    recent_percents: &[f64],
    mistakes_by_topic: Vec<TopicMistakes>,
) -> ProgressSnapshot {
    let window = &recent_percents[..recent_percents.len().min(SNAPSHOT_WINDOW)];
    let avg_score = if window.is_empty() {
        0.0
    } else {
        round2(window.iter().sum::<f64>() / window.len() as f64)
    };
    ProgressSnapshot {
        student_id,
        subject_id,
        week_start,
        avg_score,
        trend: if avg_score >= PASS_THRESHOLD {
            Trend::Up
        } else {
            Trend::Down
        },
        mistakes_by_topic,
    }
}

/// Mistake explanations with reference links, in the order given.
pub fn explain_mistakes(
    mistakes: &[TopicMistakes],
    subject_name: &str,
    locale: Locale,
) -> Vec<MistakeExplanation> {
    mistakes
        .iter()
        .map(|m| MistakeExplanation {
            topic_code: m.topic_code.clone(),
            count: m.count,
            why: locale.mistake_why(&m.topic_code, m.count),
            fix: locale.mistake_fix(&m.topic_code),
            materials: build_material_links(&m.topic_code, subject_name, locale),
        })
        .collect()
}

/// Practice recommendations for the most frequent mistake topics.
///
/// `mistakes` must already be ordered by descending count.
pub fn build_recommendations(
    attempt_id: Uuid,
    student_id: Uuid,
    mistakes: &[TopicMistakes],
    subject_name: &str,
    locale: Locale,
) -> Vec<Recommendation> {
    mistakes
        .iter()
        .take(MAX_RECOMMENDATIONS)
        .zip(1u32..)
        .map(|(m, priority)| Recommendation {
            id: Uuid::new_v4(),
            attempt_id,
            student_id,
            kind: RecommendationType::Practice,
            priority,
            topic_code: m.topic_code.clone(),
            text: locale.recommendation_text(&m.topic_code, m.count),
            materials: build_material_links(&m.topic_code, subject_name, locale),
        })
        .collect()
}

/// One practice task stub per recommendation.
pub fn practice_tasks(subject_id: Uuid, recommendations: &[Recommendation]) -> Vec<PracticeTask> {
    recommendations
        .iter()
        .map(|r| PracticeTask {
            id: Uuid::new_v4(),
            student_id: r.student_id,
            subject_id,
            topic_code: r.topic_code.clone(),
            prompt: r.text.clone(),
            expected_format: PRACTICE_FORMAT.to_string(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn mistakes(entries: &[(&str, u32)]) -> Vec<TopicMistakes> {
        entries
            .iter()
            .map(|(topic, count)| TopicMistakes {
                topic_code: topic.to_string(),
                count: *count,
            })
            .collect()
    }

    #[test]
    fn weak_topic_seeds_then_increments_without_cap() {
        let now = Utc::now();
        let (student, subject) = (Uuid::new_v4(), Uuid::new_v4());
        let mut record = touch_weak_topic(None, student, subject, "loops", now);
        assert_eq!(record.weakness_score, 0.6);
        for _ in 0..10 {
            record = touch_weak_topic(Some(record), student, subject, "loops", now);
        }
        assert_eq!(record.weakness_score, 1.6);
    }

    #[test]
    fn week_start_is_monday() {
        let sunday = Utc.with_ymd_and_hms(2024, 3, 17, 23, 59, 0).unwrap();
        assert_eq!(week_start(sunday), NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        let monday = Utc.with_ymd_and_hms(2024, 3, 18, 0, 0, 1).unwrap();
        assert_eq!(week_start(monday), NaiveDate::from_ymd_opt(2024, 3, 18).unwrap());
    }

    #[test]
    fn snapshot_average_and_trend() {
        let week = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        let snapshot = progress_snapshot(Uuid::new_v4(), Uuid::new_v4(), week, &[90.0, 70.0, 40.0], vec![]);
        assert_eq!(snapshot.avg_score, 66.67);
        assert_eq!(snapshot.trend, Trend::Up);

        let snapshot = progress_snapshot(Uuid::new_v4(), Uuid::new_v4(), week, &[50.0], vec![]);
        assert_eq!(snapshot.trend, Trend::Down);
    }

    #[test]
    fn snapshot_uses_latest_window_only() {
        let week = NaiveDate::from_ymd_opt(2024, 3, 11).unwrap();
        let mut scores = vec![100.0; SNAPSHOT_WINDOW];
        scores.push(0.0);
        let snapshot = progress_snapshot(Uuid::new_v4(), Uuid::new_v4(), week, &scores, vec![]);
        assert_eq!(snapshot.avg_score, 100.0);
    }

    #[test]
    fn recommendations_top_five_with_priorities() {
        let list = mistakes(&[("a", 4), ("b", 3), ("c", 2), ("d", 1), ("e", 1), ("f", 1)]);
        let recs = build_recommendations(Uuid::new_v4(), Uuid::new_v4(), &list, "Math", Locale::En);
        assert_eq!(recs.len(), 5);
        assert_eq!(recs[0].priority, 1);
        assert_eq!(recs[4].priority, 5);
        assert!(recs[0].text.contains("at least 5"));
        assert!(!recs[0].materials.is_empty());

        let tasks = practice_tasks(Uuid::new_v4(), &recs);
        assert_eq!(tasks.len(), 5);
        assert_eq!(tasks[0].expected_format, "SHORT_TEXT");
        assert_eq!(tasks[0].prompt, recs[0].text);
    }

    #[test]
    fn explanations_carry_links() {
        let explained = explain_mistakes(&mistakes(&[("loops", 2)]), "Programming", Locale::Ru);
        assert_eq!(explained[0].count, 2);
        assert!(explained[0].why.contains("loops"));
        assert_eq!(explained[0].materials.len(), 5);
    }
}
