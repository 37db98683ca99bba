//! Relevance scoring for normalized job records.

use chrono::{DateTime, Utc};
use jobflow_shared::JobRecord;

const BASE_SCORE: i32 = 50;
const REMOTE_BONUS: i32 = 20;
const SALARY_BONUS: i32 = 15;
const FRESH_BONUS: i32 = 15;
const RECENT_BONUS: i32 = 10;
const SENIORITY_BONUS: i32 = 10;
const TECH_BONUS: i32 = 5;

const SENIORITY_KEYWORDS: &[&str] = &["senior", "lead", "architect", "principal", "staff"];
const TECH_KEYWORDS: &[&str] = &["react", "node", "python", "aws", "kubernetes"];

/// Score `record` in `[0, 100]` as of `now`.
///
/// Bonuses stack: remote, a known salary bound, freshness (posted under 6 h,
/// or else under 24 h), and every seniority or technology keyword found in
/// the title.
pub fn relevance_score(record: &JobRecord, now: DateTime<Utc>) -> u8 {
    let mut score = BASE_SCORE;

    if record.is_remote {
        score += REMOTE_BONUS;
    }
    if record.has_salary() {
        score += SALARY_BONUS;
    }

    let hours = (now - record.posted_at).num_hours();
    if hours < 6 {
        score += FRESH_BONUS;
    } else if hours < 24 {
        score += RECENT_BONUS;
    }

    let title = record.title.to_lowercase();
    score += keyword_hits(&title, SENIORITY_KEYWORDS) * SENIORITY_BONUS;
    score += keyword_hits(&title, TECH_KEYWORDS) * TECH_BONUS;

    score.clamp(0, 100) as u8
}

fn keyword_hits(title: &str, keywords: &[&str]) -> i32 {
    keywords.iter().filter(|k| title.contains(*k)).count() as i32
}
