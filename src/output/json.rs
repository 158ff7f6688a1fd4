//! JSON output formatting.

use serde::Serialize;
use serde_json::json;

use crate::domain::Step;
use crate::error::HoundError;
use crate::storage::{SessionRecord, SessionStats};

/// Format a step plan as JSON.
///
/// # Errors
///
/// Returns `HoundError::Parse` if JSON serialization fails.
pub fn format_plan_json(steps: &[Step]) -> Result<String, HoundError> {
    let count = steps.len();
    let items: Vec<_> = steps
        .iter()
        .map(|s| {
            json!({
                "index": s.index,
                "duration": s.duration,
                "warmup": s.is_warmup(count),
            })
        })
        .collect();

    let output = json!({
        "target_sec": steps.last().map_or(0, |s| s.duration),
        "total_sec": steps.iter().map(|s| s.duration).sum::<u64>(),
        "count": count,
        "steps": items,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format session history as JSON.
///
/// # Errors
///
/// Returns `HoundError::Parse` if JSON serialization fails.
pub fn format_history_json(records: &[SessionRecord], user: &str) -> Result<String, HoundError> {
    let output = json!({
        "user": user,
        "count": records.len(),
        "items": records,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Format statistics as JSON.
///
/// # Errors
///
/// Returns `HoundError::Parse` if JSON serialization fails.
pub fn format_stats_json(stats: &SessionStats, user: &str) -> Result<String, HoundError> {
    let output = json!({
        "user": user,
        "stats": stats,
    });
    Ok(serde_json::to_string_pretty(&output)?)
}

/// Generic pretty-printed JSON.
///
/// # Errors
///
/// Returns `HoundError::Parse` if JSON serialization fails.
pub fn to_json<T: Serialize>(value: &T) -> Result<String, HoundError> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::SuccessLevel;
    use chrono::Utc;

    #[test]
    fn test_plan_json() {
        let steps = vec![Step::new(0, 4), Step::new(1, 6), Step::new(2, 60)];
        let value: serde_json::Value =
            serde_json::from_str(&format_plan_json(&steps).unwrap()).unwrap();

        assert_eq!(value["target_sec"], 60);
        assert_eq!(value["total_sec"], 70);
        assert_eq!(value["count"], 3);
        assert_eq!(value["steps"][0]["warmup"], true);
        assert_eq!(value["steps"][2]["warmup"], false);
    }

    #[test]
    fn test_history_json() {
        let now = Utc::now();
        let records = vec![SessionRecord {
            id: "a".to_string(),
            user_id: "alice".to_string(),
            target_sec: 30,
            success: SuccessLevel::Great,
            comment: String::new(),
            started_at: now,
            completed_at: now,
            steps: Vec::new(),
        }];

        let value: serde_json::Value =
            serde_json::from_str(&format_history_json(&records, "alice").unwrap()).unwrap();
        assert_eq!(value["count"], 1);
        assert_eq!(value["items"][0]["success"], "great");
    }

    #[test]
    fn test_stats_json_empty() {
        let result = format_stats_json(&SessionStats::default(), "").unwrap();
        assert!(result.contains("\"total_sessions\": 0"));
    }
}
