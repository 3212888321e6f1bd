//! Per-employee change history, written on corrections. Best-effort like the
//! audit sink: a failed write is logged and dropped.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;

#[derive(Debug, Clone)]
pub struct HistoryEntry {
    pub employee_id: i64,
    pub change_type: &'static str,
    pub previous_data: Value,
    pub new_data: Value,
    pub changed_by: i64,
    pub reason: Option<String>,
}

#[async_trait]
pub trait HistorySink: Send + Sync {
    async fn log_change(&self, entry: HistoryEntry);
}

pub struct SqlHistorySink {
    pool: SqlitePool,
}

impl SqlHistorySink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

/// Field names whose values differ between the before and after snapshots.
fn changed_fields(previous: &Value, new: &Value) -> Vec<String> {
    let (Some(prev), Some(next)) = (previous.as_object(), new.as_object()) else {
        return Vec::new();
    };

    next.iter()
        .filter(|(key, value)| prev.get(key.as_str()) != Some(value))
        .map(|(key, _)| key.clone())
        .collect()
}

#[async_trait]
impl HistorySink for SqlHistorySink {
    async fn log_change(&self, entry: HistoryEntry) {
        let fields = changed_fields(&entry.previous_data, &entry.new_data);

        let result = sqlx::query(
            r#"
            INSERT INTO history_logs
            (employee_id, change_type, previous_data, new_data, changed_fields, changed_by, reason)
            VALUES (?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(entry.employee_id)
        .bind(entry.change_type)
        .bind(entry.previous_data.to_string())
        .bind(entry.new_data.to_string())
        .bind(fields.join(","))
        .bind(entry.changed_by)
        .bind(entry.reason.as_deref())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, change_type = entry.change_type, "History log write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn changed_fields_reports_only_differences() {
        let previous = json!({"status": "pending", "exit_time": null, "date": "2025-06-10"});
        let new = json!({"status": "present", "exit_time": "2025-06-10T17:00:00", "date": "2025-06-10"});

        let mut fields = changed_fields(&previous, &new);
        fields.sort();
        assert_eq!(fields, vec!["exit_time", "status"]);
    }

    #[test]
    fn changed_fields_handles_non_objects() {
        assert!(changed_fields(&Value::Null, &serde_json::json!({"a": 1})).is_empty());
    }
}
