//! Best-effort audit trail. Writes must never fail a primary operation:
//! errors are logged and swallowed.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::SqlitePool;

pub mod actions {
    pub const DEPARTMENT_CREATED: &str = "department_created";
    pub const DEPARTMENT_UPDATED: &str = "department_updated";
    pub const SHIFT_CREATED: &str = "shift_created";
    pub const SHIFT_UPDATED: &str = "shift_updated";
    pub const EMPLOYEE_CREATED: &str = "employee_created";
    pub const EMPLOYEE_UPDATED: &str = "employee_updated";
    pub const EMPLOYEE_DEACTIVATED: &str = "employee_deactivated";
    pub const ATTENDANCE_MARKED: &str = "attendance_marked";
    pub const ATTENDANCE_CORRECTED: &str = "attendance_corrected";
}

#[derive(Debug, Clone)]
pub struct AuditEvent {
    pub action: &'static str,
    pub entity_type: &'static str,
    pub entity_id: String,
    pub performed_by: i64,
    pub performed_by_name: String,
    pub performed_by_role: &'static str,
    pub target_employee_id: Option<i64>,
    pub previous_data: Option<Value>,
    pub new_data: Option<Value>,
    pub reason: Option<String>,
}

#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn log(&self, event: AuditEvent);
}

pub struct SqlAuditSink {
    pool: SqlitePool,
}

impl SqlAuditSink {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AuditSink for SqlAuditSink {
    async fn log(&self, event: AuditEvent) {
        let result = sqlx::query(
            r#"
            INSERT INTO audit_logs
            (action, entity_type, entity_id, performed_by, performed_by_name,
             performed_by_role, target_employee_id, previous_data, new_data, reason)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(event.action)
        .bind(event.entity_type)
        .bind(&event.entity_id)
        .bind(event.performed_by)
        .bind(&event.performed_by_name)
        .bind(event.performed_by_role)
        .bind(event.target_employee_id)
        .bind(event.previous_data.as_ref().map(Value::to_string))
        .bind(event.new_data.as_ref().map(Value::to_string))
        .bind(event.reason.as_deref())
        .execute(&self.pool)
        .await;

        if let Err(e) = result {
            tracing::warn!(error = %e, action = event.action, "Audit log write failed");
        }
    }
}
