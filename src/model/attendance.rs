use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use utoipa::ToSchema;

/// Lifecycle of one attendance record.
///
/// `Pending` is set at entry; `Present` at exit (or by a correction that
/// rewrites times); `Absent` and `HalfDay` are only reachable through the
/// correction path.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    sqlx::Type,
    Display,
    EnumString,
    ToSchema,
)]
#[serde(rename_all = "snake_case")]
#[sqlx(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AttendanceStatus {
    Pending,
    Present,
    Absent,
    HalfDay,
}

/// One row per (employee, calendar date).
///
/// Employee, department and shift names are snapshots taken at mark time;
/// they intentionally go stale when the directory changes afterwards.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct AttendanceRecord {
    pub id: i64,

    #[schema(example = "ATT_X7K2P9")]
    pub attendance_id: String,

    pub employee_id: i64,

    #[schema(example = "EMP_00042")]
    pub employee_code: String,

    #[schema(example = "John Doe")]
    pub employee_name: String,

    pub department_id: i64,

    #[schema(example = "Security")]
    pub department_name: String,

    pub shift_id: Option<i64>,
    pub shift_name: Option<String>,

    #[schema(example = "2025-06-10", value_type = String, format = "date")]
    pub date: NaiveDate,

    #[schema(example = "2025-06-10T08:00:00", value_type = Option<String>)]
    pub entry_time: Option<NaiveDateTime>,

    #[schema(example = "2025-06-10T16:30:00", value_type = Option<String>)]
    pub exit_time: Option<NaiveDateTime>,

    pub work_duration_minutes: Option<i64>,
    pub regular_hours: Option<f64>,
    pub overtime_hours: Option<f64>,
    pub total_hours: Option<f64>,

    pub status: AttendanceStatus,

    pub is_corrected: bool,
    pub corrected_by: Option<i64>,
    pub correction_reason: Option<String>,

    pub overtime_approved_by: Option<i64>,
    pub overtime_reason: Option<String>,

    pub marked_by: i64,

    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,

    #[schema(value_type = String)]
    pub updated_at: NaiveDateTime,
}
