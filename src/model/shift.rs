use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

/// Shift times are wall-clock HH:MM strings. A shift whose end is at or
/// before its start wraps past midnight and is flagged `is_overnight`.
#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Shift {
    pub id: i64,

    #[schema(example = "SHIFT_N2Q7")]
    pub shift_id: String,

    #[schema(example = "Night Watch")]
    pub name: String,

    pub department_id: i64,
    pub department_name: String,

    #[schema(example = "22:00")]
    pub start_time: String,

    #[schema(example = "06:00")]
    pub end_time: String,

    #[schema(example = 8.0)]
    pub work_duration_hours: f64,

    pub is_overnight: bool,
    pub is_active: bool,

    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,

    #[schema(value_type = String)]
    pub updated_at: NaiveDateTime,
}
