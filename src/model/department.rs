use chrono::NaiveDateTime;
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
pub struct Department {
    pub id: i64,

    #[schema(example = "DEPT_K4M2")]
    pub department_id: String,

    #[schema(example = "Security")]
    pub name: String,

    pub description: String,
    pub has_shifts: bool,
    pub employee_count: i64,
    pub is_active: bool,

    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,

    #[schema(value_type = String)]
    pub updated_at: NaiveDateTime,
}
