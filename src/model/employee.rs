use chrono::{NaiveDate, NaiveDateTime};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, sqlx::FromRow, ToSchema)]
#[schema(
    example = json!({
        "id": 1,
        "employee_code": "EMP_00001",
        "first_name": "John",
        "last_name": "Doe",
        "email": "john.doe@company.com",
        "department_id": 10,
        "department_name": "Security",
        "monthly_salary": 31000.0,
        "is_active": true,
        "joining_date": "2024-01-01"
    })
)]
pub struct Employee {
    pub id: i64,

    #[schema(example = "EMP_00001")]
    pub employee_code: String,

    #[schema(example = "John")]
    pub first_name: String,

    #[schema(example = "Doe")]
    pub last_name: String,

    #[schema(example = "john.doe@company.com")]
    pub email: String,

    #[schema(example = "+8801712345678", nullable = true)]
    pub phone: Option<String>,

    #[schema(example = "Normal Security Staff", nullable = true)]
    pub job_role: Option<String>,

    pub department_id: i64,
    pub department_name: String,

    pub shift_id: Option<i64>,
    pub shift_name: Option<String>,

    #[schema(example = 31000.0)]
    pub monthly_salary: f64,

    pub hourly_rate: Option<f64>,
    pub overtime_multiplier: Option<f64>,
    pub overtime_rate: Option<f64>,

    pub is_active: bool,

    #[schema(example = "2024-01-01", value_type = String, format = "date")]
    pub joining_date: NaiveDate,

    #[schema(value_type = String)]
    pub created_at: NaiveDateTime,

    #[schema(value_type = String)]
    pub updated_at: NaiveDateTime,
}
