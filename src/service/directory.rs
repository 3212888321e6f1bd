//! Read-only directory lookups consumed by the attendance engine and the
//! salary projection. The trait seam exists so tests can inject fakes.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::error::{ApiError, ApiResult};
use crate::utils::department_cache;

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct EmployeeSnapshot {
    pub id: i64,
    pub employee_code: String,
    pub name: String,
    pub is_active: bool,
    pub department_id: Option<i64>,
    pub department_name: Option<String>,
    pub shift_id: Option<i64>,
    pub shift_name: Option<String>,
    pub job_role: Option<String>,
    pub monthly_salary: f64,
    pub hourly_rate: Option<f64>,
    pub overtime_multiplier: Option<f64>,
    pub overtime_rate: Option<f64>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DepartmentSnapshot {
    pub id: i64,
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ShiftSnapshot {
    pub id: i64,
    pub name: String,
    pub standard_hours: f64,
    pub is_overnight: bool,
}

#[async_trait]
pub trait Directory: Send + Sync {
    async fn employee(&self, employee_id: i64) -> ApiResult<EmployeeSnapshot>;
    async fn department(&self, department_id: i64) -> ApiResult<DepartmentSnapshot>;
    async fn shift(&self, shift_id: i64) -> ApiResult<ShiftSnapshot>;
}

pub struct SqlDirectory {
    pool: SqlitePool,
}

impl SqlDirectory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Directory for SqlDirectory {
    async fn employee(&self, employee_id: i64) -> ApiResult<EmployeeSnapshot> {
        sqlx::query_as::<_, EmployeeSnapshot>(
            r#"
            SELECT
                id,
                employee_code,
                first_name || ' ' || last_name AS name,
                is_active,
                department_id,
                department_name,
                shift_id,
                shift_name,
                job_role,
                monthly_salary,
                hourly_rate,
                overtime_multiplier,
                overtime_rate
            FROM employees
            WHERE id = ?
            "#,
        )
        .bind(employee_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Employee not found".into()))
    }

    async fn department(&self, department_id: i64) -> ApiResult<DepartmentSnapshot> {
        if let Some(snapshot) = department_cache::get(department_id).await {
            return Ok(snapshot);
        }

        let snapshot = sqlx::query_as::<_, DepartmentSnapshot>(
            "SELECT id, name, is_active FROM departments WHERE id = ?",
        )
        .bind(department_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Department not found".into()))?;

        department_cache::put(snapshot.clone()).await;
        Ok(snapshot)
    }

    async fn shift(&self, shift_id: i64) -> ApiResult<ShiftSnapshot> {
        sqlx::query_as::<_, ShiftSnapshot>(
            r#"
            SELECT id, name, work_duration_hours AS standard_hours, is_overnight
            FROM shifts
            WHERE id = ?
            "#,
        )
        .bind(shift_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Shift not found".into()))
    }
}
