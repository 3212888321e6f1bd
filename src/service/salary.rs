//! On-demand salary projection. Nothing here is persisted: every call reads
//! the current attendance summary and employee pay parameters and recomputes
//! from scratch, so corrections are picked up on the next request.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;
use sqlx::SqlitePool;
use utoipa::ToSchema;

use crate::error::ApiResult;
use crate::service::attendance::AttendanceEngine;
use crate::service::directory::Directory;
use crate::service::timecalc::{DEFAULT_STANDARD_HOURS, days_in_month, round2};

const DEFAULT_OVERTIME_MULTIPLIER: f64 = 1.5;

#[derive(Debug, Serialize, ToSchema)]
pub struct SalaryProjection {
    pub employee_id: i64,
    pub employee_code: String,
    pub employee_name: String,
    pub department_id: Option<i64>,
    pub department_name: Option<String>,
    pub job_role: Option<String>,

    #[schema(example = "2025-06")]
    pub month: String,
    pub year: i32,
    pub month_number: u32,

    pub monthly_salary: f64,
    pub days_in_month: i64,
    pub days_present: i64,
    pub days_absent: i64,
    pub days_pending: i64,
    pub daily_rate: f64,
    pub base_salary: f64,

    pub overtime_hours: f64,
    pub hourly_rate: f64,
    pub overtime_rate: f64,
    pub overtime_pay: f64,

    pub calculated_salary: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DepartmentSalaryReport {
    pub department_id: i64,
    pub month: String,
    pub employee_count: usize,
    pub salaries: Vec<SalaryProjection>,
    pub total_monthly_salary: f64,
    pub total_calculated_salary: f64,
    pub average_days_present: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct SystemSalaryReport {
    pub month: String,
    pub department_count: usize,
    pub departments: Vec<DepartmentSalaryReport>,
    pub total_employees: usize,
    pub total_monthly_salary: f64,
    pub total_calculated_salary: f64,
}

pub struct SalaryService {
    pool: SqlitePool,
    directory: Arc<dyn Directory>,
    engine: Arc<AttendanceEngine>,
}

impl SalaryService {
    pub fn new(pool: SqlitePool, directory: Arc<dyn Directory>, engine: Arc<AttendanceEngine>) -> Self {
        Self {
            pool,
            directory,
            engine,
        }
    }

    pub async fn calculate(
        &self,
        employee_id: i64,
        year: i32,
        month: u32,
    ) -> ApiResult<SalaryProjection> {
        let employee = self.directory.employee(employee_id).await?;
        let summary = self.engine.monthly_summary(employee_id, year, month).await?;

        let days = days_in_month(year, month)?;
        let daily_rate = employee.monthly_salary / days as f64;
        let base_salary = daily_rate * summary.days_present as f64;

        let hourly_rate = employee
            .hourly_rate
            .unwrap_or(employee.monthly_salary / (days as f64 * DEFAULT_STANDARD_HOURS));
        let multiplier = employee
            .overtime_multiplier
            .unwrap_or(DEFAULT_OVERTIME_MULTIPLIER);
        let overtime_rate = employee.overtime_rate.unwrap_or(hourly_rate * multiplier);
        let overtime_pay = summary.overtime_hours * overtime_rate;

        let calculated_salary = base_salary + overtime_pay;

        Ok(SalaryProjection {
            employee_id: employee.id,
            employee_code: employee.employee_code,
            employee_name: employee.name,
            department_id: employee.department_id,
            department_name: employee.department_name,
            job_role: employee.job_role,
            month: format!("{year:04}-{month:02}"),
            year,
            month_number: month,
            monthly_salary: round2(employee.monthly_salary),
            days_in_month: days,
            days_present: summary.days_present,
            days_absent: summary.days_absent,
            days_pending: summary.days_pending,
            daily_rate: round2(daily_rate),
            base_salary: round2(base_salary),
            overtime_hours: round2(summary.overtime_hours),
            hourly_rate: round2(hourly_rate),
            overtime_rate: round2(overtime_rate),
            overtime_pay: round2(overtime_pay),
            calculated_salary: round2(calculated_salary),
        })
    }

    /// Projection for every active employee of one department. Individual
    /// failures are logged and skipped so one broken record does not take
    /// down the whole report.
    pub async fn department_report(
        &self,
        department_id: i64,
        year: i32,
        month: u32,
    ) -> ApiResult<DepartmentSalaryReport> {
        let employee_ids: Vec<i64> = sqlx::query_scalar(
            "SELECT id FROM employees WHERE department_id = ? AND is_active = 1",
        )
        .bind(department_id)
        .fetch_all(&self.pool)
        .await?;

        let results = join_all(
            employee_ids
                .iter()
                .map(|&id| self.calculate(id, year, month)),
        )
        .await;

        let mut salaries = Vec::with_capacity(results.len());
        for (id, result) in employee_ids.iter().zip(results) {
            match result {
                Ok(projection) => salaries.push(projection),
                Err(e) => {
                    tracing::error!(employee_id = id, error = %e, "Salary calculation failed")
                }
            }
        }

        let total_monthly_salary: f64 = salaries.iter().map(|s| s.monthly_salary).sum();
        let total_calculated_salary: f64 = salaries.iter().map(|s| s.calculated_salary).sum();
        let average_days_present = if salaries.is_empty() {
            0.0
        } else {
            salaries.iter().map(|s| s.days_present).sum::<i64>() as f64 / salaries.len() as f64
        };

        Ok(DepartmentSalaryReport {
            department_id,
            month: format!("{year:04}-{month:02}"),
            employee_count: salaries.len(),
            salaries,
            total_monthly_salary: round2(total_monthly_salary),
            total_calculated_salary: round2(total_calculated_salary),
            average_days_present: round2(average_days_present),
        })
    }

    pub async fn system_report(&self, year: i32, month: u32) -> ApiResult<SystemSalaryReport> {
        let department_ids: Vec<i64> =
            sqlx::query_scalar("SELECT id FROM departments WHERE is_active = 1")
                .fetch_all(&self.pool)
                .await?;

        let results = join_all(
            department_ids
                .iter()
                .map(|&id| self.department_report(id, year, month)),
        )
        .await;

        let mut departments = Vec::with_capacity(results.len());
        for (id, result) in department_ids.iter().zip(results) {
            match result {
                Ok(report) => departments.push(report),
                Err(e) => {
                    tracing::error!(department_id = id, error = %e, "Department report failed")
                }
            }
        }

        let total_employees = departments.iter().map(|d| d.employee_count).sum();
        let total_monthly_salary: f64 = departments.iter().map(|d| d.total_monthly_salary).sum();
        let total_calculated_salary: f64 =
            departments.iter().map(|d| d.total_calculated_salary).sum();

        Ok(SystemSalaryReport {
            month: format!("{year:04}-{month:02}"),
            department_count: departments.len(),
            departments,
            total_employees,
            total_monthly_salary: round2(total_monthly_salary),
            total_calculated_salary: round2(total_calculated_salary),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::model::attendance::AttendanceStatus;
    use crate::service::audit::SqlAuditSink;
    use crate::service::directory::SqlDirectory;
    use crate::service::history::SqlHistorySink;
    use chrono::{Datelike, NaiveDate};

    async fn service() -> (SalaryService, SqlitePool) {
        let pool = test_pool().await;
        let directory: Arc<dyn Directory> = Arc::new(SqlDirectory::new(pool.clone()));
        let engine = Arc::new(AttendanceEngine::new(
            pool.clone(),
            directory.clone(),
            Arc::new(SqlAuditSink::new(pool.clone())),
            Arc::new(SqlHistorySink::new(pool.clone())),
        ));
        (SalaryService::new(pool.clone(), directory, engine), pool)
    }

    async fn seed_employee(pool: &SqlitePool, id: i64, monthly_salary: f64) {
        sqlx::query(
            r#"
            INSERT INTO employees
            (id, employee_code, first_name, last_name, email, department_id,
             department_name, monthly_salary, joining_date)
            VALUES (?, ?, 'Jane', 'Smith', ?, 10, 'Security', ?, '2024-01-01')
            "#,
        )
        .bind(id)
        .bind(format!("EMP_{id:05}"))
        .bind(format!("jane{id}@company.com"))
        .bind(monthly_salary)
        .execute(pool)
        .await
        .unwrap();
    }

    async fn seed_present_day(
        pool: &SqlitePool,
        employee_id: i64,
        date: NaiveDate,
        overtime_hours: f64,
    ) {
        sqlx::query(
            r#"
            INSERT INTO attendance
            (attendance_id, employee_id, employee_code, employee_name,
             department_id, department_name, date, status, overtime_hours, marked_by)
            VALUES (?, ?, 'EMP_00001', 'Jane Smith', 10, 'Security', ?, ?, ?, 900)
            "#,
        )
        .bind(format!("ATT_S{employee_id}{}", date.format("%m%d")))
        .bind(employee_id)
        .bind(date)
        .bind(AttendanceStatus::Present)
        .bind(overtime_hours)
        .execute(pool)
        .await
        .unwrap();
    }

    #[actix_web::test]
    async fn projection_combines_base_and_overtime_pay() {
        let (service, pool) = service().await;
        seed_employee(&pool, 1, 31000.0).await;

        let may = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        for day in 1..=20 {
            let overtime = if day <= 10 { 1.0 } else { 0.0 };
            seed_present_day(&pool, 1, may.with_day(day).unwrap(), overtime).await;
        }

        let projection = service.calculate(1, 2025, 5).await.unwrap();

        // 31 days, 31000 salary: daily rate 1000, hourly 125, overtime 187.5
        assert_eq!(projection.days_in_month, 31);
        assert_eq!(projection.days_present, 20);
        assert_eq!(projection.daily_rate, 1000.0);
        assert_eq!(projection.base_salary, 20000.0);
        assert_eq!(projection.overtime_hours, 10.0);
        assert_eq!(projection.hourly_rate, 125.0);
        assert_eq!(projection.overtime_rate, 187.5);
        assert_eq!(projection.overtime_pay, 1875.0);
        assert_eq!(projection.calculated_salary, 21875.0);
    }

    #[actix_web::test]
    async fn projection_is_deterministic_without_new_attendance() {
        let (service, pool) = service().await;
        seed_employee(&pool, 1, 30000.0).await;

        let june = NaiveDate::from_ymd_opt(2025, 6, 1).unwrap();
        seed_present_day(&pool, 1, june, 2.0).await;

        let first = service.calculate(1, 2025, 6).await.unwrap();
        let second = service.calculate(1, 2025, 6).await.unwrap();

        assert_eq!(first.calculated_salary, second.calculated_salary);
        assert_eq!(first.overtime_pay, second.overtime_pay);
        assert_eq!(first.base_salary, second.base_salary);
    }

    #[actix_web::test]
    async fn explicit_rates_override_derived_ones() {
        let (service, pool) = service().await;
        seed_employee(&pool, 1, 31000.0).await;
        sqlx::query("UPDATE employees SET hourly_rate = 200.0, overtime_rate = 500.0 WHERE id = 1")
            .execute(&pool)
            .await
            .unwrap();

        let may = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        seed_present_day(&pool, 1, may, 2.0).await;

        let projection = service.calculate(1, 2025, 5).await.unwrap();
        assert_eq!(projection.hourly_rate, 200.0);
        assert_eq!(projection.overtime_rate, 500.0);
        assert_eq!(projection.overtime_pay, 1000.0);
    }

    #[actix_web::test]
    async fn department_report_totals_member_projections() {
        let (service, pool) = service().await;
        sqlx::query(
            "INSERT INTO departments (id, department_id, name) VALUES (10, 'DEPT_SEC1', 'Security')",
        )
        .execute(&pool)
        .await
        .unwrap();
        seed_employee(&pool, 1, 31000.0).await;
        seed_employee(&pool, 2, 62000.0).await;

        let may = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        seed_present_day(&pool, 1, may.with_day(5).unwrap(), 0.0).await;
        seed_present_day(&pool, 2, may.with_day(5).unwrap(), 0.0).await;
        seed_present_day(&pool, 2, may.with_day(6).unwrap(), 0.0).await;

        let report = service.department_report(10, 2025, 5).await.unwrap();
        assert_eq!(report.employee_count, 2);
        assert_eq!(report.total_monthly_salary, 93000.0);
        // 1 day at 1000 + 2 days at 2000
        assert_eq!(report.total_calculated_salary, 5000.0);
        assert_eq!(report.average_days_present, 1.5);

        let system = service.system_report(2025, 5).await.unwrap();
        assert_eq!(system.department_count, 1);
        assert_eq!(system.total_employees, 2);
        assert_eq!(system.total_calculated_salary, 5000.0);
    }
}
