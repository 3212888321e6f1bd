use actix_web::{HttpResponse, web};
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::service::salary::SalaryService;

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct SalaryQuery {
    #[param(example = 42)]
    pub employee_id: i64,
    #[param(example = 2025)]
    pub year: i32,
    #[param(example = 6)]
    pub month: u32,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct ReportQuery {
    #[param(example = 2025)]
    pub year: i32,
    #[param(example = 6)]
    pub month: u32,
}

/// Monthly salary projection for one employee
#[utoipa::path(
    get,
    path = "/api/v1/salary",
    params(SalaryQuery),
    responses(
        (status = 200, description = "Projection, recomputed from current attendance", body = crate::service::salary::SalaryProjection),
        (status = 404, description = "Employee not found"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Salary"
)]
pub async fn get_salary(
    auth: AuthUser,
    salary: web::Data<SalaryService>,
    query: web::Query<SalaryQuery>,
) -> Result<HttpResponse, ApiError> {
    // Employees may look at their own projection; payroll-wide access is HR/admin.
    if auth.is_employee() && auth.employee_id != Some(query.employee_id) {
        return Err(ApiError::Permission(
            "Employees may only view their own salary".into(),
        ));
    }

    let projection = salary
        .calculate(query.employee_id, query.year, query.month)
        .await?;
    Ok(HttpResponse::Ok().json(projection))
}

/// Department-wide salary report
#[utoipa::path(
    get,
    path = "/api/v1/salary/department/{department_id}",
    params(
        ("department_id", description = "Department row ID"),
        ReportQuery
    ),
    responses(
        (status = 200, body = crate::service::salary::DepartmentSalaryReport),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Salary"
)]
pub async fn department_report(
    auth: AuthUser,
    salary: web::Data<SalaryService>,
    path: web::Path<i64>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()
        .map_err(|_| ApiError::Permission("Admin only".into()))?;

    let report = salary
        .department_report(path.into_inner(), query.year, query.month)
        .await?;
    Ok(HttpResponse::Ok().json(report))
}

/// System-wide salary report
#[utoipa::path(
    get,
    path = "/api/v1/salary/report",
    params(ReportQuery),
    responses(
        (status = 200, body = crate::service::salary::SystemSalaryReport),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Salary"
)]
pub async fn system_report(
    auth: AuthUser,
    salary: web::Data<SalaryService>,
    query: web::Query<ReportQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()
        .map_err(|_| ApiError::Permission("Admin only".into()))?;

    let report = salary.system_report(query.year, query.month).await?;
    Ok(HttpResponse::Ok().json(report))
}
