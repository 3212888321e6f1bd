use actix_web::{HttpResponse, web};
use chrono::{Local, NaiveDate};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::debug;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::employee::Employee;
use crate::service::audit::{AuditEvent, AuditSink, actions};
use crate::service::idgen::{EMPLOYEE_CODES, IdGenerator};
use crate::utils::sql::{build_update_sql, execute_update};

const DEFAULT_OVERTIME_MULTIPLIER: f64 = 1.5;

#[derive(Deserialize, ToSchema)]
pub struct CreateEmployee {
    #[schema(example = "John")]
    pub first_name: String,
    #[schema(example = "Doe")]
    pub last_name: String,
    #[schema(example = "john.doe@company.com", format = "email")]
    pub email: String,
    pub phone: Option<String>,
    #[schema(example = "Normal Security Staff")]
    pub job_role: Option<String>,
    pub department_id: i64,
    pub shift_id: Option<i64>,
    #[schema(example = 31000.0)]
    pub monthly_salary: f64,
    pub hourly_rate: Option<f64>,
    pub overtime_multiplier: Option<f64>,
    #[schema(example = "2024-01-01", format = "date", value_type = Option<String>)]
    pub joining_date: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct EmployeeQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub department_id: Option<i64>,
    pub shift_id: Option<i64>,
    pub is_active: Option<bool>,
    pub search: Option<String>,
}

#[derive(Serialize, ToSchema)]
pub struct EmployeeListResponse {
    pub data: Vec<Employee>,
    #[schema(example = 1)]
    pub page: u32,
    #[schema(example = 20)]
    pub per_page: u32,
    #[schema(example = 57)]
    pub total: i64,
}

/// Columns a partial update may touch. Department changes go through the
/// snapshot logic below, never straight into the row.
const UPDATABLE_COLUMNS: &[&str] = &[
    "first_name",
    "last_name",
    "phone",
    "job_role",
    "monthly_salary",
    "hourly_rate",
    "overtime_multiplier",
    "overtime_rate",
    "is_active",
];

/// Create Employee
#[utoipa::path(
    post,
    path = "/api/v1/employees",
    request_body = CreateEmployee,
    responses(
        (status = 201, description = "Employee created", body = Employee),
        (status = 404, description = "Department not found"),
        (status = 409, description = "Email already registered"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn create_employee(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    audit: web::Data<dyn AuditSink>,
    payload: web::Json<CreateEmployee>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()
        .map_err(|_| ApiError::Permission("HR/Admin only".into()))?;

    let department_name: String =
        sqlx::query_scalar("SELECT name FROM departments WHERE id = ? AND is_active = 1")
            .bind(payload.department_id)
            .fetch_optional(pool.get_ref())
            .await?
            .ok_or_else(|| ApiError::NotFound("Department not found".into()))?;

    // Shift binding is optional even in shift-based departments.
    let shift_name: Option<String> = match payload.shift_id {
        Some(shift_id) => Some(
            sqlx::query_scalar("SELECT name FROM shifts WHERE id = ? AND is_active = 1")
                .bind(shift_id)
                .fetch_optional(pool.get_ref())
                .await?
                .ok_or_else(|| ApiError::NotFound("Shift not found".into()))?,
        ),
        None => None,
    };

    let employee_code = EMPLOYEE_CODES.next_id(pool.get_ref()).await?;

    let overtime_multiplier = payload
        .overtime_multiplier
        .unwrap_or(DEFAULT_OVERTIME_MULTIPLIER);
    let overtime_rate = payload.hourly_rate.map(|rate| rate * overtime_multiplier);
    let joining_date = payload
        .joining_date
        .unwrap_or_else(|| Local::now().date_naive());

    let result = sqlx::query(
        r#"
        INSERT INTO employees
        (employee_code, first_name, last_name, email, phone, job_role,
         department_id, department_name, shift_id, shift_name,
         monthly_salary, hourly_rate, overtime_multiplier, overtime_rate, joining_date)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&employee_code)
    .bind(payload.first_name.trim())
    .bind(payload.last_name.trim())
    .bind(payload.email.trim())
    .bind(payload.phone.as_deref())
    .bind(payload.job_role.as_deref())
    .bind(payload.department_id)
    .bind(&department_name)
    .bind(payload.shift_id)
    .bind(shift_name.as_deref())
    .bind(payload.monthly_salary)
    .bind(payload.hourly_rate)
    .bind(overtime_multiplier)
    .bind(overtime_rate)
    .bind(joining_date)
    .execute(pool.get_ref())
    .await;

    let row_id = match result {
        Ok(done) => done.last_insert_rowid(),
        Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
            return Err(ApiError::Conflict("Email already registered".into()));
        }
        Err(e) => return Err(e.into()),
    };

    super::department::adjust_employee_count(pool.get_ref(), payload.department_id, 1).await;

    let employee = fetch_employee(pool.get_ref(), row_id).await?;

    audit
        .log(AuditEvent {
            action: actions::EMPLOYEE_CREATED,
            entity_type: "employee",
            entity_id: employee.employee_code.clone(),
            performed_by: auth.user_id,
            performed_by_name: auth.username.clone(),
            performed_by_role: auth.role.name(),
            target_employee_id: Some(employee.id),
            previous_data: None,
            new_data: serde_json::to_value(&employee).ok(),
            reason: None,
        })
        .await;

    Ok(HttpResponse::Created().json(employee))
}

/// List Employees (filtered, paginated)
#[utoipa::path(
    get,
    path = "/api/v1/employees",
    params(EmployeeQuery),
    responses((status = 200, body = EmployeeListResponse), (status = 401)),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn list_employees(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<EmployeeQuery>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()
        .map_err(|_| ApiError::Permission("HR/Admin only".into()))?;

    let page = query.page.unwrap_or(1).max(1);
    let per_page = query.per_page.unwrap_or(20).clamp(1, 100);
    let offset = (page - 1) * per_page;

    // ---------- build WHERE clause dynamically ----------
    let mut conditions: Vec<&str> = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(department_id) = query.department_id {
        conditions.push("department_id = ?");
        bindings.push(department_id.to_string());
    }
    if let Some(shift_id) = query.shift_id {
        conditions.push("shift_id = ?");
        bindings.push(shift_id.to_string());
    }
    if let Some(is_active) = query.is_active {
        conditions.push("is_active = ?");
        bindings.push((is_active as i64).to_string());
    }
    if let Some(search) = &query.search {
        conditions.push("(first_name LIKE ? OR last_name LIKE ? OR email LIKE ?)");
        let like = format!("%{}%", search);
        bindings.push(like.clone());
        bindings.push(like.clone());
        bindings.push(like);
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    // ---------- total count ----------
    let count_sql = format!("SELECT COUNT(*) FROM employees {}", where_clause);
    debug!(sql = %count_sql, "Counting employees");

    let mut count_query = sqlx::query_scalar::<_, i64>(&count_sql);
    for binding in &bindings {
        count_query = count_query.bind(binding);
    }
    let total = count_query.fetch_one(pool.get_ref()).await?;

    // ---------- data query ----------
    let data_sql = format!(
        "SELECT * FROM employees {} ORDER BY id DESC LIMIT ? OFFSET ?",
        where_clause
    );
    debug!(sql = %data_sql, page, per_page, "Fetching employees");

    let mut data_query = sqlx::query_as::<_, Employee>(&data_sql);
    for binding in &bindings {
        data_query = data_query.bind(binding);
    }
    data_query = data_query.bind(per_page as i64).bind(offset as i64);

    let employees = data_query.fetch_all(pool.get_ref()).await?;

    Ok(HttpResponse::Ok().json(EmployeeListResponse {
        data: employees,
        page,
        per_page,
        total,
    }))
}

/// Get Employee by ID
#[utoipa::path(
    get,
    path = "/api/v1/employees/{employee_id}",
    params(("employee_id", description = "Employee ID")),
    responses((status = 200, body = Employee), (status = 404), (status = 401)),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn get_employee(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let employee_id = path.into_inner();

    // Employees may fetch their own profile; everything else is HR/admin.
    if auth.is_employee() && auth.employee_id != Some(employee_id) {
        return Err(ApiError::Permission("No access to this profile".into()));
    }

    let employee = fetch_employee(pool.get_ref(), employee_id).await?;
    Ok(HttpResponse::Ok().json(employee))
}

/// Update Employee (partial)
#[utoipa::path(
    put,
    path = "/api/v1/employees/{employee_id}",
    params(("employee_id", description = "Employee ID")),
    request_body = Object,
    responses(
        (status = 200, description = "Employee updated", body = Employee),
        (status = 400, description = "Unknown field in payload"),
        (status = 404),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn update_employee(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    audit: web::Data<dyn AuditSink>,
    path: web::Path<i64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()
        .map_err(|_| ApiError::Permission("HR/Admin only".into()))?;

    let employee_id = path.into_inner();
    let previous = fetch_employee(pool.get_ref(), employee_id).await?;

    let mut payload = body.into_inner();
    let mut allowed: Vec<&str> = UPDATABLE_COLUMNS.to_vec();

    // A department move re-snapshots the denormalized name and keeps the
    // member counters in step.
    let new_department = payload
        .as_object()
        .and_then(|obj| obj.get("department_id"))
        .and_then(Value::as_i64);
    if let Some(department_id) = new_department {
        let name: String =
            sqlx::query_scalar("SELECT name FROM departments WHERE id = ? AND is_active = 1")
                .bind(department_id)
                .fetch_optional(pool.get_ref())
                .await?
                .ok_or_else(|| ApiError::NotFound("Department not found".into()))?;

        let obj = payload
            .as_object_mut()
            .ok_or_else(|| ApiError::Validation("Payload must be a JSON object".into()))?;
        obj.insert("department_name".into(), Value::String(name));
        allowed.push("department_id");
        allowed.push("department_name");
    }

    // Same for shift rebinding (null clears the binding).
    let shift_value = payload
        .as_object()
        .and_then(|obj| obj.get("shift_id"))
        .cloned();
    if let Some(shift_value) = shift_value {
        let shift_name = match shift_value.as_i64() {
            Some(shift_id) => Value::String(
                sqlx::query_scalar::<_, String>(
                    "SELECT name FROM shifts WHERE id = ? AND is_active = 1",
                )
                .bind(shift_id)
                .fetch_optional(pool.get_ref())
                .await?
                .ok_or_else(|| ApiError::NotFound("Shift not found".into()))?,
            ),
            None => Value::Null,
        };

        let obj = payload
            .as_object_mut()
            .ok_or_else(|| ApiError::Validation("Payload must be a JSON object".into()))?;
        obj.insert("shift_name".into(), shift_name);
        allowed.push("shift_id");
        allowed.push("shift_name");
    }

    let update = build_update_sql("employees", &payload, &allowed, "id", employee_id)?;
    let affected = execute_update(pool.get_ref(), update).await?;
    if affected == 0 {
        return Err(ApiError::NotFound("Employee not found".into()));
    }

    if let Some(department_id) = new_department {
        if department_id != previous.department_id {
            super::department::adjust_employee_count(pool.get_ref(), previous.department_id, -1)
                .await;
            super::department::adjust_employee_count(pool.get_ref(), department_id, 1).await;
        }
    }

    let employee = fetch_employee(pool.get_ref(), employee_id).await?;

    audit
        .log(AuditEvent {
            action: actions::EMPLOYEE_UPDATED,
            entity_type: "employee",
            entity_id: employee.employee_code.clone(),
            performed_by: auth.user_id,
            performed_by_name: auth.username.clone(),
            performed_by_role: auth.role.name(),
            target_employee_id: Some(employee.id),
            previous_data: serde_json::to_value(&previous).ok(),
            new_data: serde_json::to_value(&employee).ok(),
            reason: None,
        })
        .await;

    Ok(HttpResponse::Ok().json(employee))
}

/// Deactivate Employee (soft delete)
#[utoipa::path(
    delete,
    path = "/api/v1/employees/{employee_id}",
    params(("employee_id", description = "Employee ID")),
    responses(
        (status = 200, description = "Employee deactivated"),
        (status = 404),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Employee"
)]
pub async fn deactivate_employee(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    audit: web::Data<dyn AuditSink>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()
        .map_err(|_| ApiError::Permission("Admin only".into()))?;

    let employee_id = path.into_inner();
    let previous = fetch_employee(pool.get_ref(), employee_id).await?;

    if previous.is_active {
        sqlx::query(
            "UPDATE employees SET is_active = 0, updated_at = datetime('now') WHERE id = ?",
        )
        .bind(employee_id)
        .execute(pool.get_ref())
        .await?;

        super::department::adjust_employee_count(pool.get_ref(), previous.department_id, -1).await;
    }

    audit
        .log(AuditEvent {
            action: actions::EMPLOYEE_DEACTIVATED,
            entity_type: "employee",
            entity_id: previous.employee_code.clone(),
            performed_by: auth.user_id,
            performed_by_name: auth.username.clone(),
            performed_by_role: auth.role.name(),
            target_employee_id: Some(previous.id),
            previous_data: serde_json::to_value(&previous).ok(),
            new_data: None,
            reason: None,
        })
        .await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Employee deactivated"
    })))
}

async fn fetch_employee(pool: &SqlitePool, id: i64) -> Result<Employee, ApiError> {
    sqlx::query_as::<_, Employee>("SELECT * FROM employees WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Employee not found".into()))
}
