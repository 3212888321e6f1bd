use actix_web::{HttpResponse, web};
use serde::Deserialize;
use serde_json::Value;
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::department::Department;
use crate::service::audit::{AuditEvent, AuditSink, actions};
use crate::service::idgen::{DEPARTMENT_IDS, IdGenerator};
use crate::utils::department_cache;

#[derive(Deserialize, ToSchema)]
pub struct CreateDepartment {
    #[schema(example = "Security")]
    pub name: String,
    pub description: Option<String>,
    pub has_shifts: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct DepartmentQuery {
    pub is_active: Option<bool>,
}

const UPDATABLE_COLUMNS: &[&str] = &["name", "description", "has_shifts", "is_active"];

/// Create Department
#[utoipa::path(
    post,
    path = "/api/v1/departments",
    request_body = CreateDepartment,
    responses(
        (status = 201, description = "Department created", body = Department),
        (status = 409, description = "Department with this name already exists"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn create_department(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    audit: web::Data<dyn AuditSink>,
    payload: web::Json<CreateDepartment>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()
        .map_err(|_| ApiError::Permission("Admin only".into()))?;

    let name = payload.name.trim();
    if name.is_empty() {
        return Err(ApiError::Validation("Department name must not be empty".into()));
    }

    let taken: bool = sqlx::query_scalar(
        "SELECT EXISTS(SELECT 1 FROM departments WHERE name = ? AND is_active = 1 LIMIT 1)",
    )
    .bind(name)
    .fetch_one(pool.get_ref())
    .await?;
    if taken {
        return Err(ApiError::Conflict(
            "Department with this name already exists".into(),
        ));
    }

    let department_id = DEPARTMENT_IDS.next_id(pool.get_ref()).await?;

    let row_id = sqlx::query(
        r#"
        INSERT INTO departments (department_id, name, description, has_shifts, created_by, updated_by)
        VALUES (?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&department_id)
    .bind(name)
    .bind(payload.description.as_deref().unwrap_or(""))
    .bind(payload.has_shifts.unwrap_or(false))
    .bind(auth.user_id)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await?
    .last_insert_rowid();

    let department = fetch_department(pool.get_ref(), row_id).await?;

    audit
        .log(AuditEvent {
            action: actions::DEPARTMENT_CREATED,
            entity_type: "department",
            entity_id: department.department_id.clone(),
            performed_by: auth.user_id,
            performed_by_name: auth.username.clone(),
            performed_by_role: auth.role.name(),
            target_employee_id: None,
            previous_data: None,
            new_data: serde_json::to_value(&department).ok(),
            reason: None,
        })
        .await;

    Ok(HttpResponse::Created().json(department))
}

/// List Departments
#[utoipa::path(
    get,
    path = "/api/v1/departments",
    params(DepartmentQuery),
    responses((status = 200, body = [Department]), (status = 401)),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn list_departments(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<DepartmentQuery>,
) -> Result<HttpResponse, ApiError> {
    let departments = match query.is_active {
        Some(is_active) => {
            sqlx::query_as::<_, Department>(
                "SELECT * FROM departments WHERE is_active = ? ORDER BY name ASC",
            )
            .bind(is_active)
            .fetch_all(pool.get_ref())
            .await?
        }
        None => {
            sqlx::query_as::<_, Department>("SELECT * FROM departments ORDER BY name ASC")
                .fetch_all(pool.get_ref())
                .await?
        }
    };

    Ok(HttpResponse::Ok().json(departments))
}

/// Get Department by ID
#[utoipa::path(
    get,
    path = "/api/v1/departments/{department_id}",
    params(("department_id", description = "Department row ID")),
    responses((status = 200, body = Department), (status = 404), (status = 401)),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn get_department(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let department = fetch_department(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(department))
}

/// Update Department
#[utoipa::path(
    put,
    path = "/api/v1/departments/{department_id}",
    params(("department_id", description = "Department row ID")),
    request_body = Object,
    responses(
        (status = 200, description = "Department updated", body = Department),
        (status = 400, description = "Unknown field in payload"),
        (status = 404),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Department"
)]
pub async fn update_department(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    audit: web::Data<dyn AuditSink>,
    path: web::Path<i64>,
    body: web::Json<Value>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()
        .map_err(|_| ApiError::Permission("Admin only".into()))?;

    let department_id = path.into_inner();
    let previous = fetch_department(pool.get_ref(), department_id).await?;

    let update = crate::utils::sql::build_update_sql(
        "departments",
        &body,
        UPDATABLE_COLUMNS,
        "id",
        department_id,
    )?;
    let affected = crate::utils::sql::execute_update(pool.get_ref(), update).await?;
    if affected == 0 {
        return Err(ApiError::NotFound("Department not found".into()));
    }

    // The directory cache holds the old snapshot until told otherwise.
    department_cache::invalidate(department_id).await;

    let department = fetch_department(pool.get_ref(), department_id).await?;

    audit
        .log(AuditEvent {
            action: actions::DEPARTMENT_UPDATED,
            entity_type: "department",
            entity_id: department.department_id.clone(),
            performed_by: auth.user_id,
            performed_by_name: auth.username.clone(),
            performed_by_role: auth.role.name(),
            target_employee_id: None,
            previous_data: serde_json::to_value(&previous).ok(),
            new_data: serde_json::to_value(&department).ok(),
            reason: None,
        })
        .await;

    Ok(HttpResponse::Ok().json(department))
}

async fn fetch_department(pool: &SqlitePool, id: i64) -> Result<Department, ApiError> {
    sqlx::query_as::<_, Department>("SELECT * FROM departments WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Department not found".into()))
}

pub async fn adjust_employee_count(pool: &SqlitePool, department_id: i64, delta: i64) {
    let result = sqlx::query(
        "UPDATE departments SET employee_count = employee_count + ? WHERE id = ?",
    )
    .bind(delta)
    .bind(department_id)
    .execute(pool)
    .await;

    if let Err(e) = result {
        tracing::warn!(error = %e, department_id, "Failed to adjust employee count");
    }
}
