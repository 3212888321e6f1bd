use actix_web::{HttpResponse, web};
use serde::Deserialize;
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::model::shift::Shift;
use crate::service::audit::{AuditEvent, AuditSink, actions};
use crate::service::idgen::{IdGenerator, SHIFT_IDS};
use crate::service::timecalc::{parse_hhmm, shift_duration_hours};

#[derive(Deserialize, ToSchema)]
pub struct CreateShift {
    #[schema(example = "Night Watch")]
    pub name: String,

    pub department_id: i64,

    #[schema(example = "22:00")]
    pub start_time: String,

    #[schema(example = "06:00")]
    pub end_time: String,
}

#[derive(Deserialize, ToSchema)]
pub struct UpdateShift {
    pub name: Option<String>,
    pub start_time: Option<String>,
    pub end_time: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Deserialize, IntoParams, ToSchema)]
pub struct ShiftQuery {
    pub department_id: Option<i64>,
    pub is_active: Option<bool>,
}

/// Create Shift
#[utoipa::path(
    post,
    path = "/api/v1/shifts",
    request_body = CreateShift,
    responses(
        (status = 201, description = "Shift created", body = Shift),
        (status = 400, description = "Department without shifts or malformed times"),
        (status = 404, description = "Department not found"),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Shift"
)]
pub async fn create_shift(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    audit: web::Data<dyn AuditSink>,
    payload: web::Json<CreateShift>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()
        .map_err(|_| ApiError::Permission("Admin only".into()))?;

    let department = sqlx::query_as::<_, (String, bool)>(
        "SELECT name, has_shifts FROM departments WHERE id = ?",
    )
    .bind(payload.department_id)
    .fetch_optional(pool.get_ref())
    .await?
    .ok_or_else(|| ApiError::NotFound("Department not found".into()))?;

    let (department_name, has_shifts) = department;
    if !has_shifts {
        return Err(ApiError::Validation(
            "This department does not use shifts".into(),
        ));
    }

    let start = parse_hhmm(&payload.start_time)?;
    let end = parse_hhmm(&payload.end_time)?;
    let work_duration_hours = shift_duration_hours(start, end);
    let is_overnight = end <= start;

    let shift_id = SHIFT_IDS.next_id(pool.get_ref()).await?;

    let row_id = sqlx::query(
        r#"
        INSERT INTO shifts
        (shift_id, name, department_id, department_name, start_time, end_time,
         work_duration_hours, is_overnight, created_by)
        VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(&shift_id)
    .bind(payload.name.trim())
    .bind(payload.department_id)
    .bind(&department_name)
    .bind(&payload.start_time)
    .bind(&payload.end_time)
    .bind(work_duration_hours)
    .bind(is_overnight)
    .bind(auth.user_id)
    .execute(pool.get_ref())
    .await?
    .last_insert_rowid();

    let shift = fetch_shift(pool.get_ref(), row_id).await?;

    audit
        .log(AuditEvent {
            action: actions::SHIFT_CREATED,
            entity_type: "shift",
            entity_id: shift.shift_id.clone(),
            performed_by: auth.user_id,
            performed_by_name: auth.username.clone(),
            performed_by_role: auth.role.name(),
            target_employee_id: None,
            previous_data: None,
            new_data: serde_json::to_value(&shift).ok(),
            reason: None,
        })
        .await;

    Ok(HttpResponse::Created().json(shift))
}

/// List Shifts
#[utoipa::path(
    get,
    path = "/api/v1/shifts",
    params(ShiftQuery),
    responses((status = 200, body = [Shift]), (status = 401)),
    security(("bearer_auth" = [])),
    tag = "Shift"
)]
pub async fn list_shifts(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    query: web::Query<ShiftQuery>,
) -> Result<HttpResponse, ApiError> {
    let mut conditions: Vec<&str> = Vec::new();
    let mut bindings: Vec<String> = Vec::new();

    if let Some(department_id) = query.department_id {
        conditions.push("department_id = ?");
        bindings.push(department_id.to_string());
    }
    if let Some(is_active) = query.is_active {
        conditions.push("is_active = ?");
        bindings.push((is_active as i64).to_string());
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };
    let sql = format!("SELECT * FROM shifts {} ORDER BY name ASC", where_clause);

    let mut q = sqlx::query_as::<_, Shift>(&sql);
    for binding in &bindings {
        q = q.bind(binding);
    }

    Ok(HttpResponse::Ok().json(q.fetch_all(pool.get_ref()).await?))
}

/// Get Shift by ID
#[utoipa::path(
    get,
    path = "/api/v1/shifts/{shift_id}",
    params(("shift_id", description = "Shift row ID")),
    responses((status = 200, body = Shift), (status = 404), (status = 401)),
    security(("bearer_auth" = [])),
    tag = "Shift"
)]
pub async fn get_shift(
    _auth: AuthUser,
    pool: web::Data<SqlitePool>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let shift = fetch_shift(pool.get_ref(), path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(shift))
}

/// Update Shift
#[utoipa::path(
    put,
    path = "/api/v1/shifts/{shift_id}",
    params(("shift_id", description = "Shift row ID")),
    request_body = UpdateShift,
    responses(
        (status = 200, description = "Shift updated", body = Shift),
        (status = 404),
        (status = 401),
        (status = 403)
    ),
    security(("bearer_auth" = [])),
    tag = "Shift"
)]
pub async fn update_shift(
    auth: AuthUser,
    pool: web::Data<SqlitePool>,
    audit: web::Data<dyn AuditSink>,
    path: web::Path<i64>,
    body: web::Json<UpdateShift>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()
        .map_err(|_| ApiError::Permission("Admin only".into()))?;

    let shift_id = path.into_inner();
    let previous = fetch_shift(pool.get_ref(), shift_id).await?;

    let name = body.name.clone().unwrap_or_else(|| previous.name.clone());
    let start_time = body
        .start_time
        .clone()
        .unwrap_or_else(|| previous.start_time.clone());
    let end_time = body
        .end_time
        .clone()
        .unwrap_or_else(|| previous.end_time.clone());
    let is_active = body.is_active.unwrap_or(previous.is_active);

    // Recompute duration whenever either boundary moves.
    let start = parse_hhmm(&start_time)?;
    let end = parse_hhmm(&end_time)?;
    let work_duration_hours = shift_duration_hours(start, end);
    let is_overnight = end <= start;

    sqlx::query(
        r#"
        UPDATE shifts
        SET name = ?, start_time = ?, end_time = ?, work_duration_hours = ?,
            is_overnight = ?, is_active = ?, updated_at = datetime('now')
        WHERE id = ?
        "#,
    )
    .bind(&name)
    .bind(&start_time)
    .bind(&end_time)
    .bind(work_duration_hours)
    .bind(is_overnight)
    .bind(is_active)
    .bind(shift_id)
    .execute(pool.get_ref())
    .await?;

    let shift = fetch_shift(pool.get_ref(), shift_id).await?;

    audit
        .log(AuditEvent {
            action: actions::SHIFT_UPDATED,
            entity_type: "shift",
            entity_id: shift.shift_id.clone(),
            performed_by: auth.user_id,
            performed_by_name: auth.username.clone(),
            performed_by_role: auth.role.name(),
            target_employee_id: None,
            previous_data: serde_json::to_value(&previous).ok(),
            new_data: serde_json::to_value(&shift).ok(),
            reason: None,
        })
        .await;

    Ok(HttpResponse::Ok().json(shift))
}

async fn fetch_shift(pool: &SqlitePool, id: i64) -> Result<Shift, ApiError> {
    sqlx::query_as::<_, Shift>("SELECT * FROM shifts WHERE id = ?")
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Shift not found".into()))
}
