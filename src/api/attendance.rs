use actix_web::{HttpResponse, web};
use chrono::NaiveDateTime;
use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};

use crate::auth::auth::AuthUser;
use crate::error::ApiError;
use crate::service::attendance::{AttendanceEngine, AttendanceQuery, CorrectionRequest};

#[derive(Deserialize, ToSchema)]
pub struct MarkEntryRequest {
    #[schema(example = 42)]
    pub employee_id: i64,

    #[schema(example = "2025-06-10T08:00:00", value_type = String)]
    pub entry_time: NaiveDateTime,

    /// Required when the entry date is more than 24 hours in the past.
    pub correction_reason: Option<String>,
}

#[derive(Deserialize, ToSchema)]
pub struct MarkExitRequest {
    #[schema(example = 42)]
    pub employee_id: i64,

    #[schema(example = "2025-06-10T16:30:00", value_type = String)]
    pub exit_time: NaiveDateTime,

    pub overtime_reason: Option<String>,
}

#[derive(Deserialize, IntoParams, ToSchema)]
pub struct SummaryQuery {
    #[param(example = 42)]
    pub employee_id: i64,
    #[param(example = 2025)]
    pub year: i32,
    #[param(example = 6)]
    pub month: u32,
}

/// Mark check-in
#[utoipa::path(
    post,
    path = "/api/v1/attendance/entry",
    request_body = MarkEntryRequest,
    responses(
        (status = 201, description = "Entry marked", body = crate::model::attendance::AttendanceRecord),
        (status = 400, description = "Future date, inactive employee or missing correction reason"),
        (status = 403, description = "Back-dated entry without super admin privilege"),
        (status = 409, description = "Entry already marked for this date"),
        (status = 401),
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn mark_entry(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    payload: web::Json<MarkEntryRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()
        .map_err(|_| ApiError::Permission("HR/Admin only".into()))?;

    let record = engine
        .mark_entry(
            payload.employee_id,
            payload.entry_time,
            &auth.actor(),
            payload.correction_reason.as_deref(),
        )
        .await?;

    Ok(HttpResponse::Created().json(record))
}

/// Mark check-out
#[utoipa::path(
    post,
    path = "/api/v1/attendance/exit",
    request_body = MarkExitRequest,
    responses(
        (status = 200, description = "Exit marked, duration and overtime computed", body = crate::model::attendance::AttendanceRecord),
        (status = 400, description = "Duration out of the 30min-24h range"),
        (status = 409, description = "Check-out already marked"),
        (status = 422, description = "No check-in found or cross-day exit"),
        (status = 401),
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn mark_exit(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    payload: web::Json<MarkExitRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()
        .map_err(|_| ApiError::Permission("HR/Admin only".into()))?;

    let record = engine
        .mark_exit(
            payload.employee_id,
            payload.exit_time,
            &auth.actor(),
            payload.overtime_reason.clone(),
        )
        .await?;

    Ok(HttpResponse::Ok().json(record))
}

/// Correct a past record
#[utoipa::path(
    put,
    path = "/api/v1/attendance/{record_id}/correct",
    params(("record_id", description = "Attendance record ID")),
    request_body = CorrectionRequest,
    responses(
        (status = 200, description = "Record corrected", body = crate::model::attendance::AttendanceRecord),
        (status = 400, description = "Reason shorter than 10 characters or invalid times"),
        (status = 404, description = "Record not found"),
        (status = 422, description = "Record is today's or older than 7 days"),
        (status = 401),
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn correct_attendance(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<i64>,
    payload: web::Json<CorrectionRequest>,
) -> Result<HttpResponse, ApiError> {
    auth.require_admin()
        .map_err(|_| ApiError::Permission("Admin only".into()))?;

    let record = engine
        .correct(path.into_inner(), &payload, &auth.actor())
        .await?;

    Ok(HttpResponse::Ok().json(record))
}

/// List attendance records
#[utoipa::path(
    get,
    path = "/api/v1/attendance",
    params(AttendanceQuery),
    responses(
        (status = 200, description = "Records, newest first", body = [crate::model::attendance::AttendanceRecord]),
        (status = 401),
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn list_attendance(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    query: web::Query<AttendanceQuery>,
) -> Result<HttpResponse, ApiError> {
    let mut filters = query.into_inner();

    // Employees see their own records only.
    if auth.is_employee() {
        let own = auth
            .employee_id
            .ok_or_else(|| ApiError::Permission("No employee profile".into()))?;
        filters.employee_id = Some(own);
    }

    let records = engine.get_attendance(&filters).await?;
    Ok(HttpResponse::Ok().json(records))
}

/// Monthly attendance summary
#[utoipa::path(
    get,
    path = "/api/v1/attendance/summary",
    params(SummaryQuery),
    responses(
        (status = 200, description = "Day counts and overtime total", body = crate::service::attendance::MonthlySummary),
        (status = 401),
        (status = 403),
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn monthly_summary(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    query: web::Query<SummaryQuery>,
) -> Result<HttpResponse, ApiError> {
    if auth.is_employee() && auth.employee_id != Some(query.employee_id) {
        return Err(ApiError::Permission(
            "Employees may only view their own summary".into(),
        ));
    }

    let summary = engine
        .monthly_summary(query.employee_id, query.year, query.month)
        .await?;
    Ok(HttpResponse::Ok().json(summary))
}

/// Records eligible for correction (yesterday back 7 days)
#[utoipa::path(
    get,
    path = "/api/v1/attendance/past-week/{employee_id}",
    params(("employee_id", description = "Employee ID")),
    responses(
        (status = 200, body = [crate::model::attendance::AttendanceRecord]),
        (status = 401),
    ),
    security(("bearer_auth" = [])),
    tag = "Attendance"
)]
pub async fn past_week(
    auth: AuthUser,
    engine: web::Data<AttendanceEngine>,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    auth.require_hr_or_admin()
        .map_err(|_| ApiError::Permission("HR/Admin only".into()))?;

    let records = engine.past_week(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(records))
}
