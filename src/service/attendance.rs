//! The attendance engine: entry/exit state machine, correction workflow and
//! read-side aggregation. All collaborators are injected so the rule chain
//! can be exercised against fakes.

use std::sync::Arc;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use serde::Deserialize;
use serde_json::json;
use sqlx::SqlitePool;
use utoipa::{IntoParams, ToSchema};

use crate::error::{ApiError, ApiResult};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::role::Role;
use crate::service::audit::{AuditEvent, AuditSink, actions};
use crate::service::directory::Directory;
use crate::service::history::{HistoryEntry, HistorySink};
use crate::service::idgen::{ATTENDANCE_IDS, IdGenerator};
use crate::service::timecalc::{
    self, DEFAULT_STANDARD_HOURS, MAX_WORK_MINUTES, MIN_WORK_MINUTES,
};

/// The authenticated user performing an operation, as seen by the engine.
#[derive(Debug, Clone)]
pub struct Actor {
    pub user_id: i64,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct CorrectionRequest {
    /// Justification, at least 10 characters after trimming.
    #[schema(example = "Forgot to check out on Friday")]
    pub reason: String,

    #[schema(example = "2025-06-10T08:00:00", value_type = Option<String>)]
    pub entry_time: Option<NaiveDateTime>,

    #[schema(example = "2025-06-10T17:00:00", value_type = Option<String>)]
    pub exit_time: Option<NaiveDateTime>,

    pub status: Option<AttendanceStatus>,
}

#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct AttendanceQuery {
    pub employee_id: Option<i64>,
    pub department_id: Option<i64>,

    #[param(value_type = Option<String>, format = "date")]
    pub date: Option<NaiveDate>,

    pub status: Option<AttendanceStatus>,

    #[param(value_type = Option<String>, format = "date")]
    pub start_date: Option<NaiveDate>,

    #[param(value_type = Option<String>, format = "date")]
    pub end_date: Option<NaiveDate>,

    pub limit: Option<u32>,
    pub offset: Option<u32>,
}

#[derive(Debug, serde::Serialize, ToSchema)]
pub struct MonthlySummary {
    pub total_records: i64,
    pub days_present: i64,
    pub days_absent: i64,
    pub days_pending: i64,
    pub overtime_hours: f64,
}

pub struct AttendanceEngine {
    pool: SqlitePool,
    directory: Arc<dyn Directory>,
    audit: Arc<dyn AuditSink>,
    history: Arc<dyn HistorySink>,
}

impl AttendanceEngine {
    pub fn new(
        pool: SqlitePool,
        directory: Arc<dyn Directory>,
        audit: Arc<dyn AuditSink>,
        history: Arc<dyn HistorySink>,
    ) -> Self {
        Self {
            pool,
            directory,
            audit,
            history,
        }
    }

    /// Mark check-in for an employee. Admin-only at the route layer; the
    /// engine enforces the data rules, including the sliding 24-hour cutoff
    /// that reserves back-dated entries for super admins.
    pub async fn mark_entry(
        &self,
        employee_id: i64,
        entry_time: NaiveDateTime,
        actor: &Actor,
        correction_reason: Option<&str>,
    ) -> ApiResult<AttendanceRecord> {
        let entry_date = entry_time.date();
        let today = Local::now().date_naive();

        if entry_date > today {
            return Err(ApiError::Validation(
                "Cannot mark attendance for future dates".into(),
            ));
        }

        if let Some(existing) = self.by_date(employee_id, entry_date).await? {
            if existing.entry_time.is_some() {
                return Err(ApiError::Conflict("Entry already marked for this date".into()));
            }
        }

        let employee = self.directory.employee(employee_id).await?;
        if !employee.is_active {
            return Err(ApiError::Validation("Employee is inactive or not found".into()));
        }

        let department_id = employee
            .department_id
            .ok_or_else(|| ApiError::Validation("Employee has no department assigned".into()))?;
        let department = self.directory.department(department_id).await?;
        if !department.is_active {
            return Err(ApiError::Validation("Employee's department is inactive".into()));
        }

        // Sliding cutoff: measured from the start of the entry date, so a
        // same-day mark is always inside the window.
        let hours_past = (Local::now().naive_local() - entry_date.and_time(NaiveTime::MIN))
            .num_seconds() as f64
            / 3600.0;
        let is_corrected = hours_past > 24.0;

        if is_corrected {
            if actor.role != Role::SuperAdmin {
                return Err(ApiError::Permission(
                    "Cannot mark attendance older than 24 hours. Contact super admin for corrections."
                        .into(),
                ));
            }
            if correction_reason.map_or(true, |r| r.trim().is_empty()) {
                return Err(ApiError::Validation(
                    "A correction reason is required for attendance older than 24 hours".into(),
                ));
            }
        }

        let attendance_id = ATTENDANCE_IDS.next_id(&self.pool).await?;
        let corrected_by = is_corrected.then_some(actor.user_id);
        let reason = if is_corrected {
            correction_reason.map(|r| r.trim().to_string())
        } else {
            None
        };

        let result = sqlx::query(
            r#"
            INSERT INTO attendance
            (attendance_id, employee_id, employee_code, employee_name,
             department_id, department_name, shift_id, shift_name,
             date, entry_time, status, is_corrected, corrected_by,
             correction_reason, marked_by)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&attendance_id)
        .bind(employee.id)
        .bind(&employee.employee_code)
        .bind(&employee.name)
        .bind(department.id)
        .bind(&department.name)
        .bind(employee.shift_id)
        .bind(employee.shift_name.as_deref())
        .bind(entry_date)
        .bind(entry_time)
        .bind(AttendanceStatus::Pending)
        .bind(is_corrected)
        .bind(corrected_by)
        .bind(reason.as_deref())
        .bind(actor.user_id)
        .execute(&self.pool)
        .await;

        let row_id = match result {
            Ok(done) => done.last_insert_rowid(),
            // Two concurrent marks can both pass the lookup above; the unique
            // (employee_id, date) index turns the loser into a clean conflict.
            Err(sqlx::Error::Database(db_err)) if db_err.is_unique_violation() => {
                return Err(ApiError::Conflict("Entry already marked for this date".into()));
            }
            Err(e) => return Err(e.into()),
        };

        let record = self.fetch(row_id).await?;

        self.audit
            .log(AuditEvent {
                action: actions::ATTENDANCE_MARKED,
                entity_type: "attendance",
                entity_id: record.attendance_id.clone(),
                performed_by: actor.user_id,
                performed_by_name: actor.name.clone(),
                performed_by_role: actor.role.name(),
                target_employee_id: Some(employee.id),
                previous_data: None,
                new_data: serde_json::to_value(&record).ok(),
                reason: record.correction_reason.clone(),
            })
            .await;

        tracing::info!(
            employee_id,
            attendance_id = %record.attendance_id,
            date = %record.date,
            "Entry marked"
        );

        Ok(record)
    }

    /// Mark check-out, compute the worked duration and split it into regular
    /// and overtime hours against the bound shift (default 8h standard).
    pub async fn mark_exit(
        &self,
        employee_id: i64,
        exit_time: NaiveDateTime,
        actor: &Actor,
        overtime_reason: Option<String>,
    ) -> ApiResult<AttendanceRecord> {
        let exit_date = exit_time.date();
        let today = Local::now().date_naive();

        if exit_date > today {
            return Err(ApiError::Validation(
                "Cannot mark check-out for future dates".into(),
            ));
        }

        let record = match self.by_date(employee_id, exit_date).await? {
            Some(record) => Some(record),
            None => self.open_overnight_record(employee_id, exit_date).await?,
        };
        let record = record.ok_or_else(|| {
            ApiError::State("No attendance record found for this date. Mark entry first.".into())
        })?;

        let entry_time = record
            .entry_time
            .ok_or_else(|| ApiError::State("No check-in found. Mark entry first.".into()))?;

        if record.exit_time.is_some() {
            return Err(ApiError::Conflict(
                "Check-out already marked for this date".into(),
            ));
        }

        if exit_time <= entry_time {
            return Err(ApiError::State(
                "Check-out time must be after check-in time".into(),
            ));
        }

        let shift = match record.shift_id {
            Some(shift_id) => self.directory.shift(shift_id).await.ok(),
            None => None,
        };

        let entry_date = entry_time.date();
        if entry_date != exit_date {
            let overnight_allowed = shift.as_ref().is_some_and(|s| s.is_overnight)
                && entry_date.succ_opt() == Some(exit_date);
            if !overnight_allowed {
                return Err(ApiError::State(
                    "Check-in and check-out must be on the same day".into(),
                ));
            }
        }

        let minutes = timecalc::duration_minutes(entry_time, exit_time);
        if minutes < MIN_WORK_MINUTES {
            return Err(ApiError::Validation(
                "Work duration less than 30 minutes. Please verify times.".into(),
            ));
        }
        if minutes > MAX_WORK_MINUTES {
            return Err(ApiError::Validation(
                "Work duration exceeds 24 hours. Please verify times.".into(),
            ));
        }

        let standard_hours = shift
            .as_ref()
            .map_or(DEFAULT_STANDARD_HOURS, |s| s.standard_hours);
        let split = timecalc::split_hours(minutes, standard_hours);
        // No separate approval step: overtime recorded at exit is credited to
        // the marking actor.
        let overtime_approved_by = (split.overtime_hours > 0.0).then_some(actor.user_id);

        sqlx::query(
            r#"
            UPDATE attendance
            SET exit_time = ?,
                work_duration_minutes = ?,
                regular_hours = ?,
                overtime_hours = ?,
                total_hours = ?,
                overtime_approved_by = ?,
                overtime_reason = ?,
                status = ?,
                updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(exit_time)
        .bind(minutes)
        .bind(split.regular_hours)
        .bind(split.overtime_hours)
        .bind(split.total_hours)
        .bind(overtime_approved_by)
        .bind(overtime_reason.as_deref())
        .bind(AttendanceStatus::Present)
        .bind(record.id)
        .execute(&self.pool)
        .await?;

        let updated = self.fetch(record.id).await?;

        self.audit
            .log(AuditEvent {
                action: actions::ATTENDANCE_MARKED,
                entity_type: "attendance",
                entity_id: updated.attendance_id.clone(),
                performed_by: actor.user_id,
                performed_by_name: actor.name.clone(),
                performed_by_role: actor.role.name(),
                target_employee_id: Some(updated.employee_id),
                previous_data: Some(json!({ "exit_time": null, "status": "pending" })),
                new_data: serde_json::to_value(&updated).ok(),
                reason: None,
            })
            .await;

        tracing::info!(
            employee_id,
            attendance_id = %updated.attendance_id,
            minutes,
            overtime_hours = split.overtime_hours,
            "Exit marked"
        );

        Ok(updated)
    }

    /// Retroactive correction of a past record, allowed for the last 7 days
    /// only. Today's record must go through mark_entry/mark_exit instead.
    pub async fn correct(
        &self,
        record_id: i64,
        corrections: &CorrectionRequest,
        actor: &Actor,
    ) -> ApiResult<AttendanceRecord> {
        let previous = self
            .maybe_fetch(record_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Attendance record not found".into()))?;

        let today = Local::now().date_naive();

        if previous.date == today {
            return Err(ApiError::State(
                "Cannot correct today's attendance. Use mark entry/exit instead.".into(),
            ));
        }

        let days_diff = (today - previous.date).num_days();
        if days_diff > 7 {
            return Err(ApiError::State(
                "Can only correct attendance from the past 7 days".into(),
            ));
        }

        let reason = corrections.reason.trim();
        if reason.len() < 10 {
            return Err(ApiError::Validation(
                "Correction reason is required and must be at least 10 characters".into(),
            ));
        }

        if let (Some(entry), Some(exit)) = (corrections.entry_time, corrections.exit_time) {
            if exit <= entry {
                return Err(ApiError::State("Exit time must be after entry time".into()));
            }
            let minutes = timecalc::duration_minutes(entry, exit);
            if minutes < MIN_WORK_MINUTES {
                return Err(ApiError::Validation(
                    "Work duration must be at least 30 minutes".into(),
                ));
            }
            if minutes > MAX_WORK_MINUTES {
                return Err(ApiError::Validation(
                    "Work duration cannot exceed 24 hours".into(),
                ));
            }
        }

        let new_entry = corrections.entry_time.or(previous.entry_time);
        let new_exit = corrections.exit_time.or(previous.exit_time);
        let times_changed = corrections.entry_time.is_some() || corrections.exit_time.is_some();

        let mut new_minutes = previous.work_duration_minutes;
        let mut new_status = previous.status;

        if times_changed {
            if let (Some(entry), Some(exit)) = (new_entry, new_exit) {
                new_minutes = Some(timecalc::duration_minutes(entry, exit));
                new_status = AttendanceStatus::Present;
            }
        }

        // An explicitly requested status always wins over the implicit
        // present-after-time-change default.
        if let Some(status) = corrections.status {
            new_status = status;
        }

        sqlx::query(
            r#"
            UPDATE attendance
            SET entry_time = ?,
                exit_time = ?,
                work_duration_minutes = ?,
                status = ?,
                is_corrected = 1,
                corrected_by = ?,
                correction_reason = ?,
                updated_at = datetime('now')
            WHERE id = ?
            "#,
        )
        .bind(new_entry)
        .bind(new_exit)
        .bind(new_minutes)
        .bind(new_status)
        .bind(actor.user_id)
        .bind(reason)
        .bind(record_id)
        .execute(&self.pool)
        .await?;

        let updated = self.fetch(record_id).await?;

        self.history
            .log_change(HistoryEntry {
                employee_id: previous.employee_id,
                change_type: "attendance_corrected",
                previous_data: json!({
                    "date": previous.date,
                    "entry_time": previous.entry_time,
                    "exit_time": previous.exit_time,
                    "status": previous.status,
                    "work_duration_minutes": previous.work_duration_minutes,
                }),
                new_data: json!({
                    "date": updated.date,
                    "entry_time": updated.entry_time,
                    "exit_time": updated.exit_time,
                    "status": updated.status,
                    "work_duration_minutes": updated.work_duration_minutes,
                }),
                changed_by: actor.user_id,
                reason: Some(format!(
                    "Attendance corrected for {}: {}",
                    previous.date, reason
                )),
            })
            .await;

        self.audit
            .log(AuditEvent {
                action: actions::ATTENDANCE_CORRECTED,
                entity_type: "attendance",
                entity_id: updated.attendance_id.clone(),
                performed_by: actor.user_id,
                performed_by_name: actor.name.clone(),
                performed_by_role: actor.role.name(),
                target_employee_id: Some(updated.employee_id),
                previous_data: json!({
                    "entry_time": previous.entry_time,
                    "exit_time": previous.exit_time,
                    "status": previous.status,
                })
                .into(),
                new_data: serde_json::to_value(&updated).ok(),
                reason: Some(reason.to_string()),
            })
            .await;

        Ok(updated)
    }

    /// Filtered, newest-first listing.
    pub async fn get_attendance(&self, filters: &AttendanceQuery) -> ApiResult<Vec<AttendanceRecord>> {
        let mut conditions: Vec<&str> = Vec::new();
        let mut bindings: Vec<String> = Vec::new();

        if let Some(employee_id) = filters.employee_id {
            conditions.push("employee_id = ?");
            bindings.push(employee_id.to_string());
        }
        if let Some(department_id) = filters.department_id {
            conditions.push("department_id = ?");
            bindings.push(department_id.to_string());
        }
        if let Some(date) = filters.date {
            conditions.push("date = ?");
            bindings.push(date.to_string());
        }
        if let Some(status) = filters.status {
            conditions.push("status = ?");
            bindings.push(status.to_string());
        }
        if let (Some(start), Some(end)) = (filters.start_date, filters.end_date) {
            conditions.push("date >= ?");
            bindings.push(start.to_string());
            conditions.push("date <= ?");
            bindings.push(end.to_string());
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", conditions.join(" AND "))
        };

        let limit = filters.limit.unwrap_or(100).clamp(1, 500);
        let offset = filters.offset.unwrap_or(0);

        let sql = format!(
            "SELECT * FROM attendance {} ORDER BY date DESC, id DESC LIMIT ? OFFSET ?",
            where_clause
        );

        let mut query = sqlx::query_as::<_, AttendanceRecord>(&sql);
        for binding in &bindings {
            query = query.bind(binding);
        }
        query = query.bind(limit as i64).bind(offset as i64);

        Ok(query.fetch_all(&self.pool).await?)
    }

    /// Reduction over one calendar month: day counts per status plus the
    /// overtime total across present days.
    pub async fn monthly_summary(
        &self,
        employee_id: i64,
        year: i32,
        month: u32,
    ) -> ApiResult<MonthlySummary> {
        timecalc::days_in_month(year, month)?;

        let month_str = format!("{year:04}-{month:02}");
        let rows = sqlx::query_as::<_, (AttendanceStatus, Option<f64>)>(
            r#"
            SELECT status, overtime_hours
            FROM attendance
            WHERE employee_id = ? AND date >= ? AND date <= ?
            "#,
        )
        .bind(employee_id)
        .bind(format!("{month_str}-01"))
        .bind(format!("{month_str}-31"))
        .fetch_all(&self.pool)
        .await?;

        let mut summary = MonthlySummary {
            total_records: rows.len() as i64,
            days_present: 0,
            days_absent: 0,
            days_pending: 0,
            overtime_hours: 0.0,
        };

        for (status, overtime) in rows {
            match status {
                AttendanceStatus::Present => {
                    summary.days_present += 1;
                    summary.overtime_hours += overtime.unwrap_or(0.0);
                }
                AttendanceStatus::Absent => summary.days_absent += 1,
                AttendanceStatus::Pending => summary.days_pending += 1,
                AttendanceStatus::HalfDay => {}
            }
        }
        summary.overtime_hours = timecalc::round2(summary.overtime_hours);

        Ok(summary)
    }

    /// The correction window listing: yesterday back seven days, newest first.
    pub async fn past_week(&self, employee_id: i64) -> ApiResult<Vec<AttendanceRecord>> {
        let today = Local::now().date_naive();
        let start = today - chrono::Duration::days(7);
        let end = today - chrono::Duration::days(1);

        Ok(sqlx::query_as::<_, AttendanceRecord>(
            r#"
            SELECT * FROM attendance
            WHERE employee_id = ? AND date >= ? AND date <= ?
            ORDER BY date DESC
            "#,
        )
        .bind(employee_id)
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn by_date(
        &self,
        employee_id: i64,
        date: NaiveDate,
    ) -> ApiResult<Option<AttendanceRecord>> {
        Ok(sqlx::query_as::<_, AttendanceRecord>(
            "SELECT * FROM attendance WHERE employee_id = ? AND date = ? LIMIT 1",
        )
        .bind(employee_id)
        .bind(date)
        .fetch_optional(&self.pool)
        .await?)
    }

    /// The previous day's still-open record, if its bound shift wraps past
    /// midnight. This is the only path by which an exit may land on a
    /// different calendar date than its entry.
    async fn open_overnight_record(
        &self,
        employee_id: i64,
        exit_date: NaiveDate,
    ) -> ApiResult<Option<AttendanceRecord>> {
        let Some(previous_date) = exit_date.pred_opt() else {
            return Ok(None);
        };
        let Some(record) = self.by_date(employee_id, previous_date).await? else {
            return Ok(None);
        };
        if record.entry_time.is_none() || record.exit_time.is_some() {
            return Ok(None);
        }
        let Some(shift_id) = record.shift_id else {
            return Ok(None);
        };

        match self.directory.shift(shift_id).await {
            Ok(shift) if shift.is_overnight => Ok(Some(record)),
            _ => Ok(None),
        }
    }

    async fn maybe_fetch(&self, record_id: i64) -> ApiResult<Option<AttendanceRecord>> {
        Ok(
            sqlx::query_as::<_, AttendanceRecord>("SELECT * FROM attendance WHERE id = ?")
                .bind(record_id)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn fetch(&self, record_id: i64) -> ApiResult<AttendanceRecord> {
        self.maybe_fetch(record_id)
            .await?
            .ok_or_else(|| ApiError::NotFound("Attendance record not found".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;
    use crate::service::audit::SqlAuditSink;
    use crate::service::directory::{DepartmentSnapshot, EmployeeSnapshot, ShiftSnapshot};
    use crate::service::history::SqlHistorySink;
    use async_trait::async_trait;
    use chrono::Datelike;
    use std::collections::HashMap;

    struct FakeDirectory {
        employees: HashMap<i64, EmployeeSnapshot>,
        departments: HashMap<i64, DepartmentSnapshot>,
        shifts: HashMap<i64, ShiftSnapshot>,
    }

    #[async_trait]
    impl Directory for FakeDirectory {
        async fn employee(&self, employee_id: i64) -> ApiResult<EmployeeSnapshot> {
            self.employees
                .get(&employee_id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound("Employee not found".into()))
        }

        async fn department(&self, department_id: i64) -> ApiResult<DepartmentSnapshot> {
            self.departments
                .get(&department_id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound("Department not found".into()))
        }

        async fn shift(&self, shift_id: i64) -> ApiResult<ShiftSnapshot> {
            self.shifts
                .get(&shift_id)
                .cloned()
                .ok_or_else(|| ApiError::NotFound("Shift not found".into()))
        }
    }

    fn snapshot(
        id: i64,
        is_active: bool,
        department_id: Option<i64>,
        shift_id: Option<i64>,
        shift_name: Option<&str>,
    ) -> EmployeeSnapshot {
        EmployeeSnapshot {
            id,
            employee_code: format!("EMP_{id:05}"),
            name: format!("Worker {id}"),
            is_active,
            department_id,
            department_name: department_id.map(|_| "Security".to_string()),
            shift_id,
            shift_name: shift_name.map(str::to_string),
            job_role: None,
            monthly_salary: 31000.0,
            hourly_rate: None,
            overtime_multiplier: None,
            overtime_rate: None,
        }
    }

    fn fake_directory() -> FakeDirectory {
        let mut employees = HashMap::new();
        employees.insert(1, snapshot(1, true, Some(10), None, None));
        employees.insert(2, snapshot(2, true, Some(10), Some(5), Some("Day")));
        employees.insert(3, snapshot(3, false, Some(10), None, None));
        employees.insert(4, snapshot(4, true, Some(11), None, None));
        employees.insert(5, snapshot(5, true, Some(10), Some(6), Some("Night Watch")));
        employees.insert(9, snapshot(9, true, None, None, None));

        let mut departments = HashMap::new();
        departments.insert(
            10,
            DepartmentSnapshot {
                id: 10,
                name: "Security".into(),
                is_active: true,
            },
        );
        departments.insert(
            11,
            DepartmentSnapshot {
                id: 11,
                name: "Archived".into(),
                is_active: false,
            },
        );

        let mut shifts = HashMap::new();
        shifts.insert(
            5,
            ShiftSnapshot {
                id: 5,
                name: "Day".into(),
                standard_hours: 8.0,
                is_overnight: false,
            },
        );
        shifts.insert(
            6,
            ShiftSnapshot {
                id: 6,
                name: "Night Watch".into(),
                standard_hours: 8.0,
                is_overnight: true,
            },
        );

        FakeDirectory {
            employees,
            departments,
            shifts,
        }
    }

    async fn engine() -> (AttendanceEngine, SqlitePool) {
        let pool = test_pool().await;
        let engine = AttendanceEngine::new(
            pool.clone(),
            Arc::new(fake_directory()),
            Arc::new(SqlAuditSink::new(pool.clone())),
            Arc::new(SqlHistorySink::new(pool.clone())),
        );
        (engine, pool)
    }

    fn admin() -> Actor {
        Actor {
            user_id: 900,
            name: "Ada Admin".into(),
            role: Role::Admin,
        }
    }

    fn super_admin() -> Actor {
        Actor {
            user_id: 901,
            name: "Sam Root".into(),
            role: Role::SuperAdmin,
        }
    }

    fn today() -> NaiveDate {
        Local::now().date_naive()
    }

    fn at(date: NaiveDate, h: u32, m: u32) -> NaiveDateTime {
        date.and_hms_opt(h, m, 0).unwrap()
    }

    /// Seeds a record directly, bypassing the engine's entry rules.
    async fn seed_record(
        pool: &SqlitePool,
        employee_id: i64,
        date: NaiveDate,
        entry_time: Option<NaiveDateTime>,
        shift_id: Option<i64>,
        status: AttendanceStatus,
    ) -> i64 {
        let attendance_id = format!("ATT_T{employee_id}{}", date.format("%m%d"));
        sqlx::query(
            r#"
            INSERT INTO attendance
            (attendance_id, employee_id, employee_code, employee_name,
             department_id, department_name, shift_id, date, entry_time,
             status, marked_by)
            VALUES (?, ?, ?, ?, 10, 'Security', ?, ?, ?, ?, 900)
            "#,
        )
        .bind(&attendance_id)
        .bind(employee_id)
        .bind(format!("EMP_{employee_id:05}"))
        .bind(format!("Worker {employee_id}"))
        .bind(shift_id)
        .bind(date)
        .bind(entry_time)
        .bind(status)
        .execute(pool)
        .await
        .unwrap()
        .last_insert_rowid()
    }

    fn long_reason() -> String {
        "Forgot to mark the record".to_string()
    }

    #[actix_web::test]
    async fn entry_then_exit_computes_duration_and_status() {
        let (engine, _pool) = engine().await;

        let record = engine
            .mark_entry(1, at(today(), 9, 0), &admin(), None)
            .await
            .unwrap();
        assert!(record.attendance_id.starts_with("ATT_"));
        assert_eq!(record.status, AttendanceStatus::Pending);
        assert!(record.entry_time.is_some());
        assert!(record.exit_time.is_none());
        assert!(record.work_duration_minutes.is_none());
        assert!(!record.is_corrected);

        let updated = engine
            .mark_exit(1, at(today(), 17, 0), &admin(), None)
            .await
            .unwrap();
        assert_eq!(updated.work_duration_minutes, Some(480));
        assert_eq!(updated.status, AttendanceStatus::Present);
        assert_eq!(updated.regular_hours, Some(8.0));
        assert_eq!(updated.overtime_hours, Some(0.0));
        assert_eq!(updated.total_hours, Some(8.0));
        assert!(updated.overtime_approved_by.is_none());
    }

    #[actix_web::test]
    async fn duplicate_entry_is_rejected() {
        let (engine, _pool) = engine().await;

        engine
            .mark_entry(1, at(today(), 9, 0), &admin(), None)
            .await
            .unwrap();
        let err = engine
            .mark_entry(1, at(today(), 10, 0), &admin(), None)
            .await
            .unwrap_err();

        assert!(matches!(err, ApiError::Conflict(_)));
        assert_eq!(err.to_string(), "Entry already marked for this date");
    }

    #[actix_web::test]
    async fn future_entry_is_rejected() {
        let (engine, _pool) = engine().await;
        let tomorrow = today().succ_opt().unwrap();

        let err = engine
            .mark_entry(1, at(tomorrow, 9, 0), &admin(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[actix_web::test]
    async fn inactive_employee_is_rejected() {
        let (engine, _pool) = engine().await;

        let err = engine
            .mark_entry(3, at(today(), 9, 0), &admin(), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Employee is inactive or not found");
    }

    #[actix_web::test]
    async fn unknown_employee_is_not_found() {
        let (engine, _pool) = engine().await;

        let err = engine
            .mark_entry(999, at(today(), 9, 0), &admin(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[actix_web::test]
    async fn employee_without_department_is_rejected() {
        let (engine, _pool) = engine().await;

        let err = engine
            .mark_entry(9, at(today(), 9, 0), &admin(), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Employee has no department assigned");
    }

    #[actix_web::test]
    async fn inactive_department_is_rejected() {
        let (engine, _pool) = engine().await;

        let err = engine
            .mark_entry(4, at(today(), 9, 0), &admin(), None)
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Employee's department is inactive");
    }

    #[actix_web::test]
    async fn stale_entry_requires_super_admin_with_reason() {
        let (engine, _pool) = engine().await;
        let two_days_ago = today() - chrono::Duration::days(2);

        let err = engine
            .mark_entry(1, at(two_days_ago, 9, 0), &admin(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Permission(_)));

        let err = engine
            .mark_entry(1, at(two_days_ago, 9, 0), &super_admin(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let record = engine
            .mark_entry(
                1,
                at(two_days_ago, 9, 0),
                &super_admin(),
                Some("Terminal was offline"),
            )
            .await
            .unwrap();
        assert!(record.is_corrected);
        assert_eq!(record.corrected_by, Some(901));
        assert_eq!(record.correction_reason.as_deref(), Some("Terminal was offline"));
    }

    #[actix_web::test]
    async fn exit_without_entry_fails() {
        let (engine, _pool) = engine().await;

        let err = engine
            .mark_exit(1, at(today(), 17, 0), &admin(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::State(_)));
    }

    #[actix_web::test]
    async fn duplicate_exit_is_rejected() {
        let (engine, _pool) = engine().await;

        engine
            .mark_entry(1, at(today(), 8, 0), &admin(), None)
            .await
            .unwrap();
        engine
            .mark_exit(1, at(today(), 16, 0), &admin(), None)
            .await
            .unwrap();

        let err = engine
            .mark_exit(1, at(today(), 17, 0), &admin(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Conflict(_)));
    }

    #[actix_web::test]
    async fn exit_not_after_entry_fails() {
        let (engine, _pool) = engine().await;

        engine
            .mark_entry(1, at(today(), 9, 0), &admin(), None)
            .await
            .unwrap();

        let err = engine
            .mark_exit(1, at(today(), 9, 0), &admin(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::State(_)));

        let err = engine
            .mark_exit(1, at(today(), 8, 0), &admin(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::State(_)));
    }

    #[actix_web::test]
    async fn too_short_duration_fails() {
        let (engine, _pool) = engine().await;

        engine
            .mark_entry(1, at(today(), 9, 0), &admin(), None)
            .await
            .unwrap();
        let err = engine
            .mark_exit(1, at(today(), 9, 20), &admin(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[actix_web::test]
    async fn shift_bound_overtime_is_split_and_auto_approved() {
        let (engine, _pool) = engine().await;

        engine
            .mark_entry(2, at(today(), 8, 0), &admin(), None)
            .await
            .unwrap();
        let record = engine
            .mark_exit(2, at(today(), 18, 0), &admin(), Some("Inventory day".into()))
            .await
            .unwrap();

        assert_eq!(record.total_hours, Some(10.0));
        assert_eq!(record.regular_hours, Some(8.0));
        assert_eq!(record.overtime_hours, Some(2.0));
        assert_eq!(record.overtime_approved_by, Some(900));
        assert_eq!(record.overtime_reason.as_deref(), Some("Inventory day"));
        assert_eq!(record.shift_name.as_deref(), Some("Day"));
    }

    #[actix_web::test]
    async fn default_standard_hours_apply_without_shift() {
        let (engine, _pool) = engine().await;

        engine
            .mark_entry(1, at(today(), 8, 0), &admin(), None)
            .await
            .unwrap();
        let record = engine
            .mark_exit(1, at(today(), 16, 30), &admin(), None)
            .await
            .unwrap();

        assert_eq!(record.work_duration_minutes, Some(510));
        assert_eq!(record.total_hours, Some(8.5));
        assert_eq!(record.regular_hours, Some(8.0));
        assert_eq!(record.overtime_hours, Some(0.5));
        assert_eq!(record.status, AttendanceStatus::Present);
    }

    #[actix_web::test]
    async fn overnight_shift_may_exit_next_morning() {
        let (engine, pool) = engine().await;
        let yesterday = today() - chrono::Duration::days(1);

        seed_record(
            &pool,
            5,
            yesterday,
            Some(at(yesterday, 22, 0)),
            Some(6),
            AttendanceStatus::Pending,
        )
        .await;

        let record = engine
            .mark_exit(5, at(today(), 6, 0), &admin(), None)
            .await
            .unwrap();
        assert_eq!(record.work_duration_minutes, Some(480));
        assert_eq!(record.status, AttendanceStatus::Present);
        assert_eq!(record.date, yesterday);
    }

    #[actix_web::test]
    async fn cross_midnight_exit_requires_overnight_shift() {
        let (engine, pool) = engine().await;
        let yesterday = today() - chrono::Duration::days(1);

        seed_record(
            &pool,
            1,
            yesterday,
            Some(at(yesterday, 22, 0)),
            None,
            AttendanceStatus::Pending,
        )
        .await;

        // No same-day record and yesterday's is not overnight-bound.
        let err = engine
            .mark_exit(1, at(today(), 6, 0), &admin(), None)
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::State(_)));
    }

    #[actix_web::test]
    async fn unique_index_blocks_duplicate_rows() {
        let (_engine, pool) = engine().await;
        let date = today() - chrono::Duration::days(3);

        seed_record(&pool, 1, date, Some(at(date, 9, 0)), None, AttendanceStatus::Pending).await;

        let result = sqlx::query(
            r#"
            INSERT INTO attendance
            (attendance_id, employee_id, employee_code, employee_name,
             department_id, department_name, date, status, marked_by)
            VALUES ('ATT_DUPE01', 1, 'EMP_00001', 'Worker 1', 10, 'Security', ?, 'pending', 900)
            "#,
        )
        .bind(date)
        .execute(&pool)
        .await;

        let err = result.unwrap_err();
        match err {
            sqlx::Error::Database(db_err) => assert!(db_err.is_unique_violation()),
            other => panic!("expected unique violation, got {other:?}"),
        }
    }

    #[actix_web::test]
    async fn correction_of_todays_record_is_rejected() {
        let (engine, pool) = engine().await;

        let id = seed_record(
            &pool,
            1,
            today(),
            Some(at(today(), 9, 0)),
            None,
            AttendanceStatus::Pending,
        )
        .await;

        let err = engine
            .correct(
                id,
                &CorrectionRequest {
                    reason: long_reason(),
                    entry_time: None,
                    exit_time: None,
                    status: Some(AttendanceStatus::Absent),
                },
                &admin(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::State(_)));
    }

    #[actix_web::test]
    async fn correction_window_is_seven_days_inclusive() {
        let (engine, pool) = engine().await;
        let eight_days = today() - chrono::Duration::days(8);
        let seven_days = today() - chrono::Duration::days(7);

        let too_old = seed_record(
            &pool,
            1,
            eight_days,
            Some(at(eight_days, 9, 0)),
            None,
            AttendanceStatus::Pending,
        )
        .await;
        let boundary = seed_record(
            &pool,
            2,
            seven_days,
            Some(at(seven_days, 9, 0)),
            None,
            AttendanceStatus::Pending,
        )
        .await;

        let corrections = CorrectionRequest {
            reason: long_reason(),
            entry_time: None,
            exit_time: None,
            status: Some(AttendanceStatus::Absent),
        };

        let err = engine.correct(too_old, &corrections, &admin()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Can only correct attendance from the past 7 days"
        );

        let record = engine.correct(boundary, &corrections, &admin()).await.unwrap();
        assert_eq!(record.status, AttendanceStatus::Absent);
        assert!(record.is_corrected);
    }

    #[actix_web::test]
    async fn correction_reason_must_be_ten_characters() {
        let (engine, pool) = engine().await;
        let yesterday = today() - chrono::Duration::days(1);

        let id = seed_record(
            &pool,
            1,
            yesterday,
            Some(at(yesterday, 9, 0)),
            None,
            AttendanceStatus::Pending,
        )
        .await;

        let err = engine
            .correct(
                id,
                &CorrectionRequest {
                    reason: "too short".into(), // 9 chars
                    entry_time: None,
                    exit_time: None,
                    status: Some(AttendanceStatus::Absent),
                },
                &admin(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));

        let record = engine
            .correct(
                id,
                &CorrectionRequest {
                    reason: "just right".into(), // 10 chars
                    entry_time: None,
                    exit_time: None,
                    status: Some(AttendanceStatus::Absent),
                },
                &admin(),
            )
            .await
            .unwrap();
        assert!(record.is_corrected);
        assert_eq!(record.corrected_by, Some(900));
        assert_eq!(record.correction_reason.as_deref(), Some("just right"));
    }

    #[actix_web::test]
    async fn corrected_times_recompute_duration_and_default_to_present() {
        let (engine, pool) = engine().await;
        let yesterday = today() - chrono::Duration::days(1);

        let id = seed_record(
            &pool,
            1,
            yesterday,
            Some(at(yesterday, 9, 0)),
            None,
            AttendanceStatus::Pending,
        )
        .await;

        let record = engine
            .correct(
                id,
                &CorrectionRequest {
                    reason: long_reason(),
                    entry_time: Some(at(yesterday, 8, 0)),
                    exit_time: Some(at(yesterday, 16, 0)),
                    status: None,
                },
                &admin(),
            )
            .await
            .unwrap();

        assert_eq!(record.work_duration_minutes, Some(480));
        assert_eq!(record.status, AttendanceStatus::Present);
        assert!(record.is_corrected);
    }

    #[actix_web::test]
    async fn explicit_status_wins_over_present_default() {
        let (engine, pool) = engine().await;
        let yesterday = today() - chrono::Duration::days(1);

        let id = seed_record(
            &pool,
            1,
            yesterday,
            Some(at(yesterday, 9, 0)),
            None,
            AttendanceStatus::Pending,
        )
        .await;

        let record = engine
            .correct(
                id,
                &CorrectionRequest {
                    reason: long_reason(),
                    entry_time: Some(at(yesterday, 9, 0)),
                    exit_time: Some(at(yesterday, 13, 0)),
                    status: Some(AttendanceStatus::HalfDay),
                },
                &admin(),
            )
            .await
            .unwrap();

        assert_eq!(record.work_duration_minutes, Some(240));
        assert_eq!(record.status, AttendanceStatus::HalfDay);
    }

    #[actix_web::test]
    async fn corrected_pair_is_validated() {
        let (engine, pool) = engine().await;
        let yesterday = today() - chrono::Duration::days(1);

        let id = seed_record(
            &pool,
            1,
            yesterday,
            Some(at(yesterday, 9, 0)),
            None,
            AttendanceStatus::Pending,
        )
        .await;

        let err = engine
            .correct(
                id,
                &CorrectionRequest {
                    reason: long_reason(),
                    entry_time: Some(at(yesterday, 17, 0)),
                    exit_time: Some(at(yesterday, 9, 0)),
                    status: None,
                },
                &admin(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::State(_)));

        let err = engine
            .correct(
                id,
                &CorrectionRequest {
                    reason: long_reason(),
                    entry_time: Some(at(yesterday, 9, 0)),
                    exit_time: Some(at(yesterday, 9, 10)),
                    status: None,
                },
                &admin(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::Validation(_)));
    }

    #[actix_web::test]
    async fn missing_record_is_not_found() {
        let (engine, _pool) = engine().await;

        let err = engine
            .correct(
                4242,
                &CorrectionRequest {
                    reason: long_reason(),
                    entry_time: None,
                    exit_time: None,
                    status: None,
                },
                &admin(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ApiError::NotFound(_)));
    }

    #[actix_web::test]
    async fn monthly_summary_counts_statuses_and_overtime() {
        let (engine, pool) = engine().await;

        // A fixed month safely in the past; seeded directly.
        let base = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();
        for (day, status, overtime) in [
            (5, AttendanceStatus::Present, Some(1.5)),
            (6, AttendanceStatus::Present, Some(1.0)),
            (7, AttendanceStatus::Absent, None),
            (8, AttendanceStatus::Pending, None),
        ] {
            let date = base.with_day(day).unwrap();
            let id = seed_record(&pool, 1, date, Some(at(date, 9, 0)), None, status).await;
            if let Some(hours) = overtime {
                sqlx::query("UPDATE attendance SET overtime_hours = ? WHERE id = ?")
                    .bind(hours)
                    .bind(id)
                    .execute(&pool)
                    .await
                    .unwrap();
            }
        }

        let summary = engine.monthly_summary(1, 2025, 5).await.unwrap();
        assert_eq!(summary.total_records, 4);
        assert_eq!(summary.days_present, 2);
        assert_eq!(summary.days_absent, 1);
        assert_eq!(summary.days_pending, 1);
        assert_eq!(summary.overtime_hours, 2.5);
    }

    #[actix_web::test]
    async fn listing_filters_by_status_and_range() {
        let (engine, pool) = engine().await;
        let base = NaiveDate::from_ymd_opt(2025, 5, 1).unwrap();

        for (day, status) in [
            (5, AttendanceStatus::Present),
            (6, AttendanceStatus::Absent),
            (7, AttendanceStatus::Present),
        ] {
            let date = base.with_day(day).unwrap();
            seed_record(&pool, 1, date, Some(at(date, 9, 0)), None, status).await;
        }

        let present = engine
            .get_attendance(&AttendanceQuery {
                employee_id: Some(1),
                status: Some(AttendanceStatus::Present),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(present.len(), 2);
        // Newest first.
        assert!(present[0].date > present[1].date);

        let ranged = engine
            .get_attendance(&AttendanceQuery {
                start_date: Some(base.with_day(6).unwrap()),
                end_date: Some(base.with_day(7).unwrap()),
                ..Default::default()
            })
            .await
            .unwrap();
        assert_eq!(ranged.len(), 2);
    }

    #[actix_web::test]
    async fn past_week_excludes_today_and_older_records() {
        let (engine, pool) = engine().await;

        for days_ago in [0i64, 1, 3, 8] {
            let date = today() - chrono::Duration::days(days_ago);
            seed_record(&pool, 1, date, Some(at(date, 9, 0)), None, AttendanceStatus::Pending)
                .await;
        }

        let window = engine.past_week(1).await.unwrap();
        assert_eq!(window.len(), 2);
        assert!(window.iter().all(|r| r.date != today()));
    }

    #[actix_web::test]
    async fn marking_writes_audit_rows() {
        let (engine, pool) = engine().await;

        engine
            .mark_entry(1, at(today(), 9, 0), &admin(), None)
            .await
            .unwrap();
        engine
            .mark_exit(1, at(today(), 17, 0), &admin(), None)
            .await
            .unwrap();

        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM audit_logs WHERE action = 'attendance_marked'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(count, 2);
    }

    #[actix_web::test]
    async fn correction_writes_history_row() {
        let (engine, pool) = engine().await;
        let yesterday = today() - chrono::Duration::days(1);

        let id = seed_record(
            &pool,
            1,
            yesterday,
            Some(at(yesterday, 9, 0)),
            None,
            AttendanceStatus::Pending,
        )
        .await;

        engine
            .correct(
                id,
                &CorrectionRequest {
                    reason: long_reason(),
                    entry_time: None,
                    exit_time: Some(at(yesterday, 17, 0)),
                    status: None,
                },
                &admin(),
            )
            .await
            .unwrap();

        let (change_type, fields): (String, String) = sqlx::query_as(
            "SELECT change_type, changed_fields FROM history_logs WHERE employee_id = 1",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(change_type, "attendance_corrected");
        assert!(fields.contains("exit_time"));
        assert!(fields.contains("status"));
    }
}
