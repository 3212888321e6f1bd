use crate::api::attendance::{MarkEntryRequest, MarkExitRequest, SummaryQuery};
use crate::api::department::CreateDepartment;
use crate::api::employee::{CreateEmployee, EmployeeListResponse, EmployeeQuery};
use crate::api::salary::{ReportQuery, SalaryQuery};
use crate::api::shift::{CreateShift, ShiftQuery, UpdateShift};
use crate::model::attendance::{AttendanceRecord, AttendanceStatus};
use crate::model::department::Department;
use crate::model::employee::Employee;
use crate::model::shift::Shift;
use crate::models::{LoginReqDto, UserReq};
use crate::service::attendance::{AttendanceQuery, CorrectionRequest, MonthlySummary};
use crate::service::salary::{DepartmentSalaryReport, SalaryProjection, SystemSalaryReport};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi, openapi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Workforce Management API",
        version = "1.0.0",
        description = r#"
## Workforce Management System

Backend for attendance tracking, workforce directory and salary projection.

### Key Features
- **Directory**
  - Departments, employees and shifts with soft deactivation
- **Attendance**
  - Entry/exit marking with a 24-hour back-dating cutoff
  - Reason-justified corrections for the past 7 days
  - Automatic overtime split against the bound shift
- **Salary**
  - On-demand monthly projections, department and system reports

### Security
Endpoints are protected with **JWT Bearer authentication**; back-dated
attendance requires the **super admin** role.

### Response Format
JSON responses; list endpoints support filtering and pagination.
"#,
    ),
    paths(
        crate::api::attendance::mark_entry,
        crate::api::attendance::mark_exit,
        crate::api::attendance::correct_attendance,
        crate::api::attendance::list_attendance,
        crate::api::attendance::monthly_summary,
        crate::api::attendance::past_week,

        crate::api::department::create_department,
        crate::api::department::list_departments,
        crate::api::department::get_department,
        crate::api::department::update_department,

        crate::api::employee::create_employee,
        crate::api::employee::list_employees,
        crate::api::employee::get_employee,
        crate::api::employee::update_employee,
        crate::api::employee::deactivate_employee,

        crate::api::shift::create_shift,
        crate::api::shift::list_shifts,
        crate::api::shift::get_shift,
        crate::api::shift::update_shift,

        crate::api::salary::get_salary,
        crate::api::salary::department_report,
        crate::api::salary::system_report,
    ),
    components(
        schemas(
            MarkEntryRequest,
            MarkExitRequest,
            SummaryQuery,
            CorrectionRequest,
            AttendanceQuery,
            AttendanceRecord,
            AttendanceStatus,
            MonthlySummary,
            CreateDepartment,
            Department,
            CreateShift,
            UpdateShift,
            ShiftQuery,
            Shift,
            CreateEmployee,
            EmployeeQuery,
            Employee,
            EmployeeListResponse,
            SalaryQuery,
            ReportQuery,
            SalaryProjection,
            DepartmentSalaryReport,
            SystemSalaryReport,
            UserReq,
            LoginReqDto
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Attendance", description = "Attendance marking and correction APIs"),
        (name = "Department", description = "Department directory APIs"),
        (name = "Employee", description = "Employee directory APIs"),
        (name = "Shift", description = "Shift directory APIs"),
        (name = "Salary", description = "Salary projection APIs"),
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}
