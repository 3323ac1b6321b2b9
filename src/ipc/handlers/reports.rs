use crate::api::AttendanceApi;
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{get_optional_date, get_optional_i64, get_required_i64};
use crate::ipc::types::{AppState, Request};
use crate::report::{grade_report, ReportFilter};
use crate::roster::build_roster;
use serde_json::json;

fn reports_grade_attendance(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let grade_id = get_required_i64(params, "gradeId")?;
    let filter = ReportFilter {
        course_id: get_optional_i64(params, "courseId")?,
        from: get_optional_date(params, "from")?,
        to: get_optional_date(params, "to")?,
    };
    if let (Some(f), Some(t)) = (filter.from, filter.to) {
        if f > t {
            return Err(HandlerErr::bad_params("from must not be after to"));
        }
    }

    let settings = state
        .backend_settings()
        .map_err(|e| HandlerErr::new("db_query_failed", e.to_string()))?;
    let api = state.api(&settings)?;
    let grade = api.grade(grade_id)?;
    let roster = build_roster(&grade);
    let records = api.grade_attendance(grade_id)?;
    let report = grade_report(&roster, &records, &filter);

    let students: Vec<serde_json::Value> = report
        .students
        .iter()
        .map(|s| {
            json!({
                "studentId": s.student_id,
                "displayName": s.display_name,
                "present": s.present,
                "late": s.late,
                "absent": s.absent,
                "total": s.total()
            })
        })
        .collect();
    let dates: Vec<String> = report
        .dates
        .iter()
        .map(|d| d.format("%Y-%m-%d").to_string())
        .collect();
    Ok(json!({
        "gradeId": grade.id,
        "grade": { "grado": grade.grado, "seccion": grade.seccion, "label": grade.label() },
        "courseId": filter.course_id,
        "from": filter.from.map(|d| d.format("%Y-%m-%d").to_string()),
        "to": filter.to.map(|d| d.format("%Y-%m-%d").to_string()),
        "students": students,
        "dates": dates,
        "unmatchedRecords": report.unmatched_records,
        "undatedRecords": report.undated_records
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.gradeAttendance" => Some(respond(
            &req.id,
            reports_grade_attendance(state, &req.params),
        )),
        _ => None,
    }
}
