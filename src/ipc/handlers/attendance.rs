use crate::config::{export_dir_from_section, AttendanceSettings, SetupSection};
use crate::ipc::error::{respond, HandlerErr};
use crate::ipc::params::{
    get_generation, get_optional_i64, get_required_date, get_required_i64, get_required_str,
};
use crate::ipc::types::{AppState, Request};
use crate::session::{AttendanceSession, SessionError};
use crate::template::{self, TemplateMeta, TemplateRow};
use serde_json::json;
use std::path::PathBuf;
use uuid::Uuid;

fn session_json(session_id: &str, s: &AttendanceSession) -> serde_json::Value {
    let grade = s.grade();
    let students: Vec<serde_json::Value> = s
        .roster()
        .iter()
        .map(|st| {
            json!({
                "id": st.id,
                "displayName": st.display_name,
                "lastName": st.last_name,
                "firstName": st.first_name,
                "mark": s.mark_of(st.id).map(|m| m.code().to_string()),
                "recordId": s.record_id_of(st.id)
            })
        })
        .collect();
    let counts = s.counts();
    json!({
        "sessionId": session_id,
        "generation": s.generation(),
        "courseId": s.course_id(),
        "gradeId": grade.id,
        "grade": {
            "grado": grade.grado,
            "seccion": grade.seccion,
            "nivel": grade.nivel,
            "label": grade.label()
        },
        "date": s.date().format("%Y-%m-%d").to_string(),
        "registered": s.registered(),
        "hasChanges": s.has_changes(),
        "students": students,
        "counts": {
            "present": counts.present,
            "late": counts.late,
            "absent": counts.absent,
            "unset": counts.unset
        }
    })
}

fn config_err(e: anyhow::Error) -> HandlerErr {
    HandlerErr::new("db_query_failed", e.to_string())
}

fn session_id_param(state: &AppState, params: &serde_json::Value) -> Result<String, HandlerErr> {
    let session_id = get_required_str(params, "sessionId")?;
    if !state.sessions.contains_key(&session_id) {
        return Err(HandlerErr::new("not_found", "attendance session not found")
            .with_details(json!({ "sessionId": session_id })));
    }
    Ok(session_id)
}

/// Looks up the session named in `params` and checks its generation.
fn session_mut<'a>(
    state: &'a mut AppState,
    params: &serde_json::Value,
) -> Result<(String, &'a mut AttendanceSession), HandlerErr> {
    let session_id = session_id_param(state, params)?;
    let generation = get_generation(params)?;
    let session = state
        .sessions
        .get_mut(&session_id)
        .ok_or_else(|| HandlerErr::new("not_found", "attendance session not found"))?;
    session.check_generation(generation)?;
    Ok((session_id, session))
}

fn attendance_open(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let grade_id = get_required_i64(params, "gradeId")?;
    let date = get_required_date(params, "date")?;
    let course_id = match get_optional_i64(params, "courseId")? {
        Some(c) => c,
        None => {
            let v = state.section(SetupSection::Attendance).map_err(config_err)?;
            AttendanceSettings::from_section(&v)
                .default_course_id
                .ok_or_else(|| HandlerErr::bad_params("missing courseId"))?
        }
    };

    let settings = state.backend_settings().map_err(config_err)?;
    let api = state.api(&settings)?;
    let session = AttendanceSession::open(&api, course_id, grade_id, date)?;
    let session_id = Uuid::new_v4().to_string();
    let out = session_json(&session_id, &session);
    state.sessions.insert(session_id, session);
    Ok(out)
}

fn attendance_get(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session_id = session_id_param(state, params)?;
    let session = state
        .sessions
        .get(&session_id)
        .ok_or_else(|| HandlerErr::new("not_found", "attendance session not found"))?;
    Ok(session_json(&session_id, session))
}

fn attendance_set_date(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let date = get_required_date(params, "date")?;
    let settings = state.backend_settings().map_err(config_err)?;
    let api = state.api(&settings)?;
    let (session_id, session) = session_mut(state, params)?;
    if session.has_changes() {
        log::info!(
            "discarding unsaved attendance for {} on date change",
            session.date()
        );
    }
    session.set_date(&api, date)?;
    Ok(session_json(&session_id, session))
}

fn attendance_reload(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let settings = state.backend_settings().map_err(config_err)?;
    let api = state.api(&settings)?;
    let (session_id, session) = session_mut(state, params)?;
    session.reload(&api)?;
    Ok(session_json(&session_id, session))
}

fn attendance_toggle(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_i64(params, "studentId")?;
    let (session_id, session) = session_mut(state, params)?;
    let changed = session.toggle(student_id)?;
    let mut out = session_json(&session_id, session);
    out["toggled"] = json!(changed);
    Ok(out)
}

fn attendance_register(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (session_id, session) = session_mut(state, params)?;
    session.register()?;
    Ok(session_json(&session_id, session))
}

fn attendance_cancel(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let (session_id, session) = session_mut(state, params)?;
    session.cancel();
    Ok(session_json(&session_id, session))
}

fn attendance_save(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let settings = state.backend_settings().map_err(config_err)?;
    let api = state.api(&settings)?;
    let (session_id, session) = session_mut(state, params)?;
    match session.save(&api, settings.save_mode) {
        Ok(summary) => Ok(json!({
            "mode": settings.save_mode.as_str(),
            "created": summary.created,
            "updated": summary.updated,
            "session": session_json(&session_id, session)
        })),
        Err(e) => {
            // Rows saved before a failure stay saved; hand back the current view.
            let partial = matches!(e, SessionError::SaveFailed { .. });
            let mut he = HandlerErr::from(e);
            if partial {
                let mut details = he.details.take().unwrap_or_else(|| json!({}));
                details["session"] = session_json(&session_id, session);
                he = he.with_details(details);
            }
            Err(he)
        }
    }
}

fn resolve_out_dir(state: &AppState, params: &serde_json::Value) -> Result<PathBuf, HandlerErr> {
    if let Some(dir) = params.get("outDir").and_then(|v| v.as_str()) {
        if !dir.trim().is_empty() {
            return Ok(PathBuf::from(dir.trim()));
        }
    }
    let export = state.section(SetupSection::Export).map_err(config_err)?;
    if let Some(dir) = export_dir_from_section(&export) {
        return Ok(dir);
    }
    state
        .workspace
        .clone()
        .ok_or_else(|| HandlerErr::new("no_workspace", "select a workspace or pass outDir"))
}

fn attendance_export_template(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let out_dir = resolve_out_dir(state, params)?;
    let sheet_name = {
        let v = state.section(SetupSection::Attendance).map_err(config_err)?;
        AttendanceSettings::from_section(&v).template_sheet_name
    };
    let (session_id, session) = session_mut(state, params)?;

    let grade = session.grade();
    let meta = TemplateMeta {
        grado: grade.grado.clone(),
        seccion: grade.seccion.clone(),
        nivel: grade.nivel.clone(),
        grade_id: grade.id,
        course_id: session.course_id(),
        date: session.date(),
    };
    let rows: Vec<TemplateRow> = session
        .roster()
        .iter()
        .map(|s| TemplateRow {
            student_id: s.id,
            last_name: s.last_name.clone(),
            first_name: s.first_name.clone(),
            mark: session.mark_of(s.id),
        })
        .collect();
    let file_name = template::template_file_name(&meta);
    let out_path = out_dir.join(&file_name);
    let entry_count = template::write_template(&out_path, &meta, &rows, &sheet_name)
        .map_err(|e| HandlerErr::new("export_failed", format!("{e:#}")))?;
    log::info!(
        "exported attendance template {} ({} students)",
        out_path.to_string_lossy(),
        rows.len()
    );
    Ok(json!({
        "sessionId": session_id,
        "path": out_path.to_string_lossy(),
        "fileName": file_name,
        "entryCount": entry_count,
        "studentCount": rows.len()
    }))
}

fn attendance_import_template(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let in_path = PathBuf::from(get_required_str(params, "inPath")?);
    let (session_id, session) = session_mut(state, params)?;

    let imported = template::read_template(&in_path)
        .map_err(|e| HandlerErr::new("template_read_failed", format!("{e:#}")))?;

    let mut mismatches = Vec::new();
    if imported.grade_id.is_some_and(|g| g != session.grade().id) {
        mismatches.push("gradeId");
    }
    if imported.course_id.is_some_and(|c| c != session.course_id()) {
        mismatches.push("courseId");
    }
    if imported.date.is_some_and(|d| d != session.date()) {
        mismatches.push("date");
    }
    if !mismatches.is_empty() {
        return Err(
            HandlerErr::new("template_mismatch", "template belongs to another session")
                .with_details(json!({ "fields": mismatches })),
        );
    }

    let outcome = session.apply_imported(&imported.marks);
    let rejected: Vec<serde_json::Value> = imported
        .rejected
        .iter()
        .map(|r| json!({ "row": r.row, "value": r.value, "reason": r.reason }))
        .collect();
    if !rejected.is_empty() || !outcome.unknown_students.is_empty() {
        log::warn!(
            "template import skipped {} rows and {} unknown students",
            rejected.len(),
            outcome.unknown_students.len()
        );
    }
    log::info!("imported {} marks from {}", outcome.applied, in_path.to_string_lossy());
    Ok(json!({
        "applied": outcome.applied,
        "unknownStudents": outcome.unknown_students,
        "rejected": rejected,
        "session": session_json(&session_id, session)
    }))
}

fn attendance_close(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let session_id = session_id_param(state, params)?;
    if let Some(s) = state.sessions.remove(&session_id) {
        if s.has_changes() {
            log::info!("closed attendance session {} with unsaved changes", session_id);
        }
    }
    Ok(json!({ "ok": true }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let handler: fn(&mut AppState, &serde_json::Value) -> Result<serde_json::Value, HandlerErr> =
        match req.method.as_str() {
            "attendance.open" => attendance_open,
            "attendance.get" => attendance_get,
            "attendance.setDate" => attendance_set_date,
            "attendance.reload" => attendance_reload,
            "attendance.toggle" => attendance_toggle,
            "attendance.register" => attendance_register,
            "attendance.cancel" => attendance_cancel,
            "attendance.save" => attendance_save,
            "attendance.exportTemplate" => attendance_export_template,
            "attendance.importTemplate" => attendance_import_template,
            "attendance.close" => attendance_close,
            _ => return None,
        };
    Some(respond(&req.id, handler(state, &req.params)))
}
