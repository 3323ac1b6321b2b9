use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let base_url = state
        .backend_settings()
        .map(|s| s.base_url)
        .unwrap_or_else(|_| state.env.base_url.clone());
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "backendUrl": base_url,
            "hasToken": state.token.is_some(),
            "openSessions": state.sessions.len()
        }),
    )
}

fn handle_workspace_select(state: &mut AppState, req: &Request) -> serde_json::Value {
    let p = req
        .params
        .get("path")
        .and_then(|v| v.as_str())
        .map(PathBuf::from);
    let Some(path) = p else {
        return err(&req.id, "bad_params", "missing params.path", None);
    };

    match db::open_db(&path) {
        Ok(conn) => {
            log::info!("workspace selected: {}", path.to_string_lossy());
            state.workspace = Some(path.clone());
            state.db = Some(conn);
            ok(&req.id, json!({ "workspacePath": path.to_string_lossy() }))
        }
        Err(e) => err(&req.id, "db_open_failed", format!("{e:?}"), None),
    }
}

fn handle_auth_set_token(state: &mut AppState, req: &Request) -> serde_json::Value {
    let token = match req.params.get("token") {
        None => return err(&req.id, "bad_params", "missing token", None),
        Some(v) if v.is_null() => None,
        Some(v) => match v.as_str() {
            Some(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(_) => None,
            None => return err(&req.id, "bad_params", "token must be string or null", None),
        },
    };
    state.token = token;
    log::info!(
        "bearer token {}",
        if state.token.is_some() { "set" } else { "cleared" }
    );
    ok(&req.id, json!({ "hasToken": state.token.is_some() }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        "auth.setToken" => Some(handle_auth_set_token(state, req)),
        _ => None,
    }
}
