use crate::db;
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::session::Session;
use crate::settings::FormState;
use serde_json::json;
use std::path::PathBuf;

fn handle_health(state: &mut AppState, req: &Request) -> serde_json::Value {
    let session = &state.session;
    ok(
        &req.id,
        json!({
            "version": env!("CARGO_PKG_VERSION"),
            "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string()),
            "students": session.roster.as_ref().map(|r| r.len()).unwrap_or(0),
            "photos": session.photos.len(),
            "scheduleEntries": session.schedule.len(),
            "template": session.form.template.id(),
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

    let conn = match db::open_db(&path) {
        Ok(conn) => conn,
        Err(e) => return err(&req.id, "db_open_failed", format!("{e:?}"), None),
    };
    // Stored values pre-fill the form once; the session starts empty otherwise.
    let stored = match db::settings_get_all(&conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let form = FormState::from_store(&stored);

    tracing::info!(workspace = %path.to_string_lossy(), settings = stored.len(), "workspace selected");
    state.workspace = Some(path.clone());
    state.db = Some(conn);
    state.session = Session::new(form);

    ok(
        &req.id,
        json!({
            "workspacePath": path.to_string_lossy(),
            "settings": state.session.form,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "health" => Some(handle_health(state, req)),
        "workspace.select" => Some(handle_workspace_select(state, req)),
        _ => None,
    }
}
