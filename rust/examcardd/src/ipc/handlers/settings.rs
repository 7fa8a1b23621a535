use crate::ipc::error::{err, ok};
use crate::ipc::helpers::persist_form;
use crate::ipc::types::{AppState, Request};
use serde_json::json;

fn handle_settings_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    ok(&req.id, json!({ "settings": state.session.form }))
}

fn handle_settings_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    if state.db.is_none() {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    }
    let Some(patch) = req.params.get("patch").and_then(|v| v.as_object()) else {
        return err(&req.id, "bad_params", "patch must be an object", None);
    };
    if let Err(msg) = state.session.form.apply_patch(patch) {
        return err(&req.id, "bad_params", msg, None);
    }
    if let Err(resp) = persist_form(state, req) {
        return resp;
    }
    ok(&req.id, json!({ "settings": state.session.form }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "settings.get" => Some(handle_settings_get(state, req)),
        "settings.update" => Some(handle_settings_update(state, req)),
        _ => None,
    }
}
