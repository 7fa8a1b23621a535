use crate::ipc::error::{err, ok};
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use crate::schedule::ScheduleEntry;
use serde_json::json;

fn handle_schedule_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    ok(
        &req.id,
        json!({ "entries": state.session.schedule.entries() }),
    )
}

fn field(req: &Request, key: &str) -> String {
    match req.params.get(key) {
        Some(serde_json::Value::String(s)) => s.clone(),
        Some(serde_json::Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn handle_schedule_add(state: &mut AppState, req: &Request) -> serde_json::Value {
    let day = field(req, "day");
    let subject = field(req, "subject");
    if day.trim().is_empty() && subject.trim().is_empty() {
        return err(&req.id, "bad_params", "day or subject is required", None);
    }
    let entry = ScheduleEntry::new(&day, &field(req, "slot"), &field(req, "time"), &subject);
    state.session.schedule.push(entry.clone());
    ok(
        &req.id,
        json!({ "entry": entry, "count": state.session.schedule.len() }),
    )
}

fn handle_schedule_remove(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if !state.session.schedule.remove(&id) {
        return err(&req.id, "not_found", "schedule entry not found", Some(json!({ "id": id })));
    }
    ok(&req.id, json!({ "count": state.session.schedule.len() }))
}

fn handle_schedule_clear(state: &mut AppState, req: &Request) -> serde_json::Value {
    let removed = state.session.schedule.len();
    state.session.schedule.clear();
    ok(&req.id, json!({ "removed": removed }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "schedule.list" => Some(handle_schedule_list(state, req)),
        "schedule.add" => Some(handle_schedule_add(state, req)),
        "schedule.remove" => Some(handle_schedule_remove(state, req)),
        "schedule.clear" => Some(handle_schedule_clear(state, req)),
        _ => None,
    }
}
