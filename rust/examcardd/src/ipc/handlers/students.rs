use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_str, optional_usize, persist_form, require_workspace};
use crate::ipc::types::{AppState, Request};
use crate::roster::{self, RosterError};
use serde_json::json;
use std::path::PathBuf;

const DEFAULT_PAGE: usize = 200;

fn roster_error(req: &Request, e: &anyhow::Error) -> serde_json::Value {
    match e.downcast_ref::<RosterError>() {
        Some(RosterError::MissingColumns { missing, found }) => err(
            &req.id,
            "missing_columns",
            e.to_string(),
            Some(json!({
                "expected": RosterError::expected_columns(),
                "missing": missing,
                "found": found,
            })),
        ),
        Some(_) => err(
            &req.id,
            "missing_columns",
            e.to_string(),
            Some(json!({ "expected": RosterError::expected_columns(), "found": [] })),
        ),
        None => err(&req.id, "io_failed", format!("{:#}", e), None),
    }
}

fn handle_students_load(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    let path = match optional_str(req, "path") {
        Some(p) => p,
        None if !state.session.form.paths.roster.trim().is_empty() => {
            state.session.form.paths.roster.trim().to_string()
        }
        None => return err(&req.id, "bad_params", "missing path", None),
    };

    let loaded = match roster::load_workbook(&PathBuf::from(&path)) {
        Ok(v) => v,
        Err(e) => {
            tracing::info!(path = %path, error = %format!("{:#}", e), "student workbook rejected");
            return roster_error(req, &e);
        }
    };

    let session = &mut state.session;
    let schedule_sheet = loaded.schedule.is_some();
    let schedule_loaded = match loaded.schedule {
        Some(entries) => session.schedule.load_if_empty(entries),
        None => 0,
    };
    let count = loaded.roster.len();
    let columns = loaded.roster.columns().to_vec();
    session.roster = Some(loaded.roster);
    session.form.paths.roster = path.clone();
    tracing::info!(path = %path, students = count, schedule_loaded, "student workbook loaded");

    if let Err(resp) = persist_form(state, req) {
        return resp;
    }
    ok(
        &req.id,
        json!({
            "path": path,
            "count": count,
            "columns": columns,
            "scheduleSheetFound": schedule_sheet,
            "scheduleLoaded": schedule_loaded,
            "scheduleEntries": state.session.schedule.len(),
        }),
    )
}

fn handle_students_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(roster) = state.session.roster.as_ref() else {
        return err(&req.id, "no_roster", "load a student workbook first", None);
    };
    let offset = match optional_usize(req, "offset") {
        Ok(v) => v.unwrap_or(0),
        Err(resp) => return resp,
    };
    let limit = match optional_usize(req, "limit") {
        Ok(v) => v.unwrap_or(DEFAULT_PAGE),
        Err(resp) => return resp,
    };

    let photos = &state.session.photos;
    let rows: Vec<serde_json::Value> = roster
        .records()
        .iter()
        .enumerate()
        .skip(offset)
        .take(limit)
        .map(|(index, r)| {
            let primary = r.primary_id();
            let fallback = r.fallback_id();
            let found = photos.resolve(&primary, &fallback);
            json!({
                "index": index,
                "row": r.row(),
                "participantNo": r.participant_no(),
                "name": r.name(),
                "primaryId": primary,
                "fallbackId": fallback,
                "room": r.room(),
                "photo": found.source,
            })
        })
        .collect();

    ok(
        &req.id,
        json!({
            "total": roster.len(),
            "offset": offset,
            "rows": rows,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.load" => Some(handle_students_load(state, req)),
        "students.list" => Some(handle_students_list(state, req)),
        _ => None,
    }
}
