use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{optional_usize, persist_form, require_workspace, required_str};
use crate::ipc::types::{AppState, Request};
use crate::photos::{ImportSummary, PhotoSource};
use serde_json::json;
use std::path::PathBuf;

fn summary_result(state: &AppState, summary: ImportSummary) -> serde_json::Value {
    json!({
        "added": summary.added,
        "replaced": summary.replaced,
        "skipped": summary.skipped,
        "failed": summary.failed,
        "imported": summary.imported(),
        "total": state.session.photos.len(),
    })
}

fn handle_photos_import_zip(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    let path = match required_str(req, "path") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let summary = match state.session.photos.merge_zip_file(&PathBuf::from(&path)) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("{:#}", e),
                Some(json!({ "path": path })),
            )
        }
    };
    state.session.form.paths.photos = path;
    if let Err(resp) = persist_form(state, req) {
        return resp;
    }
    ok(&req.id, summary_result(state, summary))
}

fn handle_photos_import_files(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    let Some(raw) = req.params.get("paths").and_then(|v| v.as_array()) else {
        return err(&req.id, "bad_params", "paths must be an array", None);
    };
    let mut paths = Vec::with_capacity(raw.len());
    for v in raw {
        let Some(s) = v.as_str() else {
            return err(&req.id, "bad_params", "paths must contain strings", None);
        };
        paths.push(PathBuf::from(s));
    }
    let summary = state.session.photos.merge_files(&paths);
    ok(&req.id, summary_result(state, summary))
}

fn handle_photos_import_dir(state: &mut AppState, req: &Request) -> serde_json::Value {
    if let Err(resp) = require_workspace(state, req) {
        return resp;
    }
    let path = match required_str(req, "path") {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let summary = match state.session.photos.merge_dir(&PathBuf::from(&path)) {
        Ok(v) => v,
        Err(e) => {
            return err(
                &req.id,
                "io_failed",
                format!("{:#}", e),
                Some(json!({ "path": path })),
            )
        }
    };
    state.session.form.paths.photos = path;
    if let Err(resp) = persist_form(state, req) {
        return resp;
    }
    ok(&req.id, summary_result(state, summary))
}

/// Index size plus, when a roster is loaded, which students will print a placeholder.
fn handle_photos_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let limit = match optional_usize(req, "limit") {
        Ok(v) => v.unwrap_or(100),
        Err(resp) => return resp,
    };
    let session = &state.session;
    let mut primary = 0usize;
    let mut fallback = 0usize;
    let mut missing = Vec::new();
    if let Some(roster) = session.roster.as_ref() {
        for r in roster.records() {
            let p = r.primary_id();
            let f = r.fallback_id();
            match session.photos.resolve(&p, &f).source {
                PhotoSource::Primary => primary += 1,
                PhotoSource::Fallback => fallback += 1,
                PhotoSource::Placeholder => missing.push(json!({
                    "row": r.row(),
                    "name": r.name(),
                    "primaryId": p,
                    "fallbackId": f,
                })),
            }
        }
    }
    let missing_count = missing.len();
    missing.truncate(limit);
    let keys: Vec<String> = session.photos.keys().into_iter().take(limit).collect();
    ok(
        &req.id,
        json!({
            "count": session.photos.len(),
            "keys": keys,
            "matchedPrimary": primary,
            "matchedFallback": fallback,
            "missingCount": missing_count,
            "missing": missing,
        }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "photos.importZip" => Some(handle_photos_import_zip(state, req)),
        "photos.importFiles" => Some(handle_photos_import_files(state, req)),
        "photos.importDir" => Some(handle_photos_import_dir(state, req)),
        "photos.status" => Some(handle_photos_status(state, req)),
        _ => None,
    }
}
