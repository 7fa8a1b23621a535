use crate::batch::{self, CardOutcome};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{
    optional_str, optional_usize, persist_form, require_workspace, sha256_hex,
};
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::{Path, PathBuf};

const DEFAULT_ZIP_NAME: &str = "kartu_ujian.zip";
const DEFAULT_DOCX_NAME: &str = "kartu_ujian.docx";
const PREVIEW_NAME: &str = "preview.jpg";

/// Generation requests may carry the current form; it is applied and written back first.
fn sync_form(state: &mut AppState, req: &Request) -> Result<(), serde_json::Value> {
    if let Some(form) = req.params.get("form") {
        let Some(patch) = form.as_object() else {
            return Err(err(&req.id, "bad_params", "form must be an object", None));
        };
        state
            .session
            .form
            .apply_patch(patch)
            .map_err(|msg| err(&req.id, "bad_params", msg, None))?;
    }
    persist_form(state, req)
}

fn output_path(state: &AppState, req: &Request, workspace: &Path, default_name: &str) -> PathBuf {
    if let Some(p) = optional_str(req, "outPath") {
        return PathBuf::from(p);
    }
    let dir = state.session.form.paths.output.trim();
    if dir.is_empty() {
        workspace.join(default_name)
    } else {
        PathBuf::from(dir).join(default_name)
    }
}

fn write_output(req: &Request, path: &Path, bytes: &[u8]) -> Result<(), serde_json::Value> {
    let io_err = |e: std::io::Error| {
        err(
            &req.id,
            "io_failed",
            e.to_string(),
            Some(json!({ "path": path.to_string_lossy() })),
        )
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
    }
    std::fs::write(path, bytes).map_err(io_err)
}

enum Output {
    Zip,
    Docx,
}

/// Everything up to and including the render; the file is only written once the whole batch
/// succeeded.
fn run_batch(state: &mut AppState, req: &Request, output: Output) -> serde_json::Value {
    let workspace = match require_workspace(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    if let Err(resp) = sync_form(state, req) {
        return resp;
    }
    if state.session.roster.is_none() {
        return err(&req.id, "no_roster", "load a student workbook first", None);
    }
    let fonts = state.session.fonts(&workspace);
    let brand = state.session.brand_assets();
    let session = &state.session;
    let Some(roster) = session.roster.as_ref() else {
        return err(&req.id, "no_roster", "load a student workbook first", None);
    };
    let inputs = session.render_inputs(roster, &brand, &fonts);
    let mut progress = |done: usize, total: usize| {
        tracing::debug!(done, total, "card rendered");
    };

    let (default_name, rendered) = match output {
        Output::Zip => (
            DEFAULT_ZIP_NAME,
            batch::render_zip(&inputs, &mut progress).map(|a| {
                let extra = json!({
                    "entries": a.entry_names.len(),
                    "collisions": a.collisions,
                });
                (a.bytes, a.outcomes, extra)
            }),
        ),
        Output::Docx => (
            DEFAULT_DOCX_NAME,
            batch::render_docx(&inputs, &mut progress).map(|d| {
                let extra = json!({ "pageBreaks": d.page_breaks });
                (d.bytes, d.outcomes, extra)
            }),
        ),
    };
    let (bytes, outcomes, extra) = match rendered {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!(error = %format!("{:#}", e), "card generation failed");
            return err(&req.id, "render_failed", format!("{:#}", e), None);
        }
    };

    let path = output_path(state, req, &workspace, default_name);
    if let Err(resp) = write_output(req, &path, &bytes) {
        return resp;
    }
    let placeholders = outcomes
        .iter()
        .filter(|o| o.photo == crate::photos::PhotoSource::Placeholder)
        .count();
    tracing::info!(path = %path.to_string_lossy(), cards = outcomes.len(), "cards written");

    let mut result = json!({
        "path": path.to_string_lossy(),
        "cards": outcomes.len(),
        "placeholders": placeholders,
        "bytes": bytes.len(),
        "sha256": sha256_hex(&bytes),
        "outcomes": outcomes,
    });
    if let (Some(obj), Some(extra)) = (result.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }
    ok(&req.id, result)
}

fn handle_cards_preview(state: &mut AppState, req: &Request) -> serde_json::Value {
    let workspace = match require_workspace(state, req) {
        Ok(v) => v,
        Err(resp) => return resp,
    };
    let index = match optional_usize(req, "index") {
        Ok(v) => v.unwrap_or(0),
        Err(resp) => return resp,
    };
    if let Err(resp) = sync_form(state, req) {
        return resp;
    }
    if state.session.roster.is_none() {
        return err(&req.id, "no_roster", "load a student workbook first", None);
    }
    let fonts = state.session.fonts(&workspace);
    let brand = state.session.brand_assets();
    let session = &state.session;
    let Some(roster) = session.roster.as_ref() else {
        return err(&req.id, "no_roster", "load a student workbook first", None);
    };
    if index >= roster.len() {
        return err(
            &req.id,
            "not_found",
            "no student at that index",
            Some(json!({ "index": index, "count": roster.len() })),
        );
    }
    let inputs = session.render_inputs(roster, &brand, &fonts);
    let (jpeg, outcome): (Vec<u8>, CardOutcome) = match batch::render_preview(&inputs, index) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "render_failed", format!("{:#}", e), None),
    };

    let path = optional_str(req, "outPath")
        .map(PathBuf::from)
        .unwrap_or_else(|| workspace.join(PREVIEW_NAME));
    if let Err(resp) = write_output(req, &path, &jpeg) {
        return resp;
    }
    ok(
        &req.id,
        json!({
            "path": path.to_string_lossy(),
            "bytes": jpeg.len(),
            "sha256": sha256_hex(&jpeg),
            "outcome": outcome,
        }),
    )
}

fn handle_cards_export_zip(state: &mut AppState, req: &Request) -> serde_json::Value {
    run_batch(state, req, Output::Zip)
}

fn handle_cards_export_docx(state: &mut AppState, req: &Request) -> serde_json::Value {
    run_batch(state, req, Output::Docx)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "cards.preview" => Some(handle_cards_preview(state, req)),
        "cards.exportZip" => Some(handle_cards_export_zip(state, req)),
        "cards.exportDocx" => Some(handle_cards_export_docx(state, req)),
        _ => None,
    }
}
