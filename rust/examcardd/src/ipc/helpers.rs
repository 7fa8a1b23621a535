use rusqlite::Connection;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::path::PathBuf;

use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};

pub fn required_str(req: &Request, key: &str) -> Result<String, Value> {
    match req.params.get(key).and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => Ok(v.trim().to_string()),
        _ => Err(err(&req.id, "bad_params", format!("missing {}", key), None)),
    }
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

pub fn optional_usize(req: &Request, key: &str) -> Result<Option<usize>, Value> {
    match req.params.get(key) {
        None | Some(Value::Null) => Ok(None),
        Some(v) => v.as_u64().map(|n| Some(n as usize)).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                format!("{} must be a non-negative integer", key),
                None,
            )
        }),
    }
}

pub fn require_workspace(state: &AppState, req: &Request) -> Result<PathBuf, Value> {
    state
        .workspace
        .clone()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

pub fn require_db<'a>(
    state: &'a mut AppState,
    req: &Request,
) -> Result<&'a mut Connection, Value> {
    state
        .db
        .as_mut()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// Write the whole form back to the settings table.
pub fn persist_form(state: &mut AppState, req: &Request) -> Result<(), Value> {
    let pairs = state.session.form.to_pairs();
    let conn = require_db(state, req)?;
    crate::db::settings_put_many(conn, &pairs)
        .map_err(|e| err(&req.id, "db_update_failed", e.to_string(), None))
}

pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}
