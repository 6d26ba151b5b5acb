use crate::db;
use crate::error::{LmsError, LmsResult};
use crate::ipc::error::respond;
use crate::ipc::helpers::required_str;
use crate::ipc::types::{AppState, Request};
use serde_json::json;
use std::path::PathBuf;
use tracing::info;

fn health(state: &AppState) -> LmsResult<serde_json::Value> {
    Ok(json!({
        "message": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "workspacePath": state.workspace.as_ref().map(|p| p.to_string_lossy().to_string())
    }))
}

/// Opens (creating if needed) the workspace database and makes it current.
pub fn open_workspace(state: &mut AppState, path: PathBuf) -> LmsResult<()> {
    let conn = db::open_db(&path)
        .map_err(|e| LmsError::Unexpected(e.context(format!("cannot open workspace {}", path.display()))))?;
    info!(workspace = %path.display(), "workspace opened");
    state.workspace = Some(path);
    state.db = Some(conn);
    Ok(())
}

fn workspace_select(state: &mut AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let path = PathBuf::from(required_str(&req.params, "path")?);
    open_workspace(state, path.clone())?;
    Ok(json!({
        "message": "Workspace selected",
        "workspacePath": path.to_string_lossy()
    }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "health" => health(state),
        "workspace.select" => workspace_select(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
