use crate::error::{LmsError, LmsResult};
use crate::gate::Actor;
use crate::ipc::types::{AppState, Request};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::json;
use std::path::Path;

pub fn db_conn(state: &AppState) -> LmsResult<&Connection> {
    state.db.as_ref().ok_or(LmsError::NoWorkspace)
}

pub fn workspace_path(state: &AppState) -> LmsResult<&Path> {
    state.workspace.as_deref().ok_or(LmsError::NoWorkspace)
}

pub fn required_str(params: &serde_json::Value, key: &str) -> LmsResult<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
        .ok_or_else(|| LmsError::validation(format!("missing params.{key}")))
}

pub fn optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Deserializes the whole params object.
pub fn parse_params<T: DeserializeOwned>(params: &serde_json::Value) -> LmsResult<T> {
    serde_json::from_value(params.clone()).map_err(|e| LmsError::validation(format!("invalid params: {e}")))
}

/// Deserializes one field; absent fields fall back to `T::default()`.
pub fn parse_field<T: DeserializeOwned + Default>(params: &serde_json::Value, key: &str) -> LmsResult<T> {
    match params.get(key) {
        None | Some(serde_json::Value::Null) => Ok(T::default()),
        Some(v) => serde_json::from_value(v.clone())
            .map_err(|e| LmsError::validation(format!("invalid params.{key}: {e}"))),
    }
}

/// The gate has already checked the role; this only hands back the identity.
pub fn actor(req: &Request) -> LmsResult<&Actor> {
    req.actor
        .as_ref()
        .ok_or_else(|| LmsError::forbidden("authentication required"))
}

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Serializes `body` and adds the human-readable `message` field.
pub fn with_message<T: Serialize>(message: &str, body: &T) -> LmsResult<serde_json::Value> {
    let mut v = serde_json::to_value(body)?;
    match v.as_object_mut() {
        Some(map) => {
            map.insert("message".to_string(), json!(message));
            Ok(v)
        }
        None => Ok(json!({ "message": message, "value": v })),
    }
}
