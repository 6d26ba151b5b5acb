use crate::error::{LmsError, LmsResult};
use serde_json::json;
use tracing::{error, warn};

pub fn ok(id: &str, result: serde_json::Value) -> serde_json::Value {
    json!({
        "id": id,
        "ok": true,
        "result": result
    })
}

fn failure(
    id: &str,
    code: &str,
    status: u16,
    message: String,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    let mut error = json!({
        "code": code,
        "status": status,
        "message": message,
    });
    if let Some(d) = details {
        error["details"] = d;
    }
    json!({
        "id": id,
        "ok": false,
        "error": error,
    })
}

/// Protocol-level failure (unknown method, unparseable line); always a 400.
pub fn err(
    id: &str,
    code: &str,
    message: impl Into<String>,
    details: Option<serde_json::Value>,
) -> serde_json::Value {
    failure(id, code, 400, message.into(), details)
}

pub fn fail(id: &str, e: &LmsError) -> serde_json::Value {
    match e {
        LmsError::Unexpected(inner) => {
            error!(request = %id, error = %format!("{inner:#}"), "request failed");
        }
        LmsError::Integrity(message) => {
            warn!(request = %id, %message, "integrity fault");
        }
        _ => {}
    }
    failure(id, e.code(), e.status(), e.to_string(), None)
}

pub fn respond(id: &str, result: LmsResult<serde_json::Value>) -> serde_json::Value {
    match result {
        Ok(v) => ok(id, v),
        Err(e) => fail(id, &e),
    }
}
