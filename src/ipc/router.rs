use super::handlers;
use super::types::{AppState, Request};
use crate::gate;
use crate::ipc::error::{err, fail};

pub fn handle_request(state: &mut AppState, req: Request) -> serde_json::Value {
    if let Err(e) = gate::authorize(&req.method, req.actor.as_ref()) {
        return fail(&req.id, &e);
    }

    if let Some(resp) = handlers::core::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::accounts::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::courses::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::enrollment::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::assessments::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::assignments::try_handle(state, &req) {
        return resp;
    }
    if let Some(resp) = handlers::analytics::try_handle(state, &req) {
        return resp;
    }

    err(
        &req.id,
        "not_implemented",
        format!("unknown method: {}", req.method),
        None,
    )
}
