mod error;
mod handlers;
mod helpers;
mod router;
mod types;

pub use handlers::core::open_workspace;
pub use router::handle_request;
pub use types::{AppState, Request};

/// Reply for a line that is not a request; there is no id to echo.
pub fn bad_json(message: &str) -> serde_json::Value {
    error::err("", "bad_json", message, None)
}
