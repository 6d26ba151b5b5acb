use std::path::PathBuf;

use crate::config::LmsConfig;
use crate::feedback::{self, FeedbackProvider};
use crate::gate::Actor;
use rusqlite::Connection;
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
    /// Resolved by the authentication collaborator; absent for anonymous calls.
    #[serde(default)]
    pub actor: Option<Actor>,
}

pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub db: Option<Connection>,
    pub config: LmsConfig,
    pub feedback: Box<dyn FeedbackProvider>,
}

impl AppState {
    pub fn new(config: LmsConfig) -> Self {
        let feedback = feedback::from_config(&config.feedback);
        Self {
            workspace: None,
            db: None,
            config,
            feedback,
        }
    }
}
