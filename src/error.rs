//! Error taxonomy shared by every workflow module.
//!
//! Each variant carries the text shown to the caller; `code` and `status`
//! give the stable wire code and the HTTP-class status it corresponds to.

use thiserror::Error;

pub type LmsResult<T> = Result<T, LmsError>;

#[derive(Debug, Error)]
pub enum LmsError {
    /// Missing or malformed input.
    #[error("{0}")]
    Validation(String),

    /// Duplicate submission, duplicate enrollment request, already graded.
    #[error("{0}")]
    Conflict(String),

    /// Role or ownership mismatch.
    #[error("{0}")]
    Forbidden(String),

    /// An entity id did not resolve.
    #[error("{0}")]
    NotFound(String),

    /// Stored state contradicts itself (e.g. a drifted enrollment counter).
    #[error("integrity fault: {0}")]
    Integrity(String),

    /// No workspace database has been opened yet.
    #[error("select a workspace first")]
    NoWorkspace,

    /// Store or collaborator failure.
    #[error("unexpected failure: {0:#}")]
    Unexpected(#[from] anyhow::Error),
}

impl LmsError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::Forbidden(message.into())
    }

    pub fn integrity(message: impl Into<String>) -> Self {
        Self::Integrity(message.into())
    }

    /// `"<what> not found"`, the wording every lookup failure uses.
    pub fn not_found(what: &str) -> Self {
        Self::NotFound(format!("{what} not found"))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "bad_params",
            Self::Conflict(_) => "conflict",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Integrity(_) => "integrity",
            Self::NoWorkspace => "no_workspace",
            Self::Unexpected(_) => "unexpected",
        }
    }

    pub fn status(&self) -> u16 {
        match self {
            Self::Validation(_) | Self::Conflict(_) | Self::Integrity(_) | Self::NoWorkspace => 400,
            Self::Forbidden(_) => 403,
            Self::NotFound(_) => 404,
            Self::Unexpected(_) => 500,
        }
    }
}

impl From<rusqlite::Error> for LmsError {
    fn from(e: rusqlite::Error) -> Self {
        Self::Unexpected(anyhow::Error::new(e))
    }
}

impl From<serde_json::Error> for LmsError {
    fn from(e: serde_json::Error) -> Self {
        Self::Unexpected(anyhow::Error::new(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn statuses_follow_taxonomy() {
        assert_eq!(LmsError::validation("x").status(), 400);
        assert_eq!(LmsError::conflict("x").status(), 400);
        assert_eq!(LmsError::integrity("x").status(), 400);
        assert_eq!(LmsError::forbidden("x").status(), 403);
        assert_eq!(LmsError::not_found("Quiz").status(), 404);
        assert_eq!(
            LmsError::Unexpected(anyhow::anyhow!("disk full")).status(),
            500
        );
    }

    #[test]
    fn not_found_names_the_entity() {
        let e = LmsError::not_found("Course");
        assert_eq!(e.to_string(), "Course not found");
        assert_eq!(e.code(), "not_found");
    }

    #[test]
    fn sqlite_errors_are_unexpected() {
        let e: LmsError = rusqlite::Error::QueryReturnedNoRows.into();
        assert_eq!(e.code(), "unexpected");
        assert!(e.to_string().starts_with("unexpected failure"));
    }
}
