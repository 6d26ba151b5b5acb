//! Actor/role gate.
//!
//! The authentication collaborator resolves the caller into an [`Actor`];
//! every method declares the role it needs and the router checks that before
//! any handler runs.

use crate::error::{LmsError, LmsResult};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Teacher,
    Parent,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Student => "student",
            Role::Teacher => "teacher",
            Role::Parent => "parent",
            Role::Admin => "admin",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "role", rename_all = "lowercase")]
pub enum Actor {
    Student { id: String },
    Teacher { id: String },
    Parent { id: String },
    Admin { id: String },
}

impl Actor {
    pub fn role(&self) -> Role {
        match self {
            Actor::Student { .. } => Role::Student,
            Actor::Teacher { .. } => Role::Teacher,
            Actor::Parent { .. } => Role::Parent,
            Actor::Admin { .. } => Role::Admin,
        }
    }

    pub fn id(&self) -> &str {
        match self {
            Actor::Student { id }
            | Actor::Teacher { id }
            | Actor::Parent { id }
            | Actor::Admin { id } => id,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Requirement {
    Public,
    Authenticated,
    Role(Role),
}

/// Access requirement per method; `None` for methods this daemon does not know.
pub fn requirement(method: &str) -> Option<Requirement> {
    let req = match method {
        "health" | "workspace.select" | "accounts.register" | "admin.provision"
        | "courses.list" | "course.get" => Requirement::Public,

        "analytics.student" | "analytics.course" | "assessments.list" | "assessment.get"
        | "assignments.list" => Requirement::Authenticated,

        "enrollment.request"
        | "enrollment.cancel"
        | "enrollment.unenroll"
        | "enrollment.state"
        | "courses.enrolled"
        | "courses.pending"
        | "assessment.submit"
        | "assessment.results"
        | "assignment.submit"
        | "assignment.resubmit" => Requirement::Role(Role::Student),

        "course.create"
        | "course.update"
        | "course.files.add"
        | "course.delete"
        | "course.roster"
        | "courses.created"
        | "enrollment.removeStudent"
        | "assessment.create"
        | "assessment.update"
        | "assessment.delete"
        | "assessment.grade"
        | "assessment.submissions"
        | "assignment.create"
        | "assignment.grade"
        | "assignment.submissions"
        | "assignment.delete" => Requirement::Role(Role::Teacher),

        "enrollment.approve"
        | "enrollment.reject"
        | "enrollment.pendingList"
        | "enrollment.audit"
        | "admin.create"
        | "students.unapproved"
        | "student.approve"
        | "student.reject"
        | "student.linkParents"
        | "fees.record"
        | "fees.list" => Requirement::Role(Role::Admin),

        _ => return None,
    };
    Some(req)
}

/// Pure check of `actor` against `method`'s requirement.
pub fn authorize(method: &str, actor: Option<&Actor>) -> LmsResult<()> {
    let Some(required) = requirement(method) else {
        return Ok(());
    };
    match (required, actor) {
        (Requirement::Public, _) => Ok(()),
        (Requirement::Authenticated, Some(_)) => Ok(()),
        (Requirement::Role(role), Some(a)) if a.role() == role => Ok(()),
        (_, None) => Err(LmsError::forbidden("authentication required")),
        (Requirement::Role(role), Some(a)) => Err(LmsError::forbidden(format!(
            "You are not authorized to access this resource! ({} required, got {})",
            role.as_str(),
            a.role().as_str()
        ))),
    }
}
