//! Enrollment state machine over the `(course, student)` relation.
//!
//! ```text
//! none --request--> pending --approve--> enrolled
//!   ^                 |                     |
//!   +--reject/cancel--+                     |
//!   +------------unenroll/removeStudent-----+
//! ```
//!
//! Every transition is one conditional write, so a pair can only ever be in
//! one state. The course's `enrolled_count` moves in the same transaction;
//! if it cannot, the transition is rolled back as an integrity fault.

use crate::courses;
use crate::error::{LmsError, LmsResult};
use crate::model::EnrollmentState;
use crate::store::{self, enrollments, enrollments::CounterDrift, enrollments::PendingRequest};
use rusqlite::Connection;
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentChange {
    pub course_id: String,
    pub student_id: String,
    pub state: EnrollmentState,
}

impl EnrollmentChange {
    fn new(course_id: &str, student_id: &str, state: EnrollmentState) -> Self {
        Self {
            course_id: course_id.to_string(),
            student_id: student_id.to_string(),
            state,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditReport {
    pub drift: Vec<CounterDrift>,
    pub repaired: bool,
}

fn require_student(conn: &Connection, student_id: &str) -> LmsResult<crate::model::Student> {
    store::accounts::find_student(conn, student_id)?.ok_or_else(|| LmsError::not_found("Student"))
}

fn move_counter(conn: &Connection, course_id: &str, student_id: &str, delta: i64) -> LmsResult<()> {
    if store::courses::adjust_enrolled_count(conn, course_id, delta)? == 0 {
        warn!(course = %course_id, student = %student_id, delta, "enrolled counter out of step");
        return Err(LmsError::integrity(format!(
            "enrolled counter for course {course_id} cannot move by {delta}"
        )));
    }
    Ok(())
}

/// `none -> pending`.
pub fn request(conn: &Connection, student_id: &str, course_id: &str, now: &str) -> LmsResult<EnrollmentChange> {
    let student = require_student(conn, student_id)?;
    if !student.is_approved {
        return Err(LmsError::forbidden("Your account is awaiting admin approval"));
    }
    courses::find(conn, course_id)?;

    match enrollments::state_of(conn, course_id, student_id)? {
        EnrollmentState::Pending => {
            return Err(LmsError::conflict("Enrollment request already pending"))
        }
        EnrollmentState::Enrolled => return Err(LmsError::conflict("Already enrolled in this course")),
        EnrollmentState::None => {}
    }
    match enrollments::insert_pending(conn, course_id, student_id, now) {
        Ok(()) => {}
        Err(e) if store::is_unique_violation(&e) => {
            return Err(LmsError::conflict("Enrollment request already exists"))
        }
        Err(e) => return Err(e.into()),
    }
    info!(course = %course_id, student = %student_id, "enrollment requested");
    Ok(EnrollmentChange::new(course_id, student_id, EnrollmentState::Pending))
}

/// `pending -> enrolled`, admin only.
pub fn approve(conn: &Connection, course_id: &str, student_id: &str, now: &str) -> LmsResult<EnrollmentChange> {
    courses::find(conn, course_id)?;
    require_student(conn, student_id)?;

    let tx = conn.unchecked_transaction()?;
    let moved = enrollments::transition(
        &tx,
        course_id,
        student_id,
        EnrollmentState::Pending,
        EnrollmentState::Enrolled,
        now,
    )?;
    if moved == 0 {
        return Err(LmsError::NotFound("No matching pending enrollment request".to_string()));
    }
    move_counter(&tx, course_id, student_id, 1)?;
    tx.commit()?;

    info!(course = %course_id, student = %student_id, "enrollment approved");
    Ok(EnrollmentChange::new(course_id, student_id, EnrollmentState::Enrolled))
}

/// `pending -> none`, admin only.
pub fn reject(conn: &Connection, course_id: &str, student_id: &str) -> LmsResult<EnrollmentChange> {
    courses::find(conn, course_id)?;
    require_student(conn, student_id)?;
    if enrollments::remove(conn, course_id, student_id, EnrollmentState::Pending)? == 0 {
        return Err(LmsError::NotFound("No matching pending enrollment request".to_string()));
    }
    info!(course = %course_id, student = %student_id, "enrollment rejected");
    Ok(EnrollmentChange::new(course_id, student_id, EnrollmentState::None))
}

/// `pending -> none`, by the requesting student.
pub fn cancel(conn: &Connection, student_id: &str, course_id: &str) -> LmsResult<EnrollmentChange> {
    courses::find(conn, course_id)?;
    if enrollments::remove(conn, course_id, student_id, EnrollmentState::Pending)? == 0 {
        return Err(LmsError::validation("No pending enrollment request for this course"));
    }
    info!(course = %course_id, student = %student_id, "enrollment request cancelled");
    Ok(EnrollmentChange::new(course_id, student_id, EnrollmentState::None))
}

fn drop_enrolled(conn: &Connection, course_id: &str, student_id: &str, not_enrolled: &str) -> LmsResult<()> {
    let tx = conn.unchecked_transaction()?;
    if enrollments::remove(&tx, course_id, student_id, EnrollmentState::Enrolled)? == 0 {
        return Err(LmsError::validation(not_enrolled));
    }
    move_counter(&tx, course_id, student_id, -1)?;
    tx.commit()?;
    Ok(())
}

/// `enrolled -> none`, by the student.
pub fn unenroll(conn: &Connection, student_id: &str, course_id: &str) -> LmsResult<EnrollmentChange> {
    courses::find(conn, course_id)?;
    drop_enrolled(conn, course_id, student_id, "You are not enrolled in this course")?;
    info!(course = %course_id, student = %student_id, "student unenrolled");
    Ok(EnrollmentChange::new(course_id, student_id, EnrollmentState::None))
}

/// `enrolled -> none`, by the teacher owning the course.
pub fn remove_student(
    conn: &Connection,
    teacher_id: &str,
    course_id: &str,
    student_id: &str,
) -> LmsResult<EnrollmentChange> {
    courses::require_owner(conn, course_id, teacher_id)?;
    drop_enrolled(conn, course_id, student_id, "Student is not enrolled in this course")?;
    info!(course = %course_id, student = %student_id, teacher = %teacher_id, "student removed from course");
    Ok(EnrollmentChange::new(course_id, student_id, EnrollmentState::None))
}

pub fn state(conn: &Connection, course_id: &str, student_id: &str) -> LmsResult<EnrollmentState> {
    courses::find(conn, course_id)?;
    Ok(enrollments::state_of(conn, course_id, student_id)?)
}

pub fn pending_list(conn: &Connection) -> LmsResult<Vec<PendingRequest>> {
    Ok(enrollments::pending_requests(conn)?)
}

/// Compares every course counter with the relation. Drift is reported, and
/// only rewritten when `repair` is set.
pub fn audit(conn: &Connection, repair: bool) -> LmsResult<AuditReport> {
    let drift = enrollments::counter_drift(conn)?;
    for d in &drift {
        warn!(course = %d.course_id, stored = d.stored, actual = d.actual, "enrolled counter drift");
    }
    if repair && !drift.is_empty() {
        let tx = conn.unchecked_transaction()?;
        for d in &drift {
            enrollments::reset_counter(&tx, &d.course_id, d.actual)?;
        }
        tx.commit()?;
        info!(courses = drift.len(), "enrolled counters repaired");
    }
    Ok(AuditReport {
        repaired: repair && !drift.is_empty(),
        drift,
    })
}
