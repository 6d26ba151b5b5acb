//! File-based assignments.
//!
//! One submission per student. It may be swapped for a new file while it is
//! ungraded and the due date has not passed; the teacher's grade is a single
//! number in `[0, 100]`.

use crate::courses;
use crate::error::{LmsError, LmsResult};
use crate::files;
use crate::grading;
use crate::model::{Assignment, AssignmentSubmission, NewAssignment, WithStudent};
use crate::store::{self, assignments};
use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

/// What a student sees when listing a course's assignments.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentAssignment {
    pub id: String,
    pub title: String,
    pub description: String,
    pub due_date: DateTime<Utc>,
    pub submitted: bool,
    pub grade: Option<f64>,
    pub feedback: String,
}

/// An uploaded file waiting to be stored.
#[derive(Debug, Clone, Copy)]
pub struct Upload<'a> {
    pub path: &'a Path,
    pub file_name: Option<&'a str>,
}

pub fn find(conn: &Connection, assignment_id: &str) -> LmsResult<Assignment> {
    assignments::find_assignment(conn, assignment_id)?.ok_or_else(|| LmsError::not_found("Assignment"))
}

fn find_owned(conn: &Connection, teacher_id: &str, assignment_id: &str) -> LmsResult<Assignment> {
    let a = find(conn, assignment_id)?;
    courses::require_owner(conn, &a.course_id, teacher_id)?;
    Ok(a)
}

fn store_upload(workspace: &Path, a: &Assignment, student_id: &str, upload: Upload<'_>) -> LmsResult<files::StoredFile> {
    if !upload.path.is_file() {
        return Err(LmsError::validation("No file uploaded"));
    }
    if files::is_inside(workspace, upload.path)? {
        return Err(LmsError::validation("Uploads cannot be read from inside the workspace"));
    }
    let folder = format!("assignments/{}/{}", a.id, student_id);
    Ok(files::store_file(workspace, &folder, upload.path, upload.file_name)?)
}

fn discard(workspace: &Path, file_ref: &str) {
    if let Err(e) = files::remove_file(workspace, file_ref) {
        warn!(file = %file_ref, error = %format!("{e:#}"), "stored file not removed");
    }
}

pub fn create(conn: &Connection, teacher_id: &str, new: &NewAssignment, now: &str) -> LmsResult<Assignment> {
    courses::require_owner(conn, &new.course_id, teacher_id)?;
    let title = new.title.trim();
    if title.is_empty() {
        return Err(LmsError::validation("missing title"));
    }
    let a = Assignment {
        id: store::new_id(),
        course_id: new.course_id.clone(),
        teacher_id: teacher_id.to_string(),
        title: title.to_string(),
        description: new.description.trim().to_string(),
        due_date: new.due_date,
        created_at: now.to_string(),
    };
    assignments::insert_assignment(conn, &a)?;
    info!(assignment = %a.id, course = %a.course_id, "assignment created");
    Ok(a)
}

pub fn list(conn: &Connection, course_id: &str) -> LmsResult<Vec<Assignment>> {
    courses::find(conn, course_id)?;
    Ok(assignments::list_for_course(conn, course_id)?)
}

pub fn list_for_student(conn: &Connection, course_id: &str, student_id: &str) -> LmsResult<Vec<StudentAssignment>> {
    list(conn, course_id)?
        .into_iter()
        .map(|a| -> LmsResult<StudentAssignment> {
            let mine = assignments::find_submission(conn, &a.id, student_id)?;
            Ok(StudentAssignment {
                submitted: mine.is_some(),
                grade: mine.as_ref().and_then(|s| s.grade),
                feedback: mine.map(|s| s.feedback).unwrap_or_default(),
                id: a.id,
                title: a.title,
                description: a.description,
                due_date: a.due_date,
            })
        })
        .collect()
}

pub fn submissions(
    conn: &Connection,
    teacher_id: &str,
    assignment_id: &str,
) -> LmsResult<Vec<WithStudent<AssignmentSubmission>>> {
    let a = find_owned(conn, teacher_id, assignment_id)?;
    assignments::list_submissions(conn, &a.id)?
        .into_iter()
        .map(|s| -> LmsResult<WithStudent<AssignmentSubmission>> {
            let who = store::accounts::find_student(conn, &s.student_id)?;
            Ok(WithStudent {
                student_name: who.as_ref().map(|w| w.name.clone()),
                student_email: who.map(|w| w.email),
                item: s,
            })
        })
        .collect()
}

pub fn delete(conn: &Connection, teacher_id: &str, assignment_id: &str) -> LmsResult<()> {
    let a = find_owned(conn, teacher_id, assignment_id)?;
    if assignments::submission_count(conn, &a.id)? > 0 {
        return Err(LmsError::validation(
            "Cannot delete. Students have already submitted work.",
        ));
    }
    assignments::delete_assignment(conn, &a.id)?;
    info!(assignment = %a.id, "assignment deleted");
    Ok(())
}

/// First submission. Accepted after the due date; only resubmission is
/// bound by it.
pub fn submit(
    conn: &Connection,
    workspace: &Path,
    student_id: &str,
    assignment_id: &str,
    upload: Upload<'_>,
    now: DateTime<Utc>,
) -> LmsResult<AssignmentSubmission> {
    let a = find(conn, assignment_id)?;
    if store::accounts::find_student(conn, student_id)?.is_none() {
        return Err(LmsError::not_found("Student"));
    }
    let duplicate = || LmsError::conflict("You have already submitted this assignment");
    if assignments::find_submission(conn, &a.id, student_id)?.is_some() {
        return Err(duplicate());
    }

    let stored = store_upload(workspace, &a, student_id, upload)?;
    let submission = AssignmentSubmission {
        id: store::new_id(),
        assignment_id: a.id.clone(),
        student_id: student_id.to_string(),
        file_ref: stored.file_ref,
        file_name: stored.file_name,
        submitted_at: store::ts(&now),
        grade: None,
        feedback: String::new(),
    };
    match assignments::insert_submission(conn, &submission) {
        Ok(()) => {}
        Err(e) if store::is_unique_violation(&e) => {
            let winner = assignments::find_submission(conn, &a.id, student_id)?;
            if winner.map_or(true, |w| w.file_ref != submission.file_ref) {
                discard(workspace, &submission.file_ref);
            }
            return Err(duplicate());
        }
        Err(e) => return Err(e.into()),
    }
    info!(assignment = %a.id, student = %student_id, file = %submission.file_ref, "assignment submitted");
    Ok(submission)
}

/// Swaps the file of an ungraded submission before the due date. The old
/// stored file is removed afterwards, best-effort.
pub fn resubmit(
    conn: &Connection,
    workspace: &Path,
    student_id: &str,
    assignment_id: &str,
    upload: Upload<'_>,
    now: DateTime<Utc>,
) -> LmsResult<AssignmentSubmission> {
    let a = find(conn, assignment_id)?;
    if now > a.due_date {
        return Err(LmsError::validation("Cannot resubmit. Due date has passed."));
    }
    let current = assignments::find_submission(conn, &a.id, student_id)?
        .ok_or_else(|| LmsError::not_found("Submission"))?;
    let graded = || LmsError::validation("Cannot resubmit. Assignment has already been graded.");
    if current.grade.is_some() {
        return Err(graded());
    }

    let stored = store_upload(workspace, &a, student_id, upload)?;
    let submitted_at = store::ts(&now);
    let changed = assignments::replace_submission_file(
        conn,
        &current.id,
        &stored.file_ref,
        &stored.file_name,
        &submitted_at,
    )?;
    if changed == 0 {
        if stored.file_ref != current.file_ref {
            discard(workspace, &stored.file_ref);
        }
        return Err(graded());
    }
    if stored.file_ref != current.file_ref {
        discard(workspace, &current.file_ref);
    }

    info!(assignment = %a.id, student = %student_id, file = %stored.file_ref, "assignment resubmitted");
    Ok(AssignmentSubmission {
        file_ref: stored.file_ref,
        file_name: stored.file_name,
        submitted_at,
        ..current
    })
}

/// Sets or replaces the grade; assignments may be re-graded.
pub fn grade(
    conn: &Connection,
    teacher_id: &str,
    assignment_id: &str,
    student_id: &str,
    grade: f64,
    feedback: Option<&str>,
) -> LmsResult<AssignmentSubmission> {
    let a = find_owned(conn, teacher_id, assignment_id)?;
    let grade = grading::validate_assignment_grade(grade)?;
    let current = assignments::find_submission(conn, &a.id, student_id)?
        .ok_or_else(|| LmsError::not_found("Submission"))?;
    let feedback = feedback.unwrap_or_default().to_string();
    assignments::set_grade(conn, &current.id, grade, &feedback)?;
    info!(assignment = %a.id, student = %student_id, grade, "assignment graded");
    Ok(AssignmentSubmission {
        grade: Some(grade),
        feedback,
        ..current
    })
}
