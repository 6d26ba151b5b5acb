//! Course records: creation, edits, listings and the cascading delete.

use crate::error::{LmsError, LmsResult};
use crate::files;
use crate::gate::Role;
use crate::model::{Course, CourseFile, CoursePatch, EnrollmentState, NewCourse};
use crate::store::{self, courses::CascadeReport, courses::CourseFilter, courses::CourseListing, enrollments::RosterEntry};
use rusqlite::Connection;
use serde::Serialize;
use std::path::Path;
use tracing::{info, warn};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseDeletion {
    pub course_id: String,
    #[serde(flatten)]
    pub removed: CascadeReport,
    pub file_cleanup_failures: usize,
}

fn require_text(value: &str, field: &str) -> LmsResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(LmsError::validation(format!("missing {field}")));
    }
    Ok(v.to_string())
}

fn clean_list(items: &[String]) -> Vec<String> {
    items
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

pub fn find(conn: &Connection, course_id: &str) -> LmsResult<Course> {
    store::courses::find_course(conn, course_id)?.ok_or_else(|| LmsError::not_found("Course"))
}

/// The course, provided `teacher_id` owns it.
pub fn require_owner(conn: &Connection, course_id: &str, teacher_id: &str) -> LmsResult<Course> {
    let course = find(conn, course_id)?;
    if course.teacher_id != teacher_id {
        return Err(LmsError::forbidden("You are not the owner of this course"));
    }
    Ok(course)
}

pub fn create_course(conn: &Connection, teacher_id: &str, new: &NewCourse, now: &str) -> LmsResult<Course> {
    if store::accounts::find_account(conn, Role::Teacher, teacher_id)?.is_none() {
        return Err(LmsError::not_found("Teacher"));
    }
    let course = Course {
        id: store::new_id(),
        title: require_text(&new.title, "title")?,
        course_code: require_text(&new.course_code, "courseCode")?,
        description: require_text(&new.description, "description")?,
        duration: new.duration.trim().to_string(),
        level: new.level,
        course_format: new.course_format.trim().to_string(),
        prerequisites: clean_list(&new.prerequisites),
        objectives: clean_list(&new.objectives),
        teacher_id: teacher_id.to_string(),
        enrolled_count: 0,
        files: Vec::new(),
        created_at: now.to_string(),
    };
    match store::courses::insert_course(conn, &course) {
        Ok(()) => {}
        Err(e) if store::is_unique_violation(&e) => {
            return Err(LmsError::conflict(format!(
                "Course code {} already exists",
                course.course_code
            )))
        }
        Err(e) => return Err(e.into()),
    }
    info!(course = %course.id, code = %course.course_code, teacher = %teacher_id, "course created");
    Ok(course)
}

pub fn update_course(
    conn: &Connection,
    teacher_id: &str,
    course_id: &str,
    patch: &CoursePatch,
) -> LmsResult<Course> {
    let mut course = require_owner(conn, course_id, teacher_id)?;
    if let Some(t) = &patch.title {
        course.title = require_text(t, "title")?;
    }
    if let Some(d) = &patch.description {
        course.description = require_text(d, "description")?;
    }
    if let Some(d) = &patch.duration {
        course.duration = d.trim().to_string();
    }
    if let Some(l) = patch.level {
        course.level = l;
    }
    if let Some(f) = &patch.course_format {
        course.course_format = f.trim().to_string();
    }
    if let Some(p) = &patch.prerequisites {
        course.prerequisites = clean_list(p);
    }
    if let Some(o) = &patch.objectives {
        course.objectives = clean_list(o);
    }
    store::courses::update_course(conn, &course)?;
    Ok(course)
}

pub fn add_file(conn: &Connection, teacher_id: &str, course_id: &str, file: &CourseFile) -> LmsResult<Course> {
    require_owner(conn, course_id, teacher_id)?;
    let file = CourseFile {
        url: require_text(&file.url, "url")?,
        kind: file.kind,
        name: require_text(&file.name, "name")?,
    };
    store::courses::add_file(conn, course_id, &store::new_id(), &file)?;
    find(conn, course_id)
}

pub fn list_all(conn: &Connection) -> LmsResult<Vec<CourseListing>> {
    Ok(store::courses::list_courses(conn, CourseFilter::All)?)
}

pub fn list_created(conn: &Connection, teacher_id: &str) -> LmsResult<Vec<CourseListing>> {
    Ok(store::courses::list_courses(conn, CourseFilter::Teacher(teacher_id))?)
}

/// Courses where the student sits in `state` (enrolled or pending).
pub fn list_for_student(
    conn: &Connection,
    student_id: &str,
    state: EnrollmentState,
) -> LmsResult<Vec<CourseListing>> {
    Ok(store::courses::list_courses(conn, CourseFilter::Student(student_id, state))?)
}

/// Enrolled and pending students of a course, for its teacher.
pub fn roster(conn: &Connection, teacher_id: &str, course_id: &str) -> LmsResult<Vec<RosterEntry>> {
    require_owner(conn, course_id, teacher_id)?;
    Ok(store::enrollments::roster(conn, course_id)?)
}

/// Deletes the course and everything it owns in one transaction, then
/// removes stored submission files. File removal failures are logged and
/// counted but never undo the deletion.
pub fn delete_course(
    conn: &Connection,
    workspace: &Path,
    teacher_id: &str,
    course_id: &str,
) -> LmsResult<CourseDeletion> {
    require_owner(conn, course_id, teacher_id)?;

    let tx = conn.unchecked_transaction()?;
    let removed = store::courses::delete_course_cascade(&tx, course_id)?;
    tx.commit()?;

    let mut file_cleanup_failures = 0;
    for file_ref in &removed.file_refs {
        if let Err(e) = files::remove_file(workspace, file_ref) {
            file_cleanup_failures += 1;
            warn!(course = %course_id, file = %file_ref, error = %format!("{e:#}"), "stored file not removed");
        }
    }

    info!(
        course = %course_id,
        assessments = removed.assessments,
        assignments = removed.assignments,
        enrollments = removed.enrollments,
        "course deleted"
    );
    Ok(CourseDeletion {
        course_id: course_id.to_string(),
        removed,
        file_cleanup_failures,
    })
}
