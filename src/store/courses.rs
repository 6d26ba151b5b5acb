use super::{bad_column, from_json_list, to_json_list};
use crate::model::{Course, CourseFile, EnrollmentState, FileKind, Level};
use rusqlite::{params_from_iter, types::Value, Connection, OptionalExtension, Row};
use serde::Serialize;

const COURSE_COLUMNS: &str = "c.id, c.title, c.course_code, c.description, c.duration, c.level,
    c.course_format, c.prerequisites, c.objectives, c.teacher_id, c.enrolled_count, c.created_at";

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseListing {
    #[serde(flatten)]
    pub course: Course,
    pub teacher_name: Option<String>,
}

#[derive(Debug, Clone, Copy)]
pub enum CourseFilter<'a> {
    All,
    Teacher(&'a str),
    Student(&'a str, EnrollmentState),
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeReport {
    pub assessments: usize,
    pub assessment_submissions: usize,
    pub assignments: usize,
    pub assignment_submissions: usize,
    pub enrollments: usize,
    pub detached_students: Vec<String>,
    #[serde(skip)]
    pub file_refs: Vec<String>,
}

fn course_from_row(r: &Row<'_>) -> rusqlite::Result<Course> {
    let level_raw: String = r.get(5)?;
    let level = Level::parse(&level_raw)
        .ok_or_else(|| bad_column(5, format!("unknown course level: {level_raw}")))?;
    let prerequisites: String = r.get(7)?;
    let objectives: String = r.get(8)?;
    Ok(Course {
        id: r.get(0)?,
        title: r.get(1)?,
        course_code: r.get(2)?,
        description: r.get(3)?,
        duration: r.get(4)?,
        level,
        course_format: r.get(6)?,
        prerequisites: from_json_list(7, &prerequisites)?,
        objectives: from_json_list(8, &objectives)?,
        teacher_id: r.get(9)?,
        enrolled_count: r.get(10)?,
        files: Vec::new(),
        created_at: r.get(11)?,
    })
}

pub fn insert_course(conn: &Connection, c: &Course) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO courses(id, title, course_code, description, duration, level, course_format,
                             prerequisites, objectives, teacher_id, enrolled_count, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &c.id,
            &c.title,
            &c.course_code,
            &c.description,
            &c.duration,
            c.level.as_str(),
            &c.course_format,
            to_json_list(&c.prerequisites),
            to_json_list(&c.objectives),
            &c.teacher_id,
            c.enrolled_count,
            &c.created_at,
        ),
    )?;
    Ok(())
}

/// Writes the editable fields; ownership, code and counter are untouched.
pub fn update_course(conn: &Connection, c: &Course) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE courses
         SET title = ?, description = ?, duration = ?, level = ?, course_format = ?,
             prerequisites = ?, objectives = ?
         WHERE id = ?",
        (
            &c.title,
            &c.description,
            &c.duration,
            c.level.as_str(),
            &c.course_format,
            to_json_list(&c.prerequisites),
            to_json_list(&c.objectives),
            &c.id,
        ),
    )
}

pub fn find_course(conn: &Connection, id: &str) -> rusqlite::Result<Option<Course>> {
    let sql = format!("SELECT {} FROM courses c WHERE c.id = ?", COURSE_COLUMNS);
    let course = conn.query_row(&sql, [id], course_from_row).optional()?;
    match course {
        Some(mut c) => {
            c.files = files_for(conn, &c.id)?;
            Ok(Some(c))
        }
        None => Ok(None),
    }
}

pub fn list_courses(conn: &Connection, filter: CourseFilter<'_>) -> rusqlite::Result<Vec<CourseListing>> {
    let mut sql = format!(
        "SELECT {}, t.name FROM courses c LEFT JOIN teachers t ON t.id = c.teacher_id",
        COURSE_COLUMNS
    );
    let mut values: Vec<Value> = Vec::new();
    match filter {
        CourseFilter::All => {}
        CourseFilter::Teacher(teacher_id) => {
            sql.push_str(" WHERE c.teacher_id = ?");
            values.push(Value::Text(teacher_id.to_string()));
        }
        CourseFilter::Student(student_id, state) => {
            sql.push_str(
                " JOIN enrollments e ON e.course_id = c.id WHERE e.student_id = ? AND e.state = ?",
            );
            values.push(Value::Text(student_id.to_string()));
            values.push(Value::Text(state.as_str().to_string()));
        }
    }
    sql.push_str(" ORDER BY c.title, c.course_code");

    let mut stmt = conn.prepare(&sql)?;
    let mut out = stmt
        .query_map(params_from_iter(values), |r| {
            Ok(CourseListing {
                course: course_from_row(r)?,
                teacher_name: r.get(12)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    for listing in &mut out {
        listing.course.files = files_for(conn, &listing.course.id)?;
    }
    Ok(out)
}

pub fn add_file(conn: &Connection, course_id: &str, file_id: &str, f: &CourseFile) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO course_files(id, course_id, url, kind, name, sort_order)
         VALUES(?, ?, ?, ?, ?,
                (SELECT COALESCE(MAX(sort_order) + 1, 0) FROM course_files WHERE course_id = ?))",
        (file_id, course_id, &f.url, f.kind.as_str(), &f.name, course_id),
    )?;
    Ok(())
}

pub fn files_for(conn: &Connection, course_id: &str) -> rusqlite::Result<Vec<CourseFile>> {
    let mut stmt = conn.prepare(
        "SELECT url, kind, name FROM course_files WHERE course_id = ? ORDER BY sort_order",
    )?;
    let rows = stmt.query_map([course_id], |r| {
        let kind_raw: String = r.get(1)?;
        let kind = FileKind::parse(&kind_raw)
            .ok_or_else(|| bad_column(1, format!("unknown file type: {kind_raw}")))?;
        Ok(CourseFile {
            url: r.get(0)?,
            kind,
            name: r.get(2)?,
        })
    })?;
    rows.collect()
}

/// Moves the enrolled counter by `delta`. Returns 0 when the course is gone
/// or the counter would go negative; callers treat that as an integrity fault.
pub fn adjust_enrolled_count(conn: &Connection, course_id: &str, delta: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE courses SET enrolled_count = enrolled_count + ?1
         WHERE id = ?2 AND enrolled_count + ?1 >= 0",
        (delta, course_id),
    )
}

/// Deletes the course and everything it owns. Run inside a transaction.
pub fn delete_course_cascade(conn: &Connection, course_id: &str) -> rusqlite::Result<CascadeReport> {
    let mut report = CascadeReport::default();

    let mut stmt = conn.prepare(
        "SELECT student_id FROM enrollments WHERE course_id = ? AND state = 'enrolled' ORDER BY student_id",
    )?;
    report.detached_students = stmt
        .query_map([course_id], |r| r.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    let mut stmt = conn.prepare(
        "SELECT s.file_ref
         FROM assignment_submissions s
         JOIN assignments a ON a.id = s.assignment_id
         WHERE a.course_id = ?",
    )?;
    report.file_refs = stmt
        .query_map([course_id], |r| r.get(0))?
        .collect::<Result<Vec<String>, _>>()?;

    conn.execute(
        "DELETE FROM submission_answers
         WHERE submission_id IN (
           SELECT s.id
           FROM assessment_submissions s
           JOIN assessments a ON a.id = s.assessment_id
           WHERE a.course_id = ?
         )",
        [course_id],
    )?;
    report.assessment_submissions = conn.execute(
        "DELETE FROM assessment_submissions
         WHERE assessment_id IN (SELECT id FROM assessments WHERE course_id = ?)",
        [course_id],
    )?;
    conn.execute(
        "DELETE FROM questions
         WHERE assessment_id IN (SELECT id FROM assessments WHERE course_id = ?)",
        [course_id],
    )?;
    report.assessments = conn.execute("DELETE FROM assessments WHERE course_id = ?", [course_id])?;

    report.assignment_submissions = conn.execute(
        "DELETE FROM assignment_submissions
         WHERE assignment_id IN (SELECT id FROM assignments WHERE course_id = ?)",
        [course_id],
    )?;
    report.assignments = conn.execute("DELETE FROM assignments WHERE course_id = ?", [course_id])?;

    report.enrollments = conn.execute("DELETE FROM enrollments WHERE course_id = ?", [course_id])?;
    conn.execute("DELETE FROM course_files WHERE course_id = ?", [course_id])?;
    conn.execute("DELETE FROM courses WHERE id = ?", [course_id])?;

    Ok(report)
}
