use super::parse_ts;
use crate::model::{Assignment, AssignmentSubmission};
use rusqlite::{Connection, OptionalExtension, Row};

const SUBMISSION_COLUMNS: &str =
    "id, assignment_id, student_id, file_ref, file_name, submitted_at, grade, feedback";

fn assignment_from_row(r: &Row<'_>) -> rusqlite::Result<Assignment> {
    let due: String = r.get(5)?;
    Ok(Assignment {
        id: r.get(0)?,
        course_id: r.get(1)?,
        teacher_id: r.get(2)?,
        title: r.get(3)?,
        description: r.get(4)?,
        due_date: parse_ts(5, &due)?,
        created_at: r.get(6)?,
    })
}

fn submission_from_row(r: &Row<'_>) -> rusqlite::Result<AssignmentSubmission> {
    Ok(AssignmentSubmission {
        id: r.get(0)?,
        assignment_id: r.get(1)?,
        student_id: r.get(2)?,
        file_ref: r.get(3)?,
        file_name: r.get(4)?,
        submitted_at: r.get(5)?,
        grade: r.get(6)?,
        feedback: r.get(7)?,
    })
}

pub fn insert_assignment(conn: &Connection, a: &Assignment) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO assignments(id, course_id, teacher_id, title, description, due_date, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?)",
        (
            &a.id,
            &a.course_id,
            &a.teacher_id,
            &a.title,
            &a.description,
            super::ts(&a.due_date),
            &a.created_at,
        ),
    )?;
    Ok(())
}

pub fn find_assignment(conn: &Connection, id: &str) -> rusqlite::Result<Option<Assignment>> {
    conn.query_row(
        "SELECT id, course_id, teacher_id, title, description, due_date, created_at
         FROM assignments WHERE id = ?",
        [id],
        assignment_from_row,
    )
    .optional()
}

pub fn list_for_course(conn: &Connection, course_id: &str) -> rusqlite::Result<Vec<Assignment>> {
    let mut stmt = conn.prepare(
        "SELECT id, course_id, teacher_id, title, description, due_date, created_at
         FROM assignments WHERE course_id = ? ORDER BY due_date, title",
    )?;
    let rows = stmt.query_map([course_id], assignment_from_row)?;
    rows.collect()
}

pub fn delete_assignment(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM assignments WHERE id = ?", [id])
}

pub fn submission_count(conn: &Connection, assignment_id: &str) -> rusqlite::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM assignment_submissions WHERE assignment_id = ?",
        [assignment_id],
        |r| r.get(0),
    )
}

pub fn insert_submission(conn: &Connection, s: &AssignmentSubmission) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO assignment_submissions(id, assignment_id, student_id, file_ref, file_name, submitted_at, grade, feedback)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &s.id,
            &s.assignment_id,
            &s.student_id,
            &s.file_ref,
            &s.file_name,
            &s.submitted_at,
            s.grade,
            &s.feedback,
        ),
    )?;
    Ok(())
}

pub fn find_submission(
    conn: &Connection,
    assignment_id: &str,
    student_id: &str,
) -> rusqlite::Result<Option<AssignmentSubmission>> {
    let sql = format!(
        "SELECT {} FROM assignment_submissions WHERE assignment_id = ? AND student_id = ?",
        SUBMISSION_COLUMNS
    );
    conn.query_row(&sql, (assignment_id, student_id), submission_from_row)
        .optional()
}

pub fn list_submissions(conn: &Connection, assignment_id: &str) -> rusqlite::Result<Vec<AssignmentSubmission>> {
    let sql = format!(
        "SELECT {} FROM assignment_submissions WHERE assignment_id = ? ORDER BY submitted_at",
        SUBMISSION_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([assignment_id], submission_from_row)?;
    rows.collect()
}

/// Swaps the stored file only while the submission is ungraded; returns rows changed.
pub fn replace_submission_file(
    conn: &Connection,
    id: &str,
    file_ref: &str,
    file_name: &str,
    submitted_at: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE assignment_submissions
         SET file_ref = ?, file_name = ?, submitted_at = ?
         WHERE id = ? AND grade IS NULL",
        (file_ref, file_name, submitted_at, id),
    )
}

pub fn set_grade(conn: &Connection, id: &str, grade: f64, feedback: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE assignment_submissions SET grade = ?, feedback = ? WHERE id = ?",
        (grade, feedback, id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{is_unique_violation, test_support::open_temp};
    use chrono::{TimeZone, Utc};

    fn seed(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO teachers VALUES('t1', 'Ms T', 't@school.test', 'h', 'now');
             INSERT INTO courses(id, title, course_code, description, duration, level, course_format, teacher_id, created_at)
               VALUES('c1', 'Algebra', 'MATH-1', 'd', '5 weeks', 'Beginner', 'online', 't1', 'now');",
        )
        .expect("seed");
        insert_assignment(
            conn,
            &Assignment {
                id: "a1".into(),
                course_id: "c1".into(),
                teacher_id: "t1".into(),
                title: "Essay".into(),
                description: String::new(),
                due_date: Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap(),
                created_at: "now".into(),
            },
        )
        .expect("assignment");
    }

    fn submission() -> AssignmentSubmission {
        AssignmentSubmission {
            id: "sub-1".into(),
            assignment_id: "a1".into(),
            student_id: "s1".into(),
            file_ref: "files/a1/old.pdf".into(),
            file_name: "old.pdf".into(),
            submitted_at: "t0".into(),
            grade: None,
            feedback: String::new(),
        }
    }

    #[test]
    fn due_date_round_trips() {
        let (_dir, conn) = open_temp();
        seed(&conn);
        let a = find_assignment(&conn, "a1").expect("find").expect("exists");
        assert_eq!(a.due_date, Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap());
        assert_eq!(list_for_course(&conn, "c1").expect("list").len(), 1);
    }

    #[test]
    fn resubmission_stops_once_graded() {
        let (_dir, conn) = open_temp();
        seed(&conn);
        insert_submission(&conn, &submission()).expect("insert");
        let mut dup = submission();
        dup.id = "sub-2".into();
        assert!(is_unique_violation(&insert_submission(&conn, &dup).unwrap_err()));

        assert_eq!(
            replace_submission_file(&conn, "sub-1", "files/a1/new.pdf", "new.pdf", "t1").expect("replace"),
            1
        );
        set_grade(&conn, "sub-1", 88.0, "good").expect("grade");
        assert_eq!(
            replace_submission_file(&conn, "sub-1", "files/a1/late.pdf", "late.pdf", "t2").expect("replace"),
            0
        );

        let s = find_submission(&conn, "a1", "s1").expect("find").expect("exists");
        assert_eq!(s.file_name, "new.pdf");
        assert_eq!(s.grade, Some(88.0));
    }

    #[test]
    fn out_of_range_grade_is_rejected_by_the_schema() {
        let (_dir, conn) = open_temp();
        seed(&conn);
        insert_submission(&conn, &submission()).expect("insert");
        assert!(set_grade(&conn, "sub-1", 101.0, "").is_err());
    }
}
