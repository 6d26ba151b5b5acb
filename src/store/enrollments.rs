use super::bad_column;
use crate::model::EnrollmentState;
use rusqlite::{Connection, OptionalExtension};
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PendingRequest {
    pub course_id: String,
    pub course_title: String,
    pub course_code: String,
    pub student_id: String,
    pub student_name: String,
    pub student_email: String,
    pub requested_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CounterDrift {
    pub course_id: String,
    pub stored: i64,
    pub actual: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RosterEntry {
    pub student_id: String,
    pub name: String,
    pub email: String,
    pub state: EnrollmentState,
}

pub fn state_of(conn: &Connection, course_id: &str, student_id: &str) -> rusqlite::Result<EnrollmentState> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT state FROM enrollments WHERE course_id = ? AND student_id = ?",
            (course_id, student_id),
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        None => Ok(EnrollmentState::None),
        Some(s) => EnrollmentState::parse(&s)
            .ok_or_else(|| bad_column(0, format!("unknown enrollment state: {s}"))),
    }
}

/// Fails with a PRIMARY KEY violation when the pair already has a row.
pub fn insert_pending(conn: &Connection, course_id: &str, student_id: &str, now: &str) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO enrollments(course_id, student_id, state, requested_at, updated_at)
         VALUES(?, ?, 'pending', ?, ?)",
        (course_id, student_id, now, now),
    )?;
    Ok(())
}

/// Conditional state change; returns 0 when the pair is not in `from`.
pub fn transition(
    conn: &Connection,
    course_id: &str,
    student_id: &str,
    from: EnrollmentState,
    to: EnrollmentState,
    now: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE enrollments SET state = ?, updated_at = ?
         WHERE course_id = ? AND student_id = ? AND state = ?",
        (to.as_str(), now, course_id, student_id, from.as_str()),
    )
}

/// Conditional removal; returns 0 when the pair is not in `from`.
pub fn remove(
    conn: &Connection,
    course_id: &str,
    student_id: &str,
    from: EnrollmentState,
) -> rusqlite::Result<usize> {
    conn.execute(
        "DELETE FROM enrollments WHERE course_id = ? AND student_id = ? AND state = ?",
        (course_id, student_id, from.as_str()),
    )
}

pub fn course_ids_for_student(
    conn: &Connection,
    student_id: &str,
    state: EnrollmentState,
) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT course_id FROM enrollments WHERE student_id = ? AND state = ? ORDER BY course_id",
    )?;
    let rows = stmt.query_map((student_id, state.as_str()), |r| r.get(0))?;
    rows.collect()
}

pub fn delete_for_student(conn: &Connection, student_id: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM enrollments WHERE student_id = ?", [student_id])
}

pub fn roster(conn: &Connection, course_id: &str) -> rusqlite::Result<Vec<RosterEntry>> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.name, s.email, e.state
         FROM enrollments e
         JOIN students s ON s.id = e.student_id
         WHERE e.course_id = ?
         ORDER BY s.name, s.id",
    )?;
    let rows = stmt.query_map([course_id], |r| {
        let raw: String = r.get(3)?;
        let state = EnrollmentState::parse(&raw)
            .ok_or_else(|| bad_column(3, format!("unknown enrollment state: {raw}")))?;
        Ok(RosterEntry {
            student_id: r.get(0)?,
            name: r.get(1)?,
            email: r.get(2)?,
            state,
        })
    })?;
    rows.collect()
}

pub fn pending_requests(conn: &Connection) -> rusqlite::Result<Vec<PendingRequest>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.title, c.course_code, s.id, s.name, s.email, e.requested_at
         FROM enrollments e
         JOIN courses c ON c.id = e.course_id
         JOIN students s ON s.id = e.student_id
         WHERE e.state = 'pending'
         ORDER BY e.requested_at, c.title, s.name",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok(PendingRequest {
            course_id: r.get(0)?,
            course_title: r.get(1)?,
            course_code: r.get(2)?,
            student_id: r.get(3)?,
            student_name: r.get(4)?,
            student_email: r.get(5)?,
            requested_at: r.get(6)?,
        })
    })?;
    rows.collect()
}

/// Courses whose stored counter disagrees with the relation.
pub fn counter_drift(conn: &Connection) -> rusqlite::Result<Vec<CounterDrift>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.enrolled_count,
                (SELECT COUNT(*) FROM enrollments e WHERE e.course_id = c.id AND e.state = 'enrolled')
         FROM courses c
         ORDER BY c.id",
    )?;
    let rows = stmt.query_map([], |r| {
        Ok(CounterDrift {
            course_id: r.get(0)?,
            stored: r.get(1)?,
            actual: r.get(2)?,
        })
    })?;
    Ok(rows
        .collect::<Result<Vec<_>, _>>()?
        .into_iter()
        .filter(|d| d.stored != d.actual)
        .collect())
}

pub fn reset_counter(conn: &Connection, course_id: &str, value: i64) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE courses SET enrolled_count = ? WHERE id = ?",
        (value, course_id),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{is_unique_violation, test_support::open_temp};

    fn seed(conn: &Connection) {
        conn.execute_batch(
            "INSERT INTO teachers VALUES('t1', 'Ms T', 't@school.test', 'h', 'now');
             INSERT INTO students(id, name, email, credential_hash, is_approved, created_at)
               VALUES('s1', 'Sam', 's@school.test', 'h', 1, 'now');
             INSERT INTO courses(id, title, course_code, description, duration, level, course_format, teacher_id, created_at)
               VALUES('c1', 'Algebra', 'MATH-1', 'd', '5 weeks', 'Beginner', 'online', 't1', 'now');",
        )
        .expect("seed");
    }

    #[test]
    fn duplicate_request_is_a_unique_violation() {
        let (_dir, conn) = open_temp();
        seed(&conn);
        insert_pending(&conn, "c1", "s1", "now").expect("first");
        let e = insert_pending(&conn, "c1", "s1", "now").unwrap_err();
        assert!(is_unique_violation(&e));
        assert_eq!(state_of(&conn, "c1", "s1").expect("state"), EnrollmentState::Pending);
    }

    #[test]
    fn transitions_are_conditional() {
        let (_dir, conn) = open_temp();
        seed(&conn);
        insert_pending(&conn, "c1", "s1", "now").expect("pending");
        let moved = transition(&conn, "c1", "s1", EnrollmentState::Pending, EnrollmentState::Enrolled, "later")
            .expect("approve");
        assert_eq!(moved, 1);
        let again = transition(&conn, "c1", "s1", EnrollmentState::Pending, EnrollmentState::Enrolled, "later")
            .expect("approve again");
        assert_eq!(again, 0);
        assert_eq!(remove(&conn, "c1", "s1", EnrollmentState::Pending).expect("cancel"), 0);
        assert_eq!(
            course_ids_for_student(&conn, "s1", EnrollmentState::Enrolled).expect("ids"),
            vec!["c1".to_string()]
        );
    }

    #[test]
    fn drift_is_reported_until_reset() {
        let (_dir, conn) = open_temp();
        seed(&conn);
        insert_pending(&conn, "c1", "s1", "now").expect("pending");
        transition(&conn, "c1", "s1", EnrollmentState::Pending, EnrollmentState::Enrolled, "now")
            .expect("approve");
        let drift = counter_drift(&conn).expect("drift");
        assert_eq!(
            drift,
            vec![CounterDrift {
                course_id: "c1".into(),
                stored: 0,
                actual: 1
            }]
        );
        reset_counter(&conn, "c1", 1).expect("reset");
        assert!(counter_drift(&conn).expect("drift").is_empty());
    }
}
