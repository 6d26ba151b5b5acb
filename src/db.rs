use anyhow::Context;
use rusqlite::{Connection, OptionalExtension};
use std::path::Path;

pub const DB_FILE: &str = "lmsd.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace).with_context(|| {
        format!("failed to create workspace {}", workspace.to_string_lossy())
    })?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(&db_path)
        .with_context(|| format!("failed to open {}", db_path.to_string_lossy()))?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS teachers(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            credential_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            credential_hash TEXT NOT NULL,
            parent_email1 TEXT,
            parent_email2 TEXT,
            is_approved INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS parents(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            credential_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS admins(
            id TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL UNIQUE,
            credential_hash TEXT NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses(
            id TEXT PRIMARY KEY,
            title TEXT NOT NULL,
            course_code TEXT NOT NULL UNIQUE,
            description TEXT NOT NULL,
            duration TEXT NOT NULL,
            level TEXT NOT NULL,
            course_format TEXT NOT NULL,
            prerequisites TEXT NOT NULL DEFAULT '[]',
            objectives TEXT NOT NULL DEFAULT '[]',
            teacher_id TEXT NOT NULL,
            enrolled_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            FOREIGN KEY(teacher_id) REFERENCES teachers(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_courses_teacher ON courses(teacher_id)",
        [],
    )?;
    // Workspaces created before the counter existed get it backfilled from the relation.
    ensure_courses_enrolled_count(&conn)?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS course_files(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            url TEXT NOT NULL,
            kind TEXT NOT NULL,
            name TEXT NOT NULL,
            sort_order INTEGER NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_course_files_course ON course_files(course_id)",
        [],
    )?;

    // One row per (course, student); no row means no relationship.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            course_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            state TEXT NOT NULL CHECK(state IN ('pending', 'enrolled')),
            requested_at TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            PRIMARY KEY(course_id, student_id),
            FOREIGN KEY(course_id) REFERENCES courses(id),
            FOREIGN KEY(student_id) REFERENCES students(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_student ON enrollments(student_id, state)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_state ON enrollments(state)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessments(
            id TEXT PRIMARY KEY,
            kind TEXT NOT NULL CHECK(kind IN ('quiz', 'exam')),
            course_id TEXT NOT NULL,
            teacher_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            deadline TEXT,
            time_limit INTEGER,
            created_at TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessments_course ON assessments(course_id, kind)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS questions(
            id TEXT PRIMARY KEY,
            assessment_id TEXT NOT NULL,
            idx INTEGER NOT NULL,
            question_text TEXT NOT NULL,
            question_type TEXT NOT NULL,
            options TEXT NOT NULL DEFAULT '[]',
            correct_answer TEXT,
            points REAL NOT NULL DEFAULT 1,
            FOREIGN KEY(assessment_id) REFERENCES assessments(id),
            UNIQUE(assessment_id, idx)
        )",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS assessment_submissions(
            id TEXT PRIMARY KEY,
            assessment_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            score REAL NOT NULL,
            total_possible REAL NOT NULL,
            graded INTEGER NOT NULL DEFAULT 0,
            feedback TEXT NOT NULL DEFAULT '',
            submitted_at TEXT NOT NULL,
            graded_at TEXT,
            FOREIGN KEY(assessment_id) REFERENCES assessments(id),
            UNIQUE(assessment_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assessment_submissions_student ON assessment_submissions(student_id)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS submission_answers(
            submission_id TEXT NOT NULL,
            idx INTEGER NOT NULL,
            question_id TEXT NOT NULL,
            response TEXT NOT NULL,
            feedback TEXT,
            PRIMARY KEY(submission_id, idx),
            FOREIGN KEY(submission_id) REFERENCES assessment_submissions(id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignments(
            id TEXT PRIMARY KEY,
            course_id TEXT NOT NULL,
            teacher_id TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT NOT NULL DEFAULT '',
            due_date TEXT NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY(course_id) REFERENCES courses(id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignments_course ON assignments(course_id)",
        [],
    )?;
    conn.execute(
        "CREATE TABLE IF NOT EXISTS assignment_submissions(
            id TEXT PRIMARY KEY,
            assignment_id TEXT NOT NULL,
            student_id TEXT NOT NULL,
            file_ref TEXT NOT NULL,
            file_name TEXT NOT NULL,
            submitted_at TEXT NOT NULL,
            grade REAL CHECK(grade IS NULL OR (grade >= 0 AND grade <= 100)),
            feedback TEXT NOT NULL DEFAULT '',
            FOREIGN KEY(assignment_id) REFERENCES assignments(id),
            UNIQUE(assignment_id, student_id)
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_assignment_submissions_student ON assignment_submissions(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS fee_payments(
            id TEXT PRIMARY KEY,
            student_id TEXT NOT NULL,
            amount_paid REAL NOT NULL,
            term TEXT NOT NULL,
            is_paid_in_full INTEGER NOT NULL DEFAULT 1,
            date_paid TEXT NOT NULL,
            payment_method TEXT
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_fee_payments_student ON fee_payments(student_id)",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

fn ensure_courses_enrolled_count(conn: &Connection) -> anyhow::Result<()> {
    if table_has_column(conn, "courses", "enrolled_count")? {
        return Ok(());
    }
    conn.execute(
        "ALTER TABLE courses ADD COLUMN enrolled_count INTEGER NOT NULL DEFAULT 0",
        [],
    )?;
    if table_exists(conn, "enrollments")? {
        conn.execute(
            "UPDATE courses SET enrolled_count = (
               SELECT COUNT(*) FROM enrollments e
               WHERE e.course_id = courses.id AND e.state = 'enrolled'
             )",
            [],
        )?;
    }
    Ok(())
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

fn table_exists(conn: &Connection, table: &str) -> anyhow::Result<bool> {
    let found: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?",
            [table],
            |r| r.get(0),
        )
        .optional()?;
    Ok(found.is_some())
}

fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}
