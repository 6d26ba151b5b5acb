use super::parse_bool;
use crate::gate::Role;
use crate::model::{Account, Student};
use rusqlite::{Connection, OptionalExtension, Row};

const STUDENT_COLUMNS: &str =
    "id, name, email, credential_hash, parent_email1, parent_email2, is_approved, created_at";

fn account_table(role: Role) -> &'static str {
    match role {
        Role::Student => "students",
        Role::Teacher => "teachers",
        Role::Parent => "parents",
        Role::Admin => "admins",
    }
}

fn student_from_row(r: &Row<'_>) -> rusqlite::Result<Student> {
    Ok(Student {
        id: r.get(0)?,
        name: r.get(1)?,
        email: r.get(2)?,
        credential_hash: r.get(3)?,
        parent_email1: r.get(4)?,
        parent_email2: r.get(5)?,
        is_approved: parse_bool(r.get(6)?),
        created_at: r.get(7)?,
    })
}

fn account_from_row(r: &Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: r.get(0)?,
        name: r.get(1)?,
        email: r.get(2)?,
        credential_hash: r.get(3)?,
        created_at: r.get(4)?,
    })
}

/// Emails are unique across every account kind.
pub fn email_in_use(conn: &Connection, email: &str) -> rusqlite::Result<bool> {
    let hit: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM students WHERE email = ?1
             UNION ALL SELECT 1 FROM teachers WHERE email = ?1
             UNION ALL SELECT 1 FROM parents WHERE email = ?1
             UNION ALL SELECT 1 FROM admins WHERE email = ?1
             LIMIT 1",
            [email],
            |r| r.get(0),
        )
        .optional()?;
    Ok(hit.is_some())
}

pub fn insert_student(conn: &Connection, s: &Student) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO students(id, name, email, credential_hash, parent_email1, parent_email2, is_approved, created_at)
         VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
        (
            &s.id,
            &s.name,
            &s.email,
            &s.credential_hash,
            &s.parent_email1,
            &s.parent_email2,
            s.is_approved as i64,
            &s.created_at,
        ),
    )?;
    Ok(())
}

/// Teachers, parents and admins. Students go through [`insert_student`].
pub fn insert_account(conn: &Connection, role: Role, a: &Account) -> rusqlite::Result<()> {
    let sql = format!(
        "INSERT INTO {}(id, name, email, credential_hash, created_at) VALUES(?, ?, ?, ?, ?)",
        account_table(role)
    );
    conn.execute(&sql, (&a.id, &a.name, &a.email, &a.credential_hash, &a.created_at))?;
    Ok(())
}

pub fn find_student(conn: &Connection, id: &str) -> rusqlite::Result<Option<Student>> {
    let sql = format!("SELECT {} FROM students WHERE id = ?", STUDENT_COLUMNS);
    conn.query_row(&sql, [id], student_from_row).optional()
}

pub fn find_account(conn: &Connection, role: Role, id: &str) -> rusqlite::Result<Option<Account>> {
    let sql = format!(
        "SELECT id, name, email, credential_hash, created_at FROM {} WHERE id = ?",
        account_table(role)
    );
    conn.query_row(&sql, [id], account_from_row).optional()
}

pub fn find_account_by_email(
    conn: &Connection,
    role: Role,
    email: &str,
) -> rusqlite::Result<Option<Account>> {
    let sql = format!(
        "SELECT id, name, email, credential_hash, created_at FROM {} WHERE email = ?",
        account_table(role)
    );
    conn.query_row(&sql, [email], account_from_row).optional()
}

pub fn list_unapproved_students(conn: &Connection) -> rusqlite::Result<Vec<Student>> {
    let sql = format!(
        "SELECT {} FROM students WHERE is_approved = 0 ORDER BY created_at, name",
        STUDENT_COLUMNS
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], student_from_row)?;
    rows.collect()
}

/// Returns the number of rows flipped; zero when already approved.
pub fn approve_student(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE students SET is_approved = 1 WHERE id = ? AND is_approved = 0",
        [id],
    )
}

pub fn delete_student(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM students WHERE id = ?", [id])
}

/// `None` leaves the stored value alone.
pub fn set_parent_emails(
    conn: &Connection,
    id: &str,
    parent_email1: Option<&str>,
    parent_email2: Option<&str>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE students
         SET parent_email1 = COALESCE(?, parent_email1),
             parent_email2 = COALESCE(?, parent_email2)
         WHERE id = ?",
        (parent_email1, parent_email2, id),
    )
}
