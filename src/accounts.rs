//! Account records and the admin-side student lifecycle.
//!
//! Credentials are opaque hashes produced by the authentication collaborator.

use crate::config::AdminDefaults;
use crate::db;
use crate::error::{LmsError, LmsResult};
use crate::gate::Role;
use crate::model::{Account, FeePayment, Student, DEFAULT_FEE_TERM};
use crate::store::{self, accounts, enrollments, fees};
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, warn};

pub const PROVISIONED_KEY: &str = "admin.provisioned";

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub role: Role,
    pub name: String,
    pub email: String,
    pub credential_hash: String,
    #[serde(default)]
    pub parent_email1: Option<String>,
    #[serde(default)]
    pub parent_email2: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredAccount {
    pub id: String,
    pub role: Role,
    pub name: String,
    pub email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_approved: Option<bool>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSeed {
    pub name: Option<String>,
    pub email: Option<String>,
    pub credential_hash: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Provisioned {
    pub admin: Account,
    pub created: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewFeePayment {
    pub student_id: String,
    pub amount_paid: f64,
    #[serde(default)]
    pub term: Option<String>,
    #[serde(default)]
    pub is_paid_in_full: Option<bool>,
    #[serde(default)]
    pub date_paid: Option<String>,
    #[serde(default)]
    pub payment_method: Option<String>,
}

fn require_text(value: &str, field: &str) -> LmsResult<String> {
    let v = value.trim();
    if v.is_empty() {
        return Err(LmsError::validation(format!("missing {field}")));
    }
    Ok(v.to_string())
}

fn normalize_email(raw: &str) -> LmsResult<String> {
    let email = require_text(raw, "email")?.to_ascii_lowercase();
    if !email.contains('@') {
        return Err(LmsError::validation(format!("invalid email: {email}")));
    }
    Ok(email)
}

fn optional_email(raw: Option<&str>) -> LmsResult<Option<String>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(e) => normalize_email(e).map(Some),
        None => Ok(None),
    }
}

fn claim_email(conn: &Connection, email: &str) -> LmsResult<()> {
    if accounts::email_in_use(conn, email)? {
        return Err(LmsError::conflict("User already exists"));
    }
    Ok(())
}

/// Self-service sign-up for students, teachers and parents. Students start
/// unapproved; admins come from [`provision_admin`] or [`create_admin`].
pub fn register(conn: &Connection, reg: &Registration, now: &str) -> LmsResult<RegisteredAccount> {
    if reg.role == Role::Admin {
        return Err(LmsError::validation("admin accounts are created by an admin"));
    }
    let name = require_text(&reg.name, "name")?;
    let email = normalize_email(&reg.email)?;
    let credential_hash = require_text(&reg.credential_hash, "credentialHash")?;
    claim_email(conn, &email)?;

    let id = store::new_id();
    let is_approved = if reg.role == Role::Student {
        let student = Student {
            id: id.clone(),
            name: name.clone(),
            email: email.clone(),
            credential_hash,
            parent_email1: optional_email(reg.parent_email1.as_deref())?,
            parent_email2: optional_email(reg.parent_email2.as_deref())?,
            is_approved: false,
            created_at: now.to_string(),
        };
        accounts::insert_student(conn, &student)?;
        Some(false)
    } else {
        let account = Account {
            id: id.clone(),
            name: name.clone(),
            email: email.clone(),
            credential_hash,
            created_at: now.to_string(),
        };
        accounts::insert_account(conn, reg.role, &account)?;
        None
    };

    info!(role = reg.role.as_str(), account = %id, "account registered");
    Ok(RegisteredAccount {
        id,
        role: reg.role,
        name,
        email,
        is_approved,
    })
}

/// Idempotent: the second call returns the existing admin with `created: false`.
pub fn provision_admin(
    conn: &Connection,
    defaults: &AdminDefaults,
    seed: &AdminSeed,
    now: &str,
) -> LmsResult<Provisioned> {
    let email = normalize_email(seed.email.as_deref().unwrap_or(&defaults.email))?;
    if let Some(existing) = accounts::find_account_by_email(conn, Role::Admin, &email)? {
        if db::settings_get_json(conn, PROVISIONED_KEY)?.is_none() {
            db::settings_set_json(conn, PROVISIONED_KEY, &json!({ "adminId": existing.id, "at": now }))?;
        }
        return Ok(Provisioned {
            admin: existing,
            created: false,
        });
    }
    claim_email(conn, &email)?;

    let admin = Account {
        id: store::new_id(),
        name: require_text(seed.name.as_deref().unwrap_or(&defaults.name), "name")?,
        email,
        credential_hash: seed
            .credential_hash
            .clone()
            .unwrap_or_else(|| defaults.credential_hash.clone()),
        created_at: now.to_string(),
    };
    let tx = conn.unchecked_transaction()?;
    accounts::insert_account(&tx, Role::Admin, &admin)?;
    db::settings_set_json(&tx, PROVISIONED_KEY, &json!({ "adminId": admin.id, "at": now }))?;
    tx.commit()?;

    info!(admin = %admin.id, email = %admin.email, "default admin provisioned");
    Ok(Provisioned {
        admin,
        created: true,
    })
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewAdmin {
    pub name: String,
    pub email: String,
    pub credential_hash: String,
}

pub fn create_admin(conn: &Connection, new: &NewAdmin, now: &str) -> LmsResult<Account> {
    let name = require_text(&new.name, "name")?;
    let email = normalize_email(&new.email)?;
    let credential_hash = require_text(&new.credential_hash, "credentialHash")?;
    claim_email(conn, &email)?;
    let admin = Account {
        id: store::new_id(),
        name,
        email,
        credential_hash,
        created_at: now.to_string(),
    };
    accounts::insert_account(conn, Role::Admin, &admin)?;
    info!(admin = %admin.id, "admin created");
    Ok(admin)
}

pub fn unapproved_students(conn: &Connection) -> LmsResult<Vec<Student>> {
    Ok(accounts::list_unapproved_students(conn)?)
}

pub fn approve_student(conn: &Connection, student_id: &str) -> LmsResult<Student> {
    let mut student = accounts::find_student(conn, student_id)?
        .ok_or_else(|| LmsError::not_found("Student"))?;
    if accounts::approve_student(conn, student_id)? == 0 {
        return Err(LmsError::validation("Student already approved"));
    }
    student.is_approved = true;
    info!(student = %student_id, "student approved");
    Ok(student)
}

/// Deletes the account together with its enrollments. Submissions keep their
/// weak student reference and show up as unknown in course analytics.
pub fn reject_student(conn: &Connection, student_id: &str) -> LmsResult<usize> {
    if accounts::find_student(conn, student_id)?.is_none() {
        return Err(LmsError::not_found("Student"));
    }
    let tx = conn.unchecked_transaction()?;
    let enrolled = enrollments::course_ids_for_student(&tx, student_id, crate::model::EnrollmentState::Enrolled)?;
    for course_id in &enrolled {
        if store::courses::adjust_enrolled_count(&tx, course_id, -1)? == 0 {
            warn!(course = %course_id, student = %student_id, "enrolled counter out of step");
            return Err(LmsError::integrity(format!(
                "enrolled counter for course {course_id} cannot be decremented"
            )));
        }
    }
    let removed = enrollments::delete_for_student(&tx, student_id)?;
    accounts::delete_student(&tx, student_id)?;
    tx.commit()?;
    info!(student = %student_id, enrollments = removed, "student rejected");
    Ok(removed)
}

pub fn link_parents(
    conn: &Connection,
    student_id: &str,
    parent_email1: Option<&str>,
    parent_email2: Option<&str>,
) -> LmsResult<Student> {
    let p1 = optional_email(parent_email1)?;
    let p2 = optional_email(parent_email2)?;
    if p1.is_none() && p2.is_none() {
        return Err(LmsError::validation("missing parentEmail1 or parentEmail2"));
    }
    if accounts::set_parent_emails(conn, student_id, p1.as_deref(), p2.as_deref())? == 0 {
        return Err(LmsError::not_found("Student"));
    }
    accounts::find_student(conn, student_id)?.ok_or_else(|| LmsError::not_found("Student"))
}

pub fn record_fee(conn: &Connection, new: &NewFeePayment, now: &str) -> LmsResult<FeePayment> {
    if !new.amount_paid.is_finite() || new.amount_paid <= 0.0 {
        return Err(LmsError::validation("amountPaid must be a positive number"));
    }
    if accounts::find_student(conn, &new.student_id)?.is_none() {
        return Err(LmsError::not_found("Student"));
    }
    let payment = FeePayment {
        id: store::new_id(),
        student_id: new.student_id.clone(),
        amount_paid: new.amount_paid,
        term: new
            .term
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_FEE_TERM)
            .to_string(),
        is_paid_in_full: new.is_paid_in_full.unwrap_or(true),
        date_paid: new.date_paid.clone().unwrap_or_else(|| now.to_string()),
        payment_method: new.payment_method.clone(),
    };
    fees::insert_payment(conn, &payment)?;
    info!(student = %payment.student_id, amount = payment.amount_paid, "fee payment recorded");
    Ok(payment)
}

pub fn list_fees(conn: &Connection, student_id: &str) -> LmsResult<Vec<FeePayment>> {
    Ok(fees::list_for_student(conn, student_id)?)
}
