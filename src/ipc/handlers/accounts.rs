use crate::accounts::{self, AdminSeed, NewAdmin, NewFeePayment, Registration};
use crate::error::LmsResult;
use crate::ipc::error::respond;
use crate::ipc::helpers::{db_conn, now, optional_str, parse_params, required_str, with_message};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;

fn register(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let conn = db_conn(state)?;
    let reg: Registration = parse_params(&req.params)?;
    let account = accounts::register(conn, &reg, &store::ts(&now()))?;
    Ok(json!({ "message": "Account registered successfully!", "account": account }))
}

fn provision(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let conn = db_conn(state)?;
    let seed: AdminSeed = if req.params.is_null() {
        AdminSeed::default()
    } else {
        parse_params(&req.params)?
    };
    let out = accounts::provision_admin(conn, &state.config.admin, &seed, &store::ts(&now()))?;
    let message = if out.created {
        "Default admin created"
    } else {
        "Default admin already provisioned"
    };
    with_message(message, &out)
}

fn create_admin(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let conn = db_conn(state)?;
    let new: NewAdmin = parse_params(&req.params)?;
    let admin = accounts::create_admin(conn, &new, &store::ts(&now()))?;
    Ok(json!({ "message": "Admin created successfully!", "admin": admin }))
}

fn unapproved(state: &AppState) -> LmsResult<serde_json::Value> {
    let students = accounts::unapproved_students(db_conn(state)?)?;
    Ok(json!({ "message": "Unapproved students fetched", "students": students }))
}

fn approve(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let student_id = required_str(&req.params, "studentId")?;
    let student = accounts::approve_student(db_conn(state)?, &student_id)?;
    Ok(json!({ "message": "Student approved successfully!", "student": student }))
}

fn reject(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let student_id = required_str(&req.params, "studentId")?;
    let removed = accounts::reject_student(db_conn(state)?, &student_id)?;
    Ok(json!({
        "message": "Student rejected and removed",
        "studentId": student_id,
        "enrollmentsRemoved": removed
    }))
}

fn link_parents(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let student_id = required_str(&req.params, "studentId")?;
    let student = accounts::link_parents(
        db_conn(state)?,
        &student_id,
        optional_str(&req.params, "parentEmail1").as_deref(),
        optional_str(&req.params, "parentEmail2").as_deref(),
    )?;
    Ok(json!({ "message": "Parent contacts updated", "student": student }))
}

fn record_fee(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let new: NewFeePayment = parse_params(&req.params)?;
    let payment = accounts::record_fee(db_conn(state)?, &new, &store::ts(&now()))?;
    Ok(json!({ "message": "Fee payment recorded", "payment": payment }))
}

fn list_fees(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let student_id = required_str(&req.params, "studentId")?;
    let payments = accounts::list_fees(db_conn(state)?, &student_id)?;
    Ok(json!({ "message": "Fee payments fetched", "payments": payments }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "accounts.register" => register(state, req),
        "admin.provision" => provision(state, req),
        "admin.create" => create_admin(state, req),
        "students.unapproved" => unapproved(state),
        "student.approve" => approve(state, req),
        "student.reject" => reject(state, req),
        "student.linkParents" => link_parents(state, req),
        "fees.record" => record_fee(state, req),
        "fees.list" => list_fees(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
