use crate::enrollment::{self, EnrollmentChange};
use crate::error::LmsResult;
use crate::ipc::error::respond;
use crate::ipc::helpers::{actor, db_conn, now, required_str, with_message};
use crate::ipc::types::{AppState, Request};
use crate::store;
use serde_json::json;

fn reply(message: &str, change: EnrollmentChange) -> LmsResult<serde_json::Value> {
    Ok(json!({ "message": message, "enrollment": change }))
}

fn request(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let student = actor(req)?;
    let course_id = required_str(&req.params, "courseId")?;
    let change = enrollment::request(db_conn(state)?, student.id(), &course_id, &store::ts(&now()))?;
    reply("Enrollment request sent. Awaiting admin approval.", change)
}

fn approve(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let course_id = required_str(&req.params, "courseId")?;
    let student_id = required_str(&req.params, "studentId")?;
    let change = enrollment::approve(db_conn(state)?, &course_id, &student_id, &store::ts(&now()))?;
    reply("Student enrollment approved", change)
}

fn reject(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let course_id = required_str(&req.params, "courseId")?;
    let student_id = required_str(&req.params, "studentId")?;
    let change = enrollment::reject(db_conn(state)?, &course_id, &student_id)?;
    reply("Student enrollment rejected", change)
}

fn cancel(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let student = actor(req)?;
    let course_id = required_str(&req.params, "courseId")?;
    let change = enrollment::cancel(db_conn(state)?, student.id(), &course_id)?;
    reply("Enrollment request cancelled", change)
}

fn unenroll(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let student = actor(req)?;
    let course_id = required_str(&req.params, "courseId")?;
    let change = enrollment::unenroll(db_conn(state)?, student.id(), &course_id)?;
    reply("Unenrolled from course", change)
}

fn remove_student(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let teacher = actor(req)?;
    let course_id = required_str(&req.params, "courseId")?;
    let student_id = required_str(&req.params, "studentId")?;
    let change = enrollment::remove_student(db_conn(state)?, teacher.id(), &course_id, &student_id)?;
    reply("Student removed from course", change)
}

fn current_state(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let student = actor(req)?;
    let course_id = required_str(&req.params, "courseId")?;
    let current = enrollment::state(db_conn(state)?, &course_id, student.id())?;
    reply(
        "Enrollment state fetched",
        EnrollmentChange {
            course_id,
            student_id: student.id().to_string(),
            state: current,
        },
    )
}

fn pending_list(state: &AppState) -> LmsResult<serde_json::Value> {
    let requests = enrollment::pending_list(db_conn(state)?)?;
    Ok(json!({ "message": "Pending enrollments fetched", "requests": requests }))
}

fn audit(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let repair = req.params.get("repair").and_then(|v| v.as_bool()).unwrap_or(false);
    let report = enrollment::audit(db_conn(state)?, repair)?;
    let message = if report.drift.is_empty() {
        "Enrollment counters consistent"
    } else if report.repaired {
        "Enrollment counter drift repaired"
    } else {
        "Enrollment counter drift detected"
    };
    with_message(message, &report)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "enrollment.request" => request(state, req),
        "enrollment.approve" => approve(state, req),
        "enrollment.reject" => reject(state, req),
        "enrollment.cancel" => cancel(state, req),
        "enrollment.unenroll" => unenroll(state, req),
        "enrollment.removeStudent" => remove_student(state, req),
        "enrollment.state" => current_state(state, req),
        "enrollment.pendingList" => pending_list(state),
        "enrollment.audit" => audit(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
