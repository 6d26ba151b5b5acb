use crate::analytics;
use crate::error::LmsResult;
use crate::ipc::error::respond;
use crate::ipc::helpers::{db_conn, optional_str, required_str, with_message};
use crate::ipc::types::{AppState, Request};

fn student(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let student_id = required_str(&req.params, "studentId")?;
    let course_id = optional_str(&req.params, "courseId");
    let report = analytics::student_analytics(db_conn(state)?, &student_id, course_id.as_deref())?;
    with_message("Student analytics computed", &report)
}

fn course(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let course_id = required_str(&req.params, "courseId")?;
    let report = analytics::course_analytics(db_conn(state)?, &course_id)?;
    with_message("Course analytics computed", &report)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "analytics.student" => student(state, req),
        "analytics.course" => course(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
