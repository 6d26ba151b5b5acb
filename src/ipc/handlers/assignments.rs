use crate::assignments::{self, Upload};
use crate::error::{LmsError, LmsResult};
use crate::gate::Role;
use crate::ipc::error::respond;
use crate::ipc::helpers::{actor, db_conn, now, optional_str, parse_params, required_str, workspace_path};
use crate::ipc::types::{AppState, Request};
use crate::model::NewAssignment;
use crate::store;
use serde_json::json;
use std::path::PathBuf;

fn create(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let teacher = actor(req)?;
    let new: NewAssignment = parse_params(&req.params)?;
    let created = assignments::create(db_conn(state)?, teacher.id(), &new, &store::ts(&now()))?;
    Ok(json!({ "message": "Assignment created successfully!", "assignment": created }))
}

fn list(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let viewer = actor(req)?;
    let course_id = required_str(&req.params, "courseId")?;
    let conn = db_conn(state)?;
    let listed = if viewer.role() == Role::Student {
        json!(assignments::list_for_student(conn, &course_id, viewer.id())?)
    } else {
        json!(assignments::list(conn, &course_id)?)
    };
    Ok(json!({ "message": "Assignments fetched successfully!", "assignments": listed }))
}

fn submissions(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let teacher = actor(req)?;
    let id = required_str(&req.params, "assignmentId")?;
    let rows = assignments::submissions(db_conn(state)?, teacher.id(), &id)?;
    Ok(json!({ "message": "Submissions fetched successfully!", "submissions": rows }))
}

fn delete(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let teacher = actor(req)?;
    let id = required_str(&req.params, "assignmentId")?;
    assignments::delete(db_conn(state)?, teacher.id(), &id)?;
    Ok(json!({ "message": "Assignment deleted successfully!", "assignmentId": id }))
}

fn upload_path(req: &Request) -> LmsResult<PathBuf> {
    optional_str(&req.params, "filePath")
        .map(PathBuf::from)
        .ok_or_else(|| LmsError::validation("No file uploaded"))
}

fn submit(state: &AppState, req: &Request, again: bool) -> LmsResult<serde_json::Value> {
    let student = actor(req)?;
    let id = required_str(&req.params, "assignmentId")?;
    let path = upload_path(req)?;
    let file_name = optional_str(&req.params, "fileName");
    let upload = Upload {
        path: &path,
        file_name: file_name.as_deref(),
    };
    let conn = db_conn(state)?;
    let workspace = workspace_path(state)?;
    let (message, submission) = if again {
        let s = assignments::resubmit(conn, workspace, student.id(), &id, upload, now())?;
        ("Assignment resubmitted successfully!", s)
    } else {
        let s = assignments::submit(conn, workspace, student.id(), &id, upload, now())?;
        ("Assignment submitted successfully!", s)
    };
    Ok(json!({ "message": message, "submission": submission }))
}

fn grade(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let teacher = actor(req)?;
    let id = required_str(&req.params, "assignmentId")?;
    let student_id = required_str(&req.params, "studentId")?;
    let grade = req
        .params
        .get("grade")
        .and_then(|v| v.as_f64())
        .ok_or_else(|| LmsError::validation("missing params.grade"))?;
    let feedback = optional_str(&req.params, "feedback");
    let submission = assignments::grade(
        db_conn(state)?,
        teacher.id(),
        &id,
        &student_id,
        grade,
        feedback.as_deref(),
    )?;
    Ok(json!({ "message": "Grade submitted successfully!", "submission": submission }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "assignment.create" => create(state, req),
        "assignments.list" => list(state, req),
        "assignment.submissions" => submissions(state, req),
        "assignment.delete" => delete(state, req),
        "assignment.submit" => submit(state, req, false),
        "assignment.resubmit" => submit(state, req, true),
        "assignment.grade" => grade(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
