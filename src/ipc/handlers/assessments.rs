use crate::assessments;
use crate::error::{LmsError, LmsResult};
use crate::gate::Role;
use crate::ipc::error::respond;
use crate::ipc::helpers::{actor, db_conn, now, optional_str, parse_field, parse_params, required_str, with_message};
use crate::ipc::types::{AppState, Request};
use crate::model::{Answer, AssessmentKind, AssessmentPatch, NewAssessment};
use crate::store;
use serde_json::json;
use std::collections::HashMap;

fn parse_kind(raw: &str) -> LmsResult<AssessmentKind> {
    AssessmentKind::parse(raw).ok_or_else(|| LmsError::validation(format!("unknown assessment kind: {raw}")))
}

fn create(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let teacher = actor(req)?;
    let kind = parse_kind(&required_str(&req.params, "kind")?)?;
    let new: NewAssessment = parse_params(&req.params)?;
    let created = assessments::create(db_conn(state)?, teacher.id(), kind, &new, &store::ts(&now()))?;
    Ok(json!({
        "message": format!("{} created successfully!", kind.label()),
        "assessment": created
    }))
}

fn update(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let teacher = actor(req)?;
    let id = required_str(&req.params, "assessmentId")?;
    let patch: AssessmentPatch = parse_params(&req.params)?;
    let updated = assessments::update(db_conn(state)?, teacher.id(), &id, &patch)?;
    Ok(json!({
        "message": format!("{} updated successfully!", updated.kind.label()),
        "assessment": updated
    }))
}

fn delete(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let teacher = actor(req)?;
    let id = required_str(&req.params, "assessmentId")?;
    let submissions = assessments::delete(db_conn(state)?, teacher.id(), &id)?;
    Ok(json!({
        "message": "Assessment deleted successfully!",
        "assessmentId": id,
        "submissionsRemoved": submissions
    }))
}

fn get(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let viewer = actor(req)?;
    let id = required_str(&req.params, "assessmentId")?;
    let mut found = assessments::find(db_conn(state)?, &id)?;
    if viewer.role() == Role::Student {
        found = assessments::redacted(found);
    }
    Ok(json!({ "message": format!("{} fetched", found.kind.label()), "assessment": found }))
}

fn list(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let viewer = actor(req)?;
    let course_id = required_str(&req.params, "courseId")?;
    let kind = optional_str(&req.params, "kind").map(|k| parse_kind(&k)).transpose()?;
    let found = assessments::list(db_conn(state)?, &course_id, kind, viewer.role() == Role::Student)?;
    Ok(json!({ "message": "Assessments fetched", "assessments": found }))
}

fn submit(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let student = actor(req)?;
    let id = required_str(&req.params, "assessmentId")?;
    let answers: Vec<Answer> = parse_field(&req.params, "answers")?;
    let outcome = assessments::submit(
        db_conn(state)?,
        state.feedback.as_ref(),
        student.id(),
        &id,
        &answers,
        now(),
    )?;
    with_message("Submitted successfully!", &outcome)
}

fn grade(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let teacher = actor(req)?;
    let id = required_str(&req.params, "assessmentId")?;
    let student_id = required_str(&req.params, "studentId")?;
    let grades: HashMap<String, f64> = parse_field(&req.params, "grades")?;
    let feedback = optional_str(&req.params, "feedback");
    let submission = assessments::grade(
        db_conn(state)?,
        teacher.id(),
        &id,
        &student_id,
        &grades,
        feedback.as_deref(),
        now(),
    )?;
    Ok(json!({ "message": "Graded successfully!", "submission": submission }))
}

fn results(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let student = actor(req)?;
    let id = required_str(&req.params, "assessmentId")?;
    let submission = assessments::results(db_conn(state)?, student.id(), &id)?;
    Ok(json!({ "message": "Results fetched", "submission": submission }))
}

fn submissions(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let teacher = actor(req)?;
    let id = required_str(&req.params, "assessmentId")?;
    let rows = assessments::submissions(db_conn(state)?, teacher.id(), &id)?;
    Ok(json!({ "message": "Submissions fetched", "submissions": rows }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "assessment.create" => create(state, req),
        "assessment.update" => update(state, req),
        "assessment.delete" => delete(state, req),
        "assessment.get" => get(state, req),
        "assessments.list" => list(state, req),
        "assessment.submit" => submit(state, req),
        "assessment.grade" => grade(state, req),
        "assessment.results" => results(state, req),
        "assessment.submissions" => submissions(state, req),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
