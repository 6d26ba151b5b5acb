use crate::courses;
use crate::error::LmsResult;
use crate::ipc::error::respond;
use crate::ipc::helpers::{actor, db_conn, now, parse_field, parse_params, required_str, workspace_path, with_message};
use crate::ipc::types::{AppState, Request};
use crate::model::{CourseFile, CoursePatch, EnrollmentState, NewCourse};
use crate::store;
use serde_json::json;

fn list(state: &AppState) -> LmsResult<serde_json::Value> {
    let courses = courses::list_all(db_conn(state)?)?;
    Ok(json!({ "message": "Courses fetched successfully!", "courses": courses }))
}

fn get(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let course_id = required_str(&req.params, "courseId")?;
    let course = courses::find(db_conn(state)?, &course_id)?;
    Ok(json!({ "message": "Course fetched successfully!", "course": course }))
}

fn create(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let teacher = actor(req)?;
    let new: NewCourse = parse_params(&req.params)?;
    let course = courses::create_course(db_conn(state)?, teacher.id(), &new, &store::ts(&now()))?;
    Ok(json!({ "message": "Course created successfully!", "course": course }))
}

fn update(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let teacher = actor(req)?;
    let course_id = required_str(&req.params, "courseId")?;
    let patch: CoursePatch = parse_params(&req.params)?;
    let course = courses::update_course(db_conn(state)?, teacher.id(), &course_id, &patch)?;
    Ok(json!({ "message": "Course updated successfully!", "course": course }))
}

fn add_file(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let teacher = actor(req)?;
    let course_id = required_str(&req.params, "courseId")?;
    let file: Option<CourseFile> = parse_field(&req.params, "file")?;
    let file = file.ok_or_else(|| crate::error::LmsError::validation("missing params.file"))?;
    let course = courses::add_file(db_conn(state)?, teacher.id(), &course_id, &file)?;
    Ok(json!({ "message": "File added to course", "course": course }))
}

fn delete(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let teacher = actor(req)?;
    let course_id = required_str(&req.params, "courseId")?;
    let report = courses::delete_course(db_conn(state)?, workspace_path(state)?, teacher.id(), &course_id)?;
    with_message("Course deleted successfully!", &report)
}

fn roster(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let teacher = actor(req)?;
    let course_id = required_str(&req.params, "courseId")?;
    let students = courses::roster(db_conn(state)?, teacher.id(), &course_id)?;
    Ok(json!({ "message": "Course roster fetched", "students": students }))
}

fn created(state: &AppState, req: &Request) -> LmsResult<serde_json::Value> {
    let teacher = actor(req)?;
    let courses = courses::list_created(db_conn(state)?, teacher.id())?;
    Ok(json!({ "message": "Created courses fetched", "courses": courses }))
}

fn for_student(state: &AppState, req: &Request, which: EnrollmentState) -> LmsResult<serde_json::Value> {
    let student = actor(req)?;
    let courses = courses::list_for_student(db_conn(state)?, student.id(), which)?;
    let message = match which {
        EnrollmentState::Pending => "Pending courses fetched",
        _ => "Enrolled courses fetched",
    };
    Ok(json!({ "message": message, "courses": courses }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "courses.list" => list(state),
        "course.get" => get(state, req),
        "course.create" => create(state, req),
        "course.update" => update(state, req),
        "course.files.add" => add_file(state, req),
        "course.delete" => delete(state, req),
        "course.roster" => roster(state, req),
        "courses.created" => created(state, req),
        "courses.enrolled" => for_student(state, req, EnrollmentState::Enrolled),
        "courses.pending" => for_student(state, req, EnrollmentState::Pending),
        _ => return None,
    };
    Some(respond(&req.id, result))
}
