mod test_support;

use serde_json::{json, Value};
use test_support::{spawn_sidecar, student, teacher, temp_workspace, Sidecar};

struct Class {
    teacher_id: String,
    course_id: String,
    students: Vec<String>,
}

fn class(lms: &mut Sidecar, students: &[(&str, &str)]) -> Class {
    let admin_id = lms.provision_admin();
    let teacher_id = lms.register("teacher", "Ms Rivera", "rivera@school.test");
    let course_id = lms.create_course(&teacher_id, "CHEM-200");
    let students = students
        .iter()
        .map(|(name, email)| {
            let id = lms.approved_student(&admin_id, name, email);
            lms.enroll(&admin_id, &id, &course_id);
            id
        })
        .collect();
    Class {
        teacher_id,
        course_id,
        students,
    }
}

fn question_ids(assessment: &Value) -> Vec<String> {
    assessment["questions"]
        .as_array()
        .expect("questions")
        .iter()
        .map(|q| q["id"].as_str().expect("question id").to_string())
        .collect()
}

#[test]
fn auto_grade_then_single_manual_pass() {
    let dir = temp_workspace("lmsd-quiz");
    let mut lms = spawn_sidecar();
    lms.select_workspace(&dir);
    let c = class(&mut lms, &[("Sam", "sam@school.test")]);
    let sam = c.students[0].clone();

    let created = lms.ok(
        "assessment.create",
        Some(teacher(&c.teacher_id)),
        json!({
            "kind": "quiz",
            "courseId": c.course_id,
            "title": "Atoms",
            "deadline": "2099-01-01T00:00:00Z",
            "questions": [
                {
                    "questionText": "Charge of an electron?",
                    "type": "multiple-choice",
                    "options": ["positive", "negative"],
                    "correctAnswer": "negative",
                    "points": 2
                },
                {
                    "questionText": "Explain isotopes.",
                    "type": "open-ended",
                    "points": 2
                }
            ]
        }),
    );
    let quiz = created["assessment"].clone();
    let quiz_id = quiz["id"].as_str().expect("quiz id").to_string();
    let ids = question_ids(&quiz);

    let seen = lms.ok(
        "assessment.get",
        Some(student(&sam)),
        json!({ "assessmentId": quiz_id }),
    );
    assert!(seen["assessment"]["questions"][0]["correctAnswer"].is_null());

    let out = lms.ok(
        "assessment.submit",
        Some(student(&sam)),
        json!({
            "assessmentId": quiz_id,
            "answers": [
                { "questionId": ids[0], "response": "negative" },
                { "questionId": ids[1], "response": "Same element, different neutrons." }
            ]
        }),
    );
    assert_eq!(out["score"], 2.0);
    assert_eq!(out["totalPossibleScore"], 4.0);
    assert_eq!(out["percentage"], "50.00%");

    lms.fails(
        "assessment.submit",
        Some(student(&sam)),
        json!({ "assessmentId": quiz_id, "answers": [] }),
        "conflict",
    );
    lms.fails(
        "assessment.update",
        Some(teacher(&c.teacher_id)),
        json!({ "assessmentId": quiz_id, "questions": [] }),
        "conflict",
    );
    let cleared = lms.ok(
        "assessment.update",
        Some(teacher(&c.teacher_id)),
        json!({ "assessmentId": quiz_id, "clearDeadline": true }),
    );
    assert!(cleared["assessment"]["deadline"].is_null());

    let graded = lms.ok(
        "assessment.grade",
        Some(teacher(&c.teacher_id)),
        json!({
            "assessmentId": quiz_id,
            "studentId": sam,
            "grades": { (ids[1].clone()): 999 },
            "feedback": "Good start"
        }),
    );
    assert_eq!(graded["submission"]["score"], 4.0);
    assert_eq!(graded["submission"]["graded"], true);

    lms.fails(
        "assessment.grade",
        Some(teacher(&c.teacher_id)),
        json!({ "assessmentId": quiz_id, "studentId": sam, "grades": {} }),
        "conflict",
    );

    let results = lms.ok(
        "assessment.results",
        Some(student(&sam)),
        json!({ "assessmentId": quiz_id }),
    );
    assert_eq!(results["submission"]["feedback"], "Good start");

    let listed = lms.ok(
        "assessment.submissions",
        Some(teacher(&c.teacher_id)),
        json!({ "assessmentId": quiz_id }),
    );
    assert_eq!(listed["submissions"][0]["studentName"], "Sam");
}

#[test]
fn late_submissions_are_refused() {
    let dir = temp_workspace("lmsd-exam-late");
    let mut lms = spawn_sidecar();
    lms.select_workspace(&dir);
    let c = class(&mut lms, &[("Sam", "sam@school.test")]);

    let created = lms.ok(
        "assessment.create",
        Some(teacher(&c.teacher_id)),
        json!({
            "kind": "exam",
            "courseId": c.course_id,
            "title": "Midterm",
            "deadline": "2001-01-01T00:00:00Z",
            "questions": [
                { "questionText": "Q", "type": "open-ended", "points": 5 }
            ]
        }),
    );
    let exam_id = created["assessment"]["id"].as_str().expect("exam id").to_string();
    assert_eq!(created["message"], "Exam created successfully!");

    let err = lms.fails(
        "assessment.submit",
        Some(student(&c.students[0])),
        json!({ "assessmentId": exam_id, "answers": [] }),
        "bad_params",
    );
    assert_eq!(err["status"], 400);
    lms.fails(
        "assessment.results",
        Some(student(&c.students[0])),
        json!({ "assessmentId": exam_id }),
        "not_found",
    );
}

#[test]
fn only_the_course_teacher_manages_assessments() {
    let dir = temp_workspace("lmsd-quiz-owner");
    let mut lms = spawn_sidecar();
    lms.select_workspace(&dir);
    let c = class(&mut lms, &[]);
    let other = lms.register("teacher", "Mr Osei", "osei@school.test");

    lms.fails(
        "assessment.create",
        Some(teacher(&other)),
        json!({ "kind": "quiz", "courseId": c.course_id, "title": "Sneaky" }),
        "forbidden",
    );
    let created = lms.ok(
        "assessment.create",
        Some(teacher(&c.teacher_id)),
        json!({ "kind": "quiz", "courseId": c.course_id, "title": "Warmup" }),
    );
    let quiz_id = created["assessment"]["id"].as_str().expect("quiz id").to_string();
    lms.fails(
        "assessment.delete",
        Some(teacher(&other)),
        json!({ "assessmentId": quiz_id }),
        "forbidden",
    );

    let listed = lms.ok(
        "assessments.list",
        Some(teacher(&c.teacher_id)),
        json!({ "courseId": c.course_id, "kind": "quiz" }),
    );
    assert_eq!(listed["assessments"].as_array().map(|a| a.len()), Some(1));
    let exams = lms.ok(
        "assessments.list",
        Some(teacher(&c.teacher_id)),
        json!({ "courseId": c.course_id, "kind": "exam" }),
    );
    assert_eq!(exams["assessments"].as_array().map(|a| a.len()), Some(0));

    lms.ok(
        "assessment.delete",
        Some(teacher(&c.teacher_id)),
        json!({ "assessmentId": quiz_id }),
    );
    lms.fails(
        "assessment.get",
        Some(teacher(&c.teacher_id)),
        json!({ "assessmentId": quiz_id }),
        "not_found",
    );
}
