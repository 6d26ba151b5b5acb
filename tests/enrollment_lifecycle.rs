mod test_support;

use serde_json::json;
use test_support::{admin, spawn_sidecar, student, teacher, temp_workspace};

#[test]
fn request_approve_unenroll_keeps_the_counter_in_step() {
    let dir = temp_workspace("lmsd-enrollment");
    let mut lms = spawn_sidecar();
    lms.select_workspace(&dir);
    let admin_id = lms.provision_admin();
    let teacher_id = lms.register("teacher", "Ms Rivera", "rivera@school.test");
    let course_id = lms.create_course(&teacher_id, "BIO-101");
    let sam = lms.approved_student(&admin_id, "Sam", "sam@school.test");

    let out = lms.ok(
        "enrollment.request",
        Some(student(&sam)),
        json!({ "courseId": course_id }),
    );
    assert_eq!(out["enrollment"]["state"], "pending");
    let seen = lms.ok(
        "enrollment.state",
        Some(student(&sam)),
        json!({ "courseId": course_id }),
    );
    assert_eq!(seen["enrollment"]["state"], "pending");
    lms.fails(
        "enrollment.request",
        Some(student(&sam)),
        json!({ "courseId": course_id }),
        "conflict",
    );

    let pending = lms.ok("courses.pending", Some(student(&sam)), json!({}));
    assert_eq!(pending["courses"].as_array().map(|a| a.len()), Some(1));
    let queue = lms.ok("enrollment.pendingList", Some(admin(&admin_id)), json!({}));
    assert_eq!(queue["requests"][0]["studentName"], "Sam");

    let out = lms.ok(
        "enrollment.approve",
        Some(admin(&admin_id)),
        json!({ "courseId": course_id, "studentId": sam }),
    );
    assert_eq!(out["enrollment"]["state"], "enrolled");
    let course = lms.ok("course.get", None, json!({ "courseId": course_id }));
    assert_eq!(course["course"]["enrolledCount"], 1);

    lms.fails(
        "enrollment.approve",
        Some(admin(&admin_id)),
        json!({ "courseId": course_id, "studentId": sam }),
        "not_found",
    );
    lms.fails(
        "enrollment.request",
        Some(student(&sam)),
        json!({ "courseId": course_id }),
        "conflict",
    );

    let enrolled = lms.ok("courses.enrolled", Some(student(&sam)), json!({}));
    assert_eq!(enrolled["courses"][0]["id"], course_id.as_str());

    lms.ok(
        "enrollment.unenroll",
        Some(student(&sam)),
        json!({ "courseId": course_id }),
    );
    let course = lms.ok("course.get", None, json!({ "courseId": course_id }));
    assert_eq!(course["course"]["enrolledCount"], 0);
    let seen = lms.ok(
        "enrollment.state",
        Some(student(&sam)),
        json!({ "courseId": course_id }),
    );
    assert_eq!(seen["enrollment"]["state"], "none");
    lms.fails(
        "enrollment.unenroll",
        Some(student(&sam)),
        json!({ "courseId": course_id }),
        "bad_params",
    );

    let audit = lms.ok("enrollment.audit", Some(admin(&admin_id)), json!({}));
    assert_eq!(audit["drift"].as_array().map(|a| a.len()), Some(0));
}

#[test]
fn unapproved_students_wait_for_the_admin() {
    let dir = temp_workspace("lmsd-enrollment-approval");
    let mut lms = spawn_sidecar();
    lms.select_workspace(&dir);
    let admin_id = lms.provision_admin();
    let teacher_id = lms.register("teacher", "Ms Rivera", "rivera@school.test");
    let course_id = lms.create_course(&teacher_id, "BIO-101");
    let kim = lms.register("student", "Kim", "kim@school.test");

    let err = lms.fails(
        "enrollment.request",
        Some(student(&kim)),
        json!({ "courseId": course_id }),
        "forbidden",
    );
    assert_eq!(err["status"], 403);

    lms.ok("student.approve", Some(admin(&admin_id)), json!({ "studentId": kim }));
    lms.fails(
        "student.approve",
        Some(admin(&admin_id)),
        json!({ "studentId": kim }),
        "bad_params",
    );
    lms.ok(
        "enrollment.request",
        Some(student(&kim)),
        json!({ "courseId": course_id }),
    );
    lms.ok(
        "enrollment.cancel",
        Some(student(&kim)),
        json!({ "courseId": course_id }),
    );
    lms.fails(
        "enrollment.reject",
        Some(admin(&admin_id)),
        json!({ "courseId": course_id, "studentId": kim }),
        "not_found",
    );
}

#[test]
fn teacher_removes_only_from_owned_courses() {
    let dir = temp_workspace("lmsd-enrollment-remove");
    let mut lms = spawn_sidecar();
    lms.select_workspace(&dir);
    let admin_id = lms.provision_admin();
    let owner = lms.register("teacher", "Ms Rivera", "rivera@school.test");
    let other = lms.register("teacher", "Mr Osei", "osei@school.test");
    let course_id = lms.create_course(&owner, "BIO-101");
    let sam = lms.approved_student(&admin_id, "Sam", "sam@school.test");
    lms.enroll(&admin_id, &sam, &course_id);

    let roster = lms.ok(
        "course.roster",
        Some(teacher(&owner)),
        json!({ "courseId": course_id }),
    );
    assert_eq!(roster["students"][0]["name"], "Sam");
    assert_eq!(roster["students"][0]["state"], "enrolled");
    lms.fails(
        "course.roster",
        Some(teacher(&other)),
        json!({ "courseId": course_id }),
        "forbidden",
    );

    let params = json!({ "courseId": course_id, "studentId": sam });
    lms.fails("enrollment.removeStudent", Some(teacher(&other)), params.clone(), "forbidden");
    lms.ok("enrollment.removeStudent", Some(teacher(&owner)), params.clone());
    lms.fails("enrollment.removeStudent", Some(teacher(&owner)), params, "bad_params");

    let course = lms.ok("course.get", None, json!({ "courseId": course_id }));
    assert_eq!(course["course"]["enrolledCount"], 0);
}

#[test]
fn rejecting_a_student_releases_their_seats() {
    let dir = temp_workspace("lmsd-student-reject");
    let mut lms = spawn_sidecar();
    lms.select_workspace(&dir);
    let admin_id = lms.provision_admin();
    let teacher_id = lms.register("teacher", "Ms Rivera", "rivera@school.test");
    let course_id = lms.create_course(&teacher_id, "BIO-101");
    let sam = lms.approved_student(&admin_id, "Sam", "sam@school.test");
    lms.enroll(&admin_id, &sam, &course_id);

    let out = lms.ok("student.reject", Some(admin(&admin_id)), json!({ "studentId": sam }));
    assert_eq!(out["enrollmentsRemoved"], 1);
    let course = lms.ok("course.get", None, json!({ "courseId": course_id }));
    assert_eq!(course["course"]["enrolledCount"], 0);
    lms.fails("student.reject", Some(admin(&admin_id)), json!({ "studentId": sam }), "not_found");
}
