mod test_support;

use serde_json::json;
use test_support::{admin, spawn_sidecar, temp_workspace};

#[test]
fn provisioning_is_idempotent() {
    let dir = temp_workspace("lmsd-provision");
    let mut lms = spawn_sidecar();
    lms.select_workspace(&dir);

    let first = lms.ok("admin.provision", None, json!({}));
    assert_eq!(first["created"], true);
    assert_eq!(first["admin"]["email"], "admin@example.com");
    assert!(first["admin"].get("credentialHash").is_none());

    let second = lms.ok("admin.provision", None, json!({}));
    assert_eq!(second["created"], false);
    assert_eq!(second["admin"]["id"], first["admin"]["id"]);
}

#[test]
fn registration_normalizes_and_guards_emails() {
    let dir = temp_workspace("lmsd-register");
    let mut lms = spawn_sidecar();
    lms.select_workspace(&dir);

    let out = lms.ok(
        "accounts.register",
        None,
        json!({
            "role": "student",
            "name": "Sam",
            "email": "Sam@School.TEST",
            "credentialHash": "h",
            "parentEmail1": "parent@home.test"
        }),
    );
    assert_eq!(out["account"]["email"], "sam@school.test");
    assert_eq!(out["account"]["isApproved"], false);

    lms.fails(
        "accounts.register",
        None,
        json!({ "role": "teacher", "name": "Sam again", "email": "sam@school.test", "credentialHash": "h" }),
        "conflict",
    );
    lms.fails(
        "accounts.register",
        None,
        json!({ "role": "admin", "name": "Mallory", "email": "m@school.test", "credentialHash": "h" }),
        "bad_params",
    );
}

#[test]
fn admin_manages_students_and_fees() {
    let dir = temp_workspace("lmsd-fees");
    let mut lms = spawn_sidecar();
    lms.select_workspace(&dir);
    let admin_id = lms.provision_admin();
    let sam = lms.register("student", "Sam", "sam@school.test");

    let waiting = lms.ok("students.unapproved", Some(admin(&admin_id)), json!({}));
    assert_eq!(waiting["students"][0]["id"], sam.as_str());
    lms.ok("student.approve", Some(admin(&admin_id)), json!({ "studentId": sam }));
    let waiting = lms.ok("students.unapproved", Some(admin(&admin_id)), json!({}));
    assert_eq!(waiting["students"].as_array().map(|a| a.len()), Some(0));

    let linked = lms.ok(
        "student.linkParents",
        Some(admin(&admin_id)),
        json!({ "studentId": sam, "parentEmail2": "Guardian@Home.test" }),
    );
    assert_eq!(linked["student"]["parentEmail2"], "guardian@home.test");

    lms.fails(
        "fees.record",
        Some(admin(&admin_id)),
        json!({ "studentId": sam, "amountPaid": 0 }),
        "bad_params",
    );
    let paid = lms.ok(
        "fees.record",
        Some(admin(&admin_id)),
        json!({ "studentId": sam, "amountPaid": 250.5, "paymentMethod": "card" }),
    );
    assert_eq!(paid["payment"]["term"], "School Fee Payment");
    assert_eq!(paid["payment"]["isPaidInFull"], true);

    let fees = lms.ok("fees.list", Some(admin(&admin_id)), json!({ "studentId": sam }));
    assert_eq!(fees["payments"][0]["amountPaid"], 250.5);

    let extra = lms.ok(
        "admin.create",
        Some(admin(&admin_id)),
        json!({ "name": "Registrar", "email": "registrar@school.test", "credentialHash": "h" }),
    );
    assert_eq!(extra["admin"]["name"], "Registrar");
}
