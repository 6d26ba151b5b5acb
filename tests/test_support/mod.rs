#![allow(dead_code)]

use serde_json::{json, Value};
use std::io::{BufRead, BufReader, Write};
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use tempfile::TempDir;

pub fn temp_workspace(prefix: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(prefix)
        .tempdir()
        .expect("create temp workspace")
}

pub struct Sidecar {
    child: Child,
    stdin: ChildStdin,
    reader: BufReader<ChildStdout>,
    next_id: u64,
}

impl Drop for Sidecar {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

pub fn spawn_sidecar() -> Sidecar {
    let exe = env!("CARGO_BIN_EXE_lmsd");
    let mut child = Command::new(exe)
        .env_remove("LMSD_WORKSPACE")
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn lmsd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    Sidecar {
        child,
        stdin,
        reader: BufReader::new(stdout),
        next_id: 0,
    }
}

pub fn student(id: &str) -> Value {
    json!({ "role": "student", "id": id })
}

pub fn teacher(id: &str) -> Value {
    json!({ "role": "teacher", "id": id })
}

pub fn admin(id: &str) -> Value {
    json!({ "role": "admin", "id": id })
}

impl Sidecar {
    pub fn send_raw(&mut self, line: &str) -> Value {
        writeln!(self.stdin, "{}", line).expect("write request");
        self.stdin.flush().expect("flush request");
        let mut out = String::new();
        self.reader.read_line(&mut out).expect("read response line");
        assert!(!out.trim().is_empty(), "empty response");
        serde_json::from_str(out.trim()).expect("parse response json")
    }

    pub fn request(&mut self, method: &str, actor: Option<Value>, params: Value) -> Value {
        self.next_id += 1;
        let id = self.next_id.to_string();
        let mut payload = json!({
            "id": id,
            "method": method,
            "params": params,
        });
        if let Some(a) = actor {
            payload["actor"] = a;
        }
        let value = self.send_raw(&payload.to_string());
        assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id.as_str()));
        value
    }

    pub fn ok(&mut self, method: &str, actor: Option<Value>, params: Value) -> Value {
        let value = self.request(method, actor, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(true),
            "{} failed: {}",
            method,
            value
        );
        value.get("result").cloned().unwrap_or(Value::Null)
    }

    /// Asserts the call fails with `code` and returns the error object.
    pub fn fails(&mut self, method: &str, actor: Option<Value>, params: Value, code: &str) -> Value {
        let value = self.request(method, actor, params);
        assert_eq!(
            value.get("ok").and_then(|v| v.as_bool()),
            Some(false),
            "{} unexpectedly succeeded: {}",
            method,
            value
        );
        let error = value.get("error").cloned().unwrap_or(Value::Null);
        assert_eq!(error["code"], code, "{}: {}", method, value);
        error
    }

    pub fn select_workspace(&mut self, dir: &TempDir) {
        self.ok(
            "workspace.select",
            None,
            json!({ "path": dir.path().to_string_lossy() }),
        );
    }

    pub fn register(&mut self, role: &str, name: &str, email: &str) -> String {
        let out = self.ok(
            "accounts.register",
            None,
            json!({
                "role": role,
                "name": name,
                "email": email,
                "credentialHash": "hash"
            }),
        );
        out["account"]["id"].as_str().expect("account id").to_string()
    }

    pub fn provision_admin(&mut self) -> String {
        let out = self.ok("admin.provision", None, json!({}));
        out["admin"]["id"].as_str().expect("admin id").to_string()
    }

    /// Registers and approves a student account.
    pub fn approved_student(&mut self, admin_id: &str, name: &str, email: &str) -> String {
        let id = self.register("student", name, email);
        self.ok("student.approve", Some(admin(admin_id)), json!({ "studentId": id }));
        id
    }

    pub fn create_course(&mut self, teacher_id: &str, code: &str) -> String {
        let out = self.ok(
            "course.create",
            Some(teacher(teacher_id)),
            json!({
                "title": format!("Course {code}"),
                "courseCode": code,
                "description": "Introductory course",
                "duration": "6 weeks",
                "level": "Beginner",
                "courseFormat": "online"
            }),
        );
        out["course"]["id"].as_str().expect("course id").to_string()
    }

    /// Walks `student_id` through request and approval.
    pub fn enroll(&mut self, admin_id: &str, student_id: &str, course_id: &str) {
        self.ok(
            "enrollment.request",
            Some(student(student_id)),
            json!({ "courseId": course_id }),
        );
        self.ok(
            "enrollment.approve",
            Some(admin(admin_id)),
            json!({ "courseId": course_id, "studentId": student_id }),
        );
    }
}
