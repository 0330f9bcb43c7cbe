use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_gradetrackd");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn gradetrackd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    if value.get("ok").and_then(|v| v.as_bool()) == Some(false) {
        let code = value
            .get("error")
            .and_then(|e| e.get("code"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        assert_ne!(
            code, "not_implemented",
            "unexpected unknown method for {}",
            method
        );
    }
    value
}

fn error_code(resp: &serde_json::Value) -> &str {
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
}

#[test]
fn router_dispatch_smoke_covers_handler_families() {
    let workspace = temp_dir("gradetrack-router-smoke");

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let health = request(&mut stdin, &mut reader, "1", "health", json!({}));
    assert_eq!(health.get("ok").and_then(|v| v.as_bool()), Some(true));

    let _ = request(
        &mut stdin,
        &mut reader,
        "2",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let profile = request(
        &mut stdin,
        &mut reader,
        "3",
        "profile.get",
        json!({ "userId": "smoke-user" }),
    );
    assert_eq!(
        profile
            .get("result")
            .and_then(|r| r.get("role"))
            .and_then(|v| v.as_str()),
        Some("student")
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "4",
        "profile.update",
        json!({
            "userId": "smoke-user",
            "patch": { "fullName": "Smoke User", "collegeName": "Test College" }
        }),
    );
    let bad_role = request(
        &mut stdin,
        &mut reader,
        "4b",
        "profile.update",
        json!({ "userId": "smoke-user", "patch": { "role": "admin" } }),
    );
    assert_eq!(error_code(&bad_role), "bad_params");

    // A fresh workspace carries exactly one seeded default scheme.
    let schemes = request(&mut stdin, &mut reader, "5", "schemes.list", json!({}));
    let scheme_rows = schemes
        .get("result")
        .and_then(|r| r.get("schemes"))
        .and_then(|v| v.as_array())
        .expect("schemes array");
    assert_eq!(scheme_rows.len(), 1);
    assert_eq!(
        scheme_rows[0].get("isDefault").and_then(|v| v.as_bool()),
        Some(true)
    );

    // Mutations are admin-gated; an unknown caller is a plain student.
    let denied = request(
        &mut stdin,
        &mut reader,
        "6",
        "schemes.create",
        json!({
            "userId": "smoke-user",
            "schemeName": "Custom",
            "cutoffs": [{ "grade": "A", "minTotal": 70.0 }, { "grade": "F", "minTotal": 0.0 }]
        }),
    );
    assert_eq!(error_code(&denied), "forbidden");

    let _ = request(&mut stdin, &mut reader, "7", "templates.list", json!({}));

    let created = request(
        &mut stdin,
        &mut reader,
        "8",
        "semesters.create",
        json!({ "userId": "smoke-user", "year": 2, "term": 1, "branch": "CSE" }),
    );
    let semester_id = created
        .get("result")
        .and_then(|r| r.get("semesterId"))
        .and_then(|v| v.as_i64())
        .expect("semesterId");

    let _ = request(
        &mut stdin,
        &mut reader,
        "9",
        "semesters.list",
        json!({ "userId": "smoke-user" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "10",
        "semesters.update",
        json!({ "semesterId": semester_id, "patch": { "title": "Sem 3" } }),
    );

    let _ = request(
        &mut stdin,
        &mut reader,
        "11",
        "marks.list",
        json!({ "semesterId": semester_id }),
    );
    let saved = request(
        &mut stdin,
        &mut reader,
        "12",
        "marks.save",
        json!({
            "semesterId": semester_id,
            "subjects": [
                {
                    "subjectName": "Algorithms",
                    "credits": 4,
                    "marks": { "continuous": 25.0, "midterm": 25.0, "final": 30.0 }
                }
            ]
        }),
    );
    assert_eq!(saved.get("ok").and_then(|v| v.as_bool()), Some(true));

    let _ = request(
        &mut stdin,
        &mut reader,
        "13",
        "whatif.predict",
        json!({ "semesterId": semester_id, "target": 8.0 }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "14",
        "record.summary",
        json!({ "userId": "smoke-user" }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "15",
        "semesters.resetTemplate",
        json!({ "semesterId": semester_id }),
    );
    let _ = request(
        &mut stdin,
        &mut reader,
        "16",
        "semesters.delete",
        json!({ "semesterId": semester_id }),
    );

    let missing_param = request(&mut stdin, &mut reader, "17", "profile.get", json!({}));
    assert_eq!(error_code(&missing_param), "bad_params");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
}
