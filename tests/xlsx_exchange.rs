use rust_xlsxwriter::Workbook;
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
    let exe = env!("CARGO_BIN_EXE_routined");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn routined");
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
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    serde_json::from_str(line.trim()).expect("parse response json")
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let resp = request(stdin, reader, id, method, params);
    assert_eq!(
        resp.get("ok").and_then(|v| v.as_bool()),
        Some(true),
        "expected ok for {}: {}",
        method,
        resp
    );
    resp.get("result").cloned().expect("result")
}

fn error_code(resp: &serde_json::Value) -> &str {
    resp.get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .expect("error code")
}

fn entry(section_id: &str, code: &str, title: &str) -> serde_json::Value {
    json!({
        "sectionId": section_id,
        "pId": "P1",
        "courseCode": code,
        "courseTitle": title,
        "section": "A",
        "credit": 3.0,
        "type": "Regular",
        "levelTerm": "L1T1",
        "studentCount": 40,
        "teacherId": "T1",
        "teacherName": "Alice Rahman",
        "classTaken": 10,
        "weeklyClass": 3,
        "courseType": "Theory"
    })
}

#[test]
fn export_and_reimport_preserves_the_dataset() {
    let dir = temp_dir("routined-xlsx-roundtrip");
    let path = dir.join("routine.xlsx");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "dataset.replace",
        json!({ "entries": [
            entry("S1", "CSE101", "Structured Programming"),
            entry("S2", "EEE201", "Circuits"),
        ] }),
    );
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "dataset.exportXlsx",
        json!({ "path": path.to_string_lossy(), "scope": "all" }),
    );
    assert_eq!(exported["rows"].as_u64(), Some(2));
    assert!(path.exists());

    // Wipe and read it back.
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "dataset.replace",
        json!({ "entries": [entry("X9", "MAT000", "Placeholder")] }),
    );
    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "dataset.importXlsx",
        json!({ "path": path.to_string_lossy() }),
    );
    assert_eq!(imported["sections"].as_u64(), Some(2));

    let data = request_ok(&mut stdin, &mut reader, "5", "dataset.get", json!({}));
    let ids: Vec<&str> = data["entries"]
        .as_array()
        .expect("entries")
        .iter()
        .map(|e| e["sectionId"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["S1", "S2"]);
    let s1 = &data["entries"][0];
    assert_eq!(s1["courseTitle"].as_str(), Some("Structured Programming"));
    assert_eq!(s1["studentCount"].as_i64(), Some(40));
    assert_eq!(s1["weeklyClass"].as_i64(), Some(3));
    assert_eq!(s1["courseType"].as_str(), Some("Theory"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn filtered_export_writes_only_matching_sections() {
    let dir = temp_dir("routined-xlsx-filtered");
    let path = dir.join("filtered.xlsx");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "dataset.replace",
        json!({ "entries": [
            entry("S1", "CSE101", "Structured Programming"),
            entry("S2", "EEE201", "Circuits"),
            entry("S3", "CSE202", "Algorithms"),
        ] }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "view.setFilters",
        json!({ "view": "master", "filters": { "search": "cse" } }),
    );
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "dataset.exportXlsx",
        json!({ "path": path.to_string_lossy(), "scope": "filtered", "view": "master" }),
    );
    assert_eq!(exported["rows"].as_u64(), Some(2));

    let imported = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "dataset.importXlsx",
        json!({ "path": path.to_string_lossy() }),
    );
    assert_eq!(imported["sections"].as_u64(), Some(2));

    // Filtered exports without a view are refused up front.
    let resp = request(
        &mut stdin,
        &mut reader,
        "5",
        "dataset.exportXlsx",
        json!({ "path": path.to_string_lossy(), "scope": "filtered" }),
    );
    assert_eq!(error_code(&resp), "bad_params");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn empty_exports_are_refused_before_touching_disk() {
    let dir = temp_dir("routined-xlsx-empty");
    let path = dir.join("nothing.xlsx");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "dataset.exportXlsx",
        json!({ "path": path.to_string_lossy(), "scope": "all" }),
    );
    assert_eq!(error_code(&resp), "empty_export");
    assert!(!path.exists());

    // A filter that matches nothing is just as empty.
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "dataset.replace",
        json!({ "entries": [entry("S1", "CSE101", "Structured Programming")] }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "view.setFilters",
        json!({ "view": "master", "filters": { "search": "zzz" } }),
    );
    let resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "dataset.exportXlsx",
        json!({ "path": path.to_string_lossy(), "scope": "filtered", "view": "master" }),
    );
    assert_eq!(error_code(&resp), "empty_export");

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn directory_exports_derive_a_dated_file_name() {
    let dir = temp_dir("routined-xlsx-named");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "dataset.replace",
        json!({ "entries": [entry("S1", "CSE101", "Structured Programming")] }),
    );
    let exported = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "dataset.exportXlsx",
        json!({ "dir": dir.to_string_lossy(), "scope": "all" }),
    );
    let file_name = exported["fileName"].as_str().expect("fileName");
    assert!(file_name.starts_with("course_data_full_"));
    assert!(file_name.ends_with(".xlsx"));
    assert!(dir.join(file_name).exists());

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(dir);
}

#[test]
fn import_failures_surface_the_reason_and_keep_state() {
    let dir = temp_dir("routined-xlsx-badfile");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "dataset.replace",
        json!({ "entries": [entry("S1", "CSE101", "Structured Programming")] }),
    );

    // A workbook carrying the same sectionId twice is rejected whole.
    let dupes = dir.join("dupes.xlsx");
    let mut workbook = Workbook::new();
    let ws = workbook.add_worksheet();
    ws.write_string(0, 0, "sectionId").expect("header");
    ws.write_string(1, 0, "DUP1").expect("row");
    ws.write_string(2, 0, "DUP1").expect("row");
    workbook.save(&dupes).expect("save workbook");

    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "dataset.importXlsx",
        json!({ "path": dupes.to_string_lossy() }),
    );
    assert_eq!(error_code(&resp), "import_failed");
    assert!(resp["error"]["message"]
        .as_str()
        .expect("message")
        .contains("duplicate sectionId"));

    let missing = dir.join("does-not-exist.xlsx");
    let resp = request(
        &mut stdin,
        &mut reader,
        "3",
        "dataset.importXlsx",
        json!({ "path": missing.to_string_lossy() }),
    );
    assert_eq!(error_code(&resp), "import_failed");

    // The previous dataset is untouched after both failures.
    let data = request_ok(&mut stdin, &mut reader, "4", "dataset.get", json!({}));
    assert_eq!(data["total"].as_u64(), Some(1));
    assert_eq!(data["entries"][0]["sectionId"].as_str(), Some("S1"));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(dir);
}
