use serde_json::json;
use std::fs::File;
use std::io::{BufRead, BufReader, Read, Write};
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

fn error_message(resp: &serde_json::Value) -> &str {
    resp.get("error")
        .and_then(|e| e.get("message"))
        .and_then(|v| v.as_str())
        .expect("error message")
}

fn two_sections() -> serde_json::Value {
    json!([
        {
            "sectionId": "S1", "pId": "P1", "courseCode": "CSE101", "courseTitle": "Structured Programming",
            "section": "A", "credit": 3.0, "type": "Regular", "levelTerm": "L1T1",
            "teacherId": "T1", "teacherName": "Alice Rahman", "studentCount": 40, "classTaken": 5
        },
        {
            "sectionId": "S2", "pId": "P1", "courseCode": "CSE101", "courseTitle": "Structured Programming",
            "section": "B", "credit": 3.0, "type": "Regular", "levelTerm": "L1T1",
            "teacherId": "T2", "teacherName": "Basher Khan", "studentCount": 38, "classTaken": 4
        }
    ])
}

fn dataset_ids(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) -> Vec<String> {
    let result = request_ok(stdin, reader, "ids", "dataset.get", json!({}));
    result["entries"]
        .as_array()
        .expect("entries")
        .iter()
        .map(|e| e["sectionId"].as_str().expect("sectionId").to_string())
        .collect()
}

fn sha256_hex(bytes: &[u8]) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

#[test]
fn saving_requires_a_name_and_lists_newest_first() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "dataset.replace",
        json!({ "entries": two_sections() }),
    );

    for (i, params) in [json!({}), json!({ "name": "" }), json!({ "name": "   " })]
        .iter()
        .enumerate()
    {
        let resp = request(
            &mut stdin,
            &mut reader,
            &format!("bad-{i}"),
            "versions.save",
            params.clone(),
        );
        assert_eq!(error_code(&resp), "bad_params");
    }

    let first = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "versions.save",
        json!({ "name": "before edits" }),
    );
    assert_eq!(first["name"].as_str(), Some("before edits"));
    assert_eq!(first["sectionCount"].as_u64(), Some(2));
    assert_eq!(first["id"].as_str().map(str::len), Some(36));
    assert!(first["savedAt"].as_str().is_some());

    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "dataset.replace",
        json!({ "entries": [two_sections()[0].clone()] }),
    );
    let second = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "versions.save",
        json!({ "name": "  after cut  " }),
    );
    assert_eq!(second["name"].as_str(), Some("after cut"));
    assert_eq!(second["sectionCount"].as_u64(), Some(1));

    let result = request_ok(&mut stdin, &mut reader, "5", "versions.list", json!({}));
    let versions = result["versions"].as_array().expect("versions");
    assert_eq!(versions.len(), 2);
    assert_eq!(versions[0]["name"].as_str(), Some("after cut"));
    assert_eq!(versions[1]["name"].as_str(), Some("before edits"));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn restore_rewinds_the_dataset_and_delete_forgets_the_version() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "dataset.replace",
        json!({ "entries": two_sections() }),
    );
    let saved = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "versions.save",
        json!({ "name": "original" }),
    );
    let version_id = saved["id"].as_str().expect("version id").to_string();

    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "dataset.replace",
        json!({ "entries": [{
            "sectionId": "S9", "pId": "P9", "courseCode": "XXX999", "section": "A", "levelTerm": "L4T2"
        }] }),
    );
    // An editor on a section the restore removes must not survive it.
    request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "editor.open",
        json!({
            "view": "list",
            "sectionId": "S9",
            "anchor": { "x": 100.0, "y": 100.0, "width": 60.0, "height": 24.0 },
            "viewport": { "width": 1280.0, "height": 800.0 }
        }),
    );

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "versions.restore",
        json!({ "id": version_id }),
    );
    assert_eq!(result["sections"].as_u64(), Some(2));
    assert_eq!(dataset_ids(&mut stdin, &mut reader), vec!["S1", "S2"]);
    let resp = request(
        &mut stdin,
        &mut reader,
        "6",
        "editor.state",
        json!({ "view": "list" }),
    );
    assert_eq!(error_code(&resp), "not_found");

    let resp = request(
        &mut stdin,
        &mut reader,
        "7",
        "versions.restore",
        json!({ "id": "ghost" }),
    );
    assert_eq!(error_code(&resp), "not_found");
    assert_eq!(resp["error"]["details"]["id"].as_str(), Some("ghost"));

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "8",
        "versions.delete",
        json!({ "id": version_id }),
    );
    assert_eq!(result["removed"].as_str(), Some(version_id.as_str()));
    assert_eq!(result["versions"].as_u64(), Some(0));
    let result = request_ok(&mut stdin, &mut reader, "9", "versions.list", json!({}));
    assert_eq!(result["versions"].as_array().map(|v| v.len()), Some(0));
    let resp = request(
        &mut stdin,
        &mut reader,
        "10",
        "versions.delete",
        json!({ "id": version_id }),
    );
    assert_eq!(error_code(&resp), "not_found");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn export_writes_a_zip_whose_manifest_checksums_the_courses() {
    let workspace = temp_dir("routined-bundle-ws");
    let out_dir = temp_dir("routined-bundle-out");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "dataset.replace",
        json!({ "entries": two_sections() }),
    );
    request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "slots.add",
        json!({ "kind": "Lab", "startTime": "17:00", "endTime": "18:15" }),
    );

    let bundle_path = out_dir.join("routine.zip");
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "snapshot.exportBundle",
        json!({ "path": bundle_path.to_string_lossy() }),
    );
    assert_eq!(result["bundleFormat"].as_str(), Some("routine-snapshot-v1"));
    assert_eq!(result["sections"].as_u64(), Some(2));
    assert_eq!(result["slots"].as_u64(), Some(10));
    let reported = result["sha256"].as_str().expect("sha256");
    assert_eq!(reported.len(), 64);

    let f = File::open(&bundle_path).expect("open bundle");
    let mut archive = zip::ZipArchive::new(f).expect("open zip archive");

    let mut manifest_text = String::new();
    archive
        .by_name("manifest.json")
        .expect("manifest entry")
        .read_to_string(&mut manifest_text)
        .expect("read manifest");
    let manifest: serde_json::Value = serde_json::from_str(&manifest_text).expect("manifest json");
    assert_eq!(manifest["format"].as_str(), Some("routine-snapshot-v1"));
    assert_eq!(manifest["coursesSha256"].as_str(), Some(reported));
    assert!(manifest["exportedAt"].as_u64().is_some());

    let mut courses_text = String::new();
    archive
        .by_name("data/courses.json")
        .expect("courses entry")
        .read_to_string(&mut courses_text)
        .expect("read courses");
    assert_eq!(sha256_hex(courses_text.as_bytes()), reported);
    let courses: serde_json::Value = serde_json::from_str(&courses_text).expect("courses json");
    assert_eq!(courses.as_array().map(|a| a.len()), Some(2));
    assert_eq!(courses[0]["sectionId"].as_str(), Some("S1"));

    let mut slots_text = String::new();
    archive
        .by_name("data/timeslots.json")
        .expect("timeslots entry")
        .read_to_string(&mut slots_text)
        .expect("read timeslots");
    let slots: serde_json::Value = serde_json::from_str(&slots_text).expect("slots json");
    assert_eq!(slots.as_array().map(|a| a.len()), Some(10));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn import_restores_sections_always_and_slots_only_with_a_workspace() {
    let workspace_a = temp_dir("routined-bundle-src");
    let workspace_b = temp_dir("routined-bundle-dst");
    let out_dir = temp_dir("routined-bundle-wire");
    let bundle_path = out_dir.join("handoff.zip");

    // First daemon: a workspace with one custom slot on top of the defaults.
    {
        let (mut child, mut stdin, mut reader) = spawn_sidecar();
        request_ok(
            &mut stdin,
            &mut reader,
            "1",
            "workspace.select",
            json!({ "path": workspace_a.to_string_lossy() }),
        );
        request_ok(
            &mut stdin,
            &mut reader,
            "2",
            "dataset.replace",
            json!({ "entries": two_sections() }),
        );
        request_ok(
            &mut stdin,
            &mut reader,
            "3",
            "slots.add",
            json!({ "kind": "Lab", "startTime": "17:00", "endTime": "18:15" }),
        );
        request_ok(
            &mut stdin,
            &mut reader,
            "4",
            "snapshot.exportBundle",
            json!({ "path": bundle_path.to_string_lossy() }),
        );
        drop(stdin);
        let _ = child.wait();
    }

    // Second daemon: before a workspace exists only the dataset comes back.
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let result = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "snapshot.importBundle",
        json!({ "path": bundle_path.to_string_lossy() }),
    );
    assert_eq!(result["sections"].as_u64(), Some(2));
    assert_eq!(result["bundleFormat"].as_str(), Some("routine-snapshot-v1"));
    assert_eq!(result["slotsRestored"].as_bool(), Some(false));
    assert_eq!(dataset_ids(&mut stdin, &mut reader), vec!["S1", "S2"]);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "workspace.select",
        json!({ "path": workspace_b.to_string_lossy() }),
    );
    assert_eq!(result["timeSlots"].as_u64(), Some(9));

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "snapshot.importBundle",
        json!({ "path": bundle_path.to_string_lossy() }),
    );
    assert_eq!(result["slotsRestored"].as_bool(), Some(true));
    assert!(result.get("slotStoreError").is_none());

    let result = request_ok(&mut stdin, &mut reader, "8", "slots.list", json!({}));
    let slots = result["slots"].as_array().expect("slots");
    assert_eq!(slots.len(), 10);
    assert!(slots
        .iter()
        .any(|s| s["startTime"].as_str() == Some("17:00")));

    // The restored slots also landed in this workspace's store file.
    let restarted = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "workspace.select",
        json!({ "path": workspace_b.to_string_lossy() }),
    );
    assert_eq!(restarted["timeSlots"].as_u64(), Some(10));

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(workspace_a);
    let _ = std::fs::remove_dir_all(workspace_b);
    let _ = std::fs::remove_dir_all(out_dir);
}

#[test]
fn refused_bundles_leave_the_dataset_untouched() {
    let out_dir = temp_dir("routined-bundle-bad");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    // Nothing to export yet.
    let missing = out_dir.join("never.zip");
    let resp = request(
        &mut stdin,
        &mut reader,
        "1",
        "snapshot.exportBundle",
        json!({ "path": missing.to_string_lossy() }),
    );
    assert_eq!(error_code(&resp), "empty_export");
    assert!(!missing.exists());

    request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "dataset.replace",
        json!({ "entries": [{
            "sectionId": "KEEP", "pId": "P1", "courseCode": "CSE101", "section": "A", "levelTerm": "L1T1"
        }] }),
    );

    let not_zip = out_dir.join("plain.txt");
    std::fs::write(&not_zip, "just text").expect("write plain file");
    let resp = request(
        &mut stdin,
        &mut reader,
        "3",
        "snapshot.importBundle",
        json!({ "path": not_zip.to_string_lossy() }),
    );
    assert_eq!(error_code(&resp), "snapshot_failed");
    assert!(error_message(&resp).contains("zip signature"));

    // Structurally valid zip, wrong checksum.
    let tampered = out_dir.join("tampered.zip");
    write_bundle(
        &tampered,
        json!({ "format": "routine-snapshot-v1", "version": 1, "coursesSha256": "0000" }),
        "[]",
    );
    let resp = request(
        &mut stdin,
        &mut reader,
        "4",
        "snapshot.importBundle",
        json!({ "path": tampered.to_string_lossy() }),
    );
    assert_eq!(error_code(&resp), "snapshot_failed");
    assert!(error_message(&resp).contains("checksum mismatch"));

    // Checksum intact but the payload repeats a sectionId.
    let duped = out_dir.join("duped.zip");
    let courses_text = json!([
        { "sectionId": "S1", "pId": "P1", "courseCode": "CSE101", "section": "A", "levelTerm": "L1T1" },
        { "sectionId": "S1", "pId": "P1", "courseCode": "CSE101", "section": "B", "levelTerm": "L1T1" }
    ])
    .to_string();
    write_bundle(
        &duped,
        json!({
            "format": "routine-snapshot-v1",
            "version": 1,
            "coursesSha256": sha256_hex(courses_text.as_bytes()),
        }),
        &courses_text,
    );
    let resp = request(
        &mut stdin,
        &mut reader,
        "5",
        "snapshot.importBundle",
        json!({ "path": duped.to_string_lossy() }),
    );
    assert_eq!(error_code(&resp), "snapshot_failed");
    assert!(error_message(&resp).contains("duplicate sectionId"));
    assert_eq!(resp["error"]["details"]["sectionId"].as_str(), Some("S1"));

    assert_eq!(dataset_ids(&mut stdin, &mut reader), vec!["KEEP"]);

    drop(stdin);
    let _ = child.wait();
    let _ = std::fs::remove_dir_all(out_dir);
}

fn write_bundle(path: &PathBuf, manifest: serde_json::Value, courses_text: &str) {
    use zip::write::FileOptions;
    use zip::{CompressionMethod, ZipWriter};

    let out = File::create(path).expect("create bundle file");
    let mut zip = ZipWriter::new(out);
    let opts = FileOptions::default().compression_method(CompressionMethod::Deflated);
    zip.start_file("manifest.json", opts).expect("manifest entry");
    zip.write_all(manifest.to_string().as_bytes())
        .expect("write manifest");
    zip.start_file("data/courses.json", opts).expect("courses entry");
    zip.write_all(courses_text.as_bytes()).expect("write courses");
    zip.finish().expect("finish zip");
}
