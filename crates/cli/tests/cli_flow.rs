use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[allow(deprecated)]
fn contact_ids(snapshot: &Path) -> Command {
    let mut cmd = Command::cargo_bin("contact-ids").expect("binary");
    cmd.arg("--snapshot").arg(snapshot);
    cmd
}

fn run_json(snapshot: &Path, args: &[&str]) -> Value {
    let output = contact_ids(snapshot)
        .arg("--json")
        .args(args)
        .output()
        .expect("command run");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("valid json")
}

const EVENTS: &str = r#"
{"kind":"contacts","contacts":[{"id":"628111@s.whatsapp.net","notify":"Bob"}]}
{"kind":"message","chatId":"628111@s.whatsapp.net","pushName":"Robert"}
{"kind":"contacts","contacts":[{"id":"628111@s.whatsapp.net","notify":"Bobby"}]}
{"kind":"message","chatId":"1203@g.us","participant":"777@lid","pushName":"Lee"}
"#;

#[test]
fn ingest_then_query_through_snapshot() {
    let temp = tempdir().unwrap();
    let snapshot = temp.path().join("contacts.json");
    let events = temp.path().join("events.jsonl");
    fs::write(&events, EVENTS).unwrap();

    let ingest = run_json(&snapshot, &["ingest", events.to_str().unwrap()]);
    assert_eq!(ingest["events"], 4);
    assert!(snapshot.exists());

    let resolved = run_json(&snapshot, &["resolve", "628111@s.whatsapp.net"]);
    assert_eq!(resolved["displayName"], "Robert");

    let unknown = run_json(
        &snapshot,
        &["resolve", "999@s.whatsapp.net", "--fallback", "Nobody"],
    );
    assert_eq!(unknown["displayName"], "Nobody");

    let stats = run_json(&snapshot, &["stats"]);
    assert_eq!(stats["total_contacts"], 2);

    let record = run_json(&snapshot, &["get", "777@lid"]);
    assert_eq!(record["source"], "MessageEvent");
    assert_eq!(record["originChat"], "1203@g.us");

    let found = run_json(&snapshot, &["search", "rob"]);
    assert_eq!(found.as_array().map(Vec::len), Some(1));

    let by_phone = run_json(&snapshot, &["phone", "628111"]);
    assert_eq!(by_phone["id"], "628111@s.whatsapp.net");
}

#[test]
fn export_csv_writes_beside_snapshot() {
    let temp = tempdir().unwrap();
    let snapshot = temp.path().join("contacts.json");
    let events = temp.path().join("events.jsonl");
    fs::write(&events, EVENTS).unwrap();
    run_json(&snapshot, &["ingest", events.to_str().unwrap()]);

    let out = run_json(&snapshot, &["export", "--format", "csv", "--out", "all.csv"]);
    assert_eq!(out["path"], temp.path().join("all.csv").to_str().unwrap());

    let csv = fs::read_to_string(temp.path().join("all.csv")).unwrap();
    assert!(csv.starts_with("ID,Phone Number,LinkedID,Display Name,Source,Last Seen\n"));
    assert!(csv.contains("\"Robert\""));
}

#[test]
fn malformed_event_line_is_reported() {
    let temp = tempdir().unwrap();
    let snapshot = temp.path().join("contacts.json");
    let events = temp.path().join("events.jsonl");
    fs::write(&events, "{\"kind\":\"teleport\"}\n").unwrap();

    contact_ids(&snapshot)
        .arg("ingest")
        .arg(&events)
        .assert()
        .failure()
        .stderr(predicate::str::contains("invalid event"));
}

#[test]
fn corrupt_snapshot_is_an_error() {
    let temp = tempdir().unwrap();
    let snapshot = temp.path().join("contacts.json");
    fs::write(&snapshot, "not json").unwrap();

    contact_ids(&snapshot)
        .arg("stats")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to load contact snapshot"));
}

#[test]
fn scan_reads_directory_fixture() {
    let temp = tempdir().unwrap();
    let snapshot = temp.path().join("contacts.json");
    let directory = temp.path().join("directory.json");
    fs::write(
        &directory,
        r#"{"chats":[
            {"id":"1203@g.us","roster":[{"id":"628222@s.whatsapp.net","displayName":"Ann"}]},
            {"id":"down@g.us","unreachable":true}
        ]}"#,
    )
    .unwrap();

    let report = run_json(
        &snapshot,
        &["scan", "--directory", directory.to_str().unwrap()],
    );
    assert_eq!(report["chats_scanned"], 1);
    assert_eq!(report["chats_failed"], 1);

    let name = run_json(&snapshot, &["resolve", "628222@s.whatsapp.net"]);
    assert_eq!(name["displayName"], "Ann");
}
