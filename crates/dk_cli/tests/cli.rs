use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;

fn dokoiku(store: &Path) -> Command {
    let mut cmd = Command::cargo_bin("dokoiku").unwrap();
    cmd.arg("--store-dir").arg(store).env_remove("RUST_LOG");
    cmd
}

fn stdout_json(out: &[u8]) -> Value {
    serde_json::from_slice(out).unwrap()
}

fn write_candidates(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("candidates.json");
    fs::write(
        &path,
        r#"[
            { "id": "S1", "name": "Soba", "genre": "japanese" },
            { "id": "S2", "name": "Tacos", "genre": "mexican" },
            { "id": "S3", "name": "Pho", "genre": "vietnamese" },
            { "id": "S4", "name": "Ramen", "genre": "japanese" }
        ]"#,
    )
    .unwrap();
    path
}

#[test]
fn open_next_vote_result_round_trip() {
    let tmp = tempfile::tempdir().unwrap();
    let store = tmp.path().join("rooms");
    let candidates = write_candidates(tmp.path());

    let out = dokoiku(&store)
        .args(["open", "--area", "shibuya", "--seed", "5"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let room = stdout_json(&out)["room_id"].as_str().unwrap().to_string();
    assert_eq!(room.len(), 8);
    assert!(store.join(format!("room-{room}.json")).exists());

    let out = dokoiku(&store)
        .args(["next", "--room", &room, "--user", "alice", "--seed", "5", "--candidates"])
        .arg(&candidates)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let next = stdout_json(&out);
    assert_eq!(next["status"], "set");
    assert_eq!(next["progress"]["total"], 4);
    let shown: Vec<String> = next["candidates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(shown.len(), 3);

    let mut vote = dokoiku(&store);
    vote.args(["vote", "--room", &room, "--user", "alice"]);
    for (i, id) in shown.iter().enumerate() {
        let score = if i == 0 { "ng".to_string() } else { (90 - 20 * i).to_string() };
        vote.arg("--item").arg(format!("{id}={score}"));
    }
    vote.assert()
        .success()
        .stdout(predicate::str::contains("\"is_decided\": false"));

    let out = dokoiku(&store)
        .args(["result", "--room", &room])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let result = stdout_json(&out);
    let ranked: Vec<&str> = result["candidates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["candidate"]["id"].as_str().unwrap())
        .collect();
    assert_eq!(ranked, [shown[1].as_str(), shown[2].as_str()]);
    assert_eq!(result["a_analysis"]["exists"], false);
}

#[test]
fn missing_room_exits_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    dokoiku(tmp.path())
        .args(["result", "--room", "nosuch"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("room not found"));
}

#[test]
fn bad_vote_item_is_a_usage_error() {
    let tmp = tempfile::tempdir().unwrap();
    dokoiku(tmp.path())
        .args(["vote", "--room", "r1", "--user", "u1", "--item", "S1:90"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("ID=SCORE"));
}

#[test]
fn invalid_params_file_is_rejected() {
    let tmp = tempfile::tempdir().unwrap();
    let params = tmp.path().join("params.json");
    fs::write(&params, r#"{ "decision_rounds": 0 }"#).unwrap();
    dokoiku(tmp.path())
        .arg("--params")
        .arg(&params)
        .args(["open", "--area", "ginza"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("decision_rounds"));
}

#[test]
fn simulate_is_reproducible() {
    let tmp = tempfile::tempdir().unwrap();
    let run = || {
        dokoiku(tmp.path())
            .args(["simulate", "--seed", "0x2A", "--max-rounds", "15"])
            .assert()
            .success()
            .get_output()
            .stdout
            .clone()
    };
    let first = stdout_json(&run());
    assert!(first["rounds"].as_u64().unwrap() >= 1);
    assert!(first["ranking"].is_array());
    assert_eq!(first, stdout_json(&run()));
}

#[test]
fn repeated_source_venues_are_pooled_once() {
    let tmp = tempfile::tempdir().unwrap();
    let store = tmp.path().join("rooms");
    let candidates = tmp.path().join("dupes.json");
    fs::write(
        &candidates,
        r#"{ "candidates": [
            { "id": "S1", "name": "Soba" },
            { "id": "S2", "name": "Tacos" },
            { "id": "S3", "name": "Pho" },
            { "id": "S1", "name": "Soba (again)" },
            { "id": "S2", "name": "Tacos (again)" }
        ] }"#,
    )
    .unwrap();

    let out = dokoiku(&store)
        .args(["open", "--area", "ebisu", "--seed", "3"])
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let room = stdout_json(&out)["room_id"].as_str().unwrap().to_string();

    let out = dokoiku(&store)
        .args(["next", "--room", &room, "--user", "bob", "--seed", "3", "--candidates"])
        .arg(&candidates)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let next = stdout_json(&out);
    assert_eq!(next["status"], "set");
    assert_eq!(next["progress"]["total"], 3);

    let doc: Value =
        serde_json::from_str(&fs::read_to_string(store.join(format!("room-{room}.json"))).unwrap()).unwrap();
    let meta = &doc["room"]["fetch_meta"];
    assert_eq!(meta["fetched_count"], 5);
    assert_eq!(meta["candidate_pool_count"], 3);
    let names: Vec<&str> = doc["room"]["candidates"]
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["Soba", "Tacos", "Pho"]);
}
