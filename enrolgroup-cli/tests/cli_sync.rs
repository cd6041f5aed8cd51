use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use rusqlite::Connection;
use tempfile::TempDir;

use enrolgroup_sqlite::SqliteLocalStore;

fn enrolgroup_cmd(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("enrolgroup").expect("enrolgroup binary");
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("NO_COLOR", "1")
        .arg("--config")
        .arg(home.join("config.yaml"));
    cmd
}

fn seed_remote(dir: &Path) -> PathBuf {
    let path = dir.join("remote.db");
    let conn = Connection::open(&path).expect("open remote");
    conn.execute_batch(
        "CREATE TABLE sis_groups (courseidnumber TEXT, groupidnumber TEXT, groupname TEXT);
         INSERT INTO sis_groups VALUES ('courseX', 'g1', 'Alpha');
         INSERT INTO sis_groups VALUES ('courseX', 'g2', 'Beta');
         CREATE TABLE sis_members (courseidnumber TEXT, groupidnumber TEXT, useridnumber TEXT);
         INSERT INTO sis_members VALUES ('courseX', 'g1', 'u1');
         INSERT INTO sis_members VALUES ('courseX', 'g2', 'u2');",
    )
    .expect("seed remote");
    path
}

fn seed_local(dir: &Path) -> PathBuf {
    let path = dir.join("local.db");
    let store = SqliteLocalStore::open(&path).expect("open local");
    let course = store.insert_course("CX", "courseX").expect("course");
    let instance = store.add_sync_instance(course).expect("instance");
    for (username, idnumber) in [("anna", "u1"), ("bob", "u2")] {
        let user = store.insert_user(username, idnumber).expect("user");
        store.enrol_user(instance, user).expect("enrol");
    }
    path
}

fn init_configured(home: &Path) {
    let remote = seed_remote(home);
    let local = seed_local(home);
    enrolgroup_cmd(home)
        .arg("init")
        .arg("--remote")
        .arg(&remote)
        .arg("--local")
        .arg(&local)
        .args(["--groups-table", "sis_groups", "--members-table", "sis_members"])
        .assert()
        .success();
}

fn group_count(home: &Path) -> i64 {
    let conn = Connection::open(home.join("local.db")).expect("open local");
    conn.query_row(r#"SELECT COUNT(*) FROM "groups""#, [], |row| row.get(0))
        .expect("count groups")
}

#[test]
fn init_refuses_to_overwrite_without_force() {
    let home = TempDir::new().unwrap();

    enrolgroup_cmd(home.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("Group sync is disabled"));
    assert!(home.path().join("config.yaml").exists());

    enrolgroup_cmd(home.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(contains("--force"));

    enrolgroup_cmd(home.path())
        .args(["init", "--force"])
        .assert()
        .success();
}

#[test]
fn config_json_reports_enabled_features() {
    let home = TempDir::new().unwrap();
    init_configured(home.path());

    let output = enrolgroup_cmd(home.path())
        .args(["config", "--json"])
        .output()
        .expect("run enrolgroup config --json");
    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(value["group_sync_enabled"], true);
    assert_eq!(value["membership_sync_enabled"], true);
    assert_eq!(value["sync"]["groups"]["table"], "sis_groups");
    assert_eq!(value["sync"]["remove_groups_action"], "keep");
}

#[test]
fn config_without_file_points_at_init() {
    let home = TempDir::new().unwrap();
    enrolgroup_cmd(home.path())
        .arg("config")
        .assert()
        .failure()
        .stderr(contains("enrolgroup init"));
}

#[test]
fn sync_applies_then_is_idempotent() {
    let home = TempDir::new().unwrap();
    init_configured(home.path());

    enrolgroup_cmd(home.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("Starting group synchronisation..."))
        .stdout(contains(
            "Creating group Alpha in course courseX with idnumber g1",
        ))
        .stdout(contains("Adding anna (u1) to Alpha"))
        .stdout(contains("Group synchronisation finished"))
        .stdout(contains("(started "));
    assert_eq!(group_count(home.path()), 2);

    let output = enrolgroup_cmd(home.path())
        .args(["sync", "--json"])
        .output()
        .expect("run enrolgroup sync --json");
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json report");
    assert_eq!(report["status"]["kind"], "completed");
    assert_eq!(report["mode"], "apply");
    let course = &report["courses"][0];
    assert_eq!(course["groups"]["created"], 0);
    assert_eq!(course["groups"]["unchanged"], 2);
    assert_eq!(course["members"]["added"], 0);
}

#[test]
fn dry_run_writes_nothing() {
    let home = TempDir::new().unwrap();
    init_configured(home.path());

    enrolgroup_cmd(home.path())
        .args(["sync", "--dry-run"])
        .assert()
        .success()
        .stdout(contains("[dry-run] Would create group Beta"))
        .stdout(contains("[dry-run] Would add bob (u2) to Beta"));
    assert_eq!(group_count(home.path()), 0);
}

#[test]
fn course_filter_skips_other_courses() {
    let home = TempDir::new().unwrap();
    init_configured(home.path());

    enrolgroup_cmd(home.path())
        .args(["sync", "--course", "courseZ"])
        .assert()
        .success()
        .stdout(contains("No courses with remote groups matched"));
    assert_eq!(group_count(home.path()), 0);
}

#[test]
fn unconfigured_group_sync_is_skipped() {
    let home = TempDir::new().unwrap();
    seed_local(home.path());
    enrolgroup_cmd(home.path()).arg("init").assert().success();

    enrolgroup_cmd(home.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("Course group synchronisation skipped."));
}

#[test]
fn switched_off_sync_leaves_the_local_database_alone() {
    let home = TempDir::new().unwrap();
    let remote = seed_remote(home.path());
    let local = seed_local(home.path());
    enrolgroup_cmd(home.path())
        .arg("init")
        .arg("--remote")
        .arg(&remote)
        .arg("--local")
        .arg(&local)
        .args(["--groups-table", "sis_groups", "--disabled"])
        .assert()
        .success()
        .stdout(contains("Sync is switched off"));

    enrolgroup_cmd(home.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("Group synchronisation is disabled."));
    assert_eq!(group_count(home.path()), 0);
}

#[test]
fn missing_remote_database_fails_the_command() {
    let home = TempDir::new().unwrap();
    let local = seed_local(home.path());
    enrolgroup_cmd(home.path())
        .arg("init")
        .arg("--remote")
        .arg(home.path().join("absent.db"))
        .arg("--local")
        .arg(&local)
        .args(["--groups-table", "sis_groups"])
        .assert()
        .success();

    enrolgroup_cmd(home.path())
        .arg("sync")
        .assert()
        .failure()
        .stdout(contains(
            "Error while communicating with external enrolment database",
        ))
        .stderr(contains("group synchronisation failed"));
}
