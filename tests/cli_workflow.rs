//! Binary-level workflow tests: build a list, observe status output.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

struct Setup {
    _tmp: tempfile::TempDir,
    waa: PathBuf,
    conf: PathBuf,
    wc: PathBuf,
}

impl Setup {
    fn new() -> Self {
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().canonicalize().expect("canonicalize");
        let waa = root.join("waa");
        let conf = root.join("conf");
        let wc = root.join("wc");
        fs::create_dir_all(&waa).expect("waa");
        fs::create_dir_all(&conf).expect("conf");
        fs::create_dir_all(&wc).expect("wc");
        Self {
            _tmp: tmp,
            waa,
            conf,
            wc,
        }
    }

    fn fsvc(&self, current_dir: &Path) -> Command {
        let mut command = Command::cargo_bin("fsvc").expect("binary");
        command
            .env("FSVC_WAA", &self.waa)
            .env("FSVC_CONF", &self.conf)
            .env_remove("FSVC_LOG")
            .current_dir(current_dir);
        command
    }
}

#[test]
fn help_lists_the_actions() {
    let setup = Setup::new();
    setup
        .fsvc(&setup.wc)
        .arg("help")
        .assert()
        .success()
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("_build-new-list"));
}

#[test]
fn build_then_status_reports_changes() {
    let setup = Setup::new();
    fs::write(setup.wc.join("watched"), b"contents").expect("file");

    // Register the working copy by building its first entry list.
    setup
        .fsvc(&setup.wc)
        .arg("_build-new-list")
        .assert()
        .success()
        .stdout(predicate::str::contains("watched"));

    // Nothing changed since the build.
    setup
        .fsvc(&setup.wc)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::is_empty());

    // Deleting the file shows up as D, a new file as N. The root's mtime
    // is forced, so the change is visible whatever the clock granularity.
    fs::remove_file(setup.wc.join("watched")).expect("remove");
    fs::write(setup.wc.join("appeared"), b"fresh").expect("file");
    filetime::set_file_mtime(&setup.wc, filetime::FileTime::from_unix_time(1_700_000_111, 0))
        .expect("bump mtime");
    setup
        .fsvc(&setup.wc)
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("D").and(predicate::str::contains("./watched")))
        .stdout(predicate::str::contains("N").and(predicate::str::contains("./appeared")));
}

#[test]
fn status_without_a_working_copy_fails_cleanly() {
    let setup = Setup::new();
    setup
        .fsvc(&setup.wc)
        .arg("status")
        .assert()
        .failure()
        .stderr(predicate::str::contains("working copy"));
}

#[test]
fn info_prints_the_entry_count() {
    let setup = Setup::new();
    fs::write(setup.wc.join("one"), b"1").expect("file");
    fs::create_dir(setup.wc.join("two")).expect("dir");
    fs::write(setup.wc.join("two/three"), b"3").expect("file");

    setup
        .fsvc(&setup.wc)
        .arg("_build-new-list")
        .assert()
        .success();
    setup
        .fsvc(&setup.wc)
        .arg("info")
        .assert()
        .success()
        .stdout(predicate::str::contains("entries:      4"));
}

#[test]
fn status_from_a_subdirectory_finds_the_base() {
    let setup = Setup::new();
    fs::create_dir_all(setup.wc.join("deep/down")).expect("dirs");
    fs::write(setup.wc.join("deep/down/file"), b"x").expect("file");

    setup
        .fsvc(&setup.wc)
        .arg("_build-new-list")
        .assert()
        .success();

    fs::write(setup.wc.join("deep/down/other"), b"y").expect("file");
    filetime::set_file_mtime(
        setup.wc.join("deep/down"),
        filetime::FileTime::from_unix_time(1_700_000_222, 0),
    )
    .expect("bump mtime");
    setup
        .fsvc(&setup.wc.join("deep/down"))
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("./deep/down/other"));
}

#[test]
fn unknown_action_fails_with_usage_error() {
    let setup = Setup::new();
    setup
        .fsvc(&setup.wc)
        .arg("no-such-action")
        .assert()
        .failure()
        .code(2);
}
