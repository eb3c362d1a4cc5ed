//! Working-copy base discovery.
//!
//! These tests change the process working directory, so they serialize on
//! one lock.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use waa::{Area, Options, Session, WaaError};

static CWD_LOCK: Mutex<()> = Mutex::new(());

struct Fixture {
    _tmp: tempfile::TempDir,
    root: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        // A previous test may have left the process inside a directory
        // that is gone by now; start from a known-good place.
        std::env::set_current_dir("/").expect("chdir to /");
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().canonicalize().expect("canonicalize");
        fs::create_dir_all(root.join("waa")).expect("waa root");
        fs::create_dir_all(root.join("conf")).expect("conf root");
        Self { _tmp: tmp, root }
    }

    fn session(&self) -> Session {
        Session::new(
            Some(self.root.join("waa")),
            self.root.join("conf"),
            Options::default(),
        )
        .expect("session")
    }

    /// Registers `wc` in the WAA by creating its fan-out bucket.
    fn register(&self, wc: &Path) {
        let session = self.session();
        session
            .storage_dir(wc, Area::Waa, true)
            .expect("create bucket");
    }
}

#[test]
fn base_and_normalized_paths_are_found() {
    let _lock = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let fixture = Fixture::new();
    let wc = fixture.root.join("wc");
    fs::create_dir_all(wc.join("b/c")).expect("create tree");
    fs::create_dir_all(wc.join("a")).expect("create tree");
    fixture.register(&wc);

    let mut session = fixture.session();
    let common = session
        .find_common_base(&[wc.join("b/c"), wc.join("a")])
        .expect("find base");

    assert!(common.found);
    assert_eq!(common.base, wc);
    assert_eq!(
        common.normalized,
        vec![PathBuf::from("b/c"), PathBuf::from("a")]
    );
    assert_eq!(session.wc_path.as_deref(), Some(wc.as_path()));
    // Discovery changed into the base.
    assert_eq!(std::env::current_dir().expect("cwd"), wc);
}

#[test]
fn rediscovery_from_the_base_is_idempotent() {
    let _lock = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let fixture = Fixture::new();
    let wc = fixture.root.join("wc");
    fs::create_dir_all(wc.join("b/c")).expect("create tree");
    fixture.register(&wc);

    let mut session = fixture.session();
    let first = session
        .find_common_base(&[wc.join("b/c"), wc.join("b")])
        .expect("first discovery");
    assert!(first.found);

    // A fresh session starting inside the base, fed the normalized
    // relative paths, must reproduce them.
    let mut second_session = fixture.session();
    let second = second_session
        .find_common_base(&first.normalized)
        .expect("second discovery");
    assert_eq!(second.base, wc);
    assert_eq!(second.normalized, first.normalized);
}

#[test]
fn the_walk_goes_upward_to_the_registered_root() {
    let _lock = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let fixture = Fixture::new();
    let wc = fixture.root.join("wc");
    fs::create_dir_all(wc.join("deep/down/here")).expect("create tree");
    fixture.register(&wc);

    let mut session = fixture.session();
    let common = session
        .find_common_base(&[wc.join("deep/down/here")])
        .expect("find base");
    assert!(common.found);
    assert_eq!(common.base, wc);
    assert_eq!(common.normalized, vec![PathBuf::from("deep/down/here")]);
}

#[test]
fn an_argument_naming_the_base_becomes_dot() {
    let _lock = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let fixture = Fixture::new();
    let wc = fixture.root.join("wc");
    fs::create_dir_all(&wc).expect("create wc");
    fixture.register(&wc);

    let mut session = fixture.session();
    let common = session
        .find_common_base(&[wc.clone(), wc.join("x")])
        .expect("find base");
    assert!(common.found);
    assert_eq!(
        common.normalized,
        vec![PathBuf::from("."), PathBuf::from("x")]
    );
}

#[test]
fn missing_working_copy_reports_the_common_prefix() {
    let _lock = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let fixture = Fixture::new();
    let stray = fixture.root.join("stray");
    fs::create_dir_all(stray.join("one")).expect("create tree");
    fs::create_dir_all(stray.join("two")).expect("create tree");

    let mut session = fixture.session();
    let common = session
        .find_common_base(&[stray.join("one"), stray.join("two")])
        .expect("discovery itself succeeds");
    assert!(!common.found);
    assert_eq!(common.base, stray);
    assert_eq!(
        common.normalized,
        vec![PathBuf::from("one"), PathBuf::from("two")]
    );
    assert!(session.wc_path.is_none());
}

#[test]
fn no_arguments_fake_the_working_directory() {
    let _lock = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let fixture = Fixture::new();
    let wc = fixture.root.join("wc");
    fs::create_dir_all(wc.join("sub")).expect("create tree");
    fixture.register(&wc);

    std::env::set_current_dir(wc.join("sub")).expect("chdir");
    let mut session = fixture.session();
    let common = session.find_common_base(&[]).expect("find base");
    assert!(common.faked_arg);
    assert!(common.found);
    assert_eq!(common.base, wc);
    assert_eq!(common.normalized, vec![PathBuf::from("sub")]);
    // Leave the temp directory before it is removed.
    std::env::set_current_dir("/").expect("chdir away");
}

#[test]
fn find_base_rejects_non_root_arguments() {
    let _lock = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let fixture = Fixture::new();
    let wc = fixture.root.join("wc");
    fs::create_dir_all(wc.join("sub")).expect("create tree");
    fixture.register(&wc);

    let mut session = fixture.session();
    assert!(matches!(
        session.find_base(&[wc.join("sub")]),
        Err(WaaError::NotWcRoot)
    ));

    let mut session = fixture.session();
    let ok = session.find_base(std::slice::from_ref(&wc)).expect("root is fine");
    assert!(ok.found);
    assert!(ok.normalized.is_empty());
}

#[test]
fn wc_config_is_loaded_at_discovery() {
    let _lock = CWD_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let fixture = Fixture::new();
    let wc = fixture.root.join("wc");
    fs::create_dir_all(&wc).expect("create wc");
    fixture.register(&wc);

    // Write the per-wc config into the CONF fan-out.
    let session = fixture.session();
    let conf_bucket = session
        .storage_dir(&wc, Area::Conf, true)
        .expect("conf bucket");
    fs::write(
        conf_bucket.file("config"),
        "# per-wc settings\nchecksum = yes\nrecursive = 0\n",
    )
    .expect("write config");

    let mut session = fixture.session();
    let common = session.find_common_base(std::slice::from_ref(&wc)).expect("find base");
    assert!(common.found);
    assert!(session.options.checksum);
    assert_eq!(session.options.recursive, 0);
}
