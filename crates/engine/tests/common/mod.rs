#![allow(dead_code)] // not every test binary uses every helper

//! Shared fixture for the updater tests.
//!
//! Every test drives the engine from inside a scratch working copy, so the
//! process working directory moves around; [`lock`] serializes the tests
//! of one binary.

use std::fs;
use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use actions::{Action, ActionError, ActionSpec};
use engine::{build_tree, NoIgnores, UpdateContext};
use tree::{EntryStat, EntryStatus, Tree};
use waa::{Area, Options, Session, DIR_EXT};

static CWD_LOCK: Mutex<()> = Mutex::new(());

pub fn lock() -> MutexGuard<'static, ()> {
    CWD_LOCK.lock().unwrap_or_else(|err| err.into_inner())
}

/// A status-like action that records every dispatched entry.
pub struct Recorder {
    spec: &'static ActionSpec,
    /// `(path, status)` per dispatch, in dispatch order.
    pub dispatched: Vec<(PathBuf, EntryStatus)>,
}

static PLAIN_SPEC: ActionSpec = ActionSpec {
    names: &["status"],
    help_text: "record dispatched entries",
    ..ActionSpec::DEFAULT
};

static KEEPING_SPEC: ActionSpec = ActionSpec {
    names: &["revert"],
    help_text: "record dispatched entries, keeping children",
    keep_children: true,
    ..ActionSpec::DEFAULT
};

impl Recorder {
    pub fn new() -> Self {
        Self {
            spec: &PLAIN_SPEC,
            dispatched: Vec::new(),
        }
    }

    pub fn keeping_children() -> Self {
        Self {
            spec: &KEEPING_SPEC,
            dispatched: Vec::new(),
        }
    }

    pub fn count_for(&self, path: &str) -> usize {
        self.dispatched
            .iter()
            .filter(|(p, _)| p == Path::new(path))
            .count()
    }

    pub fn status_of(&self, path: &str) -> Option<EntryStatus> {
        self.dispatched
            .iter()
            .find(|(p, _)| p == Path::new(path))
            .map(|(_, status)| *status)
    }
}

impl Action for Recorder {
    fn spec(&self) -> &'static ActionSpec {
        self.spec
    }

    fn local_callback(&mut self, tree: &Tree, entry: tree::EntryId) -> Result<(), ActionError> {
        self.dispatched
            .push((tree.build_path(entry), tree.entry(entry).entry_status));
        Ok(())
    }
}

pub struct Fixture {
    _tmp: tempfile::TempDir,
    pub root: PathBuf,
    pub wc: PathBuf,
}

impl Fixture {
    pub fn new() -> Self {
        std::env::set_current_dir("/").expect("chdir to /");
        let tmp = tempfile::tempdir().expect("tempdir");
        let root = tmp.path().canonicalize().expect("canonicalize");
        let wc = root.join("wc");
        fs::create_dir_all(root.join("waa")).expect("waa root");
        fs::create_dir_all(root.join("conf")).expect("conf root");
        fs::create_dir_all(&wc).expect("wc");
        Self {
            _tmp: tmp,
            root,
            wc,
        }
    }

    pub fn session(&self) -> Session {
        Session::new(
            Some(self.root.join("waa")),
            self.root.join("conf"),
            Options::default(),
        )
        .expect("session")
    }

    pub fn write_file(&self, path: &str, contents: &[u8]) {
        let full = self.wc.join(path);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent).expect("parent dirs");
        }
        let mut file = fs::File::create(&full).expect("create file");
        file.write_all(contents).expect("write file");
    }

    pub fn mkdir(&self, path: &str) {
        fs::create_dir_all(self.wc.join(path)).expect("mkdir");
    }

    /// Forces a visible mtime difference on `path`, independent of the
    /// filesystem's timestamp granularity.
    pub fn bump_mtime(&self, path: &str, seconds: i64) {
        filetime::set_file_mtime(
            self.wc.join(path),
            filetime::FileTime::from_unix_time(seconds, 0),
        )
        .expect("set mtime");
    }

    /// Builds the tree from the live filesystem and persists it as the
    /// working copy's dir-file.
    pub fn build_and_save(&self) {
        std::env::set_current_dir(&self.wc).expect("chdir into wc");
        let mut session = self.session();
        let mut action = Recorder::new();
        let mut ignore = NoIgnores;

        let meta = fs::symlink_metadata(".").expect("lstat wc");
        let mut tree = Tree::with_root(".".into(), EntryStat::from_metadata(&meta));
        {
            let root = tree.entry_mut(Tree::ROOT);
            root.do_full = true;
            root.do_full_child = true;
        }
        {
            let mut ctx = UpdateContext {
                session: &mut session,
                action: &mut action,
                ignore: &mut ignore,
            };
            build_tree(&mut tree, Tree::ROOT, &mut ctx).expect("build tree");
        }
        self.save(&mut session, &mut tree);
    }

    pub fn save(&self, session: &mut Session, tree: &mut Tree) {
        tree.prune_deleted();
        let mut writer = session
            .open_write(&self.wc, Area::Waa, DIR_EXT)
            .expect("open dir-file writer");
        tree::write_tree(tree, &mut writer).expect("serialize");
        writer.commit().expect("commit");
    }

    /// Loads the stored tree and runs a (full or partial) update pass.
    pub fn update(&self, action: &mut Recorder, args: &[&str]) -> Tree {
        std::env::set_current_dir(&self.wc).expect("chdir into wc");
        let mut session = self.session();
        let mut ignore = NoIgnores;
        let mut ctx = UpdateContext {
            session: &mut session,
            action,
            ignore: &mut ignore,
        };
        let normalized: Vec<PathBuf> = if args.is_empty() {
            vec![PathBuf::from(".")]
        } else {
            args.iter().map(PathBuf::from).collect()
        };
        engine::read_or_build_tree(&normalized, &self.wc, false, &mut ctx).expect("update")
    }

    /// Re-reads the stored dir-file.
    pub fn reload(&self) -> (Tree, tree::EntryBlocks, tree::DirFileInfo) {
        let session = self.session();
        let bytes = session
            .read_byext(&self.wc, Area::Waa, DIR_EXT)
            .expect("read dir-file");
        tree::read_tree(&bytes, None).expect("parse dir-file")
    }
}
