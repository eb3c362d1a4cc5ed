//! Ignore obeyance and per-entry dispatch guarantees.

mod common;

use std::ffi::{OsStr, OsString};
use std::fs;
use std::path::PathBuf;

use common::{Fixture, Recorder};
use engine::{build_tree, do_sorted_tree, IgnoreMatcher, UpdateContext};
use tree::{EntryId, EntryStat, Tree};

/// Ignores entries by exact basename.
struct NameIgnores(Vec<OsString>);

impl IgnoreMatcher for NameIgnores {
    fn is_ignored(&mut self, tree: &Tree, entry: EntryId) -> bool {
        self.0.iter().any(|name| tree.entry(entry).name == *name)
    }
}

fn build_with_ignores(fixture: &Fixture, ignored: &[&str]) -> Tree {
    std::env::set_current_dir(&fixture.wc).expect("chdir into wc");
    let mut session = fixture.session();
    let mut action = Recorder::new();
    let mut ignore = NameIgnores(ignored.iter().map(OsString::from).collect());

    let meta = fs::symlink_metadata(".").expect("lstat wc");
    let mut tree = Tree::with_root(".".into(), EntryStat::from_metadata(&meta));
    {
        let root = tree.entry_mut(Tree::ROOT);
        root.do_full = true;
        root.do_full_child = true;
    }
    let mut ctx = UpdateContext {
        session: &mut session,
        action: &mut action,
        ignore: &mut ignore,
    };
    build_tree(&mut tree, Tree::ROOT, &mut ctx).expect("build tree");
    drop(ctx);
    fixture.save(&mut session, &mut tree);
    tree
}

#[test]
fn ignored_entries_are_typed_and_never_persisted() {
    let _lock = common::lock();
    let fixture = Fixture::new();
    fixture.write_file("keep", b"kept");
    fixture.write_file("skipme", b"never versioned");

    let tree = build_with_ignores(&fixture, &["skipme"]);

    // The ignored entry is detached from the tree...
    assert!(tree.find_child(Tree::ROOT, OsStr::new("skipme")).is_none());
    assert_eq!(tree.entry(Tree::ROOT).entry_count, 1);

    // ...and absent from the persisted list.
    let (reloaded, _, info) = fixture.reload();
    assert_eq!(info.entry_count, 2);
    assert!(reloaded.find_child(Tree::ROOT, OsStr::new("keep")).is_some());
    assert!(
        reloaded
            .find_child(Tree::ROOT, OsStr::new("skipme"))
            .is_none()
    );
}

#[test]
fn the_merge_obeys_the_ignore_predicate_too() {
    let _lock = common::lock();
    let fixture = Fixture::new();
    fixture.write_file("keep", b"kept");
    let _ = build_with_ignores(&fixture, &["noise"]);

    // A new, ignorable file appears.
    fixture.write_file("noise", b"chatter");
    fixture.bump_mtime(".", 1_700_000_321);

    std::env::set_current_dir(&fixture.wc).expect("chdir");
    let mut session = fixture.session();
    let mut recorder = Recorder::new();
    let mut ignore = NameIgnores(vec![OsString::from("noise")]);
    let mut ctx = UpdateContext {
        session: &mut session,
        action: &mut recorder,
        ignore: &mut ignore,
    };
    let tree = engine::read_or_build_tree(
        &[PathBuf::from(".")],
        &fixture.wc,
        false,
        &mut ctx,
    )
    .expect("update");

    assert!(tree.find_child(Tree::ROOT, OsStr::new("noise")).is_none());
    assert_eq!(recorder.count_for("./noise"), 0);
}

#[test]
fn unchanged_full_update_dispatches_each_entry_once() {
    let _lock = common::lock();
    let fixture = Fixture::new();
    fixture.write_file("a", b"alpha");
    fixture.write_file("b/c", b"gamma");
    fixture.write_file("b/d/e", b"epsilon");
    fixture.build_and_save();

    let mut recorder = Recorder::new();
    let _tree = fixture.update(&mut recorder, &[]);

    for path in ["./a", "./b", "./b/c", "./b/d", "./b/d/e", "."] {
        assert_eq!(
            recorder.count_for(path),
            1,
            "{path} must be dispatched exactly once"
        );
    }
    assert_eq!(recorder.dispatched.len(), 6);
}

#[test]
fn directories_are_dispatched_after_their_children() {
    let _lock = common::lock();
    let fixture = Fixture::new();
    fixture.write_file("b/c", b"gamma");
    fixture.build_and_save();

    let mut recorder = Recorder::new();
    let _tree = fixture.update(&mut recorder, &[]);

    let order: Vec<&PathBuf> = recorder.dispatched.iter().map(|(p, _)| p).collect();
    let b_at = order
        .iter()
        .position(|p| *p == &PathBuf::from("./b"))
        .expect("b dispatched");
    let c_at = order
        .iter()
        .position(|p| *p == &PathBuf::from("./b/c"))
        .expect("c dispatched");
    let root_at = order
        .iter()
        .position(|p| *p == &PathBuf::from("."))
        .expect("root dispatched");
    assert!(c_at < b_at, "children before their directory");
    assert!(b_at < root_at, "directories before the root");
}

#[test]
fn the_waa_root_is_never_enumerated() {
    let _lock = common::lock();
    let fixture = Fixture::new();
    // Place the WAA *inside* the working copy, as /var/spool would be when
    // versioning /.
    let waa_inside = fixture.wc.join("spool");
    fs::create_dir_all(waa_inside.join("deeper")).expect("populate waa");
    fixture.write_file("real", b"versioned");

    std::env::set_current_dir(&fixture.wc).expect("chdir");
    let mut session = waa::Session::new(
        Some(waa_inside),
        fixture.root.join("conf"),
        waa::Options::default(),
    )
    .expect("session");
    let mut recorder = Recorder::new();
    let mut ignore = engine::NoIgnores;

    let meta = fs::symlink_metadata(".").expect("lstat");
    let mut tree = Tree::with_root(".".into(), EntryStat::from_metadata(&meta));
    {
        let root = tree.entry_mut(Tree::ROOT);
        root.do_full = true;
        root.do_full_child = true;
    }
    let mut ctx = UpdateContext {
        session: &mut session,
        action: &mut recorder,
        ignore: &mut ignore,
    };
    build_tree(&mut tree, Tree::ROOT, &mut ctx).expect("build");

    let spool = tree
        .find_child(Tree::ROOT, OsStr::new("spool"))
        .expect("the WAA dir itself is listed");
    assert!(
        tree.entry(spool).by_inode.is_empty(),
        "but never descended into"
    );
}

#[test]
fn sorted_walk_visits_by_name() {
    let _lock = common::lock();
    let fixture = Fixture::new();
    fixture.write_file("zebra", b"z");
    fixture.write_file("apple", b"a");
    fixture.write_file("mid/inner", b"m");
    fixture.build_and_save();

    let mut recorder = Recorder::new();
    let mut tree = fixture.update(&mut recorder, &[]);

    let mut visited = Vec::new();
    do_sorted_tree(&mut tree, Tree::ROOT, &mut |tree, id| {
        visited.push(tree.build_path(id));
        Ok(())
    })
    .expect("walk");

    assert_eq!(
        visited,
        vec![
            PathBuf::from("./apple"),
            PathBuf::from("./mid"),
            PathBuf::from("./mid/inner"),
            PathBuf::from("./zebra"),
        ]
    );
}

#[test]
fn unversionable_kinds_do_not_reach_the_dir_file() {
    use std::os::unix::ffi::OsStrExt;

    let _lock = common::lock();
    let fixture = Fixture::new();
    fixture.write_file("normal", b"data");
    // A fifo is not a versionable kind; the mode mapping parks it on
    // EntryType::Ignored and discovery leaves it detached.
    let fifo = fixture.wc.join("pipe");
    let c_path = std::ffi::CString::new(fifo.as_os_str().as_bytes()).expect("cstring");
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o644) };
    assert_eq!(rc, 0, "mkfifo");

    let tree = build_with_ignores(&fixture, &[]);
    assert!(tree.find_child(Tree::ROOT, OsStr::new("pipe")).is_none());

    let (reloaded, _, info) = fixture.reload();
    assert_eq!(info.entry_count, 2, "root and the regular file only");
    assert!(
        reloaded
            .find_child(Tree::ROOT, OsStr::new("normal"))
            .is_some()
    );
}
