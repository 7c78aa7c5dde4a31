//! Depth-first traversal of a working tree honoring an ignore predicate
//! (§4.2). Grounded on the teacher's recursive directory walk (originally
//! `fs_tree.rs`/`ui/backup/walk.rs`, which built a `BTreeSet<PathBuf>` of
//! directory entries and recursed), generalized to yield a flat stream of
//! [`FileStat`] instead of building a content tree, and to stat without
//! following symlinks.

use std::fs;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::warn;

use crate::counters::{self, Op};
use crate::ignore::IgnoreMatcher;
use crate::posix::{self, FileStat};

/// Walks `root` depth-first, calling `visit` for every entry that survives
/// the ignore predicate (including `root` itself, first). Entering an
/// ignored directory prunes its subtree entirely; a symlink is never
/// descended even if its target is a directory. Errors reading a single
/// subdirectory are logged and that subtree is skipped; traversal
/// continues.
pub fn walk(root: &Utf8Path, ignore: &IgnoreMatcher, visit: &mut dyn FnMut(FileStat)) {
    let root_stat = match posix::stat_relative(root, root) {
        Ok(s) => s,
        Err(e) => {
            warn!("couldn't stat working root {root}: {e:#}");
            counters::bump(Op::WalkErrorSkipped);
            return;
        }
    };
    visit(root_stat);
    walk_dir(root, root, ignore, visit);
}

fn walk_dir(
    root: &Utf8Path,
    dir: &Utf8Path,
    ignore: &IgnoreMatcher,
    visit: &mut dyn FnMut(FileStat),
) {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            warn!("couldn't read directory {dir}: {e}");
            counters::bump(Op::WalkErrorSkipped);
            return;
        }
    };

    let mut paths: Vec<Utf8PathBuf> = Vec::new();
    for entry in entries {
        match entry {
            Ok(entry) => match Utf8PathBuf::from_path_buf(entry.path()) {
                Ok(p) => paths.push(p),
                Err(p) => warn!("skipping non-UTF-8 path {}", p.display()),
            },
            Err(e) => warn!("error reading an entry of {dir}: {e}"),
        }
    }
    paths.sort();

    for path in paths {
        let relative = path.strip_prefix(root).unwrap_or(&path);
        if ignore.is_ignored(relative) {
            continue;
        }

        let stat = match posix::stat_relative(root, &path) {
            Ok(s) => s,
            Err(e) => {
                warn!("couldn't stat {path}: {e:#}");
                continue;
            }
        };

        let is_dir = stat.is_directory();
        visit(stat);
        if is_dir {
            walk_dir(root, &path, ignore, visit);
        }
    }
}
