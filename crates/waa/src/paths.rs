//! Path normalization and the content-addressed fan-out.

use std::ffi::OsString;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::path::{Component, Path, PathBuf};

use md5::{Digest, Md5};

/// Which administrative area a path lookup targets.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Area {
    /// The data area (`$FSVC_WAA`): dir-files, checksum caches.
    Waa,
    /// The configuration area (`$FSVC_CONF`): per-wc config, info links.
    Conf,
}

/// Normalizes `path` into an absolute path without `.` components or
/// duplicate separators.
///
/// Relative paths are resolved against `cwd`; `..` is collapsed lexically.
/// The result never carries a trailing separator, which keeps the fan-out
/// digest stable however the user spelled the path.
#[must_use]
pub fn normalize_path(path: &Path, cwd: &Path) -> PathBuf {
    let mut out = if path.is_absolute() {
        PathBuf::from("/")
    } else {
        cwd.to_path_buf()
    };
    for component in path.components() {
        match component {
            Component::RootDir | Component::CurDir | Component::Prefix(_) => {}
            Component::ParentDir => {
                out.pop();
            }
            Component::Normal(name) => out.push(name),
        }
    }
    out
}

/// Strips a configured soft-root prefix so the digest matches the one an
/// un-relocated invocation would compute.
#[must_use]
pub fn strip_softroot(path: &Path, softroot: Option<&Path>) -> PathBuf {
    if let Some(prefix) = softroot {
        if let Ok(rest) = path.strip_prefix(prefix) {
            return PathBuf::from("/").join(rest);
        }
    }
    path.to_path_buf()
}

/// The three fan-out components of a path digest: two 2-hex levels and one
/// 28-hex leaf.
pub(crate) fn fanout_levels(path: &Path) -> (String, String, String) {
    let digest = Md5::digest(path.as_os_str().as_bytes());
    let hex: String = digest.iter().map(|byte| format!("{byte:02x}")).collect();
    (
        hex[0..2].to_string(),
        hex[2..4].to_string(),
        hex[4..32].to_string(),
    )
}

/// Joins the fan-out levels below `root`.
pub(crate) fn fanout_bucket(root: &Path, levels: &(String, String, String)) -> PathBuf {
    root.join(&levels.0).join(&levels.1).join(&levels.2)
}

/// The flattened file stem for temporary names: the fan-out with every
/// separator replaced by `_`, so concurrent writers to different files in
/// the area cannot collide on one shared temp name.
pub(crate) fn flattened_stem(levels: &(String, String, String)) -> String {
    format!("{}_{}_{}", levels.0, levels.1, levels.2)
}

/// Builds an `OsString` path from raw bytes.
pub(crate) fn path_from_bytes(bytes: &[u8]) -> PathBuf {
    PathBuf::from(OsString::from_vec(bytes.to_vec()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalization_is_stable_under_dot_and_slashes() {
        let cwd = Path::new("/somewhere");
        let plain = normalize_path(Path::new("/wc"), cwd);
        assert_eq!(plain, normalize_path(Path::new("/wc/"), cwd));
        assert_eq!(plain, normalize_path(Path::new("/wc//"), cwd));
        assert_eq!(plain, normalize_path(Path::new("/./wc/."), cwd));
        assert_eq!(plain, normalize_path(Path::new("//wc"), cwd));
    }

    #[test]
    fn relative_paths_use_the_cached_cwd() {
        let cwd = Path::new("/base/dir");
        assert_eq!(
            normalize_path(Path::new("sub/file"), cwd),
            PathBuf::from("/base/dir/sub/file")
        );
        assert_eq!(
            normalize_path(Path::new("../peer"), cwd),
            PathBuf::from("/base/peer")
        );
    }

    #[test]
    fn softroot_prefix_is_stripped_before_hashing() {
        let stripped = strip_softroot(Path::new("/mnt/root/wc"), Some(Path::new("/mnt/root")));
        assert_eq!(stripped, PathBuf::from("/wc"));
        assert_eq!(
            fanout_levels(&stripped),
            fanout_levels(Path::new("/wc")),
        );
        // A non-matching prefix leaves the path alone.
        assert_eq!(
            strip_softroot(Path::new("/elsewhere"), Some(Path::new("/mnt/root"))),
            PathBuf::from("/elsewhere")
        );
    }

    #[test]
    fn fanout_splits_the_hex_digest() {
        let (first, second, rest) = fanout_levels(Path::new("/wc"));
        assert_eq!(first.len(), 2);
        assert_eq!(second.len(), 2);
        assert_eq!(rest.len(), 28);
        let bucket = fanout_bucket(Path::new("/tmp/W"), &(first, second, rest));
        assert!(bucket.starts_with("/tmp/W"));
    }
}
