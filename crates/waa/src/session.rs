//! Per-invocation session state.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::cwd::save_cwd;
use crate::error::WaaError;
use crate::paths::{self, Area};
use crate::store::StorageDir;

/// Environment variable naming the WAA root.
pub const WAA_ENV: &str = "FSVC_WAA";
/// Environment variable naming the configuration root.
pub const CONF_ENV: &str = "FSVC_CONF";

const WAA_DEFAULT: &str = "/var/spool/fsvc";
const CONF_DEFAULT: &str = "/etc/fsvc";

/// Per-run options the core consults.
#[derive(Clone, Debug)]
pub struct Options {
    /// Recursion behaviour: positive descends into new directories, zero
    /// stays flat, negative disables directory updates entirely.
    pub recursive: i32,
    /// Re-examine contents even when the stat data looks unchanged.
    pub checksum: bool,
    /// Only compute and report status bits; never run directory updates.
    pub only_check_status: bool,
    /// Path prefix stripped before hashing, for chroot-relocated setups.
    pub softroot: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            recursive: 1,
            checksum: false,
            only_check_status: false,
            softroot: None,
        }
    }
}

/// State of one fsvc invocation.
///
/// The session owns the area roots, the cached stat of the WAA root, the
/// working directory at startup, and the per-run [`Options`]. It is created
/// once by `init` and threaded through all calls; the whole core is
/// single-threaded by design.
#[derive(Debug)]
pub struct Session {
    waa_root: Option<PathBuf>,
    conf_root: PathBuf,
    waa_stat: Option<(u64, u64)>,
    start_path: PathBuf,
    /// Root of the discovered working copy, set by base discovery.
    pub wc_path: Option<PathBuf>,
    /// Per-run options.
    pub options: Options,
    /// Number of entries the last load or save saw; used for progress
    /// reporting.
    pub approx_entry_count: u64,
}

impl Session {
    /// Initializes a session from the environment.
    ///
    /// Import/export style operations run without the WAA root (they must
    /// work from read-only media); the configuration root is required
    /// always.
    pub fn from_env(is_import_export: bool, options: Options) -> Result<Self, WaaError> {
        let conf_root = env_root(CONF_ENV, CONF_DEFAULT)?;
        let waa_root = if is_import_export {
            None
        } else {
            Some(env_root(WAA_ENV, WAA_DEFAULT)?)
        };
        Self::new(waa_root, conf_root, options)
    }

    /// Initializes a session with explicit area roots.
    pub fn new(
        waa_root: Option<PathBuf>,
        conf_root: PathBuf,
        options: Options,
    ) -> Result<Self, WaaError> {
        if conf_root.as_os_str().len() < 3 {
            return Err(WaaError::BadEnvironment { var: CONF_ENV });
        }
        let waa_stat = match &waa_root {
            None => None,
            Some(root) => {
                if root.as_os_str().len() < 3 {
                    return Err(WaaError::BadEnvironment { var: WAA_ENV });
                }
                let meta = fs::symlink_metadata(root).map_err(|err| WaaError::WaaRootMissing {
                    path: root.clone(),
                    source: err,
                })?;
                use std::os::unix::fs::MetadataExt;
                debug!("got the WAA as inode {}", meta.ino());
                Some((meta.dev(), meta.ino()))
            }
        };
        Ok(Self {
            waa_root,
            conf_root,
            waa_stat,
            start_path: save_cwd()?,
            wc_path: None,
            options,
            approx_entry_count: 0,
        })
    }

    /// The configured WAA root, if this session has one.
    #[must_use]
    pub fn waa_root(&self) -> Option<&Path> {
        self.waa_root.as_deref()
    }

    /// The configuration root.
    #[must_use]
    pub fn conf_root(&self) -> &Path {
        &self.conf_root
    }

    /// Device and inode of the WAA root, for self-exclusion during
    /// enumeration.
    #[must_use]
    pub const fn waa_stat(&self) -> Option<(u64, u64)> {
        self.waa_stat
    }

    /// The working directory the process started in.
    #[must_use]
    pub fn start_path(&self) -> &Path {
        &self.start_path
    }

    /// Resolves the storage directory for `path` in `area`.
    ///
    /// The path is made absolute against the cached start directory,
    /// normalized, stripped of the soft-root prefix, and hashed into the
    /// three-level fan-out. With `mkdir` the directory chain is created so
    /// files can be written right away.
    pub fn storage_dir(
        &self,
        path: &Path,
        area: Area,
        mkdir: bool,
    ) -> Result<StorageDir, WaaError> {
        let root = match area {
            Area::Waa => self.waa_root.as_deref().ok_or(WaaError::NoWaaRoot)?,
            Area::Conf => self.conf_root.as_path(),
        };
        let absolute = paths::normalize_path(path, &self.start_path);
        let hashed = paths::strip_softroot(&absolute, self.options.softroot.as_deref());
        let levels = paths::fanout_levels(&hashed);
        let bucket = paths::fanout_bucket(root, &levels);
        debug!("storage for {:?} is {:?}", hashed, bucket);
        if mkdir {
            fs::create_dir_all(&bucket).map_err(|err| WaaError::io("mkdir", &bucket, err))?;
        }
        Ok(StorageDir::new(
            root.to_path_buf(),
            bucket,
            paths::flattened_stem(&levels),
        ))
    }

    /// Loads the per-working-copy configuration file from the CONF area.
    ///
    /// Missing files are fine; unknown keys are reported and skipped.
    pub fn load_wc_config(&mut self, base: &Path) -> Result<(), WaaError> {
        let storage = self.storage_dir(base, Area::Conf, false)?;
        let path = storage.file("config");
        let text = match fs::read_to_string(&path) {
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(err) => return Err(WaaError::io("read", &path, err)),
            Ok(text) => text,
        };
        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                tracing::warn!("ignoring malformed config line '{line}'");
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            match key {
                "recursive" => {
                    if let Ok(depth) = value.parse() {
                        self.options.recursive = depth;
                    }
                }
                "checksum" => {
                    self.options.checksum = matches!(value, "1" | "true" | "yes");
                }
                _ => tracing::warn!("ignoring unknown config key '{key}'"),
            }
        }
        Ok(())
    }
}

fn env_root(var: &'static str, default: &str) -> Result<PathBuf, WaaError> {
    let value = std::env::var_os(var).unwrap_or_else(|| default.into());
    if value.len() < 3 {
        return Err(WaaError::BadEnvironment { var });
    }
    Ok(PathBuf::from(value))
}
