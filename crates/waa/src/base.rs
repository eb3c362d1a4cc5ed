//! Working-copy base discovery.

use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::WaaError;
use crate::paths::{self, path_from_bytes};
use crate::session::Session;

/// Result of [`Session::find_common_base`].
#[derive(Debug)]
pub struct CommonBase {
    /// The discovered working copy root, or the arguments' common prefix
    /// when no registered working copy was found.
    pub base: PathBuf,
    /// The arguments rewritten relative to `base`; an argument equal to
    /// `base` becomes `.`.
    pub normalized: Vec<PathBuf>,
    /// Whether a registered working copy answered the probe.
    pub found: bool,
    /// Whether the single argument was faked from the working directory
    /// because none was given.
    pub faked_arg: bool,
}

impl Session {
    /// Computes the common base of the argument paths and locates the
    /// working copy containing it.
    ///
    /// The arguments are made absolute and normalized; their longest common
    /// prefix is cut back to a component boundary and then walked upward,
    /// probing the WAA for each candidate, until a registered working copy
    /// is found or `/` is reached. On success the process changes into the
    /// base directory, the session caches it as `wc_path`, and the per-wc
    /// configuration is loaded.
    ///
    /// Without any argument the working directory is substituted
    /// (`faked_arg` is set so callers can keep treating the invocation as
    /// argument-less).
    ///
    /// No working copy is not a hard error here: the result carries
    /// `found == false`, the common prefix as base, and the paths
    /// normalized against it, and the caller decides.
    pub fn find_common_base(&mut self, args: &[PathBuf]) -> Result<CommonBase, WaaError> {
        let faked_arg = args.is_empty();
        let absolute: Vec<PathBuf> = if faked_arg {
            vec![self.start_path().to_path_buf()]
        } else {
            args.iter()
                .map(|arg| paths::normalize_path(arg, self.start_path()))
                .collect()
        };

        let first = absolute[0].as_os_str().as_bytes();
        let mut len = first.len();
        for path in &absolute[1..] {
            let bytes = path.as_os_str().as_bytes();
            let mut common = 0;
            while common < len && common < bytes.len() && bytes[common] == first[common] {
                common += 1;
            }
            len = common;
        }

        // Cut back to a component boundary unless the boundary character
        // already is a separator or the end of the first path.
        match first.get(len).copied() {
            Some(b'/') | None => {}
            Some(_) => {
                len = len.saturating_sub(1);
                while len > 0 && first[len] != b'/' {
                    len -= 1;
                }
            }
        }
        if len == 0 {
            // Everything shares only the root.
            len = 1;
        }
        let common_prefix = path_from_bytes(&first[..len]);
        debug!("starting search at {:?}", common_prefix);

        let mut base = common_prefix.clone();
        let mut found = false;
        loop {
            match self.probe(&base) {
                Ok(()) => {
                    found = true;
                    break;
                }
                Err(WaaError::NotFound) => {}
                Err(err) => return Err(err),
            }
            match base.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => base = parent.to_path_buf(),
                _ => break,
            }
        }

        if found {
            std::env::set_current_dir(&base)
                .map_err(|err| WaaError::io("chdir", &base, err))?;
            self.wc_path = Some(base.clone());
            debug!("found working copy base at {:?}", base);
            self.load_wc_config(&base)?;
        } else {
            base = common_prefix;
        }

        let normalized = absolute
            .iter()
            .map(|path| match path.strip_prefix(&base) {
                Ok(rest) if rest.as_os_str().is_empty() => PathBuf::from("."),
                Ok(rest) => rest.to_path_buf(),
                // The base is a prefix of every argument by construction;
                // fall back to the absolute path if not.
                Err(_) => path.clone(),
            })
            .collect();

        Ok(CommonBase {
            base,
            normalized,
            found,
            faked_arg,
        })
    }

    /// Variant of [`Session::find_common_base`] for actions that accept at
    /// most the working copy root as argument.
    ///
    /// A first argument naming the base itself is consumed; any remaining
    /// argument is rejected.
    pub fn find_base(&mut self, args: &[PathBuf]) -> Result<CommonBase, WaaError> {
        let mut common = self.find_common_base(args)?;
        if !common.faked_arg && common.normalized.first().map(PathBuf::as_path)
            == Some(Path::new("."))
        {
            common.normalized.remove(0);
            if !common.normalized.is_empty() {
                return Err(WaaError::NotWcRoot);
            }
        } else if !common.faked_arg && !common.normalized.is_empty() {
            return Err(WaaError::NotWcRoot);
        }
        Ok(common)
    }
}
