//! One-line record codec of the dir-file body.
//!
//! Each record is twelve space-separated decimal fields, one space, the
//! entry name, a NUL, and a newline:
//!
//! ```text
//! ino dev mode size mtime nlink uid gid flags parent_idx entry_count repos_rev name\0\n
//! ```
//!
//! The name comes last and is NUL-terminated, so it may contain spaces;
//! `parent_idx` is the 1-based dir-file position of the owning directory,
//! with 0 reserved for the root record.

use std::ffi::OsString;
use std::io::{self, Write};
use std::os::unix::ffi::{OsStrExt, OsStringExt};

use crate::entry::{Entry, EntryStat};
use crate::error::TreeError;

/// A parsed dir-file record, before it becomes an [`Entry`].
#[derive(Debug)]
pub(crate) struct RawRecord {
    pub stat: EntryStat,
    pub flags: u32,
    pub parent_idx: u32,
    pub entry_count: u32,
    pub repos_rev: u64,
    pub name: OsString,
}

/// Writes one entry as a dir-file record.
pub(crate) fn save_entry<W: Write>(
    out: &mut W,
    entry: &Entry,
    parent_idx: u32,
    entry_count: u32,
) -> io::Result<()> {
    let stat = &entry.stat;
    write!(
        out,
        "{} {} {} {} {} {} {} {} {} {} {} {} ",
        stat.ino,
        stat.dev,
        stat.mode,
        stat.size,
        stat.mtime,
        stat.nlink,
        stat.uid,
        stat.gid,
        entry.flags.bits(),
        parent_idx,
        entry_count,
        entry.repos_rev,
    )?;
    out.write_all(entry.name.as_bytes())?;
    out.write_all(b"\0\n")
}

const FIELD_COUNT: usize = 12;

/// Parses the record starting at `*pos`, advancing `*pos` past it.
pub(crate) fn load_entry(buf: &[u8], pos: &mut usize) -> Result<RawRecord, TreeError> {
    let rest = &buf[*pos..];
    let nul = rest
        .iter()
        .position(|&byte| byte == 0)
        .ok_or(TreeError::Damaged {
            detail: "an entry line is not terminated",
        })?;
    if rest.get(nul + 1) != Some(&b'\n') {
        return Err(TreeError::Damaged {
            detail: "an entry line is not terminated",
        });
    }
    let line = &rest[..nul];
    *pos += nul + 2;

    let mut fields = line.splitn(FIELD_COUNT + 1, |&byte| byte == b' ');
    let mut next = || {
        fields.next().ok_or(TreeError::Damaged {
            detail: "an entry line has too few fields",
        })
    };

    let stat = EntryStat {
        ino: parse_u64(next()?)?,
        dev: parse_u64(next()?)?,
        mode: parse_u64(next()?)? as u32,
        size: parse_u64(next()?)?,
        mtime: parse_i64(next()?)?,
        nlink: parse_u64(next()?)?,
        uid: parse_u64(next()?)? as u32,
        gid: parse_u64(next()?)? as u32,
    };
    let flags = parse_u64(next()?)? as u32;
    let parent_idx = parse_u64(next()?)? as u32;
    let entry_count = parse_u64(next()?)? as u32;
    let repos_rev = parse_u64(next()?)?;
    let name = next()?;
    if name.is_empty() {
        return Err(TreeError::Damaged {
            detail: "an entry line has an empty name",
        });
    }

    Ok(RawRecord {
        stat,
        flags,
        parent_idx,
        entry_count,
        repos_rev,
        name: OsString::from_vec(name.to_vec()),
    })
}

fn parse_u64(field: &[u8]) -> Result<u64, TreeError> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(TreeError::Damaged {
            detail: "an entry line has a malformed field",
        })
}

fn parse_i64(field: &[u8]) -> Result<i64, TreeError> {
    std::str::from_utf8(field)
        .ok()
        .and_then(|text| text.parse().ok())
        .ok_or(TreeError::Damaged {
            detail: "an entry line has a malformed field",
        })
}
