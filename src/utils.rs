//! Utility functions for file operations and path manipulation

use crate::config::FileCollisionAction;
use crate::error::{Error, Result};
use crate::types::ItemId;
use std::collections::HashSet;
use std::path::{Path, PathBuf};

/// Maximum number of rename attempts when resolving file collisions
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Characters that are not allowed inside a single path component
const RESERVED: &[char] = &['/', '\\', ':', '*', '?', '"', '<', '>', '|'];

/// Make a metadata value safe to use inside one path component
///
/// Separators and reserved characters become `_`, control characters are
/// dropped, and a value made only of dots is neutralised so it can never
/// form `.` or `..`.
///
/// ```
/// use qobuz_dl::utils::sanitize_component;
///
/// assert_eq!(sanitize_component("AC/DC"), "AC_DC");
/// assert_eq!(sanitize_component(".."), "__");
/// ```
pub fn sanitize_component(value: &str) -> String {
    let cleaned: String = value
        .chars()
        .filter(|c| !c.is_control())
        .map(|c| if RESERVED.contains(&c) { '_' } else { c })
        .collect();
    if !cleaned.is_empty() && cleaned.chars().all(|c| c == '.') {
        return "_".repeat(cleaned.len());
    }
    cleaned
}

/// Where a task should write, given the file collision policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CollisionResolution {
    /// Write to this path (possibly an existing file that will be replaced)
    Write(PathBuf),
    /// The file exists and the policy says to keep it
    KeepExisting,
}

/// Resolve a destination path against files already on disk
///
/// `Overwrite` always writes to `path`; `Skip` keeps an existing file;
/// `Rename` appends ` (1)`, ` (2)`, ... to the stem until a free name is found.
///
/// ```
/// use qobuz_dl::utils::{resolve_collision, CollisionResolution};
/// use qobuz_dl::config::FileCollisionAction;
/// use std::path::Path;
///
/// let path = Path::new("/tmp/does-not-exist/01. Intro.flac");
/// let res = resolve_collision(path, FileCollisionAction::Rename).unwrap();
/// assert_eq!(res, CollisionResolution::Write(path.to_path_buf()));
/// ```
pub fn resolve_collision(path: &Path, action: FileCollisionAction) -> Result<CollisionResolution> {
    if !path.exists() {
        return Ok(CollisionResolution::Write(path.to_path_buf()));
    }
    match action {
        FileCollisionAction::Overwrite => Ok(CollisionResolution::Write(path.to_path_buf())),
        FileCollisionAction::Skip => Ok(CollisionResolution::KeepExisting),
        FileCollisionAction::Rename => {
            let stem = path
                .file_stem()
                .and_then(|s| s.to_str())
                .ok_or_else(|| Error::Other(format!("cannot extract file stem from {}", path.display())))?;
            let extension = path.extension().and_then(|e| e.to_str());
            let parent = path.parent().unwrap_or_else(|| Path::new(""));

            for i in 1..=MAX_RENAME_ATTEMPTS {
                let new_name = match extension {
                    Some(ext) => format!("{stem} ({i}).{ext}"),
                    None => format!("{stem} ({i})"),
                };
                let new_path = parent.join(new_name);
                if !new_path.exists() {
                    return Ok(CollisionResolution::Write(new_path));
                }
            }

            Err(Error::Other(format!(
                "could not find a free filename for {} after {MAX_RENAME_ATTEMPTS} attempts",
                path.display()
            )))
        }
    }
}

/// Temporary path bytes are streamed to before the final rename
///
/// Lives next to the destination so the rename never crosses filesystems.
pub fn part_path(dest: &Path, id: &ItemId) -> PathBuf {
    let mut name = dest
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(format!(".{id}.part"));
    dest.with_file_name(name)
}

/// Expand input sources into a deduplicated URL list
///
/// An entry naming an existing file is read as a list of URLs (one per line,
/// blank lines and `#` comments ignored). Later duplicates are dropped.
pub fn expand_sources(sources: &[String]) -> Result<Vec<String>> {
    let mut urls = Vec::new();
    for source in sources {
        let source = source.trim();
        if source.is_empty() {
            continue;
        }
        let as_path = Path::new(source);
        if as_path.is_file() {
            let text = std::fs::read_to_string(as_path)?;
            let before = urls.len();
            urls.extend(
                text.lines()
                    .map(str::trim)
                    .filter(|l| !l.is_empty() && !l.starts_with('#'))
                    .map(String::from),
            );
            tracing::debug!(
                file = %as_path.display(),
                urls = urls.len() - before,
                "Read URLs from file"
            );
        } else {
            urls.push(source.to_string());
        }
    }

    let mut seen = HashSet::new();
    let total = urls.len();
    urls.retain(|u| seen.insert(u.clone()));
    if urls.len() < total {
        tracing::info!(removed = total - urls.len(), "Removed duplicate input URLs");
    }
    Ok(urls)
}

/// Closest ancestor of `path` that exists on disk
pub fn existing_ancestor(path: &Path) -> PathBuf {
    let mut current = path;
    loop {
        if current.exists() {
            return current.to_path_buf();
        }
        match current.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => current = parent,
            _ => return PathBuf::from("."),
        }
    }
}

/// Get available disk space for a given path
///
/// Returns the number of bytes available to an unprivileged user on the
/// filesystem containing `path`.
pub fn get_available_space(path: &Path) -> std::io::Result<u64> {
    #[cfg(unix)]
    {
        use std::ffi::CString;
        use std::os::unix::ffi::OsStrExt;

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;

        // SAFETY: c_path is a valid NUL-terminated string, stat is zeroed before
        // the call and only read after statvfs reports success.
        unsafe {
            let mut stat: libc::statvfs = std::mem::zeroed();
            if libc::statvfs(c_path.as_ptr(), &mut stat) != 0 {
                return Err(std::io::Error::last_os_error());
            }
            Ok((stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64))
        }
    }

    #[cfg(windows)]
    {
        use std::os::windows::ffi::OsStrExt;
        use winapi::um::fileapi::GetDiskFreeSpaceExW;

        let wide_path: Vec<u16> = path
            .as_os_str()
            .encode_wide()
            .chain(std::iter::once(0))
            .collect();

        // SAFETY: wide_path is NUL-terminated and every out pointer refers to a
        // live, aligned u64; outputs are only read after a successful call.
        unsafe {
            let mut free_bytes_available: u64 = 0;
            let mut total_bytes: u64 = 0;
            let mut total_free_bytes: u64 = 0;

            if GetDiskFreeSpaceExW(
                wide_path.as_ptr(),
                &mut free_bytes_available as *mut u64 as *mut _,
                &mut total_bytes as *mut u64 as *mut _,
                &mut total_free_bytes as *mut u64 as *mut _,
            ) == 0
            {
                return Err(std::io::Error::last_os_error());
            }
            Ok(free_bytes_available)
        }
    }

    #[cfg(not(any(unix, windows)))]
    {
        let _ = path;
        Err(std::io::Error::new(
            std::io::ErrorKind::Unsupported,
            "disk space check not supported on this platform",
        ))
    }
}

/// Fail with `InsufficientSpace` when `dir` has less than `required` bytes free
pub fn ensure_free_space(dir: &Path, required: u64) -> Result<()> {
    let existing = existing_ancestor(dir);
    let available = get_available_space(&existing)
        .map_err(|e| Error::DiskSpaceCheckFailed(format!("{}: {e}", existing.display())))?;
    if available < required {
        return Err(Error::InsufficientSpace {
            required,
            available,
        });
    }
    Ok(())
}
