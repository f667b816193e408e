//! Entry name normalization and validation.

use crate::{Error, Result};
use std::fmt;
use std::path::{Component, Path, PathBuf};

/// Maximum encoded length of an entry name; the header field is 16 bits.
pub const MAX_NAME_LENGTH: usize = u16::MAX as usize;

/// A normalized ZIP entry name.
///
/// Names use forward slashes, never start with `/`, and contain no `.`,
/// `..` or empty segments. Directory names end with exactly one `/`.
///
/// ```
/// use zipspan::ArchivePath;
///
/// let file = ArchivePath::file("docs\\readme.txt").unwrap();
/// assert_eq!(file.as_str(), "docs/readme.txt");
///
/// let dir = ArchivePath::directory("/empty").unwrap();
/// assert_eq!(dir.as_str(), "empty/");
/// assert!(dir.is_directory());
///
/// assert!(ArchivePath::file("../secret").is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ArchivePath(String);

impl ArchivePath {
    /// Normalizes a file entry name.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidArchivePath`] for empty names, NUL bytes,
    /// `.`/`..`/empty segments, or a trailing slash.
    pub fn file(name: &str) -> Result<Self> {
        let normalized = Self::normalize(name)?;
        if normalized.ends_with('/') {
            return Err(Error::InvalidArchivePath(format!(
                "file name '{}' ends with a slash",
                name
            )));
        }
        Ok(Self(normalized))
    }

    /// Normalizes a directory entry name, appending the trailing slash.
    pub fn directory(name: &str) -> Result<Self> {
        let normalized = Self::normalize(name)?;
        let trimmed = normalized.trim_end_matches('/');
        if trimmed.is_empty() {
            return Err(Error::InvalidArchivePath("empty directory name".into()));
        }
        Ok(Self(format!("{}/", trimmed)))
    }

    /// Builds a name from a relative filesystem path.
    pub fn from_relative_path(path: &Path, is_directory: bool) -> Result<Self> {
        let mut parts = Vec::new();
        for component in path.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_string_lossy().into_owned()),
                Component::CurDir => {}
                _ => {
                    return Err(Error::InvalidArchivePath(format!(
                        "path '{}' is not relative",
                        path.display()
                    )));
                }
            }
        }
        let joined = parts.join("/");
        if is_directory {
            Self::directory(&joined)
        } else {
            Self::file(&joined)
        }
    }

    fn normalize(name: &str) -> Result<String> {
        if name.contains('\0') {
            return Err(Error::InvalidArchivePath("contains NUL byte".into()));
        }

        let unified = name.replace('\\', "/");
        let stripped = unified.trim_start_matches('/');
        let (body, trailing) = match stripped.strip_suffix('/') {
            Some(body) => (body, true),
            None => (stripped, false),
        };

        if body.is_empty() {
            return Err(Error::InvalidArchivePath("empty path".into()));
        }

        for segment in body.split('/') {
            match segment {
                "" => {
                    return Err(Error::InvalidArchivePath(
                        "empty segment (consecutive slashes)".into(),
                    ));
                }
                "." => {
                    return Err(Error::InvalidArchivePath("'.' segment not allowed".into()));
                }
                ".." => {
                    return Err(Error::InvalidArchivePath(
                        "'..' segment not allowed (path traversal)".into(),
                    ));
                }
                _ => {}
            }
        }

        if body.len() + 1 > MAX_NAME_LENGTH {
            return Err(Error::InvalidArchivePath(format!(
                "name exceeds maximum length of {} bytes",
                MAX_NAME_LENGTH
            )));
        }

        Ok(if trailing {
            format!("{}/", body)
        } else {
            body.to_string()
        })
    }

    /// Returns the name as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns `true` for directory names.
    pub fn is_directory(&self) -> bool {
        self.0.ends_with('/')
    }

    /// Consumes the path and returns the inner string.
    pub fn into_string(self) -> String {
        self.0
    }
}

/// Maps an entry name read from an archive onto a path below `root`.
///
/// Rejects absolute names, drive prefixes and `..` segments so extraction
/// can never escape `root`.
pub(crate) fn safe_join(root: &Path, entry_name: &str) -> Result<PathBuf> {
    let unified = entry_name.replace('\\', "/");
    let mut out = root.to_path_buf();
    let traversal = || Error::PathTraversal {
        path: entry_name.to_string(),
    };

    if unified.starts_with('/') {
        return Err(traversal());
    }
    for segment in unified.split('/') {
        match segment {
            "" | "." => {}
            ".." => return Err(traversal()),
            s if s.contains(':') => return Err(traversal()),
            s => out.push(s),
        }
    }
    Ok(out)
}

impl AsRef<str> for ArchivePath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArchivePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
