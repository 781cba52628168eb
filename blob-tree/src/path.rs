//! Key arithmetic for the pseudo-directory tree.
//!
//! Blob stores are flat; directories only exist as `/`-separated segments in
//! keys. Everything here is pure string work so the client can stay focused
//! on moving bytes.

use std::fmt;
use std::path::Path;

/// Hierarchy separator inside blob keys
pub const SEPARATOR: char = '/';

/// A position in the blob tree, tagged as file or directory.
///
/// Converting from a string uses the trailing-slash convention: the empty
/// string and anything ending in `/` is a directory, everything else is a
/// file key. Build the variants directly when the convention is not enough.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum BlobPath {
    File(String),
    Dir(String),
}

impl BlobPath {
    /// A file key
    pub fn file<S: Into<String>>(key: S) -> Self {
        Self::File(key.into())
    }

    /// A directory path, with or without trailing separator
    pub fn dir<S: Into<String>>(path: S) -> Self {
        Self::Dir(path.into())
    }

    /// The container root
    pub fn root() -> Self {
        Self::Dir(String::new())
    }

    /// The raw path as given
    pub fn as_str(&self) -> &str {
        match self {
            Self::File(key) => key,
            Self::Dir(path) => path,
        }
    }

    /// Whether this path is tagged as a directory
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Dir(_))
    }

    /// The listing prefix this path covers (always the directory form)
    pub fn prefix(&self) -> String {
        dir_prefix(self.as_str())
    }

    /// Last segment, used to name the local directory on download
    pub fn name(&self) -> &str {
        basename(self.as_str())
    }
}

impl From<&str> for BlobPath {
    fn from(value: &str) -> Self {
        if value.is_empty() || value.ends_with(SEPARATOR) {
            Self::Dir(value.to_string())
        } else {
            Self::File(value.to_string())
        }
    }
}

impl From<String> for BlobPath {
    fn from(value: String) -> Self {
        Self::from(value.as_str())
    }
}

impl fmt::Display for BlobPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalize a path into a listing prefix: root stays empty, anything else
/// ends with exactly one separator.
pub fn dir_prefix(path: &str) -> String {
    let path = collapse_separators(path);
    let trimmed = path.trim_start_matches(SEPARATOR);
    if trimmed.is_empty() {
        return String::new();
    }
    if trimmed.ends_with(SEPARATOR) {
        trimmed.to_string()
    } else {
        format!("{}{}", trimmed, SEPARATOR)
    }
}

/// Join a directory path and a relative path into a key
pub fn join(dir: &str, relative: &str) -> String {
    normalize_key(&format!("{}{}{}", dir, SEPARATOR, relative))
}

/// Canonical form of a single key: no doubled or leading separators
pub fn normalize_key(key: &str) -> String {
    collapse_separators(key).trim_start_matches(SEPARATOR).to_string()
}

/// Collapse runs of `/` into a single separator
pub fn collapse_separators(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut previous_was_sep = false;
    for c in path.chars() {
        if c == SEPARATOR {
            if !previous_was_sep {
                out.push(c);
            }
            previous_was_sep = true;
        } else {
            out.push(c);
            previous_was_sep = false;
        }
    }
    out
}

/// Strip `prefix` from `key`, yielding the key relative to it
pub fn relative_to<'a>(key: &'a str, prefix: &str) -> Option<&'a str> {
    key.strip_prefix(prefix)
        .map(|rest| rest.trim_start_matches(SEPARATOR))
        .filter(|rest| !rest.is_empty())
}

/// Last segment of a key, ignoring trailing separators
pub fn basename(path: &str) -> &str {
    let trimmed = path.trim_end_matches(SEPARATOR);
    match trimmed.rfind(SEPARATOR) {
        Some(idx) => &trimmed[idx + 1..],
        None => trimmed,
    }
}

/// Directory component of a relative key; empty for top-level entries
pub fn parent(relative: &str) -> &str {
    match relative.rfind(SEPARATOR) {
        Some(idx) => &relative[..idx],
        None => "",
    }
}

/// Every ancestor directory of `dir`, shallowest first: `a/b/c` yields
/// `a`, `a/b`, `a/b/c`.
pub fn ancestors(dir: &str) -> impl Iterator<Item = &str> {
    dir.match_indices(SEPARATOR)
        .map(move |(idx, _)| &dir[..idx])
        .chain(std::iter::once(dir))
        .filter(|d| !d.is_empty())
}

/// Render a relative local path as a blob key fragment
pub fn key_from_local(relative: &Path) -> String {
    relative
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blob_path_from_str_uses_trailing_slash() {
        assert_eq!(BlobPath::from(""), BlobPath::root());
        assert_eq!(BlobPath::from("phb/"), BlobPath::dir("phb/"));
        assert_eq!(BlobPath::from("phb/0001.png"), BlobPath::file("phb/0001.png"));
        assert!(BlobPath::from("phb/").is_dir());
    }

    #[test]
    fn test_dir_prefix() {
        assert_eq!(dir_prefix(""), "");
        assert_eq!(dir_prefix("/"), "");
        assert_eq!(dir_prefix("phb"), "phb/");
        assert_eq!(dir_prefix("phb/"), "phb/");
        assert_eq!(dir_prefix("albums//phb"), "albums/phb/");
    }

    #[test]
    fn test_join_collapses_doubled_separators() {
        assert_eq!(join("", "phb/0001.png"), "phb/0001.png");
        assert_eq!(join("backup/", "phb/0001.png"), "backup/phb/0001.png");
        assert_eq!(join("backup", "/phb//0001.png"), "backup/phb/0001.png");
    }

    #[test]
    fn test_normalize_key_strips_leading_separators() {
        assert_eq!(normalize_key("/phb//0001.png"), "phb/0001.png");
        assert_eq!(normalize_key("phb/0001.png"), "phb/0001.png");
        assert_eq!(normalize_key("//"), "");
    }

    #[test]
    fn test_relative_to() {
        assert_eq!(relative_to("phb/0001.png", "phb/"), Some("0001.png"));
        assert_eq!(relative_to("phb/0001.png", ""), Some("phb/0001.png"));
        assert_eq!(relative_to("dmg/0001.png", "phb/"), None);
        assert_eq!(relative_to("phb/", "phb/"), None);
    }

    #[test]
    fn test_basename_and_parent() {
        assert_eq!(basename("albums/phb/"), "phb");
        assert_eq!(basename("albums/phb/0001.png"), "0001.png");
        assert_eq!(basename("phb"), "phb");
        assert_eq!(basename(""), "");
        assert_eq!(parent("a/b/c.png"), "a/b");
        assert_eq!(parent("c.png"), "");
    }

    #[test]
    fn test_ancestors_shallowest_first() {
        assert_eq!(ancestors("a/b/c").collect::<Vec<_>>(), vec!["a", "a/b", "a/b/c"]);
        assert_eq!(ancestors("a").collect::<Vec<_>>(), vec!["a"]);
        assert_eq!(ancestors("").count(), 0);
    }

    #[test]
    fn test_key_from_local() {
        let rel = Path::new("dmg").join("dmg_bottom").join("0001.png");
        assert_eq!(key_from_local(&rel), "dmg/dmg_bottom/0001.png");
    }
}
