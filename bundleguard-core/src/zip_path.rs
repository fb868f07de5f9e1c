//! Helpers for `/`-separated paths inside the archive.

/// Directory holding typed resource files inside every module.
pub const RESOURCES_DIRECTORY: &str = "res";
/// Directory holding native libraries inside every module.
pub const LIB_DIRECTORY: &str = "lib";
/// Top-level archive directory holding bundle metadata files.
pub const METADATA_DIRECTORY: &str = "BUNDLE-METADATA";

/// Parent directory of `path`, or `None` for a top-level name.
pub fn parent(path: &str) -> Option<&str> {
    path.rfind('/').map(|idx| &path[..idx])
}

/// Last path component.
pub fn file_name(path: &str) -> &str {
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Suffix kept when a file is renamed: everything from the first dot of the
/// file name, so `icon.9.png` keeps `.9.png`.
///
/// A name without any dot is returned unchanged.
pub fn file_suffix(path: &str) -> &str {
    let name = file_name(path);
    match name.find('.') {
        Some(idx) => &name[idx..],
        None => name,
    }
}

/// Part of the file name before the first dot.
pub fn file_prefix(path: &str) -> &str {
    let name = file_name(path);
    match name.find('.') {
        Some(idx) => &name[..idx],
        None => name,
    }
}

/// Component-wise prefix test, so `resources/x` is not under `res`.
pub fn starts_with(path: &str, dir: &str) -> bool {
    path == dir || (path.starts_with(dir) && path.as_bytes().get(dir.len()) == Some(&b'/'))
}

/// Joins with `/`, treating an empty `dir` as the root.
pub fn join(dir: &str, name: &str) -> String {
    if dir.is_empty() {
        name.to_string()
    } else {
        format!("{}/{}", dir, name)
    }
}
