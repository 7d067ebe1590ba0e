//! `"<file>:<internal path>"` addressing.

/// Split `file:path`; a missing `:` addresses the file root.
pub fn split_file_path(location: &str) -> (&str, String) {
    match location.rsplit_once(':') {
        Some((file, path)) if !file.is_empty() && !path.contains('\\') => (file, normalize(path)),
        _ => (location, String::new()),
    }
}

/// Internal paths are relative to the root; `""` and `"/"` name the root.
pub fn normalize(path: &str) -> String {
    path.split('/').filter(|p| !p.is_empty()).collect::<Vec<_>>().join("/")
}

pub(crate) fn join(path: &str, name: &str) -> String {
    if path.is_empty() {
        name.to_string()
    } else {
        format!("{path}/{name}")
    }
}

/// `path` as shown in messages.
pub(crate) fn display(path: &str) -> String {
    format!("/{path}")
}
