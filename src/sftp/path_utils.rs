//! Remote path helpers
//!
//! Remote SFTP paths always use `/` as separator (per SFTP protocol), even
//! when the server runs on Windows.

/// Check if a remote SFTP path is absolute.
pub fn is_absolute_remote_path(path: &str) -> bool {
    path.starts_with('/')
}

/// Join remote SFTP path components using `/` separator.
pub fn join_remote_path(base: &str, component: &str) -> String {
    let component = component.trim_start_matches('/');
    if base.ends_with('/') {
        format!("{}{}", base, component)
    } else {
        format!("{}/{}", base, component)
    }
}

/// Convert local separators in a relative path to the remote convention.
pub fn to_remote_separators(path: &str) -> String {
    path.replace('\\', "/")
}

/// Every directory from the top down to `path` itself, e.g.
/// `/a/b/c` -> `["/a", "/a/b", "/a/b/c"]`.
pub fn remote_ancestors(path: &str) -> Vec<String> {
    let mut current = if is_absolute_remote_path(path) {
        "/".to_string()
    } else {
        String::new()
    };

    path.split('/')
        .filter(|part| !part.is_empty())
        .map(|part| {
            current = if current.is_empty() {
                part.to_string()
            } else {
                join_remote_path(&current, part)
            };
            current.clone()
        })
        .collect()
}
