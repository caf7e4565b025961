//! Lexical path helpers
//!
//! Mount planning works on paths that may not exist on this host yet
//! (or ever, for historical revisions), so nothing here touches the
//! filesystem.

use std::path::{Component, Path, PathBuf};

/// Resolve `.` and `..` components without consulting the filesystem.
///
/// `..` above the root is dropped, like the kernel does for `/..`.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                let popped = matches!(
                    out.components().next_back(),
                    Some(Component::Normal(_))
                ) && out.pop();
                if !popped && !out.has_root() {
                    out.push("..");
                }
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

/// Join `relative` onto `base` and normalize; absolute `relative` wins.
pub fn resolve(base: &Path, relative: &Path) -> PathBuf {
    normalize(&base.join(relative))
}

/// Make `path` absolute against `cwd` when it is relative
pub fn absolutize(path: &Path, cwd: &Path) -> PathBuf {
    if path.is_absolute() {
        normalize(path)
    } else {
        resolve(cwd, path)
    }
}

/// `path` relative to `base`, using forward slashes; empty when equal.
///
/// Returns `None` when `path` is not under `base`.
pub fn relative_slash(path: &Path, base: &Path) -> Option<String> {
    let rest = path.strip_prefix(base).ok()?;
    let parts: Vec<String> = rest
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect();
    Some(parts.join("/"))
}
