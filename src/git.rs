//! Git repository inspection
//!
//! Historical builds need the real `.git` store, which for a submodule is
//! not where the working tree is: the submodule's `.git` is a one-line
//! file pointing into the superproject's `.git/modules/...`. This module
//! follows that pointer, works out which directory actually has to be
//! mounted, fetches missing history, and creates throwaway worktrees for
//! host-side builds.

use crate::error::{CwbuildError, CwbuildResult};
use crate::paths;
use std::path::{Path, PathBuf, MAIN_SEPARATOR};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

const GITDIR_PREFIX: &str = "gitdir:";

/// Where the git data for a directory lives
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GitLocation {
    /// The `.git` directory (after following a submodule pointer)
    pub path: PathBuf,
    /// Whether a usable `.git` store was found
    pub present: bool,
    /// Whether `.git` was a `gitdir:` pointer file
    pub is_submodule: bool,
    /// Repository root that contains `path`
    pub root_repo: PathBuf,
    /// Submodule name under `.git/modules`, empty otherwise.
    ///
    /// Git keeps the name when a submodule is moved, so this is not
    /// necessarily where the checkout lives; see `checkout`.
    pub submodule_dir: String,
    /// Directory holding the `.git` entry
    pub checkout: PathBuf,
}

impl GitLocation {
    /// Inspect `<base>/.git`.
    ///
    /// A missing or unrecognized `.git` yields `present == false` rather than
    /// an error; only I/O failures while reading an existing entry fail.
    pub fn resolve(base: &Path) -> CwbuildResult<Self> {
        let dot_git = base.join(".git");

        if dot_git.is_dir() {
            debug!("Found .git directory at {}", dot_git.display());
            return Ok(Self::from_git_dir(dot_git, false, base));
        }

        if dot_git.is_file() {
            let content = std::fs::read_to_string(&dot_git).map_err(|e| {
                CwbuildError::io(format!("reading {}", dot_git.display()), e)
            })?;
            return match content.trim().strip_prefix(GITDIR_PREFIX) {
                Some(pointer) => {
                    let git_dir = paths::resolve(base, Path::new(pointer.trim()));
                    debug!(
                        "{} is a submodule, git dir at {}",
                        base.display(),
                        git_dir.display()
                    );
                    Ok(Self::from_git_dir(git_dir, true, base))
                }
                None => {
                    warn!(
                        "Unrecognized .git file format at {}, historical builds unavailable",
                        dot_git.display()
                    );
                    Ok(Self::absent(base))
                }
            };
        }

        debug!("No .git at {}", base.display());
        Ok(Self::absent(base))
    }

    /// Resolve `start`, then each ancestor, returning the first location
    /// where a `.git` entry exists.
    pub fn discover(start: &Path) -> CwbuildResult<Self> {
        for dir in start.ancestors() {
            if dir.join(".git").exists() {
                return Self::resolve(dir);
            }
        }
        Ok(Self::absent(start))
    }

    /// Fail with `GitDirNotFound` unless a `.git` store was found
    pub fn require_present(self, for_path: &Path) -> CwbuildResult<Self> {
        if self.present {
            Ok(self)
        } else {
            Err(CwbuildError::GitDirNotFound(for_path.to_path_buf()))
        }
    }

    /// The checkout whose `.git` this is, where git commands run
    pub fn work_tree(&self) -> &Path {
        &self.checkout
    }

    fn from_git_dir(path: PathBuf, is_submodule: bool, checkout: &Path) -> Self {
        let (root_repo, suffix) = split_git_path(&path);
        let submodule_dir = if is_submodule {
            strip_modules_segments(&suffix)
        } else {
            String::new()
        };
        Self {
            path,
            present: true,
            is_submodule,
            root_repo,
            submodule_dir,
            checkout: checkout.to_path_buf(),
        }
    }

    fn absent(base: &Path) -> Self {
        Self {
            path: base.join(".git"),
            present: false,
            is_submodule: false,
            root_repo: base.to_path_buf(),
            submodule_dir: String::new(),
            checkout: base.to_path_buf(),
        }
    }
}

/// Split at the first `<sep>.git<sep>` (or a trailing `<sep>.git`):
/// everything before is the repository root, everything after is returned
/// as the captured suffix.
fn split_git_path(path: &Path) -> (PathBuf, String) {
    let text = path.to_string_lossy();
    let inner = format!("{sep}.git{sep}", sep = MAIN_SEPARATOR);
    let trailing = format!("{}.git", MAIN_SEPARATOR);

    if let Some(at) = text.find(&inner) {
        let root = &text[..at];
        let suffix = text[at + inner.len()..].trim_end_matches(MAIN_SEPARATOR);
        (PathBuf::from(root), suffix.replace(MAIN_SEPARATOR, "/"))
    } else if let Some(root) = text.strip_suffix(&trailing) {
        (PathBuf::from(root), String::new())
    } else {
        (path.to_path_buf(), String::new())
    }
}

/// `modules/contracts/kv` -> `contracts/kv`, `modules/a/modules/b` -> `a/b`
fn strip_modules_segments(suffix: &str) -> String {
    suffix
        .strip_prefix("modules/")
        .unwrap_or(suffix)
        .replace("/modules/", "/")
}

/// Run `git -C <dir> <args>` and return stdout
async fn git(dir: &Path, args: &[&str]) -> CwbuildResult<String> {
    debug!("Executing: git -C {} {:?}", dir.display(), args);

    let output = Command::new("git")
        .arg("-C")
        .arg(dir)
        .args(args)
        .env("GIT_TERMINAL_PROMPT", "0")
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .output()
        .await
        .map_err(|e| CwbuildError::command_failed(format!("git {}", args.join(" ")), e))?;

    if output.status.success() {
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    } else {
        Err(CwbuildError::command_exec(
            format!("git {}", args.join(" ")),
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ))
    }
}

/// `git fetch <remote>` in `dir`. Callers treat failure as a warning.
pub async fn fetch(dir: &Path, remote: &str) -> CwbuildResult<()> {
    git(dir, &["fetch", remote])
        .await
        .map(|_| ())
        .map_err(|e| CwbuildError::FetchFailed {
            remote: remote.to_string(),
            reason: e.to_string(),
        })
}

/// A detached checkout of one revision in a temporary directory
#[derive(Debug)]
pub struct Worktree {
    repo_dir: PathBuf,
    path: PathBuf,
    _temp: TempDir,
}

impl Worktree {
    /// `git worktree add --detach` of `revision`, using the repository
    /// that owns `repo_dir`
    pub async fn add(repo_dir: &Path, revision: &str) -> CwbuildResult<Self> {
        let temp = tempfile::Builder::new()
            .prefix("cwbuild-worktree-")
            .tempdir()
            .map_err(|e| CwbuildError::io("creating worktree directory", e))?;
        let path = temp.path().join("checkout");
        let path_str = path.to_string_lossy().into_owned();

        git(repo_dir, &["worktree", "add", "--detach", &path_str, revision]).await?;
        debug!("Checked out {} into {}", revision, path.display());

        Ok(Self {
            repo_dir: repo_dir.to_path_buf(),
            path,
            _temp: temp,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Unregister the worktree; the directory goes away with the temp dir
    pub async fn remove(self) {
        let path_str = self.path.to_string_lossy().into_owned();
        if let Err(e) = git(&self.repo_dir, &["worktree", "remove", "--force", &path_str]).await {
            warn!("Failed to remove worktree {}: {}", path_str, e);
            if let Err(e) = git(&self.repo_dir, &["worktree", "prune"]).await {
                warn!("git worktree prune failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn resolve_plain_repository() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();

        let loc = GitLocation::resolve(dir.path()).unwrap();
        assert!(loc.present);
        assert!(!loc.is_submodule);
        assert_eq!(loc.path, dir.path().join(".git"));
        assert_eq!(loc.root_repo, dir.path());
        assert_eq!(loc.submodule_dir, "");
    }

    #[test]
    fn resolve_submodule_pointer() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("kv");
        fs::create_dir_all(&sub).unwrap();
        fs::create_dir_all(dir.path().join(".git/modules/contracts/kv")).unwrap();
        fs::write(sub.join(".git"), "gitdir: ../.git/modules/contracts/kv\n").unwrap();

        let loc = GitLocation::resolve(&sub).unwrap();
        assert!(loc.present);
        assert!(loc.is_submodule);
        assert_eq!(loc.submodule_dir, "contracts/kv");
        assert_eq!(loc.root_repo, dir.path());
        assert_eq!(loc.path, dir.path().join(".git/modules/contracts/kv"));
        assert_eq!(loc.work_tree(), sub);
    }

    #[test]
    fn moved_submodule_keeps_its_checkout() {
        // `git mv` leaves the module name behind
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("contracts/kv");
        fs::create_dir_all(&sub).unwrap();
        fs::create_dir_all(dir.path().join(".git/modules/old-name")).unwrap();
        fs::write(sub.join(".git"), "gitdir: ../../.git/modules/old-name\n").unwrap();

        let loc = GitLocation::discover(&sub.join("src")).unwrap();
        assert_eq!(loc.submodule_dir, "old-name");
        assert_eq!(loc.work_tree(), sub);
        assert_eq!(paths::relative_slash(&sub, loc.work_tree()).as_deref(), Some(""));
    }

    #[test]
    fn resolve_unknown_file_format() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(".git"), "something else").unwrap();

        let loc = GitLocation::resolve(dir.path()).unwrap();
        assert!(!loc.present);
    }

    #[test]
    fn resolve_missing() {
        let dir = TempDir::new().unwrap();
        let loc = GitLocation::resolve(dir.path()).unwrap();
        assert!(!loc.present);
        assert!(matches!(
            loc.require_present(dir.path()),
            Err(CwbuildError::GitDirNotFound(_))
        ));
    }

    #[test]
    fn discover_walks_up() {
        let dir = TempDir::new().unwrap();
        fs::create_dir(dir.path().join(".git")).unwrap();
        let nested = dir.path().join("contracts/kv");
        fs::create_dir_all(&nested).unwrap();

        let loc = GitLocation::discover(&nested).unwrap();
        assert!(loc.present);
        assert_eq!(loc.root_repo, dir.path());
        assert_eq!(loc.work_tree(), dir.path());
    }

    #[test]
    fn split_at_first_git_segment() {
        let (root, suffix) = split_git_path(Path::new("/repo/.git/modules/a"));
        assert_eq!(root, PathBuf::from("/repo"));
        assert_eq!(suffix, "modules/a");

        let (root, suffix) = split_git_path(Path::new("/repo/.git"));
        assert_eq!(root, PathBuf::from("/repo"));
        assert_eq!(suffix, "");
    }

    #[test]
    fn modules_segments_stripped() {
        assert_eq!(strip_modules_segments("modules/contracts/kv"), "contracts/kv");
        assert_eq!(strip_modules_segments("modules/a/modules/b"), "a/b");
        assert_eq!(strip_modules_segments(""), "");
    }

    #[tokio::test]
    async fn fetch_outside_repository_fails() {
        let dir = TempDir::new().unwrap();
        let result = fetch(dir.path(), "origin").await;
        assert!(matches!(result, Err(CwbuildError::FetchFailed { .. })));
    }
}
