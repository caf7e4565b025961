//! Mount root selection
//!
//! A batch needs its workspace, every path dependency outside it, and for
//! historical builds the git root visible in the container. All of them are
//! exposed through one bind mount of their deepest common ancestor.

use crate::paths;
use std::path::{Path, PathBuf};

/// Deepest directory containing every path in `candidates`.
///
/// Sorts the candidates and takes the common component prefix of the first
/// and last entries, which is also common to everything sorted between them.
/// `None` for an empty input.
pub fn common_mount_root<I, P>(candidates: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = P>,
    P: AsRef<Path>,
{
    let mut sorted: Vec<PathBuf> = candidates
        .into_iter()
        .map(|p| paths::normalize(p.as_ref()))
        .collect();
    sorted.sort();

    let first = sorted.first()?;
    let last = sorted.last()?;

    let common: PathBuf = first
        .components()
        .zip(last.components())
        .take_while(|(a, b)| a == b)
        .map(|(a, _)| a)
        .collect();

    Some(common)
}

/// Where a batch's directories land relative to the mount root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MountLayout {
    /// Host directory bind-mounted into the container
    pub root: PathBuf,
    /// Workspace relative to `root`, `/`-separated, empty when equal
    pub src_subdir: String,
    /// Git root relative to `root`, for historical builds
    pub git_root_subdir: Option<String>,
}

impl MountLayout {
    /// Compute the layout for a workspace, its path dependencies, and an
    /// optional git root.
    ///
    /// `None` unless the paths share an absolute root.
    pub fn compute<'a, I>(
        workspace: &'a Path,
        dependencies: I,
        git_root: Option<&'a Path>,
    ) -> Option<Self>
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        let mut candidates: Vec<&Path> = vec![workspace];
        candidates.extend(dependencies.into_iter().map(PathBuf::as_path));
        candidates.extend(git_root);

        let root = common_mount_root(candidates).filter(|root| root.is_absolute())?;
        let src_subdir = paths::relative_slash(workspace, &root)?;
        let git_root_subdir = match git_root {
            Some(git_root) => Some(paths::relative_slash(git_root, &root)?),
            None => None,
        };

        Some(Self {
            root,
            src_subdir,
            git_root_subdir,
        })
    }
}
