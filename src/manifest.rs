//! Path dependency discovery
//!
//! A contract workspace often depends on crates that live next to it
//! rather than inside it (`path = "../../shared"`). Those directories must
//! be visible inside the build container too, so before mounting we walk
//! the workspace manifest, its members, and every path dependency's own
//! manifest, and collect the absolute directories they point at.

use crate::error::{CwbuildError, CwbuildResult};
use crate::paths;
use std::collections::{BTreeSet, VecDeque};
use std::path::{Path, PathBuf};
use toml_edit::{DocumentMut, Item, Table};
use tracing::debug;

const MANIFEST: &str = "Cargo.toml";
const DEP_TABLES: [&str; 3] = ["dependencies", "dev-dependencies", "build-dependencies"];

/// All local path dependencies reachable from `workspace`'s manifest,
/// as normalized absolute paths.
///
/// `workspace` must contain a `Cargo.toml`; a relative `workspace` is
/// taken against the current directory. Manifests of dependencies that
/// cannot be found are skipped.
pub fn path_dependencies(workspace: &Path) -> CwbuildResult<BTreeSet<PathBuf>> {
    let workspace = if workspace.is_absolute() {
        paths::normalize(workspace)
    } else {
        let cwd = std::env::current_dir()
            .map_err(|e| CwbuildError::io("getting current directory", e))?;
        paths::absolutize(workspace, &cwd)
    };
    let root_manifest = workspace.join(MANIFEST);
    let root = load(&root_manifest)?.ok_or_else(|| {
        CwbuildError::MissingWorkspace(format!("no {} in {}", MANIFEST, workspace.display()))
    })?;

    let mut found = BTreeSet::new();
    let mut visited = BTreeSet::from([workspace.clone()]);
    let mut queue = VecDeque::new();

    for dep in collect_path_deps(&root) {
        queue.push_back(paths::resolve(&workspace, Path::new(&dep)));
    }
    for member in workspace_members(&root, &workspace)? {
        if visited.insert(member.clone()) {
            enqueue_manifest_deps(&member, &mut queue)?;
        }
    }

    while let Some(dir) = queue.pop_front() {
        found.insert(dir.clone());
        if !visited.insert(dir.clone()) {
            continue;
        }
        enqueue_manifest_deps(&dir, &mut queue)?;
    }

    debug!(
        "Found {} path dependencies for {}",
        found.len(),
        workspace.display()
    );
    Ok(found)
}

fn enqueue_manifest_deps(dir: &Path, queue: &mut VecDeque<PathBuf>) -> CwbuildResult<()> {
    match load(&dir.join(MANIFEST))? {
        Some(doc) => {
            for dep in collect_path_deps(&doc) {
                queue.push_back(paths::resolve(dir, Path::new(&dep)));
            }
        }
        None => debug!("No manifest in {}, not following", dir.display()),
    }
    Ok(())
}

fn load(path: &Path) -> CwbuildResult<Option<DocumentMut>> {
    if !path.is_file() {
        return Ok(None);
    }
    let contents = std::fs::read_to_string(path)
        .map_err(|e| CwbuildError::io(format!("reading {}", path.display()), e))?;
    contents
        .parse::<DocumentMut>()
        .map(Some)
        .map_err(|e| CwbuildError::ManifestInvalid {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}

/// Every `path = "..."` value in the dependency-like tables of a manifest
fn collect_path_deps(doc: &DocumentMut) -> Vec<String> {
    let mut out = Vec::new();

    for name in DEP_TABLES {
        if let Some(tbl) = doc.get(name).and_then(Item::as_table) {
            out.extend(collect_from_dep_table(tbl));
        }
    }

    // target.'cfg(...)'.dependencies
    if let Some(target) = doc.get("target").and_then(|i| i.as_table()) {
        for (_, target_item) in target.iter() {
            let Some(target_tbl) = target_item.as_table() else {
                continue;
            };
            for name in DEP_TABLES {
                if let Some(tbl) = target_tbl.get(name).and_then(|i| i.as_table()) {
                    out.extend(collect_from_dep_table(tbl));
                }
            }
        }
    }

    // [workspace.dependencies]
    if let Some(tbl) = doc
        .get("workspace")
        .and_then(|w| w.get("dependencies"))
        .and_then(|i| i.as_table())
    {
        out.extend(collect_from_dep_table(tbl));
    }

    // [patch.<registry>]
    if let Some(patch) = doc.get("patch").and_then(|i| i.as_table()) {
        for (_, registry) in patch.iter() {
            if let Some(tbl) = registry.as_table() {
                out.extend(collect_from_dep_table(tbl));
            }
        }
    }

    out
}

fn collect_from_dep_table(tbl: &Table) -> Vec<String> {
    tbl.iter()
        // dep = { path = "../x" } and [dependencies.dep] path = "../x"
        .filter_map(|(_, dep)| dep.get("path").and_then(|p| p.as_str()))
        .map(str::to_string)
        .collect()
}

/// `[workspace] members`, with trailing `/*` globs expanded
fn workspace_members(doc: &DocumentMut, workspace: &Path) -> CwbuildResult<Vec<PathBuf>> {
    let Some(members) = doc
        .get("workspace")
        .and_then(|w| w.get("members"))
        .and_then(|m| m.as_array())
    else {
        return Ok(Vec::new());
    };

    let mut out = Vec::new();
    for member in members.iter().filter_map(|m| m.as_str()) {
        match member.strip_suffix("/*") {
            Some(parent) => {
                let parent = paths::resolve(workspace, Path::new(parent));
                let Ok(entries) = std::fs::read_dir(&parent) else {
                    debug!("Member glob {} matched nothing", member);
                    continue;
                };
                let mut dirs: Vec<PathBuf> = entries
                    .filter_map(Result::ok)
                    .map(|e| e.path())
                    .filter(|p| p.join(MANIFEST).is_file())
                    .collect();
                dirs.sort();
                out.extend(dirs);
            }
            None => out.push(paths::resolve(workspace, Path::new(member))),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn write(path: &Path, contents: &str) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[test]
    fn inline_and_dotted_path_deps() {
        let root = TempDir::new().unwrap();
        let ws = root.path().join("ws");
        write(
            &ws.join("Cargo.toml"),
            r#"
            [package]
            name = "kv"

            [dependencies]
            serde = "1"
            shared = { path = "../shared" }

            [dev-dependencies.testing]
            path = "../testing"
            "#,
        );

        let deps = path_dependencies(&ws).unwrap();
        assert_eq!(
            deps,
            BTreeSet::from([root.path().join("shared"), root.path().join("testing")])
        );
    }

    #[test]
    fn follows_members_and_transitive_deps() {
        let root = TempDir::new().unwrap();
        let ws = root.path().join("ws");
        write(
            &ws.join("Cargo.toml"),
            r#"
            [workspace]
            members = ["contracts/*", "lib"]
            "#,
        );
        write(
            &ws.join("contracts/kv/Cargo.toml"),
            r#"
            [dependencies]
            toolkit = { path = "../../../toolkit" }
            "#,
        );
        write(&ws.join("lib/Cargo.toml"), "[package]\nname = \"lib\"\n");
        write(
            &root.path().join("toolkit/Cargo.toml"),
            r#"
            [dependencies]
            derive = { path = "derive" }
            "#,
        );

        let deps = path_dependencies(&ws).unwrap();
        assert!(deps.contains(&root.path().join("toolkit")));
        assert!(deps.contains(&root.path().join("toolkit/derive")));
        assert_eq!(deps.len(), 2);
    }

    #[test]
    fn workspace_dependencies_and_patches() {
        let root = TempDir::new().unwrap();
        let ws = root.path().join("ws");
        write(
            &ws.join("Cargo.toml"),
            r#"
            [workspace.dependencies]
            a = { path = "../a" }

            [patch.crates-io]
            b = { path = "../b" }

            [target.'cfg(unix)'.dependencies]
            c = { path = "../c" }
            "#,
        );

        let deps = path_dependencies(&ws).unwrap();
        assert_eq!(deps.len(), 3);
    }

    #[test]
    fn cycles_terminate() {
        let root = TempDir::new().unwrap();
        let ws = root.path().join("ws");
        write(
            &ws.join("Cargo.toml"),
            "[dependencies]\na = { path = \"../a\" }\n",
        );
        write(
            &root.path().join("a/Cargo.toml"),
            "[dependencies]\nws = { path = \"../ws\" }\n",
        );

        let deps = path_dependencies(&ws).unwrap();
        assert!(deps.contains(&root.path().join("a")));
    }

    #[test]
    fn relative_workspace_yields_absolute_paths() {
        let cwd = std::env::current_dir().unwrap();
        let root = tempfile::Builder::new()
            .prefix("cwbuild-manifest-")
            .tempdir_in(&cwd)
            .unwrap();
        let name = root.path().file_name().unwrap().to_owned();
        write(
            &root.path().join("ws/Cargo.toml"),
            "[dependencies]\nshared = { path = \"../shared\" }\n",
        );

        let deps = path_dependencies(&Path::new(&name).join("ws")).unwrap();
        assert_eq!(deps, BTreeSet::from([cwd.join(&name).join("shared")]));
        assert!(deps.iter().all(|d| d.is_absolute()));
    }

    #[test]
    fn missing_workspace_manifest() {
        let root = TempDir::new().unwrap();
        assert!(matches!(
            path_dependencies(root.path()),
            Err(CwbuildError::MissingWorkspace(_))
        ));
    }

    #[test]
    fn invalid_manifest() {
        let root = TempDir::new().unwrap();
        write(&root.path().join("Cargo.toml"), "[dependencies\n");
        assert!(matches!(
            path_dependencies(root.path()),
            Err(CwbuildError::ManifestInvalid { .. })
        ));
    }
}
