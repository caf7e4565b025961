//! Integration tests for cwbuild

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    const DRIVER: &str = r#"
phase="$1"; rev="$2"; shift 2
for c in "$@"; do
  echo "Compiling $c v0.1.0"
  printf '%s@%s' "$c" "$rev" > "$BUILD_OUTPUT/$c@$rev.wasm"
done
"#;

    /// Binary isolated from the user's config files
    fn cwbuild(dir: &TempDir) -> Command {
        let mut cmd = cargo_bin_cmd!("cwbuild");
        cmd.current_dir(dir.path())
            .env("CWBUILD_CONFIG", dir.path().join("global.toml"))
            .arg("--no-local");
        cmd
    }

    #[test]
    fn help_displays() {
        let dir = TempDir::new().unwrap();
        cwbuild(&dir)
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("build"))
            .stdout(predicate::str::contains("cache"));
    }

    #[test]
    fn version_displays() {
        let dir = TempDir::new().unwrap();
        cwbuild(&dir)
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("cwbuild"));
    }

    #[test]
    fn build_requires_a_crate() {
        let dir = TempDir::new().unwrap();
        cwbuild(&dir).arg("build").assert().failure();
    }

    #[test]
    fn config_path_honors_env() {
        let dir = TempDir::new().unwrap();
        cwbuild(&dir)
            .args(["config", "path"])
            .assert()
            .success()
            .stdout(predicate::str::contains("global.toml"));
    }

    #[test]
    fn config_show_prints_tables() {
        let dir = TempDir::new().unwrap();
        cwbuild(&dir)
            .args(["config", "show"])
            .assert()
            .success()
            .stdout(predicate::str::contains("[build]"))
            .stdout(predicate::str::contains("[container]"));
    }

    #[test]
    fn raw_build_emits_json() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("ws")).unwrap();
        fs::write(dir.path().join("driver.sh"), DRIVER).unwrap();

        cwbuild(&dir)
            .args([
                "build", "kv", "admin", "--raw", "--script", "driver.sh", "-w", "ws", "-o", "out",
                "--json",
            ])
            .assert()
            .success()
            .stdout(predicate::str::contains("codeHash"))
            .stdout(predicate::str::contains("kv@HEAD.wasm"))
            .stdout(predicate::str::contains("admin@HEAD.wasm"));

        let built = fs::read_to_string(dir.path().join("out").join("kv@HEAD.wasm")).unwrap();
        assert_eq!(built, "kv@HEAD");
    }

    #[test]
    fn build_without_script_fails_with_hint() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("ws")).unwrap();

        cwbuild(&dir)
            .args(["build", "kv", "--raw", "-w", "ws"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Error:"))
            .stderr(predicate::str::contains("Hint:"));
    }

    #[test]
    fn cache_list_shows_artifacts() {
        let dir = TempDir::new().unwrap();
        fs::create_dir_all(dir.path().join("out")).unwrap();
        fs::write(dir.path().join("out").join("kv@v1.0.wasm"), b"wasm").unwrap();

        cwbuild(&dir)
            .args(["cache", "list", "-o", "out", "--format", "plain"])
            .assert()
            .success()
            .stdout(predicate::str::contains("kv@v1.0.wasm"));
    }

    #[test]
    fn cache_list_empty() {
        let dir = TempDir::new().unwrap();
        cwbuild(&dir)
            .args(["cache", "list", "-o", "out"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No artifacts"));
    }
}

mod compiler_tests {
    use async_trait::async_trait;
    use cwbuild::build::{Compiler, ContainerCompiler, Interrupt, LogSink};
    use cwbuild::config::{BuildOptions, Config};
    use cwbuild::error::{CwbuildError, CwbuildResult};
    use cwbuild::orchestration::{ContainerRunSpec, ContainerRuntime, VolumeInfo};
    use cwbuild::source::{artifact_file_name, hash_bytes, SourceSpec};
    use std::collections::HashMap;
    use std::fs;
    use std::path::{Path, PathBuf};
    use std::sync::{Arc, Mutex};
    use tempfile::TempDir;
    use tokio::sync::Notify;

    /// What `start_attached` does
    #[derive(Debug, Clone, Copy)]
    enum Start {
        /// Play the driver, then exit with this code
        Exit(i32),
        /// The engine cannot run the container
        LaunchError,
        /// Never finish
        Hang,
    }

    impl Default for Start {
        fn default() -> Self {
            Start::Exit(0)
        }
    }

    /// Engine that records every container and plays the driver itself
    #[derive(Default)]
    struct MockRuntime {
        start: Start,
        started: Notify,
        created: Mutex<Vec<ContainerRunSpec>>,
        killed: Mutex<Vec<String>>,
        removed: Mutex<Vec<String>>,
        volumes: Mutex<Vec<String>>,
    }

    impl MockRuntime {
        fn with_start(start: Start) -> Self {
            Self {
                start,
                ..Self::default()
            }
        }

        fn failing(exit_code: i32) -> Self {
            Self::with_start(Start::Exit(exit_code))
        }

        fn created(&self) -> Vec<ContainerRunSpec> {
            self.created.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl ContainerRuntime for MockRuntime {
        async fn is_available(&self) -> CwbuildResult<bool> {
            Ok(true)
        }

        async fn image_exists(&self, _image: &str) -> CwbuildResult<bool> {
            Ok(true)
        }

        async fn pull(&self, _image: &str) -> CwbuildResult<()> {
            Ok(())
        }

        async fn create(&self, spec: &ContainerRunSpec) -> CwbuildResult<String> {
            self.created.lock().unwrap().push(spec.clone());
            Ok(spec.name.clone())
        }

        async fn start_attached(
            &self,
            container_id: &str,
            on_output: &(dyn Fn(String) + Send + Sync),
        ) -> CwbuildResult<i32> {
            let spec = self
                .created()
                .into_iter()
                .find(|s| s.name == container_id)
                .expect("started an unknown container");
            self.started.notify_one();

            let exit_code = match self.start {
                Start::Exit(code) => code,
                Start::LaunchError => {
                    return Err(CwbuildError::ContainerLaunch(
                        "Error response from daemon: mount denied".to_string(),
                    ))
                }
                Start::Hang => {
                    on_output("Compiling kv v0.1.0".to_string());
                    return Ok(std::future::pending().await);
                }
            };

            // [interpreter, driver, phase, revision, crates...]
            let revision = &spec.command[3];
            let output = PathBuf::from(spec.host_path_for("/output").expect("no output mount"));
            let features = spec.env.get("BUILD_FEATURES").cloned().unwrap_or_default();

            for crate_name in &spec.command[4..] {
                on_output(format!("Compiling {} v0.1.0", crate_name));
                if exit_code != 0 {
                    on_output(format!("error: could not compile `{}`", crate_name));
                    continue;
                }
                fs::write(
                    output.join(artifact_file_name(crate_name, revision)),
                    format!("{}:{}:{}", crate_name, revision, features),
                )
                .unwrap();
            }

            Ok(exit_code)
        }

        async fn kill(&self, container_id: &str) -> CwbuildResult<()> {
            self.killed.lock().unwrap().push(container_id.to_string());
            Ok(())
        }

        async fn remove(&self, container_id: &str) -> CwbuildResult<()> {
            self.removed.lock().unwrap().push(container_id.to_string());
            Ok(())
        }

        fn reap(&self, container_id: &str) {
            self.removed.lock().unwrap().push(container_id.to_string());
        }

        async fn volume_create(
            &self,
            name: &str,
            _labels: &HashMap<String, String>,
        ) -> CwbuildResult<()> {
            self.volumes.lock().unwrap().push(name.to_string());
            Ok(())
        }

        async fn volume_list(&self, _prefix: &str) -> CwbuildResult<Vec<VolumeInfo>> {
            Ok(vec![])
        }

        async fn volume_remove(&self, _name: &str) -> CwbuildResult<()> {
            Ok(())
        }

        fn runtime_name(&self) -> &'static str {
            "Mock"
        }
    }

    struct Fixture {
        dir: TempDir,
        options: BuildOptions,
    }

    impl Fixture {
        /// A workspace `ws` with a manifest and a driver script next to it
        fn new() -> Self {
            let dir = TempDir::new().unwrap();
            let workspace = dir.path().join("ws");
            write_manifest(&workspace);
            let script = dir.path().join("driver.sh");
            fs::write(&script, "#!/bin/sh\n").unwrap();

            let mut config = Config::default();
            config.build.workspace = Some(workspace);
            config.build.script = Some(script);
            config.build.output_dir = Some(dir.path().join("out"));
            config.toolchain.build_uid = Some(1000);
            config.toolchain.build_gid = Some(1000);
            let options = BuildOptions::resolve_with(&config, dir.path(), None);

            Self { dir, options }
        }

        fn workspace(&self) -> PathBuf {
            self.dir.path().join("ws")
        }

        fn out(&self, file: &str) -> PathBuf {
            self.dir.path().join("out").join(file)
        }

        fn compiler(&self, runtime: &Arc<MockRuntime>) -> ContainerCompiler {
            let runtime: Arc<dyn ContainerRuntime> = Arc::clone(runtime) as Arc<dyn ContainerRuntime>;
            let sink: LogSink = Arc::new(|_: &str| {});
            ContainerCompiler::new(self.options.clone(), runtime).with_log_sink(sink)
        }

        /// Turn the workspace into a repository with `v2.1` and `feature/x`
        fn init_git(&self) {
            let repo = self.workspace();
            let git = |args: &[&str]| {
                let status = std::process::Command::new("git")
                    .arg("-C")
                    .arg(&repo)
                    .args(["-c", "user.name=cwbuild", "-c", "user.email=cwbuild@localhost"])
                    .args(args)
                    .stdout(std::process::Stdio::null())
                    .stderr(std::process::Stdio::null())
                    .status()
                    .unwrap();
                assert!(status.success(), "git {:?}", args);
            };
            git(&["init", "-q"]);
            git(&["add", "."]);
            git(&["commit", "-q", "-m", "init"]);
            git(&["tag", "v2.1"]);
            git(&["branch", "feature/x"]);
        }
    }

    fn write_manifest(dir: &Path) {
        fs::create_dir_all(dir).unwrap();
        fs::write(dir.join("Cargo.toml"), "[workspace]\nmembers = []\n").unwrap();
    }

    #[tokio::test]
    async fn head_build_runs_one_container() {
        let fx = Fixture::new();
        let runtime = Arc::new(MockRuntime::default());

        let artifact = fx
            .compiler(&runtime)
            .build(SourceSpec::new("kv"))
            .await
            .unwrap();

        let created = runtime.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].command[1..], ["/build/driver", "phase1", "HEAD", "kv"]);
        assert_eq!(artifact.code_path, fx.out("kv@HEAD.wasm"));
        assert_eq!(artifact.code_hash, hash_bytes(b"kv:HEAD:"));

        // The container is gone and the revision's cache volume exists
        assert_eq!(*runtime.removed.lock().unwrap(), [created[0].name.clone()]);
        assert_eq!(*runtime.volumes.lock().unwrap(), ["cwbuild-cargo-HEAD"]);
    }

    #[tokio::test]
    async fn same_revision_shares_one_container() {
        let fx = Fixture::new();
        let runtime = Arc::new(MockRuntime::default());

        let artifacts = fx
            .compiler(&runtime)
            .build_many(vec![SourceSpec::new("kv"), SourceSpec::new("admin")])
            .await
            .unwrap();

        let created = runtime.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].command[3..], ["HEAD", "kv", "admin"]);
        assert_eq!(artifacts.len(), 2);
        assert_eq!(artifacts[0].code_path, fx.out("kv@HEAD.wasm"));
        assert_eq!(artifacts[1].code_path, fx.out("admin@HEAD.wasm"));
        assert_ne!(artifacts[0].code_hash, artifacts[1].code_hash);
    }

    #[tokio::test]
    async fn existing_artifact_skips_container() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.out("")).unwrap();
        fs::write(fx.out("kv@HEAD.wasm"), b"already built").unwrap();
        let runtime = Arc::new(MockRuntime::default());

        let artifact = fx
            .compiler(&runtime)
            .build(SourceSpec::new("kv"))
            .await
            .unwrap();

        assert!(runtime.created().is_empty());
        assert!(runtime.volumes.lock().unwrap().is_empty());
        assert_eq!(artifact.code_hash, hash_bytes(b"already built"));
    }

    #[tokio::test]
    async fn caching_disabled_rebuilds() {
        let mut fx = Fixture::new();
        fx.options.caching = false;
        fs::create_dir_all(fx.out("")).unwrap();
        fs::write(fx.out("kv@HEAD.wasm"), b"stale").unwrap();
        let runtime = Arc::new(MockRuntime::default());

        let artifact = fx
            .compiler(&runtime)
            .build(SourceSpec::new("kv"))
            .await
            .unwrap();

        assert_eq!(runtime.created().len(), 1);
        assert_eq!(artifact.code_hash, hash_bytes(b"kv:HEAD:"));
    }

    #[tokio::test]
    async fn historical_revisions_name_artifacts_safely() {
        let fx = Fixture::new();
        fx.init_git();
        let runtime = Arc::new(MockRuntime::default());

        // No remote is configured, so the fetch fails without stopping the build
        let artifacts = fx
            .compiler(&runtime)
            .build_many(vec![
                SourceSpec::new("kv").revision("v2.1"),
                SourceSpec::new("kv").revision("feature/x"),
            ])
            .await
            .unwrap();

        assert_eq!(artifacts[0].code_path, fx.out("kv@v2.1.wasm"));
        assert_eq!(artifacts[1].code_path, fx.out("kv@feature_x.wasm"));

        let created = runtime.created();
        assert_eq!(created.len(), 2);
        for spec in &created {
            // Historical trees are never written to
            assert!(spec.readonly_mounts.values().any(|c| c == "/src"));
            assert!(!spec.writable_mounts.values().any(|c| c == "/src"));
            assert_eq!(spec.env["GIT_SUBDIR"], "");
        }
    }

    #[tokio::test]
    async fn head_build_mounts_source_writable() {
        let fx = Fixture::new();
        let runtime = Arc::new(MockRuntime::default());
        fx.compiler(&runtime)
            .build(SourceSpec::new("kv"))
            .await
            .unwrap();

        let spec = &runtime.created()[0];
        let workspace = fx.workspace().to_string_lossy().into_owned();
        assert_eq!(spec.writable_mounts.get(&workspace).map(String::as_str), Some("/src"));
        assert_eq!(spec.env["SRC_SUBDIR"], "");
        assert_eq!(spec.workdir, "/src");
    }

    #[tokio::test]
    async fn failed_batch_reports_every_crate() {
        let fx = Fixture::new();
        let runtime = Arc::new(MockRuntime::failing(3));

        let err = fx
            .compiler(&runtime)
            .build_many(vec![SourceSpec::new("kv"), SourceSpec::new("admin")])
            .await
            .unwrap_err();

        match err {
            CwbuildError::BuildFailed { crates, code, logs } => {
                assert_eq!(crates, ["kv", "admin"]);
                assert_eq!(code, 3);
                assert!(logs.contains("could not compile `kv`"));
                assert!(logs.contains("could not compile `admin`"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(runtime.removed.lock().unwrap().len(), 1);
        assert!(!fx.out("kv@HEAD.wasm").exists());
    }

    #[tokio::test]
    async fn results_follow_input_order_across_batches() {
        let fx = Fixture::new();
        let other = fx.dir.path().join("other");
        write_manifest(&other);
        let runtime = Arc::new(MockRuntime::default());

        let artifacts = fx
            .compiler(&runtime)
            .build_many(vec![
                SourceSpec::new("a"),
                SourceSpec::new("b").workspace(&other),
                SourceSpec::new("c"),
            ])
            .await
            .unwrap();

        let created = runtime.created();
        assert_eq!(created.len(), 2);
        assert_eq!(created[0].command[4..], ["a", "c"]);
        assert_eq!(created[1].command[4..], ["b"]);

        let names: Vec<_> = artifacts
            .iter()
            .map(|a| a.code_path.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, ["a@HEAD.wasm", "b@HEAD.wasm", "c@HEAD.wasm"]);
    }

    #[tokio::test]
    async fn only_missing_crates_are_built() {
        let fx = Fixture::new();
        fs::create_dir_all(fx.out("")).unwrap();
        fs::write(fx.out("kv@HEAD.wasm"), b"cached kv").unwrap();
        let runtime = Arc::new(MockRuntime::default());

        let artifacts = fx
            .compiler(&runtime)
            .build_many(vec![SourceSpec::new("kv"), SourceSpec::new("admin")])
            .await
            .unwrap();

        let created = runtime.created();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].command[4..], ["admin"]);
        assert_eq!(artifacts[0].code_hash, hash_bytes(b"cached kv"));
        assert_eq!(artifacts[1].code_path, fx.out("admin@HEAD.wasm"));
    }

    #[tokio::test]
    async fn features_reach_the_driver() {
        let fx = Fixture::new();
        let runtime = Arc::new(MockRuntime::default());

        let artifact = fx
            .compiler(&runtime)
            .build(SourceSpec::new("kv").features(["library"]))
            .await
            .unwrap();

        let features = r#"{"kv":["library"]}"#;
        assert_eq!(runtime.created()[0].env["BUILD_FEATURES"], features);
        assert_eq!(
            artifact.code_hash,
            hash_bytes(format!("kv:HEAD:{}", features).as_bytes())
        );
    }

    #[tokio::test]
    async fn historical_build_outside_git_is_refused() {
        let fx = Fixture::new();
        let runtime = Arc::new(MockRuntime::default());

        let err = fx
            .compiler(&runtime)
            .build(SourceSpec::new("kv").revision("v1.0"))
            .await
            .unwrap_err();

        assert!(matches!(err, CwbuildError::GitDirNotFound(_)));
        assert!(runtime.created().is_empty());
    }

    #[tokio::test]
    async fn missing_script_is_reported_before_any_container() {
        let mut fx = Fixture::new();
        fx.options.script = None;
        let runtime = Arc::new(MockRuntime::default());

        let err = fx
            .compiler(&runtime)
            .build(SourceSpec::new("kv"))
            .await
            .unwrap_err();

        assert!(matches!(err, CwbuildError::BuildScriptMissing));
        assert!(runtime.created().is_empty());
    }

    #[tokio::test]
    async fn launch_error_still_removes_container() {
        let fx = Fixture::new();
        let runtime = Arc::new(MockRuntime::with_start(Start::LaunchError));

        let err = fx
            .compiler(&runtime)
            .build(SourceSpec::new("kv"))
            .await
            .unwrap_err();

        assert!(
            matches!(&err, CwbuildError::ContainerLaunch(msg) if msg.contains("mount denied")),
            "unexpected error: {err}"
        );
        let created = runtime.created();
        assert_eq!(*runtime.removed.lock().unwrap(), [created[0].name.clone()]);
        assert!(!fx.out("kv@HEAD.wasm").exists());
    }

    #[tokio::test]
    async fn dropped_build_reaps_its_container() {
        let fx = Fixture::new();
        let runtime = Arc::new(MockRuntime::with_start(Start::Hang));
        let compiler = fx.compiler(&runtime);

        let mut build = Box::pin(compiler.build(SourceSpec::new("kv")));
        tokio::select! {
            _ = &mut build => panic!("a hanging container finished"),
            _ = runtime.started.notified() => {}
        }
        assert!(runtime.removed.lock().unwrap().is_empty());

        drop(build);
        let created = runtime.created();
        assert_eq!(*runtime.removed.lock().unwrap(), [created[0].name.clone()]);
    }

    #[tokio::test]
    async fn timed_out_build_reaps_its_container() {
        let fx = Fixture::new();
        let runtime = Arc::new(MockRuntime::with_start(Start::Hang));
        let compiler = fx.compiler(&runtime);

        let result = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            compiler.build(SourceSpec::new("kv")),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(runtime.created().len(), 1);
        assert_eq!(runtime.removed.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn interrupt_kills_and_removes_container() {
        let fx = Fixture::new();
        let runtime = Arc::new(MockRuntime::with_start(Start::Hang));
        let interrupt = Interrupt::new();
        let compiler = fx.compiler(&runtime).with_interrupt(interrupt.clone());

        let (result, ()) = tokio::join!(compiler.build(SourceSpec::new("kv")), async {
            runtime.started.notified().await;
            interrupt.trigger();
        });

        assert!(matches!(result, Err(CwbuildError::Interrupted)));
        let name = runtime.created()[0].name.clone();
        assert_eq!(*runtime.killed.lock().unwrap(), [name.clone()]);
        assert_eq!(*runtime.removed.lock().unwrap(), [name]);
    }

    #[tokio::test]
    async fn interrupted_before_start_creates_nothing() {
        let fx = Fixture::new();
        let runtime = Arc::new(MockRuntime::default());
        let interrupt = Interrupt::new();
        interrupt.trigger();

        let err = fx
            .compiler(&runtime)
            .with_interrupt(interrupt)
            .build(SourceSpec::new("kv"))
            .await
            .unwrap_err();

        assert!(matches!(err, CwbuildError::Interrupted));
        assert!(runtime.created().is_empty());
    }

    #[tokio::test]
    async fn relative_workspace_mounts_absolute_path() {
        let mut fx = Fixture::new();
        fx.options.workspace = None;
        fx.options.cwd = fx.dir.path().to_path_buf();
        let runtime = Arc::new(MockRuntime::default());

        let artifact = fx
            .compiler(&runtime)
            .build(SourceSpec::new("kv").workspace("ws"))
            .await
            .unwrap();

        let spec = &runtime.created()[0];
        let workspace = fx.workspace().to_string_lossy().into_owned();
        assert!(fx.workspace().is_absolute());
        assert_eq!(spec.writable_mounts.get(&workspace).map(String::as_str), Some("/src"));
        assert_eq!(spec.env["SRC_SUBDIR"], "");
        assert_eq!(artifact.code_path, fx.out("kv@HEAD.wasm"));
    }
}
