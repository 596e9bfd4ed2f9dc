//! Integration tests for canvas-setup

mod cli_tests {
    use assert_cmd::{cargo::cargo_bin_cmd, Command};
    use predicates::prelude::*;
    use std::fs;
    use tempfile::TempDir;

    const EMPTY_DIGEST: &str = "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855";

    fn canvas_setup() -> Command {
        let mut cmd = cargo_bin_cmd!("canvas-setup");
        for var in [
            "CANVAS_SETUP_CONFIG",
            "INPUT_CANVAS-HOME",
            "INPUT_ARCH",
            "INPUT_EMSDK-VERSION",
            "GITHUB_OUTPUT",
        ] {
            cmd.env_remove(var);
        }
        cmd
    }

    /// Config pinning every path into `dir`
    fn write_config(dir: &TempDir) -> std::path::PathBuf {
        let root = dir.path().display();
        let path = dir.path().join("canvas-setup.toml");
        fs::write(
            &path,
            format!(
                "[paths]\nworkspace = \"{root}/work\"\nhome = \"{root}/home\"\n\n\
                 [cache]\nstore_dir = \"{root}/store\"\n\n\
                 [state]\nfile = \"{root}/state.json\"\n"
            ),
        )
        .unwrap();
        path
    }

    /// Canvas checkout with stub yarn, pip and sync-libs that fake their side effects
    #[cfg(unix)]
    struct StubWorkspace {
        dir: TempDir,
        config: std::path::PathBuf,
    }

    #[cfg(unix)]
    impl StubWorkspace {
        fn new() -> Self {
            use std::os::unix::fs::PermissionsExt;

            let dir = TempDir::new().unwrap();
            let root = dir.path().display().to_string();
            let canvas = dir.path().join("work/canvas");
            let bin = dir.path().join("bin");
            fs::create_dir_all(&canvas).unwrap();
            fs::create_dir_all(&bin).unwrap();
            fs::write(canvas.join("yarn.lock"), "left-pad@1.3.0").unwrap();
            fs::write(canvas.join("requirements.txt"), "six==1.16.0").unwrap();

            let scripts = [
                (
                    bin.join("yarn"),
                    format!(
                        "#!/bin/sh\nif [ \"$1\" = cache ]; then echo {root}/yarn-cache; exit 0; fi\n\
                         mkdir -p {root}/yarn-cache && echo pkg > {root}/yarn-cache/pkg\n"
                    ),
                ),
                (
                    bin.join("pip"),
                    format!(
                        "#!/bin/sh\nmkdir -p {root}/home/.cache/pip && echo whl > {root}/home/.cache/pip/wheel\n"
                    ),
                ),
                (
                    canvas.join("sync-libs"),
                    "#!/bin/sh\nmkdir -p libs/skia/wasm/v1 && echo etag > libs/skia/wasm/v1/ETAG\n"
                        .to_string(),
                ),
            ];
            for (path, body) in scripts {
                fs::write(&path, body).unwrap();
                fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
            }

            let config = dir.path().join("canvas-setup.toml");
            fs::write(
                &config,
                format!(
                    "[paths]\nworkspace = \"{root}/work\"\nhome = \"{root}/home\"\n\n\
                     [cache]\nstore_dir = \"{root}/store\"\n\n\
                     [state]\nfile = \"{root}/state.json\"\noutput_file = \"{root}/github-output\"\n\n\
                     [toolchain]\nenabled = false\n"
                ),
            )
            .unwrap();

            Self { dir, config }
        }

        fn pre(&self) -> Command {
            let path = format!(
                "{}:{}",
                self.dir.path().join("bin").display(),
                std::env::var("PATH").unwrap_or_default()
            );
            let mut cmd = canvas_setup();
            cmd.env("PATH", path)
                .arg("--config")
                .arg(&self.config)
                .args(["pre", "--canvas-home", "canvas", "--arch", "wasm"]);
            cmd
        }
    }

    #[cfg(unix)]
    #[test]
    fn pre_logs_every_restore_and_save_decision() {
        let workspace = StubWorkspace::new();

        workspace
            .pre()
            .assert()
            .success()
            .stderr(predicate::str::contains(
                "Did not find yarn cache using restore key",
            ))
            .stderr(predicate::str::contains("Saved libs cache using key"))
            .stdout(predicate::str::contains("no cache restored"));

        workspace
            .pre()
            .assert()
            .success()
            .stderr(predicate::str::contains("Restored pip cache from cache key"))
            .stderr(predicate::str::contains("Skipped saving yarn cache"))
            .stdout(predicate::str::contains("restored from"));
    }

    #[cfg(unix)]
    #[test]
    fn pre_replaces_corrupt_leftover_state() {
        let workspace = StubWorkspace::new();
        let state_file = workspace.dir.path().join("state.json");
        fs::write(&state_file, "{truncated").unwrap();

        workspace
            .pre()
            .assert()
            .success()
            .stderr(predicate::str::contains("Ignoring unreadable job state"));

        let state: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&state_file).unwrap()).unwrap();
        assert!(state["values"].is_object());
    }

    #[test]
    fn help_displays() {
        canvas_setup()
            .arg("--help")
            .assert()
            .success()
            .stdout(predicate::str::contains("content-addressed dependency caching"));
    }

    #[test]
    fn version_displays() {
        canvas_setup()
            .arg("--version")
            .assert()
            .success()
            .stdout(predicate::str::contains("canvas-setup"));
    }

    #[test]
    fn hash_of_nothing_is_empty_digest() {
        let dir = TempDir::new().unwrap();
        let pattern = format!("{}/**/ETAG", dir.path().display());

        canvas_setup()
            .args(["hash", &pattern])
            .assert()
            .success()
            .stdout(predicate::str::diff(format!("{EMPTY_DIGEST}\n")));
    }

    #[test]
    fn hash_changes_with_content() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("yarn.lock"), "lock").unwrap();
        let pattern = format!("{}/yarn.lock", dir.path().display());

        canvas_setup()
            .args(["hash", &pattern])
            .assert()
            .success()
            .stdout(predicate::str::contains(EMPTY_DIGEST).not());
    }

    #[test]
    fn hash_rejects_invalid_pattern() {
        canvas_setup()
            .args(["hash", "libs/***["])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid glob pattern"));
    }

    #[test]
    fn key_starts_with_prefix() {
        let dir = TempDir::new().unwrap();
        let pattern = format!("{}/**/*", dir.path().display());

        canvas_setup()
            .args(["key", "emsdk-syscache", &pattern, "--version", "3.1.45"])
            .assert()
            .success()
            .stdout(predicate::str::contains("-emsdk-syscache-3.1.45-\n"))
            .stdout(predicate::str::contains(format!(
                "-emsdk-syscache-3.1.45-{EMPTY_DIGEST}"
            )));
    }

    #[test]
    fn post_without_state_succeeds() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir);

        canvas_setup()
            .arg("--config")
            .arg(&config)
            .args(["post", "--emsdk-version", "3.1.45"])
            .assert()
            .success();

        assert!(!dir.path().join("store").exists());
    }

    #[test]
    fn post_never_fails_the_job() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("broken.toml");
        fs::write(&config, "[paths\n").unwrap();

        canvas_setup()
            .arg("--config")
            .arg(&config)
            .arg("post")
            .assert()
            .success()
            .stderr(predicate::str::contains("Warning:"));
    }

    #[test]
    fn pre_fails_on_invalid_config() {
        let dir = TempDir::new().unwrap();
        let config = dir.path().join("broken.toml");
        fs::write(&config, "[paths\n").unwrap();

        canvas_setup()
            .arg("--config")
            .arg(&config)
            .arg("pre")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Invalid configuration"));
    }

    #[test]
    fn cache_list_empty_store() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir);

        canvas_setup()
            .arg("--config")
            .arg(&config)
            .args(["cache", "list"])
            .assert()
            .success()
            .stdout(predicate::str::contains("No cache entries found"));
    }

    #[test]
    fn cache_list_json_is_array() {
        let dir = TempDir::new().unwrap();
        let config = write_config(&dir);

        canvas_setup()
            .arg("--config")
            .arg(&config)
            .args(["cache", "list", "--format", "json"])
            .assert()
            .success()
            .stdout(predicate::str::starts_with("["));
    }
}
