//! End-to-end runner scenarios on a two-package workspace: `core` depends
//! on `utils`, both write a scratch file on every real execution so cache
//! hits are observable through mtimes.

use std::{fs, path::Path, time::SystemTime};

use lazypath::AbsoluteSystemPathBuf;
use lazyrepo_lib::{Opts, Run};

struct Fixture {
    _dir: tempfile::TempDir,
    root: AbsoluteSystemPathBuf,
}

fn write(root: &Path, rel: &str, contents: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

/// `core` depends on `utils`; `build` writes fresh random bytes to a
/// dot-named scratch file, which stays out of the fingerprint.
fn two_package_workspace() -> Fixture {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "package-lock.json", "{}");
    write(root, "package.json", r#"{ "workspaces": ["packages/*"] }"#);
    write(
        root,
        "packages/utils/package.json",
        r#"{ "name": "utils", "scripts": { "build": "head -c 16 /dev/urandom > .out.txt" } }"#,
    );
    write(root, "packages/utils/index.js", "module.exports = 1;\n");
    write(
        root,
        "packages/core/package.json",
        r#"{
            "name": "core",
            "scripts": { "build": "head -c 16 /dev/urandom > .out.txt" },
            "dependencies": { "utils": "*" }
        }"#,
    );
    write(root, "packages/core/index.js", "module.exports = 2;\n");

    let root = AbsoluteSystemPathBuf::try_from(root.canonicalize().unwrap()).unwrap();
    Fixture { _dir: dir, root }
}

impl Fixture {
    async fn run_task(&self, task: &str) -> i32 {
        self.run_with(task, false).await
    }

    async fn run_with(&self, task: &str, force: bool) -> i32 {
        Run::new(Opts {
            cwd: self.root.clone(),
            task_name: task.to_owned(),
            filter: Vec::new(),
            force,
            pass_through_args: Vec::new(),
            concurrency: 2,
        })
        .run()
        .await
        .unwrap()
    }

    async fn run_expecting_error(&self, task: &str) -> lazyrepo_lib::Error {
        Run::new(Opts {
            cwd: self.root.clone(),
            task_name: task.to_owned(),
            filter: Vec::new(),
            force: false,
            pass_through_args: Vec::new(),
            concurrency: 2,
        })
        .run()
        .await
        .unwrap_err()
    }

    fn path(&self, rel: &str) -> std::path::PathBuf {
        std::path::PathBuf::from(self.root.as_str()).join(rel)
    }

    fn mtime(&self, rel: &str) -> SystemTime {
        fs::metadata(self.path(rel)).unwrap().modified().unwrap()
    }

    fn read(&self, rel: &str) -> String {
        fs::read_to_string(self.path(rel)).unwrap()
    }

    fn exists(&self, rel: &str) -> bool {
        self.path(rel).exists()
    }

    fn utils_diff(&self) -> String {
        self.read("packages/utils/.lazy/diffs/build")
    }

    fn core_diff(&self) -> String {
        self.read("packages/core/.lazy/diffs/build")
    }
}

#[tokio::test]
async fn test_cold_build_executes_everything() {
    let fixture = two_package_workspace();

    assert_eq!(fixture.run_task("build").await, 0);

    assert!(fixture.exists("packages/utils/.out.txt"));
    assert!(fixture.exists("packages/core/.out.txt"));
    assert!(fixture.exists("packages/utils/.lazy/manifests/build"));
    assert!(fixture.exists("packages/core/.lazy/manifests/build"));
    assert!(fixture.exists("packages/utils/.lazy/diffs/build"));
    assert!(fixture.exists("packages/core/.lazy/diffs/build"));
    // nothing transient left behind
    assert!(!fixture.exists("packages/utils/.lazy/manifests/build.next"));
}

#[tokio::test]
async fn test_immediate_rerun_is_fully_lazy() {
    let fixture = two_package_workspace();

    assert_eq!(fixture.run_task("build").await, 0);
    let utils_manifest = fixture.read("packages/utils/.lazy/manifests/build");
    let utils_out = fixture.mtime("packages/utils/.out.txt");
    let core_out = fixture.mtime("packages/core/.out.txt");

    assert_eq!(fixture.run_task("build").await, 0);

    // identical manifests, untouched outputs
    assert_eq!(
        fixture.read("packages/utils/.lazy/manifests/build"),
        utils_manifest
    );
    assert_eq!(fixture.mtime("packages/utils/.out.txt"), utils_out);
    assert_eq!(fixture.mtime("packages/core/.out.txt"), core_out);
    assert_eq!(fixture.utils_diff(), "");
    assert_eq!(fixture.core_diff(), "");
}

#[tokio::test]
async fn test_added_file_misses_and_propagates_downstream() {
    let fixture = two_package_workspace();
    assert_eq!(fixture.run_task("build").await, 0);
    let utils_out = fixture.mtime("packages/utils/.out.txt");
    let core_out = fixture.mtime("packages/core/.out.txt");

    write(
        fixture.path("").as_path(),
        "packages/utils/new-file.txt",
        "hello\n",
    );
    assert_eq!(fixture.run_task("build").await, 0);

    assert!(fixture
        .utils_diff()
        .contains("+ added file packages/utils/new-file.txt"));
    assert!(fixture
        .core_diff()
        .contains("± changed upstream package inputs build::packages/utils"));
    assert_ne!(fixture.mtime("packages/utils/.out.txt"), utils_out);
    assert_ne!(fixture.mtime("packages/core/.out.txt"), core_out);
}

#[tokio::test]
async fn test_downstream_only_change_leaves_upstream_lazy() {
    let fixture = two_package_workspace();
    assert_eq!(fixture.run_task("build").await, 0);
    let utils_out = fixture.mtime("packages/utils/.out.txt");
    let core_out = fixture.mtime("packages/core/.out.txt");

    write(
        fixture.path("").as_path(),
        "packages/core/index.js",
        "module.exports = 42;\n",
    );
    assert_eq!(fixture.run_task("build").await, 0);

    assert_eq!(fixture.utils_diff(), "");
    assert!(fixture
        .core_diff()
        .contains("± changed file packages/core/index.js"));
    assert_eq!(fixture.mtime("packages/utils/.out.txt"), utils_out);
    assert_ne!(fixture.mtime("packages/core/.out.txt"), core_out);
}

#[tokio::test]
async fn test_deleted_file_misses() {
    let fixture = two_package_workspace();
    assert_eq!(fixture.run_task("build").await, 0);

    fs::remove_file(fixture.path("packages/utils/index.js")).unwrap();
    assert_eq!(fixture.run_task("build").await, 0);

    assert!(fixture
        .utils_diff()
        .contains("- removed file packages/utils/index.js"));
    assert!(fixture
        .core_diff()
        .contains("± changed upstream package inputs build::packages/utils"));
}

#[tokio::test]
async fn test_env_input_toggle_busts_the_cache_transitively() {
    let fixture = two_package_workspace();
    write(
        fixture.path("").as_path(),
        "packages/utils/lazy.config.json",
        r#"{ "tasks": { "build": { "cache": { "envInputs": ["LAZY_TEST_CI"] } } } }"#,
    );

    std::env::set_var("LAZY_TEST_CI", "");
    assert_eq!(fixture.run_task("build").await, 0);
    let utils_out = fixture.mtime("packages/utils/.out.txt");
    let core_out = fixture.mtime("packages/core/.out.txt");

    std::env::set_var("LAZY_TEST_CI", "true");
    assert_eq!(fixture.run_task("build").await, 0);

    assert!(fixture.utils_diff().contains("± changed env var LAZY_TEST_CI"));
    assert_ne!(fixture.mtime("packages/utils/.out.txt"), utils_out);
    assert_ne!(fixture.mtime("packages/core/.out.txt"), core_out);
    std::env::remove_var("LAZY_TEST_CI");
}

#[tokio::test]
async fn test_force_reruns_without_changes() {
    let fixture = two_package_workspace();
    assert_eq!(fixture.run_task("build").await, 0);
    let utils_out = fixture.mtime("packages/utils/.out.txt");

    assert_eq!(fixture.run_with("build", true).await, 0);
    assert_ne!(fixture.mtime("packages/utils/.out.txt"), utils_out);
}

#[tokio::test]
async fn test_failure_skips_downstream_and_discards_manifest() {
    let fixture = two_package_workspace();
    write(
        fixture.path("").as_path(),
        "packages/utils/package.json",
        r#"{ "name": "utils", "scripts": { "build": "exit 7" } }"#,
    );

    assert_eq!(fixture.run_task("build").await, 1);

    // downstream never ran
    assert!(!fixture.exists("packages/core/.out.txt"));
    // the failed task's manifest is discarded, so the next run is a miss
    assert!(!fixture.exists("packages/utils/.lazy/manifests/build"));
}

#[tokio::test]
async fn test_failed_task_reruns_next_time() {
    let fixture = two_package_workspace();
    write(
        fixture.path("").as_path(),
        "packages/utils/package.json",
        r#"{ "name": "utils", "scripts": { "build": "cat .flag" } }"#,
    );

    assert_eq!(fixture.run_task("build").await, 1);

    // unblock without touching any fingerprinted input
    write(fixture.path("").as_path(), "packages/utils/.flag", "ok\n");
    assert_eq!(fixture.run_task("build").await, 0);
    assert!(fixture.exists("packages/utils/.lazy/manifests/build"));
}

#[tokio::test]
async fn test_cache_none_always_runs_and_writes_no_manifest() {
    let fixture = two_package_workspace();
    write(
        fixture.path("").as_path(),
        "lazy.config.json",
        r#"{ "tasks": { "build": { "cache": "none" } } }"#,
    );

    assert_eq!(fixture.run_task("build").await, 0);
    let utils_out = fixture.mtime("packages/utils/.out.txt");

    assert!(!fixture.exists("packages/utils/.lazy/manifests/build"));
    assert!(!fixture.exists("packages/core/.lazy/manifests/build"));

    assert_eq!(fixture.run_task("build").await, 0);
    assert_ne!(fixture.mtime("packages/utils/.out.txt"), utils_out);
}

#[tokio::test]
async fn test_unknown_task_is_an_error() {
    let fixture = two_package_workspace();
    let err = fixture.run_expecting_error("deploy").await;
    assert!(matches!(
        err,
        lazyrepo_lib::Error::NoTasksMatched { task_name } if task_name == "deploy"
    ));
}

#[tokio::test]
async fn test_filter_limits_to_matching_packages() {
    let fixture = two_package_workspace();

    let code = Run::new(Opts {
        cwd: fixture.root.clone(),
        task_name: "build".to_owned(),
        filter: vec!["packages/utils".to_owned()],
        force: false,
        pass_through_args: Vec::new(),
        concurrency: 2,
    })
    .run()
    .await
    .unwrap();

    assert_eq!(code, 0);
    assert!(fixture.exists("packages/utils/.out.txt"));
    assert!(!fixture.exists("packages/core/.out.txt"));
}

#[tokio::test]
async fn test_top_level_task_runs_at_the_root() {
    let fixture = two_package_workspace();
    write(
        fixture.path("").as_path(),
        "lazy.config.json",
        r#"{
            "tasks": {
                "prepare": { "runType": "top-level", "baseCommand": "head -c 16 /dev/urandom > .prepared.txt" }
            }
        }"#,
    );

    assert_eq!(fixture.run_task("prepare").await, 0);
    assert!(fixture.exists(".prepared.txt"));
    assert!(fixture.exists(".lazy/manifests/prepare"));

    let prepared = fixture.mtime(".prepared.txt");
    assert_eq!(fixture.run_task("prepare").await, 0);
    assert_eq!(fixture.mtime(".prepared.txt"), prepared);
}
