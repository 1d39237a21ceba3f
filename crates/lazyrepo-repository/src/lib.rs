//! Workspace discovery for the lazy task runner.
//!
//! Finds the repository root via the package manager's lockfile, reads the
//! workspace declaration, enumerates member packages, and restricts each
//! package's dependency maps to in-workspace names.

mod package_json;
mod package_manager;
mod workspace;

pub use package_json::PackageJson;
pub use package_manager::PackageManager;
pub use workspace::{infer_repo_root, Package, Workspace};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error(
        "could not find a workspace root: no {lockfiles} above {start}",
        lockfiles = package_manager::LOCKFILES.join(", ")
    )]
    MissingRoot { start: String },
    #[error("multiple package manager lockfiles in {dir}: remove all but one")]
    MultipleLockfiles { dir: String },
    #[error(
        "no workspace declaration found: expected a `workspaces` field in package.json or a \
         pnpm-workspace.yaml"
    )]
    MissingWorkspaces,
    #[error("two workspace packages are named '{name}': {first} and {second}")]
    DuplicatePackageName {
        name: String,
        first: String,
        second: String,
    },
    #[error("unable to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("invalid YAML in {path}: {source}")]
    Yaml {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error(transparent)]
    Walk(#[from] lazyrepo_globwalk::WalkError),
    #[error(transparent)]
    Path(#[from] lazypath::PathError),
}
