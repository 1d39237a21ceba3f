//! `lazy.config.json` loading and per-task configuration resolution.
//!
//! A workspace carries at most one `lazy.config.*` file at the root and per
//! package. Only the JSON flavor holds a statically loadable schema; the
//! script flavors the ecosystem's tools accept (`.js`, `.ts`, ...) are
//! detected and rejected with a dedicated error instead of being silently
//! ignored.

mod discovery;
mod schema;

use std::collections::HashMap;

use lazypath::{AbsoluteSystemPath, AnchoredUnixPath, AnchoredUnixPathBuf};

pub use schema::{
    BaseCacheConfig, CacheConfig, CacheSettings, GlobSpec, LazyConfig, RunType, RunsAfter,
    TaskConfig,
};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("found multiple lazy config files in {dir}: {found}")]
    MultipleConfigFiles { dir: String, found: String },
    #[error(
        "{path} is not loadable: only the JSON flavor of lazy.config is supported by this runner"
    )]
    UnsupportedConfigFlavor { path: String },
    #[error("unable to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config at {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Path(#[from] lazypath::PathError),
}

/// All configuration for one run: the root config plus any package-level
/// overrides, loaded once up front.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    root: LazyConfig,
    packages: HashMap<AnchoredUnixPathBuf, LazyConfig>,
}

impl ConfigLoader {
    /// Loads the root config and the config of every package directory.
    /// Directories without a config file simply contribute nothing.
    pub fn load<'a>(
        repo_root: &AbsoluteSystemPath,
        package_dirs: impl IntoIterator<Item = &'a AnchoredUnixPathBuf>,
    ) -> Result<Self, Error> {
        let root = discovery::load_config_in_dir(repo_root)?.unwrap_or_default();

        let mut packages = HashMap::new();
        for dir in package_dirs {
            let absolute = repo_root.resolve(dir);
            if let Some(config) = discovery::load_config_in_dir(&absolute)? {
                packages.insert(dir.clone(), config);
            }
        }

        Ok(Self { root, packages })
    }

    /// Resolves the task configuration for `(package_dir, task_name)`.
    /// The package-level entry wins wholesale over the root entry; absent
    /// both, the defaults apply. `package_dir` of `None` addresses the
    /// workspace root itself (top-level tasks).
    pub fn task_config(
        &self,
        package_dir: Option<&AnchoredUnixPath>,
        task_name: &str,
    ) -> TaskConfig {
        let package_entry = package_dir
            .and_then(|dir| self.packages.get(dir))
            .and_then(|config| config.tasks.get(task_name));

        package_entry
            .or_else(|| self.root.tasks.get(task_name))
            .cloned()
            .unwrap_or_default()
    }

    /// The resolved base cache configuration (root config only).
    pub fn base_cache_config(&self) -> BaseCacheConfig {
        self.root.base_cache_config.clone().unwrap_or_default()
    }
}
