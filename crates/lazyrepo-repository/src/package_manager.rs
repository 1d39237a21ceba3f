use std::fmt;

use lazypath::AbsoluteSystemPath;
use serde::Deserialize;

use crate::{Error, PackageJson};

pub const LOCKFILES: [&str; 3] = ["pnpm-lock.yaml", "yarn.lock", "package-lock.json"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PackageManager {
    Pnpm,
    Yarn,
    Npm,
}

impl fmt::Display for PackageManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageManager::Pnpm => write!(f, "pnpm"),
            PackageManager::Yarn => write!(f, "yarn"),
            PackageManager::Npm => write!(f, "npm"),
        }
    }
}

#[derive(Debug, Deserialize)]
struct PnpmWorkspace {
    packages: Vec<String>,
}

impl PackageManager {
    pub fn lockfile_name(&self) -> &'static str {
        match self {
            PackageManager::Pnpm => "pnpm-lock.yaml",
            PackageManager::Yarn => "yarn.lock",
            PackageManager::Npm => "package-lock.json",
        }
    }

    /// Detects the package manager from the lockfile present in `dir`.
    /// More than one lockfile is ambiguous and fatal; none means `dir` is
    /// not a workspace root.
    pub fn detect(dir: &AbsoluteSystemPath) -> Result<Option<Self>, Error> {
        let present: Vec<_> = [
            PackageManager::Pnpm,
            PackageManager::Yarn,
            PackageManager::Npm,
        ]
        .into_iter()
        .filter(|manager| dir.join_component(manager.lockfile_name()).exists())
        .collect();

        match present.as_slice() {
            [] => Ok(None),
            [manager] => Ok(Some(*manager)),
            _ => Err(Error::MultipleLockfiles {
                dir: dir.to_string(),
            }),
        }
    }

    /// Returns the workspace package globs: `(inclusions, exclusions)`.
    /// pnpm declares them in `pnpm-workspace.yaml`; npm and yarn use the
    /// root package.json `workspaces` field. `!`-prefixed globs are
    /// exclusions.
    pub fn workspace_globs(
        &self,
        repo_root: &AbsoluteSystemPath,
        root_package_json: &PackageJson,
    ) -> Result<(Vec<String>, Vec<String>), Error> {
        let raw: Vec<String> = match self {
            PackageManager::Pnpm => {
                let path = repo_root.join_component("pnpm-workspace.yaml");
                let contents = path.read_to_string().map_err(|source| Error::Read {
                    path: path.to_string(),
                    source,
                })?;
                let workspace: PnpmWorkspace =
                    serde_yaml::from_str(&contents).map_err(|source| Error::Yaml {
                        path: path.to_string(),
                        source,
                    })?;
                workspace.packages
            }
            PackageManager::Npm | PackageManager::Yarn => root_package_json
                .workspaces
                .as_ref()
                .map(|workspaces| workspaces.as_ref().to_vec())
                .unwrap_or_default(),
        };

        if raw.is_empty() {
            return Err(Error::MissingWorkspaces);
        }

        let mut inclusions = Vec::new();
        let mut exclusions = vec!["**/node_modules/**".to_owned()];
        for glob in raw {
            if let Some(exclusion) = glob.strip_prefix('!') {
                exclusions.push(exclusion.to_owned());
            } else {
                inclusions.push(glob);
            }
        }

        Ok((inclusions, exclusions))
    }
}
