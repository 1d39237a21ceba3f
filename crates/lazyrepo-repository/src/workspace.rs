use std::collections::{BTreeMap, HashMap};

use lazyrepo_globwalk::WalkType;
use lazypath::{AbsoluteSystemPath, AbsoluteSystemPathBuf, AnchoredUnixPath, AnchoredUnixPathBuf};
use tracing::debug;

use crate::{Error, PackageJson, PackageManager};

/// One workspace member. Immutable once discovery finishes.
#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    /// Repo-relative directory of the package.
    pub dir: AnchoredUnixPathBuf,
    pub scripts: BTreeMap<String, String>,
    /// Names of workspace packages this package depends on, sorted.
    pub local_deps: Vec<String>,
}

/// The discovered workspace: root location, package manager, and member
/// packages keyed by name.
#[derive(Debug)]
pub struct Workspace {
    pub root: AbsoluteSystemPathBuf,
    pub package_manager: PackageManager,
    pub root_package_json: PackageJson,
    packages: BTreeMap<String, Package>,
    dir_to_name: HashMap<AnchoredUnixPathBuf, String>,
}

/// Walks up from `start` to the first directory holding a package manager
/// lockfile. That directory is the workspace root.
pub fn infer_repo_root(
    start: &AbsoluteSystemPath,
) -> Result<(AbsoluteSystemPathBuf, PackageManager), Error> {
    let mut current = Some(start);
    while let Some(dir) = current {
        if let Some(package_manager) = PackageManager::detect(dir)? {
            return Ok((dir.to_owned(), package_manager));
        }
        current = dir.parent();
    }

    Err(Error::MissingRoot {
        start: start.to_string(),
    })
}

impl Workspace {
    /// Discovers the workspace rooted at `repo_root`: reads the workspace
    /// declaration, enumerates member package.json files, and wires up
    /// in-workspace dependency edges.
    pub fn discover(
        repo_root: &AbsoluteSystemPath,
        package_manager: PackageManager,
    ) -> Result<Self, Error> {
        let root_package_json_path = repo_root.join_component("package.json");
        let root_package_json = if root_package_json_path.exists() {
            PackageJson::load(&root_package_json_path)?
        } else {
            PackageJson::default()
        };

        let (inclusions, exclusions) =
            package_manager.workspace_globs(repo_root, &root_package_json)?;
        let package_json_globs: Vec<String> = inclusions
            .iter()
            .map(|glob| format!("{glob}/package.json"))
            .collect();
        // Exclusions name directories; the walk matches package.json file
        // paths, so cover each excluded subtree as well.
        let mut package_json_excludes = Vec::new();
        for glob in &exclusions {
            package_json_excludes.push(glob.clone());
            if !glob.ends_with("/**") {
                package_json_excludes.push(format!("{glob}/**"));
            }
        }

        let mut packages = BTreeMap::new();
        let mut dir_to_name = HashMap::new();
        let manifests = lazyrepo_globwalk::globwalk(
            repo_root,
            &package_json_globs,
            &package_json_excludes,
            WalkType::Files,
        )?;
        debug!("found {} workspace package manifests", manifests.len());

        let mut package_jsons: Vec<(AnchoredUnixPathBuf, PackageJson)> = Vec::new();
        for manifest in manifests {
            let manifest_path = repo_root.resolve(&manifest);
            let package_json = PackageJson::load(&manifest_path)?;
            let dir = parent_dir(&manifest);
            package_jsons.push((dir, package_json));
        }

        // First pass: register names so the second pass can recognize
        // in-workspace dependencies.
        for (dir, package_json) in &package_jsons {
            let name = package_name(dir, package_json);
            if let Some(existing) = packages.insert(
                name.clone(),
                Package {
                    name: name.clone(),
                    dir: dir.clone(),
                    scripts: package_json.scripts.clone(),
                    local_deps: Vec::new(),
                },
            ) {
                return Err(Error::DuplicatePackageName {
                    name,
                    first: existing.dir.to_string(),
                    second: dir.to_string(),
                });
            }
            dir_to_name.insert(dir.clone(), name);
        }

        for (dir, package_json) in &package_jsons {
            let name = dir_to_name
                .get(dir)
                .expect("every manifest dir was registered")
                .clone();
            let mut local_deps: Vec<String> = package_json
                .all_dependency_names()
                .filter(|dep| *dep != &name && packages.contains_key(*dep))
                .cloned()
                .collect();
            local_deps.sort();
            local_deps.dedup();
            packages
                .get_mut(&name)
                .expect("every manifest dir was registered")
                .local_deps = local_deps;
        }

        Ok(Self {
            root: repo_root.to_owned(),
            package_manager,
            root_package_json,
            packages,
            dir_to_name,
        })
    }

    /// Member packages in name order.
    pub fn packages(&self) -> impl Iterator<Item = &Package> {
        self.packages.values()
    }

    pub fn package_dirs(&self) -> impl Iterator<Item = &AnchoredUnixPathBuf> {
        self.packages.values().map(|package| &package.dir)
    }

    pub fn package_by_name(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    pub fn package_by_dir(&self, dir: &AnchoredUnixPath) -> Option<&Package> {
        self.dir_to_name
            .get(dir)
            .and_then(|name| self.packages.get(name))
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }
}

fn parent_dir(manifest: &AnchoredUnixPath) -> AnchoredUnixPathBuf {
    let raw = manifest.as_str();
    let dir = raw
        .rsplit_once('/')
        .map(|(dir, _)| dir)
        .unwrap_or_default();
    AnchoredUnixPathBuf::new(dir).expect("parent of an anchored path is anchored")
}

fn package_name(dir: &AnchoredUnixPath, package_json: &PackageJson) -> String {
    package_json.name.clone().unwrap_or_else(|| {
        dir.as_str()
            .rsplit('/')
            .next()
            .unwrap_or(dir.as_str())
            .to_owned()
    })
}

#[cfg(test)]
mod test {
    use std::fs;

    use super::*;

    fn write(root: &std::path::Path, rel: &str, contents: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    fn two_package_fixture() -> (tempfile::TempDir, AbsoluteSystemPathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "package-lock.json", "{}");
        write(root, "package.json", r#"{ "workspaces": ["packages/*"] }"#);
        write(
            root,
            "packages/utils/package.json",
            r#"{ "name": "utils", "scripts": { "build": "echo utils" } }"#,
        );
        write(
            root,
            "packages/core/package.json",
            r#"{
                "name": "core",
                "scripts": { "build": "echo core" },
                "dependencies": { "utils": "*", "left-pad": "^1.0.0" }
            }"#,
        );
        let path = AbsoluteSystemPathBuf::try_from(root.canonicalize().unwrap()).unwrap();
        (dir, path)
    }

    #[test]
    fn test_infer_repo_root_walks_up() {
        let (_dir, root) = two_package_fixture();
        let nested = root.resolve(AnchoredUnixPath::new("packages/core").unwrap());
        let (found, manager) = infer_repo_root(&nested).unwrap();
        assert_eq!(found, root);
        assert_eq!(manager, PackageManager::Npm);
    }

    #[test]
    fn test_discovers_packages_and_local_deps() {
        let (_dir, root) = two_package_fixture();
        let workspace = Workspace::discover(&root, PackageManager::Npm).unwrap();

        assert_eq!(workspace.len(), 2);
        let core = workspace.package_by_name("core").unwrap();
        assert_eq!(core.dir.as_str(), "packages/core");
        // External deps are filtered out of local_deps
        assert_eq!(core.local_deps, ["utils"]);

        let utils = workspace
            .package_by_dir(AnchoredUnixPath::new("packages/utils").unwrap())
            .unwrap();
        assert!(utils.local_deps.is_empty());
        assert_eq!(utils.scripts["build"], "echo utils");
    }

    #[test]
    fn test_missing_root_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = AbsoluteSystemPathBuf::try_from(dir.path().canonicalize().unwrap()).unwrap();
        assert!(matches!(
            infer_repo_root(&path),
            Err(Error::MissingRoot { .. })
        ));
    }
}
