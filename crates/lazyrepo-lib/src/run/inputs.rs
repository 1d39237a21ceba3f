//! Input enumeration: the deterministic, deduplicated, sorted list of file
//! paths a task's fingerprint covers.

use std::collections::BTreeSet;

use lazypath::{AbsoluteSystemPath, AnchoredUnixPath, AnchoredUnixPathBuf};
use lazyrepo_config::{BaseCacheConfig, CacheSettings};
use lazyrepo_globwalk::WalkType;

use crate::Error;

const ROOT_DIR_TOKEN: &str = "<rootDir>";

/// Strips the `<rootDir>` prefix so the pattern can be walked relative to
/// the workspace root. Patterns without the token are taken as root-relative
/// already.
fn expand_root_token(pattern: &str) -> String {
    pattern
        .strip_prefix(ROOT_DIR_TOKEN)
        .map(|rest| rest.trim_start_matches('/').to_owned())
        .unwrap_or_else(|| pattern.to_owned())
}

/// Computes a task's input file set, repo-relative and sorted:
/// base-cache includes, plus the package-scoped cache input globs, plus the
/// extra files inherited from upstream outputs. Returns `None` — no set at
/// all — for un-cacheable tasks.
pub fn enumerate_inputs(
    repo_root: &AbsoluteSystemPath,
    package_root: &AbsoluteSystemPath,
    package_dir: Option<&AnchoredUnixPath>,
    settings: Option<&CacheSettings>,
    base: &BaseCacheConfig,
    extra_files: &[AnchoredUnixPathBuf],
) -> Result<Option<Vec<AnchoredUnixPathBuf>>, Error> {
    let Some(settings) = settings else {
        return Ok(None);
    };

    let mut inputs: BTreeSet<AnchoredUnixPathBuf> = BTreeSet::new();

    // Workspace-wide base files (lockfiles, config files) from the root.
    // An empty include list means no base files, so don't fall through to
    // the walker's match-everything behavior.
    let base_includes: Vec<String> = base.includes.iter().map(|p| expand_root_token(p)).collect();
    let base_excludes: Vec<String> = base.excludes.iter().map(|p| expand_root_token(p)).collect();
    if !base_includes.is_empty() {
        inputs.extend(lazyrepo_globwalk::globwalk(
            repo_root,
            &base_includes,
            &base_excludes,
            WalkType::Files,
        )?);
    }

    // Package-scoped inputs, re-anchored to the repo root.
    let package_files = if settings.inputs.include.is_empty() {
        Vec::new()
    } else {
        lazyrepo_globwalk::globwalk(
            package_root,
            &settings.inputs.include,
            &settings.inputs.exclude,
            WalkType::Files,
        )?
    };
    match package_dir {
        Some(package_dir) => {
            inputs.extend(
                package_files
                    .iter()
                    .map(|file| join_anchored(package_dir, file)),
            );
        }
        None => inputs.extend(package_files),
    }

    // Output files of upstream tasks.
    inputs.extend(extra_files.iter().cloned());

    Ok(Some(inputs.into_iter().collect()))
}

/// A task's output files: `cache.outputs` matched under the package
/// directory, re-anchored to the repo root, sorted.
pub fn enumerate_outputs(
    package_root: &AbsoluteSystemPath,
    package_dir: Option<&AnchoredUnixPath>,
    settings: &CacheSettings,
) -> Result<Vec<AnchoredUnixPathBuf>, Error> {
    if settings.outputs.include.is_empty() {
        return Ok(Vec::new());
    }
    let files = lazyrepo_globwalk::globwalk(
        package_root,
        &settings.outputs.include,
        &settings.outputs.exclude,
        WalkType::Files,
    )?;

    Ok(match package_dir {
        Some(package_dir) => files
            .iter()
            .map(|file| join_anchored(package_dir, file))
            .collect(),
        None => files,
    })
}

fn join_anchored(dir: &AnchoredUnixPath, file: &AnchoredUnixPath) -> AnchoredUnixPathBuf {
    AnchoredUnixPathBuf::new(format!("{}/{}", dir.as_str(), file.as_str()))
        .expect("joining anchored paths stays anchored")
}

#[cfg(test)]
mod test {
    use std::fs;

    use lazypath::AbsoluteSystemPathBuf;
    use lazyrepo_config::GlobSpec;

    use super::*;

    fn write(root: &std::path::Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "x").unwrap();
    }

    fn fixture() -> (tempfile::TempDir, AbsoluteSystemPathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        write(root, "yarn.lock");
        write(root, "lazy.config.json");
        write(root, "README.md");
        write(root, "packages/utils/package.json");
        write(root, "packages/utils/index.js");
        write(root, "packages/utils/.out.txt");
        let root = AbsoluteSystemPathBuf::try_from(root.canonicalize().unwrap()).unwrap();
        (dir, root)
    }

    fn rendered(paths: Vec<AnchoredUnixPathBuf>) -> Vec<String> {
        paths.into_iter().map(|p| p.into_inner()).collect()
    }

    #[test]
    fn test_cache_none_yields_no_set() {
        let (_dir, root) = fixture();
        let result = enumerate_inputs(
            &root,
            &root,
            None,
            None,
            &BaseCacheConfig::default(),
            &[],
        )
        .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn test_union_of_base_package_and_extra_files() {
        let (_dir, root) = fixture();
        let package_root = root.resolve(AnchoredUnixPath::new("packages/utils").unwrap());
        let extra = [AnchoredUnixPathBuf::new("packages/other/dist/lib.js").unwrap()];

        let inputs = enumerate_inputs(
            &root,
            &package_root,
            Some(AnchoredUnixPath::new("packages/utils").unwrap()),
            Some(&CacheSettings::default()),
            &BaseCacheConfig::default(),
            &extra,
        )
        .unwrap()
        .unwrap();

        assert_eq!(
            rendered(inputs),
            [
                "lazy.config.json",
                "packages/other/dist/lib.js",
                "packages/utils/index.js",
                "packages/utils/package.json",
                "yarn.lock",
            ]
        );
    }

    #[test]
    fn test_package_exclude_globs_apply() {
        let (_dir, root) = fixture();
        let package_root = root.resolve(AnchoredUnixPath::new("packages/utils").unwrap());
        let settings = CacheSettings {
            inputs: GlobSpec {
                include: vec!["**/*".to_owned()],
                exclude: vec!["*.js".to_owned()],
            },
            ..CacheSettings::default()
        };

        let inputs = enumerate_inputs(
            &root,
            &package_root,
            Some(AnchoredUnixPath::new("packages/utils").unwrap()),
            Some(&settings),
            &BaseCacheConfig { includes: vec![], ..BaseCacheConfig::default() },
            &[],
        )
        .unwrap()
        .unwrap();

        assert_eq!(rendered(inputs), ["packages/utils/package.json"]);
    }

    #[test]
    fn test_outputs_are_reanchored() {
        let (_dir, root) = fixture();
        let package_root = root.resolve(AnchoredUnixPath::new("packages/utils").unwrap());
        write(root.as_str().as_ref(), "packages/utils/dist/out.js");
        let settings = CacheSettings {
            outputs: GlobSpec {
                include: vec!["dist/**/*".to_owned()],
                exclude: vec![],
            },
            ..CacheSettings::default()
        };

        let outputs = enumerate_outputs(
            &package_root,
            Some(AnchoredUnixPath::new("packages/utils").unwrap()),
            &settings,
        )
        .unwrap();
        assert_eq!(rendered(outputs), ["packages/utils/dist/out.js"]);
    }
}
