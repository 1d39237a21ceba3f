//! Glob-filtered filesystem walking.
//!
//! Yields the files under a base directory that match an include glob set
//! and none of the excludes, as sorted, deduplicated, base-relative unix
//! paths. An empty include list means "everything".
//!
//! Hidden entries (path components starting with `.`) and `node_modules`
//! subtrees are never yielded or descended into. That keeps the runner's
//! own `.lazy` state directory, `.git`, and dot-named scratch files out of
//! every input and output set, matching how the ecosystem's glob libraries
//! treat dotfiles by default.

use std::collections::BTreeSet;

use lazypath::{AbsoluteSystemPath, AnchoredUnixPathBuf};
use wax::{Any, Glob, Pattern};

#[derive(Debug, thiserror::Error)]
pub enum WalkError {
    #[error("bad pattern {0}: {1}")]
    BadPattern(String, Box<wax::BuildError>),
    #[error("walk error: {0}")]
    WalkDir(#[from] walkdir::Error),
    #[error(transparent)]
    Path(#[from] lazypath::PathError),
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum WalkType {
    Files,
    All,
}

impl WalkType {
    fn should_emit(&self, is_dir: bool) -> bool {
        match self {
            WalkType::Files => !is_dir,
            WalkType::All => true,
        }
    }
}

fn glob_with_contextual_error(raw: &str) -> Result<Glob<'static>, WalkError> {
    Glob::new(raw)
        .map(Glob::into_owned)
        .map_err(|e| WalkError::BadPattern(raw.to_owned(), Box::new(e)))
}

/// Compiled include/exclude matcher set over base-relative unix paths.
struct Matchers {
    include: Option<Any<'static>>,
    exclude: Option<Any<'static>>,
}

impl Matchers {
    fn new(include: &[String], exclude: &[String]) -> Result<Self, WalkError> {
        let compile = |patterns: &[String]| -> Result<Option<Any<'static>>, WalkError> {
            if patterns.is_empty() {
                return Ok(None);
            }
            let globs = patterns
                .iter()
                .map(|p| glob_with_contextual_error(p))
                .collect::<Result<Vec<_>, _>>()?;
            wax::any(globs)
                .map(Some)
                .map_err(|e| WalkError::BadPattern(patterns.join(","), Box::new(e)))
        };

        Ok(Self {
            include: compile(include)?,
            exclude: compile(exclude)?,
        })
    }

    fn matches(&self, relative: &str) -> bool {
        let included = self
            .include
            .as_ref()
            .map_or(true, |any| any.is_match(relative));
        let excluded = self
            .exclude
            .as_ref()
            .is_some_and(|any| any.is_match(relative));

        included && !excluded
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().is_some_and(|name| name.starts_with('.'))
}

/// Walks `base`, returning every entry matching `include` minus `exclude`,
/// relative to `base`, sorted. A missing base yields the empty set.
pub fn globwalk(
    base: &AbsoluteSystemPath,
    include: &[String],
    exclude: &[String],
    walk_type: WalkType,
) -> Result<Vec<AnchoredUnixPathBuf>, WalkError> {
    if !base.exists() {
        return Ok(Vec::new());
    }

    let matchers = Matchers::new(include, exclude)?;
    let mut results = BTreeSet::new();

    let mut iter = walkdir::WalkDir::new(base.as_path()).into_iter();
    while let Some(entry) = iter.next() {
        let entry = entry?;
        let is_dir = entry.file_type().is_dir();
        let at_base = entry.depth() == 0;

        if !at_base && (is_hidden(entry.file_name()) || entry.file_name() == "node_modules") {
            if is_dir {
                iter.skip_current_dir();
            }
            continue;
        }
        if at_base {
            continue;
        }

        let path = AbsoluteSystemPath::new(entry.path().to_str().ok_or_else(|| {
            lazypath::PathError::InvalidUnicode(entry.path().to_string_lossy().into_owned())
        })?)?;
        let relative = base.anchor(path)?;

        if walk_type.should_emit(is_dir) && matchers.matches(relative.as_str()) {
            results.insert(relative);
        }
    }

    Ok(results.into_iter().collect())
}
