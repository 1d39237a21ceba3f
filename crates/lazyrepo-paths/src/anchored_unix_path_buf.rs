use std::{borrow::Borrow, fmt, ops::Deref};

use serde::{Deserialize, Serialize};

use crate::{AnchoredUnixPath, PathError};

/// Owned variant of [`AnchoredUnixPath`].
///
/// Ordering is plain string order over the unix-style rendering, which is
/// exactly the lexicographic order the manifest format sorts file ids by.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AnchoredUnixPathBuf(pub(crate) String);

impl AnchoredUnixPathBuf {
    pub fn new(unchecked_path: impl Into<String>) -> Result<Self, PathError> {
        let path = unchecked_path.into();
        if path.starts_with('/') {
            return Err(PathError::NotRelative(path));
        }

        Ok(Self(path))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl Borrow<AnchoredUnixPath> for AnchoredUnixPathBuf {
    fn borrow(&self) -> &AnchoredUnixPath {
        AnchoredUnixPath::new_unchecked(&self.0)
    }
}

impl AsRef<AnchoredUnixPath> for AnchoredUnixPathBuf {
    fn as_ref(&self) -> &AnchoredUnixPath {
        self.borrow()
    }
}

impl Deref for AnchoredUnixPathBuf {
    type Target = AnchoredUnixPath;

    fn deref(&self) -> &Self::Target {
        self.borrow()
    }
}

impl fmt::Display for AnchoredUnixPathBuf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_sorts_lexicographically() {
        let mut paths = vec![
            AnchoredUnixPathBuf::new("packages/utils/z.js").unwrap(),
            AnchoredUnixPathBuf::new("lazy.config.json").unwrap(),
            AnchoredUnixPathBuf::new("packages/core/index.js").unwrap(),
        ];
        paths.sort();
        let rendered: Vec<_> = paths.iter().map(|p| p.as_str()).collect();
        assert_eq!(
            rendered,
            [
                "lazy.config.json",
                "packages/core/index.js",
                "packages/utils/z.js"
            ]
        );
    }
}
