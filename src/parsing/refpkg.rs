//! Placement reference packages.
//!
//! A reference package is a directory with a `CONTENTS.json` manifest. Only
//! the tree entry is needed here:
//!
//! ```json
//! { "files": { "tree": "gtdb_r202_bac120.tree" } }
//! ```

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::core::tree::ReferenceTree;
use crate::parsing::newick::{parse_newick_file, write_newick};
use crate::parsing::ParseError;

pub const CONTENTS_FILE: &str = "CONTENTS.json";
const DEFAULT_TREE_FILE: &str = "tree.nwk";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackageContents {
    #[serde(default)]
    pub files: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
}

/// A loaded reference package
#[derive(Debug, Clone)]
pub struct ReferencePackage {
    pub dir: PathBuf,
    pub contents: PackageContents,
    pub tree: ReferenceTree,
}

impl ReferencePackage {
    /// Open a package directory and parse its tree
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Io` if the manifest or tree cannot be read,
    /// `ParseError::Json` for a malformed manifest, or
    /// `ParseError::InvalidFormat` if the manifest names no tree.
    pub fn open(dir: &Path) -> Result<Self, ParseError> {
        let manifest = std::fs::read_to_string(dir.join(CONTENTS_FILE))?;
        let contents: PackageContents = serde_json::from_str(&manifest)?;
        let tree_file = contents.files.get("tree").ok_or_else(|| {
            ParseError::InvalidFormat(format!(
                "{} has no 'tree' entry",
                dir.join(CONTENTS_FILE).display()
            ))
        })?;
        let tree = parse_newick_file(&dir.join(tree_file))?;
        Ok(Self {
            dir: dir.to_path_buf(),
            contents,
            tree,
        })
    }

    /// Write a new package containing `tree`.
    ///
    /// Fails if the directory already holds a package: packages are never
    /// overwritten.
    ///
    /// # Errors
    ///
    /// Returns `ParseError::Io` if the directory or files cannot be created,
    /// including when the package already exists.
    pub fn create(dir: &Path, tree: &ReferenceTree, signature: Option<String>) -> Result<Self, ParseError> {
        std::fs::create_dir_all(dir)?;

        let mut contents = PackageContents {
            files: BTreeMap::new(),
            signature,
        };
        contents
            .files
            .insert("tree".to_string(), DEFAULT_TREE_FILE.to_string());

        // Manifest first so a second writer fails before touching the tree
        write_new(&dir.join(CONTENTS_FILE), serde_json::to_string_pretty(&contents)?.as_bytes())?;
        write_new(&dir.join(DEFAULT_TREE_FILE), write_newick(tree).as_bytes())?;

        Ok(Self {
            dir: dir.to_path_buf(),
            contents,
            tree: tree.clone(),
        })
    }
}

/// Write a file that must not exist yet
pub(crate) fn write_new(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new().write(true).create_new(true).open(path)?;
    file.write_all(bytes)?;
    file.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parsing::newick::parse_newick;

    #[test]
    fn test_create_and_open_package() {
        let dir = tempfile::tempdir().unwrap();
        let pkg_dir = dir.path().join("package.1.refpkg");
        let tree = parse_newick("((A:1,B:1):1,C:2);").unwrap();

        ReferencePackage::create(&pkg_dir, &tree, Some("abc".to_string())).unwrap();
        let opened = ReferencePackage::open(&pkg_dir).unwrap();
        assert_eq!(opened.tree.len(), 5);
        assert_eq!(opened.contents.signature.as_deref(), Some("abc"));
    }

    #[test]
    fn test_package_is_never_overwritten() {
        let dir = tempfile::tempdir().unwrap();
        let tree = parse_newick("(A:1,B:1);").unwrap();
        ReferencePackage::create(dir.path(), &tree, None).unwrap();
        let second = ReferencePackage::create(dir.path(), &tree, None);
        assert!(matches!(second, Err(ParseError::Io(_))));
    }

    #[test]
    fn test_manifest_without_tree() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(CONTENTS_FILE), r#"{"files": {}}"#).unwrap();
        assert!(matches!(
            ReferencePackage::open(dir.path()),
            Err(ParseError::InvalidFormat(_))
        ));
    }
}
