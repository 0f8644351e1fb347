//! Directory stager - sources already on the local filesystem.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{bail, Result};

use crate::core::name::PackageName;
use crate::core::spec::ConcreteSpec;
use crate::sources::{Stager, SOURCE_DIR_NAME};
use crate::util::fs::{copy_dir_all, remove_dir_all_if_exists};

/// Copies `<root>/<name>`, or an explicitly mapped directory, into the stage.
#[derive(Debug, Clone, Default)]
pub struct DirectoryStager {
    root: Option<PathBuf>,
    sources: HashMap<PackageName, PathBuf>,
}

impl DirectoryStager {
    /// Look up sources as `<root>/<name>`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        DirectoryStager {
            root: Some(root.into()),
            sources: HashMap::new(),
        }
    }

    /// Only explicitly mapped packages.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Map one package to a source directory. Takes precedence over the root.
    pub fn with_source(mut self, name: impl Into<PackageName>, dir: impl Into<PathBuf>) -> Self {
        self.sources.insert(name.into(), dir.into());
        self
    }

    fn source_for(&self, name: &PackageName) -> Option<PathBuf> {
        self.sources
            .get(name)
            .cloned()
            .or_else(|| self.root.as_ref().map(|root| root.join(name.as_str())))
    }
}

impl Stager for DirectoryStager {
    fn stage(&self, spec: &ConcreteSpec, stage_dir: &Path) -> Result<PathBuf> {
        let name = spec.name();
        let Some(src) = self.source_for(&name) else {
            bail!("no source directory configured for `{}`", name);
        };
        if !src.is_dir() {
            bail!("source directory for `{}` not found: {}", name, src.display());
        }

        let dest = stage_dir.join(SOURCE_DIR_NAME);
        remove_dir_all_if_exists(&dest)?;
        copy_dir_all(&src, &dest)?;
        tracing::debug!(package = %name, from = %src.display(), "staged source directory");
        Ok(dest)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::spec::{CompilerFlags, CompilerSpec};
    use crate::core::variant::VariantSpec;
    use crate::resolver::version::parse_version;
    use tempfile::TempDir;

    fn spec(name: &str) -> ConcreteSpec {
        ConcreteSpec::new(
            PackageName::new(name),
            parse_version("1.0").unwrap(),
            VariantSpec::new(),
            CompilerSpec::default(),
            CompilerFlags::default(),
        )
    }

    #[test]
    fn test_stage_from_root() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("sources");
        std::fs::create_dir_all(root.join("zlib/src")).unwrap();
        std::fs::write(root.join("zlib/CMakeLists.txt"), "project(zlib)").unwrap();
        std::fs::write(root.join("zlib/src/zlib.c"), "int x;").unwrap();

        let stage = tmp.path().join("stage");
        let staged = DirectoryStager::new(&root).stage(&spec("zlib"), &stage).unwrap();

        assert_eq!(staged, stage.join(SOURCE_DIR_NAME));
        assert!(staged.join("CMakeLists.txt").is_file());
        assert!(staged.join("src/zlib.c").is_file());
    }

    #[test]
    fn test_mapping_takes_precedence() {
        let tmp = TempDir::new().unwrap();
        let mapped = tmp.path().join("checkout");
        std::fs::create_dir_all(&mapped).unwrap();
        std::fs::write(mapped.join("configure"), "#!/bin/sh").unwrap();

        let stager = DirectoryStager::new(tmp.path().join("missing")).with_source("m4", &mapped);
        let staged = stager.stage(&spec("m4"), &tmp.path().join("stage")).unwrap();
        assert!(staged.join("configure").is_file());
    }

    #[test]
    fn test_missing_source() {
        let tmp = TempDir::new().unwrap();
        let err = DirectoryStager::new(tmp.path())
            .stage(&spec("zlib"), &tmp.path().join("stage"))
            .unwrap_err();
        assert!(err.to_string().contains("not found"));

        let err = DirectoryStager::empty()
            .stage(&spec("zlib"), &tmp.path().join("stage"))
            .unwrap_err();
        assert!(err.to_string().contains("no source directory"));
    }
}
