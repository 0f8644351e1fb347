//! Archive stager - gzip-compressed tarballs named after the spec.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use flate2::read::GzDecoder;
use tar::Archive;

use crate::core::spec::ConcreteSpec;
use crate::sources::{Stager, SOURCE_DIR_NAME};
use crate::util::fs::{ensure_dir, remove_dir_all_if_exists};

/// Extracts `<dir>/<name>-<version>.tar.gz` into the stage.
///
/// Release tarballs usually wrap everything in one `<name>-<version>/`
/// directory; when the archive has exactly one top-level directory, that
/// directory becomes the source root.
#[derive(Debug, Clone)]
pub struct ArchiveStager {
    dir: PathBuf,
}

impl ArchiveStager {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        ArchiveStager { dir: dir.into() }
    }

    pub fn archive_path(&self, spec: &ConcreteSpec) -> PathBuf {
        self.dir
            .join(format!("{}-{}.tar.gz", spec.name(), spec.version()))
    }
}

impl Stager for ArchiveStager {
    fn stage(&self, spec: &ConcreteSpec, stage_dir: &Path) -> Result<PathBuf> {
        let archive = self.archive_path(spec);
        let file = File::open(&archive)
            .with_context(|| format!("failed to open archive: {}", archive.display()))?;

        let dest = stage_dir.join(SOURCE_DIR_NAME);
        remove_dir_all_if_exists(&dest)?;
        extract_tarball(file, &dest)
            .with_context(|| format!("failed to extract {}", archive.display()))?;
        tracing::debug!(package = %spec.name(), archive = %archive.display(), "extracted archive");

        source_root(&dest)
    }
}

/// Extract a gzip-compressed tarball into `dest`.
///
/// Entries that would land outside `dest` are rejected.
pub fn extract_tarball(data: impl Read, dest: &Path) -> Result<()> {
    ensure_dir(dest)?;
    let mut archive = Archive::new(GzDecoder::new(data));

    for entry in archive.entries().context("failed to read tarball entries")? {
        let mut entry = entry.context("failed to read tarball entry")?;
        let entry_path = entry
            .path()
            .context("failed to get entry path")?
            .to_string_lossy()
            .into_owned();

        let unpacked = entry
            .unpack_in(dest)
            .with_context(|| format!("failed to extract {}", entry_path))?;
        if !unpacked {
            bail!("tarball entry escapes destination directory: {}", entry_path);
        }
    }

    Ok(())
}

/// The lone top-level directory of `dest`, or `dest` itself.
fn source_root(dest: &Path) -> Result<PathBuf> {
    let mut entries = Vec::new();
    for entry in std::fs::read_dir(dest)
        .with_context(|| format!("failed to read directory: {}", dest.display()))?
    {
        entries.push(entry?.path());
    }

    match entries.as_slice() {
        [only] if only.is_dir() => Ok(only.clone()),
        _ => Ok(dest.to_path_buf()),
    }
}
