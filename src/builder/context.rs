//! Scoped working directories for phases.
//!
//! Workers share a process, so phases never call `chdir`. Instead each node
//! carries a [`PhaseContext`] whose directory stack decides where its
//! invocations run. Entering a directory returns a [`DirGuard`]; dropping the
//! guard restores the previous directory, on success, on `?` and on panic.

use std::ops::{Deref, DerefMut};
use std::path::{Path, PathBuf};

/// Working-directory stack of one node.
#[derive(Debug, Clone)]
pub struct PhaseContext {
    dirs: Vec<PathBuf>,
}

impl PhaseContext {
    /// A context whose base directory is `root`. The base is never popped.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        PhaseContext {
            dirs: vec![root.into()],
        }
    }

    pub fn current(&self) -> &Path {
        // The base entry is never removed.
        self.dirs.last().map_or(Path::new("."), PathBuf::as_path)
    }

    pub fn depth(&self) -> usize {
        self.dirs.len()
    }

    /// Make `dir` current until the guard drops. Relative paths resolve
    /// against the current directory.
    pub fn enter(&mut self, dir: impl AsRef<Path>) -> DirGuard<'_> {
        let next = self.current().join(dir);
        tracing::trace!(dir = %next.display(), "entering directory");
        self.dirs.push(next);
        DirGuard { cx: self }
    }
}

/// Restores the previous directory on drop.
#[derive(Debug)]
pub struct DirGuard<'a> {
    cx: &'a mut PhaseContext,
}

impl Deref for DirGuard<'_> {
    type Target = PhaseContext;

    fn deref(&self) -> &PhaseContext {
        self.cx
    }
}

impl DerefMut for DirGuard<'_> {
    fn deref_mut(&mut self) -> &mut PhaseContext {
        self.cx
    }
}

impl Drop for DirGuard<'_> {
    fn drop(&mut self) {
        if self.cx.dirs.len() > 1 {
            self.cx.dirs.pop();
        }
    }
}
