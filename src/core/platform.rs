//! Host platform facts consumed by guards and argument builders.

use std::fmt;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Operating system family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsFamily {
    Linux,
    #[serde(rename = "darwin")]
    MacOs,
    Windows,
    Other,
}

impl OsFamily {
    /// The OS the crate was compiled for.
    pub fn host() -> Self {
        if cfg!(target_os = "macos") {
            OsFamily::MacOs
        } else if cfg!(target_os = "linux") {
            OsFamily::Linux
        } else if cfg!(windows) {
            OsFamily::Windows
        } else {
            OsFamily::Other
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            OsFamily::Linux => "linux",
            OsFamily::MacOs => "darwin",
            OsFamily::Windows => "windows",
            OsFamily::Other => "other",
        }
    }

    /// Whether a guard's platform name refers to this family.
    pub fn matches(&self, name: &str) -> bool {
        match self {
            OsFamily::MacOs => matches!(name, "darwin" | "macos"),
            other => other.as_str() == name,
        }
    }
}

impl fmt::Display for OsFamily {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What the argument builder needs to know about the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformFacts {
    pub os: OsFamily,
    /// Prefixes the toolchain searches without being told.
    pub system_paths: Vec<PathBuf>,
}

impl PlatformFacts {
    /// Facts for an OS family with its usual default search prefixes.
    pub fn for_os(os: OsFamily) -> Self {
        let system_paths = match os {
            OsFamily::Windows => Vec::new(),
            _ => ["/", "/usr", "/usr/local"].iter().map(PathBuf::from).collect(),
        };
        PlatformFacts { os, system_paths }
    }

    /// Facts for the running host.
    pub fn host() -> Self {
        Self::for_os(OsFamily::host())
    }

    pub fn linux() -> Self {
        Self::for_os(OsFamily::Linux)
    }

    pub fn macos() -> Self {
        Self::for_os(OsFamily::MacOs)
    }

    pub fn is_macos(&self) -> bool {
        self.os == OsFamily::MacOs
    }

    /// Whether `path` is one of the default search prefixes.
    ///
    /// Comparison is on the path with trailing separators and `.` components
    /// removed, not on the resolved filesystem location.
    pub fn is_system_path(&self, path: &Path) -> bool {
        let normalized: PathBuf = path.components().collect();
        self.system_paths
            .iter()
            .any(|sys| sys.components().collect::<PathBuf>() == normalized)
    }

    /// Drop system prefixes from a list, keeping order.
    pub fn filter_system_paths<'a, I>(&self, paths: I) -> Vec<PathBuf>
    where
        I: IntoIterator<Item = &'a PathBuf>,
    {
        paths
            .into_iter()
            .filter(|p| !self.is_system_path(p))
            .cloned()
            .collect()
    }

    /// The loader token that refers to the binary's own location, when the
    /// platform supports one in install rpaths.
    pub fn self_rpath(&self) -> Option<&'static str> {
        self.is_macos().then_some("@rpath")
    }
}

impl Default for PlatformFacts {
    fn default() -> Self {
        Self::host()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_os_matching() {
        assert!(OsFamily::MacOs.matches("darwin"));
        assert!(OsFamily::MacOs.matches("macos"));
        assert!(OsFamily::Linux.matches("linux"));
        assert!(!OsFamily::Linux.matches("darwin"));
    }

    #[test]
    fn test_system_path_detection() {
        let facts = PlatformFacts::linux();
        assert!(facts.is_system_path(Path::new("/usr")));
        assert!(facts.is_system_path(Path::new("/usr/")));
        assert!(facts.is_system_path(Path::new("/usr/./local")));
        assert!(!facts.is_system_path(Path::new("/usr/lib")));
        assert!(!facts.is_system_path(Path::new("/opt/kiln/zlib")));
    }

    #[test]
    fn test_filter_keeps_order() {
        let facts = PlatformFacts::linux();
        let paths = vec![
            PathBuf::from("/opt/b"),
            PathBuf::from("/usr"),
            PathBuf::from("/opt/a"),
        ];
        assert_eq!(
            facts.filter_system_paths(&paths),
            vec![PathBuf::from("/opt/b"), PathBuf::from("/opt/a")]
        );
    }

    #[test]
    fn test_self_rpath() {
        assert_eq!(PlatformFacts::macos().self_rpath(), Some("@rpath"));
        assert_eq!(PlatformFacts::linux().self_rpath(), None);
    }
}
