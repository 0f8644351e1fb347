//! Configuration file support for kiln.
//!
//! kiln reads two configuration files:
//! - Global: `~/.kiln/config.toml` - User-wide defaults
//! - Project: `.kiln/config.toml` - Project-specific overrides
//!
//! Project config takes precedence over global config.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::builder::orchestrator::BuildOptions;
use crate::core::spec::{CompilerFlags, CompilerSpec};

/// Name of the per-user and per-project configuration directory.
pub const CONFIG_DIR_NAME: &str = ".kiln";

/// kiln configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Build settings
    pub build: BuildConfig,

    /// Stage, install and recipe locations
    pub paths: PathsConfig,

    /// Compiler defaults applied when a request names none
    pub defaults: DefaultsConfig,
}

/// Build-related configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct BuildConfig {
    /// Nodes built concurrently (None = auto-detect)
    pub jobs: Option<usize>,

    /// `-j` passed to make and ninja
    pub make_jobs: Option<usize>,

    /// Run the test phase
    pub run_tests: bool,

    /// Fail the node when its test phase fails
    pub tests_fatal: bool,
}

/// Filesystem locations.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct PathsConfig {
    pub stage_root: Option<PathBuf>,
    pub install_root: Option<PathBuf>,

    /// Directories scanned for `*.toml` recipes, in order
    pub recipe_dirs: Vec<PathBuf>,
}

/// Solver defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DefaultsConfig {
    /// Compiler in `name` or `name@version` form
    pub compiler: Option<String>,

    pub flags: CompilerFlags,

    /// Make CMake packages build-depend on a registered `cmake` recipe
    #[serde(rename = "implicit-cmake")]
    pub implicit_cmake: bool,
}

impl Config {
    /// Load configuration from a file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        toml::from_str(&contents)
            .with_context(|| format!("failed to parse config file: {}", path.display()))
    }

    /// Load configuration with fallback to defaults if file doesn't exist.
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            Self::load(path).unwrap_or_else(|e| {
                tracing::warn!("Failed to load config from {}: {:#}", path.display(), e);
                Self::default()
            })
        } else {
            Self::default()
        }
    }

    /// Save configuration to a file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create directory: {}", parent.display()))?;
        }

        let contents = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, contents)
            .with_context(|| format!("failed to write config file: {}", path.display()))
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(&mut self, other: Config) {
        if other.build.jobs.is_some() {
            self.build.jobs = other.build.jobs;
        }
        if other.build.make_jobs.is_some() {
            self.build.make_jobs = other.build.make_jobs;
        }
        if other.build.run_tests {
            self.build.run_tests = true;
        }
        if other.build.tests_fatal {
            self.build.tests_fatal = true;
        }

        if other.paths.stage_root.is_some() {
            self.paths.stage_root = other.paths.stage_root;
        }
        if other.paths.install_root.is_some() {
            self.paths.install_root = other.paths.install_root;
        }
        // Project recipe directories are scanned first.
        if !other.paths.recipe_dirs.is_empty() {
            let mut dirs = other.paths.recipe_dirs;
            for dir in std::mem::take(&mut self.paths.recipe_dirs) {
                if !dirs.contains(&dir) {
                    dirs.push(dir);
                }
            }
            self.paths.recipe_dirs = dirs;
        }

        if other.defaults.compiler.is_some() {
            self.defaults.compiler = other.defaults.compiler;
        }
        if other.defaults.implicit_cmake {
            self.defaults.implicit_cmake = true;
        }
        // Flag groups are replaced wholesale, never concatenated.
        if !other.defaults.flags.is_empty() {
            self.defaults.flags = other.defaults.flags;
        }
    }

    /// Parse the default compiler, if one is configured.
    pub fn compiler(&self) -> Result<Option<CompilerSpec>> {
        self.defaults
            .compiler
            .as_deref()
            .map(|s| {
                s.parse::<CompilerSpec>()
                    .with_context(|| format!("invalid default compiler `{}`", s))
            })
            .transpose()
    }

    /// Orchestrator options, with unset values taken from [`BuildOptions::default`].
    pub fn build_options(&self) -> BuildOptions {
        let defaults = BuildOptions::default();
        BuildOptions {
            jobs: self.build.jobs.filter(|&n| n > 0).unwrap_or(defaults.jobs),
            make_jobs: self.build.make_jobs.filter(|&n| n > 0),
            run_tests: self.build.run_tests,
            tests_fatal: self.build.tests_fatal,
        }
    }
}

/// The per-user configuration directory, `~/.kiln`.
pub fn global_config_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(CONFIG_DIR_NAME))
}

/// The global configuration file, `~/.kiln/config.toml`.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|d| d.join("config.toml"))
}

/// The project configuration file under `root`.
pub fn project_config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_DIR_NAME).join("config.toml")
}

/// Load merged configuration from global and project locations.
///
/// Order of precedence (highest to lowest):
/// 1. Project config (.kiln/config.toml)
/// 2. Global config (~/.kiln/config.toml)
/// 3. Defaults
pub fn load_config(global_path: &Path, project_path: &Path) -> Config {
    let mut config = Config::default();

    if global_path.exists() {
        config.merge(Config::load_or_default(global_path));
    }

    if project_path.exists() {
        config.merge(Config::load_or_default(project_path));
    }

    config
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert!(config.build.jobs.is_none());
        assert!(!config.build.run_tests);
        assert!(config.paths.recipe_dirs.is_empty());
        assert!(config.compiler().unwrap().is_none());
    }

    #[test]
    fn test_config_load() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");

        std::fs::write(
            &config_path,
            r#"
[build]
jobs = 8
make-jobs = 16
run-tests = true

[paths]
stage-root = "/var/tmp/kiln/stage"
recipe-dirs = ["recipes", "/opt/recipes"]

[defaults]
compiler = "clang@17"

[defaults.flags]
cflags = ["-O2"]
"#,
        )
        .unwrap();

        let config = Config::load(&config_path).unwrap();
        assert_eq!(config.build.jobs, Some(8));
        assert_eq!(config.build.make_jobs, Some(16));
        assert!(config.build.run_tests);
        assert!(!config.build.tests_fatal);
        assert_eq!(
            config.paths.stage_root,
            Some(PathBuf::from("/var/tmp/kiln/stage"))
        );
        assert_eq!(config.paths.recipe_dirs.len(), 2);
        assert_eq!(config.defaults.flags.cflags, vec!["-O2"]);
        assert_eq!(
            config.compiler().unwrap(),
            Some(CompilerSpec::new("clang").with_version("17"))
        );
    }

    #[test]
    fn test_config_load_rejects_unknown_types() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(&config_path, "[build]\njobs = \"many\"\n").unwrap();

        assert!(Config::load(&config_path).is_err());
        assert_eq!(Config::load_or_default(&config_path), Config::default());
    }

    #[test]
    fn test_invalid_compiler() {
        let mut config = Config::default();
        config.defaults.compiler = Some("gcc@".to_string());
        let err = config.compiler().unwrap_err();
        assert!(err.to_string().contains("gcc@"));
    }

    #[test]
    fn test_config_merge() {
        let mut base = Config::default();
        base.build.jobs = Some(4);
        base.build.make_jobs = Some(2);
        base.paths.recipe_dirs = vec![PathBuf::from("/global/recipes")];
        base.defaults.flags.cflags = vec!["-O2".to_string()];

        let mut project = Config::default();
        project.build.make_jobs = Some(12);
        project.paths.recipe_dirs = vec![PathBuf::from("recipes")];
        project.defaults.flags.cxxflags = vec!["-std=c++17".to_string()];
        project.defaults.implicit_cmake = true;

        base.merge(project);
        assert!(base.defaults.implicit_cmake);

        assert_eq!(base.build.jobs, Some(4));
        assert_eq!(base.build.make_jobs, Some(12));
        assert_eq!(
            base.paths.recipe_dirs,
            vec![PathBuf::from("recipes"), PathBuf::from("/global/recipes")]
        );
        // Flags are replaced, not merged
        assert!(base.defaults.flags.cflags.is_empty());
        assert_eq!(base.defaults.flags.cxxflags, vec!["-std=c++17"]);
    }

    #[test]
    fn test_config_save_round_trips() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("nested").join("config.toml");

        let mut config = Config::default();
        config.build.jobs = Some(3);
        config.defaults.compiler = Some("gcc@12.2".to_string());
        config.paths.install_root = Some(PathBuf::from("/opt/kiln"));

        config.save(&config_path).unwrap();
        assert_eq!(Config::load(&config_path).unwrap(), config);
    }

    #[test]
    fn test_build_options() {
        let mut config = Config::default();
        config.build.jobs = Some(2);
        config.build.make_jobs = Some(0);
        config.build.run_tests = true;

        let options = config.build_options();
        assert_eq!(options.jobs, 2);
        assert_eq!(options.make_jobs, None);
        assert!(options.run_tests);
        assert!(!options.tests_fatal);

        config.build.jobs = None;
        assert!(config.build_options().jobs >= 1);
    }

    #[test]
    fn test_load_config_precedence() {
        let tmp = TempDir::new().unwrap();
        let global_path = tmp.path().join("global.toml");
        let project_path = project_config_path(tmp.path());

        std::fs::write(
            &global_path,
            r#"
[build]
jobs = 2
tests-fatal = true

[defaults]
compiler = "gcc"
"#,
        )
        .unwrap();

        std::fs::create_dir_all(project_path.parent().unwrap()).unwrap();
        std::fs::write(
            &project_path,
            r#"
[build]
jobs = 6

[defaults]
compiler = "clang"
"#,
        )
        .unwrap();

        let config = load_config(&global_path, &project_path);
        assert_eq!(config.build.jobs, Some(6));
        assert!(config.build.tests_fatal);
        assert_eq!(config.defaults.compiler.as_deref(), Some("clang"));
    }

    #[test]
    fn test_load_config_missing_files() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(&tmp.path().join("a.toml"), &tmp.path().join("b.toml"));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_project_config_path() {
        assert_eq!(
            project_config_path(Path::new("/work/app")),
            PathBuf::from("/work/app/.kiln/config.toml")
        );
    }
}
