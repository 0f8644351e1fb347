//! Global context for kiln operations.
//!
//! Provides centralized access to configuration, paths, and platform facts,
//! and assembles the registry, solver and orchestrator options from them.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use crate::builder::layout::Layout;
use crate::builder::orchestrator::BuildOptions;
use crate::core::platform::PlatformFacts;
use crate::core::registry::{Registry, RegistryBuilder};
use crate::resolver::solver::Solver;
use crate::util::config::{
    global_config_dir, load_config, project_config_path, Config, CONFIG_DIR_NAME,
};

/// Global context containing configuration and paths.
#[derive(Debug, Clone)]
pub struct GlobalContext {
    /// Current working directory
    cwd: PathBuf,

    /// Home directory for global kiln data (~/.kiln/)
    home: PathBuf,

    /// Merged global and project configuration
    config: Config,

    platform: PlatformFacts,
}

impl GlobalContext {
    /// Create a new GlobalContext for the current directory.
    pub fn new() -> Result<Self> {
        let cwd = std::env::current_dir().context("failed to get current directory")?;
        Self::with_cwd(cwd)
    }

    /// Create a GlobalContext with a specific working directory.
    ///
    /// Configuration is loaded from `~/.kiln/config.toml` and
    /// `<cwd>/.kiln/config.toml`.
    pub fn with_cwd(cwd: PathBuf) -> Result<Self> {
        let home = global_config_dir().unwrap_or_else(|| PathBuf::from(CONFIG_DIR_NAME));
        let config = load_config(&home.join("config.toml"), &project_config_path(&cwd));
        Ok(Self::from_parts(cwd, home, config))
    }

    /// Assemble a context without touching the user's home directory.
    pub fn from_parts(cwd: PathBuf, home: PathBuf, config: Config) -> Self {
        GlobalContext {
            cwd,
            home,
            config,
            platform: PlatformFacts::host(),
        }
    }

    /// Override the host platform facts.
    pub fn with_platform(mut self, platform: PlatformFacts) -> Self {
        self.platform = platform;
        self
    }

    /// Get the current working directory.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the kiln home directory (~/.kiln/).
    pub fn home(&self) -> &Path {
        &self.home
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn platform(&self) -> &PlatformFacts {
        &self.platform
    }

    /// Get the global configuration file path.
    pub fn config_path(&self) -> PathBuf {
        self.home.join("config.toml")
    }

    /// Get the project-local kiln directory.
    pub fn project_dir(&self) -> PathBuf {
        self.cwd.join(CONFIG_DIR_NAME)
    }

    /// The lockfile written next to the project configuration.
    pub fn lockfile_path(&self) -> PathBuf {
        self.cwd.join("kiln.lock")
    }

    /// Stage root, defaulting to `~/.kiln/stage`.
    pub fn stage_root(&self) -> PathBuf {
        match &self.config.paths.stage_root {
            Some(dir) => self.resolve(dir),
            None => self.home.join("stage"),
        }
    }

    /// Install root, defaulting to `~/.kiln/install`.
    pub fn install_root(&self) -> PathBuf {
        match &self.config.paths.install_root {
            Some(dir) => self.resolve(dir),
            None => self.home.join("install"),
        }
    }

    pub fn layout(&self) -> Layout {
        Layout::new(self.stage_root(), self.install_root())
    }

    /// Recipe directories in scan order.
    ///
    /// Relative entries are taken from the working directory. With nothing
    /// configured, `.kiln/recipes` in the project is used.
    pub fn recipe_dirs(&self) -> Vec<PathBuf> {
        if self.config.paths.recipe_dirs.is_empty() {
            return vec![self.project_dir().join("recipes")];
        }
        self.config
            .paths
            .recipe_dirs
            .iter()
            .map(|d| self.resolve(d))
            .collect()
    }

    /// Load every recipe directory into a frozen registry.
    ///
    /// Missing directories are skipped with a warning.
    pub fn load_registry(&self) -> Result<Registry> {
        let mut builder = RegistryBuilder::new();
        if self.config.defaults.implicit_cmake {
            builder = builder.with_implicit_cmake();
        }
        for dir in self.recipe_dirs() {
            if !dir.is_dir() {
                tracing::warn!(dir = %dir.display(), "recipe directory not found, skipping");
                continue;
            }
            builder.load_dir(&dir).map_err(anyhow::Error::new)?;
        }
        Ok(builder.freeze())
    }

    /// A solver over `registry` seeded with the configured compiler defaults.
    pub fn solver<'r>(&self, registry: &'r Registry) -> Result<Solver<'r>> {
        let mut solver = Solver::new(registry, self.platform.clone());
        if let Some(compiler) = self.config.compiler()? {
            solver = solver.with_default_compiler(compiler);
        }
        if !self.config.defaults.flags.is_empty() {
            solver = solver.with_default_flags(self.config.defaults.flags.clone());
        }
        Ok(solver)
    }

    pub fn build_options(&self) -> BuildOptions {
        self.config.build_options()
    }

    /// Ensure a directory exists, creating it if necessary.
    pub fn ensure_dir(&self, path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::create_dir_all(path)
                .with_context(|| format!("failed to create directory: {}", path.display()))?;
        }
        Ok(())
    }

    fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.cwd.join(path)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::spec::{AbstractSpec, CompilerSpec};
    use crate::test_support::write_recipes;
    use tempfile::TempDir;

    fn context(tmp: &TempDir, config: Config) -> GlobalContext {
        GlobalContext::from_parts(
            tmp.path().join("project"),
            tmp.path().join("home"),
            config,
        )
        .with_platform(PlatformFacts::linux())
    }

    #[test]
    fn test_context_paths() {
        let ctx = GlobalContext::new().unwrap();
        assert!(ctx.cwd().is_absolute());
        assert!(ctx.home().to_string_lossy().contains("kiln"));
    }

    #[test]
    fn test_default_layout_under_home() {
        let tmp = TempDir::new().unwrap();
        let ctx = context(&tmp, Config::default());

        let layout = ctx.layout();
        assert_eq!(layout.stage_root(), tmp.path().join("home/stage"));
        assert_eq!(layout.install_root(), tmp.path().join("home/install"));
        assert_eq!(
            ctx.recipe_dirs(),
            vec![tmp.path().join("project/.kiln/recipes")]
        );
    }

    #[test]
    fn test_configured_paths_resolve_against_cwd() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.stage_root = Some(PathBuf::from("build/stage"));
        config.paths.install_root = Some(PathBuf::from("/opt/kiln"));
        config.paths.recipe_dirs = vec![PathBuf::from("recipes")];
        let ctx = context(&tmp, config);

        assert_eq!(ctx.stage_root(), tmp.path().join("project/build/stage"));
        assert_eq!(ctx.install_root(), PathBuf::from("/opt/kiln"));
        assert_eq!(ctx.recipe_dirs(), vec![tmp.path().join("project/recipes")]);
    }

    #[test]
    fn test_with_cwd_reads_project_config() {
        let tmp = TempDir::new().unwrap();
        let mut project = Config::default();
        project.build.make_jobs = Some(7);
        project.save(&project_config_path(tmp.path())).unwrap();

        let ctx = GlobalContext::with_cwd(tmp.path().to_path_buf()).unwrap();
        assert_eq!(ctx.build_options().make_jobs, Some(7));
    }

    #[test]
    fn test_load_registry_skips_missing_dirs() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.recipe_dirs = vec![PathBuf::from("missing"), PathBuf::from("recipes")];
        let ctx = context(&tmp, config);
        write_recipes(&ctx.cwd().join("recipes"));

        let registry = ctx.load_registry().unwrap();
        assert!(registry.contains("octave"));
        assert!(registry.contains("zlib"));
    }

    #[test]
    fn test_implicit_cmake_from_config() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.defaults.implicit_cmake = true;
        let ctx = context(&tmp, config);
        let recipes = ctx.project_dir().join("recipes");
        write_recipes(&recipes);
        std::fs::write(
            recipes.join("cmake.toml"),
            "[package]\nname = \"cmake\"\nbuild-system = \"autotools\"\n\n[[version]]\nversion = \"3.27.9\"\n",
        )
        .unwrap();

        let registry = ctx.load_registry().unwrap();
        let zlib = registry.lookup("zlib").unwrap();
        assert!(zlib.dependencies().iter().any(|d| d.name() == "cmake"));
    }

    #[test]
    fn test_duplicate_recipes_across_dirs_fail() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.paths.recipe_dirs = vec![PathBuf::from("a"), PathBuf::from("b")];
        let ctx = context(&tmp, config);
        write_recipes(&ctx.cwd().join("a"));
        write_recipes(&ctx.cwd().join("b"));

        let err = ctx.load_registry().unwrap_err();
        assert!(err.to_string().contains("already registered"));
    }

    #[test]
    fn test_solver_uses_configured_compiler() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.defaults.compiler = Some("clang@17".to_string());
        config.defaults.flags.cflags = vec!["-O3".to_string()];
        let ctx = context(&tmp, config);
        write_recipes(&ctx.project_dir().join("recipes"));

        let registry = ctx.load_registry().unwrap();
        let graph = ctx
            .solver(&registry)
            .unwrap()
            .solve(&"zlib".parse::<AbstractSpec>().unwrap())
            .unwrap();
        let zlib = graph.root();
        assert_eq!(zlib.compiler(), &CompilerSpec::new("clang").with_version("17"));
        assert_eq!(zlib.flags().cflags, vec!["-O3"]);
    }

    #[test]
    fn test_invalid_compiler_is_reported() {
        let tmp = TempDir::new().unwrap();
        let mut config = Config::default();
        config.defaults.compiler = Some("@12".to_string());
        let ctx = context(&tmp, config);

        let registry = RegistryBuilder::new().freeze();
        assert!(ctx.solver(&registry).is_err());
    }
}
