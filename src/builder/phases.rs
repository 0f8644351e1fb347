//! Phase commands.
//!
//! Turns a binding plus the node's directories into the invocations for each
//! phase. Nothing here runs a process.

use std::path::{Path, PathBuf};

use crate::builder::cmake::primary_generator;
use crate::builder::exec::{ExecOutput, Invocation};
use crate::builder::state::Phase;
use crate::core::binding::{BuildSystem, BuildSystemBinding};

/// Install prefix, exported to every invocation.
pub const PREFIX_ENV: &str = "KILN_PREFIX";

/// Test parallelism for CTest-driven `test` targets.
pub const CTEST_PARALLEL_ENV: &str = "CTEST_PARALLEL_LEVEL";

/// The make-like tool that drives build, test and install.
pub fn build_tool(binding: &BuildSystemBinding) -> &'static str {
    match binding.system() {
        BuildSystem::CMake if primary_generator(binding.generator()) == "Ninja" => "ninja",
        _ => "make",
    }
}

/// Invocations for one node.
#[derive(Debug, Clone)]
pub struct PhaseCommands<'a> {
    binding: &'a BuildSystemBinding,
    source_root: PathBuf,
    build_dir: PathBuf,
    prefix: PathBuf,
    make_jobs: Option<usize>,
}

impl<'a> PhaseCommands<'a> {
    /// `staged` is the directory the stager returned.
    pub fn new(
        binding: &'a BuildSystemBinding,
        stage_dir: &Path,
        staged: &Path,
        prefix: &Path,
        make_jobs: Option<usize>,
    ) -> Self {
        let source_root = binding.source_root(staged);
        let build_dir = binding.system().build_dir(stage_dir, &source_root);
        PhaseCommands {
            binding,
            source_root,
            build_dir,
            prefix: prefix.to_path_buf(),
            make_jobs,
        }
    }

    pub fn source_root(&self) -> &Path {
        &self.source_root
    }

    /// Where configure and every later phase run.
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    pub fn configure(&self, args: &[String]) -> Invocation {
        let tool = match self.binding.system() {
            BuildSystem::CMake => "cmake".to_string(),
            BuildSystem::Autotools => self.source_root.join("configure").display().to_string(),
        };
        self.base(tool).args(args.iter().cloned())
    }

    pub fn build(&self) -> Invocation {
        self.make(self.binding.build_targets())
    }

    /// Test targets in the order they run.
    pub fn test_targets(&self) -> &[String] {
        self.binding.test_targets()
    }

    /// Ask the build tool whether `target` exists, without building it.
    ///
    /// `make -q` exits 2 for an unknown target and 0 or 1 otherwise;
    /// `ninja -t query` fails for an unknown target.
    pub fn query_target(&self, target: &str) -> Invocation {
        let tool = build_tool(self.binding);
        let inv = self.base(tool.to_string());
        match tool {
            "ninja" => inv.args(["-t", "query", target]),
            _ => inv.args(["-q", target]),
        }
    }

    /// Whether a query from [`query_target`](Self::query_target) found the
    /// target.
    pub fn target_exists(&self, query: &ExecOutput) -> bool {
        match build_tool(self.binding) {
            "ninja" => query.is_success(),
            _ => matches!(query.status, Some(0 | 1)),
        }
    }

    /// Run one test target. `test` is CTest's target and gets its
    /// parallelism from the job count.
    pub fn test_target(&self, target: &str) -> Invocation {
        let mut inv = self.make(&[target.to_string()]);
        if target == "test" {
            if let Some(jobs) = self.make_jobs {
                inv = inv.env(CTEST_PARALLEL_ENV, jobs.to_string());
            }
        }
        inv
    }

    pub fn install(&self) -> Invocation {
        self.make(self.binding.install_targets())
    }

    /// The invocation for configure, build or install.
    ///
    /// Stage and verify run no tools, and test runs once per existing
    /// target, so all three yield `None`.
    pub fn for_phase(&self, phase: Phase, configure_args: &[String]) -> Option<Invocation> {
        match phase {
            Phase::Configure => Some(self.configure(configure_args)),
            Phase::Build => Some(self.build()),
            Phase::Install => Some(self.install()),
            Phase::Stage | Phase::Test | Phase::Verify => None,
        }
    }

    fn make(&self, targets: &[String]) -> Invocation {
        let mut inv = self.base(build_tool(self.binding).to_string());
        if let Some(jobs) = self.make_jobs {
            inv = inv.arg(format!("-j{}", jobs));
        }
        inv.args(targets.iter().cloned())
    }

    fn base(&self, tool: String) -> Invocation {
        Invocation::new(tool, &self.build_dir).env(PREFIX_ENV, self.prefix.display().to_string())
    }
}
