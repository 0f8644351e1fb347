//! Test utilities and mocks for kiln unit tests.
//!
//! This module provides a recording [`MockExecutor`] for the execution
//! collaborator, a [`FixtureStager`] that fabricates source trees, and
//! fixture registries built from real recipe text.
//!
//! # Example
//!
//! ```rust,ignore
//! use kiln::test_support::{CommandPattern, MockExecutor};
//!
//! let exec = MockExecutor::new().fail_when(CommandPattern::new("make").with_arg("check"), 2);
//! // hand `&exec` to an Orchestrator, then inspect exec.invocations()
//! ```

pub mod fixtures;

use std::path::{Path, PathBuf};
use std::sync::{Mutex, Once};

use anyhow::Result;

use crate::builder::exec::{ExecOutput, Executor, Invocation};
use crate::builder::phases::PREFIX_ENV;
use crate::core::spec::ConcreteSpec;
use crate::sources::{Stager, SOURCE_DIR_NAME};

// Re-export fixtures for convenience
pub use fixtures::*;

/// Install a tracing subscriber once, honoring `RUST_LOG`.
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

#[derive(Debug, Clone)]
enum ToolMatch {
    Exact(String),
    Regex(String),
    Any,
}

/// Pattern for matching invocations in [`MockExecutor`].
#[derive(Debug, Clone)]
pub struct CommandPattern {
    tool: ToolMatch,
    args: Vec<String>,
    dir: Option<String>,
}

impl CommandPattern {
    /// Match a tool by name. Paths match on their file name, so `configure`
    /// matches `/stage/m4/source/configure`.
    pub fn new(tool: impl Into<String>) -> Self {
        CommandPattern {
            tool: ToolMatch::Exact(tool.into()),
            args: Vec::new(),
            dir: None,
        }
    }

    /// Match the full command line against a regex.
    pub fn regex(pattern: impl Into<String>) -> Self {
        CommandPattern {
            tool: ToolMatch::Regex(pattern.into()),
            args: Vec::new(),
            dir: None,
        }
    }

    /// Match any invocation.
    pub fn any() -> Self {
        CommandPattern {
            tool: ToolMatch::Any,
            args: Vec::new(),
            dir: None,
        }
    }

    /// Also require `arg` among the arguments.
    pub fn with_arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Also require a component of the working directory starting with
    /// `prefix`, e.g. a stage directory name like `zlib-1.3.0`.
    pub fn in_dir(mut self, prefix: impl Into<String>) -> Self {
        self.dir = Some(prefix.into());
        self
    }

    /// Check if this pattern matches the given invocation.
    pub fn matches(&self, inv: &Invocation) -> bool {
        let tool = match &self.tool {
            ToolMatch::Exact(name) => {
                inv.tool == *name
                    || Path::new(&inv.tool)
                        .file_name()
                        .is_some_and(|f| f.to_string_lossy() == name.as_str())
            }
            ToolMatch::Regex(pattern) => regex::Regex::new(pattern)
                .map(|re| re.is_match(&inv.command_line()))
                .unwrap_or(false),
            ToolMatch::Any => true,
        };
        let args = self.args.iter().all(|a| inv.args.contains(a));
        let dir = self.dir.as_ref().map_or(true, |prefix| {
            inv.cwd
                .components()
                .any(|c| c.as_os_str().to_string_lossy().starts_with(prefix.as_str()))
        });
        tool && args && dir
    }
}

/// Recording executor.
///
/// Every invocation succeeds unless a response was registered for it.
/// Invocations that name an `install` target create
/// `$KILN_PREFIX/.installed`, so post-install verification sees a populated
/// prefix.
#[derive(Debug, Default)]
pub struct MockExecutor {
    responses: Vec<(CommandPattern, ExecOutput)>,
    calls: Mutex<Vec<Invocation>>,
}

impl MockExecutor {
    /// Create a new mock executor.
    pub fn new() -> Self {
        Self::default()
    }

    /// Respond to matching invocations with `output`. First match wins.
    pub fn respond(mut self, pattern: CommandPattern, output: ExecOutput) -> Self {
        self.responses.push((pattern, output));
        self
    }

    /// Fail matching invocations with exit code `code`.
    pub fn fail_when(self, pattern: CommandPattern, code: i32) -> Self {
        self.respond(pattern, ExecOutput::failure(code, ""))
    }

    /// Every invocation, in the order they were run.
    pub fn invocations(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    /// Command lines of every invocation.
    pub fn calls(&self) -> Vec<String> {
        self.invocations().iter().map(Invocation::command_line).collect()
    }

    /// Invocations whose tool matches `pattern`.
    pub fn matching(&self, pattern: &CommandPattern) -> Vec<Invocation> {
        self.invocations()
            .into_iter()
            .filter(|inv| pattern.matches(inv))
            .collect()
    }
}

impl Executor for MockExecutor {
    fn run(&self, inv: &Invocation) -> Result<ExecOutput> {
        self.calls.lock().unwrap().push(inv.clone());

        if let Some((_, output)) = self.responses.iter().find(|(p, _)| p.matches(inv)) {
            if output.is_success() {
                return Ok(output.clone());
            }
            return Ok(ExecOutput {
                status: output.status,
                output: format!("mock failure: {}\n{}", inv.command_line(), output.output),
            });
        }

        if inv.args.iter().any(|a| a == "install") {
            if let Some(prefix) = inv.env.get(PREFIX_ENV) {
                let prefix = PathBuf::from(prefix);
                std::fs::create_dir_all(&prefix)?;
                std::fs::write(prefix.join(".installed"), inv.command_line())?;
            }
        }
        Ok(ExecOutput::success(format!("mock: {}", inv.command_line())))
    }
}

/// Fabricates a source tree with a single file per package.
#[derive(Debug, Default)]
pub struct FixtureStager {
    fail: Vec<String>,
}

impl FixtureStager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make staging of `name` fail.
    pub fn failing(mut self, name: impl Into<String>) -> Self {
        self.fail.push(name.into());
        self
    }
}

impl Stager for FixtureStager {
    fn stage(&self, spec: &ConcreteSpec, stage_dir: &Path) -> Result<PathBuf> {
        if self.fail.iter().any(|n| spec.name() == n.as_str()) {
            anyhow::bail!("failed to fetch {}", spec.name());
        }
        let source = stage_dir.join(SOURCE_DIR_NAME);
        std::fs::create_dir_all(&source)?;
        std::fs::write(source.join("README"), spec.to_string())?;
        Ok(source)
    }
}

/// Assertion helpers for testing.
pub mod assertions {
    /// Assert that a result is Ok and return the value.
    pub fn assert_ok<T, E: std::fmt::Debug>(result: Result<T, E>) -> T {
        match result {
            Ok(v) => v,
            Err(e) => panic!("expected Ok, got Err: {:?}", e),
        }
    }

    /// Assert that a result is Err and return the error.
    pub fn assert_err<T: std::fmt::Debug, E>(result: Result<T, E>) -> E {
        match result {
            Ok(v) => panic!("expected Err, got Ok: {:?}", v),
            Err(e) => e,
        }
    }

    /// Assert that an error message contains a substring.
    pub fn assert_error_contains<T: std::fmt::Debug, E: std::fmt::Display>(
        result: Result<T, E>,
        substring: &str,
    ) {
        match result {
            Ok(v) => panic!("expected Err containing '{}', got Ok: {:?}", substring, v),
            Err(e) => {
                let msg = e.to_string();
                assert!(
                    msg.contains(substring),
                    "error '{}' does not contain '{}'",
                    msg,
                    substring
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_pattern() {
        let inv = Invocation::new("/stage/m4-1.4.19-abcdef0/source/configure", "/stage/m4-1.4.19-abcdef0/source")
            .arg("--prefix=/opt/m4");

        assert!(CommandPattern::new("configure").matches(&inv));
        assert!(CommandPattern::new("configure").in_dir("m4-1.4").matches(&inv));
        assert!(!CommandPattern::new("configure").in_dir("4-1.4").matches(&inv));
        assert!(!CommandPattern::new("configure").with_arg("--enable-shared").matches(&inv));
        assert!(CommandPattern::regex(r"--prefix=/opt/\w+$").matches(&inv));
        assert!(!CommandPattern::new("make").matches(&inv));
        assert!(CommandPattern::any().matches(&inv));
    }

    #[test]
    fn test_mock_executor_records_and_fails() {
        let exec = MockExecutor::new().fail_when(CommandPattern::new("make").with_arg("check"), 2);

        let ok = exec.run(&Invocation::new("make", "/tmp")).unwrap();
        assert!(ok.is_success());

        let failed = exec.run(&Invocation::new("make", "/tmp").arg("check")).unwrap();
        assert_eq!(failed.status, Some(2));
        assert!(failed.output.contains("make check"));

        assert_eq!(exec.calls(), ["make", "make check"]);
    }

    #[test]
    fn test_install_creates_prefix_marker() {
        let tmp = tempfile::TempDir::new().unwrap();
        let prefix = tmp.path().join("opt/zlib");
        let exec = MockExecutor::new();
        exec.run(
            &Invocation::new("make", tmp.path())
                .arg("install")
                .env(PREFIX_ENV, prefix.display().to_string()),
        )
        .unwrap();
        assert!(prefix.join(".installed").is_file());
    }

    #[test]
    fn test_assertions() {
        use assertions::*;

        let ok_result: Result<i32, &str> = Ok(42);
        assert_eq!(assert_ok(ok_result), 42);

        let err_result: Result<i32, &str> = Err("error");
        assert_eq!(assert_err(err_result), "error");

        assert_error_contains::<(), _>(Err("no such package"), "package");
    }
}
