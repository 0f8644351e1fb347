//! End-to-end pipeline tests.
//!
//! Recipes and sources live in a temporary project; a recording executor
//! stands in for cmake, configure and make so the whole pipeline runs
//! without a toolchain.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use flate2::write::GzEncoder;
use flate2::Compression;
use kiln::builder::events::BuildEvent;
use kiln::builder::exec::{ExecOutput, Executor, Invocation};
use kiln::builder::phases::PREFIX_ENV;
use kiln::builder::state::{FailureReason, Phase};
use kiln::util::config::Config;
use kiln::{
    AbstractSpec, ArchiveStager, BuildOptions, CancelToken, DirectoryStager, GlobalContext,
    NodeState, Orchestrator, PlatformFacts, SpecGraph,
};
use tempfile::TempDir;

const ZLIB: &str = r#"
[package]
name = "zlib"
build-system = "cmake"

[[version]]
version = "1.3.1"

[build]
sanity-check = ["lib/libz.*"]
"#;

const LIBPNG: &str = r#"
[package]
name = "libpng"
build-system = "autotools"

[[version]]
version = "1.6.43"

[[dependency]]
name = "zlib"
type = ["build", "link"]
"#;

const VIEWER: &str = r#"
[package]
name = "viewer"
build-system = "cmake"

[[version]]
version = "2.0.0"

[variants]
png = { default = true }

[[dependency]]
name = "libpng"
when = "+png"

[build]
generator = "Ninja"

[[build.args]]
arg = "-DVIEWER_PNG=ON"
when = "+png"
"#;

/// Records every invocation and fakes installs.
///
/// An `install` target writes `lib/lib<name>.a` into `$KILN_PREFIX`, where
/// `<name>` is taken from the prefix directory name.
#[derive(Default)]
struct RecordingExecutor {
    calls: Mutex<Vec<Invocation>>,
    fail_in: Option<String>,
}

impl RecordingExecutor {
    fn failing_build_of(package: &str) -> Self {
        RecordingExecutor {
            calls: Mutex::new(Vec::new()),
            fail_in: Some(package.to_string()),
        }
    }

    fn calls(&self) -> Vec<Invocation> {
        self.calls.lock().unwrap().clone()
    }

    fn configure_of(&self, package: &str) -> Invocation {
        self.calls()
            .into_iter()
            .find(|inv| {
                let configure = inv.tool == "cmake" || inv.tool.ends_with("configure");
                configure && in_stage_of(inv, package)
            })
            .unwrap_or_else(|| panic!("no configure invocation for {}", package))
    }
}

fn in_stage_of(inv: &Invocation, package: &str) -> bool {
    inv.cwd.components().any(|c| {
        c.as_os_str()
            .to_string_lossy()
            .starts_with(&format!("{}-", package))
    })
}

impl Executor for RecordingExecutor {
    fn run(&self, inv: &Invocation) -> Result<ExecOutput> {
        self.calls.lock().unwrap().push(inv.clone());

        let is_build = inv.args.is_empty() || inv.args.iter().all(|a| a.starts_with("-j"));
        if let Some(package) = &self.fail_in {
            if is_build && (inv.tool == "make" || inv.tool == "ninja") && in_stage_of(inv, package) {
                return Ok(ExecOutput::failure(2, "error: undefined reference to `deflate'"));
            }
        }

        if inv.args.iter().any(|a| a == "install") {
            if let Some(prefix) = inv.env.get(PREFIX_ENV) {
                let prefix = PathBuf::from(prefix);
                let dir_name = prefix.file_name().unwrap().to_string_lossy().into_owned();
                let name = dir_name.split('-').next().unwrap().trim_start_matches("lib");
                let short = if name == "zlib" { "z" } else { name };
                fs::create_dir_all(prefix.join("lib"))?;
                fs::write(prefix.join("lib").join(format!("lib{}.a", short)), "")?;
            }
        }
        Ok(ExecOutput::success(inv.command_line()))
    }
}

struct Project {
    _tmp: TempDir,
    ctx: GlobalContext,
    sources: PathBuf,
}

fn project() -> Project {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().join("project");
    let recipes = root.join("recipes");
    fs::create_dir_all(&recipes).unwrap();
    for (name, text) in [("zlib", ZLIB), ("libpng", LIBPNG), ("viewer", VIEWER)] {
        fs::write(recipes.join(format!("{}.toml", name)), text).unwrap();
    }

    let sources = root.join("sources");
    for name in ["zlib", "libpng", "viewer"] {
        let dir = sources.join(name);
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join("README"), name).unwrap();
    }

    let mut config = Config::default();
    config.paths.recipe_dirs = vec![PathBuf::from("recipes")];
    config.paths.stage_root = Some(PathBuf::from("build/stage"));
    config.paths.install_root = Some(PathBuf::from("build/install"));
    config.build.jobs = Some(2);
    config.build.make_jobs = Some(4);

    let ctx = GlobalContext::from_parts(root, tmp.path().join("home"), config)
        .with_platform(PlatformFacts::linux());
    Project {
        _tmp: tmp,
        ctx,
        sources,
    }
}

fn concretize(ctx: &GlobalContext, registry: &kiln::Registry, request: &str) -> SpecGraph {
    let request: AbstractSpec = request.parse().unwrap();
    ctx.solver(registry).unwrap().solve(&request).unwrap()
}

fn prefix_of(ctx: &GlobalContext, graph: &SpecGraph, name: &str) -> PathBuf {
    ctx.layout().prefix(graph.get(name).unwrap())
}

#[test]
fn test_full_pipeline_builds_in_dependency_order() {
    let p = project();
    let registry = p.ctx.load_registry().unwrap();
    let graph = concretize(&p.ctx, &registry, "viewer");
    let layout = p.ctx.layout();
    let stager = DirectoryStager::new(&p.sources);
    let exec = RecordingExecutor::default();

    let report = Orchestrator::new(&graph, &registry, &layout, &stager, &exec)
        .with_platform(p.ctx.platform().clone())
        .with_options(p.ctx.build_options())
        .run()
        .unwrap();

    assert!(report.success(), "{}", report.to_json());
    assert_eq!(report.verified(), 3);
    assert!(
        report.seq_of("zlib", "verified").unwrap()
            < report.seq_of("libpng", "configuring").unwrap()
    );
    assert!(
        report.seq_of("libpng", "verified").unwrap()
            < report.seq_of("viewer", "configuring").unwrap()
    );
    assert_eq!(
        report.history_of("viewer"),
        [
            &NodeState::Staged,
            &NodeState::Configuring,
            &NodeState::Built,
            &NodeState::Installed,
            &NodeState::Verified,
        ]
    );

    let zlib_prefix = prefix_of(&p.ctx, &graph, "zlib");
    assert!(zlib_prefix.join("lib/libz.a").is_file());

    // autotools: in-source configure against the zlib prefix
    let libpng = exec.configure_of("libpng");
    assert!(libpng.tool.ends_with("source/configure"));
    assert_eq!(
        libpng.args[0],
        format!("--prefix={}", prefix_of(&p.ctx, &graph, "libpng").display())
    );
    let ldflags = libpng.args.iter().find(|a| a.starts_with("LDFLAGS=")).unwrap();
    assert!(ldflags.contains(&format!("-L{}", zlib_prefix.join("lib").display())));

    // cmake: Ninja generator, direct dependency on the prefix path, recipe args last
    let viewer = exec.configure_of("viewer");
    assert_eq!(viewer.tool, "cmake");
    assert!(viewer.args.windows(2).any(|w| w == ["-G", "Ninja"]));
    assert!(viewer.args.iter().any(|a| a
        == &format!(
            "-DCMAKE_PREFIX_PATH:STRING={}",
            prefix_of(&p.ctx, &graph, "libpng").display()
        )));
    assert_eq!(viewer.args.last().map(String::as_str), Some("-DVIEWER_PNG=ON"));
    assert!(exec
        .calls()
        .iter()
        .any(|inv| inv.tool == "ninja" && inv.args == ["-j4"]));
}

#[test]
fn test_variant_prunes_dependency_and_argument() {
    let p = project();
    let registry = p.ctx.load_registry().unwrap();
    let graph = concretize(&p.ctx, &registry, "viewer ~png");
    assert_eq!(graph.len(), 1);

    let layout = p.ctx.layout();
    let stager = DirectoryStager::new(&p.sources);
    let exec = RecordingExecutor::default();
    let report = Orchestrator::new(&graph, &registry, &layout, &stager, &exec)
        .with_platform(PlatformFacts::linux())
        .run()
        .unwrap();

    assert!(report.success());
    let viewer = exec.configure_of("viewer");
    assert!(!viewer.args.iter().any(|a| a.contains("VIEWER_PNG")));
    assert!(viewer.args.contains(&"-DCMAKE_PREFIX_PATH:STRING=".to_string()));
}

#[test]
fn test_build_failure_stops_dependents_only() {
    let p = project();
    let registry = p.ctx.load_registry().unwrap();
    let graph = concretize(&p.ctx, &registry, "viewer");
    let layout = p.ctx.layout();
    let stager = DirectoryStager::new(&p.sources);
    let exec = RecordingExecutor::failing_build_of("libpng");

    let report = Orchestrator::new(&graph, &registry, &layout, &stager, &exec)
        .with_platform(PlatformFacts::linux())
        .run()
        .unwrap();

    assert!(!report.success());
    assert_eq!(report.state("zlib"), Some(&NodeState::Verified));
    match report.state("libpng").and_then(NodeState::failure) {
        Some(FailureReason::PhaseFailed { phase, exit_code, output }) => {
            assert_eq!(*phase, Phase::Build);
            assert_eq!(*exit_code, Some(2));
            assert!(output.contains("undefined reference"));
        }
        other => panic!("expected build failure, got {:?}", other),
    }
    assert_eq!(
        report.state("viewer").and_then(NodeState::failure),
        Some(&FailureReason::DependencyFailed {
            dependency: "libpng".into()
        })
    );
    assert!(!exec.calls().iter().any(|inv| in_stage_of(inv, "viewer")));
}

#[test]
fn test_cancelled_run_executes_nothing() {
    let p = project();
    let registry = p.ctx.load_registry().unwrap();
    let graph = concretize(&p.ctx, &registry, "viewer");
    let layout = p.ctx.layout();
    let stager = DirectoryStager::new(&p.sources);
    let exec = RecordingExecutor::default();

    let cancel = CancelToken::new();
    cancel.cancel_all();
    let report = Orchestrator::new(&graph, &registry, &layout, &stager, &exec)
        .with_platform(PlatformFacts::linux())
        .with_cancel_token(cancel)
        .run()
        .unwrap();

    assert_eq!(report.failed().len(), 3);
    assert_eq!(
        report.state("viewer"),
        Some(&NodeState::Failed(FailureReason::Cancelled))
    );
    assert!(exec.calls().is_empty());
}

#[test]
fn test_event_stream_is_ordered() {
    let p = project();
    let registry = p.ctx.load_registry().unwrap();
    let graph = concretize(&p.ctx, &registry, "viewer");
    let layout = p.ctx.layout();
    let stager = DirectoryStager::new(&p.sources);
    let exec = RecordingExecutor::default();

    let events = Arc::new(Mutex::new(Vec::new()));
    let sink_events = Arc::clone(&events);
    let report = Orchestrator::new(&graph, &registry, &layout, &stager, &exec)
        .with_platform(PlatformFacts::linux())
        .with_options(BuildOptions {
            jobs: 3,
            ..BuildOptions::default()
        })
        .with_event_sink(Box::new(move |e: &BuildEvent| {
            sink_events.lock().unwrap().push(e.to_json());
        }))
        .run()
        .unwrap();
    assert!(report.success());

    let events = events.lock().unwrap();
    assert!(events.first().unwrap().contains("\"build-started\""));
    assert!(events.last().unwrap().contains("\"build-finished\""));

    let seqs: Vec<u64> = report.history.iter().map(|r| r.seq).collect();
    assert!(seqs.windows(2).all(|w| w[0] < w[1]));
}

fn write_tarball(path: &Path, files: &[(&str, &str)]) {
    let file = fs::File::create(path).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));
    for (name, contents) in files {
        let mut header = tar::Header::new_gnu();
        header.set_path(name).unwrap();
        header.set_size(contents.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append(&header, contents.as_bytes()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap().flush().unwrap();
}

#[test]
fn test_archive_staging() {
    let p = project();
    let registry = p.ctx.load_registry().unwrap();
    let graph = concretize(&p.ctx, &registry, "zlib");

    let archives = p.ctx.cwd().join("archives");
    fs::create_dir_all(&archives).unwrap();
    write_tarball(
        &archives.join("zlib-1.3.1.tar.gz"),
        &[("zlib-1.3.1/CMakeLists.txt", "project(zlib C)")],
    );

    let layout = p.ctx.layout();
    let stager = ArchiveStager::new(&archives);
    let exec = RecordingExecutor::default();
    let report = Orchestrator::new(&graph, &registry, &layout, &stager, &exec)
        .with_platform(PlatformFacts::linux())
        .run()
        .unwrap();

    assert!(report.success(), "{}", report.to_json());
    let configure = exec.configure_of("zlib");
    assert!(configure.args[0].ends_with("zlib-1.3.1"));
}
