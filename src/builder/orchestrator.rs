//! Build orchestration.
//!
//! Runs a concretized [`SpecGraph`] through stage, configure, build, test,
//! install and verify. The scheduler runs on the caller's thread inside a
//! rayon scope and owns all node state; workers only report back over a
//! channel. A node is dispatched for configure once every build and link
//! dependency is `Verified`, so independent subtrees build concurrently and
//! a failure only reaches the nodes that depend on it.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use petgraph::graph::NodeIndex;
use serde::Serialize;

use crate::builder::args::{self, ArgInput};
use crate::builder::context::PhaseContext;
use crate::builder::events::{BuildEvent, EventSink};
use crate::builder::exec::{Executor, Invocation};
use crate::builder::layout::Layout;
use crate::builder::phases::PhaseCommands;
use crate::builder::state::{FailureReason, NodeState, Phase, PhaseResult};
use crate::core::binding::BuildSystemBinding;
use crate::core::dependency::DepTypes;
use crate::core::name::PackageName;
use crate::core::platform::PlatformFacts;
use crate::core::registry::Registry;
use crate::core::spec::ConcreteSpec;
use crate::resolver::SpecGraph;
use crate::sources::Stager;
use crate::util::fs::{dir_has_entries, ensure_dir, glob_paths};

/// How often the scheduler wakes up to observe cancellation.
const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Phases run after the gate, in order.
const BUILD_PHASES: [Phase; 5] = [
    Phase::Configure,
    Phase::Build,
    Phase::Test,
    Phase::Install,
    Phase::Verify,
];

/// Knobs for one orchestration run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Nodes worked on concurrently.
    pub jobs: usize,
    /// `-j` passed to make and ninja.
    pub make_jobs: Option<usize>,
    pub run_tests: bool,
    /// Whether a failing test phase fails the node.
    pub tests_fatal: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        BuildOptions {
            jobs: std::thread::available_parallelism()
                .map(|n| n.get())
                .unwrap_or(4),
            make_jobs: None,
            run_tests: false,
            tests_fatal: false,
        }
    }
}

/// Cancels nodes, or the whole run, from any thread.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

#[derive(Debug, Default)]
struct CancelState {
    all: AtomicBool,
    nodes: Mutex<HashSet<PackageName>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel_all(&self) {
        self.inner.all.store(true, Ordering::SeqCst);
    }

    pub fn cancel(&self, package: impl Into<PackageName>) {
        self.inner
            .nodes
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(package.into());
    }

    pub fn is_cancelled(&self, package: &PackageName) -> bool {
        self.inner.all.load(Ordering::SeqCst)
            || self
                .inner
                .nodes
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .contains(package)
    }
}

/// One entry of the global state history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StateRecord {
    pub seq: u64,
    pub package: PackageName,
    #[serde(flatten)]
    pub state: NodeState,
}

/// Final outcome of one node.
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub package: PackageName,
    pub hash: String,
    pub prefix: PathBuf,
    pub state: NodeState,
    pub phases: Vec<PhaseResult>,
}

impl NodeReport {
    pub fn phase(&self, phase: Phase) -> Option<&PhaseResult> {
        self.phases.iter().find(|r| r.phase == phase)
    }
}

/// Everything an orchestration run produced.
#[derive(Debug, Clone, Serialize)]
pub struct BuildReport {
    /// In graph order, root first.
    pub nodes: Vec<NodeReport>,
    pub history: Vec<StateRecord>,
    #[serde(rename = "duration_ms", serialize_with = "as_millis")]
    pub duration: Duration,
}

impl BuildReport {
    /// Whether every node was verified.
    pub fn success(&self) -> bool {
        self.nodes.iter().all(|n| n.state == NodeState::Verified)
    }

    pub fn node(&self, package: &str) -> Option<&NodeReport> {
        self.nodes.iter().find(|n| n.package == package)
    }

    pub fn state(&self, package: &str) -> Option<&NodeState> {
        self.node(package).map(|n| &n.state)
    }

    pub fn verified(&self) -> usize {
        self.nodes
            .iter()
            .filter(|n| n.state == NodeState::Verified)
            .count()
    }

    pub fn failed(&self) -> Vec<&NodeReport> {
        self.nodes.iter().filter(|n| n.state.is_failed()).collect()
    }

    /// States one package went through, in order.
    pub fn history_of(&self, package: &str) -> Vec<&NodeState> {
        self.history
            .iter()
            .filter(|r| r.package == package)
            .map(|r| &r.state)
            .collect()
    }

    /// Sequence number at which `package` first reached `state`.
    pub fn seq_of(&self, package: &str, state: &str) -> Option<u64> {
        self.history
            .iter()
            .find(|r| r.package == package && r.state.name() == state)
            .map(|r| r.seq)
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string_pretty(self).unwrap_or_default()
    }
}

fn as_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(d.as_millis() as u64)
}

/// Drives a concretized graph to installed prefixes.
pub struct Orchestrator<'a> {
    graph: &'a SpecGraph,
    registry: &'a Registry,
    layout: &'a Layout,
    stager: &'a dyn Stager,
    executor: &'a dyn Executor,
    platform: PlatformFacts,
    options: BuildOptions,
    cancel: CancelToken,
    sink: Option<EventSink>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        graph: &'a SpecGraph,
        registry: &'a Registry,
        layout: &'a Layout,
        stager: &'a dyn Stager,
        executor: &'a dyn Executor,
    ) -> Self {
        Orchestrator {
            graph,
            registry,
            layout,
            stager,
            executor,
            platform: PlatformFacts::host(),
            options: BuildOptions::default(),
            cancel: CancelToken::new(),
            sink: None,
        }
    }

    pub fn with_platform(mut self, platform: PlatformFacts) -> Self {
        self.platform = platform;
        self
    }

    pub fn with_options(mut self, options: BuildOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn with_event_sink(mut self, sink: EventSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// A handle that cancels this run.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Build every node of the graph.
    ///
    /// Node failures are recorded in the report; `Err` is reserved for the
    /// scheduler itself failing.
    pub fn run(self) -> Result<BuildReport> {
        let start = Instant::now();
        let Orchestrator {
            graph,
            registry,
            layout,
            stager,
            executor,
            platform,
            options,
            cancel,
            sink,
        } = self;

        let jobs = options.jobs.max(1);
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(jobs)
            .thread_name(|i| format!("kiln-worker-{}", i))
            .build()
            .context("failed to create build thread pool")?;

        let mut sched = Scheduler::new(graph, sink);
        sched.emit(BuildEvent::BuildStarted {
            root: graph.root().to_string(),
            package_count: graph.len(),
            jobs,
        });
        tracing::info!(root = %graph.root(), packages = graph.len(), jobs, "starting build");

        let order = graph.build_order();
        let mut bindings: Vec<Option<&BuildSystemBinding>> = vec![None; graph.len()];
        for &idx in &order {
            let spec = graph.spec(idx);
            let checked = registry
                .lookup(spec.name().as_str())
                .map_err(|e| e.to_string())
                .and_then(|decl| {
                    args::preflight(spec, decl.binding())
                        .map(|()| decl.binding())
                        .map_err(|e| e.to_string())
                });
            match checked {
                Ok(binding) => bindings[idx.index()] = Some(binding),
                Err(message) => {
                    tracing::warn!(package = %spec.name(), %message, "rejected before staging");
                    sched.fail(idx, FailureReason::ArgumentsRejected { message });
                }
            }
        }
        sched.reap_cancelled(&cancel);

        let (tx, rx) = mpsc::channel::<WorkerMsg>();

        pool.in_place_scope(|s| -> Result<()> {
            for &idx in &order {
                if sched.nodes[idx.index()].state.is_terminal() {
                    continue;
                }
                sched.nodes[idx.index()].running = true;
                let spec = graph.spec(idx);
                let stage_dir = layout.stage_dir(spec);
                let tx = tx.clone();
                let cancel = cancel.clone();
                s.spawn(move |_| stage_node(idx, spec, &stage_dir, stager, &cancel, &tx));
            }

            loop {
                for idx in sched.ready(&order) {
                    let Some(binding) = bindings[idx.index()] else {
                        continue;
                    };
                    let spec = graph.spec(idx);
                    let prefix = layout.prefix(spec);
                    let Some(source) = sched.nodes[idx.index()].source.clone() else {
                        continue;
                    };
                    let configure_args =
                        match node_configure_args(graph, layout, &platform, idx, binding, &source) {
                            Ok(a) => a,
                            Err(e) => {
                                sched.fail(idx, FailureReason::ArgumentsRejected { message: e.to_string() });
                                continue;
                            }
                        };
                    if !sched.transition(idx, NodeState::Configuring) {
                        continue;
                    }
                    sched.nodes[idx.index()].running = true;

                    let job = NodeJob {
                        idx,
                        package: spec.name(),
                        binding,
                        stage_dir: layout.stage_dir(spec),
                        source,
                        prefix,
                        configure_args,
                    };
                    let tx = tx.clone();
                    let cancel = cancel.clone();
                    s.spawn(move |_| build_node(&job, executor, options, &cancel, &tx));
                }

                if sched.all_terminal() {
                    break;
                }
                if !sched.any_running() {
                    bail!("build stalled with no runnable packages");
                }

                match rx.recv_timeout(POLL_INTERVAL) {
                    Ok(msg) => sched.handle(msg),
                    Err(RecvTimeoutError::Timeout) => {}
                    Err(RecvTimeoutError::Disconnected) => bail!("build workers disconnected"),
                }
                sched.reap_cancelled(&cancel);
            }
            Ok(())
        })?;

        let duration = start.elapsed();
        let report = sched.into_report(layout, duration);
        tracing::info!(
            verified = report.verified(),
            failed = report.failed().len(),
            elapsed_ms = duration.as_millis() as u64,
            "build finished"
        );
        Ok(report)
    }
}

/// Worker-to-scheduler messages.
enum WorkerMsg {
    Staged { idx: NodeIndex, outcome: StageOutcome },
    Phase { idx: NodeIndex, result: PhaseResult },
    State { idx: NodeIndex, state: NodeState },
    Done { idx: NodeIndex },
}

enum StageOutcome {
    Ready(PathBuf, PhaseResult),
    Failed(PhaseResult),
    Cancelled,
}

#[derive(Debug)]
struct Slot {
    state: NodeState,
    source: Option<PathBuf>,
    phases: Vec<PhaseResult>,
    running: bool,
}

/// Scheduler-side node state. Lives on the caller's thread only.
struct Scheduler<'g> {
    graph: &'g SpecGraph,
    nodes: Vec<Slot>,
    history: Vec<StateRecord>,
    seq: u64,
    sink: Option<EventSink>,
}

impl<'g> Scheduler<'g> {
    fn new(graph: &'g SpecGraph, sink: Option<EventSink>) -> Self {
        let nodes = graph
            .indices()
            .map(|_| Slot {
                state: NodeState::Pending,
                source: None,
                phases: Vec::new(),
                running: false,
            })
            .collect();
        Scheduler {
            graph,
            nodes,
            history: Vec::new(),
            seq: 0,
            sink,
        }
    }

    fn emit(&mut self, event: BuildEvent) {
        if let Some(sink) = self.sink.as_mut() {
            sink(&event);
        }
    }

    fn name(&self, idx: NodeIndex) -> PackageName {
        self.graph.spec(idx).name()
    }

    /// Apply a state change if it is legal. Returns whether it was applied.
    fn transition(&mut self, idx: NodeIndex, next: NodeState) -> bool {
        let package = self.name(idx);
        let slot = &mut self.nodes[idx.index()];
        if !slot.state.can_transition_to(&next) {
            tracing::debug!(package = %package, from = slot.state.name(), to = next.name(), "ignoring transition");
            return false;
        }
        slot.state = next.clone();
        self.seq += 1;
        match &next {
            NodeState::Failed(reason) => {
                tracing::warn!(package = %package, reason = %reason, "package failed")
            }
            state => tracing::info!(package = %package, state = %state, "state changed"),
        }
        self.history.push(StateRecord {
            seq: self.seq,
            package,
            state: next.clone(),
        });
        self.emit(BuildEvent::state_changed(self.seq, package.as_str(), next));
        true
    }

    /// Fail a node and every build/link dependent that is not yet terminal.
    fn fail(&mut self, idx: NodeIndex, reason: FailureReason) {
        if !self.transition(idx, NodeState::Failed(reason)) {
            return;
        }
        let dependency = self.name(idx);
        for dependent in self.graph.transitive_dependents(idx, DepTypes::BUILD_LINK) {
            if !self.nodes[dependent.index()].state.is_terminal() {
                self.transition(
                    dependent,
                    NodeState::Failed(FailureReason::DependencyFailed { dependency }),
                );
            }
        }
    }

    fn record_phase(&mut self, idx: NodeIndex, result: PhaseResult) {
        self.emit(BuildEvent::PhaseFinished {
            package: self.name(idx).to_string(),
            phase: result.phase,
            success: result.success,
            exit_code: result.exit_code,
            duration_ms: result.duration.as_millis() as u64,
        });
        self.nodes[idx.index()].phases.push(result);
    }

    fn handle(&mut self, msg: WorkerMsg) {
        match msg {
            WorkerMsg::Staged { idx, outcome } => {
                self.nodes[idx.index()].running = false;
                if self.nodes[idx.index()].state.is_terminal() {
                    tracing::debug!(package = %self.name(idx), "ignoring stage result of finished package");
                    return;
                }
                match outcome {
                    StageOutcome::Ready(source, result) => {
                        self.record_phase(idx, result);
                        self.nodes[idx.index()].source = Some(source);
                        self.transition(idx, NodeState::Staged);
                    }
                    StageOutcome::Failed(result) => {
                        let reason = result.failure();
                        self.record_phase(idx, result);
                        if let Some(reason) = reason {
                            self.fail(idx, reason);
                        }
                    }
                    StageOutcome::Cancelled => self.fail(idx, FailureReason::Cancelled),
                }
            }
            WorkerMsg::Phase { idx, result } => self.record_phase(idx, result),
            WorkerMsg::State { idx, state } => match state {
                NodeState::Failed(reason) => self.fail(idx, reason),
                state => {
                    self.transition(idx, state);
                }
            },
            WorkerMsg::Done { idx } => self.nodes[idx.index()].running = false,
        }
    }

    /// Fail cancelled nodes that are not running. Running nodes observe the
    /// token themselves between phases.
    fn reap_cancelled(&mut self, cancel: &CancelToken) {
        let graph = self.graph;
        for idx in graph.indices() {
            let slot = &self.nodes[idx.index()];
            if slot.running || slot.state.is_terminal() {
                continue;
            }
            if cancel.is_cancelled(&self.name(idx)) {
                self.fail(idx, FailureReason::Cancelled);
            }
        }
    }

    /// Staged nodes whose build and link dependencies are all verified.
    fn ready(&self, order: &[NodeIndex]) -> Vec<NodeIndex> {
        order
            .iter()
            .copied()
            .filter(|&idx| {
                let slot = &self.nodes[idx.index()];
                slot.state == NodeState::Staged
                    && !slot.running
                    && self
                        .graph
                        .dependencies(idx, DepTypes::BUILD_LINK)
                        .iter()
                        .all(|(dep, _)| self.nodes[dep.index()].state == NodeState::Verified)
            })
            .collect()
    }

    fn all_terminal(&self) -> bool {
        self.nodes.iter().all(|s| s.state.is_terminal())
    }

    fn any_running(&self) -> bool {
        self.nodes.iter().any(|s| s.running)
    }

    fn into_report(mut self, layout: &Layout, duration: Duration) -> BuildReport {
        let verified = self
            .nodes
            .iter()
            .filter(|s| s.state == NodeState::Verified)
            .count();
        let failed = self.nodes.iter().filter(|s| s.state.is_failed()).count();
        self.emit(BuildEvent::BuildFinished {
            success: failed == 0 && verified == self.nodes.len(),
            verified,
            failed,
            duration_ms: duration.as_millis() as u64,
        });

        let graph = self.graph;
        let nodes = graph
            .indices()
            .zip(self.nodes)
            .map(|(idx, slot)| {
                let spec = graph.spec(idx);
                NodeReport {
                    package: spec.name(),
                    hash: spec.hash().to_string(),
                    prefix: layout.prefix(spec),
                    state: slot.state,
                    phases: slot.phases,
                }
            })
            .collect();
        BuildReport {
            nodes,
            history: self.history,
            duration,
        }
    }
}

/// Configure arguments for one node, from its dependencies' prefixes.
fn node_configure_args(
    graph: &SpecGraph,
    layout: &Layout,
    platform: &PlatformFacts,
    idx: NodeIndex,
    binding: &BuildSystemBinding,
    source: &Path,
) -> Result<Vec<String>, args::ArgsError> {
    let spec = graph.spec(idx);
    let prefix = layout.prefix(spec);
    let dep_prefixes: Vec<PathBuf> = graph
        .dependencies(idx, DepTypes::BUILD_LINK)
        .into_iter()
        .map(|(dep, _)| layout.prefix(graph.spec(dep)))
        .collect();
    let link_prefixes: Vec<PathBuf> = graph
        .transitive_dependencies(idx, DepTypes::LINK)
        .into_iter()
        .map(|dep| layout.prefix(graph.spec(dep)))
        .collect();

    args::configure_args(&ArgInput {
        spec,
        binding,
        source_dir: source,
        prefix: &prefix,
        dep_prefixes: &dep_prefixes,
        link_prefixes: &link_prefixes,
        platform,
    })
}

fn stage_node(
    idx: NodeIndex,
    spec: &ConcreteSpec,
    stage_dir: &Path,
    stager: &dyn Stager,
    cancel: &CancelToken,
    tx: &Sender<WorkerMsg>,
) {
    let outcome = if cancel.is_cancelled(&spec.name()) {
        StageOutcome::Cancelled
    } else {
        let start = Instant::now();
        let _span = tracing::debug_span!("stage", package = %spec.name()).entered();
        match stager.stage(spec, stage_dir) {
            Ok(source) => StageOutcome::Ready(
                source,
                PhaseResult {
                    phase: Phase::Stage,
                    success: true,
                    exit_code: None,
                    output: String::new(),
                    commands: Vec::new(),
                    duration: start.elapsed(),
                },
            ),
            Err(err) => StageOutcome::Failed(PhaseResult {
                phase: Phase::Stage,
                success: false,
                exit_code: None,
                output: format!("{:#}", err),
                commands: Vec::new(),
                duration: start.elapsed(),
            }),
        }
    };
    // The scheduler may already be gone if every node finished.
    let _ = tx.send(WorkerMsg::Staged { idx, outcome });
}

/// Everything a worker needs to build one staged node.
struct NodeJob<'a> {
    idx: NodeIndex,
    package: PackageName,
    binding: &'a BuildSystemBinding,
    stage_dir: PathBuf,
    source: PathBuf,
    prefix: PathBuf,
    configure_args: Vec<String>,
}

fn build_node(
    job: &NodeJob<'_>,
    executor: &dyn Executor,
    options: BuildOptions,
    cancel: &CancelToken,
    tx: &Sender<WorkerMsg>,
) {
    let _span = tracing::info_span!("build", package = %job.package).entered();
    let send = |msg| {
        let _ = tx.send(msg);
    };
    let commands = PhaseCommands::new(
        job.binding,
        &job.stage_dir,
        &job.source,
        &job.prefix,
        options.make_jobs,
    );
    let mut cx = PhaseContext::new(&job.stage_dir);

    for phase in BUILD_PHASES {
        if phase == Phase::Test && !options.run_tests {
            continue;
        }
        if cancel.is_cancelled(&job.package) {
            send(WorkerMsg::State {
                idx: job.idx,
                state: NodeState::Failed(FailureReason::Cancelled),
            });
            break;
        }

        let result = match phase {
            Phase::Verify => verify(job.binding, &job.prefix),
            Phase::Test => match run_tests(&mut cx, &commands, executor) {
                Some(result) => result,
                None => continue,
            },
            _ => {
                let Some(inv) = commands.for_phase(phase, &job.configure_args) else {
                    continue;
                };
                run_phase(&mut cx, commands.build_dir(), phase, inv, executor)
            }
        };

        let failure = result.failure();
        send(WorkerMsg::Phase {
            idx: job.idx,
            result,
        });

        if let Some(reason) = failure {
            if phase == Phase::Test && !options.tests_fatal {
                tracing::warn!(package = %job.package, "test phase failed; continuing");
                continue;
            }
            send(WorkerMsg::State {
                idx: job.idx,
                state: NodeState::Failed(reason),
            });
            break;
        }

        let next = match phase {
            Phase::Build => Some(NodeState::Built),
            Phase::Install => Some(NodeState::Installed),
            Phase::Verify => Some(NodeState::Verified),
            _ => None,
        };
        if let Some(state) = next {
            send(WorkerMsg::State { idx: job.idx, state });
        }
    }

    send(WorkerMsg::Done { idx: job.idx });
}

/// Run one phase invocation with `dir` as the working directory.
fn run_phase(
    cx: &mut PhaseContext,
    dir: &Path,
    phase: Phase,
    mut inv: Invocation,
    executor: &dyn Executor,
) -> PhaseResult {
    let start = Instant::now();
    let cx = cx.enter(dir);
    inv.cwd = cx.current().to_path_buf();
    let command = inv.command_line();
    tracing::debug!(phase = %phase, command = %command, "running phase");

    let prepared = if phase == Phase::Configure {
        ensure_dir(&inv.cwd)
    } else {
        Ok(())
    };
    let (success, exit_code, output) = match prepared.and_then(|()| executor.run(&inv)) {
        Ok(out) => (out.is_success(), out.status, out.output),
        Err(err) => (false, None, format!("{:#}", err)),
    };

    PhaseResult {
        phase,
        success,
        exit_code,
        output,
        commands: vec![command],
        duration: start.elapsed(),
    }
}

/// Run every test target present in the build tree, stopping at the first
/// failure. `None` when no target exists.
fn run_tests(
    cx: &mut PhaseContext,
    commands: &PhaseCommands<'_>,
    executor: &dyn Executor,
) -> Option<PhaseResult> {
    let start = Instant::now();
    let cx = cx.enter(commands.build_dir());
    let mut result: Option<PhaseResult> = None;

    for target in commands.test_targets() {
        let mut query = commands.query_target(target);
        query.cwd = cx.current().to_path_buf();
        let exists = executor
            .run(&query)
            .is_ok_and(|out| commands.target_exists(&out));
        if !exists {
            tracing::debug!(target = %target, "no such test target, skipping");
            continue;
        }

        let mut inv = commands.test_target(target);
        inv.cwd = cx.current().to_path_buf();
        tracing::debug!(command = %inv.command_line(), "running tests");
        let (success, exit_code, output) = match executor.run(&inv) {
            Ok(out) => (out.is_success(), out.status, out.output),
            Err(err) => (false, None, format!("{:#}", err)),
        };

        let entry = result.get_or_insert_with(|| PhaseResult {
            phase: Phase::Test,
            success: true,
            exit_code: None,
            output: String::new(),
            commands: Vec::new(),
            duration: Duration::ZERO,
        });
        entry.commands.push(inv.command_line());
        entry.exit_code = exit_code;
        if !entry.output.is_empty() {
            entry.output.push('\n');
        }
        entry.output.push_str(&output);
        if !success {
            entry.success = false;
            break;
        }
    }

    result.map(|mut r| {
        r.duration = start.elapsed();
        r
    })
}

/// Post-install sanity check: the prefix exists and is non-empty and every
/// declared sanity pattern matches something under it.
fn verify(binding: &BuildSystemBinding, prefix: &Path) -> PhaseResult {
    let start = Instant::now();
    let mut problems = Vec::new();

    if !prefix.is_dir() || !dir_has_entries(prefix) {
        problems.push(format!(
            "install prefix {} is missing or empty",
            prefix.display()
        ));
    } else {
        for pattern in binding.sanity_paths() {
            match glob_paths(prefix, pattern) {
                Ok(matches) if !matches.is_empty() => {}
                Ok(_) => problems.push(format!(
                    "nothing matching `{}` was installed in {}",
                    pattern,
                    prefix.display()
                )),
                Err(err) => problems.push(format!("{:#}", err)),
            }
        }
    }

    PhaseResult {
        phase: Phase::Verify,
        success: problems.is_empty(),
        exit_code: None,
        output: problems.join("\n"),
        commands: Vec::new(),
        duration: start.elapsed(),
    }
}
