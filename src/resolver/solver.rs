//! The concretizer.
//!
//! Solving is a depth-first worklist over package names. Each visit merges
//! every demand currently placed on a package, picks its version and
//! variants, evaluates its dependency guards and pushes the resulting
//! demands onto its targets. Targets whose demands changed are revisited,
//! and demands that a package no longer makes are withdrawn. Once nothing
//! changes, the reachable part of the state becomes a [`SpecGraph`].
//!
//! There is no backtracking: a choice that later proves unsatisfiable is an
//! error, not a reason to try an older version.

use std::collections::btree_map::Entry;
use std::collections::{BTreeMap, HashSet};

use semver::Version;

use crate::core::guard::GuardContext;
use crate::core::name::PackageName;
use crate::core::package::PackageDeclaration;
use crate::core::platform::PlatformFacts;
use crate::core::registry::{Registry, RegistryError};
use crate::core::spec::{AbstractSpec, CompilerFlags, CompilerSpec, ConcreteSpec};
use crate::core::variant::VariantSpec;
use crate::resolver::errors::{ConstraintOrigin, SolveError};
use crate::resolver::merge::{Demand, MergeConflict};
use crate::resolver::resolve::SpecGraph;
use crate::resolver::version::VersionConstraint;

/// Visits allowed regardless of registry size.
const BASE_STEP_BUDGET: usize = 1000;

/// Additional visits allowed per registered package.
const STEPS_PER_PACKAGE: usize = 50;

/// What a package settled on during one visit.
#[derive(Debug, Clone)]
struct Choice {
    version: Version,
    variants: VariantSpec,
    /// Active demands on targets, in declaration order.
    edges: Vec<(PackageName, Demand)>,
}

/// Solver bookkeeping for one package.
#[derive(Debug)]
struct Node<'r> {
    decl: &'r PackageDeclaration,
    /// Demands keyed by demander; `None` is the root request.
    demands: BTreeMap<Option<PackageName>, Demand>,
    choice: Option<Choice>,
    failed: bool,
    /// The package that first demanded this one, for constraint chains.
    parent: Option<PackageName>,
}

impl<'r> Node<'r> {
    fn new(decl: &'r PackageDeclaration, parent: Option<PackageName>) -> Self {
        Node {
            decl,
            demands: BTreeMap::new(),
            choice: None,
            failed: false,
            parent,
        }
    }

    fn is_active(&self) -> bool {
        self.choice.is_some() || self.failed
    }
}

#[derive(Debug, Default)]
struct Worklist<'r> {
    nodes: BTreeMap<PackageName, Node<'r>>,
    stack: Vec<PackageName>,
    queued: HashSet<PackageName>,
}

impl Worklist<'_> {
    fn schedule(&mut self, name: PackageName) {
        if self.queued.insert(name) {
            self.stack.push(name);
        }
    }

    fn pop(&mut self) -> Option<PackageName> {
        let name = self.stack.pop()?;
        self.queued.remove(&name);
        Some(name)
    }
}

/// Concretizes abstract requests against a frozen registry.
///
/// A solver holds no state between calls; one registry can back any number
/// of solvers on any number of threads.
#[derive(Debug, Clone)]
pub struct Solver<'r> {
    registry: &'r Registry,
    platform: PlatformFacts,
    compiler: CompilerSpec,
    flags: CompilerFlags,
    step_budget: Option<usize>,
}

impl<'r> Solver<'r> {
    pub fn new(registry: &'r Registry, platform: PlatformFacts) -> Self {
        Solver {
            registry,
            platform,
            compiler: CompilerSpec::default(),
            flags: CompilerFlags::default(),
            step_budget: None,
        }
    }

    /// Compiler used when the request names none.
    pub fn with_default_compiler(mut self, compiler: CompilerSpec) -> Self {
        self.compiler = compiler;
        self
    }

    /// Flags used when the request sets none.
    pub fn with_default_flags(mut self, flags: CompilerFlags) -> Self {
        self.flags = flags;
        self
    }

    /// Override the visit budget.
    pub fn with_step_budget(mut self, steps: usize) -> Self {
        self.step_budget = Some(steps);
        self
    }

    pub fn platform(&self) -> &PlatformFacts {
        &self.platform
    }

    fn budget(&self) -> usize {
        self.step_budget
            .unwrap_or(BASE_STEP_BUDGET + STEPS_PER_PACKAGE * self.registry.len())
    }

    /// Concretize `request` into a graph.
    ///
    /// Either every reachable package resolves, or the first error in
    /// discovery order is returned. No partial graph escapes.
    pub fn solve(&self, request: &AbstractSpec) -> Result<SpecGraph, SolveError> {
        let root = request.name;
        let _span = tracing::debug_span!("solve", root = %root).entered();

        let root_decl = self.registry.get(&root).ok_or_else(|| SolveError::UnknownPackage {
            package: root.to_string(),
            suggestions: self.suggestions_for(&root),
            chain: vec![ConstraintOrigin {
                path: Vec::new(),
                package: root.to_string(),
                demand: Demand::root(request).describe(),
            }],
        })?;

        let mut work = Worklist::default();
        let mut node = Node::new(root_decl, None);
        node.demands.insert(None, Demand::root(request));
        work.nodes.insert(root, node);
        work.schedule(root);

        let budget = self.budget();
        let mut steps = 0;
        loop {
            while let Some(name) = work.pop() {
                steps += 1;
                if steps > budget {
                    tracing::warn!(root = %root, steps = budget, "concretization did not converge");
                    return Err(SolveError::DidNotConverge {
                        root: root.to_string(),
                        steps: budget,
                    });
                }
                let outcome = match work.nodes.get(&name) {
                    Some(node) if !node.demands.is_empty() => Some(self.evaluate(&work.nodes, name)),
                    _ => None,
                };
                self.apply(&mut work, name, outcome);
            }

            // Packages cut off from the root may still be demanding each
            // other through a cycle. Retire them and settle again.
            let reachable: HashSet<PackageName> = discovery_order(&work.nodes, root).into_iter().collect();
            let stale: Vec<PackageName> = work
                .nodes
                .iter()
                .filter(|(name, node)| node.is_active() && !reachable.contains(*name))
                .map(|(name, _)| *name)
                .collect();
            if stale.is_empty() {
                break;
            }
            for name in stale {
                if let Some(node) = work.nodes.get_mut(&name) {
                    node.demands.clear();
                }
                work.schedule(name);
            }
        }

        tracing::debug!(root = %root, steps, "reached fixpoint");
        self.assemble(work.nodes, request, root, steps)
    }

    /// Decide one package from its current demands.
    fn evaluate(
        &self,
        nodes: &BTreeMap<PackageName, Node<'r>>,
        name: PackageName,
    ) -> Result<Choice, SolveError> {
        let node = &nodes[&name];
        let decl = node.decl;

        let mut merged = Demand {
            constraint: VersionConstraint::any(),
            variants: VariantSpec::new(),
            types: Default::default(),
        };
        for demand in node.demands.values() {
            merged = merged
                .merge(demand)
                .map_err(|conflict| self.demand_conflict(nodes, name, conflict))?;
        }

        for (variant, value) in merged.variants.iter() {
            let chain = || origins(nodes, name, |d| d.variants.contains(variant));
            let Some(declared) = decl.variant(variant) else {
                return Err(SolveError::UnknownVariant {
                    package: name.to_string(),
                    variant: variant.to_string(),
                    chain: chain(),
                });
            };
            if declared.coerce(value).is_none() {
                return Err(SolveError::IllegalVariantValue {
                    package: name.to_string(),
                    variant: variant.to_string(),
                    value: value.to_string(),
                    legal: declared.legal_values(),
                    chain: chain(),
                });
            }
        }

        let version = match decl.best_version(&merged.constraint) {
            Some(found) => found.version.clone(),
            None => {
                let mut chain = origins(nodes, name, |d| !d.constraint.is_any());
                if chain.is_empty() {
                    chain = origins(nodes, name, |_| true);
                }
                return Err(SolveError::Unsatisfiable {
                    package: name.to_string(),
                    constraint: merged.constraint.to_string(),
                    available: declared_versions(decl),
                    chain,
                });
            }
        };

        let variants: VariantSpec = decl
            .variants()
            .iter()
            .map(|declared| {
                let value = merged
                    .variants
                    .get(declared.name())
                    .and_then(|requested| declared.coerce(requested))
                    .unwrap_or_else(|| declared.default_value().clone());
                (declared.name().to_string(), value)
            })
            .collect();

        let cx = GuardContext {
            version: &version,
            variants: &variants,
            platform: &self.platform,
        };
        let mut edges: Vec<(PackageName, Demand)> = Vec::new();
        for dep in decl.dependencies().iter().filter(|d| d.guard().evaluate(&cx)) {
            let target = dep.name();
            let demand = Demand::from_decl(dep);

            if !self.registry.contains(&target) {
                let mut path = path_to(nodes, name);
                path.push(name.to_string());
                return Err(SolveError::UnknownPackage {
                    package: target.to_string(),
                    suggestions: self.suggestions_for(&target),
                    chain: vec![ConstraintOrigin {
                        path,
                        package: target.to_string(),
                        demand: demand.describe(),
                    }],
                });
            }

            match edges.iter_mut().find(|(t, _)| *t == target) {
                Some((_, existing)) => {
                    let merged = existing
                        .merge(&demand)
                        .map_err(|conflict| self.own_conflict(nodes, name, target, existing, &demand, conflict))?;
                    *existing = merged;
                }
                None => edges.push((target, demand)),
            }
        }

        tracing::trace!(
            package = %name,
            version = %version,
            variants = %variants,
            deps = edges.len(),
            "visited package"
        );
        Ok(Choice {
            version,
            variants,
            edges,
        })
    }

    /// Record a visit's outcome and push changed demands to targets.
    ///
    /// `None` means nothing demands the package any more.
    fn apply(
        &self,
        work: &mut Worklist<'r>,
        name: PackageName,
        outcome: Option<Result<Choice, SolveError>>,
    ) {
        let Some(node) = work.nodes.get_mut(&name) else {
            return;
        };
        let old_edges = node.choice.take().map(|c| c.edges).unwrap_or_default();
        let (choice, failed) = match outcome {
            Some(Ok(choice)) => (Some(choice), false),
            Some(Err(err)) => {
                tracing::debug!(package = %name, error = %err, "package in error");
                (None, true)
            }
            None => (None, false),
        };
        let new_edges = choice.as_ref().map(|c| c.edges.clone()).unwrap_or_default();
        node.choice = choice;
        node.failed = failed;

        for (target, _) in &old_edges {
            if new_edges.iter().any(|(t, _)| t == target) {
                continue;
            }
            let withdrawn = work
                .nodes
                .get_mut(target)
                .is_some_and(|t| t.demands.remove(&Some(name)).is_some());
            if withdrawn {
                tracing::trace!(package = %name, target = %target, "withdrew demand");
                work.schedule(*target);
            }
        }

        // Reverse so the first declared dependency is visited first.
        for (target, demand) in new_edges.into_iter().rev() {
            let target_node = match work.nodes.entry(target) {
                Entry::Occupied(entry) => entry.into_mut(),
                Entry::Vacant(entry) => {
                    let Some(decl) = self.registry.get(&target) else {
                        continue;
                    };
                    entry.insert(Node::new(decl, Some(name)))
                }
            };
            if target_node.demands.get(&Some(name)) != Some(&demand) {
                target_node.demands.insert(Some(name), demand);
                work.schedule(target);
            }
        }
    }

    /// Turn the settled state into a graph.
    fn assemble(
        &self,
        mut nodes: BTreeMap<PackageName, Node<'r>>,
        request: &AbstractSpec,
        root: PackageName,
        steps: usize,
    ) -> Result<SpecGraph, SolveError> {
        let order = discovery_order(&nodes, root);

        // Chains follow the final discovery tree.
        let mut seen = HashSet::new();
        for name in &order {
            seen.insert(*name);
            let targets: Vec<PackageName> = nodes[name]
                .choice
                .iter()
                .flat_map(|c| c.edges.iter().map(|(t, _)| *t))
                .collect();
            for target in targets {
                if seen.insert(target) {
                    if let Some(node) = nodes.get_mut(&target) {
                        node.parent = Some(*name);
                    }
                }
            }
        }

        let mut chosen = Vec::with_capacity(order.len());
        for name in &order {
            match &nodes[name].choice {
                Some(choice) => chosen.push((*name, choice)),
                None => {
                    return Err(match self.evaluate(&nodes, *name) {
                        Err(err) => err,
                        Ok(_) => SolveError::DidNotConverge {
                            root: root.to_string(),
                            steps,
                        },
                    });
                }
            }
        }

        let compiler = request.compiler.clone().unwrap_or_else(|| self.compiler.clone());
        let flags = if request.flags.is_empty() {
            self.flags.clone()
        } else {
            request.flags.clone()
        };

        let index: BTreeMap<PackageName, usize> =
            order.iter().enumerate().map(|(i, name)| (*name, i)).collect();
        let index = &index;
        let specs: Vec<ConcreteSpec> = chosen
            .iter()
            .map(|(name, choice)| {
                ConcreteSpec::new(
                    *name,
                    choice.version.clone(),
                    choice.variants.clone(),
                    compiler.clone(),
                    flags.clone(),
                )
            })
            .collect();
        let edges: Vec<(usize, usize, _)> = chosen
            .iter()
            .flat_map(|(name, choice)| {
                let from = index[name];
                choice
                    .edges
                    .iter()
                    .map(move |(target, demand)| (from, index[target], demand.types))
            })
            .collect();

        let mut graph = SpecGraph::from_parts(specs, edges);
        if let Some(cycle) = graph.find_build_cycle() {
            let packages: Vec<String> = cycle.iter().map(|idx| graph.spec(*idx).name().to_string()).collect();
            tracing::debug!(cycle = %packages.join(" -> "), "build cycle");
            return Err(SolveError::CyclicDependency { packages });
        }
        graph.seal_hashes();

        tracing::info!(
            root = %root,
            packages = graph.len(),
            hash = %graph.root().hash().short(),
            "concretized"
        );
        Ok(graph)
    }

    /// Error for demands on one package that cannot be merged.
    fn demand_conflict(
        &self,
        nodes: &BTreeMap<PackageName, Node<'r>>,
        name: PackageName,
        conflict: MergeConflict,
    ) -> SolveError {
        match conflict {
            MergeConflict::Versions(err) => SolveError::Unsatisfiable {
                package: name.to_string(),
                constraint: format!("{} and {}", err.left, err.right),
                available: declared_versions(nodes[&name].decl),
                chain: origins(nodes, name, |d| !d.constraint.is_any()),
            },
            MergeConflict::Variant(err) => SolveError::ConflictingVariant {
                package: name.to_string(),
                chain: origins(nodes, name, |d| d.variants.contains(&err.variant)),
                variant: err.variant,
            },
        }
    }

    /// Error for one package's own declarations disagreeing on a target.
    fn own_conflict(
        &self,
        nodes: &BTreeMap<PackageName, Node<'r>>,
        name: PackageName,
        target: PackageName,
        first: &Demand,
        second: &Demand,
        conflict: MergeConflict,
    ) -> SolveError {
        let mut path = path_to(nodes, name);
        path.push(name.to_string());
        let chain = [first, second]
            .into_iter()
            .map(|d| ConstraintOrigin {
                path: path.clone(),
                package: target.to_string(),
                demand: d.describe(),
            })
            .collect();

        match conflict {
            MergeConflict::Versions(err) => SolveError::Unsatisfiable {
                package: target.to_string(),
                constraint: format!("{} and {}", err.left, err.right),
                available: self.registry.get(&target).map(declared_versions).unwrap_or_default(),
                chain,
            },
            MergeConflict::Variant(err) => SolveError::ConflictingVariant {
                package: target.to_string(),
                variant: err.variant,
                chain,
            },
        }
    }

    fn suggestions_for(&self, name: &str) -> Vec<String> {
        match self.registry.lookup(name) {
            Err(RegistryError::NotFound { suggestions, .. }) => suggestions,
            _ => Vec::new(),
        }
    }
}

/// Depth-first pre-order over chosen edges, starting at the root.
fn discovery_order(nodes: &BTreeMap<PackageName, Node<'_>>, root: PackageName) -> Vec<PackageName> {
    let mut order = Vec::new();
    let mut seen = HashSet::new();
    let mut stack = vec![root];
    while let Some(name) = stack.pop() {
        if !seen.insert(name) {
            continue;
        }
        order.push(name);
        if let Some(choice) = nodes.get(&name).and_then(|n| n.choice.as_ref()) {
            for (target, _) in choice.edges.iter().rev() {
                if !seen.contains(target) {
                    stack.push(*target);
                }
            }
        }
    }
    order
}

/// Path of package names from the root down to `name`'s demander.
fn path_to(nodes: &BTreeMap<PackageName, Node<'_>>, name: PackageName) -> Vec<String> {
    let mut path = Vec::new();
    let mut current = nodes.get(&name).and_then(|n| n.parent);
    while let Some(parent) = current {
        if path.len() > nodes.len() {
            break;
        }
        path.push(parent.to_string());
        current = nodes.get(&parent).and_then(|n| n.parent);
    }
    path.reverse();
    path
}

/// One origin per demand on `name` that matches `filter`.
fn origins(
    nodes: &BTreeMap<PackageName, Node<'_>>,
    name: PackageName,
    filter: impl Fn(&Demand) -> bool,
) -> Vec<ConstraintOrigin> {
    nodes[&name]
        .demands
        .iter()
        .filter(|(_, demand)| filter(demand))
        .map(|(demander, demand)| {
            let path = match demander {
                Some(demander) => {
                    let mut path = path_to(nodes, *demander);
                    path.push(demander.to_string());
                    path
                }
                None => Vec::new(),
            };
            ConstraintOrigin {
                path,
                package: name.to_string(),
                demand: demand.describe(),
            }
        })
        .collect()
}

fn declared_versions(decl: &PackageDeclaration) -> Vec<String> {
    decl.versions().iter().map(|v| v.version.to_string()).collect()
}
