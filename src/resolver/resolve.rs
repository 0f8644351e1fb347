//! SpecGraph - the concretized dependency DAG.
//!
//! Once created, a SpecGraph is read-only. Node indices follow depth-first
//! discovery order from the root, so two solves of the same request produce
//! graphs that compare equal index by index.

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use petgraph::algo::tarjan_scc;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;

use crate::core::dependency::DepTypes;
use crate::core::name::PackageName;
use crate::core::spec::{ConcreteSpec, SpecHash};
use crate::util::hash::Fingerprint;

/// The concretized graph. Edges point from depender to dependency.
#[derive(Debug, Clone)]
pub struct SpecGraph {
    graph: DiGraph<ConcreteSpec, DepTypes>,
    by_name: HashMap<PackageName, NodeIndex>,
    root: NodeIndex,
}

impl SpecGraph {
    /// Assemble a graph. The first node is the root; edges are
    /// `(depender, dependency, types)` positions into `nodes`.
    pub(crate) fn from_parts(
        nodes: Vec<ConcreteSpec>,
        edges: impl IntoIterator<Item = (usize, usize, DepTypes)>,
    ) -> Self {
        let mut graph = DiGraph::with_capacity(nodes.len(), nodes.len());
        let mut by_name = HashMap::with_capacity(nodes.len());
        for spec in nodes {
            let name = spec.name();
            let idx = graph.add_node(spec);
            by_name.insert(name, idx);
        }
        for (from, to, types) in edges {
            graph.add_edge(NodeIndex::new(from), NodeIndex::new(to), types);
        }
        SpecGraph {
            graph,
            by_name,
            root: NodeIndex::new(0),
        }
    }

    pub fn root(&self) -> &ConcreteSpec {
        &self.graph[self.root]
    }

    pub fn root_index(&self) -> NodeIndex {
        self.root
    }

    pub fn spec(&self, idx: NodeIndex) -> &ConcreteSpec {
        &self.graph[idx]
    }

    pub fn get(&self, name: &str) -> Option<&ConcreteSpec> {
        self.by_name.get(name).map(|&idx| &self.graph[idx])
    }

    pub fn index_of(&self, name: &str) -> Option<NodeIndex> {
        self.by_name.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.graph.node_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }

    /// Node indices in discovery order.
    pub fn indices(&self) -> impl Iterator<Item = NodeIndex> + '_ {
        self.graph.node_indices()
    }

    /// Specs in discovery order.
    pub fn specs(&self) -> impl Iterator<Item = &ConcreteSpec> {
        self.graph.node_weights()
    }

    /// All edges as `(depender, dependency, types)`, sorted.
    pub fn edges(&self) -> Vec<(NodeIndex, NodeIndex, DepTypes)> {
        let mut edges: Vec<_> = self
            .graph
            .edge_references()
            .map(|e| (e.source(), e.target(), *e.weight()))
            .collect();
        edges.sort();
        edges
    }

    /// Edge types between two nodes, if they are connected.
    pub fn edge_types(&self, from: NodeIndex, to: NodeIndex) -> Option<DepTypes> {
        self.graph.find_edge(from, to).map(|e| self.graph[e])
    }

    /// Direct dependencies whose edge shares a type with `filter`.
    pub fn dependencies(&self, idx: NodeIndex, filter: DepTypes) -> Vec<(NodeIndex, DepTypes)> {
        self.neighbors(idx, filter, Direction::Outgoing)
    }

    /// Direct dependents whose edge shares a type with `filter`.
    pub fn dependents(&self, idx: NodeIndex, filter: DepTypes) -> Vec<(NodeIndex, DepTypes)> {
        self.neighbors(idx, filter, Direction::Incoming)
    }

    fn neighbors(
        &self,
        idx: NodeIndex,
        filter: DepTypes,
        dir: Direction,
    ) -> Vec<(NodeIndex, DepTypes)> {
        let mut out: Vec<_> = self
            .graph
            .edges_directed(idx, dir)
            .filter(|e| e.weight().intersects(filter))
            .map(|e| {
                let other = match dir {
                    Direction::Outgoing => e.target(),
                    Direction::Incoming => e.source(),
                };
                (other, *e.weight())
            })
            .collect();
        out.sort();
        out
    }

    /// Everything reachable from `idx` through `filter` edges, breadth first.
    pub fn transitive_dependencies(&self, idx: NodeIndex, filter: DepTypes) -> Vec<NodeIndex> {
        self.reach(idx, filter, Direction::Outgoing)
    }

    /// Everything that reaches `idx` through `filter` edges, breadth first.
    pub fn transitive_dependents(&self, idx: NodeIndex, filter: DepTypes) -> Vec<NodeIndex> {
        self.reach(idx, filter, Direction::Incoming)
    }

    fn reach(&self, start: NodeIndex, filter: DepTypes, dir: Direction) -> Vec<NodeIndex> {
        let mut seen = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut out = Vec::new();
        while let Some(idx) = queue.pop_front() {
            for (next, _) in self.neighbors(idx, filter, dir) {
                if seen.insert(next) {
                    out.push(next);
                    queue.push_back(next);
                }
            }
        }
        out
    }

    /// Order in which nodes can be built: every build/link dependency
    /// before its dependents. Among ready nodes the lowest index goes first.
    pub fn build_order(&self) -> Vec<NodeIndex> {
        let mut remaining: Vec<usize> = self
            .graph
            .node_indices()
            .map(|idx| self.dependencies(idx, DepTypes::BUILD_LINK).len())
            .collect();
        let mut ready: BTreeSet<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|idx| remaining[idx.index()] == 0)
            .collect();

        let mut order = Vec::with_capacity(self.len());
        while let Some(idx) = ready.pop_first() {
            order.push(idx);
            for (dependent, _) in self.dependents(idx, DepTypes::BUILD_LINK) {
                remaining[dependent.index()] -= 1;
                if remaining[dependent.index()] == 0 {
                    ready.insert(dependent);
                }
            }
        }
        order
    }

    /// A cycle through build or link edges, as a closed path
    /// (`[a, b, a]`), if one exists.
    pub fn find_build_cycle(&self) -> Option<Vec<NodeIndex>> {
        let build_only = self
            .graph
            .filter_map(|_, _| Some(()), |_, t| t.affects_build().then_some(()));

        let mut components = tarjan_scc(&build_only);
        components.iter_mut().for_each(|c| c.sort());
        components.sort();

        for component in components {
            let start = component[0];
            if component.len() == 1 {
                if build_only.find_edge(start, start).is_some() {
                    return Some(vec![start, start]);
                }
                continue;
            }
            let members: HashSet<NodeIndex> = component.iter().copied().collect();
            if let Some(path) = self.cycle_path(start, &members) {
                return Some(path);
            }
        }
        None
    }

    /// Depth-first walk inside a strongly connected component back to `start`.
    fn cycle_path(&self, start: NodeIndex, members: &HashSet<NodeIndex>) -> Option<Vec<NodeIndex>> {
        let mut path = vec![start];
        let mut visited = HashSet::from([start]);
        let mut stack = vec![self.dependencies(start, DepTypes::BUILD_LINK).into_iter()];

        while let Some(iter) = stack.last_mut() {
            match iter.next() {
                Some((next, _)) if next == start => {
                    path.push(start);
                    return Some(path);
                }
                Some((next, _)) if members.contains(&next) && visited.insert(next) => {
                    path.push(next);
                    stack.push(self.dependencies(next, DepTypes::BUILD_LINK).into_iter());
                }
                Some(_) => {}
                None => {
                    stack.pop();
                    path.pop();
                }
            }
        }
        None
    }

    /// Compute every node's DAG hash.
    ///
    /// Nodes are sealed dependencies first, so a build or link dependency
    /// contributes its own DAG hash and any change below it ripples up.
    /// Run-only dependencies contribute their identity. The build/link
    /// subgraph must be acyclic.
    pub(crate) fn seal_hashes(&mut self) {
        for idx in self.build_order() {
            let mut deps: Vec<(SpecHash, String)> = self
                .dependencies(idx, DepTypes::ALL)
                .into_iter()
                .map(|(dep, types)| {
                    let spec = &self.graph[dep];
                    let hash = if types.affects_build() {
                        spec.hash().clone()
                    } else {
                        spec.identity().clone()
                    };
                    (hash, types.to_string())
                })
                .collect();
            deps.sort();
            self.graph[idx].seal(deps.iter().map(|(hash, types)| (hash, types.clone())));
        }
    }

    /// Structural fingerprint: node hashes in index order plus sorted edges.
    pub fn fingerprint(&self) -> String {
        let mut fp = Fingerprint::new();
        for spec in self.specs() {
            fp.update_str(spec.hash().as_str());
        }
        for (from, to, types) in self.edges() {
            fp.update_str(&format!("{}>{}:{}", from.index(), to.index(), types));
        }
        fp.finish()
    }

    /// Render the graph as an indented tree from the root.
    pub fn render_tree(&self) -> String {
        let mut out = String::new();
        let mut seen = HashSet::new();
        self.render_node(self.root, 0, &mut seen, &mut out);
        out
    }

    fn render_node(
        &self,
        idx: NodeIndex,
        depth: usize,
        seen: &mut HashSet<NodeIndex>,
        out: &mut String,
    ) {
        out.push_str(&"    ".repeat(depth));
        out.push_str(&self.graph[idx].to_string());
        if !seen.insert(idx) {
            out.push_str(" (*)\n");
            return;
        }
        out.push('\n');
        for (dep, _) in self.dependencies(idx, DepTypes::ALL) {
            self.render_node(dep, depth + 1, seen, out);
        }
    }
}
