//! Lockfile encoding and decoding.
//!
//! kiln.lock records a concretized graph so a later build can reuse it
//! without solving again.

use std::collections::HashMap;
use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::core::dependency::DepTypes;
use crate::core::name::PackageName;
use crate::core::spec::{CompilerFlags, CompilerSpec, ConcreteSpec};
use crate::core::variant::VariantSpec;
use crate::resolver::resolve::SpecGraph;
use crate::resolver::version::parse_version;

/// Default lockfile name.
pub const LOCKFILE_NAME: &str = "kiln.lock";

const LOCKFILE_VERSION: u32 = 1;

/// Lockfile representation for serialization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecLock {
    /// Lockfile format version
    pub version: u32,

    /// Structural fingerprint of the whole graph
    pub fingerprint: String,

    /// Locked specs, root first, in discovery order
    #[serde(rename = "spec", default)]
    pub specs: Vec<LockedSpec>,
}

/// A locked spec entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedSpec {
    pub name: PackageName,
    pub version: String,
    pub hash: String,
    pub compiler: CompilerSpec,

    #[serde(default, skip_serializing_if = "VariantSpec::is_empty")]
    pub variants: VariantSpec,

    #[serde(default, skip_serializing_if = "CompilerFlags::is_empty")]
    pub flags: CompilerFlags,

    /// Direct dependencies, sorted by name
    #[serde(rename = "dependency", default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<LockedDependency>,
}

/// One locked edge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedDependency {
    pub name: PackageName,
    #[serde(rename = "type")]
    pub types: DepTypes,
}

impl SpecLock {
    /// Snapshot a graph.
    pub fn from_graph(graph: &SpecGraph) -> Self {
        let specs = graph
            .indices()
            .map(|idx| {
                let spec = graph.spec(idx);
                let mut dependencies: Vec<LockedDependency> = graph
                    .dependencies(idx, DepTypes::ALL)
                    .into_iter()
                    .map(|(dep, types)| LockedDependency {
                        name: graph.spec(dep).name(),
                        types,
                    })
                    .collect();
                dependencies.sort_by(|a, b| a.name.cmp(&b.name));

                LockedSpec {
                    name: spec.name(),
                    version: spec.version().to_string(),
                    hash: spec.hash().to_string(),
                    compiler: spec.compiler().clone(),
                    variants: spec.variants().clone(),
                    flags: spec.flags().clone(),
                    dependencies,
                }
            })
            .collect();

        SpecLock {
            version: LOCKFILE_VERSION,
            fingerprint: graph.fingerprint(),
            specs,
        }
    }

    /// Name of the root spec.
    pub fn root(&self) -> Option<PackageName> {
        self.specs.first().map(|s| s.name)
    }

    /// Load a lockfile from a path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read lockfile: {}", path.display()))?;

        let lock: SpecLock = toml::from_str(&content).with_context(|| "failed to parse lockfile")?;
        if lock.version != LOCKFILE_VERSION {
            bail!(
                "unsupported lockfile version {} (expected {})",
                lock.version,
                LOCKFILE_VERSION
            );
        }
        Ok(lock)
    }

    /// Save the lockfile to a path.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;

        let with_header = format!(
            "# This file is automatically generated by kiln.\n\
             # It is not intended for manual editing.\n\n\
             {content}"
        );

        std::fs::write(path, with_header)
            .with_context(|| format!("failed to write lockfile: {}", path.display()))?;

        tracing::debug!(path = %path.display(), specs = self.specs.len(), "wrote lockfile");
        Ok(())
    }

    /// Rebuild the graph.
    ///
    /// Every hash is recomputed; an entry whose recorded hash disagrees
    /// with its contents is rejected.
    pub fn to_graph(&self) -> Result<SpecGraph> {
        if self.specs.is_empty() {
            bail!("lockfile contains no specs");
        }

        let mut index = HashMap::with_capacity(self.specs.len());
        let mut nodes = Vec::with_capacity(self.specs.len());
        for (i, locked) in self.specs.iter().enumerate() {
            if index.insert(locked.name, i).is_some() {
                bail!("`{}` is locked twice", locked.name);
            }
            let version = parse_version(&locked.version)
                .with_context(|| format!("invalid version for `{}`", locked.name))?;
            nodes.push(ConcreteSpec::new(
                locked.name,
                version,
                locked.variants.clone(),
                locked.compiler.clone(),
                locked.flags.clone(),
            ));
        }

        let mut edges = Vec::new();
        for (from, locked) in self.specs.iter().enumerate() {
            for dep in &locked.dependencies {
                let Some(&to) = index.get(&dep.name) else {
                    bail!("`{}` depends on `{}`, which is not locked", locked.name, dep.name);
                };
                edges.push((from, to, dep.types));
            }
        }

        let mut graph = SpecGraph::from_parts(nodes, edges);
        if let Some(cycle) = graph.find_build_cycle() {
            let names: Vec<String> = cycle.iter().map(|i| graph.spec(*i).name().to_string()).collect();
            bail!("lockfile contains a build cycle: {}", names.join(" -> "));
        }
        graph.seal_hashes();

        for locked in &self.specs {
            let computed = graph
                .get(&locked.name)
                .map(|s| s.hash().to_string())
                .unwrap_or_default();
            if computed != locked.hash {
                bail!(
                    "lockfile entry for `{}` records hash {} but its contents hash to {}",
                    locked.name,
                    locked.hash,
                    computed
                );
            }
        }
        Ok(graph)
    }
}
