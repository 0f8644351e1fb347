//! Concretization integration tests.
//!
//! These tests load recipes from disk the way a real run does, then check
//! the resulting spec graph and its lockfile.

use std::fs;
use std::path::Path;

use kiln::resolver::version::parse_version;
use kiln::{
    concretize, AbstractSpec, DepTypes, PlatformFacts, Registry, RegistryBuilder, SolveError,
    SpecGraph, SpecLock,
};
use tempfile::TempDir;

const RECIPES: &[(&str, &str)] = &[
    (
        "octave",
        r#"
[package]
name = "octave"
build-system = "autotools"

[[version]]
version = "4.4.1"

[[version]]
version = "4.2.2"

[variants]
readline = { default = true }
hdf5 = { default = false }

[[dependency]]
name = "pcre"

[[dependency]]
name = "readline"
when = "+readline"

[[dependency]]
name = "hdf5"
type = ["link"]
when = "+hdf5"
"#,
    ),
    (
        "readline",
        r#"
[package]
name = "readline"
build-system = "autotools"

[[version]]
version = "8.2"

[[dependency]]
name = "ncurses"
"#,
    ),
    (
        "ncurses",
        r#"
[package]
name = "ncurses"
build-system = "autotools"

[[version]]
version = "6.4"
"#,
    ),
    (
        "pcre",
        r#"
[package]
name = "pcre"
build-system = "cmake"

[[version]]
version = "8.45"
"#,
    ),
    (
        "hdf5",
        r#"
[package]
name = "hdf5"
build-system = "cmake"

[[version]]
version = "1.14.3"

[[version]]
version = "1.12.2"

[variants]
shared = { default = true }

[[dependency]]
name = "zlib"
version = ">=1.2"
"#,
    ),
    (
        "zlib",
        r#"
[package]
name = "zlib"
build-system = "cmake"

[[version]]
version = "1.3.1"

[[version]]
version = "1.2.13"
"#,
    ),
];

fn load_registry(dir: &Path) -> Registry {
    for (name, text) in RECIPES {
        fs::write(dir.join(format!("{}.toml", name)), text).unwrap();
    }
    let mut builder = RegistryBuilder::new();
    assert_eq!(builder.load_dir(dir).unwrap(), RECIPES.len());
    builder.freeze()
}

fn solve(registry: &Registry, request: &str) -> Result<SpecGraph, SolveError> {
    let request: AbstractSpec = request.parse().unwrap();
    concretize(registry, &PlatformFacts::linux(), &request)
}

fn names(graph: &SpecGraph) -> Vec<String> {
    let mut names: Vec<String> = graph.specs().map(|s| s.name().to_string()).collect();
    names.sort();
    names
}

#[test]
fn test_defaults_pick_highest_versions() {
    let tmp = TempDir::new().unwrap();
    let registry = load_registry(tmp.path());

    let graph = solve(&registry, "octave").unwrap();
    assert_eq!(names(&graph), ["ncurses", "octave", "pcre", "readline"]);
    assert_eq!(graph.root().version(), &parse_version("4.4.1").unwrap());
    assert!(graph.root().variants().is_enabled("readline"));
    assert!(!graph.root().variants().is_enabled("hdf5"));
}

#[test]
fn test_variant_enables_guarded_dependency() {
    let tmp = TempDir::new().unwrap();
    let registry = load_registry(tmp.path());

    let graph = solve(&registry, "octave +hdf5 ~readline").unwrap();
    assert_eq!(names(&graph), ["hdf5", "octave", "pcre", "zlib"]);
    assert_eq!(graph.get("zlib").unwrap().version(), &parse_version("1.3.1").unwrap());

    let octave = graph.root_index();
    let hdf5 = graph.index_of("hdf5").unwrap();
    assert_eq!(graph.edge_types(octave, hdf5), Some(DepTypes::LINK));

    // CMake packages always carry a build type.
    assert!(graph.get("hdf5").unwrap().variants().contains("build_type"));
}

#[test]
fn test_version_request_is_honored() {
    let tmp = TempDir::new().unwrap();
    let registry = load_registry(tmp.path());

    let graph = solve(&registry, "octave@4.2.2").unwrap();
    assert_eq!(graph.root().version(), &parse_version("4.2.2").unwrap());

    let graph = solve(&registry, "hdf5@1.12.2").unwrap();
    assert_eq!(graph.root().version(), &parse_version("1.12.2").unwrap());
}

#[test]
fn test_build_order_puts_dependencies_first() {
    let tmp = TempDir::new().unwrap();
    let registry = load_registry(tmp.path());
    let graph = solve(&registry, "octave +hdf5").unwrap();

    let order = graph.build_order();
    assert_eq!(order.len(), graph.len());
    let position = |name: &str| {
        order
            .iter()
            .position(|&idx| graph.spec(idx).name() == name)
            .unwrap()
    };
    assert!(position("zlib") < position("hdf5"));
    assert!(position("ncurses") < position("readline"));
    assert!(position("readline") < position("octave"));
    assert_eq!(position("octave"), order.len() - 1);
}

#[test]
fn test_concretization_is_deterministic() {
    let tmp = TempDir::new().unwrap();
    let registry = load_registry(tmp.path());

    let first = solve(&registry, "octave +hdf5").unwrap();
    let second = solve(&registry, "octave +hdf5").unwrap();
    assert_eq!(first.fingerprint(), second.fingerprint());
    assert_eq!(first.root().hash(), second.root().hash());
}

#[test]
fn test_variants_change_hashes_upward() {
    let tmp = TempDir::new().unwrap();
    let registry = load_registry(tmp.path());

    let shared = solve(&registry, "octave +hdf5").unwrap();
    let unshared = solve(&registry, "hdf5 ~shared").unwrap();
    assert_ne!(
        shared.get("hdf5").unwrap().hash(),
        unshared.get("hdf5").unwrap().hash()
    );
    // zlib itself is untouched by hdf5's variant.
    assert_eq!(
        shared.get("zlib").unwrap().hash(),
        unshared.get("zlib").unwrap().hash()
    );
}

#[test]
fn test_solve_errors() {
    let tmp = TempDir::new().unwrap();
    let registry = load_registry(tmp.path());

    match solve(&registry, "octav") {
        Err(SolveError::UnknownPackage { package, suggestions, .. }) => {
            assert_eq!(package, "octav");
            assert!(suggestions.iter().any(|s| s == "octave"));
        }
        other => panic!("expected UnknownPackage, got {:?}", other.map(|g| g.len())),
    }

    assert!(matches!(
        solve(&registry, "zlib +debug"),
        Err(SolveError::UnknownVariant { .. })
    ));
    assert!(matches!(
        solve(&registry, "zlib@>=2"),
        Err(SolveError::Unsatisfiable { .. })
    ));
}

#[test]
fn test_lockfile_round_trip() {
    let tmp = TempDir::new().unwrap();
    let recipes = tmp.path().join("recipes");
    fs::create_dir_all(&recipes).unwrap();
    let registry = load_registry(&recipes);

    let graph = solve(&registry, "octave +hdf5").unwrap();
    let path = tmp.path().join("kiln.lock");
    SpecLock::from_graph(&graph).save(&path).unwrap();

    let text = fs::read_to_string(&path).unwrap();
    assert!(text.starts_with("# This file is automatically generated by kiln."));

    let lock = SpecLock::load(&path).unwrap();
    assert_eq!(lock.root().map(|n| n.to_string()).as_deref(), Some("octave"));

    let restored = lock.to_graph().unwrap();
    assert_eq!(restored.fingerprint(), graph.fingerprint());
    assert_eq!(names(&restored), names(&graph));
}
