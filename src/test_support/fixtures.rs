//! Test fixtures for common test scenarios.
//!
//! A small but realistic package stack, written as recipe text so fixtures
//! go through the same parsing path as recipes on disk:
//!
//! ```text
//! octave ─┬─ pcre
//!         ├─ readline (+readline) ── ncurses
//!         ├─ hdf5 (+hdf5, link) ──── zlib
//!         └─ pkgconf (build)
//! ```

use std::path::Path;

use crate::core::recipe::Recipe;
use crate::core::registry::{Registry, RegistryBuilder};

pub const OCTAVE: &str = r#"
[package]
name = "octave"
build-system = "autotools"
description = "GNU Octave"

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

[[dependency]]
name = "pkgconf"
type = ["build"]

[[build.args]]
arg = "--enable-readline"
when = "+readline"

[[build.args]]
arg = "--disable-readline"
when = "~readline"
"#;

pub const READLINE: &str = r#"
[package]
name = "readline"
build-system = "autotools"

[[version]]
version = "8.2"

[[version]]
version = "7.0"

[[dependency]]
name = "ncurses"
type = ["build", "link"]
"#;

pub const NCURSES: &str = r#"
[package]
name = "ncurses"
build-system = "autotools"

[[version]]
version = "6.4"
"#;

pub const PCRE: &str = r#"
[package]
name = "pcre"
build-system = "cmake"

[[version]]
version = "8.45"

[variants]
jit = { default = false }

[[build.args]]
arg = "-DPCRE_SUPPORT_JIT=ON"
when = "+jit"
"#;

pub const PKGCONF: &str = r#"
[package]
name = "pkgconf"
build-system = "autotools"

[[version]]
version = "1.9.5"
"#;

pub const HDF5: &str = r#"
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

[build]
generator = "Ninja"

[[build.args]]
arg = "-DBUILD_SHARED_LIBS=ON"
when = "+shared"

[[build.args]]
arg = "-DBUILD_SHARED_LIBS=OFF"
when = "~shared"
"#;

pub const ZLIB: &str = r#"
[package]
name = "zlib"
build-system = "cmake"

[[version]]
version = "1.3.1"

[[version]]
version = "1.2.13"
"#;

/// Every fixture recipe, keyed by package name.
pub const RECIPES: &[(&str, &str)] = &[
    ("hdf5", HDF5),
    ("ncurses", NCURSES),
    ("octave", OCTAVE),
    ("pcre", PCRE),
    ("pkgconf", PKGCONF),
    ("readline", READLINE),
    ("zlib", ZLIB),
];

/// A frozen registry holding every fixture recipe.
pub fn fixture_registry() -> Registry {
    let mut builder = RegistryBuilder::new();
    for (_, text) in RECIPES {
        let decl = text.parse::<Recipe>().unwrap().into_declaration().unwrap();
        builder.register(decl).unwrap();
    }
    builder.freeze()
}

/// Write every fixture recipe to `<dir>/<name>.toml`.
pub fn write_recipes(dir: &Path) {
    std::fs::create_dir_all(dir).unwrap();
    for (name, text) in RECIPES {
        std::fs::write(dir.join(format!("{}.toml", name)), text).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_registry_loads() {
        let registry = fixture_registry();
        assert_eq!(registry.len(), RECIPES.len());
        assert!(registry.contains("octave"));
        assert_eq!(registry.lookup("hdf5").unwrap().binding().generator(), "Ninja");
    }

    #[test]
    fn test_write_recipes_round_trips_through_load_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        write_recipes(tmp.path());
        let mut builder = RegistryBuilder::new();
        assert_eq!(builder.load_dir(tmp.path()).unwrap(), RECIPES.len());
    }
}
