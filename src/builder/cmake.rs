//! CMake configure arguments.

use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;

use crate::builder::args::{ArgInput, ArgsError};
use crate::core::binding::BuildSystemBinding;
use crate::core::spec::ConcreteSpec;
use crate::core::variant::{BuildType, BUILD_TYPE_VARIANT};

/// Extra generators are written `<extra> - <primary>`.
static PRIMARY_GENERATOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:.* - )?(.*)$").unwrap());

const LANGUAGES: [(&str, &str); 3] = [("C", "cflags"), ("CXX", "cxxflags"), ("Fortran", "fflags")];

const LINKER_KINDS: [&str; 4] = ["EXE", "MODULE", "SHARED", "STATIC"];

/// The primary generator of a generator string:
/// `CodeBlocks - Unix Makefiles` becomes `Unix Makefiles`.
pub fn primary_generator(generator: &str) -> &str {
    PRIMARY_GENERATOR
        .captures(generator)
        .and_then(|c| c.get(1))
        .map_or(generator, |m| m.as_str())
}

/// The spec's build type, defaulting to `RelWithDebInfo`. It must be one
/// of the binding's legal build types.
pub fn build_type(spec: &ConcreteSpec, binding: &BuildSystemBinding) -> Result<String, ArgsError> {
    let value = spec
        .variants()
        .get(BUILD_TYPE_VARIANT)
        .map_or_else(|| BuildType::default().to_string(), ToString::to_string);
    if binding.legal_build_types().contains(&value) {
        Ok(value)
    } else {
        Err(ArgsError::InvalidBuildType {
            value,
            legal: binding.legal_build_types().to_vec(),
        })
    }
}

/// Generator and build-type checks.
pub fn preflight(spec: &ConcreteSpec, binding: &BuildSystemBinding) -> Result<(), ArgsError> {
    let primary = primary_generator(binding.generator());
    if !binding.legal_generators().iter().any(|g| g == primary) {
        return Err(ArgsError::UnsupportedGenerator {
            generator: binding.generator().to_string(),
            legal: binding.legal_generators().to_vec(),
        });
    }
    build_type(spec, binding).map(|_| ())
}

pub fn configure_args(input: &ArgInput<'_>) -> Result<Vec<String>, ArgsError> {
    preflight(input.spec, input.binding)?;
    let generator = input.binding.generator();
    let build_type = build_type(input.spec, input.binding)?;

    let mut args = vec![
        input.binding.source_root(input.source_dir).display().to_string(),
        "-G".to_string(),
        generator.to_string(),
        format!("-DCMAKE_INSTALL_PREFIX:PATH={}", input.prefix.display()),
        format!("-DCMAKE_BUILD_TYPE:STRING={}", build_type),
    ];

    if primary_generator(generator) == "Unix Makefiles" {
        args.push("-DCMAKE_VERBOSE_MAKEFILE:BOOL=ON".to_string());
    }

    if input.platform.is_macos() {
        args.extend([
            "-DCMAKE_FIND_FRAMEWORK:STRING=LAST".to_string(),
            "-DCMAKE_FIND_APPBUNDLE:STRING=LAST".to_string(),
            "-DCMAKE_MACOSX_RPATH:BOOL=ON".to_string(),
        ]);
    }

    args.push("-DCMAKE_INSTALL_RPATH_USE_LINK_PATH:BOOL=FALSE".to_string());
    let mut rpaths = input.rpaths();
    rpaths.extend(input.platform.self_rpath().map(str::to_string));
    args.push(format!("-DCMAKE_INSTALL_RPATH:STRING={}", rpaths.join(";")));

    let mut deps: Vec<PathBuf> = Vec::new();
    for prefix in input.dep_prefixes {
        if !deps.contains(prefix) {
            deps.push(prefix.clone());
        }
    }
    let deps: Vec<String> = input
        .platform
        .filter_system_paths(&deps)
        .iter()
        .map(|p| p.display().to_string())
        .collect();
    args.push(format!("-DCMAKE_PREFIX_PATH:STRING={}", deps.join(";")));

    args.extend(flag_args(input.spec));
    args.extend(input.extra_args());
    Ok(args)
}

/// Compiler and linker flags as cache assignments.
///
/// CMake has no preprocessor flag variable, so `cppflags` is appended to
/// every language.
fn flag_args(spec: &ConcreteSpec) -> Vec<String> {
    let flags = spec.flags();
    let mut args = Vec::new();

    for (lang, group) in LANGUAGES {
        let lang_flags: Vec<&str> = flags
            .group(group)
            .unwrap_or_default()
            .iter()
            .chain(&flags.cppflags)
            .map(String::as_str)
            .collect();
        if !lang_flags.is_empty() {
            args.push(format!("-DCMAKE_{}_FLAGS={}", lang, lang_flags.join(" ")));
        }
    }

    if !flags.ldflags.is_empty() {
        let ldflags = flags.ldflags.join(" ");
        for kind in LINKER_KINDS {
            args.push(format!("-DCMAKE_{}_LINKER_FLAGS={}", kind, ldflags));
        }
    }

    if !flags.ldlibs.is_empty() {
        let ldlibs = flags.ldlibs.join(" ");
        for (lang, _) in LANGUAGES {
            args.push(format!("-DCMAKE_{}_STANDARD_LIBRARIES={}", lang, ldlibs));
        }
    }

    args
}
