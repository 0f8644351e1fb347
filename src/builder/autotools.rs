//! Autotools configure arguments.
//!
//! Flags are passed as `VAR=value` arguments to `configure`, which records
//! them for the later `make` runs.

use std::path::PathBuf;

use crate::builder::args::ArgInput;

pub fn configure_args(input: &ArgInput<'_>) -> Vec<String> {
    let flags = input.spec.flags();
    let mut args = vec![format!("--prefix={}", input.prefix.display())];

    let mut push = |var: &str, values: Vec<String>| {
        if !values.is_empty() {
            args.push(format!("{}={}", var, values.join(" ")));
        }
    };

    push("CPPFLAGS", flags.cppflags.clone());
    push("CFLAGS", flags.cflags.clone());
    push("CXXFLAGS", flags.cxxflags.clone());
    push("FFLAGS", flags.fflags.clone());

    let mut ldflags = flags.ldflags.clone();
    let mut deps: Vec<PathBuf> = Vec::new();
    for prefix in input.dep_prefixes {
        if !deps.contains(prefix) {
            deps.push(prefix.clone());
        }
    }
    for prefix in input.platform.filter_system_paths(&deps) {
        ldflags.push(format!("-L{}", prefix.join("lib").display()));
    }
    // A package without dependencies gets no rpath entries.
    if !deps.is_empty() || !input.link_prefixes.is_empty() {
        ldflags.extend(input.rpaths().into_iter().map(|p| format!("-Wl,-rpath,{}", p)));
    }
    push("LDFLAGS", ldflags);
    push("LIBS", flags.ldlibs.clone());

    args.extend(input.extra_args());
    args
}
