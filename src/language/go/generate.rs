use super::fileinfo::{go_file_info, GoFileInfo};
use super::{import_path, DEFAULT_LIB_NAME, DEFAULT_TEST_NAME};
use crate::language::{package_base_name, GenerateArgs, GenerateResult};
use crate::rule::Rule;
use std::collections::BTreeSet;
use tracing::{debug, warn};

const PUBLIC: &str = "//visibility:public";
const PRIVATE: &str = "//visibility:private";

pub(super) fn generate(args: &GenerateArgs<'_>) -> GenerateResult {
    let c = args.config;
    let base = package_base_name(c, args.rel);
    let importpath = import_path(c, args.rel);

    let mut lib_files = Vec::new();
    let mut test_files = Vec::new();
    for name in args.regular_files.iter().filter(|n| n.ends_with(".go")) {
        match go_file_info(args.dir, name) {
            Ok(Some(info)) if info.is_test => test_files.push(info),
            Ok(Some(info)) => lib_files.push(info),
            Ok(None) => warn!(rel = %args.rel, file = %name, "Go file has no package clause"),
            Err(e) => warn!(rel = %args.rel, error = %e, "Skipping unreadable Go file"),
        }
    }

    let mut lib_srcs = sorted_names(&lib_files);
    lib_srcs.extend(args.gen_files.iter().filter(|n| n.ends_with(".go")).cloned());
    lib_srcs.sort();
    lib_srcs.dedup();
    let test_srcs = sorted_names(&test_files);

    let proto = args
        .other_gen
        .iter()
        .find(|r| r.kind() == "proto_library")
        .map(|r| r.name().to_string());
    let go_proto_name = format!("{}_go_proto", base);

    let mut result = GenerateResult::default();

    match &proto {
        Some(proto_name) => {
            let mut rule = Rule::new("go_proto_library", go_proto_name.as_str());
            rule.set_attr("proto", format!(":{}", proto_name));
            if !importpath.is_empty() {
                rule.set_attr("importpath", importpath.as_str());
            }
            rule.set_attr("visibility", vec![PUBLIC.to_string()]);
            result.gen.push(rule);
        }
        // Only prune once the proto_library itself is being pruned.
        None if args.other_empty.iter().any(|r| r.kind() == "proto_library") => {
            result
                .empty
                .push(Rule::new("go_proto_library", go_proto_name.as_str()));
        }
        None => {}
    }

    let is_main = lib_files.iter().any(GoFileInfo::is_main);
    let has_lib = !lib_srcs.is_empty();

    if has_lib {
        let mut lib = Rule::new("go_library", DEFAULT_LIB_NAME);
        lib.set_attr("srcs", lib_srcs);
        if proto.is_some() {
            lib.set_attr("embed", vec![format!(":{}", go_proto_name)]);
        }
        if !importpath.is_empty() {
            lib.set_attr("importpath", importpath.as_str());
        }
        let visibility = if is_main { PRIVATE } else { PUBLIC };
        lib.set_attr("visibility", vec![visibility.to_string()]);
        lib.set_imports(union_imports(&lib_files));
        result.gen.push(lib);
    } else {
        result.empty.push(Rule::new("go_library", DEFAULT_LIB_NAME));
    }

    if has_lib && is_main {
        let mut bin = Rule::new("go_binary", base.as_str());
        bin.set_attr("embed", vec![format!(":{}", DEFAULT_LIB_NAME)]);
        bin.set_attr("visibility", vec![PUBLIC.to_string()]);
        result.gen.push(bin);
    } else {
        result.empty.push(Rule::new("go_binary", base.as_str()));
    }

    if test_srcs.is_empty() {
        result.empty.push(Rule::new("go_test", DEFAULT_TEST_NAME));
    } else {
        let mut test = Rule::new("go_test", DEFAULT_TEST_NAME);
        test.set_attr("srcs", test_srcs);
        if has_lib {
            test.set_attr("embed", vec![format!(":{}", DEFAULT_LIB_NAME)]);
        }
        test.set_imports(union_imports(&test_files));
        result.gen.push(test);
    }

    debug!(
        rel = %args.rel,
        generated = result.gen.len(),
        empty = result.empty.len(),
        "Generated Go rules"
    );
    result
}

fn sorted_names(files: &[GoFileInfo]) -> Vec<String> {
    let mut names: Vec<String> = files.iter().map(|f| f.name.clone()).collect();
    names.sort();
    names
}

fn union_imports(files: &[GoFileInfo]) -> Vec<String> {
    files
        .iter()
        .flat_map(|f| f.imports.iter().cloned())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
