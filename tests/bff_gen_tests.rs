//! End-to-end tests for FASTBuild file set generation.

use bffgen::bff_gen::{self, BffFiles, GenerateError, GenerateOptions, RegenerateRule};
use bffgen::graph::{CommandNode, ConfigOverride, TargetNode};
use bffgen::manifest;
use bffgen::project::{Project, Settings};
use indexmap::IndexMap;
use rstest::{fixture, rstest};

const HR: &str = ";-------------------------------------------------------------------------------";

const BASE: &str = "
{HR}
;Fastbuild makefile - Generated using bffgen
{HR}
#once

{HR}
;Settings
{HR}
Settings
{
\t.CachePath = '.cache'
}

{HR}
;Configurations
{HR}
.ConfigBase =
[
]

Exec('lib-gen')
{
\t.ExecExecutable = 'gen'
\t.ExecArguments = '-o gen/version.h'
\t.ExecOutput = 'gen/version.h'
}
";

const DEBUG: &str = "
{HR}
;Fastbuild config for :Debug
{HR}
#include \"base.bff\"

.config_Debug =
[
\tUsing(.ConfigBase)
]

Alias('lib-Debug')
{
\t.Targets =
\t{
\t\t'lib-gen'
\t}
}

Exec('app-stamp-Debug')
{
\t.ExecExecutable = 'touch'
\t.ExecArguments = 'out/Debug/app.stamp'
\t.ExecInput =
\t{
\t\t'gen/version.h'
\t}
\t.ExecOutput = 'out/Debug/app.stamp'
}

Alias('app-Debug')
{
\t.Targets =
\t{
\t\t'lib-Debug',
\t\t'app-stamp-Debug'
\t}
}

Alias('Debug')
{
\t.Targets =
\t{
\t\t'app-Debug',
\t\t'lib-Debug'
\t}
}

Alias('ALL_BUILD-Debug')
{
\t.Targets =
\t{
\t\t'Debug'
\t}
}
";

const MAIN: &str = "#include \"Debug.bff\"
#include \"Release.bff\"

.all_configs =
{
\t.config_Debug,
\t.config_Release
}

{HR}
;Aliases
{HR}
;Per targets

Alias('app')
{
\t.Targets =
\t{
\t\t'app-Debug',
\t\t'app-Release'
\t}
}

Alias('lib')
{
\t.Targets =
\t{
\t\t'lib-Debug',
\t\t'lib-Release'
\t}
}

;All

Alias('All')
{
\t.Targets =
\t{
\t\t'Debug',
\t\t'Release'
\t}
}
";

/// Fill in the rule and restore the space that ends struct and array
/// headers.
fn expand(template: &str) -> String {
    template.replace("{HR}", HR).replace(" =\n", " = \n")
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_owned()).collect()
}

fn render(project: &Project, options: &GenerateOptions) -> Result<IndexMap<String, String>, GenerateError> {
    let mut files = BffFiles::in_memory(project.configurations());
    bff_gen::generate(project, &mut files, options)?;
    Ok(files
        .finish()?
        .into_iter()
        .map(|(name, bytes)| (name, String::from_utf8(bytes).expect("utf8")))
        .collect())
}

#[fixture]
fn two_configs() -> Project {
    let yaml = std::fs::read_to_string(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/tests/data/two_configs.yml"
    ))
    .expect("read manifest");
    let parsed = manifest::from_str(&yaml).expect("parse manifest");
    Project::from_manifest(&parsed).expect("valid project")
}

#[rstest]
fn two_configuration_manifest_is_byte_exact(two_configs: Project) {
    let files = render(&two_configs, &GenerateOptions::default()).expect("generate");
    let names: Vec<&str> = files.keys().map(String::as_str).collect();
    assert_eq!(names, ["base.bff", "Debug.bff", "Release.bff", "fbuild.bff"]);
    assert_eq!(files.get("base.bff").map(String::as_str), Some(expand(BASE).as_str()));
    assert_eq!(files.get("Debug.bff").map(String::as_str), Some(expand(DEBUG).as_str()));
    let release = expand(DEBUG).replace("Debug", "Release");
    assert_eq!(files.get("Release.bff").map(String::as_str), Some(release.as_str()));
    assert_eq!(files.get("fbuild.bff").map(String::as_str), Some(expand(MAIN).as_str()));
}

#[rstest]
fn regenerate_rule_closes_the_main_file(two_configs: Project) {
    let options = GenerateOptions {
        regenerate: Some(RegenerateRule {
            inputs: strings(&["/src/bffgen.yml"]),
            executable: "/usr/bin/bffgen".into(),
            arguments: "-f /src/bffgen.yml generate".into(),
        }),
    };
    let files = render(&two_configs, &options).expect("generate");
    let main = files.get("fbuild.bff").expect("main file");
    let expected_tail = expand(
        "
{HR}
;re-run bffgen to update fastbuild configs
{HR}
Exec('rebuild-bff')
{
\t.ExecInput =
\t{
\t\t'/src/bffgen.yml'
\t}
\t.ExecExecutable = '/usr/bin/bffgen'
\t.ExecArguments = '-f /src/bffgen.yml generate'
\t.ExecIsGenerator = true
\t.ExecOutput = 'fbuild.bff'
}
",
    );
    assert!(main.ends_with(&expected_tail), "unexpected main file:\n{main}");
}

#[rstest]
fn identical_commands_on_two_targets_are_defined_once() {
    let gen_cmd = CommandNode::new("gen", strings(&["gen a.h"])).with_outputs(strings(&["a.h"]));
    let project = Project::new(
        strings(&["Debug"]),
        Settings::default(),
        vec![
            TargetNode::new("one").with_commands([&gen_cmd]),
            TargetNode::new("two").with_commands([&gen_cmd]),
        ],
        vec![gen_cmd.clone()],
    )
    .expect("valid project");
    let files = render(&project, &GenerateOptions::default()).expect("generate");
    let base = files.get("base.bff").expect("base");
    assert_eq!(base.matches("Exec(").count(), 1);
    let debug = files.get("Debug.bff").expect("debug");
    assert!(debug.contains("Alias('two-Debug')\n{\n\t.Targets = \n\t{\n\t\t'one-gen'\n\t}\n}\n"));
}

#[rstest]
fn two_commands_writing_one_file_fail() {
    let first = CommandNode::new("first", strings(&["gen a.h"])).with_outputs(strings(&["a.h"]));
    let second = CommandNode::new("second", strings(&["other a.h"])).with_outputs(strings(&["a.h"]));
    let project = Project::new(
        strings(&["Debug", "Release"]),
        Settings::default(),
        vec![TargetNode::new("app").with_commands([&first, &second])],
        vec![first.clone(), second.clone()],
    )
    .expect("valid project");
    let err = render(&project, &GenerateOptions::default()).expect_err("duplicate output");
    match err {
        GenerateError::DuplicateOutput(dup) => {
            assert_eq!(dup.output, "a.h");
            assert_eq!(dup.configuration, "Debug");
            assert_eq!(dup.existing, "app-first");
            assert_eq!(dup.candidate, "app-second");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
fn cyclic_commands_abort_the_pass() {
    let a = CommandNode::new("a", strings(&["mk a"]))
        .with_outputs(strings(&["a"]))
        .with_inputs(strings(&["b"]));
    let b = CommandNode::new("b", strings(&["mk b"]))
        .with_outputs(strings(&["b"]))
        .with_inputs(strings(&["a"]));
    let project = Project::new(
        strings(&["Debug"]),
        Settings::default(),
        vec![TargetNode::new("app").with_commands([&a, &b])],
        vec![a.clone(), b.clone()],
    )
    .expect("valid project");
    let err = render(&project, &GenerateOptions::default()).expect_err("cycle");
    assert!(
        matches!(err, GenerateError::Cycle(ref cycle) if cycle.cycle == ["a", "b", "a"]),
        "unexpected error: {err}"
    );
}

#[rstest]
fn imported_and_empty_targets_produce_no_alias() {
    let project = Project::new(
        strings(&["Debug"]),
        Settings::default(),
        vec![
            TargetNode::new("prebuilt").imported(true),
            TargetNode::new("empty"),
            TargetNode::new("user").with_depends(strings(&["prebuilt", "empty"])),
        ],
        Vec::new(),
    )
    .expect("valid project");
    let files = render(&project, &GenerateOptions::default()).expect("generate");
    let debug = files.get("Debug.bff").expect("debug");
    assert!(!debug.contains("Alias("), "unexpected aliases:\n{debug}");
    let main = files.get("fbuild.bff").expect("main");
    assert!(!main.contains("Alias('All')"));
}

#[rstest]
#[case::same_output("x.h", "x.h")]
#[case::different_outputs("x.h", "y.h")]
fn joined_names_that_coincide_fail(#[case] first_out: &str, #[case] second_out: &str) {
    let c = CommandNode::new("c", strings(&["one x.h"])).with_outputs(strings(&[first_out]));
    let b_c = CommandNode::new("b-c", strings(&["two x.h"])).with_outputs(strings(&[second_out]));
    let project = Project::new(
        strings(&["Debug"]),
        Settings::default(),
        vec![
            TargetNode::new("a-b").with_commands([&c]),
            TargetNode::new("a").with_commands([&b_c]),
        ],
        vec![c.clone(), b_c.clone()],
    )
    .expect("valid project");
    let err = render(&project, &GenerateOptions::default()).expect_err("name clash");
    match err {
        GenerateError::DuplicateName(dup) => {
            assert_eq!(dup.name, "a-b-c");
            assert_eq!(dup.existing, "command 'b-c' of target 'a'");
            assert_eq!(dup.candidate, "command 'c' of target 'a-b'");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
fn command_named_after_a_configuration_clashes_with_the_target_alias() {
    let cmd = CommandNode::new("Debug", strings(&["touch d"])).with_outputs(strings(&["d"]));
    let project = Project::new(
        strings(&["Debug"]),
        Settings::default(),
        vec![TargetNode::new("app").with_commands([&cmd])],
        vec![cmd.clone()],
    )
    .expect("valid project");
    let err = render(&project, &GenerateOptions::default()).expect_err("name clash");
    match err {
        GenerateError::DuplicateName(dup) => {
            assert_eq!(dup.name, "app-Debug");
            assert_eq!(dup.existing, "command 'Debug' of target 'app'");
            assert_eq!(dup.candidate, "alias of target 'app' in Debug");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
fn two_commands_with_one_symbolic_output_fail() {
    let p = CommandNode::new("p", strings(&["one"])).with_symbolic_outputs(strings(&["stamp"]));
    let q = CommandNode::new("q", strings(&["two"])).with_symbolic_outputs(strings(&["stamp"]));
    let project = Project::new(
        strings(&["Debug", "Release"]),
        Settings::default(),
        vec![TargetNode::new("app").with_commands([&p, &q])],
        vec![p.clone(), q.clone()],
    )
    .expect("valid project");
    let err = render(&project, &GenerateOptions::default()).expect_err("duplicate output");
    match err {
        GenerateError::DuplicateOutput(dup) => {
            assert_eq!(dup.output, "stamp");
            assert_eq!(dup.configuration, "Debug");
            assert_eq!(dup.existing, "app-p");
            assert_eq!(dup.candidate, "app-q");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[rstest]
fn aliased_configuration_owns_the_outputs_it_builds() {
    let gen_cmd = CommandNode::new("gen", strings(&["gen a"]))
        .with_outputs(strings(&["Release"]))
        .with_override(
            "Release",
            ConfigOverride {
                command_lines: Some(strings(&["gen b"])),
                working_directory: None,
            },
        );
    let other = CommandNode::new("other", strings(&["other"]))
        .with_outputs(strings(&["$<CONFIG>"]));
    let project = Project::new(
        strings(&["Debug", "Release"]),
        Settings::default(),
        vec![TargetNode::new("app").with_commands([&gen_cmd, &other])],
        vec![gen_cmd.clone(), other.clone()],
    )
    .expect("valid project");
    let err = render(&project, &GenerateOptions::default()).expect_err("duplicate output");
    match err {
        GenerateError::DuplicateOutput(dup) => {
            assert_eq!(dup.output, "Release");
            assert_eq!(dup.configuration, "Release");
            assert_eq!(dup.existing, "app-gen-Debug");
            assert_eq!(dup.candidate, "app-other-Release");
        }
        other_err => panic!("unexpected error: {other_err}"),
    }
}
