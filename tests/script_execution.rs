//! Integration tests running stepwise.yml scripts end to end

mod common;

use common::{build_script, create_test_script, create_test_script_in_subdir, read_lines};
use std::fs;
use stepwise::engine::TaskArgument;
use stepwise::error::{ArgumentError, ConfigError, StepwiseError, StructuralError};
use stepwise::config::ScriptSource;

#[test]
fn test_dependencies_run_before_task() {
    let (dir, script) = create_test_script(
        r#"
tasks:
  restore:
    run: "echo restore >> log.txt"
  compile:
    step: true
    deps: [restore]
    run: "echo compile >> log.txt"
  test:
    deps: [restore, compile]
    run: "echo test >> log.txt"
"#,
    );

    let build = build_script(&script);
    build.registry.invoke("test", &[]).unwrap();

    assert_eq!(
        read_lines(&dir.path().join("log.txt")),
        vec!["restore", "restore", "compile", "test"]
    );
}

#[test]
fn test_step_with_arguments_from_dependencies() {
    let (dir, script) = create_test_script(
        r#"
tasks:
  Step1:
    step: true
    params:
      - name: text
      - { name: count, type: int, default: 0 }
    run: "echo ${text}-${count} >> log.txt"
  Step2:
    deps:
      - task: step1
        args: [second]
  Step3:
    deps:
      - task: Step1
        args: [first, "count=1"]
      - task: STEP1
        args: [second, 0]
      - step2
"#,
    );

    let build = build_script(&script);
    build.registry.invoke("step3", &[]).unwrap();

    assert_eq!(
        read_lines(&dir.path().join("log.txt")),
        vec!["first-1", "second-0"]
    );
}

#[test]
fn test_namespaced_tasks_resolve_upward() {
    let (dir, script) = create_test_script(
        r#"
tasks:
  lint:
    run: "echo root-lint >> log.txt"
namespaces:
  docker:
    tasks:
      build:
        run: "echo docker-build >> log.txt"
      push:
        deps: [build, lint]
        run:
          - task: "docker:images:prune"
    namespaces:
      images:
        tasks:
          prune:
            run: "echo prune >> log.txt"
"#,
    );

    let build = build_script(&script);
    build.registry.invoke("Docker:Push", &[]).unwrap();

    assert_eq!(
        read_lines(&dir.path().join("log.txt")),
        vec!["docker-build", "root-lint", "prune"]
    );
}

#[test]
fn test_runtime_task_items_use_interpolated_names() {
    let (dir, script) = create_test_script(
        r#"
enums:
  Target: [Linux, Windows]
tasks:
  package:
    params:
      - { name: target, type: Target }
    run:
      - task: { name: "package-${target}", args: ["${target}"] }
  package-linux:
    step: true
    params: [{ name: target }]
    run: "echo ${target} >> log.txt"
  package-windows:
    step: true
    params: [{ name: target }]
    run: "echo ${target} >> log.txt"
"#,
    );

    let build = build_script(&script);
    build
        .registry
        .invoke("package", &[TaskArgument::positional("target.linux")])
        .unwrap();
    build
        .registry
        .invoke("package", &[TaskArgument::named("TARGET", "LINUX")])
        .unwrap();
    build
        .registry
        .invoke("package", &[TaskArgument::positional("Windows")])
        .unwrap();

    assert_eq!(read_lines(&dir.path().join("log.txt")), vec!["Linux", "Windows"]);
}

#[test]
fn test_runtime_task_item_with_sibling_args() {
    let (dir, script) = create_test_script(
        r#"
tasks:
  compile:
    params: [{ name: config, default: Release }]
    run:
      - task: "lint"
        args: ["${config}"]
  lint:
    params: [{ name: config, default: Debug }]
    run: "echo ${config} >> lint.txt"
"#,
    );

    build_script(&script).registry.invoke("compile", &[]).unwrap();
    assert_eq!(read_lines(&dir.path().join("lint.txt")), vec!["Release"]);
}

#[test]
fn test_shell_command_substitution_is_escaped() {
    let (dir, script) = create_test_script(
        r#"
tasks:
  greet:
    run: "echo $$(echo hello) >> log.txt"
"#,
    );

    build_script(&script).registry.invoke("greet", &[]).unwrap();
    assert_eq!(read_lines(&dir.path().join("log.txt")), vec!["hello"]);
}

#[test]
fn test_command_options() {
    let (_dir, script, sub_dir) = create_test_script_in_subdir(
        r#"
tasks:
  touch:
    run:
      - command:
          exec: "touch made-here"
          dir: subdir
          quiet: true
"#,
    );

    build_script(&script).registry.invoke("touch", &[]).unwrap();
    assert!(sub_dir.join("made-here").exists());
}

#[test]
fn test_failing_command_names_the_task() {
    let (_dir, script) = create_test_script(
        r#"
tasks:
  broken:
    run: "exit 4"
  outer:
    deps: [broken]
"#,
    );

    let err = build_script(&script).registry.invoke("outer", &[]).unwrap_err();
    match err {
        StepwiseError::Invocation(err) => assert_eq!(err.task, "broken"),
        other => panic!("expected an invocation error, got {other}"),
    }
}

#[test]
fn test_conversion_error_names_parameter() {
    let (_dir, script) = create_test_script(
        r#"
tasks:
  wait:
    params: [{ name: seconds, type: int }]
    run: "sleep ${seconds}"
"#,
    );

    let err = build_script(&script)
        .registry
        .invoke("wait", &[TaskArgument::positional("soon")])
        .unwrap_err();
    assert!(matches!(
        err,
        StepwiseError::Argument(ArgumentError::Conversion { ref parameter, position: 1, .. })
            if parameter == "seconds"
    ));
}

#[test]
fn test_structural_errors_from_script() {
    let cases = [
        ("tasks:\n  a: { deps: [a] }\n", "recursive"),
        ("tasks:\n  a: { deps: [b] }\n  b: { deps: [a] }\n", "cycle"),
        ("tasks:\n  a: { deps: [missing] }\n", "unknown"),
        ("tasks:\n  a:\n    returns: int\n", "signature"),
        (
            "tasks:\n  a:\n    params: [{ name: x }, { name: X }]\n",
            "signature",
        ),
    ];

    for (yaml, expected) in cases {
        let (_dir, script) = create_test_script(yaml);
        let source = ScriptSource::load(&script).unwrap();
        let analysis = stepwise::config::analyze(&source).unwrap();
        let err = stepwise::engine::build_graph(&analysis.descriptors, analysis.enums).unwrap_err();

        let matched = match expected {
            "recursive" => matches!(err, StructuralError::RecursiveCall { .. }),
            "cycle" => matches!(err, StructuralError::CyclicDependency { .. }),
            "unknown" => matches!(err, StructuralError::UnknownTask { .. }),
            _ => matches!(err, StructuralError::SignatureViolation { .. }),
        };
        assert!(matched, "{yaml}: unexpected error {err}");
    }
}

#[test]
fn test_tasks_split_across_loaded_files() {
    let (dir, script) = create_test_script(
        r#"
load: [ci/release.yml]
tasks:
  build:
    step: true
    run: "echo build >> log.txt"
"#,
    );
    fs::create_dir(dir.path().join("ci")).unwrap();
    fs::write(
        dir.path().join("ci/release.yml"),
        "tasks:\n  release:\n    deps: [build]\n    run: \"echo release >> log.txt\"\n",
    )
    .unwrap();

    build_script(&script).registry.invoke("release", &[]).unwrap();
    assert_eq!(
        read_lines(&dir.path().join("log.txt")),
        vec!["build", "release"]
    );
}

#[test]
fn test_duplicate_across_files_is_rejected() {
    let (dir, script) = create_test_script("load: [other.yml]\ntasks:\n  Build: {}\n");
    fs::write(dir.path().join("other.yml"), "tasks:\n  build: {}\n").unwrap();

    let source = ScriptSource::load(&script).unwrap();
    let analysis = stepwise::config::analyze(&source).unwrap();
    let err = stepwise::engine::build_graph(&analysis.descriptors, analysis.enums).unwrap_err();
    assert!(matches!(err, StructuralError::DuplicateTaskCase { .. }));
}

#[test]
fn test_invalid_yaml_is_a_config_error() {
    let (_dir, script) = create_test_script("tasks: [");
    assert!(matches!(
        ScriptSource::load(&script),
        Err(ConfigError::Yaml { .. })
    ));
}
