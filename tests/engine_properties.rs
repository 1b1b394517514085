//! Integration tests for graph validation, memoization and argument binding

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use stepwise::engine::{
    build_graph, task_fn, DeclaredCall, EnumCatalog, EnumType, Registry, Scope, Session,
    TaskArgument, TaskDescriptor, TaskIdentity,
};
use stepwise::error::{ArgumentError, StepwiseError, StructuralError};

fn task(name: &str) -> TaskDescriptor {
    TaskDescriptor::new(TaskIdentity::new(Scope::root(), name))
}

fn counting(counter: &Arc<AtomicUsize>) -> impl Fn(&stepwise::engine::TaskContext<'_>) -> anyhow::Result<()> + Send + Sync {
    let counter = Arc::clone(counter);
    task_fn(move |_| {
        counter.fetch_add(1, Ordering::SeqCst);
        Ok(())
    })
}

fn step1() -> TaskDescriptor {
    task("Step1")
        .step()
        .param("text", "string", None)
        .param("count", "int", Some("0"))
}

#[test]
fn test_cycle_is_rejected_before_anything_runs() {
    let result = build_graph(
        &[
            task("A").calls(DeclaredCall::new("B")),
            task("B").calls(DeclaredCall::new("C")),
            task("C").calls(DeclaredCall::new("A")),
        ],
        EnumCatalog::new(),
    );

    match result {
        Err(StructuralError::CyclicDependency { path }) => {
            assert_eq!(path.first(), path.last());
            assert!(path.len() >= 4);
        }
        other => panic!("expected a cycle error, got {other:?}"),
    }
}

#[test]
fn test_declared_self_call_is_recursive() {
    let result = build_graph(
        &[task("Loop").calls(DeclaredCall::new("loop"))],
        EnumCatalog::new(),
    );
    assert!(matches!(result, Err(StructuralError::RecursiveCall { .. })));
}

#[test]
fn test_step_runs_once_across_paths() {
    let graph = build_graph(
        &[
            task("Step1").step(),
            task("Step2").step().calls(DeclaredCall::new("Step1")),
            task("Step3")
                .step()
                .calls(DeclaredCall::new("Step1"))
                .calls(DeclaredCall::new("Step2")),
        ],
        EnumCatalog::new(),
    )
    .unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));
    let record = |name: &'static str| {
        let order = Arc::clone(&order);
        task_fn(move |_| {
            order.lock().unwrap().push(name);
            Ok(())
        })
    };

    let registry = Registry::builder(graph)
        .bind("Step1", record("Step1"))
        .unwrap()
        .bind("Step2", record("Step2"))
        .unwrap()
        .bind("Step3", record("Step3"))
        .unwrap()
        .build()
        .unwrap();

    registry.invoke("Step3", &[]).unwrap();
    assert_eq!(*order.lock().unwrap(), vec!["Step1", "Step2", "Step3"]);
}

#[test]
fn test_always_run_dependency_runs_on_every_path() {
    let graph = build_graph(
        &[
            task("Restore"),
            task("Compile").step().calls(DeclaredCall::new("Restore")),
            task("Test")
                .calls(DeclaredCall::new("Restore"))
                .calls(DeclaredCall::new("Compile")),
        ],
        EnumCatalog::new(),
    )
    .unwrap();

    let restores = Arc::new(AtomicUsize::new(0));
    let compiles = Arc::new(AtomicUsize::new(0));
    let registry = Registry::builder(graph)
        .bind("Restore", counting(&restores))
        .unwrap()
        .bind("Compile", counting(&compiles))
        .unwrap()
        .bind("Test", task_fn(|_| Ok(())))
        .unwrap()
        .build()
        .unwrap();

    registry.invoke("Test", &[]).unwrap();
    registry.invoke("Test", &[]).unwrap();

    assert_eq!(compiles.load(Ordering::SeqCst), 1);
    // Walked on every path even when the step body is skipped
    assert_eq!(restores.load(Ordering::SeqCst), 4);
}

#[test]
fn test_argument_sensitive_reexecution() {
    let graph = build_graph(&[step1()], EnumCatalog::new()).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));
    let registry = Registry::builder(graph)
        .bind("Step1", counting(&counter))
        .unwrap()
        .build()
        .unwrap();

    let calls: [&[TaskArgument]; 4] = [
        &[TaskArgument::positional("first"), TaskArgument::positional("1")],
        &[TaskArgument::positional("second"), TaskArgument::positional("1")],
        &[TaskArgument::positional("second"), TaskArgument::positional("0")],
        &[TaskArgument::positional("second")],
    ];
    for args in calls {
        registry.invoke("Step1", args).unwrap();
    }

    assert_eq!(counter.load(Ordering::SeqCst), 3);
    assert_eq!(registry.executed_records("step1").unwrap(), 3);
}

#[test]
fn test_concurrent_callers_execute_once() {
    let graph = build_graph(&[step1()], EnumCatalog::new()).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));
    let registry = Arc::new(
        Registry::builder(graph)
            .bind("Step1", counting(&counter))
            .unwrap()
            .build()
            .unwrap(),
    );

    let handles: Vec<_> = (0..1000)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..10 {
                    registry
                        .invoke("Step1", &[TaskArgument::positional("parallel")])
                        .unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(counter.load(Ordering::SeqCst), 1);
}

#[test]
fn test_identity_is_case_insensitive() {
    let graph = build_graph(&[task("Task")], EnumCatalog::new()).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));
    let registry = Registry::builder(graph)
        .bind("task", counting(&counter))
        .unwrap()
        .build()
        .unwrap();

    registry.invoke("TASK", &[]).unwrap();
    assert_eq!(registry.find_task("tAsK").unwrap().name(), "Task");
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    let duplicate = build_graph(&[task("Task"), task("TASK")], EnumCatalog::new());
    match duplicate {
        Err(err @ StructuralError::DuplicateTaskCase { .. }) => {
            assert!(err.to_string().contains("case-insensitive"));
        }
        other => panic!("expected a case duplicate error, got {other:?}"),
    }
}

#[test]
fn test_unknown_task_is_reported() {
    let graph = build_graph(&[task("Task")], EnumCatalog::new()).unwrap();
    let registry = Registry::builder(graph)
        .bind("Task", task_fn(|_| Ok(())))
        .unwrap()
        .build()
        .unwrap();

    let err = registry.invoke("Missing", &[]).unwrap_err();
    assert!(matches!(err, StepwiseError::TaskNotFound(name) if name == "Missing"));
}

#[test]
fn test_positional_after_named_is_an_order_error() {
    let graph = build_graph(&[step1()], EnumCatalog::new()).unwrap();
    let counter = Arc::new(AtomicUsize::new(0));
    let registry = Registry::builder(graph)
        .bind("Step1", counting(&counter))
        .unwrap()
        .build()
        .unwrap();

    let err = registry
        .invoke(
            "Step1",
            &[
                TaskArgument::named("text", "x"),
                TaskArgument::positional("1"),
            ],
        )
        .unwrap_err();

    assert!(matches!(
        err,
        StepwiseError::Argument(ArgumentError::Order { position: 2, .. })
    ));
    assert_eq!(counter.load(Ordering::SeqCst), 0);
}

#[test]
fn test_enum_arguments_memoize_by_value() {
    let mut enums = EnumCatalog::new();
    enums.insert(EnumType::new("Days", ["Mon", "Tue"]));
    let graph = build_graph(&[task("Plan").step().param("day", "Days", None)], enums).unwrap();

    let counter = Arc::new(AtomicUsize::new(0));
    let registry = Registry::builder(graph)
        .bind("Plan", counting(&counter))
        .unwrap()
        .build()
        .unwrap();

    registry.invoke("Plan", &[TaskArgument::positional("mon")]).unwrap();
    registry
        .invoke("Plan", &[TaskArgument::positional("Days.Mon")])
        .unwrap();
    registry.invoke("Plan", &[TaskArgument::named("DAY", "tue")]).unwrap();

    assert_eq!(counter.load(Ordering::SeqCst), 2);
}

#[test]
fn test_runtime_invocation_cycle_is_caught() {
    let graph = build_graph(
        &[task("Outer").calls(DeclaredCall::new("Inner")), task("Inner")],
        EnumCatalog::new(),
    )
    .unwrap();

    let registry = Registry::builder(graph)
        .bind("Outer", task_fn(|_| Ok(())))
        .unwrap()
        .bind("Inner", task_fn(|cx| Ok(cx.invoke("outer", &[])?)))
        .unwrap()
        .build()
        .unwrap();

    let err = registry.invoke("Outer", &[]).unwrap_err();
    assert!(matches!(
        err,
        StepwiseError::Structural(StructuralError::CyclicDependency { .. })
    ));
}

#[test]
fn test_failure_is_wrapped_with_task_identity() {
    let graph = build_graph(&[task("Deploy")], EnumCatalog::new()).unwrap();
    let registry = Registry::builder(graph)
        .bind("Deploy", task_fn(|_| anyhow::bail!("target unreachable")))
        .unwrap()
        .build()
        .unwrap();

    match registry.invoke("deploy", &[]).unwrap_err() {
        StepwiseError::Invocation(err) => {
            assert_eq!(err.task, "Deploy");
            assert!(err.source.to_string().contains("target unreachable"));
        }
        other => panic!("expected an invocation error, got {other}"),
    }
}

#[test]
fn test_rebuild_starts_a_fresh_session() {
    let counter = Arc::new(AtomicUsize::new(0));
    let make_registry = || {
        let graph = build_graph(&[task("Once").step()], EnumCatalog::new()).unwrap();
        Registry::builder(graph)
            .bind("Once", counting(&counter))
            .unwrap()
            .build()
            .unwrap()
    };

    let session = Session::new();
    session.install(make_registry());
    session.invoke("Once", &[]).unwrap();
    session.invoke("Once", &[]).unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 1);

    let previous = session.install(make_registry());
    assert!(previous.is_some());
    session.invoke("Once", &[]).unwrap();
    assert_eq!(counter.load(Ordering::SeqCst), 2);
}
