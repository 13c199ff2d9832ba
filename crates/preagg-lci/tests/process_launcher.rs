#![cfg(unix)]

use std::fs;
use std::path::Path;

use preagg_core::array::Precision;
use preagg_core::context::ResultType;
use preagg_core::BatchKey;
use preagg_lci::{ProcessLauncher, WorkerAssignment, WorkerLauncher, WorkerOutcome};

fn assignment(root: &Path, worker_id: usize) -> WorkerAssignment {
    WorkerAssignment {
        worker_id,
        project_dir: root.join("project"),
        database: "db".into(),
        result_dir: root.join("results"),
        result_type: ResultType::Probabilistic,
        batch: BatchKey::new(0).unwrap(),
        precision: Precision::F32,
        entities: vec!["a".into(), "b".into()],
    }
}

/// Fake worker: `$1` is `--assignment`, `$2` the assignment file.
fn shell(body: &str) -> ProcessLauncher {
    ProcessLauncher::new("sh", vec!["-c".into(), body.into(), "worker".into()])
}

#[test]
fn reports_written_by_workers_are_read_back() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let work_dir = dir.path().join("workers");
    let launcher = shell(
        r#"cp "$2" "$2.seen"
printf '{"worker_id": 0, "iterations": 4, "completed": ["a", "b"], "failed": [], "nan_columns": 1, "total_seconds": 0.5}' > "${2%.json}.report.json""#,
    );
    let sent = assignment(dir.path(), 0);

    let outcomes = launcher.launch(std::slice::from_ref(&sent), &work_dir).expect("launch");
    let WorkerOutcome::Finished(report) = &outcomes[0] else {
        panic!("worker crashed: {outcomes:?}");
    };
    assert_eq!(report.completed, vec!["a", "b"]);
    assert_eq!(report.nan_columns, 1);
    assert_eq!(report.average_seconds(), Some(0.25));

    let seen = WorkerAssignment::load(&work_dir.join("worker_0.json.seen")).expect("assignment");
    assert_eq!(seen, sent);
}

#[test]
fn clean_exit_without_report_counts_as_crash() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let work_dir = dir.path().join("workers");
    fs::create_dir_all(&work_dir).unwrap();
    let stale = work_dir.join("worker_0.report.json");
    fs::write(
        &stale,
        r#"{"worker_id": 0, "iterations": 4, "completed": ["a", "b"], "failed": [], "nan_columns": 0, "total_seconds": 1.0}"#,
    )
    .unwrap();

    let outcomes = shell("exit 0")
        .launch(&[assignment(dir.path(), 0)], &work_dir)
        .expect("launch");
    assert!(matches!(
        &outcomes[0],
        WorkerOutcome::Crashed { worker_id: 0, entities: 2, .. }
    ));
    assert!(!stale.exists());
}

#[test]
fn failing_workers_are_reported_per_worker() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let work_dir = dir.path().join("workers");
    let launcher = shell(
        r#"case "$2" in
  *worker_1.json) exit 3 ;;
esac
printf '{"worker_id": 0, "iterations": 1, "completed": ["a", "b"], "failed": [], "nan_columns": 0, "total_seconds": 0.0}' > "${2%.json}.report.json""#,
    );
    let outcomes = launcher
        .launch(&[assignment(dir.path(), 0), assignment(dir.path(), 1)], &work_dir)
        .expect("launch");
    assert_eq!(outcomes.len(), 2);
    assert!(matches!(outcomes[0], WorkerOutcome::Finished(_)));
    match &outcomes[1] {
        WorkerOutcome::Crashed { worker_id, error, .. } => {
            assert_eq!(*worker_id, 1);
            assert!(error.contains("exit"), "{error}");
        }
        other => panic!("expected crash, got {other:?}"),
    }
}

#[test]
fn missing_program_crashes_every_worker() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let launcher = ProcessLauncher::new(dir.path().join("no-such-worker"), Vec::new());
    let outcomes = launcher
        .launch(&[assignment(dir.path(), 0)], &dir.path().join("workers"))
        .expect("launch");
    assert_eq!(outcomes[0].worker_id(), 0);
    assert!(matches!(outcomes[0], WorkerOutcome::Crashed { .. }));
}
