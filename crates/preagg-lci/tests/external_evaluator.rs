#![cfg(unix)]


use preagg_core::array::array_file_name;
use preagg_core::context::ResultType;
use preagg_core::BatchKey;
use preagg_lci::{
    dispatch, entity_complete, resolve_resources, CommandEvaluator, DispatchRequest, Evaluator,
    ThreadLauncher, WorkerOutcome,
};

const DRAW_LOOP: &str = r#"i=0
while [ "$i" -lt "$PREAGG_ITERATIONS" ]; do
  echo '{"inventory": [[1.0, 2.0], [0.5, 0.5]]}'
  i=$((i + 1))
done"#;

fn one_worker(batch: BatchKey) -> DispatchRequest {
    let mut request = DispatchRequest::new(batch);
    request.parallel_jobs = 1;
    request
}

fn script(body: &str) -> CommandEvaluator {
    CommandEvaluator::new("sh", vec!["-c".into(), body.into(), "evaluator".into()])
}

#[test]
fn command_evaluator_streams_json_lines() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let batch = BatchKey::new(0).unwrap();
    let ctx = fixtures::build_project_with_campaign(dir.path(), batch);
    let resources = resolve_resources(&ctx, ResultType::Probabilistic, batch).unwrap();
    assert_eq!(resources.iterations, fixtures::ITERATIONS);
    assert_eq!(resources.rows, 2);
    assert_eq!(resources.package_paths.len(), 1);

    let evaluator = script(
        r#"test -n "$PREAGG_RESOURCES" || exit 3
echo "{\"inventory\": [[1.0, 2.0], [0.5, 0.5]]}"
echo "{\"error\": \"singular matrix for $1\"}""#,
    );
    let mut session = evaluator.open(&ctx, "a", &resources).expect("open");
    assert_eq!(session.next_draw().unwrap().row_sums(), vec![3.0, 1.0]);
    let err = session.next_draw().unwrap_err();
    assert_eq!(err.code(), "evaluator-draw");
    assert!(err.to_string().contains("singular matrix for a"));
    assert_eq!(session.next_draw().unwrap_err().code(), "evaluator-eof");
}

#[test]
fn missing_program_fails_on_open() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let batch = BatchKey::new(0).unwrap();
    let ctx = fixtures::build_project_with_campaign(dir.path(), batch);
    let resources = resolve_resources(&ctx, ResultType::Probabilistic, batch).unwrap();
    let evaluator = CommandEvaluator::new(dir.path().join("no-such-solver"), Vec::new());
    let err = evaluator.open(&ctx, "a", &resources).err().expect("spawn error");
    assert_eq!(err.code(), "evaluator-spawn");
}

#[test]
fn entity_without_any_draw_is_skipped() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let batch = BatchKey::new(0).unwrap();
    let ctx = fixtures::build_project_with_campaign(dir.path(), batch);
    let evaluator = script(&format!(
        r#"if [ "$1" = b ]; then exit 2; fi
{DRAW_LOOP}"#
    ));

    let summary = dispatch(&ctx, &one_worker(batch), &ThreadLauncher::new(&evaluator))
        .expect("dispatch");
    let WorkerOutcome::Finished(report) = &summary.outcomes[0] else {
        panic!("worker crashed");
    };
    assert_eq!(report.completed, vec!["a", "c"]);
    assert_eq!(report.failed.len(), 1);
    assert_eq!(report.failed[0].entity, "b");
    assert!(report.failed[0].error.contains("session-closed"));
    assert_eq!(report.nan_columns, 0);

    let lci_dir = ctx.lci_dir(ResultType::Probabilistic, batch);
    assert!(!lci_dir.join(array_file_name("b")).exists());
    assert!(!lci_dir.join("temp").join(array_file_name("b")).exists());
    assert!(!entity_complete(&lci_dir, "b"));
    assert!(entity_complete(&lci_dir, "a"));
}

#[test]
fn failing_exit_status_discards_the_result() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let batch = BatchKey::new(0).unwrap();
    let ctx = fixtures::build_project_with_campaign(dir.path(), batch);
    let evaluator = script(&format!(
        r#"{DRAW_LOOP}
if [ "$1" = c ]; then exit 3; fi"#
    ));

    let summary = dispatch(&ctx, &one_worker(batch), &ThreadLauncher::new(&evaluator))
        .expect("dispatch");
    let WorkerOutcome::Finished(report) = &summary.outcomes[0] else {
        panic!("worker crashed");
    };
    assert_eq!(report.completed, vec!["a", "b"]);
    assert_eq!(report.failed[0].entity, "c");
    assert!(report.failed[0].error.contains("evaluator-status"));

    let lci_dir = ctx.lci_dir(ResultType::Probabilistic, batch);
    assert!(!entity_complete(&lci_dir, "c"));
    assert!(!lci_dir.join("temp").join(array_file_name("c")).exists());

    let retry = script(DRAW_LOOP);
    let summary = dispatch(&ctx, &one_worker(batch), &ThreadLauncher::new(&retry))
        .expect("retry");
    assert_eq!(summary.already_complete, 2);
    assert_eq!(summary.completed(), 1);
    assert!(entity_complete(&lci_dir, "c"));
}

#[test]
fn session_reports_exit_status_on_finish() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let batch = BatchKey::new(0).unwrap();
    let ctx = fixtures::build_project_with_campaign(dir.path(), batch);
    let resources = resolve_resources(&ctx, ResultType::Probabilistic, batch).unwrap();

    let silent = script("exit 0");
    let mut session = silent.open(&ctx, "a", &resources).expect("open");
    assert_eq!(session.next_draw().unwrap_err().code(), "session-closed");

    let failing = script(
        r#"echo '{"inventory": [[1.0], [1.0]]}'
exit 4"#,
    );
    let mut session = failing.open(&ctx, "a", &resources).expect("open");
    assert_eq!(session.next_draw().unwrap().row_sums(), vec![1.0, 1.0]);
    assert_eq!(session.next_draw().unwrap_err().code(), "evaluator-eof");
    assert_eq!(session.finish().unwrap_err().code(), "evaluator-status");
}
