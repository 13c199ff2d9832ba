#![cfg(unix)]


use std::fs;

use preagg_core::array::{array_file_name, ResultArray};
use preagg_core::context::ResultType;
use preagg_core::BatchKey;
use preagg_lci::entity_complete;

const EVALUATOR_SCRIPT: &str = r#"i=0
while [ "$i" -lt "$PREAGG_ITERATIONS" ]; do
  echo '{"inventory": [[1.0, 2.0], [0.5, 0.5]]}'
  i=$((i + 1))
done"#;

#[test]
fn lci_runs_worker_processes_and_resumes() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let ctx = fixtures::build_project(dir.path());
    let config = fixtures::write_config(dir.path(), "sh", &["-c", EVALUATOR_SCRIPT, "evaluator"]);

    let base = fixtures::preagg(&config, &["base-resources", "--batch", "0", "--iterations", "4"]);
    assert!(base.status.success(), "{}", String::from_utf8_lossy(&base.stderr));

    let batch = BatchKey::new(0).unwrap();
    let lci_dir = ctx.lci_dir(ResultType::Probabilistic, batch);
    let workers = lci_dir.join("workers");

    let first = fixtures::preagg(&config, &["lci", "--batch", "0", "--parallel-jobs", "2"]);
    assert!(first.status.success(), "{}", String::from_utf8_lossy(&first.stderr));
    assert!(workers.join("worker_0.json").is_file());
    assert!(workers.join("worker_1.json").is_file());
    assert!(workers.join("worker_1.report.json").is_file());

    let mut modified = Vec::new();
    for entity in ["a", "b", "c"] {
        let path = lci_dir.join(array_file_name(entity));
        assert!(entity_complete(&lci_dir, entity), "{entity} incomplete");
        let array = ResultArray::read(&path).expect("array");
        assert_eq!(array.shape(), (2, 4));
        assert_eq!(array.row(0), vec![3.0; 4]);
        assert_eq!(array.row(1), vec![1.0; 4]);
        modified.push(fs::metadata(&path).unwrap().modified().unwrap());
    }
    assert!(!lci_dir.join("temp").join(array_file_name("a")).exists());

    let second = fixtures::preagg(&config, &["lci", "--batch", "0", "--parallel-jobs", "2"]);
    assert!(second.status.success());
    assert!(String::from_utf8_lossy(&second.stderr).contains("no result arrays to generate"));
    for (entity, before) in ["a", "b", "c"].into_iter().zip(modified) {
        let path = lci_dir.join(array_file_name(entity));
        assert_eq!(fs::metadata(&path).unwrap().modified().unwrap(), before);
    }
}

#[test]
fn lci_leaves_failing_entities_pending() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let ctx = fixtures::build_project(dir.path());
    let script = format!("if [ \"$1\" = b ]; then exit 2; fi\n{EVALUATOR_SCRIPT}");
    let config = fixtures::write_config(dir.path(), "sh", &["-c", &script, "evaluator"]);

    let base = fixtures::preagg(&config, &["base-resources", "--batch", "0", "--iterations", "4"]);
    assert!(base.status.success(), "{}", String::from_utf8_lossy(&base.stderr));
    let run = fixtures::preagg(&config, &["lci", "--batch", "0", "--parallel-jobs", "2"]);
    assert!(run.status.success(), "{}", String::from_utf8_lossy(&run.stderr));

    let lci_dir = ctx.lci_dir(ResultType::Probabilistic, BatchKey::new(0).unwrap());
    assert!(entity_complete(&lci_dir, "a"));
    assert!(!entity_complete(&lci_dir, "b"));
    assert!(entity_complete(&lci_dir, "c"));
    assert!(String::from_utf8_lossy(&run.stderr).contains("rerun the same command to resume"));
}
