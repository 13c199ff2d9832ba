use std::fs;

use preagg_core::context::{
    DatabaseInfo, ProjectContext, ProjectManifest, ResultType, REQUIRED_COMMON_FILES,
};
use preagg_core::BatchKey;

#[test]
fn missing_project_names_setup_step() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let ctx = ProjectContext::new(dir.path().join("nope"), "db", dir.path());
    let err = ctx.check_project().unwrap_err();
    assert_eq!(err.code(), "project-missing");
    assert!(err.info().hint.as_deref().unwrap().contains("setup"));
}

#[test]
fn database_checks_follow_manifest() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let mut manifest = ProjectManifest::new("demo");
    manifest.store(dir.path()).unwrap();
    let ctx = ProjectContext::new(dir.path(), "db", dir.path());
    assert_eq!(ctx.check_project().unwrap_err().code(), "project-not-set-up");

    manifest.biosphere = Some("biosphere".into());
    manifest.store(dir.path()).unwrap();
    assert_eq!(ctx.check_database().unwrap_err().code(), "database-missing");

    manifest
        .databases
        .insert("db".into(), DatabaseInfo { activities: 0 });
    manifest.store(dir.path()).unwrap();
    assert_eq!(ctx.check_database().unwrap_err().code(), "database-empty");

    manifest
        .databases
        .insert("db".into(), DatabaseInfo { activities: 3 });
    manifest.store(dir.path()).unwrap();
    ctx.check_database().expect("database ok");
}

#[test]
fn missing_common_files_are_listed() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let ctx = ProjectContext::new(dir.path(), "db", dir.path());
    assert_eq!(ctx.missing_common_files().len(), REQUIRED_COMMON_FILES.len());

    fs::create_dir_all(ctx.common_files_dir()).unwrap();
    for name in REQUIRED_COMMON_FILES.iter().skip(1) {
        fs::write(ctx.common_file(name), b"[]").unwrap();
    }
    assert_eq!(ctx.missing_common_files(), vec![REQUIRED_COMMON_FILES[0]]);
    let err = ctx.check_common_files().unwrap_err();
    assert!(err.info().context["missing"].contains("ordered_activity_codes.json"));
}

#[test]
fn layout_is_batch_scoped() {
    let ctx = ProjectContext::new("/p", "db", "/r");
    let batch = BatchKey::new(2).unwrap();
    assert_eq!(
        ctx.lci_dir(ResultType::Probabilistic, batch),
        std::path::PathBuf::from("/r/probabilistic/LCI/2")
    );
    assert!(ctx.check_result_dir().is_err());
}
