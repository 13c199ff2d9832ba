use preagg_core::{CoordinateTriple, IdentifierPair};
use preagg_samples::{create_package, load_group, load_package, MatrixGroup, SampleMatrix};

fn group(role: &str, rows: usize, cols: usize) -> MatrixGroup {
    let values = (0..rows * cols).map(|v| v as f64).collect();
    let coordinates = (0..rows)
        .map(|row| CoordinateTriple {
            input: IdentifierPair::new("bio", format!("f{row}")),
            output: IdentifierPair::new("db", "a"),
            kind: "biosphere".into(),
        })
        .collect();
    MatrixGroup::new(
        role,
        SampleMatrix::from_row_major(rows, cols, values).unwrap(),
        coordinates,
    )
}

#[test]
fn package_round_trips_groups() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let groups = vec![group("technosphere", 2, 3), group("biosphere", 1, 3)];
    let (id, path) = create_package("base_0", &groups, dir.path(), false, Some(3)).expect("create");
    let manifest = load_package(&path).expect("load");
    assert_eq!(manifest.id, id);
    assert_eq!(manifest.ncols, 3);
    assert_eq!(manifest.seed, Some(3));
    assert_eq!(load_group(&path, "technosphere").unwrap(), groups[0]);
    assert_eq!(load_group(&path, "missing").unwrap_err().code(), "package-role-missing");
}

#[test]
fn existing_package_requires_overwrite() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let (_, path) = create_package("base_1", &[group("biosphere", 2, 2)], dir.path(), false, None)
        .expect("create");
    let err = create_package("base_1", &[group("biosphere", 1, 4)], dir.path(), false, None)
        .unwrap_err();
    assert_eq!(err.code(), "package-exists");
    assert_eq!(load_package(&path).unwrap().ncols, 2);

    create_package("base_1", &[group("water", 1, 4)], dir.path(), true, None).expect("overwrite");
    let manifest = load_package(&path).unwrap();
    assert_eq!(manifest.ncols, 4);
    assert!(manifest.group("biosphere").is_none());
    assert!(!path.join("biosphere.samples.bin").exists());
}

#[test]
fn groups_must_agree_on_iterations() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let err = create_package(
        "base_2",
        &[group("technosphere", 1, 2), group("biosphere", 1, 3)],
        dir.path(),
        false,
        None,
    )
    .unwrap_err();
    assert_eq!(err.code(), "package-ncols");
    assert!(!dir.path().join("base_2").exists());
}
