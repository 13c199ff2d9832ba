use preagg_core::array::{
    file_has_zero_column, read_array_header, ArrayValues, Precision, ResultArray, StagedArray,
};

#[test]
fn staged_columns_are_promoted_intact() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let staging = dir.path().join("temp").join("a.bin");
    let final_path = dir.path().join("a.bin");

    let mut staged = StagedArray::create(&staging, 3, 2, Precision::F32).expect("stage");
    staged.write_column(1, &[4.0, 5.0, 6.0]).expect("col 1");
    staged.write_column(0, &[1.0, 2.0, 3.0]).expect("col 0");
    staged.promote(&final_path, (3, 2)).expect("promote");

    assert!(!staging.exists());
    let array = ResultArray::read(&final_path).expect("read");
    assert_eq!(array.shape(), (3, 2));
    assert_eq!(array.precision(), Precision::F32);
    assert_eq!(array.row(0), vec![1.0, 4.0]);
    assert_eq!(array.row(2), vec![3.0, 6.0]);
    assert!(!array.has_zero_column());
    assert!(!file_has_zero_column(&final_path).unwrap());
}

#[test]
fn unfilled_column_is_detected_on_disk() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let staging = dir.path().join("b.tmp");
    let final_path = dir.path().join("b.bin");
    let mut staged = StagedArray::create(&staging, 2, 3, Precision::F64).expect("stage");
    staged.write_column(0, &[1.0, 1.0]).expect("col");
    staged.fill_column(2, f64::NAN).expect("nan col");
    staged.promote(&final_path, (2, 3)).expect("promote");

    assert!(file_has_zero_column(&final_path).unwrap());
    let header = read_array_header(&final_path).unwrap();
    assert_eq!((header.rows, header.cols), (2, 3));
    assert!(ResultArray::read(&final_path).unwrap().get(0, 2).is_nan());
}

#[test]
fn promote_rejects_shape_mismatch() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let staging = dir.path().join("c.tmp");
    let staged = StagedArray::create(&staging, 2, 2, Precision::F32).expect("stage");
    let err = staged
        .promote(&dir.path().join("c.bin"), (3, 2))
        .unwrap_err();
    assert_eq!(err.code(), "array-shape-mismatch");
    assert!(staging.exists());
}

#[test]
fn write_column_checks_bounds() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let mut staged =
        StagedArray::create(&dir.path().join("d.tmp"), 2, 2, Precision::F32).expect("stage");
    assert!(staged.write_column(2, &[0.0, 0.0]).is_err());
    assert!(staged.write_column(0, &[0.0]).is_err());
}

#[test]
fn arrays_from_rows_are_column_major() {
    let array = ResultArray::from_rows(&[vec![1.0, 2.0], vec![3.0, 4.0]]).unwrap();
    assert_eq!(array.values(), &ArrayValues::F64(vec![1.0, 3.0, 2.0, 4.0]));
    assert_eq!(array.column_sums(), vec![4.0, 6.0]);
}

#[test]
fn corrupt_header_is_rejected_before_allocating() {
    let dir = tempfile::tempdir().expect("tmp dir");
    let path = dir.path().join("e.bin");
    ResultArray::from_rows(&[vec![1.0, 2.0]])
        .unwrap()
        .write(&path)
        .unwrap();

    let mut bytes = std::fs::read(&path).unwrap();
    bytes[12..20].copy_from_slice(&u64::MAX.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();
    assert_eq!(ResultArray::read(&path).unwrap_err().code(), "array-corrupt");

    bytes[12..20].copy_from_slice(&3u64.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();
    assert_eq!(ResultArray::read(&path).unwrap_err().code(), "array-corrupt");
}
