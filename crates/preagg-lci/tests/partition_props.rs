use preagg_lci::{partition_slices, select_slice, worker_sublists, Slicing};
use proptest::prelude::*;

fn manifest(len: usize) -> Vec<String> {
    (0..len).map(|idx| format!("e{idx}")).collect()
}

proptest! {
    #[test]
    fn slices_cover_manifest_in_order(len in 0usize..200, slices in 1usize..40) {
        let codes = manifest(len);
        let partition = partition_slices(&codes, slices).unwrap();
        prop_assert_eq!(partition.len(), slices);
        let flattened: Vec<String> = partition.iter().flatten().cloned().collect();
        prop_assert_eq!(&flattened, &codes);
        let cap = if len == 0 { 0 } else { len.div_ceil(slices) };
        for slice in &partition {
            prop_assert!(slice.len() <= cap);
        }
        for (slice_id, slice) in partition.iter().enumerate() {
            let selected = select_slice(&codes, Some(Slicing::new(slice_id, slices).unwrap())).unwrap();
            prop_assert_eq!(&selected, slice);
        }
    }

    #[test]
    fn sublists_never_exceed_parallel_jobs(len in 0usize..120, jobs in 1usize..16) {
        let codes = manifest(len);
        let sublists = worker_sublists(&codes, jobs);
        prop_assert!(sublists.len() <= jobs);
        prop_assert!(sublists.iter().all(|sublist| !sublist.is_empty()));
        prop_assert_eq!(sublists.iter().map(Vec::len).sum::<usize>(), len);
    }
}

#[test]
fn unsliced_selection_is_whole_manifest() {
    let codes = manifest(5);
    assert_eq!(select_slice(&codes, None).unwrap(), codes);
}
