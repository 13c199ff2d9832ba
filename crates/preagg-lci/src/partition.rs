//! Contiguous partitioning of the entity manifest into slices and of the
//! remaining work into worker sublists.

use preagg_core::errors::{ErrorInfo, PreaggError};
use serde::{Deserialize, Serialize};

/// Subset of the manifest handled by one run, for splitting a batch across
/// scheduler jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slicing {
    /// Zero-based slice handled by this run.
    pub slice_id: usize,
    /// Total number of slices.
    pub number_of_slices: usize,
}

impl Slicing {
    /// Validates `slice_id < number_of_slices`.
    pub fn new(slice_id: usize, number_of_slices: usize) -> Result<Self, PreaggError> {
        if number_of_slices == 0 {
            return Err(PreaggError::Config(ErrorInfo::new(
                "slices-zero",
                "number of slices must be at least 1",
            )));
        }
        if slice_id >= number_of_slices {
            return Err(PreaggError::Config(
                ErrorInfo::new("slice-out-of-range", "slice id must be below the number of slices")
                    .with_context("slice_id", slice_id.to_string())
                    .with_context("number_of_slices", number_of_slices.to_string()),
            ));
        }
        Ok(Self {
            slice_id,
            number_of_slices,
        })
    }
}

/// Splits `items` into consecutive chunks of `ceil(len / parts)` items.
///
/// Fewer than `parts` chunks are returned when the items run out; an empty
/// input yields no chunks.
pub fn ceil_chunks<T: Clone>(items: &[T], parts: usize) -> Vec<Vec<T>> {
    if items.is_empty() || parts == 0 {
        return Vec::new();
    }
    let size = items.len().div_ceil(parts);
    items.chunks(size).map(<[T]>::to_vec).collect()
}

/// Splits the manifest into exactly `number_of_slices` contiguous slices;
/// trailing slices are empty when the manifest is short.
pub fn partition_slices(codes: &[String], number_of_slices: usize) -> Result<Vec<Vec<String>>, PreaggError> {
    if number_of_slices == 0 {
        return Err(PreaggError::Config(ErrorInfo::new(
            "slices-zero",
            "number of slices must be at least 1",
        )));
    }
    let mut slices = ceil_chunks(codes, number_of_slices);
    slices.resize_with(number_of_slices, Vec::new);
    Ok(slices)
}

/// Entities of the selected slice, or the whole manifest without slicing.
pub fn select_slice(codes: &[String], slicing: Option<Slicing>) -> Result<Vec<String>, PreaggError> {
    match slicing {
        None => Ok(codes.to_vec()),
        Some(slicing) => {
            let mut slices = partition_slices(codes, slicing.number_of_slices)?;
            Ok(std::mem::take(&mut slices[slicing.slice_id]))
        }
    }
}

/// Splits the remaining entities into at most `parallel_jobs` sublists.
pub fn worker_sublists(remaining: &[String], parallel_jobs: usize) -> Vec<Vec<String>> {
    ceil_chunks(remaining, parallel_jobs.max(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn codes(names: &[&str]) -> Vec<String> {
        names.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn three_entities_in_two_slices() {
        let slices = partition_slices(&codes(&["a", "b", "c"]), 2).unwrap();
        assert_eq!(slices, vec![codes(&["a", "b"]), codes(&["c"])]);
    }

    #[test]
    fn short_manifest_pads_with_empty_slices() {
        let slices = partition_slices(&codes(&["a", "b", "c", "d"]), 3).unwrap();
        assert_eq!(slices, vec![codes(&["a", "b"]), codes(&["c", "d"]), Vec::new()]);
    }

    #[test]
    fn slice_id_must_be_in_range() {
        assert_eq!(Slicing::new(2, 2).unwrap_err().code(), "slice-out-of-range");
        assert_eq!(Slicing::new(0, 0).unwrap_err().code(), "slices-zero");
    }

    #[test]
    fn sublists_use_ceiling_chunks() {
        let sizes: Vec<_> = worker_sublists(&codes(&["a", "b", "c", "d", "e"]), 2)
            .iter()
            .map(Vec::len)
            .collect();
        assert_eq!(sizes, vec![3, 2]);
        assert!(worker_sublists(&[], 4).is_empty());
    }
}
