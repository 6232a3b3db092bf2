//! Range partition rules.
//!
//! Boundaries are opaque byte strings compared lexicographically; the router
//! never interprets column types.

use super::model::Partition;
use crate::core::{MetaError, Result};
use std::cmp::Ordering;

/// Checks a partition sequence handed to `create`.
///
/// All partitions must name the same columns, carry one bound per column, and
/// have strictly increasing bounds. A lone partition without columns is the
/// unpartitioned case.
pub fn validate_partitions(partitions: &[Partition]) -> Result<()> {
    let Some(first) = partitions.first() else {
        return Err(MetaError::InvalidArgument(
            "at least one partition is required".to_string(),
        ));
    };

    if first.column_list.is_empty() {
        if partitions.len() == 1 && first.value_list.is_empty() {
            return Ok(());
        }
        return Err(MetaError::InvalidArgument(
            "partitions must name at least one column".to_string(),
        ));
    }

    for (ordinal, partition) in partitions.iter().enumerate() {
        if partition.column_list != first.column_list {
            return Err(MetaError::InvalidArgument(format!(
                "partition {} names different columns than partition 0",
                ordinal
            )));
        }
        if partition.value_list.len() != partition.column_list.len() {
            return Err(MetaError::InvalidArgument(format!(
                "partition {} has {} bound values for {} columns",
                ordinal,
                partition.value_list.len(),
                partition.column_list.len()
            )));
        }
    }

    for (ordinal, pair) in partitions.windows(2).enumerate() {
        if compare_bounds(&pair[0].value_list, &pair[1].value_list) != Ordering::Less {
            return Err(MetaError::InvalidArgument(format!(
                "partition bounds must be strictly increasing: partition {} is not above partition {}",
                ordinal + 1,
                ordinal
            )));
        }
    }
    Ok(())
}

/// Tuple-wise, then byte-wise comparison of two bounds.
pub fn compare_bounds(a: &[Vec<u8>], b: &[Vec<u8>]) -> Ordering {
    a.cmp(b)
}

/// Returns the ordinal of the partition owning `key`, if any.
///
/// Partition 0 is unbounded below. Keys at or above the last bound belong to no
/// partition.
pub fn partition_index_for(partitions: &[Partition], key: &[Vec<u8>]) -> Option<usize> {
    if partitions.len() == 1 && partitions[0].value_list.is_empty() {
        return Some(0);
    }
    // Bounds are sorted, so the owner is the first partition whose bound exceeds the key.
    let idx = partitions
        .partition_point(|p| compare_bounds(&p.value_list, key) != Ordering::Greater);
    (idx < partitions.len()).then_some(idx)
}
