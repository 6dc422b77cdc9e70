use crate::error::{PixshardError, Result};

/// Number of blocks each of `fragment_count` fragments carries
///
/// The remainder goes one block at a time to the leading fragments, so every
/// count is within one of every other and the counts sum to `total_blocks`.
/// Fragmentation and restoration both derive the layout from this function.
pub fn calc_blocks_per_fragment(total_blocks: usize, fragment_count: usize) -> Result<Vec<usize>> {
    if fragment_count == 0 {
        return Err(PixshardError::InvalidConfiguration(
            "fragment count must be positive".into(),
        ));
    }

    let base = total_blocks / fragment_count;
    let remainder = total_blocks % fragment_count;
    Ok((0..fragment_count)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect())
}

/// Cut `items` into consecutive runs of the given lengths
/// Items past the sum of `lengths` are dropped; short input yields short runs
pub fn split_by_counts<T>(items: Vec<T>, lengths: &[usize]) -> Vec<Vec<T>> {
    let mut iter = items.into_iter();
    lengths
        .iter()
        .map(|&n| iter.by_ref().take(n).collect())
        .collect()
}
