//! Longest Increasing Subsequence
//!
//! Patience sorting with predecessor links: `O(n log n)` time, `O(n)` space.

/// Positions (into `seq`) of one longest strictly increasing subsequence.
pub(crate) fn longest_increasing_subsequence(seq: &[usize]) -> Vec<usize> {
    if seq.is_empty() {
        return Vec::new();
    }

    // tails[k] is the position of the smallest tail of an increasing run of
    // length k + 1 seen so far.
    let mut tails: Vec<usize> = Vec::with_capacity(seq.len());
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];

    for (i, &value) in seq.iter().enumerate() {
        let len = tails.partition_point(|&t| seq[t] < value);
        if len > 0 {
            prev[i] = Some(tails[len - 1]);
        }
        if len == tails.len() {
            tails.push(i);
        } else {
            tails[len] = i;
        }
    }

    let mut out = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(i) = cursor {
        out.push(i);
        cursor = prev[i];
    }
    out.reverse();
    out
}

/// Whether `seq` is already strictly increasing.
pub(crate) fn is_increasing(seq: &[usize]) -> bool {
    seq.windows(2).all(|w| w[0] < w[1])
}
