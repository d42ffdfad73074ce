//! The two LCS computations used by the template stores.
//!
//! `full` is the exact dynamic-programming subsequence, used by the batch
//! store where matching quality matters. `greedy_count` is a single forward
//! pass that bounds per-line cost in the streaming store; it is not globally
//! optimal when tokens repeat, and the two are kept separate on purpose.

/// The wildcard marker occupying a variable position in a template.
pub const WILDCARD: &str = "*";

pub fn is_wildcard(token: &str) -> bool {
    token == WILDCARD
}

/// Exact longest common subsequence of two token sequences.
pub fn full(seq1: &[String], seq2: &[String]) -> Vec<String> {
    let (n, m) = (seq1.len(), seq2.len());
    let mut lengths = vec![vec![0usize; m + 1]; n + 1];
    for i in 0..n {
        for j in 0..m {
            lengths[i + 1][j + 1] = if seq1[i] == seq2[j] {
                lengths[i][j] + 1
            } else {
                lengths[i + 1][j].max(lengths[i][j + 1])
            };
        }
    }

    // backtrace, preferring to step back in seq1 on ties
    let mut result = Vec::with_capacity(lengths[n][m]);
    let (mut i, mut j) = (n, m);
    while i != 0 && j != 0 {
        if lengths[i][j] == lengths[i - 1][j] {
            i -= 1;
        } else if lengths[i][j] == lengths[i][j - 1] {
            j -= 1;
        } else {
            debug_assert_eq!(seq1[i - 1], seq2[j - 1]);
            result.push(seq1[i - 1].clone());
            i -= 1;
            j -= 1;
        }
    }
    result.reverse();
    result
}

/// Greedy positional alignment count: walk the template left to right,
/// skipping wildcards, and for each literal scan forward in `seq` from just
/// past the previous match. Linear in `template.len() + seq.len()` matches,
/// quadratic only in the worst miss case.
pub fn greedy_count(template: &[String], seq: &[String]) -> usize {
    let mut count = 0;
    let mut last_match: Option<usize> = None;
    for token in template {
        if is_wildcard(token) {
            continue;
        }
        let from = last_match.map_or(0, |j| j + 1);
        for (j, candidate) in seq.iter().enumerate().skip(from) {
            if candidate == token {
                last_match = Some(j);
                count += 1;
                break;
            }
        }
    }
    count
}
