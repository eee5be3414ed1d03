//! Ratcliff/Obershelp similarity over characters
//!
//! Matches Python's `difflib.SequenceMatcher(None, a, b).ratio()` for inputs
//! where no junk heuristic applies: repeatedly take the longest common block,
//! then recurse on the text to its left and right.

/// Returns `2 * M / T`, where `M` is the number of matched characters and `T`
/// the combined length. Two empty inputs are identical (1.0).
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matched_chars(&a, &b) as f64 / total as f64
}

/// Sum of the sizes of all matching blocks
fn matched_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut stack = vec![(0, a.len(), 0, b.len())];

    while let Some((alo, ahi, blo, bhi)) = stack.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            stack.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            stack.push((i + size, ahi, j + size, bhi));
        }
    }

    matched
}

/// Longest common block of `a[alo..ahi]` and `b[blo..bhi]`
///
/// Ties resolve to the block starting earliest in `a`, then earliest in `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let width = bhi - blo;
    let mut best = (alo, blo, 0);
    // prev[k] = length of the common run ending at a[i - 1], b[blo + k]
    let mut prev = vec![0usize; width + 1];
    let mut curr = vec![0usize; width + 1];

    for i in alo..ahi {
        for k in 0..width {
            let j = blo + k;
            curr[k + 1] = if a[i] == b[j] { prev[k] + 1 } else { 0 };
            let run = curr[k + 1];
            if run > best.2 {
                best = (i + 1 - run, j + 1 - run, run);
            }
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    best
}
