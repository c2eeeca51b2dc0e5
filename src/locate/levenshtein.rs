//! Levenshtein edit distance and the similarity ratios built on it.
//!
//! Used by the fuzzy strategy, context verification, and hunk validation.

/// Inputs longer than this (chars) are not compared cell by cell.
const MAX_DP_CHARS: usize = 10_000;

/// Character edit distance between `a` and `b`.
pub fn distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    distance_chars(&a, &b)
}

/// [`distance`] over pre-split characters.
///
/// Pairs that are oversized, or whose lengths differ by more than a third of
/// the longer one, are scored as entirely different.
pub fn distance_chars(a: &[char], b: &[char]) -> usize {
    let longest = a.len().max(b.len());
    if a.is_empty() || b.is_empty() {
        return longest;
    }
    if longest > MAX_DP_CHARS || a.len().abs_diff(b.len()) > longest / 3 {
        return longest;
    }

    // row[j] holds the distance between the current prefix of `a` and b[..j].
    let mut row: Vec<usize> = (0..=b.len()).collect();
    for (i, &ca) in a.iter().enumerate() {
        let mut diag = row[0];
        row[0] = i + 1;
        for (j, &cb) in b.iter().enumerate() {
            let substitute = diag + usize::from(ca != cb);
            diag = row[j + 1];
            row[j + 1] = substitute.min(row[j] + 1).min(diag + 1);
        }
    }
    row[b.len()]
}

/// Edit distance between `a` and `b` if it is at most `max`.
///
/// Only the diagonal band of width `2 * max + 1` is filled, and the scan stops
/// as soon as a whole row exceeds `max`, so the cost is `O(len * max)`.
pub fn distance_within(a: &[char], b: &[char], max: usize) -> Option<usize> {
    if a.len().abs_diff(b.len()) > max {
        return None;
    }
    if a.is_empty() || b.is_empty() {
        return Some(a.len().max(b.len()));
    }

    let over = max + 1;
    let n = b.len();
    let mut prev: Vec<usize> = (0..=n).map(|j| if j <= max { j } else { over }).collect();
    let mut curr = vec![over; n + 1];
    for (i, &ca) in a.iter().enumerate() {
        let row = i + 1;
        let lo = row.saturating_sub(max).max(1);
        let hi = (row + max).min(n);
        curr[lo - 1] = if lo == 1 && row <= max { row } else { over };
        let mut row_min = curr[lo - 1];
        for j in lo..=hi {
            let substitute = prev[j - 1] + usize::from(ca != b[j - 1]);
            let cell = substitute.min(prev[j] + 1).min(curr[j - 1] + 1).min(over);
            curr[j] = cell;
            row_min = row_min.min(cell);
        }
        if hi < n {
            curr[hi + 1] = over;
        }
        if row_min > max {
            return None;
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    (prev[n] <= max).then_some(prev[n])
}

/// `1 - distance / longest`, in `[0, 1]`. Two empty strings are identical.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    similarity_chars(&a, &b)
}

pub fn similarity_chars(a: &[char], b: &[char]) -> f64 {
    match a.len().max(b.len()) {
        0 => 1.0,
        longest => 1.0 - distance_chars(a, b) as f64 / longest as f64,
    }
}

/// Similarity after collapsing whitespace runs and trimming both inputs.
pub fn normalized_similarity(a: &str, b: &str) -> f64 {
    similarity(&super::normalize::collapse_ws(a), &super::normalize::collapse_ws(b))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_basics() {
        assert_eq!(distance("mat", "mat"), 0);
        assert_eq!(distance("", "rug"), 3);
        assert_eq!(distance("", ""), 0);
        assert_eq!(distance("kitten", "sitting"), 3);
        assert!((similarity("", "") - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_counts_characters_not_bytes() {
        assert_eq!(distance("héllo", "hello"), 1);
        assert!((similarity("日本語", "日本人") - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_length_quick_reject() {
        assert_eq!(distance("a", "abcdef"), 6);
        assert!(similarity("a", "abcdef").abs() < f64::EPSILON);
    }

    #[test]
    fn test_distance_within_band() {
        let chars = |s: &str| s.chars().collect::<Vec<_>>();
        let (kitten, sitting) = (chars("kitten"), chars("sitting"));
        assert_eq!(distance_within(&kitten, &sitting, 3), Some(3));
        assert_eq!(distance_within(&kitten, &sitting, 5), Some(3));
        assert_eq!(distance_within(&kitten, &sitting, 2), None);
        assert_eq!(distance_within(&chars("abc"), &chars("abc"), 0), Some(0));
        assert_eq!(distance_within(&chars(""), &chars("ab"), 2), Some(2));
        assert_eq!(distance_within(&chars("a"), &chars("abcdef"), 3), None);

        let a = chars("the annual report was approved by the board");
        let b = chars("the enneul report wes epproved by the boerd");
        assert_eq!(distance_within(&a, &b, a.len()), Some(distance_chars(&a, &b)));
    }

    #[test]
    fn test_normalized_ignores_whitespace_runs() {
        assert!((normalized_similarity("  a   b\n c ", "a b c") - 1.0).abs() < f64::EPSILON);
    }
}
