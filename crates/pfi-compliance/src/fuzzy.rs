//! Fuzzy string scoring for sanctions screening.
//!
//! A target is a **candidate** for a query only if every query character
//! appears in the target in order (case-insensitive, whitespace collapsed).
//! Candidates are then scored by normalised edit distance:
//!
//! ```text
//! score = floor(100 * (max_len - levenshtein) / max_len)
//! ```
//!
//! Scores are deterministic, bounded to `0..=100`, and an exact match always
//! scores 100. Non-candidates score `None`, which never clears any threshold.

use pfi_types::constants::MAX_MATCH_SCORE;

/// Lowercase and collapse runs of whitespace to a single space.
#[must_use]
pub fn normalize(s: &str) -> Vec<char> {
    let mut out = Vec::with_capacity(s.len());
    for word in s.split_whitespace() {
        if !out.is_empty() {
            out.push(' ');
        }
        out.extend(word.chars().flat_map(char::to_lowercase));
    }
    out
}

/// Score `query` against `target`. `None` means "not a candidate".
#[must_use]
pub fn score(query: &str, target: &str) -> Option<u8> {
    score_normalized(&normalize(query), &normalize(target))
}

/// [`score`] over already-normalised input; lets callers normalise the
/// query once per roster scan.
#[must_use]
pub fn score_normalized(query: &[char], target: &[char]) -> Option<u8> {
    if query.is_empty() || target.is_empty() || !is_subsequence(query, target) {
        return None;
    }
    let max_len = query.len().max(target.len());
    let distance = levenshtein(query, target);
    let similarity = (max_len - distance) * usize::from(MAX_MATCH_SCORE) / max_len;
    u8::try_from(similarity).ok()
}

fn is_subsequence(needle: &[char], haystack: &[char]) -> bool {
    let mut rest = haystack.iter();
    needle.iter().all(|c| rest.any(|h| h == c))
}

/// Classic two-row Levenshtein distance.
fn levenshtein(a: &[char], b: &[char]) -> usize {
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];
    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let substitution = prev[j] + usize::from(ca != cb);
            curr[j + 1] = substitution.min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    prev[b.len()]
}
