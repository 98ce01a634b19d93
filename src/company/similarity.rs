//! Similarity scoring between normalized company names.
//!
//! The score blends a character-level matching-blocks ratio with word-level
//! Jaccard overlap, plus a flat bonus when nearly all words are shared. The
//! word terms let abbreviated forms ("chase" vs "chase home") stay close even
//! when their lengths differ a lot.

use std::collections::HashSet;

/// Weight of the character sequence ratio in the final score.
pub const SEQUENCE_WEIGHT: f64 = 0.6;
/// Weight of the word-set Jaccard overlap in the final score.
pub const OVERLAP_WEIGHT: f64 = 0.3;
/// Flat bonus added when the overlap exceeds [`OVERLAP_BONUS_THRESHOLD`].
pub const OVERLAP_BONUS: f64 = 0.2;
/// Overlap that must be exceeded (strictly) to earn [`OVERLAP_BONUS`].
pub const OVERLAP_BONUS_THRESHOLD: f64 = 0.8;

/// Tunable weights for [`SimilarityScorer`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SimilarityWeights {
    pub sequence: f64,
    pub overlap: f64,
    pub overlap_bonus: f64,
    pub overlap_bonus_threshold: f64,
}

impl Default for SimilarityWeights {
    fn default() -> Self {
        Self {
            sequence: SEQUENCE_WEIGHT,
            overlap: OVERLAP_WEIGHT,
            overlap_bonus: OVERLAP_BONUS,
            overlap_bonus_threshold: OVERLAP_BONUS_THRESHOLD,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct SimilarityScorer {
    weights: SimilarityWeights,
}

impl Default for SimilarityScorer {
    fn default() -> Self {
        Self::new(SimilarityWeights::default())
    }
}

impl SimilarityScorer {
    pub fn new(weights: SimilarityWeights) -> Self {
        Self { weights }
    }

    /// Score two already-normalized names in `[0.0, 1.0]`.
    ///
    /// Empty input scores `0.0`. When either side has no words the plain
    /// sequence ratio is returned.
    pub fn score(&self, name1: &str, name2: &str) -> f64 {
        if name1.is_empty() || name2.is_empty() {
            return 0.0;
        }

        let basic = sequence_ratio(name1, name2);

        let words1: HashSet<&str> = name1.split_whitespace().collect();
        let words2: HashSet<&str> = name2.split_whitespace().collect();
        if words1.is_empty() || words2.is_empty() {
            return basic;
        }

        let shared = words1.intersection(&words2).count();
        let total = words1.union(&words2).count();
        let overlap = shared as f64 / total as f64;

        let bonus = if overlap > self.weights.overlap_bonus_threshold {
            self.weights.overlap_bonus
        } else {
            0.0
        };

        (self.weights.sequence * basic + self.weights.overlap * overlap + bonus).min(1.0)
    }
}

/// Ratcliff/Obershelp ratio: `2 * M / T`, where `M` is the number of
/// characters in matching blocks and `T` the combined length.
///
/// Two empty strings are identical and score `1.0`.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

/// Total size of the matching blocks between `a` and `b`.
///
/// Finds the longest common block, then recurses on the pieces to its left
/// and right.
fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((a_lo, a_hi, b_lo, b_hi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, a_lo, a_hi, b_lo, b_hi);
        if size == 0 {
            continue;
        }

        matched += size;
        if a_lo < i && b_lo < j {
            pending.push((a_lo, i, b_lo, j));
        }
        if i + size < a_hi && j + size < b_hi {
            pending.push((i + size, a_hi, j + size, b_hi));
        }
    }

    matched
}

/// Longest common block of `a[a_lo..a_hi]` and `b[b_lo..b_hi]`.
///
/// Returns `(start_in_a, start_in_b, size)`. Among equally long blocks the one
/// starting earliest in `a`, then earliest in `b`, wins.
fn longest_match(
    a: &[char],
    b: &[char],
    a_lo: usize,
    a_hi: usize,
    b_lo: usize,
    b_hi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (a_lo, b_lo, 0);

    // previous[j - b_lo + 1] holds the length of the common run ending at a[i - 1], b[j]
    let width = b_hi - b_lo + 1;
    let mut previous = vec![0usize; width];
    let mut current = vec![0usize; width];

    for i in a_lo..a_hi {
        for j in b_lo..b_hi {
            let slot = j - b_lo + 1;
            if a[i] == b[j] {
                let size = previous[slot - 1] + 1;
                current[slot] = size;
                if size > best_size {
                    best_i = i + 1 - size;
                    best_j = j + 1 - size;
                    best_size = size;
                }
            } else {
                current[slot] = 0;
            }
        }
        std::mem::swap(&mut previous, &mut current);
    }

    (best_i, best_j, best_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_sequence_ratio_identical() {
        assert!(approx(sequence_ratio("chase", "chase"), 1.0));
    }

    #[test]
    fn test_sequence_ratio_disjoint() {
        assert!(approx(sequence_ratio("abc", "xyz"), 0.0));
    }

    #[test]
    fn test_sequence_ratio_known_values() {
        // "abcd" / "bcde": one block "bcd" -> 2 * 3 / 8
        assert!(approx(sequence_ratio("abcd", "bcde"), 0.75));
        // "chase" / "chase home": block "chase" -> 2 * 5 / 15
        assert!(approx(sequence_ratio("chase", "chase home"), 10.0 / 15.0));
        // "wells fargo" / "wells fargo bank" -> 2 * 11 / 27
        assert!(approx(sequence_ratio("wells fargo", "wells fargo bank"), 22.0 / 27.0));
    }

    #[test]
    fn test_sequence_ratio_recurses_on_both_sides() {
        // blocks "a", "cd" -> 2 * 3 / 8
        assert!(approx(sequence_ratio("axcd", "aycd"), 0.75));
    }

    #[test]
    fn test_sequence_ratio_empty() {
        assert!(approx(sequence_ratio("", ""), 1.0));
        assert!(approx(sequence_ratio("abc", ""), 0.0));
    }

    #[test]
    fn test_score_identical_names_is_capped_at_one() {
        let scorer = SimilarityScorer::default();
        assert!(approx(scorer.score("chase", "chase"), 1.0));
        assert!(approx(scorer.score("wells fargo", "wells fargo"), 1.0));
    }

    #[test]
    fn test_score_empty_input_is_zero() {
        let scorer = SimilarityScorer::default();
        assert!(approx(scorer.score("", "chase"), 0.0));
        assert!(approx(scorer.score("chase", ""), 0.0));
    }

    #[test]
    fn test_score_whitespace_only_returns_basic_ratio() {
        let scorer = SimilarityScorer::default();
        assert!(approx(scorer.score(" ", " "), 1.0));
        assert!(approx(scorer.score("a", " "), 0.0));
    }

    #[test]
    fn test_score_partial_word_overlap() {
        let scorer = SimilarityScorer::default();
        // overlap 1/2, no bonus: 0.6 * 10/15 + 0.3 * 0.5
        let expected = 0.6 * (10.0 / 15.0) + 0.15;
        assert!(approx(scorer.score("chase", "chase home"), expected));
    }

    #[test]
    fn test_score_unrelated_names_are_low() {
        let scorer = SimilarityScorer::default();
        let score = scorer.score("acme", "completely different");
        assert!(score < 0.5, "score was {score}");
    }

    #[test]
    fn test_score_respects_custom_weights() {
        let scorer = SimilarityScorer::new(SimilarityWeights {
            sequence: 1.0,
            overlap: 0.0,
            overlap_bonus: 0.0,
            overlap_bonus_threshold: 1.0,
        });
        assert!(approx(scorer.score("abcd", "bcde"), 0.75));
    }

    #[test]
    fn test_score_bonus_requires_strict_overlap() {
        let scorer = SimilarityScorer::default();
        // identical word sets but different order: overlap 1.0 earns the bonus
        let score = scorer.score("fargo wells", "wells fargo");
        assert!(score > 0.5 + OVERLAP_BONUS, "score was {score}");
    }
}
