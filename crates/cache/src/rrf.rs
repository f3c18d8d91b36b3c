use std::collections::HashMap;
use std::hash::Hash;

/// Reciprocal-rank fusion: per ranked list, the item at (1-based) rank `r`
/// contributes `1 / (k + r)`; contributions sum across every list the item
/// appears in. `k` defaults to 60 per the standard RRF formulation.
///
/// Returns every distinct id with its fused score, unsorted — callers sort
/// by score descending themselves so the fusion step stays a pure
/// accumulate-and-return.
pub fn reciprocal_rank_fusion<T: Eq + Hash + Clone>(
    ranked_lists: &[Vec<T>],
    k: f64,
) -> HashMap<T, f64> {
    let mut scores: HashMap<T, f64> = HashMap::new();
    for list in ranked_lists {
        for (idx, id) in list.iter().enumerate() {
            let rank = (idx + 1) as f64;
            *scores.entry(id.clone()).or_insert(0.0) += 1.0 / (k + rank);
        }
    }
    scores
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_ranking_is_monotone_decreasing() {
        let list = vec!["a", "b", "c", "d"];
        let scores = reciprocal_rank_fusion(&[list], 60.0);
        let a = scores["a"];
        let b = scores["b"];
        let c = scores["c"];
        let d = scores["d"];
        assert!(a > b && b > c && c > d, "expected strictly decreasing scores by rank");
    }

    #[test]
    fn items_in_multiple_lists_accumulate() {
        let first = vec!["x", "y"];
        let second = vec!["y", "x"];
        let scores = reciprocal_rank_fusion(&[first, second], 60.0);
        // "x" is rank 1 then rank 2; "y" is rank 2 then rank 1 — symmetric, equal totals
        assert!((scores["x"] - scores["y"]).abs() < 1e-12);
    }

    #[test]
    fn item_absent_from_a_list_only_scores_from_lists_it_appears_in() {
        let first = vec!["a", "b"];
        let second = vec!["a"];
        let scores = reciprocal_rank_fusion(&[first, second], 60.0);
        let expected_a = 1.0 / 61.0 + 1.0 / 61.0;
        assert!((scores["a"] - expected_a).abs() < 1e-12);
        assert!(!scores.contains_key("c"));
    }
}
