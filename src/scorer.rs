use std::cmp::Ordering;

use fxhash::FxHashSet;

use crate::artifact::ModelArtifact;
use crate::common::ItemId;

#[derive(Debug, Clone, PartialEq)]
pub struct ScoredItem {
    pub index: usize,
    pub id: ItemId,
    pub score: f32,
}

/// Higher score first, lower index first among equal scores.
#[inline]
fn rank_order(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.total_cmp(&a.1).then_with(|| a.0.cmp(&b.0))
}

/// Full catalog scores for the user at `user_idx`.
pub fn score_items(artifact: &ModelArtifact, user_idx: usize) -> Vec<f32> {
    artifact
        .item_factors
        .dot_all(artifact.user_factors.row(user_idx))
}

/// Top `k` (index, score) pairs sorted by descending score, excluded indices dropped.
pub fn top_k(scores: &[f32], k: usize, exclude: Option<&FxHashSet<usize>>) -> Vec<(usize, f32)> {
    let mut candidates: Vec<(usize, f32)> = scores
        .iter()
        .copied()
        .enumerate()
        .filter(|(i, _)| !exclude.is_some_and(|ex| ex.contains(i)))
        .collect();
    if k == 0 || candidates.is_empty() {
        return Vec::new();
    }
    if candidates.len() > k {
        // O(n) to select top k
        candidates.select_nth_unstable_by(k - 1, rank_order);
        candidates.truncate(k);
    }
    // sort only top k: O(k log k)
    candidates.sort_unstable_by(rank_order);
    candidates
}

/// `None` when the user is not in the artifact's index (cold start).
pub fn recommend_user(
    artifact: &ModelArtifact,
    user_id: &str,
    k: usize,
    exclude: Option<&FxHashSet<usize>>,
) -> Option<Vec<ScoredItem>> {
    let user_idx = artifact.users.index_of(user_id)?;
    let scores = score_items(artifact, user_idx);
    let recs = top_k(&scores, k, exclude)
        .into_iter()
        .filter_map(|(index, score)| {
            artifact.items.id_of(index).map(|id| ScoredItem {
                index,
                id: id.clone(),
                score,
            })
        })
        .collect();
    Some(recs)
}
