use std::time::Instant;

use fxhash::{FxHashMap, FxHashSet};
use rayon::prelude::*;

use crate::artifact::ModelArtifact;
use crate::common::{EvalMetrics, HeldOut, ItemId};
use crate::scorer::{score_items, top_k};

pub type GroundTruth = FxHashMap<String, FxHashSet<ItemId>>;

pub fn group_held_out(pairs: &[HeldOut]) -> GroundTruth {
    let mut truth: GroundTruth = FxHashMap::default();
    for HeldOut { user_id, item_id } in pairs {
        truth
            .entry(user_id.clone())
            .or_default()
            .insert(item_id.clone());
    }
    truth
}

/// |top-k ∩ relevant| / |relevant|
pub fn recall_at_k(recs: &[ItemId], relevant: &FxHashSet<ItemId>) -> f64 {
    if relevant.is_empty() {
        return 0.0;
    }
    let hits = recs.iter().filter(|i| relevant.contains(*i)).count();
    hits as f64 / relevant.len() as f64
}

/// DCG over the 1-indexed ranks of relevant items, normalized by the ideal DCG of
/// `min(|relevant|, k)` items ranked first.
pub fn ndcg_at_k(recs: &[ItemId], relevant: &FxHashSet<ItemId>, k: usize) -> f64 {
    let dcg: f64 = recs
        .iter()
        .take(k)
        .enumerate()
        .filter(|(_, i)| relevant.contains(*i))
        .map(|(rank, _)| 1.0 / ((rank + 2) as f64).log2())
        .sum();
    let ideal_hits = relevant.len().min(k);
    let idcg: f64 = (1..=ideal_hits)
        .map(|i| 1.0 / ((i + 1) as f64).log2())
        .sum();
    if idcg == 0.0 {
        0.0
    } else {
        dcg / idcg
    }
}

/// Users outside the trained index, or whose held-out items are all unknown to the
/// catalog, are skipped rather than scored as zero.
pub fn evaluate(artifact: &ModelArtifact, ground_truth: &GroundTruth, k: usize) -> EvalMetrics {
    let start = Instant::now();
    let mut users: Vec<(&String, &FxHashSet<ItemId>)> = ground_truth
        .iter()
        .filter(|(_, relevant)| {
            relevant
                .iter()
                .any(|i| artifact.items.index_of(i).is_some())
        })
        .collect();
    // fixed summation order
    users.sort_unstable_by(|a, b| a.0.cmp(b.0));

    let per_user: Vec<(f64, f64)> = users
        .par_iter()
        .filter_map(|(user_id, relevant)| {
            let user_idx = artifact.users.index_of(user_id.as_str())?;
            let scores = score_items(artifact, user_idx);
            let recs: Vec<ItemId> = top_k(&scores, k, None)
                .into_iter()
                .filter_map(|(i, _)| artifact.items.id_of(i).cloned())
                .collect();
            Some((recall_at_k(&recs, relevant), ndcg_at_k(&recs, relevant, k)))
        })
        .collect();

    let n_eval = per_user.len();
    let (recall, ndcg) = if n_eval == 0 {
        (0.0, 0.0)
    } else {
        let (r, n) = per_user
            .iter()
            .fold((0.0, 0.0), |(r, n), (ur, un)| (r + ur, n + un));
        (r / n_eval as f64, n / n_eval as f64)
    };
    log::info!(
        "evaluate `{}` on {} users, recall@{k}: {:.4}, ndcg@{k}: {:.4}, elapsed: {:.4?}",
        artifact.name,
        n_eval,
        recall,
        ndcg,
        start.elapsed()
    );
    EvalMetrics {
        users_in_train: artifact.n_users(),
        items_in_train: artifact.n_items(),
        recall,
        ndcg,
    }
}
