use crate::models::signal::{MomentumScore, RankedStock};

/// Rank scores by momentum, strongest first.
///
/// Ties take the lowest rank of the group (1, 2, 2, 4) and are ordered by
/// symbol. Non-finite momentum is dropped.
pub fn rank(scores: Vec<MomentumScore>) -> Vec<RankedStock> {
    let mut scores: Vec<MomentumScore> = scores
        .into_iter()
        .filter(|s| s.momentum.is_finite())
        .collect();
    scores.sort_by(|a, b| {
        b.momentum
            .total_cmp(&a.momentum)
            .then_with(|| a.symbol.cmp(&b.symbol))
    });

    let mut ranked = Vec::with_capacity(scores.len());
    let mut previous: Option<f64> = None;
    let mut current_rank = 0;

    for (i, score) in scores.into_iter().enumerate() {
        if previous != Some(score.momentum) {
            current_rank = i as u32 + 1;
            previous = Some(score.momentum);
        }
        ranked.push(RankedStock::new(score, current_rank));
    }

    ranked
}
