use log::debug;

use crate::config::MethodStats;
use crate::method::{MethodContext, Outcome};
use crate::ranking::{group_by_score, ScoreOrder};

/// Ranks by the number of duels won minus the number of duels lost.
pub(crate) fn compute(ctx: &MethodContext) -> Outcome {
    let m = ctx.pairwise;
    let scores: Vec<i64> = m.comparison().iter().map(|c| c.balance).collect();
    debug!("copeland: scores {:?}", scores);
    let ranking = group_by_score(&scores, ScoreOrder::HighestFirst);
    let stats = scores
        .iter()
        .enumerate()
        .map(|(pos, s)| (m.id(pos), *s))
        .collect();
    Outcome::new(ranking, MethodStats::Copeland(stats))
}
