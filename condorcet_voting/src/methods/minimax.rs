use log::debug;

use crate::config::MethodStats;
use crate::method::{MethodContext, MinimaxVariant, Outcome};
use crate::pairwise::PairwiseMatrix;
use crate::ranking::{group_by_score, ScoreOrder};

/// The worst defeats of a candidate, under the three ways of measuring them.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct MinimaxScores {
    /// The largest opposition among the duels actually lost, 0 if none is lost.
    pub winning: u64,
    /// The largest margin of defeat. Negative if every duel is won.
    pub margin: i64,
    /// The largest opposition, whether the duel is lost or not.
    pub opposition: u64,
}

pub(crate) fn scores(m: &PairwiseMatrix) -> Vec<MinimaxScores> {
    (0..m.candidate_count())
        .map(|i| {
            let mut s = MinimaxScores {
                winning: 0,
                margin: i64::MIN,
                opposition: 0,
            };
            for j in m.opponents(i) {
                let defeat = -m.margin(i, j);
                if defeat > 0 {
                    s.winning = s.winning.max(m.lose(i, j));
                }
                s.margin = s.margin.max(defeat);
                s.opposition = s.opposition.max(m.lose(i, j));
            }
            s
        })
        .collect()
}

/// Ranks by the worst defeat, the smallest first.
pub(crate) fn compute(ctx: &MethodContext, variant: MinimaxVariant) -> Outcome {
    let m = ctx.pairwise;
    let all = scores(m);
    let selected: Vec<i64> = all.iter().map(|s| variant.select(s)).collect();
    debug!("minimax: {:?} scores {:?}", variant, selected);
    let ranking = group_by_score(&selected, ScoreOrder::LowestFirst);
    let stats = all
        .into_iter()
        .enumerate()
        .map(|(pos, s)| (m.id(pos), s))
        .collect();
    Outcome::new(ranking, MethodStats::Minimax(stats))
}
