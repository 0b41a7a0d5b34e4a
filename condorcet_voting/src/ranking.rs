use crate::config::CandidateId;
use crate::pairwise::PairwiseMatrix;

#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub(crate) enum ScoreOrder {
    HighestFirst,
    LowestFirst,
}

/// Groups candidate positions by equal score, best group first.
///
/// Inside a group, positions stay in increasing order.
pub(crate) fn group_by_score<T: Ord + Copy>(scores: &[T], order: ScoreOrder) -> Vec<Vec<usize>> {
    let mut distinct: Vec<T> = scores.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    if order == ScoreOrder::HighestFirst {
        distinct.reverse();
    }
    distinct
        .iter()
        .map(|s| {
            scores
                .iter()
                .enumerate()
                .filter_map(|(pos, x)| if x == s { Some(pos) } else { None })
                .collect()
        })
        .collect()
}

pub(crate) fn to_ids(groups: &[Vec<usize>], m: &PairwiseMatrix) -> Vec<Vec<CandidateId>> {
    groups
        .iter()
        .map(|g| g.iter().map(|pos| m.id(*pos)).collect())
        .collect()
}
