use log::debug;

use crate::config::MethodStats;
use crate::method::{MethodContext, Outcome};
use crate::pairwise::PairwiseMatrix;

/// The candidate that beats every other candidate in a duel, if there is one.
pub(crate) fn condorcet_winner(m: &PairwiseMatrix) -> Option<usize> {
    (0..m.candidate_count()).find(|&i| m.opponents(i).all(|j| m.win(i, j) > m.lose(i, j)))
}

/// The candidate that loses every duel, if there is one.
pub(crate) fn condorcet_loser(m: &PairwiseMatrix) -> Option<usize> {
    (0..m.candidate_count()).find(|&i| m.opponents(i).all(|j| m.win(i, j) < m.lose(i, j)))
}

/// Only the Condorcet winner is ranked. Without one, the ranking is empty.
pub(crate) fn compute(ctx: &MethodContext) -> Outcome {
    let m = ctx.pairwise;
    let winner = condorcet_winner(m);
    debug!("condorcet_basic: winner {:?}", winner.map(|p| m.id(p)));
    let stats: Vec<_> = m
        .comparison()
        .into_iter()
        .enumerate()
        .map(|(pos, c)| (m.id(pos), c))
        .collect();
    let ranking = winner.map(|p| vec![vec![p]]).unwrap_or_default();
    Outcome::new(ranking, MethodStats::CondorcetBasic(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::testing::*;

    #[test]
    fn tennessee_has_a_winner() {
        let f = tennessee();
        let out = compute(&f.ctx());
        assert_eq!(f.names(&out.ranking), names(&[&["Nashville"]]));
        assert_eq!(condorcet_loser(&f.pairwise), Some(0));
        match out.stats {
            MethodStats::CondorcetBasic(stats) => {
                assert_eq!(stats.len(), 4);
                assert_eq!(stats[1].1.wins, 3);
                assert_eq!(stats[0].1.losses, 3);
                assert_eq!(stats[0].1.worst_defeat, 58);
            }
            _ => panic!("unexpected stats"),
        }
    }

    #[test]
    fn no_winner_gives_an_empty_ranking() {
        let f = five_without_winner();
        let out = compute(&f.ctx());
        assert!(out.ranking.is_empty());
        assert!(out.warnings.is_empty());

        let f = cycle();
        assert_eq!(condorcet_winner(&f.pairwise), None);
        assert_eq!(condorcet_loser(&f.pairwise), None);
    }
}
