use log::debug;

use crate::config::{CandidateId, MethodStats};
use crate::method::{MethodContext, Outcome, PathMetric};
use crate::pairwise::PairwiseMatrix;
use crate::ranking::{group_by_score, ScoreOrder};

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct SchulzeStats {
    /// The strength of the strongest path between every pair of candidates, indexed by the
    /// positions of the candidates in the election.
    pub strongest_paths: Vec<Vec<i64>>,
    /// How many other candidates each candidate beats through the strongest paths.
    pub beats: Vec<(CandidateId, u32)>,
}

/// Widest paths between all the pairs of candidates, Floyd-Warshall style.
pub(crate) fn strongest_paths(m: &PairwiseMatrix, metric: PathMetric) -> Vec<Vec<i64>> {
    let n = m.candidate_count();
    let mut p = vec![vec![0_i64; n]; n];
    for i in 0..n {
        for j in m.opponents(i) {
            let (e_ij, e_ji) = (metric.edge(m, i, j), metric.edge(m, j, i));
            if e_ij > e_ji {
                p[i][j] = e_ij;
            }
        }
    }
    for k in 0..n {
        for i in m.opponents(k) {
            for j in 0..n {
                if j == i || j == k {
                    continue;
                }
                let through = p[i][k].min(p[k][j]);
                if through > p[i][j] {
                    p[i][j] = through;
                }
            }
        }
    }
    p
}

pub(crate) fn compute(ctx: &MethodContext, metric: PathMetric) -> Outcome {
    let m = ctx.pairwise;
    let p = strongest_paths(m, metric);
    let beats: Vec<u32> = (0..m.candidate_count())
        .map(|i| m.opponents(i).filter(|&j| p[i][j] > p[j][i]).count() as u32)
        .collect();
    debug!("schulze: {:?} paths {:?} beats {:?}", metric, p, beats);
    let ranking = group_by_score(&beats, ScoreOrder::HighestFirst);
    let stats = SchulzeStats {
        strongest_paths: p,
        beats: beats
            .iter()
            .enumerate()
            .map(|(pos, b)| (m.id(pos), *b))
            .collect(),
    };
    Outcome::new(ranking, MethodStats::Schulze(stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::testing::*;

    #[test]
    fn wikipedia_example() {
        let f = schulze_wikipedia();
        assert_eq!(
            strongest_paths(&f.pairwise, PathMetric::Winning),
            vec![
                vec![0, 28, 28, 30, 24],
                vec![25, 0, 28, 33, 24],
                vec![25, 29, 0, 29, 24],
                vec![25, 28, 28, 0, 24],
                vec![25, 28, 28, 31, 0],
            ]
        );
        for metric in [PathMetric::Winning, PathMetric::Margin] {
            let out = compute(&f.ctx(), metric);
            assert_eq!(
                f.names(&out.ranking),
                names(&[&["E"], &["A"], &["C"], &["B"], &["D"]])
            );
        }
    }

    #[test]
    fn beats_are_transitive() {
        for f in [tennessee(), five_without_winner(), rbvote(), schulze_wikipedia()] {
            let p = strongest_paths(&f.pairwise, PathMetric::Margin);
            let n = p.len();
            let beats = |i: usize, j: usize| i != j && p[i][j] > p[j][i];
            for a in 0..n {
                for b in 0..n {
                    for c in 0..n {
                        if beats(a, b) && beats(b, c) && a != c {
                            assert!(beats(a, c));
                        }
                    }
                }
            }
        }
    }

    #[test]
    fn other_datasets() {
        let f = tennessee();
        let out = compute(&f.ctx(), PathMetric::Winning);
        assert_eq!(
            f.names(&out.ranking),
            names(&[&["Nashville"], &["Chattanooga"], &["Knoxville"], &["Memphis"]])
        );
        let f = rbvote();
        let out = compute(&f.ctx(), PathMetric::Margin);
        assert_eq!(
            f.names(&out.ranking),
            names(&[&["Abby"], &["Brad"], &["Erin"], &["Dave"], &["Cora"]])
        );
        let f = cycle();
        let out = compute(&f.ctx(), PathMetric::Winning);
        assert_eq!(f.names(&out.ranking), names(&[&["A", "B", "C"]]));
        match out.stats {
            MethodStats::Schulze(s) => assert!(s.beats.iter().all(|(_, b)| *b == 0)),
            _ => panic!("unexpected stats"),
        }
    }
}
