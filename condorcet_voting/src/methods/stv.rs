use log::{debug, info};
use snafu::ensure;

use crate::config::*;
use crate::method::{MethodContext, Outcome};
use crate::pairwise::{candidate_positions, positional_ranking};
use crate::tiebreak;

// Transferred values accumulate rounding errors. Scores closer than this are considered equal.
const EPSILON: f64 = 1e-9;

#[derive(PartialEq, Debug, Clone)]
pub struct StvRound {
    /// Starts at 1.
    pub round: u32,
    /// The score of every candidate still running at the start of the round.
    pub tally: Vec<(CandidateId, f64)>,
    pub elected: Vec<CandidateId>,
    pub eliminated: Option<CandidateId>,
}

#[derive(PartialEq, Debug, Clone)]
pub struct StvStats {
    /// The Droop quota.
    pub quota: u64,
    pub rounds: Vec<StvRound>,
}

// A ballot during the count. The value decreases each time it helps electing a candidate.
#[derive(PartialEq, Debug, Clone)]
struct LiveBallot {
    groups: Vec<Vec<usize>>,
    value: f64,
}

impl LiveBallot {
    /// The candidates of the first rank that still has a running candidate.
    fn current(&self, running: &[bool]) -> Option<Vec<usize>> {
        self.groups
            .iter()
            .map(|g| g.iter().cloned().filter(|p| running[*p]).collect::<Vec<usize>>())
            .find(|g| !g.is_empty())
    }
}

pub(crate) fn droop_quota(total_weight: u64, seats: u32) -> u64 {
    total_weight / (seats as u64 + 1) + 1
}

pub(crate) fn compute(ctx: &MethodContext) -> Result<Outcome, VotingErrors> {
    let m = ctx.pairwise;
    let n = m.candidate_count();
    let seats = ctx.config.stv_seats as usize;
    ensure!(
        seats >= 1,
        InputInconsistencySnafu {
            reason: "STV needs at least one seat to fill",
        }
    );
    let positions = candidate_positions(ctx.candidates);
    let mut ballots: Vec<LiveBallot> = Vec::with_capacity(ctx.votes.len());
    for vote in ctx.votes.values().filter(|v| v.is_valid(ctx.config)) {
        ballots.push(LiveBallot {
            groups: positional_ranking(vote, &positions, n, ctx.config.implicit_ranking)?,
            value: vote.effective_weight(ctx.config) as f64,
        });
    }
    let quota = droop_quota(m.total_weight(), ctx.config.stv_seats);
    info!(
        "stv: {} seats, {} candidates, {} ballots, quota {}",
        seats,
        n,
        ballots.len(),
        quota
    );

    let mut running = vec![true; n];
    let mut elected: Vec<usize> = Vec::new();
    let mut rounds: Vec<StvRound> = Vec::new();
    let mut round: u32 = 0;
    while elected.len() < seats && running.iter().any(|r| *r) {
        round += 1;
        let mut scores = vec![0.0_f64; n];
        let allocations: Vec<Option<Vec<usize>>> =
            ballots.iter().map(|b| b.current(&running)).collect();
        for (b, alloc) in ballots.iter().zip(allocations.iter()) {
            if let Some(group) = alloc {
                let share = b.value / group.len() as f64;
                for p in group.iter() {
                    scores[*p] += share;
                }
            }
        }
        let candidates_in_round: Vec<usize> = (0..n).filter(|p| running[*p]).collect();
        debug!(
            "stv: round {}: scores {:?}",
            round,
            candidates_in_round
                .iter()
                .map(|p| (m.id(*p), scores[*p]))
                .collect::<Vec<_>>()
        );
        let mut stat = StvRound {
            round,
            tally: candidates_in_round
                .iter()
                .map(|p| (m.id(*p), scores[*p]))
                .collect(),
            elected: Vec::new(),
            eliminated: None,
        };

        let priority = tiebreak::priorities(ctx.candidates, ctx.config.tiebreak_mode, round);
        let mut winners: Vec<usize> = candidates_in_round
            .iter()
            .cloned()
            .filter(|p| scores[*p] + EPSILON >= quota as f64)
            .collect();
        winners.sort_by(|a, b| {
            scores[*b]
                .total_cmp(&scores[*a])
                .then(priority[*a].cmp(&priority[*b]))
        });
        winners.truncate(seats - elected.len());

        if winners.is_empty() {
            let loser = find_eliminated(&candidates_in_round, &scores, ctx, round);
            debug!("stv: round {}: eliminating {}", round, m.id(loser));
            running[loser] = false;
            stat.eliminated = Some(m.id(loser));
        } else {
            transfer_surplus(&mut ballots, &allocations, &winners, &scores, quota);
            for p in winners.iter() {
                debug!(
                    "stv: round {}: electing {} with {}",
                    round,
                    m.id(*p),
                    scores[*p]
                );
                running[*p] = false;
                elected.push(*p);
                stat.elected.push(m.id(*p));
            }
        }
        rounds.push(stat);
    }
    info!(
        "stv: elected {:?} after {} rounds",
        elected.iter().map(|p| m.id(*p)).collect::<Vec<_>>(),
        round
    );
    let ranking = elected.iter().map(|p| vec![*p]).collect();
    Ok(Outcome::new(
        ranking,
        MethodStats::Stv(StvStats { quota, rounds }),
    ))
}

/// The lowest scoring candidate. Among equal scores, the tie-break order applies: the last
/// candidate in registration order, or the first one in the random order of the round.
fn find_eliminated(candidates: &[usize], scores: &[f64], ctx: &MethodContext, round: u32) -> usize {
    let lowest = candidates
        .iter()
        .map(|p| scores[*p])
        .min_by(|a, b| a.total_cmp(b))
        .unwrap_or(0.0);
    let tied: Vec<usize> = candidates
        .iter()
        .cloned()
        .filter(|p| scores[*p] <= lowest + EPSILON)
        .collect();
    let sorted = tiebreak::sorted_positions(&tied, ctx.candidates, ctx.config.tiebreak_mode, round);
    if sorted.len() > 1 {
        debug!("find_eliminated: tie between {:?}", sorted);
    }
    let picked = match ctx.config.tiebreak_mode {
        TieBreakMode::UseCandidateOrder => sorted.last(),
        TieBreakMode::Random(_) => sorted.first(),
    };
    // `candidates` is never empty while the count goes on.
    picked.cloned().unwrap_or(candidates[0])
}

/// Lowers the value of the ballots that contributed to the elected candidates.
///
/// A ballot split between the candidates of a rank keeps the surplus fraction of the shares given
/// to the elected ones, and the full shares given to the others.
fn transfer_surplus(
    ballots: &mut [LiveBallot],
    allocations: &[Option<Vec<usize>>],
    winners: &[usize],
    scores: &[f64],
    quota: u64,
) {
    let surplus_ratio = |p: usize| -> f64 {
        let s = scores[p];
        if s > 0.0 {
            ((s - quota as f64) / s).max(0.0)
        } else {
            0.0
        }
    };
    for (b, alloc) in ballots.iter_mut().zip(allocations.iter()) {
        let group = match alloc {
            Some(g) => g,
            None => continue,
        };
        if !group.iter().any(|p| winners.contains(p)) {
            continue;
        }
        let kept: f64 = group
            .iter()
            .map(|p| {
                if winners.contains(p) {
                    surplus_ratio(*p)
                } else {
                    1.0
                }
            })
            .sum();
        b.value = b.value / group.len() as f64 * kept;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::methods::testing::*;

    fn stats(out: &Outcome) -> &StvStats {
        match &out.stats {
            MethodStats::Stv(s) => s,
            _ => panic!("unexpected stats"),
        }
    }

    #[test]
    fn quota() {
        assert_eq!(droop_quota(100, 2), 34);
        assert_eq!(droop_quota(100, 1), 51);
        assert_eq!(droop_quota(99, 2), 34);
        assert_eq!(droop_quota(0, 3), 1);
    }

    #[test]
    fn tennessee_two_seats() {
        let f = tennessee();
        let out = compute(&f.ctx()).unwrap();
        assert_eq!(f.names(&out.ranking), names(&[&["Memphis"], &["Nashville"]]));
        let s = stats(&out);
        assert_eq!(s.quota, 34);
        assert_eq!(s.rounds.len(), 2);
        let first: f64 = s.rounds[0].tally.iter().map(|(_, x)| x).sum();
        assert!((first - 100.0).abs() < 1e-6);
        assert_eq!(s.rounds[0].elected, vec![f.candidates[0].id]);
        // Memphis' surplus of 8 goes to Nashville.
        let nashville = s.rounds[1]
            .tally
            .iter()
            .find(|(c, _)| *c == f.candidates[1].id)
            .map(|(_, x)| *x)
            .unwrap();
        assert!((nashville - 34.0).abs() < 1e-6);
    }

    #[test]
    fn eliminations_before_elections() {
        let f = five_without_winner();
        let out = compute(&f.ctx()).unwrap();
        assert_eq!(f.names(&out.ranking), names(&[&["A"], &["C"]]));
        let s = stats(&out);
        let id = |n: &str| f.candidates.iter().find(|c| c.name == n).unwrap().id;
        assert_eq!(s.rounds[0].eliminated, Some(id("E")));
        assert_eq!(s.rounds[1].eliminated, Some(id("D")));
        assert_eq!(s.rounds[2].elected, vec![id("A")]);
        assert_eq!(s.rounds[3].elected, vec![id("C")]);
        assert_eq!(s.rounds.len(), 4);
    }

    #[test]
    fn several_elected_in_one_round() {
        let f = rbvote();
        let out = compute(&f.ctx()).unwrap();
        assert_eq!(f.names(&out.ranking), names(&[&["Brad"], &["Dave"]]));
        let s = stats(&out);
        assert_eq!(s.quota, 308);
        assert_eq!(s.rounds.len(), 1);
    }

    #[test]
    fn never_more_than_the_seats() {
        let f = Fixture::new(
            &["A", "B", "C"],
            &[("A>B>C", 10), ("B>A>C", 10), ("C>A>B", 10)],
            ElectionConfig {
                stv_seats: 1,
                ..ElectionConfig::DEFAULT_CONFIG
            },
        );
        let out = compute(&f.ctx()).unwrap();
        assert_eq!(out.ranking.len(), 1);
        let s = stats(&out);
        assert_eq!(s.quota, 16);
        // All tied: the last registered candidate goes first.
        assert_eq!(s.rounds[0].eliminated, Some(f.candidates[2].id));
        assert_eq!(f.names(&out.ranking), names(&[&["A"]]));
    }

    #[test]
    fn tied_ranks_split_the_ballot() {
        let f = Fixture::new(
            &["A", "B", "C"],
            &[("A=B>C", 4), ("C", 1)],
            ElectionConfig {
                stv_seats: 1,
                ..ElectionConfig::DEFAULT_CONFIG
            },
        );
        let out = compute(&f.ctx()).unwrap();
        let s = stats(&out);
        assert_eq!(
            s.rounds[0].tally,
            vec![
                (f.candidates[0].id, 2.0),
                (f.candidates[1].id, 2.0),
                (f.candidates[2].id, 1.0)
            ]
        );
        assert_eq!(s.rounds[0].eliminated, Some(f.candidates[2].id));
        // B goes out on the tie, then A gets the whole ballot.
        assert_eq!(s.rounds[1].eliminated, Some(f.candidates[1].id));
        assert_eq!(f.names(&out.ranking), names(&[&["A"]]));
    }

    fn one_seat() -> ElectionConfig {
        ElectionConfig {
            stv_seats: 1,
            ..ElectionConfig::DEFAULT_CONFIG
        }
    }

    #[test]
    fn excluded_ballots_exhaust() {
        let ballots = [("A", 5), ("B", 4), ("C", 3)];
        let names_abc = ["A", "B", "C"];

        let f = Fixture::new(&names_abc, &ballots, ElectionConfig::DEFAULT_CONFIG);
        let out = compute(&f.ctx()).unwrap();
        // C's ballot ranks A and B last: it goes to B once A is elected.
        assert_eq!(f.names(&out.ranking), names(&[&["A"], &["B"]]));
        assert_eq!(stats(&out).rounds[2].tally, vec![(f.candidates[1].id, 7.0)]);

        let f = Fixture::new(
            &names_abc,
            &ballots,
            ElectionConfig {
                implicit_ranking: ImplicitRanking::Excluded,
                ..ElectionConfig::DEFAULT_CONFIG
            },
        );
        let out = compute(&f.ctx()).unwrap();
        let s = stats(&out);
        assert_eq!(s.quota, 5);
        assert_eq!(s.rounds[1].eliminated, Some(f.candidates[2].id));
        assert_eq!(s.rounds[2].tally, vec![(f.candidates[1].id, 4.0)]);
        assert_eq!(s.rounds[2].eliminated, Some(f.candidates[1].id));
        assert_eq!(f.names(&out.ranking), names(&[&["A"]]));
    }

    #[test]
    fn random_tiebreak_eliminations() {
        let config = ElectionConfig {
            tiebreak_mode: TieBreakMode::Random(2022),
            ..one_seat()
        };
        let f = Fixture::new(&["A", "B", "C"], &[("A", 1), ("B", 1), ("C", 1)], config);
        let mode = f.config.tiebreak_mode;
        let out = compute(&f.ctx()).unwrap();
        let s = stats(&out);

        let first = tiebreak::sorted_positions(&[0, 1, 2], &f.candidates, mode, 1)[0];
        assert_eq!(s.rounds[0].eliminated, Some(f.candidates[first].id));
        let left: Vec<usize> = (0..3).filter(|p| *p != first).collect();
        // The eliminated ballot is split between the two others, still tied.
        assert!(s.rounds[1].tally.iter().all(|(_, x)| *x == 1.5));
        let second = tiebreak::sorted_positions(&left, &f.candidates, mode, 2)[0];
        assert_eq!(s.rounds[1].eliminated, Some(f.candidates[second].id));
        let winner = left.iter().cloned().find(|p| *p != second).unwrap();
        assert_eq!(out.ranking, vec![vec![winner]]);
    }

    #[test]
    fn invalid_ballots_are_not_counted() {
        let config = ElectionConfig {
            constraints: vec![VoteConstraint::NoTie],
            ..one_seat()
        };
        let f = Fixture::new(&["A", "B", "C"], &[("A=B", 10), ("B>C", 2), ("C>A", 1)], config);
        let out = compute(&f.ctx()).unwrap();
        let s = stats(&out);
        assert_eq!(s.quota, 2);
        assert_eq!(f.names(&out.ranking), names(&[&["B"]]));
    }

    #[test]
    fn zero_seats_is_rejected() {
        let f = Fixture::new(
            &["A", "B"],
            &[("A>B", 1)],
            ElectionConfig {
                stv_seats: 0,
                ..ElectionConfig::DEFAULT_CONFIG
            },
        );
        assert!(matches!(
            compute(&f.ctx()),
            Err(VotingErrors::InputInconsistency { .. })
        ));
    }
}
