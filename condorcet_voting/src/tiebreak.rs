use log::debug;

use crate::config::{Candidate, TieBreakMode};

/// Orders the given candidate positions for tie-breaking. The first element is the preferred one.
///
/// `salt` lets callers draw a different order at each step of a computation (the round number for
/// example) when using the random mode.
pub(crate) fn sorted_positions(
    positions: &[usize],
    candidates: &[Candidate],
    mode: TieBreakMode,
    salt: u32,
) -> Vec<usize> {
    let mut res: Vec<usize> = positions.to_vec();
    match mode {
        TieBreakMode::UseCandidateOrder => {
            res.sort_unstable();
        }
        TieBreakMode::Random(seed) => {
            res.sort_by_cached_key(|pos| {
                sha256::digest(format!(
                    "{:08}{:08}{}",
                    seed, salt, candidates[*pos].name
                ))
            });
        }
    }
    debug!(
        "sorted_positions: mode {:?} salt {}: {:?} -> {:?}",
        mode, salt, positions, res
    );
    res
}

/// The priority of every candidate position under the tie-break mode: 0 is the most preferred.
pub(crate) fn priorities(candidates: &[Candidate], mode: TieBreakMode, salt: u32) -> Vec<usize> {
    let all: Vec<usize> = (0..candidates.len()).collect();
    let order = sorted_positions(&all, candidates, mode, salt);
    let mut prio = vec![0; candidates.len()];
    for (rank, pos) in order.iter().enumerate() {
        prio[*pos] = rank;
    }
    prio
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CandidateId;

    fn candidates() -> Vec<Candidate> {
        ["Anna", "Bob", "Clara", "Dave"]
            .iter()
            .enumerate()
            .map(|(idx, n)| Candidate {
                id: CandidateId(idx as u32 + 1),
                name: n.to_string(),
            })
            .collect()
    }

    #[test]
    fn candidate_order() {
        let cands = candidates();
        assert_eq!(
            sorted_positions(&[3, 0, 2], &cands, TieBreakMode::UseCandidateOrder, 0),
            vec![0, 2, 3]
        );
        assert_eq!(
            priorities(&cands, TieBreakMode::UseCandidateOrder, 0),
            vec![0, 1, 2, 3]
        );
    }

    #[test]
    fn random_order_is_reproducible() {
        let cands = candidates();
        let a = sorted_positions(&[0, 1, 2, 3], &cands, TieBreakMode::Random(7), 1);
        let b = sorted_positions(&[3, 2, 1, 0], &cands, TieBreakMode::Random(7), 1);
        assert_eq!(a, b);
        let mut sorted = a.clone();
        sorted.sort_unstable();
        assert_eq!(sorted, vec![0, 1, 2, 3]);
        let prio = priorities(&cands, TieBreakMode::Random(7), 1);
        assert_eq!(prio[a[0]], 0);
    }
}
