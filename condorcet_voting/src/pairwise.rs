use std::collections::{BTreeMap, HashMap};

use log::{debug, info};
use snafu::OptionExt;

use crate::config::*;
use crate::vote::Vote;

/// The pairwise tally of an election.
///
/// Candidates are addressed by their position in the candidate list (0..n). For every ordered
/// pair (i, j) with i != j:
/// - `win(i, j)`: total weight of the ballots ranking i strictly before j
/// - `null(i, j)`: total weight of the ballots ranking i and j at the same rank
/// - `lose(i, j)`: total weight of the ballots ranking j strictly before i
///
/// `win(i, j) == lose(j, i)` and `null(i, j) == null(j, i)` always hold. With the implicit
/// ranking policy `ImplicitLast`, `win + null + lose` is also the total weight of the valid
/// ballots. Every count fits in an `i64`.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PairwiseMatrix {
    ids: Vec<CandidateId>,
    win: Vec<u64>,
    null: Vec<u64>,
    lose: Vec<u64>,
    total_weight: u64,
}

/// One row of the pairwise export: the results of a candidate against all the other ones.
#[derive(Eq, PartialEq, Debug, Clone, Default)]
pub struct PairwiseRow {
    pub win: BTreeMap<String, u64>,
    pub null: BTreeMap<String, u64>,
    pub lose: BTreeMap<String, u64>,
}

/// Summary of the duels of one candidate.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Default)]
pub struct PairwiseComparison {
    pub wins: u32,
    pub ties: u32,
    pub losses: u32,
    /// wins - losses
    pub balance: i64,
    /// The largest opposition among the lost duels, 0 if the candidate never loses.
    pub worst_defeat: u64,
}

impl PairwiseMatrix {
    pub fn candidate_count(&self) -> usize {
        self.ids.len()
    }

    /// The candidates, in the order of their positions.
    pub fn candidate_ids(&self) -> &[CandidateId] {
        &self.ids
    }

    pub fn id(&self, pos: usize) -> CandidateId {
        self.ids[pos]
    }

    pub fn position(&self, cid: CandidateId) -> Option<usize> {
        self.ids.iter().position(|c| *c == cid)
    }

    pub fn total_weight(&self) -> u64 {
        self.total_weight
    }

    pub fn win(&self, i: usize, j: usize) -> u64 {
        self.win[self.idx(i, j)]
    }

    pub fn null(&self, i: usize, j: usize) -> u64 {
        self.null[self.idx(i, j)]
    }

    pub fn lose(&self, i: usize, j: usize) -> u64 {
        self.lose[self.idx(i, j)]
    }

    /// win - lose for the pair (i, j). Positive if i is preferred to j on aggregate.
    pub fn margin(&self, i: usize, j: usize) -> i64 {
        self.win(i, j) as i64 - self.lose(i, j) as i64
    }

    /// Iterates over the positions of all the other candidates.
    pub(crate) fn opponents(&self, i: usize) -> impl Iterator<Item = usize> {
        (0..self.ids.len()).filter(move |j| *j != i)
    }

    pub fn comparison(&self) -> Vec<PairwiseComparison> {
        (0..self.candidate_count())
            .map(|i| {
                let mut c = PairwiseComparison::default();
                for j in self.opponents(i) {
                    let (w, l) = (self.win(i, j), self.lose(i, j));
                    if w > l {
                        c.wins += 1;
                        c.balance += 1;
                    } else if w == l {
                        c.ties += 1;
                    } else {
                        c.losses += 1;
                        c.balance -= 1;
                        c.worst_defeat = c.worst_defeat.max(l);
                    }
                }
                c
            })
            .collect()
    }

    /// The matrix keyed by candidate names: candidate -> {win, null, lose} -> candidate -> count.
    pub fn export(&self, candidates: &[Candidate]) -> BTreeMap<String, PairwiseRow> {
        let names: HashMap<CandidateId, &str> = candidates
            .iter()
            .map(|c| (c.id, c.name.as_str()))
            .collect();
        let name = |pos: usize| -> String {
            let cid = self.ids[pos];
            names
                .get(&cid)
                .map(|n| n.to_string())
                .unwrap_or_else(|| cid.to_string())
        };
        let mut res: BTreeMap<String, PairwiseRow> = BTreeMap::new();
        for i in 0..self.candidate_count() {
            let mut row = PairwiseRow::default();
            for j in self.opponents(i) {
                row.win.insert(name(j), self.win(i, j));
                row.null.insert(name(j), self.null(i, j));
                row.lose.insert(name(j), self.lose(i, j));
            }
            res.insert(name(i), row);
        }
        res
    }

    fn idx(&self, i: usize, j: usize) -> usize {
        i * self.ids.len() + j
    }
}

/// Resolves the ranking of a ballot to candidate positions, applying the implicit ranking policy.
///
/// Fails if the ballot mentions a candidate that is not in `positions`.
pub(crate) fn positional_ranking(
    vote: &Vote,
    positions: &HashMap<CandidateId, usize>,
    num_candidates: usize,
    policy: ImplicitRanking,
) -> Result<Vec<Vec<usize>>, VotingErrors> {
    let mut present = vec![false; num_candidates];
    let mut groups: Vec<Vec<usize>> = Vec::with_capacity(vote.ranking().len() + 1);
    for group in vote.ranking().iter() {
        let mut g: Vec<usize> = Vec::with_capacity(group.len());
        for cid in group.iter() {
            let pos = *positions.get(cid).context(InputInconsistencySnafu {
                reason: format!("ballot references unknown candidate {}", cid),
            })?;
            present[pos] = true;
            g.push(pos);
        }
        g.sort_unstable();
        groups.push(g);
    }
    if policy == ImplicitRanking::ImplicitLast {
        let absent: Vec<usize> = (0..num_candidates).filter(|p| !present[*p]).collect();
        if !absent.is_empty() {
            groups.push(absent);
        }
    }
    Ok(groups)
}

pub(crate) fn candidate_positions(candidates: &[Candidate]) -> HashMap<CandidateId, usize> {
    candidates
        .iter()
        .enumerate()
        .map(|(pos, c)| (c.id, pos))
        .collect()
}

/// The largest total weight of ballots a tally accepts, so that margins never overflow.
pub const MAX_TOTAL_WEIGHT: u64 = i64::MAX as u64;

/// Adds the weight of a ballot to a running total, failing beyond `MAX_TOTAL_WEIGHT`.
pub(crate) fn add_weight(total: u64, w: u64) -> Result<u64, VotingErrors> {
    total
        .checked_add(w)
        .filter(|t| *t <= MAX_TOTAL_WEIGHT)
        .context(CapacityExceededSnafu {
            what: "total weight of the ballots",
            count: usize::try_from(total.saturating_add(w)).unwrap_or(usize::MAX),
            min: 0_usize,
            max: usize::try_from(MAX_TOTAL_WEIGHT).unwrap_or(usize::MAX),
        })
}

/// Builds the pairwise tally of the ballots that follow the constraints of the configuration.
///
/// Runs in O(ballots x candidates^2).
pub fn build<'a>(
    candidates: &[Candidate],
    votes: impl IntoIterator<Item = &'a Vote>,
    config: &ElectionConfig,
) -> Result<PairwiseMatrix, VotingErrors> {
    let n = candidates.len();
    let positions = candidate_positions(candidates);
    let mut m = PairwiseMatrix {
        ids: candidates.iter().map(|c| c.id).collect(),
        win: vec![0; n * n],
        null: vec![0; n * n],
        lose: vec![0; n * n],
        total_weight: 0,
    };
    let mut num_votes: usize = 0;
    let mut num_invalid: usize = 0;
    for vote in votes {
        if !vote.is_valid(config) {
            num_invalid += 1;
            continue;
        }
        let w = vote.effective_weight(config);
        // Checked first: every cell is bounded by the total.
        m.total_weight = add_weight(m.total_weight, w)?;
        // The policy is applied once for the whole ballot.
        let groups = positional_ranking(vote, &positions, n, config.implicit_ranking)?;
        for (gidx, group) in groups.iter().enumerate() {
            for &i in group.iter() {
                for &j in group.iter() {
                    if i != j {
                        m.null[i * n + j] += w;
                    }
                }
                for later in groups[gidx + 1..].iter() {
                    for &j in later.iter() {
                        m.win[i * n + j] += w;
                        m.lose[j * n + i] += w;
                    }
                }
            }
        }
        num_votes += 1;
    }
    info!(
        "pairwise::build: {} candidates, {} votes ({} invalid skipped), total weight {}",
        n, num_votes, num_invalid, m.total_weight
    );
    for i in 0..n {
        debug!(
            "pairwise::build: {}: win {:?} null {:?} lose {:?}",
            m.ids[i],
            &m.win[i * n..(i + 1) * n],
            &m.null[i * n..(i + 1) * n],
            &m.lose[i * n..(i + 1) * n]
        );
    }
    Ok(m)
}
