use std::collections::HashMap;
use std::sync::{Arc, Mutex, OnceLock};

use log::{debug, info, warn};
use snafu::{ensure, OptionExt};

use crate::config::*;
use crate::method::{MethodContext, Outcome};
use crate::pairwise::PairwiseMatrix;

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct KemenyYoungStats {
    pub best_score: u64,
    /// Every possible ranking with its score, in lexicographic order of the candidate positions.
    pub ranking_scores: Vec<(Vec<CandidateId>, u64)>,
}

/// All the orderings of `0..n`, in lexicographic order, stored as consecutive rows of `n` bytes.
#[derive(Eq, PartialEq, Debug)]
pub(crate) struct Permutations {
    n: usize,
    rows: Vec<u8>,
}

impl Permutations {
    pub(crate) fn len(&self) -> usize {
        if self.n == 0 {
            1
        } else {
            self.rows.len() / self.n
        }
    }

    pub(crate) fn get(&self, idx: usize) -> &[u8] {
        &self.rows[idx * self.n..(idx + 1) * self.n]
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &[u8]> + '_ {
        (0..self.len()).map(move |idx| self.get(idx))
    }
}

// Generated once per number of candidates and shared by all the elections of the process.
static PERMUTATIONS: OnceLock<Mutex<HashMap<usize, Arc<Permutations>>>> = OnceLock::new();

/// Positions are stored on a byte.
pub(crate) const MAX_CANDIDATES: usize = u8::MAX as usize + 1;

pub(crate) fn permutations(n: usize) -> Arc<Permutations> {
    let cache = PERMUTATIONS.get_or_init(|| Mutex::new(HashMap::new()));
    // The map is only ever extended with complete values, so a poisoned lock is still usable.
    let mut cache = cache.lock().unwrap_or_else(|e| e.into_inner());
    cache
        .entry(n)
        .or_insert_with(|| {
            debug!("permutations: generating for {} candidates", n);
            Arc::new(generate(n))
        })
        .clone()
}

fn generate(n: usize) -> Permutations {
    let mut current: Vec<u8> = (0..n).map(|p| p as u8).collect();
    let mut rows = current.clone();
    while next_permutation(&mut current) {
        rows.extend_from_slice(&current);
    }
    Permutations { n, rows }
}

// Rearranges into the next permutation in lexicographic order. Returns false after the last one.
fn next_permutation(p: &mut [u8]) -> bool {
    if p.len() < 2 {
        return false;
    }
    let mut i = p.len() - 1;
    while i > 0 && p[i - 1] >= p[i] {
        i -= 1;
    }
    if i == 0 {
        return false;
    }
    let mut j = p.len() - 1;
    while p[j] <= p[i - 1] {
        j -= 1;
    }
    p.swap(i - 1, j);
    p[i..].reverse();
    true
}

/// The number of pairwise preferences a ranking agrees with. None if it does not fit in a u64.
fn score(m: &PairwiseMatrix, order: &[u8]) -> Option<u64> {
    let mut s: u64 = 0;
    for (idx, &earlier) in order.iter().enumerate() {
        for &later in order[idx + 1..].iter() {
            s = s.checked_add(m.win(earlier as usize, later as usize))?;
        }
    }
    Some(s)
}

pub(crate) fn compute(ctx: &MethodContext) -> Result<Outcome, VotingErrors> {
    let m = ctx.pairwise;
    let n = m.candidate_count();
    ensure!(
        n <= MAX_CANDIDATES,
        CapacityExceededSnafu {
            what: "number of candidates for Kemeny-Young",
            count: n,
            min: 2_usize,
            max: MAX_CANDIDATES,
        }
    );
    let perms = permutations(n);
    info!(
        "kemeny_young: scoring {} rankings of {} candidates",
        perms.len(),
        n
    );
    let scores: Vec<u64> = perms
        .iter()
        .map(|p| score(m, p))
        .collect::<Option<Vec<u64>>>()
        .context(CapacityExceededSnafu {
            what: "Kemeny-Young score",
            count: usize::MAX,
            min: 0_usize,
            max: usize::try_from(u64::MAX).unwrap_or(usize::MAX),
        })?;
    let best_score = scores.iter().copied().max().unwrap_or(0);
    // The first maximum in lexicographic order is kept.
    let best = scores.iter().position(|s| *s == best_score).unwrap_or(0);
    let optimal_rankings = scores.iter().filter(|s| **s == best_score).count();
    debug!(
        "kemeny_young: best score {} reached by {} rankings, picked {:?}",
        best_score,
        optimal_rankings,
        perms.get(best)
    );

    let ranking: Vec<Vec<usize>> = perms.get(best).iter().map(|p| vec![*p as usize]).collect();
    let stats = KemenyYoungStats {
        best_score,
        ranking_scores: perms
            .iter()
            .zip(scores.iter())
            .map(|(p, s)| (p.iter().map(|pos| m.id(*pos as usize)).collect(), *s))
            .collect(),
    };
    let mut outcome = Outcome::new(ranking, MethodStats::KemenyYoung(stats));
    if optimal_rankings > 1 {
        warn!(
            "kemeny_young: {} rankings share the best score {}, keeping the first one",
            optimal_rankings, best_score
        );
        outcome.warnings.push(ResultWarning::ComputationConflict {
            optimal_rankings,
            best_score,
        });
    }
    Ok(outcome)
}
