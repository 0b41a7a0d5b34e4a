use std::sync::Arc;

use log::{debug, info};
use snafu::ensure;

use crate::config::*;
use crate::methods::minimax::MinimaxScores;
use crate::methods::{
    condorcet_basic, copeland, kemeny_young, minimax, ranked_pairs, schulze, stv,
};
use crate::pairwise::PairwiseMatrix;
use crate::ranking::to_ids;
use crate::vote::VoteSet;

/// The strength of a pairwise victory, for Schulze and Ranked Pairs.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum PathMetric {
    /// The number of ballots preferring the winner.
    Winning,
    /// The difference between the ballots preferring the winner and the ones preferring the loser.
    Margin,
}

impl PathMetric {
    /// The weight of the edge i -> j. Positive when i is preferred to j.
    pub(crate) fn edge(self, m: &PairwiseMatrix, i: usize, j: usize) -> i64 {
        match self {
            PathMetric::Winning => m.win(i, j) as i64,
            PathMetric::Margin => m.margin(i, j),
        }
    }
}

/// Which worst-defeat score Minimax ranks by.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum MinimaxVariant {
    Winning,
    Margin,
    /// Not a Condorcet method: the winner may differ from the Condorcet winner.
    Opposition,
}

impl MinimaxVariant {
    pub(crate) fn select(self, s: &MinimaxScores) -> i64 {
        match self {
            MinimaxVariant::Winning => s.winning as i64,
            MinimaxVariant::Margin => s.margin,
            MinimaxVariant::Opposition => s.opposition as i64,
        }
    }
}

/// All the resolution algorithms.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum MethodKind {
    CondorcetBasic,
    Copeland,
    Minimax(MinimaxVariant),
    Schulze(PathMetric),
    RankedPairs(PathMetric),
    KemenyYoung,
    Stv,
}

impl MethodKind {
    pub const ALL: [MethodKind; 11] = [
        MethodKind::CondorcetBasic,
        MethodKind::Copeland,
        MethodKind::Minimax(MinimaxVariant::Winning),
        MethodKind::Minimax(MinimaxVariant::Margin),
        MethodKind::Minimax(MinimaxVariant::Opposition),
        MethodKind::Schulze(PathMetric::Winning),
        MethodKind::Schulze(PathMetric::Margin),
        MethodKind::RankedPairs(PathMetric::Winning),
        MethodKind::RankedPairs(PathMetric::Margin),
        MethodKind::KemenyYoung,
        MethodKind::Stv,
    ];

    pub fn canonical_name(&self) -> &'static str {
        match self {
            MethodKind::CondorcetBasic => "CondorcetBasic",
            MethodKind::Copeland => "Copeland",
            MethodKind::Minimax(MinimaxVariant::Winning) => "Minimax Winning",
            MethodKind::Minimax(MinimaxVariant::Margin) => "Minimax Margin",
            MethodKind::Minimax(MinimaxVariant::Opposition) => "Minimax Opposition",
            MethodKind::Schulze(PathMetric::Winning) => "Schulze Winning",
            MethodKind::Schulze(PathMetric::Margin) => "Schulze Margin",
            MethodKind::RankedPairs(PathMetric::Winning) => "Ranked Pairs Winning",
            MethodKind::RankedPairs(PathMetric::Margin) => "Ranked Pairs Margin",
            MethodKind::KemenyYoung => "Kemeny-Young",
            MethodKind::Stv => "STV",
        }
    }

    /// The largest number of candidates the method accepts.
    pub fn max_candidates(&self, config: &ElectionConfig) -> usize {
        match self {
            MethodKind::KemenyYoung => config.kemeny_young_max_candidates,
            _ => usize::MAX,
        }
    }

    fn compute(&self, ctx: &MethodContext) -> Result<Outcome, VotingErrors> {
        match *self {
            MethodKind::CondorcetBasic => Ok(condorcet_basic::compute(ctx)),
            MethodKind::Copeland => Ok(copeland::compute(ctx)),
            MethodKind::Minimax(variant) => Ok(minimax::compute(ctx, variant)),
            MethodKind::Schulze(metric) => Ok(schulze::compute(ctx, metric)),
            MethodKind::RankedPairs(metric) => Ok(ranked_pairs::compute(ctx, metric)),
            MethodKind::KemenyYoung => kemeny_young::compute(ctx),
            MethodKind::Stv => stv::compute(ctx),
        }
    }
}

/// The read-only view of an election given to the algorithms.
pub(crate) struct MethodContext<'a> {
    pub pairwise: &'a PairwiseMatrix,
    pub candidates: &'a [Candidate],
    // Only STV reads the ballots directly.
    pub votes: &'a VoteSet,
    pub config: &'a ElectionConfig,
}

/// What an algorithm produces, with candidates as positions in the pairwise matrix.
pub(crate) struct Outcome {
    pub ranking: Vec<Vec<usize>>,
    pub warnings: Vec<ResultWarning>,
    pub stats: MethodStats,
}

impl Outcome {
    pub(crate) fn new(ranking: Vec<Vec<usize>>, stats: MethodStats) -> Outcome {
        Outcome {
            ranking,
            warnings: Vec::new(),
            stats,
        }
    }
}

/// A cached value tagged with the generation of the election it was computed for.
///
/// A value from an older generation is never returned.
#[derive(Debug, Clone)]
pub struct Memo<T> {
    cell: Option<(u64, T)>,
}

impl<T: Clone> Memo<T> {
    pub fn new() -> Memo<T> {
        Memo { cell: None }
    }

    pub fn get(&self, generation: u64) -> Option<T> {
        match &self.cell {
            Some((g, v)) if *g == generation => Some(v.clone()),
            _ => None,
        }
    }

    pub fn get_or_try_insert_with<E>(
        &mut self,
        generation: u64,
        f: impl FnOnce() -> Result<T, E>,
    ) -> Result<T, E> {
        if let Some(v) = self.get(generation) {
            return Ok(v);
        }
        let v = f()?;
        self.cell = Some((generation, v.clone()));
        Ok(v)
    }

    pub fn clear(&mut self) {
        self.cell = None;
    }
}

impl<T: Clone> Default for Memo<T> {
    fn default() -> Self {
        Memo::new()
    }
}

/// One instantiated method of an election, with its result cache.
pub(crate) struct Method {
    kind: MethodKind,
    result: Memo<Arc<VotingResult>>,
}

impl Method {
    /// Fails if the method cannot handle this number of candidates.
    pub(crate) fn new(
        kind: MethodKind,
        num_candidates: usize,
        config: &ElectionConfig,
    ) -> Result<Method, VotingErrors> {
        let max = kind.max_candidates(config);
        ensure!(
            (2..=max).contains(&num_candidates),
            CapacityExceededSnafu {
                what: format!("number of candidates for {}", kind.canonical_name()),
                count: num_candidates,
                min: 2_usize,
                max,
            }
        );
        Ok(Method {
            kind,
            result: Memo::new(),
        })
    }

    /// Computes the result once per generation.
    pub(crate) fn result(
        &mut self,
        generation: u64,
        ctx: &MethodContext,
    ) -> Result<Arc<VotingResult>, VotingErrors> {
        let kind = self.kind;
        self.result.get_or_try_insert_with(generation, || {
            info!(
                "Computing {} for {} candidates, {:?}",
                kind.canonical_name(),
                ctx.pairwise.candidate_count(),
                ctx.config
            );
            let outcome = kind.compute(ctx)?;
            let res = VotingResult {
                method: kind.canonical_name().to_string(),
                ranking: to_ids(&outcome.ranking, ctx.pairwise),
                warnings: outcome.warnings,
                stats: outcome.stats,
            };
            debug!("{}: ranking {:?}", res.method, res.ranking);
            Ok(Arc::new(res))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memo_compares_generations() {
        let mut memo: Memo<u32> = Memo::new();
        let mut calls = 0;
        let mut compute = |g: u64, memo: &mut Memo<u32>| {
            memo.get_or_try_insert_with::<()>(g, || {
                calls += 1;
                Ok(g as u32 * 10)
            })
        };
        assert_eq!(compute(1, &mut memo), Ok(10));
        assert_eq!(compute(1, &mut memo), Ok(10));
        assert_eq!(compute(2, &mut memo), Ok(20));
        assert_eq!(calls, 2);
        assert_eq!(memo.get(1), None);
        memo.clear();
        assert_eq!(memo.get(2), None);
    }

    #[test]
    fn failures_are_not_cached() {
        let mut memo: Memo<u32> = Memo::new();
        assert_eq!(memo.get_or_try_insert_with(1, || Err("boom")), Err("boom"));
        assert_eq!(memo.get_or_try_insert_with::<&str>(1, || Ok(3)), Ok(3));
    }

    #[test]
    fn capacity_is_checked_at_construction() {
        let config = ElectionConfig::DEFAULT_CONFIG;
        assert!(matches!(
            Method::new(MethodKind::Copeland, 1, &config),
            Err(VotingErrors::CapacityExceeded { count: 1, .. })
        ));
        assert!(Method::new(MethodKind::KemenyYoung, 8, &config).is_ok());
        assert!(matches!(
            Method::new(MethodKind::KemenyYoung, 9, &config),
            Err(VotingErrors::CapacityExceeded { max: 8, .. })
        ));
    }

    #[test]
    fn every_kind_has_a_distinct_name() {
        let mut names: Vec<&str> = MethodKind::ALL.iter().map(|k| k.canonical_name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), MethodKind::ALL.len());
    }
}
