// ********* Input data structures ***********

use std::fmt::Display;

use snafu::Snafu;

use crate::methods::kemeny_young::KemenyYoungStats;
use crate::methods::minimax::MinimaxScores;
use crate::methods::ranked_pairs::RankedPairsStats;
use crate::methods::schulze::SchulzeStats;
use crate::methods::stv::StvStats;
use crate::pairwise::PairwiseComparison;

/// The identity of a registered candidate.
///
/// Identifiers are allocated by the election at registration and never reused.
/// Two candidates are equal only if they have the same identifier, regardless of their names.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct CandidateId(pub(crate) u32);

impl CandidateId {
    pub fn value(&self) -> u32 {
        self.0
    }
}

impl Display for CandidateId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Candidate {
    pub id: CandidateId,
    pub name: String,
}

/// The key of a ballot registered in an election.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct VoteKey(pub(crate) u64);

impl VoteKey {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// The preferences expressed on a ballot, from the most preferred rank to the least preferred.
/// Each rank holds the candidates tied at this position.
pub type Ranking = Vec<Vec<CandidateId>>;

// ******** Output data structures *********

/// Non-fatal conditions found while computing a result.
#[derive(Eq, PartialEq, Debug, Clone)]
pub enum ResultWarning {
    /// Several rankings reach the optimal score. One of them was picked.
    ComputationConflict {
        optimal_rankings: usize,
        best_score: u64,
    },
}

/// Intermediate figures of a method, for diagnostics.
#[derive(PartialEq, Debug, Clone)]
pub enum MethodStats {
    CondorcetBasic(Vec<(CandidateId, PairwiseComparison)>),
    Copeland(Vec<(CandidateId, i64)>),
    Minimax(Vec<(CandidateId, MinimaxScores)>),
    Schulze(SchulzeStats),
    RankedPairs(RankedPairsStats),
    KemenyYoung(KemenyYoungStats),
    Stv(StvStats),
}

/// The outcome of a method.
///
/// The ranking is ordered: the group at index 0 has rank 1. Candidates in the same group are tied,
/// and are listed in registration order.
#[derive(PartialEq, Debug, Clone)]
pub struct VotingResult {
    pub method: String,
    pub ranking: Vec<Vec<CandidateId>>,
    pub warnings: Vec<ResultWarning>,
    pub stats: MethodStats,
}

impl VotingResult {
    /// The candidates at rank 1, if any.
    pub fn winner(&self) -> Option<&[CandidateId]> {
        self.ranking.first().map(|g| g.as_slice())
    }

    /// The candidates at the last rank, if any.
    pub fn loser(&self) -> Option<&[CandidateId]> {
        self.ranking.last().map(|g| g.as_slice())
    }

    /// The rank (starting at 1) of a candidate, if it was ranked.
    pub fn rank_of(&self, cid: CandidateId) -> Option<u32> {
        self.ranking
            .iter()
            .position(|g| g.contains(&cid))
            .map(|idx| (idx + 1) as u32)
    }

    /// Iterates over (rank, tied candidates).
    pub fn ranks(&self) -> impl Iterator<Item = (u32, &[CandidateId])> + '_ {
        self.ranking
            .iter()
            .enumerate()
            .map(|(idx, g)| ((idx + 1) as u32, g.as_slice()))
    }
}

// ********* Election state **********

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ElectionState {
    AcceptingCandidates,
    AcceptingVotes,
    ResultsComputed,
}

/// Errors that prevent an operation from completing.
///
/// A failed operation leaves the election untouched.
#[derive(Eq, PartialEq, Debug, Clone, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum VotingErrors {
    /// A ballot or a candidate does not fit the current election.
    #[snafu(display("Inconsistent input: {reason}"))]
    InputInconsistency { reason: String },
    #[snafu(display("Operation '{operation}' is not allowed in state {state:?}"))]
    StateViolation {
        operation: String,
        state: ElectionState,
    },
    #[snafu(display("{what}: got {count}, allowed between {min} and {max}"))]
    CapacityExceeded {
        what: String,
        count: usize,
        min: usize,
        max: usize,
    },
    #[snafu(display("Unknown voting method '{name}'"))]
    UnknownMethod { name: String },
}

// ********* Configuration **********

/// How the candidates missing from a ballot are compared.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum ImplicitRanking {
    /// All the missing candidates are tied after the last rank of the ballot.
    ImplicitLast,
    /// The ballot does not express anything about the missing candidates.
    Excluded,
}

/// A rule a ballot must follow to be counted.
///
/// Ballots breaking a constraint stay registered but are ignored by the pairwise tally and STV.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum VoteConstraint {
    /// No rank of the ballot may hold more than one candidate. The implicit last rank does not
    /// count.
    NoTie,
}

/// Deterministic ordering of candidates used when a method needs to break a tie.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash)]
pub enum TieBreakMode {
    UseCandidateOrder,
    // Uses a cryptographic hash of the seed and the candidate names, so the order cannot be
    // guessed from the names but is still reproducible.
    Random(u32),
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct ElectionConfig {
    pub implicit_ranking: ImplicitRanking,
    /// If false, every ballot counts for 1 regardless of its weight.
    pub vote_weight: bool,
    pub stv_seats: u32,
    /// Kemeny-Young enumerates all the permutations of the candidates, n! of them. They are kept
    /// in memory with their scores: about 3 MB for 8 candidates, 300 MB for 10 and 4 GB for 11.
    /// At most 256 candidates are accepted whatever the setting.
    pub kemeny_young_max_candidates: usize,
    pub max_candidates: Option<usize>,
    pub max_votes: Option<usize>,
    pub tiebreak_mode: TieBreakMode,
    pub constraints: Vec<VoteConstraint>,
}

impl ElectionConfig {
    pub const DEFAULT_CONFIG: ElectionConfig = ElectionConfig {
        implicit_ranking: ImplicitRanking::ImplicitLast,
        vote_weight: false,
        stv_seats: 2,
        kemeny_young_max_candidates: 8,
        max_candidates: None,
        max_votes: None,
        tiebreak_mode: TieBreakMode::UseCandidateOrder,
        constraints: Vec::new(),
    };
}

impl Default for ElectionConfig {
    fn default() -> Self {
        ElectionConfig::DEFAULT_CONFIG
    }
}
