use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};

use snafu::ensure;

use crate::config::*;

// Logical clock shared by all the ballots. Every mutation of a ballot takes a fresh value.
static CLOCK: AtomicU64 = AtomicU64::new(1);

fn next_timestamp() -> u64 {
    CLOCK.fetch_add(1, Ordering::Relaxed)
}

/// The ballots of an election, in registration order.
pub(crate) type VoteSet = BTreeMap<VoteKey, Vote>;

#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct RankingSnapshot {
    pub ranking: Ranking,
    pub timestamp: u64,
}

/// A ballot: an ordered partition of some of the candidates, with a weight and tags.
///
/// The history of rankings is kept. The last entry is the current ranking.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct Vote {
    // Guaranteed to never be empty at construction.
    history: Vec<RankingSnapshot>,
    // Guaranteed to never be zero.
    weight: u64,
    tags: BTreeSet<String>,
}

impl Vote {
    /// Creates a ballot with a weight of 1.
    ///
    /// Every rank must contain at least one candidate and a candidate may only appear once.
    pub fn new(ranking: Ranking) -> Result<Vote, VotingErrors> {
        check_ranking(&ranking)?;
        Ok(Vote {
            history: vec![RankingSnapshot {
                ranking,
                timestamp: next_timestamp(),
            }],
            weight: 1,
            tags: BTreeSet::new(),
        })
    }

    pub fn with_weight(mut self, weight: u64) -> Result<Vote, VotingErrors> {
        self.set_weight(weight)?;
        Ok(self)
    }

    pub fn with_tags(mut self, tags: &[&str]) -> Vote {
        self.add_tags(tags);
        self
    }

    pub fn ranking(&self) -> &Ranking {
        &self.current().ranking
    }

    pub fn history(&self) -> &[RankingSnapshot] {
        &self.history
    }

    pub fn created_at(&self) -> u64 {
        self.history[0].timestamp
    }

    pub fn timestamp(&self) -> u64 {
        self.current().timestamp
    }

    /// The weight as recorded on the ballot.
    pub fn weight(&self) -> u64 {
        self.weight
    }

    /// The weight that counts in an election. Without vote weighting, every ballot counts for 1.
    pub fn effective_weight(&self, config: &ElectionConfig) -> u64 {
        if config.vote_weight {
            self.weight
        } else {
            1
        }
    }

    pub fn tags(&self) -> &BTreeSet<String> {
        &self.tags
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.contains(tag)
    }

    pub fn candidates(&self) -> impl Iterator<Item = CandidateId> + '_ {
        self.ranking().iter().flatten().cloned()
    }

    pub fn count_ranked_candidates(&self) -> usize {
        self.ranking().iter().map(|g| g.len()).sum()
    }

    /// True if the ballot follows all the constraints of the election.
    pub fn is_valid(&self, config: &ElectionConfig) -> bool {
        config.constraints.iter().all(|c| c.allows(self))
    }

    /// A fingerprint of the current ranking, weight and tags.
    pub fn hash_code(&self) -> String {
        let ranks: Vec<String> = self
            .ranking()
            .iter()
            .map(|g| {
                let mut ids: Vec<u32> = g.iter().map(|c| c.0).collect();
                ids.sort_unstable();
                ids.iter()
                    .map(|i| i.to_string())
                    .collect::<Vec<_>>()
                    .join("=")
            })
            .collect();
        let tags: Vec<&str> = self.tags.iter().map(|t| t.as_str()).collect();
        sha256::digest(format!(
            "{}^{}||{}",
            ranks.join(">"),
            self.weight,
            tags.join(",")
        ))
    }

    pub(crate) fn set_ranking(&mut self, ranking: Ranking) -> Result<(), VotingErrors> {
        check_ranking(&ranking)?;
        self.history.push(RankingSnapshot {
            ranking,
            timestamp: next_timestamp(),
        });
        Ok(())
    }

    pub(crate) fn set_weight(&mut self, weight: u64) -> Result<(), VotingErrors> {
        ensure!(
            weight >= 1,
            InputInconsistencySnafu {
                reason: format!("vote weight must be at least 1, got {}", weight),
            }
        );
        self.weight = weight;
        Ok(())
    }

    /// Adds the new tags. Returns how many were not already present.
    pub(crate) fn add_tags(&mut self, tags: &[&str]) -> usize {
        let mut added = 0;
        for t in tags {
            let t = t.trim();
            if !t.is_empty() && self.tags.insert(t.to_string()) {
                added += 1;
            }
        }
        added
    }

    /// Returns the tags that were actually removed.
    pub(crate) fn remove_tags(&mut self, tags: &[&str]) -> Vec<String> {
        let mut removed = Vec::new();
        for t in tags {
            if let Some(t) = self.tags.take(t.trim()) {
                removed.push(t);
            }
        }
        removed
    }

    pub(crate) fn remove_all_tags(&mut self) -> Vec<String> {
        std::mem::take(&mut self.tags).into_iter().collect()
    }

    /// Drops a candidate from the current ranking, as a new entry of the history. Ranks left
    /// empty disappear.
    pub(crate) fn remove_candidate(&mut self, cid: CandidateId) -> Result<(), VotingErrors> {
        ensure!(
            self.candidates().any(|c| c == cid),
            InputInconsistencySnafu {
                reason: format!("candidate {} is not in the ballot", cid),
            }
        );
        let ranking: Ranking = self
            .ranking()
            .iter()
            .map(|g| g.iter().cloned().filter(|c| *c != cid).collect::<Vec<_>>())
            .filter(|g| !g.is_empty())
            .collect();
        self.set_ranking(ranking)
    }

    fn current(&self) -> &RankingSnapshot {
        // The history is never empty.
        &self.history[self.history.len() - 1]
    }
}

fn check_ranking(ranking: &Ranking) -> Result<(), VotingErrors> {
    ensure!(
        !ranking.is_empty(),
        InputInconsistencySnafu {
            reason: "a ballot must rank at least one candidate",
        }
    );
    let mut seen: HashSet<CandidateId> = HashSet::new();
    for (idx, group) in ranking.iter().enumerate() {
        ensure!(
            !group.is_empty(),
            InputInconsistencySnafu {
                reason: format!("rank {} of the ballot is empty", idx + 1),
            }
        );
        for cid in group.iter() {
            ensure!(
                seen.insert(*cid),
                InputInconsistencySnafu {
                    reason: format!("candidate {} appears more than once in the ballot", cid),
                }
            );
        }
    }
    Ok(())
}

impl VoteConstraint {
    pub fn allows(&self, vote: &Vote) -> bool {
        match self {
            VoteConstraint::NoTie => vote.ranking().iter().all(|g| g.len() == 1),
        }
    }
}

/// Selects ballots by tags.
///
/// With `with = true`, a ballot matches if it carries at least one of the tags. With
/// `with = false`, it matches if it carries none of them.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct VoteFilter {
    pub tags: Vec<String>,
    pub with: bool,
}

impl VoteFilter {
    pub fn with_tags(tags: &[&str]) -> VoteFilter {
        VoteFilter {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            with: true,
        }
    }

    pub fn without_tags(tags: &[&str]) -> VoteFilter {
        VoteFilter {
            tags: tags.iter().map(|t| t.to_string()).collect(),
            with: false,
        }
    }

    pub fn matches(&self, vote: &Vote) -> bool {
        let any = self.tags.iter().any(|t| vote.has_tag(t));
        any == self.with
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn c(i: u32) -> CandidateId {
        CandidateId(i)
    }

    #[test]
    fn rejects_duplicates_and_empty_ranks() {
        assert!(matches!(
            Vote::new(vec![vec![c(1)], vec![c(2), c(1)]]),
            Err(VotingErrors::InputInconsistency { .. })
        ));
        assert!(matches!(
            Vote::new(vec![vec![c(1)], vec![]]),
            Err(VotingErrors::InputInconsistency { .. })
        ));
        assert!(matches!(
            Vote::new(vec![]),
            Err(VotingErrors::InputInconsistency { .. })
        ));
    }

    #[test]
    fn weight_must_be_positive() {
        let v = Vote::new(vec![vec![c(1)]]).unwrap();
        assert!(v.clone().with_weight(0).is_err());
        assert_eq!(v.with_weight(3).unwrap().weight(), 3);
    }

    #[test]
    fn history_is_append_only() {
        let mut v = Vote::new(vec![vec![c(1)], vec![c(2)]]).unwrap();
        let first = v.timestamp();
        v.set_ranking(vec![vec![c(2)], vec![c(1)]]).unwrap();
        assert_eq!(v.history().len(), 2);
        assert!(v.timestamp() > first);
        assert_eq!(v.created_at(), first);
        assert_eq!(v.ranking(), &vec![vec![c(2)], vec![c(1)]]);
        // A rejected update keeps the current state.
        assert!(v.set_ranking(vec![vec![c(2), c(2)]]).is_err());
        assert_eq!(v.history().len(), 2);
    }

    #[test]
    fn hash_code_ignores_order_inside_a_rank() {
        let a = Vote::new(vec![vec![c(1), c(2)], vec![c(3)]]).unwrap();
        let b = Vote::new(vec![vec![c(2), c(1)], vec![c(3)]]).unwrap();
        let d = Vote::new(vec![vec![c(3)], vec![c(1), c(2)]]).unwrap();
        assert_eq!(a.hash_code(), b.hash_code());
        assert_ne!(a.hash_code(), d.hash_code());
        assert_ne!(a.hash_code(), a.clone().with_tags(&["x"]).hash_code());
    }

    #[test]
    fn no_tie_constraint() {
        let config = ElectionConfig {
            constraints: vec![VoteConstraint::NoTie],
            ..ElectionConfig::DEFAULT_CONFIG
        };
        let strict = Vote::new(vec![vec![c(1)], vec![c(2)]]).unwrap();
        let tied = Vote::new(vec![vec![c(1), c(2)], vec![c(3)]]).unwrap();
        assert!(strict.is_valid(&config));
        assert!(!tied.is_valid(&config));
        assert!(tied.is_valid(&ElectionConfig::DEFAULT_CONFIG));
    }

    #[test]
    fn tags_can_change() {
        let mut v = Vote::new(vec![vec![c(1)]]).unwrap().with_tags(&["north"]);
        let before = v.hash_code();
        assert_eq!(v.add_tags(&["north", "late", ""]), 1);
        assert_ne!(v.hash_code(), before);
        assert_eq!(v.remove_tags(&["late", "south"]), vec!["late".to_string()]);
        assert_eq!(v.hash_code(), before);
        assert_eq!(v.remove_all_tags(), vec!["north".to_string()]);
        assert!(v.tags().is_empty());
    }

    #[test]
    fn removing_a_candidate_keeps_the_history() {
        let mut v = Vote::new(vec![vec![c(1)], vec![c(2), c(3)], vec![c(4)]]).unwrap();
        v.remove_candidate(c(2)).unwrap();
        assert_eq!(v.ranking(), &vec![vec![c(1)], vec![c(3)], vec![c(4)]]);
        v.remove_candidate(c(4)).unwrap();
        assert_eq!(v.ranking(), &vec![vec![c(1)], vec![c(3)]]);
        assert_eq!(v.history().len(), 3);
        assert!(v.remove_candidate(c(2)).is_err());
        // The last candidate cannot go: a ballot never becomes empty.
        v.remove_candidate(c(3)).unwrap();
        assert!(v.remove_candidate(c(1)).is_err());
        assert_eq!(v.ranking(), &vec![vec![c(1)]]);
    }

    #[test]
    fn filter_by_tags() {
        let v = Vote::new(vec![vec![c(1)]]).unwrap().with_tags(&["north", " "]);
        assert_eq!(v.tags().len(), 1);
        assert!(VoteFilter::with_tags(&["north", "south"]).matches(&v));
        assert!(!VoteFilter::with_tags(&["south"]).matches(&v));
        assert!(VoteFilter::without_tags(&["south"]).matches(&v));
        assert!(!VoteFilter::without_tags(&["north"]).matches(&v));
    }
}
