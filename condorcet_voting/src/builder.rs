use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use log::{debug, info};
use snafu::{ensure, OptionExt};

use crate::config::*;
use crate::method::{Memo, Method, MethodContext, MethodKind};
use crate::methods::condorcet_basic;
use crate::pairwise::{self, PairwiseMatrix, PairwiseRow};
use crate::registry::MethodRegistry;
use crate::vote::{Vote, VoteFilter, VoteSet};

/// An election: candidates, ballots and the results of the methods computed on them.
///
/// Candidates are registered first. The first ballot closes the registration of candidates.
/// Every change to the ballots invalidates the pairwise tally and all the results computed so far.
///
/// ```
/// use condorcet_voting::{Election, ElectionConfig, ElectionState};
/// # use condorcet_voting::VotingErrors;
///
/// let mut election = Election::new(&ElectionConfig::DEFAULT_CONFIG)?
///     .candidates(&["Anna", "Bob", "Clara"])?;
///
/// election.add_vote_simple(&["Anna", "Clara"])?;
/// election.add_vote(&[&["Bob", "Clara"], &["Anna"]], 2)?;
/// assert_eq!(election.state(), ElectionState::AcceptingVotes);
///
/// let result = election.result("Schulze")?;
/// assert_eq!(election.ranking_names(&result)[0], vec!["Clara".to_string()]);
/// # Ok::<(), VotingErrors>(())
/// ```
pub struct Election {
    config: ElectionConfig,
    registry: Arc<MethodRegistry>,
    state: ElectionState,
    candidates: Vec<Candidate>,
    next_candidate_id: u32,
    votes: VoteSet,
    next_vote_key: u64,
    // Bumped by every mutation. The caches compare it on read.
    generation: u64,
    pairwise: Memo<Arc<PairwiseMatrix>>,
    methods: HashMap<MethodKind, Method>,
}

impl Election {
    /// An empty election using the process-wide registry of methods.
    pub fn new(config: &ElectionConfig) -> Result<Election, VotingErrors> {
        Election::with_registry(config, MethodRegistry::global())
    }

    pub fn with_registry(
        config: &ElectionConfig,
        registry: Arc<MethodRegistry>,
    ) -> Result<Election, VotingErrors> {
        ensure!(
            config.stv_seats >= 1,
            InputInconsistencySnafu {
                reason: "the number of STV seats must be at least 1",
            }
        );
        ensure!(
            config.kemeny_young_max_candidates >= 1,
            InputInconsistencySnafu {
                reason: "the Kemeny-Young candidate ceiling must be at least 1",
            }
        );
        Ok(Election {
            config: config.clone(),
            registry,
            state: ElectionState::AcceptingCandidates,
            candidates: Vec::new(),
            next_candidate_id: 1,
            votes: VoteSet::new(),
            next_vote_key: 1,
            generation: 0,
            pairwise: Memo::new(),
            methods: HashMap::new(),
        })
    }

    /// Registers all the candidates, in order.
    pub fn candidates(mut self, names: &[&str]) -> Result<Election, VotingErrors> {
        for name in names.iter() {
            self.add_candidate(name)?;
        }
        Ok(self)
    }

    pub fn add_candidate(&mut self, name: &str) -> Result<CandidateId, VotingErrors> {
        self.check_state("add_candidate", &[ElectionState::AcceptingCandidates])?;
        let name = name.trim();
        ensure!(
            !name.is_empty(),
            InputInconsistencySnafu {
                reason: "a candidate name cannot be empty",
            }
        );
        ensure!(
            self.candidate_id(name).is_none(),
            InputInconsistencySnafu {
                reason: format!("candidate '{}' is already registered", name),
            }
        );
        if let Some(max) = self.config.max_candidates {
            ensure!(
                self.candidates.len() < max,
                CapacityExceededSnafu {
                    what: "number of candidates",
                    count: self.candidates.len() + 1,
                    min: 0_usize,
                    max,
                }
            );
        }
        let id = CandidateId(self.next_candidate_id);
        self.next_candidate_id += 1;
        info!("add_candidate: {}: {}", id, name);
        self.candidates.push(Candidate {
            id,
            name: name.to_string(),
        });
        self.invalidate();
        Ok(id)
    }

    /// Only allowed while candidates are still accepted. The identifier is not reused.
    pub fn remove_candidate(&mut self, name: &str) -> Result<CandidateId, VotingErrors> {
        self.check_state("remove_candidate", &[ElectionState::AcceptingCandidates])?;
        let id = self.candidate_id(name).context(InputInconsistencySnafu {
            reason: format!("candidate '{}' is not registered", name),
        })?;
        self.candidates.retain(|c| c.id != id);
        info!("remove_candidate: {}: {}", id, name);
        self.invalidate();
        Ok(id)
    }

    pub fn candidate_id(&self, name: &str) -> Option<CandidateId> {
        let name = name.trim();
        self.candidates.iter().find(|c| c.name == name).map(|c| c.id)
    }

    pub fn candidate_name(&self, id: CandidateId) -> Option<&str> {
        self.candidates
            .iter()
            .find(|c| c.id == id)
            .map(|c| c.name.as_str())
    }

    /// The candidates in registration order.
    pub fn candidate_list(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Adds a ballot. Nothing changes if the ballot is rejected.
    pub fn register_vote(&mut self, vote: Vote) -> Result<VoteKey, VotingErrors> {
        self.check_capacity(1)?;
        self.check_candidates(vote.ranking())?;
        Ok(self.insert_vote(vote))
    }

    /// Adds `count` identical ballots, each rank given by candidate names.
    ///
    /// Either all the ballots are added, or none.
    pub fn add_vote(&mut self, ranks: &[&[&str]], count: u32) -> Result<(), VotingErrors> {
        ensure!(
            count >= 1,
            InputInconsistencySnafu {
                reason: "the count of a ballot must be at least 1",
            }
        );
        self.check_capacity(count as usize)?;
        let mut ranking: Ranking = Vec::with_capacity(ranks.len());
        for group in ranks.iter() {
            let mut ids: Vec<CandidateId> = Vec::with_capacity(group.len());
            for name in group.iter() {
                ids.push(self.candidate_id(name).context(InputInconsistencySnafu {
                    reason: format!("unknown candidate '{}' in ballot", name),
                })?);
            }
            ranking.push(ids);
        }
        let vote = Vote::new(ranking)?;
        debug!("add_vote: {:?} x {}", vote.ranking(), count);
        for _ in 0..count {
            self.insert_vote(vote.clone());
        }
        Ok(())
    }

    /// Adds a ballot ranking each candidate strictly after the previous one.
    pub fn add_vote_simple(&mut self, names: &[&str]) -> Result<(), VotingErrors> {
        let ranks: Vec<&[&str]> = names.iter().map(std::slice::from_ref).collect();
        self.add_vote(&ranks, 1)
    }

    pub fn remove_vote(&mut self, key: VoteKey) -> Result<Vote, VotingErrors> {
        let vote = self.votes.remove(&key).context(InputInconsistencySnafu {
            reason: format!("no ballot with key {}", key.value()),
        })?;
        debug!("remove_vote: {}", key.value());
        self.invalidate();
        Ok(vote)
    }

    /// Removes the ballots selected by the tags. Returns the keys of the removed ballots.
    pub fn remove_votes_by_tags(&mut self, tags: &[&str], with: bool) -> Vec<VoteKey> {
        let filter = if with {
            VoteFilter::with_tags(tags)
        } else {
            VoteFilter::without_tags(tags)
        };
        let keys: Vec<VoteKey> = self.votes(Some(&filter)).map(|(k, _)| k).collect();
        for k in keys.iter() {
            self.votes.remove(k);
        }
        if !keys.is_empty() {
            info!("remove_votes_by_tags: removed {} ballots", keys.len());
            self.invalidate();
        }
        keys
    }

    /// Replaces the ranking of a ballot. The previous ranking stays in its history.
    pub fn update_vote_ranking(&mut self, key: VoteKey, ranking: Ranking) -> Result<(), VotingErrors> {
        self.check_candidates(&ranking)?;
        let vote = self.votes.get_mut(&key).context(InputInconsistencySnafu {
            reason: format!("no ballot with key {}", key.value()),
        })?;
        vote.set_ranking(ranking)?;
        self.invalidate();
        Ok(())
    }

    pub fn set_vote_weight(&mut self, key: VoteKey, weight: u64) -> Result<(), VotingErrors> {
        let vote = self.votes.get_mut(&key).context(InputInconsistencySnafu {
            reason: format!("no ballot with key {}", key.value()),
        })?;
        vote.set_weight(weight)?;
        self.invalidate();
        Ok(())
    }

    /// Adds tags to a ballot. Returns the number of tags it did not carry yet.
    pub fn add_vote_tags(&mut self, key: VoteKey, tags: &[&str]) -> Result<usize, VotingErrors> {
        let added = self.vote_mut(key)?.add_tags(tags);
        if added > 0 {
            self.invalidate();
        }
        Ok(added)
    }

    /// Removes tags from a ballot. Returns the tags actually removed.
    pub fn remove_vote_tags(
        &mut self,
        key: VoteKey,
        tags: &[&str],
    ) -> Result<Vec<String>, VotingErrors> {
        let removed = self.vote_mut(key)?.remove_tags(tags);
        if !removed.is_empty() {
            self.invalidate();
        }
        Ok(removed)
    }

    pub fn remove_all_vote_tags(&mut self, key: VoteKey) -> Result<Vec<String>, VotingErrors> {
        let removed = self.vote_mut(key)?.remove_all_tags();
        if !removed.is_empty() {
            self.invalidate();
        }
        Ok(removed)
    }

    /// Takes a candidate out of one ballot. The previous ranking stays in its history.
    ///
    /// The ballot must rank the candidate explicitly and must keep at least one candidate.
    pub fn remove_candidate_from_vote(&mut self, key: VoteKey, name: &str) -> Result<(), VotingErrors> {
        let cid = self.candidate_id(name).context(InputInconsistencySnafu {
            reason: format!("unknown candidate {}", name),
        })?;
        self.vote_mut(key)?.remove_candidate(cid)?;
        debug!("remove_candidate_from_vote: {} from {}", name, key.value());
        self.invalidate();
        Ok(())
    }

    fn vote_mut(&mut self, key: VoteKey) -> Result<&mut Vote, VotingErrors> {
        self.votes.get_mut(&key).context(InputInconsistencySnafu {
            reason: format!("no ballot with key {}", key.value()),
        })
    }

    pub fn vote(&self, key: VoteKey) -> Option<&Vote> {
        self.votes.get(&key)
    }

    /// The ballots in registration order, optionally restricted by a filter.
    ///
    /// The iterator is lazy and can be requested again at will.
    pub fn votes<'a>(
        &'a self,
        filter: Option<&'a VoteFilter>,
    ) -> impl Iterator<Item = (VoteKey, &'a Vote)> + 'a {
        self.votes
            .iter()
            .filter(move |(_, v)| filter.map_or(true, |f| f.matches(v)))
            .map(|(k, v)| (*k, v))
    }

    pub fn count_votes(&self, filter: Option<&VoteFilter>) -> usize {
        self.votes(filter).count()
    }

    /// The total weight of the ballots, each one counting for 1 if vote weighting is disabled.
    pub fn sum_votes_weight(&self, filter: Option<&VoteFilter>) -> u64 {
        self.votes(filter)
            .map(|(_, v)| v.effective_weight(&self.config))
            .fold(0, u64::saturating_add)
    }

    /// The number of ballots following every vote constraint of the configuration.
    pub fn count_valid_votes(&self, filter: Option<&VoteFilter>) -> usize {
        self.votes(filter)
            .filter(|(_, v)| v.is_valid(&self.config))
            .count()
    }

    pub fn count_invalid_votes(&self, filter: Option<&VoteFilter>) -> usize {
        self.count_votes(filter) - self.count_valid_votes(filter)
    }

    /// The weight the tally actually counts.
    pub fn sum_valid_votes_weight(&self, filter: Option<&VoteFilter>) -> u64 {
        self.votes(filter)
            .filter(|(_, v)| v.is_valid(&self.config))
            .map(|(_, v)| v.effective_weight(&self.config))
            .fold(0, u64::saturating_add)
    }

    /// A new election with the same candidates and configuration, restricted to the ballots
    /// matching the filter. Candidate identifiers and ballot keys are kept.
    pub fn filtered(&self, filter: &VoteFilter) -> Election {
        let votes: VoteSet = self
            .votes(Some(filter))
            .map(|(k, v)| (k, v.clone()))
            .collect();
        info!(
            "filtered: keeping {} of {} ballots",
            votes.len(),
            self.votes.len()
        );
        Election {
            config: self.config.clone(),
            registry: self.registry.clone(),
            state: match self.state {
                ElectionState::AcceptingCandidates => ElectionState::AcceptingCandidates,
                _ => ElectionState::AcceptingVotes,
            },
            candidates: self.candidates.clone(),
            next_candidate_id: self.next_candidate_id,
            votes,
            next_vote_key: self.next_vote_key,
            generation: 0,
            pairwise: Memo::new(),
            methods: HashMap::new(),
        }
    }

    /// The result of a method, by name or alias. Computed once until the ballots change.
    pub fn result(&mut self, method: &str) -> Result<Arc<VotingResult>, VotingErrors> {
        let kind = self.registry.lookup(method)?;
        self.result_for(kind)
    }

    /// The result of the default method of the registry.
    pub fn result_default(&mut self) -> Result<Arc<VotingResult>, VotingErrors> {
        let kind = self
            .registry
            .default_method()
            .context(UnknownMethodSnafu { name: "default" })?;
        self.result_for(kind)
    }

    pub fn result_for(&mut self, kind: MethodKind) -> Result<Arc<VotingResult>, VotingErrors> {
        self.check_state(
            "result",
            &[ElectionState::AcceptingVotes, ElectionState::ResultsComputed],
        )?;
        let generation = self.generation;
        let pairwise = self.pairwise()?;
        let method = match self.methods.entry(kind) {
            std::collections::hash_map::Entry::Occupied(e) => e.into_mut(),
            std::collections::hash_map::Entry::Vacant(e) => {
                e.insert(Method::new(kind, self.candidates.len(), &self.config)?)
            }
        };
        let ctx = MethodContext {
            pairwise: &pairwise,
            candidates: &self.candidates,
            votes: &self.votes,
            config: &self.config,
        };
        let res = method.result(generation, &ctx)?;
        self.state = ElectionState::ResultsComputed;
        Ok(res)
    }

    /// The statistics of a method. They come from the cached result.
    pub fn stats(&mut self, method: &str) -> Result<MethodStats, VotingErrors> {
        Ok(self.result(method)?.stats.clone())
    }

    /// The candidates at rank 1. Without a method, the Condorcet winner.
    pub fn winner(&mut self, method: Option<&str>) -> Result<Option<Vec<CandidateId>>, VotingErrors> {
        let res = match method {
            Some(name) => self.result(name)?,
            None => self.result_for(MethodKind::CondorcetBasic)?,
        };
        Ok(res.winner().map(|w| w.to_vec()))
    }

    /// The candidates at the last rank. Without a method, the Condorcet loser.
    pub fn loser(&mut self, method: Option<&str>) -> Result<Option<Vec<CandidateId>>, VotingErrors> {
        match method {
            Some(name) => Ok(self.result(name)?.loser().map(|l| l.to_vec())),
            None => {
                self.check_state(
                    "loser",
                    &[ElectionState::AcceptingVotes, ElectionState::ResultsComputed],
                )?;
                let m = self.pairwise()?;
                Ok(condorcet_basic::condorcet_loser(&m).map(|p| vec![m.id(p)]))
            }
        }
    }

    /// The pairwise tally of the current ballots, shared by all the methods.
    pub fn pairwise(&mut self) -> Result<Arc<PairwiseMatrix>, VotingErrors> {
        let generation = self.generation;
        let (candidates, votes, config) = (&self.candidates, &self.votes, &self.config);
        self.pairwise.get_or_try_insert_with(generation, || {
            Ok(Arc::new(pairwise::build(candidates, votes.values(), config)?))
        })
    }

    pub fn pairwise_export(&mut self) -> Result<BTreeMap<String, PairwiseRow>, VotingErrors> {
        let m = self.pairwise()?;
        Ok(m.export(&self.candidates))
    }

    /// The ranking of a result, with the names of the candidates.
    pub fn ranking_names(&self, result: &VotingResult) -> Vec<Vec<String>> {
        result
            .ranking
            .iter()
            .map(|g| {
                g.iter()
                    .map(|cid| {
                        self.candidate_name(*cid)
                            .map(|n| n.to_string())
                            .unwrap_or_else(|| cid.to_string())
                    })
                    .collect()
            })
            .collect()
    }

    pub fn state(&self) -> ElectionState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn config(&self) -> &ElectionConfig {
        &self.config
    }

    pub fn registry(&self) -> &MethodRegistry {
        &self.registry
    }

    fn check_state(&self, operation: &str, allowed: &[ElectionState]) -> Result<(), VotingErrors> {
        ensure!(
            allowed.contains(&self.state),
            StateViolationSnafu {
                operation,
                state: self.state,
            }
        );
        Ok(())
    }

    fn check_capacity(&self, count: usize) -> Result<(), VotingErrors> {
        if let Some(max) = self.config.max_votes {
            ensure!(
                self.votes.len() + count <= max,
                CapacityExceededSnafu {
                    what: "number of ballots",
                    count: self.votes.len() + count,
                    min: 0_usize,
                    max,
                }
            );
        }
        Ok(())
    }

    fn check_candidates(&self, ranking: &Ranking) -> Result<(), VotingErrors> {
        let known: HashSet<CandidateId> = self.candidates.iter().map(|c| c.id).collect();
        for cid in ranking.iter().flatten() {
            ensure!(
                known.contains(cid),
                InputInconsistencySnafu {
                    reason: format!("ballot references unknown candidate {}", cid),
                }
            );
        }
        Ok(())
    }

    fn insert_vote(&mut self, vote: Vote) -> VoteKey {
        let key = VoteKey(self.next_vote_key);
        self.next_vote_key += 1;
        self.votes.insert(key, vote);
        if self.state == ElectionState::AcceptingCandidates {
            info!(
                "insert_vote: closing the registration of {} candidates",
                self.candidates.len()
            );
        }
        self.invalidate();
        self.state = ElectionState::AcceptingVotes;
        key
    }

    fn invalidate(&mut self) {
        self.generation += 1;
        if self.state == ElectionState::ResultsComputed {
            self.state = ElectionState::AcceptingVotes;
        }
        if self.state == ElectionState::AcceptingCandidates {
            // The candidate list may have changed: the methods are rebuilt.
            self.methods.clear();
        }
        self.pairwise.clear();
    }
}
