pub(crate) mod condorcet_basic;
pub(crate) mod copeland;
pub(crate) mod kemeny_young;
pub(crate) mod minimax;
pub(crate) mod ranked_pairs;
pub(crate) mod schulze;
pub(crate) mod stv;

#[cfg(test)]
pub(crate) mod testing {
    use crate::config::*;
    use crate::method::MethodContext;
    use crate::pairwise::tests::{ballot, candidates};
    use crate::pairwise::{build, PairwiseMatrix};
    use crate::vote::VoteSet;

    /// A small election fixture: candidates named after their position, ballots weighted.
    pub(crate) struct Fixture {
        pub candidates: Vec<Candidate>,
        pub votes: VoteSet,
        pub config: ElectionConfig,
        pub pairwise: PairwiseMatrix,
    }

    impl Fixture {
        /// Ballots are written with candidate names separated by '>' ('=' for ties).
        pub(crate) fn new(names: &[&str], ballots: &[(&str, u64)], config: ElectionConfig) -> Fixture {
            let candidates = candidates(names);
            let mut votes = VoteSet::new();
            for (idx, (text, weight)) in ballots.iter().enumerate() {
                let groups: Vec<Vec<u32>> = text
                    .split('>')
                    .map(|g| {
                        g.split('=')
                            .map(|n| {
                                let pos = names.iter().position(|x| *x == n.trim()).unwrap();
                                (pos + 1) as u32
                            })
                            .collect()
                    })
                    .collect();
                let group_refs: Vec<&[u32]> = groups.iter().map(|g| g.as_slice()).collect();
                votes.insert(VoteKey(idx as u64), ballot(&group_refs, *weight));
            }
            let config = ElectionConfig {
                vote_weight: true,
                ..config
            };
            let pairwise = build(&candidates, votes.values(), &config).unwrap();
            Fixture {
                candidates,
                votes,
                config,
                pairwise,
            }
        }

        pub(crate) fn ctx(&self) -> MethodContext<'_> {
            MethodContext {
                pairwise: &self.pairwise,
                candidates: &self.candidates,
                votes: &self.votes,
                config: &self.config,
            }
        }

        /// Converts a ranking of positions to names.
        pub(crate) fn names(&self, ranking: &[Vec<usize>]) -> Vec<Vec<String>> {
            ranking
                .iter()
                .map(|g| g.iter().map(|p| self.candidates[*p].name.clone()).collect())
                .collect()
        }
    }

    pub(crate) fn tennessee() -> Fixture {
        Fixture::new(
            &["Memphis", "Nashville", "Knoxville", "Chattanooga"],
            &[
                ("Memphis>Nashville>Chattanooga", 42),
                ("Nashville>Chattanooga>Knoxville", 26),
                ("Chattanooga>Knoxville>Nashville", 15),
                ("Knoxville>Chattanooga>Nashville", 17),
            ],
            ElectionConfig::DEFAULT_CONFIG,
        )
    }

    pub(crate) fn five_without_winner() -> Fixture {
        Fixture::new(
            &["A", "B", "C", "D", "E"],
            &[
                ("A>E>C>D", 31),
                ("B>A>E", 30),
                ("C>D>B", 29),
                ("D>A>E", 10),
            ],
            ElectionConfig::DEFAULT_CONFIG,
        )
    }

    // http://www.cs.wustl.edu/~legrand/rbvote/desc.html
    pub(crate) fn rbvote() -> Fixture {
        Fixture::new(
            &["Abby", "Brad", "Cora", "Dave", "Erin"],
            &[
                ("Abby>Cora>Erin>Dave>Brad", 98),
                ("Brad>Abby>Erin>Cora>Dave", 64),
                ("Brad>Abby>Erin>Dave>Cora", 12),
                ("Brad>Erin>Abby>Cora>Dave", 98),
                ("Brad>Erin>Abby>Dave>Cora", 13),
                ("Brad>Erin>Dave>Abby>Cora", 125),
                ("Cora>Abby>Erin>Dave>Brad", 124),
                ("Cora>Erin>Abby>Dave>Brad", 76),
                ("Dave>Abby>Brad>Erin>Cora", 21),
                ("Dave>Brad>Abby>Erin>Cora", 30),
                ("Dave>Brad>Erin>Cora>Abby", 98),
                ("Dave>Cora>Abby>Brad>Erin", 139),
                ("Dave>Cora>Brad>Abby>Erin", 23),
            ],
            ElectionConfig::DEFAULT_CONFIG,
        )
    }

    // https://en.wikipedia.org/wiki/Schulze_method
    pub(crate) fn schulze_wikipedia() -> Fixture {
        Fixture::new(
            &["A", "B", "C", "D", "E"],
            &[
                ("A>C>B>E>D", 5),
                ("A>D>E>C>B", 5),
                ("B>E>D>A>C", 8),
                ("C>A>B>E>D", 3),
                ("C>A>E>B>D", 7),
                ("C>B>A>D>E", 2),
                ("D>C>E>B>A", 7),
                ("E>B>A>D>C", 8),
            ],
            ElectionConfig::DEFAULT_CONFIG,
        )
    }

    pub(crate) fn cycle() -> Fixture {
        Fixture::new(
            &["A", "B", "C"],
            &[("A>B>C", 1), ("B>C>A", 1), ("C>A>B", 1)],
            ElectionConfig::DEFAULT_CONFIG,
        )
    }

    pub(crate) fn names(groups: &[&[&str]]) -> Vec<Vec<String>> {
        groups
            .iter()
            .map(|g| g.iter().map(|n| n.to_string()).collect())
            .collect()
    }
}
