/*!
Condorcet-family tabulation.

All the methods read one shared pairwise tally built from the ballots of an
[`Election`]. Results are cached per method until the ballots change.

```
use condorcet_voting::{Election, ElectionConfig};
# use condorcet_voting::VotingErrors;

let mut election = Election::new(&ElectionConfig::DEFAULT_CONFIG)?
    .candidates(&["Memphis", "Nashville", "Knoxville", "Chattanooga"])?;

election.add_vote(&[&["Memphis"], &["Nashville"], &["Chattanooga"]], 42)?;
election.add_vote(&[&["Nashville"], &["Chattanooga"], &["Knoxville"]], 26)?;
election.add_vote(&[&["Chattanooga"], &["Knoxville"], &["Nashville"]], 15)?;
election.add_vote(&[&["Knoxville"], &["Chattanooga"], &["Nashville"]], 17)?;

let result = election.result("Copeland")?;
let nashville = election.candidate_id("Nashville");
assert_eq!(result.winner(), nashville.as_ref().map(std::slice::from_ref));
# Ok::<(), VotingErrors>(())
```
*/
mod builder;
mod config;
mod method;
mod methods;
mod pairwise;
mod ranking;
mod registry;
mod tiebreak;
mod vote;

pub use crate::builder::Election;
pub use crate::config::*;
pub use crate::method::{Memo, MethodKind, MinimaxVariant, PathMetric};
pub use crate::methods::kemeny_young::KemenyYoungStats;
pub use crate::methods::minimax::MinimaxScores;
pub use crate::methods::ranked_pairs::{Affirmation, RankedPairsStats};
pub use crate::methods::schulze::SchulzeStats;
pub use crate::methods::stv::{StvRound, StvStats};
pub use crate::pairwise::{PairwiseComparison, PairwiseMatrix, PairwiseRow, MAX_TOTAL_WEIGHT};
pub use crate::registry::MethodRegistry;
pub use crate::vote::{RankingSnapshot, Vote, VoteFilter};
