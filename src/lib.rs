/*!
Scenario runner for [`condorcet_voting`].

A scenario is a JSON file describing the candidates, the ballots, the rules and the methods to
tabulate. The summary of the tabulation (pairwise tally and the ranking of every method) can be
compared against a reference summary:

```no_run
use condorcet_check::run_election;

let summary = run_election(
    "tests/data/tennessee_capital/tennessee_capital_config.json",
    Some("tests/data/tennessee_capital/tennessee_capital_expected_summary.json"),
)
.unwrap();
println!("{}", summary["results"][0]["ranking"]);
```
*/
mod check;

pub use crate::check::config_reader;
pub use crate::check::{
    build_election, build_summary_js, run_election, test_wrapper, validate_rules, CheckError,
    CheckResult,
};
