use log::{debug, info, warn};

use condorcet_voting::*;
use snafu::{prelude::*, ErrorCompat, Snafu};

use std::fs;

use serde_json::json;
use serde_json::Map as JSMap;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::check::config_reader::*;

#[derive(Debug, Snafu)]
pub enum CheckError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing json"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Voting error: {source}"))]
    Voting { source: VotingErrors },
    #[snafu(display("Candidate {name} is used in a ballot but is not declared"))]
    MissingCandidate { name: String },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type CheckResult<T> = Result<T, CheckError>;

pub mod config_reader {
    use crate::check::*;
    use serde::{Deserialize, Serialize};

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct OutputSettings {
        #[serde(rename = "contestName")]
        pub contest_name: String,
        #[serde(rename = "contestDate")]
        pub contest_date: Option<String>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct ScenarioCandidate {
        pub name: String,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct ScenarioVote {
        /// Each rank lists the candidates tied at this rank.
        pub ranking: Vec<Vec<String>>,
        /// The number of identical ballots. Defaults to 1.
        pub count: Option<u32>,
        pub weight: Option<u64>,
        pub tags: Option<Vec<String>>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct ScenarioRules {
        #[serde(rename = "implicitRanking")]
        pub implicit_ranking: Option<String>,
        #[serde(rename = "voteWeight")]
        pub vote_weight: Option<bool>,
        #[serde(rename = "stvSeats")]
        pub stv_seats: Option<String>,
        #[serde(rename = "kemenyYoungMaxCandidates")]
        pub kemeny_young_max_candidates: Option<String>,
        #[serde(rename = "tiebreakMode")]
        pub tiebreak_mode: String,
        #[serde(rename = "randomSeed")]
        pub random_seed: Option<String>,
        /// Rules the ballots must follow to be counted, such as "noTie".
        pub constraints: Option<Vec<String>>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct ScenarioConfig {
        #[serde(rename = "outputSettings")]
        pub output_settings: OutputSettings,
        pub candidates: Vec<ScenarioCandidate>,
        pub votes: Vec<ScenarioVote>,
        pub rules: ScenarioRules,
        /// Names or aliases of the methods to tabulate.
        pub methods: Vec<String>,
    }

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct OutputConfig {
        pub contest: String,
        pub date: Option<String>,
        pub candidates: Vec<String>,
        pub ballots: usize,
        #[serde(rename = "totalWeight")]
        pub total_weight: u64,
        #[serde(rename = "validBallots")]
        pub valid_ballots: usize,
        #[serde(rename = "validWeight")]
        pub valid_weight: u64,
    }

    pub fn read_config(path: &str) -> CheckResult<ScenarioConfig> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
        let config: ScenarioConfig =
            serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        Ok(config)
    }

    pub fn read_summary(path: &str) -> CheckResult<JSValue> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
        debug!("read content: {:?}", contents);
        let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        Ok(js)
    }
}

fn parse_count(field: &str, value: &Option<String>, default: usize) -> CheckResult<usize> {
    match value.as_deref().map(|s| s.parse::<usize>()) {
        None => Ok(default),
        Some(Result::Ok(x)) if x > 0 => Ok(x),
        x => {
            whatever!("Failed to understand {} option: {:?}", field, x)
        }
    }
}

fn parse_constraints(names: &Option<Vec<String>>) -> CheckResult<Vec<VoteConstraint>> {
    let mut res = Vec::new();
    for name in names.iter().flatten() {
        match name.as_str() {
            "noTie" => res.push(VoteConstraint::NoTie),
            x => {
                whatever!("Cannot use vote constraint {:?}", x)
            }
        }
    }
    Ok(res)
}

pub fn validate_rules(rules: &ScenarioRules) -> CheckResult<ElectionConfig> {
    let defaults = ElectionConfig::DEFAULT_CONFIG;
    let res = ElectionConfig {
        implicit_ranking: match rules.implicit_ranking.as_deref() {
            None | Some("implicitLast") => ImplicitRanking::ImplicitLast,
            Some("excluded") => ImplicitRanking::Excluded,
            Some(x) => {
                whatever!("Cannot use implicit ranking policy {:?}", x)
            }
        },
        vote_weight: rules.vote_weight.unwrap_or(defaults.vote_weight),
        stv_seats: parse_count("stvSeats", &rules.stv_seats, defaults.stv_seats as usize)? as u32,
        kemeny_young_max_candidates: parse_count(
            "kemenyYoungMaxCandidates",
            &rules.kemeny_young_max_candidates,
            defaults.kemeny_young_max_candidates,
        )?,
        max_candidates: None,
        max_votes: None,
        constraints: parse_constraints(&rules.constraints)?,
        tiebreak_mode: match rules.tiebreak_mode.as_str() {
            "useCandidateOrder" => TieBreakMode::UseCandidateOrder,
            "random" => {
                let seed = match rules.random_seed.clone().map(|s| s.parse::<u32>()) {
                    Some(Result::Ok(x)) => x,
                    x => {
                        whatever!("Cannot use random tiebreak mode with seed {:?}", x)
                    }
                };
                TieBreakMode::Random(seed)
            }
            x => {
                whatever!("Cannot use tiebreak mode {:?} (currently not implemented)", x)
            }
        },
    };
    Ok(res)
}

/// Registers the candidates and the ballots of the scenario.
pub fn build_election(config: &ScenarioConfig) -> CheckResult<Election> {
    let rules = validate_rules(&config.rules)?;
    let names: Vec<&str> = config.candidates.iter().map(|c| c.name.as_str()).collect();
    let mut election = Election::new(&rules)
        .context(VotingSnafu {})?
        .candidates(&names)
        .context(VotingSnafu {})?;

    for v in config.votes.iter() {
        let mut ranking: Ranking = Vec::new();
        for group in v.ranking.iter() {
            let mut ids: Vec<CandidateId> = Vec::new();
            for name in group.iter() {
                let cid = election
                    .candidate_id(name)
                    .context(MissingCandidateSnafu { name })?;
                ids.push(cid);
            }
            ranking.push(ids);
        }
        let tags: Vec<&str> = v
            .tags
            .iter()
            .flatten()
            .map(|t| t.as_str())
            .collect();
        let vote = Vote::new(ranking)
            .context(VotingSnafu {})?
            .with_weight(v.weight.unwrap_or(1))
            .context(VotingSnafu {})?
            .with_tags(&tags);
        for _ in 0..v.count.unwrap_or(1) {
            election
                .register_vote(vote.clone())
                .context(VotingSnafu {})?;
        }
    }
    info!(
        "build_election: {} candidates, {} ballots ({} invalid)",
        election.candidate_list().len(),
        election.count_votes(None),
        election.count_invalid_votes(None)
    );
    Ok(election)
}

fn warning_to_json(w: &ResultWarning) -> JSValue {
    match w {
        ResultWarning::ComputationConflict {
            optimal_rankings,
            best_score,
        } => json!({"computationConflict": {
            "optimalRankings": optimal_rankings,
            "bestScore": best_score
        }}),
    }
}

fn pairwise_to_json(export: &std::collections::BTreeMap<String, PairwiseRow>) -> JSValue {
    let mut res: JSMap<String, JSValue> = JSMap::new();
    for (name, row) in export.iter() {
        res.insert(
            name.clone(),
            json!({"win": row.win, "null": row.null, "lose": row.lose}),
        );
    }
    JSValue::Object(res)
}

/// Tabulates every method of the scenario and assembles the summary.
pub fn build_summary_js(config: &ScenarioConfig, election: &mut Election) -> CheckResult<JSValue> {
    let c = OutputConfig {
        contest: config.output_settings.contest_name.clone(),
        date: config.output_settings.contest_date.clone(),
        candidates: config.candidates.iter().map(|c| c.name.clone()).collect(),
        ballots: election.count_votes(None),
        total_weight: election.sum_votes_weight(None),
        valid_ballots: election.count_valid_votes(None),
        valid_weight: election.sum_valid_votes_weight(None),
    };
    let pairwise = election.pairwise_export().context(VotingSnafu {})?;

    let mut results: Vec<JSValue> = Vec::new();
    for method in config.methods.iter() {
        let res = election.result(method).context(VotingSnafu {})?;
        let warnings: Vec<JSValue> = res.warnings.iter().map(warning_to_json).collect();
        if !warnings.is_empty() {
            warn!("{}: {:?}", res.method, res.warnings);
        }
        results.push(json!({
            "method": res.method,
            "ranking": election.ranking_names(&res),
            "warnings": warnings,
        }));
    }
    Ok(json!({
        "config": c,
        "pairwise": pairwise_to_json(&pairwise),
        "results": results }))
}

/// Runs the scenario and, if a reference summary is given, fails when the summaries differ.
pub fn run_election(config_path: &str, check_summary_path: Option<&str>) -> CheckResult<JSValue> {
    let config = read_config(config_path)?;
    info!("config: {:?}", config);

    let mut election = build_election(&config)?;
    let result_js = build_summary_js(&config, &mut election)?;

    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;
    debug!("stats:{}", pretty_js_stats);

    // The reference summary, if provided for comparison
    if let Some(summary_p) = check_summary_path {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(result_js)
}

fn run_election_test(test_name: &str, config_lpath: &str, summary_lpath: &str) {
    let _ = env_logger::builder().is_test(true).try_init();
    let test_dir = option_env!("CONDORCET_TEST_DIR")
        .unwrap_or(concat!(env!("CARGO_MANIFEST_DIR"), "/tests/data"));
    info!("Running test {}", test_name);
    let res = run_election(
        format!("{}/{}/{}", test_dir, test_name, config_lpath).as_str(),
        Some(format!("{}/{}/{}", test_dir, test_name, summary_lpath).as_str()),
    );
    if let Err(e) = res {
        warn!("Error occured {:?}", e);
        eprintln!("An error occured {}", e);
        if let Some(bt) = ErrorCompat::backtrace(&e) {
            eprintln!("trace: {}", bt);
        }
        panic!("test {} failed: {}", test_name, e);
    }
}

pub fn test_wrapper(test_name: &str) {
    run_election_test(
        test_name,
        format!("{}_config.json", test_name).as_str(),
        format!("{}_expected_summary.json", test_name).as_str(),
    )
}
