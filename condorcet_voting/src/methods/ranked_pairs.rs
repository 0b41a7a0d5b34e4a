use log::{debug, info};

use crate::config::{CandidateId, MethodStats};
use crate::method::{MethodContext, Outcome, PathMetric};
use crate::pairwise::PairwiseMatrix;
use crate::tiebreak;

/// A pairwise victory, as considered for locking.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct Affirmation {
    pub winner: CandidateId,
    pub loser: CandidateId,
    pub strength: i64,
    /// The weight of the ballots preferring the loser.
    pub minority: u64,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RankedPairsStats {
    /// All the affirmations, in the order they were considered.
    pub affirmations: Vec<Affirmation>,
    /// The affirmations that were locked in.
    pub locked: Vec<Affirmation>,
}

// Positions in the matrix, before conversion to the public type.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
struct Edge {
    winner: usize,
    loser: usize,
    strength: i64,
    minority: u64,
}

fn affirmations(m: &PairwiseMatrix, metric: PathMetric, priority: &[usize]) -> Vec<Edge> {
    let mut res: Vec<Edge> = Vec::new();
    for i in 0..m.candidate_count() {
        for j in m.opponents(i) {
            if m.win(i, j) > m.lose(i, j) {
                res.push(Edge {
                    winner: i,
                    loser: j,
                    strength: metric.edge(m, i, j),
                    minority: m.lose(i, j),
                });
            }
        }
    }
    // The sort is stable: the generation order decides last.
    res.sort_by(|a, b| {
        b.strength
            .cmp(&a.strength)
            .then(a.minority.cmp(&b.minority))
            .then(priority[a.winner].cmp(&priority[b.winner]))
            .then(priority[a.loser].cmp(&priority[b.loser]))
    });
    res
}

fn reaches(graph: &[Vec<usize>], from: usize, to: usize) -> bool {
    let mut seen = vec![false; graph.len()];
    let mut stack = vec![from];
    while let Some(x) = stack.pop() {
        if x == to {
            return true;
        }
        if seen[x] {
            continue;
        }
        seen[x] = true;
        stack.extend(graph[x].iter().cloned());
    }
    false
}

/// Layers of the locked graph: each layer holds the candidates that no remaining candidate beats.
fn layers(graph: &[Vec<usize>]) -> Vec<Vec<usize>> {
    let n = graph.len();
    let mut remaining = vec![true; n];
    let mut res: Vec<Vec<usize>> = Vec::new();
    while remaining.iter().any(|r| *r) {
        let mut beaten = vec![false; n];
        for from in (0..n).filter(|p| remaining[*p]) {
            for &to in graph[from].iter() {
                beaten[to] = true;
            }
        }
        let layer: Vec<usize> = (0..n).filter(|p| remaining[*p] && !beaten[*p]).collect();
        // The graph is acyclic, so a layer is never empty.
        if layer.is_empty() {
            break;
        }
        for p in layer.iter() {
            remaining[*p] = false;
        }
        res.push(layer);
    }
    res
}

pub(crate) fn compute(ctx: &MethodContext, metric: PathMetric) -> Outcome {
    let m = ctx.pairwise;
    let n = m.candidate_count();
    let priority = tiebreak::priorities(ctx.candidates, ctx.config.tiebreak_mode, 0);
    let edges = affirmations(m, metric, &priority);
    info!(
        "ranked_pairs: {:?}: {} affirmations for {} candidates",
        metric,
        edges.len(),
        n
    );
    let mut graph: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut locked: Vec<Edge> = Vec::new();
    for e in edges.iter() {
        if reaches(&graph, e.loser, e.winner) {
            debug!("ranked_pairs: skipping {:?}, it would close a cycle", e);
            continue;
        }
        debug!("ranked_pairs: locking {:?}", e);
        graph[e.winner].push(e.loser);
        locked.push(*e);
    }
    let ranking = layers(&graph);
    let public = |e: &Edge| Affirmation {
        winner: m.id(e.winner),
        loser: m.id(e.loser),
        strength: e.strength,
        minority: e.minority,
    };
    let stats = RankedPairsStats {
        affirmations: edges.iter().map(public).collect(),
        locked: locked.iter().map(public).collect(),
    };
    Outcome::new(ranking, MethodStats::RankedPairs(stats))
}
