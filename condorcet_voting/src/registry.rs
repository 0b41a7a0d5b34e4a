use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use log::debug;
use snafu::{ensure, OptionExt};

use crate::config::*;
use crate::method::{MethodKind, MinimaxVariant, PathMetric};

/// Maps method names and their aliases to the algorithms.
///
/// Lookups ignore the case of the names.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct MethodRegistry {
    // Lowercase alias -> method
    aliases: HashMap<String, MethodKind>,
    // Registration order
    methods: Vec<(MethodKind, Vec<String>)>,
    default: Option<MethodKind>,
}

static GLOBAL: OnceLock<Arc<MethodRegistry>> = OnceLock::new();

impl MethodRegistry {
    /// An empty registry.
    pub fn new() -> MethodRegistry {
        MethodRegistry {
            aliases: HashMap::new(),
            methods: Vec::new(),
            default: None,
        }
    }

    /// All the methods of the crate with their usual names. The default method is Schulze Winning.
    pub fn with_builtin_methods() -> MethodRegistry {
        let mut reg = MethodRegistry::new();
        let builtin: [(MethodKind, &[&str]); 11] = [
            (MethodKind::CondorcetBasic, &["CondorcetBasic"]),
            (MethodKind::Copeland, &["Copeland"]),
            (
                MethodKind::KemenyYoung,
                &[
                    "Kemeny–Young",
                    "Kemeny-Young",
                    "Kemeny Young",
                    "KemenyYoung",
                    "Kemeny rule",
                    "VoteFair popularity ranking",
                    "Maximum Likelihood Method",
                    "Median Relation",
                ],
            ),
            (
                MethodKind::Minimax(MinimaxVariant::Winning),
                &[
                    "Minimax Winning",
                    "MinimaxWinning",
                    "Minimax",
                    "Minimax_Winning",
                    "Simpson",
                    "Simpson-Kramer",
                    "Simpson-Kramer Method",
                    "Simpson Method",
                ],
            ),
            (
                MethodKind::Minimax(MinimaxVariant::Margin),
                &["Minimax Margin", "MinimaxMargin", "Minimax_Margin"],
            ),
            (
                MethodKind::Minimax(MinimaxVariant::Opposition),
                &["Minimax Opposition", "MinimaxOpposition", "Minimax_Opposition"],
            ),
            (
                MethodKind::RankedPairs(PathMetric::Margin),
                &[
                    "Ranked Pairs Margin",
                    "Tideman Margin",
                    "RP Margin",
                    "Ranked Pairs",
                    "RankedPairs",
                    "Tideman method",
                ],
            ),
            (
                MethodKind::RankedPairs(PathMetric::Winning),
                &["Ranked Pairs Winning", "Tideman Winning", "RP Winning"],
            ),
            (
                MethodKind::Schulze(PathMetric::Winning),
                &["Schulze Winning", "Schulze", "SchulzeWinning", "Schulze_Winning"],
            ),
            (
                MethodKind::Schulze(PathMetric::Margin),
                &["Schulze Margin", "SchulzeMargin", "Schulze_Margin"],
            ),
            (
                MethodKind::Stv,
                &["STV", "Single Transferable Vote", "SingleTransferableVote"],
            ),
        ];
        // The built-in aliases are distinct.
        for (kind, names) in builtin.iter() {
            reg.insert(*kind, names);
        }
        reg.default = Some(MethodKind::Schulze(PathMetric::Winning));
        reg
    }

    /// The registry with all the built-in methods, shared by the whole process.
    pub fn global() -> Arc<MethodRegistry> {
        GLOBAL
            .get_or_init(|| Arc::new(MethodRegistry::with_builtin_methods()))
            .clone()
    }

    /// Registers a method under the given names. The first name is the main one.
    ///
    /// Fails without changing the registry if no name is given, or if a name is already taken by
    /// another method.
    pub fn register(&mut self, kind: MethodKind, names: &[&str]) -> Result<(), VotingErrors> {
        ensure!(
            !names.is_empty(),
            InputInconsistencySnafu {
                reason: format!("no name given for method {:?}", kind),
            }
        );
        for name in names.iter() {
            let key = name.trim().to_lowercase();
            ensure!(
                !key.is_empty(),
                InputInconsistencySnafu {
                    reason: format!("empty name given for method {:?}", kind),
                }
            );
            if let Some(other) = self.aliases.get(&key) {
                ensure!(
                    *other == kind,
                    InputInconsistencySnafu {
                        reason: format!("name '{}' is already used by {:?}", name, other),
                    }
                );
            }
        }
        self.insert(kind, names);
        Ok(())
    }

    fn insert(&mut self, kind: MethodKind, names: &[&str]) {
        debug!("insert: {:?} as {:?}", kind, names);
        for name in names.iter() {
            self.aliases.insert(name.trim().to_lowercase(), kind);
        }
        let names: Vec<String> = names.iter().map(|n| n.trim().to_string()).collect();
        match self.methods.iter_mut().find(|(k, _)| *k == kind) {
            Some((_, existing)) => {
                for n in names {
                    if !existing.contains(&n) {
                        existing.push(n);
                    }
                }
            }
            None => self.methods.push((kind, names)),
        }
    }

    /// Fails if the method is not registered.
    pub fn set_default(&mut self, kind: MethodKind) -> Result<(), VotingErrors> {
        ensure!(
            self.methods.iter().any(|(k, _)| *k == kind),
            UnknownMethodSnafu {
                name: kind.canonical_name(),
            }
        );
        self.default = Some(kind);
        Ok(())
    }

    pub fn lookup(&self, name: &str) -> Result<MethodKind, VotingErrors> {
        self.aliases
            .get(&name.trim().to_lowercase())
            .cloned()
            .context(UnknownMethodSnafu { name })
    }

    pub fn default_method(&self) -> Option<MethodKind> {
        self.default
    }

    /// The registered methods with all their names, in registration order.
    pub fn methods(&self) -> &[(MethodKind, Vec<String>)] {
        &self.methods
    }
}

impl Default for MethodRegistry {
    fn default() -> Self {
        MethodRegistry::with_builtin_methods()
    }
}
