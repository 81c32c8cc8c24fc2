use serde::{Deserialize, Serialize};

/// Why an operation skipped its full path. Codes are stable for analyzers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NoOpReason {
    /// The crossover probability gate declined.
    Probability,
    /// Semantic guidance was requested without an evaluator session.
    NoSemantics,
    /// No donor branch fits the cut point.
    NoAllowedBranch,
    /// No statement encloses the cut point.
    NoStatement,
    /// Semantic selection settled on the empty branch.
    NoSelectedBranch,
    /// The tree has no internal node below the root to mutate.
    NoMutationPoint,
    /// No replacement was kept within the retry budget.
    NoAllowedSymbol,
}

impl NoOpReason {
    pub fn code(self) -> i32 {
        match self {
            NoOpReason::Probability => 3,
            NoOpReason::NoSemantics => 4,
            NoOpReason::NoAllowedBranch => 5,
            NoOpReason::NoStatement => 6,
            NoOpReason::NoSelectedBranch => 7,
            NoOpReason::NoMutationPoint => 8,
            NoOpReason::NoAllowedSymbol => 9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SelectionMode {
    Random,
    Semantic,
    RandomNoDifference,
    RandomAfterFailures,
    RandomNoStatement,
}

/// Whether the grafted branch changed the observed behaviour of its statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Equivalence {
    Equivalent,
    Different,
}

impl Equivalence {
    pub fn code(self) -> i32 {
        match self {
            Equivalence::Equivalent => 1,
            Equivalence::Different => 2,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrossoverOutcome {
    pub performed: bool,
    pub cut_point_symbol: Option<String>,
    pub removed_branch: Option<String>,
    pub added_branch: Option<String>,
    pub allowed_branches: usize,
    pub sampled_branches: usize,
    pub no_change_detected: usize,
    pub type_selected: Option<String>,
    pub selection: Option<SelectionMode>,
    pub equivalence: Option<Equivalence>,
    pub reason: Option<NoOpReason>,
}

impl CrossoverOutcome {
    pub(crate) fn skipped(reason: NoOpReason) -> Self {
        Self {
            reason: Some(reason),
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MutationKind {
    Semantic,
    Random,
    None,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MutationOutcome {
    pub kind: MutationKind,
    pub cut_point_symbol: Option<String>,
    pub removed_branch: Option<String>,
    pub added_branch: Option<String>,
    pub attempts: usize,
    pub semantic_tries: usize,
    pub reason: Option<NoOpReason>,
}

impl MutationOutcome {
    pub(crate) fn unchanged(attempts: usize, semantic_tries: usize, reason: NoOpReason) -> Self {
        Self {
            kind: MutationKind::None,
            cut_point_symbol: None,
            removed_branch: None,
            added_branch: None,
            attempts,
            semantic_tries,
            reason: Some(reason),
        }
    }

    pub fn changed(&self) -> bool {
        self.kind != MutationKind::None
    }
}
