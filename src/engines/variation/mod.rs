pub mod breeder;
pub mod crossover;
pub mod cut_points;
pub mod graft;
pub mod mutation;
pub mod outcome;
pub mod ptc2;
pub mod sampling;

pub use breeder::{Breeder, Offspring};
pub use crossover::CrossoverEngine;
pub use cut_points::{enumerate_cut_points, select_branch, select_cut_point, CutPoint, CutPointSet};
pub use graft::Graft;
pub use mutation::MutationEngine;
pub use outcome::{CrossoverOutcome, Equivalence, MutationKind, MutationOutcome, NoOpReason, SelectionMode};
pub use ptc2::Ptc2;
