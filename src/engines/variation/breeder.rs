use super::crossover::CrossoverEngine;
use super::mutation::MutationEngine;
use super::outcome::{CrossoverOutcome, MutationOutcome};
use crate::engines::semantics::{Evaluator, EvaluatorPool};
use crate::error::Result;
use crate::tree::Tree;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rayon::prelude::*;
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct Offspring {
    pub tree: Tree,
    pub crossover: CrossoverOutcome,
    pub mutation: Option<MutationOutcome>,
}

/// Runs independent crossover (and optional mutation) invocations in parallel.
pub struct Breeder {
    crossover: CrossoverEngine,
    mutation: Option<MutationEngine>,
    pool: Option<Arc<EvaluatorPool>>,
}

impl Breeder {
    pub fn new(crossover: CrossoverEngine) -> Self {
        Self {
            crossover,
            mutation: None,
            pool: None,
        }
    }

    pub fn with_mutation(mut self, mutation: MutationEngine) -> Self {
        self.mutation = Some(mutation);
        self
    }

    pub fn with_pool(mut self, pool: Arc<EvaluatorPool>) -> Self {
        self.pool = Some(pool);
        self
    }

    /// One offspring per `(recipient, donor)` pair, in input order.
    ///
    /// Pair `i` uses its own generator seeded with `seed + i`.
    pub fn breed(&self, pairs: &[(Tree, Tree)], seed: u64) -> Vec<Result<Offspring>> {
        pairs
            .par_iter()
            .enumerate()
            .map(|(i, (recipient, donor))| self.breed_one(recipient, donor, seed.wrapping_add(i as u64)))
            .collect()
    }

    fn breed_one(&self, recipient: &Tree, donor: &Tree, seed: u64) -> Result<Offspring> {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut session = match &self.pool {
            Some(pool) => Some(pool.acquire()?),
            None => None,
        };

        let mut tree = recipient.clone();
        let crossover = self.crossover.crossover(
            &mut tree,
            donor,
            session.as_mut().map(|s| s as &mut dyn Evaluator),
            None,
            &mut rng,
        )?;
        let mutation = match &self.mutation {
            Some(engine) => Some(engine.mutate(
                &mut tree,
                session.as_mut().map(|s| s as &mut dyn Evaluator),
                None,
                &mut rng,
            )?),
            None => None,
        };

        Ok(Offspring {
            tree,
            crossover,
            mutation,
        })
    }
}
