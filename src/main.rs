use anyhow::{Context, Result};
use clap::Parser;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::path::PathBuf;
use std::sync::Arc;
use treegraft::config::ConfigManager;
use treegraft::engines::semantics::EvaluatorPool;
use treegraft::engines::variation::{Breeder, CrossoverEngine, MutationEngine, Ptc2};
use treegraft::grammar::{Grammar, TableGrammar};
use treegraft::tree::Tree;

/// Grows random parents from a grammar and breeds offspring by crossover and mutation.
#[derive(Parser, Debug)]
#[command(name = "treegraft")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file (toml or json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Grammar definition (json)
    #[arg(short, long)]
    grammar: PathBuf,

    /// Random seed (default: random)
    #[arg(short, long)]
    seed: Option<u64>,

    /// Number of offspring to breed
    #[arg(short, long, default_value = "8")]
    offspring: usize,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    let manager = ConfigManager::new();
    manager
        .load_layered(args.config.as_deref())
        .context("Failed to load configuration")?;
    let config = manager.get();

    let table = TableGrammar::from_file(&args.grammar)
        .with_context(|| format!("Failed to load grammar {}", args.grammar.display()))?;
    let root_symbol = table.root_symbol();
    let grammar: Arc<dyn Grammar> = Arc::new(table);

    let seed = args.seed.unwrap_or_else(|| rand::thread_rng().gen());
    log::info!("Breeding {} offspring with seed {}", args.offspring, seed);
    let mut rng = StdRng::seed_from_u64(seed);

    let ptc2 = Ptc2::new(grammar.as_ref(), config.operators.max_tries);
    let mut parents = Vec::with_capacity(args.offspring + 1);
    for _ in 0..=args.offspring {
        let mut tree = Tree::new(root_symbol.clone());
        let root = tree.root();
        ptc2.grow(
            &mut tree,
            root,
            config.operators.max_tree_length,
            config.operators.max_tree_depth,
            &mut rng,
        )
        .context("Failed to grow a parent tree")?;
        log::debug!("Parent: {}", tree);
        parents.push(tree);
    }

    let mut crossover = CrossoverEngine::new(grammar.clone(), config.operators.clone())?;
    let mut mutation = MutationEngine::new(grammar.clone(), config.operators.clone())?;
    let mut pool = None;
    if config.operators.semantic_guidance {
        crossover = crossover.with_semantics(config.semantics.clone())?;
        mutation = mutation.with_semantics(config.semantics.clone())?;
        pool = Some(Arc::new(
            EvaluatorPool::from_config(&config.evaluator).context("Failed to create evaluator pool")?,
        ));
    }

    let mut breeder = Breeder::new(crossover).with_mutation(mutation);
    if let Some(pool) = pool {
        breeder = breeder.with_pool(pool);
    }

    let pairs: Vec<(Tree, Tree)> = parents
        .windows(2)
        .map(|w| (w[0].clone(), w[1].clone()))
        .collect();
    for (i, result) in breeder.breed(&pairs, rng.gen()).into_iter().enumerate() {
        match result {
            Ok(offspring) => {
                log::info!(
                    "Offspring {}: {} (length {}, depth {})",
                    i,
                    offspring.tree,
                    offspring.tree.length(),
                    offspring.tree.depth()
                );
                log::info!("  crossover: {}", serde_json::to_string(&offspring.crossover)?);
                if let Some(mutation) = &offspring.mutation {
                    log::info!("  mutation: {}", serde_json::to_string(mutation)?);
                }
            }
            Err(e) => log::warn!("Offspring {} failed: {}", i, e),
        }
    }

    Ok(())
}
