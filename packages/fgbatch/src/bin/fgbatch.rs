//! fgbatch inspector.
//!
//! Loads outer batches from a record file through the full pipeline and
//! logs, per emission, the segment shape and its memory estimate.
//!
//! Usage:
//!   fgbatch data/toy.json --limit 500 --hidden-dim 1 --batch-size 3 --max-batches 1
//!   fgbatch data/train.json --config loader.json
//!
//! Logging is controlled by `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use fgbatch::config::DEFAULT_OUTER_BATCH_SIZE;
use fgbatch::partition::{DEFAULT_HIDDEN_DIM, DEFAULT_MEMORY_LIMIT};
use fgbatch::store::DEFAULT_MAX_CACHE_SIZE;
use fgbatch::{BatchLoader, LoaderConfig, WorkerPool};

#[derive(Parser, Debug)]
#[command(name = "fgbatch", version, about = "Inspect memory-bounded factor-graph batches")]
struct Args {
    /// Record file (one JSON record per line, last line reserved)
    input: Option<PathBuf>,

    /// JSON loader config; flags below are ignored when given (`input` still
    /// overrides its `input_source`)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Partitioner memory limit
    #[arg(long, default_value_t = DEFAULT_MEMORY_LIMIT)]
    limit: u64,

    /// Per-edge working-set factor
    #[arg(long, default_value_t = DEFAULT_HIDDEN_DIM)]
    hidden_dim: u64,

    /// Logical records per outer batch
    #[arg(long, default_value_t = DEFAULT_OUTER_BATCH_SIZE)]
    batch_size: usize,

    #[arg(long, default_value_t = DEFAULT_MAX_CACHE_SIZE)]
    max_cache_size: usize,

    #[arg(long)]
    shuffle: bool,

    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Worker threads (0 = load on the main thread)
    #[arg(long, default_value_t = 0)]
    workers: usize,

    /// Stop after this many outer batches
    #[arg(long)]
    max_batches: Option<usize>,

    /// Print every emission as JSON on stdout
    #[arg(long)]
    dump: bool,
}

impl Args {
    fn loader_config(&self) -> anyhow::Result<LoaderConfig> {
        let mut config = match &self.config {
            Some(path) => LoaderConfig::from_json_file(path)
                .with_context(|| format!("reading config {}", path.display()))?,
            None => LoaderConfig {
                input_source: None,
                max_cache_size: self.max_cache_size,
                memory_limit: self.limit,
                hidden_dim: self.hidden_dim,
                outer_batch_size: self.batch_size,
                shuffle: self.shuffle,
                seed: self.seed,
                worker_count: self.workers,
                epoch_size: 0,
            },
        };
        if let Some(input) = &self.input {
            config.input_source = Some(input.clone());
        }
        Ok(config)
    }
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = args.loader_config()?;

    let loader = Arc::new(BatchLoader::from_config(&config).context("building loader")?);
    let partitioner = *loader.partitioner();
    tracing::info!(
        records = loader.len(),
        limit = partitioner.limit(),
        hidden_dim = partitioner.hidden_dim(),
        outer_batch_size = config.outer_batch_size,
        workers = config.worker_count,
        "loader ready"
    );

    let pool = WorkerPool::new(Arc::clone(&loader), config.worker_count)?;
    let max_batches = args.max_batches.unwrap_or(usize::MAX);

    let mut outer_batches = 0usize;
    let mut emissions = 0usize;
    for result in pool.run_epoch(0).take(max_batches) {
        let batches = result?;
        for batch in &batches {
            let max_edges = batch.edges_per_record().into_iter().max().unwrap_or(0);
            tracing::info!(
                outer_batch = outer_batches,
                segment_size = batch.segment_size(),
                variables = batch.variable_count(),
                functions = batch.function_count(),
                edges = batch.edge_count(),
                estimate = %partitioner.estimate(batch.segment_size(), max_edges),
                "emission"
            );
            if args.dump {
                println!("{}", serde_json::to_string(batch)?);
            }
        }
        emissions += batches.len();
        outer_batches += 1;
    }

    let stats = loader.stats();
    tracing::info!(
        outer_batches,
        emissions,
        parses = stats.parses,
        cache_hits = stats.cache_hits,
        evictions = stats.evictions,
        "done"
    );
    Ok(())
}
