//! k-NN benchmark: brute force vs k-d tree, optionally with parallel prediction.
//!
//! ```text
//! # CSV with a header row, label in the last column
//! knn-bench --data data/fashion.csv --mode kdtree -k 8 --parallel
//!
//! # No file: synthetic IQ/CGPA data
//! knn-bench --synthetic 5000 --mode brute
//! ```

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, bail};
use clap::{Parser, ValueEnum};
use tracing::info;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use knn_classifier::data::{generate_synthetic, load_csv, train_test_split};
use knn_classifier::{KnnClassifier, KnnConfig, SearchStrategy, accuracy_score};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Exhaustive distance computation
    Brute,
    /// Exact k-d tree
    Kdtree,
}

impl From<Mode> for SearchStrategy {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Brute => SearchStrategy::BruteForce,
            Mode::Kdtree => SearchStrategy::KdTree,
        }
    }
}

/// k-NN benchmarking using brute force or a k-d tree
#[derive(Parser, Debug)]
#[command(name = "knn-bench")]
#[command(version)]
struct Args {
    /// Path to dataset CSV file (header row, label in the last column)
    #[arg(short, long, conflicts_with = "synthetic")]
    data: Option<PathBuf>,

    /// Generate this many synthetic samples instead of reading a file
    #[arg(long)]
    synthetic: Option<usize>,

    /// Fraction of rows held out for testing
    #[arg(short = 'r', long, default_value_t = 0.2)]
    test_size: f64,

    /// Number of neighbors
    #[arg(short, long = "k-neighbors", default_value_t = 8)]
    k: usize,

    /// Algorithm mode
    #[arg(short, long, value_enum, default_value_t = Mode::Brute)]
    mode: Mode,

    /// Enable parallel prediction
    #[arg(short, long)]
    parallel: bool,

    /// Seed for the train/test shuffle and synthetic data
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Enable debug logging
    #[arg(long)]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.debug {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let dataset = match (&args.data, args.synthetic) {
        (Some(path), _) => load_csv(path).with_context(|| format!("loading {}", path.display()))?,
        (None, Some(n)) => generate_synthetic(n, args.seed),
        (None, None) => bail!("either --data or --synthetic is required"),
    };
    info!("Loaded data with {} samples", dataset.len());

    let split = train_test_split(&dataset, args.test_size, args.seed)?;
    info!(train = split.train.len(), test = split.test.len(), "split dataset");

    let config = KnnConfig::new(args.k)
        .with_strategy(args.mode.into())
        .with_parallel(args.parallel);
    info!(
        "Using {:?} KNN with k = {} ({} prediction)",
        config.strategy,
        config.k,
        if config.parallel { "parallel" } else { "sequential" }
    );

    let mut classifier: KnnClassifier<f64, i64> = KnnClassifier::new(config)?;
    let start = Instant::now();
    classifier.fit(&split.train.features, &split.train.labels)?;
    let fit_time = start.elapsed();

    let start = Instant::now();
    let y_pred = classifier.predict(&split.test.features)?;
    let predict_time = start.elapsed();

    let accuracy = accuracy_score(&split.test.labels, &y_pred)?;

    info!(fit_secs = fit_time.as_secs_f64(), "fit complete");
    println!("Prediction time: {:.4} seconds", predict_time.as_secs_f64());
    println!("Accuracy: {:.3}%", accuracy * 100.0);
    Ok(())
}
