//! Data loading, train/test splitting and synthetic data for the classifier.
//!
//! These feed the core with an in-memory feature matrix and parallel labels.
//! Every random step takes an explicit seed.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum DataError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error at line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("No valid rows found")]
    Empty,

    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

/// A feature matrix with one integer label per row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Dataset {
    pub features: Vec<Vec<f64>>,
    pub labels: Vec<i64>,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Number of feature columns, 0 for an empty dataset.
    pub fn n_features(&self) -> usize {
        self.features.first().map_or(0, |row| row.len())
    }
}

/// Result of [`train_test_split`].
#[derive(Debug, Clone, PartialEq)]
pub struct Split {
    pub train: Dataset,
    pub test: Dataset,
}

/// Loads a CSV file whose last column is the integer label.
pub fn load_csv(path: impl AsRef<Path>) -> Result<Dataset, DataError> {
    let path = path.as_ref();
    let file = File::open(path)?;
    let dataset = read_csv(BufReader::new(file))?;
    debug!(path = %path.display(), rows = dataset.len(), "loaded dataset");
    Ok(dataset)
}

/// Parses CSV from any reader.
///
/// The header fixes the column count. Rows with a different number of cells,
/// unparsable cells or non-finite features are skipped with a warning.
pub fn read_csv<R: BufRead>(reader: R) -> Result<Dataset, DataError> {
    let mut lines = reader.lines();
    let header = match lines.next() {
        Some(line) => line?,
        None => return Err(DataError::Empty),
    };
    let total_columns = header.split(',').count();
    if total_columns < 2 {
        return Err(DataError::Parse {
            line: 1,
            message: "header needs at least one feature column and a label column".to_string(),
        });
    }

    let mut dataset = Dataset::default();
    let mut skipped = 0usize;
    for (offset, line) in lines.enumerate() {
        let line = line?;
        let line_no = offset + 2;
        if line.trim().is_empty() {
            continue;
        }
        match parse_row(&line, total_columns) {
            Ok((row, label)) => {
                dataset.features.push(row);
                dataset.labels.push(label);
            }
            Err(message) => {
                skipped += 1;
                warn!(line = line_no, %message, "skipping malformed row");
            }
        }
    }

    if skipped > 0 {
        debug!(skipped, "malformed rows dropped");
    }
    if dataset.is_empty() {
        return Err(DataError::Empty);
    }
    Ok(dataset)
}

fn parse_row(line: &str, total_columns: usize) -> Result<(Vec<f64>, i64), String> {
    let cells: Vec<&str> = line.split(',').map(str::trim).collect();
    if cells.len() != total_columns {
        return Err(format!("expected {} cells, found {}", total_columns, cells.len()));
    }
    let (label_cell, feature_cells) = match cells.split_last() {
        Some(split) => split,
        None => return Err("empty row".to_string()),
    };

    let mut row = Vec::with_capacity(feature_cells.len());
    for cell in feature_cells {
        let value: f64 = cell.parse().map_err(|_| format!("bad feature value {:?}", cell))?;
        if !value.is_finite() {
            return Err(format!("non-finite feature value {:?}", cell));
        }
        row.push(value);
    }
    let label: i64 = label_cell.parse().map_err(|_| format!("bad label {:?}", label_cell))?;
    Ok((row, label))
}

/// Shuffles row indices with `seed` and puts the first `floor(n * test_size)`
/// of them in the test set, the rest in the training set.
pub fn train_test_split(dataset: &Dataset, test_size: f64, seed: u64) -> Result<Split, DataError> {
    if dataset.features.len() != dataset.labels.len() {
        return Err(DataError::InvalidInput(format!(
            "features ({}) and labels ({}) must be the same length",
            dataset.features.len(),
            dataset.labels.len()
        )));
    }
    if !(0.0..=1.0).contains(&test_size) {
        return Err(DataError::InvalidInput(format!(
            "test_size must be within [0, 1], got {}",
            test_size
        )));
    }

    let mut indices: Vec<usize> = (0..dataset.len()).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test_count = (dataset.len() as f64 * test_size) as usize;
    let mut split = Split {
        train: Dataset::default(),
        test: Dataset::default(),
    };
    for (position, &idx) in indices.iter().enumerate() {
        let target = if position < test_count { &mut split.test } else { &mut split.train };
        target.features.push(dataset.features[idx].clone());
        target.labels.push(dataset.labels[idx]);
    }
    Ok(split)
}

/// Two-feature toy data: IQ in [80, 160), CGPA in [5, 10), label 0 or 1.
pub fn generate_synthetic(num_samples: usize, seed: u64) -> Dataset {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut dataset = Dataset {
        features: Vec::with_capacity(num_samples),
        labels: Vec::with_capacity(num_samples),
    };
    for _ in 0..num_samples {
        let iq = rng.gen_range(80.0..160.0);
        let cgpa = rng.gen_range(5.0..10.0);
        dataset.features.push(vec![iq, cgpa]);
        dataset.labels.push(rng.gen_range(0..=1));
    }
    dataset
}
