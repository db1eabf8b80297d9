//! Scoring of predicted labels against ground truth.

use crate::error::{KnnError, Result};

/// Fraction of positions where `y_pred` equals `y_true`, in `[0, 1]`.
///
/// Fails with `InvalidInput` if the sequences differ in length or are empty.
pub fn accuracy_score<L: PartialEq>(y_true: &[L], y_pred: &[L]) -> Result<f64> {
    if y_true.len() != y_pred.len() {
        return Err(KnnError::invalid(format!(
            "y_true ({}) and y_pred ({}) must have the same length",
            y_true.len(),
            y_pred.len()
        )));
    }
    if y_true.is_empty() {
        return Err(KnnError::invalid("cannot score an empty prediction set"));
    }

    let correct = y_true.iter().zip(y_pred.iter()).filter(|(t, p)| t == p).count();
    Ok(correct as f64 / y_true.len() as f64)
}
