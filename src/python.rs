//! Python bindings, built with the `python` feature.

use pyo3::exceptions::{PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::error::KnnError;
use crate::evaluate;
use crate::knn::SearchStrategy as RustSearchStrategy;
use crate::knn::classifier::{KnnClassifier, KnnConfig};

fn to_py_err(err: KnnError) -> PyErr {
    match err {
        KnnError::InvalidInput(_) => PyErr::new::<PyValueError, _>(err.to_string()),
        KnnError::NotFitted => PyErr::new::<PyRuntimeError, _>(err.to_string()),
    }
}

/// Python-friendly representation of SearchStrategy
#[pyclass(name = "SearchStrategy")]
#[derive(Clone, Debug)]
enum PySearchStrategy {
    BruteForce,
    KdTree,
}

impl From<RustSearchStrategy> for PySearchStrategy {
    fn from(val: RustSearchStrategy) -> Self {
        match val {
            RustSearchStrategy::BruteForce => PySearchStrategy::BruteForce,
            RustSearchStrategy::KdTree => PySearchStrategy::KdTree,
        }
    }
}

impl From<PySearchStrategy> for RustSearchStrategy {
    fn from(val: PySearchStrategy) -> Self {
        match val {
            PySearchStrategy::BruteForce => RustSearchStrategy::BruteForce,
            PySearchStrategy::KdTree => RustSearchStrategy::KdTree,
        }
    }
}

#[pyclass(name = "KnnClassifier")]
struct PyKnnClassifier {
    classifier: KnnClassifier<f64, i64>,
}

#[pymethods]
impl PyKnnClassifier {
    #[new]
    #[pyo3(signature = (k = 5, search_strategy = None, parallel = false))]
    fn new(k: usize, search_strategy: Option<PySearchStrategy>, parallel: bool) -> PyResult<Self> {
        let mut config = KnnConfig::new(k).with_parallel(parallel);
        if let Some(strategy) = search_strategy {
            config = config.with_strategy(strategy.into());
        }
        let classifier = KnnClassifier::new(config).map_err(to_py_err)?;
        Ok(PyKnnClassifier { classifier })
    }

    fn fit(&mut self, features: Vec<Vec<f64>>, labels: Vec<i64>) -> PyResult<()> {
        self.classifier.fit(&features, &labels).map_err(to_py_err)
    }

    fn predict(&self, py: Python<'_>, queries: Vec<Vec<f64>>) -> PyResult<Vec<i64>> {
        // The index is read-only during prediction; release the GIL for the batch.
        py.allow_threads(|| self.classifier.predict(&queries)).map_err(to_py_err)
    }

    fn predict_single(&self, query: Vec<f64>) -> PyResult<i64> {
        self.classifier.predict_single(&query).map_err(to_py_err)
    }

    /// Returns `(indices, squared_distances)` per query.
    fn kneighbors(
        &self,
        py: Python<'_>,
        queries: Vec<Vec<f64>>,
        k: usize,
    ) -> PyResult<(Vec<Vec<usize>>, Vec<Vec<f64>>)> {
        let neighbors = py
            .allow_threads(|| self.classifier.kneighbors(&queries, k))
            .map_err(to_py_err)?;
        Ok(neighbors
            .into_iter()
            .map(|row| -> (Vec<usize>, Vec<f64>) { row.into_iter().map(|n| (n.index, n.distance)).unzip() })
            .unzip())
    }

    #[getter]
    fn search_strategy(&self) -> Option<PySearchStrategy> {
        self.classifier.search_strategy().map(Into::into)
    }

    #[getter]
    fn is_fitted(&self) -> bool {
        self.classifier.is_fitted()
    }
}

#[pyfunction]
fn accuracy_score(y_true: Vec<i64>, y_pred: Vec<i64>) -> PyResult<f64> {
    evaluate::accuracy_score(&y_true, &y_pred).map_err(to_py_err)
}

#[pymodule]
fn knn_classifier(_py: Python<'_>, m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_function(wrap_pyfunction!(accuracy_score, m)?)?;
    m.add_class::<PySearchStrategy>()?;
    m.add_class::<PyKnnClassifier>()?;
    Ok(())
}
