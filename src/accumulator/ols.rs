use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};

/// Running ordinary-least-squares block.
///
/// Memory scales with the parameter count only: the outer-product matrix of
/// the regressors and their product with the response are summed event by
/// event, and the normal equations are solved on demand.
#[derive(Debug, Clone, PartialEq)]
pub struct OrdinaryLeastSquares {
    n: f64,
    matrix: Array2<f64>,
    vector: Array1<f64>,
}

impl OrdinaryLeastSquares {
    pub fn new(parameters: usize) -> Self {
        Self {
            n: 0.0,
            matrix: Array2::zeros((parameters, parameters)),
            vector: Array1::zeros(parameters),
        }
    }

    /// Number of regression parameters.
    pub fn parameters(&self) -> usize {
        self.vector.len()
    }

    /// Effective number of samples folded in.
    pub fn weight(&self) -> f64 {
        self.n
    }

    /// Folds one sample in: `values[0]` is the response, `values[1..]` the
    /// regressors. Existing sums decay by `1 - alpha` first; a weight of -1
    /// retracts a sample previously added with weight 1.
    pub fn increment(&mut self, values: &[f64], alpha: f64, weight: f64) {
        let keep = 1.0 - alpha;
        let Some((&response, regressors)) = values.split_first() else {
            return;
        };
        let p = self.parameters().min(regressors.len());
        for j in 0..p {
            for k in 0..p {
                self.matrix[[j, k]] = weight * regressors[j] * regressors[k] + keep * self.matrix[[j, k]];
            }
            self.vector[j] = weight * regressors[j] * response + keep * self.vector[j];
        }
        self.n = weight + keep * self.n;
    }

    /// Solves the normal equations. `None` until at least one unit of weight
    /// has been seen or while the regressors are collinear.
    pub fn estimator(&self) -> Option<Vec<f64>> {
        if self.n < 1.0 {
            return None;
        }
        let matrix = &self.matrix / self.n;
        let vector = &self.vector / self.n;
        solve(matrix, vector).map(|beta| beta.to_vec())
    }

    pub(crate) fn to_checkpoint(&self) -> OlsCheckpoint {
        OlsCheckpoint {
            n: self.n,
            matrix: self.matrix.iter().copied().collect(),
            vector: self.vector.to_vec(),
        }
    }

    pub(crate) fn restore(&mut self, checkpoint: &OlsCheckpoint) -> bool {
        let p = self.parameters();
        if checkpoint.matrix.len() != p * p || checkpoint.vector.len() != p {
            return false;
        }
        match Array2::from_shape_vec((p, p), checkpoint.matrix.clone()) {
            Ok(matrix) => self.matrix = matrix,
            Err(_) => return false,
        }
        self.vector = Array1::from(checkpoint.vector.clone());
        self.n = checkpoint.n;
        true
    }
}

/// Raw OLS sums as persisted in a checkpoint; the matrix is row-major.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OlsCheckpoint {
    pub n: f64,
    pub matrix: Vec<f64>,
    pub vector: Vec<f64>,
}

/// Gauss-Jordan elimination with partial pivoting.
fn solve(mut a: Array2<f64>, mut b: Array1<f64>) -> Option<Array1<f64>> {
    let n = b.len();
    let scale = a.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if n == 0 || scale == 0.0 {
        return None;
    }
    let tolerance = scale * 1e-12;
    for col in 0..n {
        let mut pivot = col;
        for row in col + 1..n {
            if a[[row, col]].abs() > a[[pivot, col]].abs() {
                pivot = row;
            }
        }
        if a[[pivot, col]].abs() <= tolerance {
            return None;
        }
        if pivot != col {
            for k in 0..n {
                a.swap([pivot, k], [col, k]);
            }
            b.swap(pivot, col);
        }
        let diag = a[[col, col]];
        for k in 0..n {
            a[[col, k]] /= diag;
        }
        b[col] /= diag;
        for row in 0..n {
            if row == col {
                continue;
            }
            let factor = a[[row, col]];
            if factor == 0.0 {
                continue;
            }
            for k in 0..n {
                a[[row, k]] -= factor * a[[col, k]];
            }
            b[row] -= factor * b[col];
        }
    }
    Some(b)
}
