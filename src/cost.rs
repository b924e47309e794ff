use ndarray::Array1;

use crate::error::{NetError, Result};

/// Cost function applied to the final layer's output during training.
///
/// Both operations return per-element vectors; callers sum the cost
/// themselves.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CostFunction {
    /// `cost = (h - y)^2 / 2`, defined everywhere.
    Quadratic,
    /// `cost = -y ln(h) - (1 - y) ln(1 - h)`; requires `h` strictly inside
    /// (0, 1) and targets of exactly 0 or 1.
    CrossEntropy,
}

impl CostFunction {
    /// Calculates the cost of the hypothesis `h` against the desired
    /// output `y`.
    pub fn cost(&self, h: &Array1<f32>, y: &Array1<f32>) -> Result<Array1<f32>> {
        match self {
            CostFunction::Quadratic => Ok((h - y).mapv(|e| e * e / 2.0)),
            CostFunction::CrossEntropy => {
                guard_cross_entropy(h, y)?;
                Ok(Array1::from_iter(h.iter().zip(y.iter()).map(|(&h, &y)| {
                    -y * h.ln() - (1.0 - y) * (1.0 - h).ln()
                })))
            }
        }
    }

    /// Calculates the cost gradient with respect to the hypothesis.
    pub fn gradient(&self, h: &Array1<f32>, y: &Array1<f32>) -> Result<Array1<f32>> {
        match self {
            CostFunction::Quadratic => Ok(h - y),
            CostFunction::CrossEntropy => {
                guard_cross_entropy(h, y)?;
                Ok(Array1::from_iter(h.iter().zip(y.iter()).map(|(&h, &y)| {
                    -y / h + (1.0 - y) / (1.0 - h)
                })))
            }
        }
    }
}

fn guard_cross_entropy(h: &Array1<f32>, y: &Array1<f32>) -> Result<()> {
    if h.iter().any(|&e| e <= 0.0 || e >= 1.0) {
        return Err(NetError::Domain(
            "cross-entropy hypothesis must lie strictly between 0 and 1".into(),
        ));
    }
    if y.iter().any(|&e| e != 0.0 && e != 1.0) {
        return Err(NetError::Domain(
            "cross-entropy targets can only be 0 or 1; use a quadratic cost for soft targets".into(),
        ));
    }
    Ok(())
}
