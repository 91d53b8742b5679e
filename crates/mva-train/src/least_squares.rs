//! Incremental weighted least-squares accumulator with a closed-form solve.
//!
//! Fits `target ~ coefficients . x + constant` for binary targets. Events
//! are folded into the normal equations one at a time, so the full event
//! stream never has to be held in memory.

use mva_core::{Error, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Relative residual above which a solution is rejected as ill-conditioned.
const RESIDUAL_TOLERANCE: f64 = 1e-6;

/// Weighted linear least-squares fit over `size` input variables.
///
/// For each event with value vector `x`, target `t` in {0, 1} and weight
/// `w`, accumulates `S += w * x'x'^T` and `b += w * t * x'` where
/// `x' = [x, 1]` (the implicit trailing ones column provides the constant
/// term). Accumulation is associative and commutative: event order does not
/// affect the result beyond floating-point rounding, and feeding an event
/// twice is equivalent to doubling its weight.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeastSquares {
    size: usize,
    /// Row-major accumulated design matrix, `(size + 1)^2` entries.
    matrix: Vec<f64>,
    /// Accumulated target vector, `size + 1` entries.
    vector: Vec<f64>,
    /// Solved coefficients, `size + 1` entries; the trailing entry is the
    /// constant offset. All zero until [`calculate`](Self::calculate) runs.
    coeffs: Vec<f64>,
}

impl LeastSquares {
    /// Empty accumulator for `size` input variables.
    pub fn new(size: usize) -> Self {
        let n = size + 1;
        Self { size, matrix: vec![0.0; n * n], vector: vec![0.0; n], coeffs: vec![0.0; n] }
    }

    /// Number of input variables.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Fold one weighted observation into the normal equations.
    ///
    /// `values` must hold exactly [`size`](Self::size) scalars.
    pub fn add(&mut self, values: &[f64], target: bool, weight: f64) {
        debug_assert_eq!(values.len(), self.size);
        let n = self.size + 1;
        let t = if target { 1.0 } else { 0.0 };
        for i in 0..n {
            let xi = if i < self.size { values[i] } else { 1.0 };
            for j in 0..n {
                let xj = if j < self.size { values[j] } else { 1.0 };
                self.matrix[i * n + j] += weight * xi * xj;
            }
            self.vector[i] += weight * t * xi;
        }
    }

    /// Solve the accumulated normal equations `S . beta = b`.
    ///
    /// # Errors
    ///
    /// [`Error::Solver`] when the accumulated matrix is singular, the
    /// solution is not finite, or the residual betrays an ill-conditioned
    /// system. A degenerate fit is never returned silently.
    pub fn calculate(&mut self) -> Result<()> {
        let n = self.size + 1;
        let s = DMatrix::from_row_slice(n, n, &self.matrix);
        let b = DVector::from_column_slice(&self.vector);

        let solution = s
            .clone()
            .lu()
            .solve(&b)
            .ok_or_else(|| Error::Solver("accumulated design matrix is singular".into()))?;

        if solution.iter().any(|v| !v.is_finite()) {
            return Err(Error::Solver("solution is not finite".into()));
        }

        let residual = (&s * &solution - &b).amax();
        let scale = 1.0 + b.amax();
        if residual > RESIDUAL_TOLERANCE * scale {
            return Err(Error::Solver(format!(
                "ill-conditioned system (residual {residual:.3e} vs scale {scale:.3e})"
            )));
        }

        self.coeffs.copy_from_slice(solution.as_slice());
        Ok(())
    }

    /// Fitted coefficients, one per input variable.
    pub fn weights(&self) -> &[f64] {
        &self.coeffs[..self.size]
    }

    /// Fitted constant offset.
    pub fn constant(&self) -> f64 {
        self.coeffs[self.size]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn three_event_fit() -> LeastSquares {
        let mut ls = LeastSquares::new(1);
        ls.add(&[1.0], true, 1.0);
        ls.add(&[2.0], false, 1.0);
        ls.add(&[3.0], true, 1.0);
        ls
    }

    #[test]
    fn closed_form_single_variable() {
        // S = [[14, 6], [6, 3]], b = [4, 2]  =>  beta = [0, 2/3].
        let mut ls = three_event_fit();
        ls.calculate().unwrap();
        assert_relative_eq!(ls.weights()[0], 0.0, epsilon = 1e-12);
        assert_relative_eq!(ls.constant(), 2.0 / 3.0, epsilon = 1e-12);
    }

    #[test]
    fn order_independent() {
        let mut forward = LeastSquares::new(2);
        let mut reverse = LeastSquares::new(2);
        let events: [(&[f64], bool, f64); 4] = [
            (&[1.0, -0.5], true, 0.7),
            (&[2.5, 0.25], false, 1.3),
            (&[-1.0, 4.0], true, 2.0),
            (&[0.0, 1.0], false, 0.5),
        ];
        for (x, t, w) in events {
            forward.add(x, t, w);
        }
        for (x, t, w) in events.iter().rev() {
            reverse.add(x, *t, *w);
        }
        forward.calculate().unwrap();
        reverse.calculate().unwrap();
        for (a, b) in forward.weights().iter().zip(reverse.weights()) {
            assert_relative_eq!(a, b, epsilon = 1e-9);
        }
        assert_relative_eq!(forward.constant(), reverse.constant(), epsilon = 1e-9);
    }

    #[test]
    fn duplicate_event_equals_double_weight() {
        let mut twice = LeastSquares::new(1);
        let mut doubled = LeastSquares::new(1);
        for ls in [&mut twice, &mut doubled] {
            ls.add(&[1.0], true, 1.0);
            ls.add(&[4.0], false, 1.0);
        }
        twice.add(&[2.0], true, 1.5);
        twice.add(&[2.0], true, 1.5);
        doubled.add(&[2.0], true, 3.0);

        twice.calculate().unwrap();
        doubled.calculate().unwrap();
        assert_relative_eq!(twice.weights()[0], doubled.weights()[0], epsilon = 1e-12);
        assert_relative_eq!(twice.constant(), doubled.constant(), epsilon = 1e-12);
    }

    #[test]
    fn singular_accumulation_fails() {
        // All values zero: the variable column is linearly dependent.
        let mut ls = LeastSquares::new(1);
        ls.add(&[0.0], true, 1.0);
        ls.add(&[0.0], false, 1.0);
        assert!(matches!(ls.calculate(), Err(Error::Solver(_))));
    }

    #[test]
    fn empty_accumulator_fails() {
        let mut ls = LeastSquares::new(2);
        assert!(matches!(ls.calculate(), Err(Error::Solver(_))));
    }

    #[test]
    fn state_round_trips_through_json() {
        let mut ls = three_event_fit();
        ls.calculate().unwrap();
        let text = serde_json::to_string(&ls).unwrap();
        let restored: LeastSquares = serde_json::from_str(&text).unwrap();
        assert_eq!(restored, ls);
    }
}
