//! Linear-system collaborator for the pressure solve.
//!
//! The hemodynamics module assembles a [`SparseMatrix`] and hands it to any
//! [`LinearSolver`]; the solver returns a solution vector and nothing else.
//! Convergence tolerance and the iteration cap are internal to the solver,
//! and callers use whatever vector comes back.
//!
//! [`bisection`] is the scalar root finder used when resizing vessels to
//! carry a prescribed flow.

use serde::{Deserialize, Serialize};

/// Row-compressed square matrix with accumulating inserts.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SparseMatrix {
    rows: Vec<Vec<(usize, f64)>>,
}

impl SparseMatrix {
    pub fn new(n: usize) -> Self {
        SparseMatrix {
            rows: vec![Vec::new(); n],
        }
    }

    pub fn dim(&self) -> usize {
        self.rows.len()
    }

    /// Adds `value` to entry `(row, col)`.
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        let Some(entries) = self.rows.get_mut(row) else {
            return;
        };
        match entries.iter_mut().find(|(c, _)| *c == col) {
            Some((_, v)) => *v += value,
            None => entries.push((col, value)),
        }
    }

    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.rows
            .get(row)
            .and_then(|r| r.iter().find(|(c, _)| *c == col))
            .map_or(0.0, |(_, v)| *v)
    }

    pub fn row(&self, row: usize) -> &[(usize, f64)] {
        self.rows.get(row).map_or(&[], |r| r.as_slice())
    }

    /// Multiplies every entry by `factor`.
    pub fn scale(&mut self, factor: f64) {
        for row in &mut self.rows {
            for (_, v) in row.iter_mut() {
                *v *= factor;
            }
        }
    }

    /// Computes `A * x`.
    pub fn mul_vec(&self, x: &[f64]) -> Vec<f64> {
        self.rows
            .iter()
            .map(|row| row.iter().map(|(c, v)| v * x.get(*c).copied().unwrap_or(0.0)).sum())
            .collect()
    }
}

/// Solves `A * x = b` starting from `x0`.
pub trait LinearSolver {
    fn solve(&self, a: &SparseMatrix, b: &[f64], x0: &[f64]) -> Vec<f64>;
}

/// Gauss-Seidel successive over-relaxation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SorSolver {
    pub omega: f64,
    pub tolerance: f64,
    pub max_iterations: usize,
}

impl Default for SorSolver {
    fn default() -> Self {
        SorSolver {
            omega: 1.4,
            tolerance: 1e-8,
            max_iterations: 10_000,
        }
    }
}

impl SorSolver {
    fn residual(a: &SparseMatrix, b: &[f64], x: &[f64]) -> f64 {
        a.mul_vec(x)
            .iter()
            .zip(b)
            .map(|(ax, bi)| (bi - ax).powi(2))
            .sum::<f64>()
            .sqrt()
    }
}

impl LinearSolver for SorSolver {
    fn solve(&self, a: &SparseMatrix, b: &[f64], x0: &[f64]) -> Vec<f64> {
        let n = a.dim();
        let mut x: Vec<f64> = (0..n).map(|i| x0.get(i).copied().unwrap_or(0.0)).collect();
        if n == 0 {
            return x;
        }

        let mut iterations = 0;
        while iterations < self.max_iterations {
            iterations += 1;
            for i in 0..n {
                let mut diag = 0.0;
                let mut sigma = 0.0;
                for &(j, v) in a.row(i) {
                    if j == i {
                        diag += v;
                    } else {
                        sigma += v * x[j];
                    }
                }
                if diag == 0.0 {
                    continue;
                }
                let rhs = b.get(i).copied().unwrap_or(0.0);
                x[i] = (1.0 - self.omega) * x[i] + self.omega * (rhs - sigma) / diag;
            }
            let residual = Self::residual(a, b, &x);
            if residual.is_nan() || residual < self.tolerance {
                break;
            }
        }

        tracing::debug!(n, iterations, "SOR solve finished");
        x
    }
}

/// Iteration cap for [`bisection`].
const BISECTION_ITERATIONS: usize = 1000;

/// Root of `f` on `[lo, hi]` by repeated interval halving.
///
/// Returns `None` when `f` takes the same sign (or NaN) at both bounds, or
/// when the cap is reached before the half-width drops below `tolerance`.
pub fn bisection<F>(f: F, lo: f64, hi: f64, tolerance: f64) -> Option<f64>
where
    F: Fn(f64) -> f64,
{
    let (mut a, mut b) = if lo <= hi { (lo, hi) } else { (hi, lo) };
    let mut fa = f(a);
    let fb = f(b);
    if fa.is_nan() || fb.is_nan() || fa.signum() == fb.signum() {
        return None;
    }

    for _ in 0..BISECTION_ITERATIONS {
        let c = (a + b) / 2.0;
        let fc = f(c);
        if fc.is_nan() {
            return None;
        }
        if fc == 0.0 || (b - a) / 2.0 < tolerance {
            return Some(c);
        }
        if fc.signum() == fa.signum() {
            a = c;
            fa = fc;
        } else {
            b = c;
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tridiagonal(n: usize) -> SparseMatrix {
        let mut a = SparseMatrix::new(n);
        for i in 0..n {
            a.add(i, i, 2.0);
            if i > 0 {
                a.add(i, i - 1, -1.0);
            }
            if i + 1 < n {
                a.add(i, i + 1, -1.0);
            }
        }
        a
    }

    #[test]
    fn add_accumulates() {
        let mut a = SparseMatrix::new(2);
        a.add(0, 1, 1.5);
        a.add(0, 1, 2.0);
        assert_eq!(a.get(0, 1), 3.5);
        assert_eq!(a.get(1, 0), 0.0);
        assert_eq!(a.row(0).len(), 1);
    }

    #[test]
    fn scale_multiplies_entries() {
        let mut a = tridiagonal(3);
        a.scale(0.5);
        assert_eq!(a.get(1, 1), 1.0);
        assert_eq!(a.get(1, 2), -0.5);
    }

    #[test]
    fn sor_solves_tridiagonal_system() {
        // Solution x = [1, 2, 3].
        let a = tridiagonal(3);
        let b = vec![0.0, 0.0, 4.0];
        let x = SorSolver::default().solve(&a, &b, &[0.0; 3]);
        for (got, want) in x.iter().zip([1.0, 2.0, 3.0]) {
            assert!((got - want).abs() < 1e-6, "got {got}, want {want}");
        }
    }

    #[test]
    fn zero_diagonal_rows_keep_initial_guess() {
        let mut a = SparseMatrix::new(2);
        a.add(0, 0, 4.0);
        let x = SorSolver::default().solve(&a, &[8.0, 1.0], &[0.0, 7.0]);
        assert!((x[0] - 2.0).abs() < 1e-9);
        assert_eq!(x[1], 7.0);
    }

    #[test]
    fn bisection_finds_sqrt_two() {
        let root = bisection(|x| x * x - 2.0, 0.0, 2.0, 1e-9).unwrap();
        assert!((root - std::f64::consts::SQRT_2).abs() < 1e-8);
        // Bounds given in either order.
        let swapped = bisection(|x| x * x - 2.0, 2.0, 0.0, 1e-9).unwrap();
        assert!((swapped - root).abs() < 1e-8);
    }

    #[test]
    fn bisection_needs_a_sign_change() {
        assert_eq!(bisection(|x| x * x + 1.0, -1.0, 1.0, 1e-9), None);
        assert_eq!(bisection(|_| f64::NAN, 0.0, 1.0, 1e-9), None);
        assert_eq!(bisection(|_| 0.0, 0.0, 1.0, 1e-9), None);
    }

    #[test]
    fn empty_system() {
        let x = SorSolver::default().solve(&SparseMatrix::new(0), &[], &[]);
        assert!(x.is_empty());
    }
}
