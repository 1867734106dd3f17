//! Tridiagonal storage and the Thomas algorithm.
//!
//! A `Tridiagonal` holds three bands: `sub[i] = M[i+1, i]`, `diag[i] = M[i, i]` and
//! `sup[i] = M[i, i+1]`. Factorization is separated from back-substitution so a single
//! operator can be applied to many right-hand sides (the columns of a field).

use crate::error::{fail, Result};
use crate::traits::Scalar;
use nalgebra::DMatrix;

#[derive(Debug, Clone, PartialEq)]
pub struct Tridiagonal<T: Scalar> {
    sub: Vec<T>,
    diag: Vec<T>,
    sup: Vec<T>,
}

impl<T: Scalar> Tridiagonal<T> {
    pub fn new(sub: Vec<T>, diag: Vec<T>, sup: Vec<T>) -> Result<Self> {
        if diag.is_empty() {
            fail!(InvalidShape, "Tridiagonal system must have at least one row.");
        }
        let off = diag.len() - 1;
        if sub.len() != off || sup.len() != off {
            fail!(
                InvalidShape,
                "Band length mismatch. Expected off-diagonals of length {}, got sub={} sup={}.",
                off,
                sub.len(),
                sup.len()
            );
        }
        Ok(Self { sub, diag, sup })
    }

    /// Builds a `size x size` system with constant bands.
    pub fn from_constant_bands(size: usize, lower: T, diag: T, upper: T) -> Result<Self> {
        let off = size.saturating_sub(1);
        Self::new(vec![lower; off], vec![diag; size], vec![upper; off])
    }

    pub fn size(&self) -> usize {
        self.diag.len()
    }

    pub fn sub(&self) -> &[T] {
        &self.sub
    }

    pub fn diag(&self) -> &[T] {
        &self.diag
    }

    pub fn sup(&self) -> &[T] {
        &self.sup
    }

    pub fn sub_mut(&mut self) -> &mut [T] {
        &mut self.sub
    }

    pub fn sup_mut(&mut self) -> &mut [T] {
        &mut self.sup
    }

    /// Returns `(lower, diagonal, upper)` for row `i`; missing neighbours read as zero.
    pub fn row(&self, i: usize) -> (T, T, T) {
        let lower = if i > 0 { self.sub[i - 1] } else { T::zero() };
        let upper = if i + 1 < self.size() {
            self.sup[i]
        } else {
            T::zero()
        };
        (lower, self.diag[i], upper)
    }

    /// Strict row diagonal dominance: `|d_i| > |l_i| + |u_i|` for every row.
    pub fn is_diagonally_dominant(&self) -> bool {
        (0..self.size()).all(|i| {
            let (l, d, u) = self.row(i);
            d.abs() > l.abs() + u.abs()
        })
    }

    pub fn matvec(&self, x: &[T]) -> Result<Vec<T>> {
        if x.len() != self.size() {
            fail!(
                InvalidShape,
                "Vector length mismatch. Expected {}, got {}.",
                self.size(),
                x.len()
            );
        }
        Ok((0..self.size())
            .map(|i| {
                let (l, d, u) = self.row(i);
                let mut acc = d * x[i];
                if i > 0 {
                    acc = acc + l * x[i - 1];
                }
                if i + 1 < self.size() {
                    acc = acc + u * x[i + 1];
                }
                acc
            })
            .collect())
    }

    /// Forward-elimination sweep of the Thomas algorithm.
    pub fn factor(&self) -> Result<ThomasFactorization<T>> {
        let k = self.size();
        let mut upper = vec![T::zero(); k.saturating_sub(1)];
        let mut inv_pivot = vec![T::zero(); k];

        for i in 0..k {
            let (l, d, u) = self.row(i);
            let pivot = if i == 0 { d } else { d - l * upper[i - 1] };
            let scale = d.abs().max(l.abs()).max(u.abs());
            if !pivot.is_finite() || pivot.abs() <= T::epsilon() * scale {
                fail!(
                    SolverDivergence,
                    "Vanishing pivot in tridiagonal solve at row {} (pivot = {:?}).",
                    i,
                    pivot
                );
            }
            inv_pivot[i] = T::one() / pivot;
            if i + 1 < k {
                upper[i] = u * inv_pivot[i];
            }
        }

        Ok(ThomasFactorization {
            sub: self.sub.clone(),
            upper,
            inv_pivot,
        })
    }

    pub fn solve(&self, rhs: &[T]) -> Result<Vec<T>> {
        self.factor()?.solve(rhs)
    }
}

impl Tridiagonal<f64> {
    /// Solves `M X = R` for every column of `rhs`, factoring once.
    pub fn solve_columns(&self, rhs: &DMatrix<f64>) -> Result<DMatrix<f64>> {
        if rhs.nrows() != self.size() {
            fail!(
                InvalidShape,
                "Right-hand side has {} rows, system has {}.",
                rhs.nrows(),
                self.size()
            );
        }
        let factorization = self.factor()?;
        let mut out = DMatrix::zeros(rhs.nrows(), rhs.ncols());
        let mut column = vec![0.0; rhs.nrows()];
        for j in 0..rhs.ncols() {
            for (dst, src) in column.iter_mut().zip(rhs.column(j).iter()) {
                *dst = *src;
            }
            factorization.solve_in_place(&mut column)?;
            out.column_mut(j).copy_from_slice(&column);
        }
        log::debug!(
            "tridiagonal solve: {} rows, {} right-hand sides",
            rhs.nrows(),
            rhs.ncols()
        );
        Ok(out)
    }
}

/// LU factors of a tridiagonal matrix, ready for repeated back-substitution.
#[derive(Debug, Clone)]
pub struct ThomasFactorization<T: Scalar> {
    sub: Vec<T>,
    upper: Vec<T>,
    inv_pivot: Vec<T>,
}

impl<T: Scalar> ThomasFactorization<T> {
    pub fn size(&self) -> usize {
        self.inv_pivot.len()
    }

    pub fn solve(&self, rhs: &[T]) -> Result<Vec<T>> {
        let mut x = rhs.to_vec();
        self.solve_in_place(&mut x)?;
        Ok(x)
    }

    pub fn solve_in_place(&self, x: &mut [T]) -> Result<()> {
        let k = self.size();
        if x.len() != k {
            fail!(
                InvalidShape,
                "Right-hand side length mismatch. Expected {}, got {}.",
                k,
                x.len()
            );
        }

        x[0] = x[0] * self.inv_pivot[0];
        for i in 1..k {
            x[i] = (x[i] - self.sub[i - 1] * x[i - 1]) * self.inv_pivot[i];
        }
        for i in (0..k.saturating_sub(1)).rev() {
            x[i] = x[i] - self.upper[i] * x[i + 1];
        }

        if x.iter().any(|v| !v.is_finite()) {
            fail!(SolverDivergence, "Tridiagonal solve produced non-finite values.");
        }
        Ok(())
    }
}
