//! Mid-point interpolation of 2-D fields along the row axis.
//!
//! Two schemes are provided. The simple scheme averages neighbouring rows. The compact
//! scheme solves
//!
//! ```text
//! alpha * fI[i-1] + fI[i] + alpha * fI[i+1] = a/2 (f[i] + f[i+1]) + b/2 (f[i-1] + f[i+2])
//! ```
//!
//! in the interior, with explicit fourth-order one-sided stencils on the first and last
//! output rows. Columns are independent problems sharing one operator.

use crate::banded::Tridiagonal;
use crate::error::{fail, AnalysisError, Result};
use nalgebra::DMatrix;
use nalgebra_sparse::coo::CooMatrix;
use nalgebra_sparse::csr::CsrMatrix;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// One-sided interpolation weights for the point half a cell inside the boundary,
/// applied to the four nearest rows.
pub const BOUNDARY_STENCIL: [f64; 4] = [5.0 / 16.0, 15.0 / 16.0, -5.0 / 16.0, 1.0 / 16.0];

/// Smallest row count for which both boundary stencils fit.
pub const MIN_COMPACT_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterpolationMethod {
    Simple,
    Compact,
}

impl InterpolationMethod {
    /// Maps the numeric method flag (1 = simple, 2 = compact).
    pub fn from_flag(flag: u8) -> Result<Self> {
        match flag {
            1 => Ok(InterpolationMethod::Simple),
            2 => Ok(InterpolationMethod::Compact),
            other => fail!(
                Configuration,
                "Unknown interpolation method flag {}. Expected 1 (simple) or 2 (compact).",
                other
            ),
        }
    }

    pub fn flag(self) -> u8 {
        match self {
            InterpolationMethod::Simple => 1,
            InterpolationMethod::Compact => 2,
        }
    }
}

impl FromStr for InterpolationMethod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "1" | "simple" => Ok(InterpolationMethod::Simple),
            "2" | "compact" => Ok(InterpolationMethod::Compact),
            other => fail!(Configuration, "Unknown interpolation method \"{}\".", other),
        }
    }
}

/// Interior coefficients of the compact scheme.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactCoefficients {
    pub alpha: f64,
    pub a: f64,
    pub b: f64,
}

impl Default for CompactCoefficients {
    fn default() -> Self {
        Self {
            alpha: 0.3,
            a: 1.5,
            b: 0.1,
        }
    }
}

/// Interpolates `field` (m x n) to the m-1 row midpoints.
pub fn interpolate_midpoints(
    field: &DMatrix<f64>,
    method: InterpolationMethod,
) -> Result<DMatrix<f64>> {
    match method {
        InterpolationMethod::Simple => simple_midpoints(field),
        InterpolationMethod::Compact => compact_midpoints(field, CompactCoefficients::default()),
    }
}

pub fn simple_midpoints(field: &DMatrix<f64>) -> Result<DMatrix<f64>> {
    let (m, n) = field.shape();
    if m < 2 {
        fail!(
            InvalidShape,
            "Simple interpolation needs at least 2 rows, got {}.",
            m
        );
    }
    Ok(DMatrix::from_fn(m - 1, n, |i, j| {
        0.5 * (field[(i, j)] + field[(i + 1, j)])
    }))
}

pub fn compact_midpoints(
    field: &DMatrix<f64>,
    coeffs: CompactCoefficients,
) -> Result<DMatrix<f64>> {
    let (m, n) = field.shape();
    if m < MIN_COMPACT_ROWS {
        fail!(
            InvalidShape,
            "Compact interpolation needs at least {} rows, got {}.",
            MIN_COMPACT_ROWS,
            m
        );
    }

    let rhs_operator = build_rhs_operator(m, coeffs)?;
    let lhs = build_lhs_system(m, coeffs)?;
    if !lhs.is_diagonally_dominant() {
        fail!(
            SolverDivergence,
            "Compact system is not diagonally dominant for alpha = {}.",
            coeffs.alpha
        );
    }

    let af: DMatrix<f64> = &rhs_operator * field;
    log::debug!(
        "compact interpolation: {}x{} field, operator nnz = {}",
        m,
        n,
        rhs_operator.nnz()
    );
    lhs.solve_columns(&af)
}

/// Right-hand-side operator `A` of shape (m-1) x m.
///
/// Interior bands are pushed for every row, then the boundary rows receive correction
/// entries that are summed onto them during COO -> CSR conversion.
pub fn build_rhs_operator(m: usize, coeffs: CompactCoefficients) -> Result<CsrMatrix<f64>> {
    if m < MIN_COMPACT_ROWS {
        fail!(
            InvalidShape,
            "Operator needs at least {} columns, got {}.",
            MIN_COMPACT_ROWS,
            m
        );
    }
    let rows = m - 1;
    let half_a = coeffs.a / 2.0;
    let half_b = coeffs.b / 2.0;
    let bands: [(isize, f64); 4] = [(-1, half_b), (0, half_a), (1, half_a), (2, half_b)];

    let mut coo = CooMatrix::new(rows, m);
    for (offset, value) in bands {
        for i in 0..rows {
            let j = i as isize + offset;
            if j >= 0 && (j as usize) < m {
                coo.push(i, j as usize, value);
            }
        }
    }

    let [s0, s1, s2, s3] = BOUNDARY_STENCIL;
    let first = [s0 - half_a, s1 - half_a, s2 - half_b, s3];
    for (j, value) in first.into_iter().enumerate() {
        coo.push(0, j, value);
    }
    let last = [s3, s2 - half_b, s1 - half_a, s0 - half_a];
    for (k, value) in last.into_iter().enumerate() {
        coo.push(rows - 1, m - 4 + k, value);
    }

    Ok(CsrMatrix::from(&coo))
}

/// Left-hand-side tridiagonal system `B` of size m-1. The first and last rows carry no
/// off-diagonal coupling.
pub fn build_lhs_system(m: usize, coeffs: CompactCoefficients) -> Result<Tridiagonal<f64>> {
    if m < MIN_COMPACT_ROWS {
        fail!(
            InvalidShape,
            "System needs at least {} field rows, got {}.",
            MIN_COMPACT_ROWS,
            m
        );
    }
    let size = m - 1;
    let mut system = Tridiagonal::from_constant_bands(size, coeffs.alpha, 1.0, coeffs.alpha)?;
    system.sup_mut()[0] = 0.0;
    system.sub_mut()[size - 2] = 0.0;
    Ok(system)
}

/// Mean absolute difference between an interpolated field and its reference.
pub fn interpolation_l1_error(interpolated: &DMatrix<f64>, exact: &DMatrix<f64>) -> Result<f64> {
    if interpolated.shape() != exact.shape() {
        fail!(
            InvalidShape,
            "Shape mismatch: interpolated {:?} vs exact {:?}.",
            interpolated.shape(),
            exact.shape()
        );
    }
    if interpolated.is_empty() {
        fail!(InvalidShape, "Cannot measure error of an empty field.");
    }
    let total: f64 = interpolated
        .iter()
        .zip(exact.iter())
        .map(|(a, b)| (a - b).abs())
        .sum();
    Ok(total / interpolated.len() as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    fn dense(csr: &CsrMatrix<f64>) -> DMatrix<f64> {
        let mut out = DMatrix::zeros(csr.nrows(), csr.ncols());
        for (i, j, v) in csr.triplet_iter() {
            out[(i, j)] += *v;
        }
        out
    }

    #[test]
    fn method_flags_round_trip() {
        assert_eq!(
            InterpolationMethod::from_flag(1).expect("flag"),
            InterpolationMethod::Simple
        );
        assert_eq!(
            InterpolationMethod::from_flag(2).expect("flag").flag(),
            2
        );
        assert_err_contains(InterpolationMethod::from_flag(3), "Unknown interpolation");
        assert_eq!(
            "Compact".parse::<InterpolationMethod>().expect("parse"),
            InterpolationMethod::Compact
        );
        assert!("spline".parse::<InterpolationMethod>().is_err());
    }

    #[test]
    fn rhs_operator_has_boundary_stencils() {
        let coeffs = CompactCoefficients::default();
        let a = dense(&build_rhs_operator(7, coeffs).expect("operator"));
        assert_eq!(a.shape(), (6, 7));

        let expected_first = [5.0 / 16.0, 15.0 / 16.0, -5.0 / 16.0, 1.0 / 16.0, 0.0, 0.0, 0.0];
        for j in 0..7 {
            assert!((a[(0, j)] - expected_first[j]).abs() < 1e-15, "col {j}");
            assert!((a[(5, 6 - j)] - expected_first[j]).abs() < 1e-15, "col {j}");
        }

        let expected_interior = [0.0, 0.05, 0.75, 0.75, 0.05, 0.0, 0.0];
        for j in 0..7 {
            assert!((a[(2, j)] - expected_interior[j]).abs() < 1e-15, "col {j}");
        }
    }

    #[test]
    fn rhs_operator_rows_preserve_constants() {
        let a = dense(&build_rhs_operator(9, CompactCoefficients::default()).expect("operator"));
        let lhs = build_lhs_system(9, CompactCoefficients::default()).expect("system");
        for i in 0..a.nrows() {
            let row_sum: f64 = a.row(i).iter().sum();
            let (l, d, u) = lhs.row(i);
            assert!((row_sum - (l + d + u)).abs() < 1e-14, "row {i}");
        }
    }

    #[test]
    fn lhs_system_boundary_rows_are_explicit() {
        let lhs = build_lhs_system(8, CompactCoefficients::default()).expect("system");
        assert_eq!(lhs.size(), 7);
        assert_eq!(lhs.row(0), (0.0, 1.0, 0.0));
        assert_eq!(lhs.row(6), (0.0, 1.0, 0.0));
        assert_eq!(lhs.row(3), (0.3, 1.0, 0.3));
        assert!(lhs.is_diagonally_dominant());
    }

    #[test]
    fn compact_rejects_short_fields() {
        let field = DMatrix::from_element(4, 3, 1.0);
        assert_err_contains(
            interpolate_midpoints(&field, InterpolationMethod::Compact),
            "at least 5 rows",
        );
        let single = DMatrix::from_element(1, 3, 1.0);
        assert_err_contains(
            interpolate_midpoints(&single, InterpolationMethod::Simple),
            "at least 2 rows",
        );
    }

    #[test]
    fn compact_is_exact_for_cubics() {
        let m = 12;
        let field = DMatrix::from_fn(m, 2, |i, j| {
            let x = i as f64;
            x * x * x - 2.0 * x + j as f64
        });
        let fi = interpolate_midpoints(&field, InterpolationMethod::Compact).expect("interp");
        for i in 0..m - 1 {
            let x = i as f64 + 0.5;
            for j in 0..2 {
                let exact = x * x * x - 2.0 * x + j as f64;
                assert!((fi[(i, j)] - exact).abs() < 1e-9, "row {i} col {j}");
            }
        }
    }

    #[test]
    fn unstable_alpha_is_rejected() {
        let field = DMatrix::from_element(6, 2, 1.0);
        let coeffs = CompactCoefficients {
            alpha: 0.6,
            a: 1.5,
            b: 0.1,
        };
        assert_err_contains(compact_midpoints(&field, coeffs), "diagonally dominant");
    }

    #[test]
    fn l1_error_checks_shapes() {
        let a = DMatrix::from_element(3, 2, 1.0);
        let b = DMatrix::from_element(3, 2, 1.5);
        assert!((interpolation_l1_error(&a, &b).expect("error") - 0.5).abs() < 1e-15);
        assert_err_contains(
            interpolation_l1_error(&a, &DMatrix::zeros(2, 2)),
            "Shape mismatch",
        );
    }
}
