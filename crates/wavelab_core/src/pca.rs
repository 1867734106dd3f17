//! Principal-component (EOF) analysis of a gridded wind-speed record.
//!
//! The data matrix is laid out time x space, with the spatial index running over
//! `lat * lon` in row-major order (longitude fastest).

use crate::error::{fail, Result};
use nalgebra::linalg::SVD;
use nalgebra::DMatrix;
use num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub struct WindField {
    pub lat: Vec<f64>,
    pub lon: Vec<f64>,
    pub times: Vec<f64>,
    /// Shape (times, lat * lon).
    pub u: DMatrix<f64>,
}

impl WindField {
    /// Builds a field from values ordered `[time][lat][lon]`.
    pub fn new(lat: Vec<f64>, lon: Vec<f64>, times: Vec<f64>, values: &[f64]) -> Result<Self> {
        let nt = times.len();
        let space = lat.len() * lon.len();
        if nt == 0 || space == 0 {
            fail!(
                InvalidShape,
                "Wind field needs non-empty time, lat and lon axes (got {}, {}, {}).",
                nt,
                lat.len(),
                lon.len()
            );
        }
        if values.len() != nt * space {
            fail!(
                InvalidShape,
                "Expected {} values for {} x {} x {}, got {}.",
                nt * space,
                nt,
                lat.len(),
                lon.len(),
                values.len()
            );
        }
        Ok(Self {
            u: DMatrix::from_row_slice(nt, space, values),
            lat,
            lon,
            times,
        })
    }

    pub fn sample_spacing(&self) -> Result<f64> {
        if self.times.len() < 2 {
            fail!(InvalidShape, "Need at least two time samples for a spacing.");
        }
        let dt = self.times[1] - self.times[0];
        if !(dt > 0.0) {
            fail!(Configuration, "Time axis must be increasing, got dt = {}.", dt);
        }
        Ok(dt)
    }
}

/// Column-wise z-score with population standard deviation. Columns with zero variance
/// are only centred.
pub fn standardize(x: &DMatrix<f64>) -> DMatrix<f64> {
    let mut z = x.clone();
    let rows = x.nrows() as f64;
    for mut column in z.column_iter_mut() {
        let mean = column.iter().sum::<f64>() / rows;
        let var = column.iter().map(|v| (v - mean) * (v - mean)).sum::<f64>() / rows;
        let std = var.sqrt();
        for v in column.iter_mut() {
            *v -= mean;
            if std > 0.0 {
                *v /= std;
            }
        }
    }
    z
}

#[derive(Debug, Clone)]
pub struct PcaResult {
    /// Descending.
    pub singular_values: Vec<f64>,
    /// One row per mode, one column per spatial point.
    pub components: DMatrix<f64>,
    /// One column per mode, one row per time sample.
    pub scores: DMatrix<f64>,
    pub explained_variance_ratio: Vec<f64>,
}

impl PcaResult {
    pub fn modes(&self) -> usize {
        self.singular_values.len()
    }

    /// Reshapes component `k` onto the `nlat x nlon` grid.
    pub fn spatial_mode(&self, k: usize, nlat: usize, nlon: usize) -> Result<DMatrix<f64>> {
        if k >= self.modes() {
            fail!(
                InvalidShape,
                "Mode {} requested but only {} are available.",
                k,
                self.modes()
            );
        }
        if nlat * nlon != self.components.ncols() {
            fail!(
                InvalidShape,
                "Grid {} x {} does not match {} spatial points.",
                nlat,
                nlon,
                self.components.ncols()
            );
        }
        let row: Vec<f64> = self.components.row(k).iter().copied().collect();
        Ok(DMatrix::from_row_slice(nlat, nlon, &row))
    }

    pub fn score_series(&self, k: usize) -> Result<Vec<f64>> {
        if k >= self.modes() {
            fail!(
                InvalidShape,
                "Mode {} requested but only {} are available.",
                k,
                self.modes()
            );
        }
        Ok(self.scores.column(k).iter().copied().collect())
    }
}

/// Standardizes `x` (time x space) and decomposes it with a thin SVD.
pub fn principal_components(x: &DMatrix<f64>) -> Result<PcaResult> {
    let (nt, ns) = x.shape();
    if nt < 2 || ns == 0 {
        fail!(
            InvalidShape,
            "PCA needs at least 2 time samples and 1 spatial point, got {} x {}.",
            nt,
            ns
        );
    }
    if x.iter().any(|v| !v.is_finite()) {
        fail!(InvalidShape, "Data matrix contains non-finite values.");
    }

    let z = standardize(x);
    let svd = SVD::new(z, true, true);
    let (u, v_t) = match (svd.u, svd.v_t) {
        (Some(u), Some(v_t)) => (u, v_t),
        _ => fail!(SolverDivergence, "SVD did not produce singular vectors."),
    };

    let mut order: Vec<usize> = (0..svd.singular_values.len()).collect();
    order.sort_by(|&a, &b| {
        svd.singular_values[b]
            .partial_cmp(&svd.singular_values[a])
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let modes = order.len();
    let singular_values: Vec<f64> = order.iter().map(|&k| svd.singular_values[k]).collect();
    let components = DMatrix::from_fn(modes, ns, |k, j| v_t[(order[k], j)]);
    let scores = DMatrix::from_fn(nt, modes, |t, k| u[(t, order[k])] * singular_values[k]);

    let total: f64 = singular_values.iter().map(|s| s * s).sum();
    let explained_variance_ratio = if total > 0.0 {
        singular_values.iter().map(|s| s * s / total).collect()
    } else {
        vec![0.0; modes]
    };

    log::debug!(
        "pca: {} samples x {} points, leading mode explains {:.3}",
        nt,
        ns,
        explained_variance_ratio.first().copied().unwrap_or(0.0)
    );

    Ok(PcaResult {
        singular_values,
        components,
        scores,
        explained_variance_ratio,
    })
}

pub fn cumulative_variance(ratios: &[f64]) -> Vec<f64> {
    ratios
        .iter()
        .scan(0.0, |acc, r| {
            *acc += r;
            Some(*acc)
        })
        .collect()
}

/// Zero-centred power spectrum of a series and the frequency of its largest peak.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpectrumPeak {
    pub frequencies: Vec<f64>,
    pub power: Vec<f64>,
    /// Absolute value of the frequency at the first maximum of `power`.
    pub peak_frequency: f64,
}

/// Frequencies of an `n`-point DFT with spacing `dt`, already shifted so that zero sits
/// in the middle.
fn shifted_frequencies(n: usize, dt: f64) -> Vec<f64> {
    let neg = n / 2;
    (0..n)
        .map(|i| (i as f64 - neg as f64) / (n as f64 * dt))
        .collect()
}

pub fn leading_frequency(series: &[f64], dt: f64) -> Result<SpectrumPeak> {
    let n = series.len();
    if n < 2 {
        fail!(InvalidShape, "Need at least two samples, got {}.", n);
    }
    if !(dt > 0.0) {
        fail!(Configuration, "Sample spacing must be positive, got {}.", dt);
    }

    let mut buf: Vec<Complex<f64>> = series.iter().map(|&v| Complex::new(v, 0.0)).collect();
    let mut planner = FftPlanner::<f64>::new();
    planner.plan_fft_forward(n).process(&mut buf);

    let shift = n / 2;
    let power: Vec<f64> = (0..n)
        .map(|i| buf[(i + n - shift) % n].norm_sqr())
        .collect();
    let frequencies = shifted_frequencies(n, dt);

    let mut peak = 0usize;
    for (i, &p) in power.iter().enumerate() {
        if p > power[peak] {
            peak = i;
        }
    }

    Ok(SpectrumPeak {
        peak_frequency: frequencies[peak].abs(),
        frequencies,
        power,
    })
}

/// Result of the full wind-field pipeline.
#[derive(Debug, Clone)]
pub struct WindAnalysis {
    pub pca: PcaResult,
    pub leading_spectrum: SpectrumPeak,
}

pub fn analyze_wind(field: &WindField) -> Result<WindAnalysis> {
    let dt = field.sample_spacing()?;
    let pca = principal_components(&field.u)?;
    let leading = pca.score_series(0)?;
    let leading_spectrum = leading_frequency(&leading, dt)?;
    Ok(WindAnalysis {
        pca,
        leading_spectrum,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;

    fn assert_err_contains<T: std::fmt::Debug>(result: Result<T>, needle: &str) {
        let err = result.expect_err("expected error");
        let message = format!("{err}");
        assert!(
            message.contains(needle),
            "expected error to contain \"{needle}\", got \"{message}\""
        );
    }

    #[test]
    fn standardize_gives_zero_mean_unit_variance() {
        let x = DMatrix::from_row_slice(4, 2, &[1.0, 5.0, 2.0, 5.0, 3.0, 5.0, 4.0, 5.0]);
        let z = standardize(&x);
        let col0: Vec<f64> = z.column(0).iter().copied().collect();
        assert!(col0.iter().sum::<f64>().abs() < 1e-12);
        let var = col0.iter().map(|v| v * v).sum::<f64>() / 4.0;
        assert!((var - 1.0).abs() < 1e-12);
        assert!(z.column(1).iter().all(|v| *v == 0.0));
    }

    #[test]
    fn variance_ratios_sum_to_one_and_descend() {
        let x = DMatrix::from_fn(30, 6, |t, j| {
            let t = t as f64;
            (0.3 * t).sin() * (j as f64 + 1.0) + 0.1 * (1.7 * t + j as f64).cos()
        });
        let result = principal_components(&x).expect("pca");
        let total: f64 = result.explained_variance_ratio.iter().sum();
        assert!((total - 1.0).abs() < 1e-12);
        for w in result.singular_values.windows(2) {
            assert!(w[0] >= w[1]);
        }
        let cumulative = cumulative_variance(&result.explained_variance_ratio);
        assert!((cumulative[cumulative.len() - 1] - 1.0).abs() < 1e-12);
    }

    #[test]
    fn scores_reconstruct_standardized_data() {
        let x = DMatrix::from_fn(12, 4, |t, j| ((t * 7 + j * 3) % 5) as f64 + 0.1 * j as f64);
        let result = principal_components(&x).expect("pca");
        let reconstructed = &result.scores * &result.components;
        let z = standardize(&x);
        assert!((reconstructed - z).norm() < 1e-10);
    }

    #[test]
    fn single_mode_field_is_captured_by_first_component() {
        let nt = 64;
        let dt = 0.5;
        let pattern = [1.0, -2.0, 0.5, 3.0, -1.0, 0.25];
        let values: Vec<f64> = (0..nt)
            .flat_map(|t| {
                let amp = (2.0 * PI * 0.125 * t as f64 * dt).cos();
                pattern.iter().map(move |p| 10.0 + p * amp)
            })
            .collect();
        let times: Vec<f64> = (0..nt).map(|t| t as f64 * dt).collect();
        let field = WindField::new(vec![0.0, 1.0], vec![0.0, 1.0, 2.0], times, &values)
            .expect("field");
        let analysis = analyze_wind(&field).expect("analysis");
        assert!(analysis.pca.explained_variance_ratio[0] > 0.999);
        assert!((analysis.leading_spectrum.peak_frequency - 0.125).abs() < 1e-12);
        let mode = analysis.pca.spatial_mode(0, 2, 3).expect("mode");
        assert_eq!(mode.shape(), (2, 3));
    }

    #[test]
    fn shifted_frequencies_match_fftshift() {
        let f = shifted_frequencies(4, 1.0);
        assert_eq!(f, vec![-0.5, -0.25, 0.0, 0.25]);
        let f = shifted_frequencies(5, 1.0);
        assert_eq!(f, vec![-0.4, -0.2, 0.0, 0.2, 0.4]);
    }

    #[test]
    fn wind_field_validates_sizes() {
        assert_err_contains(
            WindField::new(vec![0.0], vec![0.0, 1.0], vec![0.0, 1.0], &[1.0, 2.0, 3.0]),
            "Expected 4 values",
        );
        assert_err_contains(
            principal_components(&DMatrix::zeros(1, 3)),
            "at least 2 time samples",
        );
    }
}
