//! Lattice of cubic-quintic nonlinear oscillators.
//!
//! The state vector is `[x_1..x_n, v_1..v_n]` with
//! `dx_i/dt = v_i` and `dv_i/dt = -(alpha + beta) x_i - b x_i^3 + c x_i^5`.

use crate::error::{fail, Result};
use crate::solvers::{integrate_on_grid, linspace, IntegrationStats, IntegratorSettings};
use crate::traits::DynamicalSystem;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OscillatorParams {
    pub alpha: f64,
    pub beta: f64,
    pub b: f64,
    pub c: f64,
}

impl OscillatorParams {
    pub fn new(alpha: f64, beta: f64, b: f64, c: f64) -> Self {
        Self { alpha, beta, b, c }
    }

    /// Linear stiffness `alpha + beta`.
    pub fn stiffness(&self) -> f64 {
        self.alpha + self.beta
    }

    /// Restoring acceleration at displacement `x`.
    pub fn acceleration(&self, x: f64) -> f64 {
        let x2 = x * x;
        x * (-self.stiffness() + x2 * (-self.b + self.c * x2))
    }

    pub fn potential(&self, x: f64) -> f64 {
        let x2 = x * x;
        0.5 * self.stiffness() * x2 + 0.25 * self.b * x2 * x2 - self.c * x2 * x2 * x2 / 6.0
    }
}

/// Oscillation frequency of the linearized system, `sqrt(alpha + beta) / (2 pi)`.
pub fn linear_frequency(params: &OscillatorParams) -> Result<f64> {
    let k = params.stiffness();
    if !(k > 0.0) {
        fail!(
            Configuration,
            "alpha + beta must be positive for oscillation, got {}.",
            k
        );
    }
    Ok(k.sqrt() / (2.0 * PI))
}

#[derive(Debug, Clone, Copy)]
pub struct OscillatorLattice {
    params: OscillatorParams,
    n: usize,
}

impl OscillatorLattice {
    pub fn new(params: OscillatorParams, n: usize) -> Self {
        Self { params, n }
    }

    pub fn oscillators(&self) -> usize {
        self.n
    }

    pub fn params(&self) -> &OscillatorParams {
        &self.params
    }
}

impl DynamicalSystem<f64> for OscillatorLattice {
    fn dimension(&self) -> usize {
        2 * self.n
    }

    fn apply(&self, _t: f64, x: &[f64], out: &mut [f64]) {
        let n = self.n;
        let (positions, velocities) = x.split_at(n);
        let (dx, dv) = out.split_at_mut(n);
        dx.copy_from_slice(velocities);
        for (acc, &xi) in dv.iter_mut().zip(positions.iter()) {
            *acc = self.params.acceleration(xi);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationSettings {
    /// Final time.
    pub tf: f64,
    /// Number of output intervals; the trajectory has `nt + 1` samples.
    pub nt: usize,
    pub integrator: IntegratorSettings,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            tf: 200.0,
            nt: 800,
            integrator: IntegratorSettings::default(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct OscillatorTrajectory {
    pub times: Vec<f64>,
    /// Shape (n, nt + 1).
    pub positions: DMatrix<f64>,
    /// Shape (n, nt + 1).
    pub velocities: DMatrix<f64>,
    pub stats: IntegrationStats,
}

impl OscillatorTrajectory {
    pub fn oscillators(&self) -> usize {
        self.positions.nrows()
    }

    pub fn samples(&self) -> usize {
        self.times.len()
    }

    /// Total mechanical energy at every sample.
    pub fn energy(&self, params: &OscillatorParams) -> Vec<f64> {
        (0..self.samples())
            .map(|k| {
                self.positions
                    .column(k)
                    .iter()
                    .zip(self.velocities.column(k).iter())
                    .map(|(&x, &v)| 0.5 * v * v + params.potential(x))
                    .sum()
            })
            .collect()
    }
}

/// Integrates the lattice from `y0` over `[0, tf]` and samples `nt + 1` uniform points.
pub fn simulate(
    y0: &[f64],
    params: OscillatorParams,
    settings: &SimulationSettings,
) -> Result<OscillatorTrajectory> {
    if y0.is_empty() || y0.len() % 2 != 0 {
        fail!(
            InvalidShape,
            "State vector must have positive even length (positions then velocities), got {}.",
            y0.len()
        );
    }
    if !(settings.tf > 0.0) {
        fail!(Configuration, "tf must be positive, got {}.", settings.tf);
    }
    if settings.nt == 0 {
        fail!(Configuration, "nt must be greater than zero.");
    }

    let n = y0.len() / 2;
    let lattice = OscillatorLattice::new(params, n);
    let grid = linspace(0.0, settings.tf, settings.nt);
    let solution = integrate_on_grid(&lattice, y0, &grid, &settings.integrator)?;

    let samples = grid.len();
    let positions = solution.states.rows(0, n).into_owned();
    let velocities = solution.states.rows(n, n).into_owned();
    debug_assert_eq!(positions.shape(), (n, samples));

    log::debug!(
        "simulated {} oscillators to t = {} ({} samples)",
        n,
        settings.tf,
        samples
    );

    Ok(OscillatorTrajectory {
        times: solution.times,
        positions,
        velocities,
        stats: solution.stats,
    })
}
