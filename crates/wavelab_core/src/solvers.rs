use crate::error::{fail, AnalysisError, Result};
use crate::traits::DynamicalSystem;
use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use std::str::FromStr;

const SAFETY: f64 = 0.9;
const MIN_FACTOR: f64 = 0.2;
const MAX_FACTOR: f64 = 10.0;

/// Embedded explicit Runge-Kutta pairs with step-size control.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AdaptiveMethod {
    /// Bogacki-Shampine 3(2).
    #[serde(rename = "RK23")]
    Rk23,
    /// Dormand-Prince 5(4).
    #[serde(rename = "RK45")]
    Rk45,
}

impl AdaptiveMethod {
    pub fn name(self) -> &'static str {
        match self {
            AdaptiveMethod::Rk23 => "RK23",
            AdaptiveMethod::Rk45 => "RK45",
        }
    }

    pub fn tableau(self) -> &'static ButcherTableau {
        match self {
            AdaptiveMethod::Rk23 => &RK23,
            AdaptiveMethod::Rk45 => &RK45,
        }
    }
}

impl FromStr for AdaptiveMethod {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RK23" => Ok(AdaptiveMethod::Rk23),
            "RK45" => Ok(AdaptiveMethod::Rk45),
            "RADAU" | "BDF" | "LSODA" => fail!(
                Configuration,
                "Implicit method \"{}\" is not available; use RK23 or RK45.",
                s
            ),
            _ => fail!(Configuration, "Unknown ODE solver method \"{}\".", s),
        }
    }
}

/// Coefficients of an embedded pair. `a[s]` holds the stage weights for stage `s`
/// (the first row is empty). `e` has one more entry than `b`: the FSAL stage.
/// Row `s` of `p` maps stage `s` onto the dense-output polynomial `x, x^2, ...`.
#[derive(Debug)]
pub struct ButcherTableau {
    pub c: &'static [f64],
    pub a: &'static [&'static [f64]],
    pub b: &'static [f64],
    pub e: &'static [f64],
    pub p: &'static [&'static [f64]],
    pub order: usize,
    pub error_estimator_order: usize,
}

impl ButcherTableau {
    pub fn stages(&self) -> usize {
        self.b.len()
    }
}

pub static RK23: ButcherTableau = ButcherTableau {
    c: &[0.0, 1.0 / 2.0, 3.0 / 4.0],
    a: &[&[], &[1.0 / 2.0], &[0.0, 3.0 / 4.0]],
    b: &[2.0 / 9.0, 1.0 / 3.0, 4.0 / 9.0],
    e: &[5.0 / 72.0, -1.0 / 12.0, -1.0 / 9.0, 1.0 / 8.0],
    p: &[
        &[1.0, -4.0 / 3.0, 5.0 / 9.0],
        &[0.0, 1.0, -2.0 / 3.0],
        &[0.0, 4.0 / 3.0, -8.0 / 9.0],
        &[0.0, -1.0, 1.0],
    ],
    order: 3,
    error_estimator_order: 2,
};

pub static RK45: ButcherTableau = ButcherTableau {
    c: &[0.0, 1.0 / 5.0, 3.0 / 10.0, 4.0 / 5.0, 8.0 / 9.0, 1.0],
    a: &[
        &[],
        &[1.0 / 5.0],
        &[3.0 / 40.0, 9.0 / 40.0],
        &[44.0 / 45.0, -56.0 / 15.0, 32.0 / 9.0],
        &[
            19372.0 / 6561.0,
            -25360.0 / 2187.0,
            64448.0 / 6561.0,
            -212.0 / 729.0,
        ],
        &[
            9017.0 / 3168.0,
            -355.0 / 33.0,
            46732.0 / 5247.0,
            49.0 / 176.0,
            -5103.0 / 18656.0,
        ],
    ],
    b: &[
        35.0 / 384.0,
        0.0,
        500.0 / 1113.0,
        125.0 / 192.0,
        -2187.0 / 6784.0,
        11.0 / 84.0,
    ],
    e: &[
        -71.0 / 57600.0,
        0.0,
        71.0 / 16695.0,
        -71.0 / 1920.0,
        17253.0 / 339200.0,
        -22.0 / 525.0,
        1.0 / 40.0,
    ],
    p: &[
        &[
            1.0,
            -8048581381.0 / 2820520608.0,
            8663915743.0 / 2820520608.0,
            -12715105075.0 / 11282082432.0,
        ],
        &[0.0, 0.0, 0.0, 0.0],
        &[
            0.0,
            131558114200.0 / 32700410799.0,
            -68118460800.0 / 10900136933.0,
            87487479700.0 / 32700410799.0,
        ],
        &[
            0.0,
            -1754552775.0 / 470086768.0,
            14199869525.0 / 1410260304.0,
            -10690763975.0 / 1880347072.0,
        ],
        &[
            0.0,
            127303824393.0 / 49829197408.0,
            -318862633887.0 / 49829197408.0,
            701980252875.0 / 199316789632.0,
        ],
        &[
            0.0,
            -282668133.0 / 205662961.0,
            2019193451.0 / 616988883.0,
            -1453857185.0 / 822651844.0,
        ],
        &[
            0.0,
            40617522.0 / 29380423.0,
            -110615467.0 / 29380423.0,
            69997945.0 / 29380423.0,
        ],
    ],
    order: 5,
    error_estimator_order: 4,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntegratorSettings {
    pub method: AdaptiveMethod,
    pub rtol: f64,
    pub atol: f64,
    pub max_steps: usize,
    pub first_step: Option<f64>,
    pub max_step: Option<f64>,
}

impl Default for IntegratorSettings {
    fn default() -> Self {
        Self {
            method: AdaptiveMethod::Rk45,
            rtol: 1e-6,
            atol: 1e-6,
            max_steps: 1_000_000,
            first_step: None,
            max_step: None,
        }
    }
}

impl IntegratorSettings {
    pub fn with_rtol(mut self, rtol: f64) -> Self {
        self.rtol = rtol;
        self
    }

    pub fn with_method(mut self, method: AdaptiveMethod) -> Self {
        self.method = method;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.rtol > 0.0) {
            fail!(Configuration, "rtol must be positive, got {}.", self.rtol);
        }
        if !(self.atol > 0.0) {
            fail!(Configuration, "atol must be positive, got {}.", self.atol);
        }
        if self.max_steps == 0 {
            fail!(Configuration, "max_steps must be greater than zero.");
        }
        if let Some(h) = self.first_step {
            if !(h > 0.0) {
                fail!(Configuration, "first_step must be positive, got {}.", h);
            }
        }
        if let Some(h) = self.max_step {
            if !(h > 0.0) {
                fail!(Configuration, "max_step must be positive, got {}.", h);
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrationStats {
    pub accepted: usize,
    pub rejected: usize,
    pub evaluations: usize,
}

/// Solution sampled on a caller-supplied time grid.
#[derive(Debug, Clone)]
pub struct DenseSolution {
    pub times: Vec<f64>,
    /// One column per grid point, one row per state component.
    pub states: DMatrix<f64>,
    pub stats: IntegrationStats,
}

/// Adaptive embedded Runge-Kutta stepper.
pub struct EmbeddedRk {
    tableau: &'static ButcherTableau,
    settings: IntegratorSettings,
    t: f64,
    t_bound: f64,
    y: Vec<f64>,
    f: Vec<f64>,
    h_abs: f64,
    t_old: f64,
    y_old: Vec<f64>,
    k: Vec<Vec<f64>>,
    tmp: Vec<f64>,
    y_new: Vec<f64>,
    stats: IntegrationStats,
}

impl EmbeddedRk {
    pub fn new(
        system: &impl DynamicalSystem<f64>,
        t0: f64,
        y0: &[f64],
        t_bound: f64,
        settings: IntegratorSettings,
    ) -> Result<Self> {
        settings.validate()?;
        let dim = y0.len();
        if system.dimension() != dim {
            fail!(
                InvalidShape,
                "Initial state dimension mismatch. Expected {}, got {}.",
                system.dimension(),
                dim
            );
        }
        if !(t_bound > t0) {
            fail!(
                Configuration,
                "Final time {} must exceed initial time {}.",
                t_bound,
                t0
            );
        }
        if y0.iter().any(|v| !v.is_finite()) {
            fail!(InvalidShape, "Initial state contains non-finite values.");
        }

        let tableau = settings.method.tableau();
        let mut f = vec![0.0; dim];
        system.apply(t0, y0, &mut f);

        let mut stepper = Self {
            tableau,
            settings,
            t: t0,
            t_bound,
            y: y0.to_vec(),
            f,
            h_abs: 0.0,
            t_old: t0,
            y_old: y0.to_vec(),
            k: vec![vec![0.0; dim]; tableau.stages() + 1],
            tmp: vec![0.0; dim],
            y_new: vec![0.0; dim],
            stats: IntegrationStats {
                evaluations: 1,
                ..IntegrationStats::default()
            },
        };
        stepper.h_abs = match settings.first_step {
            Some(h) => h.min(t_bound - t0),
            None => stepper.select_initial_step(system),
        };
        Ok(stepper)
    }

    pub fn t(&self) -> f64 {
        self.t
    }

    pub fn state(&self) -> &[f64] {
        &self.y
    }

    pub fn stats(&self) -> IntegrationStats {
        self.stats
    }

    pub fn is_finished(&self) -> bool {
        self.t >= self.t_bound
    }

    fn state_scale(&self, out: &mut [f64]) {
        let IntegratorSettings { rtol, atol, .. } = self.settings;
        for (s, y) in out.iter_mut().zip(self.y.iter()) {
            *s = atol + y.abs() * rtol;
        }
    }

    /// Hairer-Norsett-Wanner starting step heuristic.
    fn select_initial_step(&mut self, system: &impl DynamicalSystem<f64>) -> f64 {
        let dim = self.y.len();
        let interval = self.t_bound - self.t;
        if dim == 0 {
            return interval;
        }
        let mut scale = vec![0.0; dim];
        self.state_scale(&mut scale);

        let d0 = rms_scaled(&self.y, &scale);
        let d1 = rms_scaled(&self.f, &scale);
        let h0 = if d0 < 1e-5 || d1 < 1e-5 {
            1e-6
        } else {
            0.01 * d0 / d1
        }
        .min(interval);

        for i in 0..dim {
            self.tmp[i] = self.y[i] + h0 * self.f[i];
        }
        let mut f1 = vec![0.0; dim];
        system.apply(self.t + h0, &self.tmp, &mut f1);
        self.stats.evaluations += 1;

        let diff: Vec<f64> = f1.iter().zip(self.f.iter()).map(|(a, b)| a - b).collect();
        let d2 = rms_scaled(&diff, &scale) / h0;

        let h1 = if d1 <= 1e-15 && d2 <= 1e-15 {
            (h0 * 1e-3).max(1e-6)
        } else {
            (0.01 / d1.max(d2)).powf(1.0 / (self.tableau.order as f64 + 1.0))
        };

        (100.0 * h0).min(h1).min(interval)
    }

    /// Evaluates all stages for a step of size `h` and writes the high-order solution to
    /// `y_new`; the last row of `k` receives `f(t + h, y_new)`.
    fn rk_step(&mut self, system: &impl DynamicalSystem<f64>, h: f64) {
        let tab = self.tableau;
        let dim = self.y.len();
        let stages = tab.stages();

        self.k[0].copy_from_slice(&self.f);
        for s in 1..stages {
            for i in 0..dim {
                let mut dy = 0.0;
                for (j, &a) in tab.a[s].iter().enumerate() {
                    dy += a * self.k[j][i];
                }
                self.tmp[i] = self.y[i] + h * dy;
            }
            system.apply(self.t + tab.c[s] * h, &self.tmp, &mut self.k[s]);
        }

        for i in 0..dim {
            let mut dy = 0.0;
            for s in 0..stages {
                dy += tab.b[s] * self.k[s][i];
            }
            self.y_new[i] = self.y[i] + h * dy;
        }
        system.apply(self.t + h, &self.y_new, &mut self.k[stages]);
        self.stats.evaluations += stages;
    }

    fn error_norm(&self, h: f64) -> f64 {
        let dim = self.y.len();
        if dim == 0 {
            return 0.0;
        }
        let IntegratorSettings { rtol, atol, .. } = self.settings;
        let mut sum = 0.0;
        for i in 0..dim {
            let mut err = 0.0;
            for (s, &e) in self.tableau.e.iter().enumerate() {
                err += e * self.k[s][i];
            }
            let scale = atol + self.y[i].abs().max(self.y_new[i].abs()) * rtol;
            let ratio = h * err / scale;
            sum += ratio * ratio;
        }
        (sum / dim as f64).sqrt()
    }

    /// Advances by one accepted step, retrying with smaller steps on rejection.
    pub fn step(&mut self, system: &impl DynamicalSystem<f64>) -> Result<()> {
        if self.is_finished() {
            return Ok(());
        }
        let min_step = 10.0 * spacing(self.t);
        let mut h_abs = self.h_abs;
        if let Some(max_step) = self.settings.max_step {
            h_abs = h_abs.min(max_step);
        }
        h_abs = h_abs.max(min_step);

        let exponent = -1.0 / (self.tableau.error_estimator_order as f64 + 1.0);
        let mut rejected = false;

        loop {
            if h_abs < min_step {
                fail!(
                    SolverDivergence,
                    "Step size collapsed to {:e} at t = {} (minimum {:e}).",
                    h_abs,
                    self.t,
                    min_step
                );
            }
            if self.stats.accepted + self.stats.rejected >= self.settings.max_steps {
                fail!(
                    SolverDivergence,
                    "Exceeded max_steps = {} before reaching t = {} (stopped at t = {}).",
                    self.settings.max_steps,
                    self.t_bound,
                    self.t
                );
            }

            let t_new = (self.t + h_abs).min(self.t_bound);
            let h = t_new - self.t;
            h_abs = h;

            self.rk_step(system, h);
            let error_norm = self.error_norm(h);

            let finite = self.y_new.iter().all(|v| v.is_finite());
            if finite && error_norm.is_finite() && error_norm < 1.0 {
                let mut factor = if error_norm == 0.0 {
                    MAX_FACTOR
                } else {
                    MAX_FACTOR.min(SAFETY * error_norm.powf(exponent))
                };
                if rejected {
                    factor = factor.min(1.0);
                }
                self.stats.accepted += 1;

                self.t_old = self.t;
                std::mem::swap(&mut self.y_old, &mut self.y);
                self.y.copy_from_slice(&self.y_new);
                let stages = self.tableau.stages();
                self.f.copy_from_slice(&self.k[stages]);
                self.t = t_new;
                self.h_abs = h_abs * factor;
                return Ok(());
            }

            let factor = if finite && error_norm.is_finite() {
                MIN_FACTOR.max(SAFETY * error_norm.powf(exponent))
            } else {
                MIN_FACTOR
            };
            h_abs *= factor;
            rejected = true;
            self.stats.rejected += 1;
            log::trace!(
                "rejected step at t = {} (error norm {:e}), retrying with h = {:e}",
                self.t,
                error_norm,
                h_abs
            );
        }
    }

    /// Dense output over the last accepted step, valid for `t` in `[t_old, t]`.
    pub fn interpolate(&self, t: f64, out: &mut [f64]) {
        let h = self.t - self.t_old;
        if h == 0.0 {
            out.copy_from_slice(&self.y);
            return;
        }
        let x = (t - self.t_old) / h;
        let weights: Vec<f64> = self
            .tableau
            .p
            .iter()
            .map(|row| {
                let mut power = 1.0;
                let mut w = 0.0;
                for &coef in row.iter() {
                    power *= x;
                    w += coef * power;
                }
                w
            })
            .collect();
        for i in 0..out.len() {
            let mut acc = 0.0;
            for (s, &w) in weights.iter().enumerate() {
                acc += w * self.k[s][i];
            }
            out[i] = self.y_old[i] + h * acc;
        }
    }
}

/// Integrates `system` from `grid[0]` to the last grid point and samples the solution at
/// every grid point through dense output.
pub fn integrate_on_grid(
    system: &impl DynamicalSystem<f64>,
    y0: &[f64],
    grid: &[f64],
    settings: &IntegratorSettings,
) -> Result<DenseSolution> {
    if grid.is_empty() {
        fail!(InvalidShape, "Output time grid must not be empty.");
    }
    if grid.windows(2).any(|w| !(w[1] > w[0])) {
        fail!(Configuration, "Output time grid must be strictly increasing.");
    }
    settings.validate()?;

    let dim = y0.len();
    let samples = grid.len();
    let mut flat = Vec::with_capacity(dim * samples);
    flat.extend_from_slice(y0);

    if samples == 1 {
        return Ok(DenseSolution {
            times: grid.to_vec(),
            states: DMatrix::from_column_slice(dim, 1, &flat),
            stats: IntegrationStats::default(),
        });
    }

    let t_final = grid[samples - 1];
    let mut stepper = EmbeddedRk::new(system, grid[0], y0, t_final, *settings)?;
    let mut sample = vec![0.0; dim];
    let mut next = 1usize;
    let warn_at = settings.max_steps - settings.max_steps / 10;
    let mut warned = false;

    while next < samples {
        stepper.step(system)?;
        while next < samples && grid[next] <= stepper.t() {
            stepper.interpolate(grid[next], &mut sample);
            flat.extend_from_slice(&sample);
            next += 1;
        }
        let stats = stepper.stats();
        if !warned && stats.accepted + stats.rejected >= warn_at {
            log::warn!(
                "{} integration has used {} of {} steps at t = {}",
                settings.method.name(),
                stats.accepted + stats.rejected,
                settings.max_steps,
                stepper.t()
            );
            warned = true;
        }
    }

    let stats = stepper.stats();
    log::debug!(
        "{} integration to t = {}: {} accepted, {} rejected, {} evaluations",
        settings.method.name(),
        t_final,
        stats.accepted,
        stats.rejected,
        stats.evaluations
    );

    Ok(DenseSolution {
        times: grid.to_vec(),
        states: DMatrix::from_column_slice(dim, samples, &flat),
        stats,
    })
}

/// Uniform grid of `intervals + 1` points on `[start, end]`.
pub fn linspace(start: f64, end: f64, intervals: usize) -> Vec<f64> {
    if intervals == 0 {
        return vec![start];
    }
    let step = (end - start) / intervals as f64;
    (0..=intervals)
        .map(|i| {
            if i == intervals {
                end
            } else {
                start + step * i as f64
            }
        })
        .collect()
}

fn rms_scaled(values: &[f64], scale: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let sum: f64 = values
        .iter()
        .zip(scale.iter())
        .map(|(v, s)| (v / s) * (v / s))
        .sum();
    (sum / values.len() as f64).sqrt()
}

/// Distance from `t` to the next representable float towards +infinity.
fn spacing(t: f64) -> f64 {
    if t == 0.0 {
        return f64::from_bits(1);
    }
    let magnitude = t.abs();
    f64::from_bits(magnitude.to_bits() + 1) - magnitude
}
