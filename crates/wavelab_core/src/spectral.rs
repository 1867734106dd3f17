//! Welch power spectral density and dominant-frequency estimation.

use crate::error::{fail, Result};
use nalgebra::DMatrix;
use num_complex::Complex;
use rustfft::FftPlanner;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Window {
    /// Periodic Hann window.
    Hann,
    Boxcar,
}

impl Window {
    pub fn values(self, n: usize) -> Vec<f64> {
        match self {
            Window::Boxcar => vec![1.0; n],
            Window::Hann => (0..n)
                .map(|i| 0.5 - 0.5 * (2.0 * PI * i as f64 / n as f64).cos())
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Detrend {
    None,
    /// Subtract the segment mean.
    Constant,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WelchSettings {
    pub nperseg: usize,
    /// Defaults to `nperseg / 2`.
    pub noverlap: Option<usize>,
    pub window: Window,
    pub detrend: Detrend,
}

impl Default for WelchSettings {
    fn default() -> Self {
        Self {
            nperseg: 256,
            noverlap: None,
            window: Window::Hann,
            detrend: Detrend::Constant,
        }
    }
}

/// One-sided power spectral density.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Psd {
    pub frequencies: Vec<f64>,
    pub density: Vec<f64>,
}

impl Psd {
    /// Frequency of the largest density value; the lowest such frequency on ties.
    pub fn peak_frequency(&self) -> Option<f64> {
        let mut best: Option<(usize, f64)> = None;
        for (k, &p) in self.density.iter().enumerate() {
            if !p.is_finite() {
                continue;
            }
            if best.map_or(true, |(_, value)| p > value) {
                best = Some((k, p));
            }
        }
        best.map(|(k, _)| self.frequencies[k])
    }

    pub fn resolution(&self) -> f64 {
        if self.frequencies.len() < 2 {
            return 0.0;
        }
        self.frequencies[1] - self.frequencies[0]
    }
}

/// Segment start offsets for windows of `nperseg` samples advanced by `step`.
fn segment_starts(len: usize, nperseg: usize, step: usize) -> Vec<usize> {
    (0..)
        .map(|k| k * step)
        .take_while(|start| start + nperseg <= len)
        .collect()
}

/// Welch estimate of the power spectral density of `x` sampled at `fs`.
pub fn welch(x: &[f64], fs: f64, settings: &WelchSettings) -> Result<Psd> {
    if x.is_empty() {
        fail!(InvalidShape, "Cannot estimate the spectrum of an empty signal.");
    }
    if !(fs > 0.0) || !fs.is_finite() {
        fail!(Configuration, "Sampling rate must be positive, got {}.", fs);
    }
    if settings.nperseg == 0 {
        fail!(Configuration, "nperseg must be greater than zero.");
    }

    let nperseg = settings.nperseg.min(x.len());
    let noverlap = settings.noverlap.unwrap_or(nperseg / 2);
    if noverlap >= nperseg {
        fail!(
            Configuration,
            "noverlap ({}) must be less than nperseg ({}).",
            noverlap,
            nperseg
        );
    }

    let window = settings.window.values(nperseg);
    let win_power: f64 = window.iter().map(|w| w * w).sum();
    let scale = 1.0 / (fs * win_power);
    let starts = segment_starts(x.len(), nperseg, nperseg - noverlap);

    let mut planner = FftPlanner::<f64>::new();
    let fft = planner.plan_fft_forward(nperseg);
    let n_freq = nperseg / 2 + 1;
    let mut accum = vec![0.0; n_freq];
    let mut buf = vec![Complex::new(0.0, 0.0); nperseg];

    for &start in &starts {
        let segment = &x[start..start + nperseg];
        let offset = match settings.detrend {
            Detrend::None => 0.0,
            Detrend::Constant => segment.iter().sum::<f64>() / nperseg as f64,
        };
        for ((dst, &v), &w) in buf.iter_mut().zip(segment.iter()).zip(window.iter()) {
            *dst = Complex::new((v - offset) * w, 0.0);
        }
        fft.process(&mut buf);
        for (k, a) in accum.iter_mut().enumerate() {
            let mut p = buf[k].norm_sqr() * scale;
            if k != 0 && !(nperseg % 2 == 0 && k == nperseg / 2) {
                p *= 2.0;
            }
            *a += p;
        }
    }

    let inv = 1.0 / starts.len() as f64;
    for v in &mut accum {
        *v *= inv;
    }

    Ok(Psd {
        frequencies: (0..n_freq).map(|k| k as f64 * fs / nperseg as f64).collect(),
        density: accum,
    })
}

pub fn dominant_frequency(x: &[f64], fs: f64, settings: &WelchSettings) -> Result<f64> {
    let psd = welch(x, fs, settings)?;
    match psd.peak_frequency() {
        Some(f) => Ok(f),
        None => fail!(SolverDivergence, "Spectral estimate has no finite peak."),
    }
}

/// Dominant frequency of every row of `y`, sampled at times `t`.
pub fn dominant_frequencies(
    t: &[f64],
    y: &DMatrix<f64>,
    settings: &WelchSettings,
) -> Result<Vec<f64>> {
    if t.len() < 2 {
        fail!(
            InvalidShape,
            "At least two time samples are required, got {}.",
            t.len()
        );
    }
    if y.ncols() != t.len() {
        fail!(
            InvalidShape,
            "Trajectory has {} samples but {} times were given.",
            y.ncols(),
            t.len()
        );
    }
    let dt = t[1] - t[0];
    if !(dt > 0.0) {
        fail!(Configuration, "Time samples must be increasing, got dt = {}.", dt);
    }
    let fs = 1.0 / dt;

    let mut row = vec![0.0; y.ncols()];
    (0..y.nrows())
        .map(|i| {
            for (dst, src) in row.iter_mut().zip(y.row(i).iter()) {
                *dst = *src;
            }
            dominant_frequency(&row, fs, settings)
        })
        .collect()
}
