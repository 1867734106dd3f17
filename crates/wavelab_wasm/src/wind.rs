//! Wind-field PCA bindings.

use crate::shared::{js_error, matrix_to_row_major, to_js};
use anyhow::Context;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wavelab_core::pca::{analyze_wind as core_analyze, cumulative_variance, WindField};

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct WindPayload {
    nlat: usize,
    nlon: usize,
    singular_values: Vec<f64>,
    explained_variance_ratio: Vec<f64>,
    cumulative_variance: Vec<f64>,
    /// `modes` spatial patterns, each row-major `nlat x nlon`.
    spatial_modes: Vec<Vec<f64>>,
    /// Time series of the retained modes.
    scores: Vec<Vec<f64>>,
    spectrum_frequencies: Vec<f64>,
    spectrum_power: Vec<f64>,
    peak_frequency: f64,
}

/// Runs the PCA pipeline on `u` ordered `[time][lat][lon]` and returns the leading
/// `modes` components together with the spectrum of the first one.
#[wasm_bindgen]
pub fn analyze_wind(
    lat: Vec<f64>,
    lon: Vec<f64>,
    times: Vec<f64>,
    u: Vec<f64>,
    modes: usize,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let payload = build_wind_payload(lat, lon, times, &u, modes).map_err(js_error)?;
    to_js(&payload)
}

pub(crate) fn build_wind_payload(
    lat: Vec<f64>,
    lon: Vec<f64>,
    times: Vec<f64>,
    u: &[f64],
    modes: usize,
) -> anyhow::Result<WindPayload> {
    let (nlat, nlon) = (lat.len(), lon.len());
    let field = WindField::new(lat, lon, times, u).context("Invalid wind dataset")?;
    let analysis = core_analyze(&field).context("Wind PCA failed")?;
    let pca = &analysis.pca;
    let keep = modes.max(1).min(pca.modes());

    let mut spatial_modes = Vec::with_capacity(keep);
    let mut scores = Vec::with_capacity(keep);
    for k in 0..keep {
        spatial_modes.push(matrix_to_row_major(&pca.spatial_mode(k, nlat, nlon)?));
        scores.push(pca.score_series(k)?);
    }

    Ok(WindPayload {
        nlat,
        nlon,
        singular_values: pca.singular_values[..keep].to_vec(),
        explained_variance_ratio: pca.explained_variance_ratio[..keep].to_vec(),
        cumulative_variance: cumulative_variance(&pca.explained_variance_ratio)[..keep].to_vec(),
        spatial_modes,
        scores,
        spectrum_frequencies: analysis.leading_spectrum.frequencies.clone(),
        spectrum_power: analysis.leading_spectrum.power.clone(),
        peak_frequency: analysis.leading_spectrum.peak_frequency,
    })
}
