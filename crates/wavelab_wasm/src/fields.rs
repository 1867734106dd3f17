//! Mid-point interpolation bindings.

use crate::shared::{js_error, matrix_from_row_major, matrix_to_row_major, to_js};
use anyhow::Context;
use js_sys::Float64Array;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wavelab_core::interpolation::{
    interpolate_midpoints, interpolation_l1_error, InterpolationMethod,
};

/// Interpolates a row-major `rows x cols` field to its row midpoints.
#[wasm_bindgen]
pub fn interpolate_field(
    values: Vec<f64>,
    rows: usize,
    cols: usize,
    method: u8,
) -> Result<Float64Array, JsValue> {
    console_error_panic_hook::set_once();
    let out = run_interpolation(&values, rows, cols, method).map_err(js_error)?;
    Ok(Float64Array::from(out.as_slice()))
}

/// Mean absolute error of both schemes against a row-major reference of shape
/// `(rows - 1) x cols`.
#[wasm_bindgen]
pub fn interpolation_errors(
    values: Vec<f64>,
    exact: Vec<f64>,
    rows: usize,
    cols: usize,
) -> Result<JsValue, JsValue> {
    console_error_panic_hook::set_once();
    let payload = compare_methods(&values, &exact, rows, cols).map_err(js_error)?;
    to_js(&payload)
}

pub(crate) fn run_interpolation(
    values: &[f64],
    rows: usize,
    cols: usize,
    method: u8,
) -> anyhow::Result<Vec<f64>> {
    let method = InterpolationMethod::from_flag(method)?;
    let field = matrix_from_row_major(values, rows, cols)?;
    let interpolated = interpolate_midpoints(&field, method)
        .with_context(|| format!("{:?} interpolation of a {} x {} field", method, rows, cols))?;
    Ok(matrix_to_row_major(&interpolated))
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct InterpolationErrorsPayload {
    simple: f64,
    compact: f64,
}

pub(crate) fn compare_methods(
    values: &[f64],
    exact: &[f64],
    rows: usize,
    cols: usize,
) -> anyhow::Result<InterpolationErrorsPayload> {
    if rows < 1 {
        anyhow::bail!("Field must have at least one row.");
    }
    let field = matrix_from_row_major(values, rows, cols)?;
    let reference = matrix_from_row_major(exact, rows - 1, cols)
        .context("Reference must have one row fewer than the field.")?;

    let simple = interpolate_midpoints(&field, InterpolationMethod::Simple)?;
    let compact = interpolate_midpoints(&field, InterpolationMethod::Compact)?;
    Ok(InterpolationErrorsPayload {
        simple: interpolation_l1_error(&simple, &reference)?,
        compact: interpolation_l1_error(&compact, &reference)?,
    })
}
