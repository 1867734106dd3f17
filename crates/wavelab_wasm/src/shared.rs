//! Helpers shared by the bindings.

use nalgebra::DMatrix;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_wasm_bindgen::{from_value, to_value};
use wasm_bindgen::prelude::*;

/// Reads an optional settings object; `undefined` or `null` yields the defaults.
pub(crate) fn settings_from_js<T>(value: JsValue) -> Result<T, JsValue>
where
    T: DeserializeOwned + Default,
{
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    from_value(value).map_err(|e| JsValue::from_str(&format!("Invalid settings: {}", e)))
}

pub(crate) fn to_js<T: Serialize>(payload: &T) -> Result<JsValue, JsValue> {
    to_value(payload).map_err(|e| JsValue::from_str(&format!("Serialization error: {}", e)))
}

pub(crate) fn js_error(err: anyhow::Error) -> JsValue {
    JsValue::from_str(&format!("{:#}", err))
}

pub(crate) fn matrix_from_row_major(
    values: &[f64],
    rows: usize,
    cols: usize,
) -> anyhow::Result<DMatrix<f64>> {
    if values.len() != rows * cols {
        anyhow::bail!(
            "Expected {} values for a {} x {} field, got {}.",
            rows * cols,
            rows,
            cols,
            values.len()
        );
    }
    Ok(DMatrix::from_row_slice(rows, cols, values))
}

pub(crate) fn matrix_to_row_major(matrix: &DMatrix<f64>) -> Vec<f64> {
    let mut out = Vec::with_capacity(matrix.len());
    for row in matrix.row_iter() {
        out.extend(row.iter().copied());
    }
    out
}
