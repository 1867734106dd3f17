//! Oscillator-lattice simulation bindings.

use crate::shared::{js_error, matrix_to_row_major, settings_from_js, to_js};
use anyhow::Context;
use js_sys::Float64Array;
use wasm_bindgen::prelude::*;
use wavelab_core::oscillator::{
    linear_frequency, simulate, OscillatorParams, OscillatorTrajectory, SimulationSettings,
};
use wavelab_core::spectral::{dominant_frequencies, WelchSettings};

/// A finished simulation held on the Rust side so the front-end can pull the arrays it
/// needs for plotting.
#[wasm_bindgen]
pub struct WasmOscillatorRun {
    params: OscillatorParams,
    trajectory: OscillatorTrajectory,
}

#[wasm_bindgen]
impl WasmOscillatorRun {
    /// Runs the simulation. `settings` is an optional `{ tf, nt, integrator }` object;
    /// `integrator` accepts `{ method: "RK45" | "RK23", rtol, atol, max_steps }`.
    #[wasm_bindgen(constructor)]
    pub fn new(
        y0: Vec<f64>,
        alpha: f64,
        beta: f64,
        b: f64,
        c: f64,
        settings: JsValue,
    ) -> Result<WasmOscillatorRun, JsValue> {
        console_error_panic_hook::set_once();
        let settings: SimulationSettings = settings_from_js(settings)?;
        let params = OscillatorParams::new(alpha, beta, b, c);
        let trajectory = run_simulation(&y0, params, &settings).map_err(js_error)?;
        Ok(WasmOscillatorRun { params, trajectory })
    }

    pub fn oscillators(&self) -> usize {
        self.trajectory.oscillators()
    }

    pub fn samples(&self) -> usize {
        self.trajectory.samples()
    }

    pub fn times(&self) -> Float64Array {
        Float64Array::from(self.trajectory.times.as_slice())
    }

    /// Positions in row-major `(oscillators, samples)` order.
    pub fn positions(&self) -> Float64Array {
        Float64Array::from(matrix_to_row_major(&self.trajectory.positions).as_slice())
    }

    pub fn energy(&self) -> Float64Array {
        Float64Array::from(self.trajectory.energy(&self.params).as_slice())
    }

    /// Analytic frequency of the linearized lattice.
    pub fn linear_frequency(&self) -> Result<f64, JsValue> {
        linear_frequency(&self.params).map_err(|e| js_error(e.into()))
    }

    /// Dominant Welch frequency of each oscillator. `welch` is an optional
    /// `{ nperseg, noverlap, window, detrend }` object.
    pub fn dominant_frequencies(&self, welch: JsValue) -> Result<Float64Array, JsValue> {
        let welch: WelchSettings = settings_from_js(welch)?;
        let freqs = trajectory_frequencies(&self.trajectory, &welch).map_err(js_error)?;
        Ok(Float64Array::from(freqs.as_slice()))
    }

    pub fn stats(&self) -> Result<JsValue, JsValue> {
        to_js(&self.trajectory.stats)
    }
}

pub(crate) fn run_simulation(
    y0: &[f64],
    params: OscillatorParams,
    settings: &SimulationSettings,
) -> anyhow::Result<OscillatorTrajectory> {
    simulate(y0, params, settings).with_context(|| {
        format!(
            "Oscillator simulation ({} method, tf = {}, nt = {}) failed",
            settings.integrator.method.name(),
            settings.tf,
            settings.nt
        )
    })
}

pub(crate) fn trajectory_frequencies(
    trajectory: &OscillatorTrajectory,
    welch: &WelchSettings,
) -> anyhow::Result<Vec<f64>> {
    Ok(dominant_frequencies(
        &trajectory.times,
        &trajectory.positions,
        welch,
    )?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simulation_errors_name_the_solver() {
        let params = OscillatorParams::new(1.0, 0.0, 0.0, 0.0);
        let err = run_simulation(&[1.0, 0.0, 0.0], params, &SimulationSettings::default())
            .expect_err("odd length");
        let message = format!("{err:#}");
        assert!(message.contains("RK45 method"));
        assert!(message.contains("even length"));
    }

    #[test]
    fn frequencies_follow_trajectory_rows() {
        let params = OscillatorParams::new(0.5, 0.5, 0.0, 0.0);
        let settings = SimulationSettings {
            tf: 100.0,
            nt: 400,
            ..SimulationSettings::default()
        };
        let trajectory =
            run_simulation(&[0.1, 0.2, 0.0, 0.0], params, &settings).expect("simulate");
        let freqs =
            trajectory_frequencies(&trajectory, &WelchSettings::default()).expect("freqs");
        assert_eq!(freqs.len(), 2);
        assert_eq!(freqs[0], freqs[1]);
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use serde_wasm_bindgen::to_value;
    use wasm_bindgen_test::wasm_bindgen_test;

    fn settings_value(method: &str) -> JsValue {
        let mut settings = SimulationSettings {
            tf: 40.0,
            nt: 160,
            ..SimulationSettings::default()
        };
        settings.integrator.method = method.parse().expect("method");
        to_value(&settings).expect("settings")
    }

    #[wasm_bindgen_test]
    fn run_exposes_row_major_positions() {
        let run = WasmOscillatorRun::new(
            vec![0.1, 0.3, 0.0, 0.0],
            0.5,
            0.5,
            0.0,
            0.0,
            settings_value("RK23"),
        )
        .expect("run");
        assert_eq!(run.oscillators(), 2);
        assert_eq!(run.samples(), 161);
        let positions = run.positions().to_vec();
        assert_eq!(positions.len(), 2 * 161);
        assert_eq!(positions[0], 0.1);
        assert_eq!(positions[161], 0.3);
    }

    #[wasm_bindgen_test]
    fn missing_settings_fall_back_to_defaults() {
        let run = WasmOscillatorRun::new(
            vec![0.2, 0.0],
            1.0,
            0.0,
            0.0,
            0.0,
            JsValue::UNDEFINED,
        )
        .expect("run");
        assert_eq!(run.samples(), 801);
        let freqs = run
            .dominant_frequencies(JsValue::NULL)
            .expect("freqs")
            .to_vec();
        assert_eq!(freqs.len(), 1);
    }

    #[wasm_bindgen_test]
    fn odd_state_is_rejected() {
        let result = WasmOscillatorRun::new(
            vec![0.2],
            1.0,
            0.0,
            0.0,
            0.0,
            JsValue::UNDEFINED,
        );
        let message = result
            .err()
            .and_then(|e| e.as_string())
            .expect("error message");
        assert!(message.contains("even length"));
    }
}
