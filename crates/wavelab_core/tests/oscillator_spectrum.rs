use wavelab_core::oscillator::{linear_frequency, simulate, OscillatorParams, SimulationSettings};
use wavelab_core::solvers::{AdaptiveMethod, IntegratorSettings};
use wavelab_core::spectral::{dominant_frequencies, WelchSettings};

fn initial_state(positions: &[f64]) -> Vec<f64> {
    let mut y0 = positions.to_vec();
    y0.extend(std::iter::repeat(0.0).take(positions.len()));
    y0
}

fn bin_width(settings: &SimulationSettings, welch: &WelchSettings) -> f64 {
    let fs = settings.nt as f64 / settings.tf;
    fs / welch.nperseg as f64
}

#[test]
fn linear_regime_recovers_analytic_frequency() {
    let params = OscillatorParams::new(0.6, 0.4, 0.0, 0.0);
    let settings = SimulationSettings::default();
    let welch = WelchSettings::default();
    let y0 = initial_state(&[0.1, 0.5, 1.0, 2.0]);

    let trajectory = simulate(&y0, params, &settings).expect("simulate");
    let freqs =
        dominant_frequencies(&trajectory.times, &trajectory.positions, &welch).expect("freqs");

    assert_eq!(freqs.len(), 4);
    let expected = linear_frequency(&params).expect("linear frequency");
    let bin = bin_width(&settings, &welch);
    for f in freqs {
        assert!((f - expected).abs() <= bin, "f = {f}, expected {expected}");
    }
}

#[test]
fn both_solvers_agree_in_linear_regime() {
    let params = OscillatorParams::new(1.5, 0.5, 0.0, 0.0);
    let y0 = initial_state(&[0.3, -0.7]);
    let welch = WelchSettings::default();
    let mut results = Vec::new();
    for method in [AdaptiveMethod::Rk23, AdaptiveMethod::Rk45] {
        let settings = SimulationSettings {
            integrator: IntegratorSettings::default().with_method(method),
            ..SimulationSettings::default()
        };
        let trajectory = simulate(&y0, params, &settings).expect("simulate");
        results.push(
            dominant_frequencies(&trajectory.times, &trajectory.positions, &welch)
                .expect("freqs"),
        );
    }
    assert_eq!(results[0], results[1]);
}

#[test]
fn quintic_term_shifts_the_frequency_profile() {
    let welch = WelchSettings::default();
    let settings = SimulationSettings {
        tf: 400.0,
        nt: 800,
        integrator: IntegratorSettings::default(),
    };
    let y0 = initial_state(&[0.2, 0.35, 0.5]);

    let profile = |c: f64| {
        let params = OscillatorParams::new(0.5, 0.5, 0.0, c);
        let trajectory = simulate(&y0, params, &settings).expect("simulate");
        dominant_frequencies(&trajectory.times, &trajectory.positions, &welch).expect("freqs")
    };

    let linear = profile(0.0);
    let nonlinear = profile(8.0);
    assert_eq!(linear.len(), nonlinear.len());
    assert_ne!(linear, nonlinear);

    let bin = bin_width(&settings, &welch);
    assert!(
        linear[2] - nonlinear[2] >= bin,
        "softening should lower the large-amplitude frequency: {} vs {}",
        linear[2],
        nonlinear[2]
    );
}

#[test]
fn odd_state_length_is_rejected() {
    let params = OscillatorParams::new(1.0, 0.0, 0.0, 0.0);
    let err = simulate(&[1.0, 0.0, 0.5], params, &SimulationSettings::default())
        .expect_err("odd state");
    assert!(matches!(err, wavelab_core::AnalysisError::InvalidShape(_)));
}
