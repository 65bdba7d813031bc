//! End-to-end extraction tests on synthetic single-diode curves.

use approx::assert_relative_eq;
use darkiv::analysis::{self, Extracted};
use darkiv::config::{AnalysisConfig, ExponentialRegion};
use darkiv::MeasurementSeries;

/// Thermal voltage at 298.15 K with the default constants.
fn vt() -> f64 {
    AnalysisConfig::default().thermal_voltage()
}

/// Solve J = J0 (exp((V - J Rs) / (n Vt)) - 1) + (V - J Rs) / Rsh for each V
/// by bisection.
fn single_diode(
    j0: f64,
    n: f64,
    rs: f64,
    rsh: f64,
    v_lo: f64,
    v_hi: f64,
    points: usize,
) -> MeasurementSeries {
    let a = n * vt();
    let voltage: Vec<f64> = (0..points)
        .map(|i| v_lo + (v_hi - v_lo) * i as f64 / (points - 1) as f64)
        .collect();
    let current = voltage
        .iter()
        .map(|&v| {
            let mut lo = -(j0 + v.abs() / rsh) - 1.0;
            let mut hi = j0 * (v / a).min(700.0).exp() + v.abs() / rsh + 1.0;
            if rs > 0.0 {
                hi = hi.min(v.abs() / rs + 1.0);
            }
            for _ in 0..200 {
                let mid = 0.5 * (lo + hi);
                let vd = v - mid * rs;
                let f = mid - j0 * ((vd / a).exp() - 1.0) - vd / rsh;
                if f > 0.0 {
                    hi = mid;
                } else {
                    lo = mid;
                }
            }
            0.5 * (lo + hi)
        })
        .collect();
    MeasurementSeries::new(voltage, current).unwrap()
}

fn value(e: &Extracted) -> f64 {
    match e {
        Extracted::Value(v) => *v,
        Extracted::Unavailable { kind, detail } => panic!("unavailable ({kind}): {detail}"),
    }
}

// ── Full single-diode recovery ──

#[test]
fn test_recovers_single_diode_parameters() {
    let series = single_diode(1e-12, 1.1, 0.5, 1e6, -0.5, 1.0, 151);
    let result = analysis::analyze(&series, &AnalysisConfig::default()).unwrap();
    let p = &result.parameters;

    assert_relative_eq!(value(&p.rsh), 1e6, max_relative = 0.05);
    assert_relative_eq!(value(&p.ideality), 1.1, max_relative = 0.05);
    assert_relative_eq!(value(&p.j0), 1e-12, max_relative = 0.05);
    assert_relative_eq!(value(&p.rs), 0.5, max_relative = 0.05);

    let fit = p.exponential_fit.unwrap();
    assert!(fit.fit.r_squared > 0.999, "r^2 = {}", fit.fit.r_squared);
    assert!(fit.window.0 > 0.1);
}

#[test]
fn test_pure_exponential_in_fixed_region() {
    let series = single_diode(1e-10, 1.5, 0.0, 1e15, -0.5, 1.0, 151);
    let config = AnalysisConfig {
        exponential_region: ExponentialRegion::Fixed { low: 0.3, high: 0.5 },
        ..AnalysisConfig::default()
    };
    let result = analysis::analyze(&series, &config).unwrap();
    let p = &result.parameters;

    assert_relative_eq!(value(&p.ideality), 1.5, max_relative = 0.01);
    assert_relative_eq!(value(&p.j0), 1e-10, max_relative = 0.03);
    let fit = p.exponential_fit.unwrap();
    assert_eq!(fit.window, (0.3, 0.5));
    assert!(fit.fit.n_points >= 20, "{} points", fit.fit.n_points);
}

// ── Scaling ──

#[test]
fn test_scaling_current_scales_resistances_inversely() {
    let series = single_diode(1e-12, 1.1, 0.5, 1e6, -0.5, 1.0, 151);
    let config = AnalysisConfig::default();
    let base = analysis::analyze(&series, &config).unwrap().parameters;
    let scaled = analysis::analyze(&series.scaled(10.0).unwrap(), &config)
        .unwrap()
        .parameters;

    assert_relative_eq!(value(&scaled.rsh), value(&base.rsh) / 10.0, max_relative = 1e-6);
    assert_relative_eq!(value(&scaled.ideality), value(&base.ideality), max_relative = 1e-6);
    assert_relative_eq!(value(&scaled.j0), value(&base.j0) * 10.0, max_relative = 1e-6);
    assert_relative_eq!(value(&scaled.rs), value(&base.rs) / 10.0, max_relative = 1e-4);
}

// ── Derived curves ──

#[test]
fn test_local_ideality_tracks_diode_regime() {
    let series = single_diode(1e-12, 1.1, 0.5, 1e6, -0.5, 1.0, 151);
    let result = analysis::analyze(&series, &AnalysisConfig::default()).unwrap();

    let forward = result
        .smoothed
        .as_series()
        .points()
        .filter(|&(v, j)| v > 0.0 && j > 0.0)
        .count();
    assert_eq!(result.local_ideality.len(), forward);

    let near_half_volt: Vec<f64> = result
        .local_ideality
        .iter()
        .filter(|p| (0.5..=0.6).contains(&p.voltage))
        .filter_map(|p| p.value)
        .collect();
    assert!(!near_half_volt.is_empty());
    for n in near_half_volt {
        assert_relative_eq!(n, 1.1, max_relative = 0.05);
    }

    // Two iterations yield the same values
    let first: Vec<_> = result.local_ideality.iter().collect();
    let second: Vec<_> = result.local_ideality.iter().collect();
    assert_eq!(first, second);
}

#[test]
fn test_differential_resistance_of_flat_curve_is_undefined() {
    let v: Vec<f64> = (0..21).map(|i| -0.2 + i as f64 * 0.02).collect();
    let j = vec![1e-6; v.len()];
    let series = MeasurementSeries::new(v, j).unwrap();
    let result = analysis::analyze(&series, &AnalysisConfig::default()).unwrap();

    assert_eq!(result.differential_resistance.len(), series.len());
    assert!(result.differential_resistance.iter().all(|p| p.value.is_none()));
    assert!(!result.parameters.rsh.is_available());
}

#[test]
fn test_differential_resistance_of_resistor() {
    let v: Vec<f64> = (0..21).map(|i| -0.2 + i as f64 * 0.02).collect();
    let j = v.iter().map(|x| x / 250.0).collect();
    let series = MeasurementSeries::new(v, j).unwrap();
    let result = analysis::analyze(&series, &AnalysisConfig::default()).unwrap();

    for p in &result.differential_resistance {
        assert_relative_eq!(p.value.unwrap(), 250.0, max_relative = 1e-6);
    }
    assert_relative_eq!(value(&result.parameters.rsh), 250.0, max_relative = 1e-6);
}

// ── Determinism ──

#[test]
fn test_analysis_is_deterministic() {
    let series = single_diode(1e-12, 1.1, 0.5, 1e6, -0.5, 1.0, 151);
    let config = AnalysisConfig::default();
    let a = analysis::analyze(&series, &config).unwrap();
    let b = analysis::analyze(&series, &config).unwrap();
    assert_eq!(a, b);
}
