//! Derived biophysical quantities for alpha-shaped synaptic currents.
//!
//! These are pure functions translating externally meaningful parameters
//! (EPSP amplitude in mV, time constants in ms) into the internal units the
//! dynamics components expect (synaptic weights in nA, rates in Hz).
use lambert_w::{lambert_w0, lambert_wm1};

use crate::error::SimError;

/// Peak of the voltage response to a synaptic current with unit amplitude
/// (1 nA) and an alpha-shaped time course.
///
/// The peak time solves a transcendental equation through the Lambert W
/// function:
///
/// t_max = (-W(-exp(-1/a)/a) - 1/a) / b,
///
/// with a = tau_m/tau_syn and b = 1/tau_syn - 1/tau_m. `w = -1/a` is
/// itself a root of the defining equation, so the peak lies on the branch
/// that avoids it: the secondary branch W_{-1} for the physiological
/// ordering tau_m > tau_syn, the principal branch otherwise. The returned
/// height (mV per nA) converts a desired EPSP amplitude into an effective
/// synaptic weight by division.
///
/// `tau_m` and `tau_syn` in ms, `r_m` in Mohm. The defining ratio is
/// singular for tau_m == tau_syn; callers must keep the two apart.
pub fn psp_height(tau_m: f64, r_m: f64, tau_syn: f64) -> Result<f64, SimError> {
    if tau_m <= 0.0 || tau_syn <= 0.0 {
        return Err(SimError::InvalidParameter(format!(
            "Time constants must be positive (tau_m = {}, tau_syn = {})",
            tau_m, tau_syn
        )));
    }
    if r_m <= 0.0 {
        return Err(SimError::InvalidParameter(format!(
            "Membrane resistance must be positive (R = {})",
            r_m
        )));
    }
    if tau_m == tau_syn {
        return Err(SimError::InvalidParameter(
            "The membrane and synapse time constants must differ".to_string(),
        ));
    }

    let a = tau_m / tau_syn;
    let b = 1.0 / tau_syn - 1.0 / tau_m;
    // time of maximum
    let branch = if a > 1.0 { lambert_wm1 } else { lambert_w0 };
    let t_max = (-branch(-(-1.0 / a).exp() / a) - 1.0 / a) / b;
    // height of the PSP for a current of amplitude 1 nA
    let height = r_m / (tau_syn * tau_m * b)
        * (((-t_max / tau_m).exp() - (-t_max / tau_syn).exp()) / b
            - t_max * (-t_max / tau_syn).exp());
    Ok(height)
}

/// Rate per synapse (1/ms) at which the unperturbed stationary membrane
/// potential of a neuron with `c_e` excitatory inputs of EPSP amplitude `j`
/// (mV) sits exactly at the threshold `theta` (mV).
pub fn threshold_rate(theta: f64, j: f64, c_e: usize, tau: f64) -> Result<f64, SimError> {
    if theta <= 0.0 || j <= 0.0 || c_e == 0 || tau <= 0.0 {
        return Err(SimError::InvalidParameter(format!(
            "Threshold rate requires positive theta, J, C_e and tau (got {}, {}, {}, {})",
            theta, j, c_e, tau
        )));
    }
    Ok(theta / (j * c_e as f64 * tau))
}

/// Total event rate (Hz) of the single lumped Poisson source standing in
/// for `c_ext` independent external inputs, each firing at
/// `eta * nu_thresh`.
pub fn external_input_rate(eta: f64, nu_thresh: f64, c_ext: usize) -> f64 {
    1000.0 * eta * nu_thresh * c_ext as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    const TOL: f64 = 1e-12;

    #[test]
    fn test_psp_height_is_positive_and_finite() {
        for (tau_m, r_m, tau_syn) in [
            (20.0, 1.5, 0.5),
            (20.0, 1.5, 0.1),
            (10.0, 80.0, 2.0),
            (0.5, 1.0, 20.0),
        ] {
            let height = psp_height(tau_m, r_m, tau_syn).unwrap();
            assert!(
                height.is_finite() && height > 0.0,
                "psp_height({}, {}, {}) = {}",
                tau_m,
                r_m,
                tau_syn,
                height
            );
        }
    }

    #[test]
    fn test_psp_height_proportional_to_resistance() {
        let unit = psp_height(20.0, 1.0, 0.5).unwrap();
        for k in [0.5, 1.5, 3.0, 100.0] {
            let scaled = psp_height(20.0, k, 0.5).unwrap();
            assert!((scaled - k * unit).abs() < TOL * k);
        }
    }

    #[test]
    fn test_psp_height_rejects_equal_time_constants() {
        assert!(matches!(
            psp_height(2.0, 1.5, 2.0),
            Err(SimError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_psp_height_rejects_invalid_domains() {
        assert!(psp_height(-1.0, 1.5, 0.5).is_err());
        assert!(psp_height(20.0, 1.5, 0.0).is_err());
        assert!(psp_height(20.0, -1.5, 0.5).is_err());
    }

    #[test]
    fn test_threshold_rate_baseline() {
        // theta = 20 mV, J = 0.1 mV, C_e = 400, tau = 20 ms
        let nu_thresh = threshold_rate(20.0, 0.1, 400, 20.0).unwrap();
        assert!((nu_thresh - 0.025).abs() < TOL);
        // eta = 2 and C_ext = 400 inputs give 20 kHz of lumped drive
        let rate = external_input_rate(2.0, nu_thresh, 400);
        assert!((rate - 20_000.0).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_rate_rejects_invalid_domains() {
        assert!(threshold_rate(0.0, 0.1, 400, 20.0).is_err());
        assert!(threshold_rate(20.0, 0.1, 0, 20.0).is_err());
    }
}
