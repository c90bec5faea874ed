//! Redshift ↔ comoving distance conversion

use crate::units::{C_LIGHT, KILOMETER, MPC, SECOND};

/// Deterministic, monotonic mapping between comoving distance and redshift
pub trait Cosmology: Send + Sync {
    /// Redshift of a point at the given comoving distance (m) from the observer
    fn redshift_at(&self, comoving_distance: f64) -> f64;

    /// Comoving distance (m) corresponding to a redshift
    fn comoving_distance_at(&self, redshift: f64) -> f64;
}

/// A universe without expansion: everything sits at z = 0
#[derive(Debug, Clone, Copy, Default)]
pub struct StaticUniverse;

impl Cosmology for StaticUniverse {
    fn redshift_at(&self, _comoving_distance: f64) -> f64 {
        0.0
    }

    fn comoving_distance_at(&self, _redshift: f64) -> f64 {
        0.0
    }
}

const TABLE_SIZE: usize = 1000;
const Z_MIN: f64 = 1e-4;
const Z_MAX: f64 = 100.0;

/// Flat ΛCDM cosmology with a precomputed distance table
#[derive(Debug, Clone)]
pub struct FlatLambdaCdm {
    pub hubble: f64,
    pub omega_m: f64,
    pub omega_l: f64,
    z: Vec<f64>,
    d: Vec<f64>,
}

impl Default for FlatLambdaCdm {
    fn default() -> Self {
        Self::new(0.673, 0.315)
    }
}

impl FlatLambdaCdm {
    /// `h` is the dimensionless Hubble parameter, `omega_m` the matter density
    pub fn new(h: f64, omega_m: f64) -> Self {
        let omega_l = 1.0 - omega_m;
        let hubble = h * 100.0 * KILOMETER / SECOND / MPC;
        let hubble_distance = C_LIGHT / hubble;

        let mut z = Vec::with_capacity(TABLE_SIZE + 1);
        z.push(0.0);
        let log_min = Z_MIN.log10();
        let log_step = (Z_MAX.log10() - log_min) / (TABLE_SIZE - 1) as f64;
        for i in 0..TABLE_SIZE {
            z.push(10f64.powf(log_min + i as f64 * log_step));
        }

        let inv_e = |z: f64| 1.0 / (omega_m * (1.0 + z).powi(3) + omega_l).sqrt();
        let mut d = vec![0.0; z.len()];
        for i in 1..z.len() {
            // Simpson's rule on each interval
            let (a, b) = (z[i - 1], z[i]);
            let mid = 0.5 * (a + b);
            let integral = (b - a) / 6.0 * (inv_e(a) + 4.0 * inv_e(mid) + inv_e(b));
            d[i] = d[i - 1] + hubble_distance * integral;
        }

        Self {
            hubble,
            omega_m,
            omega_l,
            z,
            d,
        }
    }
}

impl Cosmology for FlatLambdaCdm {
    fn redshift_at(&self, comoving_distance: f64) -> f64 {
        interpolate(comoving_distance.max(0.0), &self.d, &self.z)
    }

    fn comoving_distance_at(&self, redshift: f64) -> f64 {
        interpolate(redshift.max(0.0), &self.z, &self.d)
    }
}

/// Linear interpolation on an ascending grid, clamped at both ends
pub(crate) fn interpolate(x: f64, xs: &[f64], ys: &[f64]) -> f64 {
    let n = xs.len();
    if x <= xs[0] {
        return ys[0];
    }
    if x >= xs[n - 1] {
        return ys[n - 1];
    }
    let idx = xs.partition_point(|&v| v <= x).saturating_sub(1).min(n - 2);
    let t = (x - xs[idx]) / (xs[idx + 1] - xs[idx]);
    ys[idx] + t * (ys[idx + 1] - ys[idx])
}

/// Comoving distance (m) to a source at redshift `z` in the default cosmology
pub fn redshift_to_comoving_distance(z: f64) -> f64 {
    FlatLambdaCdm::default().comoving_distance_at(z)
}
