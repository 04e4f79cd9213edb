//! Fourier transforms of the CIE color matching functions.
//!
//! Thin-film interference modulates the reflected spectrum with a cosine
//! in optical path difference. Integrating that cosine against the color
//! matching functions is a Fourier transform evaluation, which is what
//! makes spectrally antialiased RGB rendering possible: instead of
//! sampling the interference pattern at three wavelengths (and aliasing
//! badly for thick films), each harmonic is weighted by the transform of
//! the full CMF profile.
//!
//! Two evaluators are provided: a closed-form Gaussian fit of each
//! profile, and a lookup into the precomputed [`crate::cmf_table`]. Only
//! the Gaussian fit admits closed-form moments over a film-thickness
//! interval, which is why [`eval_sensitivity_mean`] and
//! [`eval_sensitivity_square`] take no mode flag.

use crate::{
    cmf_table::{IMAG_X, IMAG_Y, IMAG_Z, REAL_X, REAL_Y, REAL_Z, TABLE_SIZE},
    spectrum::Rgb3,
    utils::FloatExt,
};
use std::f64::consts::PI;

/// Gaussian fits of the Fourier transforms of the normalized XYZ profiles:
/// amplitude, peak position and variance per channel.
const VAL: Rgb3 = Rgb3::new(3.8789e-13, 3.1255e-13, 3.7110e-13);
const POS: Rgb3 = Rgb3::new(1.6810e+6, 1.7953e+6, 2.2084e+6);
const VAR: Rgb3 = Rgb3::new(8.6556e+9, 1.8609e+10, 1.3224e+10);

/// Secondary lobe of the X profile's real response; a single extra
/// Gaussian on the first channel.
const VAL_X2: f64 = 6.8922e-14;
const POS_X2: f64 = 2.2399e+6;
const VAR_X2: f64 = 9.0564e+9;

/// Normalization so that a zero path difference yields the DC value 1.
const DC_NORM: f64 = 1.0685e-7;

/// The tabulated transform spans path-difference phases up to this bound;
/// beyond it the transform is treated as zero.
const TABLE_SPAN: f64 = 30_000.0;

/// Intervals narrower than this (in nanometers) are treated as a single
/// height; the closed-form antiderivatives would otherwise divide zero by
/// zero.
const MIN_RANGE: f64 = 1e-6;

/// Evaluates the transform of the XYZ sensitivity curves at an optical
/// path difference `opd` (nanometers) and reflection phase `shift`.
#[must_use]
pub fn eval_sensitivity(opd: Rgb3, shift: Rgb3, use_gaussian_fit: bool) -> Rgb3 {
    if use_gaussian_fit {
        gaussian_fit(opd, shift)
    } else {
        tabulated(opd, shift)
    }
}

fn gaussian_fit(opd: Rgb3, shift: Rgb3) -> Rgb3 {
    let phase = 2.0 * PI * opd * 1.0e-9;

    let mut xyz =
        VAL * (2.0 * PI * VAR).sqrt() * (POS * phase + shift).cos() * (phase.sq() * VAR * -0.5).exp();
    #[allow(clippy::suboptimal_flops)]
    {
        xyz[0] += VAL_X2
            * (2.0 * PI * VAR_X2).sqrt()
            * (POS_X2 * phase[0] + shift[0]).cos()
            * (-VAR_X2 * phase[0] * phase[0] / 2.0).exp();
    }
    xyz / DC_NORM
}

fn tabulated(opd: Rgb3, shift: Rgb3) -> Rgb3 {
    static REAL: [&[f64; TABLE_SIZE]; 3] = [&REAL_X, &REAL_Y, &REAL_Z];
    static IMAG: [&[f64; TABLE_SIZE]; 3] = [&IMAG_X, &IMAG_Y, &IMAG_Z];

    let mut xyz = Rgb3::ZERO;
    for c in 0..3 {
        let u = (2.0 * PI * opd[c] / TABLE_SPAN) * (TABLE_SIZE - 1) as f64;
        if u >= TABLE_SIZE as f64 {
            continue;
        }
        #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
        let idx = (u.floor() as usize).min(TABLE_SIZE - 1);
        #[allow(clippy::suboptimal_flops)]
        {
            xyz[c] = shift[c].cos() * REAL[c][idx] + shift[c].sin() * IMAG[c][idx];
        }
    }
    xyz
}

/// Expected value of the Gaussian-fit sensitivity of harmonic `m` under a
/// uniform film-thickness distribution over `[min_height, max_height]`
/// (nanometers). `tau` is the reduced optical path `2 eta2 cos_theta_t`,
/// so that the path difference at thickness `h` is `tau * h`.
///
/// Exact closed-form antiderivative evaluated at both bounds; no
/// quadrature, this runs once per shading sample.
#[must_use]
pub fn eval_sensitivity_mean(
    m: u32,
    tau: Rgb3,
    shift: Rgb3,
    min_height: f64,
    max_height: f64,
) -> Rgb3 {
    if max_height - min_height < MIN_RANGE {
        let mid = 0.5 * (min_height + max_height);
        return gaussian_fit(f64::from(m) * tau * mid, f64::from(m) * shift);
    }
    let m = f64::from(m);

    let a = VAL * (2.0 * PI * VAR).sqrt() / DC_NORM; // == 1 for Y and Z
    let b = 2.0 * PI * m * tau * POS;
    let c = PI * m * tau;
    let c = 2.0 * c.sq() * VAR;
    let cb2 = VAR / (2.0 * POS.sq());

    let integrate = |d: f64| -> Rgb3 {
        let sinv = (b * d + shift).sin();
        let cosv = (b * d + shift).cos();
        let cd2 = c * d.sq();
        let cos_term = 2.0 * cb2 * d * cosv * (cd2 - 6.0 * cb2 - Rgb3::ONE);
        let sin_term = sinv
            * (Rgb3::ONE + 2.0 * cb2 + 12.0 * cb2.sq() + 0.5 * cd2.sq() - cd2 - 6.0 * cb2 * cd2)
            / b;
        a * (sin_term + cos_term)
    };

    let mut res = integrate(max_height * 1.0e-9) - integrate(min_height * 1.0e-9);

    // second lobe of x
    let ax = VAL_X2 * (2.0 * PI * VAR_X2).sqrt() / DC_NORM;
    let bx = 2.0 * PI * m * tau[0] * POS_X2;
    let cx = PI * m * tau[0];
    let cx = 2.0 * cx.sq() * VAR_X2;
    let cb2x = VAR_X2 / (2.0 * POS_X2.sq());

    #[allow(clippy::suboptimal_flops)]
    let integrate_x = |d: f64| -> f64 {
        let sinv = (bx * d + shift[0]).sin();
        let cosv = (bx * d + shift[0]).cos();
        let cd2 = cx * d.sq();
        let cos_term = 2.0 * cb2x * d * cosv * (cd2 - 6.0 * cb2x - 1.0);
        let sin_term = sinv
            * (1.0 + 2.0 * cb2x + 12.0 * cb2x.sq() + 0.5 * cd2.sq() - cd2 - 6.0 * cb2x * cd2)
            / bx;
        ax * (sin_term + cos_term)
    };

    res[0] += integrate_x(max_height * 1.0e-9) - integrate_x(min_height * 1.0e-9);

    // multiply by the uniform density over the height interval
    res * (1.0e9 / (max_height - min_height))
}

/// Second raw moment of the first-harmonic Gaussian-fit sensitivity over
/// the same uniform height distribution as [`eval_sensitivity_mean`].
///
/// Covers the squared m = 1 harmonic only: cross-polarization and
/// cross-harmonic covariance terms are deliberately omitted, their
/// contribution being visually negligible. This is an approximation that
/// the variance estimate inherits, not an oversight.
#[must_use]
pub fn eval_sensitivity_square(tau: Rgb3, shift: Rgb3, min_height: f64, max_height: f64) -> Rgb3 {
    if max_height - min_height < MIN_RANGE {
        let mid = 0.5 * (min_height + max_height);
        return gaussian_fit(tau * mid, shift).sq();
    }

    let a = 2.0 * PI * VAR * (VAL / DC_NORM).sq();
    let b = 2.0 * PI * tau * POS;
    let c = PI * tau;
    let c = 4.0 * c.sq() * VAR;
    let cb2 = VAR / POS.sq();

    let integrate = |d: f64| -> Rgb3 {
        let sinv = (2.0 * (b * d + shift)).sin();
        let cosv = (2.0 * (b * d + shift)).cos();
        let cd2 = c * d.sq();
        let poly_term = Rgb3::splat(d / 2.0) - cd2 * (d / 6.0) + cd2.sq() * (d / 20.0)
            + shift / (2.0 * b);
        let cos_term = 0.25 * cb2 * d * cosv * (cd2 - 1.5 * cb2 - Rgb3::ONE);
        let sin_term = sinv
            * (Rgb3::ONE + 0.5 * cb2 + 0.75 * cb2.sq() + 0.5 * cd2.sq() - cd2 - 1.5 * cb2 * cd2)
            / (4.0 * b);
        a * (poly_term + sin_term + cos_term)
    };

    let mut res = integrate(max_height * 1.0e-9) - integrate(min_height * 1.0e-9);

    // second lobe of x
    let ax = 2.0 * PI * VAR_X2 * (VAL_X2 / DC_NORM).sq();
    let bx = 2.0 * PI * tau[0] * POS_X2;
    let cx = PI * tau[0];
    let cx = 4.0 * cx.sq() * VAR_X2;
    let cb2x = VAR_X2 / POS_X2.sq();

    #[allow(clippy::suboptimal_flops)]
    let integrate_x = |d: f64| -> f64 {
        let sinv = (2.0 * (bx * d + shift[0])).sin();
        let cosv = (2.0 * (bx * d + shift[0])).cos();
        let cd2 = cx * d.sq();
        let poly_term = d / 2.0 - cd2 * d / 6.0 + cd2.sq() * d / 20.0 + shift[0] / (2.0 * bx);
        let cos_term = 0.25 * cb2x * d * cosv * (cd2 - 1.5 * cb2x - 1.0);
        let sin_term = sinv
            * (1.0 + 0.5 * cb2x + 0.75 * cb2x.sq() + 0.5 * cd2.sq() - cd2 - 1.5 * cb2x * cd2)
            / (4.0 * bx);
        ax * (poly_term + sin_term + cos_term)
    };

    res[0] += integrate_x(max_height * 1.0e-9) - integrate_x(min_height * 1.0e-9);

    res * (1.0e9 / (max_height - min_height))
}
