//! Spectral reflectance of a thin dielectric film over a conductor.
//!
//! The film is bounded by three media: the incident dielectric (`eta1`),
//! the film itself (`eta2`) and the absorbing substrate
//! (`eta3 + i kappa3`). Light bouncing inside the film interferes with the
//! directly reflected wave; the resulting reflectance oscillates in both
//! wavelength and film thickness, which is what produces iridescence.
//!
//! Two terminal evaluation modes exist. The Airy summation collapses the
//! infinite series of internal reflections into closed form per wavelength
//! sample and works for any channel count. The spectrally antialiased mode
//! rewrites the interference pattern as a truncated Fourier series whose
//! coefficients come from [`crate::sensitivity`]; it only exists for the
//! three-channel configuration but does not alias for thick films the way
//! per-wavelength sampling does.

use crate::{
    fresnel,
    sensitivity::{eval_sensitivity, eval_sensitivity_mean, eval_sensitivity_square},
    spectrum::{Rgb3, Spectrum},
    utils::FloatExt,
};
use std::f64::consts::PI;

/// Everything the thin-film evaluation needs at one shading point.
/// Built per call from texture lookups; immutable for the call's lifetime.
///
/// `height` is a physically constant film thickness in nanometers, stored
/// as a spectrum purely for type convenience: callers must put the same
/// value in every component, and only the first component is read.
#[derive(Clone, Copy, Debug)]
pub struct IridescenceParams<const N: usize> {
    pub height: Spectrum<N>,
    pub eta1: Spectrum<N>,
    pub eta2: Spectrum<N>,
    pub eta3: Spectrum<N>,
    pub kappa3: Spectrum<N>,
    /// Wavelength (nanometers) assigned to each spectral sample.
    pub wavelengths: Spectrum<N>,
    pub spectral_antialiasing: bool,
    pub use_gaussian_fit: bool,
}

/// Fresnel data for one polarization across all three interfaces:
/// reflectance and transmittance of the top interface, reflectance of the
/// base, the combined phase shift and the round-trip amplitude.
struct Polarization<const N: usize> {
    r12: Spectrum<N>,
    t121: Spectrum<N>,
    r23: Spectrum<N>,
    phi: Spectrum<N>,
    r123: Spectrum<N>,
}

impl<const N: usize> Polarization<N> {
    /// Amplitude of the multiple-reflection series that has fully entered
    /// the film (the DC term of the interference pattern).
    fn series_dc(&self) -> Spectrum<N> {
        (self.t121.sq() * self.r23) / (Spectrum::ONE - self.r12 * self.r23)
    }
}

/// Per-interface Fresnel setup shared by every evaluation mode.
/// Returns the two polarizations and the refracted cosine.
fn interface_terms<const N: usize>(
    ct1: f64,
    params: &IridescenceParams<N>,
) -> ([Polarization<N>; 2], Spectrum<N>) {
    let mut r12_p = Spectrum::ZERO;
    let mut r12_s = Spectrum::ZERO;
    let mut r23_p = Spectrum::ZERO;
    let mut r23_s = Spectrum::ZERO;
    let mut t121_p = Spectrum::ZERO;
    let mut t121_s = Spectrum::ZERO;
    let mut ct2 = Spectrum::<N>::ZERO;

    for i in 0..N {
        // The refracted direction is wavelength dependent, so every
        // channel carries its own cosine.
        let scale = params.eta1[i] / params.eta2[i];
        #[allow(clippy::suboptimal_flops)]
        let cos_theta_t_sqr = 1.0 - (1.0 - ct1.sq()) * scale.sq();

        if cos_theta_t_sqr <= 0.0 {
            // total internal reflection: everything bounces off the top
            r12_s[i] = 1.0;
            r12_p[i] = 1.0;
            t121_p[i] = 0.0;
            t121_s[i] = 0.0;
        } else {
            ct2[i] = cos_theta_t_sqr.sqrt();
            let (rp, rs) = fresnel::conductor(ct1, params.eta2[i] / params.eta1[i], 0.0);
            r12_p[i] = rp;
            r12_s[i] = rs;

            // reflected part by the base
            let (rp, rs) = fresnel::conductor(
                ct2[i],
                params.eta3[i] / params.eta2[i],
                params.kappa3[i] / params.eta2[i],
            );
            r23_p[i] = rp;
            r23_s[i] = rs;

            t121_p[i] = 1.0 - r12_p[i];
            t121_s[i] = 1.0 - r12_s[i];
        }
    }

    let (mut phi21_p, mut phi21_s) = fresnel::phase_shift(
        Spectrum::splat(ct1),
        Spectrum::ONE,
        params.eta2,
        Spectrum::ZERO,
    );
    phi21_p = Spectrum::splat(PI) - phi21_p;
    phi21_s = Spectrum::splat(PI) - phi21_s;
    let (phi23_p, phi23_s) = fresnel::phase_shift(ct2, params.eta2, params.eta3, params.kappa3);

    let pol_p = Polarization {
        r12: r12_p,
        t121: t121_p,
        r23: r23_p,
        phi: phi23_p + phi21_p,
        r123: (r12_p * r23_p).sqrt(),
    };
    let pol_s = Polarization {
        r12: r12_s,
        t121: t121_s,
        r23: r23_s,
        phi: phi23_s + phi21_s,
        r123: (r12_s * r23_s).sqrt(),
    };
    ([pol_p, pol_s], ct2)
}

/// Airy summation for one polarization: the closed form of the geometric
/// cosine series `sum_m r^m cos(m theta)`.
fn airy_contribution<const N: usize>(pol: &Polarization<N>, dphi: Spectrum<N>) -> Spectrum<N> {
    let rs = pol.series_dc();
    let cos_p = (dphi + pol.phi).cos();
    let irid = (pol.r123 * cos_p - pol.r123.sq())
        / (Spectrum::ONE - 2.0 * pol.r123 * cos_p + pol.r123.sq());
    pol.r12 + rs + 2.0 * (rs - pol.t121) * irid
}

/// Harmonic summation for one polarization: DC term plus the first two
/// harmonics weighted by the CMF transform.
fn harmonic_contribution(pol: &Polarization<3>, d: Rgb3, use_gaussian_fit: bool) -> Rgb3 {
    let rs = pol.series_dc();
    let mut i = pol.r12 + rs;

    let mut cm = rs - pol.t121;
    for m in 1..=2 {
        cm *= pol.r123;
        let sm = 2.0 * eval_sensitivity(f64::from(m) * d, f64::from(m) * pol.phi, use_gaussian_fit);
        i += cm * sm;
    }
    i
}

impl<const N: usize> IridescenceParams<N> {
    /// Thin-film reflectance by Airy summation, per wavelength sample.
    /// Non-negative in every channel for any valid input.
    #[must_use]
    pub fn reflectance_airy(&self, ct1: f64) -> Spectrum<N> {
        let (pols, ct2) = interface_terms(ct1, self);

        // optical path difference between the direct and the internal ray
        let d = 2.0 * self.eta2 * self.height[0] * ct2;
        let dphi = 2.0 * PI * d / self.wavelengths;

        let mut i = Spectrum::ZERO;
        for pol in &pols {
            i += airy_contribution(pol, dphi);
        }

        // clamp numerical overshoot of the truncated series, then average
        // the two polarizations (unpolarized incident light)
        0.5 * i.clamp_negative()
    }
}

impl IridescenceParams<3> {
    /// Thin-film reflectance in the mode selected by
    /// [`spectral_antialiasing`](Self::spectral_antialiasing): harmonic
    /// (antialiased, XYZ basis converted to RGB) or plain Airy summation.
    #[must_use]
    pub fn reflectance(&self, ct1: f64) -> Rgb3 {
        if !self.spectral_antialiasing {
            return self.reflectance_airy(ct1);
        }

        let (pols, ct2) = interface_terms(ct1, self);
        let d = 2.0 * self.eta2 * self.height[0] * ct2;

        let mut i = Rgb3::ZERO;
        for pol in &pols {
            i += harmonic_contribution(pol, d, self.use_gaussian_fit);
        }

        0.5 * i.xyz_to_rgb().clamp_negative()
    }

    /// Expectation and variance of the antialiased reflectance under a
    /// uniform film-thickness distribution over
    /// `[min_height, max_height]` (nanometers).
    ///
    /// The variance accumulates `4 C1^2 (E[S^2] - E[S]^2)` independently
    /// per polarization; covariance between polarizations and harmonics
    /// is omitted (see [`eval_sensitivity_square`]).
    ///
    /// Only the antialiased mode has closed-form moments. With
    /// `spectral_antialiasing` disabled this returns a neutral
    /// `(zero, zero)` pair; [`crate::glint::GlintBsdf::new`] rejects that
    /// configuration so the discrete glint path never reaches it.
    #[must_use]
    pub fn mean_and_variance(&self, ct1: f64, min_height: f64, max_height: f64) -> (Rgb3, Rgb3) {
        if !self.spectral_antialiasing {
            return (Rgb3::ZERO, Rgb3::ZERO);
        }

        let (pols, ct2) = interface_terms(ct1, self);

        // reduced path difference: OPD per nanometer of film thickness
        let tau = 2.0 * self.eta2 * ct2;

        let mut i = Rgb3::ZERO;
        let mut v = Rgb3::ZERO;
        for pol in &pols {
            let rs = pol.series_dc();
            i += pol.r12 + rs;

            let c1 = (rs - pol.t121) * pol.r123;
            let mean = eval_sensitivity_mean(1, tau, pol.phi, min_height, max_height);
            i += 2.0 * c1 * mean;

            let second = eval_sensitivity_square(tau, pol.phi, min_height, max_height);
            v += 4.0 * c1.sq() * (second - mean.sq());
        }

        (0.5 * i.clamp_negative(), 0.5 * v.clamp_negative())
    }
}
