//! Exact Fresnel terms for conductor interfaces.
//!
//! Both the power reflectance and the phase retardation on reflection are
//! resolved per polarization; the thin-film model needs the two
//! polarizations separately because their interference patterns differ.

use crate::{spectrum::Spectrum, utils::FloatExt};

/// Polarized power reflectance at a (possibly absorbing) interface, for an
/// incident cosine in `[0, 1]` and a relative index of refraction
/// `eta + i k`. Returns `(r_p, r_s)`, both in `[0, 1]`. With `k = 0` this
/// reduces to the dielectric Fresnel equations.
///
/// Modified from "Optics" by K.D. Moeller, University Science Books, 1988.
#[must_use]
pub fn conductor(cos_theta_i: f64, eta: f64, k: f64) -> (f64, f64) {
    let cos_theta_i2 = cos_theta_i.sq();
    let sin_theta_i2 = 1.0 - cos_theta_i2;
    let sin_theta_i4 = sin_theta_i2.sq();

    let temp1 = eta.sq() - k.sq() - sin_theta_i2;
    #[allow(clippy::suboptimal_flops)]
    let a2pb2 = (temp1.sq() + 4.0 * k.sq() * eta.sq()).safe_sqrt();
    let a = (0.5 * (a2pb2 + temp1)).safe_sqrt();

    let term1 = a2pb2 + cos_theta_i2;
    let term2 = 2.0 * a * cos_theta_i;

    let r_s = (term1 - term2) / (term1 + term2);

    #[allow(clippy::suboptimal_flops)]
    let term3 = a2pb2 * cos_theta_i2 + sin_theta_i4;
    let term4 = term2 * sin_theta_i2;

    let r_p = r_s * (term3 - term4) / (term3 + term4);
    (r_p, r_s)
}

/// Phase retardation on reflection at the interface between a dielectric
/// (`eta1`) and a possibly absorbing medium (`eta2 + i kappa2`), per
/// wavelength sample. Returns `(phi_p, phi_s)`.
///
/// Classical Born & Wolf amplitude/phase decomposition: the auxiliary
/// terms `U` and `V` are the real and imaginary part of the transmitted
/// wave vector's z-component. `B >= |A|` holds analytically; the radicand
/// of `V` is still tested before the root so numerical noise beyond the
/// total-internal-reflection boundary cannot produce a NaN. The `atan2`
/// form keeps the non-absorbing boundary (`eta = 1`, `kappa = 0`) free of
/// divisions by zero.
#[must_use]
pub fn phase_shift<const N: usize>(
    cos_theta_i: Spectrum<N>,
    eta1: Spectrum<N>,
    eta2: Spectrum<N>,
    kappa2: Spectrum<N>,
) -> (Spectrum<N>, Spectrum<N>) {
    let sin_theta_sqr = Spectrum::ONE - cos_theta_i.sq();
    let a = eta2.sq() * (Spectrum::ONE - kappa2.sq()) - eta1.sq() * sin_theta_sqr;
    let b = (a.sq() + (2.0 * eta2.sq() * kappa2).sq()).clamp_negative().sqrt();
    let u = ((a + b) / 2.0).clamp_negative().sqrt();
    let v = ((b - a) / 2.0).clamp_negative().sqrt();

    let phi_s = (2.0 * eta1 * v * cos_theta_i).atan2(u.sq() + v.sq() - (eta1 * cos_theta_i).sq());
    let phi_p = (2.0 * eta1 * eta2.sq() * cos_theta_i
        * (2.0 * kappa2 * u - (Spectrum::ONE - kappa2.sq()) * v))
        .atan2((eta2.sq() * (Spectrum::ONE + kappa2.sq()) * cos_theta_i).sq()
            - eta1.sq() * (u.sq() + v.sq()));
    (phi_p, phi_s)
}

#[cfg(test)]
mod tests {
    use super::{conductor, phase_shift};
    use crate::{spectrum::Spectrum, utils::FloatExt};

    /// Dielectric power reflectance straight from the amplitude equations.
    fn dielectric_reference(cos_theta_i: f64, eta: f64) -> (f64, f64) {
        let sin_theta_t2 = (1.0 - cos_theta_i.sq()) / eta.sq();
        if sin_theta_t2 >= 1.0 {
            return (1.0, 1.0);
        }
        let cos_theta_t = (1.0 - sin_theta_t2).sqrt();
        let r_s = (cos_theta_i - eta * cos_theta_t) / (cos_theta_i + eta * cos_theta_t);
        let r_p = (eta * cos_theta_i - cos_theta_t) / (eta * cos_theta_i + cos_theta_t);
        (r_p.sq(), r_s.sq())
    }

    #[test]
    fn reflectances_stay_in_unit_interval() {
        let mut rd = fastrand::Rng::with_seed(11);
        for _ in 0..10_000 {
            let cos_theta = rd.f64();
            let eta = 0.1 + 3.0 * rd.f64();
            let k = 4.0 * rd.f64();
            let (r_p, r_s) = conductor(cos_theta, eta, k);
            assert!((0.0..=1.0).contains(&r_p), "r_p = {r_p}");
            assert!((0.0..=1.0).contains(&r_s), "r_s = {r_s}");
        }
    }

    #[test]
    fn matches_dielectric_fresnel_without_absorption() {
        let mut rd = fastrand::Rng::with_seed(5);
        for _ in 0..10_000 {
            let cos_theta = 0.01 + 0.99 * rd.f64();
            let eta = 1.1 + 1.5 * rd.f64();
            let (r_p, r_s) = conductor(cos_theta, eta, 0.0);
            let (d_p, d_s) = dielectric_reference(cos_theta, eta);
            assert!((r_p - d_p).abs() < 1e-9, "r_p {r_p} vs {d_p}");
            assert!((r_s - d_s).abs() < 1e-9, "r_s {r_s} vs {d_s}");
        }
    }

    #[test]
    fn dielectric_normal_incidence_has_no_phase_shift() {
        let (phi_p, phi_s) = phase_shift(
            Spectrum::<3>::ONE,
            Spectrum::ONE,
            Spectrum::splat(1.5),
            Spectrum::ZERO,
        );
        for i in 0..3 {
            assert!(phi_p[i].abs() < 1e-12);
            assert!(phi_s[i].abs() < 1e-12);
        }
    }

    #[test]
    fn phase_shift_is_finite_for_absorbing_base() {
        let mut rd = fastrand::Rng::with_seed(23);
        for _ in 0..1000 {
            let cos_t = Spectrum::<3>::splat(rd.f64());
            let (phi_p, phi_s) = phase_shift(
                cos_t,
                Spectrum::splat(1.0 + rd.f64()),
                Spectrum::splat(0.2 + 2.0 * rd.f64()),
                Spectrum::splat(4.0 * rd.f64()),
            );
            assert!(phi_p.is_finite());
            assert!(phi_s.is_finite());
        }
    }
}
