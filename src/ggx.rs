//! Anisotropic GGX normal distribution with a finite facet budget.
//!
//! The smooth model treats microfacet normals as a continuous density;
//! the discrete glint model reinterprets the same density as the
//! statistics of `total_facets` individual facets spread over the unit
//! parameter square. All the continuous machinery (NDF, Smith shadowing,
//! normal sampling) lives here; counting facets inside a footprint is the
//! quadrature module's job.
//!
//! # Mathematical background
//! * [Understanding the Masking-Shadowing Function in Microfacet-Based BRDFs](https://jcgt.org/published/0003/02/03/)
//! * [Sampling the GGX Distribution of Visible Normals](https://jcgt.org/published/0007/04/01/)

use crate::{utils::FloatExt, Vec3d};
use std::f64::consts;

/// GGX microsurface statistics for a population of discrete facets.
#[derive(Clone, Copy, Debug)]
pub struct DiscreteGgx {
    /// roughness in direction x; `alpha = perceived_roughness^2` is a good
    /// perceptual mapping
    pub alpha_u: f64,

    /// roughness in direction y
    pub alpha_v: f64,

    /// how many individual facets the whole unit parameter square carries
    pub total_facets: u64,

    /// sample the distribution of visible normals instead of the plain
    /// cosine-weighted NDF
    pub sample_visible: bool,
}

impl DiscreteGgx {
    /// Distribution of normals / Normal Distribution Function.
    /// This is the $D$ term in the typical Cook-Torrance model; normalized
    /// so that the projected density `D(m) m.z` integrates to one over the
    /// hemisphere.
    #[must_use]
    pub fn ndf(&self, m: Vec3d) -> f64 {
        if m.z <= 1e-10 {
            return 0.0;
        }
        let denom = consts::PI
            * self.alpha_u
            * self.alpha_v
            * ((m.x / self.alpha_u).sq() + (m.y / self.alpha_v).sq() + (m.z).sq()).sq();
        1.0 / denom
    }

    /// Smith masking-shadowing for both directions, the $G$ term.
    #[must_use]
    pub fn geometric(&self, omega_i: Vec3d, omega_o: Vec3d, m: Vec3d) -> f64 {
        self.smith_g1(omega_i, m) * self.smith_g1(omega_o, m)
    }

    /// Single-direction Smith shadowing, the $G_1$ term.
    #[must_use]
    pub fn smith_g1(&self, omega: Vec3d, m: Vec3d) -> f64 {
        Self::g1_local(omega, m) * self.g1_distant(omega)
    }

    fn g1_distant(&self, omega: Vec3d) -> f64 {
        if omega.z.abs() < 1e-10 {
            return 0.0;
        }
        2.0 / (1.0
            + f64::sqrt(
                1.0 + ((self.alpha_u * omega.x).sq() + (self.alpha_v * omega.y).sq())
                    / (omega.z).sq(),
            ))
    }

    fn g1_local(omega: Vec3d, m: Vec3d) -> f64 {
        if omega.dot(m) * omega.z >= 0.0 {
            1.0
        } else {
            0.0
        }
    }

    /// Mean roughness reported to the host material system.
    #[must_use]
    pub fn roughness(&self) -> f64 {
        0.5 * (self.alpha_u + self.alpha_v)
    }

    /// Draws a microfacet normal according to the configured strategy and
    /// returns it together with its sampling density (with respect to
    /// solid angle in the normal domain).
    #[must_use]
    pub fn sample_normal(&self, omega: Vec3d, u1: f64, u2: f64) -> (Vec3d, f64) {
        let m = if self.sample_visible {
            self.sample_vndf(omega * omega.z.signum(), u1, u2)
        } else {
            self.sample_plain(u1, u2)
        };
        (m, self.normal_pdf(omega, m))
    }

    /// Density of [`sample_normal`](Self::sample_normal) at `m`.
    #[must_use]
    pub fn normal_pdf(&self, omega: Vec3d, m: Vec3d) -> f64 {
        if self.sample_visible {
            self.smith_g1(omega, m) * omega.dot(m).clamp(0.0, 1.0) * self.ndf(m)
                / omega.z.abs().max(1e-10)
        } else {
            // the cosine-weighted NDF is itself normalized
            self.ndf(m) * m.z.max(0.0)
        }
    }

    /// Visible-normal sampling after Heitz,
    /// "Sampling the GGX Distribution of Visible Normals" (2018).
    #[must_use]
    fn sample_vndf(&self, omega_o: Vec3d, r1: f64, r2: f64) -> Vec3d {
        let v_h: Vec3d = Vec3d::new(
            omega_o.x * self.alpha_u,
            omega_o.y * self.alpha_v,
            omega_o.z,
        )
        .normalize();

        #[allow(clippy::suboptimal_flops)]
        let lensq = v_h.x * v_h.x + v_h.y * v_h.y;
        let at1: Vec3d = if lensq > 1.0e-10 {
            Vec3d::new(-v_h.y, v_h.x, 0.0) / f64::sqrt(lensq)
        } else {
            Vec3d::new(1.0, 0.0, 0.0)
        };
        let at2: Vec3d = Vec3d::cross(v_h, at1);

        let r = r1.sqrt();
        let phi: f64 = 2.0 * consts::PI * r2;
        let t1 = r * phi.cos();
        let t2 = r * phi.sin();
        let s: f64 = 0.5 * (1.0 + v_h.z);

        #[allow(clippy::suboptimal_flops)]
        let t2r = (1.0 - s) * (1.0 - t1 * t1).sqrt() + s * t2;

        #[allow(clippy::suboptimal_flops)]
        let m_h: Vec3d = at1 * t1 + at2 * t2r + v_h * (1.0 - t1 * t1 - t2r * t2r).max(0.0).sqrt();

        Vec3d::new(
            self.alpha_u * m_h.x,
            self.alpha_v * m_h.y,
            f64::max(0.0, m_h.z),
        )
        .normalize()
    }

    /// Plain sampling of the cosine-weighted NDF, anisotropic inversion
    /// after Walter et al. / pbrt.
    #[must_use]
    fn sample_plain(&self, u1: f64, u2: f64) -> Vec3d {
        let mut phi = 2.0 * consts::PI * u2;
        #[allow(clippy::float_cmp)]
        let cos_theta = if self.alpha_u == self.alpha_v {
            let tan_theta2 = self.alpha_u.sq() * u1 / (1.0 - u1);
            1.0 / (1.0 + tan_theta2).sqrt()
        } else {
            #[allow(clippy::suboptimal_flops)]
            {
                phi = f64::atan(self.alpha_v / self.alpha_u
                    * f64::tan(2.0 * consts::PI * u2 + 0.5 * consts::PI));
                if u2 > 0.5 {
                    phi += consts::PI;
                }
            }
            let (sin_phi, cos_phi) = phi.sin_cos();
            let alpha2 = 1.0 / (cos_phi.sq() / self.alpha_u.sq() + sin_phi.sq() / self.alpha_v.sq());
            let tan_theta2 = alpha2 * u1 / (1.0 - u1);
            1.0 / (1.0 + tan_theta2).sqrt()
        };
        let sin_theta = (1.0 - cos_theta.sq()).safe_sqrt();
        let (sin_phi, cos_phi) = phi.sin_cos();
        Vec3d::new(sin_theta * cos_phi, sin_theta * sin_phi, cos_theta)
    }
}

#[cfg(test)]
mod tests {
    use super::DiscreteGgx;
    use crate::{test_utils::hemisphere_sample, Vec3d};
    use std::f64::consts;

    const ROUGH: DiscreteGgx = DiscreteGgx {
        alpha_u: 0.5,
        alpha_v: 0.5,
        total_facets: 1_000_000,
        sample_visible: true,
    };

    const ANISO_PLAIN: DiscreteGgx = DiscreteGgx {
        alpha_u: 0.4,
        alpha_v: 0.2,
        total_facets: 1_000_000,
        sample_visible: false,
    };

    #[test]
    fn projected_ndf_integrates_to_one() {
        let mut rd = fastrand::Rng::with_seed(41);
        let num_samples = 2_000_000;
        let mut sum = 0.0;
        for _ in 0..num_samples {
            let m = hemisphere_sample(&mut rd);
            sum += ROUGH.ndf(m) * m.z;
        }
        // uniform hemisphere sampling has density 1 / 2pi
        let integral = sum / num_samples as f64 * 2.0 * consts::PI;
        assert!(
            (integral - 1.0).abs() < 0.02,
            "projected NDF integral: {integral}"
        );
    }

    #[test]
    fn plain_sampling_follows_the_projected_ndf() {
        // the sampled normals must be distributed like ndf(m) m.z: compare
        // the sampled mean of m.z against a brute-force estimate of
        // E[m.z] under that density
        let mut rd = fastrand::Rng::with_seed(43);
        let omega = Vec3d::new(0.3, -0.1, 0.95).normalize();
        let num_samples = 1_000_000;

        let mut sampled = 0.0;
        for _ in 0..num_samples {
            let (m, pdf) = ANISO_PLAIN.sample_normal(omega, rd.f64(), rd.f64());
            assert!(pdf > 0.0, "sampled a normal with zero density: {m:?}");
            sampled += m.z;
        }
        let sampled = sampled / num_samples as f64;

        let mut brute = 0.0;
        for _ in 0..num_samples {
            let m = hemisphere_sample(&mut rd);
            brute += ANISO_PLAIN.ndf(m) * m.z * m.z;
        }
        let brute = brute / num_samples as f64 * 2.0 * consts::PI;

        assert!(
            (sampled - brute).abs() < 0.01,
            "sampled E[m.z] {sampled} vs integrated {brute}"
        );
    }

    #[test]
    fn vndf_sampling_follows_the_visible_normal_density() {
        // same histogram-free check as for plain sampling, against the
        // visible normal density G1(omega, m) max(0, omega.m) D(m) / omega.z
        let mut rd = fastrand::Rng::with_seed(47);
        let omega = Vec3d::new(0.4, 0.2, 0.89).normalize();
        let num_samples = 1_000_000;

        let mut sampled = 0.0;
        for _ in 0..num_samples {
            let (m, pdf) = ROUGH.sample_normal(omega, rd.f64(), rd.f64());
            assert!(pdf > 0.0, "sampled a normal with zero density: {m:?}");
            sampled += m.z;
        }
        let sampled = sampled / num_samples as f64;

        let mut brute = 0.0;
        for _ in 0..num_samples {
            let m = hemisphere_sample(&mut rd);
            brute += ROUGH.normal_pdf(omega, m) * m.z;
        }
        let brute = brute / num_samples as f64 * 2.0 * consts::PI;

        assert!(
            (sampled - brute).abs() < 0.01,
            "sampled E[m.z] {sampled} vs integrated {brute}"
        );
    }

    #[test]
    fn shadowing_is_bounded() {
        let mut rd = fastrand::Rng::with_seed(53);
        for _ in 0..10_000 {
            let omega = hemisphere_sample(&mut rd);
            let m = hemisphere_sample(&mut rd);
            let g1 = ROUGH.smith_g1(omega, m);
            assert!((0.0..=1.0).contains(&g1));
            let g2 = ROUGH.geometric(omega, hemisphere_sample(&mut rd), m);
            assert!((0.0..=1.0).contains(&g2));
        }
    }
}
