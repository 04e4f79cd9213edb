use crate::Vec3d;
use std::f64::consts;

/** sample a direction with density 1 / 2pi on the upper hemisphere */
pub fn hemisphere_sample(rd: &mut fastrand::Rng) -> Vec3d {
    let cos_theta = rd.f64();
    #[allow(clippy::suboptimal_flops)]
    let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
    let phi = 2.0 * consts::PI * rd.f64();
    let (sin_phi, cos_phi) = phi.sin_cos();
    Vec3d::new(sin_theta * cos_phi, sin_theta * sin_phi, cos_theta)
}
