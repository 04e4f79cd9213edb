use crate::Vec3d;

pub trait FloatExt {
    fn sq(self) -> Self;
    /// Square root that treats small negative radicands as numerical noise.
    fn safe_sqrt(self) -> Self;
}

impl FloatExt for f64 {
    fn sq(self) -> Self {
        self * self
    }

    fn safe_sqrt(self) -> Self {
        self.max(0.0).sqrt()
    }
}

pub fn reflect(n: Vec3d, vec: Vec3d) -> Vec3d {
    n * (n.dot(vec) * 2.0) - vec
}

/// An orthonormal basis around `n`, for expressing directions sampled
/// around the z-axis in the frame of an arbitrary unit vector.
pub struct Frame {
    pub s: Vec3d,
    pub t: Vec3d,
    pub n: Vec3d,
}

impl Frame {
    #[must_use]
    pub fn from_normal(n: Vec3d) -> Self {
        #[allow(clippy::suboptimal_flops)]
        let lensq = n.x * n.x + n.y * n.y;
        let s = if lensq > 1e-10 {
            Vec3d::new(-n.y, n.x, 0.0) / lensq.sqrt()
        } else {
            Vec3d::new(1.0, 0.0, 0.0)
        };
        let t = n.cross(s);
        Self { s, t, n }
    }

    #[must_use]
    pub fn to_world(&self, v: Vec3d) -> Vec3d {
        self.s * v.x + self.t * v.y + self.n * v.z
    }
}

/// Maps a point on the unit square to a direction inside a cone of
/// directions around the z-axis, with uniform density with respect to
/// solid angle. `cos_cutoff` is the cosine of the cone's half-angle.
#[must_use]
pub fn square_to_uniform_cone(cos_cutoff: f64, u1: f64, u2: f64) -> Vec3d {
    #[allow(clippy::suboptimal_flops)]
    let cos_theta = (1.0 - u1) + u1 * cos_cutoff;
    let sin_theta = (1.0 - cos_theta * cos_theta).safe_sqrt();
    let phi = 2.0 * std::f64::consts::PI * u2;
    let (sin_phi, cos_phi) = phi.sin_cos();
    Vec3d::new(sin_theta * cos_phi, sin_theta * sin_phi, cos_theta)
}
