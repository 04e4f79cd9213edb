use rand::RngCore;

use crate::spectrum::Rgb3;

/// used for direction vectors
pub type Vec3d = glam::f64::DVec3;
/// used for parametric (uv) coordinates
pub type Vec2d = glam::f64::DVec2;

/// Contains the data that is returned by [`Bsdf::sample`]
pub struct SampleResponse {
    /// The direction to which light is scattered to
    pub omega_o: Vec3d,

    /// The sampling weight, i.e. the BSDF value combined with the sampling
    /// estimator so that `weight` is what a path tracer multiplies its
    /// throughput by
    pub weight: Rgb3,

    /// The probability density of choosing `omega_o` given `omega_i`,
    /// expressed with respect to solid angle around `omega_o`
    pub pdf: f64,
}

impl SampleResponse {
    /// A sample that carries no contribution. Used whenever a zero pdf or a
    /// below-horizon direction short-circuits the sampling routine.
    #[must_use]
    pub const fn invalid() -> Self {
        Self {
            omega_o: Vec3d::ZERO,
            weight: Rgb3::ZERO,
            pdf: 0.0,
        }
    }
}

/// The pixel footprint at the shading point, expressed as a parallelogram
/// in the surface's (u, v) parameter space.
///
/// A footprint is what turns the smooth microfacet model into a discrete
/// one: the footprint area and the facet budget together determine how many
/// individual facets a pixel can catch.
#[derive(Clone, Copy, Debug)]
pub struct PixelFootprint {
    pub center: Vec2d,
    pub extent_u: Vec2d,
    pub extent_v: Vec2d,
}

impl PixelFootprint {
    /// Parallelogram area in parameter space.
    #[must_use]
    pub fn area(&self) -> f64 {
        #[allow(clippy::suboptimal_flops)]
        (self.extent_u.x * self.extent_v.y - self.extent_u.y * self.extent_v.x).abs()
    }
}

/// Per-call shading geometry that is not a direction: the uv coordinate the
/// textures are looked up at, and the pixel footprint if the renderer
/// provides ray differentials. Without a footprint the BSDF reverts to the
/// smooth microfacet model.
#[derive(Clone, Copy, Debug)]
pub struct ShadingPoint {
    pub uv: Vec2d,
    pub footprint: Option<PixelFootprint>,
    /// Number of samples the renderer takes per pixel. Controls how finely
    /// partially covered quadrature cells are resolved.
    pub samples_per_pixel: usize,
}

impl ShadingPoint {
    #[must_use]
    pub const fn smooth(uv: Vec2d) -> Self {
        Self {
            uv,
            footprint: None,
            samples_per_pixel: 1,
        }
    }
}

/// A spectral quantity evaluated over the surface. Texture storage and
/// filtering live in the host renderer; the BSDF only ever calls `eval`.
pub trait Texture: Send + Sync {
    fn eval(&self, uv: Vec2d) -> Rgb3;
}

/// A [`Texture`] that ignores the uv coordinate.
pub struct ConstantTexture(pub Rgb3);

impl Texture for ConstantTexture {
    fn eval(&self, _uv: Vec2d) -> Rgb3 {
        self.0
    }
}

/// Rejected material configurations. All of these are caught when the
/// material is built, never during shading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The thickness mean/variance estimators only exist for the
    /// antialiased three-channel mode, and the discrete glint path cannot
    /// run without them.
    #[error("discrete glints require spectral antialiasing: the non-antialiased mean/variance path is not implemented")]
    VarianceRequiresAntialiasing,

    #[error("total facet budget must be positive")]
    InvalidFacetBudget,

    #[error("query radius must lie in (0, 90) degrees, got {0}")]
    InvalidQueryRadius(f64),

    #[error("roughness must be positive, got alpha_u = {0}, alpha_v = {1}")]
    InvalidRoughness(f64, f64),
}

/// Bidirectional Scattering Distribution Functions, evaluated in a local
/// space where the surface is the xy-plane and the z-axis is the surface
/// normal. Incident and exitant vectors must be rotated into this frame
/// before evaluation.
///
/// The `|omega_i.z|` cosine term is not part of the BSDF value; the caller
/// multiplies it in. Pdfs are meant for importance sampling and are
/// expressed with respect to solid angle.
///
/// Unlike a purely deterministic BSDF, evaluating a discrete glint model
/// draws from the caller's random generator: the finite facet population
/// inside a footprint makes the reflectance itself a random variable.
/// Every entry point therefore threads an explicit `rng`; renderers supply
/// one generator per worker thread.
pub trait Bsdf {
    /// Returns the value of the BSDF for the given pair of directions.
    ///
    /// # Arguments
    /// * `point` - uv coordinate and (optionally) the pixel footprint
    /// * `omega_i` - incident light direction
    /// * `omega_o` - exitant light direction
    /// * `rng` - caller-owned random source for the discrete facet draw
    fn eval(
        &self,
        point: &ShadingPoint,
        omega_i: Vec3d,
        omega_o: Vec3d,
        rng: &mut dyn RngCore,
    ) -> Rgb3;

    /// Given an incident light direction, samples a direction where light
    /// is scattered to.
    ///
    /// # Return
    /// See [`SampleResponse`]
    fn sample(&self, point: &ShadingPoint, omega_i: Vec3d, rng: &mut dyn RngCore)
        -> SampleResponse;

    /// Returns the probability density of sampling `omega_o` given
    /// `omega_i`, with the Jacobian of the half-direction mapping applied.
    fn pdf(&self, point: &ShadingPoint, omega_i: Vec3d, omega_o: Vec3d) -> f64;
}
