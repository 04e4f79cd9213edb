#![warn(clippy::pedantic)]
#![warn(clippy::perf)]
#![warn(clippy::nursery)]
#![warn(clippy::suboptimal_flops)]
#![deny(clippy::return_self_not_must_use)]
#![allow(clippy::similar_names)]
#![deny(clippy::semicolon_if_nothing_returned)]
#![deny(clippy::must_use_candidate)]
#![deny(clippy::double_must_use)]
#![deny(clippy::use_self)]
#![deny(clippy::unreadable_literal)]
#![deny(clippy::explicit_iter_loop)]
// these are lints to enable later
#![allow(clippy::cast_lossless)]

//! Iridescent, glinting microfacet BSDFs for a path tracer.
//!
//! The crate models a rough conductor under a thin dielectric film. Wave
//! interference inside the film makes the reflectance iridescent; treating
//! the microfacets as a finite, countable population makes it sparkle,
//! because a pixel footprint only ever catches a handful of facets and
//! their summed reflectance fluctuates around the smooth mean.
//!
//! # Design Decisions
//!
//! Lighting calculations are done exclusively in [f64]s; interference
//! terms cancel almost completely near the Airy series' poles and single
//! precision visibly posterizes there.
//!
//! BSDFs are computed in a local space: the surface is the xy-plane and
//! the z-vector is the normal. Incident and exitant vectors must be
//! rotated into this frame before evaluation. The `|omega_i.z|` cosine
//! term is not part of the BSDF value.
//!
//! The discrete facet draw makes evaluation itself stochastic, so every
//! entry point takes an explicit, caller-owned random generator instead
//! of hiding a process-wide one: a renderer hands each worker thread its
//! own. All precomputed state (the quadrature cache, the tabulated CMF
//! transforms) is built before rendering and read-only afterwards, so a
//! material can be shared freely across threads.
//!
//! The spectrally antialiased interference mode and the thickness
//! mean/variance estimators exist for the three-channel configuration
//! only; the plain Airy summation works at any spectral sample count.
//! Unsupported combinations are rejected when the material is built.
//!
//! # References
//! * Laurent Belcour and Pascal Barla. A practical extension to
//!     microfacet theory for the modeling of varying iridescence.
//!     *ACM Transactions on Graphics, 36(4),* 2017.
//! * Wenzel Jakob, Miloš Hašan, Ling-Qi Yan, Jason Lawrence, Ravi
//!     Ramamoorthi, and Steve Marschner. Discrete stochastic microfacet
//!     models. *ACM Transactions on Graphics, 33(4),* 2014.
//! * Eric Heitz. Sampling the GGX Distribution of Visible Normals.
//!     *Journal of Computer Graphics Techniques (JCGT), 7(4), 1-13,* 2018
//!     <http://jcgt.org/published/0007/04/01/>
//! * Eric Heitz. Understanding the masking-shadowing function in
//!     microfacet-based brdfs. *Journal of Computer Graphics Techniques,
//!     3(2):32-91,* 2014.
//! * Max Born and Emil Wolf. *Principles of Optics,* 7th edition,
//!     Cambridge University Press, 1999. (phase shifts on reflection)
//! * K.D. Moeller. *Optics,* University Science Books, 1988. (conductor
//!     Fresnel reflectance)

mod core;

pub use crate::core::{
    Bsdf, ConfigError, ConstantTexture, PixelFootprint, SampleResponse, ShadingPoint, Texture,
    Vec2d, Vec3d,
};

pub mod spectrum;
pub use spectrum::{Rgb3, Spectrum};

#[cfg(test)]
pub(crate) mod test_utils;
pub(crate) mod utils;

#[cfg(feature = "iridescence")]
pub mod cmf_table;
#[cfg(feature = "iridescence")]
pub mod fresnel;
#[cfg(feature = "ggx")]
pub mod ggx;
#[cfg(feature = "glint")]
pub mod glint;
#[cfg(feature = "iridescence")]
pub mod iridescence;
#[cfg(feature = "glint")]
pub mod quadrature;
#[cfg(feature = "iridescence")]
pub mod sensitivity;
