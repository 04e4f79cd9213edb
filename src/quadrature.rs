//! Adaptive quadrature of a normal distribution over spherical regions.
//!
//! The discrete glint model needs the integral of the microfacet NDF over
//! an arbitrary solid-angle footprint, at every shading sample. Doing that
//! integration on demand would be far too slow, so the hemisphere is
//! subdivided once, at material build time, into a tree of spherical
//! triangles whose sub-integrals are memoized; a shading-time query then
//! only walks the cached tree and resolves partially covered leaves with a
//! small deterministic point grid.
//!
//! Tree nodes are addressed by the path of child indices taken from the
//! root, packed into a `u64` (two bits per level behind a sentinel bit),
//! so a lookup is one integer hash instead of a string hash.

use ahash::AHashMap;
use crate::{core::PixelFootprint, utils::reflect, Vec3d};

/// Error threshold below which a triangle's two quadrature rules are
/// considered converged, absolute and relative to the second rule.
const TOLERANCE: f64 = 1e-5;

/// Subdivision bound: the two-rule error test alone does not provably
/// terminate for near-delta distributions, so recursion stops here and
/// accepts the vertex rule.
pub const MAX_DEPTH: u32 = 16;

/// Identifies a node of the subdivision tree by the path from the root:
/// two bits per level, most recent child in the low bits, behind a
/// leading sentinel.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
pub struct PathKey(u64);

impl PathKey {
    /// The whole hemisphere, parent of the four quadrant triangles.
    pub const ROOT: Self = Self(1);

    #[must_use]
    pub const fn child(self, i: u64) -> Self {
        Self(self.0 << 2 | i)
    }
}

/// Memoized sub-integrals of one distribution, keyed by subdivision path.
/// Built once per material, read-only afterwards; concurrent readers need
/// no synchronization.
#[derive(Default)]
pub struct IntegrationCache {
    entries: AHashMap<PathKey, f64>,
}

impl IntegrationCache {
    #[must_use]
    pub fn get(&self, key: PathKey) -> Option<f64> {
        self.entries.get(&key).copied()
    }

    #[must_use]
    pub fn contains(&self, key: PathKey) -> bool {
        self.entries.contains_key(&key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A triangle on the unit sphere, stored as three unit vertices.
#[derive(Clone, Copy, Debug)]
pub struct SphericalTriangle {
    pub a: Vec3d,
    pub b: Vec3d,
    pub c: Vec3d,
}

impl SphericalTriangle {
    #[must_use]
    pub fn new(a: Vec3d, b: Vec3d, c: Vec3d) -> Self {
        Self {
            a: a.normalize(),
            b: b.normalize(),
            c: c.normalize(),
        }
    }

    /// Solid angle subtended by the triangle (its spherical excess), by
    /// the Van Oosterom & Strackee formula.
    #[must_use]
    pub fn excess(&self) -> f64 {
        let numer = self.a.dot(self.b.cross(self.c)).abs();
        let denom = 1.0 + self.a.dot(self.b) + self.b.dot(self.c) + self.c.dot(self.a);
        2.0 * numer.atan2(denom)
    }

    #[must_use]
    pub fn center(&self) -> Vec3d {
        (self.a + self.b + self.c).normalize()
    }

    #[must_use]
    pub const fn vertices(&self) -> [Vec3d; 3] {
        [self.a, self.b, self.c]
    }

    /// Standard quadrisection: the three edge midpoints cut the triangle
    /// into four children that exactly tile it. Child order is fixed; the
    /// cache keys depend on it.
    #[must_use]
    pub fn split(&self) -> [Self; 4] {
        let mab = (self.a + self.b).normalize();
        let mbc = (self.b + self.c).normalize();
        let mca = (self.c + self.a).normalize();
        [
            Self { a: self.a, b: mab, c: mca },
            Self { a: mab, b: self.b, c: mbc },
            Self { a: mca, b: mbc, c: self.c },
            Self { a: mab, b: mbc, c: mca },
        ]
    }

    /// Whether `p` (a unit vector) lies inside the triangle: `p` must be
    /// on the same side of each edge's great circle as the opposite
    /// vertex.
    #[must_use]
    pub fn contains(&self, p: Vec3d) -> bool {
        let edges = [(self.a, self.b, self.c), (self.b, self.c, self.a), (self.c, self.a, self.b)];
        for (u, v, w) in edges {
            let n = u.cross(v);
            if n.dot(p) * n.dot(w) < 0.0 {
                return false;
            }
        }
        true
    }
}

/// The four spherical triangles covering the quadrants of the upper
/// hemisphere. The horizon vertices are lifted slightly above z = 0 to
/// keep the excess computation well conditioned at the equator.
#[must_use]
pub fn hemisphere_quadrants() -> [SphericalTriangle; 4] {
    let z = Vec3d::new(0.0, 0.0, 1.0);
    [
        SphericalTriangle::new(z, Vec3d::new(1.0, 0.0, 1e-3), Vec3d::new(0.0, 1.0, 1e-3)),
        SphericalTriangle::new(z, Vec3d::new(-1.0, 0.0, 1e-3), Vec3d::new(0.0, 1.0, 1e-3)),
        SphericalTriangle::new(z, Vec3d::new(1.0, 0.0, 1e-3), Vec3d::new(0.0, -1.0, 1e-3)),
        SphericalTriangle::new(z, Vec3d::new(-1.0, 0.0, 1e-3), Vec3d::new(0.0, -1.0, 1e-3)),
    ]
}

/// Recursively integrates `distribution` over `tri`, memoizing every
/// visited node under its path key.
///
/// Two rules are compared: the centroid rule and the vertex-average rule.
/// Where they agree (absolutely or relative to the vertex rule) the
/// vertex rule is accepted; otherwise the triangle is quadrisected and
/// the children are summed. Uniform regions are stored too, so the
/// shading-time walk can stop at any cached node.
pub fn integrate<F: Fn(Vec3d) -> f64>(
    distribution: &F,
    tri: &SphericalTriangle,
    key: PathKey,
    cache: &mut IntegrationCache,
    depth: u32,
) -> f64 {
    let excess = tri.excess();
    let rule1 = excess * distribution(tri.center());
    let rule2 = excess
        * (distribution(tri.a) + distribution(tri.b) + distribution(tri.c))
        / 3.0;
    let error = (rule1 - rule2).abs();

    if error < TOLERANCE || error / rule2 < TOLERANCE || depth >= MAX_DEPTH {
        cache.entries.insert(key, rule2);
        return rule2;
    }

    let mut rule3 = 0.0;
    for (i, child) in tri.split().iter().enumerate() {
        rule3 += integrate(distribution, child, key.child(i as u64), cache, depth + 1);
    }
    cache.entries.insert(key, rule3);
    rule3
}

/// Builds the memoized subdivision of the whole upper hemisphere for one
/// distribution. One-time cost, paid when the material is built.
#[must_use]
pub fn build_hemisphere_cache<F: Fn(Vec3d) -> f64>(distribution: &F) -> IntegrationCache {
    let mut cache = IntegrationCache::default();
    for (i, tri) in hemisphere_quadrants().iter().enumerate() {
        integrate(distribution, tri, PathKey::ROOT.child(i as u64), &mut cache, 0);
    }
    cache
}

/// The set of microfacet normals that reflect `omega_i` into the cone of
/// half-angle `radius` around `omega_o` - the footprint of one pixel's
/// worth of outgoing directions, intersected with the sphere of normals.
#[derive(Clone, Copy, Debug)]
pub struct SphericalConicSection {
    omega_i: Vec3d,
    omega_o: Vec3d,
    cos_radius: f64,
}

impl SphericalConicSection {
    /// `radius` is the query cone's half-angle in radians.
    #[must_use]
    pub fn new(omega_i: Vec3d, omega_o: Vec3d, radius: f64) -> Self {
        Self {
            omega_i,
            omega_o,
            cos_radius: radius.cos(),
        }
    }

    #[must_use]
    pub fn contains(&self, m: Vec3d) -> bool {
        reflect(m, self.omega_i).dot(self.omega_o) >= self.cos_radius
    }

    /// The normal at the center of the region: the half vector, which
    /// reflects `omega_i` exactly onto `omega_o`.
    #[must_use]
    pub fn center(&self) -> Vec3d {
        (self.omega_i + self.omega_o).normalize()
    }

    /// Conservative overlap classification against a spherical triangle,
    /// probing the vertices, the edge midpoints and the centroid.
    fn classify(&self, tri: &SphericalTriangle) -> Overlap {
        let probes = [
            tri.a,
            tri.b,
            tri.c,
            (tri.a + tri.b).normalize(),
            (tri.b + tri.c).normalize(),
            (tri.c + tri.a).normalize(),
            tri.center(),
        ];
        let inside = probes.iter().filter(|&&p| self.contains(p)).count();
        if inside == probes.len() {
            Overlap::Inside
        } else if inside == 0 {
            // the whole region could still hide inside the triangle
            if tri.contains(self.center()) {
                Overlap::Partial
            } else {
                Overlap::Outside
            }
        } else {
            Overlap::Partial
        }
    }
}

enum Overlap {
    Inside,
    Outside,
    Partial,
}

/// Integral of the cached distribution over the conic section, scaled by
/// the footprint's parameter-space area. This is the density that, times
/// the total facet budget, gives the expected number of glinting facets.
///
/// Pure function of the cache and its arguments: identical inputs yield
/// bit-identical results.
///
/// `samples_per_pixel` sets the resolution of the coverage grid used for
/// partially overlapped leaves; more samples reduce the quantization of
/// the footprint boundary at the price of more probes.
#[must_use]
pub fn eval_footprint(
    footprint: &PixelFootprint,
    conic: &SphericalConicSection,
    cache: &IntegrationCache,
    samples_per_pixel: usize,
) -> f64 {
    let mut total = 0.0;
    for (i, tri) in hemisphere_quadrants().iter().enumerate() {
        total += visit(tri, PathKey::ROOT.child(i as u64), conic, cache, samples_per_pixel);
    }
    total * footprint.area()
}

fn visit(
    tri: &SphericalTriangle,
    key: PathKey,
    conic: &SphericalConicSection,
    cache: &IntegrationCache,
    samples_per_pixel: usize,
) -> f64 {
    let Some(value) = cache.get(key) else {
        return 0.0;
    };
    match conic.classify(tri) {
        Overlap::Outside => 0.0,
        Overlap::Inside => value,
        Overlap::Partial => {
            if cache.contains(key.child(0)) {
                // finer cached data exists, descend
                let mut sum = 0.0;
                for (i, child) in tri.split().iter().enumerate() {
                    sum += visit(child, key.child(i as u64), conic, cache, samples_per_pixel);
                }
                sum
            } else {
                value * coverage(tri, conic, samples_per_pixel)
            }
        }
    }
}

/// Fraction of the triangle covered by the conic section, estimated on a
/// deterministic barycentric lattice.
fn coverage(tri: &SphericalTriangle, conic: &SphericalConicSection, samples_per_pixel: usize) -> f64 {
    #[allow(clippy::cast_sign_loss, clippy::cast_possible_truncation)]
    let res = (samples_per_pixel.max(1) as f64).sqrt().ceil() as usize + 2;

    let mut inside = 0_usize;
    let mut total = 0_usize;
    for i in 0..=res {
        for j in 0..=(res - i) {
            let k = res - i - j;
            let p = (tri.a * i as f64 + tri.b * j as f64 + tri.c * k as f64).normalize();
            total += 1;
            if conic.contains(p) {
                inside += 1;
            }
        }
    }
    inside as f64 / total as f64
}
