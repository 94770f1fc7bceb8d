use crate::math::{self, Isometry, Real, Vector, EPSILON};
use crate::settings::MAX_MANIFOLD_POINTS;

/// The kind of geometric feature a contact point was generated from.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum FeatureType {
    /// A vertex.
    Vertex,
    /// A face (edge).
    Face,
}

/// The features that intersect to form a contact point.
///
/// Used to match contact points across time steps so that accumulated impulses can be
/// carried over.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ContactFeature {
    /// Feature index on shape A.
    pub index_a: u8,
    /// Feature index on shape B.
    pub index_b: u8,
    /// The feature type on shape A.
    pub type_a: FeatureType,
    /// The feature type on shape B.
    pub type_b: FeatureType,
}

impl ContactFeature {
    /// The feature of a contact point between two vertices, such as two circle centers.
    pub fn vertices() -> Self {
        ContactFeature {
            index_a: 0,
            index_b: 0,
            type_a: FeatureType::Vertex,
            type_b: FeatureType::Vertex,
        }
    }

    /// Swaps the roles of the shapes A and B.
    pub fn flipped(self) -> Self {
        ContactFeature {
            index_a: self.index_b,
            index_b: self.index_a,
            type_a: self.type_b,
            type_b: self.type_a,
        }
    }
}

impl Default for ContactFeature {
    fn default() -> Self {
        Self::vertices()
    }
}

/// A manifold point is a contact point belonging to a contact manifold.
///
/// The local point usage depends on the manifold kind:
/// - `Circles`: the local center of circle B,
/// - `FaceA`: the local center of circle B or the clip point of polygon B,
/// - `FaceB`: the clip point of polygon A.
///
/// The impulses are accumulated by the contact solver and persist across time steps.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ManifoldPoint {
    /// Usage depends on the manifold kind.
    pub local_point: Vector,
    /// The non-penetration impulse.
    pub normal_impulse: Real,
    /// The friction impulse.
    pub tangent_impulse: Real,
    /// Uniquely identifies a contact point between two shapes.
    pub id: ContactFeature,
}

impl Default for ManifoldPoint {
    fn default() -> Self {
        ManifoldPoint {
            local_point: Vector::zeros(),
            normal_impulse: 0.0,
            tangent_impulse: 0.0,
            id: ContactFeature::default(),
        }
    }
}

/// The way the geometry of a manifold is expressed.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum ManifoldKind {
    /// Two circles: `local_point` is the center of circle A.
    Circles,
    /// The reference face is on shape A.
    FaceA,
    /// The reference face is on shape B.
    FaceB,
}

/// A contact manifold describes up to two contact points between two touching shapes.
///
/// Points are stored in local coordinates so that the manifold can be re-evaluated at any
/// body position by the solvers.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Manifold {
    /// The contact points. Only the first `point_count` are meaningful.
    pub points: [ManifoldPoint; MAX_MANIFOLD_POINTS],
    /// Not used for `Circles`.
    pub local_normal: Vector,
    /// Usage depends on the manifold kind.
    pub local_point: Vector,
    /// The manifold kind.
    pub kind: ManifoldKind,
    /// The number of manifold points.
    pub point_count: usize,
}

impl Default for Manifold {
    fn default() -> Self {
        Manifold {
            points: [ManifoldPoint::default(); MAX_MANIFOLD_POINTS],
            local_normal: Vector::zeros(),
            local_point: Vector::zeros(),
            kind: ManifoldKind::Circles,
            point_count: 0,
        }
    }
}

impl Manifold {
    /// The active contact points.
    #[inline]
    pub fn points(&self) -> &[ManifoldPoint] {
        &self.points[..self.point_count]
    }

    /// The active contact points, mutably.
    #[inline]
    pub fn points_mut(&mut self) -> &mut [ManifoldPoint] {
        &mut self.points[..self.point_count]
    }
}

/// The world-space view of a manifold at given body transforms.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct WorldManifold {
    /// World vector pointing from A to B.
    pub normal: Vector,
    /// World contact points, halfway between the surfaces.
    pub points: [Vector; MAX_MANIFOLD_POINTS],
    /// A negative value indicates overlap, in meters.
    pub separations: [Real; MAX_MANIFOLD_POINTS],
}

impl WorldManifold {
    /// Evaluates `manifold` at the given transforms and shape radii.
    pub fn new(
        manifold: &Manifold,
        xf_a: &Isometry,
        radius_a: Real,
        xf_b: &Isometry,
        radius_b: Real,
    ) -> Self {
        let mut result = WorldManifold {
            normal: Vector::zeros(),
            points: [Vector::zeros(); MAX_MANIFOLD_POINTS],
            separations: [0.0; MAX_MANIFOLD_POINTS],
        };

        if manifold.point_count == 0 {
            return result;
        }

        match manifold.kind {
            ManifoldKind::Circles => {
                let mut normal = Vector::x();
                let point_a = math::transform(xf_a, &manifold.local_point);
                let point_b = math::transform(xf_b, &manifold.points[0].local_point);

                if (point_b - point_a).norm_squared() > EPSILON * EPSILON {
                    normal = (point_b - point_a).normalize();
                }

                let c_a = point_a + normal * radius_a;
                let c_b = point_b - normal * radius_b;
                result.normal = normal;
                result.points[0] = (c_a + c_b) * 0.5;
                result.separations[0] = (c_b - c_a).dot(&normal);
            }
            ManifoldKind::FaceA => {
                let normal = xf_a.rotation * manifold.local_normal;
                let plane_point = math::transform(xf_a, &manifold.local_point);

                for (i, mp) in manifold.points().iter().enumerate() {
                    let clip_point = math::transform(xf_b, &mp.local_point);
                    let c_a = clip_point
                        + normal * (radius_a - (clip_point - plane_point).dot(&normal));
                    let c_b = clip_point - normal * radius_b;
                    result.points[i] = (c_a + c_b) * 0.5;
                    result.separations[i] = (c_b - c_a).dot(&normal);
                }

                result.normal = normal;
            }
            ManifoldKind::FaceB => {
                let normal = xf_b.rotation * manifold.local_normal;
                let plane_point = math::transform(xf_b, &manifold.local_point);

                for (i, mp) in manifold.points().iter().enumerate() {
                    let clip_point = math::transform(xf_a, &mp.local_point);
                    let c_b = clip_point
                        + normal * (radius_b - (clip_point - plane_point).dot(&normal));
                    let c_a = clip_point - normal * radius_a;
                    result.points[i] = (c_a + c_b) * 0.5;
                    result.separations[i] = (c_a - c_b).dot(&normal);
                }

                // Ensure normal points from A to B.
                result.normal = -normal;
            }
        }

        result
    }
}
