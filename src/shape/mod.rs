//! Convex shapes attached to bodies through fixtures.
//!
//! Geometric queries are delegated to ncollide.

pub use self::circle::Circle;
pub use self::polygon::Polygon;

use ncollide::bounding_volume::{self, BoundingVolume};
use ncollide::query::{PointQuery, Ray, RayCast};

use crate::math::{self, Isometry, Point, Real, Vector, AABB};
use crate::settings;
use crate::volumetric::{MassData, Volumetric};

mod circle;
mod polygon;

/// Input of a ray cast: the segment `p1 + t * (p2 - p1)` for `t` in `[0, max_fraction]`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RayCastInput {
    /// Origin of the ray.
    pub p1: Vector,
    /// Second point defining the direction and length of the ray.
    pub p2: Vector,
    /// The ray extends from `p1` to `p1 + max_fraction * (p2 - p1)`.
    pub max_fraction: Real,
}

/// Result of a successful ray cast.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RayCastOutput {
    /// Normal of the surface at the hit point.
    pub normal: Vector,
    /// Hit point is `p1 + fraction * (p2 - p1)`.
    pub fraction: Real,
}

/// The geometry of a fixture.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum Shape {
    /// A solid circle.
    Circle(Circle),
    /// A solid convex polygon with a small skin radius.
    Polygon(Polygon),
}

// Runs `$body` with `$g` bound to the ncollide geometry of `$shape` and `$m` to its
// world-space position, given the fixture transform `$xf`.
macro_rules! with_geometry(
    ($shape: expr, $xf: expr, |$g: ident, $m: ident| $body: expr) => {
        match $shape {
            Shape::Circle(c) => {
                let $m = &($xf * c.local_frame());
                let $g = c.ball();
                $body
            }
            Shape::Polygon(p) => {
                let $m = $xf;
                let $g = p.hull();
                $body
            }
        }
    }
);

impl Shape {
    /// The skin radius of this shape.
    ///
    /// For circles, this is the circle radius. For polygons, this is the small constant
    /// polygon radius that keeps polygon cores apart.
    #[inline]
    pub fn radius(&self) -> Real {
        match self {
            Shape::Circle(c) => c.radius(),
            Shape::Polygon(_) => settings::POLYGON_RADIUS,
        }
    }

    /// Is this shape a circle?
    #[inline]
    pub fn is_circle(&self) -> bool {
        match self {
            Shape::Circle(_) => true,
            Shape::Polygon(_) => false,
        }
    }

    /// Thickness of the rounded skin around the ncollide geometry.
    #[inline]
    pub(crate) fn skin(&self) -> Real {
        match self {
            Shape::Circle(_) => 0.0,
            Shape::Polygon(_) => settings::POLYGON_RADIUS,
        }
    }

    /// The position of the ncollide geometry of this shape when its fixture is at `xf`.
    #[inline]
    pub(crate) fn geometry_position(&self, xf: &Isometry) -> Isometry {
        match self {
            Shape::Circle(c) => xf * c.local_frame(),
            Shape::Polygon(_) => *xf,
        }
    }

    /// The mass, center of mass and rotational inertia of this shape given its density.
    ///
    /// The inertia is expressed about the origin of the shape frame.
    pub fn compute_mass(&self, density: Real) -> MassData {
        match self {
            Shape::Circle(c) => c.mass_data(density),
            Shape::Polygon(p) => p.mass_data(density),
        }
    }

    /// The world-space bounding box of this shape transformed by `xf`, skin included.
    pub fn compute_aabb(&self, xf: &Isometry) -> AABB {
        let skin = self.skin();
        with_geometry!(self, xf, |g, m| bounding_volume::aabb(g, m).loosened(skin))
    }

    /// Whether the world point `p` lies inside this shape.
    pub fn test_point(&self, xf: &Isometry, p: &Vector) -> bool {
        let p = Point::from(*p);
        with_geometry!(self, xf, |g, m| g.contains_point(m, &p))
    }

    /// Casts a ray against this shape.
    ///
    /// Rays starting inside the shape report no hit.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Isometry) -> Option<RayCastOutput> {
        let dir = input.p2 - input.p1;

        if dir.norm_squared() < math::EPSILON || self.test_point(xf, &input.p1) {
            return None;
        }

        let ray = Ray::new(Point::from(input.p1), dir);
        let hit = with_geometry!(self, xf, |g, m| g.toi_and_normal_with_ray(
            m,
            &ray,
            input.max_fraction,
            true
        ))?;

        Some(RayCastOutput {
            normal: hit.normal.try_normalize(math::EPSILON)?,
            fraction: hit.toi,
        })
    }

    /// Signed distance from `p` to the boundary of this shape, negative inside, together
    /// with the unit direction pointing away from the shape.
    pub fn compute_distance(&self, xf: &Isometry, p: &Vector) -> (Real, Vector) {
        let pt = Point::from(*p);
        let center = match self {
            Shape::Circle(c) => math::transform(xf, &c.center),
            Shape::Polygon(poly) => math::transform(xf, &poly.centroid()),
        };
        let from_center = (p - center)
            .try_normalize(math::EPSILON)
            .unwrap_or_else(Vector::x);

        if let Shape::Circle(c) = self {
            // The projection on a ball is undefined at its center.
            if (p - center).norm_squared() < math::EPSILON {
                return (-c.radius(), from_center);
            }
        }

        let proj = with_geometry!(self, xf, |g, m| g.project_point(m, &pt, false));
        let delta = pt - proj.point;
        let dist = delta.norm();
        let dir = if dist > math::EPSILON {
            delta / dist
        } else {
            from_center
        };

        if proj.is_inside {
            (-dist, -dir)
        } else {
            (dist, dir)
        }
    }
}

impl From<Circle> for Shape {
    fn from(c: Circle) -> Self {
        Shape::Circle(c)
    }
}

impl From<Polygon> for Shape {
    fn from(p: Polygon) -> Self {
        Shape::Polygon(p)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn box_ray_cast_hits_the_facing_side() {
        let shape = Shape::from(Polygon::cuboid(1.0, 1.0));
        let xf = math::isometry(Vector::new(5.0, 0.0), 0.0);
        let mut input = RayCastInput {
            p1: Vector::new(0.0, 0.0),
            p2: Vector::new(10.0, 0.0),
            max_fraction: 1.0,
        };

        let hit = shape.ray_cast(&input, &xf).unwrap();
        assert!(relative_eq!(hit.fraction, 0.4, epsilon = 1.0e-3));
        assert!(relative_eq!(hit.normal, Vector::new(-1.0, 0.0), epsilon = 1.0e-3));

        input.max_fraction = 0.3;
        assert!(shape.ray_cast(&input, &xf).is_none());
    }

    #[test]
    fn ray_starting_inside_does_not_hit() {
        let shape = Shape::from(Circle::new(1.0));
        let input = RayCastInput {
            p1: Vector::new(0.5, 0.0),
            p2: Vector::new(3.0, 0.0),
            max_fraction: 1.0,
        };

        assert!(shape.ray_cast(&input, &Isometry::identity()).is_none());
    }

    #[test]
    fn offset_circle_ray_cast() {
        let shape = Shape::from(Circle::with_center(Vector::new(0.0, 2.0), 0.5));
        let input = RayCastInput {
            p1: Vector::new(-2.0, 2.0),
            p2: Vector::new(2.0, 2.0),
            max_fraction: 1.0,
        };

        let hit = shape.ray_cast(&input, &Isometry::identity()).unwrap();
        assert!(relative_eq!(hit.fraction, 0.375, epsilon = 1.0e-4));
        assert!(relative_eq!(hit.normal, Vector::new(-1.0, 0.0), epsilon = 1.0e-4));
    }

    #[test]
    fn distance_is_signed() {
        let shape = Shape::from(Polygon::cuboid(1.0, 1.0));
        let xf = Isometry::identity();

        let (d, n) = shape.compute_distance(&xf, &Vector::new(3.0, 0.0));
        assert!(relative_eq!(d, 2.0, epsilon = 1.0e-3));
        assert!(relative_eq!(n, Vector::new(1.0, 0.0), epsilon = 1.0e-3));

        let (d, n) = shape.compute_distance(&xf, &Vector::new(0.0, 0.75));
        assert!(relative_eq!(d, -0.25, epsilon = 1.0e-3));
        assert!(relative_eq!(n, Vector::new(0.0, 1.0), epsilon = 1.0e-3));

        let circle = Shape::from(Circle::new(1.0));
        let (d, _) = circle.compute_distance(&xf, &Vector::zeros());
        assert_eq!(d, -1.0);
        let (d, n) = circle.compute_distance(&xf, &Vector::new(0.0, -3.0));
        assert!(relative_eq!(d, 2.0, epsilon = 1.0e-5));
        assert!(relative_eq!(n, Vector::new(0.0, -1.0), epsilon = 1.0e-5));
    }

    #[test]
    fn polygon_bounds_include_the_skin() {
        let shape = Shape::from(Polygon::cuboid(1.0, 2.0));
        let xf = math::isometry(Vector::new(1.0, 0.0), 0.0);
        let aabb = shape.compute_aabb(&xf);
        let r = settings::POLYGON_RADIUS;

        assert!(relative_eq!(aabb.mins, Point::new(-r, -2.0 - r), epsilon = 1.0e-5));
        assert!(relative_eq!(aabb.maxs, Point::new(2.0 + r, 2.0 + r), epsilon = 1.0e-5));
        assert!(shape.test_point(&xf, &Vector::new(1.5, 1.5)));
        assert!(!shape.test_point(&xf, &Vector::new(2.5, 0.0)));
    }
}
