use na::Unit;
use ncollide::shape::ConvexPolygon;
use ncollide::transformation;

use crate::math::{self, Point, Real, Vector};
use crate::settings;
use crate::volumetric;

/// A solid convex polygon.
///
/// The core is an ncollide convex polygon with counter-clockwise vertices. Collision treats
/// it as rounded by a skin of radius `settings::POLYGON_RADIUS`, so that polygon cores never
/// quite touch.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Polygon {
    hull: ConvexPolygon<Real>,
    centroid: Vector,
}

impl Polygon {
    /// Computes the convex hull of `points` and builds a polygon from it.
    ///
    /// Points closer than half the linear slop are welded together. Returns `None` if
    /// more than `MAX_POLYGON_VERTICES` points are given or if the hull is degenerate
    /// (fewer than three non-collinear points).
    pub fn new(points: &[Vector]) -> Option<Polygon> {
        if points.len() < 3 || points.len() > settings::MAX_POLYGON_VERTICES {
            return None;
        }

        let weld_tolerance = (0.5 * settings::LINEAR_SLOP) * (0.5 * settings::LINEAR_SLOP);
        let mut welded: Vec<Point> = Vec::with_capacity(points.len());

        for v in points {
            let p = Point::from(*v);

            if welded
                .iter()
                .all(|q| (p - q).norm_squared() >= weld_tolerance)
            {
                welded.push(p);
            }
        }

        if welded.len() < 3 {
            return None;
        }

        // The hull comes out clockwise.
        let mut hull: Vec<Point> = transformation::convex_hull_idx(&welded)
            .into_iter()
            .map(|i| welded[i])
            .collect();
        hull.reverse();

        Self::from_ccw_points(hull)
    }

    /// An axis-aligned box with the given half extents, centered at the origin.
    ///
    /// # Panics
    /// If an extent is not positive.
    pub fn cuboid(hx: Real, hy: Real) -> Polygon {
        Self::oriented_cuboid(hx, hy, Vector::zeros(), 0.0)
    }

    /// A box with the given half extents, centered at `center` and rotated by `angle`.
    ///
    /// # Panics
    /// If an extent is not positive.
    pub fn oriented_cuboid(hx: Real, hy: Real, center: Vector, angle: Real) -> Polygon {
        let xf = math::isometry(center, angle);
        let corners = vec![
            xf * Point::new(-hx, -hy),
            xf * Point::new(hx, -hy),
            xf * Point::new(hx, hy),
            xf * Point::new(-hx, hy),
        ];

        Self::from_ccw_points(corners).expect("Box half extents must be positive.")
    }

    fn from_ccw_points(points: Vec<Point>) -> Option<Polygon> {
        let hull = ConvexPolygon::try_new(points)?;

        // Collinear vertices are merged by `try_new`.
        if hull.points().len() < 3 {
            return None;
        }

        let (area, centroid) = volumetric::convex_polygon_area_and_center_of_mass(hull.points());

        if area <= math::EPSILON {
            return None;
        }

        Some(Polygon { hull, centroid })
    }

    /// The vertices of this polygon, in counter-clockwise order.
    #[inline]
    pub fn vertices(&self) -> &[Point] {
        self.hull.points()
    }

    /// The outward edge normals of this polygon. `normals()[i]` is the normal of the edge
    /// from `vertices()[i]` to `vertices()[i + 1]`.
    #[inline]
    pub fn normals(&self) -> &[Unit<Vector>] {
        self.hull.normals()
    }

    /// The centroid of this polygon, in its local frame.
    #[inline]
    pub fn centroid(&self) -> Vector {
        self.centroid
    }

    /// The underlying ncollide polygon.
    #[inline]
    pub fn hull(&self) -> &ConvexPolygon<Real> {
        &self.hull
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn hull_discards_interior_points() {
        let points = [
            Vector::new(0.0, 0.0),
            Vector::new(2.0, 0.0),
            Vector::new(1.0, 0.5),
            Vector::new(2.0, 2.0),
            Vector::new(0.0, 2.0),
        ];
        let poly = Polygon::new(&points).unwrap();

        assert_eq!(poly.vertices().len(), 4);
        assert!(relative_eq!(poly.centroid(), Vector::new(1.0, 1.0), epsilon = 1.0e-5));

        // Counter-clockwise winding.
        let vs = poly.vertices();
        for i in 0..vs.len() {
            let e1 = vs[(i + 1) % vs.len()] - vs[i];
            let e2 = vs[(i + 2) % vs.len()] - vs[(i + 1) % vs.len()];
            assert!(math::cross(&e1, &e2) > 0.0);
        }

        // Normals point outward.
        for (v, n) in vs.iter().zip(poly.normals()) {
            assert!(n.dot(&(v - Point::new(1.0, 1.0))) > 0.0);
        }
    }

    #[test]
    fn degenerate_hull_is_rejected() {
        let collinear = [
            Vector::new(0.0, 0.0),
            Vector::new(1.0, 0.0),
            Vector::new(2.0, 0.0),
        ];
        assert!(Polygon::new(&collinear).is_none());

        let welded = [
            Vector::new(0.0, 0.0),
            Vector::new(0.001, 0.0),
            Vector::new(0.0, 0.001),
        ];
        assert!(Polygon::new(&welded).is_none());
    }
}
