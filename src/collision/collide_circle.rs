use ncollide::query::{self, PointQuery};
use ncollide::shape::{ConvexPolyhedron, FeatureId};

use crate::collision::{ContactFeature, Manifold, ManifoldKind};
use crate::math::{Isometry, Point, Real, EPSILON};
use crate::settings;
use crate::shape::{Circle, Polygon};

/// Computes the contact manifold between two circles.
pub fn collide_circles(
    circle_a: &Circle,
    xf_a: &Isometry,
    circle_b: &Circle,
    xf_b: &Isometry,
) -> Manifold {
    let mut manifold = Manifold::default();

    let center_a = xf_a * Point::from(circle_a.center);
    let center_b = xf_b * Point::from(circle_b.center);

    if query::contact_ball_ball(&center_a, circle_a.ball(), &center_b, circle_b.ball(), 0.0)
        .is_none()
    {
        return manifold;
    }

    manifold.kind = ManifoldKind::Circles;
    manifold.local_point = circle_a.center;
    manifold.points[0].local_point = circle_b.center;
    manifold.points[0].id = ContactFeature::vertices();
    manifold.point_count = 1;
    manifold
}

// The face of `polygon` with the largest separation from the local point `c`.
fn max_separation_face(polygon: &Polygon, c: &Point) -> usize {
    let mut best = 0;
    let mut max_separation = -Real::MAX;

    for (i, (v, n)) in polygon.vertices().iter().zip(polygon.normals()).enumerate() {
        let s = n.dot(&(c - v));

        if s > max_separation {
            max_separation = s;
            best = i;
        }
    }

    best
}

/// Computes the contact manifold between a polygon and a circle.
///
/// The circle center is projected on the polygon. If it falls in the Voronoi region of a
/// face, the manifold uses that face as reference. Otherwise the normal goes from the
/// closest vertex to the circle center.
pub fn collide_polygon_and_circle(
    polygon_a: &Polygon,
    xf_a: &Isometry,
    circle_b: &Circle,
    xf_b: &Isometry,
) -> Manifold {
    let mut manifold = Manifold::default();

    let center = xf_b * Point::from(circle_b.center);
    let local_center = xf_a.inverse_transform_point(&center);
    let radius = settings::POLYGON_RADIUS + circle_b.radius();

    let (proj, feature) = polygon_a.hull().project_point_with_feature(xf_a, &center);
    let distance = (center - proj.point).norm();
    let separation = if proj.is_inside { -distance } else { distance };

    if separation > radius {
        return manifold;
    }

    let vertices = polygon_a.vertices();
    let face = |i: usize| {
        let v1 = vertices[i];
        let v2 = vertices[(i + 1) % vertices.len()];
        (polygon_a.normals()[i].into_inner(), na::center(&v1, &v2))
    };

    let (local_normal, local_point) = match feature {
        FeatureId::Vertex(i) if !proj.is_inside => {
            let v = vertices[i];
            let normal = (local_center - v)
                .try_normalize(EPSILON)
                .unwrap_or_else(|| polygon_a.hull().feature_normal(feature).into_inner());
            (normal, v)
        }
        FeatureId::Face(i) if !proj.is_inside => face(i),
        _ => face(max_separation_face(polygon_a, &local_center)),
    };

    manifold.kind = ManifoldKind::FaceA;
    manifold.local_normal = local_normal;
    manifold.local_point = local_point.coords;
    manifold.points[0].local_point = circle_b.center;
    manifold.points[0].id = ContactFeature::vertices();
    manifold.point_count = 1;
    manifold
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::collision::WorldManifold;
    use crate::math::{self, Vector};

    #[test]
    fn separated_circles_have_no_points() {
        let a = Circle::new(0.5);
        let b = Circle::new(0.5);
        let xf_a = Isometry::identity();
        let xf_b = math::isometry(Vector::new(1.1, 0.0), 0.0);

        assert_eq!(collide_circles(&a, &xf_a, &b, &xf_b).point_count, 0);

        let xf_b = math::isometry(Vector::new(0.9, 0.0), 0.0);
        let manifold = collide_circles(&a, &xf_a, &b, &xf_b);
        assert_eq!(manifold.point_count, 1);
        assert_eq!(manifold.kind, ManifoldKind::Circles);
    }

    #[test]
    fn circle_resting_on_box_face() {
        let ground = Polygon::cuboid(5.0, 0.5);
        let circle = Circle::new(0.5);
        let xf_a = Isometry::identity();
        let xf_b = math::isometry(Vector::new(1.0, 0.99), 0.0);

        let manifold = collide_polygon_and_circle(&ground, &xf_a, &circle, &xf_b);
        assert_eq!(manifold.point_count, 1);
        assert_eq!(manifold.kind, ManifoldKind::FaceA);
        assert!(relative_eq!(
            manifold.local_normal,
            Vector::new(0.0, 1.0),
            epsilon = 1.0e-5
        ));

        let wm = WorldManifold::new(&manifold, &xf_a, settings::POLYGON_RADIUS, &xf_b, 0.5);
        assert!(relative_eq!(
            wm.separations[0],
            0.49 - 0.5 - settings::POLYGON_RADIUS,
            epsilon = 1.0e-4
        ));

        let far = math::isometry(Vector::new(1.0, 2.0), 0.0);
        let manifold = collide_polygon_and_circle(&ground, &xf_a, &circle, &far);
        assert_eq!(manifold.point_count, 0);
    }

    #[test]
    fn circle_near_corner_uses_vertex_normal() {
        let square = Polygon::cuboid(0.5, 0.5);
        let circle = Circle::new(0.5);
        let offset = 0.5 + 0.45 / 2.0f32.sqrt();
        let xf_b = math::isometry(Vector::new(offset, offset), 0.0);

        let manifold =
            collide_polygon_and_circle(&square, &Isometry::identity(), &circle, &xf_b);
        assert_eq!(manifold.point_count, 1);

        let diagonal = Vector::new(1.0, 1.0).normalize();
        assert!(relative_eq!(manifold.local_normal, diagonal, epsilon = 1.0e-4));
        assert!(relative_eq!(
            manifold.local_point,
            Vector::new(0.5, 0.5),
            epsilon = 1.0e-5
        ));
    }

    #[test]
    fn deep_circle_center_uses_closest_face() {
        let square = Polygon::cuboid(1.0, 1.0);
        let circle = Circle::new(0.25);
        let xf_b = math::isometry(Vector::new(0.0, -0.8), 0.0);

        let manifold =
            collide_polygon_and_circle(&square, &Isometry::identity(), &circle, &xf_b);
        assert_eq!(manifold.point_count, 1);
        assert!(relative_eq!(
            manifold.local_normal,
            Vector::new(0.0, -1.0),
            epsilon = 1.0e-5
        ));
    }
}
