use ncollide::query::{self, Proximity};

use crate::math::Isometry;
use crate::shape::Shape;

/// Do the two shapes, rounded by their skin radii, overlap?
pub fn test_overlap(shape_a: &Shape, xf_a: &Isometry, shape_b: &Shape, xf_b: &Isometry) -> bool {
    let m_a = shape_a.geometry_position(xf_a);
    let m_b = shape_b.geometry_position(xf_b);
    let margin = shape_a.skin() + shape_b.skin();

    let proximity = match (shape_a, shape_b) {
        (Shape::Circle(a), Shape::Circle(b)) => {
            query::proximity_support_map_support_map(&m_a, a.ball(), &m_b, b.ball(), margin)
        }
        (Shape::Circle(a), Shape::Polygon(b)) => {
            query::proximity_support_map_support_map(&m_a, a.ball(), &m_b, b.hull(), margin)
        }
        (Shape::Polygon(a), Shape::Circle(b)) => {
            query::proximity_support_map_support_map(&m_a, a.hull(), &m_b, b.ball(), margin)
        }
        (Shape::Polygon(a), Shape::Polygon(b)) => {
            query::proximity_support_map_support_map(&m_a, a.hull(), &m_b, b.hull(), margin)
        }
    };

    proximity != Proximity::Disjoint
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::{self, Vector};
    use crate::settings;
    use crate::shape::{Circle, Polygon};

    #[test]
    fn sensor_overlap_uses_radii() {
        let a = Shape::Circle(Circle::new(0.5));
        let b = Shape::Circle(Circle::new(0.5));
        let xf_a = Isometry::identity();

        assert!(test_overlap(
            &a,
            &xf_a,
            &b,
            &math::isometry(Vector::new(0.9, 0.0), 0.0)
        ));
        assert!(!test_overlap(
            &a,
            &xf_a,
            &b,
            &math::isometry(Vector::new(1.1, 0.0), 0.0)
        ));
    }

    #[test]
    fn polygon_skins_count_as_overlap() {
        let a = Shape::Polygon(Polygon::cuboid(0.5, 0.5));
        let b = Shape::Polygon(Polygon::cuboid(0.5, 0.5));
        let xf_a = Isometry::identity();
        let gap = settings::POLYGON_RADIUS;

        let touching = math::isometry(Vector::new(1.0 + gap, 0.0), 0.0);
        assert!(test_overlap(&a, &xf_a, &b, &touching));

        let apart = math::isometry(Vector::new(1.0 + 3.0 * gap, 0.0), 0.0);
        assert!(!test_overlap(&a, &xf_a, &b, &apart));

        let circle = Shape::Circle(Circle::with_center(Vector::new(2.0, 0.0), 0.5));
        assert!(test_overlap(&circle, &math::isometry(Vector::new(-1.4, 0.0), 0.0), &a, &xf_a));
        assert!(!test_overlap(&circle, &math::isometry(Vector::new(-0.9, 0.0), 0.0), &a, &xf_a));
    }
}
