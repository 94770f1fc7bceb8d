//! Narrow phase: contact manifolds, overlap tests and time of impact between shapes.
//!
//! The geometry is computed by ncollide and converted here to local manifolds that the
//! solvers can re-evaluate at any body position.

pub use self::collide_circle::{collide_circles, collide_polygon_and_circle};
pub use self::collide_polygon::collide_polygons;
pub use self::manifold::{
    ContactFeature, FeatureType, Manifold, ManifoldKind, ManifoldPoint, WorldManifold,
};
pub use self::proximity::test_overlap;
pub use self::time_of_impact::{time_of_impact, TOIInput, TOIOutput, TOIState};

use crate::math::Isometry;
use crate::shape::Shape;

mod collide_circle;
mod collide_polygon;
mod manifold;
mod proximity;
mod time_of_impact;

/// Computes the contact manifold between two shapes.
///
/// Circle-polygon pairs must have the polygon as the first shape.
pub fn collide(shape_a: &Shape, xf_a: &Isometry, shape_b: &Shape, xf_b: &Isometry) -> Manifold {
    match (shape_a, shape_b) {
        (Shape::Circle(a), Shape::Circle(b)) => collide_circles(a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Circle(b)) => collide_polygon_and_circle(a, xf_a, b, xf_b),
        (Shape::Polygon(a), Shape::Polygon(b)) => collide_polygons(a, xf_a, b, xf_b),
        (Shape::Circle(_), Shape::Polygon(_)) => {
            debug_assert!(false, "circle-polygon pairs must be ordered polygon first");
            Manifold::default()
        }
    }
}
