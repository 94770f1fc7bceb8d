use num_traits::Zero;

use crate::math::{self, Point, Real, Vector};
use crate::shape::Polygon;
use crate::volumetric::{MassData, Volumetric};

/// The area and center of mass of a 2D convex polygon given in counter-clockwise order.
///
/// The polygon is not checked to be actually convex.
pub fn convex_polygon_area_and_center_of_mass(vertices: &[Point]) -> (Real, Vector) {
    if vertices.is_empty() {
        return (0.0, Vector::zeros());
    }

    // Triangle fan around the first vertex.
    let origin = vertices[0];
    let mut center = Vector::zeros();
    let mut area = 0.0;

    for i in 1..vertices.len() {
        let e1 = vertices[i] - origin;
        let e2 = vertices[(i + 1) % vertices.len()] - origin;
        let triangle_area = 0.5 * math::cross(&e1, &e2);

        area += triangle_area;
        center += (e1 + e2) * (triangle_area / 3.0);
    }

    if area.is_zero() {
        (area, origin.coords)
    } else {
        (area, center / area + origin.coords)
    }
}

/// The mass properties of a 2D convex polygon given in counter-clockwise order.
///
/// The inertia is expressed about the origin of the polygon frame.
pub fn convex_polygon_mass_properties(vertices: &[Point], density: Real) -> MassData {
    if vertices.len() < 3 {
        return MassData::zero();
    }

    let s = vertices[0];
    let mut area = 0.0;
    let mut center = Vector::zeros();
    let mut inertia = 0.0;
    let factor = 0.25 / 3.0;

    for i in 1..vertices.len() {
        // Triangle vertices relative to the reference point s.
        let e1 = vertices[i] - s;
        let e2 = vertices[(i + 1) % vertices.len()] - s;

        let d = math::cross(&e1, &e2);
        let triangle_area = 0.5 * d;
        area += triangle_area;

        // Area weighted centroid.
        center += (e1 + e2) * (triangle_area / 3.0);

        let intx2 = e1.x * e1.x + e2.x * e1.x + e2.x * e2.x;
        let inty2 = e1.y * e1.y + e2.y * e1.y + e2.y * e2.y;

        inertia += (factor * d) * (intx2 + inty2);
    }

    if area.is_zero() {
        return MassData::zero();
    }

    let mass = density * area;
    center /= area;
    let world_center = center + s.coords;

    // Inertia relative to the reference point, shifted to the center of mass and then to
    // the polygon origin.
    let inertia = density * inertia
        + mass * (world_center.norm_squared() - center.norm_squared());

    MassData {
        mass,
        center: world_center,
        inertia,
    }
}

impl Volumetric for Polygon {
    fn area(&self) -> Real {
        convex_polygon_area_and_center_of_mass(self.vertices()).0
    }

    fn center_of_mass(&self) -> Vector {
        self.centroid()
    }

    fn unit_angular_inertia(&self) -> Real {
        let data = convex_polygon_mass_properties(self.vertices(), 1.0);

        if data.mass.is_zero() {
            0.0
        } else {
            data.inertia / data.mass - data.center.norm_squared()
        }
    }

    fn mass_data(&self, density: Real) -> MassData {
        convex_polygon_mass_properties(self.vertices(), density)
    }
}

#[cfg(test)]
mod test {
    use crate::math::Vector;
    use crate::shape::Polygon;
    use crate::volumetric::Volumetric;

    #[test]
    fn test_inertia_tensor2() {
        // square
        let a = 3.8f32;
        let half_a = a / 2.0;

        // real moment of inertia but divided by the area of the square
        let real_moi = a.powf(2.0) / 6.0;
        let square = Polygon::cuboid(half_a, half_a);
        assert!(relative_eq!(
            square.unit_angular_inertia(),
            real_moi,
            epsilon = 1.0e-4
        ));

        // rectangle
        let a = 2.3f32;
        let b = 6.7f32;
        let real_moi = (1.0 / 12.0) * (a.powf(2.0) + b.powf(2.0));
        let rect = Polygon::cuboid(a / 2.0, b / 2.0);
        assert!(relative_eq!(
            rect.unit_angular_inertia(),
            real_moi,
            epsilon = 1.0e-4
        ));
    }

    #[test]
    fn offset_box_mass_data() {
        let poly = Polygon::oriented_cuboid(1.0, 0.5, Vector::new(2.0, 0.0), 0.0);
        let data = poly.mass_data(3.0);
        let mass = 3.0 * 2.0 * 1.0;
        let central = mass * (4.0 + 1.0) / 12.0;

        assert!(relative_eq!(data.mass, mass, epsilon = 1.0e-5));
        assert!(relative_eq!(data.center, Vector::new(2.0, 0.0), epsilon = 1.0e-5));
        assert!(relative_eq!(
            data.inertia,
            central + mass * 4.0,
            epsilon = 1.0e-3
        ));
    }
}
