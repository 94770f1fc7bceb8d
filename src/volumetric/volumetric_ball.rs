use crate::math::{Real, Vector};
use crate::shape::Circle;
use crate::volumetric::Volumetric;

/// The area of a circle.
#[inline]
pub fn circle_area(radius: Real) -> Real {
    std::f32::consts::PI * radius * radius
}

/// The unit angular inertia of a circle about its center.
#[inline]
pub fn circle_unit_angular_inertia(radius: Real) -> Real {
    radius * radius / 2.0
}

impl Volumetric for Circle {
    fn area(&self) -> Real {
        circle_area(self.radius())
    }

    fn center_of_mass(&self) -> Vector {
        self.center
    }

    fn unit_angular_inertia(&self) -> Real {
        circle_unit_angular_inertia(self.radius())
    }
}

#[cfg(test)]
mod test {
    use crate::math::Vector;
    use crate::shape::Circle;
    use crate::volumetric::Volumetric;

    #[test]
    fn offset_circle_inertia_uses_parallel_axis() {
        let circle = Circle::with_center(Vector::new(1.0, 0.0), 0.5);
        let data = circle.mass_data(2.0);
        let mass = 2.0 * std::f32::consts::PI * 0.25;

        assert!(relative_eq!(data.mass, mass, epsilon = 1.0e-6));
        assert!(relative_eq!(data.center, Vector::new(1.0, 0.0)));
        assert!(relative_eq!(
            data.inertia,
            mass * (0.125 + 1.0),
            epsilon = 1.0e-5
        ));
    }
}
