//! Traits to compute inertial properties.

use crate::math::{Real, Vector};

/// Mass properties of a shape or a body.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct MassData {
    /// The mass, usually in kilograms.
    pub mass: Real,
    /// The position of the center of mass relative to the shape or body origin.
    pub center: Vector,
    /// The rotational inertia about the shape or body origin.
    pub inertia: Real,
}

impl MassData {
    /// Mass properties of a massless object.
    pub fn zero() -> Self {
        MassData {
            mass: 0.0,
            center: Vector::zeros(),
            inertia: 0.0,
        }
    }
}

/// Trait implemented by shapes which have an area, a center of mass, and a rotational inertia.
pub trait Volumetric {
    /// Computes the area of this shape.
    fn area(&self) -> Real;

    /// Computes the center of mass of this shape, in its local frame.
    fn center_of_mass(&self) -> Vector;

    /// Computes the rotational inertia of this shape about its center of mass, for a unit mass.
    fn unit_angular_inertia(&self) -> Real;

    /// Given its density, this computes the mass of this shape.
    fn mass(&self, density: Real) -> Real {
        self.area() * density
    }

    /// Given its density, this computes the mass, center of mass, and the rotational inertia
    /// of this shape about the origin of its local frame.
    fn mass_data(&self, density: Real) -> MassData {
        let mass = self.mass(density);
        let center = self.center_of_mass();
        let inertia = mass * (self.unit_angular_inertia() + center.norm_squared());

        MassData {
            mass,
            center,
            inertia,
        }
    }
}
