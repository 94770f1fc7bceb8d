use crate::math::{Real, Vector};
use crate::object::{BodyHandle, FixtureHandle};

/// A contact between two particles of the same system.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParticleContact {
    /// Index of the first particle.
    pub a: usize,
    /// Index of the second particle.
    pub b: usize,
    /// `1 - distance / diameter`: close to 1 when the particles overlap completely.
    pub weight: Real,
    /// Unit vector from the first particle to the second.
    pub normal: Vector,
}

/// A contact between a particle and a fixture.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParticleBodyContact {
    /// Index of the particle.
    pub index: usize,
    /// The body of the fixture.
    pub body: BodyHandle,
    /// The touched fixture.
    pub fixture: FixtureHandle,
    /// `1 - distance / diameter`.
    pub weight: Real,
    /// Unit vector from the particle to the fixture surface.
    pub normal: Vector,
    /// Effective mass of the particle-body pair along the normal.
    pub mass: Real,
}
