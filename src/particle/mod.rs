//! Particle fluids simulated alongside the rigid bodies.

pub use self::particle_contact::{ParticleBodyContact, ParticleContact};
pub use self::particle_system::{
    ParticleDesc, ParticleFlags, ParticleSystem, ParticleSystemDesc, ParticleSystemHandle,
    ParticleSystemSet,
};

mod particle_contact;
mod particle_system;
