//! Errors returned by the structural operations of the world.

use thiserror::Error;

/// Errors that can occur when modifying the structure of a `World`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum WorldError {
    /// The world is in the middle of a time step (e.g. the call comes from a listener).
    #[error("the world is locked: structural changes are not allowed during a time step")]
    Locked,

    /// The body handle does not identify a body of this world.
    #[error("invalid body handle")]
    InvalidBody,

    /// The fixture handle does not identify a fixture of this world.
    #[error("invalid fixture handle")]
    InvalidFixture,

    /// The joint handle does not identify a joint of this world.
    #[error("invalid joint handle")]
    InvalidJoint,

    /// The contact handle does not identify a contact of this world.
    #[error("invalid contact handle")]
    InvalidContact,

    /// The particle system handle does not identify a particle system of this world.
    #[error("invalid particle system handle")]
    InvalidParticleSystem,

    /// A gear joint was created from joints that are neither revolute nor prismatic.
    #[error("gear joints can only couple revolute or prismatic joints")]
    InvalidGearJoint,

    /// A fixed-capacity container is full.
    #[error("capacity exceeded: {resource} is limited to {limit}")]
    CapacityExceeded {
        /// What resource was exhausted.
        resource: &'static str,
        /// The limit that was exceeded.
        limit: usize,
    },
}

/// Result of the structural operations of the world.
pub type WorldResult<T> = Result<T, WorldError>;
