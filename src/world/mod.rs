//! The world: owner of every simulated object, and driver of the time step.

pub use self::callbacks::{ContactFilter, ContactListener, DefaultContactFilter, DestructionListener};
pub use self::world::World;

mod callbacks;
mod world;
