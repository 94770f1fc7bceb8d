//! Broad phase, contacts and their management.

pub use self::broad_phase::{BroadPhase, ProxyId};
pub use self::contact::{mix_friction, mix_restitution, Contact, ContactHandle, ContactSet};
pub(crate) use self::contact::{ContactEvent, ContactFlags};
pub use self::contact_manager::ContactManager;

mod broad_phase;
mod contact;
mod contact_manager;
