//! User hooks called by the world during a time step or on implicit destructions.

use crate::collision::Manifold;
use crate::detection::{Contact, ContactHandle};
use crate::joint::{Joint, JointHandle};
use crate::object::{Fixture, FixtureHandle};
use crate::solver::ContactImpulse;
use crate::world::World;

/// Receives the contact events of a world.
///
/// Events are delivered once the internal state of the world is consistent. While a time step
/// is running the world is locked: structural calls made from these methods return
/// `WorldError::Locked`.
pub trait ContactListener {
    /// Called when two fixtures begin to touch.
    fn begin_contact(&mut self, _world: &mut World, _contact: ContactHandle) {}

    /// Called when two fixtures cease to touch. The contact may already be destroyed, so a
    /// copy is given.
    fn end_contact(&mut self, _world: &mut World, _contact: &Contact) {}

    /// Called after a touching contact is updated and before it is solved.
    ///
    /// Disabling the contact here (see `Contact::set_enabled`) removes it from the current
    /// step. `old_manifold` is the manifold of the previous update.
    fn pre_solve(&mut self, _world: &mut World, _contact: ContactHandle, _old_manifold: &Manifold) {
    }

    /// Called after the solver finished with a contact, with the impulses it applied.
    fn post_solve(&mut self, _world: &mut World, _contact: ContactHandle, _impulse: &ContactImpulse) {
    }
}

/// Decides whether two fixtures should generate a contact.
pub trait ContactFilter {
    /// Returns `true` if contact calculations should be performed between these fixtures.
    fn should_collide(&self, fixture_a: &Fixture, fixture_b: &Fixture) -> bool {
        fixture_a.filter().should_collide(fixture_b.filter())
    }
}

/// The contact filter using the category, mask and group of the fixture filters.
#[derive(Copy, Clone, Debug, Default)]
pub struct DefaultContactFilter;

impl ContactFilter for DefaultContactFilter {}

/// Notified when joints and fixtures are destroyed implicitly, because a body or a joint they
/// depend on was destroyed.
pub trait DestructionListener {
    /// Called when a joint is about to be removed because one of its bodies, or a joint it
    /// couples, is destroyed.
    fn say_goodbye_joint(&mut self, _handle: JointHandle, _joint: &Joint) {}

    /// Called when a fixture is about to be removed because its body is destroyed.
    fn say_goodbye_fixture(&mut self, _handle: FixtureHandle, _fixture: &Fixture) {}
}
