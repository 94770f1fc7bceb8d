use crate::collision::{self, Manifold};
use crate::math::Real;
use crate::object::{BodyHandle, BodySet, Fixture, FixtureHandle, FixtureSet};
use crate::solver::ContactImpulse;

define_handle!(ContactHandle, "The handle of a contact between two fixtures.");

/// The set of contacts of a world.
pub type ContactSet = crate::utils::HandleSet<ContactHandle, Contact>;

bitflags! {
    pub(crate) struct ContactFlags: u8 {
        // Used when crawling the contact graph to form islands.
        const ISLAND = 0x01;
        // Set when the shapes are touching.
        const TOUCHING = 0x02;
        // This contact can be disabled by the user for one step.
        const ENABLED = 0x04;
        // This contact needs filtering because a fixture filter was changed.
        const FILTER = 0x08;
        // This contact has a valid cached time of impact.
        const TOI = 0x20;
    }
}

/// Events generated while contacts are updated, dispatched to the contact listener once
/// the internal state of the world is consistent.
#[derive(Clone)]
pub(crate) enum ContactEvent {
    Begin(ContactHandle),
    End(Box<Contact>),
    PreSolve(ContactHandle, Manifold),
    PostSolve(ContactHandle, ContactImpulse),
}

/// Friction mixing law: the geometric mean.
#[inline]
pub fn mix_friction(friction_a: Real, friction_b: Real) -> Real {
    (friction_a * friction_b).sqrt()
}

/// Restitution mixing law: the bounciest fixture wins.
#[inline]
pub fn mix_restitution(restitution_a: Real, restitution_b: Real) -> Real {
    restitution_a.max(restitution_b)
}

/// A potentially touching pair of fixtures, with its persistent contact manifold.
///
/// A contact exists for each pair of fixtures whose fat bounding boxes overlap. It may
/// exist without any contact point.
#[derive(Clone, Debug)]
pub struct Contact {
    pub(crate) flags: ContactFlags,
    pub(crate) fixture_a: FixtureHandle,
    pub(crate) fixture_b: FixtureHandle,
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) manifold: Manifold,
    pub(crate) toi_count: usize,
    pub(crate) toi: Real,
    pub(crate) friction: Real,
    pub(crate) restitution: Real,
    pub(crate) tangent_speed: Real,
}

impl Contact {
    pub(crate) fn new(
        handle_a: FixtureHandle,
        fixture_a: &Fixture,
        handle_b: FixtureHandle,
        fixture_b: &Fixture,
    ) -> Self {
        Contact {
            flags: ContactFlags::ENABLED,
            fixture_a: handle_a,
            fixture_b: handle_b,
            body_a: fixture_a.body(),
            body_b: fixture_b.body(),
            manifold: Manifold::default(),
            toi_count: 0,
            toi: 0.0,
            friction: mix_friction(fixture_a.friction(), fixture_b.friction()),
            restitution: mix_restitution(fixture_a.restitution(), fixture_b.restitution()),
            tangent_speed: 0.0,
        }
    }

    /// The first fixture of this contact.
    #[inline]
    pub fn fixture_a(&self) -> FixtureHandle {
        self.fixture_a
    }

    /// The second fixture of this contact.
    #[inline]
    pub fn fixture_b(&self) -> FixtureHandle {
        self.fixture_b
    }

    /// The body of the first fixture.
    #[inline]
    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    /// The body of the second fixture.
    #[inline]
    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    /// The contact manifold, in the local frames of the fixtures' bodies.
    #[inline]
    pub fn manifold(&self) -> &Manifold {
        &self.manifold
    }

    /// Are the fixtures touching?
    #[inline]
    pub fn is_touching(&self) -> bool {
        self.flags.contains(ContactFlags::TOUCHING)
    }

    /// Is this contact enabled?
    #[inline]
    pub fn is_enabled(&self) -> bool {
        self.flags.contains(ContactFlags::ENABLED)
    }

    /// Enables or disables this contact. This can be used inside the pre-solve callback.
    /// The contact is only disabled for the current time step (or sub-step in continuous
    /// collision).
    #[inline]
    pub fn set_enabled(&mut self, flag: bool) {
        self.flags.set(ContactFlags::ENABLED, flag);
    }

    /// Number of time-of-impact sub-steps this contact went through during the current step.
    #[inline]
    pub fn toi_count(&self) -> usize {
        self.toi_count
    }

    /// The mixed friction coefficient.
    #[inline]
    pub fn friction(&self) -> Real {
        self.friction
    }

    /// Overrides the mixed friction. The value persists until it is set or reset.
    #[inline]
    pub fn set_friction(&mut self, friction: Real) {
        self.friction = friction;
    }

    /// The mixed restitution coefficient.
    #[inline]
    pub fn restitution(&self) -> Real {
        self.restitution
    }

    /// Overrides the mixed restitution. The value persists until it is set or reset.
    #[inline]
    pub fn set_restitution(&mut self, restitution: Real) {
        self.restitution = restitution;
    }

    /// The desired tangent speed, in meters per second, for conveyor belt behavior.
    #[inline]
    pub fn tangent_speed(&self) -> Real {
        self.tangent_speed
    }

    /// Sets the desired tangent speed.
    #[inline]
    pub fn set_tangent_speed(&mut self, speed: Real) {
        self.tangent_speed = speed;
    }

    pub(crate) fn reset_friction(&mut self, fixture_a: &Fixture, fixture_b: &Fixture) {
        self.friction = mix_friction(fixture_a.friction(), fixture_b.friction());
    }

    pub(crate) fn reset_restitution(&mut self, fixture_a: &Fixture, fixture_b: &Fixture) {
        self.restitution = mix_restitution(fixture_a.restitution(), fixture_b.restitution());
    }

    pub(crate) fn flag_for_filtering(&mut self) {
        self.flags.insert(ContactFlags::FILTER);
    }

    /// Updates the manifold at the current body transforms and queues the begin, end and
    /// pre-solve events.
    ///
    /// Accumulated impulses of the contact points that persist, identified by their
    /// contact features, are carried over.
    pub(crate) fn update(
        &mut self,
        handle: ContactHandle,
        fixtures: &FixtureSet,
        bodies: &mut BodySet,
        events: &mut Vec<ContactEvent>,
    ) {
        let (fixture_a, fixture_b) = match (fixtures.get(self.fixture_a), fixtures.get(self.fixture_b))
        {
            (Some(a), Some(b)) => (a, b),
            _ => return,
        };

        let old_manifold = self.manifold;

        // Re-enable this contact.
        self.flags.insert(ContactFlags::ENABLED);

        let was_touching = self.is_touching();
        let sensor = fixture_a.is_sensor() || fixture_b.is_sensor();
        let xf_a = *bodies[self.body_a].transform();
        let xf_b = *bodies[self.body_b].transform();

        let touching = if sensor {
            // Sensors don't generate manifolds.
            self.manifold.point_count = 0;
            collision::test_overlap(fixture_a.shape(), &xf_a, fixture_b.shape(), &xf_b)
        } else {
            self.manifold = collision::collide(fixture_a.shape(), &xf_a, fixture_b.shape(), &xf_b);

            // Match old contact ids to new contact ids and copy the stored impulses to
            // warm start the solver.
            for mp2 in self.manifold.points_mut() {
                mp2.normal_impulse = 0.0;
                mp2.tangent_impulse = 0.0;

                if let Some(mp1) = old_manifold.points().iter().find(|mp1| mp1.id == mp2.id) {
                    mp2.normal_impulse = mp1.normal_impulse;
                    mp2.tangent_impulse = mp1.tangent_impulse;
                }
            }

            let touching = self.manifold.point_count > 0;

            if touching != was_touching {
                bodies[self.body_a].set_awake(true);
                bodies[self.body_b].set_awake(true);
            }

            touching
        };

        self.flags.set(ContactFlags::TOUCHING, touching);

        if !was_touching && touching {
            events.push(ContactEvent::Begin(handle));
        }

        if was_touching && !touching {
            events.push(ContactEvent::End(Box::new(self.clone())));
        }

        if !sensor && touching {
            events.push(ContactEvent::PreSolve(handle, old_manifold));
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn material_mixing() {
        assert!(relative_eq!(mix_friction(0.4, 0.9), 0.6));
        assert_eq!(mix_friction(0.0, 1.0), 0.0);
        assert_eq!(mix_restitution(0.1, 0.7), 0.7);
    }
}
