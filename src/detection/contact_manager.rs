use crate::detection::{BroadPhase, Contact, ContactEvent, ContactFlags, ContactHandle, ContactSet};
use crate::joint::JointSet;
use crate::object::{BodySet, ContactEdge, FixtureHandle, FixtureSet};
use crate::world::ContactFilter;

/// Owns the broad phase and the contacts, creating contacts for new proxy pairs and
/// destroying the ones that stopped overlapping.
pub struct ContactManager {
    pub(crate) broad_phase: BroadPhase,
    pub(crate) contacts: ContactSet,
    pub(crate) events: Vec<ContactEvent>,
    pair_buffer: Vec<(FixtureHandle, FixtureHandle)>,
    contact_buffer: Vec<ContactHandle>,
}

impl Default for ContactManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactManager {
    /// Creates a contact manager without any contact.
    pub fn new() -> Self {
        ContactManager {
            broad_phase: BroadPhase::new(),
            contacts: ContactSet::new(),
            events: Vec::new(),
            pair_buffer: Vec::new(),
            contact_buffer: Vec::new(),
        }
    }

    /// The broad phase.
    pub fn broad_phase(&self) -> &BroadPhase {
        &self.broad_phase
    }

    /// The contacts.
    pub fn contacts(&self) -> &ContactSet {
        &self.contacts
    }

    /// Creates a contact for a new pair of overlapping proxies, unless the fixtures must not
    /// collide.
    pub(crate) fn add_pair(
        &mut self,
        mut fixture_a: FixtureHandle,
        mut fixture_b: FixtureHandle,
        bodies: &mut BodySet,
        fixtures: &FixtureSet,
        joints: &JointSet,
        filter: &dyn ContactFilter,
    ) {
        let (fa, fb) = match (fixtures.get(fixture_a), fixtures.get(fixture_b)) {
            (Some(fa), Some(fb)) => (fa, fb),
            _ => return,
        };

        let body_a = fa.body();
        let body_b = fb.body();

        // Are the fixtures on the same body?
        if body_a == body_b {
            return;
        }

        // Does a contact already exist?
        let exists = bodies[body_b].contact_edges.iter().any(|edge| {
            edge.other == body_a
                && self.contacts.get(edge.contact).map_or(false, |c| {
                    (c.fixture_a == fixture_a && c.fixture_b == fixture_b)
                        || (c.fixture_a == fixture_b && c.fixture_b == fixture_a)
                })
        });

        if exists {
            return;
        }

        // Does a joint override collision? Is at least one body dynamic?
        if !bodies[body_b].should_collide(body_a, &bodies[body_a], joints) {
            return;
        }

        // Check user filtering.
        if !filter.should_collide(fa, fb) {
            return;
        }

        // Polygon-circle manifolds are computed with the polygon first.
        let (mut fa, mut fb) = (fa, fb);
        if fa.shape().is_circle() && !fb.shape().is_circle() {
            std::mem::swap(&mut fixture_a, &mut fixture_b);
            std::mem::swap(&mut fa, &mut fb);
        }

        let contact = Contact::new(fixture_a, fa, fixture_b, fb);
        let (body_a, body_b) = (contact.body_a, contact.body_b);
        let handle = self.contacts.insert(contact);

        bodies[body_a].contact_edges.push(ContactEdge {
            other: body_b,
            contact: handle,
        });
        bodies[body_b].contact_edges.push(ContactEdge {
            other: body_a,
            contact: handle,
        });
    }

    /// Creates the contacts of the new pairs found by the broad phase.
    pub(crate) fn find_new_contacts(
        &mut self,
        bodies: &mut BodySet,
        fixtures: &FixtureSet,
        joints: &JointSet,
        filter: &dyn ContactFilter,
    ) {
        let mut pairs = std::mem::replace(&mut self.pair_buffer, Vec::new());
        pairs.clear();
        self.broad_phase.update_pairs(&mut pairs);

        for (fixture_a, fixture_b) in pairs.drain(..) {
            self.add_pair(fixture_a, fixture_b, bodies, fixtures, joints, filter);
        }

        self.pair_buffer = pairs;
    }

    /// Destroys a contact, queuing an end event if it was touching.
    pub(crate) fn destroy(&mut self, handle: ContactHandle, bodies: &mut BodySet) {
        let contact = match self.contacts.remove(handle) {
            Some(contact) => contact,
            None => return,
        };

        for body in &[contact.body_a, contact.body_b] {
            if let Some(body) = bodies.get_mut(*body) {
                if let Some(i) = body.contact_edges.iter().position(|e| e.contact == handle) {
                    let _ = body.contact_edges.swap_remove(i);
                }
            }
        }

        if contact.is_touching() {
            self.events.push(ContactEvent::End(Box::new(contact)));
        }
    }

    /// Refreshes the manifold of every contact whose bodies are awake, destroying the
    /// contacts that must no longer exist.
    ///
    /// This is the top level collision call for the time step.
    pub(crate) fn collide(
        &mut self,
        bodies: &mut BodySet,
        fixtures: &FixtureSet,
        joints: &JointSet,
        filter: &dyn ContactFilter,
    ) {
        let mut handles = std::mem::replace(&mut self.contact_buffer, Vec::new());
        handles.clear();
        handles.extend(self.contacts.iter().map(|(handle, _)| handle));

        for handle in handles.iter().cloned() {
            let (fixture_a, fixture_b, body_a, body_b, needs_filtering) = match self.contacts.get(handle) {
                Some(c) => (
                    c.fixture_a,
                    c.fixture_b,
                    c.body_a,
                    c.body_b,
                    c.flags.contains(ContactFlags::FILTER),
                ),
                None => continue,
            };

            let (fa, fb) = match (fixtures.get(fixture_a), fixtures.get(fixture_b)) {
                (Some(fa), Some(fb)) => (fa, fb),
                _ => {
                    self.destroy(handle, bodies);
                    continue;
                }
            };

            // Is this contact flagged for filtering?
            if needs_filtering {
                // Should these bodies collide?
                if !bodies[body_b].should_collide(body_a, &bodies[body_a], joints)
                    || !filter.should_collide(fa, fb)
                {
                    self.destroy(handle, bodies);
                    continue;
                }

                self.contacts[handle].flags.remove(ContactFlags::FILTER);
            }

            let active_a = bodies[body_a].is_awake() && !bodies[body_a].is_static();
            let active_b = bodies[body_b].is_awake() && !bodies[body_b].is_static();

            // At least one body must be awake and it must be dynamic or kinematic.
            if !active_a && !active_b {
                continue;
            }

            let overlap = match (fa.proxy_id(), fb.proxy_id()) {
                (Some(a), Some(b)) => self.broad_phase.test_overlap(a, b),
                _ => false,
            };

            // Here we destroy contacts that cease to overlap in the broad-phase.
            if !overlap {
                self.destroy(handle, bodies);
                continue;
            }

            // The contact persists.
            self.contacts[handle].update(handle, fixtures, bodies, &mut self.events);
        }

        self.contact_buffer = handles;
    }
}
