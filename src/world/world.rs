use log::{debug, trace};

use crate::collision::{self, TOIInput, TOIState};
use crate::counters::Counters;
use crate::detection::{
    Contact, ContactEvent, ContactFlags, ContactHandle, ContactManager, ContactSet,
};
use crate::error::{WorldError, WorldResult};
use crate::joint::{Joint, JointDesc, JointHandle, JointSet};
use crate::math::{self, Real, Vector, AABB, EPSILON};
use crate::object::{
    Body, BodyDesc, BodyFlags, BodyHandle, BodySet, BodyType, Filter, Fixture, FixtureDesc,
    FixtureHandle, FixtureSet, JointEdge,
};
use crate::particle::{
    ParticleDesc, ParticleSystem, ParticleSystemDesc, ParticleSystemHandle, ParticleSystemSet,
};
use crate::settings;
use crate::shape::RayCastInput;
use crate::solver::{IntegrationParameters, Island, IslandContext, TimeStep};
use crate::volumetric::MassData;
use crate::world::{ContactFilter, ContactListener, DefaultContactFilter, DestructionListener};

/// The physics world.
///
/// It owns the bodies, fixtures, joints, contacts and particle systems, and advances them
/// with `step`.
pub struct World {
    bodies: BodySet,
    fixtures: FixtureSet,
    joints: JointSet,
    contact_manager: ContactManager,
    particle_systems: ParticleSystemSet,
    gravity: Vector,
    params: IntegrationParameters,
    counters: Counters,

    island: Island,
    stack: Vec<BodyHandle>,
    contact_buffer: Vec<ContactHandle>,
    query_buffer: Vec<FixtureHandle>,

    // This is used to compute the time step ratio to support a variable time step.
    inv_dt0: Real,
    step_complete: bool,
    new_fixture: bool,
    locked: bool,
    in_dispatch: bool,
    auto_clear_forces: bool,

    contact_listener: Option<Box<dyn ContactListener>>,
    destruction_listener: Option<Box<dyn DestructionListener>>,
    contact_filter: Box<dyn ContactFilter>,
}

impl World {
    /// Creates an empty world with the given gravity.
    pub fn new(gravity: Vector) -> Self {
        World {
            bodies: BodySet::new(),
            fixtures: FixtureSet::new(),
            joints: JointSet::new(),
            contact_manager: ContactManager::new(),
            particle_systems: ParticleSystemSet::new(),
            gravity,
            params: IntegrationParameters::default(),
            counters: Counters::new(false),
            island: Island::new(),
            stack: Vec::new(),
            contact_buffer: Vec::new(),
            query_buffer: Vec::new(),
            inv_dt0: 0.0,
            step_complete: true,
            new_fixture: false,
            locked: false,
            in_dispatch: false,
            auto_clear_forces: true,
            contact_listener: None,
            destruction_listener: None,
            contact_filter: Box::new(DefaultContactFilter),
        }
    }

    fn check_unlocked(&self, operation: &str) -> WorldResult<()> {
        if self.locked {
            debug!("{} rejected: the world is in the middle of a time step", operation);
            Err(WorldError::Locked)
        } else {
            Ok(())
        }
    }

    /*
     * Settings.
     */
    /// The gravity applied to every dynamic body and particle.
    pub fn gravity(&self) -> Vector {
        self.gravity
    }

    /// Sets the gravity.
    pub fn set_gravity(&mut self, gravity: Vector) {
        self.gravity = gravity;
    }

    /// The solver parameters.
    pub fn parameters(&self) -> &IntegrationParameters {
        &self.params
    }

    /// Mutable reference to the solver parameters.
    pub fn parameters_mut(&mut self) -> &mut IntegrationParameters {
        &mut self.params
    }

    /// The performance counters.
    pub fn counters(&self) -> &Counters {
        &self.counters
    }

    /// Mutable reference to the performance counters, e.g., to enable them.
    pub fn counters_mut(&mut self) -> &mut Counters {
        &mut self.counters
    }

    /// Enables or disables sleeping. Disabling it wakes up every body.
    pub fn set_allow_sleeping(&mut self, flag: bool) {
        if flag == self.params.allow_sleep {
            return;
        }

        self.params.allow_sleep = flag;

        if !flag {
            for (_, body) in self.bodies.iter_mut() {
                body.set_awake(true);
            }
        }
    }

    /// Enables or disables warm starting.
    pub fn set_warm_starting(&mut self, flag: bool) {
        self.params.warm_starting = flag;
    }

    /// Enables or disables continuous collision detection.
    pub fn set_continuous_physics(&mut self, flag: bool) {
        self.params.continuous_physics = flag;
    }

    /// Enables or disables single time-of-impact event sub-stepping.
    pub fn set_sub_stepping(&mut self, flag: bool) {
        self.params.sub_stepping = flag;
    }

    /// Did the last step resolve all its time-of-impact events?
    ///
    /// With sub-stepping enabled, `step` handles one event per call and this stays `false`
    /// until the remaining events of the frame have been processed.
    pub fn is_step_complete(&self) -> bool {
        self.step_complete
    }

    /// Whether forces are cleared automatically after each step.
    pub fn auto_clear_forces(&self) -> bool {
        self.auto_clear_forces
    }

    /// Sets whether forces are cleared automatically after each step.
    pub fn set_auto_clear_forces(&mut self, flag: bool) {
        self.auto_clear_forces = flag;
    }

    /// Is the world in the middle of a time step?
    pub fn is_locked(&self) -> bool {
        self.locked
    }

    /// Registers the listener of contact events.
    pub fn set_contact_listener(&mut self, listener: Option<Box<dyn ContactListener>>) {
        self.contact_listener = listener;
    }

    /// Registers the listener of implicit destructions.
    pub fn set_destruction_listener(&mut self, listener: Option<Box<dyn DestructionListener>>) {
        self.destruction_listener = listener;
    }

    /// Replaces the contact filter.
    pub fn set_contact_filter(&mut self, filter: Box<dyn ContactFilter>) {
        self.contact_filter = filter;
    }

    /*
     * Accessors.
     */
    /// The body identified by `handle`.
    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle)
    }

    /// Mutable reference to the body identified by `handle`.
    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(handle)
    }

    /// The fixture identified by `handle`.
    pub fn fixture(&self, handle: FixtureHandle) -> Option<&Fixture> {
        self.fixtures.get(handle)
    }

    /// Mutable reference to the fixture identified by `handle`.
    ///
    /// Changing the density does not update the body mass: call `reset_mass_data`.
    pub fn fixture_mut(&mut self, handle: FixtureHandle) -> Option<&mut Fixture> {
        self.fixtures.get_mut(handle)
    }

    /// The joint identified by `handle`.
    pub fn joint(&self, handle: JointHandle) -> Option<&Joint> {
        self.joints.get(handle)
    }

    /// Mutable reference to the joint identified by `handle`.
    pub fn joint_mut(&mut self, handle: JointHandle) -> Option<&mut Joint> {
        self.joints.get_mut(handle)
    }

    /// The contact identified by `handle`.
    pub fn contact(&self, handle: ContactHandle) -> Option<&Contact> {
        self.contact_manager.contacts.get(handle)
    }

    /// Mutable reference to the contact identified by `handle`.
    pub fn contact_mut(&mut self, handle: ContactHandle) -> Option<&mut Contact> {
        self.contact_manager.contacts.get_mut(handle)
    }

    /// Restores the friction of a contact to the mixture of its fixtures' frictions,
    /// undoing `Contact::set_friction`.
    pub fn reset_contact_friction(&mut self, handle: ContactHandle) -> WorldResult<()> {
        let contact = self
            .contact_manager
            .contacts
            .get_mut(handle)
            .ok_or(WorldError::InvalidContact)?;
        let (fixture_a, fixture_b) = (contact.fixture_a, contact.fixture_b);
        contact.reset_friction(&self.fixtures[fixture_a], &self.fixtures[fixture_b]);
        Ok(())
    }

    /// Restores the restitution of a contact to the mixture of its fixtures' restitutions,
    /// undoing `Contact::set_restitution`.
    pub fn reset_contact_restitution(&mut self, handle: ContactHandle) -> WorldResult<()> {
        let contact = self
            .contact_manager
            .contacts
            .get_mut(handle)
            .ok_or(WorldError::InvalidContact)?;
        let (fixture_a, fixture_b) = (contact.fixture_a, contact.fixture_b);
        contact.reset_restitution(&self.fixtures[fixture_a], &self.fixtures[fixture_b]);
        Ok(())
    }

    /// The particle system identified by `handle`.
    pub fn particle_system(&self, handle: ParticleSystemHandle) -> Option<&ParticleSystem> {
        self.particle_systems.get(handle)
    }

    /// Mutable reference to the particle system identified by `handle`.
    pub fn particle_system_mut(
        &mut self,
        handle: ParticleSystemHandle,
    ) -> Option<&mut ParticleSystem> {
        self.particle_systems.get_mut(handle)
    }

    /// The set of bodies.
    pub fn bodies(&self) -> &BodySet {
        &self.bodies
    }

    /// The set of fixtures.
    pub fn fixtures(&self) -> &FixtureSet {
        &self.fixtures
    }

    /// The set of joints.
    pub fn joints(&self) -> &JointSet {
        &self.joints
    }

    /// The set of contacts, touching or not.
    pub fn contacts(&self) -> &ContactSet {
        &self.contact_manager.contacts
    }

    /// The set of particle systems.
    pub fn particle_systems(&self) -> &ParticleSystemSet {
        &self.particle_systems
    }

    /// The number of bodies.
    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    /// The number of fixtures.
    pub fn fixture_count(&self) -> usize {
        self.fixtures.len()
    }

    /// The number of joints.
    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// The number of contacts, touching or not.
    pub fn contact_count(&self) -> usize {
        self.contact_manager.contacts.len()
    }

    /// The number of broad-phase proxies.
    pub fn proxy_count(&self) -> usize {
        self.contact_manager.broad_phase.proxy_count()
    }

    /*
     * Bodies.
     */
    /// Creates a rigid body without any fixture.
    pub fn create_body(&mut self, desc: &BodyDesc) -> WorldResult<BodyHandle> {
        self.check_unlocked("create_body")?;
        Ok(self.bodies.insert(desc.build()))
    }

    /// Destroys a body with its fixtures, joints and contacts.
    ///
    /// The destruction listener is notified of every joint and fixture removed along with it.
    pub fn destroy_body(&mut self, handle: BodyHandle) -> WorldResult<()> {
        self.check_unlocked("destroy_body")?;

        let body = self.bodies.get_mut(handle).ok_or(WorldError::InvalidBody)?;
        let joint_edges = std::mem::replace(&mut body.joint_edges, Vec::new());
        let contact_edges = std::mem::replace(&mut body.contact_edges, Vec::new());
        let fixtures = std::mem::replace(&mut body.fixtures, Vec::new());

        // Delete the attached joints.
        for edge in joint_edges {
            self.remove_joint(edge.joint, true);
        }

        // Delete the attached contacts.
        for edge in contact_edges {
            self.contact_manager.destroy(edge.contact, &mut self.bodies);
        }

        // Delete the attached fixtures. This destroys broad-phase proxies.
        for fixture_handle in fixtures {
            if let Some(mut fixture) = self.fixtures.remove(fixture_handle) {
                if let Some(listener) = &mut self.destruction_listener {
                    listener.say_goodbye_fixture(fixture_handle, &fixture);
                }

                fixture.destroy_proxy(&mut self.contact_manager.broad_phase);
            }
        }

        let _ = self.bodies.remove(handle);
        self.dispatch_contact_events();
        Ok(())
    }

    /// Teleports a body to a new origin position and angle, keeping its velocities.
    ///
    /// Contacts with the fixtures overlapping the new position are created right away.
    pub fn set_transform(
        &mut self,
        handle: BodyHandle,
        position: Vector,
        angle: Real,
    ) -> WorldResult<()> {
        self.check_unlocked("set_transform")?;

        let body = self.bodies.get_mut(handle).ok_or(WorldError::InvalidBody)?;
        body.set_transform_internal(position, angle);
        let xf = body.xf;

        for fixture in &self.bodies[handle].fixtures {
            if let Some(fixture) = self.fixtures.get_mut(*fixture) {
                fixture.synchronize(&mut self.contact_manager.broad_phase, &xf, &xf);
            }
        }

        self.find_new_contacts();
        Ok(())
    }

    /// Changes the type of a body.
    ///
    /// The mass is recomputed, the body is woken up and its contacts are destroyed; new ones
    /// are created at the next step.
    pub fn set_body_type(&mut self, handle: BodyHandle, body_type: BodyType) -> WorldResult<()> {
        self.check_unlocked("set_body_type")?;

        let body = self.bodies.get_mut(handle).ok_or(WorldError::InvalidBody)?;

        if body.body_type == body_type {
            return Ok(());
        }

        body.body_type = body_type;
        body.reset_mass_data(&self.fixtures);

        if body_type == BodyType::Static {
            body.linear_velocity = Vector::zeros();
            body.angular_velocity = 0.0;
            body.sweep.a0 = body.sweep.a;
            body.sweep.c0 = body.sweep.c;
            self.synchronize_fixtures(handle);
        }

        let body = &mut self.bodies[handle];
        body.set_awake(true);
        body.force = Vector::zeros();
        body.torque = 0.0;

        // Delete the attached contacts.
        let contact_edges = std::mem::replace(&mut body.contact_edges, Vec::new());
        for edge in contact_edges {
            self.contact_manager.destroy(edge.contact, &mut self.bodies);
        }

        // Touch the proxies so that new contacts will be created (when appropriate).
        for fixture in &self.bodies[handle].fixtures {
            if let Some(fixture) = self.fixtures.get(*fixture) {
                fixture.touch_proxy(&mut self.contact_manager.broad_phase);
            }
        }

        self.dispatch_contact_events();
        Ok(())
    }

    /// Activates or deactivates a body.
    ///
    /// An inactive body is not simulated and has no broad-phase proxies and no contacts. Its
    /// joints are ignored by the solver.
    pub fn set_body_active(&mut self, handle: BodyHandle, flag: bool) -> WorldResult<()> {
        self.check_unlocked("set_body_active")?;

        let body = self.bodies.get_mut(handle).ok_or(WorldError::InvalidBody)?;

        if body.is_active() == flag {
            return Ok(());
        }

        body.flags.set(BodyFlags::ACTIVE, flag);
        let xf = body.xf;

        if flag {
            // Create all proxies. Contacts are created at the next time step.
            for fixture_handle in &self.bodies[handle].fixtures {
                if let Some(fixture) = self.fixtures.get_mut(*fixture_handle) {
                    fixture.create_proxy(&mut self.contact_manager.broad_phase, &xf, *fixture_handle);
                }
            }
        } else {
            // Destroy all proxies.
            for fixture_handle in &self.bodies[handle].fixtures {
                if let Some(fixture) = self.fixtures.get_mut(*fixture_handle) {
                    fixture.destroy_proxy(&mut self.contact_manager.broad_phase);
                }
            }

            // Destroy the attached contacts.
            let contact_edges =
                std::mem::replace(&mut self.bodies[handle].contact_edges, Vec::new());
            for edge in contact_edges {
                self.contact_manager.destroy(edge.contact, &mut self.bodies);
            }

            self.dispatch_contact_events();
        }

        Ok(())
    }

    /// Prevents or allows the rotation of a body. This resets its mass data.
    pub fn set_fixed_rotation(&mut self, handle: BodyHandle, flag: bool) -> WorldResult<()> {
        self.check_unlocked("set_fixed_rotation")?;

        let body = self.bodies.get_mut(handle).ok_or(WorldError::InvalidBody)?;

        if body.is_fixed_rotation() == flag {
            return Ok(());
        }

        body.flags.set(BodyFlags::FIXED_ROTATION, flag);
        body.angular_velocity = 0.0;
        body.reset_mass_data(&self.fixtures);
        Ok(())
    }

    /// Overrides the mass properties of a dynamic body computed from its fixtures.
    pub fn set_mass_data(&mut self, handle: BodyHandle, data: &MassData) -> WorldResult<()> {
        self.check_unlocked("set_mass_data")?;

        let body = self.bodies.get_mut(handle).ok_or(WorldError::InvalidBody)?;
        body.set_mass_data_internal(data);
        Ok(())
    }

    /// Recomputes the mass properties of a body from the density and shape of its fixtures.
    pub fn reset_mass_data(&mut self, handle: BodyHandle) -> WorldResult<()> {
        self.check_unlocked("reset_mass_data")?;

        let body = self.bodies.get_mut(handle).ok_or(WorldError::InvalidBody)?;
        body.reset_mass_data(&self.fixtures);
        Ok(())
    }

    /*
     * Fixtures.
     */
    /// Attaches a new fixture to a body.
    ///
    /// The body mass is updated if the fixture has a positive density. Contacts with the new
    /// fixture are created at the beginning of the next step.
    pub fn create_fixture(
        &mut self,
        body: BodyHandle,
        desc: &FixtureDesc,
    ) -> WorldResult<FixtureHandle> {
        self.check_unlocked("create_fixture")?;

        if !self.bodies.contains(body) {
            return Err(WorldError::InvalidBody);
        }

        let handle = self.fixtures.insert(desc.build(body));
        let body = &mut self.bodies[body];

        if body.is_active() {
            self.fixtures[handle].create_proxy(
                &mut self.contact_manager.broad_phase,
                &body.xf,
                handle,
            );
        }

        body.fixtures.push(handle);

        // Adjust mass properties if needed.
        if desc.get_density() > 0.0 {
            body.reset_mass_data(&self.fixtures);
        }

        // Let the world know we have a new fixture. This will cause new contacts to be
        // created at the beginning of the next time step.
        self.new_fixture = true;

        Ok(handle)
    }

    /// Detaches and destroys a fixture, with its contacts. The body mass is recomputed.
    pub fn destroy_fixture(&mut self, handle: FixtureHandle) -> WorldResult<()> {
        self.check_unlocked("destroy_fixture")?;

        let body_handle = self
            .fixtures
            .get(handle)
            .ok_or(WorldError::InvalidFixture)?
            .body;

        let contacts = &self.contact_manager.contacts;
        let body = &mut self.bodies[body_handle];

        if let Some(i) = body.fixtures.iter().position(|f| *f == handle) {
            let _ = body.fixtures.swap_remove(i);
        }

        // Destroy any contacts associated with the fixture.
        let doomed: Vec<ContactHandle> = body
            .contact_edges
            .iter()
            .filter(|edge| {
                contacts
                    .get(edge.contact)
                    .map_or(false, |c| c.fixture_a == handle || c.fixture_b == handle)
            })
            .map(|edge| edge.contact)
            .collect();

        for contact in doomed {
            self.contact_manager.destroy(contact, &mut self.bodies);
        }

        if let Some(mut fixture) = self.fixtures.remove(handle) {
            fixture.destroy_proxy(&mut self.contact_manager.broad_phase);
        }

        // Reset the mass data.
        self.bodies[body_handle].reset_mass_data(&self.fixtures);
        self.dispatch_contact_events();
        Ok(())
    }

    /// Changes the collision filter of a fixture and re-filters its contacts.
    pub fn set_filter(&mut self, handle: FixtureHandle, filter: Filter) -> WorldResult<()> {
        self.fixtures
            .get_mut(handle)
            .ok_or(WorldError::InvalidFixture)?
            .filter = filter;
        self.refilter(handle)
    }

    /// Flags the contacts of a fixture for filtering at the next step, and lets the broad
    /// phase report its pairs again.
    ///
    /// Call this when the result of the contact filter changes for this fixture.
    pub fn refilter(&mut self, handle: FixtureHandle) -> WorldResult<()> {
        let fixture = self.fixtures.get(handle).ok_or(WorldError::InvalidFixture)?;

        // Flag associated contacts for filtering.
        if let Some(body) = self.bodies.get(fixture.body) {
            for edge in &body.contact_edges {
                if let Some(contact) = self.contact_manager.contacts.get_mut(edge.contact) {
                    if contact.fixture_a == handle || contact.fixture_b == handle {
                        contact.flag_for_filtering();
                    }
                }
            }
        }

        // Touch each proxy so that new pairs may be created.
        fixture.touch_proxy(&mut self.contact_manager.broad_phase);
        Ok(())
    }

    /// Turns a fixture into a sensor or back into a solid fixture.
    pub fn set_sensor(&mut self, handle: FixtureHandle, flag: bool) -> WorldResult<()> {
        let fixture = self
            .fixtures
            .get_mut(handle)
            .ok_or(WorldError::InvalidFixture)?;

        if fixture.is_sensor != flag {
            fixture.is_sensor = flag;

            if let Some(body) = self.bodies.get_mut(fixture.body) {
                body.set_awake(true);
            }
        }

        Ok(())
    }

    /*
     * Joints.
     */
    /// Creates a joint between two bodies.
    ///
    /// Contacts between the bodies are flagged for filtering if the joint prevents them from
    /// colliding.
    pub fn create_joint<D: Into<JointDesc>>(&mut self, desc: D) -> WorldResult<JointHandle> {
        self.check_unlocked("create_joint")?;

        let joint = desc.into().build(&self.joints, &self.bodies)?;
        let (body_a, body_b) = (joint.body_a, joint.body_b);
        let collide_connected = joint.collide_connected;
        let handle = self.joints.insert(joint);

        // Connect to the bodies' edge lists.
        self.bodies[body_a].joint_edges.push(JointEdge {
            other: body_b,
            joint: handle,
        });
        self.bodies[body_b].joint_edges.push(JointEdge {
            other: body_a,
            joint: handle,
        });

        // If the joint prevents collisions, then flag any contacts for filtering.
        if !collide_connected {
            self.flag_contacts_between(body_a, body_b);
        }

        Ok(handle)
    }

    /// Destroys a joint. Gear joints coupling it are destroyed too.
    pub fn destroy_joint(&mut self, handle: JointHandle) -> WorldResult<()> {
        self.check_unlocked("destroy_joint")?;

        if !self.joints.contains(handle) {
            return Err(WorldError::InvalidJoint);
        }

        self.remove_joint(handle, false);
        Ok(())
    }

    fn remove_joint(&mut self, handle: JointHandle, notify: bool) {
        let joint = match self.joints.remove(handle) {
            Some(joint) => joint,
            None => return,
        };

        if notify {
            if let Some(listener) = &mut self.destruction_listener {
                listener.say_goodbye_joint(handle, &joint);
            }
        }

        // Disconnect from the island graph.
        for body in &[joint.body_a, joint.body_b] {
            if let Some(body) = self.bodies.get_mut(*body) {
                body.set_awake(true);

                if let Some(i) = body.joint_edges.iter().position(|e| e.joint == handle) {
                    let _ = body.joint_edges.swap_remove(i);
                }
            }
        }

        // If the joint prevents collisions, then flag any contacts for filtering.
        if !joint.collide_connected {
            self.flag_contacts_between(joint.body_a, joint.body_b);
        }

        // Gears coupling this joint lost one of their coordinates.
        let gears: Vec<JointHandle> = self
            .joints
            .iter()
            .filter(|(_, j)| j.is_gear_of(handle))
            .map(|(h, _)| h)
            .collect();

        for gear in gears {
            self.remove_joint(gear, true);
        }
    }

    fn flag_contacts_between(&mut self, body_a: BodyHandle, body_b: BodyHandle) {
        if let Some(body) = self.bodies.get(body_b) {
            for edge in body.contact_edges.iter().filter(|e| e.other == body_a) {
                if let Some(contact) = self.contact_manager.contacts.get_mut(edge.contact) {
                    contact.flag_for_filtering();
                }
            }
        }
    }

    /*
     * Particles.
     */
    /// Creates an empty particle system.
    pub fn create_particle_system(
        &mut self,
        desc: &ParticleSystemDesc,
    ) -> WorldResult<ParticleSystemHandle> {
        self.check_unlocked("create_particle_system")?;
        Ok(self.particle_systems.insert(ParticleSystem::new(desc)))
    }

    /// Destroys a particle system with all its particles.
    pub fn destroy_particle_system(&mut self, handle: ParticleSystemHandle) -> WorldResult<()> {
        self.check_unlocked("destroy_particle_system")?;
        self.particle_systems
            .remove(handle)
            .map(|_| ())
            .ok_or(WorldError::InvalidParticleSystem)
    }

    /// Adds a particle to a particle system and returns its index.
    ///
    /// Fails with `CapacityExceeded` when the system is full.
    pub fn create_particle(
        &mut self,
        system: ParticleSystemHandle,
        desc: &ParticleDesc,
    ) -> WorldResult<usize> {
        self.check_unlocked("create_particle")?;
        self.particle_systems
            .get_mut(system)
            .ok_or(WorldError::InvalidParticleSystem)?
            .create_particle(desc)
    }

    /*
     * Queries.
     */
    /// Calls `callback` for every fixture whose broad-phase bounding box overlaps `aabb`,
    /// until it returns `false`.
    pub fn query_aabb(
        &mut self,
        aabb: &AABB,
        mut callback: impl FnMut(FixtureHandle, &Fixture) -> bool,
    ) {
        let mut found = std::mem::replace(&mut self.query_buffer, Vec::new());
        found.clear();
        self.contact_manager.broad_phase.query(aabb, &mut found);

        for handle in &found {
            if let Some(fixture) = self.fixtures.get(*handle) {
                if !callback(*handle, fixture) {
                    break;
                }
            }
        }

        self.query_buffer = found;
    }

    /// Casts the segment from `p1` to `p2` against every fixture it may hit.
    ///
    /// The callback receives the fixture, the hit point, the surface normal and the fraction
    /// of the segment. It controls the rest of the cast with its return value: `-1` ignores
    /// this fixture, `0` terminates the cast, a fraction clips the segment and `1` continues
    /// without clipping.
    pub fn ray_cast(
        &mut self,
        p1: &Vector,
        p2: &Vector,
        mut callback: impl FnMut(FixtureHandle, &Fixture, &Vector, &Vector, Real) -> Real,
    ) {
        let aabb = math::aabb(p1.inf(p2), p1.sup(p2));
        let mut found = std::mem::replace(&mut self.query_buffer, Vec::new());
        found.clear();
        self.contact_manager.broad_phase.query(&aabb, &mut found);

        let mut max_fraction = 1.0;

        for handle in &found {
            let fixture = match self.fixtures.get(*handle) {
                Some(fixture) => fixture,
                None => continue,
            };
            let xf = match self.bodies.get(fixture.body) {
                Some(body) => body.xf,
                None => continue,
            };
            let input = RayCastInput {
                p1: *p1,
                p2: *p2,
                max_fraction,
            };

            if let Some(output) = fixture.ray_cast(&input, &xf) {
                let point = *p1 + (*p2 - *p1) * output.fraction;
                let value = callback(*handle, fixture, &point, &output.normal, output.fraction);

                if value == 0.0 {
                    // The client has terminated the ray cast.
                    break;
                }

                if value > 0.0 {
                    // Update the segment bounding fraction.
                    max_fraction = value;
                }
            }
        }

        self.query_buffer = found;
    }

    /*
     * Simulation.
     */
    /// Clears the forces and torques of every body.
    pub fn clear_forces(&mut self) {
        for (_, body) in self.bodies.iter_mut() {
            body.force = Vector::zeros();
            body.torque = 0.0;
        }
    }

    /// Advances the world by `dt`.
    ///
    /// This performs collision detection, integration and constraint solution. Fails with
    /// `Locked` when called from a listener.
    pub fn step(
        &mut self,
        dt: Real,
        velocity_iterations: usize,
        position_iterations: usize,
    ) -> WorldResult<()> {
        self.check_unlocked("step")?;
        self.counters.step_started();

        // If new fixtures were added, we need to find the new contacts.
        if self.new_fixture {
            self.find_new_contacts();
            self.new_fixture = false;
        }

        self.locked = true;

        let step = TimeStep::new(
            dt,
            self.inv_dt0,
            velocity_iterations,
            position_iterations,
            self.params.warm_starting,
        );

        // Update contacts. This is where some contacts are destroyed.
        self.counters.collide_started();
        self.contact_manager.collide(
            &mut self.bodies,
            &self.fixtures,
            &self.joints,
            &*self.contact_filter,
        );
        self.counters.collide_completed();
        self.counters
            .set_ncontact_pairs(self.contact_manager.contacts.len());
        self.dispatch_contact_events();

        // Integrate velocities, solve velocity constraints, and integrate positions.
        if self.step_complete && step.dt > 0.0 {
            self.counters.particles_started();
            for (_, system) in self.particle_systems.iter_mut() {
                system.solve(
                    &step,
                    &self.gravity,
                    &mut self.bodies,
                    &self.fixtures,
                    &self.contact_manager.broad_phase,
                );
            }
            self.counters.particles_completed();

            self.counters.solve_started();
            self.solve(&step);
            self.counters.solve_completed();
        }

        // Handle TOI events.
        if self.params.continuous_physics && step.dt > 0.0 {
            self.counters.solve_toi_started();
            self.solve_toi(&step);
            self.counters.solve_toi_completed();
        }

        if step.dt > 0.0 {
            self.inv_dt0 = step.inv_dt;
        }

        if self.auto_clear_forces {
            self.clear_forces();
        }

        self.locked = false;
        self.counters.step_completed();
        Ok(())
    }

    /// Builds the islands of awake bodies with an explicit-stack depth first search and
    /// solves them one after the other.
    fn solve(&mut self, step: &TimeStep) {
        // Update previous transforms.
        for (_, body) in self.bodies.iter_mut() {
            body.xf0 = body.xf;
        }

        // Size the island for the worst case.
        self.island.initialize(
            self.bodies.len(),
            self.contact_manager.contacts.len(),
            self.joints.len(),
        );

        // Clear all the island flags.
        for (_, body) in self.bodies.iter_mut() {
            body.flags.remove(BodyFlags::ISLAND);
        }
        for (_, contact) in self.contact_manager.contacts.iter_mut() {
            contact.flags.remove(ContactFlags::ISLAND);
        }
        for (_, joint) in self.joints.iter_mut() {
            joint.island = false;
        }

        let seeds = self.bodies.handles();
        let nbodies = seeds.len();
        let mut stack = std::mem::replace(&mut self.stack, Vec::new());
        stack.reserve(self.bodies.len());

        // Build and simulate all awake islands.
        for seed in seeds.iter().cloned() {
            let body = &mut self.bodies[seed];

            if body.flags.contains(BodyFlags::ISLAND) {
                continue;
            }

            if !body.is_awake() || !body.is_active() {
                continue;
            }

            // The seed can be dynamic or kinematic.
            if body.is_static() {
                continue;
            }

            // Reset island and stack.
            self.island.clear();
            stack.clear();
            stack.push(seed);
            body.flags.insert(BodyFlags::ISLAND);

            // Perform a depth first search on the constraint graph.
            while let Some(handle) = stack.pop() {
                debug_assert!(stack.len() < nbodies);
                self.island.add_body(handle, &mut self.bodies);

                let body = &mut self.bodies[handle];
                debug_assert!(body.is_active());

                // Make sure the body is awake, without resetting its sleep timer.
                body.flags.insert(BodyFlags::AWAKE);

                // To keep islands as small as possible, we don't propagate islands across
                // static bodies.
                if body.is_static() {
                    continue;
                }

                // Search all contacts connected to this body.
                for i in 0..self.bodies[handle].contact_edges.len() {
                    let edge = self.bodies[handle].contact_edges[i];
                    let contact = &mut self.contact_manager.contacts[edge.contact];

                    // Has this contact already been added to an island?
                    if contact.flags.contains(ContactFlags::ISLAND) {
                        continue;
                    }

                    // Is this contact solid and touching?
                    if !contact.is_enabled() || !contact.is_touching() {
                        continue;
                    }

                    // Skip sensors.
                    if self.fixtures[contact.fixture_a].is_sensor()
                        || self.fixtures[contact.fixture_b].is_sensor()
                    {
                        continue;
                    }

                    self.island.add_contact(edge.contact);
                    contact.flags.insert(ContactFlags::ISLAND);

                    let other = &mut self.bodies[edge.other];

                    // Was the other body already added to this island?
                    if other.flags.contains(BodyFlags::ISLAND) {
                        continue;
                    }

                    other.flags.insert(BodyFlags::ISLAND);
                    stack.push(edge.other);
                }

                // Search all joints connected to this body.
                for i in 0..self.bodies[handle].joint_edges.len() {
                    let edge = self.bodies[handle].joint_edges[i];
                    let joint = &mut self.joints[edge.joint];

                    if joint.island {
                        continue;
                    }

                    let other = &mut self.bodies[edge.other];

                    // Don't simulate joints connected to inactive bodies.
                    if !other.is_active() {
                        continue;
                    }

                    self.island.add_joint(edge.joint);
                    joint.island = true;

                    if other.flags.contains(BodyFlags::ISLAND) {
                        continue;
                    }

                    other.flags.insert(BodyFlags::ISLAND);
                    stack.push(edge.other);
                }
            }

            trace!(
                "solving island of {} bodies, {} contacts and {} joints",
                self.island.bodies().len(),
                self.island.contacts().len(),
                self.island.joints().len()
            );

            self.island.solve(
                &mut self.counters,
                step,
                &self.params,
                &self.gravity,
                IslandContext {
                    bodies: &mut self.bodies,
                    contacts: &mut self.contact_manager.contacts,
                    fixtures: &self.fixtures,
                    joints: &mut self.joints,
                    events: &mut self.contact_manager.events,
                },
            );

            // Post solve cleanup: allow static bodies to participate in other islands.
            for handle in self.island.bodies() {
                let body = &mut self.bodies[*handle];

                if body.is_static() {
                    body.flags.remove(BodyFlags::ISLAND);
                }
            }

            self.dispatch_contact_events();
        }

        self.stack = stack;

        // Synchronize fixtures.
        self.counters.broad_phase_started();
        for handle in seeds {
            let moved = self.bodies.get(handle).map_or(false, |body| {
                // If a body was not in an island then it did not move.
                body.flags.contains(BodyFlags::ISLAND) && !body.is_static()
            });

            if moved {
                // Update fixtures (for broad-phase).
                self.synchronize_fixtures(handle);
            }
        }

        // Look for new contacts.
        self.find_new_contacts();
        self.counters.broad_phase_completed();
    }

    /// Finds the earliest time of impact, advances the bodies involved to it and solves the
    /// impact with a sub-step, until no impact remains in this step.
    fn solve_toi(&mut self, step: &TimeStep) {
        let max_toi_contacts = self.params.max_toi_contacts;
        self.island
            .initialize(2 * max_toi_contacts, max_toi_contacts, 0);

        if self.step_complete {
            for (_, body) in self.bodies.iter_mut() {
                body.flags.remove(BodyFlags::ISLAND);
                body.sweep.alpha0 = 0.0;
            }

            for (_, contact) in self.contact_manager.contacts.iter_mut() {
                // Invalidate TOI.
                contact.flags.remove(ContactFlags::TOI | ContactFlags::ISLAND);
                contact.toi_count = 0;
                contact.toi = 1.0;
            }
        }

        // Find TOI events and solve them.
        loop {
            // Find the first TOI.
            let (min_contact, min_alpha) = match self.earliest_toi() {
                Some((contact, alpha)) if alpha < 1.0 - 10.0 * EPSILON => (contact, alpha),
                _ => {
                    // No more TOI events. Done!
                    self.step_complete = true;
                    break;
                }
            };

            trace!("time of impact at {} for {:?}", min_alpha, min_contact);

            let (body_a, body_b) = {
                let contact = &self.contact_manager.contacts[min_contact];
                (contact.body_a, contact.body_b)
            };

            // Advance the bodies to the TOI.
            let backup_a = self.bodies[body_a].sweep;
            let backup_b = self.bodies[body_b].sweep;
            self.bodies[body_a].advance(min_alpha);
            self.bodies[body_b].advance(min_alpha);

            // The TOI contact likely has some new contact points.
            self.update_contact(min_contact);

            let contact = &mut self.contact_manager.contacts[min_contact];
            contact.flags.remove(ContactFlags::TOI);
            contact.toi_count += 1;

            // Is the contact solid?
            if !contact.is_enabled() || !contact.is_touching() {
                // Restore the sweeps.
                contact.set_enabled(false);

                for (handle, backup) in &[(body_a, backup_a), (body_b, backup_b)] {
                    let body = &mut self.bodies[*handle];
                    body.sweep = *backup;
                    body.synchronize_transform();
                }

                continue;
            }

            self.bodies[body_a].set_awake(true);
            self.bodies[body_b].set_awake(true);

            // Build the island.
            self.island.clear();
            self.island.add_body(body_a, &mut self.bodies);
            self.island.add_body(body_b, &mut self.bodies);
            self.island.add_contact(min_contact);

            self.bodies[body_a].flags.insert(BodyFlags::ISLAND);
            self.bodies[body_b].flags.insert(BodyFlags::ISLAND);
            self.contact_manager.contacts[min_contact]
                .flags
                .insert(ContactFlags::ISLAND);

            // Get contacts on body A and body B.
            for body in [body_a, body_b].iter().cloned() {
                if self.bodies[body].body_type == BodyType::Dynamic {
                    self.add_toi_neighbors(body, min_alpha);
                }
            }

            let dt = (1.0 - min_alpha) * step.dt;
            let sub_step = TimeStep {
                dt,
                inv_dt: 1.0 / dt,
                dt_ratio: 1.0,
                velocity_iterations: step.velocity_iterations,
                position_iterations: settings::TOI_POSITION_ITERATIONS,
                warm_starting: false,
            };

            let toi_index_a = self.bodies[body_a].island_index;
            let toi_index_b = self.bodies[body_b].island_index;

            self.island.solve_toi(
                &sub_step,
                &self.params,
                toi_index_a,
                toi_index_b,
                IslandContext {
                    bodies: &mut self.bodies,
                    contacts: &mut self.contact_manager.contacts,
                    fixtures: &self.fixtures,
                    joints: &mut self.joints,
                    events: &mut self.contact_manager.events,
                },
            );
            self.counters.toi_substep_performed();

            // Reset island flags and synchronize broad-phase proxies.
            for i in 0..self.island.bodies().len() {
                let handle = self.island.bodies()[i];
                let body = &mut self.bodies[handle];
                body.flags.remove(BodyFlags::ISLAND);

                if body.body_type != BodyType::Dynamic {
                    continue;
                }

                self.synchronize_fixtures(handle);

                // Invalidate all contact TOIs on this displaced body.
                for edge in &self.bodies[handle].contact_edges {
                    if let Some(contact) = self.contact_manager.contacts.get_mut(edge.contact) {
                        contact.flags.remove(ContactFlags::TOI | ContactFlags::ISLAND);
                    }
                }
            }

            // Commit fixture proxy movements to the broad-phase so that new contacts are
            // created. Also, some contacts can be destroyed.
            self.find_new_contacts();
            self.dispatch_contact_events();

            if self.params.sub_stepping {
                self.step_complete = false;
                break;
            }
        }
    }

    /// The contact with the smallest time of impact, and this time of impact.
    fn earliest_toi(&mut self) -> Option<(ContactHandle, Real)> {
        let mut handles = std::mem::replace(&mut self.contact_buffer, Vec::new());
        handles.clear();
        handles.extend(self.contact_manager.contacts.iter().map(|(h, _)| h));

        let mut min_contact = None;
        let mut min_alpha = 1.0;

        for handle in handles.iter().cloned() {
            let contact = &self.contact_manager.contacts[handle];

            // Is this contact disabled?
            if !contact.is_enabled() {
                continue;
            }

            // Prevent excessive sub-stepping.
            if contact.toi_count > self.params.max_sub_steps {
                continue;
            }

            let alpha = if contact.flags.contains(ContactFlags::TOI) {
                // This contact has a valid cached TOI.
                contact.toi
            } else {
                match self.compute_toi(handle) {
                    Some(alpha) => alpha,
                    None => continue,
                }
            };

            if alpha < min_alpha {
                // This is the minimum TOI found so far.
                min_contact = Some(handle);
                min_alpha = alpha;
            }
        }

        self.contact_buffer = handles;
        min_contact.map(|contact| (contact, min_alpha))
    }

    /// Computes and caches the time of impact of a contact, or returns `None` if the contact
    /// does not need continuous collision detection.
    fn compute_toi(&mut self, handle: ContactHandle) -> Option<Real> {
        let contact = &self.contact_manager.contacts[handle];
        let fixture_a = &self.fixtures[contact.fixture_a];
        let fixture_b = &self.fixtures[contact.fixture_b];

        // Is there a sensor?
        if fixture_a.is_sensor() || fixture_b.is_sensor() {
            return None;
        }

        let (body_a, body_b) = self.bodies.get2_mut(contact.body_a, contact.body_b)?;

        let active_a = body_a.is_awake() && body_a.body_type != BodyType::Static;
        let active_b = body_b.is_awake() && body_b.body_type != BodyType::Static;

        // Is at least one body active (awake and dynamic or kinematic)?
        if !active_a && !active_b {
            return None;
        }

        let collide_a = body_a.is_bullet() || body_a.body_type != BodyType::Dynamic;
        let collide_b = body_b.is_bullet() || body_b.body_type != BodyType::Dynamic;

        // Are these two non-bullet dynamic bodies?
        if !collide_a && !collide_b {
            return None;
        }

        // Compute the TOI for this contact. Put the sweeps onto the same time interval.
        let mut alpha0 = body_a.sweep.alpha0;

        if body_a.sweep.alpha0 < body_b.sweep.alpha0 {
            alpha0 = body_b.sweep.alpha0;
            body_a.sweep.advance(alpha0);
        } else if body_b.sweep.alpha0 < body_a.sweep.alpha0 {
            alpha0 = body_a.sweep.alpha0;
            body_b.sweep.advance(alpha0);
        }

        debug_assert!(alpha0 < 1.0);

        let input = TOIInput {
            shape_a: fixture_a.shape(),
            shape_b: fixture_b.shape(),
            sweep_a: body_a.sweep,
            sweep_b: body_b.sweep,
            t_max: 1.0,
        };

        self.counters.toi_started();
        let output = collision::time_of_impact(&input);
        self.counters.toi_completed();

        // Beta is the fraction of the remaining portion of the step.
        let alpha = if output.state == TOIState::Touching {
            (alpha0 + (1.0 - alpha0) * output.t).min(1.0)
        } else {
            1.0
        };

        let contact = &mut self.contact_manager.contacts[handle];
        contact.toi = alpha;
        contact.flags.insert(ContactFlags::TOI);

        Some(alpha)
    }

    /// Adds to the TOI island the touching contacts of `body` with static, kinematic or
    /// bullet bodies, advancing these bodies to `min_alpha`.
    fn add_toi_neighbors(&mut self, body: BodyHandle, min_alpha: Real) {
        let is_bullet = self.bodies[body].is_bullet();

        for i in 0..self.bodies[body].contact_edges.len() {
            if !self.island.has_room_for_body() || !self.island.has_room_for_contact() {
                break;
            }

            let edge = self.bodies[body].contact_edges[i];
            let contact = &self.contact_manager.contacts[edge.contact];

            // Has this contact already been added to the island?
            if contact.flags.contains(ContactFlags::ISLAND) {
                continue;
            }

            // Only add static, kinematic, or bullet bodies.
            let other = &mut self.bodies[edge.other];
            if other.body_type == BodyType::Dynamic && !is_bullet && !other.is_bullet() {
                continue;
            }

            // Skip sensors.
            if self.fixtures[contact.fixture_a].is_sensor()
                || self.fixtures[contact.fixture_b].is_sensor()
            {
                continue;
            }

            // Tentatively advance the body to the TOI.
            let backup = other.sweep;
            if !other.flags.contains(BodyFlags::ISLAND) && other.sweep.alpha0 < min_alpha {
                other.advance(min_alpha);
            }

            // Update the contact points.
            self.update_contact(edge.contact);

            let contact = &mut self.contact_manager.contacts[edge.contact];

            // Was the contact disabled by the user? Are there contact points?
            if !contact.is_enabled() || !contact.is_touching() {
                let other = &mut self.bodies[edge.other];
                other.sweep = backup;
                other.synchronize_transform();
                continue;
            }

            // Add the contact to the island.
            contact.flags.insert(ContactFlags::ISLAND);
            self.island.add_contact(edge.contact);

            // Has the other body already been added to the island?
            let other = &mut self.bodies[edge.other];
            if other.flags.contains(BodyFlags::ISLAND) {
                continue;
            }

            // Add the other body to the island.
            other.flags.insert(BodyFlags::ISLAND);

            if other.body_type != BodyType::Static {
                other.set_awake(true);
            }

            self.island.add_body(edge.other, &mut self.bodies);
        }
    }

    /// Updates the manifold of a contact at the current body transforms.
    fn update_contact(&mut self, handle: ContactHandle) {
        if let Some(contact) = self.contact_manager.contacts.get_mut(handle) {
            contact.update(
                handle,
                &self.fixtures,
                &mut self.bodies,
                &mut self.contact_manager.events,
            );
        }

        self.dispatch_contact_events();
    }

    /// Moves the broad-phase proxies of a body over the motion from the start of its sweep
    /// to its current transform.
    fn synchronize_fixtures(&mut self, handle: BodyHandle) {
        let body = &self.bodies[handle];
        let xf1 = body.sweep_start_transform();

        for fixture in &body.fixtures {
            if let Some(fixture) = self.fixtures.get_mut(*fixture) {
                fixture.synchronize(&mut self.contact_manager.broad_phase, &xf1, &body.xf);
            }
        }
    }

    fn find_new_contacts(&mut self) {
        self.contact_manager.find_new_contacts(
            &mut self.bodies,
            &self.fixtures,
            &self.joints,
            &*self.contact_filter,
        );
    }

    /// Delivers the queued contact events to the contact listener.
    ///
    /// Events queued by the listener itself are delivered by the same call.
    fn dispatch_contact_events(&mut self) {
        if self.in_dispatch {
            return;
        }

        let mut listener = match self.contact_listener.take() {
            Some(listener) => listener,
            None => {
                self.contact_manager.events.clear();
                return;
            }
        };

        self.in_dispatch = true;

        while !self.contact_manager.events.is_empty() {
            let events = std::mem::replace(&mut self.contact_manager.events, Vec::new());

            for event in events {
                match event {
                    ContactEvent::Begin(handle) => listener.begin_contact(self, handle),
                    ContactEvent::End(contact) => listener.end_contact(self, &contact),
                    ContactEvent::PreSolve(handle, old_manifold) => {
                        listener.pre_solve(self, handle, &old_manifold)
                    }
                    ContactEvent::PostSolve(handle, impulse) => {
                        listener.post_solve(self, handle, &impulse)
                    }
                }
            }
        }

        self.in_dispatch = false;

        // The listener may have installed a replacement.
        if self.contact_listener.is_none() {
            self.contact_listener = Some(listener);
        }
    }
}
