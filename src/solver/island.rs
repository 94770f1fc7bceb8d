use crate::counters::Counters;
use crate::detection::{ContactEvent, ContactHandle, ContactSet};
use crate::joint::{JointHandle, JointSet};
use crate::math::{Real, Vector};
use crate::object::{BodyHandle, BodySet, BodyType, FixtureSet};
use crate::solver::{
    ContactSolver, IntegrationParameters, Position, SolverData, TimeStep, Velocity,
};

/// The world collections an island reads and writes while it is solved.
pub(crate) struct IslandContext<'a> {
    pub bodies: &'a mut BodySet,
    pub contacts: &'a mut ContactSet,
    pub fixtures: &'a FixtureSet,
    pub joints: &'a mut JointSet,
    pub events: &'a mut Vec<ContactEvent>,
}

/// A connected set of bodies, contacts and joints solved together.
///
/// Islands are rebuilt at every traversal: `clear` keeps the allocations of the previous
/// island.
pub struct Island {
    bodies: Vec<BodyHandle>,
    contacts: Vec<ContactHandle>,
    joints: Vec<JointHandle>,
    body_capacity: usize,
    contact_capacity: usize,
    joint_capacity: usize,
    positions: Vec<Position>,
    velocities: Vec<Velocity>,
    contact_solver: ContactSolver,
}

impl Default for Island {
    fn default() -> Self {
        Island::new()
    }
}

impl Island {
    /// An empty island with no capacity.
    pub fn new() -> Self {
        Island {
            bodies: Vec::new(),
            contacts: Vec::new(),
            joints: Vec::new(),
            body_capacity: 0,
            contact_capacity: 0,
            joint_capacity: 0,
            positions: Vec::new(),
            velocities: Vec::new(),
            contact_solver: ContactSolver::new(),
        }
    }

    /// Empties the island and sets the maximum number of elements it may hold.
    pub fn initialize(
        &mut self,
        body_capacity: usize,
        contact_capacity: usize,
        joint_capacity: usize,
    ) {
        self.body_capacity = body_capacity;
        self.contact_capacity = contact_capacity;
        self.joint_capacity = joint_capacity;
        self.clear();

        self.bodies.reserve(body_capacity);
        self.contacts.reserve(contact_capacity);
        self.joints.reserve(joint_capacity);
    }

    /// Removes every element from this island, keeping its capacities.
    pub fn clear(&mut self) {
        self.bodies.clear();
        self.contacts.clear();
        self.joints.clear();
    }

    /// The bodies of this island, in insertion order.
    pub fn bodies(&self) -> &[BodyHandle] {
        &self.bodies
    }

    /// The contacts of this island.
    pub fn contacts(&self) -> &[ContactHandle] {
        &self.contacts
    }

    /// The joints of this island.
    pub fn joints(&self) -> &[JointHandle] {
        &self.joints
    }

    /// Can another body be added?
    pub fn has_room_for_body(&self) -> bool {
        self.bodies.len() < self.body_capacity
    }

    /// Can another contact be added?
    pub fn has_room_for_contact(&self) -> bool {
        self.contacts.len() < self.contact_capacity
    }

    /// Adds a body and assigns its island index.
    pub fn add_body(&mut self, handle: BodyHandle, bodies: &mut BodySet) {
        debug_assert!(self.bodies.len() < self.body_capacity);
        if let Some(body) = bodies.get_mut(handle) {
            body.island_index = self.bodies.len();
            self.bodies.push(handle);
        }
    }

    /// Adds a contact.
    pub fn add_contact(&mut self, handle: ContactHandle) {
        debug_assert!(self.contacts.len() < self.contact_capacity);
        self.contacts.push(handle);
    }

    /// Adds a joint.
    pub fn add_joint(&mut self, handle: JointHandle) {
        debug_assert!(self.joints.len() < self.joint_capacity);
        self.joints.push(handle);
    }

    /// Integrates the island over a full time step, solves its constraints and puts it to
    /// sleep if every body has been resting long enough.
    pub(crate) fn solve(
        &mut self,
        counters: &mut Counters,
        step: &TimeStep,
        params: &IntegrationParameters,
        gravity: &Vector,
        ctxt: IslandContext,
    ) {
        let h = step.dt;
        let IslandContext {
            bodies,
            contacts,
            fixtures,
            joints,
            events,
        } = ctxt;

        self.positions.clear();
        self.velocities.clear();

        // Integrate velocities and apply damping. Initialize the body state.
        for handle in &self.bodies {
            let body = &mut bodies[*handle];

            let c = body.sweep.c;
            let a = body.sweep.a;
            let mut v = body.linear_velocity;
            let mut w = body.angular_velocity;

            // Store positions for continuous collision.
            body.sweep.c0 = c;
            body.sweep.a0 = a;

            if body.body_type == BodyType::Dynamic {
                // Integrate velocities.
                v += (*gravity * body.gravity_scale + body.force * body.inv_mass) * h;
                w += h * body.inv_inertia * body.torque;

                // Apply damping.
                // ODE: dv/dt + c * v = 0
                // Pade approximation: v2 = v1 * 1 / (1 + c * dt)
                v *= 1.0 / (1.0 + h * body.linear_damping);
                w *= 1.0 / (1.0 + h * body.angular_damping);
            }

            self.positions.push(Position { c, a });
            self.velocities.push(Velocity { v, w });
        }

        counters.solver_init_started();

        self.contact_solver
            .initialize(step, params, &self.contacts, contacts, fixtures, bodies);
        self.contact_solver
            .initialize_velocity_constraints(&self.positions, &self.velocities);

        if step.warm_starting {
            self.contact_solver.warm_start(&mut self.velocities);
        }

        {
            let mut data = SolverData {
                step: *step,
                params,
                positions: &mut self.positions,
                velocities: &mut self.velocities,
            };

            for handle in &self.joints {
                joints[*handle].init_velocity_constraints(bodies, &mut data);
            }
        }

        counters.solver_init_completed();

        // Solve velocity constraints.
        counters.velocity_iterations_started();

        for _ in 0..step.velocity_iterations {
            let mut data = SolverData {
                step: *step,
                params,
                positions: &mut self.positions,
                velocities: &mut self.velocities,
            };

            for handle in &self.joints {
                joints[*handle].solve_velocity_constraints(&mut data);
            }

            self.contact_solver
                .solve_velocity_constraints(&mut self.velocities);
        }

        // Store impulses for warm starting.
        self.contact_solver.store_impulses(contacts);
        counters.velocity_iterations_completed();

        // Integrate positions.
        integrate_positions(h, params, &mut self.positions, &mut self.velocities);

        // Solve position constraints.
        counters.position_iterations_started();
        let mut position_solved = false;

        for _ in 0..step.position_iterations {
            let contacts_okay = self
                .contact_solver
                .solve_position_constraints(&mut self.positions);

            let mut data = SolverData {
                step: *step,
                params,
                positions: &mut self.positions,
                velocities: &mut self.velocities,
            };

            let mut joints_okay = true;
            for handle in &self.joints {
                let joint_okay = joints[*handle].solve_position_constraints(&mut data);
                joints_okay = joints_okay && joint_okay;
            }

            if contacts_okay && joints_okay {
                // Exit early if the position errors are small.
                position_solved = true;
                break;
            }
        }

        // Copy state buffers back to the bodies.
        for (i, handle) in self.bodies.iter().enumerate() {
            let body = &mut bodies[*handle];
            body.sweep.c = self.positions[i].c;
            body.sweep.a = self.positions[i].a;
            body.linear_velocity = self.velocities[i].v;
            body.angular_velocity = self.velocities[i].w;
            body.synchronize_transform();
        }

        counters.position_iterations_completed();

        self.report(events);

        if params.allow_sleep {
            let mut min_sleep_time = Real::MAX;

            let lin_tol_sqr = params.linear_sleep_tolerance * params.linear_sleep_tolerance;
            let ang_tol_sqr = params.angular_sleep_tolerance * params.angular_sleep_tolerance;

            for handle in &self.bodies {
                let body = &mut bodies[*handle];

                if body.body_type == BodyType::Static {
                    continue;
                }

                if !body.is_sleeping_allowed()
                    || body.angular_velocity * body.angular_velocity > ang_tol_sqr
                    || body.linear_velocity.norm_squared() > lin_tol_sqr
                {
                    body.sleep_time = 0.0;
                    min_sleep_time = 0.0;
                } else {
                    body.sleep_time += h;
                    min_sleep_time = min_sleep_time.min(body.sleep_time);
                }
            }

            if min_sleep_time >= params.time_to_sleep && position_solved {
                for handle in &self.bodies {
                    bodies[*handle].set_awake(false);
                }
            }
        }

        counters.island_solved(self.contacts.len());
    }

    /// Resolves the time-of-impact contacts of this island, moving only the bodies at the
    /// island indices `toi_index_a` and `toi_index_b`, then integrates the remainder of
    /// the step.
    pub(crate) fn solve_toi(
        &mut self,
        sub_step: &TimeStep,
        params: &IntegrationParameters,
        toi_index_a: usize,
        toi_index_b: usize,
        ctxt: IslandContext,
    ) {
        debug_assert!(toi_index_a < self.bodies.len());
        debug_assert!(toi_index_b < self.bodies.len());

        let IslandContext {
            bodies,
            contacts,
            fixtures,
            events,
            ..
        } = ctxt;

        // Initialize the body state.
        self.positions.clear();
        self.velocities.clear();

        for handle in &self.bodies {
            let body = &bodies[*handle];
            self.positions.push(Position {
                c: body.sweep.c,
                a: body.sweep.a,
            });
            self.velocities.push(Velocity {
                v: body.linear_velocity,
                w: body.angular_velocity,
            });
        }

        self.contact_solver
            .initialize(sub_step, params, &self.contacts, contacts, fixtures, bodies);

        // Solve position constraints.
        for _ in 0..sub_step.position_iterations {
            let contacts_okay = self.contact_solver.solve_toi_position_constraints(
                &mut self.positions,
                toi_index_a,
                toi_index_b,
            );

            if contacts_okay {
                break;
            }
        }

        // Leap of faith to new safe state.
        for &index in &[toi_index_a, toi_index_b] {
            let body = &mut bodies[self.bodies[index]];
            body.sweep.c0 = self.positions[index].c;
            body.sweep.a0 = self.positions[index].a;
        }

        // No warm starting is needed for TOI events because warm starting impulses were
        // applied in the discrete solver.
        self.contact_solver
            .initialize_velocity_constraints(&self.positions, &self.velocities);

        // Solve velocity constraints.
        for _ in 0..sub_step.velocity_iterations {
            self.contact_solver
                .solve_velocity_constraints(&mut self.velocities);
        }

        // The TOI contact impulses are not stored for warm starting: they can be quite large.

        integrate_positions(sub_step.dt, params, &mut self.positions, &mut self.velocities);

        for (i, handle) in self.bodies.iter().enumerate() {
            let body = &mut bodies[*handle];
            body.sweep.c = self.positions[i].c;
            body.sweep.a = self.positions[i].a;
            body.linear_velocity = self.velocities[i].v;
            body.angular_velocity = self.velocities[i].w;
            body.synchronize_transform();
        }

        self.report(events);
    }

    /// Queues the post-solve impulses of every contact.
    fn report(&self, events: &mut Vec<ContactEvent>) {
        events.extend(
            self.contact_solver
                .post_solve_impulses()
                .map(|(handle, impulse)| ContactEvent::PostSolve(handle, impulse)),
        );
    }
}

/// Integrates the positions with symplectic Euler, clamping excessive displacements.
fn integrate_positions(
    h: Real,
    params: &IntegrationParameters,
    positions: &mut [Position],
    velocities: &mut [Velocity],
) {
    let max_translation_sqr = params.max_translation * params.max_translation;
    let max_rotation_sqr = params.max_rotation * params.max_rotation;

    for (pos, vel) in positions.iter_mut().zip(velocities.iter_mut()) {
        // Check for large velocities.
        let translation = vel.v * h;
        if translation.norm_squared() > max_translation_sqr {
            vel.v *= params.max_translation / translation.norm();
        }

        let rotation = h * vel.w;
        if rotation * rotation > max_rotation_sqr {
            vel.w *= params.max_rotation / rotation.abs();
        }

        // Integrate.
        pos.c += vel.v * h;
        pos.a += h * vel.w;
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::object::{BodyDesc, FixtureDesc};
    use crate::shape::{Circle, Polygon};

    struct Scene {
        bodies: BodySet,
        fixtures: FixtureSet,
        contacts: ContactSet,
        joints: JointSet,
    }

    impl Scene {
        fn new() -> Self {
            Scene {
                bodies: BodySet::new(),
                fixtures: FixtureSet::new(),
                contacts: ContactSet::new(),
                joints: JointSet::new(),
            }
        }

        fn add_ball(&mut self, position: Vector, velocity: Vector) -> BodyHandle {
            let mut body = BodyDesc::dynamic(position).build();
            body.linear_velocity = velocity;
            let handle = self.bodies.insert(body);
            let fixture = FixtureDesc::new(Circle::new(0.5))
                .density(1.0)
                .build(handle);
            let fixture = self.fixtures.insert(fixture);
            let body = &mut self.bodies[handle];
            body.fixtures.push(fixture);
            body.reset_mass_data(&self.fixtures);
            handle
        }

        fn solve(&mut self, island: &mut Island, params: &IntegrationParameters) {
            let step = TimeStep::new(1.0 / 60.0, 60.0, 8, 3, true);
            let mut events = Vec::new();
            let mut counters = Counters::new(false);
            let ctxt = IslandContext {
                bodies: &mut self.bodies,
                contacts: &mut self.contacts,
                fixtures: &self.fixtures,
                joints: &mut self.joints,
                events: &mut events,
            };
            island.solve(&mut counters, &step, params, &Vector::zeros(), ctxt);
        }
    }

    #[test]
    fn island_sleeps_as_a_unit() {
        let mut scene = Scene::new();
        let resting = scene.add_ball(Vector::new(0.0, 0.0), Vector::zeros());
        let moving = scene.add_ball(Vector::new(5.0, 0.0), Vector::new(1.0, 0.0));

        let params = IntegrationParameters::default();
        let mut island = Island::new();

        // Long enough for the resting body alone to fall asleep.
        for _ in 0..60 {
            island.initialize(2, 0, 0);
            island.add_body(resting, &mut scene.bodies);
            island.add_body(moving, &mut scene.bodies);
            scene.solve(&mut island, &params);
        }

        assert!(scene.bodies[resting].is_awake());
        assert!(scene.bodies[moving].is_awake());
        assert_eq!(scene.bodies[moving].sleep_time(), 0.0);
        assert!(scene.bodies[resting].sleep_time() > 0.5);
    }

    #[test]
    fn resting_island_falls_asleep() {
        let mut scene = Scene::new();
        let a = scene.add_ball(Vector::new(0.0, 0.0), Vector::zeros());
        let b = scene.add_ball(Vector::new(5.0, 0.0), Vector::zeros());

        let params = IntegrationParameters::default();
        let mut island = Island::new();

        for _ in 0..60 {
            island.initialize(2, 0, 0);
            island.add_body(a, &mut scene.bodies);
            island.add_body(b, &mut scene.bodies);
            scene.solve(&mut island, &params);
        }

        assert!(!scene.bodies[a].is_awake());
        assert!(!scene.bodies[b].is_awake());
    }

    #[test]
    fn large_velocities_are_clamped() {
        let mut scene = Scene::new();
        let ball = scene.add_ball(Vector::zeros(), Vector::new(1000.0, 0.0));

        let params = IntegrationParameters::default();
        let mut island = Island::new();
        island.initialize(1, 0, 0);
        island.add_body(ball, &mut scene.bodies);
        scene.solve(&mut island, &params);

        let body = &scene.bodies[ball];
        assert_relative_eq!(body.world_center().x, params.max_translation, epsilon = 1.0e-4);
        assert_relative_eq!(
            body.linear_velocity().x,
            params.max_translation * 60.0,
            epsilon = 1.0e-2
        );
    }

    #[test]
    fn static_bodies_keep_their_pose() {
        let mut scene = Scene::new();
        let ground = scene.bodies.insert(BodyDesc::new().build());
        let fixture = FixtureDesc::new(Polygon::cuboid(5.0, 0.5)).build(ground);
        let fixture = scene.fixtures.insert(fixture);
        scene.bodies[ground].fixtures.push(fixture);

        let mut island = Island::new();
        island.initialize(1, 0, 0);
        island.add_body(ground, &mut scene.bodies);
        scene.solve(&mut island, &IntegrationParameters::default());

        assert_eq!(scene.bodies[ground].position(), Vector::zeros());
        assert!(island.bodies().len() == 1);
    }
}
