use std::collections::HashMap;

use log::trace;
use ncollide::bounding_volume::BoundingVolume;

use crate::detection::BroadPhase;
use crate::error::{WorldError, WorldResult};
use crate::math::{self, Real, Vector, AABB};
use crate::object::{BodySet, FixtureHandle, FixtureSet};
use crate::particle::{ParticleBodyContact, ParticleContact};
use crate::settings;
use crate::shape::RayCastInput;
use crate::solver::TimeStep;
use crate::utils::HandleSet;

define_handle!(
    ParticleSystemHandle,
    "The unique identifier of a particle system added to a world."
);

/// A set of particle systems.
pub type ParticleSystemSet = HandleSet<ParticleSystemHandle, ParticleSystem>;

// Weights are clamped into this range when computing pressures.
const MIN_PARTICLE_WEIGHT: Real = 1.0;
const MAX_PARTICLE_WEIGHT: Real = 5.0;

bitflags! {
    /// The behavior of a particle.
    #[derive(Default)]
    pub struct ParticleFlags: u32 {
        /// A plain fluid particle.
        const WATER = 0;
        /// Removed at the beginning of the next step.
        const ZOMBIE = 1 << 1;
        /// Never moves: its velocity is zeroed every step.
        const WALL = 1 << 2;
        /// Exchanges momentum with its neighbors through viscosity.
        const VISCOUS = 1 << 3;
    }
}

/// The description of a particle system.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct ParticleSystemDesc {
    radius: Real,
    density: Real,
    gravity_scale: Real,
    pressure_strength: Real,
    damping_strength: Real,
    viscous_strength: Real,
    capacity: usize,
}

impl Default for ParticleSystemDesc {
    fn default() -> Self {
        ParticleSystemDesc {
            radius: 1.0,
            density: 1.0,
            gravity_scale: 1.0,
            pressure_strength: 0.05,
            damping_strength: 1.0,
            viscous_strength: 0.25,
            capacity: 1024,
        }
    }
}

impl ParticleSystemDesc {
    /// A particle system description with default parameters.
    pub fn new() -> Self {
        Self::default()
    }

    desc_setters!(
        radius, set_radius, radius: Real
        density, set_density, density: Real
        gravity_scale, set_gravity_scale, gravity_scale: Real
        pressure_strength, set_pressure_strength, pressure_strength: Real
        damping_strength, set_damping_strength, damping_strength: Real
        viscous_strength, set_viscous_strength, viscous_strength: Real
        capacity, set_capacity, capacity: usize
    );

    desc_getters!(
        get_radius -> radius: Real
        get_density -> density: Real
        get_gravity_scale -> gravity_scale: Real
        get_capacity -> capacity: usize
    );
}

/// The description of a single particle.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ParticleDesc {
    flags: ParticleFlags,
    position: Vector,
    velocity: Vector,
}

impl ParticleDesc {
    /// A water particle at `position`, at rest.
    pub fn new(position: Vector) -> Self {
        ParticleDesc {
            flags: ParticleFlags::WATER,
            position,
            velocity: Vector::zeros(),
        }
    }

    desc_setters!(
        flags, set_flags, flags: ParticleFlags
        position, set_position, position: Vector
        velocity, set_velocity, velocity: Vector
    );
}

/// A set of particles sharing the same radius and fluid parameters.
///
/// The per-particle state is stored as parallel arrays indexed by particle index. Indices are
/// stable until the next step removes the particles flagged as `ZOMBIE`.
pub struct ParticleSystem {
    radius: Real,
    density: Real,
    gravity_scale: Real,
    pressure_strength: Real,
    damping_strength: Real,
    viscous_strength: Real,
    capacity: usize,

    positions: Vec<Vector>,
    velocities: Vec<Vector>,
    flags: Vec<ParticleFlags>,
    weights: Vec<Real>,
    accumulations: Vec<Real>,

    contacts: Vec<ParticleContact>,
    body_contacts: Vec<ParticleBodyContact>,
    grid: HashMap<(i32, i32), Vec<usize>>,
    query_buffer: Vec<FixtureHandle>,
}

impl ParticleSystem {
    /// Creates an empty particle system.
    pub fn new(desc: &ParticleSystemDesc) -> Self {
        debug_assert!(desc.radius > 0.0);
        debug_assert!(desc.density > 0.0);

        ParticleSystem {
            radius: desc.radius,
            density: desc.density,
            gravity_scale: desc.gravity_scale,
            pressure_strength: desc.pressure_strength,
            damping_strength: desc.damping_strength,
            viscous_strength: desc.viscous_strength,
            capacity: desc.capacity,
            positions: Vec::new(),
            velocities: Vec::new(),
            flags: Vec::new(),
            weights: Vec::new(),
            accumulations: Vec::new(),
            contacts: Vec::new(),
            body_contacts: Vec::new(),
            grid: HashMap::new(),
            query_buffer: Vec::new(),
        }
    }

    /// Adds a particle and returns its index.
    pub fn create_particle(&mut self, desc: &ParticleDesc) -> WorldResult<usize> {
        if self.positions.len() >= self.capacity {
            return Err(WorldError::CapacityExceeded {
                resource: "particles",
                limit: self.capacity,
            });
        }

        self.positions.push(desc.position);
        self.velocities.push(desc.velocity);
        self.flags.push(desc.flags);
        self.weights.push(0.0);
        self.accumulations.push(0.0);

        Ok(self.positions.len() - 1)
    }

    /// Flags a particle for removal at the beginning of the next step.
    pub fn destroy_particle(&mut self, index: usize) {
        if let Some(flags) = self.flags.get_mut(index) {
            flags.insert(ParticleFlags::ZOMBIE);
        }
    }

    /// The number of particles, including those flagged for removal.
    pub fn particle_count(&self) -> usize {
        self.positions.len()
    }

    /// The maximum number of particles.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The radius of every particle.
    pub fn radius(&self) -> Real {
        self.radius
    }

    /// The mass of every particle.
    pub fn particle_mass(&self) -> Real {
        let stride = self.diameter() * 0.75;
        self.density * stride * stride
    }

    /// Scales the world gravity applied to this system.
    pub fn set_gravity_scale(&mut self, scale: Real) {
        self.gravity_scale = scale;
    }

    /// The particle positions.
    pub fn positions(&self) -> &[Vector] {
        &self.positions
    }

    /// The particle velocities.
    pub fn velocities(&self) -> &[Vector] {
        &self.velocities
    }

    /// The particle flags.
    pub fn flags(&self) -> &[ParticleFlags] {
        &self.flags
    }

    /// The number of neighbors of each particle, weighted by proximity, as of the last step.
    pub fn weights(&self) -> &[Real] {
        &self.weights
    }

    /// Sets the velocity of a particle.
    pub fn set_velocity(&mut self, index: usize, velocity: Vector) {
        if let Some(v) = self.velocities.get_mut(index) {
            *v = velocity;
        }
    }

    /// The particle-particle contacts found during the last step.
    pub fn contacts(&self) -> &[ParticleContact] {
        &self.contacts
    }

    /// The particle-fixture contacts found during the last step.
    pub fn body_contacts(&self) -> &[ParticleBodyContact] {
        &self.body_contacts
    }

    fn diameter(&self) -> Real {
        2.0 * self.radius
    }

    fn critical_velocity(&self, step: &TimeStep) -> Real {
        self.diameter() * step.inv_dt
    }

    /// Advances the particles by one step and exchanges impulses with the bodies they touch.
    pub(crate) fn solve(
        &mut self,
        step: &TimeStep,
        gravity: &Vector,
        bodies: &mut BodySet,
        fixtures: &FixtureSet,
        broad_phase: &BroadPhase,
    ) {
        self.remove_zombies();

        if self.positions.is_empty() {
            self.contacts.clear();
            self.body_contacts.clear();
            return;
        }

        self.update_contacts();
        self.update_body_contacts(bodies, fixtures, broad_phase);
        self.compute_weights();

        trace!(
            "solving {} particles with {} contacts and {} body contacts",
            self.positions.len(),
            self.contacts.len(),
            self.body_contacts.len()
        );

        let dv = *gravity * (step.dt * self.gravity_scale);
        for v in &mut self.velocities {
            *v += dv;
        }

        self.limit_velocity(step);
        self.solve_viscous(bodies);
        self.solve_pressure(step, bodies);
        self.solve_damping(step, bodies);
        self.solve_wall();
        self.solve_collision(step, bodies, fixtures, broad_phase);

        for (p, v) in self.positions.iter_mut().zip(self.velocities.iter()) {
            *p += *v * step.dt;
        }
    }

    fn remove_zombies(&mut self) {
        if !self.flags.iter().any(|f| f.contains(ParticleFlags::ZOMBIE)) {
            return;
        }

        let mut kept = 0;

        for i in 0..self.positions.len() {
            if self.flags[i].contains(ParticleFlags::ZOMBIE) {
                continue;
            }

            self.positions.swap(kept, i);
            self.velocities.swap(kept, i);
            self.flags.swap(kept, i);
            kept += 1;
        }

        self.positions.truncate(kept);
        self.velocities.truncate(kept);
        self.flags.truncate(kept);
        self.weights.truncate(kept);
        self.accumulations.truncate(kept);
    }

    fn grid_cell(&self, p: &Vector) -> (i32, i32) {
        let inv_diameter = 1.0 / self.diameter();
        (
            (p.x * inv_diameter).floor() as i32,
            (p.y * inv_diameter).floor() as i32,
        )
    }

    /// Finds the pairs of particles closer than one diameter, hashing them into a grid of
    /// diameter-sized cells.
    fn update_contacts(&mut self) {
        for cell in self.grid.values_mut() {
            cell.clear();
        }

        for i in 0..self.positions.len() {
            let cell = self.grid_cell(&self.positions[i]);
            self.grid.entry(cell).or_insert_with(Vec::new).push(i);
        }

        self.contacts.clear();

        let diameter = self.diameter();
        let inv_diameter = 1.0 / diameter;

        for a in 0..self.positions.len() {
            let (cx, cy) = self.grid_cell(&self.positions[a]);

            for dx in -1..=1 {
                for dy in -1..=1 {
                    let cell = match self.grid.get(&(cx + dx, cy + dy)) {
                        Some(cell) => cell,
                        None => continue,
                    };

                    for b in cell.iter().cloned().filter(|b| *b > a) {
                        let d = self.positions[b] - self.positions[a];
                        let dist2 = d.norm_squared();

                        if dist2 >= diameter * diameter || dist2 == 0.0 {
                            continue;
                        }

                        let dist = dist2.sqrt();
                        self.contacts.push(ParticleContact {
                            a,
                            b,
                            weight: 1.0 - dist * inv_diameter,
                            normal: d / dist,
                        });
                    }
                }
            }
        }

        // Drop the cells left empty so that the grid follows the fluid.
        self.grid.retain(|_, cell| !cell.is_empty());
    }

    /// Finds the particles closer than one diameter to a fixture.
    fn update_body_contacts(
        &mut self,
        bodies: &BodySet,
        fixtures: &FixtureSet,
        broad_phase: &BroadPhase,
    ) {
        self.body_contacts.clear();

        let diameter = self.diameter();
        let inv_diameter = 1.0 / diameter;
        let inv_particle_mass = 1.0 / self.particle_mass();

        let mut found = std::mem::replace(&mut self.query_buffer, Vec::new());
        found.clear();
        broad_phase.query(&self.bounds(diameter), &mut found);

        for handle in &found {
            let fixture = match fixtures.get(*handle) {
                Some(fixture) if !fixture.is_sensor() => fixture,
                _ => continue,
            };
            let body = match bodies.get(fixture.body()) {
                Some(body) => body,
                None => continue,
            };
            let fixture_aabb = fixture.shape().compute_aabb(&body.xf).loosened(diameter);

            for (index, p) in self.positions.iter().enumerate() {
                let inside = p.x >= fixture_aabb.mins.x
                    && p.y >= fixture_aabb.mins.y
                    && p.x <= fixture_aabb.maxs.x
                    && p.y <= fixture_aabb.maxs.y;

                if !inside {
                    continue;
                }

                let (d, n) = fixture.shape().compute_distance(&body.xf, p);

                if d >= diameter {
                    continue;
                }

                let rp = p - body.world_center();
                let rpn = math::cross(&rp, &n);
                let inv_m = inv_particle_mass + body.inv_mass + body.inv_inertia * rpn * rpn;

                self.body_contacts.push(ParticleBodyContact {
                    index,
                    body: fixture.body(),
                    fixture: *handle,
                    weight: 1.0 - d * inv_diameter,
                    normal: -n,
                    mass: if inv_m > 0.0 { 1.0 / inv_m } else { 0.0 },
                });
            }
        }

        self.query_buffer = found;
    }

    /// The bounding box of all the particles, enlarged by `margin`.
    fn bounds(&self, margin: Real) -> AABB {
        let mut mins = self.positions[0];
        let mut maxs = self.positions[0];

        for p in &self.positions[1..] {
            mins = mins.inf(p);
            maxs = maxs.sup(p);
        }

        math::aabb(mins, maxs).loosened(margin)
    }

    fn compute_weights(&mut self) {
        for w in &mut self.weights {
            *w = 0.0;
        }

        for contact in &self.body_contacts {
            self.weights[contact.index] += contact.weight;
        }

        for contact in &self.contacts {
            self.weights[contact.a] += contact.weight;
            self.weights[contact.b] += contact.weight;
        }
    }

    fn limit_velocity(&mut self, step: &TimeStep) {
        let critical_velocity = self.critical_velocity(step);
        let max2 = critical_velocity * critical_velocity;

        for v in &mut self.velocities {
            let v2 = v.norm_squared();

            if v2 > max2 {
                *v *= (max2 / v2).sqrt();
            }
        }
    }

    fn solve_viscous(&mut self, bodies: &mut BodySet) {
        let inv_particle_mass = 1.0 / self.particle_mass();

        for contact in &self.body_contacts {
            if !self.flags[contact.index].contains(ParticleFlags::VISCOUS) {
                continue;
            }

            let a = contact.index;
            let p = self.positions[a];

            if let Some(body) = bodies.get_mut(contact.body) {
                let v = body.linear_velocity_from_world_point(&p) - self.velocities[a];
                let f = v * (self.viscous_strength * contact.mass * contact.weight);
                self.velocities[a] += f * inv_particle_mass;
                body.apply_linear_impulse(&-f, &p, true);
            }
        }

        for contact in &self.contacts {
            let viscous = self.flags[contact.a].contains(ParticleFlags::VISCOUS)
                || self.flags[contact.b].contains(ParticleFlags::VISCOUS);

            if !viscous {
                continue;
            }

            let v = self.velocities[contact.b] - self.velocities[contact.a];
            let f = v * (self.viscous_strength * contact.weight);
            self.velocities[contact.a] += f;
            self.velocities[contact.b] -= f;
        }
    }

    /// Pushes overlapping particles apart with a pressure growing with their weight. Bodies
    /// receive the reaction impulses.
    fn solve_pressure(&mut self, step: &TimeStep, bodies: &mut BodySet) {
        let critical_velocity = self.critical_velocity(step);
        let pressure_per_weight =
            self.pressure_strength * self.density * critical_velocity * critical_velocity;

        for (h, w) in self.accumulations.iter_mut().zip(self.weights.iter()) {
            *h = pressure_per_weight
                * (w.min(MAX_PARTICLE_WEIGHT) - MIN_PARTICLE_WEIGHT).max(0.0);
        }

        // Wall particles exert no pressure of their own.
        for (h, flags) in self.accumulations.iter_mut().zip(self.flags.iter()) {
            if flags.contains(ParticleFlags::WALL) {
                *h = 0.0;
            }
        }

        let velocity_per_pressure = step.dt / (self.density * self.diameter());
        let inv_particle_mass = 1.0 / self.particle_mass();

        for contact in &self.body_contacts {
            let a = contact.index;
            let p = self.positions[a];
            let h = self.accumulations[a] + pressure_per_weight * contact.weight;
            let f = contact.normal
                * (velocity_per_pressure * contact.weight * contact.mass * h);

            self.velocities[a] -= f * inv_particle_mass;

            if let Some(body) = bodies.get_mut(contact.body) {
                body.apply_linear_impulse(&f, &p, true);
            }
        }

        for contact in &self.contacts {
            let h = self.accumulations[contact.a] + self.accumulations[contact.b];
            let f = contact.normal * (velocity_per_pressure * contact.weight * h);
            self.velocities[contact.a] -= f;
            self.velocities[contact.b] += f;
        }
    }

    /// Damps the approaching normal velocities of the contacts.
    fn solve_damping(&mut self, step: &TimeStep, bodies: &mut BodySet) {
        let linear_damping = self.damping_strength;
        let quadratic_damping = 1.0 / self.critical_velocity(step);
        let inv_particle_mass = 1.0 / self.particle_mass();

        for contact in &self.body_contacts {
            let a = contact.index;
            let p = self.positions[a];

            if let Some(body) = bodies.get_mut(contact.body) {
                let v = body.linear_velocity_from_world_point(&p) - self.velocities[a];
                let vn = v.dot(&contact.normal);

                if vn < 0.0 {
                    let damping = (linear_damping * contact.weight)
                        .max((-quadratic_damping * vn).min(0.5));
                    let f = contact.normal * (damping * contact.mass * vn);
                    self.velocities[a] += f * inv_particle_mass;
                    body.apply_linear_impulse(&-f, &p, true);
                }
            }
        }

        for contact in &self.contacts {
            let v = self.velocities[contact.b] - self.velocities[contact.a];
            let vn = v.dot(&contact.normal);

            if vn < 0.0 {
                let damping =
                    (linear_damping * contact.weight).max((-quadratic_damping * vn).min(0.5));
                let f = contact.normal * (damping * vn);
                self.velocities[contact.a] += f;
                self.velocities[contact.b] -= f;
            }
        }
    }

    fn solve_wall(&mut self) {
        for (v, flags) in self.velocities.iter_mut().zip(self.flags.iter()) {
            if flags.contains(ParticleFlags::WALL) {
                *v = Vector::zeros();
            }
        }
    }

    /// Projects the particles out of the fixtures they would cross during this step.
    ///
    /// The motion of each particle is expressed relative to the body it may hit, from the
    /// body transform at the beginning of the previous solve to its current one.
    fn solve_collision(
        &mut self,
        step: &TimeStep,
        bodies: &mut BodySet,
        fixtures: &FixtureSet,
        broad_phase: &BroadPhase,
    ) {
        let mut mins = self.positions[0];
        let mut maxs = self.positions[0];

        for (p, v) in self.positions.iter().zip(self.velocities.iter()) {
            let p2 = p + v * step.dt;
            mins = mins.inf(p).inf(&p2);
            maxs = maxs.sup(p).sup(&p2);
        }

        let mut found = std::mem::replace(&mut self.query_buffer, Vec::new());
        found.clear();
        broad_phase.query(&math::aabb(mins, maxs), &mut found);

        let particle_mass = self.particle_mass();

        for handle in &found {
            let fixture = match fixtures.get(*handle) {
                Some(fixture) if !fixture.is_sensor() => fixture,
                _ => continue,
            };
            let body = match bodies.get_mut(fixture.body()) {
                Some(body) => body,
                None => continue,
            };
            let fixture_aabb = fixture.shape().compute_aabb(&body.xf);

            for a in 0..self.positions.len() {
                let ap = self.positions[a];
                let av = self.velocities[a];
                let end = ap + av * step.dt;
                let segment = math::aabb(ap.inf(&end), ap.sup(&end));

                if !fixture_aabb.intersects(&segment) {
                    continue;
                }

                let input = RayCastInput {
                    p1: math::transform(&body.xf0, &math::inverse_transform(&body.xf, &ap)),
                    p2: end,
                    max_fraction: 1.0,
                };

                if let Some(output) = fixture.ray_cast(&input, &body.xf) {
                    let p = input.p1 * (1.0 - output.fraction)
                        + input.p2 * output.fraction
                        + output.normal * settings::LINEAR_SLOP;
                    let v = (p - ap) * step.inv_dt;
                    self.velocities[a] = v;

                    let f = (av - v) * particle_mass;
                    let f = output.normal * f.dot(&output.normal);
                    body.apply_linear_impulse(&f, &p, true);
                }
            }
        }

        self.query_buffer = found;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn creation_past_capacity_fails() {
        let desc = ParticleSystemDesc::new().capacity(2);
        let mut system = ParticleSystem::new(&desc);

        assert_eq!(system.create_particle(&ParticleDesc::new(Vector::zeros())), Ok(0));
        assert_eq!(system.create_particle(&ParticleDesc::new(Vector::x())), Ok(1));
        assert_eq!(
            system.create_particle(&ParticleDesc::new(Vector::y())),
            Err(WorldError::CapacityExceeded {
                resource: "particles",
                limit: 2
            })
        );
    }

    #[test]
    fn zombies_are_compacted_in_order() {
        let mut system = ParticleSystem::new(&ParticleSystemDesc::new());

        for i in 0..4 {
            let p = Vector::new(i as Real * 10.0, 0.0);
            let _ = system.create_particle(&ParticleDesc::new(p));
        }

        system.destroy_particle(1);
        system.remove_zombies();

        assert_eq!(system.particle_count(), 3);
        assert_eq!(system.positions()[0].x, 0.0);
        assert_eq!(system.positions()[1].x, 20.0);
        assert_eq!(system.positions()[2].x, 30.0);
    }

    #[test]
    fn only_close_particles_are_in_contact() {
        let desc = ParticleSystemDesc::new().radius(0.5);
        let mut system = ParticleSystem::new(&desc);

        let _ = system.create_particle(&ParticleDesc::new(Vector::new(0.0, 0.0)));
        let _ = system.create_particle(&ParticleDesc::new(Vector::new(0.5, 0.0)));
        let _ = system.create_particle(&ParticleDesc::new(Vector::new(5.0, 0.0)));
        system.update_contacts();

        assert_eq!(system.contacts().len(), 1);
        let contact = system.contacts()[0];
        assert_eq!((contact.a, contact.b), (0, 1));
        assert!(relative_eq!(contact.weight, 0.5));
        assert!(relative_eq!(contact.normal, Vector::x()));
    }

    #[test]
    fn pressure_pushes_crowded_particles_apart() {
        let desc = ParticleSystemDesc::new().radius(0.5).pressure_strength(1.0);
        let mut system = ParticleSystem::new(&desc);
        let step = TimeStep::new(1.0 / 60.0, 0.0, 8, 3, false);
        let mut bodies = BodySet::new();

        // A dense cluster so that the weights exceed the pressure threshold.
        for i in 0..3 {
            for j in 0..3 {
                let p = Vector::new(i as Real * 0.1, j as Real * 0.1);
                let _ = system.create_particle(&ParticleDesc::new(p));
            }
        }

        system.update_contacts();
        system.compute_weights();
        system.solve_pressure(&step, &mut bodies);

        // The corner particle is pushed away from the center of the cluster.
        assert!(system.velocities()[0].x < 0.0);
        assert!(system.velocities()[0].y < 0.0);
        assert!(system.velocities()[8].x > 0.0);
        assert!(system.velocities()[8].y > 0.0);
    }
}
