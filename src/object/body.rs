use crate::detection::ContactHandle;
use crate::joint::{JointHandle, JointSet};
use crate::math::{self, Isometry, Real, Rotation, Sweep, Vector};
use crate::object::{FixtureHandle, FixtureSet};
use crate::utils::{HandleSet, UserData};
use crate::volumetric::MassData;

define_handle!(BodyHandle, "The handle of a body added to a world.");

/// The set of bodies of a world.
pub type BodySet = HandleSet<BodyHandle, Body>;

/// The simulation type of a body.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum BodyType {
    /// Zero mass, zero velocity, may be moved manually.
    Static,
    /// Zero mass, velocity set by the user, moved by the solver.
    Kinematic,
    /// Positive mass, velocity determined by forces, moved by the solver.
    Dynamic,
}

bitflags! {
    pub(crate) struct BodyFlags: u16 {
        const ISLAND = 0x0001;
        const AWAKE = 0x0002;
        const AUTO_SLEEP = 0x0004;
        const BULLET = 0x0008;
        const FIXED_ROTATION = 0x0010;
        const ACTIVE = 0x0020;
    }
}

/// Links a body to a contact it participates in.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct ContactEdge {
    /// The other body of the contact.
    pub other: BodyHandle,
    /// The contact.
    pub contact: ContactHandle,
}

/// Links a body to a joint attached to it.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct JointEdge {
    /// The other body of the joint.
    pub other: BodyHandle,
    /// The joint.
    pub joint: JointHandle,
}

/// A description of a body, used to create it.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct BodyDesc {
    body_type: BodyType,
    position: Vector,
    angle: Real,
    linear_velocity: Vector,
    angular_velocity: Real,
    linear_damping: Real,
    angular_damping: Real,
    allow_sleep: bool,
    awake: bool,
    fixed_rotation: bool,
    bullet: bool,
    active: bool,
    gravity_scale: Real,
}

impl Default for BodyDesc {
    fn default() -> Self {
        BodyDesc {
            body_type: BodyType::Static,
            position: Vector::zeros(),
            angle: 0.0,
            linear_velocity: Vector::zeros(),
            angular_velocity: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.0,
            allow_sleep: true,
            awake: true,
            fixed_rotation: false,
            bullet: false,
            active: true,
            gravity_scale: 1.0,
        }
    }
}

impl BodyDesc {
    /// A static body description at the origin.
    pub fn new() -> Self {
        Self::default()
    }

    /// A dynamic body description at `position`.
    pub fn dynamic(position: Vector) -> Self {
        BodyDesc {
            body_type: BodyType::Dynamic,
            position,
            ..Self::default()
        }
    }

    desc_setters!(
        body_type, set_body_type, body_type: BodyType
        position, set_position, position: Vector
        angle, set_angle, angle: Real
        linear_velocity, set_linear_velocity, linear_velocity: Vector
        angular_velocity, set_angular_velocity, angular_velocity: Real
        linear_damping, set_linear_damping, linear_damping: Real
        angular_damping, set_angular_damping, angular_damping: Real
        allow_sleep, set_allow_sleep, allow_sleep: bool
        awake, set_awake, awake: bool
        fixed_rotation, set_fixed_rotation, fixed_rotation: bool
        bullet, set_bullet, bullet: bool
        active, set_active, active: bool
        gravity_scale, set_gravity_scale, gravity_scale: Real
    );

    desc_getters!(
        get_body_type -> body_type: BodyType
        get_position -> position: Vector
        get_angle -> angle: Real
    );

    pub(crate) fn build(&self) -> Body {
        debug_assert!(self.position.x.is_finite() && self.position.y.is_finite());
        debug_assert!(self.angle.is_finite());
        debug_assert!(self.angular_damping >= 0.0 && self.linear_damping >= 0.0);

        let mut flags = BodyFlags::empty();
        flags.set(BodyFlags::BULLET, self.bullet);
        flags.set(BodyFlags::FIXED_ROTATION, self.fixed_rotation);
        flags.set(BodyFlags::AUTO_SLEEP, self.allow_sleep);
        flags.set(BodyFlags::AWAKE, self.awake);
        flags.set(BodyFlags::ACTIVE, self.active);

        let xf = math::isometry(self.position, self.angle);
        let sweep = Sweep {
            local_center: Vector::zeros(),
            c0: self.position,
            c: self.position,
            a0: self.angle,
            a: self.angle,
            alpha0: 0.0,
        };

        let (mass, inv_mass) = if self.body_type == BodyType::Dynamic {
            (1.0, 1.0)
        } else {
            (0.0, 0.0)
        };

        Body {
            body_type: self.body_type,
            flags,
            island_index: 0,
            xf,
            xf0: xf,
            sweep,
            linear_velocity: self.linear_velocity,
            angular_velocity: self.angular_velocity,
            force: Vector::zeros(),
            torque: 0.0,
            mass,
            inv_mass,
            inertia: 0.0,
            inv_inertia: 0.0,
            linear_damping: self.linear_damping,
            angular_damping: self.angular_damping,
            gravity_scale: self.gravity_scale,
            sleep_time: 0.0,
            fixtures: Vec::new(),
            joint_edges: Vec::new(),
            contact_edges: Vec::new(),
            user_data: None,
        }
    }
}

/// A rigid body.
///
/// Structural changes (type, transform, mass, activity, fixtures) go through the `World`
/// so that contacts and broad-phase proxies stay consistent.
pub struct Body {
    pub(crate) body_type: BodyType,
    pub(crate) flags: BodyFlags,
    pub(crate) island_index: usize,
    // Body origin transform.
    pub(crate) xf: Isometry,
    // Transform at the beginning of the last discrete step.
    pub(crate) xf0: Isometry,
    pub(crate) sweep: Sweep,
    pub(crate) linear_velocity: Vector,
    pub(crate) angular_velocity: Real,
    pub(crate) force: Vector,
    pub(crate) torque: Real,
    pub(crate) mass: Real,
    pub(crate) inv_mass: Real,
    // Rotational inertia about the center of mass.
    pub(crate) inertia: Real,
    pub(crate) inv_inertia: Real,
    pub(crate) linear_damping: Real,
    pub(crate) angular_damping: Real,
    pub(crate) gravity_scale: Real,
    pub(crate) sleep_time: Real,
    pub(crate) fixtures: Vec<FixtureHandle>,
    pub(crate) joint_edges: Vec<JointEdge>,
    pub(crate) contact_edges: Vec<ContactEdge>,
    user_data: Option<Box<dyn UserData>>,
}

impl Body {
    /// The simulation type of this body.
    #[inline]
    pub fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// Is this body dynamic?
    #[inline]
    pub fn is_dynamic(&self) -> bool {
        self.body_type == BodyType::Dynamic
    }

    /// Is this body static?
    #[inline]
    pub fn is_static(&self) -> bool {
        self.body_type == BodyType::Static
    }

    /// The transform of the body origin.
    #[inline]
    pub fn transform(&self) -> &Isometry {
        &self.xf
    }

    /// The world position of the body origin.
    #[inline]
    pub fn position(&self) -> Vector {
        self.xf.translation.vector
    }

    /// The current world rotation angle in radians.
    #[inline]
    pub fn angle(&self) -> Real {
        self.sweep.a
    }

    /// The world position of the center of mass.
    #[inline]
    pub fn world_center(&self) -> Vector {
        self.sweep.c
    }

    /// The local position of the center of mass.
    #[inline]
    pub fn local_center(&self) -> Vector {
        self.sweep.local_center
    }

    /// The motion of the center of mass during the current step.
    #[inline]
    pub fn sweep(&self) -> &Sweep {
        &self.sweep
    }

    /// The linear velocity of the center of mass.
    #[inline]
    pub fn linear_velocity(&self) -> Vector {
        self.linear_velocity
    }

    /// Sets the linear velocity of the center of mass. Ignored on static bodies.
    pub fn set_linear_velocity(&mut self, v: Vector) {
        if self.body_type == BodyType::Static {
            return;
        }

        if v.dot(&v) > 0.0 {
            self.set_awake(true);
        }

        self.linear_velocity = v;
    }

    /// The angular velocity in radians per second.
    #[inline]
    pub fn angular_velocity(&self) -> Real {
        self.angular_velocity
    }

    /// Sets the angular velocity. Ignored on static bodies.
    pub fn set_angular_velocity(&mut self, w: Real) {
        if self.body_type == BodyType::Static {
            return;
        }

        if w * w > 0.0 {
            self.set_awake(true);
        }

        self.angular_velocity = w;
    }

    /// The force accumulated since the forces were last cleared.
    #[inline]
    pub fn force(&self) -> Vector {
        self.force
    }

    /// The torque accumulated since the forces were last cleared.
    #[inline]
    pub fn torque(&self) -> Real {
        self.torque
    }

    /// Applies a force at a world point.
    ///
    /// If the force is not applied at the center of mass, it also generates a torque. Forces
    /// on non-dynamic bodies are ignored. A sleeping body accumulates the force only if
    /// `wake` is `true`, in which case it is woken up first.
    pub fn apply_force(&mut self, force: &Vector, point: &Vector, wake: bool) {
        if !self.accepts_forces(wake) {
            return;
        }

        self.force += force;
        self.torque += math::cross(&(point - self.sweep.c), force);
    }

    /// Applies a force at the center of mass.
    pub fn apply_force_to_center(&mut self, force: &Vector, wake: bool) {
        if !self.accepts_forces(wake) {
            return;
        }

        self.force += force;
    }

    /// Applies a torque. It affects the angular velocity without the linear velocity.
    pub fn apply_torque(&mut self, torque: Real, wake: bool) {
        if !self.accepts_forces(wake) {
            return;
        }

        self.torque += torque;
    }

    /// Applies an impulse at a world point, immediately modifying the velocity.
    pub fn apply_linear_impulse(&mut self, impulse: &Vector, point: &Vector, wake: bool) {
        if !self.accepts_forces(wake) {
            return;
        }

        self.linear_velocity += *impulse * self.inv_mass;
        self.angular_velocity +=
            self.inv_inertia * math::cross(&(point - self.sweep.c), impulse);
    }

    /// Applies an angular impulse, immediately modifying the angular velocity.
    pub fn apply_angular_impulse(&mut self, impulse: Real, wake: bool) {
        if !self.accepts_forces(wake) {
            return;
        }

        self.angular_velocity += self.inv_inertia * impulse;
    }

    fn accepts_forces(&mut self, wake: bool) -> bool {
        if self.body_type != BodyType::Dynamic {
            return false;
        }

        if wake && !self.is_awake() {
            self.set_awake(true);
        }

        self.is_awake()
    }

    /// The total mass of this body.
    #[inline]
    pub fn mass(&self) -> Real {
        self.mass
    }

    /// The rotational inertia of this body about its origin.
    #[inline]
    pub fn inertia(&self) -> Real {
        self.inertia + self.mass * self.sweep.local_center.norm_squared()
    }

    /// The mass data of this body, with the inertia expressed about the body origin.
    pub fn mass_data(&self) -> MassData {
        MassData {
            mass: self.mass,
            center: self.sweep.local_center,
            inertia: self.inertia(),
        }
    }

    /// The world coordinates of a point given in the body frame.
    #[inline]
    pub fn world_point(&self, local_point: &Vector) -> Vector {
        math::transform(&self.xf, local_point)
    }

    /// The world coordinates of a vector given in the body frame.
    #[inline]
    pub fn world_vector(&self, local_vector: &Vector) -> Vector {
        self.xf.rotation * *local_vector
    }

    /// The body-frame coordinates of a world point.
    #[inline]
    pub fn local_point(&self, world_point: &Vector) -> Vector {
        math::inverse_transform(&self.xf, world_point)
    }

    /// The body-frame coordinates of a world vector.
    #[inline]
    pub fn local_vector(&self, world_vector: &Vector) -> Vector {
        self.xf.rotation.inverse() * *world_vector
    }

    /// The world velocity of a world point attached to this body.
    #[inline]
    pub fn linear_velocity_from_world_point(&self, world_point: &Vector) -> Vector {
        self.linear_velocity
            + math::cross_sv(self.angular_velocity, &(world_point - self.sweep.c))
    }

    /// The world velocity of a point given in the body frame.
    #[inline]
    pub fn linear_velocity_from_local_point(&self, local_point: &Vector) -> Vector {
        self.linear_velocity_from_world_point(&self.world_point(local_point))
    }

    /// The linear damping coefficient.
    #[inline]
    pub fn linear_damping(&self) -> Real {
        self.linear_damping
    }

    /// Sets the linear damping coefficient.
    #[inline]
    pub fn set_linear_damping(&mut self, damping: Real) {
        self.linear_damping = damping;
    }

    /// The angular damping coefficient.
    #[inline]
    pub fn angular_damping(&self) -> Real {
        self.angular_damping
    }

    /// Sets the angular damping coefficient.
    #[inline]
    pub fn set_angular_damping(&mut self, damping: Real) {
        self.angular_damping = damping;
    }

    /// The scale applied to the world gravity for this body.
    #[inline]
    pub fn gravity_scale(&self) -> Real {
        self.gravity_scale
    }

    /// Sets the scale applied to the world gravity for this body.
    #[inline]
    pub fn set_gravity_scale(&mut self, scale: Real) {
        self.gravity_scale = scale;
    }

    /// Is this body treated like a bullet for continuous collision detection?
    #[inline]
    pub fn is_bullet(&self) -> bool {
        self.flags.contains(BodyFlags::BULLET)
    }

    /// Marks this body as a bullet, enabling continuous collision against other dynamic
    /// bodies.
    #[inline]
    pub fn set_bullet(&mut self, flag: bool) {
        self.flags.set(BodyFlags::BULLET, flag);
    }

    /// Is this body allowed to sleep?
    #[inline]
    pub fn is_sleeping_allowed(&self) -> bool {
        self.flags.contains(BodyFlags::AUTO_SLEEP)
    }

    /// Allows or prevents sleeping. Preventing it wakes the body up.
    pub fn set_sleeping_allowed(&mut self, flag: bool) {
        if flag {
            self.flags.insert(BodyFlags::AUTO_SLEEP);
        } else {
            self.flags.remove(BodyFlags::AUTO_SLEEP);
            self.set_awake(true);
        }
    }

    /// Is this body awake?
    #[inline]
    pub fn is_awake(&self) -> bool {
        self.flags.contains(BodyFlags::AWAKE)
    }

    /// Wakes up or puts to sleep this body.
    ///
    /// Putting a body to sleep zeroes its velocity and the accumulated forces.
    pub fn set_awake(&mut self, flag: bool) {
        if flag {
            if !self.is_awake() {
                self.flags.insert(BodyFlags::AWAKE);
                self.sleep_time = 0.0;
            }
        } else {
            self.flags.remove(BodyFlags::AWAKE);
            self.sleep_time = 0.0;
            self.linear_velocity = Vector::zeros();
            self.angular_velocity = 0.0;
            self.force = Vector::zeros();
            self.torque = 0.0;
        }
    }

    /// Is this body active, i.e., participating in collision and simulation?
    #[inline]
    pub fn is_active(&self) -> bool {
        self.flags.contains(BodyFlags::ACTIVE)
    }

    /// Does this body have a fixed rotation?
    #[inline]
    pub fn is_fixed_rotation(&self) -> bool {
        self.flags.contains(BodyFlags::FIXED_ROTATION)
    }

    /// Time this body spent below the sleep tolerances.
    #[inline]
    pub fn sleep_time(&self) -> Real {
        self.sleep_time
    }

    /// The fixtures attached to this body.
    #[inline]
    pub fn fixtures(&self) -> &[FixtureHandle] {
        &self.fixtures[..]
    }

    /// The joints attached to this body.
    #[inline]
    pub fn joint_edges(&self) -> &[JointEdge] {
        &self.joint_edges[..]
    }

    /// The contacts this body participates in.
    #[inline]
    pub fn contact_edges(&self) -> &[ContactEdge] {
        &self.contact_edges[..]
    }

    /// The user data attached to this body.
    #[inline]
    pub fn user_data(&self) -> Option<&dyn UserData> {
        self.user_data.as_deref()
    }

    /// Attaches user data to this body.
    #[inline]
    pub fn set_user_data(&mut self, data: Option<Box<dyn UserData>>) {
        self.user_data = data;
    }

    /// The transform at the beginning of the sweep.
    pub(crate) fn sweep_start_transform(&self) -> Isometry {
        self.sweep.transform_at(0.0)
    }

    /// Recomputes the origin transform from the end of the sweep.
    pub(crate) fn synchronize_transform(&mut self) {
        let q = Rotation::new(self.sweep.a);
        let p = self.sweep.c - q * self.sweep.local_center;
        self.xf = Isometry::from_parts(p.into(), q);
    }

    /// Advances the body to `alpha` within the current step, without moving the end of the
    /// sweep past the new start.
    pub(crate) fn advance(&mut self, alpha: Real) {
        self.sweep.advance(alpha);
        self.sweep.c = self.sweep.c0;
        self.sweep.a = self.sweep.a0;
        self.synchronize_transform();
    }

    pub(crate) fn set_transform_internal(&mut self, position: Vector, angle: Real) {
        self.xf = math::isometry(position, angle);
        self.sweep.c = math::transform(&self.xf, &self.sweep.local_center);
        self.sweep.a = angle;
        self.sweep.c0 = self.sweep.c;
        self.sweep.a0 = angle;
    }

    /// Can this body collide with `other`?
    ///
    /// At least one of them must be dynamic, and no joint between them may have disabled
    /// collisions.
    pub(crate) fn should_collide(
        &self,
        other_handle: BodyHandle,
        other: &Body,
        joints: &JointSet,
    ) -> bool {
        if self.body_type != BodyType::Dynamic && other.body_type != BodyType::Dynamic {
            return false;
        }

        !self.joint_edges.iter().any(|edge| {
            edge.other == other_handle
                && joints
                    .get(edge.joint)
                    .map_or(false, |joint| !joint.collide_connected())
        })
    }

    /// Recomputes the mass properties from the fixtures' densities and shapes.
    pub(crate) fn reset_mass_data(&mut self, fixtures: &FixtureSet) {
        self.mass = 0.0;
        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;
        self.sweep.local_center = Vector::zeros();

        // Static and kinematic bodies have zero mass.
        if self.body_type != BodyType::Dynamic {
            self.sweep.c0 = self.xf.translation.vector;
            self.sweep.c = self.sweep.c0;
            self.sweep.a0 = self.sweep.a;
            return;
        }

        // Accumulate mass over all fixtures.
        let mut local_center = Vector::zeros();
        let mut inertia = 0.0;

        for fixture in self.fixtures.iter().filter_map(|f| fixtures.get(*f)) {
            if fixture.density() == 0.0 {
                continue;
            }

            let data = fixture.mass_data();
            self.mass += data.mass;
            local_center += data.center * data.mass;
            inertia += data.inertia;
        }

        // Compute center of mass.
        if self.mass > 0.0 {
            self.inv_mass = 1.0 / self.mass;
            local_center *= self.inv_mass;
        } else {
            // Force all dynamic bodies to have a positive mass.
            self.mass = 1.0;
            self.inv_mass = 1.0;
        }

        if inertia > 0.0 && !self.is_fixed_rotation() {
            // Center the inertia about the center of mass.
            self.inertia = inertia - self.mass * local_center.norm_squared();
            debug_assert!(self.inertia > 0.0);
            self.inv_inertia = 1.0 / self.inertia;
        } else {
            self.inertia = 0.0;
            self.inv_inertia = 0.0;
        }

        self.move_center(local_center);
    }

    /// Overrides the mass properties. Ignored on non-dynamic bodies.
    pub(crate) fn set_mass_data_internal(&mut self, data: &MassData) {
        if self.body_type != BodyType::Dynamic {
            return;
        }

        self.inv_mass = 0.0;
        self.inertia = 0.0;
        self.inv_inertia = 0.0;

        self.mass = data.mass;
        if self.mass <= 0.0 {
            self.mass = 1.0;
        }

        self.inv_mass = 1.0 / self.mass;

        if data.inertia > 0.0 && !self.is_fixed_rotation() {
            self.inertia = data.inertia - self.mass * data.center.norm_squared();
            debug_assert!(self.inertia > 0.0);
            self.inv_inertia = 1.0 / self.inertia;
        }

        self.move_center(data.center);
    }

    // Moves the center of mass, keeping the velocity of the old center of mass.
    fn move_center(&mut self, local_center: Vector) {
        let old_center = self.sweep.c;
        self.sweep.local_center = local_center;
        self.sweep.c = math::transform(&self.xf, &local_center);
        self.sweep.c0 = self.sweep.c;

        // Update center of mass velocity.
        self.linear_velocity +=
            math::cross_sv(self.angular_velocity, &(self.sweep.c - old_center));
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn force_on_sleeping_body_respects_wake_flag() {
        let mut body = BodyDesc::dynamic(Vector::zeros()).build();
        body.set_awake(false);

        body.apply_force_to_center(&Vector::new(1.0, 0.0), false);
        assert!(!body.is_awake());
        assert_eq!(body.force(), Vector::zeros());

        body.apply_linear_impulse(&Vector::new(1.0, 0.0), &Vector::zeros(), false);
        assert_eq!(body.linear_velocity(), Vector::zeros());

        body.apply_force_to_center(&Vector::new(1.0, 0.0), true);
        assert!(body.is_awake());
        assert_eq!(body.force(), Vector::new(1.0, 0.0));
    }

    #[test]
    fn forces_on_static_bodies_are_ignored() {
        let mut body = BodyDesc::new().build();
        body.apply_force(&Vector::new(1.0, 0.0), &Vector::new(0.0, 1.0), true);
        body.apply_torque(1.0, true);

        assert_eq!(body.force(), Vector::zeros());
        assert_eq!(body.torque(), 0.0);
    }

    #[test]
    fn sleeping_zeroes_motion() {
        let mut body = BodyDesc::dynamic(Vector::zeros())
            .linear_velocity(Vector::new(1.0, 2.0))
            .angular_velocity(3.0)
            .build();
        body.apply_torque(2.0, true);
        body.set_awake(false);

        assert_eq!(body.linear_velocity(), Vector::zeros());
        assert_eq!(body.angular_velocity(), 0.0);
        assert_eq!(body.torque(), 0.0);
        assert_eq!(body.sleep_time(), 0.0);
    }

    #[test]
    fn set_mass_data_keeps_the_velocity_of_the_old_center() {
        let mut body = BodyDesc::dynamic(Vector::zeros()).angular_velocity(2.0).build();
        let data = MassData {
            mass: 2.0,
            center: Vector::new(1.0, 0.0),
            inertia: 3.0,
        };
        body.set_mass_data_internal(&data);

        assert!(relative_eq!(body.world_center(), Vector::new(1.0, 0.0)));
        // v += w x (c_new - c_old) = 2 x (1, 0) = (0, 2).
        assert!(relative_eq!(body.linear_velocity(), Vector::new(0.0, 2.0)));
        assert!(relative_eq!(body.inertia(), 3.0));
        assert!(relative_eq!(body.mass_data().inertia, 3.0));
    }
}
