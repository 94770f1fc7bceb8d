use crate::joint::joint_constraint::SolverBody;
use crate::joint::{JointConstraint, LimitState};
use crate::math::{self, Matrix, Matrix3d, Real, Rotation, Vector, Vector3d};
use crate::object::{Body, BodyHandle, BodySet};
use crate::settings::{ANGULAR_SLOP, LINEAR_SLOP};
use crate::solver::{SolverData, Velocity};

/// Description of a prismatic joint.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct PrismaticJointDesc {
    /// The first attached body.
    pub body_a: BodyHandle,
    /// The second attached body.
    pub body_b: BodyHandle,
    /// The anchor point relative to the origin of the first body.
    pub local_anchor_a: Vector,
    /// The anchor point relative to the origin of the second body.
    pub local_anchor_b: Vector,
    /// The translation axis, in the first body's frame.
    pub local_axis_a: Vector,
    /// The second body angle minus the first body angle in the reference state.
    pub reference_angle: Real,
    /// Enable the joint limit.
    pub enable_limit: bool,
    /// The lower translation limit.
    pub lower_translation: Real,
    /// The upper translation limit.
    pub upper_translation: Real,
    /// Enable the joint motor.
    pub enable_motor: bool,
    /// The maximum motor force, in N.
    pub max_motor_force: Real,
    /// The desired motor speed, in meters per second.
    pub motor_speed: Real,
    /// Can the attached bodies collide?
    pub collide_connected: bool,
}

impl PrismaticJointDesc {
    /// A prismatic joint sliding along `local_axis_a`.
    pub fn new(
        body_a: BodyHandle,
        body_b: BodyHandle,
        local_anchor_a: Vector,
        local_anchor_b: Vector,
        local_axis_a: Vector,
    ) -> Self {
        PrismaticJointDesc {
            body_a,
            body_b,
            local_anchor_a,
            local_anchor_b,
            local_axis_a,
            reference_angle: 0.0,
            enable_limit: false,
            lower_translation: 0.0,
            upper_translation: 0.0,
            enable_motor: false,
            max_motor_force: 0.0,
            motor_speed: 0.0,
            collide_connected: false,
        }
    }

    /// A prismatic joint through a world anchor along a world axis, using the current body
    /// poses as the reference state.
    pub fn at_world_anchor(
        handle_a: BodyHandle,
        body_a: &Body,
        handle_b: BodyHandle,
        body_b: &Body,
        anchor: &Vector,
        axis: &Vector,
    ) -> Self {
        let mut desc = Self::new(
            handle_a,
            handle_b,
            body_a.local_point(anchor),
            body_b.local_point(anchor),
            body_a.local_vector(axis),
        );
        desc.reference_angle = body_b.angle() - body_a.angle();
        desc
    }
}

/// Allows the relative translation of two bodies along an axis fixed in the first body.
/// Relative rotation is prevented.
#[derive(Clone, Debug)]
pub struct PrismaticJoint {
    pub(crate) local_anchor_a: Vector,
    pub(crate) local_anchor_b: Vector,
    pub(crate) local_x_axis_a: Vector,
    local_y_axis_a: Vector,
    reference_angle: Real,
    enable_limit: bool,
    lower_translation: Real,
    upper_translation: Real,
    enable_motor: bool,
    max_motor_force: Real,
    motor_speed: Real,

    impulse: Vector3d,
    motor_impulse: Real,
    limit_state: LimitState,

    sa: SolverBody,
    sb: SolverBody,
    axis: Vector,
    perp: Vector,
    s1: Real,
    s2: Real,
    a1: Real,
    a2: Real,
    k: Matrix3d,
    motor_mass: Real,
}

impl PrismaticJoint {
    pub(crate) fn new(desc: &PrismaticJointDesc) -> Self {
        let mut local_x_axis_a = desc.local_axis_a;
        let _ = math::normalize(&mut local_x_axis_a);

        PrismaticJoint {
            local_anchor_a: desc.local_anchor_a,
            local_anchor_b: desc.local_anchor_b,
            local_x_axis_a,
            local_y_axis_a: math::cross_sv(1.0, &local_x_axis_a),
            reference_angle: desc.reference_angle,
            enable_limit: desc.enable_limit,
            lower_translation: desc.lower_translation,
            upper_translation: desc.upper_translation,
            enable_motor: desc.enable_motor,
            max_motor_force: desc.max_motor_force,
            motor_speed: desc.motor_speed,
            impulse: Vector3d::zeros(),
            motor_impulse: 0.0,
            limit_state: LimitState::Inactive,
            sa: SolverBody::default(),
            sb: SolverBody::default(),
            axis: Vector::zeros(),
            perp: Vector::zeros(),
            s1: 0.0,
            s2: 0.0,
            a1: 0.0,
            a2: 0.0,
            k: Matrix3d::zeros(),
            motor_mass: 0.0,
        }
    }

    /// The local anchor point relative to the first body's origin.
    pub fn local_anchor_a(&self) -> Vector {
        self.local_anchor_a
    }

    /// The local anchor point relative to the second body's origin.
    pub fn local_anchor_b(&self) -> Vector {
        self.local_anchor_b
    }

    /// The normalized translation axis, in the first body's frame.
    pub fn local_axis_a(&self) -> Vector {
        self.local_x_axis_a
    }

    /// The reference angle.
    pub fn reference_angle(&self) -> Real {
        self.reference_angle
    }

    /// The current joint translation.
    pub fn joint_translation(&self, body_a: &Body, body_b: &Body) -> Real {
        let p_a = body_a.world_point(&self.local_anchor_a);
        let p_b = body_b.world_point(&self.local_anchor_b);
        let axis = body_a.world_vector(&self.local_x_axis_a);
        (p_b - p_a).dot(&axis)
    }

    /// Is the joint limit enabled?
    pub fn is_limit_enabled(&self) -> bool {
        self.enable_limit
    }

    /// Enables or disables the joint limit.
    pub fn enable_limit(&mut self, flag: bool) {
        if flag != self.enable_limit {
            self.enable_limit = flag;
            self.impulse.z = 0.0;
        }
    }

    /// The lower translation limit.
    pub fn lower_limit(&self) -> Real {
        self.lower_translation
    }

    /// The upper translation limit.
    pub fn upper_limit(&self) -> Real {
        self.upper_translation
    }

    /// Sets the translation limits.
    pub fn set_limits(&mut self, lower: Real, upper: Real) {
        debug_assert!(lower <= upper);

        if lower != self.lower_translation || upper != self.upper_translation {
            self.lower_translation = lower;
            self.upper_translation = upper;
            self.impulse.z = 0.0;
        }
    }

    /// The state of the limit during the last step.
    pub fn limit_state(&self) -> LimitState {
        self.limit_state
    }

    /// Is the joint motor enabled?
    pub fn is_motor_enabled(&self) -> bool {
        self.enable_motor
    }

    /// Enables or disables the joint motor.
    pub fn enable_motor(&mut self, flag: bool) {
        self.enable_motor = flag;
    }

    /// The motor speed, in meters per second.
    pub fn motor_speed(&self) -> Real {
        self.motor_speed
    }

    /// Sets the motor speed, in meters per second.
    pub fn set_motor_speed(&mut self, speed: Real) {
        self.motor_speed = speed;
    }

    /// The maximum motor force, in N.
    pub fn max_motor_force(&self) -> Real {
        self.max_motor_force
    }

    /// Sets the maximum motor force, in N.
    pub fn set_max_motor_force(&mut self, force: Real) {
        self.max_motor_force = force;
    }

    /// The current motor force given the inverse time step, in N.
    pub fn motor_force(&self, inv_dt: Real) -> Real {
        inv_dt * self.motor_impulse
    }
}

/// The effective mass matrix of the prismatic constraint. Rows are ordered perpendicular,
/// angular, then axial.
fn prismatic_k(
    (m_a, m_b, i_a, i_b): (Real, Real, Real, Real),
    (s1, s2, a1, a2): (Real, Real, Real, Real),
) -> Matrix3d {
    let k11 = m_a + m_b + i_a * s1 * s1 + i_b * s2 * s2;
    let k12 = i_a * s1 + i_b * s2;
    let k13 = i_a * s1 * a1 + i_b * s2 * a2;
    let mut k22 = i_a + i_b;
    if k22 == 0.0 {
        // For bodies with fixed rotation.
        k22 = 1.0;
    }
    let k23 = i_a * a1 + i_b * a2;
    let k33 = m_a + m_b + i_a * a1 * a1 + i_b * a2 * a2;

    Matrix3d::new(
        k11, k12, k13, //
        k12, k22, k23, //
        k13, k23, k33,
    )
}

impl JointConstraint for PrismaticJoint {
    fn init_velocity_constraints(
        &mut self,
        body_a: &Body,
        body_b: &Body,
        _: &BodySet,
        data: &mut SolverData,
    ) {
        self.sa = SolverBody::new(body_a);
        self.sb = SolverBody::new(body_b);
        let (sa, sb) = (self.sa, self.sb);

        let pos_a = data.positions[sa.index];
        let pos_b = data.positions[sb.index];
        let Velocity { v: mut v_a, w: mut w_a } = data.velocities[sa.index];
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[sb.index];

        let q_a = Rotation::new(pos_a.a);
        let q_b = Rotation::new(pos_b.a);

        // Compute the effective masses.
        let r_a = q_a * (self.local_anchor_a - sa.local_center);
        let r_b = q_b * (self.local_anchor_b - sb.local_center);
        let d = (pos_b.c - pos_a.c) + r_b - r_a;

        let (m_a, m_b, i_a, i_b) = (sa.inv_mass, sb.inv_mass, sa.inv_i, sb.inv_i);

        // Compute the motor Jacobian and effective mass.
        self.axis = q_a * self.local_x_axis_a;
        self.a1 = math::cross(&(d + r_a), &self.axis);
        self.a2 = math::cross(&r_b, &self.axis);

        self.motor_mass = m_a + m_b + i_a * self.a1 * self.a1 + i_b * self.a2 * self.a2;
        if self.motor_mass > 0.0 {
            self.motor_mass = 1.0 / self.motor_mass;
        }

        // Prismatic constraint.
        self.perp = q_a * self.local_y_axis_a;
        self.s1 = math::cross(&(d + r_a), &self.perp);
        self.s2 = math::cross(&r_b, &self.perp);

        self.k = prismatic_k((m_a, m_b, i_a, i_b), (self.s1, self.s2, self.a1, self.a2));

        // Compute the motor and limit terms.
        if self.enable_limit {
            let joint_translation = self.axis.dot(&d);

            if (self.upper_translation - self.lower_translation).abs() < 2.0 * LINEAR_SLOP {
                self.limit_state = LimitState::Equal;
            } else if joint_translation <= self.lower_translation {
                if self.limit_state != LimitState::AtLower {
                    self.limit_state = LimitState::AtLower;
                    self.impulse.z = 0.0;
                }
            } else if joint_translation >= self.upper_translation {
                if self.limit_state != LimitState::AtUpper {
                    self.limit_state = LimitState::AtUpper;
                    self.impulse.z = 0.0;
                }
            } else {
                self.limit_state = LimitState::Inactive;
                self.impulse.z = 0.0;
            }
        } else {
            self.limit_state = LimitState::Inactive;
            self.impulse.z = 0.0;
        }

        if !self.enable_motor {
            self.motor_impulse = 0.0;
        }

        if data.step.warm_starting {
            // Account for variable time step.
            self.impulse *= data.step.dt_ratio;
            self.motor_impulse *= data.step.dt_ratio;

            let axial = self.motor_impulse + self.impulse.z;
            let p = self.perp * self.impulse.x + self.axis * axial;
            let l_a = self.impulse.x * self.s1 + self.impulse.y + axial * self.a1;
            let l_b = self.impulse.x * self.s2 + self.impulse.y + axial * self.a2;

            v_a -= p * m_a;
            w_a -= i_a * l_a;
            v_b += p * m_b;
            w_b += i_b * l_b;
        } else {
            self.impulse = Vector3d::zeros();
            self.motor_impulse = 0.0;
        }

        data.velocities[sa.index] = Velocity { v: v_a, w: w_a };
        data.velocities[sb.index] = Velocity { v: v_b, w: w_b };
    }

    fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let (sa, sb) = (self.sa, self.sb);
        let Velocity { v: mut v_a, w: mut w_a } = data.velocities[sa.index];
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[sb.index];

        let (m_a, m_b, i_a, i_b) = (sa.inv_mass, sb.inv_mass, sa.inv_i, sb.inv_i);

        // Solve the linear motor constraint.
        if self.enable_motor && self.limit_state != LimitState::Equal {
            let cdot = self.axis.dot(&(v_b - v_a)) + self.a2 * w_b - self.a1 * w_a;
            let mut impulse = self.motor_mass * (self.motor_speed - cdot);
            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_force;
            self.motor_impulse = (old_impulse + impulse).max(-max_impulse).min(max_impulse);
            impulse = self.motor_impulse - old_impulse;

            let p = self.axis * impulse;
            v_a -= p * m_a;
            w_a -= i_a * impulse * self.a1;
            v_b += p * m_b;
            w_b += i_b * impulse * self.a2;
        }

        let cdot1 = Vector::new(
            self.perp.dot(&(v_b - v_a)) + self.s2 * w_b - self.s1 * w_a,
            w_b - w_a,
        );

        if self.enable_limit && self.limit_state != LimitState::Inactive {
            // Solve the prismatic and limit constraint in block form.
            let cdot2 = self.axis.dot(&(v_b - v_a)) + self.a2 * w_b - self.a1 * w_a;
            let cdot = Vector3d::new(cdot1.x, cdot1.y, cdot2);

            let f1 = self.impulse;
            let df = math::solve33(&self.k, &-cdot);
            self.impulse += df;

            if self.limit_state == LimitState::AtLower {
                self.impulse.z = self.impulse.z.max(0.0);
            } else if self.limit_state == LimitState::AtUpper {
                self.impulse.z = self.impulse.z.min(0.0);
            }

            // f2(1:2) = invK(1:2,1:2) * (-Cdot(1:2) - K(1:2,3) * (f2(3) - f1(3))) + f1(1:2)
            let b = -cdot1 - Vector::new(self.k.m13, self.k.m23) * (self.impulse.z - f1.z);
            let f2r = math::solve33_block22(&self.k, &b) + Vector::new(f1.x, f1.y);
            self.impulse.x = f2r.x;
            self.impulse.y = f2r.y;

            let df = self.impulse - f1;

            let p = self.perp * df.x + self.axis * df.z;
            let l_a = df.x * self.s1 + df.y + df.z * self.a1;
            let l_b = df.x * self.s2 + df.y + df.z * self.a2;

            v_a -= p * m_a;
            w_a -= i_a * l_a;
            v_b += p * m_b;
            w_b += i_b * l_b;
        } else {
            // Limit is inactive, just solve the prismatic constraint in block form.
            let df = math::solve33_block22(&self.k, &-cdot1);
            self.impulse.x += df.x;
            self.impulse.y += df.y;

            let p = self.perp * df.x;
            let l_a = df.x * self.s1 + df.y;
            let l_b = df.x * self.s2 + df.y;

            v_a -= p * m_a;
            w_a -= i_a * l_a;
            v_b += p * m_b;
            w_b += i_b * l_b;
        }

        data.velocities[sa.index] = Velocity { v: v_a, w: w_a };
        data.velocities[sb.index] = Velocity { v: v_b, w: w_b };
    }

    fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let (sa, sb) = (self.sa, self.sb);
        let mut pos_a = data.positions[sa.index];
        let mut pos_b = data.positions[sb.index];

        let (m_a, m_b, i_a, i_b) = (sa.inv_mass, sb.inv_mass, sa.inv_i, sb.inv_i);
        let max_correction = data.params.max_linear_correction;

        let q_a = Rotation::new(pos_a.a);
        let q_b = Rotation::new(pos_b.a);

        // Compute fresh Jacobians.
        let r_a = q_a * (self.local_anchor_a - sa.local_center);
        let r_b = q_b * (self.local_anchor_b - sb.local_center);
        let d = pos_b.c + r_b - pos_a.c - r_a;

        let axis = q_a * self.local_x_axis_a;
        let a1 = math::cross(&(d + r_a), &axis);
        let a2 = math::cross(&r_b, &axis);
        let perp = q_a * self.local_y_axis_a;

        let s1 = math::cross(&(d + r_a), &perp);
        let s2 = math::cross(&r_b, &perp);

        let c1 = Vector::new(perp.dot(&d), pos_b.a - pos_a.a - self.reference_angle);

        let mut linear_error = c1.x.abs();
        let angular_error = c1.y.abs();

        let mut active = false;
        let mut c2 = 0.0;
        if self.enable_limit {
            let translation = axis.dot(&d);
            if (self.upper_translation - self.lower_translation).abs() < 2.0 * LINEAR_SLOP {
                c2 = (translation - self.lower_translation)
                    .max(-max_correction)
                    .min(max_correction);
                linear_error = linear_error.max(translation.abs());
                active = true;
            } else if translation <= self.lower_translation {
                // Prevent large linear corrections and allow some slop.
                c2 = (translation - self.lower_translation + LINEAR_SLOP)
                    .max(-max_correction)
                    .min(0.0);
                linear_error = linear_error.max(self.lower_translation - translation);
                active = true;
            } else if translation >= self.upper_translation {
                c2 = (translation - self.upper_translation - LINEAR_SLOP)
                    .max(0.0)
                    .min(max_correction);
                linear_error = linear_error.max(translation - self.upper_translation);
                active = true;
            }
        }

        let k = prismatic_k((m_a, m_b, i_a, i_b), (s1, s2, a1, a2));

        let impulse = if active {
            let c = Vector3d::new(c1.x, c1.y, c2);
            math::solve33(&k, &-c)
        } else {
            let k22 = Matrix::new(k.m11, k.m12, k.m21, k.m22);
            let impulse1 = math::solve22(&k22, &-c1);
            Vector3d::new(impulse1.x, impulse1.y, 0.0)
        };

        let p = perp * impulse.x + axis * impulse.z;
        let l_a = impulse.x * s1 + impulse.y + impulse.z * a1;
        let l_b = impulse.x * s2 + impulse.y + impulse.z * a2;

        pos_a.c -= p * m_a;
        pos_a.a -= i_a * l_a;
        pos_b.c += p * m_b;
        pos_b.a += i_b * l_b;

        data.positions[sa.index] = pos_a;
        data.positions[sb.index] = pos_b;

        linear_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }

    fn anchor_a(&self, body_a: &Body) -> Vector {
        body_a.world_point(&self.local_anchor_a)
    }

    fn anchor_b(&self, body_b: &Body) -> Vector {
        body_b.world_point(&self.local_anchor_b)
    }

    fn reaction_force(&self, inv_dt: Real) -> Vector {
        (self.perp * self.impulse.x + self.axis * (self.motor_impulse + self.impulse.z)) * inv_dt
    }

    fn reaction_torque(&self, inv_dt: Real) -> Real {
        inv_dt * self.impulse.y
    }
}
