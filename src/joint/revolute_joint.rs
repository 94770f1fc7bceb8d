use crate::joint::joint_constraint::SolverBody;
use crate::joint::{JointConstraint, LimitState};
use crate::math::{self, Matrix, Matrix3d, Real, Rotation, Vector, Vector3d};
use crate::object::{Body, BodyHandle, BodySet};
use crate::settings::{ANGULAR_SLOP, LINEAR_SLOP};
use crate::solver::{SolverData, Velocity};

/// Description of a revolute joint.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct RevoluteJointDesc {
    /// The first attached body.
    pub body_a: BodyHandle,
    /// The second attached body.
    pub body_b: BodyHandle,
    /// The anchor point relative to the origin of the first body.
    pub local_anchor_a: Vector,
    /// The anchor point relative to the origin of the second body.
    pub local_anchor_b: Vector,
    /// The second body angle minus the first body angle in the reference state.
    pub reference_angle: Real,
    /// Enable the joint limit.
    pub enable_limit: bool,
    /// The lower angle of the joint limit, in radians.
    pub lower_angle: Real,
    /// The upper angle of the joint limit, in radians.
    pub upper_angle: Real,
    /// Enable the joint motor.
    pub enable_motor: bool,
    /// The desired motor speed, in radians per second.
    pub motor_speed: Real,
    /// The maximum motor torque used to achieve the desired motor speed, in N*m.
    pub max_motor_torque: Real,
    /// Can the attached bodies collide?
    pub collide_connected: bool,
}

impl RevoluteJointDesc {
    /// A revolute joint between two local anchors.
    pub fn new(
        body_a: BodyHandle,
        body_b: BodyHandle,
        local_anchor_a: Vector,
        local_anchor_b: Vector,
    ) -> Self {
        RevoluteJointDesc {
            body_a,
            body_b,
            local_anchor_a,
            local_anchor_b,
            reference_angle: 0.0,
            enable_limit: false,
            lower_angle: 0.0,
            upper_angle: 0.0,
            enable_motor: false,
            motor_speed: 0.0,
            max_motor_torque: 0.0,
            collide_connected: false,
        }
    }

    /// A revolute joint around a world anchor, using the current body poses as the
    /// reference state.
    pub fn at_world_anchor(
        handle_a: BodyHandle,
        body_a: &Body,
        handle_b: BodyHandle,
        body_b: &Body,
        anchor: &Vector,
    ) -> Self {
        let mut desc = Self::new(
            handle_a,
            handle_b,
            body_a.local_point(anchor),
            body_b.local_point(anchor),
        );
        desc.reference_angle = body_b.angle() - body_a.angle();
        desc
    }
}

/// A hinge that lets two bodies rotate relative to each other around a shared point.
///
/// The relative rotation can be limited and driven by a motor.
#[derive(Clone, Debug)]
pub struct RevoluteJoint {
    pub(crate) local_anchor_a: Vector,
    pub(crate) local_anchor_b: Vector,
    pub(crate) reference_angle: Real,
    enable_limit: bool,
    lower_angle: Real,
    upper_angle: Real,
    enable_motor: bool,
    motor_speed: Real,
    max_motor_torque: Real,

    impulse: Vector3d,
    motor_impulse: Real,
    limit_state: LimitState,

    sa: SolverBody,
    sb: SolverBody,
    r_a: Vector,
    r_b: Vector,
    // Effective mass for the point-to-point constraint.
    mass: Matrix3d,
    // Effective mass for the motor and limit constraint.
    motor_mass: Real,
}

impl RevoluteJoint {
    pub(crate) fn new(desc: &RevoluteJointDesc) -> Self {
        RevoluteJoint {
            local_anchor_a: desc.local_anchor_a,
            local_anchor_b: desc.local_anchor_b,
            reference_angle: desc.reference_angle,
            enable_limit: desc.enable_limit,
            lower_angle: desc.lower_angle,
            upper_angle: desc.upper_angle,
            enable_motor: desc.enable_motor,
            motor_speed: desc.motor_speed,
            max_motor_torque: desc.max_motor_torque,
            impulse: Vector3d::zeros(),
            motor_impulse: 0.0,
            limit_state: LimitState::Inactive,
            sa: SolverBody::default(),
            sb: SolverBody::default(),
            r_a: Vector::zeros(),
            r_b: Vector::zeros(),
            mass: Matrix3d::zeros(),
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

    /// The reference angle.
    pub fn reference_angle(&self) -> Real {
        self.reference_angle
    }

    /// The current joint angle, in radians.
    pub fn joint_angle(&self, body_a: &Body, body_b: &Body) -> Real {
        body_b.sweep.a - body_a.sweep.a - self.reference_angle
    }

    /// The current joint angular speed, in radians per second.
    pub fn joint_speed(&self, body_a: &Body, body_b: &Body) -> Real {
        body_b.angular_velocity - body_a.angular_velocity
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

    /// The lower joint limit, in radians.
    pub fn lower_limit(&self) -> Real {
        self.lower_angle
    }

    /// The upper joint limit, in radians.
    pub fn upper_limit(&self) -> Real {
        self.upper_angle
    }

    /// Sets the joint limits, in radians.
    pub fn set_limits(&mut self, lower: Real, upper: Real) {
        debug_assert!(lower <= upper);

        if lower != self.lower_angle || upper != self.upper_angle {
            self.impulse.z = 0.0;
            self.lower_angle = lower;
            self.upper_angle = upper;
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

    /// The motor speed, in radians per second.
    pub fn motor_speed(&self) -> Real {
        self.motor_speed
    }

    /// Sets the motor speed, in radians per second.
    pub fn set_motor_speed(&mut self, speed: Real) {
        self.motor_speed = speed;
    }

    /// The maximum motor torque, in N*m.
    pub fn max_motor_torque(&self) -> Real {
        self.max_motor_torque
    }

    /// Sets the maximum motor torque, in N*m.
    pub fn set_max_motor_torque(&mut self, torque: Real) {
        self.max_motor_torque = torque;
    }

    /// The current motor torque given the inverse time step, in N*m.
    pub fn motor_torque(&self, inv_dt: Real) -> Real {
        inv_dt * self.motor_impulse
    }
}

impl JointConstraint for RevoluteJoint {
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

        let a_a = data.positions[sa.index].a;
        let a_b = data.positions[sb.index].a;
        let Velocity { v: mut v_a, w: mut w_a } = data.velocities[sa.index];
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[sb.index];

        let q_a = Rotation::new(a_a);
        let q_b = Rotation::new(a_b);

        self.r_a = q_a * (self.local_anchor_a - sa.local_center);
        self.r_b = q_b * (self.local_anchor_b - sb.local_center);

        // J = [-I -r1_skew I r2_skew]
        //     [ 0       -1 0       1]
        // r_skew = [-ry; rx]
        let (m_a, m_b, i_a, i_b) = (sa.inv_mass, sb.inv_mass, sa.inv_i, sb.inv_i);
        let (r_a, r_b) = (self.r_a, self.r_b);
        let fixed_rotation = i_a + i_b == 0.0;

        let ex_x = m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b;
        let ey_x = -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b;
        let ez_x = -r_a.y * i_a - r_b.y * i_b;
        let ey_y = m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b;
        let ez_y = r_a.x * i_a + r_b.x * i_b;
        let ez_z = i_a + i_b;

        self.mass = Matrix3d::new(
            ex_x, ey_x, ez_x, //
            ey_x, ey_y, ez_y, //
            ez_x, ez_y, ez_z,
        );

        self.motor_mass = i_a + i_b;
        if self.motor_mass > 0.0 {
            self.motor_mass = 1.0 / self.motor_mass;
        }

        if !self.enable_motor || fixed_rotation {
            self.motor_impulse = 0.0;
        }

        if self.enable_limit && !fixed_rotation {
            let joint_angle = a_b - a_a - self.reference_angle;

            if (self.upper_angle - self.lower_angle).abs() < 2.0 * ANGULAR_SLOP {
                self.limit_state = LimitState::Equal;
            } else if joint_angle <= self.lower_angle {
                if self.limit_state != LimitState::AtLower {
                    self.impulse.z = 0.0;
                }
                self.limit_state = LimitState::AtLower;
            } else if joint_angle >= self.upper_angle {
                if self.limit_state != LimitState::AtUpper {
                    self.impulse.z = 0.0;
                }
                self.limit_state = LimitState::AtUpper;
            } else {
                self.limit_state = LimitState::Inactive;
                self.impulse.z = 0.0;
            }
        } else {
            self.limit_state = LimitState::Inactive;
        }

        if data.step.warm_starting {
            // Scale impulses to support a variable time step.
            self.impulse *= data.step.dt_ratio;
            self.motor_impulse *= data.step.dt_ratio;

            let p = Vector::new(self.impulse.x, self.impulse.y);

            v_a -= p * m_a;
            w_a -= i_a * (math::cross(&r_a, &p) + self.motor_impulse + self.impulse.z);
            v_b += p * m_b;
            w_b += i_b * (math::cross(&r_b, &p) + self.motor_impulse + self.impulse.z);
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
        let (r_a, r_b) = (self.r_a, self.r_b);
        let fixed_rotation = i_a + i_b == 0.0;

        // Solve the motor constraint.
        if self.enable_motor && self.limit_state != LimitState::Equal && !fixed_rotation {
            let cdot = w_b - w_a - self.motor_speed;
            let mut impulse = -self.motor_mass * cdot;
            let old_impulse = self.motor_impulse;
            let max_impulse = data.step.dt * self.max_motor_torque;
            self.motor_impulse = (old_impulse + impulse).max(-max_impulse).min(max_impulse);
            impulse = self.motor_impulse - old_impulse;

            w_a -= i_a * impulse;
            w_b += i_b * impulse;
        }

        // Solve the limit constraint.
        if self.enable_limit && self.limit_state != LimitState::Inactive && !fixed_rotation {
            let cdot1 = v_b + math::cross_sv(w_b, &r_b) - v_a - math::cross_sv(w_a, &r_a);
            let cdot2 = w_b - w_a;
            let cdot = Vector3d::new(cdot1.x, cdot1.y, cdot2);

            let mut impulse = -math::solve33(&self.mass, &cdot);

            match self.limit_state {
                LimitState::Equal => self.impulse += impulse,
                LimitState::AtLower | LimitState::AtUpper => {
                    let new_impulse = self.impulse.z + impulse.z;
                    let violates = if self.limit_state == LimitState::AtLower {
                        new_impulse < 0.0
                    } else {
                        new_impulse > 0.0
                    };

                    if violates {
                        let rhs = -cdot1
                            + Vector::new(self.mass.m13, self.mass.m23) * self.impulse.z;
                        let reduced = math::solve33_block22(&self.mass, &rhs);
                        impulse.x = reduced.x;
                        impulse.y = reduced.y;
                        impulse.z = -self.impulse.z;
                        self.impulse.x += reduced.x;
                        self.impulse.y += reduced.y;
                        self.impulse.z = 0.0;
                    } else {
                        self.impulse += impulse;
                    }
                }
                LimitState::Inactive => {}
            }

            let p = Vector::new(impulse.x, impulse.y);

            v_a -= p * m_a;
            w_a -= i_a * (math::cross(&r_a, &p) + impulse.z);
            v_b += p * m_b;
            w_b += i_b * (math::cross(&r_b, &p) + impulse.z);
        } else {
            // Solve the point-to-point constraint.
            let cdot = v_b + math::cross_sv(w_b, &r_b) - v_a - math::cross_sv(w_a, &r_a);
            let impulse = math::solve33_block22(&self.mass, &-cdot);

            self.impulse.x += impulse.x;
            self.impulse.y += impulse.y;

            v_a -= impulse * m_a;
            w_a -= i_a * math::cross(&r_a, &impulse);
            v_b += impulse * m_b;
            w_b += i_b * math::cross(&r_b, &impulse);
        }

        data.velocities[sa.index] = Velocity { v: v_a, w: w_a };
        data.velocities[sb.index] = Velocity { v: v_b, w: w_b };
    }

    fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let (sa, sb) = (self.sa, self.sb);
        let mut pos_a = data.positions[sa.index];
        let mut pos_b = data.positions[sb.index];

        let (m_a, m_b, i_a, i_b) = (sa.inv_mass, sb.inv_mass, sa.inv_i, sb.inv_i);
        let fixed_rotation = i_a + i_b == 0.0;
        let max_correction = data.params.max_angular_correction;

        let mut angular_error = 0.0;

        // Solve the angular limit constraint.
        if self.enable_limit && self.limit_state != LimitState::Inactive && !fixed_rotation {
            let angle = pos_b.a - pos_a.a - self.reference_angle;

            let limit_impulse = match self.limit_state {
                LimitState::Equal => {
                    // Prevent large angular corrections.
                    let c = (angle - self.lower_angle)
                        .max(-max_correction)
                        .min(max_correction);
                    angular_error = c.abs();
                    -self.motor_mass * c
                }
                LimitState::AtLower => {
                    let c = angle - self.lower_angle;
                    angular_error = -c;
                    // Prevent large angular corrections and allow some slop.
                    let c = (c + ANGULAR_SLOP).max(-max_correction).min(0.0);
                    -self.motor_mass * c
                }
                LimitState::AtUpper => {
                    let c = angle - self.upper_angle;
                    angular_error = c;
                    let c = (c - ANGULAR_SLOP).max(0.0).min(max_correction);
                    -self.motor_mass * c
                }
                LimitState::Inactive => 0.0,
            };

            pos_a.a -= i_a * limit_impulse;
            pos_b.a += i_b * limit_impulse;
        }

        // Solve the point-to-point constraint.
        let q_a = Rotation::new(pos_a.a);
        let q_b = Rotation::new(pos_b.a);
        let r_a = q_a * (self.local_anchor_a - sa.local_center);
        let r_b = q_b * (self.local_anchor_b - sb.local_center);

        let c = pos_b.c + r_b - pos_a.c - r_a;
        let position_error = c.norm();

        let k12 = -i_a * r_a.x * r_a.y - i_b * r_b.x * r_b.y;
        let k = Matrix::new(
            m_a + m_b + i_a * r_a.y * r_a.y + i_b * r_b.y * r_b.y,
            k12,
            k12,
            m_a + m_b + i_a * r_a.x * r_a.x + i_b * r_b.x * r_b.x,
        );

        let impulse = -math::solve22(&k, &c);

        pos_a.c -= impulse * m_a;
        pos_a.a -= i_a * math::cross(&r_a, &impulse);
        pos_b.c += impulse * m_b;
        pos_b.a += i_b * math::cross(&r_b, &impulse);

        data.positions[sa.index] = pos_a;
        data.positions[sb.index] = pos_b;

        position_error <= LINEAR_SLOP && angular_error <= ANGULAR_SLOP
    }

    fn anchor_a(&self, body_a: &Body) -> Vector {
        body_a.world_point(&self.local_anchor_a)
    }

    fn anchor_b(&self, body_b: &Body) -> Vector {
        body_b.world_point(&self.local_anchor_b)
    }

    fn reaction_force(&self, inv_dt: Real) -> Vector {
        Vector::new(self.impulse.x, self.impulse.y) * inv_dt
    }

    fn reaction_torque(&self, inv_dt: Real) -> Real {
        inv_dt * self.impulse.z
    }
}
