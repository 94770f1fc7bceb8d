use crate::joint::joint_constraint::{soft_constraint_coefficients, SolverBody};
use crate::joint::JointConstraint;
use crate::math::{self, Real, Rotation, Vector};
use crate::object::{Body, BodyHandle, BodySet};
use crate::settings::LINEAR_SLOP;
use crate::solver::{SolverData, Velocity};

/// Description of a distance joint.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct DistanceJointDesc {
    /// The first attached body.
    pub body_a: BodyHandle,
    /// The second attached body.
    pub body_b: BodyHandle,
    /// The anchor point relative to the origin of the first body.
    pub local_anchor_a: Vector,
    /// The anchor point relative to the origin of the second body.
    pub local_anchor_b: Vector,
    /// The natural length between the anchor points.
    pub length: Real,
    /// The mass-spring-damper frequency in Hertz. Zero makes the joint rigid.
    pub frequency_hz: Real,
    /// The damping ratio: 0 = no damping, 1 = critical damping.
    pub damping_ratio: Real,
    /// Can the attached bodies collide?
    pub collide_connected: bool,
}

impl DistanceJointDesc {
    /// A rigid rod of `length` between two local anchors.
    pub fn new(
        body_a: BodyHandle,
        body_b: BodyHandle,
        local_anchor_a: Vector,
        local_anchor_b: Vector,
        length: Real,
    ) -> Self {
        DistanceJointDesc {
            body_a,
            body_b,
            local_anchor_a,
            local_anchor_b,
            length,
            frequency_hz: 0.0,
            damping_ratio: 0.0,
            collide_connected: false,
        }
    }
}

/// Keeps two anchor points at a fixed distance, like a massless rigid rod or, when
/// `frequency_hz > 0`, a spring.
#[derive(Clone, Debug)]
pub struct DistanceJoint {
    local_anchor_a: Vector,
    local_anchor_b: Vector,
    length: Real,
    frequency_hz: Real,
    damping_ratio: Real,

    // Solver shared.
    impulse: Real,
    gamma: Real,
    bias: Real,

    // Solver temp.
    sa: SolverBody,
    sb: SolverBody,
    u: Vector,
    r_a: Vector,
    r_b: Vector,
    mass: Real,
}

impl DistanceJoint {
    pub(crate) fn new(desc: &DistanceJointDesc) -> Self {
        DistanceJoint {
            local_anchor_a: desc.local_anchor_a,
            local_anchor_b: desc.local_anchor_b,
            length: desc.length,
            frequency_hz: desc.frequency_hz,
            damping_ratio: desc.damping_ratio,
            impulse: 0.0,
            gamma: 0.0,
            bias: 0.0,
            sa: SolverBody::default(),
            sb: SolverBody::default(),
            u: Vector::zeros(),
            r_a: Vector::zeros(),
            r_b: Vector::zeros(),
            mass: 0.0,
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

    /// The natural length.
    pub fn length(&self) -> Real {
        self.length
    }

    /// Sets the natural length.
    pub fn set_length(&mut self, length: Real) {
        self.length = length;
    }

    /// The mass-spring-damper frequency in Hertz.
    pub fn frequency(&self) -> Real {
        self.frequency_hz
    }

    /// Sets the mass-spring-damper frequency in Hertz.
    pub fn set_frequency(&mut self, hz: Real) {
        self.frequency_hz = hz;
    }

    /// The damping ratio.
    pub fn damping_ratio(&self) -> Real {
        self.damping_ratio
    }

    /// Sets the damping ratio.
    pub fn set_damping_ratio(&mut self, ratio: Real) {
        self.damping_ratio = ratio;
    }
}

impl JointConstraint for DistanceJoint {
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

        self.r_a = q_a * (self.local_anchor_a - sa.local_center);
        self.r_b = q_b * (self.local_anchor_b - sb.local_center);
        self.u = pos_b.c + self.r_b - pos_a.c - self.r_a;

        // Handle singularity.
        let length = self.u.norm();
        if length > LINEAR_SLOP {
            self.u /= length;
        } else {
            self.u = Vector::zeros();
        }

        let cr_au = math::cross(&self.r_a, &self.u);
        let cr_bu = math::cross(&self.r_b, &self.u);
        let mut inv_mass =
            sa.inv_mass + sa.inv_i * cr_au * cr_au + sb.inv_mass + sb.inv_i * cr_bu * cr_bu;

        // Compute the effective mass matrix.
        self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };

        if self.frequency_hz > 0.0 {
            let c = length - self.length;
            let (gamma, beta) = soft_constraint_coefficients(
                self.mass,
                self.frequency_hz,
                self.damping_ratio,
                data.step.dt,
            );
            self.gamma = gamma;
            self.bias = c * beta;

            inv_mass += self.gamma;
            self.mass = if inv_mass != 0.0 { 1.0 / inv_mass } else { 0.0 };
        } else {
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if data.step.warm_starting {
            // Scale the impulse to support a variable time step.
            self.impulse *= data.step.dt_ratio;

            let p = self.u * self.impulse;
            v_a -= p * sa.inv_mass;
            w_a -= sa.inv_i * math::cross(&self.r_a, &p);
            v_b += p * sb.inv_mass;
            w_b += sb.inv_i * math::cross(&self.r_b, &p);
        } else {
            self.impulse = 0.0;
        }

        data.velocities[sa.index] = Velocity { v: v_a, w: w_a };
        data.velocities[sb.index] = Velocity { v: v_b, w: w_b };
    }

    fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let (sa, sb) = (self.sa, self.sb);
        let Velocity { v: mut v_a, w: mut w_a } = data.velocities[sa.index];
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[sb.index];

        // Cdot = dot(u, v + cross(w, r))
        let vp_a = v_a + math::cross_sv(w_a, &self.r_a);
        let vp_b = v_b + math::cross_sv(w_b, &self.r_b);
        let cdot = self.u.dot(&(vp_b - vp_a));

        let impulse = -self.mass * (cdot + self.bias + self.gamma * self.impulse);
        self.impulse += impulse;

        let p = self.u * impulse;
        v_a -= p * sa.inv_mass;
        w_a -= sa.inv_i * math::cross(&self.r_a, &p);
        v_b += p * sb.inv_mass;
        w_b += sb.inv_i * math::cross(&self.r_b, &p);

        data.velocities[sa.index] = Velocity { v: v_a, w: w_a };
        data.velocities[sb.index] = Velocity { v: v_b, w: w_b };
    }

    fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        if self.frequency_hz > 0.0 {
            // There is no position correction for soft distance constraints.
            return true;
        }

        let (sa, sb) = (self.sa, self.sb);
        let mut pos_a = data.positions[sa.index];
        let mut pos_b = data.positions[sb.index];

        let q_a = Rotation::new(pos_a.a);
        let q_b = Rotation::new(pos_b.a);

        let r_a = q_a * (self.local_anchor_a - sa.local_center);
        let r_b = q_b * (self.local_anchor_b - sb.local_center);
        let mut u = pos_b.c + r_b - pos_a.c - r_a;

        let length = math::normalize(&mut u);
        let max_correction = data.params.max_linear_correction;
        let c = (length - self.length).max(-max_correction).min(max_correction);

        let impulse = -self.mass * c;
        let p = u * impulse;

        pos_a.c -= p * sa.inv_mass;
        pos_a.a -= sa.inv_i * math::cross(&r_a, &p);
        pos_b.c += p * sb.inv_mass;
        pos_b.a += sb.inv_i * math::cross(&r_b, &p);

        data.positions[sa.index] = pos_a;
        data.positions[sb.index] = pos_b;

        c.abs() < LINEAR_SLOP
    }

    fn anchor_a(&self, body_a: &Body) -> Vector {
        body_a.world_point(&self.local_anchor_a)
    }

    fn anchor_b(&self, body_b: &Body) -> Vector {
        body_b.world_point(&self.local_anchor_b)
    }

    fn reaction_force(&self, inv_dt: Real) -> Vector {
        self.u * (inv_dt * self.impulse)
    }

    fn reaction_torque(&self, _: Real) -> Real {
        0.0
    }
}
