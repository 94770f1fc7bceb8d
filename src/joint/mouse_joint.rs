use crate::joint::joint_constraint::{soft_constraint_coefficients, SolverBody};
use crate::joint::JointConstraint;
use crate::math::{self, Matrix, Real, Rotation, Vector};
use crate::object::{Body, BodyHandle, BodySet};
use crate::solver::{SolverData, Velocity};

/// Description of a mouse joint.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct MouseJointDesc {
    /// A body that is only needed for the joint graph, usually the ground.
    pub body_a: BodyHandle,
    /// The dragged body.
    pub body_b: BodyHandle,
    /// The initial world target point. The joint grabs the dragged body at this point.
    pub target: Vector,
    /// The maximum constraint force that can be exerted to move the candidate body.
    pub max_force: Real,
    /// The response speed, in Hertz.
    pub frequency_hz: Real,
    /// The damping ratio: 0 = no damping, 1 = critical damping.
    pub damping_ratio: Real,
    /// Can the attached bodies collide?
    pub collide_connected: bool,
}

impl MouseJointDesc {
    /// A mouse joint dragging `body_b` from the world point `target`.
    pub fn new(body_a: BodyHandle, body_b: BodyHandle, target: Vector, max_force: Real) -> Self {
        MouseJointDesc {
            body_a,
            body_b,
            target,
            max_force,
            frequency_hz: 5.0,
            damping_ratio: 0.7,
            collide_connected: false,
        }
    }
}

/// A soft constraint with a maximum force that pulls a point of a body toward a world
/// target.
#[derive(Clone, Debug)]
pub struct MouseJoint {
    local_anchor_b: Vector,
    target: Vector,
    frequency_hz: Real,
    damping_ratio: Real,
    max_force: Real,

    impulse: Vector,
    beta: Real,
    gamma: Real,

    sb: SolverBody,
    r_b: Vector,
    mass: Matrix,
    c: Vector,
}

impl MouseJoint {
    pub(crate) fn new(desc: &MouseJointDesc, body_b: &Body) -> Self {
        debug_assert!(desc.target.x.is_finite() && desc.target.y.is_finite());
        debug_assert!(desc.max_force >= 0.0);
        debug_assert!(desc.frequency_hz >= 0.0);
        debug_assert!(desc.damping_ratio >= 0.0);

        MouseJoint {
            local_anchor_b: math::inverse_transform(body_b.transform(), &desc.target),
            target: desc.target,
            frequency_hz: desc.frequency_hz,
            damping_ratio: desc.damping_ratio,
            max_force: desc.max_force,
            impulse: Vector::zeros(),
            beta: 0.0,
            gamma: 0.0,
            sb: SolverBody::default(),
            r_b: Vector::zeros(),
            mass: Matrix::zeros(),
            c: Vector::zeros(),
        }
    }

    /// The world target point.
    pub fn target(&self) -> Vector {
        self.target
    }

    /// Moves the world target point. This does not wake up the dragged body.
    pub fn set_target(&mut self, target: Vector) {
        self.target = target;
    }

    desc_getters!(
        max_force -> max_force: Real
        frequency -> frequency_hz: Real
        damping_ratio -> damping_ratio: Real
    );

    /// Sets the maximum constraint force.
    pub fn set_max_force(&mut self, force: Real) {
        self.max_force = force;
    }

    /// Sets the response speed, in Hertz.
    pub fn set_frequency(&mut self, hz: Real) {
        self.frequency_hz = hz;
    }

    /// Sets the damping ratio.
    pub fn set_damping_ratio(&mut self, ratio: Real) {
        self.damping_ratio = ratio;
    }
}

impl JointConstraint for MouseJoint {
    fn init_velocity_constraints(
        &mut self,
        _: &Body,
        body_b: &Body,
        _: &BodySet,
        data: &mut SolverData,
    ) {
        self.sb = SolverBody::new(body_b);
        let sb = self.sb;

        let pos_b = data.positions[sb.index];
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[sb.index];
        let q_b = Rotation::new(pos_b.a);

        let (gamma, beta) = soft_constraint_coefficients(
            body_b.mass(),
            self.frequency_hz,
            self.damping_ratio,
            data.step.dt,
        );
        self.gamma = gamma;
        self.beta = beta;

        // Compute the effective mass matrix.
        self.r_b = q_b * (self.local_anchor_b - sb.local_center);

        // K    = [(1/m1 + 1/m2) * eye(2) - skew(r1) * invI1 * skew(r1) - skew(r2) * invI2 * skew(r2)]
        //      = [1/m1+1/m2     0    ] + invI1 * [r1.y*r1.y -r1.x*r1.y] + invI2 * [r1.y*r1.y -r1.x*r1.y]
        //        [    0     1/m1+1/m2]           [-r1.x*r1.y r1.x*r1.x]           [-r1.x*r1.y r1.x*r1.x]
        let r_b = self.r_b;
        let k = Matrix::new(
            sb.inv_mass + sb.inv_i * r_b.y * r_b.y + self.gamma,
            -sb.inv_i * r_b.x * r_b.y,
            -sb.inv_i * r_b.x * r_b.y,
            sb.inv_mass + sb.inv_i * r_b.x * r_b.x + self.gamma,
        );

        self.mass = math::inverse22(&k);

        self.c = (pos_b.c + r_b - self.target) * self.beta;

        // Cheat with some damping.
        w_b *= 0.98;

        if data.step.warm_starting {
            self.impulse *= data.step.dt_ratio;
            v_b += self.impulse * sb.inv_mass;
            w_b += sb.inv_i * math::cross(&r_b, &self.impulse);
        } else {
            self.impulse = Vector::zeros();
        }

        data.velocities[sb.index] = Velocity { v: v_b, w: w_b };
    }

    fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let sb = self.sb;
        let Velocity { v: mut v_b, w: mut w_b } = data.velocities[sb.index];

        // Cdot = v + cross(w, r)
        let cdot = v_b + math::cross_sv(w_b, &self.r_b);
        let mut impulse = self.mass * -(cdot + self.c + self.impulse * self.gamma);

        let old_impulse = self.impulse;
        self.impulse += impulse;
        let max_impulse = data.step.dt * self.max_force;
        if self.impulse.norm_squared() > max_impulse * max_impulse {
            self.impulse *= max_impulse / self.impulse.norm();
        }
        impulse = self.impulse - old_impulse;

        v_b += impulse * sb.inv_mass;
        w_b += sb.inv_i * math::cross(&self.r_b, &impulse);

        data.velocities[sb.index] = Velocity { v: v_b, w: w_b };
    }

    fn solve_position_constraints(&mut self, _: &mut SolverData) -> bool {
        true
    }

    fn anchor_a(&self, _: &Body) -> Vector {
        self.target
    }

    fn anchor_b(&self, body_b: &Body) -> Vector {
        body_b.world_point(&self.local_anchor_b)
    }

    fn reaction_force(&self, inv_dt: Real) -> Vector {
        self.impulse * inv_dt
    }

    fn reaction_torque(&self, _: Real) -> Real {
        0.0
    }
}
