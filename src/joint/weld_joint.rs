use crate::joint::joint_constraint::{soft_constraint_coefficients, SolverBody};
use crate::joint::JointConstraint;
use crate::math::{self, Matrix, Matrix3d, Real, Rotation, Vector, Vector3d};
use crate::object::{Body, BodyHandle, BodySet};
use crate::settings::{ANGULAR_SLOP, LINEAR_SLOP};
use crate::solver::{SolverData, Velocity};

/// Description of a weld joint.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct WeldJointDesc {
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
    /// The angular mass-spring-damper frequency in Hertz. Zero makes the weld rigid.
    pub frequency_hz: Real,
    /// The angular damping ratio.
    pub damping_ratio: Real,
    /// Can the attached bodies collide?
    pub collide_connected: bool,
}

impl WeldJointDesc {
    /// A rigid weld between two local anchors.
    pub fn new(
        body_a: BodyHandle,
        body_b: BodyHandle,
        local_anchor_a: Vector,
        local_anchor_b: Vector,
    ) -> Self {
        WeldJointDesc {
            body_a,
            body_b,
            local_anchor_a,
            local_anchor_b,
            reference_angle: 0.0,
            frequency_hz: 0.0,
            damping_ratio: 0.0,
            collide_connected: false,
        }
    }
}

/// Glues two bodies together, optionally with a soft angular constraint.
#[derive(Clone, Debug)]
pub struct WeldJoint {
    local_anchor_a: Vector,
    local_anchor_b: Vector,
    reference_angle: Real,
    frequency_hz: Real,
    damping_ratio: Real,

    impulse: Vector3d,
    gamma: Real,
    bias: Real,

    sa: SolverBody,
    sb: SolverBody,
    r_a: Vector,
    r_b: Vector,
    mass: Matrix3d,
}

impl WeldJoint {
    pub(crate) fn new(desc: &WeldJointDesc) -> Self {
        WeldJoint {
            local_anchor_a: desc.local_anchor_a,
            local_anchor_b: desc.local_anchor_b,
            reference_angle: desc.reference_angle,
            frequency_hz: desc.frequency_hz,
            damping_ratio: desc.damping_ratio,
            impulse: Vector3d::zeros(),
            gamma: 0.0,
            bias: 0.0,
            sa: SolverBody::default(),
            sb: SolverBody::default(),
            r_a: Vector::zeros(),
            r_b: Vector::zeros(),
            mass: Matrix3d::zeros(),
        }
    }

    desc_getters!(
        local_anchor_a -> local_anchor_a: Vector
        local_anchor_b -> local_anchor_b: Vector
        reference_angle -> reference_angle: Real
        frequency -> frequency_hz: Real
        damping_ratio -> damping_ratio: Real
    );

    /// Sets the angular mass-spring-damper frequency in Hertz.
    pub fn set_frequency(&mut self, hz: Real) {
        self.frequency_hz = hz;
    }

    /// Sets the angular damping ratio.
    pub fn set_damping_ratio(&mut self, ratio: Real) {
        self.damping_ratio = ratio;
    }
}

/// The 3x3 effective mass of a weld between two bodies.
fn weld_k(sa: &SolverBody, sb: &SolverBody, r_a: &Vector, r_b: &Vector) -> Matrix3d {
    let (m_a, m_b, i_a, i_b) = (sa.inv_mass, sb.inv_mass, sa.inv_i, sb.inv_i);

    let ex_x = m_a + m_b + r_a.y * r_a.y * i_a + r_b.y * r_b.y * i_b;
    let ey_x = -r_a.y * r_a.x * i_a - r_b.y * r_b.x * i_b;
    let ez_x = -r_a.y * i_a - r_b.y * i_b;
    let ey_y = m_a + m_b + r_a.x * r_a.x * i_a + r_b.x * r_b.x * i_b;
    let ez_y = r_a.x * i_a + r_b.x * i_b;
    let ez_z = i_a + i_b;

    Matrix3d::new(
        ex_x, ey_x, ez_x, //
        ey_x, ey_y, ez_y, //
        ez_x, ez_y, ez_z,
    )
}

impl JointConstraint for WeldJoint {
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

        let k = weld_k(&sa, &sb, &self.r_a, &self.r_b);

        if self.frequency_hz > 0.0 {
            self.mass = math::inverse33_block22(&k);

            let mut inv_m = sa.inv_i + sb.inv_i;
            let m = if inv_m > 0.0 { 1.0 / inv_m } else { 0.0 };

            let c = a_b - a_a - self.reference_angle;
            let (gamma, beta) =
                soft_constraint_coefficients(m, self.frequency_hz, self.damping_ratio, data.step.dt);
            self.gamma = gamma;
            self.bias = c * beta;

            inv_m += self.gamma;
            self.mass.m33 = if inv_m != 0.0 { 1.0 / inv_m } else { 0.0 };
        } else if k.m33 == 0.0 {
            self.mass = math::inverse33_block22(&k);
            self.gamma = 0.0;
            self.bias = 0.0;
        } else {
            self.mass = math::symmetric_inverse33(&k);
            self.gamma = 0.0;
            self.bias = 0.0;
        }

        if data.step.warm_starting {
            // Scale impulses to support a variable time step.
            self.impulse *= data.step.dt_ratio;

            let p = Vector::new(self.impulse.x, self.impulse.y);

            v_a -= p * sa.inv_mass;
            w_a -= sa.inv_i * (math::cross(&self.r_a, &p) + self.impulse.z);
            v_b += p * sb.inv_mass;
            w_b += sb.inv_i * (math::cross(&self.r_b, &p) + self.impulse.z);
        } else {
            self.impulse = Vector3d::zeros();
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

        if self.frequency_hz > 0.0 {
            let cdot2 = w_b - w_a;

            let impulse2 = -self.mass.m33 * (cdot2 + self.bias + self.gamma * self.impulse.z);
            self.impulse.z += impulse2;

            w_a -= i_a * impulse2;
            w_b += i_b * impulse2;

            let cdot1 = v_b + math::cross_sv(w_b, &r_b) - v_a - math::cross_sv(w_a, &r_a);

            let block = Matrix::new(self.mass.m11, self.mass.m12, self.mass.m21, self.mass.m22);
            let impulse1 = -(block * cdot1);
            self.impulse.x += impulse1.x;
            self.impulse.y += impulse1.y;

            v_a -= impulse1 * m_a;
            w_a -= i_a * math::cross(&r_a, &impulse1);
            v_b += impulse1 * m_b;
            w_b += i_b * math::cross(&r_b, &impulse1);
        } else {
            let cdot1 = v_b + math::cross_sv(w_b, &r_b) - v_a - math::cross_sv(w_a, &r_a);
            let cdot2 = w_b - w_a;
            let cdot = Vector3d::new(cdot1.x, cdot1.y, cdot2);

            let impulse = -(self.mass * cdot);
            self.impulse += impulse;

            let p = Vector::new(impulse.x, impulse.y);

            v_a -= p * m_a;
            w_a -= i_a * (math::cross(&r_a, &p) + impulse.z);
            v_b += p * m_b;
            w_b += i_b * (math::cross(&r_b, &p) + impulse.z);
        }

        data.velocities[sa.index] = Velocity { v: v_a, w: w_a };
        data.velocities[sb.index] = Velocity { v: v_b, w: w_b };
    }

    fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let (sa, sb) = (self.sa, self.sb);
        let mut pos_a = data.positions[sa.index];
        let mut pos_b = data.positions[sb.index];

        let (m_a, m_b, i_a, i_b) = (sa.inv_mass, sb.inv_mass, sa.inv_i, sb.inv_i);

        let q_a = Rotation::new(pos_a.a);
        let q_b = Rotation::new(pos_b.a);

        let r_a = q_a * (self.local_anchor_a - sa.local_center);
        let r_b = q_b * (self.local_anchor_b - sb.local_center);

        let k = weld_k(&sa, &sb, &r_a, &r_b);

        let position_error;
        let angular_error;

        if self.frequency_hz > 0.0 {
            let c1 = pos_b.c + r_b - pos_a.c - r_a;

            position_error = c1.norm();
            angular_error = 0.0;

            let p = -math::solve33_block22(&k, &c1);

            pos_a.c -= p * m_a;
            pos_a.a -= i_a * math::cross(&r_a, &p);
            pos_b.c += p * m_b;
            pos_b.a += i_b * math::cross(&r_b, &p);
        } else {
            let c1 = pos_b.c + r_b - pos_a.c - r_a;
            let c2 = pos_b.a - pos_a.a - self.reference_angle;

            position_error = c1.norm();
            angular_error = c2.abs();

            let c = Vector3d::new(c1.x, c1.y, c2);

            let impulse = if k.m33 > 0.0 {
                -math::solve33(&k, &c)
            } else {
                let impulse2 = -math::solve33_block22(&k, &c1);
                Vector3d::new(impulse2.x, impulse2.y, 0.0)
            };

            let p = Vector::new(impulse.x, impulse.y);

            pos_a.c -= p * m_a;
            pos_a.a -= i_a * (math::cross(&r_a, &p) + impulse.z);
            pos_b.c += p * m_b;
            pos_b.a += i_b * (math::cross(&r_b, &p) + impulse.z);
        }

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
