use crate::error::{WorldError, WorldResult};
use crate::joint::joint_constraint::SolverBody;
use crate::joint::{Joint, JointConstraint, JointHandle, JointKind};
use crate::math::{self, Real, Rotation, Vector};
use crate::object::{Body, BodyHandle, BodySet};
use crate::settings::LINEAR_SLOP;
use crate::solver::{Position, SolverData};

/// Description of a gear joint.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct GearJointDesc {
    /// The first revolute or prismatic joint.
    pub joint1: JointHandle,
    /// The second revolute or prismatic joint.
    pub joint2: JointHandle,
    /// The gear ratio.
    pub ratio: Real,
    /// Can the geared bodies collide?
    pub collide_connected: bool,
}

impl GearJointDesc {
    /// A gear coupling `joint1` and `joint2` with the given ratio.
    pub fn new(joint1: JointHandle, joint2: JointHandle, ratio: Real) -> Self {
        GearJointDesc {
            joint1,
            joint2,
            ratio,
            collide_connected: false,
        }
    }
}

/// The coordinate of one geared joint: an angle or a translation.
#[derive(Copy, Clone, Debug, PartialEq)]
enum GearCoordinate {
    Revolute { reference_angle: Real },
    Prismatic { local_axis: Vector },
}

impl GearCoordinate {
    fn of(joint: &Joint) -> WorldResult<(Self, Vector, Vector)> {
        match joint.kind() {
            JointKind::Revolute(j) => Ok((
                GearCoordinate::Revolute {
                    reference_angle: j.reference_angle,
                },
                j.local_anchor_a,
                j.local_anchor_b,
            )),
            JointKind::Prismatic(j) => Ok((
                GearCoordinate::Prismatic {
                    local_axis: j.local_x_axis_a,
                },
                j.local_anchor_a,
                j.local_anchor_b,
            )),
            _ => Err(WorldError::InvalidGearJoint),
        }
    }

    /// The joint coordinate of the geared body given the pose of its ground body.
    fn value(&self, ground: (&Position, Vector, Vector), geared: (&Position, Vector, Vector)) -> Real {
        let (pos_c, lc_c, anchor_c) = ground;
        let (pos_a, lc_a, anchor_a) = geared;

        match *self {
            GearCoordinate::Revolute { reference_angle } => pos_a.a - pos_c.a - reference_angle,
            GearCoordinate::Prismatic { local_axis } => {
                let q_a = Rotation::new(pos_a.a);
                let q_c = Rotation::new(pos_c.a);
                let r_a = q_a * (anchor_a - lc_a);
                let p_c = anchor_c - lc_c;
                let p_a = q_c.inverse() * (r_a + (pos_a.c - pos_c.c));
                (p_a - p_c).dot(&local_axis)
            }
        }
    }
}

/// Jacobian of one geared joint.
#[derive(Copy, Clone, Debug)]
struct GearJacobian {
    jv: Vector,
    jw_geared: Real,
    jw_ground: Real,
    inv_mass: Real,
}

/// Couples two revolute or prismatic joints so that
/// `coordinate1 + ratio * coordinate2 = constant`.
///
/// The first body of each coupled joint is its ground body (`body_c` and `body_d`) and the
/// gear connects their second bodies. Destroying one of the coupled joints destroys the gear.
#[derive(Clone, Debug)]
pub struct GearJoint {
    joint1: JointHandle,
    joint2: JointHandle,
    coordinate_a: GearCoordinate,
    coordinate_b: GearCoordinate,
    pub(crate) body_c: BodyHandle,
    pub(crate) body_d: BodyHandle,

    local_anchor_a: Vector,
    local_anchor_b: Vector,
    local_anchor_c: Vector,
    local_anchor_d: Vector,

    constant: Real,
    ratio: Real,
    impulse: Real,

    // Solver temp.
    ba: SolverBody,
    bb: SolverBody,
    bc: SolverBody,
    bd: SolverBody,
    jv_ac: Vector,
    jv_bd: Vector,
    jw_a: Real,
    jw_b: Real,
    jw_c: Real,
    jw_d: Real,
    mass: Real,
}

impl GearJoint {
    /// Builds a gear from its coupled joints. The gear's bodies are the second bodies of
    /// `joint1` and `joint2`.
    pub(crate) fn new(
        desc: &GearJointDesc,
        joint1: &Joint,
        joint2: &Joint,
        bodies: &BodySet,
    ) -> WorldResult<Self> {
        let (coordinate_a, local_anchor_c, local_anchor_a) = GearCoordinate::of(joint1)?;
        let (coordinate_b, local_anchor_d, local_anchor_b) = GearCoordinate::of(joint2)?;

        let body_c = joint1.body_a();
        let body_d = joint2.body_a();

        let pose = |handle: BodyHandle| -> WorldResult<(Position, Vector)> {
            let body = bodies.get(handle).ok_or(WorldError::InvalidBody)?;
            let position = Position {
                c: body.sweep.c,
                a: body.sweep.a,
            };
            Ok((position, body.sweep.local_center))
        };

        let (pos_a, lc_a) = pose(joint1.body_b())?;
        let (pos_b, lc_b) = pose(joint2.body_b())?;
        let (pos_c, lc_c) = pose(body_c)?;
        let (pos_d, lc_d) = pose(body_d)?;

        let value_a = coordinate_a.value(
            (&pos_c, lc_c, local_anchor_c),
            (&pos_a, lc_a, local_anchor_a),
        );
        let value_b = coordinate_b.value(
            (&pos_d, lc_d, local_anchor_d),
            (&pos_b, lc_b, local_anchor_b),
        );

        Ok(GearJoint {
            joint1: desc.joint1,
            joint2: desc.joint2,
            coordinate_a,
            coordinate_b,
            body_c,
            body_d,
            local_anchor_a,
            local_anchor_b,
            local_anchor_c,
            local_anchor_d,
            constant: value_a + desc.ratio * value_b,
            ratio: desc.ratio,
            impulse: 0.0,
            ba: SolverBody::default(),
            bb: SolverBody::default(),
            bc: SolverBody::default(),
            bd: SolverBody::default(),
            jv_ac: Vector::zeros(),
            jv_bd: Vector::zeros(),
            jw_a: 0.0,
            jw_b: 0.0,
            jw_c: 0.0,
            jw_d: 0.0,
            mass: 0.0,
        })
    }

    /// The first coupled joint.
    pub fn joint1(&self) -> JointHandle {
        self.joint1
    }

    /// The second coupled joint.
    pub fn joint2(&self) -> JointHandle {
        self.joint2
    }

    /// The gear ratio.
    pub fn ratio(&self) -> Real {
        self.ratio
    }

    /// Sets the gear ratio.
    pub fn set_ratio(&mut self, ratio: Real) {
        debug_assert!(ratio.is_finite());
        self.ratio = ratio;
    }

    fn jacobian(
        coordinate: GearCoordinate,
        geared: (SolverBody, Real, Vector),
        ground: (SolverBody, Real, Vector),
        ratio: Real,
    ) -> GearJacobian {
        let (ba, a_a, anchor_a) = geared;
        let (bc, a_c, anchor_c) = ground;

        match coordinate {
            GearCoordinate::Revolute { .. } => GearJacobian {
                jv: Vector::zeros(),
                jw_geared: ratio,
                jw_ground: ratio,
                inv_mass: ratio * ratio * (ba.inv_i + bc.inv_i),
            },
            GearCoordinate::Prismatic { local_axis } => {
                let q_a = Rotation::new(a_a);
                let q_c = Rotation::new(a_c);
                let u = q_c * local_axis;
                let r_c = q_c * (anchor_c - bc.local_center);
                let r_a = q_a * (anchor_a - ba.local_center);
                let jw_ground = ratio * math::cross(&r_c, &u);
                let jw_geared = ratio * math::cross(&r_a, &u);

                GearJacobian {
                    jv: u * ratio,
                    jw_geared,
                    jw_ground,
                    inv_mass: ratio * ratio * (bc.inv_mass + ba.inv_mass)
                        + bc.inv_i * jw_ground * jw_ground
                        + ba.inv_i * jw_geared * jw_geared,
                }
            }
        }
    }
}

impl JointConstraint for GearJoint {
    fn init_velocity_constraints(
        &mut self,
        body_a: &Body,
        body_b: &Body,
        bodies: &BodySet,
        data: &mut SolverData,
    ) {
        self.ba = SolverBody::new(body_a);
        self.bb = SolverBody::new(body_b);
        self.bc = bodies.get(self.body_c).map(SolverBody::new).unwrap_or(self.ba);
        self.bd = bodies.get(self.body_d).map(SolverBody::new).unwrap_or(self.bb);
        let (ba, bb, bc, bd) = (self.ba, self.bb, self.bc, self.bd);

        let a_a = data.positions[ba.index].a;
        let a_b = data.positions[bb.index].a;
        let a_c = data.positions[bc.index].a;
        let a_d = data.positions[bd.index].a;

        let jac_a = Self::jacobian(
            self.coordinate_a,
            (ba, a_a, self.local_anchor_a),
            (bc, a_c, self.local_anchor_c),
            1.0,
        );
        let jac_b = Self::jacobian(
            self.coordinate_b,
            (bb, a_b, self.local_anchor_b),
            (bd, a_d, self.local_anchor_d),
            self.ratio,
        );

        self.jv_ac = jac_a.jv;
        self.jw_a = jac_a.jw_geared;
        self.jw_c = jac_a.jw_ground;
        self.jv_bd = jac_b.jv;
        self.jw_b = jac_b.jw_geared;
        self.jw_d = jac_b.jw_ground;

        let mass = jac_a.inv_mass + jac_b.inv_mass;
        self.mass = if mass > 0.0 { 1.0 / mass } else { 0.0 };

        if data.step.warm_starting {
            self.apply_impulse(self.impulse, data);
        } else {
            self.impulse = 0.0;
        }
    }

    fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        let (ba, bb, bc, bd) = (self.ba, self.bb, self.bc, self.bd);
        let v_a = data.velocities[ba.index];
        let v_b = data.velocities[bb.index];
        let v_c = data.velocities[bc.index];
        let v_d = data.velocities[bd.index];

        let cdot = self.jv_ac.dot(&(v_a.v - v_c.v))
            + self.jv_bd.dot(&(v_b.v - v_d.v))
            + (self.jw_a * v_a.w - self.jw_c * v_c.w)
            + (self.jw_b * v_b.w - self.jw_d * v_d.w);

        let impulse = -self.mass * cdot;
        self.impulse += impulse;

        self.apply_impulse(impulse, data);
    }

    fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        let (ba, bb, bc, bd) = (self.ba, self.bb, self.bc, self.bd);
        let mut pos_a = data.positions[ba.index];
        let mut pos_b = data.positions[bb.index];
        let mut pos_c = data.positions[bc.index];
        let mut pos_d = data.positions[bd.index];

        let jac_a = Self::jacobian(
            self.coordinate_a,
            (ba, pos_a.a, self.local_anchor_a),
            (bc, pos_c.a, self.local_anchor_c),
            1.0,
        );
        let jac_b = Self::jacobian(
            self.coordinate_b,
            (bb, pos_b.a, self.local_anchor_b),
            (bd, pos_d.a, self.local_anchor_d),
            self.ratio,
        );

        let coordinate_a = self.coordinate_a.value(
            (&pos_c, bc.local_center, self.local_anchor_c),
            (&pos_a, ba.local_center, self.local_anchor_a),
        );
        let coordinate_b = self.coordinate_b.value(
            (&pos_d, bd.local_center, self.local_anchor_d),
            (&pos_b, bb.local_center, self.local_anchor_b),
        );

        let c = (coordinate_a + self.ratio * coordinate_b) - self.constant;
        let mass = jac_a.inv_mass + jac_b.inv_mass;
        let impulse = if mass > 0.0 { -c / mass } else { 0.0 };

        pos_a.c += jac_a.jv * (ba.inv_mass * impulse);
        pos_a.a += ba.inv_i * impulse * jac_a.jw_geared;
        pos_b.c += jac_b.jv * (bb.inv_mass * impulse);
        pos_b.a += bb.inv_i * impulse * jac_b.jw_geared;
        pos_c.c -= jac_a.jv * (bc.inv_mass * impulse);
        pos_c.a -= bc.inv_i * impulse * jac_a.jw_ground;
        pos_d.c -= jac_b.jv * (bd.inv_mass * impulse);
        pos_d.a -= bd.inv_i * impulse * jac_b.jw_ground;

        data.positions[ba.index] = pos_a;
        data.positions[bb.index] = pos_b;
        data.positions[bc.index] = pos_c;
        data.positions[bd.index] = pos_d;

        // The position error of a gear is not measured.
        let linear_error = 0.0;
        linear_error < LINEAR_SLOP
    }

    fn anchor_a(&self, body_a: &Body) -> Vector {
        body_a.world_point(&self.local_anchor_a)
    }

    fn anchor_b(&self, body_b: &Body) -> Vector {
        body_b.world_point(&self.local_anchor_b)
    }

    fn reaction_force(&self, inv_dt: Real) -> Vector {
        self.jv_ac * (inv_dt * self.impulse)
    }

    fn reaction_torque(&self, inv_dt: Real) -> Real {
        inv_dt * self.impulse * self.jw_a
    }
}

impl GearJoint {
    fn apply_impulse(&self, impulse: Real, data: &mut SolverData) {
        let (ba, bb, bc, bd) = (self.ba, self.bb, self.bc, self.bd);

        // The ground bodies may be shared, so each velocity is read right before its update.
        let mut vel = data.velocities[ba.index];
        vel.v += self.jv_ac * (ba.inv_mass * impulse);
        vel.w += ba.inv_i * impulse * self.jw_a;
        data.velocities[ba.index] = vel;

        let mut vel = data.velocities[bb.index];
        vel.v += self.jv_bd * (bb.inv_mass * impulse);
        vel.w += bb.inv_i * impulse * self.jw_b;
        data.velocities[bb.index] = vel;

        let mut vel = data.velocities[bc.index];
        vel.v -= self.jv_ac * (bc.inv_mass * impulse);
        vel.w -= bc.inv_i * impulse * self.jw_c;
        data.velocities[bc.index] = vel;

        let mut vel = data.velocities[bd.index];
        vel.v -= self.jv_bd * (bd.inv_mass * impulse);
        vel.w -= bd.inv_i * impulse * self.jw_d;
        data.velocities[bd.index] = vel;
    }
}
