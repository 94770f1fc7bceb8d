use crate::error::{WorldError, WorldResult};
use crate::joint::{
    DistanceJoint, DistanceJointDesc, GearJoint, GearJointDesc, JointConstraint, MouseJoint,
    MouseJointDesc, PrismaticJoint, PrismaticJointDesc, RevoluteJoint, RevoluteJointDesc,
    WeldJoint, WeldJointDesc,
};
use crate::math::{Real, Vector};
use crate::object::{Body, BodyHandle, BodySet};
use crate::solver::SolverData;
use crate::utils::{HandleSet, UserData};

define_handle!(JointHandle, "The unique identifier of a joint added to a world.");

/// A set of joints.
pub type JointSet = HandleSet<JointHandle, Joint>;

/// The type of a joint.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum JointType {
    /// A distance joint.
    Distance,
    /// A revolute joint.
    Revolute,
    /// A prismatic joint.
    Prismatic,
    /// A gear joint.
    Gear,
    /// A mouse joint.
    Mouse,
    /// A weld joint.
    Weld,
}

/// The joint-specific state of a joint.
#[derive(Clone, Debug)]
pub enum JointKind {
    /// A distance joint.
    Distance(DistanceJoint),
    /// A revolute joint.
    Revolute(RevoluteJoint),
    /// A prismatic joint.
    Prismatic(PrismaticJoint),
    /// A gear joint.
    Gear(GearJoint),
    /// A mouse joint.
    Mouse(MouseJoint),
    /// A weld joint.
    Weld(WeldJoint),
}

macro_rules! dispatch(
    ($kind: expr, $joint: ident => $e: expr) => {
        match $kind {
            JointKind::Distance($joint) => $e,
            JointKind::Revolute($joint) => $e,
            JointKind::Prismatic($joint) => $e,
            JointKind::Gear($joint) => $e,
            JointKind::Mouse($joint) => $e,
            JointKind::Weld($joint) => $e,
        }
    }
);

impl JointKind {
    /// The type of this joint.
    pub fn joint_type(&self) -> JointType {
        match self {
            JointKind::Distance(_) => JointType::Distance,
            JointKind::Revolute(_) => JointType::Revolute,
            JointKind::Prismatic(_) => JointType::Prismatic,
            JointKind::Gear(_) => JointType::Gear,
            JointKind::Mouse(_) => JointType::Mouse,
            JointKind::Weld(_) => JointType::Weld,
        }
    }
}

impl JointConstraint for JointKind {
    fn init_velocity_constraints(
        &mut self,
        body_a: &Body,
        body_b: &Body,
        bodies: &BodySet,
        data: &mut SolverData,
    ) {
        dispatch!(self, j => j.init_velocity_constraints(body_a, body_b, bodies, data))
    }

    fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        dispatch!(self, j => j.solve_velocity_constraints(data))
    }

    fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        dispatch!(self, j => j.solve_position_constraints(data))
    }

    fn anchor_a(&self, body_a: &Body) -> Vector {
        dispatch!(self, j => j.anchor_a(body_a))
    }

    fn anchor_b(&self, body_b: &Body) -> Vector {
        dispatch!(self, j => j.anchor_b(body_b))
    }

    fn reaction_force(&self, inv_dt: Real) -> Vector {
        dispatch!(self, j => j.reaction_force(inv_dt))
    }

    fn reaction_torque(&self, inv_dt: Real) -> Real {
        dispatch!(self, j => j.reaction_torque(inv_dt))
    }
}

/// The description of a joint, consumed by `World::create_joint`.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum JointDesc {
    /// A distance joint.
    Distance(DistanceJointDesc),
    /// A revolute joint.
    Revolute(RevoluteJointDesc),
    /// A prismatic joint.
    Prismatic(PrismaticJointDesc),
    /// A gear joint.
    Gear(GearJointDesc),
    /// A mouse joint.
    Mouse(MouseJointDesc),
    /// A weld joint.
    Weld(WeldJointDesc),
}

macro_rules! impl_from_desc(
    ($($desc: ident => $variant: ident),*) => {$(
        impl From<$desc> for JointDesc {
            fn from(desc: $desc) -> Self {
                JointDesc::$variant(desc)
            }
        }
    )*}
);

impl_from_desc!(
    DistanceJointDesc => Distance,
    RevoluteJointDesc => Revolute,
    PrismaticJointDesc => Prismatic,
    GearJointDesc => Gear,
    MouseJointDesc => Mouse,
    WeldJointDesc => Weld
);

impl JointDesc {
    /// Whether the bodies attached by the described joint may collide.
    pub fn collide_connected(&self) -> bool {
        match self {
            JointDesc::Distance(d) => d.collide_connected,
            JointDesc::Revolute(d) => d.collide_connected,
            JointDesc::Prismatic(d) => d.collide_connected,
            JointDesc::Gear(d) => d.collide_connected,
            JointDesc::Mouse(d) => d.collide_connected,
            JointDesc::Weld(d) => d.collide_connected,
        }
    }

    /// Builds the joint, validating its bodies and, for gears, the coupled joints.
    pub(crate) fn build(&self, joints: &JointSet, bodies: &BodySet) -> WorldResult<Joint> {
        let check = |a: BodyHandle, b: BodyHandle| -> WorldResult<(BodyHandle, BodyHandle)> {
            if bodies.contains(a) && bodies.contains(b) {
                Ok((a, b))
            } else {
                Err(WorldError::InvalidBody)
            }
        };

        let ((body_a, body_b), kind) = match self {
            JointDesc::Distance(d) => (
                check(d.body_a, d.body_b)?,
                JointKind::Distance(DistanceJoint::new(d)),
            ),
            JointDesc::Revolute(d) => (
                check(d.body_a, d.body_b)?,
                JointKind::Revolute(RevoluteJoint::new(d)),
            ),
            JointDesc::Prismatic(d) => (
                check(d.body_a, d.body_b)?,
                JointKind::Prismatic(PrismaticJoint::new(d)),
            ),
            JointDesc::Weld(d) => (
                check(d.body_a, d.body_b)?,
                JointKind::Weld(WeldJoint::new(d)),
            ),
            JointDesc::Mouse(d) => {
                let bodies_ab = check(d.body_a, d.body_b)?;
                let body_b = bodies.get(d.body_b).ok_or(WorldError::InvalidBody)?;
                (bodies_ab, JointKind::Mouse(MouseJoint::new(d, body_b)))
            }
            JointDesc::Gear(d) => {
                let joint1 = joints.get(d.joint1).ok_or(WorldError::InvalidJoint)?;
                let joint2 = joints.get(d.joint2).ok_or(WorldError::InvalidJoint)?;
                let gear = GearJoint::new(d, joint1, joint2, bodies)?;
                (
                    check(joint1.body_b, joint2.body_b)?,
                    JointKind::Gear(gear),
                )
            }
        };

        Ok(Joint {
            body_a,
            body_b,
            collide_connected: self.collide_connected(),
            island: false,
            kind,
            user_data: None,
        })
    }
}

/// A joint constraining the relative motion of two bodies.
pub struct Joint {
    pub(crate) body_a: BodyHandle,
    pub(crate) body_b: BodyHandle,
    pub(crate) collide_connected: bool,
    pub(crate) island: bool,
    kind: JointKind,
    user_data: Option<Box<dyn UserData>>,
}

impl Joint {
    /// The first attached body.
    #[inline]
    pub fn body_a(&self) -> BodyHandle {
        self.body_a
    }

    /// The second attached body.
    #[inline]
    pub fn body_b(&self) -> BodyHandle {
        self.body_b
    }

    /// Can the attached bodies collide?
    #[inline]
    pub fn collide_connected(&self) -> bool {
        self.collide_connected
    }

    /// The type of this joint.
    pub fn joint_type(&self) -> JointType {
        self.kind.joint_type()
    }

    /// The joint-specific state.
    pub fn kind(&self) -> &JointKind {
        &self.kind
    }

    /// The mutable joint-specific state.
    ///
    /// Changing motor or target parameters this way does not wake up the attached bodies.
    pub fn kind_mut(&mut self) -> &mut JointKind {
        &mut self.kind
    }

    /// The anchor point on the first body, in world coordinates.
    pub fn anchor_a(&self, bodies: &BodySet) -> Option<Vector> {
        bodies.get(self.body_a).map(|b| self.kind.anchor_a(b))
    }

    /// The anchor point on the second body, in world coordinates.
    pub fn anchor_b(&self, bodies: &BodySet) -> Option<Vector> {
        bodies.get(self.body_b).map(|b| self.kind.anchor_b(b))
    }

    /// The reaction force on the second body at the joint anchor, in Newtons.
    pub fn reaction_force(&self, inv_dt: Real) -> Vector {
        self.kind.reaction_force(inv_dt)
    }

    /// The reaction torque on the second body, in N*m.
    pub fn reaction_torque(&self, inv_dt: Real) -> Real {
        self.kind.reaction_torque(inv_dt)
    }

    /// Whether this joint is a gear coupling the joint `other`.
    pub(crate) fn is_gear_of(&self, other: JointHandle) -> bool {
        match &self.kind {
            JointKind::Gear(gear) => gear.joint1() == other || gear.joint2() == other,
            _ => false,
        }
    }

    pub(crate) fn init_velocity_constraints(&mut self, bodies: &BodySet, data: &mut SolverData) {
        if let (Some(body_a), Some(body_b)) = (bodies.get(self.body_a), bodies.get(self.body_b)) {
            self.kind
                .init_velocity_constraints(body_a, body_b, bodies, data);
        }
    }

    pub(crate) fn solve_velocity_constraints(&mut self, data: &mut SolverData) {
        self.kind.solve_velocity_constraints(data)
    }

    pub(crate) fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool {
        self.kind.solve_position_constraints(data)
    }

    /// User data attached to this joint.
    pub fn user_data(&self) -> Option<&dyn UserData> {
        self.user_data.as_deref()
    }

    /// Sets the user data attached to this joint.
    pub fn set_user_data(&mut self, data: Option<Box<dyn UserData>>) {
        self.user_data = data;
    }
}
