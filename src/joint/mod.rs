//! Joints and their constraint solvers.

pub use self::distance_joint::{DistanceJoint, DistanceJointDesc};
pub use self::gear_joint::{GearJoint, GearJointDesc};
pub use self::joint::{Joint, JointDesc, JointHandle, JointKind, JointSet, JointType};
pub use self::joint_constraint::{JointConstraint, LimitState};
pub use self::mouse_joint::{MouseJoint, MouseJointDesc};
pub use self::prismatic_joint::{PrismaticJoint, PrismaticJointDesc};
pub use self::revolute_joint::{RevoluteJoint, RevoluteJointDesc};
pub use self::weld_joint::{WeldJoint, WeldJointDesc};

mod distance_joint;
mod gear_joint;
mod joint;
mod joint_constraint;
mod mouse_joint;
mod prismatic_joint;
mod revolute_joint;
mod weld_joint;
