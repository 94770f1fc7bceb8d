use crate::math::{Real, Vector};
use crate::object::{Body, BodySet};
use crate::solver::SolverData;

/// The capabilities every joint provides to the island solver.
///
/// Constraints are solved on the island-local position and velocity arrays of
/// `SolverData`, never on the bodies themselves.
pub trait JointConstraint {
    /// Caches the body data and computes the effective masses, then warm starts.
    fn init_velocity_constraints(
        &mut self,
        body_a: &Body,
        body_b: &Body,
        bodies: &BodySet,
        data: &mut SolverData,
    );

    /// One iteration of the velocity solver.
    fn solve_velocity_constraints(&mut self, data: &mut SolverData);

    /// One iteration of the position solver. Returns `true` if the position error is
    /// within tolerance.
    fn solve_position_constraints(&mut self, data: &mut SolverData) -> bool;

    /// The anchor point on the first body, in world coordinates.
    fn anchor_a(&self, body_a: &Body) -> Vector;

    /// The anchor point on the second body, in world coordinates.
    fn anchor_b(&self, body_b: &Body) -> Vector;

    /// The reaction force on the second body at the joint anchor, in Newtons.
    fn reaction_force(&self, inv_dt: Real) -> Vector;

    /// The reaction torque on the second body, in N*m.
    fn reaction_torque(&self, inv_dt: Real) -> Real;
}

/// Solver data of one body attached to a joint.
#[derive(Copy, Clone, Debug, Default)]
pub(crate) struct SolverBody {
    pub index: usize,
    pub local_center: Vector,
    pub inv_mass: Real,
    pub inv_i: Real,
}

impl SolverBody {
    pub fn new(body: &Body) -> Self {
        SolverBody {
            index: body.island_index,
            local_center: body.sweep.local_center,
            inv_mass: body.inv_mass,
            inv_i: body.inv_inertia,
        }
    }
}

/// The state of a joint limit.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub enum LimitState {
    /// The limit is not active.
    Inactive,
    /// The joint is at its lower limit.
    AtLower,
    /// The joint is at its upper limit.
    AtUpper,
    /// The lower and upper limits are equal.
    Equal,
}

/// Coefficients of a soft constraint with the given natural frequency and damping ratio,
/// for the effective `mass`: `(gamma, beta)` so that the bias is `beta * C`.
pub(crate) fn soft_constraint_coefficients(
    mass: Real,
    frequency_hz: Real,
    damping_ratio: Real,
    dt: Real,
) -> (Real, Real) {
    let omega = 2.0 * std::f32::consts::PI * frequency_hz;
    // Damping coefficient.
    let d = 2.0 * mass * damping_ratio * omega;
    // Spring stiffness.
    let k = mass * omega * omega;

    // magic formulas
    let mut gamma = dt * (d + dt * k);
    if gamma != 0.0 {
        gamma = 1.0 / gamma;
    }

    (gamma, dt * k * gamma)
}
