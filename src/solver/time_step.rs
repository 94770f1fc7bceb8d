use crate::math::{Real, Vector};
use crate::solver::IntegrationParameters;

/// The time step of one solver pass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TimeStep {
    /// The time step.
    pub dt: Real,
    /// Inverse time step (0 if `dt == 0`).
    pub inv_dt: Real,
    /// `dt * inv_dt0`: ratio between this time step and the previous one.
    pub dt_ratio: Real,
    /// Number of velocity iterations.
    pub velocity_iterations: usize,
    /// Number of position iterations.
    pub position_iterations: usize,
    /// Warm start the velocity solver with the scaled impulses of the previous step.
    pub warm_starting: bool,
}

impl TimeStep {
    /// A time step of `dt` following a step whose inverse time step was `inv_dt0`.
    pub fn new(
        dt: Real,
        inv_dt0: Real,
        velocity_iterations: usize,
        position_iterations: usize,
        warm_starting: bool,
    ) -> Self {
        let inv_dt = if dt > 0.0 { 1.0 / dt } else { 0.0 };

        TimeStep {
            dt,
            inv_dt,
            dt_ratio: inv_dt0 * dt,
            velocity_iterations,
            position_iterations,
            warm_starting,
        }
    }
}

/// Position of the center of mass of a body during a solver pass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Position {
    /// Center of mass.
    pub c: Vector,
    /// Angle.
    pub a: Real,
}

/// Velocity of a body during a solver pass.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Velocity {
    /// Linear velocity of the center of mass.
    pub v: Vector,
    /// Angular velocity.
    pub w: Real,
}

/// Everything a joint needs to solve its constraints.
///
/// Positions and velocities are indexed by the island index of the bodies.
pub struct SolverData<'a> {
    /// The time step.
    pub step: TimeStep,
    /// Solver parameters.
    pub params: &'a IntegrationParameters,
    /// Positions of the island bodies.
    pub positions: &'a mut [Position],
    /// Velocities of the island bodies.
    pub velocities: &'a mut [Velocity],
}
