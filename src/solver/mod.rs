//! Constraint solver.

pub use self::contact_solver::{ContactImpulse, ContactSolver};
pub use self::integration_parameters::IntegrationParameters;
pub use self::island::Island;
pub(crate) use self::island::IslandContext;
pub use self::time_step::{Position, SolverData, TimeStep, Velocity};

mod contact_solver;
mod integration_parameters;
mod island;
mod time_step;
