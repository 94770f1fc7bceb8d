use crate::math::Real;

use std::f32::consts::PI;

/// Parameters of the constraint solver and of the time integration.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct IntegrationParameters {
    /// Scale the impulses of the previous step to warm start the velocity solver.
    pub warm_starting: bool,
    /// Enable the continuous collision detection sub-stepping.
    pub continuous_physics: bool,
    /// Stop after a single time-of-impact event per step (for debugging).
    pub sub_stepping: bool,
    /// Enable the sleeping of bodies.
    pub allow_sleep: bool,
    /// Solve two-point contact manifolds as a 2x2 block.
    pub block_solve: bool,
    /// A velocity threshold for elastic collisions. Any collision with a relative linear
    /// velocity below this threshold will be treated as inelastic.
    pub velocity_threshold: Real,
    /// How much of the position error is resolved in one position iteration.
    pub baumgarte: Real,
    /// The position error correction factor of time-of-impact sub-steps.
    pub toi_baumgarte: Real,
    /// The maximum linear position correction used when solving constraints. This helps to
    /// prevent overshoot.
    pub max_linear_correction: Real,
    /// The maximum angular position correction used when solving constraints.
    pub max_angular_correction: Real,
    /// The maximum linear displacement of a body in one step.
    pub max_translation: Real,
    /// The maximum rotation of a body in one step.
    pub max_rotation: Real,
    /// The time that a body must be still before it will go to sleep.
    pub time_to_sleep: Real,
    /// A body cannot sleep if its linear velocity is above this tolerance.
    pub linear_sleep_tolerance: Real,
    /// A body cannot sleep if its angular velocity is above this tolerance.
    pub angular_sleep_tolerance: Real,
    /// Maximum number of time-of-impact sub-steps per contact and per step.
    pub max_sub_steps: usize,
    /// Maximum number of contacts handled by one time-of-impact island.
    pub max_toi_contacts: usize,
}

impl Default for IntegrationParameters {
    fn default() -> Self {
        IntegrationParameters {
            warm_starting: true,
            continuous_physics: true,
            sub_stepping: false,
            allow_sleep: true,
            block_solve: true,
            velocity_threshold: 1.0,
            baumgarte: 0.2,
            toi_baumgarte: 0.75,
            max_linear_correction: 0.2,
            max_angular_correction: 8.0 / 180.0 * PI,
            max_translation: 2.0,
            max_rotation: 0.5 * PI,
            time_to_sleep: 0.5,
            linear_sleep_tolerance: 0.01,
            angular_sleep_tolerance: 2.0 / 180.0 * PI,
            max_sub_steps: crate::settings::MAX_SUB_STEPS,
            max_toi_contacts: crate::settings::MAX_TOI_CONTACTS,
        }
    }
}
