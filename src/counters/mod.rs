//! Per-step timings and event counts.

use std::fmt;

pub use self::profile::{StepProfile, StepStats};
pub use self::timer::Timer;

mod profile;
mod timer;

/// Profiling data of the last `World::step`.
///
/// Counts are always maintained. Timers only run once enabled with
/// [`enable`](#method.enable), since reading the clock is not free on every target.
#[derive(Copy, Clone, Debug, Default)]
pub struct Counters {
    enabled: bool,
    /// Time spent per phase.
    pub profile: StepProfile,
    /// Event counts.
    pub stats: StepStats,
}

/// Generates the `*_started`/`*_completed`/`*_time` triple driving one profile timer.
macro_rules! phase_timer {
    ($($started:ident, $completed:ident, $time:ident => $timer:ident;)*) => {
        impl Counters {
            $(
                #[doc = concat!("Starts timing `", stringify!($timer), "`.")]
                pub fn $started(&mut self) {
                    if self.enabled {
                        self.profile.$timer.resume();
                    }
                }

                #[doc = concat!("Stops timing `", stringify!($timer), "`.")]
                pub fn $completed(&mut self) {
                    if self.enabled {
                        self.profile.$timer.pause();
                    }
                }

                #[doc = concat!("Seconds spent in `", stringify!($timer), "` during the last step.")]
                pub fn $time(&self) -> f64 {
                    self.profile.$timer.time()
                }
            )*
        }
    };
}

phase_timer! {
    collide_started, collide_completed, collide_time => collide;
    particles_started, particles_completed, particles_time => particles;
    solve_started, solve_completed, solve_time => solve;
    solver_init_started, solver_init_completed, solver_init_time => solve_init;
    velocity_iterations_started, velocity_iterations_completed, velocity_iterations_time => solve_velocity;
    position_iterations_started, position_iterations_completed, position_iterations_time => solve_position;
    broad_phase_started, broad_phase_completed, broad_phase_time => broad_phase;
    solve_toi_started, solve_toi_completed, solve_toi_time => solve_toi;
}

impl Counters {
    /// Counters with timing on or off.
    pub fn new(enabled: bool) -> Self {
        Counters {
            enabled,
            ..Default::default()
        }
    }

    /// Turn timing on.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Turn timing off. Timers keep their last values.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Whether timing is on.
    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn step_started(&mut self) {
        self.profile.reset();
        self.stats = StepStats::default();

        if self.enabled {
            self.profile.step.start();
        }
    }

    pub(crate) fn step_completed(&mut self) {
        if self.enabled {
            self.profile.step.pause();
        }
    }

    /// Seconds spent in the whole last step.
    pub fn step_time(&self) -> f64 {
        self.profile.step.time()
    }

    pub(crate) fn island_solved(&mut self, ncontacts: usize) {
        self.stats.islands += 1;
        self.stats.contact_constraints += ncontacts;
    }

    pub(crate) fn toi_started(&mut self) {
        self.stats.toi_queries += 1;

        if self.enabled {
            self.profile.toi_queries.resume();
        }
    }

    pub(crate) fn toi_completed(&mut self) {
        if self.enabled {
            self.profile.toi_queries.pause();
        }
    }

    pub(crate) fn toi_substep_performed(&mut self) {
        self.stats.toi_substeps += 1;
    }

    pub(crate) fn set_ncontact_pairs(&mut self, n: usize) {
        self.stats.contact_pairs = n;
    }
}

impl fmt::Display for Counters {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        if self.enabled {
            self.profile.fmt(f)?;
        }
        self.stats.fmt(f)
    }
}

#[cfg(test)]
mod test {
    use super::Counters;

    #[test]
    fn disabled_counters_still_count() {
        let mut counters = Counters::new(false);
        counters.step_started();
        counters.island_solved(3);
        counters.island_solved(2);
        counters.toi_started();
        counters.toi_completed();
        counters.step_completed();

        assert_eq!(counters.stats.islands, 2);
        assert_eq!(counters.stats.contact_constraints, 5);
        assert_eq!(counters.stats.toi_queries, 1);
        assert!(!counters.profile.step.is_running());
        assert_eq!(counters.step_time(), 0.0);
    }

    #[test]
    fn a_new_step_clears_the_previous_one() {
        let mut counters = Counters::new(true);
        counters.step_started();
        counters.toi_substep_performed();
        counters.step_completed();
        assert_eq!(counters.stats.toi_substeps, 1);

        counters.step_started();
        assert_eq!(counters.stats.toi_substeps, 0);
        assert!(counters.profile.step.is_running());
    }
}
