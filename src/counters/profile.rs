use std::fmt;

use crate::counters::Timer;

/// Time spent in each phase of the last `World::step`.
#[derive(Copy, Clone, Debug, Default)]
pub struct StepProfile {
    /// The whole step.
    pub step: Timer,
    /// Narrow-phase update of every contact.
    pub collide: Timer,
    /// Particle systems.
    pub particles: Timer,
    /// Island construction and the discrete solver.
    pub solve: Timer,
    /// Integration and constraint initialization, summed over islands.
    pub solve_init: Timer,
    /// Velocity iterations, summed over islands.
    pub solve_velocity: Timer,
    /// Position iterations, summed over islands.
    pub solve_position: Timer,
    /// Proxy synchronization and pair finding.
    pub broad_phase: Timer,
    /// Continuous collision handling.
    pub solve_toi: Timer,
    /// Time-of-impact queries, summed over candidate pairs.
    pub toi_queries: Timer,
}

impl StepProfile {
    fn timers_mut(&mut self) -> [&mut Timer; 10] {
        [
            &mut self.step,
            &mut self.collide,
            &mut self.particles,
            &mut self.solve,
            &mut self.solve_init,
            &mut self.solve_velocity,
            &mut self.solve_position,
            &mut self.broad_phase,
            &mut self.solve_toi,
            &mut self.toi_queries,
        ]
    }

    pub(crate) fn reset(&mut self) {
        for timer in self.timers_mut().iter_mut() {
            timer.reset();
        }
    }
}

impl fmt::Display for StepProfile {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(f, "step: {}", self.step)?;
        writeln!(f, "  collide: {}", self.collide)?;
        writeln!(f, "  particles: {}", self.particles)?;
        writeln!(f, "  solve: {}", self.solve)?;
        writeln!(f, "    init: {}", self.solve_init)?;
        writeln!(f, "    velocity: {}", self.solve_velocity)?;
        writeln!(f, "    position: {}", self.solve_position)?;
        writeln!(f, "    broad-phase: {}", self.broad_phase)?;
        writeln!(f, "  solve TOI: {}", self.solve_toi)?;
        writeln!(f, "    TOI queries: {}", self.toi_queries)
    }
}

/// Event counts of the last `World::step`. Maintained even when timing is off.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct StepStats {
    /// Islands handed to the discrete solver.
    pub islands: usize,
    /// Contact constraints solved by those islands.
    pub contact_constraints: usize,
    /// Contacts alive after the broad-phase pass.
    pub contact_pairs: usize,
    /// Time-of-impact queries issued.
    pub toi_queries: usize,
    /// Time-of-impact sub-steps taken.
    pub toi_substeps: usize,
}

impl fmt::Display for StepStats {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        writeln!(
            f,
            "islands: {}, contact constraints: {}, contact pairs: {}",
            self.islands, self.contact_constraints, self.contact_pairs
        )?;
        writeln!(
            f,
            "TOI queries: {}, TOI sub-steps: {}",
            self.toi_queries, self.toi_substeps
        )
    }
}
