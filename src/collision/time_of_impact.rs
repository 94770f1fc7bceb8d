use ncollide::interpolation::RigidMotion;
use ncollide::query::{self, TOIStatus};
use ncollide::shape::{Ball, ConvexPolygon};

use crate::math::{Isometry, Real, Sweep};
use crate::settings;
use crate::shape::Shape;

/// Input parameters of a time-of-impact query.
#[derive(Clone, Debug)]
pub struct TOIInput<'a> {
    /// The first shape.
    pub shape_a: &'a Shape,
    /// The second shape.
    pub shape_b: &'a Shape,
    /// Motion of the first body.
    pub sweep_a: Sweep,
    /// Motion of the second body.
    pub sweep_b: Sweep,
    /// Defines the sweep interval `[0, t_max]`.
    pub t_max: Real,
}

/// Outcome of a time-of-impact query.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TOIState {
    /// The query was not performed.
    Unknown,
    /// The root finder could not separate the shapes.
    Failed,
    /// The shapes already overlap at the beginning of the sweep.
    Overlapped,
    /// The shapes touch at `t`.
    Touching,
    /// The shapes never touch during the sweep.
    Separated,
}

/// Result of a time-of-impact query.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TOIOutput {
    /// What happened.
    pub state: TOIState,
    /// The sweep parameter where the state applies.
    pub t: Real,
}

// The motion of the ncollide geometry of a shape carried by a body sweep.
struct ShapeMotion<'a> {
    sweep: &'a Sweep,
    shape: &'a Shape,
}

impl<'a> RigidMotion<Real> for ShapeMotion<'a> {
    fn position_at_time(&self, t: Real) -> Isometry {
        self.shape.geometry_position(&self.sweep.transform_at(t))
    }
}

// The geometry a time-of-impact query sweeps. Circles are scaled down by `scale`.
enum Core<'a> {
    Ball(Ball<Real>),
    Hull(&'a ConvexPolygon<Real>),
}

fn swept_core(shape: &Shape, scale: Real) -> Core<'_> {
    match shape {
        Shape::Circle(c) => Core::Ball(Ball::new(c.radius() * scale)),
        Shape::Polygon(p) => Core::Hull(p.hull()),
    }
}

/// Computes the sweep parameter where the two shapes first come within the target
/// separation `max(linear_slop, total_radius - 3 linear_slop)` of each other.
///
/// `total_radius` is the sum of the skin radii, so the returned `t` leaves the rounded
/// shapes slightly overlapping and the contact solver can act on them in the sub-step.
pub fn time_of_impact(input: &TOIInput) -> TOIOutput {
    let mut sweep_a = input.sweep_a;
    let mut sweep_b = input.sweep_b;

    // Large rotations can make the root finder fail, so normalize the sweep angles.
    sweep_a.normalize();
    sweep_b.normalize();

    let t_max = input.t_max;
    let total_radius = input.shape_a.radius() + input.shape_b.radius();
    let target = settings::LINEAR_SLOP.max(total_radius - 3.0 * settings::LINEAR_SLOP);

    // Circles are swept as smaller balls so that the remaining target distance between
    // the cores is never below the linear slop.
    let ball_radii: Real = [input.shape_a, input.shape_b]
        .iter()
        .filter(|s| s.is_circle())
        .map(|s| s.radius())
        .sum();
    let kept = (target - settings::LINEAR_SLOP).max(0.0).min(ball_radii);
    let scale = if ball_radii > 0.0 {
        kept / ball_radii
    } else {
        0.0
    };
    let core_target = target - kept;

    let motion_a = ShapeMotion {
        sweep: &sweep_a,
        shape: input.shape_a,
    };
    let motion_b = ShapeMotion {
        sweep: &sweep_b,
        shape: input.shape_b,
    };

    let toi = match (
        swept_core(input.shape_a, scale),
        swept_core(input.shape_b, scale),
    ) {
        (Core::Ball(a), Core::Ball(b)) => query::nonlinear_time_of_impact_support_map_support_map(
            &motion_a,
            &a,
            &motion_b,
            &b,
            t_max,
            core_target,
        ),
        (Core::Ball(a), Core::Hull(b)) => query::nonlinear_time_of_impact_support_map_support_map(
            &motion_a,
            &a,
            &motion_b,
            b,
            t_max,
            core_target,
        ),
        (Core::Hull(a), Core::Ball(b)) => query::nonlinear_time_of_impact_support_map_support_map(
            &motion_a,
            a,
            &motion_b,
            &b,
            t_max,
            core_target,
        ),
        (Core::Hull(a), Core::Hull(b)) => query::nonlinear_time_of_impact_support_map_support_map(
            &motion_a,
            a,
            &motion_b,
            b,
            t_max,
            core_target,
        ),
    };

    match toi {
        None => TOIOutput {
            state: TOIState::Separated,
            t: t_max,
        },
        Some(toi) => match toi.status {
            TOIStatus::Converged | TOIStatus::OutOfIterations => TOIOutput {
                state: TOIState::Touching,
                t: toi.toi,
            },
            TOIStatus::Penetrating => TOIOutput {
                state: TOIState::Overlapped,
                t: 0.0,
            },
            TOIStatus::Failed => TOIOutput {
                state: TOIState::Failed,
                t: toi.toi,
            },
        },
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::math::Vector;
    use crate::shape::{Circle, Polygon};

    fn sweep(c0: Vector, c: Vector) -> Sweep {
        Sweep {
            c0,
            c,
            ..Sweep::default()
        }
    }

    #[test]
    fn fast_circle_hits_thin_wall() {
        let wall = Shape::Polygon(Polygon::cuboid(0.05, 5.0));
        let ball = Shape::Circle(Circle::new(0.25));
        let input = TOIInput {
            shape_a: &wall,
            shape_b: &ball,
            sweep_a: Sweep::default(),
            sweep_b: sweep(Vector::new(-10.0, 0.0), Vector::new(10.0, 0.0)),
            t_max: 1.0,
        };

        let output = time_of_impact(&input);
        assert_eq!(output.state, TOIState::Touching);

        // The circle surface reaches the wall at x = -0.05 - polygon radius.
        let x = -10.0 + 20.0 * output.t;
        assert!(x < -0.05 - 0.25 + 0.02);
        assert!(x > -0.05 - 0.25 - 0.05);
    }

    #[test]
    fn rotating_box_hits_box() {
        let a = Shape::Polygon(Polygon::cuboid(0.5, 0.5));
        let b = Shape::Polygon(Polygon::cuboid(2.0, 0.1));
        let mut sweep_b = sweep(Vector::new(0.0, 4.0), Vector::new(0.0, -4.0));
        sweep_b.a = 1.0;

        let output = time_of_impact(&TOIInput {
            shape_a: &a,
            shape_b: &b,
            sweep_a: Sweep::default(),
            sweep_b,
            t_max: 1.0,
        });

        assert_eq!(output.state, TOIState::Touching);
        assert!(output.t > 0.0 && output.t < 0.5);
    }

    #[test]
    fn receding_shapes_are_separated() {
        let a = Shape::Circle(Circle::new(0.5));
        let b = Shape::Circle(Circle::new(0.5));
        let input = TOIInput {
            shape_a: &a,
            shape_b: &b,
            sweep_a: Sweep::default(),
            sweep_b: sweep(Vector::new(2.0, 0.0), Vector::new(5.0, 0.0)),
            t_max: 1.0,
        };

        let output = time_of_impact(&input);
        assert_eq!(output.state, TOIState::Separated);
        assert_eq!(output.t, 1.0);
    }

    #[test]
    fn overlapping_cores_report_overlap() {
        let a = Shape::Polygon(Polygon::cuboid(1.0, 1.0));
        let b = Shape::Polygon(Polygon::cuboid(1.0, 1.0));
        let input = TOIInput {
            shape_a: &a,
            shape_b: &b,
            sweep_a: Sweep::default(),
            sweep_b: sweep(Vector::new(0.5, 0.0), Vector::new(3.0, 0.0)),
            t_max: 1.0,
        };

        assert_eq!(time_of_impact(&input).state, TOIState::Overlapped);
    }
}
