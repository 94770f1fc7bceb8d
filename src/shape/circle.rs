use ncollide::shape::Ball;

use crate::math::{Isometry, Real, Vector};

/// A solid circle.
///
/// The geometry is an ncollide ball placed at `center` in the fixture frame.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Circle {
    /// Center of the circle, in the local frame of the shape.
    pub center: Vector,
    ball: Ball<Real>,
}

impl Circle {
    /// A circle centered at the origin of its local frame.
    pub fn new(radius: Real) -> Self {
        Self::with_center(Vector::zeros(), radius)
    }

    /// A circle centered at `center`.
    pub fn with_center(center: Vector, radius: Real) -> Self {
        debug_assert!(radius > 0.0, "a circle must have a positive radius");
        Circle {
            center,
            ball: Ball::new(radius),
        }
    }

    /// Radius of the circle.
    #[inline]
    pub fn radius(&self) -> Real {
        self.ball.radius
    }

    /// The underlying ball, centered at the origin of `local_frame()`.
    #[inline]
    pub fn ball(&self) -> &Ball<Real> {
        &self.ball
    }

    /// Position of the ball in the fixture frame.
    #[inline]
    pub fn local_frame(&self) -> Isometry {
        Isometry::new(self.center, 0.0)
    }
}
