//! Mathematical aliases and the few helpers the solvers need on top of `nalgebra`.

use na::{Isometry2, Matrix2, Matrix3, Point2, Translation2, UnitComplex, Vector2, Vector3};
use num_traits::Zero;

/// The scalar type used by the whole engine.
pub type Real = f32;

/// The vector type.
pub type Vector = Vector2<Real>;

/// The 3D vector type, used by the 3x3 joint systems.
pub type Vector3d = Vector3<Real>;

/// The point type.
pub type Point = Point2<Real>;

/// The rotation type.
pub type Rotation = UnitComplex<Real>;

/// The translation type.
pub type Translation = Translation2<Real>;

/// The transformation type (position and orientation of a body frame).
pub type Isometry = Isometry2<Real>;

/// The 2x2 matrix type.
pub type Matrix = Matrix2<Real>;

/// The 3x3 matrix type.
pub type Matrix3d = Matrix3<Real>;

/// The axis-aligned bounding box type.
pub type AABB = ncollide::bounding_volume::AABB<Real>;

/// Machine epsilon of the scalar type.
pub const EPSILON: Real = std::f32::EPSILON;

/// Builds an axis-aligned bounding box from its extremal corners.
#[inline]
pub fn aabb(mins: Vector, maxs: Vector) -> AABB {
    AABB::new(Point::from(mins), Point::from(maxs))
}

/// Builds a transform from a translation vector and an angle.
#[inline]
pub fn isometry(position: Vector, angle: Real) -> Isometry {
    Isometry::from_parts(Translation::from(position), Rotation::new(angle))
}

/// Transforms a point expressed as a vector.
#[inline]
pub fn transform(xf: &Isometry, v: &Vector) -> Vector {
    xf.rotation * v + xf.translation.vector
}

/// Inverse-transforms a point expressed as a vector.
#[inline]
pub fn inverse_transform(xf: &Isometry, v: &Vector) -> Vector {
    xf.rotation.inverse() * (v - xf.translation.vector)
}

/// The 2D cross product of two vectors.
#[inline]
pub fn cross(a: &Vector, b: &Vector) -> Real {
    a.x * b.y - a.y * b.x
}

/// The cross product of a vector and a scalar: `(s * v.y, -s * v.x)`.
#[inline]
pub fn cross_vs(v: &Vector, s: Real) -> Vector {
    Vector::new(s * v.y, -s * v.x)
}

/// The cross product of a scalar and a vector: `(-s * v.y, s * v.x)`.
#[inline]
pub fn cross_sv(s: Real, v: &Vector) -> Vector {
    Vector::new(-s * v.y, s * v.x)
}

/// Normalizes `v` in-place unless it is too small. Returns its original length.
#[inline]
pub fn normalize(v: &mut Vector) -> Real {
    let length = v.norm();

    if length < EPSILON {
        return 0.0;
    }

    *v /= length;
    length
}

/// Solves `k * x = b`, returning zero if `k` is singular.
#[inline]
pub fn solve22(k: &Matrix, b: &Vector) -> Vector {
    let mut det = k.m11 * k.m22 - k.m12 * k.m21;

    if !det.is_zero() {
        det = 1.0 / det;
    }

    Vector::new(
        det * (k.m22 * b.x - k.m12 * b.y),
        det * (k.m11 * b.y - k.m21 * b.x),
    )
}

/// The inverse of `k`, or the zero matrix if `k` is singular.
#[inline]
pub fn inverse22(k: &Matrix) -> Matrix {
    k.try_inverse().unwrap_or_else(Matrix::zeros)
}

/// Solves `k * x = b`, returning zero if `k` is singular.
pub fn solve33(k: &Matrix3d, b: &Vector3d) -> Vector3d {
    let ex = k.column(0).into_owned();
    let ey = k.column(1).into_owned();
    let ez = k.column(2).into_owned();

    let mut det = ex.dot(&ey.cross(&ez));

    if !det.is_zero() {
        det = 1.0 / det;
    }

    Vector3d::new(
        det * b.dot(&ey.cross(&ez)),
        det * ex.dot(&b.cross(&ez)),
        det * ex.dot(&ey.cross(b)),
    )
}

/// Solves the upper-left 2x2 block of `k` against `b`, returning zero if it is singular.
pub fn solve33_block22(k: &Matrix3d, b: &Vector) -> Vector {
    let block = Matrix::new(k.m11, k.m12, k.m21, k.m22);
    solve22(&block, b)
}

/// The inverse of the upper-left 2x2 block of `k`, embedded in a 3x3 matrix.
pub fn inverse33_block22(k: &Matrix3d) -> Matrix3d {
    let block = inverse22(&Matrix::new(k.m11, k.m12, k.m21, k.m22));
    Matrix3d::new(
        block.m11, block.m12, 0.0, block.m21, block.m22, 0.0, 0.0, 0.0, 0.0,
    )
}

/// The inverse of a symmetric `k`, or the zero matrix if it is singular.
pub fn symmetric_inverse33(k: &Matrix3d) -> Matrix3d {
    k.try_inverse().unwrap_or_else(Matrix3d::zeros)
}

/// Motion of a body's center of mass during a time step, used for continuous collision.
///
/// The center of mass moves linearly and the angle interpolates linearly between the
/// beginning (`c0`, `a0`) and the end (`c`, `a`) of the step. `alpha0` is the fraction of the
/// step already consumed by the `c0`/`a0` state.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Sweep {
    /// Local center of mass.
    pub local_center: Vector,
    /// Center of mass world position at `alpha0`.
    pub c0: Vector,
    /// Center of mass world position at the end of the step.
    pub c: Vector,
    /// World angle at `alpha0`.
    pub a0: Real,
    /// World angle at the end of the step.
    pub a: Real,
    /// Fraction of the current time step, in `[0, 1)`.
    pub alpha0: Real,
}

impl Default for Sweep {
    fn default() -> Self {
        Sweep {
            local_center: Vector::zeros(),
            c0: Vector::zeros(),
            c: Vector::zeros(),
            a0: 0.0,
            a: 0.0,
            alpha0: 0.0,
        }
    }
}

impl Sweep {
    /// The interpolated transform at `beta` in `[0, 1]`.
    pub fn transform_at(&self, beta: Real) -> Isometry {
        let c = self.c0 * (1.0 - beta) + self.c * beta;
        let angle = self.a0 * (1.0 - beta) + self.a * beta;
        let q = Rotation::new(angle);
        let p = c - q * self.local_center;

        Isometry::from_parts(Translation::from(p), q)
    }

    /// Advances the start of the sweep forward to `alpha`, yielding a new initial state.
    pub fn advance(&mut self, alpha: Real) {
        debug_assert!(self.alpha0 < 1.0);
        debug_assert!(alpha >= self.alpha0, "sweeps never move backward in time");
        let beta = (alpha - self.alpha0) / (1.0 - self.alpha0);
        self.c0 += (self.c - self.c0) * beta;
        self.a0 += beta * (self.a - self.a0);
        self.alpha0 = alpha;
    }

    /// Normalizes the angles to `[-pi, pi]`.
    pub fn normalize(&mut self) {
        let two_pi = 2.0 * std::f32::consts::PI;
        let d = two_pi * (self.a0 / two_pi).floor();
        self.a0 -= d;
        self.a -= d;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn solve22_inverts_regular_systems() {
        let k = Matrix::new(4.0, 1.0, 1.0, 3.0);
        let b = Vector::new(1.0, 2.0);
        let x = solve22(&k, &b);
        assert!(relative_eq!(k * x, b, epsilon = 1.0e-6));
    }

    #[test]
    fn solve22_singular_is_zero() {
        let k = Matrix::new(1.0, 2.0, 2.0, 4.0);
        assert_eq!(solve22(&k, &Vector::new(1.0, 1.0)), Vector::zeros());
    }

    #[test]
    fn solve33_inverts_regular_systems() {
        let k = Matrix3d::new(4.0, 1.0, 0.5, 1.0, 3.0, 0.2, 0.5, 0.2, 2.0);
        let b = Vector3d::new(1.0, -2.0, 0.5);
        let x = solve33(&k, &b);
        assert!(relative_eq!(k * x, b, epsilon = 1.0e-5));
    }

    #[test]
    fn sweep_advance_moves_start_forward() {
        let mut sweep = Sweep {
            c0: Vector::new(0.0, 0.0),
            c: Vector::new(10.0, 0.0),
            a0: 0.0,
            a: 1.0,
            ..Sweep::default()
        };

        sweep.advance(0.5);
        assert!(relative_eq!(sweep.c0, Vector::new(5.0, 0.0)));
        assert!(relative_eq!(sweep.a0, 0.5));

        sweep.advance(0.75);
        assert!(relative_eq!(sweep.c0, Vector::new(7.5, 0.0)));
        assert_eq!(sweep.alpha0, 0.75);

        let xf = sweep.transform_at(1.0);
        assert!(relative_eq!(xf.translation.vector, Vector::new(10.0, 0.0)));
    }
}
