//! Geometric constants shared by the collision and solver modules.
//!
//! Tunables that only affect the solver live in `IntegrationParameters`.

use crate::math::Real;

/// Maximum number of contact points between two convex shapes.
pub const MAX_MANIFOLD_POINTS: usize = 2;

/// Maximum number of vertices of a convex polygon.
pub const MAX_POLYGON_VERTICES: usize = 8;

/// Fattening of the AABBs stored by the broad phase, so that small motions do not require
/// a tree update.
pub const AABB_EXTENSION: Real = 0.1;

/// Prediction factor applied to the displacement of a proxy when its fat AABB is rebuilt.
pub const AABB_MULTIPLIER: Real = 2.0;

/// Collision and constraint tolerance, in meters.
pub const LINEAR_SLOP: Real = 0.005;

/// Collision and constraint tolerance, in radians.
pub const ANGULAR_SLOP: Real = 2.0 / 180.0 * std::f32::consts::PI;

/// Skin radius of polygons.
pub const POLYGON_RADIUS: Real = 2.0 * LINEAR_SLOP;

/// Maximum number of sub-steps per contact in continuous physics simulation.
pub const MAX_SUB_STEPS: usize = 8;

/// Maximum number of contacts handled by a single time-of-impact island.
pub const MAX_TOI_CONTACTS: usize = 32;

/// Maximum condition number of the 2x2 contact block matrix before the block solver is
/// abandoned for a step.
pub const MAX_CONDITION_NUMBER: Real = 1000.0;

/// Number of position iterations of a time-of-impact sub-step.
pub const TOI_POSITION_ITERATIONS: usize = 20;
