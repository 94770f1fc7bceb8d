use crate::collision::{Manifold, ManifoldKind, WorldManifold};
use crate::detection::{ContactHandle, ContactSet};
use crate::math::{self, Isometry, Matrix, Real, Rotation, Translation, Vector};
use crate::object::{BodySet, FixtureSet};
use crate::settings::{LINEAR_SLOP, MAX_CONDITION_NUMBER, MAX_MANIFOLD_POINTS};
use crate::solver::{IntegrationParameters, Position, TimeStep, Velocity};

/// Contact impulses reported to the post-solve listener.
///
/// The values are the accumulated impulses of the velocity solver, so they may be used
/// to estimate the contact forces (divide by the time step).
#[derive(Copy, Clone, Debug, Default, PartialEq)]
pub struct ContactImpulse {
    /// Normal impulse of each contact point.
    pub normal_impulses: [Real; MAX_MANIFOLD_POINTS],
    /// Friction impulse of each contact point.
    pub tangent_impulses: [Real; MAX_MANIFOLD_POINTS],
    /// Number of valid impulses.
    pub count: usize,
}

#[derive(Copy, Clone, Debug, Default)]
struct VelocityConstraintPoint {
    r_a: Vector,
    r_b: Vector,
    normal_impulse: Real,
    tangent_impulse: Real,
    normal_mass: Real,
    tangent_mass: Real,
    velocity_bias: Real,
}

#[derive(Clone, Debug)]
pub(crate) struct ContactVelocityConstraint {
    points: [VelocityConstraintPoint; MAX_MANIFOLD_POINTS],
    normal: Vector,
    normal_mass: Matrix,
    k: Matrix,
    index_a: usize,
    index_b: usize,
    inv_mass_a: Real,
    inv_mass_b: Real,
    inv_i_a: Real,
    inv_i_b: Real,
    friction: Real,
    restitution: Real,
    tangent_speed: Real,
    pub(crate) point_count: usize,
}

#[derive(Clone, Debug)]
struct ContactPositionConstraint {
    manifold: Manifold,
    index_a: usize,
    index_b: usize,
    inv_mass_a: Real,
    inv_mass_b: Real,
    local_center_a: Vector,
    local_center_b: Vector,
    inv_i_a: Real,
    inv_i_b: Real,
    radius_a: Real,
    radius_b: Real,
}

struct PositionSolverManifold {
    normal: Vector,
    point: Vector,
    separation: Real,
}

impl PositionSolverManifold {
    fn new(pc: &ContactPositionConstraint, xf_a: &Isometry, xf_b: &Isometry, index: usize) -> Self {
        let manifold = &pc.manifold;
        debug_assert!(manifold.point_count > 0);

        match manifold.kind {
            ManifoldKind::Circles => {
                let point_a = math::transform(xf_a, &manifold.local_point);
                let point_b = math::transform(xf_b, &manifold.points[0].local_point);
                let mut normal = point_b - point_a;
                let _ = math::normalize(&mut normal);

                PositionSolverManifold {
                    normal,
                    point: (point_a + point_b) * 0.5,
                    separation: (point_b - point_a).dot(&normal) - pc.radius_a - pc.radius_b,
                }
            }
            ManifoldKind::FaceA => {
                let normal = xf_a.rotation * manifold.local_normal;
                let plane_point = math::transform(xf_a, &manifold.local_point);
                let clip_point = math::transform(xf_b, &manifold.points[index].local_point);

                PositionSolverManifold {
                    normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(&normal) - pc.radius_a - pc.radius_b,
                }
            }
            ManifoldKind::FaceB => {
                let normal = xf_b.rotation * manifold.local_normal;
                let plane_point = math::transform(xf_b, &manifold.local_point);
                let clip_point = math::transform(xf_a, &manifold.points[index].local_point);

                // Ensure normal points from A to B.
                PositionSolverManifold {
                    normal: -normal,
                    point: clip_point,
                    separation: (clip_point - plane_point).dot(&normal) - pc.radius_a - pc.radius_b,
                }
            }
        }
    }
}

fn body_transform(position: &Position, local_center: &Vector) -> Isometry {
    let q = Rotation::new(position.a);
    let p = position.c - q * *local_center;
    Isometry::from_parts(Translation::from(p), q)
}

/// Sequential impulse solver of the contact constraints of an island.
///
/// The constraint buffers are reused from one island to the next and only grow.
pub struct ContactSolver {
    params: IntegrationParameters,
    contacts: Vec<ContactHandle>,
    position_constraints: Vec<ContactPositionConstraint>,
    pub(crate) velocity_constraints: Vec<ContactVelocityConstraint>,
}

impl Default for ContactSolver {
    fn default() -> Self {
        Self::new()
    }
}

impl ContactSolver {
    /// Creates a solver with empty constraint buffers.
    pub fn new() -> Self {
        ContactSolver {
            params: IntegrationParameters::default(),
            contacts: Vec::new(),
            position_constraints: Vec::new(),
            velocity_constraints: Vec::new(),
        }
    }

    /// Number of contact constraints.
    pub fn len(&self) -> usize {
        self.contacts.len()
    }

    /// Whether there are no contact constraints.
    pub fn is_empty(&self) -> bool {
        self.contacts.is_empty()
    }

    /// Builds the constraints of `contacts`, reading the accumulated impulses of their
    /// manifolds for warm starting.
    ///
    /// Bodies must have their island index set.
    pub fn initialize(
        &mut self,
        step: &TimeStep,
        params: &IntegrationParameters,
        contacts: &[ContactHandle],
        contact_set: &ContactSet,
        fixtures: &FixtureSet,
        bodies: &BodySet,
    ) {
        self.params = *params;
        self.contacts.clear();
        self.contacts.extend_from_slice(contacts);
        self.position_constraints.clear();
        self.velocity_constraints.clear();

        for handle in contacts {
            let contact = &contact_set[*handle];
            let radius_a = fixtures[contact.fixture_a].shape().radius();
            let radius_b = fixtures[contact.fixture_b].shape().radius();
            let body_a = &bodies[contact.body_a];
            let body_b = &bodies[contact.body_b];
            let manifold = &contact.manifold;

            let point_count = manifold.point_count;
            debug_assert!(point_count > 0);

            let mut points = [VelocityConstraintPoint::default(); MAX_MANIFOLD_POINTS];

            for (vcp, cp) in points.iter_mut().zip(manifold.points()) {
                if step.warm_starting {
                    vcp.normal_impulse = step.dt_ratio * cp.normal_impulse;
                    vcp.tangent_impulse = step.dt_ratio * cp.tangent_impulse;
                }
            }

            self.velocity_constraints.push(ContactVelocityConstraint {
                points,
                normal: Vector::zeros(),
                normal_mass: Matrix::zeros(),
                k: Matrix::zeros(),
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                inv_i_a: body_a.inv_inertia,
                inv_i_b: body_b.inv_inertia,
                friction: contact.friction,
                restitution: contact.restitution,
                tangent_speed: contact.tangent_speed,
                point_count,
            });

            self.position_constraints.push(ContactPositionConstraint {
                manifold: *manifold,
                index_a: body_a.island_index,
                index_b: body_b.island_index,
                inv_mass_a: body_a.inv_mass,
                inv_mass_b: body_b.inv_mass,
                local_center_a: body_a.sweep.local_center,
                local_center_b: body_b.sweep.local_center,
                inv_i_a: body_a.inv_inertia,
                inv_i_b: body_b.inv_inertia,
                radius_a,
                radius_b,
            });
        }
    }

    /// Computes the contact points, effective masses and restitution biases at the
    /// positions of the solver.
    pub fn initialize_velocity_constraints(
        &mut self,
        positions: &[Position],
        velocities: &[Velocity],
    ) {
        let velocity_threshold = self.params.velocity_threshold;
        let block_solve = self.params.block_solve;

        for (vc, pc) in self
            .velocity_constraints
            .iter_mut()
            .zip(self.position_constraints.iter())
        {
            let (m_a, m_b) = (vc.inv_mass_a, vc.inv_mass_b);
            let (i_a, i_b) = (vc.inv_i_a, vc.inv_i_b);

            let c_a = positions[vc.index_a].c;
            let c_b = positions[vc.index_b].c;
            let Velocity { v: v_a, w: w_a } = velocities[vc.index_a];
            let Velocity { v: v_b, w: w_b } = velocities[vc.index_b];

            let xf_a = body_transform(&positions[vc.index_a], &pc.local_center_a);
            let xf_b = body_transform(&positions[vc.index_b], &pc.local_center_b);

            let world_manifold =
                WorldManifold::new(&pc.manifold, &xf_a, pc.radius_a, &xf_b, pc.radius_b);

            vc.normal = world_manifold.normal;
            let tangent = math::cross_vs(&vc.normal, 1.0);

            for (j, vcp) in vc.points[..vc.point_count].iter_mut().enumerate() {
                vcp.r_a = world_manifold.points[j] - c_a;
                vcp.r_b = world_manifold.points[j] - c_b;

                let rn_a = math::cross(&vcp.r_a, &vc.normal);
                let rn_b = math::cross(&vcp.r_b, &vc.normal);
                let k_normal = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;
                vcp.normal_mass = if k_normal > 0.0 { 1.0 / k_normal } else { 0.0 };

                let rt_a = math::cross(&vcp.r_a, &tangent);
                let rt_b = math::cross(&vcp.r_b, &tangent);
                let k_tangent = m_a + m_b + i_a * rt_a * rt_a + i_b * rt_b * rt_b;
                vcp.tangent_mass = if k_tangent > 0.0 { 1.0 / k_tangent } else { 0.0 };

                // Setup a velocity bias for restitution.
                vcp.velocity_bias = 0.0;
                let v_rel = vc.normal.dot(
                    &(v_b + math::cross_sv(w_b, &vcp.r_b) - v_a - math::cross_sv(w_a, &vcp.r_a)),
                );
                if v_rel < -velocity_threshold {
                    vcp.velocity_bias = -vc.restitution * v_rel;
                }
            }

            // If we have two points, then prepare the block solver.
            if vc.point_count == 2 && block_solve {
                let vcp1 = &vc.points[0];
                let vcp2 = &vc.points[1];

                let rn1_a = math::cross(&vcp1.r_a, &vc.normal);
                let rn1_b = math::cross(&vcp1.r_b, &vc.normal);
                let rn2_a = math::cross(&vcp2.r_a, &vc.normal);
                let rn2_b = math::cross(&vcp2.r_b, &vc.normal);

                let k11 = m_a + m_b + i_a * rn1_a * rn1_a + i_b * rn1_b * rn1_b;
                let k22 = m_a + m_b + i_a * rn2_a * rn2_a + i_b * rn2_b * rn2_b;
                let k12 = m_a + m_b + i_a * rn1_a * rn2_a + i_b * rn1_b * rn2_b;

                // Ensure a reasonable condition number.
                if k11 * k11 < MAX_CONDITION_NUMBER * (k11 * k22 - k12 * k12) {
                    // K is safe to invert.
                    vc.k = Matrix::new(k11, k12, k12, k22);
                    vc.normal_mass = math::inverse22(&vc.k);
                } else {
                    // The constraints are redundant, just use one.
                    vc.point_count = 1;
                }
            }
        }
    }

    /// Applies the scaled impulses of the previous step.
    pub fn warm_start(&mut self, velocities: &mut [Velocity]) {
        for vc in &self.velocity_constraints {
            let (m_a, m_b) = (vc.inv_mass_a, vc.inv_mass_b);
            let (i_a, i_b) = (vc.inv_i_a, vc.inv_i_b);
            let mut vel_a = velocities[vc.index_a];
            let mut vel_b = velocities[vc.index_b];

            let normal = vc.normal;
            let tangent = math::cross_vs(&normal, 1.0);

            for vcp in &vc.points[..vc.point_count] {
                let p = normal * vcp.normal_impulse + tangent * vcp.tangent_impulse;
                vel_a.w -= i_a * math::cross(&vcp.r_a, &p);
                vel_a.v -= p * m_a;
                vel_b.w += i_b * math::cross(&vcp.r_b, &p);
                vel_b.v += p * m_b;
            }

            velocities[vc.index_a] = vel_a;
            velocities[vc.index_b] = vel_b;
        }
    }

    /// One iteration of the velocity solver: friction first, then the normal impulses.
    pub fn solve_velocity_constraints(&mut self, velocities: &mut [Velocity]) {
        let block_solve = self.params.block_solve;

        for vc in &mut self.velocity_constraints {
            let (m_a, m_b) = (vc.inv_mass_a, vc.inv_mass_b);
            let (i_a, i_b) = (vc.inv_i_a, vc.inv_i_b);
            let point_count = vc.point_count;

            let Velocity { v: mut v_a, w: mut w_a } = velocities[vc.index_a];
            let Velocity { v: mut v_b, w: mut w_b } = velocities[vc.index_b];

            let normal = vc.normal;
            let tangent = math::cross_vs(&normal, 1.0);
            let friction = vc.friction;

            debug_assert!(point_count == 1 || point_count == 2);

            // Solve tangent constraints first because non-penetration is more important
            // than friction.
            for vcp in &mut vc.points[..point_count] {
                // Relative velocity at contact.
                let dv =
                    v_b + math::cross_sv(w_b, &vcp.r_b) - v_a - math::cross_sv(w_a, &vcp.r_a);

                // Compute tangent force.
                let vt = dv.dot(&tangent) - vc.tangent_speed;
                let lambda = vcp.tangent_mass * -vt;

                // Clamp the accumulated force.
                let max_friction = friction * vcp.normal_impulse;
                let new_impulse = (vcp.tangent_impulse + lambda).max(-max_friction).min(max_friction);
                let lambda = new_impulse - vcp.tangent_impulse;
                vcp.tangent_impulse = new_impulse;

                // Apply contact impulse.
                let p = tangent * lambda;
                v_a -= p * m_a;
                w_a -= i_a * math::cross(&vcp.r_a, &p);
                v_b += p * m_b;
                w_b += i_b * math::cross(&vcp.r_b, &p);
            }

            if point_count == 1 || !block_solve {
                for vcp in &mut vc.points[..point_count] {
                    // Relative velocity at contact.
                    let dv = v_b + math::cross_sv(w_b, &vcp.r_b)
                        - v_a
                        - math::cross_sv(w_a, &vcp.r_a);

                    // Compute normal impulse.
                    let vn = dv.dot(&normal);
                    let lambda = -vcp.normal_mass * (vn - vcp.velocity_bias);

                    // Clamp the accumulated impulse.
                    let new_impulse = (vcp.normal_impulse + lambda).max(0.0);
                    let lambda = new_impulse - vcp.normal_impulse;
                    vcp.normal_impulse = new_impulse;

                    // Apply contact impulse.
                    let p = normal * lambda;
                    v_a -= p * m_a;
                    w_a -= i_a * math::cross(&vcp.r_a, &p);
                    v_b += p * m_b;
                    w_b += i_b * math::cross(&vcp.r_b, &p);
                }
            } else {
                // Block solver developed in collaboration with Dirk Gregorius.
                //
                // vn = A * x + b, vn >= 0, x >= 0 and vn_i * x_i = 0 with i = 1..2.
                // A = J * W * JT and J = ( -n, -r1 x n, n, r2 x n ).
                // b = vn0 - velocity_bias.
                //
                // The system is solved using the "Total enumeration method" (s. Murty). The
                // complementary constraint vn_i * x_i implies that we must have in any
                // solution either vn_i = 0 or x_i = 0. So for the 2D contact problem the
                // cases vn1 = 0 and vn2 = 0, x1 = 0 and x2 = 0, x1 = 0 and vn2 = 0,
                // x2 = 0 and vn1 = 0 need to be tested. The first valid solution that
                // satisfies the problem is chosen.
                //
                // In order to account for the accumulated impulse 'a' (because of the
                // iterative nature of the solver which only requires that the accumulated
                // impulse is clamped and not the incremental impulse) we change the impulse
                // variable (x_i).
                //
                // Substitute:
                //
                // x = a + d
                //
                // a := old total impulse
                // x := new total impulse
                // d := incremental impulse
                //
                // For the current iteration we extend the formula for the incremental
                // impulse to compute the new total impulse:
                //
                // vn = A * d + b
                //    = A * (x - a) + b
                //    = A * x + b - A * a
                //    = A * x + b'
                // b' = b - A * a;
                let cp1 = vc.points[0];
                let cp2 = vc.points[1];

                let a = Vector::new(cp1.normal_impulse, cp2.normal_impulse);
                debug_assert!(a.x >= 0.0 && a.y >= 0.0);

                // Relative velocity at contact.
                let dv1 = v_b + math::cross_sv(w_b, &cp1.r_b) - v_a - math::cross_sv(w_a, &cp1.r_a);
                let dv2 = v_b + math::cross_sv(w_b, &cp2.r_b) - v_a - math::cross_sv(w_a, &cp2.r_a);

                // Compute normal velocity.
                let vn1 = dv1.dot(&normal);
                let vn2 = dv2.dot(&normal);

                // Compute b'.
                let b = Vector::new(vn1 - cp1.velocity_bias, vn2 - cp2.velocity_bias) - vc.k * a;

                let solution = solve_block_lcp(&vc.k, &vc.normal_mass, cp1.normal_mass, cp2.normal_mass, &b);

                // No solution, give up. This is hit sometimes, but it doesn't seem to
                // matter.
                if let Some(x) = solution {
                    // Get the incremental impulse.
                    let d = x - a;

                    // Apply incremental impulse.
                    let p1 = normal * d.x;
                    let p2 = normal * d.y;
                    v_a -= (p1 + p2) * m_a;
                    w_a -= i_a * (math::cross(&cp1.r_a, &p1) + math::cross(&cp2.r_a, &p2));
                    v_b += (p1 + p2) * m_b;
                    w_b += i_b * (math::cross(&cp1.r_b, &p1) + math::cross(&cp2.r_b, &p2));

                    // Accumulate.
                    vc.points[0].normal_impulse = x.x;
                    vc.points[1].normal_impulse = x.y;
                }
            }

            velocities[vc.index_a] = Velocity { v: v_a, w: w_a };
            velocities[vc.index_b] = Velocity { v: v_b, w: w_b };
        }
    }

    /// Writes the accumulated impulses back to the contact manifolds.
    pub fn store_impulses(&self, contact_set: &mut ContactSet) {
        for (handle, vc) in self.contacts.iter().zip(self.velocity_constraints.iter()) {
            if let Some(contact) = contact_set.get_mut(*handle) {
                let points = &mut contact.manifold.points;

                for (mp, vcp) in points.iter_mut().zip(&vc.points[..vc.point_count]) {
                    mp.normal_impulse = vcp.normal_impulse;
                    mp.tangent_impulse = vcp.tangent_impulse;
                }
            }
        }
    }

    /// One iteration of the position solver. Returns `true` if the overlap of every
    /// contact is within the slop tolerance.
    pub fn solve_position_constraints(&self, positions: &mut [Position]) -> bool {
        let min_separation = self.solve_positions(positions, self.params.baumgarte, None);

        // We can't expect min_separation >= -LINEAR_SLOP because we don't push the
        // separation above -LINEAR_SLOP.
        min_separation > -3.0 * LINEAR_SLOP
    }

    /// One iteration of the position solver of a time-of-impact sub-step. Only the two
    /// bodies with the island indices `toi_index_a` and `toi_index_b` are moved.
    pub fn solve_toi_position_constraints(
        &self,
        positions: &mut [Position],
        toi_index_a: usize,
        toi_index_b: usize,
    ) -> bool {
        let min_separation = self.solve_positions(
            positions,
            self.params.toi_baumgarte,
            Some((toi_index_a, toi_index_b)),
        );

        // We can't expect min_separation >= -LINEAR_SLOP because we don't push the
        // separation above -LINEAR_SLOP.
        min_separation >= -1.5 * LINEAR_SLOP
    }

    fn solve_positions(
        &self,
        positions: &mut [Position],
        baumgarte: Real,
        toi_indices: Option<(usize, usize)>,
    ) -> Real {
        let max_linear_correction = self.params.max_linear_correction;
        let mut min_separation: Real = 0.0;

        for pc in &self.position_constraints {
            let (index_a, index_b) = (pc.index_a, pc.index_b);
            let moves = |index: usize| {
                toi_indices.map_or(true, |(toi_a, toi_b)| index == toi_a || index == toi_b)
            };

            let (m_a, i_a) = if moves(index_a) {
                (pc.inv_mass_a, pc.inv_i_a)
            } else {
                (0.0, 0.0)
            };

            let (m_b, i_b) = if moves(index_b) {
                (pc.inv_mass_b, pc.inv_i_b)
            } else {
                (0.0, 0.0)
            };

            let mut pos_a = positions[index_a];
            let mut pos_b = positions[index_b];

            // Solve normal constraints.
            for j in 0..pc.manifold.point_count {
                let xf_a = body_transform(&pos_a, &pc.local_center_a);
                let xf_b = body_transform(&pos_b, &pc.local_center_b);

                let psm = PositionSolverManifold::new(pc, &xf_a, &xf_b, j);
                let normal = psm.normal;

                let r_a = psm.point - pos_a.c;
                let r_b = psm.point - pos_b.c;

                // Track max constraint error.
                min_separation = min_separation.min(psm.separation);

                // Prevent large corrections and allow slop.
                let c = (baumgarte * (psm.separation + LINEAR_SLOP))
                    .max(-max_linear_correction)
                    .min(0.0);

                // Compute the effective mass.
                let rn_a = math::cross(&r_a, &normal);
                let rn_b = math::cross(&r_b, &normal);
                let k = m_a + m_b + i_a * rn_a * rn_a + i_b * rn_b * rn_b;

                // Compute normal impulse.
                let impulse = if k > 0.0 { -c / k } else { 0.0 };
                let p = normal * impulse;

                pos_a.c -= p * m_a;
                pos_a.a -= i_a * math::cross(&r_a, &p);

                pos_b.c += p * m_b;
                pos_b.a += i_b * math::cross(&r_b, &p);
            }

            positions[index_a] = pos_a;
            positions[index_b] = pos_b;
        }

        min_separation
    }

    /// The accumulated impulses of each contact, for the post-solve listener.
    pub fn post_solve_impulses<'a>(
        &'a self,
    ) -> impl Iterator<Item = (ContactHandle, ContactImpulse)> + 'a {
        self.contacts
            .iter()
            .zip(self.velocity_constraints.iter())
            .map(|(handle, vc)| {
                let mut impulse = ContactImpulse {
                    count: vc.point_count,
                    ..ContactImpulse::default()
                };

                for (j, vcp) in vc.points[..vc.point_count].iter().enumerate() {
                    impulse.normal_impulses[j] = vcp.normal_impulse;
                    impulse.tangent_impulses[j] = vcp.tangent_impulse;
                }

                (*handle, impulse)
            })
    }
}

/// Solves the two-point linear complementarity problem `vn = K x + b`, `x >= 0`, `vn >= 0`
/// by total enumeration, returning `None` if no case is valid.
fn solve_block_lcp(
    k: &Matrix,
    normal_mass: &Matrix,
    normal_mass1: Real,
    normal_mass2: Real,
    b: &Vector,
) -> Option<Vector> {
    // Case 1: vn = 0
    //
    // 0 = A * x + b'
    //
    // Solve for x:
    //
    // x = - inv(A) * b'
    let x = -(normal_mass * b);
    if x.x >= 0.0 && x.y >= 0.0 {
        return Some(x);
    }

    // Case 2: vn1 = 0 and x2 = 0
    //
    //   0 = a11 * x1 + a12 * 0 + b1'
    // vn2 = a21 * x1 + a22 * 0 + b2'
    let x = Vector::new(-normal_mass1 * b.x, 0.0);
    let vn2 = k.m21 * x.x + b.y;
    if x.x >= 0.0 && vn2 >= 0.0 {
        return Some(x);
    }

    // Case 3: vn2 = 0 and x1 = 0
    //
    // vn1 = a11 * 0 + a12 * x2 + b1'
    //   0 = a21 * 0 + a22 * x2 + b2'
    let x = Vector::new(0.0, -normal_mass2 * b.y);
    let vn1 = k.m12 * x.y + b.x;
    if x.y >= 0.0 && vn1 >= 0.0 {
        return Some(x);
    }

    // Case 4: x1 = 0 and x2 = 0
    //
    // vn1 = b1
    // vn2 = b2
    if b.x >= 0.0 && b.y >= 0.0 {
        return Some(Vector::zeros());
    }

    None
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::collision::ManifoldPoint;
    use crate::detection::Contact;
    use crate::object::{BodyDesc, FixtureDesc};
    use crate::shape::Polygon;

    struct TestWorld {
        bodies: BodySet,
        fixtures: FixtureSet,
        contacts: ContactSet,
        handle: ContactHandle,
    }

    // A box resting on a static box, with a two-point face manifold whose points are
    // `spread` apart along the face.
    fn resting_box(spread: Real) -> TestWorld {
        let mut bodies = BodySet::new();
        let mut fixtures = FixtureSet::new();
        let mut contacts = ContactSet::new();

        let ground = bodies.insert(BodyDesc::new().build());
        let body = bodies.insert(BodyDesc::dynamic(Vector::new(0.0, 1.0)).build());
        bodies[ground].island_index = 0;
        bodies[body].island_index = 1;

        let fa = fixtures.insert(FixtureDesc::new(Polygon::cuboid(5.0, 0.5)).build(ground));
        let fb = fixtures.insert(FixtureDesc::new(Polygon::cuboid(0.5, 0.5))
                .density(1.0)
                .build(body));
        bodies[ground].fixtures.push(fa);
        bodies[body].fixtures.push(fb);

        let mut contact = Contact::new(fa, &fixtures[fa], fb, &fixtures[fb]);
        let mut manifold = Manifold::default();
        manifold.kind = ManifoldKind::FaceA;
        manifold.local_normal = Vector::y();
        manifold.local_point = Vector::new(0.0, 0.5);
        manifold.point_count = 2;
        manifold.points[0] = ManifoldPoint {
            local_point: Vector::new(-0.5 * spread, -0.5),
            normal_impulse: 1.0,
            tangent_impulse: 0.5,
            ..ManifoldPoint::default()
        };
        manifold.points[1] = ManifoldPoint {
            local_point: Vector::new(0.5 * spread, -0.5),
            normal_impulse: 2.0,
            tangent_impulse: -0.5,
            ..ManifoldPoint::default()
        };
        contact.manifold = manifold;
        let handle = contacts.insert(contact);

        // Give the dynamic body the mass of its box.
        bodies[body].reset_mass_data(&fixtures);

        TestWorld {
            bodies,
            fixtures,
            contacts,
            handle,
        }
    }

    fn solver_state(world: &TestWorld) -> (Vec<Position>, Vec<Velocity>) {
        let mut positions = Vec::new();
        let mut velocities = Vec::new();

        for (_, body) in world.bodies.iter() {
            positions.push(Position {
                c: body.sweep.c,
                a: body.sweep.a,
            });
            velocities.push(Velocity {
                v: body.linear_velocity,
                w: body.angular_velocity,
            });
        }

        (positions, velocities)
    }

    fn step(warm_starting: bool, dt_ratio: Real) -> TimeStep {
        TimeStep {
            dt: 1.0 / 60.0,
            inv_dt: 60.0,
            dt_ratio,
            velocity_iterations: 8,
            position_iterations: 3,
            warm_starting,
        }
    }

    #[test]
    fn ill_conditioned_block_falls_back_to_one_point() {
        let world = resting_box(1.0e-4);
        let (positions, velocities) = solver_state(&world);
        let mut solver = ContactSolver::new();
        let params = IntegrationParameters::default();

        solver.initialize(
            &step(true, 1.0),
            &params,
            &[world.handle],
            &world.contacts,
            &world.fixtures,
            &world.bodies,
        );
        solver.initialize_velocity_constraints(&positions, &velocities);

        assert_eq!(solver.velocity_constraints[0].point_count, 1);
        assert_eq!(solver.velocity_constraints[0].normal_mass, Matrix::zeros());
    }

    #[test]
    fn well_conditioned_block_keeps_both_points() {
        let world = resting_box(1.0);
        let (positions, velocities) = solver_state(&world);
        let mut solver = ContactSolver::new();
        let params = IntegrationParameters::default();

        solver.initialize(
            &step(true, 1.0),
            &params,
            &[world.handle],
            &world.contacts,
            &world.fixtures,
            &world.bodies,
        );
        solver.initialize_velocity_constraints(&positions, &velocities);

        let vc = &solver.velocity_constraints[0];
        assert_eq!(vc.point_count, 2);
        assert!(relative_eq!(vc.k * vc.normal_mass, Matrix::identity(), epsilon = 1.0e-4));
    }

    #[test]
    fn warm_start_impulses_are_scaled_by_the_dt_ratio() {
        let mut world = resting_box(1.0);
        let (positions, velocities) = solver_state(&world);
        let mut solver = ContactSolver::new();
        let params = IntegrationParameters::default();

        solver.initialize(
            &step(true, 0.5),
            &params,
            &[world.handle],
            &world.contacts,
            &world.fixtures,
            &world.bodies,
        );
        solver.initialize_velocity_constraints(&positions, &velocities);
        solver.store_impulses(&mut world.contacts);

        let points = world.contacts[world.handle].manifold.points;
        assert_eq!(points[0].normal_impulse, 0.5);
        assert_eq!(points[1].normal_impulse, 1.0);
        assert_eq!(points[0].tangent_impulse, 0.25);
        assert_eq!(points[1].tangent_impulse, -0.25);

        // Without warm starting, the impulses start from zero.
        solver.initialize(
            &step(false, 0.5),
            &params,
            &[world.handle],
            &world.contacts,
            &world.fixtures,
            &world.bodies,
        );
        solver.initialize_velocity_constraints(&positions, &velocities);
        let impulses: Vec<_> = solver.post_solve_impulses().collect();
        assert_eq!(impulses.len(), 1);
        assert_eq!(impulses[0].1.normal_impulses, [0.0, 0.0]);
    }

    #[test]
    fn block_lcp_cases() {
        let k = Matrix::new(2.0, 1.0, 1.0, 2.0);
        let normal_mass = math::inverse22(&k);

        // Both points active.
        let x = solve_block_lcp(&k, &normal_mass, 0.5, 0.5, &Vector::new(-3.0, -3.0));
        assert!(relative_eq!(x.unwrap(), Vector::new(1.0, 1.0), epsilon = 1.0e-6));

        // Only the first point pushes.
        let x = solve_block_lcp(&k, &normal_mass, 0.5, 0.5, &Vector::new(-2.0, 4.0));
        assert!(relative_eq!(x.unwrap(), Vector::new(1.0, 0.0), epsilon = 1.0e-6));

        // Separating.
        let x = solve_block_lcp(&k, &normal_mass, 0.5, 0.5, &Vector::new(1.0, 1.0));
        assert_eq!(x, Some(Vector::zeros()));
    }

    #[test]
    fn resting_contact_stops_the_approach() {
        let world = resting_box(1.0);
        let (positions, mut velocities) = solver_state(&world);
        velocities[1].v = Vector::new(0.0, -1.0);

        let mut solver = ContactSolver::new();
        let params = IntegrationParameters::default();
        solver.initialize(
            &step(false, 1.0),
            &params,
            &[world.handle],
            &world.contacts,
            &world.fixtures,
            &world.bodies,
        );
        solver.initialize_velocity_constraints(&positions, &velocities);

        for _ in 0..8 {
            solver.solve_velocity_constraints(&mut velocities);
        }

        assert!(relative_eq!(velocities[1].v, Vector::zeros(), epsilon = 1.0e-4));
        assert!(relative_eq!(velocities[1].w, 0.0, epsilon = 1.0e-4));
        assert_eq!(velocities[0].v, Vector::zeros());
    }
}
