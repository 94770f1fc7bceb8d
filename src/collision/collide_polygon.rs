use ncollide::query::{self, Contact, ContactPrediction};
use ncollide::shape::{ConvexPolygonalFeature, ConvexPolyhedron, FeatureId};

use crate::collision::{ContactFeature, FeatureType, Manifold, ManifoldKind};
use crate::math::{Isometry, Real};
use crate::settings;
use crate::shape::Polygon;

// Face B becomes the reference face only if it is better aligned with the contact normal
// than face A by more than this.
const REFERENCE_FACE_TOLERANCE: Real = 0.1 * settings::LINEAR_SLOP;

fn feature_index(id: FeatureId) -> (u8, FeatureType) {
    match id {
        FeatureId::Face(i) => (i as u8, FeatureType::Face),
        FeatureId::Vertex(i) => (i as u8, FeatureType::Vertex),
        FeatureId::Unknown => (0, FeatureType::Vertex),
    }
}

fn contact_feature(id1: FeatureId, id2: FeatureId) -> ContactFeature {
    let (index_a, type_a) = feature_index(id1);
    let (index_b, type_b) = feature_index(id2);

    ContactFeature {
        index_a,
        index_b,
        type_a,
        type_b,
    }
}

/// Computes the contact manifold between two polygons.
///
/// The closest features are found by GJK, or EPA when the cores overlap. The support faces
/// of both polygons along the contact normal are then clipped against each other. The
/// reference face is the one best aligned with the normal, preferring polygon A.
pub fn collide_polygons(
    poly_a: &Polygon,
    xf_a: &Isometry,
    poly_b: &Polygon,
    xf_b: &Isometry,
) -> Manifold {
    let mut manifold = Manifold::default();
    let total_radius = 2.0 * settings::POLYGON_RADIUS;

    let contact = match query::contact_support_map_support_map(
        xf_a,
        poly_a.hull(),
        xf_b,
        poly_b.hull(),
        total_radius,
    ) {
        Some(contact) => contact,
        None => return manifold,
    };

    let mut face_a = ConvexPolygonalFeature::new();
    let mut face_b = ConvexPolygonalFeature::new();
    poly_a
        .hull()
        .support_face_toward(xf_a, &contact.normal, &mut face_a);
    poly_b
        .hull()
        .support_face_toward(xf_b, &-contact.normal, &mut face_b);

    let (normal_a, normal_b) = match (face_a.normal, face_b.normal) {
        (Some(n1), Some(n2)) => (n1, n2),
        _ => return manifold,
    };

    let alignment_a = normal_a.dot(&contact.normal);
    let alignment_b = -normal_b.dot(&contact.normal);

    let (reference, incident, ref_normal, xf_inc, poly_ref, flip) =
        if alignment_b > alignment_a + REFERENCE_FACE_TOLERANCE {
            manifold.kind = ManifoldKind::FaceB;
            (&face_b, &face_a, normal_b, xf_a, poly_b, true)
        } else {
            manifold.kind = ManifoldKind::FaceA;
            (&face_a, &face_b, normal_a, xf_b, poly_a, false)
        };

    let prediction = ContactPrediction::new(total_radius, 0.0, 0.0);
    let mut clipped: Vec<(Contact<Real>, FeatureId, FeatureId)> = Vec::new();
    reference.clip(incident, &ref_normal, &prediction, &mut clipped);

    if clipped.is_empty() {
        // Vertex against vertex: keep the single closest pair.
        let (world1, world2) = if flip {
            (contact.world2, contact.world1)
        } else {
            (contact.world1, contact.world2)
        };
        let c = Contact::new_wo_depth(world1, world2, ref_normal);

        if -c.depth <= total_radius {
            clipped.push((c, reference.feature_id, incident.feature_id));
        }
    }

    let ref_face = match reference.feature_id {
        FeatureId::Face(i) => i,
        _ => return manifold,
    };
    let vertices = poly_ref.vertices();
    let v1 = vertices[ref_face];
    let v2 = vertices[(ref_face + 1) % vertices.len()];

    manifold.local_normal = poly_ref.normals()[ref_face].into_inner();
    manifold.local_point = na::center(&v1, &v2).coords;

    for (c, id1, id2) in clipped.iter().take(manifold.points.len()) {
        let mp = &mut manifold.points[manifold.point_count];
        mp.local_point = xf_inc.inverse_transform_point(&c.world2).coords;
        mp.id = if flip {
            contact_feature(*id1, *id2).flipped()
        } else {
            contact_feature(*id1, *id2)
        };
        manifold.point_count += 1;
    }

    manifold
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::collision::WorldManifold;
    use crate::math::{self, Vector};

    #[test]
    fn box_on_ground_has_two_points() {
        let ground = Polygon::cuboid(5.0, 0.5);
        let b = Polygon::cuboid(0.5, 0.5);
        let xf_a = Isometry::identity();
        let xf_b = math::isometry(Vector::new(0.0, 0.99), 0.0);

        let manifold = collide_polygons(&ground, &xf_a, &b, &xf_b);
        assert_eq!(manifold.point_count, 2);
        assert_eq!(manifold.kind, ManifoldKind::FaceA);

        let wm = WorldManifold::new(
            &manifold,
            &xf_a,
            settings::POLYGON_RADIUS,
            &xf_b,
            settings::POLYGON_RADIUS,
        );
        assert!(relative_eq!(wm.normal, Vector::new(0.0, 1.0), epsilon = 1.0e-6));

        for s in &wm.separations {
            assert!(relative_eq!(
                *s,
                -0.01 - 2.0 * settings::POLYGON_RADIUS,
                epsilon = 1.0e-4
            ));
        }

        // Feature ids are distinct so that impulses can be matched across steps.
        assert_ne!(manifold.points[0].id, manifold.points[1].id);
    }

    #[test]
    fn aligned_faces_keep_the_reference_on_a() {
        let small = Polygon::cuboid(0.5, 0.5);
        let ground = Polygon::cuboid(5.0, 0.5);
        let xf_a = math::isometry(Vector::new(0.0, -0.99), 0.0);
        let xf_b = Isometry::identity();

        let manifold = collide_polygons(&small, &xf_a, &ground, &xf_b);
        assert_eq!(manifold.point_count, 2);
        assert_eq!(manifold.kind, ManifoldKind::FaceA);

        let wm = WorldManifold::new(
            &manifold,
            &xf_a,
            settings::POLYGON_RADIUS,
            &xf_b,
            settings::POLYGON_RADIUS,
        );
        assert!(relative_eq!(wm.normal, Vector::new(0.0, 1.0), epsilon = 1.0e-4));
    }

    #[test]
    fn tilted_box_uses_the_flat_face() {
        let ground = Polygon::cuboid(5.0, 0.5);
        let b = Polygon::cuboid(0.5, 0.5);
        let angle = std::f32::consts::FRAC_PI_4;
        // Corner pointing down, slightly into the skin.
        let xf_b = math::isometry(Vector::new(0.0, 0.5 + 0.5 * 2.0f32.sqrt() + 0.005), angle);

        let manifold = collide_polygons(&b, &xf_b, &ground, &Isometry::identity());
        assert_eq!(manifold.point_count, 1);
        assert_eq!(manifold.kind, ManifoldKind::FaceB);

        let wm = WorldManifold::new(
            &manifold,
            &xf_b,
            settings::POLYGON_RADIUS,
            &Isometry::identity(),
            settings::POLYGON_RADIUS,
        );
        // From the box down to the ground.
        assert!(relative_eq!(wm.normal, Vector::new(0.0, -1.0), epsilon = 1.0e-4));
        assert!(relative_eq!(
            wm.separations[0],
            0.005 - 2.0 * settings::POLYGON_RADIUS,
            epsilon = 1.0e-4
        ));
    }

    #[test]
    fn separated_boxes_have_no_points() {
        let a = Polygon::cuboid(0.5, 0.5);
        let xf_a = Isometry::identity();
        let xf_b = math::isometry(Vector::new(1.5, 0.0), 0.3);

        assert_eq!(collide_polygons(&a, &xf_a, &a, &xf_b).point_count, 0);
    }
}
