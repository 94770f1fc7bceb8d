use std::cell::RefCell;
use std::rc::Rc;

use crate::collision::Manifold;
use crate::detection::{mix_friction, mix_restitution, ContactHandle};
use crate::error::WorldError;
use crate::joint::{GearJointDesc, JointDesc, RevoluteJointDesc};
use crate::math::{self, Real, Vector};
use crate::object::{BodyDesc, BodyHandle, FixtureDesc};
use crate::particle::{ParticleDesc, ParticleSystemDesc};
use crate::settings::{LINEAR_SLOP, POLYGON_RADIUS};
use crate::shape::{Circle, Polygon};
use crate::world::{ContactListener, World};

const DT: Real = 1.0 / 60.0;

// A wide static box whose top face is at y = 0.
fn add_ground(world: &mut World) -> BodyHandle {
    let ground = world
        .create_body(&BodyDesc::new().position(Vector::new(0.0, -0.5)))
        .unwrap();
    let _ = world
        .create_fixture(ground, &FixtureDesc::new(Polygon::cuboid(20.0, 0.5)))
        .unwrap();
    ground
}

fn add_ball(world: &mut World, position: Vector, radius: Real) -> BodyHandle {
    let ball = world.create_body(&BodyDesc::dynamic(position)).unwrap();
    let _ = world
        .create_fixture(ball, &FixtureDesc::new(Circle::new(radius)).density(1.0))
        .unwrap();
    ball
}

fn run(world: &mut World, steps: usize) {
    for _ in 0..steps {
        world.step(DT, 8, 3).unwrap();
    }
}

#[test]
fn falling_ball_rests_on_ground_and_sleeps() {
    let mut world = World::new(Vector::new(0.0, -10.0));
    let _ = add_ground(&mut world);
    let ball = add_ball(&mut world, Vector::new(0.0, 5.0), 0.5);

    run(&mut world, 600);

    // The solver leaves the rounded shapes overlapping by the linear slop.
    let body = world.body(ball).unwrap();
    let rest = 0.5 + POLYGON_RADIUS - LINEAR_SLOP;
    assert!((body.position().y - rest).abs() < LINEAR_SLOP);
    assert!(body.position().x.abs() < 1.0e-3);
    assert!(!body.is_awake());
}

#[test]
fn islands_separated_by_static_bodies_sleep_independently() {
    let mut world = World::new(Vector::new(0.0, -10.0));
    let _ = add_ground(&mut world);
    let left = add_ball(&mut world, Vector::new(-5.0, 0.5), 0.5);
    let right = add_ball(&mut world, Vector::new(5.0, 0.5), 0.5);

    run(&mut world, 300);
    assert!(!world.body(left).unwrap().is_awake());
    assert!(!world.body(right).unwrap().is_awake());

    // Both balls touch the ground, yet waking one does not wake the other.
    world
        .body_mut(left)
        .unwrap()
        .apply_linear_impulse(&Vector::new(0.0, 2.0), &Vector::new(-5.0, 0.5), true);
    run(&mut world, 1);

    assert!(world.body(left).unwrap().is_awake());
    assert!(!world.body(right).unwrap().is_awake());
}

fn add_box(world: &mut World, position: Vector) -> BodyHandle {
    let handle = world.create_body(&BodyDesc::dynamic(position)).unwrap();
    let fixture = FixtureDesc::new(Polygon::cuboid(0.5, 0.5))
        .density(1.0)
        .friction(0.6);
    let _ = world.create_fixture(handle, &fixture).unwrap();
    handle
}

#[test]
fn touching_stack_sleeps_and_wakes_as_a_unit() {
    let mut world = World::new(Vector::new(0.0, -10.0));
    let _ = add_ground(&mut world);
    let bottom = add_box(&mut world, Vector::new(0.0, 0.5));
    let top = add_box(&mut world, Vector::new(0.0, 1.5));

    for _ in 0..600 {
        world.step(DT, 8, 3).unwrap();
        assert_eq!(
            world.body(bottom).unwrap().is_awake(),
            world.body(top).unwrap().is_awake()
        );
    }

    assert!(!world.body(bottom).unwrap().is_awake());

    // Pushing the top box with wake-up also wakes the box it rests on.
    world
        .body_mut(top)
        .unwrap()
        .apply_force_to_center(&Vector::new(0.0, 50.0), true);
    assert!(!world.body(bottom).unwrap().is_awake());
    run(&mut world, 1);

    assert!(world.body(top).unwrap().is_awake());
    assert!(world.body(bottom).unwrap().is_awake());
}

#[test]
fn jointed_bodies_sleep_and_wake_together() {
    let mut world = World::new(Vector::zeros());
    let left = add_box(&mut world, Vector::new(0.0, 0.0));
    let right = add_box(&mut world, Vector::new(2.0, 0.0));
    let desc = RevoluteJointDesc::at_world_anchor(
        left,
        world.body(left).unwrap(),
        right,
        world.body(right).unwrap(),
        &Vector::new(1.0, 0.0),
    );
    let _ = world.create_joint(desc).unwrap();

    run(&mut world, 60);
    assert!(!world.body(left).unwrap().is_awake());
    assert!(!world.body(right).unwrap().is_awake());

    world
        .body_mut(left)
        .unwrap()
        .apply_force_to_center(&Vector::new(0.0, 50.0), true);
    run(&mut world, 1);

    assert!(world.body(left).unwrap().is_awake());
    assert!(world.body(right).unwrap().is_awake());
}

#[test]
fn box_stack_stays_upright() {
    let mut world = World::new(Vector::new(0.0, -10.0));
    let _ = add_ground(&mut world);
    let mut boxes = Vec::new();

    for i in 0..5 {
        let position = Vector::new(0.0, 0.5 + 1.05 * i as Real);
        let handle = world.create_body(&BodyDesc::dynamic(position)).unwrap();
        let fixture = FixtureDesc::new(Polygon::cuboid(0.5, 0.5))
            .density(1.0)
            .friction(0.6);
        let _ = world.create_fixture(handle, &fixture).unwrap();
        boxes.push(handle);
    }

    run(&mut world, 600);

    for (i, handle) in boxes.iter().enumerate() {
        let body = world.body(*handle).unwrap();
        assert!(body.position().x.abs() < 0.05);
        assert!((body.position().y - (0.5 + i as Real)).abs() < 0.1);
        assert!(body.angle().abs() < 0.05);
    }
}

#[test]
fn elastic_collision_swaps_velocities() {
    let mut world = World::new(Vector::zeros());
    let mut balls = Vec::new();

    for x in &[-2.0, 0.0] {
        let handle = world
            .create_body(&BodyDesc::dynamic(Vector::new(*x, 0.0)))
            .unwrap();
        let fixture = FixtureDesc::new(Circle::new(0.5))
            .density(1.0)
            .friction(0.0)
            .restitution(1.0);
        let _ = world.create_fixture(handle, &fixture).unwrap();
        balls.push(handle);
    }

    world
        .body_mut(balls[0])
        .unwrap()
        .set_linear_velocity(Vector::new(5.0, 0.0));

    run(&mut world, 30);

    let va = world.body(balls[0]).unwrap().linear_velocity();
    let vb = world.body(balls[1]).unwrap().linear_velocity();
    assert!(va.norm() < 0.1);
    assert!((vb.x - 5.0).abs() < 0.1);
    assert!(vb.y.abs() < 1.0e-3);
}

fn thin_wall_world() -> (World, BodyHandle) {
    let mut world = World::new(Vector::zeros());
    let wall = world
        .create_body(&BodyDesc::new().position(Vector::new(7.3, 0.0)))
        .unwrap();
    let _ = world
        .create_fixture(wall, &FixtureDesc::new(Polygon::cuboid(0.05, 5.0)))
        .unwrap();

    let ball = add_ball(&mut world, Vector::zeros(), 0.25);
    world
        .body_mut(ball)
        .unwrap()
        .set_linear_velocity(Vector::new(200.0, 0.0));

    (world, ball)
}

#[test]
fn fast_ball_does_not_tunnel_through_thin_wall() {
    let (mut world, ball) = thin_wall_world();

    for _ in 0..10 {
        world.step(DT, 8, 3).unwrap();

        let body = world.body(ball).unwrap();
        assert!(body.position().x < 7.25);
        assert!(body.sweep().alpha0 >= 0.0 && body.sweep().alpha0 < 1.0);
    }
}

#[test]
fn fast_ball_tunnels_without_continuous_physics() {
    let (mut world, ball) = thin_wall_world();
    world.set_continuous_physics(false);

    run(&mut world, 10);

    assert!(world.body(ball).unwrap().position().x > 7.35);
}

fn alpha0s(world: &World) -> Vec<(BodyHandle, Real)> {
    world
        .bodies()
        .iter()
        .map(|(handle, body)| (handle, body.sweep().alpha0))
        .collect()
}

#[test]
fn sub_stepped_bullets_never_move_alpha0_backward() {
    let (mut world, _) = thin_wall_world();
    world.set_sub_stepping(true);

    for (y, speed) in &[(-3.0, 150.0), (-1.5, 250.0), (1.5, 180.0), (3.0, 200.0)] {
        let bullet = add_ball(&mut world, Vector::new(0.0, *y), 0.25);
        let body = world.body_mut(bullet).unwrap();
        body.set_bullet(true);
        body.set_linear_velocity(Vector::new(*speed, 0.0));
    }

    // A loose box in the path of the last bullet.
    let _ = add_box(&mut world, Vector::new(4.0, 3.0));

    let mut longest_frame = 0;

    for _ in 0..10 {
        let mut previous: Option<Vec<(BodyHandle, Real)>> = None;
        let mut calls = 0;

        // Each call resolves at most one time of impact until the frame is complete.
        loop {
            world.step(DT, 8, 3).unwrap();
            calls += 1;
            assert!(calls < 500);

            let current = alpha0s(&world);
            for (_, alpha0) in &current {
                assert!(*alpha0 >= 0.0 && *alpha0 < 1.0);
            }

            if let Some(previous) = &previous {
                for ((h0, a0), (h1, a1)) in previous.iter().zip(&current) {
                    assert_eq!(h0, h1);
                    assert!(a1 >= a0);
                }
            }

            if world.is_step_complete() {
                break;
            }

            previous = Some(current);
        }

        longest_frame = longest_frame.max(calls);
    }

    assert!(longest_frame > 1);

    for (_, body) in world.bodies().iter().filter(|(_, b)| !b.is_static()) {
        assert!(body.position().x < 7.25);
    }
}

#[derive(Default)]
struct ReentrancyLog {
    begins: usize,
    rejected: Vec<WorldError>,
}

struct ReentrantListener {
    log: Rc<RefCell<ReentrancyLog>>,
    victim: BodyHandle,
    ground: BodyHandle,
}

impl ContactListener for ReentrantListener {
    fn begin_contact(&mut self, world: &mut World, _contact: ContactHandle) {
        let mut log = self.log.borrow_mut();
        log.begins += 1;
        assert!(world.is_locked());

        if let Err(e) = world.create_body(&BodyDesc::new()) {
            log.rejected.push(e);
        }

        if let Err(e) = world.destroy_body(self.victim) {
            log.rejected.push(e);
        }

        let joint = RevoluteJointDesc::new(self.ground, self.victim, Vector::zeros(), Vector::zeros());
        if let Err(e) = world.create_joint(joint) {
            log.rejected.push(e);
        }

        if let Err(e) = world.step(DT, 8, 3) {
            log.rejected.push(e);
        }
    }
}

#[test]
fn listeners_cannot_modify_a_locked_world() {
    let mut world = World::new(Vector::new(0.0, -10.0));
    let ground = add_ground(&mut world);
    let ball = add_ball(&mut world, Vector::new(0.0, 1.0), 0.5);
    let victim = add_ball(&mut world, Vector::new(10.0, 5.0), 0.5);
    let log = Rc::new(RefCell::new(ReentrancyLog::default()));

    world.set_contact_listener(Some(Box::new(ReentrantListener {
        log: log.clone(),
        victim,
        ground,
    })));

    run(&mut world, 60);

    let log = log.borrow();
    assert!(log.begins >= 1);
    assert!(log.rejected.iter().all(|e| *e == WorldError::Locked));
    assert_eq!(log.rejected.len(), 4 * log.begins);

    assert!(!world.is_locked());
    assert_eq!(world.body_count(), 3);
    assert_eq!(world.joint_count(), 0);
    assert!(world.body(ball).is_some());
    assert!(world.body(victim).is_some());
}

struct ContactDisabler;

impl ContactListener for ContactDisabler {
    fn pre_solve(&mut self, world: &mut World, contact: ContactHandle, _old_manifold: &Manifold) {
        if let Some(contact) = world.contact_mut(contact) {
            contact.set_enabled(false);
        }
    }
}

#[test]
fn contacts_disabled_in_pre_solve_are_not_solved() {
    let mut world = World::new(Vector::new(0.0, -10.0));
    let _ = add_ground(&mut world);
    let ball = add_ball(&mut world, Vector::new(0.0, 1.0), 0.5);
    world.set_contact_listener(Some(Box::new(ContactDisabler)));

    run(&mut world, 120);

    assert!(world.body(ball).unwrap().position().y < -2.0);
}

#[test]
fn resting_contact_keeps_its_impulse_across_steps() {
    let mut world = World::new(Vector::new(0.0, -10.0));
    world.set_allow_sleeping(false);
    let _ = add_ground(&mut world);
    let ball = add_ball(&mut world, Vector::new(0.0, 0.5), 0.5);

    run(&mut world, 120);

    let weight_impulse = world.body(ball).unwrap().mass() * 10.0 * DT;
    let (_, contact) = world
        .contacts()
        .iter()
        .find(|(_, c)| c.is_touching())
        .unwrap();
    let points = contact.manifold().points();

    assert_eq!(points.len(), 1);
    assert!((points[0].normal_impulse - weight_impulse).abs() < 0.1 * weight_impulse);
}

#[test]
fn gear_couples_joint_coordinates() {
    let mut world = World::new(Vector::zeros());
    let ground = world.create_body(&BodyDesc::new()).unwrap();
    let wheel1 = add_ball(&mut world, Vector::new(0.0, 0.0), 1.0);
    let wheel2 = add_ball(&mut world, Vector::new(3.0, 0.0), 1.0);

    let hinge1 = world
        .create_joint(RevoluteJointDesc::new(
            ground,
            wheel1,
            Vector::new(0.0, 0.0),
            Vector::zeros(),
        ))
        .unwrap();
    let hinge2 = world
        .create_joint(RevoluteJointDesc::new(
            ground,
            wheel2,
            Vector::new(3.0, 0.0),
            Vector::zeros(),
        ))
        .unwrap();
    let gear = world
        .create_joint(GearJointDesc::new(hinge1, hinge2, 2.0))
        .unwrap();

    world.body_mut(wheel1).unwrap().set_angular_velocity(1.0);
    run(&mut world, 60);

    let angle1 = world.body(wheel1).unwrap().angle();
    let angle2 = world.body(wheel2).unwrap().angle();
    assert!(angle1.abs() > 0.1);
    assert!((angle1 + 2.0 * angle2).abs() < 0.02);

    // The gear cannot outlive the joints it couples.
    world.destroy_joint(hinge1).unwrap();
    assert!(world.joint(gear).is_none());
    assert!(world.joint(hinge2).is_some());
    assert_eq!(world.joint_count(), 1);
}

#[test]
fn gear_requires_revolute_or_prismatic_joints() {
    let mut world = World::new(Vector::zeros());
    let ground = world.create_body(&BodyDesc::new()).unwrap();
    let wheel1 = add_ball(&mut world, Vector::zeros(), 1.0);
    let wheel2 = add_ball(&mut world, Vector::new(3.0, 0.0), 1.0);
    let hinge1 = world
        .create_joint(RevoluteJointDesc::new(ground, wheel1, Vector::zeros(), Vector::zeros()))
        .unwrap();
    let hinge2 = world
        .create_joint(RevoluteJointDesc::new(
            ground,
            wheel2,
            Vector::new(3.0, 0.0),
            Vector::zeros(),
        ))
        .unwrap();
    let gear = world
        .create_joint(GearJointDesc::new(hinge1, hinge2, 1.0))
        .unwrap();

    let result = world.create_joint(JointDesc::Gear(GearJointDesc::new(hinge1, gear, 1.0)));
    assert_eq!(result, Err(WorldError::InvalidGearJoint));
    assert_eq!(world.joint_count(), 3);
}

#[test]
fn pendulum_anchors_stay_together() {
    let mut world = World::new(Vector::new(0.0, -10.0));
    let ground = world.create_body(&BodyDesc::new()).unwrap();
    let bob = world
        .create_body(&BodyDesc::dynamic(Vector::new(3.0, 5.0)))
        .unwrap();
    let _ = world
        .create_fixture(bob, &FixtureDesc::new(Polygon::cuboid(0.25, 0.25)).density(1.0))
        .unwrap();

    let anchor = Vector::new(0.0, 5.0);
    let desc = RevoluteJointDesc::at_world_anchor(
        ground,
        world.body(ground).unwrap(),
        bob,
        world.body(bob).unwrap(),
        &anchor,
    );
    let hinge = world.create_joint(desc).unwrap();
    let mut lowest = Real::MAX;

    for _ in 0..120 {
        world.step(DT, 8, 3).unwrap();

        let joint = world.joint(hinge).unwrap();
        let a = joint.anchor_a(world.bodies()).unwrap();
        let b = joint.anchor_b(world.bodies()).unwrap();
        assert!((a - b).norm() < 0.01);

        let position = world.body(bob).unwrap().position();
        assert!(((position - anchor).norm() - 3.0).abs() < 0.02);
        lowest = lowest.min(position.y);
    }

    // The bob swung through the bottom of its circle around the anchor.
    assert!(lowest < 2.1);
}

#[test]
fn forces_without_wake_leave_sleeping_bodies_alone() {
    let mut world = World::new(Vector::new(0.0, -10.0));
    let sleeper = world
        .create_body(&BodyDesc::dynamic(Vector::new(0.0, 5.0)).awake(false))
        .unwrap();
    let _ = world
        .create_fixture(sleeper, &FixtureDesc::new(Circle::new(0.5)).density(1.0))
        .unwrap();

    {
        let body = world.body_mut(sleeper).unwrap();
        body.apply_force_to_center(&Vector::new(100.0, 0.0), false);
        body.apply_linear_impulse(&Vector::new(100.0, 0.0), &Vector::new(0.0, 5.0), false);
        assert_eq!(body.force(), Vector::zeros());
        assert_eq!(body.linear_velocity(), Vector::zeros());
    }

    run(&mut world, 10);

    let body = world.body(sleeper).unwrap();
    assert!(!body.is_awake());
    assert_eq!(body.position(), Vector::new(0.0, 5.0));

    world
        .body_mut(sleeper)
        .unwrap()
        .apply_force_to_center(&Vector::new(100.0, 0.0), true);
    assert!(world.body(sleeper).unwrap().is_awake());
}

#[test]
fn destroying_a_body_removes_its_fixtures_joints_and_contacts() {
    let mut world = World::new(Vector::new(0.0, -10.0));
    let ground = add_ground(&mut world);
    let ball = add_ball(&mut world, Vector::new(0.0, 0.5), 0.5);
    let _ = world
        .create_joint(RevoluteJointDesc::new(
            ground,
            ball,
            Vector::new(0.0, 1.0),
            Vector::new(0.0, 0.5),
        ))
        .unwrap();

    run(&mut world, 2);
    world.destroy_body(ball).unwrap();

    assert_eq!(world.body_count(), 1);
    assert_eq!(world.fixture_count(), 1);
    assert_eq!(world.joint_count(), 0);
    assert_eq!(world.contact_count(), 0);
    assert_eq!(world.proxy_count(), 1);
    assert!(world.body(ground).unwrap().joint_edges().is_empty());
    assert!(world.body(ground).unwrap().contact_edges().is_empty());
    assert_eq!(world.destroy_body(ball), Err(WorldError::InvalidBody));
}

#[test]
fn ray_cast_reports_the_closest_hit() {
    let mut world = World::new(Vector::zeros());
    let _ = add_ground(&mut world);
    let _ = add_ball(&mut world, Vector::new(0.0, 3.0), 0.5);

    let mut closest = None;
    world.ray_cast(
        &Vector::new(0.0, 10.0),
        &Vector::new(0.0, -10.0),
        |handle, _, point, normal, fraction| {
            closest = Some((handle, *point, *normal));
            fraction
        },
    );

    let (_, point, normal) = closest.unwrap();
    assert!(relative_eq!(point, Vector::new(0.0, 3.5), epsilon = 1.0e-4));
    assert!(relative_eq!(normal, Vector::new(0.0, 1.0), epsilon = 1.0e-4));
}

#[test]
fn aabb_query_finds_only_overlapping_fixtures() {
    let mut world = World::new(Vector::zeros());
    let ground = add_ground(&mut world);
    let ball = add_ball(&mut world, Vector::new(0.0, 3.0), 0.5);

    let mut found = Vec::new();
    world.query_aabb(
        &math::aabb(Vector::new(-0.1, 2.9), Vector::new(0.1, 3.1)),
        |_, fixture| {
            found.push(fixture.body());
            true
        },
    );
    assert_eq!(found, vec![ball]);

    // Returning false stops the query after the first fixture.
    let mut visited = 0;
    world.query_aabb(
        &math::aabb(Vector::new(-1.0, -1.0), Vector::new(1.0, 4.0)),
        |_, _| {
            visited += 1;
            false
        },
    );
    assert_eq!(visited, 1);
    assert!(world.body(ground).is_some());
}

#[test]
fn particles_settle_on_the_ground() {
    let mut world = World::new(Vector::new(0.0, -10.0));
    let _ = add_ground(&mut world);
    let system = world
        .create_particle_system(&ParticleSystemDesc::new().radius(0.1).capacity(25))
        .unwrap();

    for i in 0..5 {
        for j in 0..5 {
            let p = Vector::new(i as Real * 0.2, 1.0 + j as Real * 0.2);
            let _ = world.create_particle(system, &ParticleDesc::new(p)).unwrap();
        }
    }

    assert!(matches!(
        world.create_particle(system, &ParticleDesc::new(Vector::zeros())),
        Err(WorldError::CapacityExceeded { .. })
    ));

    run(&mut world, 180);

    let particles = world.particle_system(system).unwrap();
    assert_eq!(particles.particle_count(), 25);
    assert!(!particles.body_contacts().is_empty());

    for p in particles.positions() {
        assert!(p.y > -0.1);
        assert!(p.y < 1.0);
    }
}

#[test]
fn teleporting_a_body_creates_its_contacts_right_away() {
    let mut world = World::new(Vector::new(0.0, -10.0));
    let _ = add_ground(&mut world);
    let ball = add_ball(&mut world, Vector::new(0.0, 10.0), 0.5);

    run(&mut world, 1);
    assert_eq!(world.contact_count(), 0);

    world.set_transform(ball, Vector::new(3.0, 0.45), 0.0).unwrap();
    assert_eq!(world.contact_count(), 1);
}

#[test]
fn contact_material_overrides_can_be_reset() {
    let mut world = World::new(Vector::new(0.0, -10.0));
    let _ = add_ground(&mut world);
    let ball = world
        .create_body(&BodyDesc::dynamic(Vector::new(0.0, 0.5)))
        .unwrap();
    let fixture = FixtureDesc::new(Circle::new(0.5))
        .density(1.0)
        .friction(0.8)
        .restitution(0.3);
    let _ = world.create_fixture(ball, &fixture).unwrap();

    run(&mut world, 1);

    let handle = world
        .contacts()
        .iter()
        .find(|(_, c)| c.is_touching())
        .map(|(h, _)| h)
        .unwrap();
    let friction = mix_friction(0.2, 0.8);
    let restitution = mix_restitution(0.0, 0.3);

    {
        let contact = world.contact_mut(handle).unwrap();
        assert!(relative_eq!(contact.friction(), friction));
        assert!(relative_eq!(contact.restitution(), restitution));
        contact.set_friction(0.0);
        contact.set_restitution(1.0);
    }

    world.reset_contact_friction(handle).unwrap();
    assert!(relative_eq!(world.contact(handle).unwrap().friction(), friction));
    assert_eq!(world.contact(handle).unwrap().restitution(), 1.0);

    world.reset_contact_restitution(handle).unwrap();
    assert!(relative_eq!(world.contact(handle).unwrap().restitution(), restitution));

    assert_eq!(
        world.reset_contact_friction(ContactHandle(usize::MAX)),
        Err(WorldError::InvalidContact)
    );
}
