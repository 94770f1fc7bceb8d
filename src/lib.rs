/*!
impulse2d
=========

**impulse2d** is a 2-dimensional rigid-body physics engine.

Bodies carry fixtures (a shape with material properties), may be linked by joints, and
touch each other through contacts. Each call to `World::step`:

* updates the contact manifolds of the pairs reported by the broad phase,
* advances the particle systems,
* groups the awake bodies into islands of interacting bodies and solves each of them with
  a sequential-impulse velocity solver followed by a position correction pass,
* puts resting islands to sleep,
* sub-steps the fast bodies to their time of impact so that they do not tunnel through
  thin static geometry.

```ignore
let mut world = World::new(Vector::new(0.0, -10.0));
let ground = world.create_body(&BodyDesc::new())?;
world.create_fixture(ground, &FixtureDesc::new(Polygon::cuboid(50.0, 1.0)))?;

let ball = world.create_body(&BodyDesc::dynamic(Vector::new(0.0, 5.0)))?;
world.create_fixture(ball, &FixtureDesc::new(Circle::new(0.5)).density(1.0))?;

for _ in 0..60 {
    world.step(1.0 / 60.0, 8, 3)?;
}
```
*/

#![warn(missing_docs)]
#![warn(unused_results)]
#![allow(missing_copy_implementations)]

#[cfg(test)]
#[macro_use]
extern crate approx;
#[macro_use]
extern crate bitflags;
extern crate nalgebra as na;
extern crate ncollide2d as ncollide;
#[cfg(feature = "serde-serialize")]
#[macro_use]
extern crate serde;

#[macro_use]
mod utils;

pub mod collision;
pub mod counters;
pub mod detection;
pub mod error;
pub mod joint;
pub mod math;
pub mod object;
pub mod particle;
pub mod settings;
pub mod shape;
pub mod solver;
pub mod volumetric;
pub mod world;

pub use crate::utils::{Handle, HandleSet, UserData};

#[cfg(test)]
mod tests;
