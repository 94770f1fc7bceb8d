//! Bodies and the fixtures attached to them.

pub use self::body::{
    Body, BodyDesc, BodyHandle, BodySet, BodyType, ContactEdge, JointEdge,
};
pub(crate) use self::body::BodyFlags;
pub use self::fixture::{Filter, Fixture, FixtureDesc, FixtureHandle, FixtureProxy, FixtureSet};

mod body;
mod fixture;
