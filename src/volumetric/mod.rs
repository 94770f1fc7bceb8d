//! Area, center of mass and rotational inertia computation.

#[doc(inline)]
pub use self::volumetric::{MassData, Volumetric};

pub use self::volumetric_ball::{circle_area, circle_unit_angular_inertia};
pub use self::volumetric_convex2::{
    convex_polygon_area_and_center_of_mass, convex_polygon_mass_properties,
};

#[doc(hidden)]
pub mod volumetric;

mod volumetric_ball;
mod volumetric_convex2;
