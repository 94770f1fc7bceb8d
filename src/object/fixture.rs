use crate::detection::{BroadPhase, ProxyId};
use crate::math::{Isometry, Real, Vector, AABB};
use crate::object::BodyHandle;
use crate::shape::{RayCastInput, RayCastOutput, Shape};
use crate::utils::{HandleSet, UserData};
use crate::volumetric::MassData;

use ncollide::bounding_volume::BoundingVolume;

define_handle!(FixtureHandle, "The handle of a fixture attached to a body.");

/// The set of fixtures of a world.
pub type FixtureSet = HandleSet<FixtureHandle, Fixture>;

/// Contact filtering data.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde-serialize", derive(Serialize, Deserialize))]
pub struct Filter {
    /// The collision category bits. Normally only one bit is set.
    pub category_bits: u16,
    /// The categories this fixture accepts collisions with.
    pub mask_bits: u16,
    /// Fixtures of the same non-zero group always collide (positive index) or never collide
    /// (negative index), regardless of categories.
    pub group_index: i16,
}

impl Default for Filter {
    fn default() -> Self {
        Filter {
            category_bits: 0x0001,
            mask_bits: 0xFFFF,
            group_index: 0,
        }
    }
}

impl Filter {
    /// The default collision rule between two filters.
    pub fn should_collide(&self, other: &Filter) -> bool {
        if self.group_index == other.group_index && self.group_index != 0 {
            return self.group_index > 0;
        }

        (self.mask_bits & other.category_bits) != 0 && (self.category_bits & other.mask_bits) != 0
    }
}

/// A description of a fixture, used to create it.
#[derive(Clone, Debug)]
pub struct FixtureDesc {
    shape: Shape,
    friction: Real,
    restitution: Real,
    density: Real,
    is_sensor: bool,
    filter: Filter,
}

impl FixtureDesc {
    /// A fixture description with the given shape, zero density and a friction of 0.2.
    pub fn new<S: Into<Shape>>(shape: S) -> Self {
        FixtureDesc {
            shape: shape.into(),
            friction: 0.2,
            restitution: 0.0,
            density: 0.0,
            is_sensor: false,
            filter: Filter::default(),
        }
    }

    desc_setters!(
        friction, set_friction, friction: Real
        restitution, set_restitution, restitution: Real
        density, set_density, density: Real
        sensor, set_sensor, is_sensor: bool
        filter, set_filter, filter: Filter
    );

    desc_getters!(
        get_friction -> friction: Real
        get_restitution -> restitution: Real
        get_density -> density: Real
        is_sensor -> is_sensor: bool
        get_filter -> filter: Filter
    );

    /// The shape of the fixture.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub(crate) fn build(&self, body: BodyHandle) -> Fixture {
        debug_assert!(self.friction >= 0.0);
        debug_assert!(self.restitution >= 0.0);
        debug_assert!(self.density >= 0.0);

        Fixture {
            body,
            shape: self.shape.clone(),
            density: self.density,
            friction: self.friction,
            restitution: self.restitution,
            is_sensor: self.is_sensor,
            filter: self.filter,
            proxy: None,
            user_data: None,
        }
    }
}

/// The broad-phase proxy of a fixture.
#[derive(Clone, Debug)]
pub struct FixtureProxy {
    /// The tight bounding box swept over the last motion.
    pub aabb: AABB,
    /// The broad-phase identifier.
    pub proxy_id: ProxyId,
}

/// A shape attached to a body, with its collision and material properties.
pub struct Fixture {
    pub(crate) body: BodyHandle,
    shape: Shape,
    density: Real,
    pub(crate) friction: Real,
    pub(crate) restitution: Real,
    pub(crate) is_sensor: bool,
    pub(crate) filter: Filter,
    pub(crate) proxy: Option<FixtureProxy>,
    user_data: Option<Box<dyn UserData>>,
}

impl Fixture {
    /// The body this fixture is attached to.
    #[inline]
    pub fn body(&self) -> BodyHandle {
        self.body
    }

    /// The shape of this fixture, in the body frame.
    #[inline]
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// The density of this fixture.
    #[inline]
    pub fn density(&self) -> Real {
        self.density
    }

    /// Sets the density. The body mass is only updated by `World::reset_mass_data`.
    #[inline]
    pub fn set_density(&mut self, density: Real) {
        debug_assert!(density.is_finite() && density >= 0.0);
        self.density = density;
    }

    /// The friction coefficient.
    #[inline]
    pub fn friction(&self) -> Real {
        self.friction
    }

    /// Sets the friction coefficient. Existing contacts keep their mixed friction.
    #[inline]
    pub fn set_friction(&mut self, friction: Real) {
        self.friction = friction;
    }

    /// The restitution coefficient.
    #[inline]
    pub fn restitution(&self) -> Real {
        self.restitution
    }

    /// Sets the restitution coefficient. Existing contacts keep their mixed restitution.
    #[inline]
    pub fn set_restitution(&mut self, restitution: Real) {
        self.restitution = restitution;
    }

    /// Is this fixture a sensor?
    #[inline]
    pub fn is_sensor(&self) -> bool {
        self.is_sensor
    }

    /// The contact filtering data.
    #[inline]
    pub fn filter(&self) -> &Filter {
        &self.filter
    }

    /// The mass properties of this fixture, in the body frame.
    pub fn mass_data(&self) -> MassData {
        self.shape.compute_mass(self.density)
    }

    /// The fat bounding box of this fixture, if it has a proxy.
    pub fn aabb(&self) -> Option<&AABB> {
        self.proxy.as_ref().map(|p| &p.aabb)
    }

    /// Tests a world point for containment in this fixture, given the body transform.
    pub fn test_point(&self, xf: &Isometry, p: &Vector) -> bool {
        self.shape.test_point(xf, p)
    }

    /// Casts a ray against this fixture, given the body transform.
    pub fn ray_cast(&self, input: &RayCastInput, xf: &Isometry) -> Option<RayCastOutput> {
        self.shape.ray_cast(input, xf)
    }

    /// The user data attached to this fixture.
    #[inline]
    pub fn user_data(&self) -> Option<&dyn UserData> {
        self.user_data.as_deref()
    }

    /// Attaches user data to this fixture.
    #[inline]
    pub fn set_user_data(&mut self, data: Option<Box<dyn UserData>>) {
        self.user_data = data;
    }

    pub(crate) fn proxy_id(&self) -> Option<ProxyId> {
        self.proxy.as_ref().map(|p| p.proxy_id)
    }

    pub(crate) fn create_proxy(
        &mut self,
        broad_phase: &mut BroadPhase,
        xf: &Isometry,
        handle: FixtureHandle,
    ) {
        debug_assert!(self.proxy.is_none());
        let aabb = self.shape.compute_aabb(xf);
        let proxy_id = broad_phase.create_proxy(&aabb, handle);
        self.proxy = Some(FixtureProxy { aabb, proxy_id });
    }

    pub(crate) fn destroy_proxy(&mut self, broad_phase: &mut BroadPhase) {
        if let Some(proxy) = self.proxy.take() {
            broad_phase.destroy_proxy(proxy.proxy_id);
        }
    }

    pub(crate) fn touch_proxy(&self, broad_phase: &mut BroadPhase) {
        if let Some(proxy) = &self.proxy {
            broad_phase.touch_proxy(proxy.proxy_id);
        }
    }

    /// Updates the proxy with the bounding box swept from `xf1` to `xf2`.
    pub(crate) fn synchronize(
        &mut self,
        broad_phase: &mut BroadPhase,
        xf1: &Isometry,
        xf2: &Isometry,
    ) {
        if let Some(proxy) = &mut self.proxy {
            let aabb1 = self.shape.compute_aabb(xf1);
            let aabb2 = self.shape.compute_aabb(xf2);
            proxy.aabb = aabb1.merged(&aabb2);

            let displacement = xf2.translation.vector - xf1.translation.vector;
            let _ = broad_phase.move_proxy(proxy.proxy_id, &proxy.aabb, &displacement);
        }
    }
}

#[cfg(test)]
mod test {
    use super::Filter;

    #[test]
    fn filter_groups_override_categories() {
        let a = Filter {
            group_index: -1,
            ..Filter::default()
        };
        assert!(!a.should_collide(&a));

        let b = Filter {
            group_index: 2,
            category_bits: 0x0002,
            mask_bits: 0x0000,
        };
        assert!(b.should_collide(&b));

        let c = Filter {
            mask_bits: 0x0002,
            ..Filter::default()
        };
        assert!(!c.should_collide(&Filter::default()));
        assert!(Filter::default().should_collide(&Filter::default()));
    }
}
