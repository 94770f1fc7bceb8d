//! Broad phase: fat bounding boxes of the fixtures stored in a dynamic bounding volume tree.

use ncollide::bounding_volume::BoundingVolume;
use ncollide::partitioning::{DBVTLeaf, DBVTLeafId, BVH, DBVT};
use ncollide::query::visitors::BoundingVolumeInterferencesCollector;
use slab::Slab;

use crate::math::{self, Real, Vector, AABB};
use crate::object::FixtureHandle;
use crate::settings;

/// Identifier of a proxy in the broad phase.
pub type ProxyId = usize;

struct Proxy {
    fat_aabb: AABB,
    leaf: DBVTLeafId,
    fixture: FixtureHandle,
}

/// The broad phase keeps one fat AABB per fixture and reports the pairs of fixtures whose
/// fat AABBs started to overlap because one of them moved.
pub struct BroadPhase {
    tree: DBVT<Real, ProxyId, AABB>,
    proxies: Slab<Proxy>,
    move_buffer: Vec<ProxyId>,
    pair_buffer: Vec<(ProxyId, ProxyId)>,
    query_buffer: Vec<ProxyId>,
}

impl Default for BroadPhase {
    fn default() -> Self {
        Self::new()
    }
}

impl BroadPhase {
    /// Creates an empty broad phase.
    pub fn new() -> Self {
        BroadPhase {
            tree: DBVT::new(),
            proxies: Slab::new(),
            move_buffer: Vec::new(),
            pair_buffer: Vec::new(),
            query_buffer: Vec::new(),
        }
    }

    /// The number of proxies.
    pub fn proxy_count(&self) -> usize {
        self.proxies.len()
    }

    /// Creates a proxy with a tight `aabb`. The stored bounding box is fattened.
    pub fn create_proxy(&mut self, aabb: &AABB, fixture: FixtureHandle) -> ProxyId {
        let fat_aabb = aabb.loosened(settings::AABB_EXTENSION);
        let id = self.proxies.vacant_key();
        let leaf = self.tree.insert(DBVTLeaf::new(fat_aabb.clone(), id));
        let inserted = self.proxies.insert(Proxy {
            fat_aabb,
            leaf,
            fixture,
        });
        debug_assert_eq!(id, inserted);

        self.move_buffer.push(id);
        id
    }

    /// Removes a proxy. The proxy identifier may be reused afterwards.
    pub fn destroy_proxy(&mut self, id: ProxyId) {
        if !self.proxies.contains(id) {
            return;
        }

        let proxy = self.proxies.remove(id);
        let _ = self.tree.remove(proxy.leaf);
        self.move_buffer.retain(|p| *p != id);
    }

    /// Updates the proxy after its fixture moved by `displacement`, enclosing it in the tight
    /// `aabb`.
    ///
    /// Nothing happens if the fat AABB still contains `aabb`. Otherwise, the fat AABB is
    /// rebuilt, extended in the direction of the displacement, and the proxy is buffered
    /// for pair finding. Returns `true` if the proxy was reinserted.
    pub fn move_proxy(&mut self, id: ProxyId, aabb: &AABB, displacement: &Vector) -> bool {
        let proxy = match self.proxies.get_mut(id) {
            Some(proxy) => proxy,
            None => return false,
        };

        if proxy.fat_aabb.contains(aabb) {
            return false;
        }

        // Extend the AABB and predict its motion.
        let fat = aabb.loosened(settings::AABB_EXTENSION);
        let d = displacement * settings::AABB_MULTIPLIER;
        let mut mins = fat.mins.coords;
        let mut maxs = fat.maxs.coords;

        for i in 0..2 {
            if d[i] < 0.0 {
                mins[i] += d[i];
            } else {
                maxs[i] += d[i];
            }
        }

        let fat_aabb = math::aabb(mins, maxs);
        let _ = self.tree.remove(proxy.leaf);
        proxy.leaf = self.tree.insert(DBVTLeaf::new(fat_aabb.clone(), id));
        proxy.fat_aabb = fat_aabb;

        self.move_buffer.push(id);
        true
    }

    /// Buffers a proxy for pair finding even if it did not move.
    pub fn touch_proxy(&mut self, id: ProxyId) {
        if self.proxies.contains(id) {
            self.move_buffer.push(id);
        }
    }

    /// The fat AABB of a proxy.
    pub fn fat_aabb(&self, id: ProxyId) -> Option<&AABB> {
        self.proxies.get(id).map(|p| &p.fat_aabb)
    }

    /// The fixture owning a proxy.
    pub fn fixture(&self, id: ProxyId) -> Option<FixtureHandle> {
        self.proxies.get(id).map(|p| p.fixture)
    }

    /// Do the fat AABBs of two proxies overlap?
    pub fn test_overlap(&self, a: ProxyId, b: ProxyId) -> bool {
        match (self.proxies.get(a), self.proxies.get(b)) {
            (Some(a), Some(b)) => a.fat_aabb.intersects(&b.fat_aabb),
            _ => false,
        }
    }

    /// Collects the fixtures whose fat AABB overlaps `aabb` into `out`.
    pub fn query(&self, aabb: &AABB, out: &mut Vec<FixtureHandle>) {
        let mut ids = Vec::new();
        self.query_ids(aabb, &mut ids);
        out.extend(ids.into_iter().filter_map(|id| self.fixture(id)));
    }

    fn query_ids(&self, aabb: &AABB, out: &mut Vec<ProxyId>) {
        let mut visitor = BoundingVolumeInterferencesCollector::new(aabb, out);
        self.tree.visit(&mut visitor);
    }

    /// Finds the new overlapping pairs among the moved proxies and pushes the corresponding
    /// fixture pairs into `out`. Each pair is reported once. The move buffer is cleared.
    pub fn update_pairs(&mut self, out: &mut Vec<(FixtureHandle, FixtureHandle)>) {
        self.pair_buffer.clear();
        let move_buffer = std::mem::replace(&mut self.move_buffer, Vec::new());

        for query_id in &move_buffer {
            let fat_aabb = match self.proxies.get(*query_id) {
                Some(proxy) => proxy.fat_aabb.clone(),
                None => continue,
            };

            let mut hits = std::mem::replace(&mut self.query_buffer, Vec::new());
            hits.clear();
            self.query_ids(&fat_aabb, &mut hits);

            for other in &hits {
                // A proxy cannot form a pair with itself.
                if *other == *query_id {
                    continue;
                }

                let pair = if *other < *query_id {
                    (*other, *query_id)
                } else {
                    (*query_id, *other)
                };
                self.pair_buffer.push(pair);
            }

            self.query_buffer = hits;
        }

        // Pairs found from both moved proxies are reported once.
        self.pair_buffer.sort_unstable();
        self.pair_buffer.dedup();

        for (a, b) in &self.pair_buffer {
            if let (Some(fa), Some(fb)) = (self.fixture(*a), self.fixture(*b)) {
                out.push((fa, fb));
            }
        }

        self.move_buffer = move_buffer;
        self.move_buffer.clear();
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::utils::Handle;

    fn square(x: Real, y: Real) -> AABB {
        math::aabb(Vector::new(x - 0.5, y - 0.5), Vector::new(x + 0.5, y + 0.5))
    }

    #[test]
    fn update_pairs_reports_each_pair_once() {
        let mut bp = BroadPhase::new();
        let f0 = FixtureHandle::from_key(0);
        let f1 = FixtureHandle::from_key(1);
        let f2 = FixtureHandle::from_key(2);

        let _ = bp.create_proxy(&square(0.0, 0.0), f0);
        let _ = bp.create_proxy(&square(0.8, 0.0), f1);
        let _ = bp.create_proxy(&square(10.0, 0.0), f2);

        let mut pairs = Vec::new();
        bp.update_pairs(&mut pairs);
        assert_eq!(pairs, vec![(f0, f1)]);

        // Nothing moved.
        pairs.clear();
        bp.update_pairs(&mut pairs);
        assert!(pairs.is_empty());
    }

    #[test]
    fn small_moves_keep_the_fat_aabb() {
        let mut bp = BroadPhase::new();
        let id = bp.create_proxy(&square(0.0, 0.0), FixtureHandle::from_key(0));
        let mut pairs = Vec::new();
        bp.update_pairs(&mut pairs);

        assert!(!bp.move_proxy(id, &square(0.05, 0.0), &Vector::new(0.05, 0.0)));
        assert!(bp.move_proxy(id, &square(1.0, 0.0), &Vector::new(1.0, 0.0)));

        // The fat AABB is predicted in the direction of motion.
        let fat = bp.fat_aabb(id).unwrap();
        assert!(fat.maxs.x > 1.5 + settings::AABB_EXTENSION + 1.0);
        assert!(relative_eq!(fat.mins.x, 0.5 - settings::AABB_EXTENSION));
    }
}
