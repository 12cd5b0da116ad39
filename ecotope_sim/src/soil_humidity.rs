// Soil humidity cells — contention-based water allocation.
//
// Every plant whose root footprint covers a cell registers a request
// `(amount, weight)` there; the amount is what the plant would like to draw
// and the weight is its root size. Grants are computed lazily: any write
// (new request, removed request, new monthly ceiling) marks the cell dirty
// and the next read reruns the allocation.
//
// Allocation has two regimes:
//
// - **Plenty** (`sum(requested) <= available`): every requester receives its
//   request *plus the whole surplus*. The surplus is not divided; each
//   requester sees all of it. A lone plant therefore always sees the full
//   monthly ceiling, which is what lets it flood.
// - **Contention** (`sum(requested) > available`): requesters are served from
//   heaviest to lightest. Each gets `min(requested, weight / remaining_weight
//   * remaining_available)`, and the served weight and grant are deducted
//   before the next one. Zero-weight requesters (seeds with no roots yet)
//   split what is left equally.
//
// See also: `illumination.rs` for the occlusion-based counterpart,
// `environment.rs` which owns the grid of these cells.

use crate::types::PlantId;
use rustc_hash::FxHashMap;

/// One plant's claim on a cell.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HumidityRequest {
    /// Amount of soil humidity the plant would like to receive.
    pub amount: f32,
    /// Competitive weight (root radius). Heavier plants are served first.
    pub weight: f32,
}

impl HumidityRequest {
    pub const fn new(amount: f32, weight: f32) -> Self {
        Self { amount, weight }
    }
}

/// Per-cell soil humidity state.
#[derive(Clone, Debug, Default)]
pub struct SoilHumidityCell {
    /// Humidity available this month.
    available: f32,
    requests: FxHashMap<PlantId, HumidityRequest>,
    grants: FxHashMap<PlantId, f32>,
    dirty: bool,
}

impl SoilHumidityCell {
    pub fn new(available: f32) -> Self {
        Self {
            available,
            ..Self::default()
        }
    }

    pub fn available(&self) -> f32 {
        self.available
    }

    pub fn set_available(&mut self, available: f32) {
        if self.available != available {
            self.available = available;
            self.dirty = true;
        }
    }

    pub fn set_request(&mut self, plant: PlantId, request: HumidityRequest) {
        self.requests.insert(plant, request);
        self.dirty = true;
    }

    pub fn remove_request(&mut self, plant: PlantId) {
        if self.requests.remove(&plant).is_some() {
            self.dirty = true;
        }
    }

    pub fn total_requested(&self) -> f32 {
        self.requests.values().map(|r| r.amount).sum()
    }

    /// Amount granted to `plant` in this cell, reallocating first if any
    /// write happened since the last read. Zero for non-requesters.
    pub fn grant_for(&mut self, plant: PlantId) -> f32 {
        self.refresh();
        self.grants.get(&plant).copied().unwrap_or(0.0)
    }

    /// All current grants, reallocating first if needed.
    pub fn grants(&mut self) -> &FxHashMap<PlantId, f32> {
        self.refresh();
        &self.grants
    }

    fn refresh(&mut self) {
        if !self.dirty {
            return;
        }
        let requests: Vec<(PlantId, HumidityRequest)> =
            self.requests.iter().map(|(id, r)| (*id, *r)).collect();
        self.grants = allocate(self.available, &requests).into_iter().collect();
        self.dirty = false;
    }
}

/// Resolve competing requests against `available`. Returns one grant per
/// request, heaviest requester first.
pub fn allocate(available: f32, requests: &[(PlantId, HumidityRequest)]) -> Vec<(PlantId, f32)> {
    let available = available.max(0.0);
    let total_requested: f32 = requests.iter().map(|(_, r)| r.amount.max(0.0)).sum();

    if total_requested <= available {
        let surplus = available - total_requested;
        return requests
            .iter()
            .map(|(id, r)| (*id, r.amount.max(0.0) + surplus))
            .collect();
    }

    let mut order: Vec<(PlantId, HumidityRequest)> = requests.to_vec();
    order.sort_by(|a, b| {
        b.1.weight
            .max(0.0)
            .total_cmp(&a.1.weight.max(0.0))
            .then(a.0.cmp(&b.0))
    });

    let mut remaining_available = available;
    let mut remaining_weight: f32 = order.iter().map(|(_, r)| r.weight.max(0.0)).sum();
    let mut grants = Vec::with_capacity(order.len());

    for (served, (id, request)) in order.iter().enumerate() {
        let weight = request.weight.max(0.0);
        // Sorted heaviest first: once a zero weight shows up, everyone left
        // is weightless and the remainder is split evenly.
        let share = if weight > 0.0 && remaining_weight > 0.0 {
            weight / remaining_weight * remaining_available
        } else {
            remaining_available / (order.len() - served) as f32
        };
        let grant = request.amount.max(0.0).min(share).min(remaining_available);
        remaining_available = (remaining_available - grant).max(0.0);
        remaining_weight = (remaining_weight - weight).max(0.0);
        grants.push((*id, grant));
    }
    grants
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant_of(grants: &[(PlantId, f32)], id: u64) -> f32 {
        grants
            .iter()
            .find(|(p, _)| *p == PlantId(id))
            .map(|(_, g)| *g)
            .unwrap()
    }

    #[test]
    fn surplus_is_added_to_every_grant() {
        let requests = [
            (PlantId(1), HumidityRequest::new(10.0, 1.0)),
            (PlantId(2), HumidityRequest::new(20.0, 3.0)),
        ];
        let grants = allocate(50.0, &requests);
        // Surplus of 20 goes to each requester in full.
        assert_eq!(grant_of(&grants, 1), 30.0);
        assert_eq!(grant_of(&grants, 2), 40.0);
    }

    #[test]
    fn lone_requester_sees_whole_ceiling() {
        let grants = allocate(40.0, &[(PlantId(7), HumidityRequest::new(25.0, 2.0))]);
        assert_eq!(grants, vec![(PlantId(7), 40.0)]);
    }

    #[test]
    fn contention_never_overdraws() {
        let requests: Vec<_> = (0..7)
            .map(|i| {
                (
                    PlantId(i),
                    HumidityRequest::new(10.0 + i as f32 * 3.3, 0.1 + i as f32 * 0.7),
                )
            })
            .collect();
        for available in [1.0_f32, 13.7, 42.0, 99.9] {
            let grants = allocate(available, &requests);
            let total: f32 = grants.iter().map(|(_, g)| g).sum();
            assert!(total <= available + 1e-4, "granted {total} of {available}");
            for ((_, g), (_, r)) in grants.iter().zip(requests.iter()) {
                assert!(*g >= 0.0);
                assert!(*g <= r.amount.max(available));
            }
        }
    }

    #[test]
    fn heavier_plant_is_served_first() {
        let requests = [
            (PlantId(1), HumidityRequest::new(30.0, 1.0)),
            (PlantId(2), HumidityRequest::new(30.0, 3.0)),
        ];
        let grants = allocate(40.0, &requests);
        // Heavy: min(30, 3/4 * 40) = 30. Light: min(30, 1/1 * 10) = 10.
        assert_eq!(grants[0].0, PlantId(2));
        assert_eq!(grant_of(&grants, 2), 30.0);
        assert_eq!(grant_of(&grants, 1), 10.0);
    }

    #[test]
    fn proportional_share_caps_heavy_plant() {
        let requests = [
            (PlantId(1), HumidityRequest::new(100.0, 1.0)),
            (PlantId(2), HumidityRequest::new(100.0, 1.0)),
        ];
        let grants = allocate(60.0, &requests);
        assert_eq!(grant_of(&grants, 1), 30.0);
        assert_eq!(grant_of(&grants, 2), 30.0);
    }

    #[test]
    fn zero_weight_requesters_split_equally() {
        let requests = [
            (PlantId(1), HumidityRequest::new(50.0, 0.0)),
            (PlantId(2), HumidityRequest::new(50.0, 0.0)),
            (PlantId(3), HumidityRequest::new(50.0, 0.0)),
            (PlantId(4), HumidityRequest::new(50.0, 0.0)),
        ];
        let grants = allocate(40.0, &requests);
        for id in 1..=4 {
            assert_eq!(grant_of(&grants, id), 10.0);
        }
    }

    #[test]
    fn seeds_share_what_established_plants_leave() {
        let requests = [
            (PlantId(1), HumidityRequest::new(20.0, 2.0)),
            (PlantId(2), HumidityRequest::new(50.0, 0.0)),
            (PlantId(3), HumidityRequest::new(50.0, 0.0)),
        ];
        let grants = allocate(40.0, &requests);
        assert_eq!(grant_of(&grants, 1), 20.0);
        assert_eq!(grant_of(&grants, 2), 10.0);
        assert_eq!(grant_of(&grants, 3), 10.0);
    }

    #[test]
    fn cell_recomputes_after_writes() {
        let mut cell = SoilHumidityCell::new(30.0);
        cell.set_request(PlantId(1), HumidityRequest::new(10.0, 1.0));
        assert_eq!(cell.grant_for(PlantId(1)), 30.0);

        cell.set_request(PlantId(2), HumidityRequest::new(10.0, 1.0));
        assert_eq!(cell.grant_for(PlantId(1)), 20.0);

        cell.set_available(10.0);
        assert_eq!(cell.grant_for(PlantId(1)), 5.0);
        assert_eq!(cell.grant_for(PlantId(2)), 5.0);

        cell.remove_request(PlantId(2));
        assert_eq!(cell.grant_for(PlantId(1)), 10.0);
        assert_eq!(cell.grant_for(PlantId(2)), 0.0);
    }

    #[test]
    fn grants_never_exceed_ceiling() {
        let mut cell = SoilHumidityCell::new(25.0);
        for i in 0..5 {
            cell.set_request(PlantId(i), HumidityRequest::new(3.0 + i as f32, i as f32));
        }
        let ceiling = cell.available();
        assert!(cell.grants().values().all(|g| *g <= ceiling));
    }
}
