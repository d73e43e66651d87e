use rns_core::errors::ErrorInfo;
use rns_core::{Point, PointId, RnsError};

/// Slot-array manager for the live point population.
///
/// Replacement is index-based: a new point lands in the exact slot its
/// predecessor occupied, so snapshots taken for region fitting never alias a
/// half-updated structure. `replace` and `insert` are the only mutation
/// paths.
#[derive(Debug, Default)]
pub struct LivePopulation {
    slots: Vec<Point>,
}

impl LivePopulation {
    /// Creates an empty population.
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a population from checkpointed points.
    pub fn from_points(points: Vec<Point>) -> Result<Self, RnsError> {
        let mut population = Self::new();
        for point in points {
            population.insert(point)?;
        }
        Ok(population)
    }

    /// Number of live points.
    pub fn size(&self) -> usize {
        self.slots.len()
    }

    /// Whether the population holds no points.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Read-only view of the slots in storage order.
    pub fn points(&self) -> &[Point] {
        &self.slots
    }

    /// The live point with minimum log-likelihood.
    ///
    /// Ties break on the smaller identifier so repeated runs visit worst
    /// points in the same order.
    pub fn worst(&self) -> Result<&Point, RnsError> {
        self.slots
            .iter()
            .min_by(|a, b| {
                a.logl
                    .partial_cmp(&b.logl)
                    .unwrap_or(std::cmp::Ordering::Equal)
                    .then(a.id.cmp(&b.id))
            })
            .ok_or_else(|| {
                RnsError::Population(ErrorInfo::new(
                    "empty-population",
                    "worst point requested from an empty live population",
                ))
            })
    }

    /// Atomically swaps out the point identified by `old_id`.
    ///
    /// Returns the removed point. Replacing a point that is not a member is
    /// a contract violation: it means a stale identifier escaped the round
    /// loop, and the run cannot be trusted to continue.
    pub fn replace(&mut self, old_id: PointId, new_point: Point) -> Result<Point, RnsError> {
        if self.slots.iter().any(|slot| slot.id == new_point.id) {
            return Err(RnsError::Population(
                ErrorInfo::new("duplicate-id", "replacement point id already live")
                    .with_context("id", new_point.id.as_raw().to_string()),
            ));
        }
        let slot = self
            .slots
            .iter()
            .position(|slot| slot.id == old_id)
            .ok_or_else(|| {
                RnsError::Population(
                    ErrorInfo::new("not-a-member", "replaced point is not in the live population")
                        .with_context("id", old_id.as_raw().to_string())
                        .with_hint("stale identifier escaping the round loop indicates a dispatch bug"),
                )
            })?;
        Ok(std::mem::replace(&mut self.slots[slot], new_point))
    }

    /// Appends an extra live point (reactive injection and start-up only).
    pub fn insert(&mut self, point: Point) -> Result<(), RnsError> {
        if self.slots.iter().any(|slot| slot.id == point.id) {
            return Err(RnsError::Population(
                ErrorInfo::new("duplicate-id", "inserted point id already live")
                    .with_context("id", point.id.as_raw().to_string()),
            ));
        }
        self.slots.push(point);
        Ok(())
    }

    /// Removes and returns all points sorted by ascending log-likelihood.
    ///
    /// Used to drain the population into the dead sequence at termination.
    pub fn drain_sorted(&mut self) -> Vec<Point> {
        let mut points = std::mem::take(&mut self.slots);
        points.sort_by(|a, b| {
            a.logl
                .partial_cmp(&b.logl)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        points
    }

    /// Ordered read-only view, log-likelihood ascending.
    pub fn snapshot(&self) -> Vec<&Point> {
        let mut view: Vec<&Point> = self.slots.iter().collect();
        view.sort_by(|a, b| {
            a.logl
                .partial_cmp(&b.logl)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.id.cmp(&b.id))
        });
        view
    }

    /// Log-likelihood values in storage order.
    pub fn logls(&self) -> Vec<f64> {
        self.slots.iter().map(|point| point.logl).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn point(id: u64, logl: f64) -> Point {
        Point::new(PointId::from_raw(id), vec![0.5], vec![0.5], logl)
    }

    fn population() -> LivePopulation {
        LivePopulation::from_points(vec![point(0, -3.0), point(1, -1.0), point(2, -2.0)]).unwrap()
    }

    #[test]
    fn worst_returns_minimum_logl() {
        let live = population();
        assert_eq!(live.worst().unwrap().id, PointId::from_raw(0));
    }

    #[test]
    fn snapshot_is_sorted_ascending() {
        let live = population();
        let logls: Vec<f64> = live.snapshot().iter().map(|p| p.logl).collect();
        assert_eq!(logls, vec![-3.0, -2.0, -1.0]);
    }

    #[test]
    fn replace_swaps_exactly_one_slot() {
        let mut live = population();
        let removed = live.replace(PointId::from_raw(0), point(3, -0.5)).unwrap();
        assert_eq!(removed.id, PointId::from_raw(0));
        assert_eq!(live.size(), 3);
        assert_eq!(live.worst().unwrap().id, PointId::from_raw(2));
    }

    #[test]
    fn replacing_non_member_is_a_contract_violation() {
        let mut live = population();
        let err = live.replace(PointId::from_raw(9), point(3, -0.5)).unwrap_err();
        assert!(matches!(err, RnsError::Population(_)));
        assert_eq!(err.info().code, "not-a-member");
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut live = population();
        assert!(live.insert(point(1, -4.0)).is_err());
    }

    #[test]
    fn drain_orders_by_logl() {
        let mut live = population();
        let drained = live.drain_sorted();
        assert!(live.is_empty());
        let ids: Vec<u64> = drained.iter().map(|p| p.id.as_raw()).collect();
        assert_eq!(ids, vec![0, 2, 1]);
    }
}
