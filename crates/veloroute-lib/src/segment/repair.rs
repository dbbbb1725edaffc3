//! Gap repair as an explicit fallback ladder.
//!
//! For each gap, in order: re-route on the intersection graph, re-route on the
//! raw graph, then bisect at the midpoint and repair both halves recursively
//! until the depth budget runs out. Halves that could be routed are kept even
//! when their sibling could not; whatever survives the ladder is left as a
//! straight line and reported, never raised as an error.

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::geodesy::{midpoint, Coordinate};

use super::leg::LegMode;
use super::stitch::{append_dedup, detect_gaps, max_step_m, Gap};
use super::CancellationFlag;

/// Source of routed legs for gap repair.
pub trait LegRouter {
    /// Route from `from` to `to`, returning the road coordinates between
    /// them (the endpoints themselves need not be included).
    fn route_leg(&self, from: Coordinate, to: Coordinate, mode: LegMode)
        -> Option<Vec<Coordinate>>;
}

/// Limits applied while repairing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RepairBudget {
    pub max_gap_m: f64,
    pub max_depth: u32,
}

/// Outcome of a repair pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RepairReport {
    pub detected: usize,
    pub repaired: usize,
    /// Gaps still present after repair, from a fresh scan of the track.
    pub unrepaired: Vec<Gap>,
}

/// Detect and repair gaps in `track` in place.
///
/// Gaps are handled from the end of the track backwards so splicing a repair
/// never shifts the index of a gap still waiting. `cancel` is checked before
/// every gap.
pub fn repair_gaps<R>(
    track: &mut Vec<Coordinate>,
    router: &R,
    budget: &RepairBudget,
    cancel: Option<&CancellationFlag>,
) -> Result<RepairReport>
where
    R: LegRouter + ?Sized,
{
    let gaps = detect_gaps(track, budget.max_gap_m);
    let mut report = RepairReport {
        detected: gaps.len(),
        ..RepairReport::default()
    };
    if !gaps.is_empty() {
        info!(gaps = gaps.len(), "repairing gaps");
    }

    for gap in gaps.iter().rev() {
        if cancel.is_some_and(CancellationFlag::is_cancelled) {
            return Err(Error::Cancelled);
        }
        let bridged = bridge(router, gap.from, gap.to, 0, budget);
        let widest = max_step_m(&bridged);
        if bridged.len() <= 2 || widest >= gap.distance_m {
            debug!(index = gap.index, distance_m = gap.distance_m, "gap left as straight line");
            continue;
        }

        let interior = bridged[1..bridged.len() - 1].to_vec();
        if widest <= budget.max_gap_m {
            debug!(
                index = gap.index,
                distance_m = gap.distance_m,
                inserted = interior.len(),
                "gap bridged"
            );
            report.repaired += 1;
        } else {
            debug!(
                index = gap.index,
                distance_m = gap.distance_m,
                remaining_m = widest,
                inserted = interior.len(),
                "gap partially bridged"
            );
        }
        track.splice(gap.index + 1..gap.index + 1, interior);
    }

    report.unrepaired = detect_gaps(track, budget.max_gap_m);
    for gap in &report.unrepaired {
        warn!(
            "{}",
            Error::GapUnrepaired {
                index: gap.index,
                distance_m: gap.distance_m,
            }
        );
    }
    Ok(report)
}

/// Walk the ladder for one gap.
///
/// Returns the best polyline found from `from` to `to` inclusive. Spans no
/// rung could route stay as straight hops, so the result may still contain
/// steps above the gap threshold.
fn bridge<R>(
    router: &R,
    from: Coordinate,
    to: Coordinate,
    depth: u32,
    budget: &RepairBudget,
) -> Vec<Coordinate>
where
    R: LegRouter + ?Sized,
{
    let mut best: Option<Vec<Coordinate>> = None;
    for mode in [LegMode::Intersection, LegMode::Raw] {
        let Some(leg) = router.route_leg(from, to, mode) else {
            continue;
        };
        let mut candidate = vec![from];
        append_dedup(&mut candidate, &leg);
        append_dedup(&mut candidate, &[to]);
        if max_step_m(&candidate) <= budget.max_gap_m {
            return candidate;
        }
        debug!(?mode, depth, "re-routed leg still contains a gap");
        best = Some(narrower(best, candidate));
    }

    if depth >= budget.max_depth {
        return best.unwrap_or_else(|| vec![from, to]);
    }

    let middle = midpoint(from, to);
    let left = bridge(router, from, middle, depth + 1, budget);
    let right = bridge(router, middle, to, depth + 1, budget);

    // The midpoint is not on a road; drop it and join the two halves directly.
    let mut joined = left[..left.len() - 1].to_vec();
    append_dedup(&mut joined, &right[1..]);
    match best {
        Some(direct) => narrower(Some(joined), direct),
        None => joined,
    }
}

/// Of two polylines, keep the one whose widest step is smaller, preferring
/// the one already held on a tie.
fn narrower(held: Option<Vec<Coordinate>>, candidate: Vec<Coordinate>) -> Vec<Coordinate> {
    match held {
        Some(held) if max_step_m(&held) <= max_step_m(&candidate) => held,
        _ => candidate,
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::geodesy::interpolate;

    /// Router that only answers legs shorter than `reach_m`, returning a
    /// densely sampled straight line.
    struct ShortReachRouter {
        reach_m: f64,
        calls: RefCell<Vec<LegMode>>,
    }

    impl LegRouter for ShortReachRouter {
        fn route_leg(
            &self,
            from: Coordinate,
            to: Coordinate,
            mode: LegMode,
        ) -> Option<Vec<Coordinate>> {
            self.calls.borrow_mut().push(mode);
            if crate::geodesy::haversine_m(from, to) > self.reach_m {
                return None;
            }
            Some((0..=10).map(|i| interpolate(from, to, i as f64 / 10.0)).collect())
        }
    }

    fn budget() -> RepairBudget {
        RepairBudget {
            max_gap_m: 1000.0,
            max_depth: 3,
        }
    }

    #[test]
    fn direct_reroute_closes_gap() {
        let router = ShortReachRouter {
            reach_m: 10_000.0,
            calls: RefCell::new(Vec::new()),
        };
        let mut track = vec![Coordinate::new(52.0, 21.0), Coordinate::new(52.0135, 21.0)];
        let report = repair_gaps(&mut track, &router, &budget(), None).unwrap();
        assert_eq!(report.detected, 1);
        assert_eq!(report.repaired, 1);
        assert!(report.unrepaired.is_empty());
        assert_eq!(router.calls.borrow().as_slice(), &[LegMode::Intersection]);
    }

    #[test]
    fn bisection_reaches_short_legs() {
        let router = ShortReachRouter {
            reach_m: 1_000.0,
            calls: RefCell::new(Vec::new()),
        };
        let mut track = vec![Coordinate::new(52.0, 21.0), Coordinate::new(52.027, 21.0)];
        let report = repair_gaps(&mut track, &router, &budget(), None).unwrap();
        assert_eq!(report.repaired, 1);
        assert!(report.unrepaired.is_empty());
        assert!(max_step_m(&track) <= 1000.0);
    }

    #[test]
    fn exhausted_budget_leaves_flagged_gap() {
        let router = ShortReachRouter {
            reach_m: 0.0,
            calls: RefCell::new(Vec::new()),
        };
        let mut track = vec![Coordinate::new(52.0, 21.0), Coordinate::new(52.0135, 21.0)];
        let report = repair_gaps(&mut track, &router, &budget(), None).unwrap();
        assert_eq!(report.repaired, 0);
        assert_eq!(report.unrepaired.len(), 1);
        assert_eq!(track.len(), 2);
    }

    /// Router that only serves short legs lying entirely south of `limit_lat`.
    struct SouthernRouter {
        limit_lat: f64,
    }

    impl LegRouter for SouthernRouter {
        fn route_leg(
            &self,
            from: Coordinate,
            to: Coordinate,
            _mode: LegMode,
        ) -> Option<Vec<Coordinate>> {
            let south = from.lat <= self.limit_lat + 1e-9 && to.lat <= self.limit_lat + 1e-9;
            if !south || crate::geodesy::haversine_m(from, to) > 1_000.0 {
                return None;
            }
            Some((0..=10).map(|i| interpolate(from, to, i as f64 / 10.0)).collect())
        }
    }

    #[test]
    fn routed_half_is_kept_when_the_other_half_fails() {
        let from = Coordinate::new(52.0, 21.0);
        let to = Coordinate::new(52.027, 21.0);
        let router = SouthernRouter {
            limit_lat: midpoint(from, to).lat,
        };
        let mut track = vec![from, to];
        let report = repair_gaps(&mut track, &router, &budget(), None).unwrap();

        assert!(track.len() > 2, "southern half was dropped: {track:?}");
        assert_eq!(track.first(), Some(&from));
        assert_eq!(track.last(), Some(&to));
        assert!(track[..track.len() - 1]
            .iter()
            .all(|point| point.lat <= router.limit_lat + 1e-9));
        assert!(max_step_m(&track) < crate::geodesy::haversine_m(from, to));

        assert_eq!(report.detected, 1);
        assert_eq!(report.repaired, 0);
        assert_eq!(report.unrepaired.len(), 1);
        assert_eq!(report.unrepaired[0].to, to);
        assert!(report.unrepaired[0].distance_m > 1000.0);
    }

    #[test]
    fn cancellation_stops_repair() {
        let router = ShortReachRouter {
            reach_m: 10_000.0,
            calls: RefCell::new(Vec::new()),
        };
        let flag = CancellationFlag::new();
        flag.cancel();
        let mut track = vec![Coordinate::new(52.0, 21.0), Coordinate::new(52.0135, 21.0)];
        let err = repair_gaps(&mut track, &router, &budget(), Some(&flag)).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
    }
}
