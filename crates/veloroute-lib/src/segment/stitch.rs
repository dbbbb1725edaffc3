use serde::{Deserialize, Serialize};

use crate::geodesy::{haversine_m, Coordinate};

/// Discontinuity between two consecutive track points.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Gap {
    /// Index of the point before the gap; the gap spans `index..=index + 1`.
    pub index: usize,
    pub from: Coordinate,
    pub to: Coordinate,
    pub distance_m: f64,
}

/// Append `points` to `track`, skipping any point equal to the current last
/// point so shared segment boundaries are not duplicated.
pub fn append_dedup(track: &mut Vec<Coordinate>, points: &[Coordinate]) {
    for point in points {
        if track.last() != Some(point) {
            track.push(*point);
        }
    }
}

/// Every consecutive pair in `track` further apart than `max_gap_m`.
pub fn detect_gaps(track: &[Coordinate], max_gap_m: f64) -> Vec<Gap> {
    track
        .windows(2)
        .enumerate()
        .filter_map(|(index, pair)| {
            let distance_m = haversine_m(pair[0], pair[1]);
            (distance_m > max_gap_m).then_some(Gap {
                index,
                from: pair[0],
                to: pair[1],
                distance_m,
            })
        })
        .collect()
}

/// Largest distance between consecutive points, `0.0` for fewer than two.
pub fn max_step_m(track: &[Coordinate]) -> f64 {
    track
        .windows(2)
        .map(|pair| haversine_m(pair[0], pair[1]))
        .fold(0.0, f64::max)
}
