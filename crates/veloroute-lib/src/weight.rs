//! Edge weight model.
//!
//! Turns raw road attributes and user preferences into a single non-negative
//! cost. The model is a pure function: no I/O, deterministic, and total over
//! every tag combination.
//!
//! ```text
//! weight = length * road_class_penalty * surface_penalty ^ surface_weight_factor
//! ```
//!
//! The exponent is the main tuning lever. At a factor of `1.0` the surface
//! table applies unchanged, below `1.0` surface differences are compressed so
//! distance dominates, above `1.0` they are amplified.

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::tags::{RoadClass, SurfaceKind};

/// Length substituted for missing, negative or non-finite edge lengths.
pub const FALLBACK_LENGTH_M: f64 = 1.0;

/// Penalty multiplier for main roads when the user fully avoids them.
const MAIN_ROAD_AVOID_FACTOR: f64 = 1.5;
/// Penalty multiplier for main roads when the user fully prefers them.
const MAIN_ROAD_PREFER_FACTOR: f64 = 0.7;
/// Maximum relief applied to rough surfaces by `prefer_unpaved`.
const UNPAVED_PREFERENCE_SWING: f64 = 0.5;

/// User tunables consumed by the weight model and the route searcher.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutePreferences {
    /// `0` avoids main roads, `1` prefers them.
    pub prefer_main_roads: f64,
    /// `0` avoids rough surfaces, `1` prefers them.
    pub prefer_unpaved: f64,
    /// Exponent applied to the surface penalty, in `[0.1, 3.0]`.
    pub surface_weight_factor: f64,
    /// Deviation from the goal bearing beyond which heuristic search
    /// penalises an edge.
    pub heading_threshold_deg: f64,
    /// Reserved for heatmap-guided weighting. Accepted and validated but
    /// currently has no effect on the weight.
    pub heatmap_influence: f64,
    /// Clamp every penalty multiplier to at least `1.0` so the haversine
    /// heuristic stays admissible in heuristic search.
    pub clamp_discounts: bool,
}

impl Default for RoutePreferences {
    fn default() -> Self {
        Self {
            prefer_main_roads: 0.5,
            prefer_unpaved: 0.5,
            surface_weight_factor: 1.0,
            heading_threshold_deg: 60.0,
            heatmap_influence: 0.0,
            clamp_discounts: false,
        }
    }
}

impl RoutePreferences {
    /// Reject values outside their documented ranges.
    pub fn validate(&self) -> Result<()> {
        check_range("prefer_main_roads", self.prefer_main_roads, 0.0, 1.0)?;
        check_range("prefer_unpaved", self.prefer_unpaved, 0.0, 1.0)?;
        check_range(
            "surface_weight_factor",
            self.surface_weight_factor,
            0.1,
            3.0,
        )?;
        check_range(
            "heading_threshold_deg",
            self.heading_threshold_deg,
            0.0,
            180.0,
        )?;
        check_range("heatmap_influence", self.heatmap_influence, 0.0, 1.0)?;
        Ok(())
    }

    /// Copy with every value forced into its range. Non-finite values fall
    /// back to the defaults.
    pub fn clamped(&self) -> Self {
        let defaults = Self::default();
        Self {
            prefer_main_roads: clamp_or(self.prefer_main_roads, 0.0, 1.0, defaults.prefer_main_roads),
            prefer_unpaved: clamp_or(self.prefer_unpaved, 0.0, 1.0, defaults.prefer_unpaved),
            surface_weight_factor: clamp_or(
                self.surface_weight_factor,
                0.1,
                3.0,
                defaults.surface_weight_factor,
            ),
            heading_threshold_deg: clamp_or(
                self.heading_threshold_deg,
                0.0,
                180.0,
                defaults.heading_threshold_deg,
            ),
            heatmap_influence: clamp_or(self.heatmap_influence, 0.0, 1.0, defaults.heatmap_influence),
            clamp_discounts: self.clamp_discounts,
        }
    }
}

fn check_range(name: &'static str, value: f64, min: f64, max: f64) -> Result<()> {
    if value.is_finite() && (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(Error::InvalidPreference {
            name,
            value,
            min,
            max,
        })
    }
}

fn clamp_or(value: f64, min: f64, max: f64, fallback: f64) -> f64 {
    if value.is_finite() {
        value.clamp(min, max)
    } else {
        fallback
    }
}

/// Base penalty table for highway classes.
///
/// Fast classes sit above `1.0`, dedicated cycling and walking infrastructure
/// below it.
pub fn road_class_penalty(class: RoadClass) -> f64 {
    match class {
        RoadClass::Motorway => 5.0,
        RoadClass::Trunk => 3.0,
        RoadClass::Primary => 2.0,
        RoadClass::Secondary => 1.5,
        RoadClass::Tertiary => 1.2,
        RoadClass::Cycleway => 0.7,
        RoadClass::Path | RoadClass::Footway | RoadClass::Bridleway => 0.9,
        RoadClass::Unclassified
        | RoadClass::Residential
        | RoadClass::LivingStreet
        | RoadClass::Service
        | RoadClass::Track
        | RoadClass::Pedestrian
        | RoadClass::Unknown => 1.0,
    }
}

/// Base penalty table for surface categories. Unknown surfaces are treated as
/// paved.
pub fn surface_penalty(surface: SurfaceKind) -> f64 {
    match surface {
        SurfaceKind::Paved | SurfaceKind::Unknown => 1.0,
        SurfaceKind::Gravel => 1.6,
        SurfaceKind::Unpaved | SurfaceKind::Dirt => 2.0,
    }
}

/// Compute the cost of traversing an edge.
///
/// Preferences are clamped into range before use, so the function never
/// fails. The result is always finite and non-negative.
pub fn edge_weight(
    length_m: f64,
    class: RoadClass,
    surface: SurfaceKind,
    prefs: &RoutePreferences,
) -> f64 {
    let prefs = prefs.clamped();
    let length = sanitize_length(length_m);

    let mut class_penalty = road_class_penalty(class);
    if class.is_main_road() {
        class_penalty *= MAIN_ROAD_AVOID_FACTOR
            + (MAIN_ROAD_PREFER_FACTOR - MAIN_ROAD_AVOID_FACTOR) * prefs.prefer_main_roads;
    }

    let mut surface_factor = surface_penalty(surface).powf(prefs.surface_weight_factor);
    if surface.is_rough() {
        surface_factor *= 1.0 - UNPAVED_PREFERENCE_SWING * (prefs.prefer_unpaved - 0.5);
    }

    // heatmap_influence is reserved; the slot stays at 1.0 until heatmap data exists.
    let heatmap_factor = 1.0;

    if prefs.clamp_discounts {
        class_penalty = class_penalty.max(1.0);
        surface_factor = surface_factor.max(1.0);
    }

    let weight = length * class_penalty * surface_factor * heatmap_factor;
    if weight.is_finite() {
        weight.max(0.0)
    } else {
        0.0
    }
}

/// Convenience wrapper resolving raw tag strings before weighting.
pub fn edge_weight_from_tags(
    length_m: f64,
    highway: Option<&str>,
    surface: Option<&str>,
    prefs: &RoutePreferences,
) -> f64 {
    edge_weight(
        length_m,
        RoadClass::from_tag(highway),
        SurfaceKind::from_tag(surface),
        prefs,
    )
}

/// Replace lengths the weight model cannot use with [`FALLBACK_LENGTH_M`].
pub fn sanitize_length(length_m: f64) -> f64 {
    if length_m.is_finite() && length_m >= 0.0 {
        length_m
    } else {
        FALLBACK_LENGTH_M
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn prefs_with_factor(factor: f64) -> RoutePreferences {
        RoutePreferences {
            surface_weight_factor: factor,
            ..RoutePreferences::default()
        }
    }

    #[test]
    fn default_preferences_validate() {
        assert!(RoutePreferences::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_preference_is_rejected() {
        let prefs = RoutePreferences {
            surface_weight_factor: 5.0,
            ..RoutePreferences::default()
        };
        let err = prefs.validate().expect_err("factor too large");
        assert!(err.to_string().contains("surface_weight_factor"));
    }

    #[test]
    fn clamped_forces_values_into_range() {
        let prefs = RoutePreferences {
            prefer_main_roads: 4.0,
            surface_weight_factor: 0.0,
            prefer_unpaved: f64::NAN,
            ..RoutePreferences::default()
        }
        .clamped();
        assert_eq!(prefs.prefer_main_roads, 1.0);
        assert_eq!(prefs.surface_weight_factor, 0.1);
        assert_eq!(prefs.prefer_unpaved, 0.5);
    }

    #[test]
    fn unit_factor_reproduces_surface_table() {
        let prefs = prefs_with_factor(1.0);
        let gravel = edge_weight(100.0, RoadClass::Residential, SurfaceKind::Gravel, &prefs);
        assert!((gravel - 160.0).abs() < 1e-9);
        let dirt = edge_weight(100.0, RoadClass::Residential, SurfaceKind::Dirt, &prefs);
        assert!((dirt - 200.0).abs() < 1e-9);
    }

    #[test]
    fn main_road_preference_moves_penalty() {
        let avoid = RoutePreferences {
            prefer_main_roads: 0.0,
            ..RoutePreferences::default()
        };
        let prefer = RoutePreferences {
            prefer_main_roads: 1.0,
            ..RoutePreferences::default()
        };
        let avoided = edge_weight(100.0, RoadClass::Primary, SurfaceKind::Paved, &avoid);
        let preferred = edge_weight(100.0, RoadClass::Primary, SurfaceKind::Paved, &prefer);
        assert!((avoided - 300.0).abs() < 1e-9);
        assert!((preferred - 140.0).abs() < 1e-9);
    }

    #[test]
    fn unpaved_preference_relieves_rough_surfaces() {
        let keen = RoutePreferences {
            prefer_unpaved: 1.0,
            ..RoutePreferences::default()
        };
        let neutral = RoutePreferences::default();
        let keen_weight = edge_weight(100.0, RoadClass::Track, SurfaceKind::Unpaved, &keen);
        let neutral_weight = edge_weight(100.0, RoadClass::Track, SurfaceKind::Unpaved, &neutral);
        assert!(keen_weight < neutral_weight);
        assert!((keen_weight - 150.0).abs() < 1e-9);
    }

    #[test]
    fn clamp_discounts_removes_sub_unit_penalties() {
        let prefs = RoutePreferences {
            clamp_discounts: true,
            ..RoutePreferences::default()
        };
        let cycleway = edge_weight(100.0, RoadClass::Cycleway, SurfaceKind::Paved, &prefs);
        assert!((cycleway - 100.0).abs() < 1e-9);
    }

    #[test]
    fn invalid_lengths_fall_back() {
        let prefs = RoutePreferences::default();
        let nan = edge_weight(f64::NAN, RoadClass::Residential, SurfaceKind::Paved, &prefs);
        let negative = edge_weight(-5.0, RoadClass::Residential, SurfaceKind::Paved, &prefs);
        assert_eq!(nan, FALLBACK_LENGTH_M);
        assert_eq!(negative, FALLBACK_LENGTH_M);
        assert_eq!(
            edge_weight(0.0, RoadClass::Motorway, SurfaceKind::Dirt, &prefs),
            0.0
        );
    }

    #[test]
    fn heatmap_influence_is_inert() {
        let with_heatmap = RoutePreferences {
            heatmap_influence: 1.0,
            ..RoutePreferences::default()
        };
        let base = RoutePreferences::default();
        assert_eq!(
            edge_weight(250.0, RoadClass::Cycleway, SurfaceKind::Paved, &with_heatmap),
            edge_weight(250.0, RoadClass::Cycleway, SurfaceKind::Paved, &base)
        );
    }
}
