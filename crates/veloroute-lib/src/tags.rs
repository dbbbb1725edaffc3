//! Closed enumerations for the raw string tags attached to road edges.
//!
//! Tags arrive from the map-data provider as free-form strings. They are
//! resolved into these enums once, when the graph is ingested, so the weight
//! model never has to deal with strings.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Highway classification of a road edge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RoadClass {
    #[strum(to_string = "motorway", serialize = "motorway_link")]
    Motorway,
    #[strum(to_string = "trunk", serialize = "trunk_link")]
    Trunk,
    #[strum(to_string = "primary", serialize = "primary_link")]
    Primary,
    #[strum(to_string = "secondary", serialize = "secondary_link")]
    Secondary,
    #[strum(to_string = "tertiary", serialize = "tertiary_link")]
    Tertiary,
    Unclassified,
    Residential,
    LivingStreet,
    Service,
    Track,
    Cycleway,
    Path,
    Footway,
    Bridleway,
    Pedestrian,
    /// Anything the table does not know about, including missing tags.
    #[default]
    Unknown,
}

impl RoadClass {
    /// Resolve a raw `highway` tag value.
    ///
    /// Semicolon separated multi-values (`"primary;secondary"`) use the first
    /// entry, mirroring how list-valued tags are collapsed during ingestion.
    pub fn from_tag(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return RoadClass::Unknown;
        };
        let first = raw.split(';').next().unwrap_or_default();
        RoadClass::from_str(&first.trim().to_ascii_lowercase()).unwrap_or(RoadClass::Unknown)
    }

    /// Fast or busy classes whose penalty responds to `prefer_main_roads`.
    pub fn is_main_road(self) -> bool {
        matches!(
            self,
            RoadClass::Motorway | RoadClass::Trunk | RoadClass::Primary | RoadClass::Secondary
        )
    }
}

/// Normalised surface category of a road edge.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Display, EnumString, Serialize, Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum SurfaceKind {
    #[strum(
        to_string = "paved",
        serialize = "asphalt",
        serialize = "concrete",
        serialize = "chipseal"
    )]
    Paved,
    #[strum(
        to_string = "gravel",
        serialize = "fine_gravel",
        serialize = "compacted",
        serialize = "pebblestone"
    )]
    Gravel,
    Unpaved,
    #[strum(
        to_string = "dirt",
        serialize = "ground",
        serialize = "earth",
        serialize = "mud",
        serialize = "sand"
    )]
    Dirt,
    /// Missing or unrecognised surface; weighted like a paved surface.
    #[default]
    Unknown,
}

impl SurfaceKind {
    /// Resolve a raw `surface` tag value.
    ///
    /// Compound values such as `"asphalt:lanes"` are cut at the first `:`
    /// before lookup.
    pub fn from_tag(raw: Option<&str>) -> Self {
        let Some(raw) = raw else {
            return SurfaceKind::Unknown;
        };
        let base = raw.split(':').next().unwrap_or_default();
        SurfaceKind::from_str(&base.trim().to_ascii_lowercase()).unwrap_or(SurfaceKind::Unknown)
    }

    /// Surfaces whose penalty responds to `prefer_unpaved`.
    pub fn is_rough(self) -> bool {
        matches!(
            self,
            SurfaceKind::Gravel | SurfaceKind::Unpaved | SurfaceKind::Dirt
        )
    }
}
