use std::fmt::Write;

use serde::Serialize;
use serde_json::json;

use crate::error::{Error, Result};
use crate::geodesy::Coordinate;
use crate::segment::RouteResult;

/// Presentation style for turning a [`RouteSummary`] into text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteRenderMode {
    /// Totals only.
    Summary,
    /// Totals followed by every track point.
    Detailed,
}

/// Structured overview of a planned route.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RouteSummary {
    pub start: Coordinate,
    pub end: Coordinate,
    pub points: usize,
    pub distance_km: f64,
    pub segments: usize,
    pub repaired_gaps: usize,
    pub unrepaired_gaps: usize,
    #[serde(skip)]
    coordinates: Vec<Coordinate>,
}

impl RouteSummary {
    pub fn from_result(result: &RouteResult) -> Result<Self> {
        let (Some(start), Some(end)) = (result.coordinates.first(), result.coordinates.last())
        else {
            return Err(Error::EmptyRoute);
        };
        Ok(Self {
            start: *start,
            end: *end,
            points: result.coordinates.len(),
            distance_km: result.distance_m / 1000.0,
            segments: result.segments,
            repaired_gaps: result.repaired_gaps,
            unrepaired_gaps: result.unrepaired_gaps.len(),
            coordinates: result.coordinates.clone(),
        })
    }

    pub fn render(&self, mode: RouteRenderMode) -> String {
        let mut buffer = String::new();
        let _ = writeln!(buffer, "Route {} -> {}", self.start, self.end);
        let _ = writeln!(
            buffer,
            "  distance: {:.2} km over {} point(s), {} segment(s)",
            self.distance_km, self.points, self.segments
        );
        if self.repaired_gaps > 0 || self.unrepaired_gaps > 0 {
            let _ = writeln!(
                buffer,
                "  gaps: {} repaired, {} unrepaired",
                self.repaired_gaps, self.unrepaired_gaps
            );
        }
        if mode == RouteRenderMode::Detailed {
            for (index, coord) in self.coordinates.iter().enumerate() {
                let _ = writeln!(buffer, "  {:>5} {:.6},{:.6}", index, coord.lat, coord.lon);
            }
        }
        buffer
    }
}

/// Render a track as a GPX 1.1 document with one track segment.
pub fn render_gpx(coordinates: &[Coordinate], name: &str) -> String {
    let mut buffer = String::new();
    let _ = writeln!(buffer, r#"<?xml version="1.0" encoding="UTF-8"?>"#);
    let _ = writeln!(
        buffer,
        r#"<gpx version="1.1" creator="veloroute" xmlns="http://www.topografix.com/GPX/1/1">"#
    );
    let _ = writeln!(buffer, "  <trk>");
    let _ = writeln!(buffer, "    <name>{}</name>", escape_xml(name));
    let _ = writeln!(buffer, "    <trkseg>");
    for coord in coordinates {
        let _ = writeln!(
            buffer,
            r#"      <trkpt lat="{:.7}" lon="{:.7}"></trkpt>"#,
            coord.lat, coord.lon
        );
    }
    let _ = writeln!(buffer, "    </trkseg>");
    let _ = writeln!(buffer, "  </trk>");
    let _ = writeln!(buffer, "</gpx>");
    buffer
}

/// Render a route as a GeoJSON `Feature` with a `LineString` geometry.
///
/// GeoJSON positions are `[lon, lat]`, the reverse of the track order.
pub fn render_geojson(result: &RouteResult) -> Result<String> {
    let positions: Vec<[f64; 2]> = result
        .coordinates
        .iter()
        .map(|coord| [coord.lon, coord.lat])
        .collect();
    let feature = json!({
        "type": "Feature",
        "geometry": {
            "type": "LineString",
            "coordinates": positions,
        },
        "properties": {
            "distance_m": result.distance_m,
            "segments": result.segments,
            "repaired_gaps": result.repaired_gaps,
            "unrepaired_gaps": result.unrepaired_gaps.len(),
        },
    });
    Ok(serde_json::to_string_pretty(&feature)?)
}

fn escape_xml(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for ch in raw.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&apos;"),
            other => escaped.push(other),
        }
    }
    escaped
}
