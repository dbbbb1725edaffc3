// Module exports for CLI subcommands.
//
// Each module owns the arguments and handler of one subcommand; main.rs only
// parses and dispatches.

pub mod inspect;
pub mod route;

use veloroute_lib::Coordinate;

/// Parse a `lat,lon` pair as typed on the command line.
pub fn parse_coordinate(raw: &str) -> Result<Coordinate, String> {
    let (lat, lon) = raw
        .split_once(',')
        .ok_or_else(|| format!("expected \"lat,lon\", got {raw:?}"))?;
    let lat: f64 = lat
        .trim()
        .parse()
        .map_err(|_| format!("latitude {:?} is not a number", lat.trim()))?;
    let lon: f64 = lon
        .trim()
        .parse()
        .map_err(|_| format!("longitude {:?} is not a number", lon.trim()))?;
    Coordinate::checked(lat, lon).map_err(|err| err.to_string())
}
