//! Planar route geometry: projection, polyline merging, densification and the
//! directed distance used by coverage evaluation.
//!
//! Coordinates are projected into a local equirectangular tangent plane so
//! that distances are in metres. Within one audit area this is accurate
//! enough for tolerances in the order of a hundred metres.

use geo::{Closest, ClosestPoint, Coord, Distance, Euclidean, LineString, MultiLineString, Point};

use crate::error::Result;
use crate::model::{ExpandedRoute, NodeId};

/// Local tangent plane centred at `(lon0, lat0)`.
///
/// x = R * cos(lat0) * dlon, y = R * dlat
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LocalProjection {
    origin_lon_rad: f64,
    origin_lat_rad: f64,
    cos_lat0: f64,
}

impl LocalProjection {
    const EARTH_RADIUS: f64 = 6_371_007.2;

    pub fn new(lon0: f64, lat0: f64) -> Self {
        let origin_lon_rad = lon0.to_radians();
        let origin_lat_rad = lat0.to_radians();
        Self {
            origin_lon_rad,
            origin_lat_rad,
            cos_lat0: origin_lat_rad.cos(),
        }
    }

    /// Project `(lon, lat)` to metres.
    pub fn project(&self, lon: f64, lat: f64) -> Coord<f64> {
        let dlon = lon.to_radians() - self.origin_lon_rad;
        let dlat = lat.to_radians() - self.origin_lat_rad;
        Coord {
            x: Self::EARTH_RADIUS * self.cos_lat0 * dlon,
            y: Self::EARTH_RADIUS * dlat,
        }
    }

    /// Inverse of [`LocalProjection::project`].
    pub fn unproject(&self, coord: Coord<f64>) -> (f64, f64) {
        let dlon = coord.x / (Self::EARTH_RADIUS * self.cos_lat0);
        let dlat = coord.y / Self::EARTH_RADIUS;
        (
            (self.origin_lon_rad + dlon).to_degrees(),
            (self.origin_lat_rad + dlat).to_degrees(),
        )
    }
}

/// Merge ordered pieces into polylines, joining consecutive pieces that share
/// an endpoint.
///
/// A piece is appended when its first element equals the current polyline's
/// last, appended reversed when its last element does. While the current
/// polyline holds a single piece it may itself be flipped to connect.
/// Pieces shorter than two elements are dropped.
pub fn merge_sequences<T: PartialEq + Clone>(pieces: impl IntoIterator<Item = Vec<T>>) -> Vec<Vec<T>> {
    let mut merged = Vec::new();
    let mut current: Vec<T> = Vec::new();
    let mut piece_count = 0usize;

    for mut piece in pieces.into_iter().filter(|p| p.len() >= 2) {
        if current.is_empty() {
            current = piece;
            piece_count = 1;
            continue;
        }
        if current.last() != piece.first() {
            if current.last() == piece.last() {
                piece.reverse();
            } else if piece_count == 1 && current.first() == piece.first() {
                current.reverse();
            } else if piece_count == 1 && current.first() == piece.last() {
                current.reverse();
                piece.reverse();
            } else {
                merged.push(std::mem::replace(&mut current, piece));
                piece_count = 1;
                continue;
            }
        }
        current.extend(piece.into_iter().skip(1));
        piece_count += 1;
    }
    if !current.is_empty() {
        merged.push(current);
    }
    merged
}

/// Projected geometry of a route's routable way members in member order.
pub fn build_geometry(route: &ExpandedRoute, projection: &LocalProjection) -> Result<MultiLineString<f64>> {
    let pieces: Vec<Vec<NodeId>> = route
        .member_ways()?
        .into_iter()
        .filter(|way| way.is_routable())
        .map(|way| way.nodes.clone())
        .collect();

    let lines = merge_sequences(pieces)
        .into_iter()
        .map(|ids| {
            ids.iter()
                .map(|id| route.node(*id).map(|n| projection.project(n.lon, n.lat)))
                .collect::<Result<Vec<Coord<f64>>>>()
                .map(LineString::new)
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(MultiLineString::new(lines))
}

/// Insert vertices so consecutive vertices are at most `max_spacing` apart.
pub fn densify(line: &LineString<f64>, max_spacing: f64) -> LineString<f64> {
    let coords = &line.0;
    if coords.len() < 2 || max_spacing <= 0.0 {
        return line.clone();
    }
    let mut result = Vec::with_capacity(coords.len() * 2);
    result.push(coords[0]);

    for pair in coords.windows(2) {
        let (p1, p2) = (pair[0], pair[1]);
        let dist = Euclidean.distance(Point::from(p1), Point::from(p2));
        if dist > max_spacing {
            let steps = (dist / max_spacing).ceil() as usize;
            for j in 1..steps {
                let t = j as f64 / steps as f64;
                result.push(Coord {
                    x: p1.x + (p2.x - p1.x) * t,
                    y: p1.y + (p2.y - p1.y) * t,
                });
            }
        }
        result.push(p2);
    }
    LineString::new(result)
}

pub fn densify_all(lines: &MultiLineString<f64>, max_spacing: f64) -> MultiLineString<f64> {
    MultiLineString::new(lines.iter().map(|l| densify(l, max_spacing)).collect())
}

/// Largest distance from any vertex of `a` to the nearest point on the
/// segments of `b`.
///
/// Zero when `a` has no vertices; infinite when `b` has none.
pub fn directed_distance(a: &MultiLineString<f64>, b: &MultiLineString<f64>) -> f64 {
    a.iter()
        .flat_map(|line| line.points())
        .map(|p| distance_to_lines(p, b))
        .fold(0.0f64, f64::max)
}

fn distance_to_lines(p: Point<f64>, lines: &MultiLineString<f64>) -> f64 {
    lines
        .iter()
        .map(|line| match line.closest_point(&p) {
            Closest::Intersection(_) => 0.0,
            Closest::SinglePoint(q) => Euclidean.distance(p, q),
            Closest::Indeterminate => f64::INFINITY,
        })
        .fold(f64::INFINITY, f64::min)
}
